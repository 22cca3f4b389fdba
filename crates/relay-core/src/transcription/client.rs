//! Speech-to-text collaborator.

use async_trait::async_trait;
use bytes::Bytes;
use gemini_relay_types::{RelayError, TranscriptionConfig};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::relay::retry::BackoffSchedule;

/// Attempts per transcription unit, including the first.
pub const MAX_TRANSCRIBE_ATTEMPTS: usize = 3;

#[derive(Debug, Clone)]
pub struct AudioPayload {
    pub bytes: Bytes,
    pub file_name: String,
    pub mime_type: String,
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, payload: AudioPayload) -> Result<String, RelayError>;
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

/// OpenAI-compatible `/transcriptions` endpoint.
pub struct HttpTranscriber {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl HttpTranscriber {
    pub fn new(http: reqwest::Client, config: &TranscriptionConfig) -> Self {
        Self {
            http,
            endpoint: format!("{}/transcriptions", config.base_url.trim_end_matches('/')),
            api_key: config.api_keys.iter().map(|k| k.trim()).find(|k| !k.is_empty()).map(str::to_string),
            model: config.model.clone(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, payload: AudioPayload) -> Result<String, RelayError> {
        let size = payload.bytes.len();
        let part = Part::stream_with_length(payload.bytes, size as u64)
            .file_name(payload.file_name.clone())
            .mime_str(&payload.mime_type)
            .map_err(|e| RelayError::Transcription { message: e.without_url().to_string() })?;
        let form = Form::new().part("file", part).text("model", self.model.clone());

        let mut request = self.http.post(&self.endpoint).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        debug!(file = %payload.file_name, size, "Sending audio for transcription");
        let response = request
            .send()
            .await
            .map_err(|e| RelayError::Transcription { message: e.without_url().to_string() })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::Transcription {
                message: format!("HTTP {}: {}", status.as_u16(), crate::relay::common::truncate_body(&body)),
            });
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| RelayError::Transcription { message: e.without_url().to_string() })?;
        Ok(parsed.text)
    }
}

/// Run one transcription with up to [`MAX_TRANSCRIBE_ATTEMPTS`] attempts.
///
/// Delays come from `backoff`; the last error is returned unchanged.
pub async fn transcribe_with_retry(
    transcriber: &dyn Transcriber,
    payload: AudioPayload,
    backoff: &BackoffSchedule,
) -> Result<String, RelayError> {
    let mut attempt = 0;
    loop {
        match transcriber.transcribe(payload.clone()).await {
            Ok(text) => return Ok(text),
            Err(err) => {
                let delay = backoff.delay_for(attempt);
                attempt += 1;
                match delay {
                    Some(delay) if attempt < MAX_TRANSCRIBE_ATTEMPTS => {
                        warn!(
                            file = %payload.file_name,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "Transcription failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    },
                    _ => return Err(err),
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> TranscriptionConfig {
        TranscriptionConfig {
            base_url: format!("{}/v1/audio/", server.uri()),
            api_keys: vec!["  ".to_string(), "sk-stt".to_string()],
            ..TranscriptionConfig::default()
        }
    }

    fn payload() -> AudioPayload {
        AudioPayload {
            bytes: Bytes::from_static(b"OggS-fake-audio"),
            file_name: "output_000.opus".to_string(),
            mime_type: "audio/opus".to_string(),
        }
    }

    #[tokio::test]
    async fn test_posts_multipart_with_bearer_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/audio/transcriptions"))
            .and(header("authorization", "Bearer sk-stt"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"text": "good morning"})))
            .expect(1)
            .mount(&server)
            .await;

        let transcriber = HttpTranscriber::new(reqwest::Client::new(), &config(&server));
        assert!(transcriber.endpoint().ends_with("/v1/audio/transcriptions"));
        let text = transcriber.transcribe(payload()).await.unwrap();
        assert_eq!(text, "good morning");

        let requests = server.received_requests().await.unwrap();
        let body = String::from_utf8_lossy(&requests[0].body);
        assert!(body.contains("name=\"file\"; filename=\"output_000.opus\""));
        assert!(body.contains("FunAudioLLM/SenseVoiceSmall"));
    }

    #[tokio::test]
    async fn test_error_status_becomes_transcription_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("provider down"))
            .expect(3)
            .mount(&server)
            .await;

        let transcriber = HttpTranscriber::new(reqwest::Client::new(), &config(&server));
        let err = transcribe_with_retry(&transcriber, payload(), &BackoffSchedule::from_millis(&[1, 1, 1]))
            .await
            .unwrap_err();
        assert!(matches!(&err, RelayError::Transcription { message } if message.contains("HTTP 500")));
    }
}
