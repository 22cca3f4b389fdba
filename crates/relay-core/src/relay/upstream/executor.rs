//! One streaming generation call against one key.

use gemini_relay_types::protocol::gemini::{
    GeminiContent, GeminiFileData, GeminiInlineData, GeminiPart, GenerateContentRequest,
};
use gemini_relay_types::{ChatRole, StreamRequest};
use tracing::{debug, warn};

use super::sse::{text_deltas, TextStream};
use super::API_KEY_HEADER;
use crate::relay::common::truncate_body;
use crate::relay::key_pool::Credential;
use crate::relay::retry::{
    apply_retry_strategy, determine_retry_strategy, BackoffSchedule, UpstreamFailure,
};

pub struct StreamRequestExecutor {
    http: reqwest::Client,
    base_url: String,
    backoff: BackoffSchedule,
}

impl StreamRequestExecutor {
    pub fn new(http: reqwest::Client, base_url: &str, backoff: BackoffSchedule) -> Self {
        Self { http, base_url: base_url.trim_end_matches('/').to_string(), backoff }
    }

    pub fn build_url(&self, model: &str) -> String {
        format!("{}/models/{}:streamGenerateContent?alt=sse", self.base_url, model)
    }

    /// History turns first, then one user turn with images, documents and the prompt.
    pub fn build_request_body(request: &StreamRequest) -> GenerateContentRequest {
        let mut contents: Vec<GeminiContent> = request
            .history
            .iter()
            .map(|message| GeminiContent {
                role: message.role.as_str().to_string(),
                parts: vec![GeminiPart::text(message.content.clone())],
            })
            .collect();

        let mut parts: Vec<GeminiPart> = Vec::new();
        parts.extend(request.images.iter().filter(|i| !i.data.is_empty()).map(|image| {
            GeminiPart::InlineData {
                inline_data: GeminiInlineData {
                    mime_type: image.mime_type.clone(),
                    data: image.data.clone(),
                },
            }
        }));
        parts.extend(request.documents.iter().filter(|d| !d.file_uri.is_empty()).map(|doc| {
            GeminiPart::FileData {
                file_data: GeminiFileData {
                    mime_type: doc.mime_type.clone(),
                    file_uri: doc.file_uri.clone(),
                },
            }
        }));
        if !request.prompt.is_empty() {
            parts.push(GeminiPart::text(request.prompt.clone()));
        }
        if parts.is_empty() {
            parts.push(GeminiPart::text(""));
        }

        contents.push(GeminiContent { role: ChatRole::User.as_str().to_string(), parts });
        GenerateContentRequest { contents }
    }

    /// Open a streamed response, retrying transient statuses on the same key.
    ///
    /// Returns once response headers arrive; deltas are pulled lazily from
    /// the returned stream.
    pub async fn execute(
        &self,
        model: &str,
        request: &StreamRequest,
        credential: &Credential,
    ) -> Result<TextStream, UpstreamFailure> {
        let url = self.build_url(model);
        let body = Self::build_request_body(request);
        let mut attempt = 0;

        loop {
            debug!(model, key = %credential, attempt = attempt + 1, "Sending stream request");
            let failure = match self
                .http
                .post(&url)
                .header(API_KEY_HEADER, credential.expose())
                .json(&body)
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => {
                    return Ok(text_deltas(Box::pin(response.bytes_stream())));
                },
                Ok(response) => {
                    let status = response.status().as_u16();
                    let text = response.text().await.unwrap_or_default();
                    UpstreamFailure::http(status, truncate_body(&text))
                },
                Err(e) => UpstreamFailure::transport(e),
            };

            warn!(
                model,
                tier = %credential.tier(),
                key_index = credential.index(),
                status = ?failure.status,
                class = failure.class.as_str(),
                detail = %failure.detail,
                "Upstream attempt failed"
            );

            let strategy = determine_retry_strategy(failure.class, attempt, &self.backoff);
            if !apply_retry_strategy(strategy, attempt, model).await {
                return Err(failure);
            }
            attempt += 1;
        }
    }
}
