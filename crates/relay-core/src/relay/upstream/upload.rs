//! Resumable two-step document upload to the Gemini file API.
//!
//! 1. `POST /upload/v1beta/files` with `X-Goog-Upload-Command: start` and the
//!    declared size and type; the session URL comes back in
//!    `X-Goog-Upload-URL`.
//! 2. `POST <session url>` with the bytes, offset 0 and
//!    `upload, finalize`; the body carries `{file: {uri}}`.
//!
//! A 429 on either step moves to the next key of the active tier.

use std::future::Future;

use bytes::Bytes;
use gemini_relay_types::protocol::gemini::{UploadFileMetadata, UploadResponse, UploadStartRequest};
use gemini_relay_types::{ConfigError, RelayError};
use tracing::{info, warn};
use url::Url;

use super::API_KEY_HEADER;
use crate::relay::common::{metrics, truncate_body};
use crate::relay::key_pool::{Credential, KeyPool};
use crate::relay::retry::{
    apply_retry_strategy, determine_retry_strategy, BackoffSchedule, FailureClass, UpstreamFailure,
};

const UPLOAD_PATH: &str = "/upload/v1beta/files";
const UPLOAD_URL_HEADER: &str = "x-goog-upload-url";

/// A document to upload.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub bytes: Bytes,
    pub file_name: String,
    pub mime_type: String,
    /// Defaults to the file name
    pub display_name: Option<String>,
}

impl DocumentUpload {
    fn display_name(&self) -> &str {
        self.display_name.as_deref().filter(|n| !n.is_empty()).unwrap_or(&self.file_name)
    }
}

pub struct DocumentUploader {
    http: reqwest::Client,
    start_url: String,
    backoff: BackoffSchedule,
}

impl DocumentUploader {
    /// The upload endpoint lives at the API origin, outside the versioned base path.
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        backoff: BackoffSchedule,
    ) -> Result<Self, ConfigError> {
        let mut url = Url::parse(base_url).map_err(|e| ConfigError::ValidationError {
            field: "gemini.base_url".to_string(),
            message: e.to_string(),
        })?;
        url.set_path(UPLOAD_PATH);
        url.set_query(None);
        Ok(Self { http, start_url: url.to_string(), backoff })
    }

    /// Upload and return the file URI.
    pub async fn upload(&self, pool: &KeyPool, document: &DocumentUpload) -> Result<String, RelayError> {
        let tier_len = pool.active_len();
        let mut credential = pool.current();

        for attempt in 0..tier_len {
            match self.upload_with(&credential, document).await {
                Ok(uri) => {
                    info!(file = %document.file_name, %uri, "Document uploaded");
                    return Ok(uri);
                },
                Err(failure) if failure.class == FailureClass::RateLimit => {
                    warn!(key = %credential, "Upload rate limited, rotating key");
                    metrics::record_upstream_failure(failure.class.as_str());
                    if attempt + 1 < tier_len {
                        credential = pool.advance();
                        metrics::record_key_rotation(credential.tier().as_str());
                    }
                },
                Err(failure) => {
                    metrics::record_upstream_failure(failure.class.as_str());
                    let message = match failure.status {
                        Some(status) => format!("HTTP {}: {}", status, failure.detail),
                        None => failure.detail,
                    };
                    return Err(RelayError::Upload { message });
                },
            }
        }

        Err(RelayError::AllKeysRateLimited { model: "file upload".to_string() })
    }

    async fn upload_with(
        &self,
        credential: &Credential,
        document: &DocumentUpload,
    ) -> Result<String, UpstreamFailure> {
        let session_url = self.with_backoff("upload start", || self.start_session(credential, document)).await?;
        self.with_backoff("upload finalize", || self.send_bytes(&session_url, document)).await
    }

    async fn start_session(
        &self,
        credential: &Credential,
        document: &DocumentUpload,
    ) -> Result<String, UpstreamFailure> {
        let metadata = UploadStartRequest {
            file: UploadFileMetadata { display_name: document.display_name().to_string() },
        };
        let response = self
            .http
            .post(&self.start_url)
            .header(API_KEY_HEADER, credential.expose())
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", document.bytes.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", document.mime_type.as_str())
            .json(&metadata)
            .send()
            .await
            .map_err(UpstreamFailure::transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamFailure::http(status.as_u16(), truncate_body(&body)));
        }

        response
            .headers()
            .get(UPLOAD_URL_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| UpstreamFailure::malformed("response is missing the X-Goog-Upload-URL header"))
    }

    async fn send_bytes(
        &self,
        session_url: &str,
        document: &DocumentUpload,
    ) -> Result<String, UpstreamFailure> {
        let response = self
            .http
            .post(session_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .header(reqwest::header::CONTENT_TYPE, document.mime_type.as_str())
            .body(document.bytes.clone())
            .send()
            .await
            .map_err(UpstreamFailure::transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamFailure::http(status.as_u16(), truncate_body(&body)));
        }

        let parsed: UploadResponse = response.json().await.map_err(UpstreamFailure::transport)?;
        parsed
            .file
            .and_then(|f| f.uri)
            .filter(|uri| !uri.is_empty())
            .ok_or_else(|| UpstreamFailure::malformed("upload response has no file uri"))
    }

    async fn with_backoff<T, F, Fut>(&self, context: &str, mut op: F) -> Result<T, UpstreamFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, UpstreamFailure>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(failure) => {
                    let strategy = determine_retry_strategy(failure.class, attempt, &self.backoff);
                    if !apply_retry_strategy(strategy, attempt, context).await {
                        return Err(failure);
                    }
                    attempt += 1;
                },
            }
        }
    }
}
