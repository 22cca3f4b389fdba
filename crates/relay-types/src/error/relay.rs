//! Relay-related errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while relaying a generation request or running the
/// transcription pipeline.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum RelayError {
    /// Requested model is unknown and no default is configured
    #[error("Cannot resolve model '{requested}': it is not configured and no default model is available")]
    Resolution { requested: String },

    /// 503/504/408 from upstream, still failing after in-place backoff
    #[error("Model {model} is temporarily unavailable (HTTP {status})")]
    TransientNetwork { model: String, status: u16 },

    /// Request deadline elapsed before or during streaming
    #[error("Model {model} request timed out")]
    Timeout { model: String },

    /// 429 from upstream
    #[error("Model {model} is rate limited (HTTP 429)")]
    RateLimited { model: String },

    /// 400 from upstream: bad parameters or invalid model name
    #[error("Model {model} rejected the request (HTTP 400): invalid parameters or model name")]
    ModelRequest { model: String },

    /// Any other upstream or transport failure
    #[error("Model {model} request failed: {message}")]
    Unexpected { model: String, message: String },

    /// Every credential in every tier hit the rate limit
    #[error("All API keys have reached their rate limit for {model}, please try again later")]
    AllKeysRateLimited { model: String },

    /// Every credential in every tier failed for a non rate-limit reason
    #[error("All API keys failed for model {model}")]
    AllKeysModelError { model: String },

    /// Fallback chain ended in a model that was already tried, or the attempt cap was hit
    #[error("All available models failed:\n{}", failures.join("\n"))]
    ModelsExhausted { failures: Vec<String> },

    /// The failing model has no fallback configured
    #[error("{}\nNo fallback model available", failures.join("\n"))]
    FallbackUnavailable { failures: Vec<String> },

    /// Circuit breaker rejected the attempt without calling upstream
    #[error("Request ceiling reached, retry in {retry_after_secs}s")]
    CircuitOpen { retry_after_secs: u64 },

    /// Streamed payload could not be decoded
    #[error("Malformed stream payload: {message}")]
    Parse { message: String },

    /// The same file is already being processed
    #[error("File {identity} is already being processed, please wait")]
    ProcessingConflict { identity: String },

    /// Transcription provider failed after retries
    #[error("Transcription failed: {message}")]
    Transcription { message: String },

    /// Audio splitting failed or produced unreadable output
    #[error("Audio segmentation failed: {message}")]
    Segmentation { message: String },

    /// Temporary directory could not be removed
    #[error("Failed to clean up {path}: {message}")]
    Cleanup { path: String, message: String },

    /// Resumable document upload failed
    #[error("Document upload failed: {message}")]
    Upload { message: String },

    /// Caller abandoned the request
    #[error("Request cancelled")]
    Cancelled,
}

impl RelayError {
    /// Check if this error counts towards rate-limit exhaustion of a key tier.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::CircuitOpen { .. })
    }

    /// Short stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Resolution { .. } => "resolution",
            Self::TransientNetwork { .. } => "transient",
            Self::Timeout { .. } => "timeout",
            Self::RateLimited { .. } => "rate_limit",
            Self::ModelRequest { .. } => "model_error",
            Self::Unexpected { .. } => "unexpected",
            Self::AllKeysRateLimited { .. } => "all_keys_rate_limited",
            Self::AllKeysModelError { .. } => "all_keys_model_error",
            Self::ModelsExhausted { .. } => "models_exhausted",
            Self::FallbackUnavailable { .. } => "fallback_unavailable",
            Self::CircuitOpen { .. } => "circuit_open",
            Self::Parse { .. } => "parse",
            Self::ProcessingConflict { .. } => "processing_conflict",
            Self::Transcription { .. } => "transcription",
            Self::Segmentation { .. } => "segmentation",
            Self::Cleanup { .. } => "cleanup",
            Self::Upload { .. } => "upload",
            Self::Cancelled => "cancelled",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_predicate() {
        assert!(RelayError::RateLimited { model: "m".into() }.is_rate_limit());
        assert!(RelayError::CircuitOpen { retry_after_secs: 3 }.is_rate_limit());
        assert!(!RelayError::Timeout { model: "m".into() }.is_rate_limit());
        assert!(!RelayError::ModelRequest { model: "m".into() }.is_rate_limit());
    }

    #[test]
    fn test_exhaustion_message_joins_failures() {
        let err = RelayError::ModelsExhausted {
            failures: vec!["first failure".to_string(), "second failure".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("first failure\nsecond failure"));

        let err = RelayError::FallbackUnavailable { failures: vec!["only".to_string()] };
        assert_eq!(err.to_string(), "only\nNo fallback model available");
    }

    #[test]
    fn test_serde_envelope() {
        let err = RelayError::CircuitOpen { retry_after_secs: 12 };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["type"], "CircuitOpen");
        assert_eq!(json["details"]["retry_after_secs"], 12);
    }
}
