//! Errors surfaced by relay setup and one-shot operations.
//!
//! Streaming paths never return these; they report failures as `error`
//! fragments instead.

use gemini_relay_types::{ConfigError, RelayError};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AppError {
    #[error("HTTP client error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_pass_through_unchanged() {
        let err = AppError::from(ConfigError::NoCredentials);
        assert_eq!(err.to_string(), ConfigError::NoCredentials.to_string());
        assert_eq!(serde_json::to_string(&err).unwrap(), format!("\"{}\"", err));
    }
}
