//! Errors raised while locating, reading or validating `relay_config.json`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum ConfigError {
    #[error("Relay config not found at {path}")]
    NotFound { path: String },

    /// Unreadable file or invalid JSON
    #[error("Cannot parse relay config: {message}")]
    ParseError { message: String },

    #[error("Invalid relay config value in `{field}`: {message}")]
    ValidationError { field: String, message: String },

    /// Neither premium nor regular API keys are configured
    #[error("No Gemini API key configured: set gemini.api_keys or gemini.premium_api_keys")]
    NoCredentials,

    #[error("Cannot write relay config: {message}")]
    WriteError { message: String },
}

impl ConfigError {
    pub fn from_json_error(e: &serde_json::Error) -> Self {
        Self::ParseError { message: format!("line {}, column {}: {}", e.line(), e.column(), e) }
    }

    pub fn from_io_error(e: &std::io::Error) -> Self {
        Self::WriteError { message: e.to_string() }
    }

    /// Report the first failing top-level field; nested errors name their section.
    pub fn from_validation(errors: &validator::ValidationErrors) -> Self {
        let field = errors
            .errors()
            .keys()
            .next()
            .map_or_else(|| "config".to_string(), |k| k.to_string());
        Self::ValidationError { field, message: errors.to_string() }
    }
}
