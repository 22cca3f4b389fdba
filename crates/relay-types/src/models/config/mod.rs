//! Relay configuration models.
//!
//! Every optional field has a serde default so a minimal file with just
//! `gemini.api_keys` is a valid configuration.

mod gemini;
mod transcription;

pub use gemini::{GeminiConfig, ModelConfig, DEFAULT_MODEL};
pub use transcription::TranscriptionConfig;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::ConfigError;

/// Root configuration document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct RelayConfig {
    #[validate(nested)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    #[validate(nested)]
    pub circuit_breaker: CircuitBreakerSettings,
    #[serde(default)]
    #[validate(nested)]
    pub transcription: TranscriptionConfig,
    /// Interval of keep-alive events on long-lived streams
    #[serde(default = "default_heartbeat_secs")]
    #[validate(range(min = 1_u64))]
    pub heartbeat_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            gemini: GeminiConfig::default(),
            circuit_breaker: CircuitBreakerSettings::default(),
            transcription: TranscriptionConfig::default(),
            heartbeat_secs: default_heartbeat_secs(),
        }
    }
}

impl RelayConfig {
    /// Run field validation plus the cross-field credential check.
    pub fn validate_all(&self) -> Result<(), ConfigError> {
        self.validate().map_err(|e| ConfigError::from_validation(&e))?;
        if self.gemini.api_keys.is_empty() && self.gemini.premium_api_keys.is_empty() {
            return Err(ConfigError::NoCredentials);
        }
        Ok(())
    }
}

/// Request-rate guard settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct CircuitBreakerSettings {
    /// Attempts admitted per window
    #[validate(range(min = 1_u32))]
    pub max_requests: u32,
    /// Window length in seconds
    #[validate(range(min = 1_u64))]
    pub window_secs: u64,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self { max_requests: 60, window_secs: 60 }
    }
}

fn default_heartbeat_secs() -> u64 {
    30
}
