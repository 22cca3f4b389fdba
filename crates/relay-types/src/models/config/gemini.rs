//! Upstream generation settings and the model catalog.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

/// Model used when a request names none.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash-latest";

/// Per-model limits and fallback.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelConfig {
    /// Requests per minute
    #[serde(default)]
    pub rpm: u64,
    /// Tokens per minute
    #[serde(default)]
    pub tpm: u64,
    /// Requests per day
    #[serde(default)]
    pub rpd: u64,
    /// Model tried after every key failed for this one; empty or self means none
    #[serde(default)]
    pub fallback_model: String,
}

impl ModelConfig {
    pub fn with_fallback(fallback: impl Into<String>) -> Self {
        Self { fallback_model: fallback.into(), ..Self::default() }
    }
}

/// Gemini API settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct GeminiConfig {
    /// Regular-tier keys
    #[serde(default)]
    pub api_keys: Vec<String>,
    /// Keys preferred until each has failed once in a request
    #[serde(default)]
    pub premium_api_keys: Vec<String>,
    #[serde(default = "default_base_url")]
    #[validate(url)]
    pub base_url: String,
    #[serde(default = "default_model")]
    #[validate(length(min = 1_u64))]
    pub default_model: String,
    #[serde(default)]
    pub models: BTreeMap<String, ModelConfig>,
    /// Whole-request deadline, streaming included
    #[serde(default = "default_request_timeout")]
    #[validate(range(min = 1_u64))]
    pub request_timeout_secs: u64,
    /// Upper bound on distinct models tried per request
    #[serde(default = "default_max_model_attempts")]
    #[validate(range(min = 1_u32))]
    pub max_model_attempts: u32,
    /// In-place retry delays for 503/504/408
    #[serde(default = "default_transient_backoff")]
    pub transient_backoff_ms: Vec<u64>,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            premium_api_keys: Vec::new(),
            base_url: default_base_url(),
            default_model: default_model(),
            models: BTreeMap::new(),
            request_timeout_secs: default_request_timeout(),
            max_model_attempts: default_max_model_attempts(),
            transient_backoff_ms: default_transient_backoff(),
        }
    }
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_request_timeout() -> u64 {
    600
}

fn default_max_model_attempts() -> u32 {
    3
}

fn default_transient_backoff() -> Vec<u64> {
    vec![1000, 2000, 4000]
}
