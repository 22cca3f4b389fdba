//! Speech-to-text and audio segmentation settings.

use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct TranscriptionConfig {
    /// OpenAI-compatible base, `/transcriptions` is appended
    #[serde(default = "default_base_url")]
    #[validate(url)]
    pub base_url: String,
    /// Bearer keys; the first one is used
    #[serde(default)]
    pub api_keys: Vec<String>,
    #[serde(default = "default_model")]
    pub model: String,
    /// Inputs above this many bytes are split into segments
    #[serde(default = "default_max_file_size")]
    #[validate(range(min = 1_u64))]
    pub max_file_size: u64,
    #[serde(default = "default_segment_seconds")]
    #[validate(range(min = 1_u64))]
    pub segment_seconds: u64,
    #[serde(default = "default_bitrate")]
    pub bitrate: String,
    /// Segment transcriptions in flight at once
    #[serde(default = "default_max_concurrency")]
    #[validate(range(min = 1_usize))]
    pub max_concurrency: usize,
    #[serde(default = "default_poll_interval_ms")]
    #[validate(range(min = 1_u64))]
    pub poll_interval_ms: u64,
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,
    /// Model that writes the meeting summary
    #[serde(default = "default_summary_model")]
    pub summary_model: String,
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: Vec<u64>,
    /// Parent of per-job scratch directories; system temp dir when unset
    #[serde(default)]
    pub temp_dir: Option<String>,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_keys: Vec::new(),
            model: default_model(),
            max_file_size: default_max_file_size(),
            segment_seconds: default_segment_seconds(),
            bitrate: default_bitrate(),
            max_concurrency: default_max_concurrency(),
            poll_interval_ms: default_poll_interval_ms(),
            ffmpeg_path: default_ffmpeg_path(),
            summary_model: default_summary_model(),
            retry_backoff_ms: default_retry_backoff(),
            temp_dir: None,
        }
    }
}

fn default_base_url() -> String {
    "https://api.siliconflow.cn/v1/audio".to_string()
}

fn default_model() -> String {
    "FunAudioLLM/SenseVoiceSmall".to_string()
}

fn default_max_file_size() -> u64 {
    25 * 1024 * 1024
}

fn default_segment_seconds() -> u64 {
    600
}

fn default_bitrate() -> String {
    "22k".to_string()
}

fn default_max_concurrency() -> usize {
    3
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_summary_model() -> String {
    "gemini-2.0-flash-lite-preview-02-05".to_string()
}

fn default_retry_backoff() -> Vec<u64> {
    vec![1000, 2000, 4000]
}
