//! Startup sync of the model catalog against the upstream model listing.
//!
//! Uses the first premium key against the OpenAI-compatible listing. Known
//! entries are left alone; new `gemini-*` models are added with zero limits
//! and a self-referential fallback. Every failure is logged and leaves the
//! configuration untouched.

use std::collections::BTreeMap;

use gemini_relay_types::protocol::gemini::ModelListResponse;
use gemini_relay_types::{GeminiConfig, ModelConfig};
use tracing::{info, warn};

use crate::relay::common::truncate_body;

const MODEL_PREFIX: &str = "models/";
const GEMINI_PREFIX: &str = "gemini-";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Listing fetched; `added` new models were merged into `models`
    Updated { models: BTreeMap<String, ModelConfig>, added: Vec<String> },
    /// Nothing changed, with the reason
    Skipped(String),
}

pub struct ModelListRefresher {
    http: reqwest::Client,
}

impl ModelListRefresher {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    pub async fn refresh(&self, config: &GeminiConfig) -> RefreshOutcome {
        let Some(key) = config.premium_api_keys.iter().find(|k| !k.trim().is_empty()) else {
            let reason = "no premium API key configured".to_string();
            warn!(%reason, "Skipping model list refresh");
            return RefreshOutcome::Skipped(reason);
        };

        let url = format!("{}/openai/models", config.base_url.trim_end_matches('/'));
        let response = match self.http.get(&url).bearer_auth(key.trim()).send().await {
            Ok(response) => response,
            Err(e) => return skipped(format!("request failed: {}", e.without_url())),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return skipped(format!("HTTP {}: {}", status.as_u16(), truncate_body(&body)));
        }

        let listing: ModelListResponse = match response.json().await {
            Ok(listing) => listing,
            Err(e) => return skipped(format!("invalid listing: {}", e.without_url())),
        };

        let (models, added) = merge_listing(&config.models, &listing);
        info!(total = models.len(), added = added.len(), "Model list refreshed");
        RefreshOutcome::Updated { models, added }
    }
}

fn skipped(reason: String) -> RefreshOutcome {
    warn!(%reason, "Model list refresh failed");
    RefreshOutcome::Skipped(reason)
}

/// Merge listed `models/gemini-*` ids into the existing catalog.
pub fn merge_listing(
    existing: &BTreeMap<String, ModelConfig>,
    listing: &ModelListResponse,
) -> (BTreeMap<String, ModelConfig>, Vec<String>) {
    let mut models = existing.clone();
    let mut added = Vec::new();

    for entry in &listing.data {
        let Some(id) = entry.id.strip_prefix(MODEL_PREFIX) else {
            continue;
        };
        if !id.starts_with(GEMINI_PREFIX) || models.contains_key(id) {
            continue;
        }
        models.insert(id.to_string(), ModelConfig::with_fallback(id));
        added.push(id.to_string());
    }

    (models, added)
}
