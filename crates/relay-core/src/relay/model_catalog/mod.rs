//! Model resolution and fallback lookup.

pub mod refresh;

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;

use gemini_relay_types::{GeminiConfig, ModelConfig, RelayError};

#[derive(Debug, Clone)]
pub struct ModelCatalog {
    models: BTreeMap<String, ModelConfig>,
    default_model: String,
}

impl ModelCatalog {
    pub fn new(models: BTreeMap<String, ModelConfig>, default_model: impl Into<String>) -> Self {
        Self { models, default_model: default_model.into() }
    }

    pub fn from_config(config: &GeminiConfig) -> Self {
        Self::new(config.models.clone(), config.default_model.clone())
    }

    /// Map a requested name onto a configured model id.
    ///
    /// Order: exact key, then an entry whose fallback is the requested name
    /// and is itself configured, then the default model.
    pub fn resolve(&self, requested: Option<&str>) -> Result<String, RelayError> {
        let name = requested.map(str::trim).unwrap_or_default();

        if !name.is_empty() {
            if self.models.contains_key(name) {
                return Ok(name.to_string());
            }
            // Reverse alias: only resolves when the fallback target is a configured key.
            if let Some(alias) = self
                .models
                .values()
                .map(|m| m.fallback_model.as_str())
                .find(|fallback| *fallback == name && self.models.contains_key(*fallback))
            {
                return Ok(alias.to_string());
            }
        }

        if self.models.contains_key(&self.default_model) {
            tracing::debug!(
                requested = name,
                default = %self.default_model,
                "Unknown or empty model, using default"
            );
            return Ok(self.default_model.clone());
        }

        Err(RelayError::Resolution {
            requested: if name.is_empty() { self.default_model.clone() } else { name.to_string() },
        })
    }

    /// Configured fallback, ignoring empty and self-referential entries.
    pub fn fallback_of(&self, model: &str) -> Option<String> {
        let fallback = self.models.get(model)?.fallback_model.trim();
        if fallback.is_empty() || fallback == model {
            return None;
        }
        Some(fallback.to_string())
    }

    pub fn contains(&self, model: &str) -> bool {
        self.models.contains_key(model)
    }

    pub fn model_ids(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }
}
