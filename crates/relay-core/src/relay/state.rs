//! Process-wide relay state.
//!
//! Built once from [`RelayConfig`] and shared by reference. The key cursor,
//! circuit window and per-file lock table are the only mutable pieces and
//! each sits behind its own lock.

use std::sync::Arc;
use std::time::Duration;

use gemini_relay_types::RelayConfig;

use super::common::{metrics, CircuitBreaker, CircuitBreakerConfig};
use super::key_pool::KeyPool;
use super::model_catalog::ModelCatalog;
use super::retry::BackoffSchedule;
use super::upstream::{DocumentUploader, StreamRequestExecutor};
use crate::error::AppResult;
use crate::transcription::ProcessingLocks;

pub struct ServiceState {
    key_pool: KeyPool,
    catalog: ModelCatalog,
    circuit_breaker: CircuitBreaker,
    executor: StreamRequestExecutor,
    uploader: DocumentUploader,
    processing_locks: Arc<ProcessingLocks>,
    http: reqwest::Client,
    max_model_attempts: usize,
}

impl ServiceState {
    pub fn from_config(config: &RelayConfig) -> AppResult<Self> {
        config.validate_all()?;
        metrics::describe_metrics();

        let http = build_http_client(config.gemini.request_timeout_secs)?;
        let backoff = BackoffSchedule::from_millis(&config.gemini.transient_backoff_ms);

        Ok(Self {
            key_pool: KeyPool::new(
                config.gemini.premium_api_keys.clone(),
                config.gemini.api_keys.clone(),
            )?,
            catalog: ModelCatalog::from_config(&config.gemini),
            circuit_breaker: CircuitBreaker::with_config(CircuitBreakerConfig::from(
                &config.circuit_breaker,
            )),
            executor: StreamRequestExecutor::new(
                http.clone(),
                &config.gemini.base_url,
                backoff.clone(),
            ),
            uploader: DocumentUploader::new(http.clone(), &config.gemini.base_url, backoff)?,
            processing_locks: Arc::new(ProcessingLocks::new()),
            http,
            max_model_attempts: config.gemini.max_model_attempts as usize,
        })
    }

    pub fn key_pool(&self) -> &KeyPool {
        &self.key_pool
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    pub fn executor(&self) -> &StreamRequestExecutor {
        &self.executor
    }

    pub fn uploader(&self) -> &DocumentUploader {
        &self.uploader
    }

    pub fn processing_locks(&self) -> &Arc<ProcessingLocks> {
        &self.processing_locks
    }

    /// Shared HTTP client, for collaborators like the transcriber.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn max_model_attempts(&self) -> usize {
        self.max_model_attempts
    }
}

/// Build the shared HTTP client; the timeout covers the whole streamed body.
pub fn build_http_client(timeout_secs: u64) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(5)))
        .tcp_nodelay(true)
        .build()
}
