//! Circuit breaker state types and configuration

use std::time::{Duration, Instant};

use gemini_relay_types::CircuitBreakerSettings;

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Attempts admitted per window before the circuit opens
    pub max_requests: u32,
    /// Length of the counting window
    pub window: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { max_requests: 60, window: Duration::from_secs(60) }
    }
}

impl From<&CircuitBreakerSettings> for CircuitBreakerConfig {
    fn from(settings: &CircuitBreakerSettings) -> Self {
        Self { max_requests: settings.max_requests, window: Duration::from_secs(settings.window_secs) }
    }
}

/// State of the circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Attempts pass through
    Closed,
    /// Ceiling exceeded, attempts refused until the window resets
    Open,
}

/// Counter for the current window
#[derive(Debug)]
pub(crate) struct RequestWindow {
    pub state: CircuitState,
    pub count: u32,
    pub reset_at: Instant,
}

impl RequestWindow {
    pub fn starting_at(now: Instant, window: Duration) -> Self {
        Self { state: CircuitState::Closed, count: 0, reset_at: now + window }
    }
}

/// Point-in-time view for diagnostics
#[derive(Debug, Clone)]
pub struct CircuitBreakerSummary {
    pub state: CircuitState,
    pub count: u32,
    pub retry_after: Duration,
    pub total_trips: u64,
}
