// Shared relay helpers

pub mod circuit_breaker;
pub mod metrics;
mod sanitize;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use sanitize::{mask_secret, truncate_body};
