//! Request-rate circuit breaker shared by every upstream attempt.
//!
//! A fixed window counts admitted attempts. Once the ceiling is exceeded
//! the circuit opens and refuses everything until the window's reset
//! timestamp passes; the next call after that resets the counter and
//! closes the circuit. The decision is O(1) under one short lock.

mod state;


use state::RequestWindow;
pub use state::{CircuitBreakerConfig, CircuitBreakerSummary, CircuitState};

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    window: Mutex<RequestWindow>,
    total_trips: AtomicU64,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self::with_config(CircuitBreakerConfig::default())
    }

    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        let window = RequestWindow::starting_at(Instant::now(), config.window);
        Self { config, window: Mutex::new(window), total_trips: AtomicU64::new(0) }
    }

    /// Count one attempt; `false` means the attempt must not go upstream.
    pub fn admit(&self) -> bool {
        self.admit_at(Instant::now())
    }

    pub(crate) fn admit_at(&self, now: Instant) -> bool {
        let mut window = self.window.lock();
        self.roll_window(&mut window, now);

        if window.state == CircuitState::Open {
            return false;
        }

        window.count += 1;
        if window.count > self.config.max_requests {
            warn!(
                count = window.count,
                max_requests = self.config.max_requests,
                retry_after_secs = window.reset_at.saturating_duration_since(now).as_secs(),
                "Circuit breaker opening - request ceiling exceeded"
            );
            window.state = CircuitState::Open;
            self.total_trips.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        true
    }

    fn roll_window(&self, window: &mut RequestWindow, now: Instant) {
        if now < window.reset_at {
            return;
        }
        if window.state == CircuitState::Open {
            info!("Circuit breaker closing - window elapsed");
        }
        *window = RequestWindow::starting_at(now, self.config.window);
    }

    pub fn state(&self) -> CircuitState {
        let mut window = self.window.lock();
        self.roll_window(&mut window, Instant::now());
        window.state
    }

    /// Time until the current window resets.
    pub fn retry_after(&self) -> Duration {
        self.window.lock().reset_at.saturating_duration_since(Instant::now())
    }

    pub fn total_trips(&self) -> u64 {
        self.total_trips.load(Ordering::Relaxed)
    }

    pub fn summary(&self) -> CircuitBreakerSummary {
        let window = self.window.lock();
        CircuitBreakerSummary {
            state: window.state,
            count: window.count,
            retry_after: window.reset_at.saturating_duration_since(Instant::now()),
            total_trips: self.total_trips(),
        }
    }
}
