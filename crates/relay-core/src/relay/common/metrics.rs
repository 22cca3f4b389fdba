//! Relay counters.
//!
//! Emitted through the `metrics` facade; nothing is recorded unless the host
//! installs a recorder.
//!
//! - `relay_key_rotations_total{tier}`
//! - `relay_key_demotions_total`
//! - `relay_model_fallbacks_total`
//! - `relay_circuit_rejections_total`
//! - `relay_upstream_failures_total{class}`
//! - `relay_segments_transcribed_total`

use metrics::{counter, describe_counter};
use std::sync::Once;

static DESCRIBE: Once = Once::new();

/// Register counter descriptions with the installed recorder.
pub fn describe_metrics() {
    DESCRIBE.call_once(|| {
        describe_counter!("relay_key_rotations_total", "API key rotations by tier");
        describe_counter!("relay_key_demotions_total", "Premium to regular tier demotions");
        describe_counter!("relay_model_fallbacks_total", "Switches to a fallback model");
        describe_counter!(
            "relay_circuit_rejections_total",
            "Attempts refused by the request-rate circuit breaker"
        );
        describe_counter!("relay_upstream_failures_total", "Failed upstream attempts by class");
        describe_counter!(
            "relay_segments_transcribed_total",
            "Audio segments transcribed successfully"
        );
    });
}

pub fn record_key_rotation(tier: &'static str) {
    counter!("relay_key_rotations_total", "tier" => tier).increment(1);
}

pub fn record_demotion() {
    counter!("relay_key_demotions_total").increment(1);
}

pub fn record_model_fallback() {
    counter!("relay_model_fallbacks_total").increment(1);
}

pub fn record_circuit_rejection() {
    counter!("relay_circuit_rejections_total").increment(1);
}

pub fn record_upstream_failure(class: &'static str) {
    counter!("relay_upstream_failures_total", "class" => class).increment(1);
}

pub fn record_segment_transcribed() {
    counter!("relay_segments_transcribed_total").increment(1);
}
