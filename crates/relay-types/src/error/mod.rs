//! Typed error definitions for Gemini Relay.
//!
//! Relay failures and configuration failures live in separate enums so
//! callers can match on the domain they care about. Both serialize with a
//! `type`/`details` envelope so they can cross process boundaries intact.

mod config;
mod relay;

pub use config::ConfigError;
pub use relay::RelayError;
