//! # Gemini Relay Types
//!
//! Core types, config models, and error definitions for Gemini Relay.
//!
//! - **`error`** - Typed error hierarchy for relay and configuration failures
//! - **`models`** - Domain models (chat turns, fragments, boundary events, config)
//! - **`protocol`** - Gemini `generateContent` wire types
//!
//! ## Architecture Role
//!
//! ```text
//!            gemini-relay-types (this crate)
//!                        │
//!                        ▼
//!               gemini-relay-core
//!                        │
//!                        ▼
//!                 gemini-relay (cli)
//! ```
//!
//! Everything here is plain data: serde-serializable, cheap to clone,
//! and comparable for tests.

pub mod error;
pub mod models;
pub mod protocol;

pub use error::{ConfigError, RelayError};

pub use models::{
    BoundaryEvent, ChatMessage, ChatRole, CircuitBreakerSettings, DocumentData, EventType, Fragment,
    FragmentKind, GeminiConfig, ImageData, ModelConfig, PipelineEvent, RelayConfig,
    StreamRequest, TranscriptionConfig,
};
