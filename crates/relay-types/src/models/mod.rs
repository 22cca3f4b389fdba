//! Core domain models for Gemini Relay.

mod chat;
mod config;
mod event;

pub use chat::{ChatMessage, ChatRole, DocumentData, ImageData, StreamRequest};
pub use config::{
    CircuitBreakerSettings, GeminiConfig, ModelConfig, RelayConfig, TranscriptionConfig,
    DEFAULT_MODEL,
};
pub use event::{BoundaryEvent, EventType, Fragment, FragmentKind, PipelineEvent};
