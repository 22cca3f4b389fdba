//! # Gemini Relay Core
//!
//! Resilient streaming relay in front of the Gemini generation API, plus a
//! chunked transcription pipeline that feeds meeting audio through it.
//!
//! ```text
//! relay-core/src/
//! ├── relay/
//! │   ├── key_pool/       # premium/regular key rotation
//! │   ├── model_catalog/  # model resolution, fallback, remote refresh
//! │   ├── common/         # circuit breaker, secret masking, metrics
//! │   ├── retry/          # failure classes and transient backoff
//! │   ├── upstream/       # SSE executor and resumable document upload
//! │   ├── controller/     # key -> tier -> model escalation state machine
//! │   ├── boundary.rs     # framed events and heartbeat
//! │   └── state.rs        # ServiceState, one per process
//! ├── transcription/      # per-file lock, segmenter, transcriber, pipeline
//! └── modules/config.rs   # config file resolution, load and atomic save
//! ```

#![allow(
    clippy::significant_drop_tightening,
    reason = "parking_lot guards are scoped to short critical sections"
)]
#![allow(clippy::module_name_repetitions, reason = "Type names mirror their module for clarity")]
#![allow(clippy::needless_continue, reason = "Explicit continue improves loop readability")]
#![cfg_attr(test, allow(clippy::panic, clippy::unwrap_used, clippy::expect_used))]

pub mod error;
pub mod modules;
pub mod relay;
pub mod transcription;

pub use error::{AppError, AppResult};
pub use relay::{
    boundary, KeyPool, KeyTier, ModelCatalog, ResilientStreamController, ServiceState,
};
pub use transcription::{ChunkedTranscriptionPipeline, ProcessingLocks};
