//! Wire types for the upstream APIs.

pub mod gemini;
