// Upstream Gemini API calls

pub mod executor;
pub mod sse;
pub mod upload;


pub use executor::StreamRequestExecutor;
pub use sse::TextStream;
pub use upload::{DocumentUpload, DocumentUploader};

/// Header carrying the API key; keeps secrets out of request URLs.
pub(crate) const API_KEY_HEADER: &str = "x-goog-api-key";
