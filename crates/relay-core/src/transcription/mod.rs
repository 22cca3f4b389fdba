//! Meeting audio -> transcript -> summary.
//!
//! Small inputs are transcribed in one request. Larger ones are split by an
//! external encoder into fixed-length segments that are transcribed in
//! parallel as they appear on disk. The joined transcript is summarized
//! through the relay controller.

pub mod audio;
pub mod cleanup;
pub mod client;
pub mod lock;
pub mod pipeline;
pub mod segmenter;


pub use audio::AudioProcessor;
pub use client::{transcribe_with_retry, AudioPayload, HttpTranscriber, Transcriber};
pub use lock::{ProcessingGuard, ProcessingLocks};
pub use pipeline::{AudioInput, ChunkedTranscriptionPipeline, PipelineSettings};
pub use segmenter::{AudioSegment, AudioSegmenter, FfmpegSegmenter, SegmentStream};
