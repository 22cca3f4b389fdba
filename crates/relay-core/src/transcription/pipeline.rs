//! Audio file -> transcript -> streamed meeting summary.

use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use gemini_relay_types::{PipelineEvent, RelayError, StreamRequest, TranscriptionConfig};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::audio::{AudioProcessor, SEGMENT_MIME};
use super::cleanup::{ScratchDir, CLEANUP_ATTEMPTS, CLEANUP_BASE_DELAY};
use super::client::{transcribe_with_retry, AudioPayload, HttpTranscriber, Transcriber};
use super::lock::ProcessingLocks;
use super::segmenter::{AudioSegment, AudioSegmenter, FfmpegSegmenter, SegmentStream};
use crate::relay::common::metrics;
use crate::relay::retry::BackoffSchedule;
use crate::relay::{ResilientStreamController, ServiceState};

pub type PipelineStream = Pin<Box<dyn Stream<Item = PipelineEvent> + Send>>;

pub const STATUS_PROCESSING: &str = "Processing audio file...";
pub const STATUS_SEGMENTING: &str = "Large file, processing in segments...";
pub const STATUS_SEGMENTS_DONE: &str = "All segments processed, running analysis...";
pub const STATUS_ANALYZING: &str = "Running analysis...";
pub const STATUS_NO_SPEECH: &str = "No speech was recognised in the audio";

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub max_file_size: u64,
    pub max_concurrency: usize,
    pub summary_model: String,
    pub retry_backoff: BackoffSchedule,
    pub temp_root: PathBuf,
    pub cleanup_attempts: usize,
    pub cleanup_base_delay: Duration,
}

impl PipelineSettings {
    pub fn from_config(config: &TranscriptionConfig) -> Self {
        Self {
            max_file_size: config.max_file_size,
            max_concurrency: config.max_concurrency,
            summary_model: config.summary_model.clone(),
            retry_backoff: BackoffSchedule::from_millis(&config.retry_backoff_ms),
            temp_root: config.temp_dir.as_ref().map_or_else(std::env::temp_dir, PathBuf::from),
            cleanup_attempts: CLEANUP_ATTEMPTS,
            cleanup_base_delay: CLEANUP_BASE_DELAY,
        }
    }
}

/// Audio source with a known size; `file_name` drives MIME detection.
pub struct AudioInput {
    reader: Box<dyn AsyncRead + Send + Unpin>,
    size: u64,
    file_name: String,
}

impl AudioInput {
    pub fn new(reader: Box<dyn AsyncRead + Send + Unpin>, size: u64, file_name: impl Into<String>) -> Self {
        Self { reader, size, file_name: file_name.into() }
    }

    pub fn from_bytes(data: Vec<u8>, file_name: impl Into<String>) -> Self {
        let size = data.len() as u64;
        Self::new(Box::new(std::io::Cursor::new(data)), size, file_name)
    }

    pub async fn open(path: &Path) -> std::io::Result<Self> {
        let file = tokio::fs::File::open(path).await?;
        let size = file.metadata().await?.len();
        let file_name = path
            .file_name()
            .map_or_else(|| "audio".to_string(), |n| n.to_string_lossy().into_owned());
        Ok(Self::new(Box::new(file), size, file_name))
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }
}

pub struct ChunkedTranscriptionPipeline {
    controller: Arc<ResilientStreamController>,
    transcriber: Arc<dyn Transcriber>,
    segmenter: Arc<dyn AudioSegmenter>,
    locks: Arc<ProcessingLocks>,
    settings: PipelineSettings,
}

enum Step {
    Cancelled,
    Transcribed(Result<(usize, Result<String, RelayError>), JoinError>),
    Permit(Result<OwnedSemaphorePermit, AcquireError>),
    Segment(Option<Result<AudioSegment, RelayError>>),
    Drained,
}

enum Transcribed {
    Cancelled,
    Done(Result<String, RelayError>),
}

impl ChunkedTranscriptionPipeline {
    pub fn new(
        controller: Arc<ResilientStreamController>,
        transcriber: Arc<dyn Transcriber>,
        segmenter: Arc<dyn AudioSegmenter>,
        settings: PipelineSettings,
    ) -> Self {
        let locks = Arc::clone(controller.state().processing_locks());
        Self { controller, transcriber, segmenter, locks, settings }
    }

    /// HTTP transcriber and ffmpeg segmenter, sharing the relay's client and lock table.
    pub fn from_state(state: Arc<ServiceState>, config: &TranscriptionConfig) -> Self {
        let transcriber = HttpTranscriber::new(state.http().clone(), config);
        let controller = Arc::new(ResilientStreamController::new(state));
        Self::new(
            controller,
            Arc::new(transcriber),
            Arc::new(FfmpegSegmenter::from_config(config)),
            PipelineSettings::from_config(config),
        )
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn process(&self, input: AudioInput, identity: impl Into<String>) -> PipelineStream {
        self.process_with_cancel(input, identity, CancellationToken::new())
    }

    /// Transcribe `input` and stream the summary.
    ///
    /// At most one job per `identity` runs at a time; a duplicate gets a
    /// single status event. The lock and scratch files are released however
    /// the stream ends. A stream dropped mid-job releases the lock at once and
    /// leaves scratch removal to a background task.
    pub fn process_with_cancel(
        &self,
        input: AudioInput,
        identity: impl Into<String>,
        cancel: CancellationToken,
    ) -> PipelineStream {
        let identity = identity.into();
        let controller = Arc::clone(&self.controller);
        let transcriber = Arc::clone(&self.transcriber);
        let segmenter = Arc::clone(&self.segmenter);
        let locks = Arc::clone(&self.locks);
        let settings = self.settings.clone();

        let stream = async_stream::stream! {
            let mut input = input;
            let _guard = match locks.try_acquire(&identity) {
                Ok(guard) => guard,
                Err(err) => {
                    yield PipelineEvent::Status(err.to_string());
                    return;
                },
            };

            info!(identity = %identity, size = input.size, "Processing audio");
            yield PipelineEvent::Status(STATUS_PROCESSING.to_string());

            let prompt = if !AudioProcessor::needs_segmentation(input.size, settings.max_file_size) {
                let mut data = Vec::with_capacity(input.size as usize);
                if let Err(e) = input.reader.read_to_end(&mut data).await {
                    yield PipelineEvent::Error(RelayError::Transcription { message: e.to_string() }.to_string());
                    return;
                }
                let payload = AudioPayload {
                    mime_type: AudioProcessor::detect_mime_type(&input.file_name, &data).to_string(),
                    file_name: input.file_name.clone(),
                    bytes: data.into(),
                };

                let outcome = tokio::select! {
                    () = cancel.cancelled() => Transcribed::Cancelled,
                    result = transcribe_with_retry(transcriber.as_ref(), payload, &settings.retry_backoff) => Transcribed::Done(result),
                };
                let text = match outcome {
                    Transcribed::Cancelled => {
                        yield PipelineEvent::Error(RelayError::Cancelled.to_string());
                        return;
                    },
                    Transcribed::Done(Err(e)) => {
                        error!(identity = %identity, error = %e, "Transcription failed");
                        yield PipelineEvent::Error(e.to_string());
                        return;
                    },
                    Transcribed::Done(Ok(text)) => text,
                };
                if text.trim().is_empty() {
                    warn!(identity = %identity, "Transcription returned no text");
                    yield PipelineEvent::Status(STATUS_NO_SPEECH.to_string());
                    return;
                }

                yield PipelineEvent::Transcription(text.clone());
                yield PipelineEvent::Status(STATUS_ANALYZING.to_string());
                single_unit_prompt(&text)
            } else {
                yield PipelineEvent::Status(STATUS_SEGMENTING.to_string());

                let scratch = ScratchDir::new(
                    settings.temp_root.join(format!("gemini-relay-{}", Uuid::new_v4())),
                    settings.cleanup_attempts,
                    settings.cleanup_base_delay,
                );
                let mut failure: Option<RelayError> = None;
                let mut transcripts: Vec<(usize, String)> = Vec::new();

                match write_source(scratch.path(), &mut input).await {
                    Err(e) => failure = Some(e),
                    Ok(source) => {
                        let mut segments: SegmentStream =
                            segmenter.segment(source, scratch.path().join("segments"), cancel.child_token());
                        let permits = Arc::new(Semaphore::new(settings.max_concurrency.max(1)));
                        let mut tasks: JoinSet<(usize, Result<String, RelayError>)> = JoinSet::new();
                        let mut segments_done = false;
                        // A segment is only pulled once a transcription slot is free.
                        let mut slot: Option<OwnedSemaphorePermit> = None;

                        loop {
                            if segments_done && tasks.is_empty() {
                                break;
                            }

                            let step = tokio::select! {
                                biased;
                                () = cancel.cancelled() => Step::Cancelled,
                                Some(joined) = tasks.join_next() => Step::Transcribed(joined),
                                permit = Arc::clone(&permits).acquire_owned(), if !segments_done && slot.is_none() => Step::Permit(permit),
                                next = segments.next(), if !segments_done && slot.is_some() => Step::Segment(next),
                                else => Step::Drained,
                            };

                            match step {
                                Step::Cancelled => {
                                    failure = Some(RelayError::Cancelled);
                                    break;
                                },
                                Step::Transcribed(Ok((index, Ok(text)))) => {
                                    metrics::record_segment_transcribed();
                                    if text.trim().is_empty() {
                                        warn!(identity = %identity, index, "Segment produced no text");
                                        continue;
                                    }
                                    info!(identity = %identity, index, chars = text.len(), "Segment transcribed");
                                    transcripts.push((index, text.clone()));
                                    yield PipelineEvent::Transcription(text);
                                },
                                Step::Transcribed(Ok((index, Err(e)))) => {
                                    error!(identity = %identity, index, error = %e, "Segment transcription failed");
                                    failure = Some(e);
                                    break;
                                },
                                Step::Transcribed(Err(e)) => {
                                    failure = Some(RelayError::Transcription { message: e.to_string() });
                                    break;
                                },
                                Step::Permit(Ok(permit)) => slot = Some(permit),
                                Step::Permit(Err(e)) => {
                                    failure = Some(RelayError::Transcription { message: e.to_string() });
                                    break;
                                },
                                Step::Segment(Some(Ok(segment))) => {
                                    let transcriber = Arc::clone(&transcriber);
                                    let permit = slot.take();
                                    let backoff = settings.retry_backoff.clone();
                                    tasks.spawn(async move {
                                        let _permit = permit;
                                        let index = segment.index;
                                        let payload = AudioPayload {
                                            file_name: segment.file_name(),
                                            mime_type: SEGMENT_MIME.to_string(),
                                            bytes: segment.bytes,
                                        };
                                        (index, transcribe_with_retry(transcriber.as_ref(), payload, &backoff).await)
                                    });
                                },
                                Step::Segment(Some(Err(e))) => {
                                    failure = Some(e);
                                    break;
                                },
                                Step::Segment(None) => {
                                    segments_done = true;
                                    slot = None;
                                },
                                Step::Drained => break,
                            }
                        }

                        tasks.abort_all();
                        drop(segments);
                        while tasks.join_next().await.is_some() {}
                    },
                }

                if let Err(e) = scratch.remove().await {
                    warn!(identity = %identity, error = %e, "Leaving scratch directory behind");
                }

                if let Some(e) = failure {
                    yield PipelineEvent::Error(e.to_string());
                    return;
                }

                transcripts.sort_by_key(|(index, _)| *index);
                let full_text = transcripts.into_iter().map(|(_, text)| text).collect::<Vec<_>>().join("\n");
                if full_text.trim().is_empty() {
                    warn!(identity = %identity, "No segment produced text");
                    yield PipelineEvent::Status(STATUS_NO_SPEECH.to_string());
                    return;
                }

                yield PipelineEvent::Status(STATUS_SEGMENTS_DONE.to_string());
                segmented_prompt(&full_text)
            };

            let request = StreamRequest::new(prompt).with_model(settings.summary_model.clone());
            let mut analysis = controller.stream_with_cancel(request, cancel.clone());
            while let Some(fragment) = analysis.next().await {
                yield PipelineEvent::from_analysis(fragment);
            }
        };

        Box::pin(stream)
    }
}

/// Copy the upload into the job directory so the encoder can read it.
async fn write_source(job_dir: &Path, input: &mut AudioInput) -> Result<PathBuf, RelayError> {
    let io_error = |e: std::io::Error| RelayError::Segmentation { message: e.to_string() };

    tokio::fs::create_dir_all(job_dir).await.map_err(io_error)?;
    let extension = Path::new(&input.file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("bin");
    let path = job_dir.join(format!("source.{extension}"));

    let mut file = tokio::fs::File::create(&path).await.map_err(io_error)?;
    tokio::io::copy(&mut input.reader, &mut file).await.map_err(io_error)?;
    file.flush().await.map_err(io_error)?;
    Ok(path)
}

pub fn single_unit_prompt(transcript: &str) -> String {
    format!("Please summarize the following meeting content:\n\n{transcript}")
}

pub fn segmented_prompt(transcript: &str) -> String {
    format!(
        "Please write a concise summary of the following meeting. Drop filler words, \
         turn spoken phrasing into written language, and produce meeting minutes. \
         Format the output as [Concise Summary]{{content}} and [Meeting Minutes]{{content}}.\n\n{transcript}"
    )
}
