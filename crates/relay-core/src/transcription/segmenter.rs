//! Audio splitting into fixed-length opus segments.
//!
//! The encoder runs as a child process and writes `output_NNN.opus` files
//! into a scratch directory. Segments are discovered by polling that
//! directory; a file is handed out only once it is non-empty and the encoder
//! has either started a later segment or exited.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::OnceLock;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::BoxStream;
use gemini_relay_types::{RelayError, TranscriptionConfig};
use regex::Regex;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::relay::retry::linear_delay;

pub const SEGMENT_READ_ATTEMPTS: usize = 3;

/// One encoded segment, fully read into memory.
#[derive(Debug, Clone)]
pub struct AudioSegment {
    pub index: usize,
    pub path: PathBuf,
    pub bytes: Bytes,
}

impl AudioSegment {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map_or_else(|| format!("output_{:03}.opus", self.index), |n| n.to_string_lossy().into_owned())
    }
}

pub type SegmentStream = BoxStream<'static, Result<AudioSegment, RelayError>>;

pub trait AudioSegmenter: Send + Sync {
    /// Split `source` into segments written under `out_dir`.
    ///
    /// Segments are yielded in index order as they become complete. The
    /// stream ends after the last segment, or with an error. Dropping the
    /// stream stops the encoder.
    fn segment(&self, source: PathBuf, out_dir: PathBuf, cancel: CancellationToken) -> SegmentStream;
}

#[derive(Debug, Clone)]
pub struct FfmpegSegmenter {
    program: String,
    segment_seconds: u64,
    bitrate: String,
    poll_interval: Duration,
    read_retry_base: Duration,
}

impl FfmpegSegmenter {
    pub fn from_config(config: &TranscriptionConfig) -> Self {
        Self {
            program: config.ffmpeg_path.clone(),
            segment_seconds: config.segment_seconds,
            bitrate: config.bitrate.clone(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            read_retry_base: Duration::from_secs(1),
        }
    }

    pub fn build_args(&self, source: &Path, out_dir: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-y", "-i"]
            .into_iter()
            .map(OsString::from)
            .collect();
        args.push(source.as_os_str().to_owned());
        args.extend(
            [
                "-c:a".to_string(),
                "libopus".to_string(),
                "-b:a".to_string(),
                self.bitrate.clone(),
                "-f".to_string(),
                "segment".to_string(),
                "-segment_time".to_string(),
                self.segment_seconds.to_string(),
                "-reset_timestamps".to_string(),
                "1".to_string(),
            ]
            .into_iter()
            .map(OsString::from),
        );
        args.push(out_dir.join("output_%03d.opus").into_os_string());
        args
    }

    fn spawn(&self, source: &Path, out_dir: &Path) -> Result<Child, RelayError> {
        Command::new(&self.program)
            .args(self.build_args(source, out_dir))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RelayError::Segmentation {
                message: format!("failed to start {}: {}", self.program, e),
            })
    }
}

enum Tick {
    Cancelled,
    Elapsed,
}

impl AudioSegmenter for FfmpegSegmenter {
    fn segment(&self, source: PathBuf, out_dir: PathBuf, cancel: CancellationToken) -> SegmentStream {
        let this = self.clone();

        let stream = async_stream::try_stream! {
            tokio::fs::create_dir_all(&out_dir).await.map_err(|e| RelayError::Segmentation {
                message: format!("cannot create {}: {}", out_dir.display(), e),
            })?;

            let mut child = this.spawn(&source, &out_dir)?;
            info!(source = %source.display(), "Started audio segmentation");

            let mut next_index = 0usize;
            let mut exit: Option<ExitStatus> = None;

            loop {
                // Observe exit before listing so a finished encoder never hides its last file.
                if exit.is_none() {
                    exit = child.try_wait().map_err(|e| RelayError::Segmentation {
                        message: format!("cannot poll encoder: {e}"),
                    })?;
                }

                let present = list_segments(&out_dir).await?;
                let newest = present.last().map(|(index, _)| *index);

                for (index, path) in present {
                    if index < next_index {
                        continue;
                    }
                    let superseded = newest.is_some_and(|n| n > index);
                    if !(superseded || exit.is_some()) {
                        break;
                    }
                    let bytes = read_segment(&path, this.read_retry_base).await?;
                    debug!(index, size = bytes.len(), "Segment ready");
                    next_index = index + 1;
                    yield AudioSegment { index, path, bytes };
                }

                if let Some(status) = exit {
                    if !status.success() {
                        Err::<(), _>(RelayError::Segmentation {
                            message: format!("encoder exited with {status}"),
                        })?;
                    }
                    info!(segments = next_index, "Audio segmentation finished");
                    break;
                }

                let tick = tokio::select! {
                    () = cancel.cancelled() => Tick::Cancelled,
                    () = tokio::time::sleep(this.poll_interval) => Tick::Elapsed,
                };
                if let Tick::Cancelled = tick {
                    if let Err(e) = child.kill().await {
                        warn!(error = %e, "Failed to stop encoder");
                    }
                    Err::<(), _>(RelayError::Cancelled)?;
                }
            }
        };

        Box::pin(stream)
    }
}

fn segment_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^output_(\d{3,})\.opus$").expect("Segment name regex is valid"))
}

/// Segment files in `dir`, sorted by index.
async fn list_segments(dir: &Path) -> Result<Vec<(usize, PathBuf)>, RelayError> {
    let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| RelayError::Segmentation {
        message: format!("cannot list {}: {}", dir.display(), e),
    })?;

    let mut found = Vec::new();
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                return Err(RelayError::Segmentation {
                    message: format!("cannot list {}: {}", dir.display(), e),
                })
            },
        };
        let name = entry.file_name();
        let Some(captures) = name.to_str().and_then(|n| segment_name_pattern().captures(n)) else {
            continue;
        };
        if let Ok(index) = captures[1].parse::<usize>() {
            found.push((index, entry.path()));
        }
    }
    found.sort_by_key(|(index, _)| *index);
    Ok(found)
}

/// Read a finished segment; an empty or unreadable file is retried.
async fn read_segment(path: &Path, base: Duration) -> Result<Bytes, RelayError> {
    let mut last_error = String::new();
    for attempt in 0..SEGMENT_READ_ATTEMPTS {
        match tokio::fs::read(path).await {
            Ok(data) if !data.is_empty() => return Ok(Bytes::from(data)),
            Ok(_) => last_error = "segment is empty".to_string(),
            Err(e) => last_error = e.to_string(),
        }
        if attempt + 1 < SEGMENT_READ_ATTEMPTS {
            tokio::time::sleep(linear_delay(base, attempt)).await;
        }
    }
    Err(RelayError::Segmentation {
        message: format!("cannot read {}: {}", path.display(), last_error),
    })
}
