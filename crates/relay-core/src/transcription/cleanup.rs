//! Scratch directory removal with linear backoff.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use gemini_relay_types::RelayError;
use tracing::{debug, warn};

use crate::relay::retry::linear_delay;

pub const CLEANUP_ATTEMPTS: usize = 5;
pub const CLEANUP_BASE_DELAY: Duration = Duration::from_secs(2);

/// Remove `path` recursively, retrying `attempts` times with `base * n` waits.
///
/// A directory that is already gone counts as removed.
pub async fn remove_dir_with_retry(
    path: &Path,
    attempts: usize,
    base: Duration,
) -> Result<(), RelayError> {
    let attempts = attempts.max(1);
    let mut last_error = String::new();

    for attempt in 0..attempts {
        match tokio::fs::remove_dir_all(path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Removed scratch directory");
                return Ok(());
            },
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                last_error = e.to_string();
                if attempt + 1 < attempts {
                    let delay = linear_delay(base, attempt);
                    warn!(
                        path = %path.display(),
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Cleanup failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            },
        }
    }

    Err(RelayError::Cleanup { path: path.display().to_string(), message: last_error })
}

/// Job scratch directory that is removed when the guard goes away.
///
/// [`ScratchDir::remove`] deletes it in place; a guard dropped without that
/// call hands the removal to the runtime, or deletes synchronously outside one.
pub struct ScratchDir {
    path: PathBuf,
    attempts: usize,
    base: Duration,
    armed: bool,
}

impl ScratchDir {
    pub fn new(path: PathBuf, attempts: usize, base: Duration) -> Self {
        Self { path, attempts, base, armed: true }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn remove(mut self) -> Result<(), RelayError> {
        self.armed = false;
        remove_dir_with_retry(&self.path, self.attempts, self.base).await
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let path = std::mem::take(&mut self.path);
        let (attempts, base) = (self.attempts, self.base);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = remove_dir_with_retry(&path, attempts, base).await {
                        warn!(error = %e, "Leaving abandoned scratch directory behind");
                    }
                });
            },
            Err(_) => match std::fs::remove_dir_all(&path) {
                Ok(()) => {},
                Err(e) if e.kind() == ErrorKind::NotFound => {},
                Err(e) => warn!(path = %path.display(), error = %e, "Leaving abandoned scratch directory behind"),
            },
        }
    }
}
