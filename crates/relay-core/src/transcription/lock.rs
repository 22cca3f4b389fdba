//! Per-file exclusivity for the transcription pipeline.
//!
//! Acquisition never waits: a second submission of the same identity fails
//! immediately. The guard releases on drop, so early returns, errors and
//! cancelled streams all free the slot.

use std::sync::Arc;
use std::time::Instant;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use gemini_relay_types::RelayError;

#[derive(Debug, Default)]
pub struct ProcessingLocks {
    held: Arc<DashMap<String, Instant>>,
}

impl ProcessingLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self, identity: &str) -> Result<ProcessingGuard, RelayError> {
        match self.held.entry(identity.to_string()) {
            Entry::Occupied(_) => {
                tracing::warn!(identity, "File is already being processed");
                Err(RelayError::ProcessingConflict { identity: identity.to_string() })
            },
            Entry::Vacant(slot) => {
                slot.insert(Instant::now());
                Ok(ProcessingGuard { held: Arc::clone(&self.held), identity: identity.to_string() })
            },
        }
    }

    pub fn is_held(&self, identity: &str) -> bool {
        self.held.contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }
}

/// Holds one identity until dropped.
#[derive(Debug)]
pub struct ProcessingGuard {
    held: Arc<DashMap<String, Instant>>,
    identity: String,
}

impl ProcessingGuard {
    pub fn identity(&self) -> &str {
        &self.identity
    }
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        if let Some((_, since)) = self.held.remove(&self.identity) {
            tracing::debug!(
                identity = %self.identity,
                held_ms = since.elapsed().as_millis() as u64,
                "Released processing lock"
            );
        }
    }
}
