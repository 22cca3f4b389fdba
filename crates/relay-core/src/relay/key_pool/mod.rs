//! Two-tier API key rotation.
//!
//! Premium keys are used first. Once every premium key has failed within a
//! request the controller demotes the pool and only regular keys are handed
//! out from then on. Cursor and tier live under one mutex so `advance` and
//! `demote` are atomic with respect to `current`.

use std::fmt;
use std::sync::Arc;

use gemini_relay_types::ConfigError;
use parking_lot::Mutex;

use crate::relay::common::mask_secret;


/// Credential tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyTier {
    Premium,
    Regular,
}

impl KeyTier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Premium => "premium",
            Self::Regular => "regular",
        }
    }
}

impl fmt::Display for KeyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An API key plus its position in the pool.
///
/// `Debug` and `Display` only ever show a masked prefix.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    secret: Arc<str>,
    tier: KeyTier,
    index: usize,
}

impl Credential {
    /// Raw key for building the upstream request.
    pub fn expose(&self) -> &str {
        &self.secret
    }

    pub fn tier(&self) -> KeyTier {
        self.tier
    }

    /// Position inside its tier.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn masked(&self) -> String {
        mask_secret(&self.secret)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("secret", &self.masked())
            .field("tier", &self.tier)
            .field("index", &self.index)
            .finish()
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} key #{} ({})", self.tier, self.index, self.masked())
    }
}

struct Cursor {
    tier: KeyTier,
    position: usize,
}

pub struct KeyPool {
    premium: Vec<Arc<str>>,
    regular: Vec<Arc<str>>,
    cursor: Mutex<Cursor>,
}

impl KeyPool {
    /// Build a pool; blank keys are dropped and at least one key must remain.
    pub fn new(premium: Vec<String>, regular: Vec<String>) -> Result<Self, ConfigError> {
        let clean = |keys: Vec<String>| -> Vec<Arc<str>> {
            keys.into_iter()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .map(Arc::from)
                .collect()
        };
        let premium = clean(premium);
        let regular = clean(regular);

        if premium.is_empty() && regular.is_empty() {
            return Err(ConfigError::NoCredentials);
        }

        let tier = if premium.is_empty() { KeyTier::Regular } else { KeyTier::Premium };
        tracing::info!(
            premium = premium.len(),
            regular = regular.len(),
            tier = %tier,
            "Key pool initialized"
        );

        Ok(Self { premium, regular, cursor: Mutex::new(Cursor { tier, position: 0 }) })
    }

    fn keys(&self, tier: KeyTier) -> &[Arc<str>] {
        match tier {
            KeyTier::Premium => &self.premium,
            KeyTier::Regular => &self.regular,
        }
    }

    fn credential_at(&self, cursor: &Cursor) -> Credential {
        let keys = self.keys(cursor.tier);
        let index = cursor.position % keys.len();
        Credential { secret: Arc::clone(&keys[index]), tier: cursor.tier, index }
    }

    /// Key under the cursor.
    pub fn current(&self) -> Credential {
        let cursor = self.cursor.lock();
        self.credential_at(&cursor)
    }

    /// Move the cursor forward, wrapping within the active tier.
    pub fn advance(&self) -> Credential {
        let mut cursor = self.cursor.lock();
        let len = self.keys(cursor.tier).len();
        cursor.position = (cursor.position + 1) % len;
        self.credential_at(&cursor)
    }

    pub fn tier(&self) -> KeyTier {
        self.cursor.lock().tier
    }

    /// Switch from premium to regular and reset the cursor.
    ///
    /// Returns `false` when there is nothing to demote to: the pool is
    /// already regular, or no regular keys are configured.
    pub fn demote(&self) -> bool {
        let mut cursor = self.cursor.lock();
        if cursor.tier == KeyTier::Regular || self.regular.is_empty() {
            return false;
        }
        cursor.tier = KeyTier::Regular;
        cursor.position = 0;
        tracing::warn!("Premium keys exhausted, demoted to regular tier");
        true
    }

    /// Number of keys in the active tier.
    pub fn active_len(&self) -> usize {
        let cursor = self.cursor.lock();
        self.keys(cursor.tier).len()
    }

    /// Cursor position inside the active tier.
    pub fn position(&self) -> usize {
        self.cursor.lock().position
    }
}

impl fmt::Debug for KeyPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPool")
            .field("premium", &self.premium.len())
            .field("regular", &self.regular.len())
            .field("tier", &self.tier())
            .finish()
    }
}
