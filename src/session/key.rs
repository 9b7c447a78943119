//! Session key type.

use std::borrow::Borrow;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for generated keys.
static COUNTER: AtomicU64 = AtomicU64::new(1);

const DEFAULT_KEY: &str = "default";

/// Identifies one logical script conversation.
///
/// Keys are opaque strings chosen by the caller, so the same key can be
/// reused across process runs. [`SessionKey::generate`] hands out unique
/// `sess-XXXXXXXX` keys for callers that do not have one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionKey(String);

impl SessionKey {
    /// Create a key from any string.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The key used when the caller does not name a session.
    pub fn default_key() -> Self {
        Self(DEFAULT_KEY.to_string())
    }

    /// Create a new key that is unique within this process.
    pub fn generate() -> Self {
        Self(format!("sess-{:08x}", COUNTER.fetch_add(1, Ordering::Relaxed)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_KEY
    }
}

impl Default for SessionKey {
    fn default() -> Self {
        Self::default_key()
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SessionKey {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for SessionKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for SessionKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl Borrow<str> for SessionKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}
