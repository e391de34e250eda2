//! Shared key-value store abstraction and an in-process implementation.

use async_trait::async_trait;
use glob::Pattern;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Errors raised by a key-value store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A key pattern could not be compiled.
    #[error("invalid key pattern '{pattern}': {message}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Why it was rejected.
        message: String,
    },

    /// `increment` hit a value that is not an integer.
    #[error("value at '{0}' is not an integer")]
    NotAnInteger(String),
}

/// Minimal atomic operations the response cache needs from a shared store.
///
/// Patterns follow Redis `KEYS` syntax: `*`, `?` and `[...]`.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads a value. Expired keys read as absent.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Writes a value that expires after `ttl`.
    async fn set_with_expiry(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError>;

    /// Deletes keys, returning how many existed.
    async fn delete(&self, keys: &[String]) -> Result<usize, StoreError>;

    /// Lists live keys matching `pattern`.
    async fn keys_matching(&self, pattern: &str) -> Result<Vec<String>, StoreError>;

    /// Atomically increments an integer counter, creating it at 1.
    async fn increment(&self, key: &str) -> Result<i64, StoreError>;
}

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// In-process store. Expired entries are dropped lazily on access.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: Mutex<HashMap<String, StoredValue>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, StoredValue>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock().values().filter(|v| v.is_live(now)).count()
    }

    /// Whether the store has no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn compile(pattern: &str) -> Result<Pattern, StoreError> {
    Pattern::new(pattern).map_err(|e| StoreError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.msg.to_string(),
    })
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        let mut entries = self.lock();
        match entries.get(key) {
            Some(stored) if stored.is_live(now) => Ok(Some(stored.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_with_expiry(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
        // A TTL past the clock's range never expires.
        let expires_at = Instant::now().checked_add(ttl);
        self.lock().insert(key.to_string(), StoredValue { value, expires_at });
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<usize, StoreError> {
        let now = Instant::now();
        let mut entries = self.lock();
        Ok(keys
            .iter()
            .filter_map(|key| entries.remove(key))
            .filter(|stored| stored.is_live(now))
            .count())
    }

    async fn keys_matching(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let pattern = compile(pattern)?;
        let now = Instant::now();
        let mut entries = self.lock();
        entries.retain(|_, stored| stored.is_live(now));
        let mut keys: Vec<String> = entries.keys().filter(|k| pattern.matches(k)).cloned().collect();
        keys.sort();
        Ok(keys)
    }

    async fn increment(&self, key: &str) -> Result<i64, StoreError> {
        let now = Instant::now();
        let mut entries = self.lock();
        let current = match entries.get(key) {
            Some(stored) if stored.is_live(now) => stored
                .value
                .parse::<i64>()
                .map_err(|_| StoreError::NotAnInteger(key.to_string()))?,
            _ => 0,
        };
        let next = current.saturating_add(1);
        let expires_at = entries.get(key).filter(|s| s.is_live(now)).and_then(|s| s.expires_at);
        entries.insert(key.to_string(), StoredValue { value: next.to_string(), expires_at });
        Ok(next)
    }
}
