//! Exact-match response cache over a shared key-value store.

use super::config::CacheConfig;
use super::key::cache_key;
use super::pricing::CostTable;
use super::store::{KeyValueStore, StoreError};
use crate::routing::{Response, TaskType};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use switchyard_abstraction::Message;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Internal cache failures. Never surfaced to callers.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backing store failed.
    #[error("cache store error: {0}")]
    Store(#[from] StoreError),

    /// An entry could not be encoded or decoded.
    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Hit/miss counters and estimated savings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CacheMetrics {
    /// Lookups that returned an entry.
    pub hits: u64,
    /// Lookups that returned nothing.
    pub misses: u64,
    /// `hits / (hits + misses)`, or 0 before any lookup.
    pub hit_rate: f64,
    /// USD not spent thanks to hits.
    pub estimated_savings: f64,
}

// Savings are accumulated in micro-dollars so they fit an atomic.
const MICROS_PER_USD: f64 = 1_000_000.0;

/// Content-addressed response cache with TTL.
pub struct ResponseCache {
    store: Arc<dyn KeyValueStore>,
    config: CacheConfig,
    costs: CostTable,
    hits: AtomicU64,
    misses: AtomicU64,
    savings_micros: AtomicU64,
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("config", &self.config)
            .field("metrics", &self.metrics())
            .finish_non_exhaustive()
    }
}

impl ResponseCache {
    /// Creates a cache over `store`.
    pub fn new(store: Arc<dyn KeyValueStore>, config: CacheConfig) -> Self {
        let costs = config.cost_table();
        Self {
            store,
            config,
            costs,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            savings_micros: AtomicU64::new(0),
        }
    }

    /// Whether the router should consult this cache.
    pub const fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Active configuration.
    pub const fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Store key for the given request.
    pub fn key_for(&self, messages: &[Message], task_type: &TaskType, model: &str) -> String {
        cache_key(&self.config.namespace, messages, task_type, model)
    }

    /// Looks up a cached response.
    ///
    /// Store and decode failures are logged and reported as a miss. A hit comes
    /// back with `cached = true` and `latency_ms` set to the retrieval time.
    pub async fn get(&self, messages: &[Message], task_type: &TaskType, model: &str) -> Option<Response> {
        let started = Instant::now();
        let key = self.key_for(messages, task_type, model);

        match self.fetch(&key).await {
            Ok(Some(mut response)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                let saved = (self.costs.cost_for(&response.model) * MICROS_PER_USD).round() as u64;
                self.savings_micros.fetch_add(saved, Ordering::Relaxed);

                response.metadata.cached = true;
                response.metadata.latency_ms = started.elapsed().as_millis() as u64;
                debug!(key = %key, provider = %response.provider, model = %response.model, "Cache hit");
                Some(response)
            }
            Ok(None) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "Cache miss");
                None
            }
            Err(e) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                warn!(key = %key, error = %e, "Cache lookup failed, treating as miss");
                None
            }
        }
    }

    async fn fetch(&self, key: &str) -> Result<Option<Response>, CacheError> {
        match self.store.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Stores a response. Failures are logged and swallowed.
    pub async fn set(
        &self,
        messages: &[Message],
        response: &Response,
        task_type: &TaskType,
        model: &str,
        ttl: Option<Duration>,
    ) {
        let key = self.key_for(messages, task_type, model);
        let ttl = ttl.unwrap_or_else(|| self.config.default_ttl());
        match self.write(&key, response, ttl).await {
            Ok(()) => debug!(key = %key, ttl_secs = ttl.as_secs(), "Cached response"),
            Err(e) => warn!(key = %key, error = %e, "Failed to cache response"),
        }
    }

    async fn write(&self, key: &str, response: &Response, ttl: Duration) -> Result<(), CacheError> {
        let raw = serde_json::to_string(response)?;
        self.store.set_with_expiry(key, raw, ttl).await?;
        Ok(())
    }

    /// Deletes entries under `{namespace}:{pattern}`, or the whole namespace
    /// when `pattern` is `None`. Returns how many were removed.
    pub async fn invalidate(&self, pattern: Option<&str>) -> usize {
        let namespace = glob::Pattern::escape(&self.config.namespace);
        let full = format!("{namespace}:{}", pattern.unwrap_or("*"));
        match self.remove_matching(&full).await {
            Ok(count) => {
                debug!(pattern = %full, count, "Invalidated cache entries");
                count
            }
            Err(e) => {
                warn!(pattern = %full, error = %e, "Cache invalidation failed");
                0
            }
        }
    }

    async fn remove_matching(&self, pattern: &str) -> Result<usize, CacheError> {
        let keys = self.store.keys_matching(pattern).await?;
        if keys.is_empty() {
            return Ok(0);
        }
        Ok(self.store.delete(&keys).await?)
    }

    /// Current counters.
    pub fn metrics(&self) -> CacheMetrics {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheMetrics {
            hits,
            misses,
            hit_rate: if total == 0 { 0.0 } else { hits as f64 / total as f64 },
            estimated_savings: self.savings_micros.load(Ordering::Relaxed) as f64 / MICROS_PER_USD,
        }
    }
}
