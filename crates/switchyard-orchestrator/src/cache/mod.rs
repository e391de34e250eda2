//! Response caching.
//!
//! Exact-match only: a key is a SHA-256 over the normalised conversation,
//! task type and model, stored under a readable prefix so whole task types or
//! models can be invalidated by pattern.

#[allow(clippy::module_inception)]
pub mod cache;
pub mod config;
pub mod key;
pub mod pricing;
pub mod store;

pub use cache::{CacheError, CacheMetrics, ResponseCache};
pub use config::CacheConfig;
pub use key::cache_key;
pub use pricing::CostTable;
pub use store::{InMemoryStore, KeyValueStore, StoreError};
