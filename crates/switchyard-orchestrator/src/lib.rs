//! Resilient request routing for Switchyard.
//!
//! This crate sits between callers and a set of unreliable text-generation
//! providers. A request carries a task type; the [`routing::RoutingTable`]
//! maps it to an ordered list of provider/model candidates, and the
//! [`RoutingOrchestrator`] works through them:
//!
//! 1. look the request up in the [`ResponseCache`];
//! 2. on a miss, try each candidate through its [`FailureIsolator`];
//! 3. return the first success, writing it to the cache;
//! 4. if every candidate fails, return a [`RouterError::AllProvidersFailed`]
//!    listing one failure per candidate.
//!
//! [`BatchExecutor`] fans many requests out over one orchestrator with bounded
//! concurrency.

pub mod batch_executor;
pub mod cache;
pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod routing;
pub mod sinks;

pub use batch_executor::{BatchExecutor, DEFAULT_BATCH_CONCURRENCY};
pub use cache::{CacheConfig, CacheMetrics, InMemoryStore, KeyValueStore, ResponseCache};
pub use circuit_breaker::{
    BreakerError, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitSnapshot, CircuitState,
    FailureIsolator,
};
pub use config::{ConfigError, ConfigLoader, SwitchyardConfig};
pub use error::{ProvidersExhausted, RouterError};
pub use routing::{
    Candidate, CandidateFailure, CompletionOptions, CompletionRequest, FailureKind, FailureReason,
    ProviderRegistry, Response, ResponseMetadata, RouterContext, RoutingOrchestrator, RoutingTable,
    TaskType,
};
pub use sinks::{ErrorSink, EventSink, TracingSink, UsageRecord, UsageSink, UsageTracker};
