//! Circuit breaker for provider failure isolation.
//!
//! Each provider name gets its own [`FailureIsolator`] holding a
//! CLOSED / OPEN / HALF_OPEN state machine. The [`CircuitBreakerRegistry`]
//! creates isolators lazily and exposes the name-keyed API the router uses.

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Error returned by [`FailureIsolator::execute`].
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The circuit is open and the operation was not invoked.
    #[error("circuit open for {provider}; retry in {}ms", .retry_in.as_millis())]
    Open {
        /// Name of the guarded service.
        provider: String,
        /// Time left before a probe is allowed.
        retry_in: Duration,
    },

    /// The operation ran and failed.
    #[error("{0}")]
    Operation(E),
}

/// Thresholds and cooldown for every circuit in a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures in CLOSED that trip the circuit.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Successes in HALF_OPEN needed to close again.
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,

    /// Seconds an open circuit waits before allowing a probe.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_success_threshold() -> u32 {
    2
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            success_threshold: default_success_threshold(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl CircuitBreakerConfig {
    /// Cooldown as a `Duration`.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validates the thresholds.
    ///
    /// # Errors
    /// Returns `ConfigError::Validation` if a threshold or the timeout is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::Validation(
                "circuit_breaker.failure_threshold must be at least 1".to_string(),
            ));
        }
        if self.success_threshold == 0 {
            return Err(ConfigError::Validation(
                "circuit_breaker.success_threshold must be at least 1".to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "circuit_breaker.timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Normal operation.
    Closed,
    /// Calls are rejected until the cooldown elapses.
    Open,
    /// Probing recovery.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Closed => "CLOSED",
            Self::Open => "OPEN",
            Self::HalfOpen => "HALF_OPEN",
        })
    }
}

/// Mutable state of one circuit.
#[derive(Debug, Clone)]
struct CircuitRecord {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure: Option<Instant>,
    next_attempt: Option<Instant>,
}

impl CircuitRecord {
    const fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure: None,
            next_attempt: None,
        }
    }

    fn retry_in(&self, now: Instant) -> Option<Duration> {
        match (self.state, self.next_attempt) {
            (CircuitState::Open, Some(at)) if now < at => Some(at - now),
            // Cooldown too long to represent: stays open until reset.
            (CircuitState::Open, None) => Some(Duration::MAX),
            _ => None,
        }
    }
}

/// Point-in-time view of one circuit, for observability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitSnapshot {
    /// Provider name.
    pub name: String,
    /// Current state.
    pub state: CircuitState,
    /// Failures counted in the current state.
    pub failure_count: u32,
    /// Successes counted while half-open.
    pub success_count: u32,
    /// Milliseconds until an open circuit admits a probe.
    pub retry_in_ms: Option<u64>,
}

/// Failure isolation state machine guarding one named service.
#[derive(Debug)]
pub struct FailureIsolator {
    name: String,
    config: CircuitBreakerConfig,
    record: Mutex<CircuitRecord>,
}

impl FailureIsolator {
    /// Creates a closed circuit.
    #[must_use]
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self { name: name.into(), config, record: Mutex::new(CircuitRecord::closed()) }
    }

    /// Name of the guarded service.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, CircuitRecord> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state without applying any pending OPEN to HALF_OPEN move.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Whether a call would currently be admitted. Does not mutate state.
    pub fn is_available(&self) -> bool {
        self.lock().retry_in(Instant::now()).is_none()
    }

    /// Admits a call or returns the remaining cooldown.
    ///
    /// An open circuit whose cooldown has elapsed moves to HALF_OPEN here,
    /// before the operation runs.
    fn admit(&self) -> Result<(), Duration> {
        let now = Instant::now();
        let mut record = self.lock();
        if let Some(wait) = record.retry_in(now) {
            return Err(wait);
        }
        if record.state == CircuitState::Open {
            record.state = CircuitState::HalfOpen;
            record.success_count = 0;
            debug!(provider = %self.name, "Circuit half-open, testing recovery");
        }
        Ok(())
    }

    /// Records a successful call.
    pub fn record_success(&self) {
        let mut record = self.lock();
        match record.state {
            CircuitState::Closed => record.failure_count = 0,
            CircuitState::HalfOpen => {
                record.success_count += 1;
                if record.success_count >= self.config.success_threshold {
                    *record = CircuitRecord { last_failure: record.last_failure, ..CircuitRecord::closed() };
                    info!(provider = %self.name, "Circuit closed, provider recovered");
                }
            }
            // A call admitted before the trip finished late.
            CircuitState::Open => {}
        }
    }

    /// Records a failed call.
    pub fn record_failure(&self) {
        let now = Instant::now();
        let mut record = self.lock();
        match record.state {
            CircuitState::Closed => {
                record.failure_count += 1;
                record.last_failure = Some(now);
                if record.failure_count >= self.config.failure_threshold {
                    self.trip(&mut record, now);
                }
            }
            CircuitState::HalfOpen => {
                record.failure_count += 1;
                record.last_failure = Some(now);
                self.trip(&mut record, now);
            }
            CircuitState::Open => record.last_failure = Some(now),
        }
    }

    fn trip(&self, record: &mut CircuitRecord, now: Instant) {
        let from = record.state;
        record.state = CircuitState::Open;
        record.success_count = 0;
        record.next_attempt = now.checked_add(self.config.timeout());
        warn!(
            provider = %self.name,
            from = %from,
            failure_count = record.failure_count,
            cooldown_secs = self.config.timeout_secs,
            "Circuit opened"
        );
    }

    /// Forces the circuit closed with all counters zeroed.
    pub fn reset(&self) {
        *self.lock() = CircuitRecord::closed();
        debug!(provider = %self.name, "Circuit reset");
    }

    /// Runs `operation` through the circuit.
    ///
    /// # Errors
    /// Returns `BreakerError::Open` without invoking the operation while the
    /// circuit is open, or `BreakerError::Operation` wrapping its error.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Err(retry_in) = self.admit() {
            let retry_in_ms = u64::try_from(retry_in.as_millis()).unwrap_or(u64::MAX);
            debug!(provider = %self.name, retry_in_ms, "Circuit open, rejecting call");
            return Err(BreakerError::Open { provider: self.name.clone(), retry_in });
        }

        match operation().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                self.record_failure();
                Err(BreakerError::Operation(e))
            }
        }
    }

    /// Point-in-time view of this circuit.
    pub fn snapshot(&self) -> CircuitSnapshot {
        let record = self.lock();
        CircuitSnapshot {
            name: self.name.clone(),
            state: record.state,
            failure_count: record.failure_count,
            success_count: record.success_count,
            retry_in_ms: record.retry_in(Instant::now()).map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
        }
    }
}

/// Lazily creates and owns one [`FailureIsolator`] per provider name.
#[derive(Debug, Default)]
pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: RwLock<HashMap<String, Arc<FailureIsolator>>>,
}

impl CircuitBreakerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self { config, breakers: RwLock::new(HashMap::new()) }
    }

    /// Settings applied to every circuit.
    pub const fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Returns the isolator for `name`, creating it on first reference.
    pub fn get(&self, name: &str) -> Arc<FailureIsolator> {
        {
            let breakers = self.breakers.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(breaker) = breakers.get(name) {
                return Arc::clone(breaker);
            }
        }

        let mut breakers = self.breakers.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(breakers.entry(name.to_string()).or_insert_with(|| {
            debug!(provider = name, "Creating circuit breaker");
            Arc::new(FailureIsolator::new(name, self.config))
        }))
    }

    /// Runs `operation` through the circuit for `name`.
    ///
    /// # Errors
    /// See [`FailureIsolator::execute`].
    pub async fn execute<T, E, F, Fut>(&self, name: &str, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.get(name).execute(operation).await
    }

    /// Whether `name` would currently admit a call.
    pub fn is_available(&self, name: &str) -> bool {
        self.get(name).is_available()
    }

    /// Forces the circuit for `name` closed.
    pub fn reset(&self, name: &str) {
        self.get(name).reset();
    }

    /// Forces every known circuit closed.
    pub fn reset_all(&self) {
        let breakers = self.breakers.read().unwrap_or_else(PoisonError::into_inner);
        for breaker in breakers.values() {
            breaker.reset();
        }
    }

    /// Snapshot of every known circuit, sorted by name.
    pub fn snapshot(&self) -> Vec<CircuitSnapshot> {
        let breakers = self.breakers.read().unwrap_or_else(PoisonError::into_inner);
        let mut snapshots: Vec<_> = breakers.values().map(|b| b.snapshot()).collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CircuitBreakerConfig {
        CircuitBreakerConfig { failure_threshold: 3, success_threshold: 2, timeout_secs: 30 }
    }

    async fn fail(isolator: &FailureIsolator) {
        let _ = isolator.execute(|| async { Err::<(), _>("boom") }).await;
    }

    async fn succeed(isolator: &FailureIsolator) -> Result<u32, BreakerError<&'static str>> {
        isolator.execute(|| async { Ok(7) }).await
    }

    #[tokio::test(start_paused = true)]
    async fn test_trips_after_threshold() {
        let isolator = FailureIsolator::new("openai", config());
        fail(&isolator).await;
        fail(&isolator).await;
        assert_eq!(isolator.state(), CircuitState::Closed);
        fail(&isolator).await;
        assert_eq!(isolator.state(), CircuitState::Open);
        assert!(!isolator.is_available());
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_failure_count() {
        let isolator = FailureIsolator::new("openai", config());
        fail(&isolator).await;
        fail(&isolator).await;
        succeed(&isolator).await.unwrap();
        fail(&isolator).await;
        fail(&isolator).await;
        assert_eq!(isolator.state(), CircuitState::Closed);
        assert_eq!(isolator.snapshot().failure_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_rejects_without_invoking() {
        let isolator = FailureIsolator::new("groq", config());
        for _ in 0..3 {
            fail(&isolator).await;
        }

        let mut invoked = false;
        let result = isolator
            .execute(|| {
                invoked = true;
                async { Ok::<_, &str>(()) }
            })
            .await;

        assert!(!invoked);
        match result {
            Err(BreakerError::Open { provider, retry_in }) => {
                assert_eq!(provider, "groq");
                assert_eq!(retry_in, Duration::from_secs(30));
            }
            other => panic!("expected open circuit, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_cooldown_stays_open_until_reset() {
        let config = CircuitBreakerConfig { failure_threshold: 1, success_threshold: 1, timeout_secs: u64::MAX };
        let isolator = FailureIsolator::new("mistral", config);
        fail(&isolator).await;
        assert_eq!(isolator.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(86_400 * 365)).await;
        let mut invoked = false;
        let result = isolator
            .execute(|| {
                invoked = true;
                async { Ok::<_, &str>(()) }
            })
            .await;
        assert!(!invoked);
        assert!(matches!(result, Err(BreakerError::Open { .. })));
        assert_eq!(isolator.snapshot().retry_in_ms, Some(u64::MAX));

        isolator.reset();
        assert_eq!(succeed(&isolator).await.unwrap(), 7);
        assert_eq!(isolator.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_then_close() {
        let isolator = FailureIsolator::new("gemini", config());
        for _ in 0..3 {
            fail(&isolator).await;
        }

        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(!isolator.is_available());
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(isolator.is_available());
        // is_available never moves the state
        assert_eq!(isolator.state(), CircuitState::Open);

        succeed(&isolator).await.unwrap();
        assert_eq!(isolator.state(), CircuitState::HalfOpen);
        assert_eq!(isolator.snapshot().success_count, 1);

        succeed(&isolator).await.unwrap();
        let snapshot = isolator.snapshot();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.failure_count, 0);
        assert_eq!(snapshot.success_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_failure_reopens() {
        let isolator = FailureIsolator::new("anthropic", config());
        for _ in 0..3 {
            fail(&isolator).await;
        }
        tokio::time::advance(Duration::from_secs(30)).await;

        succeed(&isolator).await.unwrap();
        fail(&isolator).await;

        assert_eq!(isolator.state(), CircuitState::Open);
        assert_eq!(isolator.snapshot().retry_in_ms, Some(30_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_closes_circuit() {
        let isolator = FailureIsolator::new("ollama", config());
        for _ in 0..3 {
            fail(&isolator).await;
        }
        isolator.reset();
        assert_eq!(isolator.state(), CircuitState::Closed);
        assert_eq!(succeed(&isolator).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_registry_is_lazy_and_sorted() {
        let registry = CircuitBreakerRegistry::new(config());
        assert!(registry.snapshot().is_empty());

        assert!(registry.is_available("openai"));
        let _ = registry.execute("anthropic", || async { Err::<(), _>("down") }).await;

        let names: Vec<_> = registry.snapshot().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["anthropic", "openai"]);
        assert!(Arc::ptr_eq(&registry.get("openai"), &registry.get("openai")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_registry_reset_all() {
        let registry = CircuitBreakerRegistry::new(config());
        for _ in 0..3 {
            let _ = registry.execute("a", || async { Err::<(), _>("x") }).await;
            let _ = registry.execute("b", || async { Err::<(), _>("x") }).await;
        }
        assert!(!registry.is_available("a"));
        registry.reset_all();
        assert!(registry.is_available("a"));
        assert!(registry.is_available("b"));
    }

    #[test]
    fn test_config_validation() {
        assert!(CircuitBreakerConfig::default().validate().is_ok());
        let zero = CircuitBreakerConfig { failure_threshold: 0, ..CircuitBreakerConfig::default() };
        assert!(zero.validate().is_err());
        let no_cooldown = CircuitBreakerConfig { timeout_secs: 0, ..CircuitBreakerConfig::default() };
        assert!(no_cooldown.validate().is_err());
    }

    #[test]
    fn test_breaker_error_display() {
        let err: BreakerError<String> =
            BreakerError::Open { provider: "openai".into(), retry_in: Duration::from_millis(1500) };
        assert_eq!(err.to_string(), "circuit open for openai; retry in 1500ms");
    }
}
