//! Collaborator interfaces for errors, events and usage, with default implementations.

use crate::error::RouterError;
use crate::routing::TaskType;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};
use switchyard_abstraction::{ProviderKind, TokenUsage};
use tracing::{debug, error, info};

/// Receives routing failures that reached the caller.
pub trait ErrorSink: Send + Sync {
    /// Reports `error` with structured context (task type, failure list).
    fn report_error(&self, error: &RouterError, context: serde_json::Value);
}

/// Receives named routing events.
pub trait EventSink: Send + Sync {
    /// Reports an event such as `completion.succeeded`.
    fn report_event(&self, name: &str, payload: serde_json::Value);
}

/// Receives one record per terminal routing attempt. Fire-and-forget.
pub trait UsageSink: Send + Sync {
    /// Records a success or an exhausted request.
    fn record_usage(&self, record: UsageRecord);
}

/// Usage of one terminal routing attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageRecord {
    /// Provider that answered, or the last one tried.
    pub provider: ProviderKind,
    /// Model that answered, or the last one tried.
    pub model: String,
    /// Task type of the request.
    pub task_type: TaskType,
    /// Tokens consumed. Zero for exhausted requests.
    pub tokens: TokenUsage,
    /// End-to-end latency.
    pub latency_ms: u64,
    /// Whether a response was produced.
    pub success: bool,
}

/// Default sink that writes everything to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn report_error(&self, err: &RouterError, context: serde_json::Value) {
        error!(error = %err, context = %context, "Routing failed");
    }
}

impl EventSink for TracingSink {
    fn report_event(&self, name: &str, payload: serde_json::Value) {
        info!(event = name, payload = %payload, "Routing event");
    }
}

impl UsageSink for TracingSink {
    fn record_usage(&self, record: UsageRecord) {
        debug!(
            provider = %record.provider,
            model = %record.model,
            task_type = %record.task_type,
            total_tokens = record.tokens.total_tokens,
            latency_ms = record.latency_ms,
            success = record.success,
            "Recorded usage"
        );
    }
}

/// Aggregated usage for one provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProviderUsage {
    /// Successful requests.
    pub request_count: u64,
    /// Exhausted requests attributed to this provider.
    pub failure_count: u64,
    /// Total input tokens.
    pub input_tokens: u64,
    /// Total output tokens.
    pub output_tokens: u64,
    /// Sum of latencies, for averaging.
    pub total_latency_ms: u64,
    /// Estimated cost in USD.
    pub estimated_cost: f64,
}

impl ProviderUsage {
    /// Mean latency over successful requests.
    pub fn average_latency_ms(&self) -> f64 {
        if self.request_count == 0 { 0.0 } else { self.total_latency_ms as f64 / self.request_count as f64 }
    }
}

/// Usage across all providers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UsageMetrics {
    /// Per-provider totals.
    pub providers: BTreeMap<ProviderKind, ProviderUsage>,
    /// Total cost across providers.
    pub total_cost: f64,
    /// Total tokens across providers.
    pub total_tokens: u64,
}

type PricingFn = Box<dyn Fn(&str) -> (f64, f64) + Send + Sync>;

/// In-memory per-provider usage and cost aggregate.
pub struct UsageTracker {
    metrics: RwLock<BTreeMap<ProviderKind, ProviderUsage>>,
    /// Model id to (input, output) USD per 1M tokens.
    pricing_fn: PricingFn,
}

impl UsageTracker {
    /// Creates a tracker with default pricing.
    #[must_use]
    pub fn new() -> Self {
        Self::with_pricing(Box::new(Self::default_pricing))
    }

    /// Creates a tracker with a custom pricing function.
    ///
    /// # Arguments
    /// * `pricing_fn` - Function that takes a model id and returns (input_price_per_1m, output_price_per_1m)
    #[must_use]
    pub fn with_pricing(pricing_fn: PricingFn) -> Self {
        Self { metrics: RwLock::new(BTreeMap::new()), pricing_fn }
    }

    /// Default pricing lookup based on model id patterns (per 1M tokens).
    fn default_pricing(model: &str) -> (f64, f64) {
        let lower = model.to_lowercase();

        if lower.contains("haiku") || lower.contains("mini") || lower.contains("flash") || lower.contains("instant") {
            return (0.25, 1.25);
        }

        if lower.contains("sonnet") || lower.contains("gpt-4") || lower.contains("pro") || lower.contains("70b") {
            return (3.0, 15.0);
        }

        if lower.contains("llama") || lower.contains("mock") {
            return (0.0, 0.0);
        }

        (1.0, 2.0)
    }

    /// Current aggregate.
    pub fn metrics(&self) -> UsageMetrics {
        let metrics = self.metrics.read().unwrap_or_else(PoisonError::into_inner);
        let total_cost = metrics.values().map(|m| m.estimated_cost).sum();
        let total_tokens = metrics.values().map(|m| m.input_tokens + m.output_tokens).sum();
        UsageMetrics { providers: metrics.clone(), total_cost, total_tokens }
    }

    /// Resets all metrics to zero.
    pub fn reset(&self) {
        self.metrics.write().unwrap_or_else(PoisonError::into_inner).clear();
        debug!("Reset usage metrics");
    }
}

impl Default for UsageTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for UsageTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageTracker").field("metrics", &self.metrics()).finish_non_exhaustive()
    }
}

impl UsageSink for UsageTracker {
    fn record_usage(&self, record: UsageRecord) {
        let (input_price, output_price) = (self.pricing_fn)(&record.model);
        let input_tokens = u64::from(record.tokens.prompt_tokens);
        let output_tokens = u64::from(record.tokens.completion_tokens);
        let cost = (input_tokens as f64 / 1_000_000.0) * input_price
            + (output_tokens as f64 / 1_000_000.0) * output_price;

        let mut metrics = self.metrics.write().unwrap_or_else(PoisonError::into_inner);
        let usage = metrics.entry(record.provider).or_default();
        if record.success {
            usage.request_count += 1;
            usage.total_latency_ms += record.latency_ms;
        } else {
            usage.failure_count += 1;
        }
        usage.input_tokens += input_tokens;
        usage.output_tokens += output_tokens;
        usage.estimated_cost += cost;

        debug!(
            provider = %record.provider,
            model = %record.model,
            input_tokens,
            output_tokens,
            cost,
            total_cost = usage.estimated_cost,
            "Tracked usage"
        );
    }
}
