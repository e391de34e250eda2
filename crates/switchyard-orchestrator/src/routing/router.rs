//! Routing orchestrator: cache lookup, ordered failover and circuit gating.

use super::table::{Candidate, RoutingTable, TaskType};
use super::types::{
    CandidateFailure, CompletionOptions, CompletionRequest, FailureReason, Response, ResponseMetadata,
};
use crate::cache::{CacheConfig, InMemoryStore, ResponseCache};
use crate::circuit_breaker::{BreakerError, CircuitBreakerConfig, CircuitBreakerRegistry};
use crate::error::{ProvidersExhausted, RouterError};
use crate::sinks::{ErrorSink, EventSink, TracingSink, UsageRecord, UsageSink};
use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use switchyard_abstraction::{Message, ProviderClient, ProviderError, ProviderKind, TokenUsage};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Shared collaborators injected into the orchestrator.
#[derive(Clone)]
pub struct RouterContext {
    /// Per-provider circuit breakers.
    pub breakers: Arc<CircuitBreakerRegistry>,
    /// Response cache.
    pub cache: Arc<ResponseCache>,
    /// Receives exhausted requests.
    pub errors: Arc<dyn ErrorSink>,
    /// Receives success events.
    pub events: Arc<dyn EventSink>,
    /// Receives one usage record per terminal attempt.
    pub usage: Arc<dyn UsageSink>,
}

impl RouterContext {
    /// Context with tracing sinks.
    pub fn new(breakers: Arc<CircuitBreakerRegistry>, cache: Arc<ResponseCache>) -> Self {
        let sink = Arc::new(TracingSink);
        Self { breakers, cache, errors: sink.clone(), events: sink.clone(), usage: sink }
    }

    /// Context with fresh registries, an in-memory cache store and tracing sinks.
    pub fn in_memory(breaker_config: CircuitBreakerConfig, cache_config: CacheConfig) -> Self {
        Self::new(
            Arc::new(CircuitBreakerRegistry::new(breaker_config)),
            Arc::new(ResponseCache::new(Arc::new(InMemoryStore::new()), cache_config)),
        )
    }

    #[must_use]
    pub fn with_error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.errors = sink;
        self
    }

    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    #[must_use]
    pub fn with_usage_sink(mut self, sink: Arc<dyn UsageSink>) -> Self {
        self.usage = sink;
        self
    }
}

impl Default for RouterContext {
    fn default() -> Self {
        Self::in_memory(CircuitBreakerConfig::default(), CacheConfig::default())
    }
}

/// One client per provider kind.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    clients: HashMap<ProviderKind, Arc<dyn ProviderClient>>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `client` under its own kind, replacing any previous one.
    pub fn register(&mut self, client: Arc<dyn ProviderClient>) {
        debug!(provider = %client.kind(), "Registering provider client");
        self.clients.insert(client.kind(), client);
    }

    /// Builder form of [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, client: Arc<dyn ProviderClient>) -> Self {
        self.register(client);
        self
    }

    /// Client for `kind`, if registered.
    pub fn get(&self, kind: ProviderKind) -> Option<&Arc<dyn ProviderClient>> {
        self.clients.get(&kind)
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<ProviderKind> {
        let mut kinds: Vec<_> = self.clients.keys().copied().collect();
        kinds.sort();
        kinds
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl FromIterator<Arc<dyn ProviderClient>> for ProviderRegistry {
    fn from_iter<I: IntoIterator<Item = Arc<dyn ProviderClient>>>(iter: I) -> Self {
        let mut registry = Self::new();
        for client in iter {
            registry.register(client);
        }
        registry
    }
}

/// Routes task-typed requests across providers with caching and failover.
///
/// Candidates are tried strictly in table order, one at a time. A candidate
/// is skipped when its circuit is open and counts as a fallback attempt.
pub struct RoutingOrchestrator {
    table: RoutingTable,
    providers: ProviderRegistry,
    ctx: RouterContext,
}

impl RoutingOrchestrator {
    /// Creates an orchestrator.
    ///
    /// # Arguments
    /// * `table` - Task type to ordered candidates
    /// * `providers` - Clients, one per provider kind
    /// * `ctx` - Circuit breakers, cache and sinks
    pub fn new(table: RoutingTable, providers: ProviderRegistry, ctx: RouterContext) -> Self {
        Self { table, providers, ctx }
    }

    pub const fn table(&self) -> &RoutingTable {
        &self.table
    }

    pub const fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    pub const fn context(&self) -> &RouterContext {
        &self.ctx
    }

    /// Candidate list for `request`: the forced pair if both halves are set,
    /// otherwise the table entry (or the `default` route).
    ///
    /// # Errors
    /// Returns `RouterError::UnknownTaskType` if no route applies.
    pub fn resolve_candidates(&self, request: &CompletionRequest) -> Result<Vec<Candidate>, RouterError> {
        if let Some(forced) = request.options().forced() {
            debug!(candidate = %forced, "Using forced candidate");
            return Ok(vec![forced]);
        }
        self.table
            .lookup(request.task_type())
            .map(<[Candidate]>::to_vec)
            .ok_or_else(|| RouterError::UnknownTaskType(request.task_type().clone()))
    }

    /// Convenience form of [`complete`](Self::complete).
    ///
    /// # Errors
    /// See [`complete`](Self::complete).
    pub async fn complete_with(
        &self,
        task_type: impl Into<TaskType>,
        messages: Vec<Message>,
        options: CompletionOptions,
    ) -> Result<Response, RouterError> {
        self.complete(&CompletionRequest::new(task_type, messages, options)).await
    }

    /// Serves `request` from the cache or the first healthy candidate that succeeds.
    ///
    /// # Errors
    /// Returns `RouterError::UnknownTaskType` when no route applies, or
    /// `RouterError::AllProvidersFailed` with one failure per candidate, in order.
    pub async fn complete(&self, request: &CompletionRequest) -> Result<Response, RouterError> {
        let request_id = Uuid::new_v4();
        let started = Instant::now();
        let task_type = request.task_type();
        let candidates = self.resolve_candidates(request)?;
        // resolve_candidates never yields an empty list
        let cache_model = candidates.first().map_or("", |c| c.model.as_str());
        let cache = &self.ctx.cache;

        debug!(
            request_id = %request_id,
            task_type = %task_type,
            candidates = candidates.len(),
            "Routing completion"
        );

        if cache.is_enabled() && !request.options().bypass_cache {
            if let Some(mut hit) = cache.get(request.messages(), task_type, cache_model).await {
                hit.metadata.fallback_attempts = 0;
                info!(request_id = %request_id, task_type = %task_type, provider = %hit.provider, "Served from cache");
                return Ok(hit);
            }
        }

        let generation = request.options().generation();
        let mut failures: Vec<CandidateFailure> = Vec::with_capacity(candidates.len());

        for candidate in &candidates {
            let Some(client) = self.providers.get(candidate.provider) else {
                warn!(request_id = %request_id, candidate = %candidate, "No client registered for provider");
                failures.push(CandidateFailure::new(
                    candidate.clone(),
                    FailureReason::Provider(ProviderError::NotConfigured(format!(
                        "no client registered for {}",
                        candidate.provider
                    ))),
                ));
                continue;
            };

            let timeout = client.timeout();
            let call = tokio::time::timeout(timeout, client.send(&candidate.model, request.messages(), &generation));
            let outcome = self
                .ctx
                .breakers
                .execute(candidate.provider.as_str(), move || async move {
                    call.await.unwrap_or(Err(ProviderError::Timeout(timeout)))
                })
                .await;

            match outcome {
                Ok(reply) => {
                    let latency_ms = started.elapsed().as_millis() as u64;
                    let response = Response {
                        content: reply.content,
                        provider: candidate.provider,
                        model: candidate.model.clone(),
                        token_usage: reply.usage,
                        metadata: ResponseMetadata {
                            task_type: task_type.clone(),
                            latency_ms,
                            cached: false,
                            fallback_attempts: failures.len() as u32,
                            timestamp: Utc::now(),
                        },
                    };

                    info!(
                        request_id = %request_id,
                        task_type = %task_type,
                        provider = %candidate.provider,
                        model = %candidate.model,
                        fallback_attempts = response.metadata.fallback_attempts,
                        latency_ms,
                        "Completion succeeded"
                    );

                    if cache.is_enabled() {
                        cache.set(request.messages(), &response, task_type, cache_model, None).await;
                    }

                    self.ctx.events.report_event(
                        "completion.succeeded",
                        json!({
                            "request_id": request_id.to_string(),
                            "task_type": task_type,
                            "provider": candidate.provider,
                            "model": candidate.model,
                            "fallback_attempts": response.metadata.fallback_attempts,
                            "latency_ms": latency_ms,
                        }),
                    );
                    self.ctx.usage.record_usage(UsageRecord {
                        provider: candidate.provider,
                        model: candidate.model.clone(),
                        task_type: task_type.clone(),
                        tokens: response.token_usage,
                        latency_ms,
                        success: true,
                    });

                    return Ok(response);
                }
                Err(BreakerError::Open { retry_in, .. }) => {
                    debug!(request_id = %request_id, candidate = %candidate, "Skipping candidate, circuit open");
                    failures.push(CandidateFailure::new(candidate.clone(), FailureReason::CircuitOpen { retry_in }));
                }
                Err(BreakerError::Operation(e)) => {
                    warn!(request_id = %request_id, candidate = %candidate, error = %e, "Candidate failed, trying next");
                    failures.push(CandidateFailure::new(candidate.clone(), FailureReason::Provider(e)));
                }
            }
        }

        let latency_ms = started.elapsed().as_millis() as u64;
        let context = json!({
            "request_id": request_id.to_string(),
            "task_type": task_type,
            "failures": failures.iter().map(CandidateFailure::to_json).collect::<Vec<_>>(),
        });
        let last = candidates.last();
        let err = RouterError::from(ProvidersExhausted { task_type: task_type.clone(), failures });

        self.ctx.errors.report_error(&err, context);
        if let Some(last) = last {
            self.ctx.usage.record_usage(UsageRecord {
                provider: last.provider,
                model: last.model.clone(),
                task_type: task_type.clone(),
                tokens: TokenUsage::default(),
                latency_ms,
                success: false,
            });
        }

        Err(err)
    }
}
