//! Shared fixtures for orchestrator integration tests.

#![allow(dead_code)]

use serde_json::Value;
use std::sync::{Arc, Mutex};
use switchyard_abstraction::{ProviderClient, ProviderKind};
use switchyard_orchestrator::{
    CacheConfig, Candidate, CircuitBreakerConfig, ErrorSink, EventSink, ProviderRegistry, RouterContext,
    RouterError, RoutingOrchestrator, RoutingTable, UsageRecord, UsageSink,
};
use switchyard_providers::MockClient;

/// Sink that keeps everything it is handed.
#[derive(Default)]
pub struct RecordingSink {
    pub errors: Mutex<Vec<(String, Value)>>,
    pub events: Mutex<Vec<(String, Value)>>,
    pub usage: Mutex<Vec<UsageRecord>>,
}

impl RecordingSink {
    pub fn error_count(&self) -> usize {
        self.errors.lock().unwrap().len()
    }

    pub fn event_names(&self) -> Vec<String> {
        self.events.lock().unwrap().iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn usage_records(&self) -> Vec<UsageRecord> {
        self.usage.lock().unwrap().clone()
    }
}

impl ErrorSink for RecordingSink {
    fn report_error(&self, error: &RouterError, context: Value) {
        self.errors.lock().unwrap().push((error.to_string(), context));
    }
}

impl EventSink for RecordingSink {
    fn report_event(&self, name: &str, payload: Value) {
        self.events.lock().unwrap().push((name.to_string(), payload));
    }
}

impl UsageSink for RecordingSink {
    fn record_usage(&self, record: UsageRecord) {
        self.usage.lock().unwrap().push(record);
    }
}

pub fn candidates(specs: &[(ProviderKind, &str)]) -> Vec<Candidate> {
    specs.iter().map(|(provider, model)| Candidate::new(*provider, *model)).collect()
}

/// Orchestrator with one `simple` route, the given clients and a recording sink.
pub fn orchestrator(
    route: Vec<Candidate>,
    clients: Vec<Arc<MockClient>>,
    breaker: CircuitBreakerConfig,
) -> (RoutingOrchestrator, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let ctx = RouterContext::in_memory(breaker, CacheConfig::default())
        .with_error_sink(sink.clone())
        .with_event_sink(sink.clone())
        .with_usage_sink(sink.clone());
    let table = RoutingTable::new().with_route("simple", route);
    let providers: ProviderRegistry =
        clients.into_iter().map(|client| client as Arc<dyn ProviderClient>).collect();
    let router = RoutingOrchestrator::new(table, providers, ctx);
    (router, sink)
}
