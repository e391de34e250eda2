//! Concurrency-bounded fan-out over the routing orchestrator.

use crate::error::RouterError;
use crate::routing::{CompletionRequest, Response, RoutingOrchestrator};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Default number of requests in flight.
pub const DEFAULT_BATCH_CONCURRENCY: usize = 5;

/// Runs many requests through one orchestrator.
pub struct BatchExecutor<'a> {
    orchestrator: &'a RoutingOrchestrator,
    concurrency: usize,
}

impl<'a> BatchExecutor<'a> {
    /// Creates an executor. A concurrency of 0 is treated as 1.
    pub fn new(orchestrator: &'a RoutingOrchestrator, concurrency: usize) -> Self {
        Self { orchestrator, concurrency: concurrency.max(1) }
    }

    /// Effective concurrency limit.
    pub const fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Completes every request, at most `concurrency` at a time.
    ///
    /// Results are in input order. The first error aborts the batch and is
    /// returned; requests still in flight are dropped.
    ///
    /// # Errors
    /// Returns the first `RouterError` encountered.
    pub async fn batch_complete(&self, requests: &[CompletionRequest]) -> Result<Vec<Response>, RouterError> {
        let batch_id = Uuid::new_v4();
        let started = Instant::now();
        info!(batch_id = %batch_id, total = requests.len(), concurrency = self.concurrency, "Starting batch");

        let result: Result<Vec<Response>, RouterError> = stream::iter(requests)
            .map(|request| self.orchestrator.complete(request))
            .buffered(self.concurrency)
            .try_collect()
            .await;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(responses) => {
                let cached = responses.iter().filter(|r| r.metadata.cached).count();
                info!(batch_id = %batch_id, completed = responses.len(), cached, elapsed_ms, "Batch completed");
            }
            Err(e) => warn!(batch_id = %batch_id, error = %e, elapsed_ms, "Batch aborted"),
        }
        result
    }
}

impl RoutingOrchestrator {
    /// Completes `requests` with at most `concurrency` in flight, fail-fast.
    ///
    /// # Errors
    /// Returns the first `RouterError` encountered.
    pub async fn batch_complete(
        &self,
        requests: &[CompletionRequest],
        concurrency: usize,
    ) -> Result<Vec<Response>, RouterError> {
        BatchExecutor::new(self, concurrency).batch_complete(requests).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{Candidate, ProviderRegistry, RouterContext, RoutingTable};
    use std::sync::Arc;
    use switchyard_abstraction::ProviderKind;
    use switchyard_providers::MockClient;

    #[test]
    fn test_zero_concurrency_is_one() {
        let router = RoutingOrchestrator::new(
            RoutingTable::new().with_route("simple", vec![Candidate::new(ProviderKind::Mock, "m")]),
            ProviderRegistry::new().with(Arc::new(MockClient::new())),
            RouterContext::default(),
        );
        assert_eq!(BatchExecutor::new(&router, 0).concurrency(), 1);
        assert_eq!(BatchExecutor::new(&router, DEFAULT_BATCH_CONCURRENCY).concurrency(), 5);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let router = RoutingOrchestrator::new(RoutingTable::new(), ProviderRegistry::new(), RouterContext::default());
        assert!(router.batch_complete(&[], 3).await.unwrap().is_empty());
    }
}
