// Error types for routing

use crate::routing::{CandidateFailure, TaskType};
use thiserror::Error;

/// Every candidate for a task type failed or was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("all providers failed for task type '{task_type}': {}", join_failures(.failures))]
pub struct ProvidersExhausted {
    /// Task type that was being served.
    pub task_type: TaskType,
    /// One entry per candidate, in table order.
    pub failures: Vec<CandidateFailure>,
}

fn join_failures(failures: &[CandidateFailure]) -> String {
    if failures.is_empty() {
        return "no candidates".to_string();
    }
    failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Errors surfaced to routing callers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    /// No candidate produced a response
    #[error(transparent)]
    AllProvidersFailed(#[from] ProvidersExhausted),

    /// The task type has no route and there is no default route
    #[error("no route configured for task type '{0}'")]
    UnknownTaskType(TaskType),
}

impl RouterError {
    /// The per-candidate failures, if any.
    pub fn failures(&self) -> &[CandidateFailure] {
        match self {
            Self::AllProvidersFailed(exhausted) => &exhausted.failures,
            Self::UnknownTaskType(_) => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{Candidate, FailureReason};
    use std::time::Duration;
    use switchyard_abstraction::{ProviderError, ProviderKind};

    #[test]
    fn test_exhausted_message_lists_every_candidate() {
        let err = RouterError::from(ProvidersExhausted {
            task_type: TaskType::new("simple"),
            failures: vec![
                CandidateFailure::new(
                    Candidate::new(ProviderKind::Groq, "llama3"),
                    FailureReason::CircuitOpen { retry_in: Duration::from_secs(42) },
                ),
                CandidateFailure::new(
                    Candidate::new(ProviderKind::OpenAi, "gpt-4o-mini"),
                    FailureReason::Provider(ProviderError::Status { status: 500, message: "boom".into() }),
                ),
            ],
        });

        assert_eq!(
            err.to_string(),
            "all providers failed for task type 'simple': groq/llama3: circuit open (retry in 42s); \
             openai/gpt-4o-mini: API error (500): boom"
        );
        assert_eq!(err.failures().len(), 2);
    }

    #[test]
    fn test_unknown_task_type() {
        let err = RouterError::UnknownTaskType(TaskType::new("Summarize"));
        assert_eq!(err.to_string(), "no route configured for task type 'summarize'");
        assert!(err.failures().is_empty());
    }
}
