//! Task-typed routing with ordered failover.

pub mod router;
pub mod table;
pub mod types;

pub use router::{ProviderRegistry, RouterContext, RoutingOrchestrator};
pub use table::{Candidate, RoutingTable, TaskType};
pub use types::{
    CandidateFailure, CompletionOptions, CompletionRequest, CompletionRequestBuilder, FailureKind,
    FailureReason, Response, ResponseMetadata,
};
