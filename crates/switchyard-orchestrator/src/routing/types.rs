//! Request, response and failure types for routing.

use super::table::{Candidate, TaskType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::time::Duration;
use switchyard_abstraction::{GenerationOptions, Message, ProviderError, ProviderKind, TokenUsage};

/// Per-request generation and routing options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionOptions {
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Nucleus sampling probability mass.
    pub top_p: Option<f32>,
    /// Maximum output tokens.
    pub max_tokens: Option<u32>,
    /// Skip the cache lookup. A fresh result still refreshes the entry.
    pub bypass_cache: bool,
    /// Forced provider. Only honoured together with `force_model`.
    pub force_provider: Option<ProviderKind>,
    /// Forced model. Only honoured together with `force_provider`.
    pub force_model: Option<String>,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        let generation = GenerationOptions::default();
        Self {
            temperature: generation.temperature,
            top_p: generation.top_p,
            max_tokens: generation.max_tokens,
            bypass_cache: false,
            force_provider: None,
            force_model: None,
        }
    }
}

impl CompletionOptions {
    /// The options handed to the provider client.
    #[must_use]
    pub const fn generation(&self) -> GenerationOptions {
        GenerationOptions { temperature: self.temperature, top_p: self.top_p, max_tokens: self.max_tokens }
    }

    /// The forced candidate, when both provider and model are set.
    #[must_use]
    pub fn forced(&self) -> Option<Candidate> {
        match (self.force_provider, &self.force_model) {
            (Some(provider), Some(model)) => Some(Candidate::new(provider, model.clone())),
            _ => None,
        }
    }
}

/// An immutable, task-typed generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    task_type: TaskType,
    messages: Vec<Message>,
    #[serde(default)]
    options: CompletionOptions,
}

impl CompletionRequest {
    /// Creates a request directly.
    pub fn new(task_type: impl Into<TaskType>, messages: Vec<Message>, options: CompletionOptions) -> Self {
        Self { task_type: task_type.into(), messages, options }
    }

    /// Starts a builder for `task_type`.
    pub fn builder(task_type: impl Into<TaskType>) -> CompletionRequestBuilder {
        CompletionRequestBuilder {
            task_type: task_type.into(),
            messages: Vec::new(),
            options: CompletionOptions::default(),
        }
    }

    /// Routing policy tag.
    pub const fn task_type(&self) -> &TaskType {
        &self.task_type
    }

    /// The conversation.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Generation and routing options.
    pub const fn options(&self) -> &CompletionOptions {
        &self.options
    }
}

/// Builder for [`CompletionRequest`].
#[derive(Debug, Clone)]
pub struct CompletionRequestBuilder {
    task_type: TaskType,
    messages: Vec<Message>,
    options: CompletionOptions,
}

impl CompletionRequestBuilder {
    /// Appends a message.
    #[must_use]
    pub fn message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Appends several messages.
    #[must_use]
    pub fn messages(mut self, messages: impl IntoIterator<Item = Message>) -> Self {
        self.messages.extend(messages);
        self
    }

    /// Appends a system message.
    #[must_use]
    pub fn system(self, content: impl Into<String>) -> Self {
        self.message(Message::system(content))
    }

    /// Appends a user message.
    #[must_use]
    pub fn user(self, content: impl Into<String>) -> Self {
        self.message(Message::user(content))
    }

    /// Appends an assistant message.
    #[must_use]
    pub fn assistant(self, content: impl Into<String>) -> Self {
        self.message(Message::assistant(content))
    }

    /// Replaces all options.
    #[must_use]
    pub fn options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub const fn temperature(mut self, temperature: f32) -> Self {
        self.options.temperature = Some(temperature);
        self
    }

    #[must_use]
    pub const fn top_p(mut self, top_p: f32) -> Self {
        self.options.top_p = Some(top_p);
        self
    }

    #[must_use]
    pub const fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.options.max_tokens = Some(max_tokens);
        self
    }

    #[must_use]
    pub const fn bypass_cache(mut self, bypass: bool) -> Self {
        self.options.bypass_cache = bypass;
        self
    }

    /// Pins the request to one provider and model, replacing the routing table entry.
    #[must_use]
    pub fn force(mut self, provider: ProviderKind, model: impl Into<String>) -> Self {
        self.options.force_provider = Some(provider);
        self.options.force_model = Some(model.into());
        self
    }

    /// Finishes the request.
    #[must_use]
    pub fn build(self) -> CompletionRequest {
        CompletionRequest { task_type: self.task_type, messages: self.messages, options: self.options }
    }
}

/// Routing details attached to every response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    /// Task type the request was routed under.
    pub task_type: TaskType,
    /// Provider call time, or cache retrieval time for cached copies.
    pub latency_ms: u64,
    /// Whether this copy came from the cache.
    pub cached: bool,
    /// Candidates tried or skipped before the one that answered.
    pub fallback_attempts: u32,
    /// When the response was produced.
    pub timestamp: DateTime<Utc>,
}

/// A completed generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Generated text.
    pub content: String,
    /// Provider that produced it.
    pub provider: ProviderKind,
    /// Model that produced it.
    pub model: String,
    /// Token usage reported by the provider.
    pub token_usage: TokenUsage,
    /// Routing details.
    pub metadata: ResponseMetadata,
}

/// Coarse classification of a candidate failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    CircuitOpen,
    NotConfigured,
    Timeout,
    RateLimited,
    Authentication,
    ServerError,
    ClientError,
    Network,
    MalformedResponse,
    Other,
}

impl FailureKind {
    /// Classifies a provider error.
    #[must_use]
    pub const fn classify(error: &ProviderError) -> Self {
        match error {
            ProviderError::Timeout(_) => Self::Timeout,
            ProviderError::RateLimited { .. } => Self::RateLimited,
            ProviderError::Authentication(_) => Self::Authentication,
            ProviderError::Status { status, .. } => match *status {
                500..=599 => Self::ServerError,
                400..=499 => Self::ClientError,
                _ => Self::Other,
            },
            ProviderError::Network(_) => Self::Network,
            ProviderError::MalformedResponse(_) => Self::MalformedResponse,
            ProviderError::NotConfigured(_) => Self::NotConfigured,
        }
    }

    /// Snake-case name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CircuitOpen => "circuit_open",
            Self::NotConfigured => "not_configured",
            Self::Timeout => "timeout",
            Self::RateLimited => "rate_limited",
            Self::Authentication => "authentication",
            Self::ServerError => "server_error",
            Self::ClientError => "client_error",
            Self::Network => "network",
            Self::MalformedResponse => "malformed_response",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a candidate did not produce a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Skipped because its circuit was open.
    CircuitOpen {
        /// Remaining cooldown at the time of the skip.
        retry_in: Duration,
    },
    /// The provider call failed, or no client was registered for it.
    Provider(ProviderError),
}

impl FailureReason {
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::CircuitOpen { .. } => FailureKind::CircuitOpen,
            Self::Provider(e) => FailureKind::classify(e),
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CircuitOpen { retry_in } => {
                write!(f, "circuit open (retry in {}s)", retry_in.as_secs())
            }
            Self::Provider(e) => write!(f, "{e}"),
        }
    }
}

/// One failed or skipped candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFailure {
    /// The candidate that failed.
    pub candidate: Candidate,
    /// What went wrong.
    pub reason: FailureReason,
}

impl CandidateFailure {
    pub const fn new(candidate: Candidate, reason: FailureReason) -> Self {
        Self { candidate, reason }
    }

    /// Classification of the failure.
    pub const fn kind(&self) -> FailureKind {
        self.reason.kind()
    }

    /// Structured form for error sinks.
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "provider": self.candidate.provider,
            "model": self.candidate.model,
            "kind": self.kind(),
            "error": self.reason.to_string(),
        })
    }
}

impl fmt::Display for CandidateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}: {}", self.candidate.provider, self.candidate.model, self.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_collects_messages_and_options() {
        let request = CompletionRequest::builder("SIMPLE")
            .system("be brief")
            .user("hi")
            .temperature(0.2)
            .bypass_cache(true)
            .build();

        assert_eq!(request.task_type().as_str(), "simple");
        assert_eq!(request.messages().len(), 2);
        assert_eq!(request.options().temperature, Some(0.2));
        assert_eq!(request.options().max_tokens, Some(1024));
        assert!(request.options().bypass_cache);
        assert!(request.options().forced().is_none());
    }

    #[test]
    fn test_forced_requires_both_fields() {
        let mut options = CompletionOptions { force_provider: Some(ProviderKind::Groq), ..Default::default() };
        assert!(options.forced().is_none());
        options.force_model = Some("llama3-70b".into());
        assert_eq!(options.forced(), Some(Candidate::new(ProviderKind::Groq, "llama3-70b")));
    }

    #[test]
    fn test_request_deserializes_with_default_options() {
        let request: CompletionRequest = serde_json::from_str(
            r#"{"task_type": "Complex", "messages": [{"role": "user", "content": "plan"}]}"#,
        )
        .unwrap();
        assert_eq!(request.task_type().as_str(), "complex");
        assert_eq!(request.options(), &CompletionOptions::default());
    }

    #[test]
    fn test_failure_classification() {
        let status = |s| ProviderError::Status { status: s, message: String::new() };
        assert_eq!(FailureKind::classify(&status(502)), FailureKind::ServerError);
        assert_eq!(FailureKind::classify(&status(404)), FailureKind::ClientError);
        assert_eq!(FailureKind::classify(&ProviderError::Timeout(Duration::from_secs(60))), FailureKind::Timeout);
        assert_eq!(
            FailureKind::classify(&ProviderError::RateLimited { retry_after: None, message: String::new() }),
            FailureKind::RateLimited
        );
    }

    #[test]
    fn test_candidate_failure_display_and_json() {
        let failure = CandidateFailure::new(
            Candidate::new(ProviderKind::OpenAi, "gpt-4o"),
            FailureReason::Provider(ProviderError::Network("connection reset".into())),
        );
        assert_eq!(failure.to_string(), "openai/gpt-4o: network error: connection reset");

        let json = failure.to_json();
        assert_eq!(json["provider"], "openai");
        assert_eq!(json["kind"], "network");
    }
}
