//! Provider abstraction layer for Switchyard.
//!
//! This crate defines the vocabulary shared by the provider clients and the
//! routing core: chat messages, generation options, token usage, provider
//! identities and the `ProviderClient` trait every backend implements.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Represents an error that can occur when calling a provider backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The call did not complete within the provider's timeout.
    #[error("request timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    /// The provider rejected the call because of rate limits or quota.
    #[error("rate limited{}: {message}", .retry_after.map(|d| format!(" (retry after {}s)", d.as_secs())).unwrap_or_default())]
    RateLimited {
        /// Delay advertised by the provider, if any.
        retry_after: Option<Duration>,
        /// Error message from the provider.
        message: String,
    },

    /// The provider refused the credentials.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The provider returned a non-success status.
    #[error("API error ({status}): {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body or message.
        message: String,
    },

    /// The request never reached the provider (DNS, connect, TLS, reset).
    #[error("network error: {0}")]
    Network(String),

    /// The provider answered but the body could not be understood.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The provider is not configured (missing API key, base URL, ...).
    #[error("provider not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    /// Returns the HTTP status carried by this error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::RateLimited { .. } => Some(429),
            _ => None,
        }
    }

    /// Returns true for 5xx responses.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status().is_some_and(|s| (500..600).contains(&s))
    }
}

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Instructions that frame the conversation.
    System,
    /// Caller input.
    User,
    /// Previous model output.
    Assistant,
}

impl Role {
    /// Returns the canonical lower-case name of the role.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "system" => Ok(Self::System),
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            other => Err(format!("unknown message role '{other}'")),
        }
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Represents a message in a conversation with a chat model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message sender.
    pub role: Role,
    /// The content of the message.
    pub content: String,
}

impl Message {
    /// Creates a message with the given role.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }

    /// Creates a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Creates an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Parameters for controlling the model's generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Sampling temperature, between 0 and 2.
    pub temperature: Option<f32>,

    /// Nucleus sampling probability mass.
    pub top_p: Option<f32>,

    /// The maximum number of tokens to generate.
    pub max_tokens: Option<u32>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self { temperature: Some(0.7), top_p: Some(1.0), max_tokens: Some(1024) }
    }
}

/// Usage statistics for a provider call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of tokens in the prompt.
    pub prompt_tokens: u32,

    /// Number of tokens in the completion.
    pub completion_tokens: u32,

    /// Total number of tokens used.
    pub total_tokens: u32,
}

impl TokenUsage {
    /// Builds usage from prompt and completion counts.
    #[must_use]
    pub const fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// What a provider hands back for a successful call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderReply {
    /// The generated content.
    pub content: String,
    /// Token usage reported (or estimated) for the call.
    pub usage: TokenUsage,
}

/// The backends Switchyard knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI chat completions.
    OpenAi,
    /// Anthropic messages API.
    Anthropic,
    /// Google Gemini.
    Gemini,
    /// Groq (OpenAI-compatible).
    Groq,
    /// Local Ollama server.
    Ollama,
    /// In-process mock for tests and dry runs.
    Mock,
}

impl ProviderKind {
    /// Every provider kind, in declaration order.
    pub const ALL: [Self; 6] =
        [Self::OpenAi, Self::Anthropic, Self::Gemini, Self::Groq, Self::Ollama, Self::Mock];

    /// Returns the canonical name used in configuration and circuit names.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
            Self::Groq => "groq",
            Self::Ollama => "ollama",
            Self::Mock => "mock",
        }
    }

    /// Returns true for providers that run on the local machine.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(self, Self::Ollama | Self::Mock)
    }

    /// Default call timeout: remote APIs get 60 seconds, local inference 300.
    #[must_use]
    pub const fn default_timeout(&self) -> Duration {
        if self.is_local() { Duration::from_secs(300) } else { Duration::from_secs(60) }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "gemini" | "google" => Ok(Self::Gemini),
            "groq" => Ok(Self::Groq),
            "ollama" => Ok(Self::Ollama),
            "mock" => Ok(Self::Mock),
            other => Err(format!(
                "unsupported provider '{other}'. Valid providers: openai, anthropic, gemini, groq, ollama, mock"
            )),
        }
    }
}

/// A trait for sending a chat conversation to one provider backend.
///
/// All clients must be `Send + Sync` so the router can share them across tasks.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Which backend this client talks to.
    fn kind(&self) -> ProviderKind;

    /// Upper bound on a single call. Exceeding it counts as a failure.
    fn timeout(&self) -> Duration {
        self.kind().default_timeout()
    }

    /// Sends the conversation to `model` and returns the whole reply.
    ///
    /// # Errors
    /// Returns a `ProviderError` on transport failure, non-success status or an
    /// unparseable body.
    async fn send(
        &self,
        model: &str,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<ProviderReply, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing_is_case_insensitive() {
        assert_eq!("USER".parse::<Role>().unwrap(), Role::User);
        assert_eq!(" Assistant ".parse::<Role>().unwrap(), Role::Assistant);
        assert!("tool".parse::<Role>().is_err());
    }

    #[test]
    fn test_message_deserializes_mixed_case_role() {
        let msg: Message = serde_json::from_str(r#"{"role": "System", "content": "be brief"}"#).unwrap();
        assert_eq!(msg, Message::system("be brief"));
        assert_eq!(serde_json::to_value(&msg).unwrap()["role"], "system");
    }

    #[test]
    fn test_provider_kind_round_trips_through_str() {
        for kind in ProviderKind::ALL {
            assert_eq!(kind.as_str().parse::<ProviderKind>().unwrap(), kind);
        }
        assert_eq!("claude".parse::<ProviderKind>().unwrap(), ProviderKind::Anthropic);
        assert!("cohere".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_local_providers_get_longer_timeout() {
        assert_eq!(ProviderKind::OpenAi.default_timeout(), Duration::from_secs(60));
        assert_eq!(ProviderKind::Ollama.default_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn test_token_usage_totals() {
        let usage = TokenUsage::new(12, 30);
        assert_eq!(usage.total_tokens, 42);
    }

    #[test]
    fn test_provider_error_status() {
        let err = ProviderError::Status { status: 503, message: "overloaded".into() };
        assert!(err.is_server_error());
        assert_eq!(err.to_string(), "API error (503): overloaded");

        let limited = ProviderError::RateLimited {
            retry_after: Some(Duration::from_secs(7)),
            message: "slow down".into(),
        };
        assert_eq!(limited.status(), Some(429));
        assert_eq!(limited.to_string(), "rate limited (retry after 7s): slow down");
    }
}
