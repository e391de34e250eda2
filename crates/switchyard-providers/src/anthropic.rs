//! Anthropic messages API client.
//!
//! Anthropic takes system instructions in a dedicated top-level `system` field
//! rather than inline in the message list, so system messages are lifted out
//! and concatenated before the request is built.

use crate::http;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use switchyard_abstraction::{
    GenerationOptions, Message, ProviderClient, ProviderError, ProviderKind, ProviderReply, Role,
    TokenUsage,
};
use tracing::{debug, error};

/// Default Anthropic endpoint.
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

/// API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// `max_tokens` is mandatory for this API.
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Anthropic client.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    api_key: String,
    base_url: String,
    timeout: Duration,
    client: Client,
}

impl AnthropicClient {
    /// Creates a client with an explicit API key.
    #[must_use]
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, ANTHROPIC_BASE_URL.to_string())
    }

    /// Creates a client reading `ANTHROPIC_API_KEY`.
    ///
    /// # Errors
    /// Returns `ProviderError::NotConfigured` if the variable is missing.
    pub fn from_env() -> Result<Self, ProviderError> {
        let api_key = env::var("ANTHROPIC_API_KEY").map_err(|_| {
            ProviderError::NotConfigured("ANTHROPIC_API_KEY environment variable not set".to_string())
        })?;
        Ok(Self::new(api_key))
    }

    /// Creates a client against a custom base URL.
    #[must_use]
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        let timeout = ProviderKind::Anthropic.default_timeout();
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            client: http::build_client(timeout),
        }
    }

    /// Overrides the per-call timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self.client = http::build_client(timeout);
        self
    }

    /// Joins every system message into the dedicated `system` field.
    fn system_prompt(messages: &[Message]) -> Option<String> {
        let parts: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();
        if parts.is_empty() { None } else { Some(parts.join("\n\n")) }
    }
}

#[async_trait]
impl ProviderClient for AnthropicClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn send(
        &self,
        model: &str,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<ProviderReply, ProviderError> {
        debug!(model = model, message_count = messages.len(), "Sending Anthropic messages request");

        let request_body = MessagesRequest {
            model,
            system: Self::system_prompt(messages),
            messages: messages
                .iter()
                .filter(|m| m.role != Role::System)
                .map(|m| WireMessage { role: m.role.as_str(), content: &m.content })
                .collect(),
            max_tokens: options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: options.temperature,
            top_p: options.top_p,
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| http::transport_error(ProviderKind::Anthropic, self.timeout, &e))?;

        if !response.status().is_success() {
            return Err(http::error_from_response(ProviderKind::Anthropic, response).await);
        }

        let body: MessagesResponse = http::decode_json(ProviderKind::Anthropic, response).await?;

        let content: String = body
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("");
        if content.is_empty() {
            error!("No text content in Anthropic response");
            return Err(ProviderError::MalformedResponse("No text content in API response".to_string()));
        }

        let usage = body
            .usage
            .map(|u| TokenUsage::new(u.input_tokens, u.output_tokens))
            .unwrap_or_default();

        Ok(ProviderReply { content, usage })
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: Option<MessagesUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessagesUsage {
    input_tokens: u32,
    output_tokens: u32,
}
