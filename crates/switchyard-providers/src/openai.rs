//! OpenAI-compatible chat completions client.
//!
//! Serves both OpenAI and Groq, which expose the same `/chat/completions`
//! contract under different base URLs.

use crate::http;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use switchyard_abstraction::{
    GenerationOptions, Message, ProviderClient, ProviderError, ProviderKind, ProviderReply,
    TokenUsage,
};
use tracing::{debug, error};

/// Default OpenAI endpoint.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default Groq endpoint.
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Client for any backend speaking the OpenAI chat completions protocol.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleClient {
    /// Which provider this client reports as.
    kind: ProviderKind,
    /// The API key for authentication.
    api_key: String,
    /// The base URL, without trailing slash.
    base_url: String,
    /// Per-call timeout.
    timeout: Duration,
    /// HTTP client for making requests.
    client: Client,
}

impl OpenAiCompatibleClient {
    /// Creates an OpenAI client with an explicit API key.
    #[must_use]
    pub fn openai(api_key: String) -> Self {
        Self::with_base_url(ProviderKind::OpenAi, api_key, OPENAI_BASE_URL.to_string())
    }

    /// Creates a Groq client with an explicit API key.
    #[must_use]
    pub fn groq(api_key: String) -> Self {
        Self::with_base_url(ProviderKind::Groq, api_key, GROQ_BASE_URL.to_string())
    }

    /// Creates a client reading the key from `OPENAI_API_KEY` or `GROQ_API_KEY`.
    ///
    /// # Errors
    /// Returns `ProviderError::NotConfigured` if the variable is missing.
    pub fn from_env(kind: ProviderKind) -> Result<Self, ProviderError> {
        let (var, base_url) = match kind {
            ProviderKind::OpenAi => ("OPENAI_API_KEY", OPENAI_BASE_URL),
            ProviderKind::Groq => ("GROQ_API_KEY", GROQ_BASE_URL),
            other => {
                return Err(ProviderError::NotConfigured(format!(
                    "{other} does not speak the OpenAI chat completions protocol"
                )));
            }
        };
        let api_key = env::var(var)
            .map_err(|_| ProviderError::NotConfigured(format!("{var} environment variable not set")))?;
        Ok(Self::with_base_url(kind, api_key, base_url.to_string()))
    }

    /// Creates a client against a custom base URL (proxies, test servers).
    #[must_use]
    pub fn with_base_url(kind: ProviderKind, api_key: String, base_url: String) -> Self {
        let timeout = kind.default_timeout();
        Self {
            kind,
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
}

#[async_trait]
impl ProviderClient for OpenAiCompatibleClient {
    fn kind(&self) -> ProviderKind {
        self.kind
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
        debug!(
            provider = %self.kind,
            model = model,
            message_count = messages.len(),
            "Sending chat completion"
        );

        let url = format!("{}/chat/completions", self.base_url);
        let request_body = ChatRequest {
            model,
            messages: messages
                .iter()
                .map(|m| WireMessage { role: m.role.as_str().to_string(), content: m.content.clone() })
                .collect(),
            temperature: options.temperature,
            top_p: options.top_p,
            max_tokens: options.max_tokens,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| http::transport_error(self.kind, self.timeout, &e))?;

        if !response.status().is_success() {
            return Err(http::error_from_response(self.kind, response).await);
        }

        let body: ChatResponse = http::decode_json(self.kind, response).await?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                error!(provider = %self.kind, "No content in chat completion response");
                ProviderError::MalformedResponse("No content in API response".to_string())
            })?;

        let usage = body
            .usage
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        Ok(ProviderReply { content, usage })
    }
}

// OpenAI API request/response structures

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[allow(clippy::struct_field_names)] // Matches API naming
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_groq_uses_its_own_base_url() {
        let client = OpenAiCompatibleClient::groq("test-key".to_string());
        assert_eq!(client.kind(), ProviderKind::Groq);
        assert_eq!(client.base_url, GROQ_BASE_URL);
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let client = OpenAiCompatibleClient::with_base_url(
            ProviderKind::OpenAi,
            "k".to_string(),
            "http://localhost:8080/v1/".to_string(),
        );
        assert_eq!(client.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn test_from_env_rejects_non_openai_kinds() {
        let result = OpenAiCompatibleClient::from_env(ProviderKind::Anthropic);
        assert!(matches!(result, Err(ProviderError::NotConfigured(_))));
    }

    #[test]
    fn test_request_skips_unset_options() {
        let request = ChatRequest {
            model: "gpt-4o-mini",
            messages: vec![WireMessage { role: "user".into(), content: "hi".into() }],
            temperature: None,
            top_p: Some(0.9),
            max_tokens: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("temperature").is_none());
        assert_eq!(json["model"], "gpt-4o-mini");
    }
}
