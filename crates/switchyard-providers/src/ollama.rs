//! Ollama client.
//!
//! Talks to a local Ollama server through its native `/api/chat` endpoint with
//! streaming disabled. No API key is needed.

use crate::http;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use switchyard_abstraction::{
    GenerationOptions, Message, ProviderClient, ProviderError, ProviderKind, ProviderReply,
    TokenUsage,
};
use tracing::{debug, error};

/// Default Ollama server.
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// Ollama client.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    /// The base URL for the Ollama API (e.g. "http://192.168.1.100:11434").
    base_url: String,
    /// Per-call timeout. Local inference is slow, so this defaults to 300s.
    timeout: Duration,
    /// HTTP client for making requests.
    client: Client,
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

impl OllamaClient {
    /// Creates a client for the default local server.
    #[must_use]
    pub fn new() -> Self {
        Self::with_base_url(OLLAMA_BASE_URL.to_string())
    }

    /// Creates a client for a custom server.
    ///
    /// # Arguments
    /// * `base_url` - The base URL for the Ollama API
    #[must_use]
    pub fn with_base_url(base_url: String) -> Self {
        let timeout = ProviderKind::Ollama.default_timeout();
        Self {
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
impl ProviderClient for OllamaClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
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
            model = model,
            base_url = %self.base_url,
            message_count = messages.len(),
            "Sending Ollama chat request"
        );

        let request_body = OllamaChatRequest {
            model,
            messages: messages
                .iter()
                .map(|m| OllamaMessage { role: m.role.as_str().to_string(), content: m.content.clone() })
                .collect(),
            stream: false,
            options: OllamaOptions {
                temperature: options.temperature,
                top_p: options.top_p,
                num_predict: options.max_tokens,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request_body)
            .send()
            .await
            .map_err(|e| http::transport_error(ProviderKind::Ollama, self.timeout, &e))?;

        if !response.status().is_success() {
            return Err(http::error_from_response(ProviderKind::Ollama, response).await);
        }

        let body: OllamaChatResponse = http::decode_json(ProviderKind::Ollama, response).await?;

        let content = body.message.map(|m| m.content).ok_or_else(|| {
            error!(model = model, "No message in Ollama response");
            ProviderError::MalformedResponse("No message in Ollama response".to_string())
        })?;

        Ok(ProviderReply {
            content,
            usage: TokenUsage::new(
                body.prompt_eval_count.unwrap_or(0),
                body.eval_count.unwrap_or(0),
            ),
        })
    }
}

// Ollama API request/response structures

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>, // max_tokens equivalent
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaMessage>,
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
}
