//! Google Gemini `generateContent` client.

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

/// Default Gemini endpoint.
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini client.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_key: String,
    base_url: String,
    timeout: Duration,
    client: Client,
}

impl GeminiClient {
    /// Creates a client with an explicit API key.
    #[must_use]
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, GEMINI_BASE_URL.to_string())
    }

    /// Creates a client reading `GEMINI_API_KEY`.
    ///
    /// # Errors
    /// Returns `ProviderError::NotConfigured` if the variable is missing.
    pub fn from_env() -> Result<Self, ProviderError> {
        let api_key = env::var("GEMINI_API_KEY").map_err(|_| {
            ProviderError::NotConfigured("GEMINI_API_KEY environment variable not set".to_string())
        })?;
        Ok(Self::new(api_key))
    }

    /// Creates a client against a custom base URL.
    #[must_use]
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        let timeout = ProviderKind::Gemini.default_timeout();
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

    /// Gemini calls the assistant role `model`.
    fn wire_role(role: Role) -> &'static str {
        match role {
            Role::Assistant => "model",
            Role::User | Role::System => "user",
        }
    }

    fn build_request(messages: &[Message], options: &GenerationOptions) -> GenerateRequest {
        let system: Vec<Part> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| Part { text: m.content.clone() })
            .collect();

        GenerateRequest {
            contents: messages
                .iter()
                .filter(|m| m.role != Role::System)
                .map(|m| Content {
                    role: Self::wire_role(m.role).to_string(),
                    parts: vec![Part { text: m.content.clone() }],
                })
                .collect(),
            system_instruction: if system.is_empty() {
                None
            } else {
                Some(SystemInstruction { parts: system })
            },
            generation_config: GenerationConfig {
                temperature: options.temperature,
                top_p: options.top_p,
                max_output_tokens: options.max_tokens,
            },
        }
    }
}

#[async_trait]
impl ProviderClient for GeminiClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
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
        debug!(model = model, message_count = messages.len(), "Sending Gemini generateContent request");

        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::build_request(messages, options))
            .send()
            .await
            .map_err(|e| http::transport_error(ProviderKind::Gemini, self.timeout, &e))?;

        if !response.status().is_success() {
            return Err(http::error_from_response(ProviderKind::Gemini, response).await);
        }

        let body: GenerateResponse = http::decode_json(ProviderKind::Gemini, response).await?;

        let content = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect::<String>())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| {
                error!("No candidates in Gemini response");
                ProviderError::MalformedResponse("No content in API response".to_string())
            })?;

        let usage = body
            .usage_metadata
            .map(|u| TokenUsage::new(u.prompt_token_count, u.candidates_token_count))
            .unwrap_or_default();

        Ok(ProviderReply { content, usage })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_moves_system_to_instruction() {
        let messages = vec![
            Message::system("Be kind."),
            Message::user("hi"),
            Message::assistant("hello"),
        ];
        let request = GeminiClient::build_request(&messages, &GenerationOptions::default());
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "Be kind.");
        assert_eq!(json["contents"].as_array().unwrap().len(), 2);
        assert_eq!(json["contents"][1]["role"], "model");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 1024);
    }
}
