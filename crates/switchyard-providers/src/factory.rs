//! Provider factory for creating clients from configuration.
//!
//! This module builds `ProviderClient` instances from a `ProviderConfig`,
//! handling API key loading from environment variables.

use crate::{AnthropicClient, GeminiClient, MockClient, OllamaClient, OpenAiCompatibleClient};
use crate::{anthropic, gemini, ollama, openai};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use switchyard_abstraction::{ProviderClient, ProviderError, ProviderKind};
use tracing::{debug, error};

/// Provider configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Which backend to build.
    pub kind: ProviderKind,
    /// Explicit API key. Takes precedence over the environment.
    pub api_key: Option<String>,
    /// Environment variable to read the key from, overriding the provider default.
    pub api_key_env: Option<String>,
    /// Custom endpoint (proxy, self-hosted gateway, test server).
    pub base_url: Option<String>,
    /// Per-call timeout override in seconds.
    pub timeout_secs: Option<u64>,
}

impl ProviderConfig {
    /// Creates a configuration that relies on provider defaults.
    ///
    /// # Arguments
    /// * `kind` - The provider to build
    #[must_use]
    pub const fn new(kind: ProviderKind) -> Self {
        Self { kind, api_key: None, api_key_env: None, base_url: None, timeout_secs: None }
    }

    /// Sets the API key for this configuration.
    #[must_use]
    pub fn with_api_key(mut self, api_key: String) -> Self {
        self.api_key = Some(api_key);
        self
    }

    /// Sets the base URL for this configuration.
    ///
    /// # Arguments
    /// * `base_url` - The base URL for the API endpoint (e.g., "http://localhost:8000/v1")
    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Sets the per-call timeout in seconds.
    #[must_use]
    pub const fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }

    /// The environment variable consulted when no key is given explicitly.
    #[must_use]
    pub fn key_env_var(&self) -> Option<&str> {
        self.api_key_env.as_deref().or_else(|| default_key_env(self.kind))
    }

    /// Resolves the API key from the config, then the environment.
    ///
    /// # Errors
    /// Returns `ProviderError::NotConfigured` if the provider needs a key and none is found.
    pub fn resolve_api_key(&self) -> Result<Option<String>, ProviderError> {
        if let Some(key) = &self.api_key {
            return Ok(Some(key.clone()));
        }
        let Some(var) = self.key_env_var() else {
            return Ok(None);
        };
        match env::var(var) {
            Ok(key) if !key.trim().is_empty() => Ok(Some(key)),
            _ if self.kind.is_local() => Ok(None),
            _ => {
                error!(provider = %self.kind, env_var = var, "API key not found");
                Err(ProviderError::NotConfigured(format!(
                    "{} requires an API key: set {var} or api_key in the config",
                    self.kind
                )))
            }
        }
    }
}

/// Default key variable for each provider. Local providers need none.
#[must_use]
pub const fn default_key_env(kind: ProviderKind) -> Option<&'static str> {
    match kind {
        ProviderKind::OpenAi => Some("OPENAI_API_KEY"),
        ProviderKind::Anthropic => Some("ANTHROPIC_API_KEY"),
        ProviderKind::Gemini => Some("GEMINI_API_KEY"),
        ProviderKind::Groq => Some("GROQ_API_KEY"),
        ProviderKind::Ollama | ProviderKind::Mock => None,
    }
}

/// Factory for creating provider clients.
pub struct ProviderFactory;

impl ProviderFactory {
    /// Creates a client from the given configuration.
    ///
    /// # Arguments
    /// * `config` - The provider configuration
    ///
    /// # Errors
    /// Returns a `ProviderError` if creation fails (e.g., missing API key).
    pub fn create(config: &ProviderConfig) -> Result<Arc<dyn ProviderClient>, ProviderError> {
        debug!(
            provider = %config.kind,
            base_url = ?config.base_url,
            timeout_secs = ?config.timeout_secs,
            "Creating provider client"
        );

        let timeout = config.timeout_secs.map(Duration::from_secs);
        let base_url = config.base_url.clone();

        let client: Arc<dyn ProviderClient> = match config.kind {
            ProviderKind::Mock => {
                let client = MockClient::new();
                Arc::new(match timeout {
                    Some(t) => client.with_timeout(t),
                    None => client,
                })
            }
            ProviderKind::OpenAi | ProviderKind::Groq => {
                let api_key = required_key(config)?;
                let default_url = if config.kind == ProviderKind::Groq {
                    openai::GROQ_BASE_URL
                } else {
                    openai::OPENAI_BASE_URL
                };
                let client = OpenAiCompatibleClient::with_base_url(
                    config.kind,
                    api_key,
                    base_url.unwrap_or_else(|| default_url.to_string()),
                );
                Arc::new(match timeout {
                    Some(t) => client.with_timeout(t),
                    None => client,
                })
            }
            ProviderKind::Anthropic => {
                let api_key = required_key(config)?;
                let client = AnthropicClient::with_base_url(
                    api_key,
                    base_url.unwrap_or_else(|| anthropic::ANTHROPIC_BASE_URL.to_string()),
                );
                Arc::new(match timeout {
                    Some(t) => client.with_timeout(t),
                    None => client,
                })
            }
            ProviderKind::Gemini => {
                let api_key = required_key(config)?;
                let client = GeminiClient::with_base_url(
                    api_key,
                    base_url.unwrap_or_else(|| gemini::GEMINI_BASE_URL.to_string()),
                );
                Arc::new(match timeout {
                    Some(t) => client.with_timeout(t),
                    None => client,
                })
            }
            ProviderKind::Ollama => {
                let client = OllamaClient::with_base_url(
                    base_url.unwrap_or_else(|| ollama::OLLAMA_BASE_URL.to_string()),
                );
                Arc::new(match timeout {
                    Some(t) => client.with_timeout(t),
                    None => client,
                })
            }
        };

        Ok(client)
    }

    /// Creates one client per configuration.
    ///
    /// # Errors
    /// Returns the first creation error.
    pub fn create_all<'a>(
        configs: impl IntoIterator<Item = &'a ProviderConfig>,
    ) -> Result<Vec<Arc<dyn ProviderClient>>, ProviderError> {
        configs.into_iter().map(Self::create).collect()
    }

    /// Creates a client from a provider name, reading keys from the environment.
    ///
    /// # Errors
    /// Returns a `ProviderError` if the name is unrecognized or creation fails.
    pub fn create_from_str(provider: &str) -> Result<Arc<dyn ProviderClient>, ProviderError> {
        let kind = provider.parse::<ProviderKind>().map_err(|e| {
            error!(provider = %provider, "Unrecognized provider");
            ProviderError::NotConfigured(e)
        })?;
        Self::create(&ProviderConfig::new(kind))
    }
}

fn required_key(config: &ProviderConfig) -> Result<String, ProviderError> {
    config.resolve_api_key()?.ok_or_else(|| {
        ProviderError::NotConfigured(format!("{} requires an API key", config.kind))
    })
}
