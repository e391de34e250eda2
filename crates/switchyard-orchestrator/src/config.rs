//! TOML configuration file support.
//!
//! ```toml
//! [circuit_breaker]
//! failure_threshold = 5
//!
//! [cache]
//! default_ttl_secs = 600
//!
//! [providers.openai]
//! api_key_env = "OPENAI_API_KEY"
//!
//! [routes]
//! simple = ["groq:llama-3.1-8b-instant", "openai:gpt-4o-mini"]
//! default = ["ollama:llama3"]
//! ```

use crate::batch_executor::DEFAULT_BATCH_CONCURRENCY;
use crate::cache::CacheConfig;
use crate::circuit_breaker::CircuitBreakerConfig;
use crate::routing::RoutingTable;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use switchyard_abstraction::ProviderKind;
use switchyard_providers::ProviderConfig;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error reading the file.
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("Failed to parse TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error.
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Batch settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct BatchConfig {
    /// Requests in flight at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_concurrency() -> usize {
    DEFAULT_BATCH_CONCURRENCY
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { concurrency: default_concurrency() }
    }
}

/// One `[providers.<kind>]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderSection {
    /// Inline API key. Prefer `api_key_env`.
    pub api_key: Option<String>,
    /// Environment variable holding the key.
    pub api_key_env: Option<String>,
    /// Custom endpoint.
    pub base_url: Option<String>,
    /// Per-call timeout in seconds.
    pub timeout_secs: Option<u64>,
}

impl ProviderSection {
    /// Factory configuration for `kind`.
    pub fn to_provider_config(&self, kind: ProviderKind) -> ProviderConfig {
        ProviderConfig {
            kind,
            api_key: self.api_key.clone(),
            api_key_env: self.api_key_env.clone(),
            base_url: self.base_url.clone(),
            timeout_secs: self.timeout_secs,
        }
    }
}

/// Full configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SwitchyardConfig {
    /// Circuit breaker thresholds.
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,

    /// Response cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Batch settings.
    #[serde(default)]
    pub batch: BatchConfig,

    /// Provider sections keyed by provider name.
    #[serde(default)]
    pub providers: BTreeMap<ProviderKind, ProviderSection>,

    /// Task type to `provider:model` specs, in priority order.
    #[serde(default)]
    pub routes: BTreeMap<String, Vec<String>>,
}

impl SwitchyardConfig {
    /// Routing table built from `[routes]`, or the built-in table when none are listed.
    ///
    /// # Errors
    /// Returns `ConfigError::Validation` for a malformed route.
    pub fn routing_table(&self) -> Result<RoutingTable> {
        if self.routes.is_empty() {
            return Ok(RoutingTable::default_table());
        }
        RoutingTable::from_specs(&self.routes)
    }

    /// Factory configurations for every listed provider.
    pub fn provider_configs(&self) -> Vec<ProviderConfig> {
        self.providers.iter().map(|(kind, section)| section.to_provider_config(*kind)).collect()
    }
}

/// Configuration loader.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads and validates a configuration file.
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    /// Returns error if the file cannot be read, parsed or validated.
    pub fn load(path: &Path) -> Result<SwitchyardConfig> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::parse(&content)?;
        debug!(path = %path.display(), routes = config.routes.len(), "Loaded configuration");
        Ok(config)
    }

    /// Parses and validates configuration text.
    ///
    /// # Errors
    /// Returns error if the text cannot be parsed or validated.
    pub fn parse(content: &str) -> Result<SwitchyardConfig> {
        let config: SwitchyardConfig = toml::from_str(content)?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Validates a configuration.
    ///
    /// # Errors
    /// Returns `ConfigError::Validation` describing the first problem found.
    pub fn validate(config: &SwitchyardConfig) -> Result<()> {
        config.circuit_breaker.validate()?;
        config.cache.validate()?;

        if config.batch.concurrency == 0 {
            return Err(ConfigError::Validation("batch.concurrency must be at least 1".to_string()));
        }

        for (kind, section) in &config.providers {
            if section.timeout_secs == Some(0) {
                return Err(ConfigError::Validation(format!(
                    "providers.{kind}.timeout_secs must be greater than 0"
                )));
            }
            if let Some(url) = &section.base_url {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(ConfigError::Validation(format!(
                        "providers.{kind}.base_url must start with http:// or https://, got '{url}'"
                    )));
                }
            }
        }

        config.routing_table()?;
        Ok(())
    }
}
