//! Response cache configuration.

use super::pricing::{CostTable, DEFAULT_COST_PER_REQUEST};
use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Configuration for the response cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether caching is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Prefix for every key written to the store.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Time-to-live for entries, in seconds.
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,

    /// Assumed cost of a request to an unlisted model, in USD.
    #[serde(default = "default_cost_per_request")]
    pub default_cost_per_request: f64,

    /// Per-model cost overrides, in USD per request.
    #[serde(default)]
    pub costs: HashMap<String, f64>,
}

fn default_enabled() -> bool {
    true
}

fn default_namespace() -> String {
    "switchyard:cache".to_string()
}

fn default_ttl_secs() -> u64 {
    3600
}

fn default_cost_per_request() -> f64 {
    DEFAULT_COST_PER_REQUEST
}

fn is_invalid_cost(cost: f64) -> bool {
    cost.is_nan() || cost < 0.0
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            namespace: default_namespace(),
            default_ttl_secs: default_ttl_secs(),
            default_cost_per_request: default_cost_per_request(),
            costs: HashMap::new(),
        }
    }
}

impl CacheConfig {
    /// Default TTL as a `Duration`.
    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    /// Cost table with the configured overrides applied.
    #[must_use]
    pub fn cost_table(&self) -> CostTable {
        CostTable::new(self.default_cost_per_request).with_overrides(&self.costs)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns `ConfigError::Validation` for an empty namespace, a zero TTL or a negative cost.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.namespace.trim().is_empty() {
            return Err(ConfigError::Validation("cache.namespace cannot be empty".to_string()));
        }
        if self.default_ttl_secs == 0 {
            return Err(ConfigError::Validation(
                "cache.default_ttl_secs must be greater than 0".to_string(),
            ));
        }
        if is_invalid_cost(self.default_cost_per_request) {
            return Err(ConfigError::Validation(format!(
                "cache.default_cost_per_request must be >= 0, got {}",
                self.default_cost_per_request
            )));
        }
        if let Some((model, cost)) = self.costs.iter().find(|(_, c)| is_invalid_cost(**c)) {
            return Err(ConfigError::Validation(format!(
                "cache.costs.{model} must be >= 0, got {cost}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert_eq!(config.namespace, "switchyard:cache");
        assert_eq!(config.default_ttl(), Duration::from_secs(3600));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let empty = CacheConfig { namespace: " ".into(), ..CacheConfig::default() };
        assert!(empty.validate().is_err());

        let no_ttl = CacheConfig { default_ttl_secs: 0, ..CacheConfig::default() };
        assert!(no_ttl.validate().is_err());

        let mut negative = CacheConfig::default();
        negative.costs.insert("gpt-4o".into(), -1.0);
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_cost_table_uses_overrides() {
        let mut config = CacheConfig { default_cost_per_request: 0.01, ..CacheConfig::default() };
        config.costs.insert("llama3".into(), 0.0);
        let table = config.cost_table();
        assert!(table.cost_for("llama3").abs() < f64::EPSILON);
        assert!((table.cost_for("mystery") - 0.01).abs() < f64::EPSILON);
    }
}
