//! Builds an orchestrator from the configuration file.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use switchyard_abstraction::ProviderKind;
use switchyard_orchestrator::{
    ConfigLoader, ProviderRegistry, RouterContext, RoutingOrchestrator, SwitchyardConfig,
};
use switchyard_providers::{MockClient, ProviderConfig, ProviderFactory};
use tracing::{debug, warn};

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "switchyard.toml";

/// Global options shared by every command.
#[derive(Debug, Clone)]
pub struct Settings {
    pub config: Option<PathBuf>,
    pub mock: bool,
}

/// Loads the explicit config, else `./switchyard.toml`, else built-in defaults.
pub fn load_config(path: Option<&Path>) -> Result<SwitchyardConfig> {
    if let Some(path) = path {
        return ConfigLoader::load(path).with_context(|| format!("Failed to load {}", path.display()));
    }
    let local = Path::new(DEFAULT_CONFIG_FILE);
    if local.exists() {
        return ConfigLoader::load(local).with_context(|| format!("Failed to load {DEFAULT_CONFIG_FILE}"));
    }
    debug!("No configuration file found, using defaults");
    Ok(SwitchyardConfig::default())
}

/// Factory configuration for `kind`: its config section, or provider defaults.
pub fn provider_config(config: &SwitchyardConfig, kind: ProviderKind) -> ProviderConfig {
    config
        .providers
        .get(&kind)
        .map_or_else(|| ProviderConfig::new(kind), |section| section.to_provider_config(kind))
}

/// Creates a client for every provider that can be built. Providers missing a
/// key are skipped; the router reports them as not configured.
pub fn build_providers(config: &SwitchyardConfig, mock: bool) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    for kind in ProviderKind::ALL {
        if mock {
            registry.register(Arc::new(MockClient::impersonating(kind)));
            continue;
        }
        match ProviderFactory::create(&provider_config(config, kind)) {
            Ok(client) => registry.register(client),
            Err(e) => warn!(provider = %kind, error = %e, "Provider unavailable"),
        }
    }
    registry
}

/// Builds the orchestrator and returns it with the loaded configuration.
pub fn build_orchestrator(settings: &Settings) -> Result<(RoutingOrchestrator, SwitchyardConfig)> {
    let config = load_config(settings.config.as_deref())?;
    let table = config.routing_table()?;
    let providers = build_providers(&config, settings.mock);
    let ctx = RouterContext::in_memory(config.circuit_breaker, config.cache.clone());
    debug!(routes = table.len(), providers = providers.len(), mock = settings.mock, "Built orchestrator");
    Ok((RoutingOrchestrator::new(table, providers, ctx), config))
}
