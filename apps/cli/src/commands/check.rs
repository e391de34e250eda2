//! Check command implementation.

use crate::setup::{Settings, load_config, provider_config};
use anyhow::Result;
use colored::Colorize;
use serde_json::json;
use switchyard_abstraction::ProviderKind;
use tabled::{Table, Tabled, settings::Style};

#[derive(Tabled)]
struct ProviderRow {
    #[tabled(rename = "Provider")]
    provider: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Timeout")]
    timeout: String,
}

/// Validate the configuration and report which providers can be built.
pub fn execute(settings: &Settings, json_output: bool) -> Result<()> {
    let config = load_config(settings.config.as_deref())?;
    let table = config.routing_table()?;

    let providers: Vec<(ProviderKind, Result<(), String>, Option<String>, u64)> = ProviderKind::ALL
        .into_iter()
        .filter(|kind| *kind != ProviderKind::Mock)
        .map(|kind| {
            let provider = provider_config(&config, kind);
            let status = if settings.mock {
                Ok(())
            } else {
                provider.resolve_api_key().map(|_| ()).map_err(|e| e.to_string())
            };
            let timeout = provider.timeout_secs.unwrap_or_else(|| kind.default_timeout().as_secs());
            (kind, status, provider.key_env_var().map(str::to_string), timeout)
        })
        .collect();

    if json_output {
        let report = json!({
            "valid": true,
            "routes": table.len(),
            "circuit_breaker": config.circuit_breaker,
            "cache": {
                "enabled": config.cache.enabled,
                "namespace": config.cache.namespace,
                "default_ttl_secs": config.cache.default_ttl_secs,
            },
            "batch_concurrency": config.batch.concurrency,
            "providers": providers.iter().map(|(kind, status, key, timeout)| json!({
                "provider": kind,
                "ready": status.is_ok(),
                "error": status.as_ref().err(),
                "key_env": key,
                "timeout_secs": timeout,
            })).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{} Configuration is valid", "✓".green());
    println!(
        "  {} routes, breaker {}/{} over {}s, cache {} (ttl {}s)",
        table.len(),
        config.circuit_breaker.failure_threshold,
        config.circuit_breaker.success_threshold,
        config.circuit_breaker.timeout_secs,
        if config.cache.enabled { "on" } else { "off" },
        config.cache.default_ttl_secs,
    );
    println!();

    let rows: Vec<ProviderRow> = providers
        .into_iter()
        .map(|(kind, status, key, timeout)| ProviderRow {
            provider: kind.to_string(),
            status: match status {
                Ok(()) => "ready".green().to_string(),
                Err(_) => "missing key".yellow().to_string(),
            },
            key: key.unwrap_or_else(|| "-".to_string()),
            timeout: format!("{timeout}s"),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));
    Ok(())
}
