//! Routes command implementation.

use crate::setup::{Settings, load_config};
use anyhow::Result;
use serde_json::json;
use tabled::{Table, Tabled, settings::Style};

#[derive(Tabled)]
struct RouteRow {
    #[tabled(rename = "Task")]
    task: String,
    #[tabled(rename = "#")]
    position: usize,
    #[tabled(rename = "Provider")]
    provider: String,
    #[tabled(rename = "Model")]
    model: String,
}

/// Print the routing table in priority order.
pub fn execute(settings: &Settings, json_output: bool) -> Result<()> {
    let config = load_config(settings.config.as_deref())?;
    let table = config.routing_table()?;

    if json_output {
        let routes: serde_json::Map<String, serde_json::Value> = table
            .iter()
            .map(|(task, candidates)| {
                let specs: Vec<String> = candidates.iter().map(ToString::to_string).collect();
                (task.to_string(), json!(specs))
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&routes)?);
        return Ok(());
    }

    let rows: Vec<RouteRow> = table
        .iter()
        .flat_map(|(task, candidates)| {
            candidates.iter().enumerate().map(move |(i, candidate)| RouteRow {
                task: if task.is_default() { format!("{task} (fallback)") } else { task.to_string() },
                position: i + 1,
                provider: candidate.provider.to_string(),
                model: candidate.model.clone(),
            })
        })
        .collect();

    println!("{}", Table::new(rows).with(Style::rounded()));
    Ok(())
}
