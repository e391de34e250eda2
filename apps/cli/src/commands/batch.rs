//! Batch command implementation.
//!
//! Runs many prompts through the router with bounded concurrency.

use super::complete::print_failure;
use crate::setup::{Settings, build_orchestrator};
use anyhow::{Context, Result, bail};
use clap::Args;
use colored::Colorize;
use std::path::{Path, PathBuf};
use switchyard_orchestrator::{BatchExecutor, CompletionRequest};

/// Arguments for `switchyard batch`.
#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Input file: one prompt per line, or a JSON array of requests
    pub input_file: PathBuf,

    /// Task type for line-delimited prompts
    #[arg(short, long, default_value = "default")]
    pub task: String,

    /// Requests in flight at once (defaults to the configured value)
    #[arg(short = 'n', long)]
    pub concurrency: Option<usize>,

    /// Output responses as a JSON array
    #[arg(long)]
    pub json: bool,
}

/// Parses a batch input file.
///
/// A file whose first non-blank character is `[` is read as a JSON array of
/// requests. Anything else is one user prompt per non-empty line.
pub fn parse_input(content: &str, task: &str) -> Result<Vec<CompletionRequest>> {
    if content.trim_start().starts_with('[') {
        return serde_json::from_str(content).context("Invalid JSON request array");
    }
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| CompletionRequest::builder(task).user(line).build())
        .collect())
}

fn read_input(path: &Path, task: &str) -> Result<Vec<CompletionRequest>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    parse_input(&content, task).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Execute the batch command.
pub async fn execute(settings: &Settings, args: BatchArgs) -> Result<()> {
    let requests = read_input(&args.input_file, &args.task)?;
    if requests.is_empty() {
        bail!("No prompts found in {}", args.input_file.display());
    }

    let (router, config) = build_orchestrator(settings)?;
    let executor = BatchExecutor::new(&router, args.concurrency.unwrap_or(config.batch.concurrency));

    let responses = match executor.batch_complete(&requests).await {
        Ok(responses) => responses,
        Err(e) => {
            print_failure(&e);
            bail!("Batch aborted: {e}");
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&responses)?);
        return Ok(());
    }

    for (i, response) in responses.iter().enumerate() {
        println!(
            "{} {}",
            format!("[{}]", i + 1).as_str().dimmed(),
            format!("{}/{}", response.provider, response.model).as_str().cyan()
        );
        println!("{}", response.content);
        println!();
    }

    let cached = responses.iter().filter(|r| r.metadata.cached).count();
    let metrics = router.context().cache.metrics();
    eprintln!(
        "{} {} completed ({} cached, ~${:.4} saved)",
        "✓".green(),
        responses.len(),
        cached,
        metrics.estimated_savings
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lines_skips_blanks() {
        let requests = parse_input("first\n\n  second  \n", "simple").unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].messages()[0].content, "second");
        assert_eq!(requests[0].task_type().as_str(), "simple");
    }

    #[test]
    fn test_parse_json_array() {
        let input = r#"[
            {"task_type": "code", "messages": [{"role": "user", "content": "fizzbuzz"}]},
            {"task_type": "simple", "messages": [{"role": "user", "content": "hi"}], "options": {"bypass_cache": true}}
        ]"#;
        let requests = parse_input(input, "ignored").unwrap();
        assert_eq!(requests[0].task_type().as_str(), "code");
        assert!(requests[1].options().bypass_cache);
    }

    #[test]
    fn test_parse_bad_json() {
        assert!(parse_input("[{\"messages\": 3}]", "simple").is_err());
    }
}
