//! Complete command implementation.

use crate::setup::{Settings, build_orchestrator};
use anyhow::{Result, bail};
use clap::Args;
use colored::Colorize;
use switchyard_abstraction::ProviderKind;
use switchyard_orchestrator::{CompletionRequest, Response, RouterError};

/// Arguments for `switchyard complete`.
#[derive(Args, Debug)]
pub struct CompleteArgs {
    /// Prompt to send
    pub prompt: String,

    /// Task type used to pick the route (simple, complex, creative, code, ...)
    #[arg(short, long, default_value = "default")]
    pub task: String,

    /// System prompt
    #[arg(short, long)]
    pub system: Option<String>,

    /// Force a provider (requires --model)
    #[arg(long, requires = "model")]
    pub provider: Option<ProviderKind>,

    /// Force a model (requires --provider)
    #[arg(long, requires = "provider")]
    pub model: Option<String>,

    /// Sampling temperature
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Maximum output tokens
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Skip the cache lookup
    #[arg(long)]
    pub no_cache: bool,

    /// Output the full response as JSON
    #[arg(long)]
    pub json: bool,
}

impl CompleteArgs {
    /// Builds the routing request.
    pub fn to_request(&self) -> CompletionRequest {
        let mut builder = CompletionRequest::builder(self.task.as_str());
        if let Some(system) = &self.system {
            builder = builder.system(system.clone());
        }
        builder = builder.user(self.prompt.clone()).bypass_cache(self.no_cache);
        if let Some(temperature) = self.temperature {
            builder = builder.temperature(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            builder = builder.max_tokens(max_tokens);
        }
        if let (Some(provider), Some(model)) = (self.provider, &self.model) {
            builder = builder.force(provider, model.clone());
        }
        builder.build()
    }
}

/// Execute the complete command.
pub async fn execute(settings: &Settings, args: CompleteArgs) -> Result<()> {
    let (router, _) = build_orchestrator(settings)?;
    let request = args.to_request();

    match router.complete(&request).await {
        Ok(response) if args.json => {
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Ok(response) => {
            print_response(&response);
            Ok(())
        }
        Err(e) => {
            print_failure(&e);
            bail!("{e}")
        }
    }
}

fn print_response(response: &Response) {
    println!("{}", response.content);
    eprintln!();
    eprintln!(
        "  {} {}/{}  {} tokens  {}ms{}{}",
        "✓".green(),
        response.provider.as_str().cyan(),
        response.model,
        response.token_usage.total_tokens,
        response.metadata.latency_ms,
        if response.metadata.cached { "  cached".yellow().to_string() } else { String::new() },
        match response.metadata.fallback_attempts {
            0 => String::new(),
            n => format!("  after {n} fallback(s)").as_str().dimmed().to_string(),
        },
    );
}

/// Prints one line per failed candidate.
pub fn print_failure(error: &RouterError) {
    eprintln!("{} {}", "✗".red(), "Routing failed".red().bold());
    for failure in error.failures() {
        eprintln!("  {} {} ({})", "•".dimmed(), failure, failure.kind());
    }
}
