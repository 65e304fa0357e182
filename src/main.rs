use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod gateway;
mod items;
mod metrics;
mod models;
mod normalize;
mod orchestrator;
mod output;
mod prompts;
mod results;
mod retry;
#[cfg(test)]
mod testing;

use crate::config::RunConfig;
use crate::gateway::{Gateway, OpenAiGateway};
use crate::items::{BuiltinItems, ItemSource, JsonlItems};
use crate::orchestrator::Orchestrator;
use crate::output::OutputFormat;

/// Prompt technique benchmark - score models on QA, reasoning and summarization
/// with reference-based metrics
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML run file
    run_file: PathBuf,

    /// Output format: plain or json
    #[arg(short, long, default_value = "plain")]
    output: OutputFormat,

    /// Verbose output - log every item and retry
    #[arg(short, long)]
    verbose: bool,

    /// Override the number of items evaluated per task
    #[arg(long)]
    sample_limit: Option<usize>,

    /// Override the directory snapshots are written to
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("prompt_eval=debug")
    } else {
        EnvFilter::new("prompt_eval=info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = RunConfig::from_file(&args.run_file)?;
    if let Some(sample_limit) = args.sample_limit {
        config.sample_limit = sample_limit;
    }
    if let Some(output_dir) = args.output_dir {
        config.output_dir = output_dir;
    }
    config.validate().context("Invalid command line overrides")?;

    let gateway: Arc<dyn Gateway> = Arc::new(
        OpenAiGateway::from_config(&config.gateway).context("Failed to set up the model gateway")?,
    );
    let items: Arc<dyn ItemSource> = match &config.items_dir {
        Some(dir) => Arc::new(JsonlItems::new(dir)),
        None => Arc::new(BuiltinItems::default()),
    };

    tracing::info!(
        "Starting '{}': {} model(s), {} task(s), {} technique(s), up to {} item(s) each",
        config.title,
        config.models.len(),
        config.tasks.len(),
        config.techniques.len(),
        config.sample_limit
    );

    let orchestrator = Orchestrator::from_config(&config, gateway, items);
    let results = orchestrator
        .run(&config.models, &config.tasks, &config.techniques)
        .await?;

    if results.is_empty() {
        tracing::warn!("No results were recorded, skipping snapshot");
    } else {
        let path = results.to_snapshot().write_timestamped(&config.output_dir)?;
        tracing::info!("Results stored to: {}", path.display());
    }

    output::print_results(&results, args.output);

    Ok(())
}
