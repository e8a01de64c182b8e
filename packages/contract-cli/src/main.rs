//! contract-extract: run the contract extraction pipeline over a text file.
//!
//! Prints the outcome as JSON on stdout. Logs go to stderr so the output
//! can be piped.

mod config;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use contract_extraction::ai::OpenAI;
use contract_extraction::text::{clean_text, paragraph_count};
use contract_extraction::{Pipeline, PipelineOutcome};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "contract-extract")]
#[command(about = "Extract structured data from contract text")]
struct Cli {
    /// Text file holding the contract
    file: PathBuf,

    /// Name recorded as the document source (defaults to the file name)
    #[arg(long)]
    source_name: Option<String>,

    /// Maximum chunk size in bytes
    #[arg(long)]
    max_chunk_size: Option<usize>,

    /// Overlap between consecutive chunks in bytes
    #[arg(long)]
    chunk_overlap: Option<usize>,

    /// Per-call timeout in seconds
    #[arg(long)]
    stage_timeout: Option<u64>,

    /// Concurrent metadata calls
    #[arg(long)]
    concurrency: Option<usize>,

    /// Chat model
    #[arg(long)]
    model: Option<String>,

    /// Skip text cleanup
    #[arg(long)]
    raw: bool,

    /// Print the full run report instead of just the outcome
    #[arg(long)]
    report: bool,

    /// Print compact JSON
    #[arg(long)]
    compact: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,contract_extraction=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    apply_overrides(&mut config, &cli);

    let raw_text = tokio::fs::read_to_string(&cli.file)
        .await
        .with_context(|| format!("failed to read {}", cli.file.display()))?;
    let text = if cli.raw { raw_text } else { clean_text(&raw_text) };

    let source_name = cli.source_name.clone().unwrap_or_else(|| {
        cli.file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| cli.file.display().to_string())
    });

    tracing::info!(
        source = %source_name,
        text_len = text.len(),
        paragraphs = paragraph_count(&text),
        "Loaded contract text"
    );

    let credentials = config.credentials();
    credentials.validate()?;
    let pipeline = Pipeline::with_config(OpenAI::from_credentials(credentials), config.pipeline);

    // Ctrl-C cancels in-flight calls
    let token = CancellationToken::new();
    let on_interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let report = pipeline
        .run_report_with_cancel(&source_name, &text, token)
        .await;

    let json = match (cli.report, cli.compact) {
        (true, true) => serde_json::to_string(&report)?,
        (true, false) => serde_json::to_string_pretty(&report)?,
        (false, true) => serde_json::to_string(&report.outcome)?,
        (false, false) => serde_json::to_string_pretty(&report.outcome)?,
    };
    println!("{}", json);

    match &report.outcome {
        PipelineOutcome::Success { document } => {
            let confidence = document
                .average_confidence()
                .map(|avg| format!(", avg confidence {:.2}", avg))
                .unwrap_or_default();
            eprintln!(
                "{} {} ({} clauses, {} parties{})",
                "✓".green().bold(),
                document.title.bold(),
                document.clauses.len(),
                document.parties.len(),
                confidence
            );
            for (category, count) in document.category_counts() {
                eprintln!("  {} {}", format!("{:>3}", count).cyan(), category);
            }
            Ok(ExitCode::SUCCESS)
        }
        PipelineOutcome::Failure { stage, message } => {
            eprintln!("{} {} failed: {}", "✗".red().bold(), stage.to_string().bold(), message);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Command-line flags win over environment values.
fn apply_overrides(config: &mut Config, cli: &Cli) {
    let mut pipeline = config.pipeline.clone();
    if let Some(size) = cli.max_chunk_size {
        pipeline = pipeline.with_max_chunk_size(size);
    }
    if let Some(overlap) = cli.chunk_overlap {
        pipeline = pipeline.with_chunk_overlap(overlap);
    }
    if let Some(seconds) = cli.stage_timeout {
        pipeline = pipeline.with_stage_timeout(Duration::from_secs(seconds));
    }
    if let Some(limit) = cli.concurrency {
        pipeline = pipeline.with_concurrency_limit(limit);
    }
    config.pipeline = pipeline;

    if let Some(model) = &cli.model {
        config.openai_model = Some(model.clone());
    }
}
