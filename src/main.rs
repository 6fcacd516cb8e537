//! # precis
//!
//! Summarizes every text file under the given paths through a rate-limited,
//! retrying inference backend.

#![deny(unsafe_code)]

mod backend;
mod corpus;

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::{error, info};

use precis_core::Document;
use precis_engine::{SummarizationController, SummarizerConfig, Summary};
use precis_llm::{RateLimitConfig, RateLimiter, ReliableBackend, ReliableConfig};
use precis_settings::{BackendKind, PrecisSettings};
use precis_telemetry::{init_telemetry, TelemetryConfig};

/// Summarize text documents with a hosted or local model.
#[derive(Parser, Debug)]
#[command(name = "precis", about = "Summarize every text file under the given paths")]
struct Cli {
    /// Directories or files to summarize.
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Settings file (defaults to `~/.precis/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Inference backend (`vertex` or `local`); overrides settings.
    #[arg(long, value_parser = parse_backend)]
    backend: Option<BackendKind>,

    /// Word budget per call; overrides settings.
    #[arg(long)]
    word_count_max: Option<usize>,

    /// Maximum map-reduce nesting; overrides settings.
    #[arg(long)]
    max_depth: Option<usize>,

    /// Print one JSON object per document instead of text blocks.
    #[arg(long)]
    json: bool,
}

fn parse_backend(value: &str) -> std::result::Result<BackendKind, String> {
    precis_settings::loader::parse_backend_kind(value)
        .ok_or_else(|| format!("unknown backend `{value}` (expected `vertex` or `local`)"))
}

impl Cli {
    fn apply_overrides(&self, settings: &mut PrecisSettings) {
        if let Some(kind) = self.backend {
            settings.backend.kind = kind;
        }
        if let Some(n) = self.word_count_max {
            settings.summarizer.word_count_max = n;
        }
        if let Some(depth) = self.max_depth {
            settings.summarizer.max_depth = Some(depth);
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DocumentOutput<'a> {
    source: Option<String>,
    #[serde(flatten)]
    summary: &'a Summary,
}

fn source_label(document: &Document) -> String {
    document
        .source()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<input>".to_string())
}

fn print_summary(document: &Document, summary: &Summary, json: bool) -> Result<()> {
    if json {
        let line = serde_json::to_string(&DocumentOutput {
            source: document.source().map(|p| p.display().to_string()),
            summary,
        })?;
        println!("{line}");
    } else {
        println!("== {} ==\n{}\n", source_label(document), summary.text.trim_end());
    }
    Ok(())
}

fn summarizer_config(settings: &PrecisSettings) -> Result<SummarizerConfig> {
    let word_count_max = NonZeroUsize::new(settings.summarizer.word_count_max)
        .context("wordCountMax must be at least 1")?;
    Ok(SummarizerConfig {
        word_count_max,
        max_output_tokens: settings.summarizer.max_output_tokens,
        max_depth: settings.summarizer.max_depth,
    })
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Cli::parse();

    let settings_path = args
        .settings
        .clone()
        .unwrap_or_else(precis_settings::settings_path);
    let mut settings = precis_settings::load_settings_from_path(&settings_path)
        .with_context(|| format!("failed to load settings from {}", settings_path.display()))?;
    args.apply_overrides(&mut settings);
    precis_settings::loader::validate(&settings).context("invalid settings")?;

    init_telemetry(&TelemetryConfig::from_settings(&settings.logging));

    let inner = backend::build_backend(&settings.backend).await?;
    let limiter = RateLimiter::shared(RateLimitConfig::from_settings(&settings.rate_limit));
    let reliable = Arc::new(ReliableBackend::new(
        inner,
        limiter.clone(),
        ReliableConfig::from_settings(&settings.retry),
    ));
    let controller = SummarizationController::new(reliable.clone(), summarizer_config(&settings)?);

    let mut documents = Vec::new();
    let mut skipped = 0;
    for path in &args.paths {
        let corpus = corpus::read_corpus(path);
        documents.extend(corpus.documents);
        skipped += corpus.skipped;
    }
    info!(documents = documents.len(), skipped, "corpus loaded");

    let mut failed = 0usize;
    for document in &documents {
        match controller.summarize_document(document).await {
            Ok(summary) => print_summary(document, &summary, args.json)?,
            Err(e) => {
                error!(source = %source_label(document), error = %e, "summarization failed");
                failed += 1;
            }
        }
    }

    let budget = limiter.budget();
    info!(
        summarized = documents.len() - failed,
        failed,
        retries = reliable.total_retries(),
        throttled = limiter.throttled_calls(),
        calls_in_window = budget.calls_in_window,
        window_remaining = budget.remaining(),
        "done"
    );

    Ok(if failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
