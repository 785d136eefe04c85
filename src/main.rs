//! # infra_news
//!
//! An ingestion pipeline that aggregates infrastructure-project news from many
//! heterogeneous sources into one deduplicated, categorized, recency-filtered
//! CSV dataset.
//!
//! ## Features
//!
//! - One configurable adapter for HTML listings, RSS feeds and WordPress
//!   REST listings, fetched over HTTP or through headless Chromium
//! - Date normalization across ISO, RFC 2822, numeric, English and French
//!   month-name and relative formats, with a trailing recency window
//! - Translation of non-English titles and summaries to English
//! - Classification into a fixed label set through an OpenAI-compatible LLM
//! - Deduplication within and across runs, atomic dataset persistence
//!
//! ## Usage
//!
//! ```sh
//! infra_news --config config/sources.yaml --dataset data/combined_data.csv
//! ```
//!
//! Exit status: 0 all sources succeeded, 2 some sources failed, 3 every source
//! failed, 1 fatal error (configuration or dataset I/O).
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Fetching**: Run every enabled source adapter under a bounded pool
//! 2. **Enriching**: Date, filter, translate and categorize each article
//! 3. **Merging**: Append new articles to the combined dataset
//! 4. **Output**: Atomically rewrite the dataset and report the run

use chrono::{Days, NaiveDate, Utc};
use clap::Parser;
use std::error::Error;
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod categorize;
mod cli;
mod config;
mod dates;
mod dedup;
mod errors;
mod models;
mod outputs;
mod pipeline;
mod scrapers;
mod throttle;
mod translate;
mod utils;

use api::LlmAsk;
use categorize::{Categorizer, CategorizerSettings};
use cli::Cli;
use config::PipelineConfig;
use outputs::report::{log_summary, write_report};
use pipeline::{Orchestrator, RunSettings};
use scrapers::ConfiguredAdapter;
use scrapers::fetch::{BrowserFetcher, Fetcher, HttpFetcher};
use throttle::Throttle;
use translate::{LibreTranslate, Translator, TranslatorSettings};
use utils::ensure_writable_dir;

const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

#[tokio::main]
#[instrument]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("infra_news starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args.config, ?args.dataset, ?args.report, "Parsed CLI arguments");

    let config = PipelineConfig::load(&args.config)?;

    // Early check: ensure the dataset directory is writable
    let dataset_dir = args
        .dataset
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    if let Err(e) = ensure_writable_dir(dataset_dir).await {
        error!(
            path = %dataset_dir.display(),
            error = %e,
            "Dataset directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    // ---- Load template & LLM config ----
    let template = awful_aj::template::load_template(&config.categorization.template).await?;
    info!(template = %config.categorization.template, "Loaded template");
    let llm_config_file = match args.llm_config.clone().or_else(|| config.categorization.llm_config.clone()) {
        Some(path) => path,
        None => awful_aj::config_dir()?.join("config.yaml"),
    };
    let llm_config_path = llm_config_file
        .to_str()
        .ok_or("LLM config path is not valid UTF-8")?;
    let llm_config = awful_aj::config::load_config(llm_config_path)
        .map_err(|e| format!("loading LLM config {llm_config_path}: {e}"))?;
    info!(llm_config_path, "Loaded LLM configuration");

    // ---- Wire the pipeline ----
    let client = HttpFetcher::build_client(
        &config.http.user_agent,
        Duration::from_secs(config.http.request_timeout_secs),
    )?;
    let fetcher = Fetcher {
        http: HttpFetcher::new(client.clone()),
        browser: BrowserFetcher::new(
            config.browser.resolved_binary(),
            Duration::from_secs(config.browser.page_timeout_secs),
            config.browser.max_concurrent,
        ),
    };

    let now = Utc::now();
    let listed_since = now
        .date_naive()
        .checked_sub_days(Days::new(config.recency_window_days.unsigned_abs()))
        .unwrap_or(NaiveDate::MIN);
    let adapter = ConfiguredAdapter::new(fetcher, listed_since);

    let translator = Translator::new(
        LibreTranslate::new(client, &config.translation.endpoint, args.translate_api_key.clone()),
        Throttle::new("translation", config.concurrency.translation_in_flight, None),
        TranslatorSettings {
            max_retries: config.translation.max_retries,
            base_delay: RETRY_BASE_DELAY,
            request_timeout: Duration::from_secs(config.translation.request_timeout_secs),
        },
    );

    let categorizer = Categorizer::new(
        LlmAsk {
            config: llm_config,
            template,
        },
        Throttle::new(
            "categorization",
            config.concurrency.categorization_in_flight,
            config.concurrency.categorization_rpm,
        ),
        CategorizerSettings {
            max_retries: config.categorization.max_retries,
            base_delay: RETRY_BASE_DELAY,
            request_timeout: Duration::from_secs(config.categorization.request_timeout_secs),
        },
    );

    let orchestrator = Orchestrator::new(adapter, translator, categorizer, RunSettings::from(&config));

    // ---- Run ----
    let report = orchestrator
        .run_and_persist(&config.sources, &args.dataset, now)
        .await?;
    log_summary(&report);

    if let Some(path) = &args.report {
        if let Err(e) = write_report(&report, path).await {
            error!(path = %path.display(), error = %e, "Failed to write run report");
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(ExitCode::from(report.outcome.exit_status()))
}
