//! Command-line interface definitions for infra_news.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Credentials can be provided via command-line flags or environment variables.

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for one pipeline run.
///
/// Everything about the sources and the pipeline lives in the YAML config;
/// the CLI only points at files and carries credentials.
///
/// # Examples
///
/// ```sh
/// # Basic usage
/// infra_news --config config/sources.yaml --dataset data/combined_data.csv
///
/// # With a JSON run report and a translation API key
/// TRANSLATE_API_KEY=... infra_news -c config/sources.yaml -d data/combined_data.csv -r reports/run.json
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Pipeline configuration (sources, concurrency, services)
    #[arg(short, long, env = "INFRA_NEWS_CONFIG", default_value = "config/sources.yaml")]
    pub config: PathBuf,

    /// Combined CSV dataset, read at start and rewritten at the end
    #[arg(short, long, env = "INFRA_NEWS_DATASET", default_value = "combined_data.csv")]
    pub dataset: PathBuf,

    /// Optional path for a JSON run report
    #[arg(short, long)]
    pub report: Option<PathBuf>,

    /// Optional path to the awful_aj config.yaml (overrides the pipeline config)
    #[arg(long)]
    pub llm_config: Option<PathBuf>,

    /// API key for the translation service
    #[arg(long, env = "TRANSLATE_API_KEY", hide_env_values = true)]
    pub translate_api_key: Option<String>,
}
