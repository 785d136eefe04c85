//! Run configuration loaded from YAML.
//!
//! Every section except `sources` is optional and falls back to the
//! defaults below. Credentials never live here: the translation API key
//! comes from the CLI or `TRANSLATE_API_KEY`, and LLM settings from the
//! `awful_aj` config file.
//!
//! ```yaml
//! recency_window_days: 7
//! concurrency:
//!   adapters: 4
//!   adapter_timeout_secs: 90
//! translation:
//!   endpoint: http://localhost:5000
//! sources:
//!   - country: Ghana
//!     name: Ghana Civil Aviation Authority
//!     base_url: https://www.gcaa.com.gh/web
//!     format: { kind: wordpress, per_page: 100 }
//! ```

use crate::errors::ConfigError;
use crate::models::{ListingFormat, SourceDescriptor};
use crate::scrapers::fetch::DEFAULT_USER_AGENT;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Adapters running at once.
    pub adapters: usize,
    /// Articles of one source enriched at once.
    pub enrich_per_source: usize,
    /// Hard deadline for one adapter invocation.
    pub adapter_timeout_secs: u64,
    /// Wall-clock budget for the whole fetch phase.
    pub run_budget_secs: Option<u64>,
    pub translation_in_flight: usize,
    pub categorization_in_flight: usize,
    /// Spacing between categorization requests, if the provider rate limits.
    pub categorization_rpm: Option<u32>,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            adapters: 4,
            enrich_per_source: 4,
            adapter_timeout_secs: 90,
            run_budget_secs: None,
            translation_in_flight: 4,
            categorization_in_flight: 2,
            categorization_rpm: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    pub endpoint: String,
    pub max_retries: usize,
    pub request_timeout_secs: u64,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:5000".to_string(),
            max_retries: 3,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CategorizationConfig {
    /// `awful_aj` chat template name.
    pub template: String,
    /// `awful_aj` config file; defaults to `config.yaml` in its config dir.
    pub llm_config: Option<PathBuf>,
    pub max_retries: usize,
    pub request_timeout_secs: u64,
}

impl Default for CategorizationConfig {
    fn default() -> Self {
        Self {
            template: "infra_categorizer".to_string(),
            llm_config: None,
            max_retries: 3,
            request_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Chromium binary; `CHROME_BIN` overrides when set.
    pub binary: String,
    pub page_timeout_secs: u64,
    pub max_concurrent: usize,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            binary: "chromium".to_string(),
            page_timeout_secs: 45,
            max_concurrent: 2,
        }
    }
}

impl BrowserConfig {
    pub fn resolved_binary(&self) -> String {
        std::env::var("CHROME_BIN").unwrap_or_else(|_| self.binary.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

fn default_recency_window_days() -> i64 {
    7
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_recency_window_days")]
    pub recency_window_days: i64,
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,
    #[serde(default)]
    pub translation: TranslationConfig,
    #[serde(default)]
    pub categorization: CategorizationConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub http: HttpConfig,
    pub sources: Vec<SourceDescriptor>,
}

impl PipelineConfig {
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&raw).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        info!(
            sources = config.sources.len(),
            enabled = config.enabled_sources().count(),
            window_days = config.recency_window_days,
            "Loaded pipeline configuration"
        );
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceDescriptor> {
        self.sources.iter().filter(|s| s.enabled)
    }

    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_secs(self.concurrency.adapter_timeout_secs)
    }

    pub fn run_budget(&self) -> Option<Duration> {
        self.concurrency.run_budget_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.recency_window_days < 0 {
            return invalid(format!("recency_window_days must be >= 0, got {}", self.recency_window_days));
        }
        let c = &self.concurrency;
        for (name, value) in [
            ("concurrency.adapters", c.adapters),
            ("concurrency.enrich_per_source", c.enrich_per_source),
            ("concurrency.translation_in_flight", c.translation_in_flight),
            ("concurrency.categorization_in_flight", c.categorization_in_flight),
            ("browser.max_concurrent", self.browser.max_concurrent),
        ] {
            if value == 0 {
                return invalid(format!("{name} must be positive"));
            }
        }
        for (name, secs) in [
            ("concurrency.adapter_timeout_secs", c.adapter_timeout_secs),
            ("translation.request_timeout_secs", self.translation.request_timeout_secs),
            ("categorization.request_timeout_secs", self.categorization.request_timeout_secs),
            ("browser.page_timeout_secs", self.browser.page_timeout_secs),
            ("http.request_timeout_secs", self.http.request_timeout_secs),
        ] {
            if secs == 0 {
                return invalid(format!("{name} must be positive"));
            }
        }
        if c.run_budget_secs == Some(0) {
            return invalid("concurrency.run_budget_secs must be positive".into());
        }
        if c.categorization_rpm == Some(0) {
            return invalid("concurrency.categorization_rpm must be positive".into());
        }

        if self.enabled_sources().next().is_none() {
            return invalid("no enabled sources".into());
        }
        let mut names = HashSet::new();
        for source in &self.sources {
            if !names.insert(source.name.trim().to_lowercase()) {
                return invalid(format!("duplicate source name {:?}", source.name));
            }
            if let Err(e) = url::Url::parse(&source.base_url) {
                return invalid(format!("source {:?}: base_url {:?}: {e}", source.name, source.base_url));
            }
            match &source.format {
                ListingFormat::Rss { feeds } if feeds.is_empty() => {
                    return invalid(format!("source {:?}: rss format needs at least one feed", source.name));
                }
                ListingFormat::Html { pagination: Some(p), .. } if !p.pattern.contains("{page}") => {
                    return invalid(format!(
                        "source {:?}: pagination pattern {:?} lacks {{page}}",
                        source.name, p.pattern
                    ));
                }
                ListingFormat::Wordpress { per_page: 0, .. } => {
                    return invalid(format!("source {:?}: per_page must be positive", source.name));
                }
                _ => {}
            }
        }
        Ok(())
    }
}
