//! The run orchestrator.
//!
//! One run walks `Idle → Scheduling → Fetching → Enriching → Merging` and
//! ends in `Done`, `PartialFailure` or `Failed`:
//!
//! 1. **Scheduling**: enabled sources, in configured order
//! 2. **Fetching**: adapters under a bounded pool, each with a hard deadline,
//!    the phase as a whole optionally bounded by a run budget
//! 3. **Enriching**: per source, each article is dated, filtered to the
//!    recency window, translated, checked against the loaded dataset and
//!    categorized; order within a source is kept
//! 4. **Merging**: the single writer appends every article whose
//!    [`DedupKey`](crate::dedup::DedupKey) is new
//!
//! Everything runs on the calling task; concurrency comes from polling
//! bounded streams of futures, so nothing here needs to be `Send`.

use crate::api::AskAsync;
use crate::categorize::{Categorizer, Resolution};
use crate::config::PipelineConfig;
use crate::dates;
use crate::dedup::{DedupKey, SeenKeys};
use crate::errors::{AdapterFailure, DatasetError, FailureCause};
use crate::models::{Category, CategorizedArticle, NormalizedArticle, RawArticle, SourceDescriptor};
use crate::outputs::dataset::CombinedDataset;
use crate::scrapers::SourceAdapter;
use crate::translate::{TranslationService, Translator, is_english};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tokio::time::{Instant, timeout};
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Scheduling,
    Fetching,
    Enriching,
    Merging,
    Done,
    PartialFailure,
    Failed,
}

fn advance(state: &mut RunState, next: RunState) {
    info!(from = ?*state, to = ?next, "run state");
    *state = next;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Done,
    PartialFailure,
    Failed,
}

impl RunOutcome {
    /// `Done` and `PartialFailure` both require at least one source to have succeeded.
    pub fn from_counts(attempted: usize, failed: usize) -> Self {
        if failed >= attempted {
            RunOutcome::Failed
        } else if failed > 0 {
            RunOutcome::PartialFailure
        } else {
            RunOutcome::Done
        }
    }

    /// Process exit status: 0, 2 or 3. Fatal errors exit with 1 elsewhere.
    pub fn exit_status(self) -> u8 {
        match self {
            RunOutcome::Done => 0,
            RunOutcome::PartialFailure => 2,
            RunOutcome::Failed => 3,
        }
    }
}

impl From<RunOutcome> for RunState {
    fn from(outcome: RunOutcome) -> Self {
        match outcome {
            RunOutcome::Done => RunState::Done,
            RunOutcome::PartialFailure => RunState::PartialFailure,
            RunOutcome::Failed => RunState::Failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFailure {
    pub source: String,
    pub country: String,
    pub cause: String,
}

/// What one run did. Serialized as the `--report` file.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub sources_attempted: usize,
    pub sources_failed: Vec<SourceFailure>,
    pub articles_fetched: usize,
    pub articles_added: usize,
    pub duplicates: usize,
    pub date_parse_failures: usize,
    pub outside_window: usize,
    pub translation_fallbacks: usize,
    pub categorization_fallbacks: usize,
    pub duration_ms: u64,
    pub outcome: RunOutcome,
}

impl RunReport {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            sources_attempted: 0,
            sources_failed: Vec::new(),
            articles_fetched: 0,
            articles_added: 0,
            duplicates: 0,
            date_parse_failures: 0,
            outside_window: 0,
            translation_fallbacks: 0,
            categorization_fallbacks: 0,
            duration_ms: 0,
            outcome: RunOutcome::Failed,
        }
    }

    pub fn sources_succeeded(&self) -> usize {
        self.sources_attempted - self.sources_failed.len()
    }
}

#[derive(Debug, Clone)]
pub struct RunSettings {
    pub recency_window_days: i64,
    pub adapters: usize,
    pub enrich_per_source: usize,
    pub adapter_timeout: Duration,
    pub run_budget: Option<Duration>,
}

impl From<&PipelineConfig> for RunSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            recency_window_days: config.recency_window_days,
            adapters: config.concurrency.adapters,
            enrich_per_source: config.concurrency.enrich_per_source,
            adapter_timeout: config.adapter_timeout(),
            run_budget: config.run_budget(),
        }
    }
}

/// Where one raw article ended up after enrichment.
enum Disposition {
    Kept(CategorizedArticle),
    DateUnparsed,
    OutsideWindow,
    /// Already in the loaded dataset; never sent for categorization.
    KnownDuplicate,
}

struct Enriched {
    disposition: Disposition,
    translation_fallback: bool,
    categorization_fallback: bool,
}

impl Enriched {
    fn dropped(disposition: Disposition) -> Self {
        Self {
            disposition,
            translation_fallback: false,
            categorization_fallback: false,
        }
    }
}

pub struct Orchestrator<A, T, C> {
    adapter: A,
    translator: Translator<T>,
    categorizer: Categorizer<C>,
    settings: RunSettings,
}

impl<A, T, C> Orchestrator<A, T, C>
where
    A: SourceAdapter,
    T: TranslationService,
    C: AskAsync<Response = String>,
{
    pub fn new(adapter: A, translator: Translator<T>, categorizer: Categorizer<C>, settings: RunSettings) -> Self {
        Self {
            adapter,
            translator,
            categorizer,
            settings,
        }
    }

    /// Load the dataset at `path`, run, and write the dataset back.
    pub async fn run_and_persist(
        &self,
        sources: &[SourceDescriptor],
        path: &Path,
        now: DateTime<Utc>,
    ) -> Result<RunReport, DatasetError> {
        let mut dataset = CombinedDataset::load(path).await?;
        let report = self.run(sources, &mut dataset, now).await;
        dataset.save_atomic(path).await?;
        Ok(report)
    }

    /// One full pass over `sources`, merging into `dataset`.
    #[instrument(level = "info", skip_all, fields(sources = sources.len(), rows_before = dataset.len()))]
    pub async fn run(&self, sources: &[SourceDescriptor], dataset: &mut CombinedDataset, now: DateTime<Utc>) -> RunReport {
        let t0 = Instant::now();
        let mut state = RunState::Idle;
        let mut report = RunReport::new(now);

        advance(&mut state, RunState::Scheduling);
        let scheduled: Vec<&SourceDescriptor> = sources.iter().filter(|s| s.enabled).collect();
        report.sources_attempted = scheduled.len();
        info!(scheduled = scheduled.len(), skipped = sources.len() - scheduled.len(), "Scheduled sources");

        advance(&mut state, RunState::Fetching);
        let deadline = self.settings.run_budget.map(|budget| t0 + budget);
        let mut fetched: Vec<(usize, &SourceDescriptor, Result<Vec<RawArticle>, AdapterFailure>)> =
            stream::iter(scheduled.into_iter().enumerate())
                .map(|(i, source)| async move { (i, source, self.fetch_one(source, deadline).await) })
                .buffer_unordered(self.settings.adapters.max(1))
                .collect()
                .await;
        fetched.sort_by_key(|(i, ..)| *i);

        let mut batches = Vec::new();
        for (_, source, result) in fetched {
            match result {
                Ok(raws) => {
                    report.articles_fetched += raws.len();
                    batches.push((source, raws));
                }
                Err(failure) => {
                    warn!(source = %source.name, country = %source.country, cause = %failure.cause, "Source failed");
                    report.sources_failed.push(SourceFailure {
                        source: failure.source_name,
                        country: source.country.clone(),
                        cause: failure.cause.to_string(),
                    });
                }
            }
        }
        info!(
            succeeded = batches.len(),
            failed = report.sources_failed.len(),
            articles = report.articles_fetched,
            "Fetching complete"
        );

        advance(&mut state, RunState::Enriching);
        let mut seen = SeenKeys::from_rows(dataset.rows());
        debug!(known_keys = seen.len(), "Seeded dedup keys from dataset");
        let known = &seen;
        let mut enriched: Vec<(usize, Vec<Enriched>)> = stream::iter(batches.into_iter().enumerate())
            .map(|(i, (source, raws))| async move { (i, self.enrich_source(source, raws, known, now).await) })
            .buffer_unordered(self.settings.adapters.max(1))
            .collect()
            .await;
        enriched.sort_by_key(|(i, _)| *i);

        advance(&mut state, RunState::Merging);
        for item in enriched.into_iter().flat_map(|(_, items)| items) {
            report.translation_fallbacks += usize::from(item.translation_fallback);
            report.categorization_fallbacks += usize::from(item.categorization_fallback);
            match item.disposition {
                Disposition::Kept(article) => {
                    if seen.is_duplicate(&article) {
                        debug!(url = %article.article.url, source = %article.article.source, "duplicate discarded");
                        report.duplicates += 1;
                    } else {
                        seen.register(&article);
                        dataset.push(article.into_row());
                        report.articles_added += 1;
                    }
                }
                Disposition::KnownDuplicate => report.duplicates += 1,
                Disposition::DateUnparsed => report.date_parse_failures += 1,
                Disposition::OutsideWindow => report.outside_window += 1,
            }
        }

        report.outcome = RunOutcome::from_counts(report.sources_attempted, report.sources_failed.len());
        report.duration_ms = t0.elapsed().as_millis() as u64;
        advance(&mut state, report.outcome.into());
        info!(
            added = report.articles_added,
            duplicates = report.duplicates,
            rows = dataset.len(),
            outcome = ?report.outcome,
            "Run complete"
        );
        report
    }

    /// One adapter call, bounded by its own deadline and what is left of the run budget.
    async fn fetch_one(&self, source: &SourceDescriptor, deadline: Option<Instant>) -> Result<Vec<RawArticle>, AdapterFailure> {
        let per_call = self.settings.adapter_timeout;
        let (limit, budget_bound) = match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Err(AdapterFailure::new(&source.name, FailureCause::BudgetExhausted));
                }
                (remaining.min(per_call), remaining < per_call)
            }
            None => (per_call, false),
        };

        let t0 = Instant::now();
        let result = match timeout(limit, self.adapter.fetch(source)).await {
            Ok(result) => result,
            Err(_) if budget_bound => Err(AdapterFailure::new(&source.name, FailureCause::BudgetExhausted)),
            Err(_) => Err(AdapterFailure::new(&source.name, FailureCause::Timeout(per_call))),
        };
        if let Ok(raws) = &result {
            info!(source = %source.name, articles = raws.len(), elapsed_ms = t0.elapsed().as_millis(), "Source fetched");
        }
        result
    }

    #[instrument(level = "info", skip_all, fields(source = %source.name, articles = raws.len()))]
    async fn enrich_source(
        &self,
        source: &SourceDescriptor,
        raws: Vec<RawArticle>,
        known: &SeenKeys,
        now: DateTime<Utc>,
    ) -> Vec<Enriched> {
        stream::iter(raws)
            .map(|raw| self.enrich_one(source, raw, known, now))
            .buffered(self.settings.enrich_per_source.max(1))
            .collect()
            .await
    }

    async fn enrich_one(&self, source: &SourceDescriptor, raw: RawArticle, known: &SeenKeys, now: DateTime<Utc>) -> Enriched {
        let date_iso = match dates::normalize(&raw.raw_date, source.date_locale(), now) {
            Ok(date) => date,
            Err(e) => {
                debug!(url = %raw.url, error = %e, "dropping article with unusable date");
                return Enriched::dropped(Disposition::DateUnparsed);
            }
        };
        if !dates::is_recent(date_iso, now.date_naive(), self.settings.recency_window_days) {
            debug!(url = %raw.url, %date_iso, "outside recency window");
            return Enriched::dropped(Disposition::OutsideWindow);
        }

        // A stored translation may differ from today's, or from the original
        // text kept when translation failed; the source and URL still match.
        let translated = !is_english(&raw.language);
        if translated && known.contains_source_url(&raw.source, &raw.url) {
            debug!(url = %raw.url, "already in dataset; skipping translation");
            return Enriched::dropped(Disposition::KnownDuplicate);
        }

        let (title, title_fell_back) = self.translate_or_keep(&raw.title, &raw.language).await;
        let (summary, summary_fell_back) = self.translate_or_keep(&raw.raw_summary, &raw.language).await;
        let translation_fallback = title_fell_back || summary_fell_back;

        if known.contains(&DedupKey::new(&raw.url, &title)) {
            debug!(url = %raw.url, "already in dataset; skipping categorization");
            return Enriched {
                disposition: Disposition::KnownDuplicate,
                translation_fallback,
                categorization_fallback: false,
            };
        }

        let (category, categorization_fallback) = match source.category {
            Some(preset) => (preset, false),
            None => match self.categorizer.categorize(&title, &summary).await {
                Ok((category, resolution)) => (category, resolution == Resolution::Fallback),
                Err(e) => {
                    warn!(url = %raw.url, error = %e, fallback = %Category::FALLBACK, "categorization failed");
                    (Category::FALLBACK, true)
                }
            },
        };

        Enriched {
            disposition: Disposition::Kept(CategorizedArticle {
                article: NormalizedArticle {
                    country: raw.country,
                    source: raw.source,
                    url: raw.url,
                    date_iso,
                    title,
                    summary,
                },
                category,
            }),
            translation_fallback,
            categorization_fallback,
        }
    }

    /// Translated text, or the original and `true` when translation gave up.
    async fn translate_or_keep(&self, text: &str, language: &str) -> (String, bool) {
        match self.translator.translate(text, language).await {
            Ok(translated) => (translated, false),
            Err(e) => {
                warn!(error = %e, "translation failed; keeping original text");
                (text.to_string(), true)
            }
        }
    }
}
