//! Run report output.
//!
//! The [`RunReport`] is always logged; when `--report` is given it is also
//! written as JSON so schedulers can alert on failed sources without
//! scraping logs.

use crate::pipeline::{RunOutcome, RunReport};
use itertools::Itertools;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{error, info, instrument, warn};

/// `"KeNHA (http error 503); Faso7 (timed out after 90s)"`, or `"none"`.
pub fn failure_summary(report: &RunReport) -> String {
    if report.sources_failed.is_empty() {
        return "none".to_string();
    }
    report
        .sources_failed
        .iter()
        .map(|f| format!("{} ({})", f.source, f.cause))
        .join("; ")
}

/// Emit the end-of-run summary at a level matching the outcome.
pub fn log_summary(report: &RunReport) {
    let failed = failure_summary(report);
    macro_rules! summary {
        ($level:ident) => {
            $level!(
                outcome = ?report.outcome,
                attempted = report.sources_attempted,
                succeeded = report.sources_succeeded(),
                fetched = report.articles_fetched,
                added = report.articles_added,
                duplicates = report.duplicates,
                date_parse_failures = report.date_parse_failures,
                outside_window = report.outside_window,
                translation_fallbacks = report.translation_fallbacks,
                categorization_fallbacks = report.categorization_fallbacks,
                duration_ms = report.duration_ms,
                failed_sources = %failed,
                "Run summary"
            )
        };
    }
    match report.outcome {
        RunOutcome::Done => summary!(info),
        RunOutcome::PartialFailure => summary!(warn),
        RunOutcome::Failed => summary!(error),
    }
}

/// Write the report as pretty JSON, creating the parent directory if needed.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_report(report: &RunReport, path: &Path) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(report)?;
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if let Err(e) = fs::create_dir_all(dir).await {
            error!(dir = %dir.display(), error = %e, "Failed to create report dir");
            return Err(e.into());
        }
    }
    fs::write(path, json).await?;
    info!("Wrote run report");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::SourceFailure;
    use chrono::{TimeZone, Utc};

    fn report(failures: &[(&str, &str)]) -> RunReport {
        RunReport {
            started_at: Utc.with_ymd_and_hms(2025, 10, 27, 6, 0, 0).unwrap(),
            sources_attempted: 3,
            sources_failed: failures
                .iter()
                .map(|(s, c)| SourceFailure {
                    source: s.to_string(),
                    country: "Kenya".into(),
                    cause: c.to_string(),
                })
                .collect(),
            articles_fetched: 12,
            articles_added: 7,
            duplicates: 3,
            date_parse_failures: 1,
            outside_window: 1,
            translation_fallbacks: 0,
            categorization_fallbacks: 2,
            duration_ms: 4200,
            outcome: if failures.is_empty() {
                RunOutcome::Done
            } else {
                RunOutcome::PartialFailure
            },
        }
    }

    #[test]
    fn test_failure_summary() {
        assert_eq!(failure_summary(&report(&[])), "none");
        assert_eq!(
            failure_summary(&report(&[("KeNHA", "http error 503"), ("Faso7", "timed out after 90s")])),
            "KeNHA (http error 503); Faso7 (timed out after 90s)"
        );
    }

    #[tokio::test]
    async fn test_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("run.json");
        write_report(&report(&[("KeNHA", "http error 503")]), &path).await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["articles_added"], 7);
        assert_eq!(json["outcome"], "partial_failure");
        assert_eq!(json["sources_failed"][0]["source"], "KeNHA");
    }
}
