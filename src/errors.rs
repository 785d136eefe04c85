//! Error taxonomy for the pipeline.
//!
//! Per-source and per-article errors are contained at their stage; only
//! [`DatasetError`] and [`ConfigError`] abort a run.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Why a single adapter invocation produced nothing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("request timeout")]
    RequestTimeout,

    #[error("http error {0}")]
    Http(u16),

    #[error("selector error: {0}")]
    Selector(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("browser error: {0}")]
    Browser(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("run budget exhausted before the source completed")]
    BudgetExhausted,
}

impl FailureCause {
    pub fn from_reqwest_error(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::RequestTimeout
        } else if let Some(status) = err.status() {
            Self::Http(status.as_u16())
        } else if err.is_decode() {
            Self::Parse(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<url::ParseError> for FailureCause {
    fn from(e: url::ParseError) -> Self {
        Self::InvalidUrl(e.to_string())
    }
}

/// A source that could not be scraped. Never aborts the run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("source {source_name} failed: {cause}")]
pub struct AdapterFailure {
    pub source_name: String,
    pub cause: FailureCause,
}

impl AdapterFailure {
    pub fn new(source_name: impl Into<String>, cause: FailureCause) -> Self {
        Self {
            source_name: source_name.into(),
            cause,
        }
    }
}

/// A date string that matched none of the known formats.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DateParseError {
    #[error("empty date")]
    Empty,

    #[error("unrecognized date {0:?}")]
    Unrecognized(String),

    #[error("date out of range: {0:?}")]
    OutOfRange(String),
}

/// Translation gave up; the caller keeps the original text.
#[derive(Error, Debug)]
#[error("translation from {language} failed after {attempts} attempts: {message}")]
pub struct TranslationFailure {
    pub language: String,
    pub attempts: usize,
    pub message: String,
}

/// Categorization gave up; the caller uses the fallback label.
#[derive(Error, Debug)]
#[error("categorization failed after {attempts} attempts: {message}")]
pub struct CategorizationFailure {
    pub attempts: usize,
    pub message: String,
}

/// Loading or persisting the combined dataset failed. Fatal.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("reading dataset {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("dataset {path} is malformed: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("dataset {path} has header {found:?}, expected {expected:?}")]
    Header {
        path: PathBuf,
        found: Vec<String>,
        expected: Vec<String>,
    },

    #[error("encoding dataset rows: {0}")]
    Encode(#[from] csv::Error),

    #[error("writing dataset {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The run configuration is unreadable or inconsistent. Fatal.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}
