//! Translation of non-English titles and summaries to English.
//!
//! The remote service is reached through [`TranslationService`]; the
//! production implementation talks to a LibreTranslate-compatible endpoint.
//! [`Translator`] adds the pass-through rules, the shared throttle and the
//! retry policy on top.

use crate::api::{AskAsync, BoxError, RetryAsk, Throttled};
use crate::errors::TranslationFailure;
use crate::throttle::Throttle;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// A remote translator: `text` in `source_lang` to English.
pub trait TranslationService {
    async fn translate(&self, text: &str, source_lang: &str) -> Result<String, BoxError>;
}

/// `true` for `en` and regional variants such as `en-GB`.
pub fn is_english(lang: &str) -> bool {
    let lang = lang.trim();
    lang.is_empty()
        || lang.eq_ignore_ascii_case("en")
        || lang
            .get(..3)
            .is_some_and(|p| p.eq_ignore_ascii_case("en-") || p.eq_ignore_ascii_case("en_"))
}

/// Binds a source language so a service call fits the [`AskAsync`] seam.
struct BoundTranslation<'a, S> {
    service: &'a S,
    source_lang: &'a str,
}

impl<S: TranslationService> AskAsync for BoundTranslation<'_, S> {
    type Response = String;

    async fn ask(&self, text: &str) -> Result<String, BoxError> {
        self.service.translate(text, self.source_lang).await
    }
}

#[derive(Debug, Clone)]
pub struct TranslatorSettings {
    pub max_retries: usize,
    pub base_delay: Duration,
    pub request_timeout: Duration,
}

impl Default for TranslatorSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            request_timeout: Duration::from_secs(30),
        }
    }
}

pub struct Translator<S> {
    service: S,
    throttle: Throttle,
    settings: TranslatorSettings,
}

impl<S: TranslationService> Translator<S> {
    pub fn new(service: S, throttle: Throttle, settings: TranslatorSettings) -> Self {
        Self {
            service,
            throttle,
            settings,
        }
    }

    /// English text for `text`, or a [`TranslationFailure`] once retries are
    /// exhausted. English and empty input pass through without a remote call.
    #[instrument(level = "debug", skip_all, fields(lang = %source_lang, bytes = text.len()))]
    pub async fn translate(&self, text: &str, source_lang: &str) -> Result<String, TranslationFailure> {
        if is_english(source_lang) || text.trim().is_empty() {
            return Ok(text.to_string());
        }

        let bound = BoundTranslation {
            service: &self.service,
            source_lang,
        };
        let throttled = Throttled::new(bound, &self.throttle, self.settings.request_timeout);
        let api = RetryAsk::new(throttled, self.settings.max_retries, self.settings.base_delay);

        match api.ask(text).await {
            Ok(translated) if !translated.trim().is_empty() => {
                debug!("translated");
                Ok(translated)
            }
            Ok(_) => Err(TranslationFailure {
                language: source_lang.to_string(),
                attempts: api.max_attempts(),
                message: "service returned empty text".to_string(),
            }),
            Err(e) => Err(TranslationFailure {
                language: source_lang.to_string(),
                attempts: api.max_attempts(),
                message: e.to_string(),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslateResponse {
    translated_text: String,
}

/// LibreTranslate-compatible HTTP client (`POST {endpoint}/translate`).
#[derive(Debug, Clone)]
pub struct LibreTranslate {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl LibreTranslate {
    pub fn new(client: reqwest::Client, endpoint: &str, api_key: Option<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

impl TranslationService for LibreTranslate {
    async fn translate(&self, text: &str, source_lang: &str) -> Result<String, BoxError> {
        // Regional tags like "fr-BF" are sent as their base language.
        let source = source_lang.split(['-', '_']).next().unwrap_or(source_lang);
        let body = TranslateRequest {
            q: text,
            source,
            target: "en",
            format: "text",
            api_key: self.api_key.as_deref(),
        };
        let resp = self
            .client
            .post(format!("{}/translate", self.endpoint))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        let parsed: TranslateResponse = resp.json().await?;
        Ok(parsed.translated_text)
    }
}
