//! Classification of articles into the fixed [`Category`] set.
//!
//! Each article costs one remote call carrying only its title and the head of
//! its summary. Whatever comes back is coerced onto the label set; an
//! unusable reply or an exhausted retry budget yields
//! [`Category::FALLBACK`] instead of an unset category.

use crate::api::{AskAsync, RetryAsk, Throttled};
use crate::errors::CategorizationFailure;
use crate::models::Category;
use crate::throttle::Throttle;
use crate::utils::{truncate_chars, truncate_for_log};
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Summary characters sent along with the title.
const PROMPT_SUMMARY_CHARS: usize = 500;

/// Label words searched for in free-form replies, most specific first.
static LABEL_MENTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(smart[\s-]?city|special economic zone|sez|port|rail(?:way)?|highway|economic|energy|technology|infrastructure)\b")
        .unwrap()
});

/// How a reply was mapped onto the label set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The reply was a label or a known synonym.
    Exact,
    /// A label was found inside a longer reply.
    Mentioned,
    /// Nothing usable; the fallback label was applied.
    Fallback,
}

/// Map a raw service reply onto the label set.
pub fn coerce_reply(reply: &str) -> (Category, Resolution) {
    let cleaned = strip_reply(reply);
    if let Some(cat) = Category::from_label(&cleaned) {
        return (cat, Resolution::Exact);
    }
    if let Some(m) = LABEL_MENTION.find(&cleaned) {
        if let Some(cat) = Category::from_label(m.as_str()) {
            return (cat, Resolution::Mentioned);
        }
    }
    (Category::FALLBACK, Resolution::Fallback)
}

/// Drop code fences, JSON brackets and a leading `category:` key.
fn strip_reply(reply: &str) -> String {
    let mut s = reply.trim();
    if let Some(rest) = s.strip_prefix("```") {
        s = rest.trim_start_matches("json").trim();
    }
    let s = s.trim_end_matches("```").trim();
    let s = s.trim_matches(|c: char| matches!(c, '[' | ']' | '{' | '}' | '"' | '\'' | '.' | ' ' | '\n'));
    let s = match s.split_once(':') {
        Some((key, value)) if key.trim_matches('"').eq_ignore_ascii_case("category") => {
            value.trim().trim_matches(|c: char| c == '"' || c == '\'' || c == '}')
        }
        _ => s,
    };
    s.trim().to_string()
}

/// What each label covers. Sent with every article so the reply lines up
/// with the synonyms [`Category::from_label`] accepts.
const CLASSIFICATION_RULES: &str = "\
You classify African infrastructure and development projects. Focus on actual projects, not general corporate news.

Categories:
- Port: ports, airports, maritime, shipping, cargo terminals, harbours, vessels
- Rail: railways, trains, metro, rail tracks, stations, locomotives
- Highway: roads, highways, bridges, expressways, motorways
- SEZ: special economic zones, industrial parks, free trade zones
- Smart City: smart city initiatives, digital urban infrastructure, e-government, urban tech
- Economic: finance, trade, investment, banking, stock exchange, commerce, export and import
- Energy: solar, wind, hydropower, nuclear, thermal, power plants, electricity, grid, dams
- Technology: broadband, 5G, data centers, ICT, fiber optic, telecommunications, digital transformation
- Infrastructure: water, housing, buildings, general construction, waste, and anything that fits nothing above

Rules:
- Port, Rail, Highway and SEZ need explicit keywords; without them use Infrastructure.
- When in doubt, answer Infrastructure.";

/// The user turn sent to the classifier: the article first, then the rules.
pub fn build_prompt(title: &str, summary: &str) -> String {
    format!(
        "Title: {}\nSummary: {}\n\n{CLASSIFICATION_RULES}\n\nAnswer with exactly one of: {}. No explanation.",
        title.trim(),
        truncate_chars(summary.trim(), PROMPT_SUMMARY_CHARS),
        Category::ALL.iter().map(|c| c.label()).collect::<Vec<_>>().join(", ")
    )
}

#[derive(Debug, Clone)]
pub struct CategorizerSettings {
    pub max_retries: usize,
    pub base_delay: Duration,
    pub request_timeout: Duration,
}

impl Default for CategorizerSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            request_timeout: Duration::from_secs(60),
        }
    }
}

pub struct Categorizer<C> {
    classifier: C,
    throttle: Throttle,
    settings: CategorizerSettings,
}

impl<C> Categorizer<C>
where
    C: AskAsync<Response = String>,
{
    pub fn new(classifier: C, throttle: Throttle, settings: CategorizerSettings) -> Self {
        Self {
            classifier,
            throttle,
            settings,
        }
    }

    #[cfg(test)]
    pub(crate) fn classifier(&self) -> &C {
        &self.classifier
    }

    /// Classify one article. A [`CategorizationFailure`] means retries ran
    /// out; callers apply [`Category::FALLBACK`].
    #[instrument(level = "debug", skip_all, fields(title = %truncate_for_log(title, 80)))]
    pub async fn categorize(&self, title: &str, summary: &str) -> Result<(Category, Resolution), CategorizationFailure> {
        let prompt = build_prompt(title, summary);
        let throttled = Throttled::new(&self.classifier, &self.throttle, self.settings.request_timeout);
        let api = RetryAsk::new(throttled, self.settings.max_retries, self.settings.base_delay);

        match api.ask(&prompt).await {
            Ok(reply) => {
                let (category, resolution) = coerce_reply(&reply);
                match resolution {
                    Resolution::Fallback => warn!(
                        reply = %truncate_for_log(&reply, 120),
                        fallback = %category,
                        "classifier reply outside label set"
                    ),
                    _ => debug!(%category, ?resolution, "categorized"),
                }
                Ok((category, resolution))
            }
            Err(e) => Err(CategorizationFailure {
                attempts: api.max_attempts(),
                message: e.to_string(),
            }),
        }
    }
}
