//! Text cleanup shared by every listing format.

use crate::utils::{collapse_whitespace, truncate_chars};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;

/// Space left in front of closing punctuation by joining text nodes.
static SPACE_BEFORE_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+([.,)])").unwrap());

/// Longest summary kept, in characters, including the `...` marker.
pub const SUMMARY_MAX_CHARS: usize = 500;

/// Strip tags, decode entities and collapse whitespace.
///
/// Feed descriptions and WordPress `rendered` fields arrive as HTML
/// fragments; running them through the HTML parser handles both the markup
/// and the entity decoding.
pub fn clean_html_text(s: &str) -> String {
    if !s.contains(['<', '&']) {
        return collapse_whitespace(s);
    }
    let fragment = Html::parse_fragment(s);
    let text = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    SPACE_BEFORE_PUNCT.replace_all(&collapse_whitespace(&text), "$1").into_owned()
}

/// Cleaned summary, truncated to [`SUMMARY_MAX_CHARS`].
pub fn clean_summary(s: &str) -> String {
    truncate_chars(&clean_html_text(s), SUMMARY_MAX_CHARS)
}

/// Case-insensitive keyword match against title and summary.
/// An empty keyword list keeps everything.
pub fn is_relevant(title: &str, summary: &str, keywords: &[String]) -> bool {
    if keywords.is_empty() {
        return true;
    }
    let haystack = format!("{title} {summary}").to_lowercase();
    keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .any(|k| haystack.contains(&k))
}
