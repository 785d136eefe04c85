//! RSS 2.0 feeds.

use super::ListingEntry;
use super::text::{clean_html_text, clean_summary};
use crate::errors::FailureCause;
use quick_xml::de::from_str;
use serde::Deserialize;
use url::Url;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

/// Parse a feed body into listing entries. Items without a title or a
/// resolvable link are skipped.
pub fn parse_feed(body: &str, feed_url: &Url) -> Result<Vec<ListingEntry>, FailureCause> {
    let xml = scrub_html_entities_for_xml(strip_bom(body));
    let rss: Rss = from_str(&xml).map_err(|e| FailureCause::Parse(format!("rss: {e}")))?;

    let entries = rss
        .channel
        .item
        .into_iter()
        .filter_map(|it| {
            let title = clean_html_text(it.title.as_deref().unwrap_or_default());
            let link = it.link.as_deref().map(str::trim).filter(|l| !l.is_empty())?;
            let url = feed_url.join(link).ok()?;
            if title.is_empty() {
                return None;
            }
            Some(ListingEntry {
                title,
                url: url.to_string(),
                raw_date: it.pub_date.unwrap_or_default().trim().to_string(),
                raw_summary: clean_summary(it.description.as_deref().unwrap_or_default()),
            })
        })
        .collect();
    Ok(entries)
}

fn strip_bom(s: &str) -> &str {
    s.strip_prefix('\u{feff}').unwrap_or(s)
}

/// Replace HTML-only entities that are not defined in XML.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&hellip;", "…")
        .replace("&rsquo;", "’")
        .replace("&lsquo;", "‘")
        .replace("&rdquo;", "”")
        .replace("&ldquo;", "“")
        .replace("&ndash;", "–")
        .replace("&mdash;", "—")
        .replace("&eacute;", "é")
        .replace("&egrave;", "è")
        .replace("&agrave;", "à")
        .replace("&ccedil;", "ç")
}
