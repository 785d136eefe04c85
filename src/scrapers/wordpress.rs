//! WordPress REST API post listings (`/wp-json/wp/v2/posts`).

use super::ListingEntry;
use super::text::{clean_html_text, clean_summary};
use crate::errors::FailureCause;
use chrono::NaiveDate;
use scraper::{Html, Selector};
use serde::Deserialize;
use url::Url;

#[derive(Debug, Default, Deserialize)]
struct Rendered {
    #[serde(default)]
    rendered: String,
}

#[derive(Debug, Deserialize)]
struct Post {
    #[serde(default)]
    link: String,
    #[serde(default)]
    date: String,
    #[serde(default)]
    title: Rendered,
    #[serde(default)]
    excerpt: Rendered,
    #[serde(default)]
    content: Rendered,
}

/// One page of the posts listing, newer than `after`.
pub fn posts_url(base: &Url, per_page: u32, page: u32, after: NaiveDate, search: Option<&str>) -> Result<Url, FailureCause> {
    let mut url = format!(
        "{}/wp-json/wp/v2/posts?per_page={}&page={}&after={}T00:00:00",
        base.as_str().trim_end_matches('/'),
        per_page,
        page,
        after.format("%Y-%m-%d")
    );
    if let Some(term) = search.map(str::trim).filter(|t| !t.is_empty()) {
        url.push_str("&search=");
        url.push_str(&urlencoding::encode(term));
    }
    Ok(Url::parse(&url)?)
}

/// Browsers render raw JSON inside a `<pre>`; recover the payload.
fn unwrap_rendered_json(body: &str) -> String {
    let trimmed = body.trim_start();
    if !trimmed.starts_with('<') {
        return body.to_string();
    }
    let document = Html::parse_document(body);
    let pre = Selector::parse("pre").ok();
    let text = match pre.as_ref().and_then(|sel| document.select(sel).next()) {
        Some(el) => el.text().collect::<String>(),
        None => document.root_element().text().collect::<String>(),
    };
    text.trim().to_string()
}

/// Parse one page of posts.
///
/// A JSON object instead of an array is the API's error shape (for example
/// `rest_post_invalid_page_number` past the last page) and is reported as a
/// parse failure carrying its `code`.
pub fn parse_posts(body: &str) -> Result<Vec<ListingEntry>, FailureCause> {
    let json = unwrap_rendered_json(body);
    let value: serde_json::Value =
        serde_json::from_str(&json).map_err(|e| FailureCause::Parse(format!("wordpress json: {e}")))?;
    if let Some(code) = value.get("code").and_then(|c| c.as_str()) {
        return Err(FailureCause::Parse(format!("wordpress error {code}")));
    }
    let posts: Vec<Post> =
        serde_json::from_value(value).map_err(|e| FailureCause::Parse(format!("wordpress posts: {e}")))?;

    let entries = posts
        .into_iter()
        .filter(|p| !p.link.trim().is_empty())
        .map(|p| {
            let summary = if p.excerpt.rendered.trim().is_empty() {
                &p.content.rendered
            } else {
                &p.excerpt.rendered
            };
            ListingEntry {
                title: clean_html_text(&p.title.rendered),
                url: p.link.trim().to_string(),
                raw_date: p.date,
                raw_summary: clean_summary(summary),
            }
        })
        .collect();
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    const POSTS: &str = r#"[
      {
        "id": 101,
        "date": "2025-10-21T09:30:00",
        "link": "https://www.gcaa.com.gh/web/kotoka-terminal-3-upgrade/",
        "title": {"rendered": "Kotoka Terminal 3 upgrade &#8211; phase two"},
        "excerpt": {"rendered": "<p>The Authority has begun phase two of the terminal works&hellip;</p>\n"},
        "content": {"rendered": "<p>Long body</p>"}
      },
      {
        "id": 102,
        "date": "2025-10-20T12:00:00",
        "link": "https://www.gcaa.com.gh/web/runway-rehab/",
        "title": {"rendered": "Runway rehabilitation at Tamale"},
        "excerpt": {"rendered": ""},
        "content": {"rendered": "<p>Works on the Tamale runway are underway.</p>"}
      }
    ]"#;

    #[test]
    fn test_parse_posts() {
        let entries = parse_posts(POSTS).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].title, "Kotoka Terminal 3 upgrade – phase two");
        assert_eq!(entries[0].raw_date, "2025-10-21T09:30:00");
        assert_eq!(entries[0].raw_summary, "The Authority has begun phase two of the terminal works…");
        assert_eq!(entries[1].raw_summary, "Works on the Tamale runway are underway.");
    }

    #[test]
    fn test_parse_posts_wrapped_in_pre() {
        let body = format!(
            "<html><head></head><body><pre style=\"word-wrap: break-word;\">{}</pre></body></html>",
            POSTS.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
        );
        let entries = parse_posts(&body).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].url, "https://www.gcaa.com.gh/web/runway-rehab/");
    }

    #[test]
    fn test_error_object_is_parse_failure() {
        let body = r#"{"code":"rest_post_invalid_page_number","message":"The page number requested is larger than the number of pages available.","data":{"status":400}}"#;
        let err = parse_posts(body).unwrap_err();
        assert_eq!(err, FailureCause::Parse("wordpress error rest_post_invalid_page_number".into()));
    }

    #[test]
    fn test_empty_page() {
        assert!(parse_posts("[]").unwrap().is_empty());
    }

    #[test]
    fn test_posts_url() {
        let base = Url::parse("https://www.gcaa.com.gh/web").unwrap();
        let after = NaiveDate::from_ymd_opt(2025, 10, 20).unwrap();
        let url = posts_url(&base, 100, 2, after, Some("aéroport Donsin")).unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.gcaa.com.gh/web/wp-json/wp/v2/posts?per_page=100&page=2&after=2025-10-20T00:00:00&search=a%C3%A9roport%20Donsin"
        );
        let plain = posts_url(&base, 50, 1, after, None).unwrap();
        assert!(!plain.as_str().contains("search"));
    }
}
