//! Article identity and the seen-key index.
//!
//! An article's identity is its [`DedupKey`]: the URL without scheme, `www.`,
//! query, fragment or trailing slash, plus the title with case and
//! whitespace folded. [`SeenKeys`] is rebuilt from the persisted dataset at
//! the start of each run so repeats are caught across runs as well as within
//! one.

use crate::models::{CategorizedArticle, DatasetRow};
use crate::utils::collapse_whitespace;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    url: String,
    title: String,
}

impl DedupKey {
    pub fn new(url: &str, title: &str) -> Self {
        Self {
            url: normalize_url(url),
            title: normalize_title(title),
        }
    }

    pub fn of_row(row: &DatasetRow) -> Self {
        Self::new(&row.url, &row.title)
    }

    pub fn of_article(article: &CategorizedArticle) -> Self {
        Self::new(&article.article.url, &article.article.title)
    }
}

/// Case-fold and strip everything that does not change which page is meant.
pub fn normalize_url(url: &str) -> String {
    let s = collapse_whitespace(url).to_lowercase();
    let s = match s.split_once("://") {
        Some((_, rest)) => rest.to_string(),
        None => s,
    };
    let s = s.split(['?', '#']).next().unwrap_or_default();
    let s = s.strip_prefix("www.").unwrap_or(s);
    s.trim_end_matches('/').to_string()
}

pub fn normalize_title(title: &str) -> String {
    collapse_whitespace(title).to_lowercase()
}

/// Keys already present in the dataset or accepted earlier in this run.
///
/// Alongside the full keys, every `(source, normalized URL)` pair is kept.
/// Translated titles are not stable across runs, so articles from
/// non-English sources are also matched on that pair.
#[derive(Debug, Default)]
pub struct SeenKeys {
    keys: HashSet<DedupKey>,
    source_urls: HashSet<(String, String)>,
}

fn source_url(source: &str, url: &str) -> (String, String) {
    (normalize_title(source), normalize_url(url))
}

impl SeenKeys {
    pub fn from_rows<'a>(rows: impl IntoIterator<Item = &'a DatasetRow>) -> Self {
        let mut seen = Self::default();
        for row in rows {
            seen.keys.insert(DedupKey::of_row(row));
            seen.source_urls.insert(source_url(&row.source, &row.url));
        }
        seen
    }

    pub fn contains(&self, key: &DedupKey) -> bool {
        self.keys.contains(key)
    }

    /// `true` if `source` already has an article at `url`, whatever its title.
    pub fn contains_source_url(&self, source: &str, url: &str) -> bool {
        self.source_urls.contains(&source_url(source, url))
    }

    pub fn is_duplicate(&self, article: &CategorizedArticle) -> bool {
        self.contains(&DedupKey::of_article(article))
    }

    /// Record the article's key. Returns `false` if it was already present,
    /// in which case the earlier record stands.
    pub fn register(&mut self, article: &CategorizedArticle) -> bool {
        let a = &article.article;
        self.source_urls.insert(source_url(&a.source, &a.url));
        self.keys.insert(DedupKey::of_article(article))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, NormalizedArticle};
    use chrono::NaiveDate;

    fn article(url: &str, title: &str) -> CategorizedArticle {
        CategorizedArticle {
            article: NormalizedArticle {
                country: "Tanzania".into(),
                source: "Daily News".into(),
                url: url.into(),
                date_iso: NaiveDate::from_ymd_opt(2025, 10, 22).unwrap(),
                title: title.into(),
                summary: "".into(),
            },
            category: Category::Port,
        }
    }

    #[test]
    fn test_normalize_url_variants_collapse() {
        let expected = "dailynews.co.tz/news/dar-port";
        assert_eq!(normalize_url("https://dailynews.co.tz/news/dar-port"), expected);
        assert_eq!(normalize_url("HTTP://WWW.DailyNews.co.tz/news/Dar-Port/"), expected);
        assert_eq!(normalize_url("https://dailynews.co.tz/news/dar-port?utm_source=x#top"), expected);
        assert_eq!(normalize_url("  https://dailynews.co.tz/news/dar-port/  "), expected);
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("  Dar  es Salaam\nPort "), "dar es salaam port");
    }

    #[test]
    fn test_same_article_different_text_is_duplicate() {
        let mut seen = SeenKeys::default();
        let first = article("https://dailynews.co.tz/news/dar-port", "Dar port expansion");
        let again = article("https://DAILYNEWS.co.tz/news/dar-port/", "Dar   port  expansion");
        assert!(!seen.is_duplicate(&first));
        assert!(seen.register(&first));
        assert!(seen.is_duplicate(&again));
        assert!(!seen.register(&again));
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn test_different_title_same_url_is_distinct() {
        let mut seen = SeenKeys::default();
        seen.register(&article("https://x.example/a", "Rail tender opens"));
        assert!(!seen.is_duplicate(&article("https://x.example/a", "Rail tender closes")));
    }

    #[test]
    fn test_source_url_ignores_title() {
        let row = article("https://x.example/a", "[en] New airport at Donsin").into_row();
        let seen = SeenKeys::from_rows([&row]);
        assert!(seen.contains_source_url("daily  news", "http://www.x.example/a/"));
        assert!(!seen.contains_source_url("Faso7", "https://x.example/a"));
        assert!(!seen.contains(&DedupKey::new("https://x.example/a", "Nouvel aéroport de Donsin")));
    }

    #[test]
    fn test_seeded_from_rows() {
        let row = article("https://x.example/a", "Title").into_row();
        let seen = SeenKeys::from_rows([&row]);
        assert!(seen.is_duplicate(&article("http://www.x.example/a/", "TITLE")));
        assert!(!seen.is_empty());
    }
}
