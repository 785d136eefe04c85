//! Source adapters.
//!
//! Every registered source is scraped by the same [`ConfiguredAdapter`];
//! sites differ only by their [`SourceDescriptor`]. Three listing formats
//! are supported:
//!
//! | Format | Module | Input |
//! |--------|--------|-------|
//! | HTML listing | [`html`] | CSS selectors, optional page-numbered pagination |
//! | RSS 2.0 | [`rss`] | one or more feed paths |
//! | WordPress | [`wordpress`] | `/wp-json/wp/v2/posts`, optional search terms |
//!
//! Pages are read through [`fetch::PageSource`], which hides whether a page
//! came from plain HTTP or a headless browser.
//!
//! After parsing, the adapter drops short titles, applies the source's
//! keyword filter and emits each URL once.

pub mod fetch;
pub mod html;
pub mod rss;
pub mod text;
pub mod wordpress;

use crate::dedup::normalize_url;
use crate::errors::{AdapterFailure, FailureCause};
use crate::models::{HtmlSelectors, ListingFormat, Pagination, RawArticle, SourceDescriptor};
use chrono::NaiveDate;
use fetch::PageSource;
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// One article as found on a listing, before it is tied to its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub title: String,
    pub url: String,
    pub raw_date: String,
    pub raw_summary: String,
}

/// Fetches and parses one source's listing into raw records.
pub trait SourceAdapter {
    async fn fetch(&self, source: &SourceDescriptor) -> Result<Vec<RawArticle>, AdapterFailure>;
}

impl<T: SourceAdapter> SourceAdapter for &T {
    async fn fetch(&self, source: &SourceDescriptor) -> Result<Vec<RawArticle>, AdapterFailure> {
        (**self).fetch(source).await
    }
}

/// The descriptor-driven adapter used for every source.
pub struct ConfiguredAdapter<P> {
    pages: P,
    /// Lower bound passed to APIs that can filter by date server-side.
    listed_since: NaiveDate,
}

impl<P: PageSource> ConfiguredAdapter<P> {
    pub fn new(pages: P, listed_since: NaiveDate) -> Self {
        Self { pages, listed_since }
    }

    async fn fetch_html(
        &self,
        source: &SourceDescriptor,
        base: &Url,
        listing_path: &str,
        selectors: &HtmlSelectors,
        pagination: Option<&Pagination>,
    ) -> Result<Vec<ListingEntry>, FailureCause> {
        let compiled = html::CompiledSelectors::compile(selectors)?;
        let mut entries = Vec::new();
        let mut seen = HashSet::new();

        for index in 0..html::page_count(pagination) {
            let url = html::page_url(base, listing_path, pagination, index)?;
            let body = match self.pages.get(&url, source.fetch).await {
                Ok(body) => body,
                Err(e) if index == 0 => return Err(e),
                Err(e) => {
                    warn!(%url, error = %e, "listing page failed; keeping earlier pages");
                    break;
                }
            };
            let (matched, page_entries) = html::parse_listing(&body, &url, &compiled);
            if index == 0 && matched == 0 {
                return Err(FailureCause::Selector(format!(
                    "item selector {:?} matched nothing on {url}",
                    selectors.item
                )));
            }
            let before = entries.len();
            entries.extend(page_entries.into_iter().filter(|e| seen.insert(normalize_url(&e.url))));
            let added = entries.len() - before;
            debug!(%url, page = index, matched, added, "parsed listing page");
            if added == 0 {
                break;
            }
        }
        Ok(entries)
    }

    async fn fetch_rss(&self, source: &SourceDescriptor, base: &Url, feeds: &[String]) -> Result<Vec<ListingEntry>, FailureCause> {
        let mut entries = Vec::new();
        let mut last_err = None;
        let mut any_ok = false;

        for feed in feeds {
            let url = base.join(feed)?;
            let parsed = match self.pages.get(&url, source.fetch).await {
                Ok(body) => rss::parse_feed(&body, &url),
                Err(e) => Err(e),
            };
            match parsed {
                Ok(items) => {
                    any_ok = true;
                    debug!(%url, count = items.len(), "parsed feed");
                    entries.extend(items);
                }
                Err(e) => {
                    warn!(%url, error = %e, "feed failed");
                    last_err = Some(e);
                }
            }
        }
        match last_err {
            Some(e) if !any_ok => Err(e),
            _ => Ok(entries),
        }
    }

    async fn fetch_wordpress(
        &self,
        source: &SourceDescriptor,
        base: &Url,
        per_page: u32,
        max_pages: u32,
        search: &[String],
    ) -> Result<Vec<ListingEntry>, FailureCause> {
        let queries: Vec<Option<&str>> = if search.is_empty() {
            vec![None]
        } else {
            search.iter().map(|s| Some(s.as_str())).collect()
        };
        let mut entries = Vec::new();
        let mut last_err = None;
        let mut any_ok = false;

        for query in queries {
            match self.wordpress_query(source, base, per_page, max_pages, query).await {
                Ok(items) => {
                    any_ok = true;
                    entries.extend(items);
                }
                Err(e) => {
                    warn!(query = query.unwrap_or_default(), error = %e, "wordpress query failed");
                    last_err = Some(e);
                }
            }
        }
        match last_err {
            Some(e) if !any_ok => Err(e),
            _ => Ok(entries),
        }
    }

    async fn wordpress_query(
        &self,
        source: &SourceDescriptor,
        base: &Url,
        per_page: u32,
        max_pages: u32,
        query: Option<&str>,
    ) -> Result<Vec<ListingEntry>, FailureCause> {
        let mut entries = Vec::new();
        for page in 1..=max_pages.max(1) {
            let url = wordpress::posts_url(base, per_page, page, self.listed_since, query)?;
            let posts = match self.pages.get(&url, source.fetch).await {
                Ok(body) => wordpress::parse_posts(&body),
                Err(e) => Err(e),
            };
            let posts = match posts {
                Ok(posts) => posts,
                Err(e) if page == 1 => return Err(e),
                // Past the last page the API answers with an error object.
                Err(e) => {
                    debug!(%url, error = %e, "stopping pagination");
                    break;
                }
            };
            let count = posts.len();
            entries.extend(posts);
            if count < per_page as usize {
                break;
            }
        }
        Ok(entries)
    }
}

/// Drop short or off-topic entries and repeated URLs, first occurrence wins.
pub fn filter_entries(entries: Vec<ListingEntry>, source: &SourceDescriptor) -> Vec<ListingEntry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|e| e.title.chars().count() >= source.min_title_chars)
        .filter(|e| text::is_relevant(&e.title, &e.raw_summary, &source.keywords))
        .filter(|e| seen.insert(normalize_url(&e.url)))
        .collect()
}

impl<P: PageSource> SourceAdapter for ConfiguredAdapter<P> {
    #[instrument(level = "info", skip_all, fields(source = %source.name, country = %source.country))]
    async fn fetch(&self, source: &SourceDescriptor) -> Result<Vec<RawArticle>, AdapterFailure> {
        let fail = |cause: FailureCause| AdapterFailure::new(&source.name, cause);
        let base = Url::parse(&source.base_url).map_err(|e| fail(e.into()))?;

        let listed = match &source.format {
            ListingFormat::Html {
                listing_path,
                selectors,
                pagination,
            } => {
                self.fetch_html(source, &base, listing_path, selectors, pagination.as_ref())
                    .await
            }
            ListingFormat::Rss { feeds } => self.fetch_rss(source, &base, feeds).await,
            ListingFormat::Wordpress {
                per_page,
                max_pages,
                search,
            } => {
                self.fetch_wordpress(source, &base, *per_page, *max_pages, search)
                    .await
            }
        }
        .map_err(fail)?;

        let listed_count = listed.len();
        let articles: Vec<RawArticle> = filter_entries(listed, source)
            .into_iter()
            .map(|e| RawArticle {
                country: source.country.clone(),
                source: source.name.clone(),
                title: e.title,
                url: e.url,
                raw_date: e.raw_date,
                raw_summary: e.raw_summary,
                language: source.language.clone(),
            })
            .collect();

        info!(
            listed = listed_count,
            kept = articles.len(),
            mode = ?source.fetch,
            "Indexed source articles"
        );
        Ok(articles)
    }
}
