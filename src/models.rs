//! Data models for sources, articles at each pipeline stage, and dataset rows.
//!
//! This module defines the core data structures used throughout the application:
//! - [`SourceDescriptor`]: One configured news source and how to scrape it
//! - [`RawArticle`]: A record as produced by a source adapter
//! - [`NormalizedArticle`]: A raw record with a resolved date and English text
//! - [`CategorizedArticle`]: A normalized record with its [`Category`]
//! - [`DatasetRow`]: The persisted CSV row shape
//!
//! Field names of [`DatasetRow`] are the CSV column names and their order is
//! the on-disk column order.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, de};
use std::fmt;

/// How a source's pages are retrieved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    /// Plain HTTP GET through the shared client.
    #[default]
    Http,
    /// Headless Chromium `--dump-dom`, for sites that render with JavaScript
    /// or sit behind a challenge page.
    Browser,
}

/// CSS selectors used to pull articles out of an HTML listing page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HtmlSelectors {
    /// One match per article card.
    pub item: String,
    /// Title text, relative to the item.
    pub title: String,
    /// Element carrying the article `href`, relative to the item.
    pub link: String,
    #[serde(default)]
    pub date: Option<String>,
    /// Read the date from this attribute instead of the element text.
    #[serde(default)]
    pub date_attr: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// Page-numbered listing URLs, e.g. `/news/page/{page}/`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Pagination {
    pub pattern: String,
    #[serde(default = "default_first_page")]
    pub first_page: u32,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

fn default_first_page() -> u32 {
    1
}

fn default_max_pages() -> u32 {
    3
}

fn default_per_page() -> u32 {
    50
}

/// The shape of a source's article listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ListingFormat {
    Html {
        listing_path: String,
        selectors: HtmlSelectors,
        #[serde(default)]
        pagination: Option<Pagination>,
    },
    Rss {
        feeds: Vec<String>,
    },
    Wordpress {
        #[serde(default = "default_per_page")]
        per_page: u32,
        #[serde(default = "default_max_pages")]
        max_pages: u32,
        /// One query per term; empty means a plain listing.
        #[serde(default)]
        search: Vec<String>,
    },
}

fn default_language() -> String {
    "en".to_string()
}

fn default_min_title_chars() -> usize {
    10
}

fn default_enabled() -> bool {
    true
}

/// A registered news source.
///
/// Sites differ only by the data held here; every source is scraped by the
/// same configured adapter.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SourceDescriptor {
    pub country: String,
    /// Human-readable source name, persisted in the `source` column.
    pub name: String,
    pub base_url: String,
    /// ISO 639-1 language of the published text.
    #[serde(default = "default_language")]
    pub language: String,
    /// Locale hint for date parsing; defaults to `language`.
    #[serde(default)]
    pub date_locale: Option<String>,
    #[serde(default)]
    pub fetch: FetchMode,
    pub format: ListingFormat,
    /// Keep only articles mentioning one of these terms.
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default = "default_min_title_chars")]
    pub min_title_chars: usize,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Label applied to every article of a single-topic source, skipping
    /// the classifier. Must be an exact label or known synonym.
    #[serde(default, deserialize_with = "preset_category")]
    pub category: Option<Category>,
}

fn preset_category<'de, D>(deserializer: D) -> Result<Option<Category>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(label) => Category::from_label(&label)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("unknown category {label:?}"))),
    }
}

impl SourceDescriptor {
    pub fn date_locale(&self) -> &str {
        self.date_locale.as_deref().unwrap_or(&self.language)
    }
}

/// A record as scraped by an adapter, before any normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawArticle {
    pub country: String,
    pub source: String,
    pub title: String,
    pub url: String,
    pub raw_date: String,
    pub raw_summary: String,
    pub language: String,
}

/// A raw record whose date resolved to a calendar date and whose text is English.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedArticle {
    pub country: String,
    pub source: String,
    pub url: String,
    pub date_iso: NaiveDate,
    pub title: String,
    pub summary: String,
}

/// A normalized article with a label from the fixed set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorizedArticle {
    pub article: NormalizedArticle,
    pub category: Category,
}

impl CategorizedArticle {
    pub fn into_row(self) -> DatasetRow {
        let CategorizedArticle { article, category } = self;
        DatasetRow {
            country: article.country,
            source: article.source,
            title: article.title,
            date_iso: article.date_iso,
            summary: article.summary,
            url: article.url,
            category,
        }
    }
}

/// The labels an article may carry in the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    Port,
    Rail,
    Highway,
    Sez,
    SmartCity,
    Economic,
    Energy,
    Technology,
    Infrastructure,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Port,
        Category::Rail,
        Category::Highway,
        Category::Sez,
        Category::SmartCity,
        Category::Economic,
        Category::Energy,
        Category::Technology,
        Category::Infrastructure,
    ];

    /// Label used when nothing better can be determined.
    pub const FALLBACK: Category = Category::Infrastructure;

    pub fn label(self) -> &'static str {
        match self {
            Category::Port => "Port",
            Category::Rail => "Rail",
            Category::Highway => "Highway",
            Category::Sez => "SEZ",
            Category::SmartCity => "Smart City",
            Category::Economic => "Economic",
            Category::Energy => "Energy",
            Category::Technology => "Technology",
            Category::Infrastructure => "Infrastructure",
        }
    }

    /// Exact label or a known synonym, ignoring case, spacing and punctuation.
    pub fn from_label(s: &str) -> Option<Category> {
        let folded: String = s
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect();
        let cat = match folded.as_str() {
            "port" | "ports" | "airport" | "airports" | "maritime" | "aviation" => Category::Port,
            "rail" | "railway" | "railways" | "metro" => Category::Rail,
            "highway" | "highways" | "road" | "roads" | "bridge" | "bridges" => Category::Highway,
            "sez" | "specialeconomiczone" | "specialeconomiczones" | "industrialpark" => {
                Category::Sez
            }
            "smartcity" | "smartcities" => Category::SmartCity,
            "economic" | "economy" | "finance" | "trade" => Category::Economic,
            "energy" | "power" => Category::Energy,
            "technology" | "tech" | "ict" | "telecom" | "telecommunications" => {
                Category::Technology
            }
            "infrastructure" | "noninfra" => Category::Infrastructure,
            _ => return None,
        };
        Some(cat)
    }

    /// Map any string onto the label set, falling back to [`Category::FALLBACK`].
    pub fn coerce(s: &str) -> Category {
        Category::from_label(s).unwrap_or(Category::FALLBACK)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<String> for Category {
    fn from(s: String) -> Self {
        Category::coerce(&s)
    }
}

impl From<Category> for String {
    fn from(c: Category) -> Self {
        c.label().to_string()
    }
}

/// One persisted row of the combined dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRow {
    pub country: String,
    pub source: String,
    pub title: String,
    /// Serialized as `YYYY-MM-DD`.
    pub date_iso: NaiveDate,
    pub summary: String,
    pub url: String,
    pub category: Category,
}
