//! HTML listing pages scraped with CSS selectors.

use super::ListingEntry;
use super::text::{clean_html_text, clean_summary};
use crate::errors::FailureCause;
use crate::models::{HtmlSelectors, Pagination};
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Selectors compiled once per source.
#[derive(Debug)]
pub struct CompiledSelectors {
    item: Selector,
    title: Selector,
    link: Selector,
    date: Option<Selector>,
    date_attr: Option<String>,
    summary: Option<Selector>,
    time_fallback: Selector,
}

fn compile(css: &str) -> Result<Selector, FailureCause> {
    Selector::parse(css).map_err(|e| FailureCause::Selector(format!("{css:?}: {e}")))
}

impl CompiledSelectors {
    pub fn compile(selectors: &HtmlSelectors) -> Result<Self, FailureCause> {
        Ok(Self {
            item: compile(&selectors.item)?,
            title: compile(&selectors.title)?,
            link: compile(&selectors.link)?,
            date: selectors.date.as_deref().map(compile).transpose()?,
            date_attr: selectors.date_attr.clone(),
            summary: selectors.summary.as_deref().map(compile).transpose()?,
            time_fallback: compile("time[datetime]")?,
        })
    }
}

/// URL of the `index`-th listing page (0-based). Page 0 is always the
/// listing path itself; later pages follow the pagination pattern.
pub fn page_url(base: &Url, listing_path: &str, pagination: Option<&Pagination>, index: u32) -> Result<Url, FailureCause> {
    let path = match pagination {
        Some(p) if index > 0 => p.pattern.replace("{page}", &(p.first_page + index).to_string()),
        _ => listing_path.to_string(),
    };
    Ok(base.join(&path)?)
}

/// Number of listing pages to request.
pub fn page_count(pagination: Option<&Pagination>) -> u32 {
    pagination.map_or(1, |p| p.max_pages.max(1))
}

/// Extract every article card on one listing page.
///
/// Returns the number of elements matching the item selector alongside the
/// entries, so a page whose cards lack a usable link or title can be told
/// apart from a page where the selector matched nothing.
pub fn parse_listing(body: &str, page: &Url, selectors: &CompiledSelectors) -> (usize, Vec<ListingEntry>) {
    let document = Html::parse_document(body);
    let mut matched = 0;
    let mut out = Vec::new();

    for item in document.select(&selectors.item) {
        matched += 1;
        let Some(href) = first(item, &selectors.link)
            .and_then(|a| a.value().attr("href"))
            .or_else(|| item.value().attr("href"))
        else {
            continue;
        };
        let Ok(url) = page.join(href.trim()) else {
            continue;
        };
        if url.scheme() != "http" && url.scheme() != "https" {
            continue;
        }

        // A card that is itself the link may carry its title as its own text.
        let title_el = first(item, &selectors.title).or_else(|| item.value().attr("href").map(|_| item));
        let title = title_el
            .map(|el| clean_html_text(&el.text().collect::<Vec<_>>().join(" ")))
            .unwrap_or_default();
        if title.is_empty() {
            continue;
        }

        let raw_date = match &selectors.date {
            Some(sel) => first(item, sel)
                .map(|el| match &selectors.date_attr {
                    Some(attr) => el.value().attr(attr).unwrap_or_default().to_string(),
                    None => el.text().collect::<Vec<_>>().join(" "),
                })
                .unwrap_or_default(),
            None => first(item, &selectors.time_fallback)
                .and_then(|el| el.value().attr("datetime"))
                .unwrap_or_default()
                .to_string(),
        };

        let raw_summary = selectors
            .summary
            .as_ref()
            .and_then(|sel| first(item, sel))
            .map(|el| clean_summary(&el.inner_html()))
            .unwrap_or_default();

        out.push(ListingEntry {
            title,
            url: url.to_string(),
            raw_date: raw_date.trim().to_string(),
            raw_summary,
        });
    }
    (matched, out)
}

fn first<'a>(item: ElementRef<'a>, selector: &Selector) -> Option<ElementRef<'a>> {
    item.select(selector).next()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
<html><body>
  <div class="news">
    <article class="post">
      <h2 class="entry-title"><a href="/2025/10/22/bridge-works-resume/">Bridge works resume on the northern corridor</a></h2>
      <time datetime="2025-10-22T08:00:00+03:00">22 October 2025</time>
      <div class="excerpt"><p>KeNHA says the <b>bridge</b> &amp; approach roads will be ready by March.</p></div>
    </article>
    <article class="post">
      <h2 class="entry-title"><a href="https://kenha.co.ke/2025/10/20/tender/">Tender notice for road maintenance works</a></h2>
      <span class="date">20/10/2025</span>
    </article>
    <article class="post">
      <h2 class="entry-title">No link here</h2>
    </article>
  </div>
</body></html>
"#;

    fn selectors(date: Option<&str>, date_attr: Option<&str>) -> CompiledSelectors {
        CompiledSelectors::compile(&HtmlSelectors {
            item: "article.post".into(),
            title: "h2".into(),
            link: "h2 a".into(),
            date: date.map(str::to_string),
            date_attr: date_attr.map(str::to_string),
            summary: Some(".excerpt".into()),
        })
        .unwrap()
    }

    #[test]
    fn test_parse_listing_extracts_cards() {
        let page = Url::parse("https://kenha.co.ke/news/").unwrap();
        let (matched, entries) = parse_listing(LISTING, &page, &selectors(None, None));
        assert_eq!(matched, 3);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].title, "Bridge works resume on the northern corridor");
        assert_eq!(entries[0].url, "https://kenha.co.ke/2025/10/22/bridge-works-resume/");
        assert_eq!(entries[0].raw_date, "2025-10-22T08:00:00+03:00");
        assert_eq!(
            entries[0].raw_summary,
            "KeNHA says the bridge & approach roads will be ready by March."
        );
        assert_eq!(entries[1].raw_date, "");
        assert_eq!(entries[1].raw_summary, "");
    }

    #[test]
    fn test_parse_listing_date_text_selector() {
        let page = Url::parse("https://kenha.co.ke/news/").unwrap();
        let (_, entries) = parse_listing(LISTING, &page, &selectors(Some(".date, time"), None));
        assert_eq!(entries[1].raw_date, "20/10/2025");
    }

    #[test]
    fn test_parse_listing_date_attribute() {
        let page = Url::parse("https://kenha.co.ke/news/").unwrap();
        let (_, entries) = parse_listing(LISTING, &page, &selectors(Some("time"), Some("datetime")));
        assert_eq!(entries[0].raw_date, "2025-10-22T08:00:00+03:00");
    }

    #[test]
    fn test_item_that_is_itself_a_link() {
        let body = r#"<ul><li><a class="card" href="/n/1">Port of Tema expansion update</a></li></ul>"#;
        let sel = CompiledSelectors::compile(&HtmlSelectors {
            item: "a.card".into(),
            title: "span.headline".into(),
            link: "a".into(),
            date: None,
            date_attr: None,
            summary: None,
        })
        .unwrap();
        let page = Url::parse("https://ghanaports.gov.gh/").unwrap();
        let (_, entries) = parse_listing(body, &page, &sel);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Port of Tema expansion update");
        assert_eq!(entries[0].url, "https://ghanaports.gov.gh/n/1");
    }

    #[test]
    fn test_bad_selector_is_selector_failure() {
        let err = CompiledSelectors::compile(&HtmlSelectors {
            item: "div[".into(),
            title: "h2".into(),
            link: "a".into(),
            date: None,
            date_attr: None,
            summary: None,
        })
        .unwrap_err();
        assert!(matches!(err, FailureCause::Selector(_)));
    }

    #[test]
    fn test_page_urls() {
        let base = Url::parse("https://kenha.co.ke").unwrap();
        let p = Pagination {
            pattern: "/news/page/{page}/".into(),
            first_page: 1,
            max_pages: 3,
        };
        assert_eq!(page_url(&base, "/news/", Some(&p), 0).unwrap().as_str(), "https://kenha.co.ke/news/");
        assert_eq!(
            page_url(&base, "/news/", Some(&p), 1).unwrap().as_str(),
            "https://kenha.co.ke/news/page/2/"
        );
        assert_eq!(page_count(Some(&p)), 3);
        assert_eq!(page_count(None), 1);
    }
}
