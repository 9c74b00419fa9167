//! Pulling title, body text and publish date out of an article page.
//!
//! Dates are looked up in the order news sites tend to be most accurate:
//! JSON-LD `datePublished`, then `<meta>` tags, then the first
//! `<time datetime>` element. Body text comes from `<p>` elements inside
//! `<article>`, falling back to `<main>` and then the whole page, skipping
//! navigation, header, footer and aside chrome.

use crate::error::ExtractError;
use crate::http::HttpFetch;
use crate::utils::{collapse_whitespace, parse_timestamp};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

static OG_TITLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="og:title"]"#).unwrap());
static H1: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").unwrap());
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static JSON_LD: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).unwrap());
static DATE_META: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(
        r#"meta[property="article:published_time"], meta[name="pubdate"], meta[name="publish-date"], meta[itemprop="datePublished"], meta[name="date"]"#,
    )
    .unwrap()
});
static TIME: Lazy<Selector> = Lazy::new(|| Selector::parse("time[datetime]").unwrap());
static BODY_SCOPES: Lazy<Vec<Selector>> = Lazy::new(|| {
    ["article p", "main p", "p"]
        .iter()
        .map(|s| Selector::parse(s).unwrap())
        .collect()
});

const CHROME_ELEMENTS: &[&str] = &[
    "nav", "header", "footer", "aside", "form", "noscript", "script", "style",
];

/// What an extractor found on a page. Fields may be empty; validation is
/// the caller's job.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedPage {
    pub title: String,
    pub text: String,
    pub published: Option<DateTime<Utc>>,
    /// URL after redirects.
    pub resolved_url: String,
}

/// Download-and-parse capability for a single article URL.
pub trait ArticleExtractor {
    async fn extract(&self, url: &str) -> Result<ExtractedPage, ExtractError>;
}

/// [`ArticleExtractor`] over an [`HttpFetch`] and the `scraper` HTML parser.
pub struct HtmlExtractor<H> {
    http: H,
    timeout: Duration,
}

impl<H: HttpFetch> HtmlExtractor<H> {
    /// `timeout` applies to each page request.
    pub fn new(http: H, timeout: Duration) -> Self {
        Self { http, timeout }
    }
}

impl<H: HttpFetch> ArticleExtractor for HtmlExtractor<H> {
    #[instrument(level = "debug", skip(self))]
    async fn extract(&self, url: &str) -> Result<ExtractedPage, ExtractError> {
        let resp = self.http.get(url, self.timeout).await?;
        if !resp.is_success() {
            return Err(ExtractError::Status {
                url: url.to_string(),
                status: resp.status,
            });
        }
        let mut page = parse_article_html(&resp.body);
        page.resolved_url = resp.final_url;
        debug!(
            title_chars = page.title.chars().count(),
            text_chars = page.text.chars().count(),
            has_date = page.published.is_some(),
            "Parsed article page"
        );
        Ok(page)
    }
}

/// Parse an article page. `resolved_url` is left empty.
pub fn parse_article_html(html: &str) -> ExtractedPage {
    let document = Html::parse_document(html);
    ExtractedPage {
        title: extract_title(&document),
        text: extract_body(&document),
        published: extract_published(&document),
        resolved_url: String::new(),
    }
}

fn extract_title(document: &Html) -> String {
    let og = document
        .select(&OG_TITLE)
        .filter_map(|m| m.value().attr("content"))
        .map(collapse_whitespace)
        .find(|t| !t.is_empty());
    if let Some(title) = og {
        return title;
    }
    [&*H1, &*TITLE]
        .into_iter()
        .filter_map(|sel| document.select(sel).next())
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .find(|t| !t.is_empty())
        .unwrap_or_default()
}

fn extract_body(document: &Html) -> String {
    for scope in BODY_SCOPES.iter() {
        let paragraphs: Vec<String> = document
            .select(scope)
            .filter(|p| !inside_chrome(p))
            .map(|p| collapse_whitespace(&p.text().collect::<String>()))
            .filter(|t| !t.is_empty())
            .collect();
        if !paragraphs.is_empty() {
            return paragraphs.join("\n\n");
        }
    }
    String::new()
}

fn inside_chrome(element: &ElementRef) -> bool {
    element.ancestors().any(|node| {
        node.value()
            .as_element()
            .is_some_and(|el| CHROME_ELEMENTS.contains(&el.name()))
    })
}

fn extract_published(document: &Html) -> Option<DateTime<Utc>> {
    for script in document.select(&JSON_LD) {
        let raw = script.text().collect::<String>();
        if let Ok(value) = serde_json::from_str::<Value>(raw.trim()) {
            if let Some(date) = find_date_published(&value).and_then(parse_timestamp) {
                return Some(date);
            }
        }
    }
    document
        .select(&DATE_META)
        .filter_map(|m| m.value().attr("content"))
        .chain(document.select(&TIME).filter_map(|t| t.value().attr("datetime")))
        .find_map(parse_timestamp)
}

/// First `datePublished` string anywhere in a JSON-LD value.
fn find_date_published(value: &Value) -> Option<&str> {
    match value {
        Value::Object(map) => map
            .get("datePublished")
            .and_then(Value::as_str)
            .or_else(|| map.values().find_map(find_date_published)),
        Value::Array(items) => items.iter().find_map(find_date_published),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::FakeHttp;
    use chrono::TimeZone;

    const PAGE: &str = r#"<html>
<head>
  <title>Ignored | Example News</title>
  <meta property="og:title" content="  India   votes in record numbers ">
  <script type="application/ld+json">
    {"@context": "https://schema.org", "@graph": [
      {"@type": "WebPage", "name": "x"},
      {"@type": "NewsArticle", "datePublished": "2025-06-28T08:00:00Z"}
    ]}
  </script>
</head>
<body>
  <header><p>Subscribe now</p></header>
  <nav><p>Home | World | Business</p></nav>
  <article>
    <h1>India votes</h1>
    <p>Millions of voters   queued
       from dawn.</p>
    <aside><p>Related: other stories</p></aside>
    <p>Officials said turnout was the highest on record.</p>
  </article>
  <footer><p>Copyright</p></footer>
</body>
</html>"#;

    #[test]
    fn test_parse_full_article() {
        let page = parse_article_html(PAGE);
        assert_eq!(page.title, "India votes in record numbers");
        assert_eq!(
            page.text,
            "Millions of voters queued from dawn.\n\nOfficials said turnout was the highest on record."
        );
        assert_eq!(
            page.published,
            Some(Utc.with_ymd_and_hms(2025, 6, 28, 8, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_title_and_date_fallbacks() {
        let html = r#"<html><head><title> Plain title </title>
<meta property="article:published_time" content="2025-05-01T09:15:00+00:00"></head>
<body><div><p>Loose paragraph.</p></div></body></html>"#;
        let page = parse_article_html(html);
        assert_eq!(page.title, "Plain title");
        assert_eq!(page.text, "Loose paragraph.");
        assert_eq!(
            page.published,
            Some(Utc.with_ymd_and_hms(2025, 5, 1, 9, 15, 0).unwrap())
        );

        let html = r#"<html><body><main><h1>Heading</h1><time datetime="2025-04-02">April 2</time>
<p>Main text.</p></main></body></html>"#;
        let page = parse_article_html(html);
        assert_eq!(page.title, "Heading");
        assert_eq!(page.text, "Main text.");
        assert_eq!(
            page.published,
            Some(Utc.with_ymd_and_hms(2025, 4, 2, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_empty_page() {
        let page = parse_article_html("<html><body></body></html>");
        assert!(page.title.is_empty());
        assert!(page.text.is_empty());
        assert!(page.published.is_none());
    }

    #[tokio::test]
    async fn test_extractor_reports_resolved_url_and_status() {
        let http = FakeHttp::new()
            .redirected("https://t.co/abc", "https://www.example.com/india", PAGE)
            .status("https://example.com/gone", 410);
        let extractor = HtmlExtractor::new(http, Duration::from_secs(5));

        let page = extractor.extract("https://t.co/abc").await.unwrap();
        assert_eq!(page.resolved_url, "https://www.example.com/india");

        let err = extractor.extract("https://example.com/gone").await.unwrap_err();
        assert!(matches!(err, ExtractError::Status { status: 410, .. }));
    }
}
