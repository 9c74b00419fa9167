//! Site-scoped web search, used when a site has no usable feed.
//!
//! [`SearchProvider`] is the raw capability; [`DuckDuckGo`] implements it
//! against the HTML results page. [`SearchClient`] builds the
//! `keyword site:domain` query and throws away anything that does not look
//! like an article on that site.

use crate::error::SearchError;
use crate::http::HttpFetch;
use crate::models::DateRange;
use crate::utils::host_matches_domain;
use itertools::Itertools;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Path fragments that mark listing, profile and legal pages.
pub const NON_ARTICLE_PATTERNS: &[&str] = &[
    "/category/",
    "/categories/",
    "/topic/",
    "/topics/",
    "/tag/",
    "/tags/",
    "/author/",
    "/authors/",
    "/profile/",
    "/profiles/",
    "/people/",
    "/videos/",
];

/// Whole path segments that name site pages rather than stories.
pub const UTILITY_SEGMENTS: &[&str] = &[
    "about",
    "about-us",
    "contact",
    "contact-us",
    "privacy",
    "terms",
    "terms-and-conditions",
    "cookies",
    "login",
    "signin",
    "subscribe",
    "newsletter",
    "newsletters",
];

/// Segment prefixes of policy pages, e.g. `privacy-policy-2024`.
pub const POLICY_SEGMENT_PREFIXES: &[&str] = &[
    "privacy-policy",
    "cookie-policy",
    "terms-of-service",
    "terms-of-use",
];

/// File extensions of static assets.
pub const ASSET_EXTENSIONS: &[&str] = &[
    ".pdf",
    ".jpg",
    ".jpeg",
    ".png",
    ".gif",
    ".svg",
    ".css",
    ".js",
    ".xml",
    ".mp4",
];

/// One result link; `title` is informational only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
}

/// An external web-search capability.
pub trait SearchProvider {
    async fn query(
        &self,
        text: &str,
        max_results: usize,
        date_range: DateRange,
    ) -> Result<Vec<SearchHit>, SearchError>;
}

/// DuckDuckGo's no-JavaScript results page.
pub struct DuckDuckGo<H> {
    http: H,
    timeout: Duration,
}

impl<H: HttpFetch> DuckDuckGo<H> {
    /// `timeout` applies to each results page request.
    pub fn new(http: H, timeout: Duration) -> Self {
        Self { http, timeout }
    }
}

impl<H: HttpFetch> SearchProvider for DuckDuckGo<H> {
    #[instrument(level = "info", skip(self))]
    async fn query(
        &self,
        text: &str,
        max_results: usize,
        date_range: DateRange,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let mut url = format!(
            "https://html.duckduckgo.com/html/?q={}",
            urlencoding::encode(text)
        );
        if let Some(code) = date_range.as_code() {
            url.push_str("&df=");
            url.push_str(code);
        }

        let resp = self.http.get(&url, self.timeout).await?;
        if !resp.is_success() {
            return Err(SearchError::Status {
                status: resp.status,
            });
        }
        let hits = parse_duckduckgo_results(&resp.body, max_results);
        debug!(count = hits.len(), "DuckDuckGo results");
        Ok(hits)
    }
}

/// Pull result links out of a DuckDuckGo HTML results page.
pub fn parse_duckduckgo_results(html: &str, max_results: usize) -> Vec<SearchHit> {
    let document = Html::parse_document(html);
    let link_selector = Selector::parse("a.result__a").unwrap();

    document
        .select(&link_selector)
        .filter_map(|link| {
            let href = link.value().attr("href")?;
            let url = decode_redirect(href);
            if !url.starts_with("http") {
                return None;
            }
            let title = link.text().collect::<String>().trim().to_string();
            Some(SearchHit { url, title })
        })
        .take(max_results)
        .collect()
}

/// DuckDuckGo wraps result links as `//duckduckgo.com/l/?uddg=<encoded>&...`.
fn decode_redirect(href: &str) -> String {
    let Some(pos) = href.find("uddg=") else {
        return href.to_string();
    };
    let start = pos + "uddg=".len();
    let end = href[start..]
        .find('&')
        .map(|i| start + i)
        .unwrap_or(href.len());
    match urlencoding::decode(&href[start..end]) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => href.to_string(),
    }
}

/// `true` when `url` plausibly points at an article on `domain`.
pub fn is_article_candidate(url: &str, domain: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }
    match parsed.host_str() {
        Some(host) if host_matches_domain(host, domain) => {}
        _ => return false,
    }
    let path = parsed.path().to_lowercase();
    if path.is_empty() || path == "/" {
        return false;
    }
    !NON_ARTICLE_PATTERNS.iter().any(|p| path.contains(p))
        && !ASSET_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
        && !path.split('/').any(is_utility_segment)
}

/// `true` for a path segment like `contact`, `privacy.html` or
/// `terms-of-use`, but not for slugs like `contact-tracing-app`.
fn is_utility_segment(segment: &str) -> bool {
    let stem = segment.split('.').next().unwrap_or(segment);
    UTILITY_SEGMENTS.contains(&stem)
        || POLICY_SEGMENT_PREFIXES.iter().any(|p| stem.starts_with(p))
}

/// Site-scoped search that never fails its caller.
pub struct SearchClient<S> {
    provider: S,
}

impl<S: SearchProvider> SearchClient<S> {
    /// Wrap `provider` with site scoping and URL filtering.
    pub fn new(provider: S) -> Self {
        Self { provider }
    }

    /// Up to `max_results` article-looking URLs on `domain` for `keyword`.
    ///
    /// Provider errors are logged and produce an empty list.
    #[instrument(level = "info", skip(self, date_range))]
    pub async fn search(
        &self,
        keyword: &str,
        domain: &str,
        max_results: usize,
        date_range: DateRange,
    ) -> Vec<String> {
        let query = format!("{} site:{}", keyword.trim(), domain.trim());
        let hits = match self.provider.query(&query, max_results, date_range).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(error = %e, "Search provider failed; no results for site");
                return Vec::new();
            }
        };

        let total = hits.len();
        let urls: Vec<String> = hits
            .into_iter()
            .map(|hit| hit.url)
            .filter(|url| is_article_candidate(url, domain))
            .unique()
            .take(max_results)
            .collect();

        info!(
            count = urls.len(),
            rejected = total - urls.len(),
            "Search provider returned candidate URLs"
        );
        urls
    }
}
