//! Finding a site's sitemap feed.
//!
//! Used when writing site configuration: it suggests values for
//! `feed_url`. Discovery itself never calls it, so a site without a
//! configured feed always goes straight to search.

use crate::http::HttpFetch;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Paths probed on both the bare and `www.` host.
pub const COMMON_FEED_PATHS: &[&str] = &[
    "/sitemap.xml",
    "/sitemap_index.xml",
    "/news-sitemap.xml",
    "/sitemap_news.xml",
    "/sitemap/sitemap.xml",
    "/sitemaps/sitemap.xml",
];

/// Suggests sitemap URLs for a domain that has no configured feed.
///
/// # Example
///
/// ```ignore
/// let locator = FeedLocator::new(http, Duration::from_secs(10));
/// for candidate in locator.locate("npr.org").await {
///     println!("feed_url: {candidate}");
/// }
/// ```
pub struct FeedLocator<H> {
    http: H,
    timeout: Duration,
}

impl<H: HttpFetch> FeedLocator<H> {
    /// `timeout` applies to each probe separately.
    pub fn new(http: H, timeout: Duration) -> Self {
        Self { http, timeout }
    }

    /// Candidate feed URLs for `domain`: `Sitemap:` entries from
    /// `robots.txt` first, then common locations that answer 2xx.
    #[instrument(level = "info", skip(self))]
    pub async fn locate(&self, domain: &str) -> Vec<String> {
        let host = bare_host(domain);
        let mut found = Vec::new();

        let robots_url = format!("https://{host}/robots.txt");
        match self.http.get(&robots_url, self.timeout).await {
            Ok(resp) if resp.is_success() => {
                for sitemap in sitemaps_from_robots(&resp.body) {
                    debug!(%sitemap, "Sitemap listed in robots.txt");
                    push_unique(&mut found, sitemap);
                }
            }
            Ok(resp) => debug!(status = resp.status, "No robots.txt"),
            Err(e) => warn!(error = %e, "Failed to read robots.txt"),
        }

        for prefix in ["", "www."] {
            for path in COMMON_FEED_PATHS {
                let candidate = format!("https://{prefix}{host}{path}");
                if found.contains(&candidate) {
                    continue;
                }
                match self.http.get(&candidate, self.timeout).await {
                    Ok(resp) if resp.is_success() => push_unique(&mut found, candidate),
                    Ok(resp) => debug!(%candidate, status = resp.status, "Not a feed location"),
                    Err(e) => debug!(%candidate, error = %e, "Feed probe failed"),
                }
            }
        }

        info!(count = found.len(), "Located feed candidates");
        found
    }
}

/// Host part of a domain or URL, without scheme, path or `www.`.
fn bare_host(domain: &str) -> String {
    let trimmed = domain.trim();
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    let host = without_scheme.split('/').next().unwrap_or(without_scheme);
    host.strip_prefix("www.").unwrap_or(host).to_string()
}

/// Values of `Sitemap:` lines, matched case-insensitively.
pub fn sitemaps_from_robots(robots: &str) -> Vec<String> {
    robots
        .lines()
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            if !key.trim().eq_ignore_ascii_case("sitemap") {
                return None;
            }
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_string())
        })
        .collect()
}

fn push_unique(found: &mut Vec<String>, url: String) {
    if !found.contains(&url) {
        found.push(url);
    }
}
