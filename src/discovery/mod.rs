//! Turning a keyword and a site list into candidate article URLs.
//!
//! Each site is tried in one of two ways:
//!
//! | Site has | First attempt | If nothing comes back |
//! |----------|---------------|-----------------------|
//! | `feed_url` | [`feed::FeedReader`] | one [`search::SearchClient`] query |
//! | no feed | [`search::SearchClient`] | site contributes nothing |
//!
//! Sites are discovered concurrently. Results are merged in configuration
//! order so the first configured site to find a URL is credited with it,
//! whatever order the lookups finished in.

pub mod feed;
pub mod locator;
pub mod search;

use crate::http::HttpFetch;
use crate::models::{DateRange, DiscoveredUrl, SiteConfig, SiteStats};
use crate::utils::normalize_url;
use feed::FeedReader;
use futures::stream::{self, StreamExt};
use search::{SearchClient, SearchProvider};
use std::cmp::Reverse;
use std::collections::HashSet;
use tracing::{info, instrument, warn};

/// How a site's URLs were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryMethod {
    Feed,
    /// The feed failed or matched nothing, so search was used instead.
    FeedFallback,
    Search,
}

/// One site's discovery outcome, before cross-site merging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteDiscovery {
    pub site: String,
    pub urls: Vec<String>,
    pub method: DiscoveryMethod,
}

/// Merged discovery output for a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovery {
    /// Unique by normalized URL, in site-configuration order.
    pub urls: Vec<DiscoveredUrl>,
    /// Sorted by descending `urls_found`, then by name.
    pub stats: Vec<SiteStats>,
}

impl Discovery {
    /// `true` when no site produced a URL.
    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

/// Merge per-site results, first site wins on URL collisions.
pub fn merge_site_results(results: Vec<SiteDiscovery>) -> Discovery {
    let mut seen: HashSet<String> = HashSet::new();
    let mut urls = Vec::new();
    let mut stats = Vec::with_capacity(results.len());

    for result in results {
        stats.push(SiteStats {
            site_name: result.site.clone(),
            urls_found: result.urls.len(),
        });
        for url in result.urls {
            let key = normalize_url(&url);
            if seen.insert(key.clone()) {
                urls.push(DiscoveredUrl {
                    url: key,
                    source_site: result.site.clone(),
                });
            }
        }
    }

    stats.sort_by(|a, b| {
        (Reverse(a.urls_found), &a.site_name).cmp(&(Reverse(b.urls_found), &b.site_name))
    });
    Discovery { urls, stats }
}

/// Runs feed-then-search discovery across sites with bounded concurrency.
pub struct DiscoveryCoordinator<H, S> {
    feeds: FeedReader<H>,
    search: SearchClient<S>,
    concurrency: usize,
}

impl<H: HttpFetch, S: SearchProvider> DiscoveryCoordinator<H, S> {
    /// Create a coordinator.
    ///
    /// # Arguments
    ///
    /// * `feeds` - Reader used for sites with a `feed_url`
    /// * `search` - Client used for search-only sites and as the fallback
    /// * `concurrency` - Most sites looked up at once (values below 1 mean 1)
    pub fn new(feeds: FeedReader<H>, search: SearchClient<S>, concurrency: usize) -> Self {
        Self {
            feeds,
            search,
            concurrency: concurrency.max(1),
        }
    }

    /// Discover candidate URLs for `keyword` on every enabled site.
    #[instrument(level = "info", skip_all, fields(%keyword, sites = sites.len()))]
    pub async fn discover(
        &self,
        keyword: &str,
        sites: &[SiteConfig],
        max_results_per_site: usize,
        date_range: DateRange,
    ) -> Discovery {
        let enabled: Vec<(usize, &SiteConfig)> =
            sites.iter().filter(|s| s.enabled).enumerate().collect();
        if enabled.is_empty() {
            info!("No enabled sites; nothing to discover");
            return Discovery::default();
        }

        let pool = enabled.len().min(self.concurrency);
        let mut outcomes: Vec<(usize, SiteDiscovery)> = stream::iter(enabled)
            .map(|(order, site)| async move {
                let found = self
                    .discover_site(site, keyword, max_results_per_site, date_range)
                    .await;
                (order, found)
            })
            .buffer_unordered(pool)
            .collect()
            .await;
        outcomes.sort_by_key(|(order, _)| *order);

        let discovery = merge_site_results(outcomes.into_iter().map(|(_, d)| d).collect());
        info!(
            unique_urls = discovery.urls.len(),
            pool,
            "Discovery complete"
        );
        discovery
    }

    #[instrument(level = "info", skip_all, fields(site = %site.name, domain = %site.domain))]
    async fn discover_site(
        &self,
        site: &SiteConfig,
        keyword: &str,
        max_results: usize,
        date_range: DateRange,
    ) -> SiteDiscovery {
        let method = match site.feed_url() {
            Some(feed_url) => {
                match self
                    .feeds
                    .read(keyword, &site.domain, feed_url, max_results)
                    .await
                {
                    Ok(urls) if !urls.is_empty() => {
                        return SiteDiscovery {
                            site: site.name.clone(),
                            urls,
                            method: DiscoveryMethod::Feed,
                        };
                    }
                    Ok(_) => info!("Feed matched nothing; falling back to search"),
                    Err(e) => warn!(error = %e, "Feed discovery failed; falling back to search"),
                }
                DiscoveryMethod::FeedFallback
            }
            None => DiscoveryMethod::Search,
        };

        let urls = self
            .search
            .search(keyword, &site.domain, max_results, date_range)
            .await;
        SiteDiscovery {
            site: site.name.clone(),
            urls,
            method,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::feed::fixtures::urlset;
    use super::search::testing::FakeSearch;
    use super::*;
    use crate::http::testing::FakeHttp;
    use std::time::Duration;

    fn coordinator(http: FakeHttp, search: FakeSearch) -> DiscoveryCoordinator<FakeHttp, FakeSearch> {
        DiscoveryCoordinator::new(
            FeedReader::new(http, Duration::from_secs(5), chrono::Duration::days(30)),
            SearchClient::new(search),
            5,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_site_lookups_are_bounded() {
        let mut search = FakeSearch::new().with_latency(Duration::from_secs(1));
        let mut sites = Vec::new();
        for i in 0..12 {
            let domain = format!("site{i}.test");
            let url = format!("https://{domain}/news/storm-{i}");
            search = search.with(&domain, &[url.as_str()]);
            sites.push(SiteConfig::new(&format!("Site {i}"), &domain, None));
        }

        let discovery = coordinator(FakeHttp::new(), search.clone())
            .discover("storm", &sites, 5, DateRange::Week)
            .await;

        assert_eq!(discovery.urls.len(), 12);
        assert_eq!(search.queries().len(), 12);
        assert_eq!(search.peak_in_flight(), 5);
    }

    #[tokio::test]
    async fn test_site_without_feed_never_reads_feed() {
        let http = FakeHttp::new();
        let search = FakeSearch::new().with("npr.org", &["https://www.npr.org/2025/06/01/india-1"]);
        let sites = vec![SiteConfig::new("NPR", "npr.org", None)];

        let discovery = coordinator(http.clone(), search.clone())
            .discover("india", &sites, 5, DateRange::Week)
            .await;

        assert!(http.hits().is_empty());
        assert_eq!(search.queries_for("npr.org"), 1);
        assert_eq!(discovery.urls.len(), 1);
        assert_eq!(discovery.urls[0].source_site, "NPR");
    }

    #[tokio::test]
    async fn test_feed_failure_falls_back_once() {
        let feed = "https://bbc.com/sitemap.xml";
        let http = FakeHttp::new().status(feed, 500);
        let search = FakeSearch::new().with("bbc.com", &["https://www.bbc.com/news/india-1"]);
        let sites = vec![SiteConfig::new("BBC", "bbc.com", Some(feed))];

        let coordinator = coordinator(http.clone(), search.clone());
        let site = coordinator
            .discover_site(&sites[0], "india", 5, DateRange::Week)
            .await;

        assert_eq!(site.method, DiscoveryMethod::FeedFallback);
        assert_eq!(site.urls, vec!["https://www.bbc.com/news/india-1".to_string()]);
        assert_eq!(http.hit_count(feed), 1);
        assert_eq!(search.queries_for("bbc.com"), 1);
    }

    #[tokio::test]
    async fn test_empty_feed_falls_back_once() {
        let feed = "https://bbc.com/sitemap.xml";
        let http = FakeHttp::new().page(feed, &urlset(&[("https://bbc.com/sport/cricket", None)]));
        let search = FakeSearch::new();
        let sites = vec![SiteConfig::new("BBC", "bbc.com", Some(feed))];

        let discovery = coordinator(http, search.clone())
            .discover("india", &sites, 5, DateRange::Week)
            .await;

        assert!(discovery.is_empty());
        assert_eq!(search.queries_for("bbc.com"), 1);
        assert_eq!(
            discovery.stats,
            vec![SiteStats {
                site_name: "BBC".to_string(),
                urls_found: 0
            }]
        );
    }

    #[tokio::test]
    async fn test_successful_feed_skips_search() {
        let feed = "https://bbc.com/sitemap.xml";
        let http = FakeHttp::new().page(
            feed,
            &urlset(&[("https://bbc.com/news/india-votes", None)]),
        );
        let search = FakeSearch::new();
        let sites = vec![SiteConfig::new("BBC", "bbc.com", Some(feed))];

        let discovery = coordinator(http, search.clone())
            .discover("india", &sites, 5, DateRange::Week)
            .await;

        assert_eq!(discovery.urls.len(), 1);
        assert!(search.queries().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_sites_are_skipped() {
        let search = FakeSearch::new();
        let mut site = SiteConfig::new("Off", "off.test", None);
        site.enabled = false;

        let discovery = coordinator(FakeHttp::new(), search.clone())
            .discover("india", &[site], 5, DateRange::Week)
            .await;

        assert!(discovery.is_empty());
        assert!(discovery.stats.is_empty());
        assert!(search.queries().is_empty());
    }

    #[tokio::test]
    async fn test_overlapping_sites_dedupe_in_config_order() {
        let shared = "https://news.example.com/story-1";
        let search = FakeSearch::new()
            .with("example.com", &[shared, "https://news.example.com/story-2"])
            .with(
                "news.example.com",
                &["https://news.example.com/story-1/#top", "https://news.example.com/story-3"],
            );
        let sites = vec![
            SiteConfig::new("Example", "example.com", None),
            SiteConfig::new("Example News", "news.example.com", None),
        ];

        let discovery = coordinator(FakeHttp::new(), search)
            .discover("story", &sites, 5, DateRange::Week)
            .await;

        let keys: Vec<&str> = discovery.urls.iter().map(|d| d.url.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "https://news.example.com/story-1",
                "https://news.example.com/story-2",
                "https://news.example.com/story-3",
            ]
        );
        assert_eq!(discovery.urls[0].source_site, "Example");
        assert_eq!(discovery.urls[2].source_site, "Example News");
    }

    #[test]
    fn test_merge_never_duplicates_and_sorts_stats() {
        let merged = merge_site_results(vec![
            SiteDiscovery {
                site: "B".to_string(),
                urls: vec!["https://x.test/1".to_string()],
                method: DiscoveryMethod::Search,
            },
            SiteDiscovery {
                site: "A".to_string(),
                urls: vec![
                    "https://x.test/1/".to_string(),
                    "https://x.test/2".to_string(),
                    "https://x.test/2".to_string(),
                ],
                method: DiscoveryMethod::Feed,
            },
            SiteDiscovery {
                site: "C".to_string(),
                urls: vec!["https://x.test/3".to_string()],
                method: DiscoveryMethod::FeedFallback,
            },
        ]);

        let unique: HashSet<&str> = merged.urls.iter().map(|d| d.url.as_str()).collect();
        assert_eq!(unique.len(), merged.urls.len());
        assert_eq!(merged.urls.len(), 3);
        assert_eq!(merged.urls[0].source_site, "B");

        let order: Vec<&str> = merged.stats.iter().map(|s| s.site_name.as_str()).collect();
        assert_eq!(order, vec!["A", "B", "C"]);
    }
}
