//! The two-phase retrieval run.
//!
//! Phase 1 discovers URLs across all enabled sites. Phase 2 starts only
//! after Phase 1 has fully finished, so URLs are deduplicated across sites
//! before anything is downloaded. Articles are then fetched concurrently
//! and appended in completion order.
//!
//! A keyword that is itself an absolute URL skips both discovery and the
//! relevance check: that one page is fetched and validated.

use crate::config::RetrievalSettings;
use crate::discovery::feed::FeedReader;
use crate::discovery::search::{DuckDuckGo, SearchClient, SearchProvider};
use crate::discovery::DiscoveryCoordinator;
use crate::error::ConfigError;
use crate::fetch::ArticleFetcher;
use crate::fetch::extract::{ArticleExtractor, HtmlExtractor};
use crate::http::{HttpFetch, ReqwestFetcher};
use crate::models::{Article, DateRange, DiscoveredUrl, RetrievalRequest, RetrievalResult, SiteConfig};
use crate::relevance::RelevanceFilter;
use crate::utils::{is_absolute_url, truncate_for_log};
use futures::stream::{self, StreamExt};
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// What happened to one discovered URL.
enum FetchOutcome {
    Accepted(Article),
    Filtered,
    Failed,
}

/// Retriever wired to the network: reqwest, DuckDuckGo and HTML extraction.
pub type LiveRetriever =
    Retriever<ReqwestFetcher, HtmlExtractor<ReqwestFetcher>, DuckDuckGo<ReqwestFetcher>>;

/// Runs keyword retrieval across a set of sites.
///
/// Generic over its transports so tests can substitute in-memory fakes;
/// production code uses [`LiveRetriever`].
pub struct Retriever<H, E, S> {
    discovery: DiscoveryCoordinator<H, S>,
    fetcher: ArticleFetcher<E>,
    relevance: RelevanceFilter,
    fetch_concurrency: usize,
    default_date_range: DateRange,
}

impl LiveRetriever {
    /// Build a retriever that talks to the real network.
    pub fn from_settings(settings: &RetrievalSettings) -> Result<Self, ConfigError> {
        let http = ReqwestFetcher::new(settings.user_agents.clone())?;
        let feeds = FeedReader::new(http.clone(), settings.feed_timeout(), settings.feed_max_age());
        let search = SearchClient::new(DuckDuckGo::new(http.clone(), settings.search_timeout()));
        let extractor = HtmlExtractor::new(http, settings.article_timeout());

        Ok(Retriever::new(
            DiscoveryCoordinator::new(feeds, search, settings.discovery_concurrency),
            ArticleFetcher::new(extractor, settings.max_retries, settings.backoff_unit()),
            settings,
        ))
    }
}

impl<H, E, S> Retriever<H, E, S>
where
    H: HttpFetch,
    E: ArticleExtractor,
    S: SearchProvider,
{
    /// Assemble a retriever from its stages.
    ///
    /// # Arguments
    ///
    /// * `discovery` - Phase 1, feed and search lookups across sites
    /// * `fetcher` - Phase 2, per-article download with retry
    /// * `settings` - Supplies `fetch_concurrency` and `default_date_range`
    pub fn new(
        discovery: DiscoveryCoordinator<H, S>,
        fetcher: ArticleFetcher<E>,
        settings: &RetrievalSettings,
    ) -> Self {
        Self {
            discovery,
            fetcher,
            relevance: RelevanceFilter::new(),
            fetch_concurrency: settings.fetch_concurrency.max(1),
            default_date_range: settings.default_date_range,
        }
    }

    /// Find and fetch articles about `keyword` on `sites`, using the
    /// configured default date range.
    pub async fn retrieve(
        &self,
        keyword: &str,
        sites: &[SiteConfig],
        max_results_per_site: usize,
    ) -> RetrievalResult {
        let request = RetrievalRequest::new(keyword, max_results_per_site)
            .with_date_range(self.default_date_range);
        self.retrieve_request(&request, sites).await
    }

    /// Run one retrieval. Never fails: per-site and per-article problems
    /// show up only in the counts.
    ///
    /// # Arguments
    ///
    /// * `request` - Keyword (or a single article URL), per-site limit and date range
    /// * `sites` - Site list; disabled entries are skipped
    ///
    /// # Returns
    ///
    /// A [`RetrievalResult`] with accepted articles in completion order.
    /// A blank keyword, no enabled sites, or no discovered URLs all give an
    /// empty result.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let request = RetrievalRequest::new("wildfire", 5).with_date_range(DateRange::Week);
    /// let result = retriever.retrieve_request(&request, &cfg.sites).await;
    /// info!(articles = result.articles.len(), failed = result.failed, "done");
    /// ```
    #[instrument(level = "info", skip_all, fields(keyword = %request.keyword, date_range = ?request.date_range))]
    pub async fn retrieve_request(
        &self,
        request: &RetrievalRequest,
        sites: &[SiteConfig],
    ) -> RetrievalResult {
        let t0 = Instant::now();
        let keyword = request.keyword.trim();
        if keyword.is_empty() {
            warn!("Empty keyword; nothing to retrieve");
            return RetrievalResult::empty(keyword, request.date_range);
        }
        if is_absolute_url(keyword) {
            return self.retrieve_direct(keyword, request.date_range).await;
        }

        // ---- Phase 1: discovery ----
        let discovery = self
            .discovery
            .discover(
                keyword,
                sites,
                request.max_results_per_site,
                request.date_range,
            )
            .await;

        let mut result = RetrievalResult::empty(keyword, request.date_range);
        result.urls_found = discovery.urls.len();
        result.site_stats = discovery.stats.clone();
        if discovery.is_empty() {
            info!("No URLs discovered");
            return result;
        }

        // ---- Phase 2: fetch + relevance ----
        let pool = self.fetch_concurrency.min(discovery.urls.len());
        let mut outcomes = stream::iter(&discovery.urls)
            .map(|discovered| self.fetch_one(discovered, keyword))
            .buffer_unordered(pool);

        while let Some(outcome) = outcomes.next().await {
            match outcome {
                FetchOutcome::Accepted(article) => {
                    result.scraped += 1;
                    result.articles.push(article);
                }
                FetchOutcome::Filtered => {
                    result.scraped += 1;
                    result.filtered += 1;
                }
                FetchOutcome::Failed => result.failed += 1,
            }
        }

        let elapsed = t0.elapsed();
        info!(
            urls_found = result.urls_found,
            scraped = result.scraped,
            filtered = result.filtered,
            failed = result.failed,
            articles = result.articles.len(),
            pool,
            elapsed_ms = elapsed.as_millis() as u64,
            "Retrieval complete"
        );
        result
    }

    async fn fetch_one(&self, discovered: &DiscoveredUrl, keyword: &str) -> FetchOutcome {
        match self.fetcher.try_fetch(&discovered.url).await {
            Ok(article) => {
                let verdict = self.relevance.assess(article.title(), article.text(), keyword);
                if verdict.is_relevant() {
                    debug!(url = %discovered.url, site = %discovered.source_site, ?verdict, "Article accepted");
                    FetchOutcome::Accepted(article)
                } else {
                    debug!(
                        url = %discovered.url,
                        title = %truncate_for_log(article.title(), 80),
                        ?verdict,
                        "Article filtered as irrelevant"
                    );
                    FetchOutcome::Filtered
                }
            }
            Err(e) => {
                debug!(site = %discovered.source_site, error = %e, "Article dropped");
                FetchOutcome::Failed
            }
        }
    }

    async fn retrieve_direct(&self, url: &str, date_range: DateRange) -> RetrievalResult {
        info!(%url, "Keyword is a URL; fetching it directly");
        let mut result = RetrievalResult::empty(url, date_range);
        result.urls_found = 1;
        match self.fetcher.try_fetch(url).await {
            Ok(article) => {
                result.scraped = 1;
                result.articles.push(article);
            }
            Err(e) => {
                warn!(error = %e, "Direct URL could not be retrieved");
                result.failed = 1;
            }
        }
        result
    }
}
