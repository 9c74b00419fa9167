//! Article download with bounded retry and content validation.
//!
//! [`ArticleFetcher`] wraps an [`ArticleExtractor`] and retries transport
//! and parse failures with a linearly growing pause:
//!
//! ```text
//! delay after failed attempt n = n * 2 * backoff_unit
//! ```
//!
//! With the default of 2 attempts and a 1s unit, a dead URL costs one 2s
//! pause. Pages that download fine but are too thin (see
//! [`Article::new`]) are rejected immediately and never retried.

pub mod extract;

use crate::error::FetchError;
use crate::models::Article;
use crate::utils::source_from_url;
use extract::ArticleExtractor;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument};

/// Pause after failed attempt `attempt` (1-based).
pub fn backoff_delay(attempt: usize, unit: Duration) -> Duration {
    unit.saturating_mul((attempt as u32).saturating_mul(2))
}

/// Downloads one article at a time with retry and validation.
///
/// Concurrency is the caller's concern; see [`crate::Retriever`].
pub struct ArticleFetcher<E> {
    extractor: E,
    max_retries: usize,
    backoff_unit: Duration,
}

impl<E: ArticleExtractor> ArticleFetcher<E> {
    /// `max_retries` is the total number of attempts; values below 1 mean 1.
    pub fn new(extractor: E, max_retries: usize, backoff_unit: Duration) -> Self {
        Self {
            extractor,
            max_retries: max_retries.max(1),
            backoff_unit,
        }
    }

    /// Fetch and validate `url`, or `None` if it failed or was rejected.
    pub async fn fetch(&self, url: &str) -> Option<Article> {
        self.try_fetch(url).await.ok()
    }

    /// Like [`ArticleFetcher::fetch`], but says why nothing came back.
    ///
    /// # Returns
    ///
    /// * `Ok(article)` - downloaded and passed validation; `source` is taken
    ///   from the URL after redirects
    /// * `Err(FetchError::Exhausted)` - every attempt failed
    /// * `Err(FetchError::Rejected)` - downloaded, but title or body too short
    ///
    /// # Retry Behavior
    ///
    /// - `max_retries` attempts in total
    /// - Pause after attempt `n` is `2n` backoff units: 2s, 4s, 6s with the default unit
    /// - Rejections are final and never retried
    #[instrument(level = "info", skip(self))]
    pub async fn try_fetch(&self, url: &str) -> Result<Article, FetchError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        let page = loop {
            attempt += 1;
            let attempt_t0 = Instant::now();
            match self.extractor.extract(url).await {
                Ok(page) => break page,
                Err(e) if attempt >= self.max_retries => {
                    error!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                        error = %e,
                        "Article fetch exhausted retries"
                    );
                    return Err(FetchError::Exhausted {
                        url: url.to_string(),
                        attempts: attempt,
                        last: e,
                    });
                }
                Err(e) => {
                    let delay = backoff_delay(attempt, self.backoff_unit);
                    debug!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_t0.elapsed().as_millis() as u64,
                        ?delay,
                        error = %e,
                        "Article fetch attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        };

        let resolved = if page.resolved_url.is_empty() {
            url
        } else {
            page.resolved_url.as_str()
        };
        let source = source_from_url(resolved).unwrap_or_default();

        match Article::new(&page.title, resolved, page.published, &page.text, &source) {
            Ok(article) => {
                info!(
                    %source,
                    attempts = attempt,
                    chars = article.text().chars().count(),
                    "Fetched article"
                );
                Ok(article)
            }
            Err(reason) => {
                debug!(%reason, "Article rejected");
                Err(FetchError::Rejected {
                    url: url.to_string(),
                    reason,
                })
            }
        }
    }
}
