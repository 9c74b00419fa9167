//! HTTP GET capability used by every network-facing stage.
//!
//! [`HttpFetch`] is the seam between the pipeline and the network. The
//! production implementation, [`ReqwestFetcher`], follows redirects and
//! presents a rotating desktop-browser identity, since several news sites
//! refuse obviously automated clients.

use crate::error::{ConfigError, HttpError};
use rand::{Rng, rng};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::redirect::Policy;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

/// A completed HTTP exchange. Non-2xx statuses are not errors at this level.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    /// URL after following redirects.
    pub final_url: String,
    pub body: String,
}

impl HttpResponse {
    /// `true` for any 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Something that can perform a GET request.
pub trait HttpFetch {
    /// Fetch `url`, giving up after `timeout`.
    async fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, HttpError>;
}

/// [`HttpFetch`] over a shared `reqwest` client.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
    user_agents: Arc<Vec<String>>,
}

impl ReqwestFetcher {
    /// Build a fetcher with its own connection pool.
    ///
    /// # Arguments
    ///
    /// * `user_agents` - `User-Agent` values picked at random per request; empty
    ///   means reqwest's default
    ///
    /// # Returns
    ///
    /// The fetcher, or [`ConfigError::Client`] if the TLS backend cannot be set up.
    pub fn new(user_agents: Vec<String>) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .redirect(Policy::limited(10))
            .build()
            .map_err(|e| ConfigError::Client(e.to_string()))?;
        Ok(Self {
            client,
            user_agents: Arc::new(user_agents),
        })
    }

    fn pick_user_agent(&self) -> Option<&str> {
        if self.user_agents.is_empty() {
            return None;
        }
        let i = rng().random_range(0..self.user_agents.len());
        Some(&self.user_agents[i])
    }
}

impl HttpFetch for ReqwestFetcher {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, HttpError> {
        let t0 = Instant::now();
        let mut request = self
            .client
            .get(url)
            .timeout(timeout)
            .header(ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9");
        if let Some(ua) = self.pick_user_agent() {
            request = request.header(USER_AGENT, ua);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| HttpError::from_reqwest(url, e))?;
        let status = resp.status().as_u16();
        let final_url = resp.url().to_string();
        let body = resp
            .text()
            .await
            .map_err(|e| HttpError::from_reqwest(url, e))?;

        debug!(
            status,
            %final_url,
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "GET complete"
        );
        Ok(HttpResponse {
            status,
            final_url,
            body,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeHttp;
    use super::*;

    #[test]
    fn test_success_range() {
        let mut resp = HttpResponse {
            status: 204,
            final_url: "https://example.com".to_string(),
            body: String::new(),
        };
        assert!(resp.is_success());
        resp.status = 301;
        assert!(!resp.is_success());
    }

    #[test]
    fn test_pick_user_agent_from_list() {
        let fetcher = ReqwestFetcher::new(vec!["agent-a".to_string()]).unwrap();
        assert_eq!(fetcher.pick_user_agent(), Some("agent-a"));
        let bare = ReqwestFetcher::new(Vec::new()).unwrap();
        assert_eq!(bare.pick_user_agent(), None);
    }

    #[tokio::test]
    async fn test_fake_http_routes() {
        let http = FakeHttp::new()
            .page("https://a.test/", "hello")
            .broken("https://b.test/");

        let ok = http.get("https://a.test/", Duration::from_secs(1)).await.unwrap();
        assert_eq!(ok.body, "hello");
        assert!(http.get("https://b.test/", Duration::from_secs(1)).await.is_err());
        let missing = http.get("https://c.test/", Duration::from_secs(1)).await.unwrap();
        assert_eq!(missing.status, 404);
        assert_eq!(http.hits().len(), 3);
    }
}
