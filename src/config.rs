//! Site list and tuning knobs, loaded from YAML.
//!
//! ```yaml
//! sites:
//!   - name: BBC
//!     domain: bbc.com
//!     feed_url: https://www.bbc.com/sitemaps/https-index-com-news.xml
//!   - name: Reuters
//!     domain: reuters.com
//!     enabled: false
//! settings:
//!   fetch_concurrency: 8
//!   default_date_range: day
//! ```
//!
//! Every field of `settings` is optional and falls back to the defaults
//! documented on [`RetrievalSettings`].

use crate::error::ConfigError;
use crate::models::{DateRange, SiteConfig};
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, instrument};

/// Desktop browser identities rotated across outgoing requests.
pub const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0",
];

/// Contents of a sites file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub sites: Vec<SiteConfig>,
    #[serde(default)]
    pub settings: RetrievalSettings,
}

impl AppConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Sites with `enabled: true`, in file order.
    pub fn enabled_sites(&self) -> impl Iterator<Item = &SiteConfig> {
        self.sites.iter().filter(|s| s.enabled)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (index, site) in self.sites.iter().enumerate() {
            if site.name.trim().is_empty() {
                return Err(ConfigError::InvalidSite {
                    index,
                    reason: "name is empty".to_string(),
                });
            }
            if site.domain.trim().is_empty() {
                return Err(ConfigError::InvalidSite {
                    index,
                    reason: format!("site '{}' has an empty domain", site.name),
                });
            }
        }
        Ok(())
    }
}

/// Load a sites file from disk.
///
/// # Arguments
///
/// * `path` - Path to a YAML file with a `sites` list and optional `settings`
///
/// # Returns
///
/// The parsed configuration, or a [`ConfigError`] if the file cannot be read,
/// is not valid YAML, or has a site with a blank name or domain.
#[instrument(level = "info", skip_all, fields(%path))]
pub async fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let yaml = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
    let config = AppConfig::from_yaml_str(&yaml)?;
    info!(
        sites = config.sites.len(),
        enabled = config.enabled_sites().count(),
        "Loaded site configuration"
    );
    Ok(config)
}

/// Tuning knobs for a [`crate::Retriever`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Upper bound on sites discovered at once. Default 5.
    pub discovery_concurrency: usize,
    /// Upper bound on articles fetched at once. Default 10.
    pub fetch_concurrency: usize,
    /// Total attempts per article. Default 2.
    pub max_retries: usize,
    /// Backoff after attempt `n` is `n * 2` of these. Default 1000ms.
    pub backoff_unit_ms: u64,
    pub feed_timeout_secs: u64,
    pub search_timeout_secs: u64,
    pub article_timeout_secs: u64,
    /// Feed entries last modified longer ago than this are skipped. Default 30.
    pub feed_max_age_days: i64,
    pub default_date_range: DateRange,
    pub user_agents: Vec<String>,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            discovery_concurrency: 5,
            fetch_concurrency: 10,
            max_retries: 2,
            backoff_unit_ms: 1000,
            feed_timeout_secs: 10,
            search_timeout_secs: 15,
            article_timeout_secs: 15,
            feed_max_age_days: 30,
            default_date_range: DateRange::default(),
            user_agents: DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl RetrievalSettings {
    /// Base unit of the retry pause, see [`crate::fetch::backoff_delay`].
    pub fn backoff_unit(&self) -> Duration {
        Duration::from_millis(self.backoff_unit_ms)
    }

    /// Per-request timeout for feed documents.
    pub fn feed_timeout(&self) -> Duration {
        Duration::from_secs(self.feed_timeout_secs)
    }

    /// Per-request timeout for search provider queries.
    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }

    /// Per-request timeout for article pages.
    pub fn article_timeout(&self) -> Duration {
        Duration::from_secs(self.article_timeout_secs)
    }

    /// Age beyond which dated feed entries are ignored.
    pub fn feed_max_age(&self) -> chrono::Duration {
        chrono::Duration::days(self.feed_max_age_days)
    }
}
