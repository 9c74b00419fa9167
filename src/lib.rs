//! # News Retrieval
//!
//! Finds recent news articles about a keyword on a configured set of
//! websites, downloads them, and keeps the ones that are actually about
//! the keyword.
//!
//! ## Features
//!
//! - Discovers article URLs from each site's sitemap feed, including nested
//!   sitemap indexes and Google News sitemaps
//! - Falls back to site-scoped DuckDuckGo search when a site has no feed or
//!   the feed turns up nothing
//! - Fetches articles concurrently with bounded retry and linear backoff
//! - Scores relevance by title match and keyword frequency/density,
//!   dropping biography and profile pages
//! - Accepts a URL in place of a keyword to retrieve one article directly
//!
//! ## Usage
//!
//! ```no_run
//! use news_retrieval::{config, telemetry, LiveRetriever};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! telemetry::init_tracing().ok();
//! let cfg = config::load_config("sites.yaml").await?;
//! let retriever = LiveRetriever::from_settings(&cfg.settings)?;
//! let result = retriever.retrieve("solar", &cfg.sites, 5).await;
//! for article in &result.articles {
//!     println!("{} ({})", article.title(), article.source());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! A run has two phases:
//! 1. **Discovery**: every enabled site is queried concurrently (5 at a time)
//!    and the URLs are deduplicated across sites
//! 2. **Fetching**: every unique URL is downloaded, validated and scored
//!    (10 at a time)

pub mod config;
pub mod discovery;
pub mod error;
pub mod fetch;
pub mod http;
pub mod models;
pub mod relevance;
pub mod retriever;
pub mod telemetry;
pub mod utils;

pub use config::{AppConfig, RetrievalSettings};
pub use error::{ConfigError, DiscoveryError, FetchError, ValidationRejection};
pub use models::{
    Article, DateRange, DiscoveredUrl, RetrievalRequest, RetrievalResult, SiteConfig, SiteStats,
};
pub use relevance::{Relevance, RelevanceFilter};
pub use retriever::{LiveRetriever, Retriever};
