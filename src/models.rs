//! Data models for sites, discovered URLs, articles and retrieval results.
//!
//! This module defines the records that flow through the pipeline:
//! - [`SiteConfig`]: one configured website to search
//! - [`DiscoveredUrl`]: a candidate article URL with the site that found it
//! - [`Article`]: a fetched and validated article
//! - [`SiteStats`] and [`RetrievalResult`]: what a retrieval run reports
//!
//! All records serialize with serde so the result can be handed to the
//! summarization stage or a front-end unchanged.

use crate::error::ValidationRejection;
use crate::utils::split_sentences;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Minimum trimmed title length for an article to be kept.
pub const MIN_TITLE_CHARS: usize = 3;
/// Minimum trimmed body length for an article to be kept.
pub const MIN_TEXT_CHARS: usize = 50;

/// A website to search for articles.
///
/// Loaded once per run from the sites file (see [`crate::config`]).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SiteConfig {
    /// Display name, used as the source attribution of discovered URLs.
    pub name: String,
    /// Bare domain used to scope search queries, e.g. `bbc.com`.
    pub domain: String,
    /// Sitemap-style feed; blank or missing means search-only discovery.
    #[serde(default)]
    pub feed_url: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl SiteConfig {
    /// An enabled site; pass `None` for search-only discovery.
    pub fn new(name: &str, domain: &str, feed_url: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            domain: domain.to_string(),
            feed_url: feed_url.map(str::to_string),
            enabled: true,
        }
    }

    /// The configured feed URL, or `None` when absent or blank.
    pub fn feed_url(&self) -> Option<&str> {
        self.feed_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// A candidate article URL and the site credited with finding it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredUrl {
    pub url: String,
    pub source_site: String,
}

/// A fetched article that passed content validation.
///
/// Construct with [`Article::new`]; fields are read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Article {
    title: String,
    url: String,
    published_date: Option<DateTime<Utc>>,
    text: String,
    source: String,
}

impl Article {
    /// Build an article, enforcing the minimum title and body lengths.
    pub fn new(
        title: &str,
        url: &str,
        published_date: Option<DateTime<Utc>>,
        text: &str,
        source: &str,
    ) -> Result<Self, ValidationRejection> {
        let title = title.trim();
        let text = text.trim();

        let title_len = title.chars().count();
        if title_len < MIN_TITLE_CHARS {
            return Err(ValidationRejection::TitleTooShort { len: title_len });
        }
        let text_len = text.chars().count();
        if text_len < MIN_TEXT_CHARS {
            return Err(ValidationRejection::BodyTooShort { len: text_len });
        }

        Ok(Self {
            title: title.to_string(),
            url: url.to_string(),
            published_date,
            text: text.to_string(),
            source: source.to_string(),
        })
    }

    /// Trimmed headline.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// URL after redirects.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn published_date(&self) -> Option<DateTime<Utc>> {
        self.published_date
    }

    /// Trimmed body text, paragraphs separated by blank lines.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Domain of the resolved article URL, without a leading `www.`.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Sentences of the body that mention `keyword`, at most `max_sentences`.
    ///
    /// # Arguments
    ///
    /// * `keyword` - Matched case-insensitively
    /// * `max_sentences` - Upper bound on sentences kept (7 suits summaries)
    ///
    /// # Returns
    ///
    /// The matching sentences in body order, joined by single spaces, or an
    /// empty string when no sentence mentions the keyword.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let excerpt = article.keyword_excerpt("tariff", 7);
    /// ```
    pub fn keyword_excerpt(&self, keyword: &str, max_sentences: usize) -> String {
        let needle = keyword.trim().to_lowercase();
        if needle.is_empty() {
            return String::new();
        }
        split_sentences(&self.text)
            .into_iter()
            .filter(|s| s.to_lowercase().contains(&needle))
            .take(max_sentences)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// How many URLs one site contributed before cross-site deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteStats {
    pub site_name: String,
    pub urls_found: usize,
}

/// Recency window requested from the search provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DateRange {
    /// Past 24 hours, the default for news queries.
    #[default]
    Day,
    Week,
    Month,
    Year,
    Any,
}

impl DateRange {
    /// Single-letter code used by DuckDuckGo's `df` parameter.
    pub fn as_code(&self) -> Option<&'static str> {
        match self {
            DateRange::Day => Some("d"),
            DateRange::Week => Some("w"),
            DateRange::Month => Some("m"),
            DateRange::Year => Some("y"),
            DateRange::Any => None,
        }
    }
}

/// Parameters of one retrieval run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalRequest {
    pub keyword: String,
    pub max_results_per_site: usize,
    pub date_range: DateRange,
}

impl RetrievalRequest {
    /// A request using the default [`DateRange`].
    pub fn new(keyword: &str, max_results_per_site: usize) -> Self {
        Self {
            keyword: keyword.to_string(),
            max_results_per_site,
            date_range: DateRange::default(),
        }
    }

    pub fn with_date_range(mut self, date_range: DateRange) -> Self {
        self.date_range = date_range;
        self
    }
}

/// Everything one retrieval run produced.
///
/// `scraped` counts articles that downloaded and validated; `filtered`
/// counts those rejected as irrelevant; `failed` counts download failures
/// and validation rejections.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalResult {
    pub keyword: String,
    pub date_range: DateRange,
    pub articles: Vec<Article>,
    pub urls_found: usize,
    pub scraped: usize,
    pub filtered: usize,
    pub failed: usize,
    pub site_stats: Vec<SiteStats>,
}

impl RetrievalResult {
    /// A result with no articles and all counts zero.
    pub fn empty(keyword: &str, date_range: DateRange) -> Self {
        Self {
            keyword: keyword.to_string(),
            date_range,
            articles: Vec::new(),
            urls_found: 0,
            scraped: 0,
            filtered: 0,
            failed: 0,
            site_stats: Vec::new(),
        }
    }

    /// `true` when no article was accepted, whatever the counts say.
    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }
}
