//! Keyword relevance scoring for fetched articles.
//!
//! Checks run in order, first decisive one wins:
//!
//! 1. a biography/profile phrase in the title rejects the article
//! 2. the keyword in the title accepts it
//! 3. bodies under [`MIN_BODY_WORDS`] words are rejected
//! 4. otherwise accept when the keyword appears at least
//!    [`MIN_OCCURRENCES`] times or makes up at least [`MIN_DENSITY`]
//!    occurrences per 100 words
//!
//! The two body thresholds keep short on-topic pieces while dropping long
//! pieces that mention the keyword once in passing.

use crate::models::Article;
use crate::utils::{count_occurrences, word_count};

/// Title phrases that mark biography and profile pages.
pub const PROFILE_INDICATORS: &[&str] = &[
    "biography",
    "profile",
    "who is",
    "early life",
    "personal life",
    "net worth",
];

/// Bodies shorter than this are rejected unless the title matches.
pub const MIN_BODY_WORDS: usize = 50;
/// Keyword mentions that make a body relevant on their own.
pub const MIN_OCCURRENCES: usize = 2;
/// Keyword mentions per 100 words that make a body relevant on their own.
pub const MIN_DENSITY: f64 = 0.5;

/// Why an article was kept or dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum Relevance {
    TitleMatch,
    BodyMatch { occurrences: usize, density: f64 },
    ProfilePage { indicator: &'static str },
    TooShort { words: usize },
    BelowThreshold { occurrences: usize, density: f64 },
}

impl Relevance {
    /// `true` for the two accepting verdicts.
    pub fn is_relevant(&self) -> bool {
        matches!(self, Relevance::TitleMatch | Relevance::BodyMatch { .. })
    }
}

/// Decides whether a fetched article is really about the keyword.
///
/// Stateless; all thresholds are the module constants.
///
/// # Example
///
/// ```ignore
/// let filter = RelevanceFilter::new();
/// if filter.is_relevant(&article, "solar") {
///     keep.push(article);
/// }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct RelevanceFilter;

impl RelevanceFilter {
    /// A filter with the default thresholds.
    pub fn new() -> Self {
        Self
    }

    /// Shorthand for [`RelevanceFilter::assess`] on an [`Article`].
    ///
    /// # Returns
    ///
    /// `true` when the article should be kept.
    pub fn is_relevant(&self, article: &Article, keyword: &str) -> bool {
        self.assess(article.title(), article.text(), keyword)
            .is_relevant()
    }

    /// Score a title and body against `keyword`.
    pub fn assess(&self, title: &str, body: &str, keyword: &str) -> Relevance {
        let title = title.to_lowercase();
        if let Some(indicator) = PROFILE_INDICATORS.iter().copied().find(|p| title.contains(p)) {
            return Relevance::ProfilePage { indicator };
        }

        let keyword = keyword.trim().to_lowercase();
        if !keyword.is_empty() && title.contains(&keyword) {
            return Relevance::TitleMatch;
        }

        let words = word_count(body);
        if words < MIN_BODY_WORDS {
            return Relevance::TooShort { words };
        }

        let occurrences = count_occurrences(body, &keyword);
        let density = occurrences as f64 / words as f64 * 100.0;
        if occurrences >= MIN_OCCURRENCES || density >= MIN_DENSITY {
            Relevance::BodyMatch {
                occurrences,
                density,
            }
        } else {
            Relevance::BelowThreshold {
                occurrences,
                density,
            }
        }
    }
}
