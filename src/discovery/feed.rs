//! Sitemap-based URL discovery.
//!
//! A site's feed is either a `<urlset>` listing article URLs or a
//! `<sitemapindex>` pointing at further feeds. Indexes are walked with an
//! explicit stack rather than recursion:
//!
//! - only the first [`MAX_INDEX_CHILDREN`] references of each index are
//!   followed, in document order, depth-first
//! - nesting deeper than [`MAX_INDEX_DEPTH`] is ignored
//! - no document is fetched twice, and at most [`MAX_FEED_DOCUMENTS`] are
//!   fetched per call
//! - the walk stops as soon as `max_results` matches are collected
//!
//! Only the root document's failure is reported; broken nested feeds are
//! logged and skipped.

use crate::error::DiscoveryError;
use crate::http::HttpFetch;
use crate::utils::parse_timestamp;
use chrono::{DateTime, Utc};
use quick_xml::Reader;
use quick_xml::events::Event;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// References followed per sitemap index, counted in document order.
pub const MAX_INDEX_CHILDREN: usize = 3;
/// How many index levels below the root are walked.
pub const MAX_INDEX_DEPTH: usize = 3;
/// Upper bound on documents fetched for one site, root included.
pub const MAX_FEED_DOCUMENTS: usize = 40;

/// A parsed feed document.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedDocument {
    /// `<sitemapindex>`: nested feed URLs in document order.
    Index(Vec<String>),
    /// `<urlset>`: article entries.
    UrlSet(Vec<FeedEntry>),
}

/// One `<url>` of a urlset.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    pub loc: String,
    pub last_modified: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, PartialEq)]
enum Field {
    Loc,
    LastMod,
    PublicationDate,
}

/// Parse sitemap XML. `Ok(None)` means well-formed XML that is not a feed.
pub fn parse_feed(xml: &str) -> Result<Option<FeedDocument>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut is_index: Option<bool> = None;
    let mut field: Option<Field> = None;
    let mut text = String::new();

    let mut loc = String::new();
    let mut lastmod: Option<String> = None;
    let mut publication_date: Option<String> = None;

    let mut children = Vec::new();
    let mut entries = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.local_name();
                if is_index.is_none() {
                    is_index = match name.as_ref() {
                        b"sitemapindex" => Some(true),
                        b"urlset" => Some(false),
                        _ => return Ok(None),
                    };
                    continue;
                }
                match name.as_ref() {
                    b"url" | b"sitemap" => {
                        loc.clear();
                        lastmod = None;
                        publication_date = None;
                        field = None;
                    }
                    b"loc" => field = Some(Field::Loc),
                    b"lastmod" => field = Some(Field::LastMod),
                    b"publication_date" => field = Some(Field::PublicationDate),
                    _ => field = None,
                }
                text.clear();
            }
            Ok(Event::Empty(e)) if is_index.is_none() => {
                return Ok(match e.local_name().as_ref() {
                    b"sitemapindex" => Some(FeedDocument::Index(Vec::new())),
                    b"urlset" => Some(FeedDocument::UrlSet(Vec::new())),
                    _ => None,
                });
            }
            Ok(Event::Text(e)) if field.is_some() => {
                let raw = String::from_utf8_lossy(&e).into_owned();
                match quick_xml::escape::unescape(&raw) {
                    Ok(unescaped) => text.push_str(&unescaped),
                    Err(_) => text.push_str(&raw),
                }
            }
            Ok(Event::CData(e)) if field.is_some() => {
                text.push_str(&String::from_utf8_lossy(&e));
            }
            Ok(Event::GeneralRef(e)) if field.is_some() => {
                if let Some(resolved) = resolve_entity(&String::from_utf8_lossy(&e)) {
                    text.push(resolved);
                }
            }
            Ok(Event::End(e)) => {
                let value = text.trim().to_string();
                match (e.local_name().as_ref(), field) {
                    (b"loc", Some(Field::Loc)) => loc = value,
                    (b"lastmod", Some(Field::LastMod)) => lastmod = Some(value),
                    (b"publication_date", Some(Field::PublicationDate)) => {
                        publication_date = Some(value)
                    }
                    (b"sitemap", _) if !loc.is_empty() => children.push(loc.clone()),
                    (b"url", _) if !loc.is_empty() => entries.push(FeedEntry {
                        loc: loc.clone(),
                        last_modified: lastmod
                            .as_deref()
                            .or(publication_date.as_deref())
                            .and_then(parse_timestamp),
                    }),
                    _ => {}
                }
                field = None;
                text.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e),
            _ => {}
        }
    }

    Ok(match is_index {
        Some(true) => Some(FeedDocument::Index(children)),
        Some(false) => Some(FeedDocument::UrlSet(entries)),
        None => None,
    })
}

fn resolve_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = name.strip_prefix('#')?;
            let value = match code.strip_prefix('x') {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse().ok()?,
            };
            char::from_u32(value)
        }
    }
}

/// Reads sitemap feeds and picks out recent URLs mentioning a keyword.
pub struct FeedReader<H> {
    http: H,
    timeout: Duration,
    max_age: chrono::Duration,
}

impl<H: HttpFetch> FeedReader<H> {
    /// Create a feed reader.
    ///
    /// # Arguments
    ///
    /// * `http` - Transport for feed documents
    /// * `timeout` - Per-document request timeout
    /// * `max_age` - Entries whose `lastmod`/`publication_date` is older are skipped
    ///
    /// # Example
    ///
    /// ```ignore
    /// let feeds = FeedReader::new(http, Duration::from_secs(10), chrono::Duration::days(30));
    /// let urls = feeds.read("election", "bbc.com", "https://www.bbc.com/sitemap.xml", 5).await?;
    /// ```
    pub fn new(http: H, timeout: Duration, max_age: chrono::Duration) -> Self {
        Self {
            http,
            timeout,
            max_age,
        }
    }

    /// Up to `max_results` URLs from the feed at `feed_url` whose address
    /// contains `keyword` (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError`] when the root feed cannot be fetched,
    /// answers with a non-success status, or does not parse as a feed.
    pub async fn read(
        &self,
        keyword: &str,
        domain: &str,
        feed_url: &str,
        max_results: usize,
    ) -> Result<Vec<String>, DiscoveryError> {
        self.read_at(keyword, domain, feed_url, max_results, Utc::now())
            .await
    }

    /// [`FeedReader::read`] with an explicit "now" for the age cutoff.
    #[instrument(level = "info", skip_all, fields(%domain, %feed_url))]
    pub async fn read_at(
        &self,
        keyword: &str,
        domain: &str,
        feed_url: &str,
        max_results: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>, DiscoveryError> {
        let needle = keyword.trim().to_lowercase();
        let mut matches: Vec<String> = Vec::new();

        let root = self.fetch_document(feed_url).await?;
        let mut seen: HashSet<String> = HashSet::from([feed_url.to_string()]);
        let mut fetched = 1usize;
        let mut stack: Vec<(String, usize)> = Vec::new();

        let mut next = Some((root, 0usize));
        while let Some((document, depth)) = next.take() {
            match document {
                FeedDocument::Index(children) => {
                    let child_depth = depth + 1;
                    if child_depth > MAX_INDEX_DEPTH {
                        debug!(depth, "Feed index nested too deeply; not descending");
                    } else {
                        // already-seen references still use up one of the slots
                        let picked: Vec<String> = children
                            .into_iter()
                            .take(MAX_INDEX_CHILDREN)
                            .filter(|c| seen.insert(c.clone()))
                            .collect();
                        for child in picked.into_iter().rev() {
                            stack.push((child, child_depth));
                        }
                    }
                }
                FeedDocument::UrlSet(entries) => {
                    self.collect_matches(entries, &needle, max_results, now, &mut matches);
                }
            }

            if matches.len() >= max_results {
                break;
            }

            while let Some((url, child_depth)) = stack.pop() {
                if fetched >= MAX_FEED_DOCUMENTS {
                    warn!(fetched, "Feed document budget exhausted");
                    stack.clear();
                    break;
                }
                fetched += 1;
                match self.fetch_document(&url).await {
                    Ok(document) => {
                        next = Some((document, child_depth));
                        break;
                    }
                    Err(e) => warn!(%url, error = %e, "Skipping unreadable nested feed"),
                }
            }
        }

        info!(
            count = matches.len(),
            documents = fetched,
            "Read structured feed"
        );
        Ok(matches)
    }

    fn collect_matches(
        &self,
        entries: Vec<FeedEntry>,
        needle: &str,
        max_results: usize,
        now: DateTime<Utc>,
        matches: &mut Vec<String>,
    ) {
        for entry in entries {
            if matches.len() >= max_results {
                return;
            }
            if let Some(modified) = entry.last_modified {
                if now - modified > self.max_age {
                    continue;
                }
            }
            if entry.loc.to_lowercase().contains(needle) && !matches.contains(&entry.loc) {
                matches.push(entry.loc);
            }
        }
    }

    async fn fetch_document(&self, url: &str) -> Result<FeedDocument, DiscoveryError> {
        let resp = self.http.get(url, self.timeout).await?;
        if !resp.is_success() {
            return Err(DiscoveryError::Status {
                url: url.to_string(),
                status: resp.status,
            });
        }
        match parse_feed(&resp.body) {
            Ok(Some(document)) => Ok(document),
            Ok(None) => Err(DiscoveryError::NotAFeed {
                url: url.to_string(),
            }),
            Err(e) => Err(DiscoveryError::Parse {
                url: url.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{index, urlset};
    use super::*;
    use crate::http::testing::FakeHttp;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 30, 12, 0, 0).unwrap()
    }

    fn reader(http: FakeHttp) -> FeedReader<FakeHttp> {
        FeedReader::new(http, Duration::from_secs(5), chrono::Duration::days(30))
    }

    #[test]
    fn test_parse_urlset_with_news_extension() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9"
        xmlns:news="http://www.google.com/schemas/sitemap-news/0.9">
  <url>
    <loc>https://example.com/india-election?a=1&amp;b=2</loc>
    <news:news>
      <news:publication><news:name>Example</news:name></news:publication>
      <news:publication_date>2025-06-28T08:00:00+00:00</news:publication_date>
      <news:title>India votes</news:title>
    </news:news>
  </url>
  <url>
    <loc><![CDATA[https://example.com/weather]]></loc>
    <lastmod>2025-06-01</lastmod>
  </url>
</urlset>"#;

        let Some(FeedDocument::UrlSet(entries)) = parse_feed(xml).unwrap() else {
            panic!("expected a urlset");
        };
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].loc, "https://example.com/india-election?a=1&b=2");
        assert_eq!(
            entries[0].last_modified,
            Some(Utc.with_ymd_and_hms(2025, 6, 28, 8, 0, 0).unwrap())
        );
        assert_eq!(entries[1].loc, "https://example.com/weather");
        assert!(entries[1].last_modified.is_some());
    }

    #[test]
    fn test_parse_index() {
        let xml = index(&["https://example.com/a.xml", "https://example.com/b.xml"]);
        assert_eq!(
            parse_feed(&xml).unwrap(),
            Some(FeedDocument::Index(vec![
                "https://example.com/a.xml".to_string(),
                "https://example.com/b.xml".to_string(),
            ]))
        );
    }

    #[test]
    fn test_parse_rejects_non_feed_and_malformed() {
        assert_eq!(parse_feed("<html><body>hi</body></html>").unwrap(), None);
        assert!(parse_feed("<urlset><url><loc>x</loc></urlset>").is_err());
    }

    #[tokio::test]
    async fn test_leaf_feed_filters_keyword_and_age() {
        let feed = "https://example.com/sitemap.xml";
        let http = FakeHttp::new().page(
            feed,
            &urlset(&[
                ("https://example.com/apple-earnings", Some("2025-06-29")),
                ("https://example.com/APPLE-old-news", Some("2025-04-01")),
                ("https://example.com/banana", Some("2025-06-29")),
                ("https://example.com/apple-undated", None),
            ]),
        );

        let urls = reader(http)
            .read_at("Apple", "example.com", feed, 10, now())
            .await
            .unwrap();
        assert_eq!(
            urls,
            vec![
                "https://example.com/apple-earnings".to_string(),
                "https://example.com/apple-undated".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_index_follows_first_three_children_only() {
        let root = "https://example.com/index.xml";
        let children = [
            "https://example.com/1.xml",
            "https://example.com/2.xml",
            "https://example.com/3.xml",
            "https://example.com/4.xml",
        ];
        let mut http = FakeHttp::new().page(root, &index(&children));
        for (i, child) in children.iter().enumerate() {
            let loc = format!("https://example.com/tech/story-{i}");
            http = http.page(child, &urlset(&[(loc.as_str(), None)]));
        }

        let urls = reader(http.clone())
            .read_at("tech", "example.com", root, 10, now())
            .await
            .unwrap();

        assert_eq!(urls.len(), 3);
        assert_eq!(urls[0], "https://example.com/tech/story-0");
        assert_eq!(http.hit_count(children[3]), 0);
        assert_eq!(
            http.hits(),
            vec![root, children[0], children[1], children[2]]
        );
    }

    #[tokio::test]
    async fn test_seen_references_count_toward_child_limit() {
        let root = "https://example.com/index.xml";
        let a = "https://example.com/a.xml";
        let b = "https://example.com/b.xml";
        let c = "https://example.com/c.xml";
        let http = FakeHttp::new()
            .page(root, &index(&[root, a, b, c]))
            .page(a, &urlset(&[("https://example.com/k-a", None)]))
            .page(b, &urlset(&[("https://example.com/k-b", None)]))
            .page(c, &urlset(&[("https://example.com/k-c", None)]));

        let urls = reader(http.clone())
            .read_at("k-", "example.com", root, 10, now())
            .await
            .unwrap();

        assert_eq!(
            urls,
            vec![
                "https://example.com/k-a".to_string(),
                "https://example.com/k-b".to_string(),
            ]
        );
        assert_eq!(http.hit_count(c), 0);
        assert_eq!(http.hits(), vec![root, a, b]);
    }

    #[tokio::test]
    async fn test_index_stops_once_enough_matches() {
        let root = "https://example.com/index.xml";
        let a = "https://example.com/a.xml";
        let b = "https://example.com/b.xml";
        let http = FakeHttp::new()
            .page(root, &index(&[a, b]))
            .page(
                a,
                &urlset(&[
                    ("https://example.com/x-1", None),
                    ("https://example.com/x-2", None),
                    ("https://example.com/x-3", None),
                ]),
            )
            .page(b, &urlset(&[("https://example.com/x-4", None)]));

        let urls = reader(http.clone())
            .read_at("x-", "example.com", root, 2, now())
            .await
            .unwrap();
        assert_eq!(urls.len(), 2);
        assert_eq!(http.hit_count(b), 0);
    }

    #[tokio::test]
    async fn test_nested_failures_are_skipped() {
        let root = "https://example.com/index.xml";
        let bad = "https://example.com/bad.xml";
        let good = "https://example.com/good.xml";
        let http = FakeHttp::new()
            .page(root, &index(&[bad, good]))
            .broken(bad)
            .page(good, &urlset(&[("https://example.com/climate-talks", None)]));

        let urls = reader(http)
            .read_at("climate", "example.com", root, 5, now())
            .await
            .unwrap();
        assert_eq!(urls, vec!["https://example.com/climate-talks".to_string()]);
    }

    #[tokio::test]
    async fn test_depth_guard_and_cycles() {
        let chain = [
            "https://example.com/0.xml",
            "https://example.com/1.xml",
            "https://example.com/2.xml",
            "https://example.com/3.xml",
            "https://example.com/4.xml",
        ];
        let mut http = FakeHttp::new();
        for pair in chain.windows(2) {
            // each index also points back at the root
            http = http.page(pair[0], &index(&[chain[0], pair[1]]));
        }
        http = http.page(chain[4], &urlset(&[("https://example.com/deep-story", None)]));

        let urls = reader(http.clone())
            .read_at("deep", "example.com", chain[0], 5, now())
            .await
            .unwrap();
        assert!(urls.is_empty());
        assert_eq!(http.hit_count(chain[0]), 1);
        assert_eq!(http.hit_count(chain[3]), 1);
        assert_eq!(http.hit_count(chain[4]), 0);
    }

    #[tokio::test]
    async fn test_root_failures_are_errors() {
        let feed = "https://example.com/sitemap.xml";
        let err = reader(FakeHttp::new().status(feed, 503))
            .read_at("x", "example.com", feed, 5, now())
            .await
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::Status { status: 503, .. }));

        let err = reader(FakeHttp::new().broken(feed))
            .read_at("x", "example.com", feed, 5, now())
            .await
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::Http(_)));

        let err = reader(FakeHttp::new().page(feed, "<html></html>"))
            .read_at("x", "example.com", feed, 5, now())
            .await
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::NotAFeed { .. }));
    }
}
