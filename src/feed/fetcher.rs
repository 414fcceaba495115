use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use feed_rs::model::{Entry, Feed as ParsedFeed};
use feed_rs::parser;
use regex::Regex;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{NewFeedItem, RecordId, UserCookie};
use crate::services::{ConditionalHeaders, FetchOutcome, FetchedPage, Fetcher};

/// A parsed feed document together with the validators it was served with.
#[derive(Debug, Clone)]
pub struct LoadedFeed {
    pub feed: ParsedFeed,
    /// Where the document actually came from, after redirects and discovery.
    pub url: Url,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

impl LoadedFeed {
    pub fn title(&self) -> String {
        self.feed
            .title
            .as_ref()
            .map(|t| t.content.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "Untitled Feed".to_string())
    }

    pub fn description(&self) -> Option<String> {
        self.feed
            .description
            .as_ref()
            .map(|d| d.content.clone())
            .filter(|d| !d.is_empty())
    }

    pub fn image_url(&self) -> Option<String> {
        self.feed
            .logo
            .as_ref()
            .or(self.feed.icon.as_ref())
            .map(|image| image.uri.clone())
    }

    /// Items for `feed_id`, dropping entries published at or before `cutoff`.
    /// Undated entries always pass.
    pub fn items(
        &self,
        feed_id: RecordId,
        user_id: RecordId,
        cutoff: Option<DateTime<Utc>>,
    ) -> Vec<NewFeedItem> {
        self.feed
            .entries
            .iter()
            .map(|entry| entry_to_item(entry, &self.url, feed_id, user_id))
            .filter(|item| match (item.pub_date, cutoff) {
                (Some(published), Some(cutoff)) => published > cutoff,
                _ => true,
            })
            .collect()
    }
}

fn entry_to_item(entry: &Entry, base: &Url, feed_id: RecordId, user_id: RecordId) -> NewFeedItem {
    let description = entry
        .summary
        .as_ref()
        .map(|s| s.content.clone())
        .or_else(|| entry.content.as_ref().and_then(|c| c.body.clone()))
        .filter(|d| !d.is_empty());

    NewFeedItem {
        feed_id,
        user_id,
        title: entry
            .title
            .as_ref()
            .map(|t| t.content.clone())
            .unwrap_or_else(|| "Untitled".to_string()),
        guid: entry.id.clone(),
        pub_date: entry.published.or(entry.updated),
        description,
        url: entry
            .links
            .first()
            .map(|l| {
                base.join(&l.href)
                    .map(|u| u.to_string())
                    .unwrap_or_else(|_| l.href.clone())
            })
            .unwrap_or_default(),
    }
}

pub enum FeedLoad {
    Loaded(LoadedFeed),
    NotModified,
}

/// Loads RSS/Atom documents through the shared page fetcher.
pub struct FeedFetcher {
    fetcher: Arc<dyn Fetcher>,
}

impl FeedFetcher {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    /// Conditional load of a known feed URL.
    pub async fn load(
        &self,
        url: &Url,
        cookies: &[UserCookie],
        conditional: &ConditionalHeaders,
    ) -> Result<FeedLoad> {
        match self.fetcher.fetch(url, cookies, conditional).await? {
            FetchOutcome::NotModified => Ok(FeedLoad::NotModified),
            FetchOutcome::Fetched(page) => {
                let feed = parse_feed(&page.body, &page.final_url)?;
                Ok(FeedLoad::Loaded(loaded(feed, page)))
            }
        }
    }

    /// Load `url` as a feed, or, if it is an HTML page, follow its
    /// `<link rel="alternate">` to one.
    pub async fn discover(&self, url: &Url, cookies: &[UserCookie]) -> Result<LoadedFeed> {
        let page = self
            .fetcher
            .fetch(url, cookies, &ConditionalHeaders::default())
            .await?
            .into_page()?;

        if let Ok(feed) = parse_feed(&page.body, &page.final_url) {
            return Ok(loaded(feed, page));
        }

        if looks_like_html(&page) {
            let html = page.text();
            if let Some(feed_url) = find_feed_link(&html, &page.final_url) {
                tracing::debug!(page = %page.final_url, feed = %feed_url, "Discovered feed link");
                let feed_page = self
                    .fetcher
                    .fetch(&feed_url, cookies, &ConditionalHeaders::default())
                    .await?
                    .into_page()?;
                let feed = parse_feed(&feed_page.body, &feed_page.final_url)?;
                return Ok(loaded(feed, feed_page));
            }
        }

        Err(AppError::Input(
            "could not find an RSS/Atom feed at this URL".to_string(),
        ))
    }
}

/// Parse with `base` as the document URI so relative links come out absolute.
fn parse_feed(body: &[u8], base: &Url) -> Result<ParsedFeed> {
    let parser = parser::Builder::new().base_uri(Some(base.as_str())).build();
    Ok(parser.parse(body)?)
}

fn loaded(feed: ParsedFeed, page: FetchedPage) -> LoadedFeed {
    LoadedFeed {
        feed,
        etag: page.etag(),
        last_modified: page.last_modified(),
        url: page.final_url,
    }
}

fn looks_like_html(page: &FetchedPage) -> bool {
    let body = page.body.trim_ascii_start();
    page.content_type().is_some_and(|ct| ct.contains("html"))
        || body.starts_with(b"<!")
        || body.starts_with(b"<html")
}

fn feed_link_patterns() -> &'static [Regex; 2] {
    static PATTERNS: OnceLock<[Regex; 2]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(
                r#"(?i)<link[^>]*rel=["']alternate["'][^>]*type=["']application/(rss|atom)\+xml["'][^>]*href=["']([^"']+)["']"#,
            )
            .expect("rel-first pattern is valid"),
            Regex::new(
                r#"(?i)<link[^>]*type=["']application/(rss|atom)\+xml["'][^>]*href=["']([^"']+)["']"#,
            )
            .expect("type-first pattern is valid"),
        ]
    })
}

/// First RSS/Atom `<link>` in `html`, resolved against `base`.
pub fn find_feed_link(html: &str, base: &Url) -> Option<Url> {
    let href = feed_link_patterns()
        .iter()
        .find_map(|re| re.captures(html))
        .and_then(|cap| cap.get(2))
        .map(|m| m.as_str())?;
    base.join(href).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <title>Example Feed</title>
  <description>Things happen</description>
  <image><url>https://example.com/logo.png</url><title>x</title><link>https://example.com</link></image>
  <item><guid>a</guid><title>Old</title><link>https://example.com/a</link>
    <pubDate>Mon, 01 Jan 2024 00:00:00 GMT</pubDate></item>
  <item><guid>b</guid><title>New</title><link>https://example.com/b</link>
    <description>Fresh</description>
    <pubDate>Wed, 03 Jan 2024 00:00:00 GMT</pubDate></item>
  <item><guid>c</guid><link>https://example.com/c</link></item>
</channel></rss>"#;

    fn loaded_rss() -> LoadedFeed {
        let url = Url::parse("https://example.com/feed.xml").unwrap();
        LoadedFeed {
            feed: parse_feed(RSS.as_bytes(), &url).unwrap(),
            url,
            etag: None,
            last_modified: None,
        }
    }

    #[test]
    fn maps_feed_metadata() {
        let feed = loaded_rss();
        assert_eq!(feed.title(), "Example Feed");
        assert_eq!(feed.description().as_deref(), Some("Things happen"));
        assert_eq!(feed.image_url().as_deref(), Some("https://example.com/logo.png"));
    }

    #[test]
    fn cutoff_is_exclusive_and_keeps_undated_entries() {
        let feed = loaded_rss();

        let all = feed.items(7, 1, None);
        assert_eq!(all.len(), 3);
        assert_eq!(all[1].guid, "b");
        assert_eq!(all[1].description.as_deref(), Some("Fresh"));
        assert_eq!(all[2].title, "Untitled");

        let cutoff = DateTime::parse_from_rfc2822("Mon, 01 Jan 2024 00:00:00 GMT")
            .unwrap()
            .with_timezone(&Utc);
        let guids: Vec<_> = feed
            .items(7, 1, Some(cutoff))
            .into_iter()
            .map(|i| i.guid)
            .collect();
        assert_eq!(guids, vec!["b", "c"]);
    }

    #[test]
    fn relative_item_links_resolve_against_the_feed_url() {
        let body = r#"<?xml version="1.0"?><rss version="2.0"><channel><title>T</title>
            <item><guid>rel</guid><link>/posts/1</link></item>
            <item><guid>abs</guid><link>https://other.example.com/x</link></item>
            </channel></rss>"#;
        let url = Url::parse("https://blog.example.com/feed/rss.xml").unwrap();
        let loaded = LoadedFeed {
            feed: parse_feed(body.as_bytes(), &url).unwrap(),
            url,
            etag: None,
            last_modified: None,
        };

        let urls: Vec<_> = loaded.items(1, 1, None).into_iter().map(|i| i.url).collect();
        assert_eq!(
            urls,
            vec!["https://blog.example.com/posts/1", "https://other.example.com/x"]
        );
    }

    #[test]
    fn finds_alternate_links_in_either_attribute_order() {
        let base = Url::parse("https://blog.example.com/posts/").unwrap();

        let html = r#"<head><link rel="alternate" type="application/rss+xml" href="/feed.xml"></head>"#;
        assert_eq!(
            find_feed_link(html, &base).unwrap().as_str(),
            "https://blog.example.com/feed.xml"
        );

        let html = r#"<link type='application/atom+xml' rel='alternate' href='https://other.example.com/atom'>"#;
        assert_eq!(
            find_feed_link(html, &base).unwrap().as_str(),
            "https://other.example.com/atom"
        );

        assert!(find_feed_link("<p>no feeds</p>", &base).is_none());
    }
}
