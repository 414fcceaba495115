use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};
use url::Url;

use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::{FeedItem, Link, NewLink, RecordId, UserCookie};

use super::article::{read_time, ArticleExtractor};
use super::http_fetcher::{ConditionalHeaders, Fetcher};

/// Turns a URL into a saved, readable Link.
pub struct LinkSaver {
    repository: Repository,
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn ArticleExtractor>,
}

impl LinkSaver {
    pub fn new(
        repository: Repository,
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn ArticleExtractor>,
    ) -> Self {
        Self {
            repository,
            fetcher,
            extractor,
        }
    }

    /// Fetch `url` with the owner's cookies, extract the article and persist
    /// it. The caller is responsible for dispatching enrichment.
    pub async fn save_url(
        &self,
        user_id: RecordId,
        url: &Url,
        feed_item: Option<&FeedItem>,
    ) -> Result<Link> {
        let cookies = self.cookies_for(user_id, url).await;

        let page = self
            .fetcher
            .fetch(url, &cookies, &ConditionalHeaders::default())
            .await?
            .into_page()?;

        let html = page.text();
        let article = self.extractor.extract(&html, &page.final_url)?;
        let (read_time_seconds, read_time_display) = read_time(&article.text_content);

        let title = article
            .title
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| page.final_url.to_string());

        let link_id = self
            .repository
            .insert_link(NewLink {
                user_id,
                original_url: url.to_string(),
                cleaned_url: page.final_url.to_string(),
                title,
                hostname: page.final_url.host_str().unwrap_or_default().to_string(),
                author: article.byline,
                excerpt: article.excerpt,
                article_html: article.content_html,
                raw_text_content: article.text_content,
                full_page_html: html,
                header_image_url: article.image,
                article_date: article.published_time.unwrap_or_else(Utc::now),
                read_time_seconds,
                read_time_display,
                created_from_feed: feed_item.map(|item| item.feed_id),
            })
            .await?;

        if let Some(item) = feed_item {
            if let Err(e) = self
                .repository
                .set_feed_item_saved_as_link(item.id, link_id)
                .await
            {
                error!(feed_item_id = item.id, link_id, error = %e, "Failed to mark feed item as saved");
            }
        }

        info!(link_id, user_id, url = %url, "Saved link");
        self.repository
            .get_link(link_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("link {}", link_id)))
    }

    /// Save a new feed item to its owner's library when the feed asks for
    /// it. Returns the created link, or `None` when nothing was done.
    pub async fn maybe_promote_feed_item(&self, item_id: RecordId) -> Result<Option<Link>> {
        let Some(item) = self.repository.get_feed_item(item_id).await? else {
            return Err(AppError::NotFound(format!("feed item {}", item_id)));
        };
        let Some(feed) = self.repository.get_feed(item.feed_id).await? else {
            return Err(AppError::NotFound(format!("feed {}", item.feed_id)));
        };

        if !feed.auto_add_feed_items_to_library {
            return Ok(None);
        }

        if item.saved_as_link.is_some() {
            info!(feed_item_id = item_id, "Feed item already saved to library, skipping");
            return Ok(None);
        }

        let url = match Url::parse(&item.url) {
            Ok(url) => url,
            Err(e) => {
                warn!(feed_item_id = item_id, url = %item.url, error = %e, "Feed item has an unusable URL");
                return Ok(None);
            }
        };

        let link = self.save_url(item.user_id, &url, Some(&item)).await?;
        info!(feed_item_id = item_id, link_id = link.id, "Added feed item to library");
        Ok(Some(link))
    }

    async fn cookies_for(&self, user_id: RecordId, url: &Url) -> Vec<UserCookie> {
        let host = url.host_str().unwrap_or_default();
        match self.repository.get_user_cookies(user_id, host).await {
            Ok(cookies) => cookies,
            Err(e) => {
                warn!(user_id, host, error = %e, "Failed to load cookies, fetching without them");
                Vec::new()
            }
        }
    }
}
