use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use url::Url;

use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::{Feed, NewFeed, RecordId, UserCookie};
use crate::pipeline::Dispatcher;
use crate::services::ConditionalHeaders;

use super::fetcher::{FeedFetcher, FeedLoad, LoadedFeed};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    NotModified,
    Refreshed { new_items: usize },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub polled: usize,
    pub failed: usize,
    pub not_modified: usize,
    pub new_items: usize,
}

impl PollSummary {
    fn record(&mut self, result: &Result<RefreshOutcome>) {
        self.polled += 1;
        match result {
            Ok(RefreshOutcome::NotModified) => self.not_modified += 1,
            Ok(RefreshOutcome::Refreshed { new_items }) => self.new_items += new_items,
            Err(_) => self.failed += 1,
        }
    }
}

pub struct FeedPoller {
    repository: Repository,
    fetcher: FeedFetcher,
    dispatcher: Dispatcher,
    stale_after: chrono::Duration,
    batch_size: u32,
}

impl FeedPoller {
    pub fn new(
        repository: Repository,
        fetcher: FeedFetcher,
        dispatcher: Dispatcher,
        stale_after: chrono::Duration,
        batch_size: u32,
    ) -> Self {
        Self {
            repository,
            fetcher,
            dispatcher,
            stale_after,
            batch_size,
        }
    }

    /// Refresh every feed that has not been fetched within `stale_after`,
    /// oldest first. One feed failing does not stop the batch.
    pub async fn poll_due_feeds(&self) -> Result<PollSummary> {
        let fetched_before = Utc::now() - self.stale_after;
        let feeds = self
            .repository
            .get_due_feeds(fetched_before, self.batch_size)
            .await?;
        info!(count = feeds.len(), "Polling due feeds");
        Ok(self.refresh_all(feeds).await)
    }

    /// Refresh all of one user's feeds regardless of when they were last fetched.
    pub async fn refresh_user_feeds(&self, user_id: RecordId) -> Result<PollSummary> {
        let feeds = self.repository.get_feeds_for_user(user_id).await?;
        Ok(self.refresh_all(feeds).await)
    }

    async fn refresh_all(&self, feeds: Vec<Feed>) -> PollSummary {
        let mut summary = PollSummary::default();
        for feed in feeds {
            let result = self.refresh(&feed).await;
            if let Err(e) = &result {
                error!(feed_id = feed.id, url = %feed.feed_url, error = %e, "Failed to refresh feed");
            }
            summary.record(&result);
        }
        info!(
            polled = summary.polled,
            failed = summary.failed,
            new_items = summary.new_items,
            "Feed poll finished"
        );
        summary
    }

    pub async fn refresh_feed(&self, feed_id: RecordId) -> Result<RefreshOutcome> {
        let feed = self
            .repository
            .get_feed(feed_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("feed {}", feed_id)))?;
        self.refresh(&feed).await
    }

    async fn refresh(&self, feed: &Feed) -> Result<RefreshOutcome> {
        let url = Url::parse(&feed.feed_url)?;
        let cookies = self.cookies_for(feed.user_id, &url).await;
        let conditional = ConditionalHeaders::new(feed.etag.clone(), feed.last_modified.clone());

        match self.fetcher.load(&url, &cookies, &conditional).await? {
            FeedLoad::NotModified => {
                info!(feed_id = feed.id, "Feed not modified");
                self.repository
                    .update_feed_fetch_state(
                        feed.id,
                        feed.etag.clone(),
                        feed.last_modified.clone(),
                        Utc::now(),
                    )
                    .await?;
                Ok(RefreshOutcome::NotModified)
            }
            FeedLoad::Loaded(loaded) => {
                let imported = self
                    .import_items(feed.id, feed.user_id, &loaded, feed.last_fetched_at)
                    .await;
                // Validators and fetch time are recorded even when an item failed.
                self.repository
                    .update_feed_fetch_state(
                        feed.id,
                        loaded.etag.clone(),
                        loaded.last_modified.clone(),
                        Utc::now(),
                    )
                    .await?;
                let new_items = imported?;
                info!(feed_id = feed.id, new_items, "Refreshed feed");
                Ok(RefreshOutcome::Refreshed { new_items })
            }
        }
    }

    /// Subscribe `user_id` to the feed at `raw_url` (or the feed an HTML page
    /// at that URL links to) and import its current entries.
    pub async fn subscribe(
        &self,
        user_id: RecordId,
        raw_url: &str,
        auto_add_feed_items_to_library: bool,
    ) -> Result<RecordId> {
        let url = parse_user_url(raw_url)?;
        self.ensure_not_subscribed(user_id, url.as_str()).await?;

        let cookies = self.cookies_for(user_id, &url).await;
        let loaded = self.fetcher.discover(&url, &cookies).await?;
        if loaded.url != url {
            self.ensure_not_subscribed(user_id, loaded.url.as_str()).await?;
        }

        let feed_id = self
            .repository
            .insert_feed(NewFeed {
                user_id,
                feed_url: loaded.url.to_string(),
                name: loaded.title(),
                description: loaded.description(),
                image_url: loaded.image_url(),
                etag: loaded.etag.clone(),
                last_modified: loaded.last_modified.clone(),
                last_fetched_at: Utc::now(),
                auto_add_feed_items_to_library,
            })
            .await
            .map_err(|e| {
                // A concurrent subscription to the same URL won the insert.
                if e.is_unique_violation() {
                    AppError::Input(format!("already subscribed to {}", loaded.url))
                } else {
                    e
                }
            })?;

        let new_items = self.import_items(feed_id, user_id, &loaded, None).await?;
        info!(feed_id, user_id, url = %loaded.url, new_items, "Subscribed to feed");
        Ok(feed_id)
    }

    async fn ensure_not_subscribed(&self, user_id: RecordId, feed_url: &str) -> Result<()> {
        if self
            .repository
            .find_feed_by_url(user_id, feed_url)
            .await?
            .is_some()
        {
            return Err(AppError::Input(format!(
                "already subscribed to {}",
                feed_url
            )));
        }
        Ok(())
    }

    async fn import_items(
        &self,
        feed_id: RecordId,
        user_id: RecordId,
        loaded: &LoadedFeed,
        cutoff: Option<DateTime<Utc>>,
    ) -> Result<usize> {
        let mut created = 0;
        for item in loaded.items(feed_id, user_id, cutoff) {
            if self.repository.feed_item_exists(feed_id, &item.guid).await? {
                continue;
            }
            if let Some(item_id) = self.repository.insert_feed_item(item).await? {
                created += 1;
                self.dispatcher.feed_item_created(item_id);
            }
        }
        Ok(created)
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

    /// Poll on every tick of `interval` until `shutdown` resolves. The first
    /// poll runs immediately. A poll always finishes before the next tick is
    /// awaited, so polls never overlap.
    pub async fn run_scheduler(&self, interval: Duration, shutdown: impl Future<Output = ()>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Feed scheduler shutting down");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_due_feeds().await {
                        error!(error = %e, "Scheduled feed poll failed");
                    }
                }
            }
        }
    }
}

/// Trim and parse a URL typed by a user. Only http(s) is accepted.
pub(crate) fn parse_user_url(raw: &str) -> Result<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AppError::Input("URL is required".to_string()));
    }
    let url = Url::parse(raw).map_err(|e| AppError::Input(format!("invalid URL {}: {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(AppError::Input(format!("unsupported URL scheme: {}", scheme))),
    }
}
