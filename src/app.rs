use std::sync::Arc;

use chrono::{Months, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::info;

use crate::ai::{ChatClient, LlmSummarizer, LlmTagger, Summarizer, Tagger};
use crate::config::Config;
use crate::db::{FileStore, Repository};
use crate::error::{AppError, Result};
use crate::feed::{FeedFetcher, FeedPoller, PollSummary, RefreshOutcome};
use crate::models::{ApiKey, Feed, Link, RecordId};
use crate::pipeline::{Dispatcher, TaskSpawner};
use crate::services::{
    ArticleExtractor, Archiver, Fetcher, HttpFetcher, LinkSaver, ReadabilityExtractor,
    SingleFileArchiver,
};

const API_KEY_LEN: usize = 32;
const API_KEY_LIFETIME_MONTHS: u32 = 6;

/// The swappable pieces of the pipeline.
pub struct Capabilities {
    pub fetcher: Arc<dyn Fetcher>,
    pub extractor: Arc<dyn ArticleExtractor>,
    pub archiver: Arc<dyn Archiver>,
    pub summarizer: Arc<dyn Summarizer>,
    pub tagger: Arc<dyn Tagger>,
}

impl Capabilities {
    /// Production implementations configured from `config`.
    pub fn from_config(config: &Config, repository: &Repository, files: &FileStore) -> Result<Self> {
        let chat = Arc::new(ChatClient::new(config.llm_timeout(), config.providers.clone())?);
        Ok(Self {
            fetcher: Arc::new(HttpFetcher::new(config.fetch_timeout())?),
            extractor: Arc::new(ReadabilityExtractor),
            archiver: Arc::new(SingleFileArchiver::new(
                repository.clone(),
                files.clone(),
                config.singlefile_url.clone(),
                config.archive_timeout(),
            )?),
            summarizer: Arc::new(LlmSummarizer::new(repository.clone(), chat.clone())),
            tagger: Arc::new(LlmTagger::new(
                repository.clone(),
                chat,
                config.tagging_model.clone(),
            )),
        })
    }
}

/// Entry point for everything a user can ask of the pipeline.
pub struct App {
    pub repository: Repository,
    pub files: FileStore,
    saver: Arc<LinkSaver>,
    poller: Arc<FeedPoller>,
    dispatcher: Dispatcher,
}

impl App {
    pub async fn new(config: &Config, spawner: Arc<dyn TaskSpawner>) -> Result<Self> {
        let repository = Repository::new(&config.db_path).await?;
        let files = FileStore::new(&config.files_dir);
        let capabilities = Capabilities::from_config(config, &repository, &files)?;
        Ok(Self::with_capabilities(config, repository, files, capabilities, spawner))
    }

    pub fn with_capabilities(
        config: &Config,
        repository: Repository,
        files: FileStore,
        capabilities: Capabilities,
        spawner: Arc<dyn TaskSpawner>,
    ) -> Self {
        let saver = Arc::new(LinkSaver::new(
            repository.clone(),
            capabilities.fetcher.clone(),
            capabilities.extractor,
        ));
        let dispatcher = Dispatcher::new(
            spawner,
            capabilities.archiver,
            capabilities.summarizer,
            capabilities.tagger,
            saver.clone(),
        );
        let poller = Arc::new(FeedPoller::new(
            repository.clone(),
            FeedFetcher::new(capabilities.fetcher),
            dispatcher.clone(),
            config.stale_after(),
            config.poll_batch_size,
        ));

        Self {
            repository,
            files,
            saver,
            poller,
            dispatcher,
        }
    }

    pub fn poller(&self) -> Arc<FeedPoller> {
        self.poller.clone()
    }

    /// Save `url` to the user's library and start its enrichment.
    pub async fn submit_url(
        &self,
        user_id: RecordId,
        url: &str,
        feed_item_id: Option<RecordId>,
    ) -> Result<Link> {
        let url = crate::feed::parse_user_url(url)?;

        let feed_item = match feed_item_id {
            Some(item_id) => {
                let item = self
                    .repository
                    .get_feed_item(item_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("feed item {}", item_id)))?;
                if item.user_id != user_id {
                    return Err(AppError::Forbidden(format!(
                        "feed item {} belongs to another user",
                        item_id
                    )));
                }
                Some(item)
            }
            None => None,
        };

        let link = self.saver.save_url(user_id, &url, feed_item.as_ref()).await?;
        self.dispatcher.link_created(link.id);
        Ok(link)
    }

    pub async fn subscribe_feed(
        &self,
        user_id: RecordId,
        url: &str,
        auto_add_feed_items_to_library: bool,
    ) -> Result<RecordId> {
        self.poller
            .subscribe(user_id, url, auto_add_feed_items_to_library)
            .await
    }

    /// Queue an archive for a link the user owns. Returns once the job is queued.
    pub async fn trigger_archive(&self, user_id: RecordId, link_id: RecordId) -> Result<()> {
        self.owned_link(user_id, link_id).await?;
        info!(link_id, user_id, "Archive requested");
        self.dispatcher.archive(link_id);
        Ok(())
    }

    /// With a feed id, refresh that one feed. Otherwise refresh all of the
    /// user's feeds, or without a user, every due feed.
    pub async fn refresh_feeds(
        &self,
        user_id: Option<RecordId>,
        feed_id: Option<RecordId>,
    ) -> Result<PollSummary> {
        match (user_id, feed_id) {
            (user_id, Some(feed_id)) => {
                let feed = self.feed(feed_id).await?;
                if let Some(user_id) = user_id {
                    if feed.user_id != user_id {
                        return Err(AppError::Forbidden(format!(
                            "feed {} belongs to another user",
                            feed_id
                        )));
                    }
                }
                let outcome = self.poller.refresh_feed(feed_id).await?;
                let mut summary = PollSummary {
                    polled: 1,
                    ..PollSummary::default()
                };
                match outcome {
                    RefreshOutcome::NotModified => summary.not_modified = 1,
                    RefreshOutcome::Refreshed { new_items } => summary.new_items = new_items,
                }
                Ok(summary)
            }
            (Some(user_id), None) => self.poller.refresh_user_feeds(user_id).await,
            (None, None) => self.poller.poll_due_feeds().await,
        }
    }

    pub async fn generate_api_key(&self, user_id: RecordId, name: &str) -> Result<ApiKey> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Input("API key name is required".to_string()));
        }

        let key: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(API_KEY_LEN)
            .map(char::from)
            .collect();
        let expires_at = Utc::now()
            .checked_add_months(Months::new(API_KEY_LIFETIME_MONTHS))
            .ok_or_else(|| AppError::Input("API key expiry out of range".to_string()))?;

        let api_key = self
            .repository
            .insert_api_key(user_id, name, &key, expires_at)
            .await?;
        info!(user_id, key_id = api_key.id, "Generated API key");
        Ok(api_key)
    }

    pub async fn mark_link_viewed(&self, user_id: RecordId, link_id: RecordId) -> Result<Link> {
        self.owned_link(user_id, link_id).await?;
        let viewed_at = Utc::now();
        self.repository
            .update_link(link_id, move |link| link.last_viewed_at = Some(viewed_at))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("link {}", link_id)))
    }

    async fn feed(&self, feed_id: RecordId) -> Result<Feed> {
        self.repository
            .get_feed(feed_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("feed {}", feed_id)))
    }

    async fn owned_link(&self, user_id: RecordId, link_id: RecordId) -> Result<Link> {
        let link = self
            .repository
            .get_link(link_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("link {}", link_id)))?;
        if link.user_id != user_id {
            return Err(AppError::Forbidden(format!(
                "link {} belongs to another user",
                link_id
            )));
        }
        Ok(link)
    }
}
