use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{error, info};

use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::{EnrichmentOutcome, RecordId, SkipReason};

use super::providers::ChatClient;

#[async_trait]
pub trait Tagger: Send + Sync {
    /// Suggest tags from the owner's existing vocabulary, at most once per link.
    async fn maybe_suggest_tags(&self, link_id: RecordId) -> Result<EnrichmentOutcome>;
}

pub struct LlmTagger {
    repository: Repository,
    client: Arc<ChatClient>,
    model: String,
}

impl LlmTagger {
    pub fn new(repository: Repository, client: Arc<ChatClient>, model: impl Into<String>) -> Self {
        Self {
            repository,
            client,
            model: model.into(),
        }
    }

    async fn mark_suggested(&self, link_id: RecordId, tag_ids: Vec<RecordId>) -> Result<()> {
        let suggested_at = Utc::now();
        self.repository
            .update_link(link_id, move |link| {
                if !tag_ids.is_empty() {
                    link.suggested_tags = tag_ids;
                }
                link.tags_suggested_at = Some(suggested_at);
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Tagger for LlmTagger {
    async fn maybe_suggest_tags(&self, link_id: RecordId) -> Result<EnrichmentOutcome> {
        let Some(link) = self.repository.get_link(link_id).await? else {
            return Err(AppError::NotFound(format!("link {}", link_id)));
        };

        if link.tags_suggested_at.is_some() {
            info!(link_id, "Tag suggestion skipped, suggestions have already been generated");
            return Ok(EnrichmentOutcome::Skipped(SkipReason::AlreadyDone));
        }

        let user_id = link.user_id;
        let Some(settings) = self.repository.get_user_settings(user_id).await? else {
            info!(link_id, user_id, "Tag suggestion skipped, user_settings not found");
            return Ok(EnrichmentOutcome::Skipped(SkipReason::NoSettings));
        };

        if !settings.automatically_suggest_tags_for_new_links {
            info!(link_id, user_id, "Tag suggestion skipped, automatic tag suggestion is disabled");
            return Ok(EnrichmentOutcome::Skipped(SkipReason::DisabledByUser));
        }

        let Some(api_key) = settings.openrouter_api_key.as_deref().filter(|k| !k.is_empty()) else {
            error!(link_id, user_id, "Tag suggestion failed, OpenRouter API key not set");
            return Ok(EnrichmentOutcome::Skipped(SkipReason::MissingApiKey));
        };

        let tags = self.repository.get_tags_for_user(user_id).await?;
        if tags.is_empty() {
            info!(link_id, user_id, "Tag suggestion skipped, user has no existing tags");
            self.mark_suggested(link_id, Vec::new()).await?;
            return Ok(EnrichmentOutcome::Completed);
        }

        let names: Vec<String> = tags.iter().map(|t| t.name.clone()).collect();
        let ids_by_name: HashMap<&str, RecordId> =
            tags.iter().map(|t| (t.name.as_str(), t.id)).collect();

        let suggested = self
            .client
            .suggest_tags(&link.raw_text_content, &names, api_key, &self.model)
            .await?;

        // The model may answer with names outside the vocabulary; those are dropped.
        let mut tag_ids: Vec<RecordId> = suggested
            .iter()
            .filter_map(|name| ids_by_name.get(name.as_str()).copied())
            .collect();
        tag_ids.sort_unstable();
        tag_ids.dedup();
        let count = tag_ids.len();

        self.mark_suggested(link_id, tag_ids).await?;

        if count == 0 {
            info!(link_id, "No tags suggested for link, tags_suggested_at updated");
        } else {
            info!(link_id, model = %self.model, suggested = count, "Successfully suggested tags for link");
        }
        Ok(EnrichmentOutcome::Completed)
    }
}
