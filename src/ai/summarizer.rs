use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::{EnrichmentOutcome, RecordId, SkipReason, UserSettings};

use super::providers::{ChatClient, Provider};

#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize the link unless it already has a summary or its owner has
    /// not opted in.
    async fn maybe_summarize(&self, link_id: RecordId) -> Result<EnrichmentOutcome>;
}

pub struct LlmSummarizer {
    repository: Repository,
    client: Arc<ChatClient>,
}

impl LlmSummarizer {
    pub fn new(repository: Repository, client: Arc<ChatClient>) -> Self {
        Self { repository, client }
    }
}

fn api_key_for(settings: &UserSettings, provider: Provider) -> Option<&str> {
    let key = match provider {
        Provider::OpenAi => settings.openai_api_key.as_deref(),
        Provider::Anthropic => settings.anthropic_api_key.as_deref(),
        Provider::OpenRouter => settings.openrouter_api_key.as_deref(),
    };
    key.filter(|k| !k.is_empty())
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn maybe_summarize(&self, link_id: RecordId) -> Result<EnrichmentOutcome> {
        let Some(link) = self.repository.get_link(link_id).await? else {
            return Err(AppError::NotFound(format!("link {}", link_id)));
        };

        if link.has_summary() {
            info!(link_id, "Summarization skipped, link already has a summary");
            return Ok(EnrichmentOutcome::Skipped(SkipReason::AlreadyDone));
        }

        let user_id = link.user_id;
        let Some(settings) = self.repository.get_user_settings(user_id).await? else {
            info!(link_id, user_id, "Summarization skipped, user_settings not found");
            return Ok(EnrichmentOutcome::Skipped(SkipReason::NoSettings));
        };

        if !settings.automatically_summarize_new_links {
            info!(link_id, user_id, "Summarization skipped, automatic summarization is disabled");
            return Ok(EnrichmentOutcome::Skipped(SkipReason::DisabledByUser));
        }

        let Some(model_id) = settings
            .summarization_model
            .as_deref()
            .filter(|m| !m.trim().is_empty())
        else {
            info!(link_id, user_id, "Summarization skipped, summarization model not set");
            return Ok(EnrichmentOutcome::Skipped(SkipReason::NotConfigured));
        };

        let Some((provider, model)) = Provider::for_model(model_id) else {
            error!(link_id, model = model_id, "Summarization failed, unsupported summarization model");
            return Ok(EnrichmentOutcome::Skipped(SkipReason::UnsupportedModel));
        };

        let Some(api_key) = api_key_for(&settings, provider) else {
            error!(
                link_id,
                user_id,
                provider = provider.name(),
                "Summarization failed, API key not set"
            );
            return Ok(EnrichmentOutcome::Skipped(SkipReason::MissingApiKey));
        };

        let summary = self
            .client
            .summarize(provider, &link.raw_text_content, api_key, model)
            .await?;

        self.repository
            .update_link(link_id, move |link| link.summary = Some(summary))
            .await?;

        info!(link_id, model = model_id, "Successfully summarized link");
        Ok(EnrichmentOutcome::Completed)
    }
}
