use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RecordId;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserSettings {
    pub user_id: RecordId,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub openrouter_api_key: Option<String>,
    pub automatically_summarize_new_links: bool,
    pub automatically_suggest_tags_for_new_links: bool,
    pub summarization_model: Option<String>,
}

/// A cookie the user has stored for authenticating fetches against `domain`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCookie {
    pub user_id: RecordId,
    pub domain: String,
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: RecordId,
    pub user_id: RecordId,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: RecordId,
    pub user_id: RecordId,
    pub name: String,
    pub api_key: String,
    pub expires_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}
