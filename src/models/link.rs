use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RecordId;

/// An article saved to a user's library.
///
/// `summary`, `archive` and `suggested_tags`/`tags_suggested_at` are filled in
/// after creation by the enrichment jobs and are never cleared by them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub id: RecordId,
    pub user_id: RecordId,
    pub original_url: String,
    pub cleaned_url: String,
    pub title: String,
    pub hostname: String,
    pub author: Option<String>,
    pub excerpt: Option<String>,
    pub article_html: String,
    pub raw_text_content: String,
    pub full_page_html: String,
    pub header_image_url: Option<String>,
    pub article_date: DateTime<Utc>,
    pub read_time_seconds: i64,
    pub read_time_display: String,
    pub reading_progress: f64,
    pub summary: Option<String>,
    pub archive: Option<String>,
    pub tags: Vec<RecordId>,
    pub suggested_tags: Vec<RecordId>,
    pub tags_suggested_at: Option<DateTime<Utc>>,
    pub created_from_feed: Option<RecordId>,
    pub last_viewed_at: Option<DateTime<Utc>>,
    pub added_to_library: DateTime<Utc>,
}

impl Link {
    pub fn has_summary(&self) -> bool {
        self.summary.as_deref().is_some_and(|s| !s.is_empty())
    }

    pub fn has_archive(&self) -> bool {
        self.archive.as_deref().is_some_and(|a| !a.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct NewLink {
    pub user_id: RecordId,
    pub original_url: String,
    pub cleaned_url: String,
    pub title: String,
    pub hostname: String,
    pub author: Option<String>,
    pub excerpt: Option<String>,
    pub article_html: String,
    pub raw_text_content: String,
    pub full_page_html: String,
    pub header_image_url: Option<String>,
    pub article_date: DateTime<Utc>,
    pub read_time_seconds: i64,
    pub read_time_display: String,
    pub created_from_feed: Option<RecordId>,
}
