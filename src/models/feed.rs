use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RecordId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feed {
    pub id: RecordId,
    pub user_id: RecordId,
    pub feed_url: String,
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub auto_add_feed_items_to_library: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewFeed {
    pub user_id: RecordId,
    pub feed_url: String,
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub last_fetched_at: DateTime<Utc>,
    pub auto_add_feed_items_to_library: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: RecordId,
    pub feed_id: RecordId,
    pub user_id: RecordId,
    pub title: String,
    pub guid: String,
    pub pub_date: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub url: String,
    pub saved_as_link: Option<RecordId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewFeedItem {
    pub feed_id: RecordId,
    pub user_id: RecordId,
    pub title: String,
    pub guid: String,
    pub pub_date: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub url: String,
}
