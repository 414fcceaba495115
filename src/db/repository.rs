use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection as SqliteConnection, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{
    ApiKey, Feed, FeedItem, Link, NewFeed, NewFeedItem, NewLink, RecordId, Tag, UserCookie,
    UserSettings,
};

use super::schema::SCHEMA;

/// Cookies sent with a single request are capped at this many, newest first.
const MAX_COOKIES_PER_DOMAIN: u32 = 10;

const LINK_COLUMNS: &str = "id, user_id, original_url, cleaned_url, title, hostname, author, \
     excerpt, article_html, raw_text_content, full_page_html, header_image_url, article_date, \
     read_time_seconds, read_time_display, reading_progress, summary, archive, \
     tags_suggested_at, created_from_feed, last_viewed_at, added_to_library";

const FEED_COLUMNS: &str = "id, user_id, feed_url, name, description, image_url, etag, \
     last_modified, last_fetched_at, auto_add_feed_items_to_library, created_at";

const FEED_ITEM_COLUMNS: &str =
    "id, feed_id, user_id, title, guid, pub_date, description, url, saved_as_link, created_at";

#[derive(Clone)]
pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // Feed operations

    pub async fn insert_feed(&self, feed: NewFeed) -> Result<RecordId> {
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO feeds (user_id, feed_url, name, description, image_url, etag,
                                          last_modified, last_fetched_at, auto_add_feed_items_to_library)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"#,
                    params![
                        feed.user_id,
                        feed.feed_url,
                        feed.name,
                        feed.description,
                        feed.image_url,
                        feed.etag,
                        feed.last_modified,
                        format_datetime(&feed.last_fetched_at),
                        feed.auto_add_feed_items_to_library,
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    pub async fn get_feed(&self, id: RecordId) -> Result<Option<Feed>> {
        let feed = self
            .conn
            .call(move |conn| {
                let sql = format!("SELECT {} FROM feeds WHERE id = ?1", FEED_COLUMNS);
                let feed = conn
                    .query_row(&sql, params![id], feed_from_row)
                    .optional()?;
                Ok(feed)
            })
            .await?;
        Ok(feed)
    }

    pub async fn find_feed_by_url(&self, user_id: RecordId, feed_url: &str) -> Result<Option<Feed>> {
        let feed_url = feed_url.to_string();
        let feed = self
            .conn
            .call(move |conn| {
                let sql = format!(
                    "SELECT {} FROM feeds WHERE user_id = ?1 AND feed_url = ?2",
                    FEED_COLUMNS
                );
                let feed = conn
                    .query_row(&sql, params![user_id, feed_url], feed_from_row)
                    .optional()?;
                Ok(feed)
            })
            .await?;
        Ok(feed)
    }

    pub async fn get_feeds_for_user(&self, user_id: RecordId) -> Result<Vec<Feed>> {
        let feeds = self
            .conn
            .call(move |conn| {
                let sql = format!(
                    "SELECT {} FROM feeds WHERE user_id = ?1 ORDER BY name",
                    FEED_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let feeds = stmt
                    .query_map(params![user_id], feed_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(feeds)
            })
            .await?;
        Ok(feeds)
    }

    /// Feeds never fetched or last fetched before `fetched_before`, oldest first.
    pub async fn get_due_feeds(
        &self,
        fetched_before: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Feed>> {
        let cutoff = format_datetime(&fetched_before);
        let feeds = self
            .conn
            .call(move |conn| {
                let sql = format!(
                    r#"SELECT {} FROM feeds
                       WHERE last_fetched_at IS NULL OR last_fetched_at < ?1
                       ORDER BY last_fetched_at ASC NULLS FIRST, id ASC
                       LIMIT ?2"#,
                    FEED_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let feeds = stmt
                    .query_map(params![cutoff, limit], feed_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(feeds)
            })
            .await?;
        Ok(feeds)
    }

    pub async fn update_feed_fetch_state(
        &self,
        id: RecordId,
        etag: Option<String>,
        last_modified: Option<String>,
        fetched_at: DateTime<Utc>,
    ) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE feeds SET etag = ?1, last_modified = ?2, last_fetched_at = ?3 WHERE id = ?4",
                    params![etag, last_modified, format_datetime(&fetched_at), id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // Feed item operations

    pub async fn feed_item_exists(&self, feed_id: RecordId, guid: &str) -> Result<bool> {
        let guid = guid.to_string();
        let exists = self
            .conn
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM feed_items WHERE feed_id = ?1 AND guid = ?2",
                    params![feed_id, guid],
                    |row| row.get(0),
                )?;
                Ok(count > 0)
            })
            .await?;
        Ok(exists)
    }

    /// Returns `None` when an item with the same (feed, guid) already exists.
    pub async fn insert_feed_item(&self, item: NewFeedItem) -> Result<Option<RecordId>> {
        let id = self
            .conn
            .call(move |conn| {
                let inserted = conn.execute(
                    r#"INSERT INTO feed_items (feed_id, user_id, title, guid, pub_date, description, url)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                       ON CONFLICT(feed_id, guid) DO NOTHING"#,
                    params![
                        item.feed_id,
                        item.user_id,
                        item.title,
                        item.guid,
                        item.pub_date.as_ref().map(format_datetime),
                        item.description,
                        item.url,
                    ],
                )?;
                Ok((inserted > 0).then(|| conn.last_insert_rowid()))
            })
            .await?;
        Ok(id)
    }

    pub async fn get_feed_item(&self, id: RecordId) -> Result<Option<FeedItem>> {
        let item = self
            .conn
            .call(move |conn| {
                let sql = format!("SELECT {} FROM feed_items WHERE id = ?1", FEED_ITEM_COLUMNS);
                let item = conn
                    .query_row(&sql, params![id], feed_item_from_row)
                    .optional()?;
                Ok(item)
            })
            .await?;
        Ok(item)
    }

    pub async fn get_feed_items(&self, feed_id: RecordId) -> Result<Vec<FeedItem>> {
        let items = self
            .conn
            .call(move |conn| {
                let sql = format!(
                    "SELECT {} FROM feed_items WHERE feed_id = ?1 ORDER BY id",
                    FEED_ITEM_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let items = stmt
                    .query_map(params![feed_id], feed_item_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(items)
            })
            .await?;
        Ok(items)
    }

    pub async fn set_feed_item_saved_as_link(
        &self,
        item_id: RecordId,
        link_id: RecordId,
    ) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE feed_items SET saved_as_link = ?1 WHERE id = ?2",
                    params![link_id, item_id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // Link operations

    pub async fn insert_link(&self, link: NewLink) -> Result<RecordId> {
        let added_to_library = format_datetime(&Utc::now());
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO links (user_id, original_url, cleaned_url, title, hostname, author,
                                          excerpt, article_html, raw_text_content, full_page_html,
                                          header_image_url, article_date, read_time_seconds,
                                          read_time_display, reading_progress, created_from_feed,
                                          added_to_library)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, 0, ?15, ?16)"#,
                    params![
                        link.user_id,
                        link.original_url,
                        link.cleaned_url,
                        link.title,
                        link.hostname,
                        link.author,
                        link.excerpt,
                        link.article_html,
                        link.raw_text_content,
                        link.full_page_html,
                        link.header_image_url,
                        format_datetime(&link.article_date),
                        link.read_time_seconds,
                        link.read_time_display,
                        link.created_from_feed,
                        added_to_library,
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    pub async fn get_link(&self, id: RecordId) -> Result<Option<Link>> {
        let link = self
            .conn
            .call(move |conn| Ok(load_link(conn, id)?))
            .await?;
        Ok(link)
    }

    /// Re-reads the link inside a transaction, applies `apply` and writes the
    /// mutable columns back before committing. Returns `None` if the link is gone.
    pub async fn update_link<F>(&self, id: RecordId, apply: F) -> Result<Option<Link>>
    where
        F: FnOnce(&mut Link) + Send + 'static,
    {
        let link = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let Some(mut link) = load_link(&tx, id)? else {
                    return Ok(None);
                };
                apply(&mut link);
                write_link_state(&tx, &link)?;
                tx.commit()?;
                Ok(Some(link))
            })
            .await?;
        Ok(link)
    }

    // Tag operations

    pub async fn create_tag(&self, user_id: RecordId, name: &str) -> Result<Tag> {
        let name = name.trim().to_string();
        let slug = slugify(&name);
        let tag = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO tags (user_id, name, slug) VALUES (?1, ?2, ?3)",
                    params![user_id, name, slug],
                )?;
                Ok(Tag {
                    id: conn.last_insert_rowid(),
                    user_id,
                    name,
                    slug,
                })
            })
            .await?;
        Ok(tag)
    }

    pub async fn get_tags_for_user(&self, user_id: RecordId) -> Result<Vec<Tag>> {
        let tags = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, user_id, name, slug FROM tags WHERE user_id = ?1 ORDER BY id DESC",
                )?;
                let tags = stmt
                    .query_map(params![user_id], |row| {
                        Ok(Tag {
                            id: row.get(0)?,
                            user_id: row.get(1)?,
                            name: row.get(2)?,
                            slug: row.get(3)?,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(tags)
            })
            .await?;
        Ok(tags)
    }

    // User settings & cookies

    pub async fn get_user_settings(&self, user_id: RecordId) -> Result<Option<UserSettings>> {
        let settings = self
            .conn
            .call(move |conn| {
                let settings = conn
                    .query_row(
                        r#"SELECT user_id, openai_api_key, anthropic_api_key, openrouter_api_key,
                                  automatically_summarize_new_links,
                                  automatically_suggest_tags_for_new_links, summarization_model
                           FROM user_settings WHERE user_id = ?1"#,
                        params![user_id],
                        |row| {
                            Ok(UserSettings {
                                user_id: row.get(0)?,
                                openai_api_key: row.get(1)?,
                                anthropic_api_key: row.get(2)?,
                                openrouter_api_key: row.get(3)?,
                                automatically_summarize_new_links: row.get(4)?,
                                automatically_suggest_tags_for_new_links: row.get(5)?,
                                summarization_model: row.get(6)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(settings)
            })
            .await?;
        Ok(settings)
    }

    pub async fn save_user_settings(&self, settings: UserSettings) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO user_settings (user_id, openai_api_key, anthropic_api_key,
                                                  openrouter_api_key, automatically_summarize_new_links,
                                                  automatically_suggest_tags_for_new_links,
                                                  summarization_model)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                       ON CONFLICT(user_id) DO UPDATE SET
                           openai_api_key = excluded.openai_api_key,
                           anthropic_api_key = excluded.anthropic_api_key,
                           openrouter_api_key = excluded.openrouter_api_key,
                           automatically_summarize_new_links = excluded.automatically_summarize_new_links,
                           automatically_suggest_tags_for_new_links = excluded.automatically_suggest_tags_for_new_links,
                           summarization_model = excluded.summarization_model"#,
                    params![
                        settings.user_id,
                        settings.openai_api_key,
                        settings.anthropic_api_key,
                        settings.openrouter_api_key,
                        settings.automatically_summarize_new_links,
                        settings.automatically_suggest_tags_for_new_links,
                        settings.summarization_model,
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn add_user_cookie(&self, cookie: UserCookie) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO user_cookies (user_id, domain, name, value) VALUES (?1, ?2, ?3, ?4)",
                    params![cookie.user_id, cookie.domain, cookie.name, cookie.value],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Cookies stored for exactly `domain`, newest first.
    pub async fn get_user_cookies(&self, user_id: RecordId, domain: &str) -> Result<Vec<UserCookie>> {
        let domain = domain.to_string();
        let cookies = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT user_id, domain, name, value FROM user_cookies
                       WHERE user_id = ?1 AND domain = ?2
                       ORDER BY id DESC LIMIT ?3"#,
                )?;
                let cookies = stmt
                    .query_map(params![user_id, domain, MAX_COOKIES_PER_DOMAIN], |row| {
                        Ok(UserCookie {
                            user_id: row.get(0)?,
                            domain: row.get(1)?,
                            name: row.get(2)?,
                            value: row.get(3)?,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(cookies)
            })
            .await?;
        Ok(cookies)
    }

    // API keys

    pub async fn insert_api_key(
        &self,
        user_id: RecordId,
        name: &str,
        api_key: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<ApiKey> {
        let name = name.to_string();
        let api_key = api_key.to_string();
        let record = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO api_keys (user_id, name, api_key, expires_at) VALUES (?1, ?2, ?3, ?4)",
                    params![user_id, name, api_key, format_datetime(&expires_at)],
                )?;
                Ok(ApiKey {
                    id: conn.last_insert_rowid(),
                    user_id,
                    name,
                    api_key,
                    expires_at,
                    last_used_at: None,
                })
            })
            .await?;
        Ok(record)
    }
}

/// Timestamps are stored as fixed-width RFC 3339 so text comparison orders them.
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339 first (e.g., "2026-01-11T12:34:56.000000Z")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Try SQLite datetime format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn get_datetime(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    Ok(row
        .get::<_, Option<String>>(idx)?
        .and_then(|s| parse_datetime(&s)))
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

fn feed_from_row(row: &Row) -> rusqlite::Result<Feed> {
    Ok(Feed {
        id: row.get(0)?,
        user_id: row.get(1)?,
        feed_url: row.get(2)?,
        name: row.get(3)?,
        description: row.get(4)?,
        image_url: row.get(5)?,
        etag: row.get(6)?,
        last_modified: row.get(7)?,
        last_fetched_at: get_datetime(row, 8)?,
        auto_add_feed_items_to_library: row.get(9)?,
        created_at: get_datetime(row, 10)?.unwrap_or_else(Utc::now),
    })
}

fn feed_item_from_row(row: &Row) -> rusqlite::Result<FeedItem> {
    Ok(FeedItem {
        id: row.get(0)?,
        feed_id: row.get(1)?,
        user_id: row.get(2)?,
        title: row.get(3)?,
        guid: row.get(4)?,
        pub_date: get_datetime(row, 5)?,
        description: row.get(6)?,
        url: row.get(7)?,
        saved_as_link: row.get(8)?,
        created_at: get_datetime(row, 9)?.unwrap_or_else(Utc::now),
    })
}

fn link_from_row(row: &Row) -> rusqlite::Result<Link> {
    Ok(Link {
        id: row.get(0)?,
        user_id: row.get(1)?,
        original_url: row.get(2)?,
        cleaned_url: row.get(3)?,
        title: row.get(4)?,
        hostname: row.get(5)?,
        author: row.get(6)?,
        excerpt: row.get(7)?,
        article_html: row.get(8)?,
        raw_text_content: row.get(9)?,
        full_page_html: row.get(10)?,
        header_image_url: row.get(11)?,
        article_date: get_datetime(row, 12)?.unwrap_or_else(Utc::now),
        read_time_seconds: row.get(13)?,
        read_time_display: row.get(14)?,
        reading_progress: row.get(15)?,
        summary: row.get(16)?,
        archive: row.get(17)?,
        tags: Vec::new(),
        suggested_tags: Vec::new(),
        tags_suggested_at: get_datetime(row, 18)?,
        created_from_feed: row.get(19)?,
        last_viewed_at: get_datetime(row, 20)?,
        added_to_library: get_datetime(row, 21)?.unwrap_or_else(Utc::now),
    })
}

fn load_tag_ids(conn: &SqliteConnection, table: &str, link_id: RecordId) -> rusqlite::Result<Vec<RecordId>> {
    let sql = format!("SELECT tag_id FROM {} WHERE link_id = ?1 ORDER BY tag_id", table);
    let mut stmt = conn.prepare(&sql)?;
    let ids = stmt
        .query_map(params![link_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids)
}

fn replace_tag_ids(
    conn: &SqliteConnection,
    table: &str,
    link_id: RecordId,
    tag_ids: &[RecordId],
) -> rusqlite::Result<()> {
    conn.execute(
        &format!("DELETE FROM {} WHERE link_id = ?1", table),
        params![link_id],
    )?;
    let mut stmt = conn.prepare(&format!(
        "INSERT OR IGNORE INTO {} (link_id, tag_id) VALUES (?1, ?2)",
        table
    ))?;
    for tag_id in tag_ids {
        stmt.execute(params![link_id, tag_id])?;
    }
    Ok(())
}

fn load_link(conn: &SqliteConnection, id: RecordId) -> rusqlite::Result<Option<Link>> {
    let sql = format!("SELECT {} FROM links WHERE id = ?1", LINK_COLUMNS);
    let Some(mut link) = conn.query_row(&sql, params![id], link_from_row).optional()? else {
        return Ok(None);
    };
    link.tags = load_tag_ids(conn, "link_tags", id)?;
    link.suggested_tags = load_tag_ids(conn, "link_suggested_tags", id)?;
    Ok(Some(link))
}

/// Writes back every column a link may change after creation.
fn write_link_state(conn: &SqliteConnection, link: &Link) -> rusqlite::Result<()> {
    conn.execute(
        r#"UPDATE links SET summary = ?1, archive = ?2, tags_suggested_at = ?3,
                            last_viewed_at = ?4, reading_progress = ?5
           WHERE id = ?6"#,
        params![
            link.summary,
            link.archive,
            link.tags_suggested_at.as_ref().map(format_datetime),
            link.last_viewed_at.as_ref().map(format_datetime),
            link.reading_progress,
            link.id,
        ],
    )?;
    replace_tag_ids(conn, "link_tags", link.id, &link.tags)?;
    replace_tag_ids(conn, "link_suggested_tags", link.id, &link.suggested_tags)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn repo() -> (tempfile::TempDir, Repository) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let repo = Repository::new(path.to_str().unwrap()).await.unwrap();
        (dir, repo)
    }

    fn new_feed(user_id: RecordId, url: &str, fetched: DateTime<Utc>) -> NewFeed {
        NewFeed {
            user_id,
            feed_url: url.to_string(),
            name: "Feed".to_string(),
            description: None,
            image_url: None,
            etag: None,
            last_modified: None,
            last_fetched_at: fetched,
            auto_add_feed_items_to_library: false,
        }
    }

    fn new_link(user_id: RecordId) -> NewLink {
        NewLink {
            user_id,
            original_url: "https://example.com/a".to_string(),
            cleaned_url: "https://example.com/a".to_string(),
            title: "A".to_string(),
            hostname: "example.com".to_string(),
            author: None,
            excerpt: None,
            article_html: "<p>a</p>".to_string(),
            raw_text_content: "a".to_string(),
            full_page_html: "<html></html>".to_string(),
            header_image_url: None,
            article_date: Utc::now(),
            read_time_seconds: 0,
            read_time_display: "0 min".to_string(),
            created_from_feed: None,
        }
    }

    #[tokio::test]
    async fn due_feeds_are_oldest_first_and_limited() {
        let (_dir, repo) = repo().await;
        let now = Utc::now();
        let recent = repo
            .insert_feed(new_feed(1, "https://a.test/recent", now))
            .await
            .unwrap();
        let old = repo
            .insert_feed(new_feed(1, "https://a.test/old", now - Duration::hours(5)))
            .await
            .unwrap();
        let older = repo
            .insert_feed(new_feed(1, "https://a.test/older", now - Duration::hours(9)))
            .await
            .unwrap();

        let due = repo.get_due_feeds(now - Duration::hours(1), 10).await.unwrap();
        let ids: Vec<_> = due.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![older, old]);
        assert!(!ids.contains(&recent));

        let limited = repo.get_due_feeds(now - Duration::hours(1), 1).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id, older);
    }

    #[tokio::test]
    async fn duplicate_subscription_is_a_unique_violation() {
        let (_dir, repo) = repo().await;
        let now = Utc::now();
        repo.insert_feed(new_feed(1, "https://a.test/feed", now))
            .await
            .unwrap();

        let err = repo
            .insert_feed(new_feed(1, "https://a.test/feed", now))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());

        let other_user = repo.insert_feed(new_feed(2, "https://a.test/feed", now)).await;
        assert!(other_user.is_ok());
        assert!(!crate::error::AppError::NotFound("feed".into()).is_unique_violation());
    }

    #[tokio::test]
    async fn feed_item_guid_is_unique_per_feed() {
        let (_dir, repo) = repo().await;
        let feed_id = repo
            .insert_feed(new_feed(1, "https://a.test/feed", Utc::now()))
            .await
            .unwrap();
        let item = NewFeedItem {
            feed_id,
            user_id: 1,
            title: "Item".to_string(),
            guid: "guid-1".to_string(),
            pub_date: None,
            description: None,
            url: "https://a.test/item".to_string(),
        };

        assert!(repo.insert_feed_item(item.clone()).await.unwrap().is_some());
        assert!(repo.insert_feed_item(item).await.unwrap().is_none());
        assert!(repo.feed_item_exists(feed_id, "guid-1").await.unwrap());
        assert_eq!(repo.get_feed_items(feed_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_link_preserves_other_fields() {
        let (_dir, repo) = repo().await;
        let tag = repo.create_tag(1, "Rust Lang").await.unwrap();
        assert_eq!(tag.slug, "rust-lang");

        let id = repo.insert_link(new_link(1)).await.unwrap();
        repo.update_link(id, |link| link.archive = Some("archive_x.html".into()))
            .await
            .unwrap();
        let tag_id = tag.id;
        repo.update_link(id, move |link| {
            link.summary = Some("short".into());
            link.suggested_tags = vec![tag_id];
        })
        .await
        .unwrap();

        let link = repo.get_link(id).await.unwrap().unwrap();
        assert_eq!(link.archive.as_deref(), Some("archive_x.html"));
        assert_eq!(link.summary.as_deref(), Some("short"));
        assert_eq!(link.suggested_tags, vec![tag_id]);
        assert!(link.tags.is_empty());

        assert!(repo.update_link(999, |_| {}).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cookies_are_scoped_to_user_and_domain() {
        let (_dir, repo) = repo().await;
        for (user_id, domain, name) in [
            (1, "example.com", "session"),
            (1, "example.com", "pref"),
            (1, "other.com", "session"),
            (2, "example.com", "session"),
        ] {
            repo.add_user_cookie(UserCookie {
                user_id,
                domain: domain.to_string(),
                name: name.to_string(),
                value: "v".to_string(),
            })
            .await
            .unwrap();
        }

        let cookies = repo.get_user_cookies(1, "example.com").await.unwrap();
        let names: Vec<_> = cookies.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["pref", "session"]);
    }
}
