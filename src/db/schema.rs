pub const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- feeds table
CREATE TABLE IF NOT EXISTS feeds (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    feed_url TEXT NOT NULL,
    name TEXT NOT NULL,
    description TEXT,
    image_url TEXT,
    etag TEXT,
    last_modified TEXT,
    last_fetched_at TEXT,
    auto_add_feed_items_to_library INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(user_id, feed_url)
);

CREATE INDEX IF NOT EXISTS idx_feeds_last_fetched_at ON feeds(last_fetched_at);

-- feed_items table
CREATE TABLE IF NOT EXISTS feed_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    feed_id INTEGER NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
    user_id INTEGER NOT NULL,
    title TEXT NOT NULL,
    guid TEXT NOT NULL,
    pub_date TEXT,
    description TEXT,
    url TEXT NOT NULL,
    saved_as_link INTEGER REFERENCES links(id) ON DELETE SET NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(feed_id, guid)
);

CREATE INDEX IF NOT EXISTS idx_feed_items_feed_id ON feed_items(feed_id);

-- links table
CREATE TABLE IF NOT EXISTS links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    original_url TEXT NOT NULL,
    cleaned_url TEXT NOT NULL,
    title TEXT NOT NULL,
    hostname TEXT NOT NULL,
    author TEXT,
    excerpt TEXT,
    article_html TEXT NOT NULL DEFAULT '',
    raw_text_content TEXT NOT NULL DEFAULT '',
    full_page_html TEXT NOT NULL DEFAULT '',
    header_image_url TEXT,
    article_date TEXT NOT NULL,
    read_time_seconds INTEGER NOT NULL DEFAULT 0,
    read_time_display TEXT NOT NULL DEFAULT '',
    reading_progress REAL NOT NULL DEFAULT 0,
    summary TEXT,
    archive TEXT,
    tags_suggested_at TEXT,
    created_from_feed INTEGER REFERENCES feeds(id) ON DELETE SET NULL,
    last_viewed_at TEXT,
    added_to_library TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_links_user_id ON links(user_id);

-- tags table
CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    slug TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(user_id, name)
);

-- link <-> tag relations
CREATE TABLE IF NOT EXISTS link_tags (
    link_id INTEGER NOT NULL REFERENCES links(id) ON DELETE CASCADE,
    tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
    PRIMARY KEY (link_id, tag_id)
);

CREATE TABLE IF NOT EXISTS link_suggested_tags (
    link_id INTEGER NOT NULL REFERENCES links(id) ON DELETE CASCADE,
    tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
    PRIMARY KEY (link_id, tag_id)
);

-- user_settings table
CREATE TABLE IF NOT EXISTS user_settings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL UNIQUE,
    openai_api_key TEXT,
    anthropic_api_key TEXT,
    openrouter_api_key TEXT,
    automatically_summarize_new_links INTEGER NOT NULL DEFAULT 0,
    automatically_suggest_tags_for_new_links INTEGER NOT NULL DEFAULT 0,
    summarization_model TEXT
);

-- user_cookies table
CREATE TABLE IF NOT EXISTS user_cookies (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    domain TEXT NOT NULL,
    name TEXT NOT NULL,
    value TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_user_cookies_user_domain ON user_cookies(user_id, domain);

-- api_keys table
CREATE TABLE IF NOT EXISTS api_keys (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    api_key TEXT NOT NULL UNIQUE,
    expires_at TEXT NOT NULL,
    last_used_at TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;
