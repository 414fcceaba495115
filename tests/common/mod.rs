#![allow(dead_code)]

use std::sync::Arc;

use lynx::ai::ProviderUrls;
use lynx::models::{RecordId, UserSettings};
use lynx::pipeline::{QueuedSpawner, TaskSpawner};
use lynx::{App, Config};
use tempfile::TempDir;
use wiremock::MockServer;

pub const USER: RecordId = 1;
pub const OTHER_USER: RecordId = 2;

pub struct Harness {
    pub dir: TempDir,
    pub server: MockServer,
    pub spawner: Arc<QueuedSpawner>,
    pub config: Config,
    pub app: App,
}

impl Harness {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.server.uri(), path)
    }

    pub async fn enable_enrichment(&self, user_id: RecordId) {
        self.app
            .repository
            .save_user_settings(UserSettings {
                user_id,
                openai_api_key: Some("sk-openai".to_string()),
                anthropic_api_key: None,
                openrouter_api_key: Some("sk-openrouter".to_string()),
                automatically_summarize_new_links: true,
                automatically_suggest_tags_for_new_links: true,
                summarization_model: Some("gpt-4o-mini".to_string()),
            })
            .await
            .unwrap();
    }
}

pub fn config_for(dir: &TempDir, server: &MockServer, archive: bool) -> Config {
    Config {
        db_path: dir.path().join("lynx.db").to_string_lossy().to_string(),
        files_dir: dir.path().join("files").to_string_lossy().to_string(),
        singlefile_url: archive.then(|| format!("{}/singlefile", server.uri())),
        fetch_timeout_secs: 5,
        archive_timeout_secs: 5,
        llm_timeout_secs: 5,
        providers: ProviderUrls {
            openai: format!("{}/openai/v1/chat/completions", server.uri()),
            anthropic: format!("{}/anthropic/v1/messages", server.uri()),
            openrouter: format!("{}/openrouter/api/v1/chat/completions", server.uri()),
        },
        ..Config::default()
    }
}

/// App backed by a temp database, a queued spawner and a mock server that
/// stands in for every outbound service.
pub async fn harness(archive: bool) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    let config = config_for(&dir, &server, archive);
    let spawner = Arc::new(QueuedSpawner::new());
    let app = App::new(&config, spawner.clone() as Arc<dyn TaskSpawner>)
        .await
        .unwrap();
    Harness {
        dir,
        server,
        spawner,
        config,
        app,
    }
}

pub fn article_html(title: &str) -> String {
    let body = vec!["word"; 570].join(" ");
    format!(
        r#"<html><head><title>{title}</title>
        <meta name="author" content="Jane Doe"></head>
        <body><article><h1>{title}</h1><p>{body}</p></article></body></html>"#
    )
}

pub struct Entry<'a> {
    pub guid: &'a str,
    pub link: String,
    pub pub_date: Option<&'a str>,
}

pub fn rss(entries: &[Entry<'_>]) -> String {
    let items: String = entries
        .iter()
        .map(|e| {
            let date = e
                .pub_date
                .map(|d| format!("<pubDate>{}</pubDate>", d))
                .unwrap_or_default();
            format!(
                "<item><guid>{}</guid><title>Item {}</title><link>{}</link>{}</item>",
                e.guid, e.guid, e.link, date
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0"?><rss version="2.0"><channel><title>Test Feed</title><description>A feed</description><link>https://example.com</link>{}</channel></rss>"#,
        items
    )
}

pub fn chat_completion(content: &str) -> serde_json::Value {
    serde_json::json!({
        "choices": [{ "message": { "role": "assistant", "content": content } }]
    })
}
