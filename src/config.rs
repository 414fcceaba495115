use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::ai::ProviderUrls;
use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Root directory for archive attachments.
    #[serde(default = "default_files_dir")]
    pub files_dir: String,

    /// Single-file snapshot service. Archiving is disabled when unset.
    pub singlefile_url: Option<String>,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_minutes: u64,

    /// Feeds fetched more recently than this are left alone by the scheduled poll.
    #[serde(default = "default_stale_after")]
    pub stale_after_minutes: u64,

    #[serde(default = "default_poll_batch_size")]
    pub poll_batch_size: u32,

    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    #[serde(default = "default_archive_timeout")]
    pub archive_timeout_secs: u64,

    #[serde(default = "default_llm_timeout")]
    pub llm_timeout_secs: u64,

    #[serde(default = "default_tagging_model")]
    pub tagging_model: String,

    #[serde(default)]
    pub providers: ProviderUrls,
}

fn data_dir() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lynx");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir
}

fn default_db_path() -> String {
    data_dir().join("lynx.db").to_string_lossy().to_string()
}

fn default_files_dir() -> String {
    data_dir().join("files").to_string_lossy().to_string()
}

fn default_poll_interval() -> u64 {
    6 * 60
}

fn default_stale_after() -> u64 {
    60
}

fn default_poll_batch_size() -> u32 {
    100
}

fn default_fetch_timeout() -> u64 {
    30
}

fn default_archive_timeout() -> u64 {
    60
}

fn default_llm_timeout() -> u64 {
    60
}

fn default_tagging_model() -> String {
    "openai/gpt-4o-mini".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            files_dir: default_files_dir(),
            singlefile_url: None,
            poll_interval_minutes: default_poll_interval(),
            stale_after_minutes: default_stale_after(),
            poll_batch_size: default_poll_batch_size(),
            fetch_timeout_secs: default_fetch_timeout(),
            archive_timeout_secs: default_archive_timeout(),
            llm_timeout_secs: default_llm_timeout(),
            tagging_model: default_tagging_model(),
            providers: ProviderUrls::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            let config = Config::default();
            config.save()?;
            config
        };

        config.apply_env();
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("LYNX_CONFIG") {
            return PathBuf::from(path);
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lynx")
            .join("config.toml")
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("SINGLEFILE_URL") {
            self.singlefile_url = Some(url).filter(|u| !u.trim().is_empty());
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_minutes * 60)
    }

    pub fn stale_after(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.stale_after_minutes as i64)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn archive_timeout(&self) -> Duration {
        Duration::from_secs(self.archive_timeout_secs)
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }
}
