use std::path::PathBuf;

use crate::error::Result;
use crate::models::RecordId;

/// Attachment storage on the local filesystem.
///
/// Files belonging to a link live under `<root>/links/<link_id>/<key>`; only
/// the key is stored on the record.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn link_file_path(&self, link_id: RecordId, key: &str) -> PathBuf {
        self.root
            .join("links")
            .join(link_id.to_string())
            .join(key)
    }

    pub async fn exists(&self, link_id: RecordId, key: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.link_file_path(link_id, key)).await?)
    }

    /// Write to a temporary sibling and rename, so a partially written file is
    /// never visible under its final key.
    pub async fn put(&self, link_id: RecordId, key: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.link_file_path(link_id, key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("part");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(path)
    }

    pub async fn read(&self, link_id: RecordId, key: &str) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(self.link_file_path(link_id, key)).await?)
    }
}
