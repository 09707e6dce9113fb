//! Filesystem bucket served under a public URL prefix

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::storage::ObjectStorage;

/// Object storage rooted at a local directory
pub struct LocalStorage {
    base_path: PathBuf,
    url_prefix: String,
}

impl LocalStorage {
    /// Create a new local storage handler
    pub fn new(base_path: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            url_prefix: url_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    /// Resolve a storage path inside the bucket, rejecting escapes
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(AppError::Storage(format!("Invalid storage path: {}", path)));
        }
        Ok(self.base_path.join(relative))
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn upload(&self, path: &str, data: &[u8], content_type: &str) -> Result<String> {
        let file_path = self.resolve(path)?;

        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::write(&file_path, data)
            .await
            .map_err(|e| AppError::Storage(format!("Upload to {} failed: {}", path, e)))?;

        debug!(path = %path, size = data.len(), content_type = %content_type, "Stored object");

        Ok(self.public_url(path))
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        let file_path = self.resolve(path)?;

        fs::read(&file_path)
            .await
            .map_err(|e| AppError::Storage(format!("Download of {} failed: {}", path, e)))
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.url_prefix, path.trim_start_matches('/'))
    }
}
