//! Filesystem-backed blob storage for sticker images.
//!
//! Blobs are content-addressed (`<sha256>.<ext>`) under `dir` and served by
//! the HTTP router from `/blobs`, so the public URL is `<base_url>/<key>`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::BaseBlobStore;
use crate::common::utils::{extension_for, generate_content_hash};

#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    dir: PathBuf,
    base_url: String,
}

impl LocalBlobStore {
    pub fn new(dir: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl BaseBlobStore for LocalBlobStore {
    async fn upload(&self, bytes: &[u8], content_type: &str) -> Result<String> {
        let key = format!(
            "{}.{}",
            generate_content_hash(bytes),
            extension_for(content_type)
        );
        let path = self.dir.join(&key);

        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create blob dir {}", self.dir.display()))?;

        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            // Write-then-rename so readers never see a partial file.
            let tmp = self.dir.join(format!("{}.tmp-{}", key, uuid::Uuid::new_v4()));
            tokio::fs::write(&tmp, bytes)
                .await
                .with_context(|| format!("Failed to write blob {}", tmp.display()))?;
            tokio::fs::rename(&tmp, &path)
                .await
                .with_context(|| format!("Failed to finalize blob {}", path.display()))?;
        }

        tracing::debug!(key = %key, bytes = bytes.len(), "Stored blob");

        Ok(format!("{}/{}", self.base_url, key))
    }
}
