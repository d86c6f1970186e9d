//! Filesystem store for images received from chats.
//!
//! Files are named `received_image_{source}_{id}.jpg` and are kept only for
//! a bounded age; every store first sweeps files older than that age.

use crate::error::StoreError;
use muaddib_core::ImageId;
use rootcause::Report;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// Default retention for stored images.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(36_000);

/// Stores received images under one directory.
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
    max_age: Duration,
}

impl ImageStore {
    /// Opens the store, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub async fn open(
        dir: impl Into<PathBuf>,
        max_age: Duration,
    ) -> Result<Self, Report<StoreError>> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::CreateDirFailed {
                path: dir.display().to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { dir, max_age })
    }

    /// Returns the storage directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes an image received from `source_id` and returns its path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub async fn store(
        &self,
        source_id: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, Report<StoreError>> {
        self.cleanup(self.max_age).await;

        let file_name = format!("received_image_{}_{}.jpg", sanitize(source_id), ImageId::new());
        let path = self.dir.join(file_name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| StoreError::WriteFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        debug!(path = %path.display(), bytes = bytes.len(), "image stored");
        Ok(path)
    }

    /// Deletes files older than `max_age` and returns how many were removed.
    pub async fn cleanup(&self, max_age: Duration) -> usize {
        let cutoff = SystemTime::now()
            .checked_sub(max_age)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        match self.remove_modified_before(cutoff).await {
            Ok(removed) => removed,
            Err(report) => {
                warn!(error = %report, "image cleanup failed");
                0
            }
        }
    }

    async fn remove_modified_before(
        &self,
        cutoff: SystemTime,
    ) -> Result<usize, Report<StoreError>> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| StoreError::ListFailed {
                reason: e.to_string(),
            })?;

        let mut removed = 0;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    return Err(StoreError::ListFailed {
                        reason: e.to_string(),
                    }
                    .into());
                }
            };
            let path = entry.path();
            let modified = match entry.metadata().await {
                Ok(meta) if meta.is_file() => meta.modified(),
                Ok(_) => continue,
                Err(e) => Err(e),
            };
            match modified {
                Ok(modified) if modified < cutoff => {
                    if let Err(e) = tokio::fs::remove_file(&path).await {
                        warn!(path = %path.display(), error = %e, "failed to remove old image");
                    } else {
                        removed += 1;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to read image metadata");
                }
            }
        }
        if removed > 0 {
            debug!(removed, "old images removed");
        }
        Ok(removed)
    }
}

/// Keeps file names to a safe character set.
fn sanitize(component: &str) -> String {
    component
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_writes_named_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = ImageStore::open(dir.path().join("images"), DEFAULT_MAX_AGE)
            .await
            .expect("open");

        let path = store.store("U123", b"jpeg bytes").await.expect("store");

        let name = path.file_name().and_then(|n| n.to_str()).expect("file name");
        assert!(name.starts_with("received_image_U123_img_"));
        assert!(name.ends_with(".jpg"));
        assert_eq!(tokio::fs::read(&path).await.expect("read"), b"jpeg bytes");
    }

    #[tokio::test]
    async fn cleanup_keeps_fresh_files() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = ImageStore::open(dir.path(), DEFAULT_MAX_AGE).await.expect("open");
        store.store("U1", b"a").await.expect("store");

        assert_eq!(store.cleanup(DEFAULT_MAX_AGE).await, 0);
    }

    #[tokio::test]
    async fn cleanup_removes_old_files_but_not_directories() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = ImageStore::open(dir.path(), DEFAULT_MAX_AGE).await.expect("open");
        store.store("U1", b"a").await.expect("store");
        store.store("U2", b"b").await.expect("store");
        tokio::fs::create_dir(dir.path().join("nested"))
            .await
            .expect("nested dir");

        let future = SystemTime::now() + Duration::from_secs(3600);
        let removed = store.remove_modified_before(future).await.expect("cleanup");

        assert_eq!(removed, 2);
        assert!(dir.path().join("nested").is_dir());
    }

    #[test]
    fn source_ids_are_sanitized() {
        assert_eq!(sanitize("C1/../x"), "C1____x");
    }
}
