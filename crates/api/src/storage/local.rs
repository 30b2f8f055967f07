//! Filesystem storage backend.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::{object_url, validate_key, ObjectStorage, StorageError};

/// Writes objects as files in one directory.
pub struct LocalStorage {
    root: PathBuf,
    public_url: String,
}

impl LocalStorage {
    pub fn new(root: PathBuf, public_url: String) -> Self {
        Self { root, public_url }
    }

    /// Create the root directory if needed.
    pub async fn ensure_root(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, StorageError> {
        validate_key(key)?;
        fs::create_dir_all(&self.root).await?;

        let path = self.root.join(key);

        // Each writer gets its own temp file; the rename publishes it whole.
        let temp_path = self.root.join(format!(".{key}.{}.tmp", Uuid::new_v4()));
        let written = match write_synced(&temp_path, &data).await {
            Ok(()) => fs::rename(&temp_path, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            if let Err(cleanup) = fs::remove_file(&temp_path).await {
                tracing::warn!(
                    path = %temp_path.display(),
                    error = %cleanup,
                    "Failed to remove temp file"
                );
            }
            return Err(e.into());
        }

        Ok(object_url(&self.public_url, key))
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}

async fn write_synced(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(data).await?;
    file.sync_all().await
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    /// Names of the entries in `dir`.
    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn put_writes_file_and_returns_url() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().to_path_buf(), "http://host/media/".into());

        let url = storage
            .put("artifact_3", b"jpeg-bytes".to_vec(), "image/jpeg")
            .await
            .unwrap();

        assert_eq!(url, "http://host/media/artifact_3");
        let stored = std::fs::read(dir.path().join("artifact_3")).unwrap();
        assert_eq!(stored, b"jpeg-bytes");
    }

    #[tokio::test]
    async fn put_replaces_existing_object() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().to_path_buf(), "/media".into());

        storage.put("artifact_1", b"old".to_vec(), "image/png").await.unwrap();
        storage.put("artifact_1", b"new".to_vec(), "image/png").await.unwrap();

        assert_eq!(std::fs::read(dir.path().join("artifact_1")).unwrap(), b"new");
        assert_eq!(dir_entries(dir.path()), vec!["artifact_1"]);
    }

    #[tokio::test]
    async fn concurrent_puts_publish_one_whole_object() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().to_path_buf(), "/media".into());
        let big = vec![0xAA; 2 * 1024 * 1024];
        let small = vec![0xBB; 16];

        let (a, b) = tokio::join!(
            storage.put("artifact_4", big.clone(), "image/png"),
            storage.put("artifact_4", small.clone(), "image/png"),
        );
        a.unwrap();
        b.unwrap();

        let stored = std::fs::read(dir.path().join("artifact_4")).unwrap();
        assert!(stored == big || stored == small);
        assert_eq!(dir_entries(dir.path()), vec!["artifact_4"]);
    }

    #[tokio::test]
    async fn failed_rename_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().to_path_buf(), "/media".into());
        // A non-empty directory in the target's place makes the rename fail.
        std::fs::create_dir(dir.path().join("artifact_5")).unwrap();
        std::fs::write(dir.path().join("artifact_5").join("keep"), b"x").unwrap();

        let result = storage.put("artifact_5", b"img".to_vec(), "image/png").await;
        assert_matches!(result, Err(StorageError::Io(_)));
        assert_eq!(dir_entries(dir.path()), vec!["artifact_5"]);
    }

    #[tokio::test]
    async fn put_creates_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested").join("media");
        let storage = LocalStorage::new(root.clone(), "/media".into());

        storage.put("artifact_9", vec![1, 2, 3], "image/jpeg").await.unwrap();
        assert!(root.join("artifact_9").exists());
    }

    #[tokio::test]
    async fn traversal_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().to_path_buf(), "/media".into());

        let result = storage.put("../escape", vec![0], "image/jpeg").await;
        assert_matches!(result, Err(StorageError::InvalidKey(_)));
    }
}
