use crate::keys::{join_url, validate_key};
use crate::traits::{Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Local filesystem storage, laid out as `{base_path}/{bucket}/{key}`.
///
/// Meant for development against a broker without cloud credentials. Making
/// an object public sets world-readable permissions on unix.
#[derive(Clone)]
pub struct LocalStorage {
    root: PathBuf,
    bucket: String,
    base_url: String,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Directory holding one subdirectory per bucket
    /// * `bucket` - Bucket name, used as the subdirectory
    /// * `base_url` - Base URL the directory is served from
    pub async fn new(
        base_path: impl Into<PathBuf>,
        bucket: String,
        base_url: String,
    ) -> StorageResult<Self> {
        let root = base_path.into().join(&bucket);

        fs::create_dir_all(&root).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                root.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            root,
            bucket,
            base_url,
        })
    }

    /// Keys must stay below the bucket directory: no absolute keys, no `..`.
    fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        if key.starts_with('/') || key.split('/').any(|segment| segment == "..") {
            return Err(StorageError::InvalidKey(format!(
                "Storage key '{}' escapes the bucket directory",
                key
            )));
        }
        Ok(self.root.join(key))
    }

    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn put_object(&self, key: &str, data: Vec<u8>, _content_type: &str) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        let size = data.len();

        self.ensure_parent_dir(&path).await?;

        let start = std::time::Instant::now();

        let mut file = fs::File::create(&path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        file.write_all(&data).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage write successful"
        );

        Ok(())
    }

    async fn make_public(&self, key: &str) -> StorageResult<()> {
        let path = self.key_to_path(key)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::AclFailed(format!(
                "{} does not exist",
                path.display()
            )));
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644))
                .await
                .map_err(|e| {
                    StorageError::AclFailed(format!(
                        "Failed to set permissions on {}: {}",
                        path.display(),
                        e
                    ))
                })?;
        }

        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        join_url(&self.base_url, &self.bucket, key)
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn storage(dir: &TempDir) -> LocalStorage {
        LocalStorage::new(
            dir.path(),
            "mybucket".to_string(),
            "http://localhost:8080".to_string(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn writes_under_bucket_directory() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir).await;

        storage
            .put_object("test/a.png", b"hello".to_vec(), "image/png")
            .await
            .unwrap();

        let written = std::fs::read(dir.path().join("mybucket/test/a.png")).unwrap();
        assert_eq!(written, b"hello");
    }

    #[tokio::test]
    async fn empty_payload_is_a_zero_byte_object() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir).await;

        storage
            .put_object("test/empty.bin", Vec::new(), "application/octet-stream")
            .await
            .unwrap();

        let meta = std::fs::metadata(dir.path().join("mybucket/test/empty.bin")).unwrap();
        assert_eq!(meta.len(), 0);
    }

    #[tokio::test]
    async fn second_write_overwrites_first() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir).await;

        storage.put_object("test/a.txt", b"first".to_vec(), "text/plain").await.unwrap();
        storage.put_object("test/a.txt", b"2nd".to_vec(), "text/plain").await.unwrap();

        let written = std::fs::read(dir.path().join("mybucket/test/a.txt")).unwrap();
        assert_eq!(written, b"2nd");
    }

    #[tokio::test]
    async fn rejects_traversal_keys() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir).await;

        let err = storage
            .put_object("../escape.txt", b"x".to_vec(), "text/plain")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));

        let err = storage
            .put_object("/images/a.png", b"x".to_vec(), "image/png")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
        assert!(!dir.path().join("images").exists());
    }

    #[tokio::test]
    async fn make_public_requires_existing_object() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir).await;

        let err = storage.make_public("test/missing.png").await.unwrap_err();
        assert!(matches!(err, StorageError::AclFailed(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn make_public_sets_world_readable_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let storage = storage(&dir).await;
        storage.put_object("test/a.png", b"x".to_vec(), "image/png").await.unwrap();

        storage.make_public("test/a.png").await.unwrap();

        let mode = std::fs::metadata(dir.path().join("mybucket/test/a.png"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[tokio::test]
    async fn public_url_includes_bucket() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir).await;
        assert_eq!(
            storage.public_url("test/a.png"),
            "http://localhost:8080/mybucket/test/a.png"
        );
    }
}
