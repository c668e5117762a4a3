//! Storage abstraction trait
//!
//! This module defines the Storage trait that all object store backends implement.

use crate::StorageBackend;
use async_trait::async_trait;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Setting public access failed: {0}")]
    AclFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Object store client.
///
/// Writing an object and making it public are separate calls so that callers
/// can tell which stage failed. Neither call retries on its own.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Write `data` to `key`, replacing any existing object. An empty payload
    /// produces a zero-byte object.
    async fn put_object(&self, key: &str, data: Vec<u8>, content_type: &str) -> StorageResult<()>;

    /// Grant read access on `key` to unauthenticated readers.
    async fn make_public(&self, key: &str) -> StorageResult<()>;

    /// Publicly reachable address of `key`.
    fn public_url(&self, key: &str) -> String;

    /// Bucket the store writes into
    fn bucket(&self) -> &str;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
