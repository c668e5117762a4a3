//! Ingest Storage Library
//!
//! This crate provides the object store abstraction used by the upload task and
//! its implementations: GCS / S3-compatible buckets, the local filesystem, and
//! an in-memory store for tests and dry runs.
//!
//! # Object key format
//!
//! Objects are addressed as `{path}/{name}` inside the configured bucket. Keys
//! must not contain `..` or a leading `/`; the `keys` module validates them so
//! all backends agree.

pub mod factory;
pub(crate) mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod memory;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use ingest_core::StorageBackend;
pub use keys::content_type_for;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use memory::MemoryStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{Storage, StorageError, StorageResult};
