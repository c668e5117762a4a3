//! Ingest Core Library
//!
//! This crate provides the domain model, error types and configuration shared by
//! the storage and worker crates of the bucket ingest pipeline.

pub mod config;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{AckMode, Config, LogFormat};
pub use error::DecodeError;
pub use models::{CompletionNotification, ObjectLocation, UploadRequest};
pub use storage_types::StorageBackend;
