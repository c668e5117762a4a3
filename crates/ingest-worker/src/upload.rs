//! Upload task: write the payload, then make the object public.
//!
//! Each stage is attempted once. A failed write skips the ACL stage; a failed
//! ACL leaves the written object in place.

use ingest_core::ObjectLocation;
use ingest_storage::{content_type_for, Storage, StorageError};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStage {
    Write,
    Acl,
}

impl Display for UploadStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            UploadStage::Write => write!(f, "write"),
            UploadStage::Acl => write!(f, "acl"),
        }
    }
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Writing {key} failed: {source}")]
    Write {
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("Making {key} public failed: {source}")]
    Acl {
        key: String,
        #[source]
        source: StorageError,
    },
}

impl UploadError {
    pub fn stage(&self) -> UploadStage {
        match self {
            UploadError::Write { .. } => UploadStage::Write,
            UploadError::Acl { .. } => UploadStage::Acl,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            UploadError::Write { key, .. } | UploadError::Acl { key, .. } => key,
        }
    }
}

/// A written, publicly readable object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedObject {
    pub location: ObjectLocation,
    pub url: String,
}

pub type UploadOutcome = Result<UploadedObject, UploadError>;

#[derive(Clone)]
pub struct UploadTask {
    storage: Arc<dyn Storage>,
}

impl UploadTask {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn bucket(&self) -> &str {
        self.storage.bucket()
    }

    /// Store `data` at `{path}/{name}` in the bucket and grant public read.
    pub async fn run(&self, path: &str, name: &str, data: Vec<u8>) -> UploadOutcome {
        let location = ObjectLocation::new(self.storage.bucket(), path, name);
        let content_type = content_type_for(&location.key);
        let size = data.len();

        self.storage
            .put_object(&location.key, data, &content_type)
            .await
            .map_err(|source| UploadError::Write {
                key: location.key.clone(),
                source,
            })?;

        self.storage
            .make_public(&location.key)
            .await
            .map_err(|source| UploadError::Acl {
                key: location.key.clone(),
                source,
            })?;

        let url = self.storage.public_url(&location.key);

        tracing::info!(
            object = %location,
            size_bytes = size,
            content_type = %content_type,
            url = %url,
            "Object uploaded and made public"
        );

        Ok(UploadedObject { location, url })
    }
}
