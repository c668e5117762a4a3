//! In-memory object store.
//!
//! Backs the `memory` storage backend for dry runs and is the store the
//! pipeline tests run against. Write and ACL failures can be injected
//! independently.

use crate::keys::{join_url, validate_key};
use crate::traits::{Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Objects {
    data: HashMap<String, Vec<u8>>,
    public: HashSet<String>,
    writes: HashMap<String, usize>,
}

pub struct MemoryStorage {
    bucket: String,
    base_url: String,
    objects: Mutex<Objects>,
    fail_writes: AtomicBool,
    fail_acl: AtomicBool,
    acl_calls: AtomicUsize,
}

impl MemoryStorage {
    pub fn new(bucket: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            base_url: base_url.into(),
            objects: Mutex::new(Objects::default()),
            fail_writes: AtomicBool::new(false),
            fail_acl: AtomicBool::new(false),
            acl_calls: AtomicUsize::new(0),
        }
    }

    /// Make every subsequent `put_object` fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `make_public` fail.
    pub fn fail_acl(&self, fail: bool) {
        self.fail_acl.store(fail, Ordering::SeqCst);
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().data.get(key).cloned()
    }

    pub fn is_public(&self, key: &str) -> bool {
        self.lock().public.contains(key)
    }

    /// Number of successful writes to `key`.
    pub fn write_count(&self, key: &str) -> usize {
        self.lock().writes.get(key).copied().unwrap_or(0)
    }

    pub fn object_count(&self) -> usize {
        self.lock().data.len()
    }

    /// Number of `make_public` calls, failed ones included.
    pub fn acl_calls(&self) -> usize {
        self.acl_calls.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, Objects> {
        self.objects.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn put_object(&self, key: &str, data: Vec<u8>, _content_type: &str) -> StorageResult<()> {
        validate_key(key)?;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::UploadFailed(format!(
                "injected write failure for {}",
                key
            )));
        }

        let mut objects = self.lock();
        objects.data.insert(key.to_string(), data);
        *objects.writes.entry(key.to_string()).or_insert(0) += 1;
        Ok(())
    }

    async fn make_public(&self, key: &str) -> StorageResult<()> {
        self.acl_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_acl.load(Ordering::SeqCst) {
            return Err(StorageError::AclFailed(format!(
                "injected acl failure for {}",
                key
            )));
        }

        let mut objects = self.lock();
        if !objects.data.contains_key(key) {
            return Err(StorageError::NotFound(key.to_string()));
        }
        objects.public.insert(key.to_string());
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        join_url(&self.base_url, &self.bucket, key)
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}
