//! In-memory byte store for tests and benches

use crate::error::StorageError;
use crate::store::ByteStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Byte store backed by a process-local map
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blobs held
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

#[async_trait]
impl ByteStore for MemoryStore {
    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.blobs.read().get(path).cloned())
    }

    async fn write(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.blobs.write().insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn file_exists(&self, path: &str) -> Result<bool, StorageError> {
        Ok(self.blobs.read().contains_key(path))
    }
}
