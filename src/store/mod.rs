//! Byte-storage collaborator
//!
//! The tree persists through this abstraction and never owns it: one
//! logical path per tree instance, plain read/write/exists, no directory
//! listing or deletion. No retries: a failed write surfaces its error
//! unchanged; retry policy belongs to the backend if anywhere.

pub mod fs;
pub mod memory;

pub use fs::FsStore;
pub use memory::MemoryStore;

use crate::error::StorageError;
use async_trait::async_trait;

/// Arbitrary-path byte blob storage
#[async_trait]
pub trait ByteStore: Send + Sync {
    /// Read a blob; `None` when the path does not exist
    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Write a blob, replacing any existing content at the path
    async fn write(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Whether a blob exists at the path
    async fn file_exists(&self, path: &str) -> Result<bool, StorageError>;
}
