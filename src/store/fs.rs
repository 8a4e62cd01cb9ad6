//! Filesystem byte store

use crate::error::StorageError;
use crate::store::ByteStore;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Byte store rooted at a base directory.
///
/// Relative paths resolve under the root; absolute paths are used as-is
/// so the CLI can point at manifest files anywhere.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.root.join(p)
        }
    }
}

#[async_trait]
impl ByteStore for FsStore {
    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match tokio::fs::read(self.resolve(path)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(full, bytes).await?;
        Ok(())
    }

    async fn file_exists(&self, path: &str) -> Result<bool, StorageError> {
        Ok(tokio::fs::try_exists(self.resolve(path)).await?)
    }
}
