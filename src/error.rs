//! Error types for the canopy manifest index.
//!
//! Not-found conditions (unknown file name, missing persisted tree) are
//! ordinary `Option`/`bool` results, never errors. These enums cover the
//! failures that actually abort an operation: storage I/O and corrupt or
//! unsupported persisted bytes.

use thiserror::Error;

/// Errors surfaced by the byte-storage collaborator
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Top-level error type for tree persistence, configuration and tooling
#[derive(Debug, Error)]
pub enum CanopyError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("corrupt tree data: {0}")]
    Corrupt(String),

    #[error("unsupported tree format version {0}")]
    UnsupportedVersion(u32),

    #[error("configuration error: {0}")]
    ConfigError(String),
}
