//! Canopy: Verifiable File-Manifest Indexing
//!
//! Maintains a cryptographically verifiable index over a set of named
//! files: per-file content hashes, sizes and timestamps aggregate into a
//! single root hash that changes exactly when the file set changes:
//! the basis for cheap change detection and incremental sync between
//! replicas without shipping full file lists.

pub mod config;
pub mod error;
pub mod logging;
pub mod store;
pub mod tooling;
pub mod tree;
pub mod types;
