//! CLI Tooling
//!
//! Command-line interface over the manifest core: scan a directory into
//! a saved manifest, inspect it, look files up, and diff two manifests.

use crate::config::{load_config, CanopyConfig};
use crate::error::CanopyError;
use crate::logging::init_logging;
use crate::store::FsStore;
use crate::tree::{
    build_merkle_tree, diff_trees, load_tree, load_tree_version, save_tree_v2, FileEntry,
    ManifestTree,
};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;
use walkdir::WalkDir;

/// Canopy CLI - Verifiable file-manifest indexing
#[derive(Parser)]
#[command(name = "canopy")]
#[command(about = "Verifiable file-manifest indexing using content hash trees")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan a directory and write its manifest
    Scan {
        /// Directory to index
        path: PathBuf,
        /// Where to write the manifest
        #[arg(long)]
        out: PathBuf,
    },
    /// Show a saved manifest's metadata and fingerprint
    Status {
        /// Manifest file; falls back to the configured manifest_path
        manifest: Option<PathBuf>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Look a file up by name
    Lookup {
        /// File name to resolve
        name: String,
        /// Manifest file; falls back to the configured manifest_path
        #[arg(long)]
        manifest: Option<PathBuf>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Compare two saved manifests
    Diff {
        /// Left manifest file
        left: PathBuf,
        /// Right manifest file
        right: PathBuf,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}

/// CLI execution context: loaded configuration plus the store
pub struct CliContext {
    config: CanopyConfig,
    store: FsStore,
}

impl CliContext {
    pub fn new(config_path: Option<PathBuf>) -> Result<Self, CanopyError> {
        let config = load_config(config_path.as_deref())?;
        init_logging(Some(&config.logging))?;
        Ok(Self {
            config,
            store: FsStore::new("."),
        })
    }

    pub async fn execute(&self, command: &Commands) -> Result<String, CanopyError> {
        match command {
            Commands::Scan { path, out } => self.scan(path, out).await,
            Commands::Status { manifest, format } => {
                let manifest = self.resolve_manifest(manifest.as_deref())?;
                self.status(&manifest, format).await
            }
            Commands::Lookup {
                name,
                manifest,
                format,
            } => {
                let manifest = self.resolve_manifest(manifest.as_deref())?;
                self.lookup(&manifest, name, format).await
            }
            Commands::Diff {
                left,
                right,
                format,
            } => self.diff(left, right, format).await,
        }
    }

    /// Explicit argument wins; otherwise the configured default applies
    fn resolve_manifest(&self, explicit: Option<&Path>) -> Result<PathBuf, CanopyError> {
        explicit
            .map(Path::to_path_buf)
            .or_else(|| self.config.manifest_path.clone())
            .ok_or_else(|| {
                CanopyError::ConfigError(
                    "no manifest given and no manifest_path configured".to_string(),
                )
            })
    }

    async fn scan(&self, path: &Path, out: &Path) -> Result<String, CanopyError> {
        let started = Instant::now();
        let entries = collect_entries(path)?;
        let file_count = entries.len();

        let id = hex::encode(crate::tree::hasher::hash_bytes(
            path.display().to_string().as_bytes(),
        ));
        let tree = build_merkle_tree(id, entries);
        save_tree_v2(&tree, &self.store, &out.to_string_lossy()).await?;

        info!(
            path = %path.display(),
            files = file_count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "scan complete"
        );

        Ok(format!(
            "Indexed {} files ({} bytes) from {}\nRoot hash: {}\nManifest written to {}",
            tree.total_files(),
            tree.total_size(),
            path.display(),
            tree.root_hash().map(hex::encode).unwrap_or_default(),
            out.display()
        ))
    }

    async fn status(&self, manifest: &Path, format: &str) -> Result<String, CanopyError> {
        let path = manifest.to_string_lossy();
        let Some(tree) = load_tree(&self.store, &path).await? else {
            return Ok(format!("No manifest found at {}", manifest.display()));
        };
        let version = load_tree_version(&self.store, &path).await?;

        if format == "json" {
            return Ok(json!({
                "id": tree.id(),
                "format_version": version,
                "root_hash": tree.root_hash().map(hex::encode),
                "total_files": tree.total_files(),
                "active_files": tree.get_active_files().len(),
                "total_nodes": tree.total_nodes(),
                "total_size": tree.total_size(),
                "last_updated": tree.last_updated().to_rfc3339(),
            })
            .to_string());
        }

        let mut out = String::new();
        out.push_str(&format!("{}\n\n", "Manifest Status".bold().underline()));
        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.add_row(vec!["Id".to_string(), tree.id().to_string()]);
        table.add_row(vec![
            "Format version".to_string(),
            version.map(|v| v.to_string()).unwrap_or_else(|| "unknown".to_string()),
        ]);
        table.add_row(vec![
            "Root hash".to_string(),
            tree.root_hash().map(hex::encode).unwrap_or_default(),
        ]);
        table.add_row(vec!["Total files".to_string(), tree.total_files().to_string()]);
        table.add_row(vec![
            "Active files".to_string(),
            tree.get_active_files().len().to_string(),
        ]);
        table.add_row(vec!["Total nodes".to_string(), tree.total_nodes().to_string()]);
        table.add_row(vec!["Total size".to_string(), tree.total_size().to_string()]);
        table.add_row(vec![
            "Last updated".to_string(),
            tree.last_updated().to_rfc3339(),
        ]);
        out.push_str(&format!("{}\n", table));
        Ok(out)
    }

    async fn lookup(&self, manifest: &Path, name: &str, format: &str) -> Result<String, CanopyError> {
        let path = manifest.to_string_lossy();
        let Some(tree) = load_tree(&self.store, &path).await? else {
            return Ok(format!("No manifest found at {}", manifest.display()));
        };

        let Some(leaf) = tree.find_file_node(name) else {
            return Ok(if format == "json" {
                json!({ "found": false, "name": name }).to_string()
            } else {
                format!("File not found: {}", name)
            });
        };

        if format == "json" {
            return Ok(json!({
                "found": true,
                "name": leaf.name,
                "directory": leaf.directory,
                "content_hash": hex::encode(leaf.content_hash),
                "size": leaf.size,
                "last_modified": leaf.last_modified.to_rfc3339(),
            })
            .to_string());
        }

        Ok(format!(
            "{}\n  Directory: {}\n  Hash: {}\n  Size: {} bytes\n  Modified: {}",
            leaf.name.bold(),
            leaf.directory.as_deref().unwrap_or("-"),
            hex::encode(leaf.content_hash),
            leaf.size,
            leaf.last_modified.to_rfc3339()
        ))
    }

    async fn diff(&self, left: &Path, right: &Path, format: &str) -> Result<String, CanopyError> {
        let left_tree = self.require_manifest(left).await?;
        let right_tree = self.require_manifest(right).await?;

        let same = left_tree.root_hash() == right_tree.root_hash();
        let diff = if same {
            Default::default()
        } else {
            diff_trees(&left_tree, &right_tree)
        };

        if format == "json" {
            return Ok(json!({
                "identical": same,
                "added": diff.added,
                "removed": diff.removed,
                "modified": diff.modified,
            })
            .to_string());
        }

        if same {
            return Ok("Manifests are identical".to_string());
        }
        let mut out = String::new();
        out.push_str(&format!("{}\n", "Manifests differ".bold()));
        for name in &diff.added {
            out.push_str(&format!("  + {}\n", name.green()));
        }
        for name in &diff.removed {
            out.push_str(&format!("  - {}\n", name.red()));
        }
        for name in &diff.modified {
            out.push_str(&format!("  ~ {}\n", name.yellow()));
        }
        Ok(out)
    }

    async fn require_manifest(&self, path: &Path) -> Result<ManifestTree, CanopyError> {
        load_tree(&self.store, &path.to_string_lossy())
            .await?
            .ok_or_else(|| {
                CanopyError::ConfigError(format!("No manifest found at {}", path.display()))
            })
    }
}

/// Walk a directory into file entries, hashing contents as we go
fn collect_entries(root: &Path) -> Result<Vec<FileEntry>, CanopyError> {
    let mut entries = Vec::new();
    for item in WalkDir::new(root).follow_links(false) {
        let item = item.map_err(|e| {
            CanopyError::ConfigError(format!("Failed to walk {}: {}", root.display(), e))
        })?;
        if !item.file_type().is_file() {
            continue;
        }
        let metadata = item
            .metadata()
            .map_err(|e| CanopyError::ConfigError(format!("Failed to stat file: {}", e)))?;
        let content_hash = crate::tree::hasher::hash_file(item.path())
            .map_err(crate::error::StorageError::from)?;
        let last_modified: DateTime<Utc> = metadata
            .modified()
            .map(DateTime::from)
            .unwrap_or_else(|_| Utc::now());

        let name = item.file_name().to_string_lossy().into_owned();
        let directory = item
            .path()
            .parent()
            .and_then(|parent| parent.strip_prefix(root).ok())
            .filter(|rel| !rel.as_os_str().is_empty())
            .map(|rel| rel.to_string_lossy().into_owned());

        let mut entry = FileEntry::new(name, content_hash, metadata.len());
        entry.last_modified = last_modified;
        if let Some(dir) = directory {
            entry = entry.with_directory(dir);
        }
        entries.push(entry);
    }
    Ok(entries)
}
