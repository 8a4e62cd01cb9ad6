//! Configuration loading
//!
//! Layered configuration: an optional TOML file (explicit path or the
//! platform config directory), overridden by `CANOPY_*` environment
//! variables. Holds only ambient settings; tree semantics take no
//! configuration.

use crate::error::CanopyError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CanopyConfig {
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Default path of the persisted manifest, used when a command does
    /// not name one explicitly
    #[serde(default)]
    pub manifest_path: Option<PathBuf>,
}

/// Default config file location under the platform config directory
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "canopy", "canopy")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Load configuration, layering file under environment.
///
/// An explicit path must exist; the default path is optional. Environment
/// variables use the `CANOPY_` prefix with `__` separating nesting, e.g.
/// `CANOPY_LOGGING__LEVEL=debug`.
pub fn load_config(explicit: Option<&Path>) -> Result<CanopyConfig, CanopyError> {
    let mut builder = config::Config::builder();

    match explicit {
        Some(path) => {
            builder = builder.add_source(config::File::from(path.to_path_buf()));
        }
        None => {
            if let Some(path) = default_config_path() {
                builder = builder.add_source(config::File::from(path).required(false));
            }
        }
    }

    let settings = builder
        .add_source(config::Environment::with_prefix("CANOPY").separator("__"))
        .build()
        .map_err(|e| CanopyError::ConfigError(format!("Failed to load configuration: {}", e)))?;

    settings
        .try_deserialize()
        .map_err(|e| CanopyError::ConfigError(format!("Invalid configuration: {}", e)))
}
