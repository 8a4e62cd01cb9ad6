//! Logging System
//!
//! Structured logging via the `tracing` crate: configurable level, text
//! or json format, and stdout/stderr/file destinations, overridable
//! through `CANOPY_LOG*` environment variables.

use crate::error::CanopyError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Whether logging is enabled (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level: trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: json, text (default: text)
    #[serde(default = "default_format")]
    pub format: String,

    /// Output destination: stdout, stderr, file, file+stderr
    #[serde(default = "default_output")]
    pub output: String,

    /// Log file path when output includes file; None means use the
    /// platform state directory default
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Enable colored output (text format, tty destinations only)
    #[serde(default = "default_true")]
    pub color: bool,

    /// Module-specific log levels
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_output() -> String {
    "stderr".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            level: default_log_level(),
            format: default_format(),
            output: default_output(),
            file: None,
            color: default_true(),
            modules: HashMap::new(),
        }
    }
}

/// Resolve the log file path: `CANOPY_LOG_FILE` env, then config, then
/// the platform state directory.
pub fn resolve_log_file_path(config_file: Option<PathBuf>) -> Result<PathBuf, CanopyError> {
    if let Ok(env_path) = std::env::var("CANOPY_LOG_FILE") {
        if !env_path.is_empty() {
            return Ok(PathBuf::from(env_path));
        }
    }
    if let Some(p) = config_file {
        if !p.as_os_str().is_empty() {
            return Ok(p);
        }
    }
    let project_dirs = directories::ProjectDirs::from("", "canopy", "canopy").ok_or_else(|| {
        CanopyError::ConfigError("Could not determine platform state directory".to_string())
    })?;
    let state_dir = project_dirs
        .state_dir()
        .unwrap_or_else(|| project_dirs.data_dir())
        .to_path_buf();
    Ok(state_dir.join("canopy.log"))
}

/// Initialize the logging system.
///
/// Priority order (highest to lowest): environment variables
/// (`CANOPY_LOG`, `CANOPY_LOG_FORMAT`, `CANOPY_LOG_OUTPUT`,
/// `CANOPY_LOG_FILE`), then configuration, then defaults.
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), CanopyError> {
    if config.map(|c| !c.enabled).unwrap_or(false) {
        Registry::default()
            .with(EnvFilter::new("off"))
            .with(fmt::layer().with_writer(|| std::io::sink()))
            .try_init()
            .ok();
        return Ok(());
    }

    let filter = build_env_filter(config)?;
    let format = determine_format(config)?;
    let output = determine_output(config)?;
    let use_color = config.map(|c| c.color).unwrap_or(true);

    let file_writer = if output.file {
        let log_file = resolve_log_file_path(config.and_then(|c| c.file.clone()))?;
        if let Some(parent) = log_file.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CanopyError::ConfigError(format!("Failed to create log directory: {}", e))
            })?;
        }
        Some(
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_file)
                .map_err(|e| {
                    CanopyError::ConfigError(format!(
                        "Failed to open log file {:?}: {}",
                        log_file, e
                    ))
                })?,
        )
    } else {
        None
    };

    let base = Registry::default().with(filter);
    let timer = ChronoUtc::rfc_3339();

    let _ = match (format.as_str(), file_writer, output.stderr) {
        ("json", Some(file), true) => base
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(timer)
                    .with_writer(file.and(std::io::stderr)),
            )
            .try_init()
            .ok(),
        ("json", Some(file), false) => base
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(timer)
                    .with_writer(file),
            )
            .try_init()
            .ok(),
        ("json", None, true) => base
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(timer)
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .ok(),
        ("json", None, false) => base
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(timer)
                    .with_writer(std::io::stdout),
            )
            .try_init()
            .ok(),
        (_, Some(file), true) => base
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(timer)
                    .with_ansi(false)
                    .with_writer(file.and(std::io::stderr)),
            )
            .try_init()
            .ok(),
        (_, Some(file), false) => base
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(timer)
                    .with_ansi(false)
                    .with_writer(file),
            )
            .try_init()
            .ok(),
        (_, None, true) => base
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(timer)
                    .with_ansi(use_color)
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .ok(),
        (_, None, false) => base
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(timer)
                    .with_ansi(use_color)
                    .with_writer(std::io::stdout),
            )
            .try_init()
            .ok(),
    };

    Ok(())
}

/// Build environment filter from config or the `CANOPY_LOG` variable
fn build_env_filter(config: Option<&LoggingConfig>) -> Result<EnvFilter, CanopyError> {
    if let Ok(filter) = EnvFilter::try_from_env("CANOPY_LOG") {
        return Ok(filter);
    }

    let level = config.map(|c| c.level.as_str()).unwrap_or("info");
    if level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let mut filter = EnvFilter::new(level);
    if let Some(config) = config {
        for (module, module_level) in &config.modules {
            let directive = format!("{}={}", module, module_level);
            filter = filter.add_directive(directive.parse().map_err(|e| {
                CanopyError::ConfigError(format!("Invalid log directive: {}", e))
            })?);
        }
    }
    Ok(filter)
}

fn determine_format(config: Option<&LoggingConfig>) -> Result<String, CanopyError> {
    if let Ok(format) = std::env::var("CANOPY_LOG_FORMAT") {
        if format == "json" || format == "text" {
            return Ok(format);
        }
    }
    let format = config.map(|c| c.format.as_str()).unwrap_or("text");
    if format != "json" && format != "text" {
        return Err(CanopyError::ConfigError(format!(
            "Invalid log format: {} (must be 'json' or 'text')",
            format
        )));
    }
    Ok(format.to_string())
}

/// Output destinations
struct OutputDestinations {
    stderr: bool,
    file: bool,
}

fn determine_output(config: Option<&LoggingConfig>) -> Result<OutputDestinations, CanopyError> {
    if let Ok(output) = std::env::var("CANOPY_LOG_OUTPUT") {
        return parse_output_destinations(&output);
    }
    let output = config.map(|c| c.output.as_str()).unwrap_or("stderr");
    parse_output_destinations(output)
}

fn parse_output_destinations(output: &str) -> Result<OutputDestinations, CanopyError> {
    match output {
        "stdout" => Ok(OutputDestinations {
            stderr: false,
            file: false,
        }),
        "stderr" => Ok(OutputDestinations {
            stderr: true,
            file: false,
        }),
        "file" => Ok(OutputDestinations {
            stderr: false,
            file: true,
        }),
        "file+stderr" => Ok(OutputDestinations {
            stderr: true,
            file: true,
        }),
        _ => Err(CanopyError::ConfigError(format!(
            "Invalid log output: {} (must be 'stdout', 'stderr', 'file', or 'file+stderr')",
            output
        ))),
    }
}
