//! Configuration loading for gc-core.
//!
//! This module handles:
//! - Config resolution order (CLI > env > XDG > system > defaults)
//! - Parsing JSON or TOML by file extension
//! - Semantic validation via gc-config
//! - Config snapshots for audit output

pub use gc_config::{
    validate_config, ConfigPaths, ConfigSnapshot, ConfigSource, EngineConfig, ValidationError,
    CONFIG_SCHEMA_VERSION,
};

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Invalid config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Semantic validation failed: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("I/O error reading {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Schema version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

/// Loaded configuration with provenance information.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: EngineConfig,
    pub paths: ConfigPaths,
    /// Raw file content (None when using defaults).
    pub raw: Option<String>,
}

impl ResolvedConfig {
    /// Built-in defaults, no file.
    pub fn defaults() -> Self {
        Self {
            config: EngineConfig::default(),
            paths: ConfigPaths::default(),
            raw: None,
        }
    }

    /// Identity of the loaded settings for log records and output envelopes.
    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot::capture(&self.config, &self.paths, self.raw.as_deref())
    }

    pub fn is_default(&self) -> bool {
        self.paths.source == ConfigSource::BuiltinDefault
    }
}

/// Load configuration with the standard resolution order.
///
/// An explicit path must exist; everything after it is optional and falls
/// back to built-in defaults.
pub fn load_config(cli_path: Option<&Path>) -> Result<ResolvedConfig, ConfigError> {
    if let Some(path) = cli_path {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
    }

    let paths = gc_config::resolve_config(cli_path);
    let Some(path) = paths.config.clone() else {
        return Ok(ResolvedConfig::defaults());
    };

    let (config, raw) = load_config_file(&path)?;
    Ok(ResolvedConfig {
        config,
        paths,
        raw: Some(raw),
    })
}

/// Parse and validate one config file.
pub fn load_config_file(path: &Path) -> Result<(EngineConfig, String), ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;
    let config = parse_config(path, &raw)?;

    // Check schema version
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(ConfigError::VersionMismatch {
            expected: CONFIG_SCHEMA_VERSION.to_string(),
            actual: config.schema_version,
        });
    }

    validate_config(&config)?;
    Ok((config, raw))
}

fn parse_config(path: &Path, raw: &str) -> Result<EngineConfig, ConfigError> {
    let is_toml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("toml"));
    let parsed: Result<EngineConfig, String> = if is_toml {
        toml::from_str(raw).map_err(|e| e.to_string())
    } else {
        serde_json::from_str(raw).map_err(|e| e.to_string())
    };
    parsed.map_err(|message| ConfigError::ParseError {
        path: path.to_path_buf(),
        message,
    })
}
