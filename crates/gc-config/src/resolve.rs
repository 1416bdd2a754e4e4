//! Configuration resolution and path discovery.
//!
//! Resolution order: CLI argument → environment variables → XDG paths →
//! system path → defaults.

use std::path::{Path, PathBuf};

/// Discovered configuration file path.
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    /// Path to the engine config (or None if not found).
    pub config: Option<PathBuf>,

    /// Source of the config (for diagnostics).
    pub source: ConfigSource,
}

/// Where a configuration file was found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Explicitly provided via CLI argument.
    CliArgument,

    /// Set via environment variable.
    Environment,

    /// Found in XDG config directory.
    XdgConfig,

    /// Found in /etc/gamma-cuts/.
    SystemConfig,

    /// Using built-in defaults.
    #[default]
    BuiltinDefault,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::CliArgument => write!(f, "CLI argument"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::XdgConfig => write!(f, "XDG config"),
            ConfigSource::SystemConfig => write!(f, "system config"),
            ConfigSource::BuiltinDefault => write!(f, "builtin default"),
        }
    }
}

/// Environment variable names.
pub const ENV_CONFIG_PATH: &str = "GC_CONFIG";
pub const ENV_CONFIG_DIR: &str = "GC_CONFIG_DIR";

/// Standard config file names, in lookup order.
const CONFIG_FILENAMES: [&str; 2] = ["gamma_cuts.json", "gamma_cuts.toml"];

/// Application name for XDG directories.
const APP_NAME: &str = "gamma-cuts";

/// Resolve the engine config path.
///
/// 1. Explicit CLI path (if it exists)
/// 2. `GC_CONFIG` environment variable
/// 3. `GC_CONFIG_DIR` + standard filename
/// 4. XDG config directory (~/.config/gamma-cuts/)
/// 5. System config (/etc/gamma-cuts/)
/// 6. Built-in defaults (None)
pub fn resolve_config(cli_path: Option<&Path>) -> ConfigPaths {
    if let Some(path) = cli_path {
        if path.exists() {
            return found(path.to_path_buf(), ConfigSource::CliArgument);
        }
    }

    if let Ok(env_path) = std::env::var(ENV_CONFIG_PATH) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return found(path, ConfigSource::Environment);
        }
    }

    if let Ok(config_dir) = std::env::var(ENV_CONFIG_DIR) {
        if let Some(path) = first_existing(Path::new(&config_dir)) {
            return found(path, ConfigSource::Environment);
        }
    }

    if let Some(dir) = xdg_config_dir() {
        if let Some(path) = first_existing(&dir) {
            return found(path, ConfigSource::XdgConfig);
        }
    }

    if let Some(path) = first_existing(&system_config_dir()) {
        return found(path, ConfigSource::SystemConfig);
    }

    ConfigPaths::default()
}

fn found(path: PathBuf, source: ConfigSource) -> ConfigPaths {
    ConfigPaths {
        config: Some(path),
        source,
    }
}

fn first_existing(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Get the XDG config directory for gamma-cuts.
pub fn xdg_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Get the system config directory.
pub fn system_config_dir() -> PathBuf {
    PathBuf::from("/etc").join(APP_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_source_display() {
        assert_eq!(format!("{}", ConfigSource::CliArgument), "CLI argument");
        assert_eq!(
            format!("{}", ConfigSource::Environment),
            "environment variable"
        );
        assert_eq!(format!("{}", ConfigSource::XdgConfig), "XDG config");
        assert_eq!(format!("{}", ConfigSource::SystemConfig), "system config");
        assert_eq!(
            format!("{}", ConfigSource::BuiltinDefault),
            "builtin default"
        );
    }

    #[test]
    fn test_cli_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.json");
        std::fs::write(&path, "{}").unwrap();
        let paths = resolve_config(Some(&path));
        assert_eq!(paths.config.as_deref(), Some(path.as_path()));
        assert_eq!(paths.source, ConfigSource::CliArgument);
    }

    #[test]
    fn test_first_existing_prefers_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("gamma_cuts.toml"), "").unwrap();
        assert!(first_existing(dir.path())
            .unwrap()
            .ends_with("gamma_cuts.toml"));
        std::fs::write(dir.path().join("gamma_cuts.json"), "{}").unwrap();
        assert!(first_existing(dir.path())
            .unwrap()
            .ends_with("gamma_cuts.json"));
    }

    #[test]
    fn test_system_config_dir() {
        assert_eq!(system_config_dir(), PathBuf::from("/etc/gamma-cuts"));
    }
}
