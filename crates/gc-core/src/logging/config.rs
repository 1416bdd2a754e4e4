//! Log settings for a CLI run.
//!
//! The stderr stream follows the payload format on stdout: machine payloads
//! get JSONL logs, human payloads get console logs. `GC_LOG_FORMAT` replaces
//! that choice and `GC_LOG` sets the level unless `-v`/`-q` were given.

use tracing_subscriber::filter::LevelFilter;

/// Environment variable selecting the log level.
pub const ENV_LOG_LEVEL: &str = "GC_LOG";

/// Environment variable selecting the stderr format.
pub const ENV_LOG_FORMAT: &str = "GC_LOG_FORMAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Human,
    /// One JSON object per event.
    Jsonl,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "human" | "console" => Ok(LogFormat::Human),
            "jsonl" | "json" => Ok(LogFormat::Jsonl),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Off,
}

const LEVEL_NAMES: [(&str, LogLevel); 8] = [
    ("trace", LogLevel::Trace),
    ("debug", LogLevel::Debug),
    ("info", LogLevel::Info),
    ("warn", LogLevel::Warn),
    ("warning", LogLevel::Warn),
    ("error", LogLevel::Error),
    ("off", LogLevel::Off),
    ("quiet", LogLevel::Off),
];

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.to_ascii_lowercase();
        LEVEL_NAMES
            .iter()
            .find(|(name, _)| *name == wanted)
            .map(|(_, level)| *level)
            .ok_or_else(|| format!("unknown log level: {s}"))
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Off => LevelFilter::OFF,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: LogLevel,
    /// Prefix console lines with a timestamp.
    pub timestamps: bool,
    /// Append file and line to console lines; on at trace level.
    pub source_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            format: LogFormat::Human,
            level: LogLevel::Info,
            timestamps: true,
            source_location: false,
        }
    }
}

impl LogConfig {
    /// Settings from the process environment and CLI flags.
    pub fn for_run(cli_level: Option<LogLevel>, machine_payload: bool) -> Self {
        Self::from_lookup(cli_level, machine_payload, |key| std::env::var(key).ok())
    }

    /// Unparseable variables are ignored.
    fn from_lookup(
        cli_level: Option<LogLevel>,
        machine_payload: bool,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let env_level = lookup(ENV_LOG_LEVEL).and_then(|v| v.parse().ok());
        let level = cli_level.or(env_level).unwrap_or_default();

        let payload_format = if machine_payload {
            LogFormat::Jsonl
        } else {
            LogFormat::Human
        };
        let format = lookup(ENV_LOG_FORMAT)
            .and_then(|v| v.parse().ok())
            .unwrap_or(payload_format);

        LogConfig {
            format,
            level,
            source_location: level == LogLevel::Trace,
            ..LogConfig::default()
        }
    }
}
