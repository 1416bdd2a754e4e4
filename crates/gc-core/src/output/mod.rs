//! Output formats and the JSON envelope written to stdout.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{self, Write};

/// Version of the stdout payload layout.
pub const OUTPUT_SCHEMA_VERSION: &str = "1.0.0";

/// Supported output formats for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One pretty-printed JSON document (default)
    #[default]
    Json,

    /// One JSON object per line
    Jsonl,

    /// One-line human summary
    Summary,

    /// Minimal output (exit code only)
    Exitcode,
}

impl OutputFormat {
    /// Machine-readable formats also switch stderr logging to JSONL.
    pub fn is_machine(&self) -> bool {
        matches!(self, OutputFormat::Json | OutputFormat::Jsonl)
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Jsonl => write!(f, "jsonl"),
            OutputFormat::Summary => write!(f, "summary"),
            OutputFormat::Exitcode => write!(f, "exitcode"),
        }
    }
}

/// Wrap a command payload with run metadata.
pub fn envelope(command: &str, run_id: &str, config_id: Option<&str>, payload: Value) -> Value {
    serde_json::json!({
        "schema_version": OUTPUT_SCHEMA_VERSION,
        "command": command,
        "run_id": run_id,
        "config_id": config_id,
        "generated_at": chrono::Utc::now().to_rfc3339(),
        "result": payload,
    })
}

/// Pretty-print one JSON document followed by a newline.
pub fn write_json<W: Write, T: Serialize + ?Sized>(out: &mut W, value: &T) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)
}

/// Write one compact JSON object as a line.
pub fn write_jsonl<W: Write, T: Serialize + ?Sized>(out: &mut W, value: &T) -> io::Result<()> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)
}
