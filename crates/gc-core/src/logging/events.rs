//! Structured event definitions for logging.
//!
//! Every event carries the run id and the pipeline stage that emitted it;
//! names are the tracing targets listed in [`event_names`].

use serde::{Deserialize, Serialize};

/// Log levels for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// Stages of the cut pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Startup and configuration.
    Init,
    /// Training artifact and rate model loading.
    Load,
    /// Per-bin threshold resolution.
    Resolve,
    /// Sensitivity optimization inside resolution.
    Optimize,
    /// Cross-bin smoothing and borrowing.
    Smooth,
    /// Per-event evaluation.
    Evaluate,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Load => "load",
            Stage::Resolve => "resolve",
            Stage::Optimize => "optimize",
            Stage::Smooth => "smooth",
            Stage::Evaluate => "evaluate",
        };
        write!(f, "{}", s)
    }
}

/// Standard event names used in logging.
pub mod event_names {
    // Run lifecycle
    pub const RUN_STARTED: &str = "run.started";
    pub const RUN_FINISHED: &str = "run.finished";

    // Config/init events
    pub const CONFIG_LOADED: &str = "config.loaded";
    pub const CONFIG_DEFAULT_USED: &str = "config.default_used";
    pub const CONFIG_ERROR: &str = "config.error";

    // Load stage
    pub const CATALOG_LOADED: &str = "load.catalog_loaded";
    pub const ARTIFACT_SKIPPED: &str = "load.artifact_skipped";
    pub const RATES_LOADED: &str = "load.rates_loaded";

    // Resolve stage
    pub const RESOLVE_STARTED: &str = "resolve.started";
    pub const POLICY_AMBIGUOUS: &str = "resolve.policy_ambiguous";
    pub const TARGET_UNREACHABLE: &str = "resolve.target_unreachable";
    pub const BIN_RESOLVED: &str = "resolve.bin_resolved";
    pub const RESOLVE_FINISHED: &str = "resolve.finished";

    // Optimize stage
    pub const OPTIMUM_FOUND: &str = "optimize.optimum_found";
    pub const OPTIMUM_NOT_FOUND: &str = "optimize.optimum_not_found";
    pub const EFFICIENCY_CAPPED: &str = "optimize.efficiency_capped";

    // Smooth stage
    pub const BIN_BORROWED: &str = "smooth.bin_borrowed";
    pub const BIN_UNRESOLVED: &str = "smooth.bin_unresolved";
    pub const SMOOTH_FINISHED: &str = "smooth.finished";

    // Evaluate stage
    pub const EVALUATE_STARTED: &str = "evaluate.started";
    pub const EVENT_MALFORMED: &str = "evaluate.event_malformed";
    pub const EVALUATE_FINISHED: &str = "evaluate.finished";

    // Error events
    pub const INTERNAL_ERROR: &str = "internal_error";
}

/// Context for generating log events with a consistent run id.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub run_id: String,
    pub config_id: Option<String>,
}

impl LogContext {
    pub fn new(run_id: impl Into<String>) -> Self {
        LogContext {
            run_id: run_id.into(),
            config_id: None,
        }
    }

    pub fn with_config_id(mut self, config_id: impl Into<String>) -> Self {
        self.config_id = Some(config_id.into());
        self
    }
}
