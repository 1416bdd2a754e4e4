//! Structured logging for gc-core.
//!
//! All log output goes to stderr; stdout carries bin records and verdicts.
//! Console lines for people, JSON lines when the payload is machine-read.
//!
//! ```ignore
//! use gc_core::logging::{event_names, generate_run_id, init_logging, LogConfig, LogContext, Stage};
//!
//! init_logging(&LogConfig::for_run(None, false));
//! let ctx = LogContext::new(generate_run_id());
//! log_event!(ctx, INFO, event_names::RUN_STARTED, Stage::Init, "loading catalog");
//! ```

pub mod config;
pub mod events;
pub mod layer;

pub use config::{LogConfig, LogFormat, LogLevel};
pub use events::{event_names, Level, LogContext, Stage};
pub use layer::JsonlLayer;

use std::io::{self, IsTerminal};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// Install the global subscriber. Call once, before the first event.
///
/// `RUST_LOG` directives, when present, replace the level from `config`.
pub fn init_logging(config: &LogConfig) {
    // Targets are event names, so the fallback directive is level-only.
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from(config.level).into())
        .from_env_lossy();

    let stderr_layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Jsonl => Box::new(JsonlLayer::stderr()),
        LogFormat::Human => {
            let console = fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(io::stderr().is_terminal())
                .with_target(false)
                .with_file(config.source_location)
                .with_line_number(config.source_location);
            if config.timestamps {
                Box::new(console)
            } else {
                Box::new(console.without_time())
            }
        }
    };

    let installed = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(filter)
        .try_init();
    if let Err(e) = installed {
        eprintln!("warning: logging already initialized: {e}");
    }
}

/// `run-` followed by 12 hex digits of a v4 uuid.
pub fn generate_run_id() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("run-{}", &hex[..12])
}

/// Emit an event named by `$event` with the run context and stage attached.
///
/// `$level` is one of `TRACE`, `DEBUG`, `INFO`, `WARN`, `ERROR`.
///
/// ```ignore
/// log_event!(ctx, WARN, event_names::BIN_UNRESOLVED, Stage::Smooth, "no donor", bin = %id);
/// ```
#[macro_export]
macro_rules! log_event {
    ($ctx:expr, $level:ident, $event:expr, $stage:expr, $msg:expr $(, $($fields:tt)+)?) => {
        tracing::event!(
            target: $event,
            tracing::Level::$level,
            run_id = %$ctx.run_id,
            config_id = $ctx.config_id.as_deref(),
            stage = %$stage,
            $($($fields)+,)?
            message = $msg
        )
    };
}
