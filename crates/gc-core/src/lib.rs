//! Gamma Cuts Core Library
//!
//! Energy- and zenith-binned gamma/hadron separation:
//! - Bin catalog loading from per-bin training artifacts
//! - Threshold resolution per bin (explicit policies or sensitivity optimization)
//! - Cross-bin smoothing and borrowing of optimized thresholds
//! - Per-event bin selection, classifier scoring and accept/reject verdicts
//! - Configuration, structured logging and exit codes for the CLI
//!
//! The binary entry point is in `main.rs`.

pub mod catalog;
pub mod classifier;
pub mod config;
pub mod curve;
pub mod engine;
pub mod evaluate;
pub mod exit_codes;
pub mod features;
pub mod logging;
pub mod optimize;
pub mod output;
pub mod rates;
pub mod resolve;
pub mod schema;
pub mod select;
pub mod smooth;

pub use catalog::{BinCatalog, BinId, BinRecord, ClassificationBin, Provenance};
pub use engine::{resolve_catalog, CutEngine, EngineError, ResolutionReport};
pub use evaluate::{EvaluationDispatcher, EventVerdict, VerdictReason};
pub use features::EventFeatures;
pub use select::BinSelector;
