//! gamma_cuts configuration loading and validation.
//!
//! This crate provides:
//! - Typed Rust structs for the engine configuration
//! - The per-bin threshold policy table
//! - Config resolution (CLI → env → XDG → defaults)
//! - Semantic validation
//! - Config snapshots for audit output

pub mod engine;
pub mod policy;
pub mod resolve;
pub mod snapshot;
pub mod validate;

pub use engine::{
    ArtifactLayout, EngineConfig, EvaluationConfig, MaxSearch, OptimizerConfig, SmoothingConfig,
    SpectrumConfig,
};
pub use gc_math::SignificanceEstimator;
pub use policy::{BinPolicyOverride, PolicySelection, PolicySpec, PolicyTable, ThresholdPolicy};
pub use resolve::{resolve_config, ConfigPaths, ConfigSource};
pub use snapshot::ConfigSnapshot;
pub use validate::{validate_config, ValidationError, ValidationResult, MIN_STEP_SIZE_DEX};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";
