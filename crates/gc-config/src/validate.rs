//! Configuration validation errors and semantic validation.

use crate::engine::{EngineConfig, OptimizerConfig, SmoothingConfig};
use crate::policy::PolicySpec;
use thiserror::Error;

/// Finest allowed step of the source-strength ladder (dex).
pub const MIN_STEP_SIZE_DEX: f64 = 1e-4;

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Semantic validation failed: {0}")]
    SemanticError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::IoError(_) => 60,
            ValidationError::ParseError(_) => 61,
            ValidationError::SemanticError(_) => 63,
            ValidationError::InvalidValue { .. } => 65,
            ValidationError::VersionMismatch { .. } => 66,
        }
    }
}

/// Validate an engine configuration semantically.
pub fn validate_config(config: &EngineConfig) -> ValidationResult<()> {
    if config.schema_version != crate::CONFIG_SCHEMA_VERSION {
        return Err(ValidationError::VersionMismatch {
            expected: crate::CONFIG_SCHEMA_VERSION.to_string(),
            actual: config.schema_version.clone(),
        });
    }

    if config.artifacts.file_name.trim().is_empty() {
        return Err(invalid("artifacts.file_name", "Must not be empty".to_string()));
    }

    validate_optimizer(&config.optimizer)?;
    validate_smoothing(&config.smoothing)?;

    positive_finite(
        "evaluation.zenith_neighborhood_deg",
        config.evaluation.zenith_neighborhood_deg,
    )?;
    finite("spectrum.index", config.spectrum.index)?;

    validate_policy_spec("policy.default", &config.policy.default)?;
    for (i, spec) in config.policy.per_energy.iter().enumerate() {
        validate_policy_spec(&format!("policy.per_energy[{}]", i), spec)?;
    }
    for (i, o) in config.policy.overrides.iter().enumerate() {
        validate_policy_spec(&format!("policy.overrides[{}]", i), &o.spec)?;
    }

    Ok(())
}

fn validate_optimizer(opt: &OptimizerConfig) -> ValidationResult<()> {
    positive_finite("optimizer.observing_time_h", opt.observing_time_h)?;
    positive_finite("optimizer.alpha", opt.alpha)?;
    non_negative("optimizer.min_significance", opt.min_significance)?;
    non_negative("optimizer.min_excess_events", opt.min_excess_events)?;
    non_negative("optimizer.min_background_events", opt.min_background_events)?;
    unit_interval("optimizer.max_signal_efficiency", opt.max_signal_efficiency)?;
    positive_finite("optimizer.min_source_strength", opt.min_source_strength)?;
    positive_finite("optimizer.max_source_strength", opt.max_source_strength)?;
    positive_finite("optimizer.step_size_dex", opt.step_size_dex)?;
    if opt.step_size_dex < MIN_STEP_SIZE_DEX {
        return Err(invalid(
            "optimizer.step_size_dex",
            format!(
                "Must be at least {} dex, got {}",
                MIN_STEP_SIZE_DEX, opt.step_size_dex
            ),
        ));
    }
    positive_finite("optimizer.threshold_bandwidth", opt.threshold_bandwidth)?;
    non_negative("optimizer.plateau_tolerance", opt.plateau_tolerance)?;
    if !(opt.plateau_window > 0.0 && opt.plateau_window <= 0.5) {
        return Err(invalid(
            "optimizer.plateau_window",
            format!("Must be in (0, 0.5], got {}", opt.plateau_window),
        ));
    }

    if opt.min_source_strength >= opt.max_source_strength {
        return Err(ValidationError::SemanticError(format!(
            "optimizer.min_source_strength ({}) must be below optimizer.max_source_strength ({})",
            opt.min_source_strength, opt.max_source_strength
        )));
    }
    if opt.resample_points < 3 {
        return Err(invalid(
            "optimizer.resample_points",
            format!("Must be at least 3, got {}", opt.resample_points),
        ));
    }
    Ok(())
}

fn validate_smoothing(smoothing: &SmoothingConfig) -> ValidationResult<()> {
    positive_finite("smoothing.energy_bandwidth", smoothing.energy_bandwidth)?;
    positive_finite("smoothing.zenith_bandwidth", smoothing.zenith_bandwidth)?;
    Ok(())
}

fn validate_policy_spec(field: &str, spec: &PolicySpec) -> ValidationResult<()> {
    if let Some(t) = spec.threshold {
        finite(&format!("{}.threshold", field), t)?;
    }
    if let Some(e) = spec.signal_efficiency {
        unit_interval(&format!("{}.signal_efficiency", field), e)?;
    }
    if let Some(e) = spec.background_efficiency {
        unit_interval(&format!("{}.background_efficiency", field), e)?;
    }
    Ok(())
}

fn invalid(field: &str, message: String) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        message,
    }
}

fn finite(field: &str, value: f64) -> ValidationResult<()> {
    if !value.is_finite() {
        return Err(invalid(field, format!("Must be finite, got {}", value)));
    }
    Ok(())
}

fn positive_finite(field: &str, value: f64) -> ValidationResult<()> {
    if !(value.is_finite() && value > 0.0) {
        return Err(invalid(field, format!("Must be positive, got {}", value)));
    }
    Ok(())
}

fn non_negative(field: &str, value: f64) -> ValidationResult<()> {
    if !(value.is_finite() && value >= 0.0) {
        return Err(invalid(field, format!("Must be non-negative, got {}", value)));
    }
    Ok(())
}

/// Efficiencies must lie in (0, 1].
fn unit_interval(field: &str, value: f64) -> ValidationResult<()> {
    if !(value > 0.0 && value <= 1.0) {
        return Err(invalid(field, format!("Must be in (0, 1], got {}", value)));
    }
    Ok(())
}
