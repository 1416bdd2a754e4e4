//! Engine configuration types.
//!
//! Every section carries serde defaults, so a configuration file only needs
//! to name the values it changes.

use crate::policy::PolicyTable;
use gc_math::SignificanceEstimator;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Complete engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub artifacts: ArtifactLayout,

    #[serde(default)]
    pub policy: PolicyTable,

    #[serde(default)]
    pub optimizer: OptimizerConfig,

    #[serde(default)]
    pub smoothing: SmoothingConfig,

    #[serde(default)]
    pub evaluation: EvaluationConfig,

    #[serde(default)]
    pub spectrum: SpectrumConfig,
}

fn default_schema_version() -> String {
    crate::CONFIG_SCHEMA_VERSION.to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            description: None,
            artifacts: ArtifactLayout::default(),
            policy: PolicyTable::default(),
            optimizer: OptimizerConfig::default(),
            smoothing: SmoothingConfig::default(),
            evaluation: EvaluationConfig::default(),
            spectrum: SpectrumConfig::default(),
        }
    }
}

/// Where training artifacts live and how the bin grid is laid out.
///
/// Artifacts are read from `<root>/e<energy_index>/z<zenith_index>/<file_name>`.
/// A bin count of 0 means "discover from the directory tree".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactLayout {
    #[serde(default)]
    pub root: Option<PathBuf>,
    /// Tabulated on/off rates; only needed for sensitivity optimization.
    #[serde(default)]
    pub rate_model: Option<PathBuf>,
    #[serde(default)]
    pub energy_bins: usize,
    #[serde(default)]
    pub zenith_bins: usize,
    #[serde(default = "default_artifact_file")]
    pub file_name: String,
}

fn default_artifact_file() -> String {
    "artifact.json".to_string()
}

impl Default for ArtifactLayout {
    fn default() -> Self {
        Self {
            root: None,
            rate_model: None,
            energy_bins: 0,
            zenith_bins: 0,
            file_name: default_artifact_file(),
        }
    }
}

/// How the optimizer picks the maximum of the smoothed significance curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxSearch {
    /// Scan from the loosest threshold and stop at the first local maximum.
    #[default]
    FirstLocalMax,
    /// Take the largest value over the whole threshold range.
    GlobalMax,
}

impl std::fmt::Display for MaxSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaxSearch::FirstLocalMax => write!(f, "first_local_max"),
            MaxSearch::GlobalMax => write!(f, "global_max"),
        }
    }
}

/// Sensitivity optimization parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Observing time in hours.
    pub observing_time_h: f64,
    /// On/off exposure ratio.
    pub alpha: f64,
    /// Required detection significance.
    pub min_significance: f64,
    /// Required number of signal events surviving the cut.
    pub min_excess_events: f64,
    /// Background events below this count make the significance untrustworthy.
    pub min_background_events: f64,
    /// Upper limit on the signal efficiency of the resolved cut.
    pub max_signal_efficiency: f64,
    /// Smallest assumed source strength (Crab Units).
    pub min_source_strength: f64,
    /// Largest assumed source strength (Crab Units).
    pub max_source_strength: f64,
    /// Logarithmic step between tested source strengths (dex).
    pub step_size_dex: f64,
    /// Kernel bandwidth for smoothing significance versus threshold.
    pub threshold_bandwidth: f64,
    /// Number of resampled points on the smoothed significance curve.
    pub resample_points: usize,
    /// Relative change below which an edge maximum counts as a plateau.
    pub plateau_tolerance: f64,
    /// Distance from an edge maximum, as a fraction of the threshold domain,
    /// over which the plateau change is measured.
    pub plateau_window: f64,
    pub max_search: MaxSearch,
    pub estimator: SignificanceEstimator,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            observing_time_h: 5.0,
            alpha: 0.2,
            min_significance: 5.0,
            min_excess_events: 10.0,
            min_background_events: 5.0,
            max_signal_efficiency: 0.9,
            min_source_strength: 1e-3,
            max_source_strength: 30.0,
            step_size_dex: 0.005,
            threshold_bandwidth: 0.1,
            resample_points: 200,
            plateau_tolerance: 0.02,
            plateau_window: 0.05,
            max_search: MaxSearch::FirstLocalMax,
            estimator: SignificanceEstimator::LiMa17,
        }
    }
}

/// Post-optimization smoothing of thresholds across bins.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    pub enabled: bool,
    /// Kernel bandwidth in log10(E/TeV).
    pub energy_bandwidth: f64,
    /// Kernel bandwidth in degrees of zenith angle.
    pub zenith_bandwidth: f64,
    /// Smooth in energy only, even when several zenith rows exist.
    pub energy_only: bool,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            energy_bandwidth: 0.5,
            zenith_bandwidth: 10.0,
            energy_only: false,
        }
    }
}

/// Per-event evaluation options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Blend classifier scores of neighboring zenith bins.
    pub interpolate_zenith: bool,
    /// Interpolate the threshold with the same weights as the score.
    pub interpolate_threshold: bool,
    /// Half-width of the zenith window used for interpolation (degrees).
    pub zenith_neighborhood_deg: f64,
    /// Use the run-level average zenith instead of the per-event value.
    pub use_run_average_zenith: bool,
    /// Ignore zenith entirely when selecting bins.
    pub ignore_zenith: bool,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            interpolate_zenith: false,
            interpolate_threshold: false,
            zenith_neighborhood_deg: 10.0,
            use_run_average_zenith: false,
            ignore_zenith: false,
        }
    }
}

/// Assumed source spectrum for mean-energy weighting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumConfig {
    /// Power-law index Γ of dN/dE ∝ E^-Γ.
    pub index: f64,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self { index: 2.5 }
    }
}
