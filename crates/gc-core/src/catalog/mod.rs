//! The bin catalog.
//!
//! One [`ClassificationBin`] per (energy, zenith) cell, each with its own
//! classifier and efficiency curves. The catalog is mutated while thresholds
//! are resolved and smoothed, then shared read-only behind an `Arc`.

pub mod artifact;

pub use artifact::{load_catalog, CatalogLoad, TrainingArtifact};

use crate::classifier::{Classifier, ClassifierError};
use crate::curve::{CurveError, EfficiencyCurves};
use crate::resolve::ResolvedThreshold;
use gc_config::ThresholdPolicy;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Grid coordinates of a bin.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub struct BinId {
    pub energy_index: usize,
    pub zenith_index: usize,
}

impl BinId {
    pub fn new(energy_index: usize, zenith_index: usize) -> Self {
        Self {
            energy_index,
            zenith_index,
        }
    }
}

impl fmt::Display for BinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}z{}", self.energy_index, self.zenith_index)
    }
}

/// Which step produced a bin's current threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    FixedThreshold,
    SignalEfficiency,
    BackgroundEfficiency,
    Optimized,
    Smoothed,
    Borrowed,
    #[default]
    Unresolved,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Provenance::FixedThreshold => "fixed_threshold",
            Provenance::SignalEfficiency => "signal_efficiency",
            Provenance::BackgroundEfficiency => "background_efficiency",
            Provenance::Optimized => "optimized",
            Provenance::Smoothed => "smoothed",
            Provenance::Borrowed => "borrowed",
            Provenance::Unresolved => "unresolved",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse artifact {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("bin {id}: artifact has no {curve} efficiency curve")]
    MissingCurve { id: BinId, curve: &'static str },

    #[error("bin {id}: invalid {curve} efficiency curve: {source}")]
    InvalidCurve {
        id: BinId,
        curve: &'static str,
        #[source]
        source: CurveError,
    },

    #[error("bin {id}: invalid classifier: {source}")]
    InvalidClassifier {
        id: BinId,
        #[source]
        source: ClassifierError,
    },

    #[error("bin {id}: {message}")]
    InvalidBin { id: BinId, message: String },

    #[error("bin {0} appears more than once")]
    DuplicateBin(BinId),

    #[error("no training artifacts found under {root}")]
    Empty { root: PathBuf },

    #[error("no artifact root configured")]
    NoRoot,
}

/// One trained cell of the (energy, zenith) grid.
#[derive(Debug, Clone)]
pub struct ClassificationBin {
    pub id: BinId,
    pub energy_min_log10: f64,
    pub energy_max_log10: f64,
    /// Spectral-weighted mean energy, log10(E/TeV).
    pub mean_energy_log10: f64,
    pub zenith_min: f64,
    pub zenith_max: f64,
    pub mean_zenith: f64,
    pub classifier: Arc<dyn Classifier>,
    pub curves: EfficiencyCurves,
    /// Policy the resolver applied.
    pub policy: ThresholdPolicy,
    pub threshold: Option<f64>,
    pub signal_efficiency: Option<f64>,
    pub background_efficiency: Option<f64>,
    pub optimum_found: bool,
    /// Crab Units at which the optimizer stopped.
    pub source_strength_at_optimum: Option<f64>,
    /// Significance at the optimizer's threshold.
    pub significance_at_optimum: Option<f64>,
    /// The optimizer moved the threshold to honor the signal efficiency cap;
    /// `significance_at_optimum` may then be below the target.
    pub capped: bool,
    pub provenance: Provenance,
}

impl ClassificationBin {
    /// Unresolved bin over the given ranges; means default to the centers.
    pub fn new(
        id: BinId,
        energy_range: (f64, f64),
        zenith_range: (f64, f64),
        classifier: Arc<dyn Classifier>,
        curves: EfficiencyCurves,
    ) -> Self {
        Self {
            id,
            energy_min_log10: energy_range.0,
            energy_max_log10: energy_range.1,
            mean_energy_log10: 0.5 * (energy_range.0 + energy_range.1),
            zenith_min: zenith_range.0,
            zenith_max: zenith_range.1,
            mean_zenith: 0.5 * (zenith_range.0 + zenith_range.1),
            classifier,
            curves,
            policy: ThresholdPolicy::OptimizeSensitivity,
            threshold: None,
            signal_efficiency: None,
            background_efficiency: None,
            optimum_found: false,
            source_strength_at_optimum: None,
            significance_at_optimum: None,
            capped: false,
            provenance: Provenance::Unresolved,
        }
    }

    pub fn with_mean_energy(mut self, mean_energy_log10: f64) -> Self {
        self.mean_energy_log10 = mean_energy_log10;
        self
    }

    pub fn with_mean_zenith(mut self, mean_zenith: f64) -> Self {
        self.mean_zenith = mean_zenith;
        self
    }

    /// Zenith ranges are half-open: `(zenith_min, zenith_max]`.
    pub fn contains_zenith(&self, zenith: f64) -> bool {
        zenith > self.zenith_min && zenith <= self.zenith_max
    }

    /// Threshold to compare scores against; None while unresolved.
    pub fn effective_threshold(&self) -> Option<f64> {
        match self.provenance {
            Provenance::Unresolved => None,
            _ => self.threshold,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.effective_threshold().is_some()
    }

    /// Store a resolution result.
    pub fn apply(&mut self, resolved: &ResolvedThreshold) {
        self.threshold = resolved.threshold;
        self.signal_efficiency = resolved.signal_efficiency;
        self.background_efficiency = resolved.background_efficiency;
        self.optimum_found = resolved.optimum_found;
        self.source_strength_at_optimum = resolved.source_strength_at_optimum;
        self.significance_at_optimum = resolved.significance_at_optimum;
        self.capped = resolved.capped;
        self.provenance = resolved.provenance;
    }

    /// Move the threshold and re-read both efficiencies from the curves.
    pub(crate) fn set_threshold(&mut self, threshold: f64, provenance: Provenance) {
        let (se, be) = match self.curves.efficiencies_at(threshold) {
            Some((se, be)) => (Some(se), Some(be)),
            None => (None, None),
        };
        self.threshold = Some(threshold);
        self.signal_efficiency = se;
        self.background_efficiency = be;
        self.significance_at_optimum = None;
        self.capped = false;
        self.provenance = provenance;
    }

    /// Drop any threshold so the dispatcher rejects this bin's events.
    pub(crate) fn mark_unresolved(&mut self) {
        self.threshold = None;
        self.signal_efficiency = None;
        self.background_efficiency = None;
        self.optimum_found = false;
        self.significance_at_optimum = None;
        self.capped = false;
        self.provenance = Provenance::Unresolved;
    }

    pub fn record(&self) -> BinRecord {
        BinRecord {
            bin_id: self.id,
            energy_min_log10: self.energy_min_log10,
            energy_max_log10: self.energy_max_log10,
            mean_energy_log10: self.mean_energy_log10,
            zenith_min: self.zenith_min,
            zenith_max: self.zenith_max,
            mean_zenith: self.mean_zenith,
            classifier: self.classifier.kind().to_string(),
            policy: self.policy.to_string(),
            threshold: self.threshold,
            signal_efficiency: self.signal_efficiency,
            background_efficiency: self.background_efficiency,
            source_strength_at_optimum: self.source_strength_at_optimum,
            significance_at_optimum: self.significance_at_optimum,
            optimum_found: self.optimum_found,
            capped: self.capped,
            provenance: self.provenance,
        }
    }
}

/// Per-bin audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BinRecord {
    pub bin_id: BinId,
    pub energy_min_log10: f64,
    pub energy_max_log10: f64,
    pub mean_energy_log10: f64,
    pub zenith_min: f64,
    pub zenith_max: f64,
    pub mean_zenith: f64,
    pub classifier: String,
    pub policy: String,
    pub threshold: Option<f64>,
    pub signal_efficiency: Option<f64>,
    pub background_efficiency: Option<f64>,
    pub source_strength_at_optimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub significance_at_optimum: Option<f64>,
    pub optimum_found: bool,
    /// Threshold moved to the signal efficiency cap after optimization.
    #[serde(default)]
    pub capped: bool,
    pub provenance: Provenance,
}

/// Bins ordered by id.
#[derive(Debug, Clone, Default)]
pub struct BinCatalog {
    bins: Vec<ClassificationBin>,
}

impl BinCatalog {
    pub fn new(mut bins: Vec<ClassificationBin>) -> Result<Self, CatalogError> {
        bins.sort_by_key(|b| b.id);
        if let Some(pair) = bins.windows(2).find(|w| w[0].id == w[1].id) {
            return Err(CatalogError::DuplicateBin(pair[0].id));
        }
        for bin in &bins {
            if !(bin.energy_min_log10 < bin.energy_max_log10) {
                return Err(CatalogError::InvalidBin {
                    id: bin.id,
                    message: "energy range is empty".to_string(),
                });
            }
            if !(bin.zenith_min < bin.zenith_max) {
                return Err(CatalogError::InvalidBin {
                    id: bin.id,
                    message: "zenith range is empty".to_string(),
                });
            }
        }
        Ok(Self { bins })
    }

    pub fn get(&self, id: BinId) -> Option<&ClassificationBin> {
        self.bins
            .binary_search_by_key(&id, |b| b.id)
            .ok()
            .map(|i| &self.bins[i])
    }

    pub fn get_mut(&mut self, id: BinId) -> Option<&mut ClassificationBin> {
        match self.bins.binary_search_by_key(&id, |b| b.id) {
            Ok(i) => Some(&mut self.bins[i]),
            Err(_) => None,
        }
    }

    pub fn bins(&self) -> &[ClassificationBin] {
        &self.bins
    }

    pub fn bins_mut(&mut self) -> &mut [ClassificationBin] {
        &mut self.bins
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassificationBin> {
        self.bins.iter()
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// True when every bin sits in the same zenith row.
    pub fn is_energy_only(&self) -> bool {
        match self.bins.first() {
            Some(first) => self
                .bins
                .iter()
                .all(|b| b.id.zenith_index == first.id.zenith_index),
            None => true,
        }
    }

    pub fn unresolved(&self) -> Vec<BinId> {
        self.bins
            .iter()
            .filter(|b| !b.is_resolved())
            .map(|b| b.id)
            .collect()
    }

    pub fn records(&self) -> Vec<BinRecord> {
        self.bins.iter().map(ClassificationBin::record).collect()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn bins_are_sorted_by_id() {
        let catalog = BinCatalog::new(vec![bin(1, 0), bin(0, 1), bin(0, 0)]).unwrap();
        let ids: Vec<String> = catalog.iter().map(|b| b.id.to_string()).collect();
        assert_eq!(ids, vec!["e0z0", "e0z1", "e1z0"]);
        assert!(catalog.get(BinId::new(0, 1)).is_some());
        assert!(catalog.get(BinId::new(5, 5)).is_none());
        assert!(!catalog.is_energy_only());
    }

    #[test]
    fn duplicate_ids_rejected() {
        let err = BinCatalog::new(vec![bin(0, 0), bin(0, 0)]).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateBin(id) if id == BinId::new(0, 0)));
    }

    #[test]
    fn zenith_range_is_half_open() {
        let b = bin(0, 1);
        assert!(!b.contains_zenith(20.0));
        assert!(b.contains_zenith(20.001));
        assert!(b.contains_zenith(40.0));
    }

    #[test]
    fn unresolved_bins_have_no_effective_threshold() {
        let mut b = bin(0, 0);
        b.threshold = Some(0.3);
        assert_eq!(b.effective_threshold(), None);
        b.set_threshold(0.3, Provenance::FixedThreshold);
        assert_eq!(b.effective_threshold(), Some(0.3));
        assert!((b.signal_efficiency.unwrap() - 0.7).abs() < 1e-9);
        b.mark_unresolved();
        assert!(!b.is_resolved());
    }

    #[test]
    fn record_carries_policy_and_provenance() {
        let mut b = bin(2, 0);
        b.policy = ThresholdPolicy::SignalEfficiency(0.7);
        b.set_threshold(0.3, Provenance::SignalEfficiency);
        let record = b.record();
        assert_eq!(record.policy, "signal_efficiency=0.7");
        assert_eq!(record.classifier, "linear");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["provenance"], "signal_efficiency");
        assert_eq!(json["bin_id"]["energy_index"], 2);
    }

    #[test]
    fn capped_optimum_below_target_is_visible_in_record() {
        let mut b = bin(1, 0);
        b.apply(&ResolvedThreshold {
            threshold: Some(0.1),
            signal_efficiency: Some(0.9),
            background_efficiency: Some(0.81),
            optimum_found: true,
            source_strength_at_optimum: Some(0.2),
            significance_at_optimum: Some(4.2),
            provenance: Provenance::Optimized,
            capped: true,
        });
        let record = b.record();
        assert!(record.optimum_found);
        assert!(record.capped);
        assert_eq!(record.significance_at_optimum, Some(4.2));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["capped"], true);
        assert_eq!(json["significance_at_optimum"], 4.2);

        b.set_threshold(0.2, Provenance::Smoothed);
        let smoothed = b.record();
        assert!(!smoothed.capped);
        assert!(smoothed.significance_at_optimum.is_none());
        let json = serde_json::to_value(&smoothed).unwrap();
        assert!(json.get("significance_at_optimum").is_none());
    }
}
