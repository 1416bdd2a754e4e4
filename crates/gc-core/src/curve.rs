//! Efficiency curves: cumulative pass fraction versus classifier threshold.
//!
//! A curve is a sequence of `(threshold, efficiency)` samples sorted by
//! strictly increasing threshold, with efficiency non-increasing along it.
//! The lowest threshold is the loosest cut. Curves come from training
//! artifacts and are never recomputed here.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Slack allowed when checking that efficiency never increases.
const MONOTONE_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CurveError {
    #[error("{thresholds} thresholds but {efficiencies} efficiencies")]
    LengthMismatch {
        thresholds: usize,
        efficiencies: usize,
    },

    #[error("sample {index} is not finite")]
    NonFinite { index: usize },

    #[error("efficiency {value} at sample {index} is outside [0, 1]")]
    EfficiencyOutOfRange { index: usize, value: f64 },

    #[error("thresholds are not strictly increasing at sample {index}")]
    UnsortedThresholds { index: usize },

    #[error("efficiency increases at sample {index}")]
    IncreasingEfficiency { index: usize },
}

/// Serialized form of a curve: parallel threshold and efficiency arrays.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CurvePoints {
    pub thresholds: Vec<f64>,
    pub efficiencies: Vec<f64>,
}

/// One monotone efficiency curve.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EfficiencyCurve {
    samples: Vec<(f64, f64)>,
}

impl EfficiencyCurve {
    /// Build a curve from `(threshold, efficiency)` samples.
    pub fn new(samples: Vec<(f64, f64)>) -> Result<Self, CurveError> {
        for (index, &(t, e)) in samples.iter().enumerate() {
            if !(t.is_finite() && e.is_finite()) {
                return Err(CurveError::NonFinite { index });
            }
            if !(0.0..=1.0).contains(&e) {
                return Err(CurveError::EfficiencyOutOfRange { index, value: e });
            }
            if index > 0 {
                let (prev_t, prev_e) = samples[index - 1];
                if t <= prev_t {
                    return Err(CurveError::UnsortedThresholds { index });
                }
                if e > prev_e + MONOTONE_TOLERANCE {
                    return Err(CurveError::IncreasingEfficiency { index });
                }
            }
        }
        Ok(Self { samples })
    }

    pub fn from_points(points: &CurvePoints) -> Result<Self, CurveError> {
        if points.thresholds.len() != points.efficiencies.len() {
            return Err(CurveError::LengthMismatch {
                thresholds: points.thresholds.len(),
                efficiencies: points.efficiencies.len(),
            });
        }
        Self::new(
            points
                .thresholds
                .iter()
                .copied()
                .zip(points.efficiencies.iter().copied())
                .collect(),
        )
    }

    pub fn to_points(&self) -> CurvePoints {
        CurvePoints {
            thresholds: self.samples.iter().map(|(t, _)| *t).collect(),
            efficiencies: self.samples.iter().map(|(_, e)| *e).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[(f64, f64)] {
        &self.samples
    }

    pub fn thresholds(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|(t, _)| *t)
    }

    /// Lowest sampled threshold (highest efficiency).
    pub fn loosest(&self) -> Option<f64> {
        self.samples.first().map(|(t, _)| *t)
    }

    /// Highest sampled threshold (lowest efficiency).
    pub fn tightest(&self) -> Option<f64> {
        self.samples.last().map(|(t, _)| *t)
    }

    /// Efficiency of the tightest sample.
    pub fn floor(&self) -> Option<f64> {
        self.samples.last().map(|(_, e)| *e)
    }

    /// Whether some sample has efficiency at or below `target`.
    pub fn reaches(&self, target: f64) -> bool {
        target >= 1.0 || self.samples.iter().any(|(_, e)| *e <= target)
    }

    /// Efficiency of the sample nearest to `threshold`.
    ///
    /// Thresholds outside the sampled range clamp to the edge sample; an exact
    /// tie between two samples resolves to the looser one.
    pub fn efficiency_at_threshold(&self, threshold: f64) -> Option<f64> {
        if threshold.is_nan() {
            return None;
        }
        let first = self.samples.first()?;
        let last = self.samples[self.samples.len() - 1];
        if threshold <= first.0 {
            return Some(first.1);
        }
        if threshold >= last.0 {
            return Some(last.1);
        }
        // First sample at or above the threshold; guaranteed in 1..len.
        let upper = self.samples.partition_point(|(t, _)| *t < threshold);
        let (lo_t, lo_e) = self.samples[upper - 1];
        let (hi_t, hi_e) = self.samples[upper];
        if threshold - lo_t <= hi_t - threshold {
            Some(lo_e)
        } else {
            Some(hi_e)
        }
    }

    /// Loosest sampled threshold whose efficiency has dropped to `target`.
    ///
    /// Scans from the loosest sample and stops at the first one with
    /// efficiency at or below the target. Targets at or above 1 give the
    /// loosest threshold; targets at or below 0 give the tightest.
    ///
    /// A curve that never drops to the target also gives the tightest sample,
    /// whose efficiency is then *above* the target. Check [`Self::reaches`]
    /// when the efficiency must not exceed the target.
    pub fn threshold_at_efficiency(&self, target: f64) -> Option<f64> {
        if target.is_nan() {
            return None;
        }
        let loosest = self.loosest()?;
        let tightest = self.tightest()?;
        if target >= 1.0 {
            return Some(loosest);
        }
        if target <= 0.0 {
            return Some(tightest);
        }
        Some(
            self.samples
                .iter()
                .find(|(_, e)| *e <= target)
                .map(|(t, _)| *t)
                .unwrap_or(tightest),
        )
    }
}

/// Signal and background curves of one bin.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EfficiencyCurves {
    pub signal: EfficiencyCurve,
    pub background: EfficiencyCurve,
}

impl EfficiencyCurves {
    pub fn new(signal: EfficiencyCurve, background: EfficiencyCurve) -> Self {
        Self { signal, background }
    }

    /// `(signal, background)` efficiency at a threshold.
    pub fn efficiencies_at(&self, threshold: f64) -> Option<(f64, f64)> {
        Some((
            self.signal.efficiency_at_threshold(threshold)?,
            self.background.efficiency_at_threshold(threshold)?,
        ))
    }

    /// Sorted union of both curves' sample thresholds.
    pub fn sampled_thresholds(&self) -> Vec<f64> {
        let mut all: Vec<f64> = self
            .signal
            .thresholds()
            .chain(self.background.thresholds())
            .collect();
        all.sort_by(f64::total_cmp);
        all.dedup();
        all
    }

    /// Loosest threshold sampled by either curve.
    pub fn loosest(&self) -> Option<f64> {
        match (self.signal.loosest(), self.background.loosest()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}
