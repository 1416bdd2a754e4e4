//! Sensitivity optimization.
//!
//! For each assumed source strength, from faint to bright, the optimizer
//! computes the detection significance at every sampled threshold, smooths
//! significance versus threshold and takes its maximum. It stops at the
//! faintest source for which the maximum is trustworthy and reaches both the
//! significance and excess-count targets.

use crate::catalog::{BinId, ClassificationBin};
use crate::curve::EfficiencyCurves;
use crate::logging::event_names;
use crate::rates::RateModel;
use crate::resolve::ResolveError;
use gc_config::{MaxSearch, OptimizerConfig, MIN_STEP_SIZE_DEX};
use gc_math::KernelSmoother;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Expected counts for a 1 Crab Unit source over the observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpectedCounts {
    /// Signal plus background in the on region.
    pub n_on: f64,
    /// Background in the on region.
    pub n_off: f64,
}

impl ExpectedCounts {
    pub fn from_rates(on_rate: f64, off_rate: f64, observing_time_h: f64) -> Self {
        let seconds = observing_time_h * SECONDS_PER_HOUR;
        Self {
            n_on: on_rate * seconds,
            n_off: off_rate * seconds,
        }
    }

    /// Signal events for a 1 Crab Unit source before any cut.
    pub fn excess(&self) -> f64 {
        self.n_on - self.n_off
    }
}

/// One evaluated (source strength, threshold) point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OptimizationTrial {
    /// Crab Units.
    pub source_strength: f64,
    pub threshold: f64,
    pub significance: f64,
    pub signal_efficiency: f64,
    pub background_efficiency: f64,
    /// Signal events surviving the cut.
    pub excess_events: f64,
}

/// Result of scanning one source strength.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrengthScan {
    /// None when no threshold reaches the significance target.
    pub trial: Option<OptimizationTrial>,
    /// The maximum is interior or the curve is flat near the edge.
    pub validated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizationOutcome {
    /// Last evaluated trial; None if no strength was feasible.
    pub trial: Option<OptimizationTrial>,
    pub optimum_found: bool,
    /// Signal efficiency was limited by the configured maximum.
    pub capped: bool,
    pub strengths_scanned: usize,
}

/// Finds the threshold that detects the faintest source.
#[derive(Debug, Clone, Copy)]
pub struct SensitivityOptimizer<'a> {
    rates: &'a dyn RateModel,
    config: &'a OptimizerConfig,
}

impl<'a> SensitivityOptimizer<'a> {
    pub fn new(rates: &'a dyn RateModel, config: &'a OptimizerConfig) -> Self {
        Self { rates, config }
    }

    pub fn config(&self) -> &OptimizerConfig {
        self.config
    }

    /// Counts at the bin's mean energy and zenith.
    pub fn expected_counts(&self, bin: &ClassificationBin) -> Option<ExpectedCounts> {
        let pair = self
            .rates
            .rates(bin.mean_energy_log10, Some(bin.mean_zenith))?;
        Some(ExpectedCounts::from_rates(
            pair.on_rate,
            pair.off_rate,
            self.config.observing_time_h,
        ))
    }

    pub fn optimize(&self, bin: &ClassificationBin) -> Result<OptimizationOutcome, ResolveError> {
        let counts = self
            .expected_counts(bin)
            .ok_or(ResolveError::RateUnavailable {
                id: bin.id,
                energy_log10: bin.mean_energy_log10,
            })?;
        let outcome = self.optimize_counts(&bin.curves, counts);
        self.log_outcome(bin.id, &outcome);
        Ok(outcome)
    }

    /// Geometric ladder of source strengths from the floor to the ceiling.
    ///
    /// Steps finer than [`MIN_STEP_SIZE_DEX`] are widened to it.
    pub fn source_strengths(&self) -> Vec<f64> {
        let lo = self.config.min_source_strength;
        let hi = self.config.max_source_strength;
        if !(lo > 0.0 && hi >= lo && hi.is_finite() && self.config.step_size_dex > 0.0) {
            return vec![lo];
        }
        let step = self.config.step_size_dex.max(MIN_STEP_SIZE_DEX);
        let n = ((hi.log10() - lo.log10()) / step).ceil() as usize;
        (0..=n)
            .map(|k| (lo * 10f64.powf(k as f64 * step)).min(hi))
            .collect()
    }

    pub fn optimize_counts(
        &self,
        curves: &EfficiencyCurves,
        counts: ExpectedCounts,
    ) -> OptimizationOutcome {
        let mut last = None;
        let mut optimum_found = false;
        let mut strengths_scanned = 0;

        for strength in self.source_strengths() {
            strengths_scanned += 1;
            let scan = self.scan_strength(curves, counts, strength);
            let Some(trial) = scan.trial else {
                continue;
            };
            last = Some(trial);
            if scan.validated
                && trial.significance >= self.config.min_significance
                && trial.excess_events >= self.config.min_excess_events
            {
                optimum_found = true;
                break;
            }
        }

        let mut capped = false;
        if let Some(trial) = last.as_mut() {
            if trial.signal_efficiency > self.config.max_signal_efficiency {
                if let Some(threshold) = curves
                    .signal
                    .threshold_at_efficiency(self.config.max_signal_efficiency)
                {
                    if let Some(recomputed) =
                        self.trial_at(curves, counts, trial.source_strength, threshold)
                    {
                        *trial = recomputed;
                        capped = true;
                    }
                }
            }
        }

        OptimizationOutcome {
            trial: last,
            optimum_found,
            capped,
            strengths_scanned,
        }
    }

    /// Best threshold for one assumed source strength.
    pub fn scan_strength(
        &self,
        curves: &EfficiencyCurves,
        counts: ExpectedCounts,
        strength: f64,
    ) -> StrengthScan {
        // Full signal efficiency requested: nothing to search.
        if self.config.max_signal_efficiency >= 1.0 {
            let trial = curves
                .loosest()
                .and_then(|t| self.trial_at(curves, counts, strength, t));
            return StrengthScan {
                trial,
                validated: trial.is_some(),
            };
        }

        let thresholds = curves.sampled_thresholds();
        let excess = counts.excess() * strength;
        let raw: Vec<(f64, f64)> = thresholds
            .iter()
            .filter_map(|&t| {
                let (se, be) = curves.efficiencies_at(t)?;
                Some((t, self.significance(se, be, excess, counts.n_off)))
            })
            .collect();

        if !raw.iter().any(|(_, s)| *s >= self.config.min_significance) {
            return StrengthScan {
                trial: None,
                validated: false,
            };
        }

        let smoothed = match KernelSmoother::new(self.config.threshold_bandwidth) {
            Some(kernel) => kernel.resample(&raw, self.config.resample_points),
            None => raw.clone(),
        };
        let Some(index) = find_maximum(&smoothed, self.config.max_search) else {
            return StrengthScan {
                trial: None,
                validated: false,
            };
        };
        let validated = is_trustworthy(
            &smoothed,
            index,
            self.config.plateau_tolerance,
            self.config.plateau_window,
        );
        let threshold = nearest(&thresholds, smoothed[index].0);
        let trial = threshold.and_then(|t| self.trial_at(curves, counts, strength, t));
        trace!(
            strength,
            threshold = ?threshold,
            validated,
            "scanned source strength"
        );
        StrengthScan { trial, validated }
    }

    fn trial_at(
        &self,
        curves: &EfficiencyCurves,
        counts: ExpectedCounts,
        strength: f64,
        threshold: f64,
    ) -> Option<OptimizationTrial> {
        let (se, be) = curves.efficiencies_at(threshold)?;
        let excess = counts.excess() * strength;
        Some(OptimizationTrial {
            source_strength: strength,
            threshold,
            significance: self.significance(se, be, excess, counts.n_off),
            signal_efficiency: se,
            background_efficiency: be,
            excess_events: excess * se,
        })
    }

    /// Significance after a cut with the given efficiencies.
    fn significance(&self, se: f64, be: f64, excess: f64, n_off: f64) -> f64 {
        let background = be * n_off;
        if background < self.config.min_background_events {
            return 0.0;
        }
        let alpha = self.config.alpha;
        let on = se * excess + background;
        let off = background / alpha;
        let s = self.config.estimator.evaluate(on, off, alpha);
        if s.is_finite() {
            s
        } else {
            0.0
        }
    }
}

impl SensitivityOptimizer<'_> {
    fn log_outcome(&self, id: BinId, outcome: &OptimizationOutcome) {
        match (&outcome.trial, outcome.optimum_found) {
            (Some(trial), true) => debug!(
                target: event_names::OPTIMUM_FOUND,
                stage = "optimize",
                bin = %id,
                source_strength = trial.source_strength,
                threshold = trial.threshold,
                significance = trial.significance,
                "optimum found"
            ),
            (trial, _) => debug!(
                target: event_names::OPTIMUM_NOT_FOUND,
                stage = "optimize",
                bin = %id,
                last_threshold = ?trial.map(|t| t.threshold),
                strengths = outcome.strengths_scanned,
                "no source strength met the targets"
            ),
        }
        if !outcome.capped {
            return;
        }
        let significance = outcome.trial.map(|t| t.significance);
        match significance {
            Some(s) if outcome.optimum_found && s < self.config.min_significance => warn!(
                target: event_names::EFFICIENCY_CAPPED,
                stage = "optimize",
                bin = %id,
                significance = s,
                min_significance = self.config.min_significance,
                max_signal_efficiency = self.config.max_signal_efficiency,
                "signal efficiency cap pushed the optimum below the significance target"
            ),
            _ => debug!(
                target: event_names::EFFICIENCY_CAPPED,
                stage = "optimize",
                bin = %id,
                significance = ?significance,
                "signal efficiency capped"
            ),
        }
    }
}

fn find_maximum(points: &[(f64, f64)], search: MaxSearch) -> Option<usize> {
    if points.is_empty() {
        return None;
    }
    match search {
        MaxSearch::FirstLocalMax => Some(
            points
                .windows(2)
                .position(|w| w[1].1 < w[0].1)
                .unwrap_or(points.len() - 1),
        ),
        MaxSearch::GlobalMax => {
            let mut best = 0;
            for (i, p) in points.iter().enumerate() {
                if p.1 > points[best].1 {
                    best = i;
                }
            }
            Some(best)
        }
    }
}

/// Interior maxima are accepted. An edge maximum is accepted only when the
/// curve changes by at most `tolerance` (relative) between the edge and the
/// point `window` of the domain away from it, so the verdict does not depend
/// on how densely the curve was resampled.
fn is_trustworthy(points: &[(f64, f64)], index: usize, tolerance: f64, window: f64) -> bool {
    let last = points.len().saturating_sub(1);
    if last == 0 {
        return points.first().is_some_and(|p| p.1 > 0.0);
    }
    if index > 0 && index < last {
        return true;
    }
    let (x, y) = points[index];
    if y == 0.0 {
        return false;
    }
    let span = points[last].0 - points[0].0;
    let target = if index == 0 {
        x + window * span
    } else {
        x - window * span
    };
    let reference = points
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != index)
        .min_by(|(_, a), (_, b)| (a.0 - target).abs().total_cmp(&(b.0 - target).abs()))
        .map(|(_, p)| p.1);
    match reference {
        Some(r) => ((r - y) / y).abs() <= tolerance,
        None => false,
    }
}

/// Sample nearest to `x`; ties go to the lower value.
fn nearest(sorted: &[f64], x: f64) -> Option<f64> {
    let upper = sorted.partition_point(|t| *t < x);
    match (upper.checked_sub(1).map(|i| sorted[i]), sorted.get(upper)) {
        (Some(lo), Some(&hi)) => Some(if x - lo <= hi - x { lo } else { hi }),
        (Some(lo), None) => Some(lo),
        (None, hi) => hi.copied(),
    }
}
