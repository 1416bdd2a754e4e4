//! Per-bin threshold resolution.
//!
//! Picks the bin's policy from the table and turns it into a threshold with
//! matching signal and background efficiencies, calling the optimizer for
//! bins without an explicit setting.

use crate::catalog::{BinId, ClassificationBin, Provenance};
use crate::curve::EfficiencyCurve;
use crate::logging::event_names;
use crate::optimize::SensitivityOptimizer;
use gc_config::{PolicyTable, ThresholdPolicy};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ResolveError {
    #[error("bin {0} needs sensitivity optimization but no rate model is configured")]
    MissingRateModel(BinId),

    #[error("bin {id}: {curve} efficiency curve has no samples")]
    EmptyCurve { id: BinId, curve: &'static str },

    #[error("bin {id}: no rates available at log10(E) = {energy_log10}")]
    RateUnavailable { id: BinId, energy_log10: f64 },
}

/// Outcome of resolving one bin.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ResolvedThreshold {
    pub threshold: Option<f64>,
    pub signal_efficiency: Option<f64>,
    pub background_efficiency: Option<f64>,
    pub optimum_found: bool,
    pub source_strength_at_optimum: Option<f64>,
    /// Raw significance at the stored threshold, for optimized bins.
    pub significance_at_optimum: Option<f64>,
    pub provenance: Provenance,
    /// Threshold moved to honor the signal efficiency cap.
    pub capped: bool,
}

pub struct ThresholdResolver<'a> {
    policy: &'a PolicyTable,
    optimizer: Option<SensitivityOptimizer<'a>>,
}

impl<'a> ThresholdResolver<'a> {
    pub fn new(policy: &'a PolicyTable, optimizer: Option<SensitivityOptimizer<'a>>) -> Self {
        Self { policy, optimizer }
    }

    /// Policy for a bin after precedence; warns when settings were shadowed.
    pub fn policy_for(&self, id: BinId) -> ThresholdPolicy {
        let selection = self.policy.policy_for(id.energy_index, id.zenith_index);
        if selection.is_ambiguous() {
            let ignored: Vec<String> = selection.ignored.iter().map(|p| p.to_string()).collect();
            warn!(
                target: event_names::POLICY_AMBIGUOUS,
                stage = "resolve",
                bin = %id,
                chosen = %selection.chosen,
                ignored = %ignored.join(", "),
                "more than one threshold policy configured; using the highest precedence"
            );
        }
        selection.chosen
    }

    /// Resolve a bin under its configured policy.
    pub fn resolve(
        &self,
        bin: &ClassificationBin,
    ) -> Result<(ThresholdPolicy, ResolvedThreshold), ResolveError> {
        let policy = self.policy_for(bin.id);
        let resolved = self.resolve_with(policy, bin)?;
        debug!(
            target: event_names::BIN_RESOLVED,
            stage = "resolve",
            bin = %bin.id,
            policy = %policy,
            threshold = ?resolved.threshold,
            provenance = %resolved.provenance,
            "bin resolved"
        );
        Ok((policy, resolved))
    }

    pub fn resolve_with(
        &self,
        policy: ThresholdPolicy,
        bin: &ClassificationBin,
    ) -> Result<ResolvedThreshold, ResolveError> {
        let curves = &bin.curves;
        let empty = |curve: &'static str| ResolveError::EmptyCurve { id: bin.id, curve };
        let threshold = match policy {
            ThresholdPolicy::FixedThreshold(t) => t,
            ThresholdPolicy::SignalEfficiency(target) => {
                warn_unreachable(bin.id, "signal", &curves.signal, target);
                curves
                    .signal
                    .threshold_at_efficiency(target)
                    .ok_or_else(|| empty("signal"))?
            }
            ThresholdPolicy::BackgroundEfficiency(target) => {
                warn_unreachable(bin.id, "background", &curves.background, target);
                curves
                    .background
                    .threshold_at_efficiency(target)
                    .ok_or_else(|| empty("background"))?
            }
            ThresholdPolicy::OptimizeSensitivity => return self.optimize(bin),
        };
        let signal_efficiency = curves.signal.efficiency_at_threshold(threshold);
        let background_efficiency = curves.background.efficiency_at_threshold(threshold);
        if signal_efficiency.is_none() {
            return Err(empty("signal"));
        }
        if background_efficiency.is_none() {
            return Err(empty("background"));
        }
        Ok(ResolvedThreshold {
            threshold: Some(threshold),
            signal_efficiency,
            background_efficiency,
            optimum_found: false,
            source_strength_at_optimum: None,
            significance_at_optimum: None,
            provenance: match policy {
                ThresholdPolicy::FixedThreshold(_) => Provenance::FixedThreshold,
                ThresholdPolicy::SignalEfficiency(_) => Provenance::SignalEfficiency,
                _ => Provenance::BackgroundEfficiency,
            },
            capped: false,
        })
    }

    fn optimize(&self, bin: &ClassificationBin) -> Result<ResolvedThreshold, ResolveError> {
        let optimizer = self
            .optimizer
            .as_ref()
            .ok_or(ResolveError::MissingRateModel(bin.id))?;
        let outcome = optimizer.optimize(bin)?;
        let Some(trial) = outcome.trial else {
            return Ok(ResolvedThreshold::default());
        };
        // A failed search keeps its last values for the audit record, but the
        // bin stays unresolved until smoothing fills it in.
        Ok(ResolvedThreshold {
            threshold: Some(trial.threshold),
            signal_efficiency: Some(trial.signal_efficiency),
            background_efficiency: Some(trial.background_efficiency),
            optimum_found: outcome.optimum_found,
            source_strength_at_optimum: Some(trial.source_strength),
            significance_at_optimum: Some(trial.significance),
            provenance: if outcome.optimum_found {
                Provenance::Optimized
            } else {
                Provenance::Unresolved
            },
            capped: outcome.capped,
        })
    }
}

/// The tightest sample stands in for a target the curve never drops to.
fn warn_unreachable(id: BinId, curve: &'static str, c: &EfficiencyCurve, target: f64) {
    if c.is_empty() || c.reaches(target) {
        return;
    }
    warn!(
        target: event_names::TARGET_UNREACHABLE,
        stage = "resolve",
        bin = %id,
        curve,
        target_efficiency = target,
        floor = ?c.floor(),
        "efficiency curve never drops to the target; using the tightest threshold"
    );
}
