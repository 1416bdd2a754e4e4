//! Per-event evaluation.
//!
//! The dispatcher routes each event to its bin, scores it with that bin's
//! classifier and compares the score against the resolved threshold. Bins
//! without a threshold reject every event.

use crate::catalog::{BinCatalog, BinId, ClassificationBin};
use crate::features::EventFeatures;
use crate::select::BinSelector;
use gc_config::EvaluationConfig;
use gc_math::lerp_points;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Why an event was accepted or rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VerdictReason {
    Accepted,
    NonPositiveEnergy,
    NoMatchingBin,
    UnresolvedThreshold,
    ScoreFailed,
    BelowThreshold,
}

impl fmt::Display for VerdictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VerdictReason::Accepted => "accepted",
            VerdictReason::NonPositiveEnergy => "non_positive_energy",
            VerdictReason::NoMatchingBin => "no_matching_bin",
            VerdictReason::UnresolvedThreshold => "unresolved_threshold",
            VerdictReason::ScoreFailed => "score_failed",
            VerdictReason::BelowThreshold => "below_threshold",
        };
        f.write_str(s)
    }
}

/// Outcome for one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EventVerdict {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<u64>,
    pub accepted: bool,
    pub score: Option<f64>,
    pub bin_id: Option<BinId>,
    pub threshold: Option<f64>,
    pub reason: VerdictReason,
}

impl EventVerdict {
    fn rejected(event: &EventFeatures, reason: VerdictReason) -> Self {
        Self {
            event_id: event.event_id,
            accepted: false,
            score: None,
            bin_id: None,
            threshold: None,
            reason,
        }
    }
}

/// Running totals over evaluated events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EvaluationStats {
    pub evaluated: u64,
    pub accepted: u64,
    pub non_positive_energy: u64,
    pub no_matching_bin: u64,
    pub unresolved_threshold: u64,
    pub score_failed: u64,
    pub below_threshold: u64,
}

impl EvaluationStats {
    pub fn record(&mut self, reason: VerdictReason) {
        self.evaluated += 1;
        let counter = match reason {
            VerdictReason::Accepted => &mut self.accepted,
            VerdictReason::NonPositiveEnergy => &mut self.non_positive_energy,
            VerdictReason::NoMatchingBin => &mut self.no_matching_bin,
            VerdictReason::UnresolvedThreshold => &mut self.unresolved_threshold,
            VerdictReason::ScoreFailed => &mut self.score_failed,
            VerdictReason::BelowThreshold => &mut self.below_threshold,
        };
        *counter += 1;
    }

    pub fn rejected(&self) -> u64 {
        self.evaluated - self.accepted
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatchOptions {
    pub interpolate_zenith: bool,
    pub interpolate_threshold: bool,
    pub zenith_neighborhood_deg: f64,
    pub use_run_average_zenith: bool,
    pub ignore_zenith: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self::from(&EvaluationConfig::default())
    }
}

impl From<&EvaluationConfig> for DispatchOptions {
    fn from(config: &EvaluationConfig) -> Self {
        Self {
            interpolate_zenith: config.interpolate_zenith,
            interpolate_threshold: config.interpolate_threshold,
            zenith_neighborhood_deg: config.zenith_neighborhood_deg,
            use_run_average_zenith: config.use_run_average_zenith,
            ignore_zenith: config.ignore_zenith,
        }
    }
}

/// Mean zenith over a batch, skipping non-finite values.
pub fn run_average_zenith(events: &[EventFeatures]) -> Option<f64> {
    let (sum, n) = events
        .iter()
        .map(|e| e.zenith_deg)
        .filter(|z| z.is_finite())
        .fold((0.0, 0usize), |(s, n), z| (s + z, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Streams events through the catalog. One dispatcher per thread; several
/// dispatchers can share a catalog.
#[derive(Debug)]
pub struct EvaluationDispatcher {
    catalog: Arc<BinCatalog>,
    options: DispatchOptions,
    run_average_zenith: Option<f64>,
    last: Option<EventVerdict>,
    stats: EvaluationStats,
}

impl EvaluationDispatcher {
    pub fn new(catalog: Arc<BinCatalog>, options: DispatchOptions) -> Self {
        Self {
            catalog,
            options,
            run_average_zenith: None,
            last: None,
            stats: EvaluationStats::default(),
        }
    }

    pub fn set_run_average_zenith(&mut self, zenith: Option<f64>) {
        self.run_average_zenith = zenith;
    }

    pub fn last_verdict(&self) -> Option<&EventVerdict> {
        self.last.as_ref()
    }

    pub fn stats(&self) -> &EvaluationStats {
        &self.stats
    }

    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    pub fn evaluate(&mut self, event: &EventFeatures) -> EventVerdict {
        let verdict = self.decide(event);
        trace!(
            stage = "evaluate",
            event_id = ?verdict.event_id,
            bin = ?verdict.bin_id.map(|b| b.to_string()),
            reason = %verdict.reason,
            "event evaluated"
        );
        self.stats.record(verdict.reason);
        self.last = Some(verdict.clone());
        verdict
    }

    fn zenith_for(&self, event: &EventFeatures) -> Option<f64> {
        if self.options.ignore_zenith {
            return None;
        }
        if self.options.use_run_average_zenith {
            if let Some(z) = self.run_average_zenith {
                return Some(z);
            }
        }
        Some(event.zenith_deg)
    }

    fn decide(&self, event: &EventFeatures) -> EventVerdict {
        let Some(energy_log10) = event.energy_log10() else {
            return EventVerdict::rejected(event, VerdictReason::NonPositiveEnergy);
        };
        let zenith = self.zenith_for(event);
        let selector = BinSelector::new(&self.catalog);

        if self.options.interpolate_zenith {
            if let Some(z) = zenith {
                let near =
                    selector.bins_near_zenith(energy_log10, z, self.options.zenith_neighborhood_deg);
                if near.len() >= 2 {
                    let nearest = selector
                        .select_bin(energy_log10, Some(z))
                        .or_else(|| closest_zenith(&near, z));
                    if let Some(nearest) = nearest {
                        return self.interpolated(event, nearest, &near, z);
                    }
                }
            }
        }

        let Some(bin) = selector.select_bin(energy_log10, zenith) else {
            return EventVerdict::rejected(event, VerdictReason::NoMatchingBin);
        };
        let threshold = bin.effective_threshold();
        let score = bin.classifier.score(event).ok();
        verdict(event, bin.id, score, threshold)
    }

    /// Score blended linearly in zenith across the neighboring rows.
    fn interpolated(
        &self,
        event: &EventFeatures,
        nearest: &ClassificationBin,
        near: &[&ClassificationBin],
        zenith: f64,
    ) -> EventVerdict {
        let mut scored = Vec::with_capacity(near.len());
        for bin in near {
            match bin.classifier.score(event) {
                Ok(score) => scored.push((bin.mean_zenith, score, bin.effective_threshold())),
                Err(_) => return verdict(event, nearest.id, None, nearest.effective_threshold()),
            }
        }
        let (lo, hi) = bracket(&scored, zenith);
        let score = lerp_points(lo.0, lo.1, hi.0, hi.1, zenith);

        let threshold = if self.options.interpolate_threshold {
            match (lo.2, hi.2) {
                (Some(t0), Some(t1)) => Some(lerp_points(lo.0, t0, hi.0, t1, zenith)),
                _ => None,
            }
        } else {
            nearest.effective_threshold()
        };
        verdict(event, nearest.id, Some(score), threshold)
    }
}

fn verdict(
    event: &EventFeatures,
    bin_id: BinId,
    score: Option<f64>,
    threshold: Option<f64>,
) -> EventVerdict {
    let (accepted, reason) = match (score, threshold) {
        (_, None) => (false, VerdictReason::UnresolvedThreshold),
        (None, Some(_)) => (false, VerdictReason::ScoreFailed),
        (Some(s), Some(t)) if s >= t => (true, VerdictReason::Accepted),
        (Some(_), Some(_)) => (false, VerdictReason::BelowThreshold),
    };
    EventVerdict {
        event_id: event.event_id,
        accepted,
        score,
        bin_id: Some(bin_id),
        threshold,
        reason,
    }
}

type Scored = (f64, f64, Option<f64>);

/// Neighbors around `zenith` in a list sorted by mean zenith; outside the
/// list both ends are the same edge point.
fn bracket(scored: &[Scored], zenith: f64) -> (Scored, Scored) {
    let first = scored[0];
    let last = scored[scored.len() - 1];
    if zenith <= first.0 {
        return (first, first);
    }
    if zenith >= last.0 {
        return (last, last);
    }
    let upper = scored.partition_point(|s| s.0 <= zenith);
    (scored[upper - 1], scored[upper])
}

fn closest_zenith<'a>(near: &[&'a ClassificationBin], zenith: f64) -> Option<&'a ClassificationBin> {
    near.iter()
        .copied()
        .min_by(|a, b| {
            (a.mean_zenith - zenith)
                .abs()
                .total_cmp(&(b.mean_zenith - zenith).abs())
        })
}
