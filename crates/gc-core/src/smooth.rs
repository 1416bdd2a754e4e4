//! Cross-bin smoothing of optimized thresholds.
//!
//! Optimized thresholds fluctuate from bin to bin. After every bin has been
//! resolved once, the thresholds of all optimized bins are replaced by a
//! kernel average over the bins whose optimization succeeded. Bins with no
//! usable neighbor inside the kernel borrow the signal efficiency of the
//! closest resolved bin. Bins with an explicit policy are never touched.

use crate::catalog::{BinCatalog, BinId, Provenance};
use crate::logging::event_names;
use gc_config::{SmoothingConfig, ThresholdPolicy};
use gc_math::{KernelSmoother, KernelSmoother2d};
use serde::Serialize;
use tracing::{debug, info, warn};

/// What smoothing did to the catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SmoothingReport {
    pub smoothed: Vec<BinId>,
    pub borrowed: Vec<BinId>,
    pub unresolved: Vec<BinId>,
}

enum Kernel {
    Energy(KernelSmoother),
    EnergyZenith(KernelSmoother2d),
}

pub struct Smoother<'a> {
    config: &'a SmoothingConfig,
}

impl<'a> Smoother<'a> {
    pub fn new(config: &'a SmoothingConfig) -> Self {
        Self { config }
    }

    pub fn apply(&self, catalog: &mut BinCatalog) -> SmoothingReport {
        let mut report = SmoothingReport::default();
        let targets: Vec<BinId> = catalog
            .iter()
            .filter(|b| b.policy == ThresholdPolicy::OptimizeSensitivity)
            .map(|b| b.id)
            .collect();
        if targets.is_empty() {
            return report;
        }

        let mut needs_donor = Vec::new();
        match self.kernel(catalog) {
            Some(kernel) => {
                // (mean energy, mean zenith, threshold) of successful optimizations.
                let donors: Vec<(f64, f64, f64)> = catalog
                    .iter()
                    .filter(|b| b.policy == ThresholdPolicy::OptimizeSensitivity)
                    .filter(|b| b.optimum_found)
                    .filter_map(|b| b.threshold.map(|t| (b.mean_energy_log10, b.mean_zenith, t)))
                    .collect();
                let energy_donors: Vec<(f64, f64)> =
                    donors.iter().map(|(e, _, t)| (*e, *t)).collect();

                for id in &targets {
                    let Some(bin) = catalog.get_mut(*id) else {
                        continue;
                    };
                    let value = match &kernel {
                        Kernel::Energy(k) => k.value_at(&energy_donors, bin.mean_energy_log10),
                        Kernel::EnergyZenith(k) => {
                            k.value_at(&donors, bin.mean_energy_log10, bin.mean_zenith)
                        }
                    };
                    match value {
                        Some(threshold) => {
                            bin.set_threshold(threshold, Provenance::Smoothed);
                            bin.optimum_found = true;
                            report.smoothed.push(*id);
                        }
                        None => needs_donor.push(*id),
                    }
                }
            }
            None => {
                needs_donor.extend(
                    targets
                        .iter()
                        .copied()
                        .filter(|id| catalog.get(*id).is_some_and(|b| !b.optimum_found)),
                );
            }
        }

        self.borrow(catalog, &needs_donor, &mut report);

        info!(
            target: event_names::SMOOTH_FINISHED,
            stage = "smooth",
            smoothed = report.smoothed.len(),
            borrowed = report.borrowed.len(),
            unresolved = report.unresolved.len(),
            "smoothing finished"
        );
        report
    }

    fn kernel(&self, catalog: &BinCatalog) -> Option<Kernel> {
        if !self.config.enabled {
            return None;
        }
        if self.config.energy_only || catalog.is_energy_only() {
            KernelSmoother::new(self.config.energy_bandwidth).map(Kernel::Energy)
        } else {
            KernelSmoother2d::new(self.config.energy_bandwidth, self.config.zenith_bandwidth)
                .map(Kernel::EnergyZenith)
        }
    }

    /// Give each recipient the signal efficiency of its closest resolved bin.
    fn borrow(&self, catalog: &mut BinCatalog, recipients: &[BinId], report: &mut SmoothingReport) {
        // Donors are fixed before any recipient changes.
        let donors: Vec<(BinId, f64)> = catalog
            .iter()
            .filter(|b| b.is_resolved() && !recipients.contains(&b.id))
            .filter_map(|b| b.signal_efficiency.map(|se| (b.id, se)))
            .collect();

        for id in recipients {
            let Some(bin) = catalog.get_mut(*id) else {
                continue;
            };
            let mapped = closest_donor(*id, &donors).and_then(|(donor, se)| {
                bin.curves
                    .signal
                    .threshold_at_efficiency(se)
                    .map(|t| (donor, t))
            });
            match mapped {
                Some((donor, threshold)) => {
                    bin.set_threshold(threshold, Provenance::Borrowed);
                    bin.optimum_found = true;
                    debug!(
                        target: event_names::BIN_BORROWED,
                        stage = "smooth",
                        bin = %id,
                        donor = %donor,
                        threshold,
                        "threshold borrowed from neighbor"
                    );
                    report.borrowed.push(*id);
                }
                None => {
                    bin.mark_unresolved();
                    warn!(
                        target: event_names::BIN_UNRESOLVED,
                        stage = "smooth",
                        bin = %id,
                        "no resolved bin to borrow from; events in this bin will be rejected"
                    );
                    report.unresolved.push(*id);
                }
            }
        }
    }
}

/// Same zenith row first, by energy-index distance (lower index on ties),
/// then other rows ordered by zenith distance and energy distance.
fn closest_donor(id: BinId, donors: &[(BinId, f64)]) -> Option<(BinId, f64)> {
    donors
        .iter()
        .copied()
        .min_by_key(|(d, _)| {
            (
                d.zenith_index.abs_diff(id.zenith_index),
                d.energy_index.abs_diff(id.energy_index),
                d.zenith_index,
                d.energy_index,
            )
        })
}
