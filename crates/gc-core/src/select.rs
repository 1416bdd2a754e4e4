//! Routing events to bins.

use crate::catalog::{BinCatalog, ClassificationBin};
use std::collections::BTreeMap;

/// Picks the bin responsible for an (energy, zenith) point.
#[derive(Debug, Clone, Copy)]
pub struct BinSelector<'a> {
    catalog: &'a BinCatalog,
}

impl<'a> BinSelector<'a> {
    pub fn new(catalog: &'a BinCatalog) -> Self {
        Self { catalog }
    }

    /// Bin with the closest mean energy among those containing `zenith`.
    ///
    /// A `None` zenith considers every bin. Ties keep the first bin in
    /// catalog order.
    pub fn select_bin(&self, energy_log10: f64, zenith: Option<f64>) -> Option<&'a ClassificationBin> {
        if !energy_log10.is_finite() {
            return None;
        }
        closest_energy(
            self.catalog
                .iter()
                .filter(|b| zenith.map_or(true, |z| b.contains_zenith(z))),
            energy_log10,
        )
    }

    /// Like [`select_bin`](Self::select_bin) for a linear energy in TeV.
    pub fn select_bin_for_energy(
        &self,
        energy_tev: f64,
        zenith: Option<f64>,
    ) -> Option<&'a ClassificationBin> {
        if !(energy_tev.is_finite() && energy_tev > 0.0) {
            return None;
        }
        self.select_bin(energy_tev.log10(), zenith)
    }

    /// Closest-energy bin of every zenith row overlapping
    /// `[zenith - half_width, zenith + half_width]`, sorted by mean zenith.
    pub fn bins_near_zenith(
        &self,
        energy_log10: f64,
        zenith: f64,
        half_width: f64,
    ) -> Vec<&'a ClassificationBin> {
        if !(energy_log10.is_finite() && zenith.is_finite()) {
            return Vec::new();
        }
        let lo = zenith - half_width;
        let hi = zenith + half_width;
        let mut rows: BTreeMap<usize, Vec<&'a ClassificationBin>> = BTreeMap::new();
        for bin in self.catalog.iter() {
            if bin.zenith_max >= lo && bin.zenith_min <= hi {
                rows.entry(bin.id.zenith_index).or_default().push(bin);
            }
        }
        let mut picked: Vec<&'a ClassificationBin> = rows
            .into_values()
            .filter_map(|row| closest_energy(row.into_iter(), energy_log10))
            .collect();
        picked.sort_by(|a, b| a.mean_zenith.total_cmp(&b.mean_zenith));
        picked
    }
}

fn closest_energy<'a>(
    bins: impl Iterator<Item = &'a ClassificationBin>,
    energy_log10: f64,
) -> Option<&'a ClassificationBin> {
    let mut best: Option<(&ClassificationBin, f64)> = None;
    for bin in bins {
        let distance = (bin.mean_energy_log10 - energy_log10).abs();
        match best {
            Some((_, d)) if distance >= d => {}
            _ => best = Some((bin, distance)),
        }
    }
    best.map(|(b, _)| b)
}
