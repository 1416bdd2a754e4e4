//! Expected on/off event rates versus energy (and optionally zenith).
//!
//! The on rate counts signal plus background in the on region for a 1 Crab
//! Unit source; the off rate is the background-only rate in the same region.
//! Both are in events per second.

use gc_math::interpolate_rows;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RateModelError {
    #[error("failed to read rate table {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse rate table {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid rate table: {0}")]
    Invalid(String),
}

/// Rates at one (energy, zenith) point, in events per second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatePair {
    pub on_rate: f64,
    pub off_rate: f64,
}

/// Read-only rate lookup shared by the optimizer threads.
pub trait RateModel: Send + Sync + std::fmt::Debug {
    /// Rates at `energy_log10`; `zenith` is ignored by energy-only models.
    fn rates(&self, energy_log10: f64, zenith: Option<f64>) -> Option<RatePair>;
}

/// One zenith row of a two-dimensional table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RateRow {
    pub zenith: f64,
    pub log10_energy: Vec<f64>,
    pub on_rate: Vec<f64>,
    pub off_rate: Vec<f64>,
}

/// Serialized rate table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RateTable {
    Energy {
        log10_energy: Vec<f64>,
        on_rate: Vec<f64>,
        off_rate: Vec<f64>,
    },
    EnergyZenith { rows: Vec<RateRow> },
}

type Samples = Vec<(f64, f64)>;

/// Linear interpolation in log10 energy, bilinear across zenith rows.
/// Queries outside the table clamp to the edge.
#[derive(Debug, Clone)]
pub struct TabulatedRateModel {
    /// `(zenith, samples)` rows sorted by zenith. A 1D table is a single row,
    /// which the row interpolation clamps to for every zenith.
    on: Vec<(f64, Samples)>,
    off: Vec<(f64, Samples)>,
}

impl TabulatedRateModel {
    pub fn from_table(table: RateTable) -> Result<Self, RateModelError> {
        let mut rows = match table {
            RateTable::Energy {
                log10_energy,
                on_rate,
                off_rate,
            } => {
                let (on, off) = build_row(&log10_energy, &on_rate, &off_rate)?;
                vec![(0.0, on, off)]
            }
            RateTable::EnergyZenith { rows } => {
                if rows.is_empty() {
                    return Err(RateModelError::Invalid("no zenith rows".to_string()));
                }
                let mut built = Vec::with_capacity(rows.len());
                for row in &rows {
                    if !row.zenith.is_finite() {
                        return Err(RateModelError::Invalid(
                            "zenith must be finite".to_string(),
                        ));
                    }
                    let (on, off) = build_row(&row.log10_energy, &row.on_rate, &row.off_rate)?;
                    built.push((row.zenith, on, off));
                }
                built
            }
        };
        rows.sort_by(|a, b| a.0.total_cmp(&b.0));
        if rows.windows(2).any(|w| w[0].0 == w[1].0) {
            return Err(RateModelError::Invalid("duplicate zenith rows".to_string()));
        }
        let mut on = Vec::with_capacity(rows.len());
        let mut off = Vec::with_capacity(rows.len());
        for (zenith, on_samples, off_samples) in rows {
            on.push((zenith, on_samples));
            off.push((zenith, off_samples));
        }
        Ok(Self { on, off })
    }

    pub fn load(path: &Path) -> Result<Self, RateModelError> {
        let content = std::fs::read_to_string(path).map_err(|source| RateModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let table: RateTable =
            serde_json::from_str(&content).map_err(|source| RateModelError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_table(table)
    }

    /// Zenith used when the caller ignores zenith: middle of the table.
    fn central_zenith(&self) -> f64 {
        match (self.on.first(), self.on.last()) {
            (Some(lo), Some(hi)) => 0.5 * (lo.0 + hi.0),
            _ => 0.0,
        }
    }
}

fn build_row(energy: &[f64], on: &[f64], off: &[f64]) -> Result<(Samples, Samples), RateModelError> {
    if energy.is_empty() {
        return Err(RateModelError::Invalid("empty energy axis".to_string()));
    }
    if energy.len() != on.len() || energy.len() != off.len() {
        return Err(RateModelError::Invalid(format!(
            "{} energies, {} on rates, {} off rates",
            energy.len(),
            on.len(),
            off.len()
        )));
    }
    if energy.windows(2).any(|w| !(w[0] < w[1])) {
        return Err(RateModelError::Invalid(
            "energies must be strictly increasing".to_string(),
        ));
    }
    let bad = |v: &f64| !(v.is_finite() && *v >= 0.0);
    if energy.iter().any(|e| !e.is_finite()) || on.iter().any(bad) || off.iter().any(bad) {
        return Err(RateModelError::Invalid(
            "rates must be finite and non-negative".to_string(),
        ));
    }
    let zip = |rates: &[f64]| -> Samples { energy.iter().copied().zip(rates.iter().copied()).collect() };
    Ok((zip(on), zip(off)))
}

impl RateModel for TabulatedRateModel {
    fn rates(&self, energy_log10: f64, zenith: Option<f64>) -> Option<RatePair> {
        if !energy_log10.is_finite() {
            return None;
        }
        let zenith = zenith.unwrap_or_else(|| self.central_zenith());
        let on_rate = interpolate_rows(&self.on, zenith, energy_log10)?;
        let off_rate = interpolate_rows(&self.off, zenith, energy_log10)?;
        Some(RatePair {
            on_rate: on_rate.max(0.0),
            off_rate: off_rate.max(0.0),
        })
    }
}
