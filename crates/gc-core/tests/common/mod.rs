//! Shared fixtures: artifact trees, rate tables and in-memory catalogs.

#![allow(dead_code)]

use gc_core::catalog::{BinCatalog, BinId, ClassificationBin};
use gc_core::classifier::{Classifier, ClassifierModel};
use gc_core::curve::{EfficiencyCurve, EfficiencyCurves};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Energy bin width in log10(E/TeV).
pub const ENERGY_WIDTH: f64 = 0.5;
/// Zenith bin width in degrees.
pub const ZENITH_WIDTH: f64 = 20.0;

/// Classifier whose score is the `score` feature.
pub fn passthrough() -> Arc<dyn Classifier> {
    Arc::new(ClassifierModel::Linear {
        weights: BTreeMap::from([("score".to_string(), 1.0)]),
        bias: 0.0,
    })
}

/// Signal 1 - t, background (1 - t)^2, thresholds 0.00..=1.00 in steps of 0.05.
pub fn synthetic_curves() -> EfficiencyCurves {
    let thresholds: Vec<f64> = (0..=20).map(|i| i as f64 * 0.05).collect();
    let signal = thresholds.iter().map(|&t| (t, 1.0 - t)).collect();
    let background = thresholds.iter().map(|&t| (t, (1.0 - t).powi(2))).collect();
    EfficiencyCurves::new(
        EfficiencyCurve::new(signal).unwrap(),
        EfficiencyCurve::new(background).unwrap(),
    )
}

pub fn bin(ei: usize, zi: usize) -> ClassificationBin {
    let e0 = ei as f64 * ENERGY_WIDTH;
    let z0 = zi as f64 * ZENITH_WIDTH;
    ClassificationBin::new(
        BinId::new(ei, zi),
        (e0, e0 + ENERGY_WIDTH),
        (z0, z0 + ZENITH_WIDTH),
        passthrough(),
        synthetic_curves(),
    )
}

pub fn grid(energy_bins: usize, zenith_bins: usize) -> BinCatalog {
    let mut bins = Vec::new();
    for zi in 0..zenith_bins {
        for ei in 0..energy_bins {
            bins.push(bin(ei, zi));
        }
    }
    BinCatalog::new(bins).unwrap()
}

/// Artifact JSON matching [`bin`].
pub fn artifact(ei: usize, zi: usize) -> Value {
    let thresholds: Vec<f64> = (0..=20).map(|i| i as f64 * 0.05).collect();
    let signal: Vec<f64> = thresholds.iter().map(|t| 1.0 - t).collect();
    let background: Vec<f64> = thresholds.iter().map(|t| (1.0 - t).powi(2)).collect();
    json!({
        "energy_index": ei,
        "zenith_index": zi,
        "energy_min_log10": ei as f64 * ENERGY_WIDTH,
        "energy_max_log10": ei as f64 * ENERGY_WIDTH + ENERGY_WIDTH,
        "zenith_min": zi as f64 * ZENITH_WIDTH,
        "zenith_max": zi as f64 * ZENITH_WIDTH + ZENITH_WIDTH,
        "classifier": {"kind": "linear", "weights": {"score": 1.0}},
        "signal_efficiency": {"thresholds": thresholds, "efficiencies": signal},
        "background_efficiency": {"thresholds": thresholds, "efficiencies": background}
    })
}

/// Write `<root>/e<ei>/z<zi>/artifact.json` for every bin of the grid.
pub fn write_artifacts(root: &Path, energy_bins: usize, zenith_bins: usize) {
    for zi in 0..zenith_bins {
        for ei in 0..energy_bins {
            write_artifact(root, ei, zi, &artifact(ei, zi));
        }
    }
}

pub fn write_artifact(root: &Path, ei: usize, zi: usize, value: &Value) {
    let dir = root.join(format!("e{}", ei)).join(format!("z{}", zi));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("artifact.json"), serde_json::to_string(value).unwrap()).unwrap();
}

/// Flat energy-only rate table (Hz per Crab Unit, on and off).
pub fn write_rates(dir: &Path, on_rate: f64, off_rate: f64) -> PathBuf {
    let path = dir.join("rates.json");
    let table = json!({
        "kind": "energy",
        "log10_energy": [-1.0, 0.0, 1.0, 2.0],
        "on_rate": vec![on_rate; 4],
        "off_rate": vec![off_rate; 4]
    });
    std::fs::write(&path, serde_json::to_string(&table).unwrap()).unwrap();
    path
}
