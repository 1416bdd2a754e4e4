//! Training artifact loading.
//!
//! Each bin's trained classifier and efficiency curves live in one JSON file
//! at `<root>/e<energy_index>/z<zenith_index>/<file_name>`. Bins on the outer
//! edge of the grid may be missing; interior holes abort the load.

use super::{BinCatalog, BinId, CatalogError, ClassificationBin};
use crate::classifier::ClassifierModel;
use crate::curve::{CurvePoints, EfficiencyCurve, EfficiencyCurves};
use crate::logging::event_names;
use gc_config::ArtifactLayout;
use gc_math::spectral_weighted_mean_log10;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// On-disk form of one trained bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TrainingArtifact {
    pub energy_index: usize,
    pub zenith_index: usize,
    pub energy_min_log10: f64,
    pub energy_max_log10: f64,
    pub zenith_min: f64,
    pub zenith_max: f64,
    /// Defaults to the spectral-weighted mean over the energy range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean_energy_log10: Option<f64>,
    /// Defaults to the middle of the zenith range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean_zenith: Option<f64>,
    pub classifier: ClassifierModel,
    #[serde(default)]
    pub signal_efficiency: Option<CurvePoints>,
    #[serde(default)]
    pub background_efficiency: Option<CurvePoints>,
}

impl TrainingArtifact {
    pub fn id(&self) -> BinId {
        BinId::new(self.energy_index, self.zenith_index)
    }

    /// Validate and convert into an unresolved bin.
    pub fn into_bin(self, spectrum_index: f64) -> Result<ClassificationBin, CatalogError> {
        let id = self.id();
        let curve = |points: Option<&CurvePoints>,
                     name: &'static str|
         -> Result<EfficiencyCurve, CatalogError> {
            let points = points.ok_or(CatalogError::MissingCurve { id, curve: name })?;
            EfficiencyCurve::from_points(points).map_err(|source| CatalogError::InvalidCurve {
                id,
                curve: name,
                source,
            })
        };
        let signal = curve(self.signal_efficiency.as_ref(), "signal")?;
        let background = curve(self.background_efficiency.as_ref(), "background")?;
        if signal.is_empty() || background.is_empty() {
            return Err(CatalogError::InvalidBin {
                id,
                message: "efficiency curves must have at least one sample".to_string(),
            });
        }

        self.classifier
            .validate()
            .map_err(|source| CatalogError::InvalidClassifier { id, source })?;

        let energy = (self.energy_min_log10, self.energy_max_log10);
        let zenith = (self.zenith_min, self.zenith_max);
        if !(energy.0.is_finite() && energy.1.is_finite() && energy.0 < energy.1) {
            return Err(CatalogError::InvalidBin {
                id,
                message: format!("bad energy range [{}, {})", energy.0, energy.1),
            });
        }
        if !(zenith.0.is_finite() && zenith.1.is_finite() && zenith.0 < zenith.1) {
            return Err(CatalogError::InvalidBin {
                id,
                message: format!("bad zenith range ({}, {}]", zenith.0, zenith.1),
            });
        }

        let mean_energy = match self.mean_energy_log10 {
            Some(mean) => mean,
            None => spectral_weighted_mean_log10(energy.0, energy.1, spectrum_index)
                .unwrap_or(0.5 * (energy.0 + energy.1)),
        };
        let mut bin = ClassificationBin::new(
            id,
            energy,
            zenith,
            Arc::new(self.classifier),
            EfficiencyCurves::new(signal, background),
        )
        .with_mean_energy(mean_energy);
        if let Some(mean) = self.mean_zenith {
            bin = bin.with_mean_zenith(mean);
        }
        Ok(bin)
    }
}

/// Result of loading a catalog from disk.
#[derive(Debug)]
pub struct CatalogLoad {
    pub catalog: BinCatalog,
    /// Edge bins whose artifacts were missing or unreadable.
    pub skipped: Vec<BinId>,
    pub energy_bins: usize,
    pub zenith_bins: usize,
    /// SHA-256 over every loaded artifact, in bin order.
    pub content_hash: String,
}

pub fn artifact_path(root: &Path, id: BinId, file_name: &str) -> PathBuf {
    root.join(format!("e{}", id.energy_index))
        .join(format!("z{}", id.zenith_index))
        .join(file_name)
}

/// Load every artifact of the configured grid.
pub fn load_catalog(
    layout: &ArtifactLayout,
    spectrum_index: f64,
) -> Result<CatalogLoad, CatalogError> {
    let root = layout.root.as_deref().ok_or(CatalogError::NoRoot)?;
    let (energy_bins, zenith_bins) = grid_shape(root, layout)?;
    debug!(
        root = %root.display(),
        energy_bins,
        zenith_bins,
        "loading training artifacts"
    );

    let mut bins = Vec::with_capacity(energy_bins * zenith_bins);
    let mut skipped = Vec::new();
    let mut hasher = Sha256::new();

    for zenith_index in 0..zenith_bins {
        for energy_index in 0..energy_bins {
            let id = BinId::new(energy_index, zenith_index);
            let path = artifact_path(root, id, &layout.file_name);
            let edge = is_edge(id, energy_bins, zenith_bins);
            let (artifact, raw) = match read_artifact(&path) {
                Ok(loaded) => loaded,
                Err(e) if edge => {
                    warn!(
                        target: event_names::ARTIFACT_SKIPPED,
                        stage = "load",
                        bin = %id,
                        error = %e,
                        "skipping edge bin without a usable artifact"
                    );
                    skipped.push(id);
                    continue;
                }
                Err(e) => return Err(e),
            };
            if artifact.id() != id {
                return Err(CatalogError::InvalidBin {
                    id,
                    message: format!("artifact {} declares bin {}", path.display(), artifact.id()),
                });
            }
            hasher.update(id.to_string().as_bytes());
            hasher.update(raw.as_bytes());
            bins.push(artifact.into_bin(spectrum_index)?);
        }
    }

    if bins.is_empty() {
        return Err(CatalogError::Empty {
            root: root.to_path_buf(),
        });
    }
    let catalog = BinCatalog::new(bins)?;
    let content_hash = hex::encode(hasher.finalize());
    info!(
        target: event_names::CATALOG_LOADED,
        stage = "load",
        bins = catalog.len(),
        skipped = skipped.len(),
        "catalog loaded"
    );
    Ok(CatalogLoad {
        catalog,
        skipped,
        energy_bins,
        zenith_bins,
        content_hash,
    })
}

fn read_artifact(path: &Path) -> Result<(TrainingArtifact, String), CatalogError> {
    let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let artifact = serde_json::from_str(&raw).map_err(|source| CatalogError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok((artifact, raw))
}

/// Outer ring of the grid. A single zenith row has no zenith edge.
fn is_edge(id: BinId, energy_bins: usize, zenith_bins: usize) -> bool {
    let energy_edge = id.energy_index == 0 || id.energy_index + 1 == energy_bins;
    let zenith_edge =
        zenith_bins > 1 && (id.zenith_index == 0 || id.zenith_index + 1 == zenith_bins);
    energy_edge || zenith_edge
}

/// Grid size from the layout, discovering zero counts from `e*/z*` directories.
fn grid_shape(root: &Path, layout: &ArtifactLayout) -> Result<(usize, usize), CatalogError> {
    if layout.energy_bins > 0 && layout.zenith_bins > 0 {
        return Ok((layout.energy_bins, layout.zenith_bins));
    }
    let energy_dirs = indexed_dirs(root, 'e')?;
    let mut max_zenith = None;
    for (_, dir) in &energy_dirs {
        for (zi, _) in indexed_dirs(dir, 'z')? {
            max_zenith = max_zenith.max(Some(zi));
        }
    }
    let discovered_energy = energy_dirs.iter().map(|(i, _)| i + 1).max().unwrap_or(0);
    let discovered_zenith = max_zenith.map_or(0, |z| z + 1);

    let energy_bins = if layout.energy_bins > 0 {
        layout.energy_bins
    } else {
        discovered_energy
    };
    let zenith_bins = if layout.zenith_bins > 0 {
        layout.zenith_bins
    } else {
        discovered_zenith
    };
    if energy_bins == 0 || zenith_bins == 0 {
        return Err(CatalogError::Empty {
            root: root.to_path_buf(),
        });
    }
    Ok((energy_bins, zenith_bins))
}

/// Subdirectories named `<prefix><index>`.
fn indexed_dirs(dir: &Path, prefix: char) -> Result<Vec<(usize, PathBuf)>, CatalogError> {
    let entries = std::fs::read_dir(dir).map_err(|source| CatalogError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut found = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let index = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix(prefix))
            .and_then(|n| n.parse::<usize>().ok());
        if let Some(index) = index {
            found.push((index, path));
        }
    }
    found.sort();
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn artifact_json(ei: usize, zi: usize) -> serde_json::Value {
        json!({
            "energy_index": ei,
            "zenith_index": zi,
            "energy_min_log10": ei as f64 * 0.5,
            "energy_max_log10": ei as f64 * 0.5 + 0.5,
            "zenith_min": zi as f64 * 20.0,
            "zenith_max": zi as f64 * 20.0 + 20.0,
            "classifier": {"kind": "linear", "weights": {"score": 1.0}},
            "signal_efficiency": {"thresholds": [0.0, 0.5, 1.0], "efficiencies": [1.0, 0.5, 0.0]},
            "background_efficiency": {"thresholds": [0.0, 0.5, 1.0], "efficiencies": [1.0, 0.2, 0.0]}
        })
    }

    fn write(root: &Path, ei: usize, zi: usize, value: &serde_json::Value) {
        let path = artifact_path(root, BinId::new(ei, zi), "artifact.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, serde_json::to_string(value).unwrap()).unwrap();
    }

    fn layout(root: &Path) -> ArtifactLayout {
        ArtifactLayout {
            root: Some(root.to_path_buf()),
            ..ArtifactLayout::default()
        }
    }

    #[test]
    fn discovers_grid_and_computes_means() {
        let dir = TempDir::new().unwrap();
        for ei in 0..3 {
            write(dir.path(), ei, 0, &artifact_json(ei, 0));
        }
        let load = load_catalog(&layout(dir.path()), 2.5).unwrap();
        assert_eq!((load.energy_bins, load.zenith_bins), (3, 1));
        assert_eq!(load.catalog.len(), 3);
        assert_eq!(load.content_hash.len(), 64);
        let bin = load.catalog.get(BinId::new(1, 0)).unwrap();
        // A falling spectrum pulls the mean below the bin center.
        assert!(bin.mean_energy_log10 > 0.5 && bin.mean_energy_log10 < 0.75);
        assert_eq!(bin.mean_zenith, 10.0);
    }

    #[test]
    fn missing_edge_bin_is_skipped() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), 0, 0, &artifact_json(0, 0));
        write(dir.path(), 1, 0, &artifact_json(1, 0));
        let mut layout = layout(dir.path());
        layout.energy_bins = 3;
        layout.zenith_bins = 1;
        let load = load_catalog(&layout, 2.5).unwrap();
        assert_eq!(load.skipped, vec![BinId::new(2, 0)]);
        assert_eq!(load.catalog.len(), 2);
    }

    #[test]
    fn missing_interior_bin_is_fatal() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), 0, 0, &artifact_json(0, 0));
        write(dir.path(), 2, 0, &artifact_json(2, 0));
        let err = load_catalog(&layout(dir.path()), 2.5).unwrap_err();
        assert!(matches!(err, CatalogError::Io { .. }));
    }

    #[test]
    fn missing_curve_is_fatal_even_on_the_edge() {
        let dir = TempDir::new().unwrap();
        let mut value = artifact_json(0, 0);
        value.as_object_mut().unwrap().remove("background_efficiency");
        write(dir.path(), 0, 0, &value);
        let err = load_catalog(&layout(dir.path()), 2.5).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::MissingCurve {
                curve: "background",
                ..
            }
        ));
    }

    #[test]
    fn index_mismatch_is_rejected() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), 0, 0, &artifact_json(1, 0));
        let err = load_catalog(&layout(dir.path()), 2.5).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidBin { .. }));
    }

    #[test]
    fn no_root_configured() {
        let err = load_catalog(&ArtifactLayout::default(), 2.5).unwrap_err();
        assert!(matches!(err, CatalogError::NoRoot));
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = load_catalog(&layout(dir.path()), 2.5).unwrap_err();
        assert!(matches!(err, CatalogError::Empty { .. }));
    }

    #[test]
    fn edge_rule_respects_single_row() {
        assert!(is_edge(BinId::new(0, 0), 3, 1));
        assert!(!is_edge(BinId::new(1, 0), 3, 1));
        assert!(is_edge(BinId::new(1, 0), 3, 3));
        assert!(!is_edge(BinId::new(1, 1), 3, 3));
    }
}
