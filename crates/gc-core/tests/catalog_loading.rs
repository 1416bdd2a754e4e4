//! Loading catalogs from artifact trees.

mod common;

use common::{artifact, write_artifact, write_artifacts, write_rates};
use gc_config::{ArtifactLayout, EngineConfig, PolicyTable};
use gc_core::catalog::{load_catalog, BinId, CatalogError};
use gc_core::engine::{CutEngine, EngineError};
use gc_core::exit_codes::ExitCode;
use gc_core::logging::LogContext;
use tempfile::TempDir;

fn layout(root: &std::path::Path, energy_bins: usize, zenith_bins: usize) -> ArtifactLayout {
    ArtifactLayout {
        root: Some(root.to_path_buf()),
        energy_bins,
        zenith_bins,
        ..ArtifactLayout::default()
    }
}

#[test]
fn full_grid_loads_in_id_order() {
    let dir = TempDir::new().unwrap();
    write_artifacts(dir.path(), 3, 2);
    let load = load_catalog(&layout(dir.path(), 3, 2), 2.5).unwrap();
    assert_eq!(load.catalog.len(), 6);
    assert!(load.skipped.is_empty());
    let ids: Vec<BinId> = load.catalog.iter().map(|b| b.id).collect();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted);
}

#[test]
fn grid_shape_is_discovered_when_unset() {
    let dir = TempDir::new().unwrap();
    write_artifacts(dir.path(), 4, 1);
    let load = load_catalog(&layout(dir.path(), 0, 0), 2.5).unwrap();
    assert_eq!(load.energy_bins, 4);
    assert_eq!(load.zenith_bins, 1);
    assert_eq!(load.catalog.len(), 4);
}

#[test]
fn missing_edge_bin_is_skipped() {
    let dir = TempDir::new().unwrap();
    for ei in 0..3 {
        write_artifact(dir.path(), ei, 0, &artifact(ei, 0));
    }
    let load = load_catalog(&layout(dir.path(), 4, 1), 2.5).unwrap();
    assert_eq!(load.catalog.len(), 3);
    assert_eq!(load.skipped, vec![BinId::new(3, 0)]);
}

#[test]
fn missing_interior_bin_is_fatal() {
    let dir = TempDir::new().unwrap();
    for ei in [0, 2] {
        write_artifact(dir.path(), ei, 0, &artifact(ei, 0));
    }
    let err = load_catalog(&layout(dir.path(), 3, 1), 2.5).unwrap_err();
    assert!(matches!(err, CatalogError::Io { .. }), "{:?}", err);
}

#[test]
fn artifact_without_background_curve_is_fatal() {
    let dir = TempDir::new().unwrap();
    let mut value = artifact(0, 0);
    value.as_object_mut().unwrap().remove("background_efficiency");
    write_artifact(dir.path(), 0, 0, &value);
    let err = load_catalog(&layout(dir.path(), 1, 1), 2.5).unwrap_err();
    assert!(matches!(
        err,
        CatalogError::MissingCurve {
            curve: "background",
            ..
        }
    ));
}

#[test]
fn content_hash_tracks_artifact_bytes() {
    let dir = TempDir::new().unwrap();
    write_artifacts(dir.path(), 2, 1);
    let first = load_catalog(&layout(dir.path(), 2, 1), 2.5).unwrap();
    let again = load_catalog(&layout(dir.path(), 2, 1), 2.5).unwrap();
    assert_eq!(first.content_hash, again.content_hash);

    let mut changed = artifact(1, 0);
    changed["mean_zenith"] = serde_json::json!(12.5);
    write_artifact(dir.path(), 1, 0, &changed);
    let edited = load_catalog(&layout(dir.path(), 2, 1), 2.5).unwrap();
    assert_ne!(first.content_hash, edited.content_hash);
}

#[test]
fn engine_load_reads_rate_table() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("artifacts");
    write_artifacts(&root, 3, 1);
    let rates = write_rates(dir.path(), 0.1, 0.03);

    let mut config = EngineConfig::default();
    config.artifacts = layout(&root, 3, 1);
    config.artifacts.rate_model = Some(rates);
    let engine = CutEngine::load(config, &LogContext::new("run-test")).unwrap();
    assert_eq!(engine.report().bins, 3);
    assert_eq!(engine.report().optimized, 3);
    assert!(engine.report().catalog_hash.is_some());
}

#[test]
fn engine_load_without_rates_needs_explicit_policy() {
    let dir = TempDir::new().unwrap();
    write_artifacts(dir.path(), 2, 1);

    let mut config = EngineConfig::default();
    config.artifacts = layout(dir.path(), 2, 1);
    let err = CutEngine::load(config.clone(), &LogContext::new("run-test")).unwrap_err();
    assert!(matches!(err, EngineError::Resolve(_)));
    assert_eq!(err.exit_code(), ExitCode::ConfigError);

    config.policy = PolicyTable::uniform_signal_efficiency(0.6);
    let engine = CutEngine::load(config, &LogContext::new("run-test")).unwrap();
    assert!(engine.report().unresolved.is_empty());
}

#[test]
fn bad_rate_table_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    write_artifacts(dir.path(), 1, 1);
    let rates = dir.path().join("rates.json");
    std::fs::write(&rates, "{\"kind\": \"energy\"}").unwrap();

    let mut config = EngineConfig::default();
    config.artifacts = layout(dir.path(), 1, 1);
    config.artifacts.rate_model = Some(rates);
    let err = CutEngine::load(config, &LogContext::new("run-test")).unwrap_err();
    assert!(matches!(err, EngineError::RateModel(_)));
    assert_eq!(err.exit_code(), ExitCode::ConfigError);
}
