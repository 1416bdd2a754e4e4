//! Identity of the configuration a catalog is resolved under.
//!
//! The short id travels on every log record and JSON envelope, so a bin
//! threshold can be traced back to the settings that produced it.

use chrono::{DateTime, Utc};
use gc_math::SignificanceEstimator;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::engine::{EngineConfig, MaxSearch};
use crate::policy::ThresholdPolicy;
use crate::resolve::ConfigPaths;

/// Hex digits of the settings hash used as the config id.
pub const CONFIG_ID_LEN: usize = 12;

#[derive(Debug, Clone, Serialize)]
pub struct ConfigSnapshot {
    pub captured_at: DateTime<Utc>,
    pub schema_version: String,
    /// Where the file came from; `builtin default` when none was read.
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// SHA-256 of the file bytes as read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_sha256: Option<String>,
    /// SHA-256 of the parsed configuration with every default filled in.
    pub settings_sha256: String,
    pub optimizer: OptimizerDigest,
}

/// The settings that decide what an optimized bin resolves to.
#[derive(Debug, Clone, Serialize)]
pub struct OptimizerDigest {
    pub default_policy: ThresholdPolicy,
    pub max_search: MaxSearch,
    pub estimator: SignificanceEstimator,
    pub observing_time_h: f64,
    pub alpha: f64,
    pub min_significance: f64,
    pub max_signal_efficiency: f64,
    pub smoothing: bool,
}

impl ConfigSnapshot {
    pub fn capture(config: &EngineConfig, paths: &ConfigPaths, raw: Option<&str>) -> Self {
        let settings = serde_json::to_vec(config).unwrap_or_default();
        let opt = &config.optimizer;
        ConfigSnapshot {
            captured_at: Utc::now(),
            schema_version: config.schema_version.clone(),
            source: paths.source.to_string(),
            path: paths.config.as_ref().map(|p| p.display().to_string()),
            file_sha256: raw.map(|text| sha256_hex(text.as_bytes())),
            settings_sha256: sha256_hex(&settings),
            optimizer: OptimizerDigest {
                default_policy: config.policy.default.select().chosen,
                max_search: opt.max_search,
                estimator: opt.estimator,
                observing_time_h: opt.observing_time_h,
                alpha: opt.alpha,
                min_significance: opt.min_significance,
                max_signal_efficiency: opt.max_signal_efficiency,
                smoothing: config.smoothing.enabled,
            },
        }
    }

    /// Leading hex digits of the settings hash.
    pub fn id(&self) -> &str {
        let end = CONFIG_ID_LEN.min(self.settings_sha256.len());
        &self.settings_sha256[..end]
    }

    /// True when both snapshots resolve bins under identical settings,
    /// whatever file layout or formatting they were read from.
    pub fn same_settings(&self, other: &ConfigSnapshot) -> bool {
        self.settings_sha256 == other.settings_sha256
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::ConfigSource;

    fn builtin() -> ConfigSnapshot {
        ConfigSnapshot::capture(&EngineConfig::default(), &ConfigPaths::default(), None)
    }

    #[test]
    fn builtin_defaults_have_no_file_identity() {
        let snap = builtin();
        assert_eq!(snap.schema_version, crate::CONFIG_SCHEMA_VERSION);
        assert_eq!(snap.source, ConfigSource::BuiltinDefault.to_string());
        assert!(snap.path.is_none());
        assert!(snap.file_sha256.is_none());
        assert_eq!(snap.optimizer.default_policy, ThresholdPolicy::OptimizeSensitivity);
        assert_eq!(snap.optimizer.max_search, MaxSearch::FirstLocalMax);

        let json = serde_json::to_value(&snap).unwrap();
        assert!(json.get("path").is_none());
        assert_eq!(json["optimizer"]["max_search"], "first_local_max");
    }

    #[test]
    fn id_is_a_prefix_of_the_settings_hash() {
        let snap = builtin();
        assert_eq!(snap.settings_sha256.len(), 64);
        assert_eq!(snap.id().len(), CONFIG_ID_LEN);
        assert!(snap.settings_sha256.starts_with(snap.id()));
    }

    #[test]
    fn changing_max_search_changes_the_id() {
        let mut changed = EngineConfig::default();
        changed.optimizer.max_search = MaxSearch::GlobalMax;
        let other = ConfigSnapshot::capture(&changed, &ConfigPaths::default(), None);

        assert!(builtin().same_settings(&builtin()));
        assert!(!builtin().same_settings(&other));
        assert_ne!(builtin().id(), other.id());
    }

    #[test]
    fn file_formatting_does_not_change_settings() {
        let config = EngineConfig::default();
        let paths = ConfigPaths::default();
        let compact = ConfigSnapshot::capture(&config, &paths, Some("{}"));
        let spaced = ConfigSnapshot::capture(&config, &paths, Some("{\n}\n"));

        assert_ne!(compact.file_sha256, spaced.file_sha256);
        assert!(compact.same_settings(&spaced));
    }
}
