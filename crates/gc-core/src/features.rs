//! Per-event feature vectors supplied by the upstream reconstruction.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Feature names that resolve to the reconstructed quantities.
pub const FEATURE_ENERGY: &str = "energy_tev";
pub const FEATURE_LOG10_ENERGY: &str = "log10_energy";
pub const FEATURE_ZENITH: &str = "zenith_deg";

/// One reconstructed event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EventFeatures {
    /// Caller-supplied identifier echoed into the verdict.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<u64>,
    /// Reconstructed energy in TeV.
    pub energy_tev: f64,
    /// Zenith angle in degrees.
    pub zenith_deg: f64,
    /// Named classifier inputs (shower shape and similar).
    #[serde(default)]
    pub values: BTreeMap<String, f64>,
}

impl EventFeatures {
    pub fn new(energy_tev: f64, zenith_deg: f64) -> Self {
        Self {
            event_id: None,
            energy_tev,
            zenith_deg,
            values: BTreeMap::new(),
        }
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.event_id = Some(id);
        self
    }

    pub fn with_value(mut self, name: impl Into<String>, value: f64) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    /// Look up a feature by name.
    ///
    /// Named values shadow the reconstructed energy and zenith, which are also
    /// reachable as `energy_tev`, `log10_energy` and `zenith_deg`.
    pub fn get(&self, name: &str) -> Option<f64> {
        if let Some(v) = self.values.get(name) {
            return Some(*v);
        }
        match name {
            FEATURE_ENERGY => Some(self.energy_tev),
            FEATURE_LOG10_ENERGY => self.energy_log10(),
            FEATURE_ZENITH => Some(self.zenith_deg),
            _ => None,
        }
    }

    /// log10 of the reconstructed energy, or None when it is not positive.
    pub fn energy_log10(&self) -> Option<f64> {
        if self.energy_tev.is_finite() && self.energy_tev > 0.0 {
            Some(self.energy_tev.log10())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_values_shadow_builtins() {
        let event = EventFeatures::new(2.0, 30.0).with_value("zenith_deg", 31.5);
        assert_eq!(event.get("zenith_deg"), Some(31.5));
        assert_eq!(event.get("energy_tev"), Some(2.0));
        assert!((event.get("log10_energy").unwrap() - 2f64.log10()).abs() < 1e-12);
        assert_eq!(event.get("width"), None);
    }

    #[test]
    fn non_positive_energy_has_no_log() {
        assert_eq!(EventFeatures::new(0.0, 20.0).energy_log10(), None);
        assert_eq!(EventFeatures::new(-1.0, 20.0).energy_log10(), None);
        assert_eq!(EventFeatures::new(f64::NAN, 20.0).energy_log10(), None);
    }

    #[test]
    fn parses_minimal_json() {
        let event: EventFeatures =
            serde_json::from_str(r#"{"energy_tev": 1.5, "zenith_deg": 20.0}"#).unwrap();
        assert!(event.values.is_empty());
        assert_eq!(event.event_id, None);
    }
}
