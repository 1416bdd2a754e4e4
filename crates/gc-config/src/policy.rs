//! Threshold policy table.
//!
//! A bin's cut is set by exactly one policy. The table holds a global default,
//! optional per-energy-bin entries and explicit per-bin overrides; the most
//! specific non-empty entry wins as a whole, and within that entry the
//! precedence is threshold > signal efficiency > background efficiency >
//! sensitivity optimization.

use serde::{Deserialize, Serialize};

/// The rule that determines a bin's threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ThresholdPolicy {
    /// Use this classifier threshold as-is.
    FixedThreshold(f64),
    /// Loosest threshold whose signal efficiency is at least this value.
    SignalEfficiency(f64),
    /// Loosest threshold whose background efficiency is at least this value.
    BackgroundEfficiency(f64),
    /// Search for the threshold maximizing detection significance.
    OptimizeSensitivity,
}

impl ThresholdPolicy {
    /// Stable short name for logs and audit output.
    pub fn name(&self) -> &'static str {
        match self {
            ThresholdPolicy::FixedThreshold(_) => "fixed_threshold",
            ThresholdPolicy::SignalEfficiency(_) => "signal_efficiency",
            ThresholdPolicy::BackgroundEfficiency(_) => "background_efficiency",
            ThresholdPolicy::OptimizeSensitivity => "optimize_sensitivity",
        }
    }
}

impl std::fmt::Display for ThresholdPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThresholdPolicy::FixedThreshold(v)
            | ThresholdPolicy::SignalEfficiency(v)
            | ThresholdPolicy::BackgroundEfficiency(v) => write!(f, "{}={}", self.name(), v),
            ThresholdPolicy::OptimizeSensitivity => write!(f, "{}", self.name()),
        }
    }
}

/// Explicit cut settings for one table entry. Unset fields fall through.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_efficiency: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_efficiency: Option<f64>,
}

/// The policy chosen for a bin plus any lower-precedence settings it shadowed.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicySelection {
    pub chosen: ThresholdPolicy,
    pub ignored: Vec<ThresholdPolicy>,
}

impl PolicySelection {
    /// True when more than one explicit policy was configured.
    pub fn is_ambiguous(&self) -> bool {
        !self.ignored.is_empty()
    }
}

impl PolicySpec {
    /// True when no explicit setting is present.
    pub fn is_empty(&self) -> bool {
        self.threshold.is_none()
            && self.signal_efficiency.is_none()
            && self.background_efficiency.is_none()
    }

    /// Apply the precedence rule to this entry.
    pub fn select(&self) -> PolicySelection {
        let mut explicit: Vec<ThresholdPolicy> = Vec::with_capacity(3);
        if let Some(t) = self.threshold {
            explicit.push(ThresholdPolicy::FixedThreshold(t));
        }
        if let Some(e) = self.signal_efficiency {
            explicit.push(ThresholdPolicy::SignalEfficiency(e));
        }
        if let Some(e) = self.background_efficiency {
            explicit.push(ThresholdPolicy::BackgroundEfficiency(e));
        }

        if explicit.is_empty() {
            return PolicySelection {
                chosen: ThresholdPolicy::OptimizeSensitivity,
                ignored: Vec::new(),
            };
        }
        let chosen = explicit.remove(0);
        PolicySelection {
            chosen,
            ignored: explicit,
        }
    }
}

/// Override for a single bin, or for every zenith bin of an energy bin when
/// `zenith_index` is absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinPolicyOverride {
    pub energy_index: usize,
    #[serde(default)]
    pub zenith_index: Option<usize>,
    #[serde(flatten)]
    pub spec: PolicySpec,
}

/// Enum-keyed strategy table mapping bins to threshold policies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyTable {
    #[serde(default)]
    pub default: PolicySpec,
    /// One entry per energy index; empty entries fall through to `default`.
    #[serde(default)]
    pub per_energy: Vec<PolicySpec>,
    #[serde(default)]
    pub overrides: Vec<BinPolicyOverride>,
}

impl PolicyTable {
    /// Table that sets the same signal efficiency everywhere.
    pub fn uniform_signal_efficiency(efficiency: f64) -> Self {
        Self {
            default: PolicySpec {
                signal_efficiency: Some(efficiency),
                ..PolicySpec::default()
            },
            ..Self::default()
        }
    }

    /// Table that sets the same threshold everywhere.
    pub fn uniform_threshold(threshold: f64) -> Self {
        Self {
            default: PolicySpec {
                threshold: Some(threshold),
                ..PolicySpec::default()
            },
            ..Self::default()
        }
    }

    /// Most specific non-empty entry for a bin.
    pub fn spec_for(&self, energy_index: usize, zenith_index: usize) -> &PolicySpec {
        let exact = self.overrides.iter().find(|o| {
            o.energy_index == energy_index
                && o.zenith_index == Some(zenith_index)
                && !o.spec.is_empty()
        });
        if let Some(o) = exact {
            return &o.spec;
        }
        let energy_wide = self.overrides.iter().find(|o| {
            o.energy_index == energy_index && o.zenith_index.is_none() && !o.spec.is_empty()
        });
        if let Some(o) = energy_wide {
            return &o.spec;
        }
        match self.per_energy.get(energy_index) {
            Some(spec) if !spec.is_empty() => spec,
            _ => &self.default,
        }
    }

    /// Policy selection for a bin.
    pub fn policy_for(&self, energy_index: usize, zenith_index: usize) -> PolicySelection {
        self.spec_for(energy_index, zenith_index).select()
    }

    /// Iterate over every explicit spec in the table (for validation).
    pub fn all_specs(&self) -> impl Iterator<Item = &PolicySpec> {
        std::iter::once(&self.default)
            .chain(self.per_energy.iter())
            .chain(self.overrides.iter().map(|o| &o.spec))
    }
}
