//! Classifier capability.
//!
//! Each bin owns a trained discriminant behind the [`Classifier`] trait; a
//! higher score means the event looks more like signal. Built-in variants are
//! selected through the tagged [`ClassifierModel`] enum read from training
//! artifacts, and external models plug in by implementing the trait.

mod net;
mod tree;

pub use net::{DenseLayer, NeuralNet};
pub use tree::{DecisionTree, TreeEnsemble, TreeNode};

use crate::features::EventFeatures;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClassifierError {
    #[error("missing feature '{0}'")]
    MissingFeature(String),

    #[error("classifier produced a non-finite score")]
    NonFiniteScore,

    #[error("invalid model: {0}")]
    InvalidModel(String),
}

/// Scoring capability shared by every classifier variant.
///
/// Implementations must be stateless across calls so a catalog can be shared
/// between threads.
pub trait Classifier: Send + Sync + std::fmt::Debug {
    fn score(&self, features: &EventFeatures) -> Result<f64, ClassifierError>;

    /// Short variant name for logs.
    fn kind(&self) -> &'static str {
        "external"
    }
}

pub(crate) fn feature(features: &EventFeatures, name: &str) -> Result<f64, ClassifierError> {
    features
        .get(name)
        .ok_or_else(|| ClassifierError::MissingFeature(name.to_string()))
}

/// Inclusive window on one feature; an unset edge is open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FeatureWindow {
    pub feature: String,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl FeatureWindow {
    fn passes(&self, value: f64) -> bool {
        self.min.map_or(true, |m| value >= m) && self.max.map_or(true, |m| value <= m)
    }
}

/// Built-in classifier variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifierModel {
    /// Rectangular cuts: 1 when every window passes, else 0.
    BoxCuts { windows: Vec<FeatureWindow> },
    /// Boosted decision trees.
    TreeEnsemble(TreeEnsemble),
    /// Weighted sum of features plus bias.
    Linear {
        weights: BTreeMap<String, f64>,
        #[serde(default)]
        bias: f64,
    },
    /// Dense feed-forward network.
    NeuralNet(NeuralNet),
}

impl ClassifierModel {
    /// Check the model's internal consistency.
    pub fn validate(&self) -> Result<(), ClassifierError> {
        match self {
            ClassifierModel::BoxCuts { windows } => {
                for w in windows {
                    if let (Some(lo), Some(hi)) = (w.min, w.max) {
                        if lo > hi {
                            return Err(ClassifierError::InvalidModel(format!(
                                "window on '{}' has min {} above max {}",
                                w.feature, lo, hi
                            )));
                        }
                    }
                }
                Ok(())
            }
            ClassifierModel::TreeEnsemble(ensemble) => ensemble.validate(),
            ClassifierModel::Linear { weights, bias } => {
                if !bias.is_finite() || weights.values().any(|w| !w.is_finite()) {
                    return Err(ClassifierError::InvalidModel(
                        "linear weights must be finite".to_string(),
                    ));
                }
                Ok(())
            }
            ClassifierModel::NeuralNet(net) => net.validate(),
        }
    }
}

impl Classifier for ClassifierModel {
    fn score(&self, features: &EventFeatures) -> Result<f64, ClassifierError> {
        let score = match self {
            ClassifierModel::BoxCuts { windows } => {
                let mut pass = true;
                for w in windows {
                    if !w.passes(feature(features, &w.feature)?) {
                        pass = false;
                        break;
                    }
                }
                if pass {
                    1.0
                } else {
                    0.0
                }
            }
            ClassifierModel::TreeEnsemble(ensemble) => ensemble.score(features)?,
            ClassifierModel::Linear { weights, bias } => {
                let mut sum = *bias;
                for (name, w) in weights {
                    sum += w * feature(features, name)?;
                }
                sum
            }
            ClassifierModel::NeuralNet(net) => net.score(features)?,
        };
        if !score.is_finite() {
            return Err(ClassifierError::NonFiniteScore);
        }
        Ok(score)
    }

    fn kind(&self) -> &'static str {
        match self {
            ClassifierModel::BoxCuts { .. } => "box_cuts",
            ClassifierModel::TreeEnsemble(_) => "tree_ensemble",
            ClassifierModel::Linear { .. } => "linear",
            ClassifierModel::NeuralNet(_) => "neural_net",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> EventFeatures {
        EventFeatures::new(1.0, 20.0)
            .with_value("width", 0.2)
            .with_value("length", 0.5)
    }

    #[test]
    fn box_cuts_score_zero_or_one() {
        let model: ClassifierModel = serde_json::from_str(
            r#"{"kind": "box_cuts", "windows": [
                {"feature": "width", "max": 0.3},
                {"feature": "length", "min": 0.1, "max": 0.6}
            ]}"#,
        )
        .unwrap();
        assert_eq!(model.score(&event()).unwrap(), 1.0);
        let wide = event().with_value("width", 0.4);
        assert_eq!(model.score(&wide).unwrap(), 0.0);
        assert_eq!(model.kind(), "box_cuts");
    }

    #[test]
    fn linear_uses_builtin_features() {
        let model: ClassifierModel = serde_json::from_str(
            r#"{"kind": "linear", "weights": {"width": -2.0, "log10_energy": 1.0}, "bias": 0.5}"#,
        )
        .unwrap();
        // log10(1 TeV) = 0
        assert!((model.score(&event()).unwrap() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn missing_feature_is_an_error() {
        let model = ClassifierModel::Linear {
            weights: BTreeMap::from([("dist".to_string(), 1.0)]),
            bias: 0.0,
        };
        assert_eq!(
            model.score(&event()),
            Err(ClassifierError::MissingFeature("dist".to_string()))
        );
    }

    #[test]
    fn inverted_window_fails_validation() {
        let model = ClassifierModel::BoxCuts {
            windows: vec![FeatureWindow {
                feature: "width".to_string(),
                min: Some(1.0),
                max: Some(0.0),
            }],
        };
        assert!(model.validate().is_err());
    }
}
