//! Boosted decision tree ensembles.

use super::{feature, ClassifierError};
use crate::features::EventFeatures;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One node of a flattened binary tree. Children are indices into the
/// tree's node list; node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum TreeNode {
    Split {
        feature: String,
        cut: f64,
        /// Taken when the feature value is below `cut`.
        below: usize,
        /// Taken otherwise.
        above: usize,
    },
    Leaf {
        /// Usually +1 for signal-like and -1 for background-like leaves.
        value: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DecisionTree {
    /// Boost weight of this tree.
    pub weight: f64,
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    fn evaluate(&self, features: &EventFeatures) -> Result<f64, ClassifierError> {
        let mut index = 0;
        // A valid tree reaches a leaf in fewer steps than it has nodes.
        for _ in 0..self.nodes.len() {
            match self.nodes.get(index) {
                Some(TreeNode::Leaf { value }) => return Ok(*value),
                Some(TreeNode::Split {
                    feature: name,
                    cut,
                    below,
                    above,
                }) => {
                    index = if feature(features, name)? < *cut {
                        *below
                    } else {
                        *above
                    };
                }
                None => break,
            }
        }
        Err(ClassifierError::InvalidModel(
            "tree walk did not reach a leaf".to_string(),
        ))
    }

    fn validate(&self) -> Result<(), ClassifierError> {
        if self.nodes.is_empty() {
            return Err(ClassifierError::InvalidModel("empty tree".to_string()));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    cut, below, above, ..
                } => {
                    if !cut.is_finite() {
                        return Err(ClassifierError::InvalidModel(format!(
                            "node {} has a non-finite cut",
                            i
                        )));
                    }
                    // Children must point forward, which rules out cycles.
                    if *below <= i || *above <= i || *below >= self.nodes.len() || *above >= self.nodes.len()
                    {
                        return Err(ClassifierError::InvalidModel(format!(
                            "node {} has an out-of-order child",
                            i
                        )));
                    }
                }
                TreeNode::Leaf { value } => {
                    if !value.is_finite() {
                        return Err(ClassifierError::InvalidModel(format!(
                            "leaf {} is not finite",
                            i
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Weighted vote of boosted trees, normalized by the summed tree weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TreeEnsemble {
    pub trees: Vec<DecisionTree>,
}

impl TreeEnsemble {
    pub fn score(&self, features: &EventFeatures) -> Result<f64, ClassifierError> {
        let mut vote = 0.0;
        let mut norm = 0.0;
        for tree in &self.trees {
            vote += tree.weight * tree.evaluate(features)?;
            norm += tree.weight;
        }
        if norm <= 0.0 {
            return Err(ClassifierError::InvalidModel(
                "tree weights sum to zero".to_string(),
            ));
        }
        Ok(vote / norm)
    }

    pub fn validate(&self) -> Result<(), ClassifierError> {
        if self.trees.is_empty() {
            return Err(ClassifierError::InvalidModel(
                "ensemble has no trees".to_string(),
            ));
        }
        for tree in &self.trees {
            if !(tree.weight.is_finite() && tree.weight > 0.0) {
                return Err(ClassifierError::InvalidModel(
                    "tree weights must be positive".to_string(),
                ));
            }
            tree.validate()?;
        }
        Ok(())
    }
}
