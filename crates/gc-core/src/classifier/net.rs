//! Dense feed-forward networks with tanh hidden layers and a linear output.

use super::{feature, ClassifierError};
use crate::features::EventFeatures;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Fully connected layer: `out[j] = biases[j] + sum_i weights[j][i] * in[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DenseLayer {
    pub weights: Vec<Vec<f64>>,
    pub biases: Vec<f64>,
}

impl DenseLayer {
    fn forward(&self, input: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .zip(&self.biases)
            .map(|(row, b)| b + row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>())
            .collect()
    }

    fn inputs(&self) -> usize {
        self.weights.first().map_or(0, Vec::len)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NeuralNet {
    /// Feature names in input order.
    pub inputs: Vec<String>,
    pub layers: Vec<DenseLayer>,
}

impl NeuralNet {
    pub fn score(&self, features: &EventFeatures) -> Result<f64, ClassifierError> {
        let mut activation = self
            .inputs
            .iter()
            .map(|name| feature(features, name))
            .collect::<Result<Vec<f64>, _>>()?;

        let last = self.layers.len().saturating_sub(1);
        for (i, layer) in self.layers.iter().enumerate() {
            activation = layer.forward(&activation);
            if i < last {
                activation.iter_mut().for_each(|a| *a = a.tanh());
            }
        }
        match activation.as_slice() {
            [score] => Ok(*score),
            _ => Err(ClassifierError::InvalidModel(
                "output layer must have one neuron".to_string(),
            )),
        }
    }

    pub fn validate(&self) -> Result<(), ClassifierError> {
        if self.layers.is_empty() {
            return Err(ClassifierError::InvalidModel("network has no layers".to_string()));
        }
        let mut width = self.inputs.len();
        for (i, layer) in self.layers.iter().enumerate() {
            if layer.weights.len() != layer.biases.len() || layer.weights.is_empty() {
                return Err(ClassifierError::InvalidModel(format!(
                    "layer {} has {} weight rows and {} biases",
                    i,
                    layer.weights.len(),
                    layer.biases.len()
                )));
            }
            if layer.inputs() != width || layer.weights.iter().any(|row| row.len() != width) {
                return Err(ClassifierError::InvalidModel(format!(
                    "layer {} expects {} inputs",
                    i, width
                )));
            }
            width = layer.weights.len();
        }
        if width != 1 {
            return Err(ClassifierError::InvalidModel(
                "output layer must have one neuron".to_string(),
            ));
        }
        Ok(())
    }
}
