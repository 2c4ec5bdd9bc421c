//! Feed-forward evaluator for a Keras `Sequential` network. Besides the
//! Keras formats handled in `keras`, a flat JSON export is accepted:
//!
//! ```json
//! {"input_dim": 33, "layers": [
//!   {"type": "dense", "weights": [[...], ...], "bias": [...], "activation": "relu"},
//!   {"type": "dropout", "rate": 0.1},
//!   {"type": "batch_normalization", "gamma": [...], "beta": [...],
//!    "moving_mean": [...], "moving_variance": [...], "epsilon": 0.001},
//!   {"type": "dense", "weights": [[...]], "bias": [0.0], "activation": "sigmoid"}
//! ]}
//! ```

use std::path::Path;

use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::Deserialize;
use serde_json::Value;

use crate::model::activation::Activation;
use crate::model::keras::{KerasJson, is_hdf5, load_h5};
use crate::model::{Classifier, ModelError, load_json};

/// Keras `predict` default.
pub const DEFAULT_BATCH_SIZE: usize = 32;

fn default_epsilon() -> f32 {
    1e-3
}

#[derive(Debug, Deserialize)]
pub struct NetworkSpec {
    #[serde(default)]
    pub input_dim: Option<usize>,
    pub layers: Vec<LayerSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerSpec {
    Dense {
        /// Kernel as `[inputs][units]`.
        weights: Vec<Vec<f32>>,
        bias: Vec<f32>,
        #[serde(default)]
        activation: Activation,
    },
    Activation {
        activation: Activation,
    },
    Dropout {
        #[serde(default)]
        rate: f32,
    },
    BatchNormalization {
        #[serde(default)]
        gamma: Option<Vec<f32>>,
        #[serde(default)]
        beta: Option<Vec<f32>>,
        moving_mean: Vec<f32>,
        moving_variance: Vec<f32>,
        #[serde(default = "default_epsilon")]
        epsilon: f32,
    },
}

#[derive(Debug, Clone)]
enum Layer {
    Dense {
        weights: Array2<f32>,
        bias: Array1<f32>,
        activation: Activation,
    },
    Activation(Activation),
    /// Inference-time batch norm folded into `x * scale + shift`.
    Affine {
        scale: Array1<f32>,
        shift: Array1<f32>,
    },
}

#[derive(Debug, Clone)]
pub struct Network {
    layers: Vec<Layer>,
    input_dim: usize,
    batch_size: usize,
    progress: bool,
}

impl Network {
    /// Reads a Keras HDF5 file or a JSON export, told apart by the file
    /// signature rather than the extension.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let spec = if is_hdf5(path)? {
            load_h5(path)?
        } else {
            let value: Value = load_json(path)?;
            let json_err = |source| ModelError::Json {
                path: path.to_path_buf(),
                source,
            };
            if value.get("model_config").is_some() {
                KerasJson::deserialize(value)
                    .map_err(json_err)?
                    .into_spec(path)?
            } else {
                NetworkSpec::deserialize(value).map_err(json_err)?
            }
        };
        Self::from_spec(spec)
    }

    pub fn from_spec(spec: NetworkSpec) -> Result<Self, ModelError> {
        let mut width = spec.input_dim;
        let mut layers = Vec::with_capacity(spec.layers.len());

        for (idx, layer) in spec.layers.into_iter().enumerate() {
            match layer {
                LayerSpec::Dense {
                    weights,
                    bias,
                    activation,
                } => {
                    let n_in = weights.len();
                    let n_out = bias.len();
                    expect_width(idx, width, n_in)?;
                    if let Some(row) = weights.iter().position(|r| r.len() != n_out) {
                        return Err(ModelError::Shape(format!(
                            "layer {idx}: kernel row {row} has {} units, bias has {n_out}",
                            weights[row].len()
                        )));
                    }
                    let flat: Vec<f32> = weights.into_iter().flatten().collect();
                    let weights = Array2::from_shape_vec((n_in, n_out), flat)
                        .map_err(|e| ModelError::Shape(format!("layer {idx}: {e}")))?;
                    layers.push(Layer::Dense {
                        weights,
                        bias: Array1::from(bias),
                        activation,
                    });
                    width = Some(n_out);
                }
                LayerSpec::Activation { activation } => layers.push(Layer::Activation(activation)),
                LayerSpec::Dropout { rate } => {
                    tracing::debug!("layer {idx}: dropout {rate} is the identity at inference");
                }
                LayerSpec::BatchNormalization {
                    gamma,
                    beta,
                    moving_mean,
                    moving_variance,
                    epsilon,
                } => {
                    let n = moving_mean.len();
                    expect_width(idx, width, n)?;
                    let gamma = gamma.unwrap_or_else(|| vec![1.0; n]);
                    let beta = beta.unwrap_or_else(|| vec![0.0; n]);
                    if moving_variance.len() != n || gamma.len() != n || beta.len() != n {
                        return Err(ModelError::Shape(format!(
                            "layer {idx}: batch normalization parameters differ in length"
                        )));
                    }
                    let scale: Array1<f32> = gamma
                        .iter()
                        .zip(&moving_variance)
                        .map(|(g, v)| g / (v + epsilon).sqrt())
                        .collect();
                    let shift: Array1<f32> = beta
                        .iter()
                        .zip(&moving_mean)
                        .zip(&scale)
                        .map(|((b, m), s)| b - m * s)
                        .collect();
                    layers.push(Layer::Affine { scale, shift });
                    width = Some(n);
                }
            }
        }

        let input_dim = match spec.input_dim {
            Some(dim) => dim,
            None => first_width(&layers).ok_or_else(|| {
                ModelError::Shape("cannot infer the input width of the network".to_string())
            })?,
        };
        if width != Some(1) {
            return Err(ModelError::Shape(format!(
                "network must end in a single output unit, found {}",
                width.map_or_else(|| "none".to_string(), |w| w.to_string())
            )));
        }

        Ok(Self {
            layers,
            input_dim,
            batch_size: DEFAULT_BATCH_SIZE,
            progress: false,
        })
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    /// Log every batch of the forward pass.
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    fn forward(&self, batch: ArrayView2<'_, f32>) -> Array2<f32> {
        let mut a = batch.to_owned();
        for layer in &self.layers {
            match layer {
                Layer::Dense {
                    weights,
                    bias,
                    activation,
                } => {
                    a = a.dot(weights);
                    a += bias;
                    activation.apply(&mut a);
                }
                Layer::Activation(activation) => activation.apply(&mut a),
                Layer::Affine { scale, shift } => {
                    a *= scale;
                    a += shift;
                }
            }
        }
        a
    }
}

fn expect_width(idx: usize, width: Option<usize>, n_in: usize) -> Result<(), ModelError> {
    match width {
        Some(w) if w != n_in => Err(ModelError::Shape(format!(
            "layer {idx} expects {n_in} inputs, previous layer gives {w}"
        ))),
        _ => Ok(()),
    }
}

fn first_width(layers: &[Layer]) -> Option<usize> {
    layers.iter().find_map(|layer| match layer {
        Layer::Dense { weights, .. } => Some(weights.nrows()),
        Layer::Affine { scale, .. } => Some(scale.len()),
        Layer::Activation(_) => None,
    })
}

impl Classifier for Network {
    fn predict(&self, x: ArrayView2<'_, f32>) -> Result<Array1<f32>, ModelError> {
        if x.ncols() != self.input_dim {
            return Err(ModelError::Shape(format!(
                "model expects {} features, input has {}",
                self.input_dim,
                x.ncols()
            )));
        }

        let n_batches = x.nrows().div_ceil(self.batch_size);
        let mut scores = Vec::with_capacity(x.nrows());
        for (i, batch) in x.axis_chunks_iter(Axis(0), self.batch_size).enumerate() {
            let out = self.forward(batch);
            scores.extend(out.column(0).iter().copied());
            if self.progress {
                tracing::debug!("batch {}/{} ({} rows)", i + 1, n_batches, batch.nrows());
            }
        }
        Ok(Array1::from(scores))
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/model/network.rs"]
mod tests;
