//! Keras `Sequential` models saved with `model.save("weights.h5")`.
//!
//! The file carries the architecture as a JSON `model_config` attribute and
//! one group per layer under `model_weights`:
//!
//! ```text
//! model_weights/dense_1/dense_1/kernel:0   [inputs, units]
//! model_weights/dense_1/dense_1/bias:0     [units]
//! model_weights/batch_normalization_1/batch_normalization_1/{gamma,beta,moving_mean,moving_variance}:0
//! ```
//!
//! Turning that into a `NetworkSpec` only needs the config text and a way to
//! look tensors up, so the HDF5 access sits behind `WeightStore`. The same
//! layout dumped to JSON is read without HDF5:
//!
//! ```json
//! {"model_config": {"class_name": "Sequential", "config": {...}},
//!  "weights": {"dense_1": {"kernel": [[...], ...], "bias": [...]}, ...}}
//! ```

use std::collections::HashMap;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::model::ModelError;
use crate::model::activation::Activation;
use crate::model::network::{LayerSpec, NetworkSpec};

/// First eight bytes of every HDF5 file.
pub const HDF5_SIGNATURE: [u8; 8] = [0x89, b'H', b'D', b'F', b'\r', b'\n', 0x1a, b'\n'];

/// A dense tensor in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

/// Per-layer weight lookup; `weight` is the Keras name without the `:0`
/// suffix (`kernel`, `bias`, `gamma`, ...).
pub trait WeightStore {
    fn tensor(&self, layer: &str, weight: &str) -> Result<Option<Tensor>, ModelError>;
}

/// True when the file starts with the HDF5 signature.
pub fn is_hdf5(path: &Path) -> Result<bool, ModelError> {
    let mut file = File::open(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => ModelError::MissingFile(path.to_path_buf()),
        _ => ModelError::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;
    let mut head = [0u8; 8];
    match file.read_exact(&mut head) {
        Ok(()) => Ok(head == HDF5_SIGNATURE),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(false),
        Err(source) => Err(ModelError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// `model_config` plus weights, as dumped from the HDF5 file to JSON.
#[derive(Debug, Deserialize)]
pub struct KerasJson {
    /// The attribute text, or the config already parsed as an object.
    model_config: Value,
    #[serde(default)]
    weights: HashMap<String, HashMap<String, Value>>,
}

impl KerasJson {
    pub fn into_spec(self, source: &Path) -> Result<NetworkSpec, ModelError> {
        let config = match &self.model_config {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        network_spec(&config, &self, source)
    }
}

impl WeightStore for KerasJson {
    fn tensor(&self, layer: &str, weight: &str) -> Result<Option<Tensor>, ModelError> {
        let Some(value) = self.weights.get(layer).and_then(|w| w.get(weight)) else {
            return Ok(None);
        };
        tensor_from_value(value).map(Some).ok_or_else(|| {
            ModelError::Shape(format!("{layer}/{weight} is not a rectangular numeric array"))
        })
    }
}

fn tensor_from_value(value: &Value) -> Option<Tensor> {
    match value {
        Value::Number(n) => Some(Tensor {
            shape: Vec::new(),
            data: vec![n.as_f64()? as f32],
        }),
        Value::Array(items) => {
            let parts = items
                .iter()
                .map(tensor_from_value)
                .collect::<Option<Vec<_>>>()?;
            let inner = parts.first().map_or_else(Vec::new, |t| t.shape.clone());
            if parts.iter().any(|t| t.shape != inner) {
                return None;
            }
            let mut shape = vec![parts.len()];
            shape.extend(inner);
            Some(Tensor {
                shape,
                data: parts.into_iter().flat_map(|t| t.data).collect(),
            })
        }
        _ => None,
    }
}

#[cfg(feature = "hdf5")]
pub fn load_h5(path: &Path) -> Result<NetworkSpec, ModelError> {
    let store = crate::model::keras_h5::H5Store::open(path)?;
    let config = store.model_config()?;
    network_spec(&config, &store, path)
}

#[cfg(not(feature = "hdf5"))]
pub fn load_h5(path: &Path) -> Result<NetworkSpec, ModelError> {
    Err(ModelError::UnsupportedFormat {
        path: path.to_path_buf(),
        hint: "reading Keras HDF5 models needs the `hdf5` feature; rebuild with \
               `--features hdf5` or pass a JSON export with --model-file",
    })
}

#[derive(Debug, Deserialize)]
struct ModelConfig {
    class_name: String,
    config: Value,
}

#[derive(Debug, Deserialize)]
struct LayerConfig {
    class_name: String,
    config: Value,
}

#[derive(Debug, Deserialize)]
struct InputConfig {
    #[serde(default)]
    batch_input_shape: Option<Vec<Option<usize>>>,
    /// Keras 3 spelling.
    #[serde(default)]
    batch_shape: Option<Vec<Option<usize>>>,
}

impl InputConfig {
    fn width(&self) -> Option<usize> {
        self.batch_input_shape
            .as_ref()
            .or(self.batch_shape.as_ref())
            .and_then(|shape| shape.last().copied().flatten())
    }
}

fn yes() -> bool {
    true
}

fn default_epsilon() -> f32 {
    1e-3
}

#[derive(Debug, Deserialize)]
struct DenseConfig {
    name: String,
    #[serde(default)]
    activation: Activation,
    #[serde(default = "yes")]
    use_bias: bool,
}

#[derive(Debug, Deserialize)]
struct ActivationConfig {
    activation: Activation,
}

#[derive(Debug, Deserialize)]
struct DropoutConfig {
    #[serde(default)]
    rate: f32,
}

#[derive(Debug, Deserialize)]
struct BatchNormConfig {
    name: String,
    #[serde(default = "default_epsilon")]
    epsilon: f32,
    #[serde(default = "yes")]
    center: bool,
    #[serde(default = "yes")]
    scale: bool,
}

/// Builds the network description from a `model_config` JSON string and the
/// layer weights. `source` only labels errors.
pub fn network_spec(
    model_config: &str,
    weights: &impl WeightStore,
    source: &Path,
) -> Result<NetworkSpec, ModelError> {
    let model: ModelConfig = serde_json::from_str(model_config).map_err(|source_err| {
        format_error(source, format!("model_config is not valid JSON: {source_err}"))
    })?;
    if model.class_name != "Sequential" {
        return Err(format_error(
            source,
            format!("only Sequential models are supported, found {}", model.class_name),
        ));
    }
    // Keras <= 2.1 stores the layer list directly, later versions wrap it.
    let layers_value = match model.config {
        Value::Array(layers) => Value::Array(layers),
        Value::Object(mut map) => map.remove("layers").unwrap_or(Value::Null),
        _ => Value::Null,
    };
    let layers: Vec<LayerConfig> = serde_json::from_value(layers_value)
        .map_err(|e| format_error(source, format!("Sequential config has no layer list: {e}")))?;

    let mut input_dim = None;
    let mut specs = Vec::with_capacity(layers.len());
    for layer in layers {
        if input_dim.is_none() {
            let input: InputConfig = parse_config(&layer, source)?;
            input_dim = input.width();
        }
        match layer.class_name.as_str() {
            "InputLayer" => {}
            "Dense" => {
                let cfg: DenseConfig = parse_config(&layer, source)?;
                let kernel = require(weights, &cfg.name, "kernel", source)?;
                let [n_in, n_out] = matrix_shape(&kernel, &cfg.name, source)?;
                let bias = if cfg.use_bias {
                    require(weights, &cfg.name, "bias", source)?.data
                } else {
                    vec![0.0; n_out]
                };
                let rows = kernel.data.chunks(n_out.max(1)).map(<[f32]>::to_vec).collect();
                tracing::debug!("{}: dense {n_in} -> {n_out}, {:?}", cfg.name, cfg.activation);
                specs.push(LayerSpec::Dense {
                    weights: rows,
                    bias,
                    activation: cfg.activation,
                });
            }
            "Activation" => {
                let cfg: ActivationConfig = parse_config(&layer, source)?;
                specs.push(LayerSpec::Activation {
                    activation: cfg.activation,
                });
            }
            "Dropout" => {
                let cfg: DropoutConfig = parse_config(&layer, source)?;
                specs.push(LayerSpec::Dropout { rate: cfg.rate });
            }
            "BatchNormalization" => {
                let cfg: BatchNormConfig = parse_config(&layer, source)?;
                let gamma = if cfg.scale {
                    Some(require(weights, &cfg.name, "gamma", source)?.data)
                } else {
                    None
                };
                let beta = if cfg.center {
                    Some(require(weights, &cfg.name, "beta", source)?.data)
                } else {
                    None
                };
                specs.push(LayerSpec::BatchNormalization {
                    gamma,
                    beta,
                    moving_mean: require(weights, &cfg.name, "moving_mean", source)?.data,
                    moving_variance: require(weights, &cfg.name, "moving_variance", source)?.data,
                    epsilon: cfg.epsilon,
                });
            }
            other => {
                return Err(format_error(
                    source,
                    format!("unsupported layer class {other}"),
                ));
            }
        }
    }

    Ok(NetworkSpec {
        input_dim,
        layers: specs,
    })
}

fn parse_config<T: DeserializeOwned>(layer: &LayerConfig, source: &Path) -> Result<T, ModelError> {
    T::deserialize(&layer.config)
        .map_err(|e| format_error(source, format!("{} layer config: {e}", layer.class_name)))
}

fn require(
    weights: &impl WeightStore,
    layer: &str,
    weight: &str,
    source: &Path,
) -> Result<Tensor, ModelError> {
    weights
        .tensor(layer, weight)?
        .ok_or_else(|| format_error(source, format!("layer {layer} has no {weight}:0 weights")))
}

fn matrix_shape(tensor: &Tensor, layer: &str, source: &Path) -> Result<[usize; 2], ModelError> {
    match tensor.shape.as_slice() {
        &[rows, cols] if rows * cols == tensor.data.len() => Ok([rows, cols]),
        shape => Err(ModelError::Shape(format!(
            "{}: kernel of {layer} has shape {shape:?} and {} values",
            source.display(),
            tensor.data.len()
        ))),
    }
}

fn format_error(path: &Path, message: String) -> ModelError {
    ModelError::Format {
        path: path.to_path_buf(),
        message,
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/model/keras.rs"]
mod tests;
