//! Fitted sklearn scalers exported as JSON, e.g.
//! `{"kind": "robust", "center": [...], "scale": [...]}`.
//!
//! The `scaler.save` joblib pickle a training run leaves behind cannot be
//! read here; it has to be exported first and passed with `--scaler-file`.

use std::path::Path;

use ndarray::{Array1, Array2};
use serde::Deserialize;

use crate::config::StandardiseMode;
use crate::model::{ModelError, Transformer, load_json};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scaler {
    /// `(x - mean) / scale`
    Standard {
        #[serde(default)]
        mean: Option<Vec<f32>>,
        #[serde(default)]
        scale: Option<Vec<f32>>,
    },
    /// `(x - center) / scale`
    Robust {
        #[serde(default)]
        center: Option<Vec<f32>>,
        #[serde(default)]
        scale: Option<Vec<f32>>,
    },
    /// `x * scale + min`
    MinMax { min: Vec<f32>, scale: Vec<f32> },
    /// `x / scale`
    MaxAbs { scale: Vec<f32> },
}

/// Name joblib gives the fitted scaler next to the model.
pub const JOBLIB_SCALER: &str = "scaler.save";

const JOBLIB_HINT: &str = "joblib pickles cannot be read; export the fitted scaler to JSON \
                           and pass it with --scaler-file";

impl Scaler {
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let is_pickle = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| matches!(ext, "save" | "pkl" | "joblib"));
        if is_pickle {
            return Err(ModelError::UnsupportedFormat {
                path: path.to_path_buf(),
                hint: JOBLIB_HINT,
            });
        }
        let scaler: Scaler = match load_json(path) {
            Err(ModelError::MissingFile(missing)) => {
                let pickle = missing.with_file_name(JOBLIB_SCALER);
                return Err(if pickle.exists() {
                    ModelError::UnsupportedFormat {
                        path: pickle,
                        hint: JOBLIB_HINT,
                    }
                } else {
                    ModelError::MissingFile(missing)
                });
            }
            other => other?,
        };
        scaler.n_features()?;
        Ok(scaler)
    }

    pub fn mode(&self) -> StandardiseMode {
        match self {
            Scaler::Standard { .. } => StandardiseMode::Standard,
            Scaler::Robust { .. } => StandardiseMode::Robust,
            Scaler::MinMax { .. } => StandardiseMode::MinMax,
            Scaler::MaxAbs { .. } => StandardiseMode::MaxAbs,
        }
    }

    fn parameters(&self) -> Vec<&[f32]> {
        match self {
            Scaler::Standard { mean, scale } => [mean, scale]
                .into_iter()
                .flatten()
                .map(Vec::as_slice)
                .collect(),
            Scaler::Robust { center, scale } => [center, scale]
                .into_iter()
                .flatten()
                .map(Vec::as_slice)
                .collect(),
            Scaler::MinMax { min, scale } => vec![min.as_slice(), scale.as_slice()],
            Scaler::MaxAbs { scale } => vec![scale.as_slice()],
        }
    }

    /// Width the scaler was fitted on, `None` when it carries no
    /// per-feature parameters at all.
    pub fn n_features(&self) -> Result<Option<usize>, ModelError> {
        let params = self.parameters();
        let Some(first) = params.first() else {
            return Ok(None);
        };
        if params.iter().any(|p| p.len() != first.len()) {
            return Err(ModelError::Shape(format!(
                "{} scaler parameters have differing lengths",
                self.mode()
            )));
        }
        Ok(Some(first.len()))
    }
}

/// sklearn replaces zero scales with 1 before dividing.
fn divisor(scale: &[f32]) -> Array1<f32> {
    scale
        .iter()
        .map(|&s| if s == 0.0 { 1.0 } else { s })
        .collect()
}

impl Transformer for Scaler {
    fn transform(&self, x: &mut Array2<f32>) -> Result<(), ModelError> {
        if let Some(n) = self.n_features()?
            && n != x.ncols()
        {
            return Err(ModelError::Shape(format!(
                "{} scaler was fitted on {n} features, input has {}",
                self.mode(),
                x.ncols()
            )));
        }

        match self {
            Scaler::Standard {
                mean: center,
                scale,
            }
            | Scaler::Robust { center, scale } => {
                if let Some(center) = center {
                    *x -= &Array1::from(center.clone());
                }
                if let Some(scale) = scale {
                    *x /= &divisor(scale);
                }
            }
            Scaler::MinMax { min, scale } => {
                *x *= &Array1::from(scale.clone());
                *x += &Array1::from(min.clone());
            }
            Scaler::MaxAbs { scale } => {
                *x /= &divisor(scale);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/model/scaler.rs"]
mod tests;
