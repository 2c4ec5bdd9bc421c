use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use ndarray::{Array1, Array2, ArrayView2};
use serde::de::DeserializeOwned;
use thiserror::Error;

pub mod activation;
pub mod keras;
#[cfg(feature = "hdf5")]
mod keras_h5;
pub mod network;
pub mod scaler;

pub use network::Network;
pub use scaler::Scaler;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("{} not found", .0.display())]
    MissingFile(PathBuf),
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("malformed {}: {message}", .path.display())]
    Format { path: PathBuf, message: String },
    #[error("{}: {hint}", .path.display())]
    UnsupportedFormat { path: PathBuf, hint: &'static str },
    #[error("shape mismatch: {0}")]
    Shape(String),
}

/// In-place rescaling of a feature matrix; the shape never changes.
pub trait Transformer {
    fn transform(&self, x: &mut Array2<f32>) -> Result<(), ModelError>;
}

/// One score per input row.
pub trait Classifier {
    fn predict(&self, x: ArrayView2<'_, f32>) -> Result<Array1<f32>, ModelError>;
}

pub(crate) fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, ModelError> {
    let text = fs::read_to_string(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => ModelError::MissingFile(path.to_path_buf()),
        _ => ModelError::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;
    serde_json::from_str(&text).map_err(|source| ModelError::Json {
        path: path.to_path_buf(),
        source,
    })
}
