//! HDF5 side of the Keras loader.

use std::path::{Path, PathBuf};

use hdf5::types::{FixedAscii, VarLenAscii, VarLenUnicode};

use crate::model::ModelError;
use crate::model::keras::{Tensor, WeightStore};

/// Upper bound for a `model_config` stored as a fixed-length string, which
/// is what h5py writes for a `bytes` attribute.
const MAX_FIXED_CONFIG: usize = 1 << 16;

pub struct H5Store {
    file: hdf5::File,
    path: PathBuf,
}

impl H5Store {
    pub fn open(path: &Path) -> Result<Self, ModelError> {
        let file = hdf5::File::open(path).map_err(|e| h5_error(path, e))?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn model_config(&self) -> Result<String, ModelError> {
        let attr = self
            .file
            .attr("model_config")
            .map_err(|e| h5_error(&self.path, e))?;
        if let Ok(text) = attr.read_scalar::<VarLenUnicode>() {
            return Ok(text.as_str().to_string());
        }
        if let Ok(text) = attr.read_scalar::<VarLenAscii>() {
            return Ok(text.as_str().to_string());
        }
        let text = attr
            .read_scalar::<FixedAscii<MAX_FIXED_CONFIG>>()
            .map_err(|e| h5_error(&self.path, e))?;
        Ok(text.as_str().to_string())
    }
}

impl WeightStore for H5Store {
    fn tensor(&self, layer: &str, weight: &str) -> Result<Option<Tensor>, ModelError> {
        let name = format!("model_weights/{layer}/{layer}/{weight}:0");
        if !self.file.link_exists(&name) {
            return Ok(None);
        }
        let dataset = self.file.dataset(&name).map_err(|e| h5_error(&self.path, e))?;
        let shape = dataset.shape();
        let data = dataset
            .read_raw::<f32>()
            .map_err(|e| h5_error(&self.path, e))?;
        tracing::trace!("{name}: {shape:?}");
        Ok(Some(Tensor { shape, data }))
    }
}

fn h5_error(path: &Path, err: hdf5::Error) -> ModelError {
    ModelError::Format {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}
