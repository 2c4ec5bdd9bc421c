use std::path::{Path, PathBuf};

use ndarray::Array2;
use thiserror::Error;

use crate::rootio::{RootError, RootFile, Tree};

pub mod features;

use features::FeatureSchema;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("{}: {source}", .path.display())]
    Root { path: PathBuf, source: RootError },
    #[error("{}: tree '{tree}' not found", .path.display())]
    MissingTree { path: PathBuf, tree: String },
    #[error("tree '{tree}' lacks branches: {}", .names.join(", "))]
    MissingBranches { tree: String, names: Vec<String> },
    #[error("feature matrix shape: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// Signal and background feature matrices, both `n_events` rows by
/// schema-width columns.
#[derive(Debug, Clone)]
pub struct Samples {
    pub signal: Array2<f32>,
    pub background: Array2<f32>,
    pub n_events: usize,
}

/// Rows used per class: the cap when both trees can supply it, otherwise
/// the smaller tree's row count.
pub fn resolve_event_count(sig_rows: u64, bkg_rows: u64, cap: Option<u64>) -> u64 {
    let available = sig_rows.min(bkg_rows);
    match cap {
        Some(cap) if cap > available => {
            tracing::warn!(
                "--entries {cap} exceeds the available rows (signal {sig_rows}, background {bkg_rows}); using {available}"
            );
            available
        }
        Some(cap) => cap,
        None => available,
    }
}

pub fn load_samples(
    path: &Path,
    sig_tree: &str,
    bkg_tree: &str,
    schema: &FeatureSchema,
    cap: Option<u64>,
) -> Result<Samples, InputError> {
    let root_err = |source| InputError::Root {
        path: path.to_path_buf(),
        source,
    };
    let file = RootFile::open(path).map_err(root_err)?;
    let sig = open_tree(&file, sig_tree)?;
    let bkg = open_tree(&file, bkg_tree)?;

    for tree in [&sig, &bkg] {
        let missing = schema.missing_in(tree);
        if !missing.is_empty() {
            tracing::debug!("{} has branches: {}", tree.name, tree.branch_names().join(", "));
            return Err(InputError::MissingBranches {
                tree: tree.name.clone(),
                names: missing,
            });
        }
    }

    let n_events = resolve_event_count(sig.entries, bkg.entries, cap);
    tracing::debug!(
        "{}: {} rows, {}: {} rows, using {n_events}",
        sig.name,
        sig.entries,
        bkg.name,
        bkg.entries
    );

    let signal = read_matrix(&file, &sig, schema, n_events).map_err(root_err)?;
    let background = read_matrix(&file, &bkg, schema, n_events).map_err(root_err)?;
    Ok(Samples {
        signal: to_array(signal, n_events as usize, schema.len())?,
        background: to_array(background, n_events as usize, schema.len())?,
        n_events: n_events as usize,
    })
}

fn open_tree(file: &RootFile, name: &str) -> Result<Tree, InputError> {
    match file.get_tree(name) {
        Ok(tree) => Ok(tree),
        Err(RootError::KeyNotFound(_)) => Err(InputError::MissingTree {
            path: file.path().to_path_buf(),
            tree: name.to_string(),
        }),
        Err(source) => Err(InputError::Root {
            path: file.path().to_path_buf(),
            source,
        }),
    }
}

/// Row-major values of the schema columns for the first `n_events` entries.
fn read_matrix(
    file: &RootFile,
    tree: &Tree,
    schema: &FeatureSchema,
    n_events: u64,
) -> Result<Vec<f32>, RootError> {
    let n_rows = n_events as usize;
    let n_cols = schema.len();
    let mut data = vec![0f32; n_rows * n_cols];
    for (col, name) in schema.names().iter().enumerate() {
        let branch = tree
            .find_branch(name)
            .ok_or_else(|| RootError::KeyNotFound(format!("{}/{name}", tree.name)))?;
        let values = file.read_branch(branch, n_events)?;
        if values.len() < n_rows {
            return Err(RootError::Deserialization(format!(
                "branch '{}/{name}' holds {} entries, {n_rows} needed",
                tree.name,
                values.len()
            )));
        }
        for (row, v) in values.into_iter().enumerate().take(n_rows) {
            data[row * n_cols + col] = v;
        }
    }
    Ok(data)
}

fn to_array(data: Vec<f32>, rows: usize, cols: usize) -> Result<Array2<f32>, InputError> {
    Ok(Array2::from_shape_vec((rows, cols), data)?)
}

#[cfg(test)]
#[path = "../../tests/src_inline/input/tests.rs"]
mod tests;
