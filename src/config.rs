use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::Parser;
use serde_json::Value;
use thiserror::Error;

pub const DEFAULT_INPUT: &str = "histograms-TT_19var.root";
pub const DEFAULT_OUTPUT: &str = "ResTopDNN.root";
pub const DEFAULT_MODEL_FILE: &str = "weights.h5";
pub const DEFAULT_SCALER_FILE: &str = "scaler.json";
pub const CONFIG_FILE: &str = "config.json";
pub const STANDARDISE_KEY: &str = "standardised datasets";

#[derive(Debug, Parser)]
#[command(
    name = "restop-dnn",
    version,
    about = "Score signal and background TTrees with a trained resolved-top DNN and write the score histograms."
)]
pub struct Cli {
    /// Input ROOT file containing the signal and background TTrees.
    #[arg(long, default_value = DEFAULT_INPUT)]
    pub filename: PathBuf,

    /// Rescale the inputs with a fitted scaler: None, Standard, Robust, MinMax, MaxAbs.
    #[arg(long, default_value = "None")]
    pub standardise: String,

    /// Debug logging and per-batch progress of the forward pass.
    #[arg(short, long)]
    pub verbose: bool,

    /// Number of entries per class to score.
    #[arg(long)]
    pub entries: Option<u64>,

    /// Directory holding the exported model, the scaler and config.json.
    #[arg(long)]
    pub dir: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    #[arg(long, default_value = "treeS")]
    pub sig_tree: String,

    #[arg(long, default_value = "treeB")]
    pub bkg_tree: String,

    /// Model file inside --dir: the Keras HDF5 save or its JSON export.
    #[arg(long, default_value = DEFAULT_MODEL_FILE)]
    pub model_file: String,

    /// JSON export of the fitted scaler inside --dir.
    #[arg(long, default_value = DEFAULT_SCALER_FILE)]
    pub scaler_file: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "no directory was defined where the model training file is located; please define one with the --dir option"
    )]
    MissingDir,
    #[error("unknown standardisation mode '{0}' (expected None, Standard, Robust, MinMax or MaxAbs)")]
    UnknownMode(String),
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
    #[error("{}: '{key}' must be a string", .path.display())]
    InvalidValue { path: PathBuf, key: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardiseMode {
    None,
    Standard,
    Robust,
    MinMax,
    MaxAbs,
}

impl StandardiseMode {
    pub fn is_enabled(self) -> bool {
        self != StandardiseMode::None
    }
}

impl FromStr for StandardiseMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(StandardiseMode::None),
            "standard" => Ok(StandardiseMode::Standard),
            "robust" => Ok(StandardiseMode::Robust),
            "minmax" => Ok(StandardiseMode::MinMax),
            "maxabs" => Ok(StandardiseMode::MaxAbs),
            _ => Err(ConfigError::UnknownMode(s.to_string())),
        }
    }
}

impl fmt::Display for StandardiseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StandardiseMode::None => "None",
            StandardiseMode::Standard => "Standard",
            StandardiseMode::Robust => "Robust",
            StandardiseMode::MinMax => "MinMax",
            StandardiseMode::MaxAbs => "MaxAbs",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub model_dir: PathBuf,
    pub sig_tree: String,
    pub bkg_tree: String,
    pub entries: Option<u64>,
    pub standardise: StandardiseMode,
    pub verbose: bool,
    pub model_file: String,
    pub scaler_file: String,
}

impl RunConfig {
    /// Resolves the CLI against `config.json` in the model directory. The
    /// directory check runs first so a missing `--dir` never touches disk.
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let model_dir = cli.dir.ok_or(ConfigError::MissingDir)?;
        let mut standardise = cli.standardise.parse::<StandardiseMode>()?;
        if let Some(mode) = read_standardise_override(&model_dir)? {
            if mode != standardise {
                tracing::info!("{CONFIG_FILE} overrides --standardise with {mode}");
            }
            standardise = mode;
        }

        Ok(Self {
            input: cli.filename,
            output: cli.output,
            model_dir,
            sig_tree: cli.sig_tree,
            bkg_tree: cli.bkg_tree,
            entries: cli.entries,
            standardise,
            verbose: cli.verbose,
            model_file: cli.model_file,
            scaler_file: cli.scaler_file,
        })
    }

    pub fn model_path(&self) -> PathBuf {
        self.model_dir.join(&self.model_file)
    }

    pub fn scaler_path(&self) -> PathBuf {
        self.model_dir.join(&self.scaler_file)
    }
}

/// A non-"None" mode stored under `"standardised datasets"` wins over the
/// command line; anything else leaves it alone.
fn read_standardise_override(dir: &Path) -> Result<Option<StandardiseMode>, ConfigError> {
    let path = dir.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    let value: Value = serde_json::from_str(&text).map_err(|source| ConfigError::Json {
        path: path.clone(),
        source,
    })?;

    if let Value::Object(map) = &value {
        for key in map.keys().filter(|k| k.as_str() != STANDARDISE_KEY) {
            tracing::debug!("ignoring {CONFIG_FILE} key '{key}'");
        }
    }
    match value.get(STANDARDISE_KEY) {
        None => Ok(None),
        Some(Value::String(s)) => {
            let mode = s.parse::<StandardiseMode>()?;
            Ok(mode.is_enabled().then_some(mode))
        }
        Some(_) => Err(ConfigError::InvalidValue {
            path,
            key: STANDARDISE_KEY,
        }),
    }
}

#[cfg(test)]
#[path = "../tests/src_inline/config.rs"]
mod tests;
