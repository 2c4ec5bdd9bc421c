use std::path::PathBuf;

use thiserror::Error;

use crate::config::{ConfigError, RunConfig};
use crate::input::InputError;
use crate::model::ModelError;
use crate::rootio::RootError;

pub mod stage1_load;
pub mod stage2_standardise;
pub mod stage3_predict;
pub mod stage4_histograms;
pub mod stage5_write;

use stage1_load::run_stage1;
use stage2_standardise::run_stage2;
use stage3_predict::run_stage3;
use stage4_histograms::run_stage4;
use stage5_write::run_stage5;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("writing output: {0}")]
    Output(#[from] RootError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSummary {
    pub n_events: usize,
    pub output: PathBuf,
    pub sig_entries: f64,
    pub bkg_entries: f64,
}

/// Load, optionally standardise, score, histogram, write. Nothing touches
/// the output path unless every earlier stage succeeded.
pub fn run_pipeline(config: &RunConfig) -> Result<PipelineSummary, PipelineError> {
    let mut samples = run_stage1(config)?;
    run_stage2(&mut samples, config)?;
    let scores = run_stage3(&samples, config)?;
    let histograms = run_stage4(&scores);
    run_stage5(&histograms, &config.output)?;

    Ok(PipelineSummary {
        n_events: samples.n_events,
        output: config.output.clone(),
        sig_entries: histograms.sig.entries,
        bkg_entries: histograms.bkg.entries,
    })
}
