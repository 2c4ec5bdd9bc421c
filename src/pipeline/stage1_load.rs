use crate::config::RunConfig;
use crate::input::features::FeatureSchema;
use crate::input::{InputError, Samples, load_samples};

pub fn run_stage1(config: &RunConfig) -> Result<Samples, InputError> {
    tracing::info!("Opening ROOT file {}", config.input.display());
    let schema = FeatureSchema::resolved_top();
    let samples = load_samples(
        &config.input,
        &config.sig_tree,
        &config.bkg_tree,
        &schema,
        config.entries,
    )?;
    tracing::info!("Number of events: {}", samples.n_events);
    if samples.n_events == 0 {
        tracing::warn!("no events to score; the histograms will be empty");
    }
    Ok(samples)
}
