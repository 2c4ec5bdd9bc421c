use ndarray::Array1;

use crate::config::RunConfig;
use crate::input::Samples;
use crate::model::{Classifier, ModelError, Network};

#[derive(Debug, Clone)]
pub struct Stage3Output {
    pub sig_scores: Array1<f32>,
    pub bkg_scores: Array1<f32>,
}

pub fn run_stage3(samples: &Samples, config: &RunConfig) -> Result<Stage3Output, ModelError> {
    let model_path = config.model_path();
    tracing::info!("Loading model {}", model_path.display());
    let network = Network::load(&model_path)?.with_progress(config.verbose);
    tracing::debug!("model takes {} inputs", network.input_dim());

    tracing::info!("Get the DNN score");
    let bkg_scores = network.predict(samples.background.view())?;
    let sig_scores = network.predict(samples.signal.view())?;

    for (label, scores) in [("signal", &sig_scores), ("background", &bkg_scores)] {
        let outside = count_outside_unit(scores);
        if outside > 0 {
            tracing::warn!(
                "{outside} of {} {label} scores fall outside [0, 1] and land in the under/overflow bins",
                scores.len()
            );
        }
    }

    Ok(Stage3Output {
        sig_scores,
        bkg_scores,
    })
}

/// NaN counts as outside.
pub fn count_outside_unit(scores: &Array1<f32>) -> usize {
    scores
        .iter()
        .filter(|s| !(0.0..=1.0).contains(*s))
        .count()
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage3_predict.rs"]
mod tests;
