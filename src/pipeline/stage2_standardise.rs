use crate::config::RunConfig;
use crate::input::Samples;
use crate::model::{ModelError, Scaler, Transformer};

/// Applies the fitted scaler to both matrices. With standardisation off the
/// samples are left untouched.
pub fn run_stage2(samples: &mut Samples, config: &RunConfig) -> Result<(), ModelError> {
    let mode = config.standardise;
    if !mode.is_enabled() {
        tracing::debug!("standardisation disabled");
        return Ok(());
    }

    tracing::info!("Standardising dataset features with the {mode}Scaler");
    let scaler = Scaler::load(&config.scaler_path())?;
    if scaler.mode() != mode {
        tracing::warn!(
            "{} holds a {}Scaler but {mode} was requested; applying the stored scaler",
            config.scaler_path().display(),
            scaler.mode()
        );
    }
    scaler.transform(&mut samples.background)?;
    scaler.transform(&mut samples.signal)?;
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage2_standardise.rs"]
mod tests;
