use std::path::Path;

use crate::pipeline::stage4_histograms::Stage4Output;
use crate::rootio::{RootError, RootFile, RootWriter};

/// Replaces `path` with a file holding exactly `sig` and `bkg`.
pub fn run_stage5(histograms: &Stage4Output, path: &Path) -> Result<(), RootError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let mut writer = RootWriter::new(&file_name);
    writer.write_histogram(&histograms.sig)?;
    writer.write_histogram(&histograms.bkg)?;
    writer.write_to(path)?;
    verify_written(histograms, path)?;
    tracing::info!("Output: {}", path.display());
    Ok(())
}

/// Reopens the output and checks both histograms came back with their
/// entry counts.
fn verify_written(histograms: &Stage4Output, path: &Path) -> Result<(), RootError> {
    let file = RootFile::open(path)?;
    tracing::debug!("{} holds {} keys", path.display(), file.keys().len());
    for expected in [&histograms.sig, &histograms.bkg] {
        let found = file.get_th1f(&expected.name)?;
        if found.entries != expected.entries || found.n_bins != expected.n_bins {
            return Err(RootError::Deserialization(format!(
                "histogram '{}' reads back with {} entries in {} bins, wrote {} in {}",
                expected.name, found.entries, found.n_bins, expected.entries, expected.n_bins
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage5_write.rs"]
mod tests;
