use crate::histogram::Histogram1D;
use crate::pipeline::stage3_predict::Stage3Output;

pub const N_BINS: usize = 50;
pub const SCORE_MIN: f64 = 0.0;
pub const SCORE_MAX: f64 = 1.0;

#[derive(Debug, Clone)]
pub struct Stage4Output {
    pub sig: Histogram1D,
    pub bkg: Histogram1D,
}

pub fn run_stage4(scores: &Stage3Output) -> Stage4Output {
    let mut sig = Histogram1D::new("sig", "", N_BINS, SCORE_MIN, SCORE_MAX);
    let mut bkg = Histogram1D::new("bkg", "", N_BINS, SCORE_MIN, SCORE_MAX);
    sig.fill_all(scores.sig_scores.iter().copied());
    bkg.fill_all(scores.bkg_scores.iter().copied());
    tracing::debug!(
        "sig: {} entries, mean {:.4} +- {:.4}, {} outside [0, 1]",
        sig.entries,
        sig.mean(),
        sig.std_dev(),
        sig.underflow() + sig.overflow()
    );
    tracing::debug!(
        "bkg: {} entries, mean {:.4} +- {:.4}, {} outside [0, 1]",
        bkg.entries,
        bkg.mean(),
        bkg.std_dev(),
        bkg.underflow() + bkg.overflow()
    );
    Stage4Output { sig, bkg }
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage4_histograms.rs"]
mod tests;
