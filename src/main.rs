mod config;
mod histogram;
mod input;
mod logging;
mod model;
mod pipeline;
mod rootio;

use clap::Parser;

use crate::config::{Cli, RunConfig};
use crate::pipeline::{PipelineError, PipelineSummary, run_pipeline};

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    if let Err(err) = run(cli) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<PipelineSummary, PipelineError> {
    let config = RunConfig::from_cli(cli)?;
    tracing::debug!(?config, "resolved configuration");
    let summary = run_pipeline(&config)?;
    tracing::debug!(
        "scored {} events per class into {} (sig entries {}, bkg entries {})",
        summary.n_events,
        summary.output.display(),
        summary.sig_entries,
        summary.bkg_entries
    );
    Ok(summary)
}

#[cfg(test)]
#[path = "../tests/src_inline/main_inline.rs"]
mod tests;
