use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};

use htoss::{
    analysis,
    config::Config,
    opt::{init_logging, PlotterOpt},
    reco_plotter::RecoPlotter,
};

/// Scalar candidates from dimuon and charged-hadron pairs
#[derive(Debug, Parser)]
#[command(version, about)]
struct Opt {
    #[command(flatten)]
    common: PlotterOpt,

    /// Only select muons from scalar decays
    #[arg(short, long)]
    mc_truth: bool,
}

fn main() -> Result<()> {
    let start = Instant::now();
    let opt = Opt::parse();
    init_logging(&opt.common.loglevel);
    debug!("settings: {opt:#?}");

    let common = &opt.common;
    let config = Config::from_file(&common.config)
        .with_context(|| format!("Failed to load configuration {:?}", common.config))?;

    let mut plotter = RecoPlotter::new(common.era, opt.mc_truth);
    let summary = analysis::run(&config, &common.run_options(), &mut plotter)?;
    info!("Processed {} events", summary.total_events());

    plotter
        .into_histograms()
        .write_json(&common.outfile)
        .with_context(|| format!("Failed to write histograms to {:?}", common.outfile))?;
    info!("Wrote histograms to {:?}", common.outfile);
    info!("Finished in {:.2?}", start.elapsed());
    Ok(())
}
