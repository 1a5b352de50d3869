use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};

use htoss::{
    analysis,
    config::Config,
    gen_plotter::GenPlotter,
    opt::{init_logging, PlotterOpt},
};

/// Generator-level scalar decay products and their reconstruction
#[derive(Debug, Parser)]
#[command(version, about)]
struct Opt {
    #[command(flatten)]
    common: PlotterOpt,
}

fn main() -> Result<()> {
    let start = Instant::now();
    let Opt { common } = Opt::parse();
    init_logging(&common.loglevel);
    debug!("settings: {common:#?}");

    let config = Config::from_file(&common.config)
        .with_context(|| format!("Failed to load configuration {:?}", common.config))?;

    let mut plotter = GenPlotter::new(common.era);
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
