use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};

use htoss::{
    analysis,
    config::Config,
    opt::{init_logging, PlotterOpt},
    quick_plotter::{QuickPlotter, DEFAULT_SCALAR_MASS},
};

/// Muon selection, trigger turn-on, and vertex diagnostics
#[derive(Debug, Parser)]
#[command(version, about)]
struct Opt {
    #[command(flatten)]
    common: PlotterOpt,

    /// Scalar mass hypothesis for the dimuon candidate
    #[arg(short, long, default_value_t = DEFAULT_SCALAR_MASS)]
    scalar_mass: f64,

    /// Take the only two loose muons instead of the pair closest in mass
    #[arg(short, long)]
    exactly_two: bool,
}

fn main() -> Result<()> {
    let start = Instant::now();
    let opt = Opt::parse();
    init_logging(&opt.common.loglevel);
    debug!("settings: {opt:#?}");

    let common = &opt.common;
    let config = Config::from_file(&common.config)
        .with_context(|| format!("Failed to load configuration {:?}", common.config))?;

    let mut plotter = QuickPlotter::new(common.era, opt.scalar_mass, opt.exactly_two);
    let summary = analysis::run(&config, &common.run_options(), &mut plotter)?;
    info!("Processed {} events", summary.total_events());

    plotter
        .into_histograms()?
        .write_json(&common.outfile)
        .with_context(|| format!("Failed to write histograms to {:?}", common.outfile))?;
    info!("Wrote histograms to {:?}", common.outfile);
    info!("Finished in {:.2?}", start.elapsed());
    Ok(())
}
