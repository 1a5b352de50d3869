use std::{path::PathBuf, time::Instant};

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};

use htoss::{
    analysis::{self, RunOptions, SkimInput},
    config::Config,
    efficiency::DEFAULT_LEVEL,
    opt::init_logging,
    pileup::PileupReweighting,
    scale_factors::{write_report, SkimOutput, TriggerScaleFactors},
    trigger::Era,
};

/// Measure dilepton trigger efficiencies and scale factors
#[derive(Debug, Parser)]
#[command(version, about)]
struct Opt {
    /// YAML configuration listing the datasets
    #[arg(short, long)]
    config: PathBuf,

    /// Maximum number of events per dataset
    #[arg(short, long)]
    n_events: Option<u64>,

    /// Output folder for the efficiencies
    #[arg(short, long, default_value = "plots/scaleFactors")]
    out_folder: PathBuf,

    /// Postfix for the output folder and the skims
    #[arg(short = 's', long, default_value = "default")]
    postfix: String,

    /// Maximum number of input files per dataset
    #[arg(short = 'f', long)]
    n_files: Option<usize>,

    /// Data-taking period
    #[arg(long, value_enum, default_value_t = Era::Y2015)]
    era: Era,

    /// Write skims of the events passing the dilepton selection,
    /// replacing earlier skims with the same postfix
    #[arg(short = 'g', long, conflicts_with = "use_skims")]
    make_skims: bool,

    /// Read previously written skims instead of the full inputs
    #[arg(short = 'u', long)]
    use_skims: bool,

    /// Directory with the skim files
    #[arg(long, default_value = "skims")]
    skim_dir: PathBuf,

    /// Integrated luminosity in pb⁻¹, if not given in the configuration
    #[arg(short, long, default_value_t = 41528.0)]
    lumi: f64,

    /// Confidence level of the Clopper-Pearson intervals
    #[arg(long, default_value_t = DEFAULT_LEVEL)]
    level: f64,

    /// Verbosity level
    ///
    /// Possible settings are 'error', 'warn', 'info', 'debug', 'trace'.
    /// The HTOSS_LOG environment variable takes precedence.
    #[arg(long, default_value = "info")]
    loglevel: String,
}

fn main() -> Result<()> {
    let start = Instant::now();
    let opt = Opt::parse();
    init_logging(&opt.loglevel);
    debug!("settings: {opt:#?}");

    let config = Config::from_file(&opt.config)
        .with_context(|| format!("Failed to load configuration {:?}", opt.config))?;
    let pileup = config
        .pileup
        .as_ref()
        .map(PileupReweighting::from_files)
        .transpose()
        .with_context(|| "Failed to read pileup profiles")?;
    if pileup.is_none() {
        info!("No pileup profiles configured, MC events are not reweighted");
    }

    let skims = opt.make_skims.then(|| SkimOutput {
        dir: opt.skim_dir.clone(),
        postfix: opt.postfix.clone(),
    });
    let run_opt = RunOptions {
        luminosity: opt.lumi,
        n_events: opt.n_events,
        n_files: opt.n_files,
        skims: opt.use_skims.then(|| SkimInput {
            dir: opt.skim_dir.clone(),
            postfix: opt.postfix.clone(),
        }),
    };

    let mut sf = TriggerScaleFactors::new(opt.era, pileup, skims);
    let summary = analysis::run(&config, &run_opt, &mut sf)?;
    info!("Processed {} events", summary.total_events());

    let report = sf.report(opt.level)?;
    let dir = write_report(&report, &opt.out_folder, &opt.postfix)
        .with_context(|| format!("Failed to write scale factors to {:?}", opt.out_folder))?;
    debug!("Output in {dir:?}");
    info!("Finished in {:.2?}", start.elapsed());
    Ok(())
}
