use std::path::PathBuf;

use clap::Args;
use env_logger::Env;

use crate::{
    analysis::{RunOptions, SkimInput},
    skim::PLOTTER_SKIM_POSTFIX,
    trigger::Era,
};

/// Environment variable overriding the log level
pub const LOG_ENV: &str = "HTOSS_LOG";

/// Options shared by the plotters
#[derive(Args, Clone, Debug)]
pub struct PlotterOpt {
    /// YAML configuration listing the datasets
    #[arg(short, long)]
    pub config: PathBuf,

    /// Integrated luminosity in pb⁻¹, if not given in the configuration
    #[arg(short, long, default_value_t = 41528.0)]
    pub lumi: f64,

    /// Output file for the histograms
    #[arg(short, long, default_value = "plots/distributions/output.json")]
    pub outfile: PathBuf,

    /// Maximum number of events per dataset
    #[arg(short, long)]
    pub n_events: Option<u64>,

    /// Read the muon skims instead of the full inputs
    #[arg(short = 'u', long)]
    pub use_skims: bool,

    /// Directory with the skim files
    #[arg(long, default_value = "skims")]
    pub skim_dir: PathBuf,

    /// Data-taking period
    #[arg(long, value_enum, default_value_t = Era::Y2017)]
    pub era: Era,

    /// Verbosity level
    ///
    /// Possible settings are 'error', 'warn', 'info', 'debug', 'trace'.
    /// The HTOSS_LOG environment variable takes precedence.
    #[arg(long, default_value = "info")]
    pub loglevel: String,
}

impl PlotterOpt {
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            luminosity: self.lumi,
            n_events: self.n_events,
            n_files: None,
            skims: self.use_skims.then(|| SkimInput {
                dir: self.skim_dir.clone(),
                postfix: PLOTTER_SKIM_POSTFIX.to_owned(),
            }),
        }
    }
}

/// Set up logging from the environment, falling back to `loglevel`
pub fn init_logging(loglevel: &str) {
    let env = Env::default().filter_or(LOG_ENV, loglevel);
    env_logger::init_from_env(env);
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct Opt {
        #[command(flatten)]
        common: PlotterOpt,
    }

    #[test]
    fn defaults() {
        let opt = Opt::parse_from(["plotter", "-c", "config.yaml"]).common;
        assert_eq!(opt.lumi, 41528.0);
        assert_eq!(opt.era, Era::Y2017);
        assert_eq!(opt.outfile, PathBuf::from("plots/distributions/output.json"));
        assert!(opt.run_options().skims.is_none());
    }

    #[test]
    fn skims_and_era() {
        let opt = Opt::parse_from(["plotter", "-c", "c.yaml", "-u", "--era", "2016", "-n", "10"])
            .common;
        assert_eq!(opt.era, Era::Y2016);
        let run = opt.run_options();
        assert_eq!(run.n_events, Some(10));
        assert_eq!(run.skims.unwrap().postfix, "mumu");
    }
}
