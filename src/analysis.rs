use std::path::PathBuf;

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};

use crate::{
    config::{Config, Dataset},
    error::Result,
    event::AnalysisEvent,
    reader::{count_all_events, EventReader},
    skim::skim_files,
};

/// Per-event analysis step
pub trait EventAnalysis {
    /// Prepare for the events of a new dataset
    fn begin_dataset(&mut self, _dataset: &DatasetInfo<'_>) -> Result<()> {
        Ok(())
    }

    fn process(&mut self, event: &AnalysisEvent, dataset: &DatasetInfo<'_>) -> Result<()>;

    fn end_dataset(&mut self, _dataset: &DatasetInfo<'_>) -> Result<()> {
        Ok(())
    }
}

/// The dataset currently processed
#[derive(Copy, Clone, Debug)]
pub struct DatasetInfo<'a> {
    pub dataset: &'a Dataset,
    /// Normalisation to the integrated luminosity
    pub weight: f64,
}

impl DatasetInfo<'_> {
    pub fn name(&self) -> &str {
        &self.dataset.name
    }

    pub fn is_mc(&self) -> bool {
        self.dataset.is_mc
    }
}

/// Previously written skims to read instead of the full inputs
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkimInput {
    pub dir: PathBuf,
    pub postfix: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunOptions {
    /// Integrated luminosity used if the configuration gives none
    pub luminosity: f64,
    /// Maximum number of events per dataset
    pub n_events: Option<u64>,
    /// Maximum number of input files per dataset
    pub n_files: Option<usize>,
    pub skims: Option<SkimInput>,
}

/// Numbers of processed events per dataset
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunSummary {
    pub luminosity: f64,
    pub processed: Vec<(String, u64)>,
}

impl RunSummary {
    pub fn total_events(&self) -> u64 {
        self.processed.iter().map(|(_, n)| n).sum()
    }
}

/// Run an analysis over all datasets of a configuration
pub fn run<A: EventAnalysis>(
    config: &Config,
    opt: &RunOptions,
    analysis: &mut A,
) -> Result<RunSummary> {
    let luminosity = config.luminosity_or(opt.luminosity);
    info!("Using lumi: {luminosity}");
    let mut summary = RunSummary {
        luminosity,
        processed: Vec::new(),
    };
    for dataset in &config.datasets {
        let files = match &opt.skims {
            Some(skims) => skim_files(&skims.dir, &dataset.name, &skims.postfix),
            None => dataset.input_files(opt.n_files)?,
        };
        if files.is_empty() {
            warn!("No input files for dataset {}, skipping", dataset.name);
            continue;
        }
        debug!("Input files for {}: {files:?}", dataset.name);

        let available = count_all_events(&files)?;
        let n_events = opt.n_events.map_or(available, |n| n.min(available));
        let info = DatasetInfo {
            dataset,
            weight: dataset.weight(luminosity),
        };
        info!(
            "Processing {}: {n_events} events, dataset weight {}",
            dataset.name, info.weight
        );

        analysis.begin_dataset(&info)?;
        let processed = process_files(&files, n_events, analysis, &info)?;
        analysis.end_dataset(&info)?;
        summary.processed.push((dataset.name.clone(), processed));
    }
    Ok(summary)
}

fn process_files<A: EventAnalysis>(
    files: &[PathBuf],
    n_events: u64,
    analysis: &mut A,
    info: &DatasetInfo<'_>,
) -> Result<u64> {
    let progress = ProgressBar::new(n_events);
    if let Ok(style) =
        ProgressStyle::with_template("[{elapsed_precise}] {bar:40} {pos:>9}/{len:9} {msg}")
    {
        progress.set_style(style);
    }
    progress.set_message(info.name().to_owned());

    let mut processed = 0;
    'files: for file in files {
        for event in EventReader::open(file)? {
            if processed >= n_events {
                break 'files;
            }
            analysis.process(&event?, info)?;
            processed += 1;
            progress.inc(1);
        }
    }
    progress.finish_and_clear();
    Ok(processed)
}
