use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use log::{debug, info};

use crate::{
    error::{Error, Result},
    event::AnalysisEvent,
};

/// Maximum number of events per skim file
pub const EVENTS_PER_SKIM_FILE: usize = 40000;

/// Postfix of the skims read by the plotters
pub const PLOTTER_SKIM_POSTFIX: &str = "mumu";

/// Path of the `index`th skim file of a dataset
pub fn skim_path(dir: &Path, dataset: &str, postfix: &str, index: usize) -> PathBuf {
    let name = if index == 0 {
        format!("{dataset}{postfix}SmallSkim.jsonl")
    } else {
        format!("{dataset}{postfix}SmallSkim{index}.jsonl")
    };
    dir.join(name)
}

/// Existing skim files of a dataset, in the order they were written
pub fn skim_files(dir: &Path, dataset: &str, postfix: &str) -> Vec<PathBuf> {
    (0..)
        .map(|index| skim_path(dir, dataset, postfix, index))
        .take_while(|path| path.is_file())
        .collect()
}

/// Delete the existing skim files of a dataset
pub fn remove_skims(dir: &Path, dataset: &str, postfix: &str) -> Result<usize> {
    let files = skim_files(dir, dataset, postfix);
    for file in &files {
        fs::remove_file(file).map_err(|err| Error::io(file, err))?;
    }
    Ok(files.len())
}

/// Writes selected events to skim files, rolling over when a file is full
///
/// Earlier skims of the same dataset and postfix are removed on creation.
pub struct SkimWriter {
    dir: PathBuf,
    dataset: String,
    postfix: String,
    events_per_file: usize,
    file_index: usize,
    in_file: usize,
    written: u64,
    out: Option<BufWriter<File>>,
}

impl SkimWriter {
    pub fn new(dir: &Path, dataset: &str, postfix: &str) -> Result<Self> {
        Self::with_events_per_file(dir, dataset, postfix, EVENTS_PER_SKIM_FILE)
    }

    pub fn with_events_per_file(
        dir: &Path,
        dataset: &str,
        postfix: &str,
        events_per_file: usize,
    ) -> Result<Self> {
        let removed = remove_skims(dir, dataset, postfix)?;
        if removed > 0 {
            debug!("Removed {removed} old skim file(s) of {dataset}");
        }
        Ok(Self {
            dir: dir.to_owned(),
            dataset: dataset.to_owned(),
            postfix: postfix.to_owned(),
            events_per_file: events_per_file.max(1),
            file_index: 0,
            in_file: 0,
            written: 0,
            out: None,
        })
    }

    pub fn write(&mut self, event: &AnalysisEvent) -> Result<()> {
        if self.in_file == self.events_per_file {
            self.flush()?;
            self.out = None;
            self.file_index += 1;
            self.in_file = 0;
        }
        let path = skim_path(&self.dir, &self.dataset, &self.postfix, self.file_index);
        if self.out.is_none() {
            fs::create_dir_all(&self.dir).map_err(|err| Error::io(&self.dir, err))?;
            debug!("Writing skim to {path:?}");
            let file = File::create(&path).map_err(|err| Error::io(&path, err))?;
            self.out = Some(BufWriter::new(file));
        }
        if let Some(out) = &mut self.out {
            serde_json::to_writer(&mut *out, event)?;
            writeln!(out).map_err(|err| Error::io(&path, err))?;
        }
        self.in_file += 1;
        self.written += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(out) = &mut self.out {
            out.flush().map_err(|err| {
                let path = skim_path(&self.dir, &self.dataset, &self.postfix, self.file_index);
                Error::io(path, err)
            })?;
        }
        Ok(())
    }

    /// Flush the output and return the number of written events
    pub fn finish(mut self) -> Result<u64> {
        self.flush()?;
        if self.written > 0 {
            info!(
                "Wrote {} skimmed {} events to {} file(s)",
                self.written,
                self.dataset,
                self.file_index + 1
            );
        }
        Ok(self.written)
    }
}
