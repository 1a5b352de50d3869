use std::{
    fs,
    path::{Path, PathBuf},
};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    pileup::PileupFiles,
    reader::FileFormat,
};

/// Analysis configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Integrated luminosity in pb⁻¹
    #[serde(default)]
    pub luminosity: Option<f64>,
    #[serde(default)]
    pub pileup: Option<PileupFiles>,
    pub datasets: Vec<Dataset>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Dataset {
    pub name: String,
    /// Event files or directories containing them
    pub locations: Vec<PathBuf>,
    /// Label of the event collection, kept for bookkeeping
    #[serde(default)]
    pub tree: String,
    pub is_mc: bool,
    /// Cross section in pb
    #[serde(default)]
    pub cross_section: f64,
    /// Number of generated events
    #[serde(default)]
    pub total_events: f64,
    /// Trigger stream the dataset was recorded with
    #[serde(default)]
    pub trigger_flag: String,
    #[serde(default)]
    pub plot_label: String,
}

impl Config {
    /// Read a YAML configuration
    ///
    /// Relative paths are resolved with respect to the directory of the
    /// configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Reading configuration from {path:?}");
        let text = fs::read_to_string(path).map_err(|err| Error::io(path, err))?;
        let mut config = Self::from_yaml(&text)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for dataset in &self.datasets {
            if dataset.name.is_empty() {
                return Err(Error::Config("Dataset without a name".to_owned()));
            }
            if dataset.is_mc && dataset.total_events <= 0. {
                return Err(Error::Config(format!(
                    "Simulated dataset {} needs a positive number of generated events",
                    dataset.name
                )));
            }
        }
        if let Some(lumi) = self.luminosity {
            if lumi < 0. {
                return Err(Error::Config(format!("Negative luminosity {lumi}")));
            }
        }
        Ok(())
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        for dataset in &mut self.datasets {
            for location in &mut dataset.locations {
                resolve(location);
            }
        }
        if let Some(pileup) = &mut self.pileup {
            for path in [
                &mut pileup.data,
                &mut pileup.mc,
                &mut pileup.up,
                &mut pileup.down,
            ] {
                resolve(path);
            }
        }
    }

    /// Luminosity from the configuration, or `fallback` if none is given
    pub fn luminosity_or(&self, fallback: f64) -> f64 {
        match self.luminosity {
            Some(lumi) if lumi != 0. => lumi,
            _ => fallback,
        }
    }
}

impl Dataset {
    /// Normalisation of simulated events to the integrated luminosity
    pub fn weight(&self, luminosity: f64) -> f64 {
        if self.is_mc {
            luminosity * self.cross_section / self.total_events
        } else {
            1.
        }
    }

    /// Event files of this dataset, in sorted order per location
    ///
    /// At most `max_files` files are returned if a limit is given.
    pub fn input_files(&self, max_files: Option<usize>) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for location in &self.locations {
            if location.is_dir() {
                let mut entries = Vec::new();
                let dir = fs::read_dir(location).map_err(|err| Error::io(location, err))?;
                for entry in dir {
                    let path = entry.map_err(|err| Error::io(location, err))?.path();
                    if path.is_file() && FileFormat::from_path(&path).is_some() {
                        entries.push(path);
                    }
                }
                entries.sort();
                files.append(&mut entries);
            } else if location.is_file() {
                files.push(location.clone());
            } else {
                warn!("Input location {location:?} of {} not found", self.name);
            }
        }
        if let Some(max) = max_files {
            files.truncate(max);
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
luminosity: 1000.0
datasets:
  - name: DYJetsToLL_M-50
    locations: [dy]
    tree: tree
    is_mc: true
    cross_section: 5765.4
    total_events: 1000000
    trigger_flag: mumu
    plot_label: Drell-Yan
  - name: MET_Run2016
    locations: [met.jsonl]
    is_mc: false
"#;

    #[test]
    fn parse_and_weights() {
        let config = Config::from_yaml(CONFIG).unwrap();
        assert_eq!(config.datasets.len(), 2);
        assert_eq!(config.luminosity_or(5.), 1000.);
        let dy = &config.datasets[0];
        assert!((dy.weight(1000.) - 5.7654).abs() < 1e-9);
        assert_eq!(config.datasets[1].weight(1000.), 1.);
        assert!(config.pileup.is_none());

        let no_lumi = Config { luminosity: Some(0.), ..config };
        assert_eq!(no_lumi.luminosity_or(41528.), 41528.);
    }

    #[test]
    fn invalid_configs() {
        let missing_events = "datasets:\n  - {name: a, locations: [], is_mc: true}\n";
        assert!(matches!(Config::from_yaml(missing_events), Err(Error::Config(_))));
        let unknown = "datasets: []\nlumi: 3\n";
        assert!(matches!(Config::from_yaml(unknown), Err(Error::Yaml(_))));
    }

    #[test]
    fn input_discovery() {
        let dir = tempfile::tempdir().unwrap();
        let dy = dir.path().join("dy");
        fs::create_dir(&dy).unwrap();
        for name in ["b.jsonl", "a.jsonl", "c.lhe", "notes.txt"] {
            fs::write(dy.join(name), "").unwrap();
        }
        fs::write(dir.path().join("met.jsonl"), "").unwrap();
        let config_path = dir.path().join("config.yaml");
        fs::write(&config_path, CONFIG).unwrap();

        let config = Config::from_file(&config_path).unwrap();
        let files = config.datasets[0].input_files(None).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, ["a.jsonl", "b.jsonl", "c.lhe"]);
        assert_eq!(config.datasets[0].input_files(Some(1)).unwrap().len(), 1);
        assert_eq!(config.datasets[1].input_files(None).unwrap().len(), 1);

        let missing = Dataset {
            locations: vec![dir.path().join("nowhere")],
            ..config.datasets[1].clone()
        };
        assert!(missing.input_files(None).unwrap().is_empty());
    }
}
