use std::{
    fs::File,
    io::{BufRead, BufReader, Lines},
    path::{Path, PathBuf},
};

use log::trace;

use crate::{
    error::{Error, Result},
    event::AnalysisEvent,
};

/// Supported event file formats
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FileFormat {
    /// One JSON-serialised event per line
    JsonLines,
    /// Les Houches event file
    Lhef,
    HepMC2,
}

impl FileFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        match ext.to_ascii_lowercase().as_str() {
            "jsonl" => Some(Self::JsonLines),
            "lhe" => Some(Self::Lhef),
            "hepmc" | "hepmc2" => Some(Self::HepMC2),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::JsonLines => "JSON lines",
            Self::Lhef => "LHEF",
            Self::HepMC2 => "HepMC2",
        }
    }

    /// Whether a line of a file in this format starts a new event
    fn is_event_start(self, line: &str) -> bool {
        match self {
            Self::JsonLines => !line.trim().is_empty(),
            Self::Lhef => line.trim_start().starts_with("<event"),
            Self::HepMC2 => line.starts_with("E "),
        }
    }
}

enum Source {
    JsonLines {
        lines: Lines<BufReader<File>>,
        line: usize,
    },
    #[cfg(feature = "lhef")]
    Lhef(Box<lhef::Reader<BufReader<File>>>),
    #[cfg(feature = "hepmc2")]
    HepMC2(Box<hepmc2::Reader<BufReader<File>>>),
}

/// Iterator over the events in a file
pub struct EventReader {
    path: PathBuf,
    format: FileFormat,
    source: Source,
    done: bool,
}

impl EventReader {
    pub fn open(path: &Path) -> Result<Self> {
        let format = FileFormat::from_path(path).ok_or_else(|| {
            Error::InvalidInput(format!("Unknown event file format: {path:?}"))
        })?;
        let file = File::open(path).map_err(|err| Error::io(path, err))?;
        let reader = BufReader::new(file);
        let source = match format {
            FileFormat::JsonLines => Source::JsonLines {
                lines: reader.lines(),
                line: 0,
            },
            #[cfg(feature = "lhef")]
            FileFormat::Lhef => {
                let reader = lhef::Reader::new(reader).map_err(|err| Error::Generator {
                    format: format.name(),
                    path: path.to_owned(),
                    msg: err.to_string(),
                })?;
                Source::Lhef(Box::new(reader))
            }
            #[cfg(feature = "hepmc2")]
            FileFormat::HepMC2 => Source::HepMC2(Box::new(hepmc2::Reader::from(reader))),
            #[allow(unreachable_patterns)]
            _ => {
                return Err(Error::InvalidInput(format!(
                    "Support for {} files is not enabled",
                    format.name()
                )))
            }
        };
        trace!("Opened {path:?} as {}", format.name());
        Ok(Self {
            path: path.to_owned(),
            format,
            source,
            done: false,
        })
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    fn generator_error(&self, msg: String) -> Error {
        Error::Generator {
            format: self.format.name(),
            path: self.path.clone(),
            msg,
        }
    }

    fn read_next(&mut self) -> Option<Result<AnalysisEvent>> {
        match &mut self.source {
            Source::JsonLines { lines, line } => loop {
                *line += 1;
                let text = match lines.next()? {
                    Ok(text) => text,
                    Err(err) => return Some(Err(Error::io(&self.path, err))),
                };
                if text.trim().is_empty() {
                    continue;
                }
                let event = serde_json::from_str(&text).map_err(|source| Error::Json {
                    path: self.path.clone(),
                    line: *line,
                    source,
                });
                return Some(event);
            },
            #[cfg(feature = "lhef")]
            Source::Lhef(reader) => match reader.hepeup() {
                Ok(Some(event)) => Some(Ok(event.into())),
                Ok(None) => None,
                Err(err) => Some(Err(self.generator_error(err.to_string()))),
            },
            #[cfg(feature = "hepmc2")]
            Source::HepMC2(reader) => match reader.next()? {
                Ok(event) => Some(Ok(event.into())),
                Err(err) => Some(Err(self.generator_error(err.to_string()))),
            },
        }
    }
}

impl Iterator for EventReader {
    type Item = Result<AnalysisEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let next = self.read_next();
        // stop after the first error, the reader state is undefined
        if !matches!(next, Some(Ok(_))) {
            self.done = true;
        }
        next
    }
}

/// Number of events in a file, without parsing them
pub fn count_events(path: &Path) -> Result<u64> {
    let format = FileFormat::from_path(path)
        .ok_or_else(|| Error::InvalidInput(format!("Unknown event file format: {path:?}")))?;
    let file = File::open(path).map_err(|err| Error::io(path, err))?;
    let mut count = 0;
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|err| Error::io(path, err))?;
        if format.is_event_start(&line) {
            count += 1;
        }
    }
    Ok(count)
}

/// Total number of events in several files
pub fn count_all_events(paths: &[PathBuf]) -> Result<u64> {
    paths.iter().map(|path| count_events(path)).sum()
}

#[cfg(test)]
mod tests {
    use std::{fs, io::Write};

    use super::*;

    #[test]
    fn formats() {
        assert_eq!(FileFormat::from_path(Path::new("a/b.jsonl")), Some(FileFormat::JsonLines));
        assert_eq!(FileFormat::from_path(Path::new("b.LHE")), Some(FileFormat::Lhef));
        assert_eq!(FileFormat::from_path(Path::new("b.hepmc2")), Some(FileFormat::HepMC2));
        assert_eq!(FileFormat::from_path(Path::new("b.root")), None);
        assert_eq!(FileFormat::from_path(Path::new("jsonl")), None);
    }

    #[test]
    fn json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let mut file = File::create(&path).unwrap();
        writeln!(file, r#"{{"event_number": 1}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"event_number": 2, "num_vertices": 30}}"#).unwrap();
        drop(file);

        assert_eq!(count_events(&path).unwrap(), 2);
        let events: Vec<_> = EventReader::open(&path)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].event_number, 2);
        assert_eq!(events[1].num_vertices, 30);
    }

    #[test]
    fn json_error_with_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        fs::write(&path, "{}\n\n{\"muons\": 3}\n{}\n").unwrap();
        let mut reader = EventReader::open(&path).unwrap();
        assert!(reader.next().unwrap().is_ok());
        match reader.next() {
            Some(Err(Error::Json { line, .. })) => assert_eq!(line, 3),
            other => panic!("Expected JSON error, got {other:?}"),
        }
        assert!(reader.next().is_none());
    }

    #[test]
    fn unknown_and_missing() {
        assert!(matches!(
            EventReader::open(Path::new("events.root")),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            EventReader::open(Path::new("/nonexistent/events.jsonl")),
            Err(Error::Io { .. })
        ));
    }

    #[test]
    fn count_generator_events() {
        let dir = tempfile::tempdir().unwrap();
        let lhe = dir.path().join("events.lhe");
        fs::write(&lhe, "<LesHouchesEvents>\n<init>\n</init>\n<event>\n</event>\n  <event>\n</event>\n").unwrap();
        assert_eq!(count_events(&lhe).unwrap(), 2);
        let hepmc = dir.path().join("events.hepmc2");
        fs::write(&hepmc, "HepMC::Version 2.06.09\nE 1 0\nV -1\nE 2 0\n").unwrap();
        assert_eq!(count_events(&hepmc).unwrap(), 2);
        assert_eq!(count_all_events(&[lhe, hepmc]).unwrap(), 4);
    }
}
