//! Dilepton trigger efficiencies and data/simulation scale factors
//!
//! Efficiencies are measured with respect to the MET cross-triggers,
//! which are uncorrelated with the lepton triggers to a good approximation.
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::{
    analysis::{DatasetInfo, EventAnalysis},
    efficiency::{EfficiencyCounters, SampleType, ScaleFactorReport},
    error::Result,
    event::AnalysisEvent,
    histogram::{write_json, HistogramSet},
    pileup::{event_weight, PileupReweighting},
    selection::{dilepton_selection, tight_electrons, tight_muons, Flavour},
    skim::SkimWriter,
    trigger::{Era, TriggerGroup},
};

/// Where and under which postfix to write post-selection skims
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkimOutput {
    pub dir: PathBuf,
    pub postfix: String,
}

pub struct TriggerScaleFactors {
    era: Era,
    pileup: Option<PileupReweighting>,
    skims: Option<SkimOutput>,
    skim_writer: Option<SkimWriter>,
    counters: EfficiencyCounters,
}

impl TriggerScaleFactors {
    pub fn new(era: Era, pileup: Option<PileupReweighting>, skims: Option<SkimOutput>) -> Self {
        Self {
            era,
            pileup,
            skims,
            skim_writer: None,
            counters: EfficiencyCounters::new(),
        }
    }

    pub fn counters(&self) -> &EfficiencyCounters {
        &self.counters
    }

    fn count(&mut self, event: &AnalysisEvent, flavour: Flavour, sample: SampleType, weight: f64) {
        let double_lepton = match flavour {
            Flavour::Electron => TriggerGroup::DoubleElectron,
            Flavour::Muon => TriggerGroup::DoubleMuon,
        };
        let lepton_trigger = self.era.fired(double_lepton, event);
        let met_trigger = self.era.fired(TriggerGroup::Met, event);
        let counters = self.counters.get_mut(flavour, sample);
        counters.selected += weight;
        if lepton_trigger {
            counters.selected_triggered += weight;
        }
        if met_trigger {
            counters.passed += weight;
            if lepton_trigger {
                counters.triggered += weight;
            }
        }
    }

    /// Compute and log efficiencies, scale factors, and alpha factors
    pub fn report(&self, level: f64) -> Result<ScaleFactorReport> {
        let report = self.counters.report(level)?;
        let (el, mu) = (&report.electron, &report.muon);
        info!(
            "electron/muon data efficiencies: {:.6} +{:.6}/-{:.6} / {:.6} +{:.6}/-{:.6}",
            el.data.value, el.data.err_up, el.data.err_down,
            mu.data.value, mu.data.err_up, mu.data.err_down,
        );
        info!(
            "electron/muon MC efficiencies: {:.6} +{:.6}/-{:.6} / {:.6} +{:.6}/-{:.6}",
            el.mc.value, el.mc.err_up, el.mc.err_down,
            mu.mc.value, mu.mc.err_up, mu.mc.err_down,
        );
        info!(
            "electron/muon trigger SFs: {:.6} / {:.6}",
            el.scale_factor, mu.scale_factor
        );
        info!("electron/muon alpha: {:?} / {:?}", el.alpha, mu.alpha);
        Ok(report)
    }
}

impl EventAnalysis for TriggerScaleFactors {
    fn begin_dataset(&mut self, dataset: &DatasetInfo<'_>) -> Result<()> {
        self.skim_writer = self
            .skims
            .as_ref()
            .map(|skims| SkimWriter::new(&skims.dir, dataset.name(), &skims.postfix))
            .transpose()?;
        Ok(())
    }

    fn process(&mut self, event: &AnalysisEvent, dataset: &DatasetInfo<'_>) -> Result<()> {
        let is_mc = dataset.is_mc();
        let weight = event_weight(self.pileup.as_ref(), event.num_vertices, is_mc);
        debug!("event {}: pileup weight {weight}", event.event_number);

        let electrons = tight_electrons(event);
        let electron_pair = dilepton_selection(event, &electrons, Flavour::Electron);
        let muons = tight_muons(event);
        let muon_pair = dilepton_selection(event, &muons, Flavour::Muon);

        if electron_pair.is_some() || muon_pair.is_some() {
            if let Some(writer) = &mut self.skim_writer {
                writer.write(event)?;
            }
        }

        let sample = SampleType::from_is_mc(is_mc);
        if electron_pair.is_some() {
            self.count(event, Flavour::Electron, sample, weight);
        }
        if muon_pair.is_some() {
            self.count(event, Flavour::Muon, sample, weight);
        }
        Ok(())
    }

    fn end_dataset(&mut self, _dataset: &DatasetInfo<'_>) -> Result<()> {
        if let Some(writer) = self.skim_writer.take() {
            writer.finish()?;
        }
        Ok(())
    }
}

/// Write the summary histogram and the full report to `<out_folder>/<postfix>/`
pub fn write_report(report: &ScaleFactorReport, out_folder: &Path, postfix: &str) -> Result<PathBuf> {
    let dir = out_folder.join(postfix);
    let mut histograms = HistogramSet::new();
    histograms.push(report.summary_histogram());
    histograms.write_json(&dir.join("efficiencies.json"))?;
    write_json(report, &dir.join("report.json"))?;
    info!("Wrote scale factors to {dir:?}");
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Dataset,
        event::{Electron, Muon},
        momentum::FourVector,
    };

    fn dataset(is_mc: bool) -> Dataset {
        Dataset {
            name: if is_mc { "mc" } else { "data" }.to_owned(),
            locations: Vec::new(),
            tree: String::new(),
            is_mc,
            cross_section: 1.,
            total_events: 1.,
            trigger_flag: String::new(),
            plot_label: String::new(),
        }
    }

    fn tight_muon(phi: f64, charge: i32) -> Muon {
        Muon {
            p: FourVector::from_pt_eta_phi_e(30., 0., phi, 30.),
            charge,
            is_pf: true,
            tracker_id: true,
            global_id: true,
            chi2: 1.,
            ndof: 1.,
            tracker_layers: 10,
            muon_hits: 1,
            pixel_hits: 1,
            matched_stations: 2,
            ..Default::default()
        }
    }

    fn dimuon_event(triggers: &[&str]) -> AnalysisEvent {
        AnalysisEvent {
            muons: vec![tight_muon(0., 1), tight_muon(3., -1)],
            electrons: vec![Electron::default()],
            triggers: triggers.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn counts_muon_channel() {
        let mc = dataset(true);
        let info = DatasetInfo { dataset: &mc, weight: 3. };
        let mut sf = TriggerScaleFactors::new(Era::Y2016, None, None);
        sf.begin_dataset(&info).unwrap();
        let events = [
            dimuon_event(&["HLT_MET250_v2", "HLT_Mu17_TrkIsoVVL_Mu8_TrkIsoVVL_DZ_v4"]),
            dimuon_event(&["HLT_MET250_v2"]),
            dimuon_event(&["HLT_Mu17_TrkIsoVVL_Mu8_TrkIsoVVL_DZ_v4"]),
            dimuon_event(&[]),
        ];
        for event in &events {
            sf.process(event, &info).unwrap();
        }
        sf.end_dataset(&info).unwrap();

        let mu = sf.counters().get(Flavour::Muon, SampleType::Mc);
        // pileup weights default to one, the dataset weight is not applied
        assert_eq!(mu.selected, 4.);
        assert_eq!(mu.selected_triggered, 2.);
        assert_eq!(mu.passed, 2.);
        assert_eq!(mu.triggered, 1.);
        assert_eq!(*sf.counters().get(Flavour::Electron, SampleType::Mc), Default::default());
        assert_eq!(sf.counters().get(Flavour::Muon, SampleType::Data).selected, 0.);

        let report = sf.report(0.6).unwrap();
        assert!((report.muon.mc.value - 0.5).abs() < 1e-6);
    }

    #[test]
    fn writes_skims_and_report() {
        let dir = tempfile::tempdir().unwrap();
        let data = dataset(false);
        let info = DatasetInfo { dataset: &data, weight: 1. };
        let skims = SkimOutput {
            dir: dir.path().join("skims"),
            postfix: "test".to_owned(),
        };
        let mut sf = TriggerScaleFactors::new(Era::Y2015, None, Some(skims));
        sf.begin_dataset(&info).unwrap();
        sf.process(&dimuon_event(&["HLT_PFHT800_v2"]), &info).unwrap();
        sf.process(&AnalysisEvent::default(), &info).unwrap();
        sf.end_dataset(&info).unwrap();

        let files = crate::skim::skim_files(&dir.path().join("skims"), "data", "test");
        assert_eq!(files.len(), 1);
        assert_eq!(crate::reader::count_events(&files[0]).unwrap(), 1);

        let report = sf.report(0.6).unwrap();
        assert_eq!(report.muon.data_counters.passed, 1.);
        let out = write_report(&report, &dir.path().join("plots"), "default").unwrap();
        let histograms = HistogramSet::read_json(&out.join("efficiencies.json")).unwrap();
        assert!(histograms.h2("histEfficiencies").is_some());
        assert!(out.join("report.json").is_file());
    }
}
