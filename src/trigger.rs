use std::fmt::{self, Display};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::event::AnalysisEvent;

/// Data-taking period
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize,
)]
pub enum Era {
    #[value(name = "2015")]
    #[serde(rename = "2015")]
    Y2015,
    #[value(name = "2016")]
    #[serde(rename = "2016")]
    Y2016,
    #[default]
    #[value(name = "2017")]
    #[serde(rename = "2017")]
    Y2017,
}

impl Display for Era {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let year = match self {
            Era::Y2015 => "2015",
            Era::Y2016 => "2016",
            Era::Y2017 => "2017",
        };
        write!(f, "{year}")
    }
}

/// Groups of HLT paths combined with a logical OR
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TriggerGroup {
    DoubleElectron,
    DoubleMuon,
    MuonElectron,
    /// MET and hadronic cross triggers
    Met,
    SingleMuon,
    /// Dimuon paths for the low-mass search
    Dimuon,
    /// Dimuon paths seeded by L2 muons without a vertex constraint
    L2Dimuon,
    /// Dimuon paths without a vertex constraint
    DimuonNoVertex,
}

const MET_FILTERS: [&str; 4] = [
    "Flag_HBHENoiseFilter",
    "Flag_HBHENoiseIsoFilter",
    "Flag_EcalDeadCellTriggerPrimitiveFilter",
    "Flag_goodVertices",
];
const EE_BAD_SC_FILTER: &str = "Flag_eeBadScFilter";

impl Era {
    /// Path names without version suffix
    pub fn paths(self, group: TriggerGroup) -> &'static [&'static str] {
        use TriggerGroup::*;
        match (self, group) {
            (Era::Y2015, DoubleElectron) => {
                &["HLT_Ele17_Ele12_CaloIdL_TrackIdL_IsoVL_DZ"]
            }
            (Era::Y2015, DoubleMuon) => &[
                "HLT_Mu17_TrkIsoVVL_Mu8_TrkIsoVVL_DZ",
                "HLT_Mu17_TrkIsoVVL_TkMu8_TrkIsoVVL_DZ",
            ],
            (Era::Y2015, MuonElectron) => &[
                "HLT_Mu17_TrkIsoVVL_Ele12_CaloIdL_TrackIdL_IsoVL",
                "HLT_Mu8_TrkIsoVVL_Ele17_CaloIdL_TrackIdL_IsoVL",
            ],
            (Era::Y2015, Met) => &[
                "HLT_PFMET120_PFMHT120_IDTight",
                "HLT_PFMET170_JetIdCleaned",
                "HLT_PFMET170_HBHECleaned",
                "HLT_PFHT800",
                "HLT_MET250",
            ],
            (Era::Y2015, SingleMuon) => &["HLT_IsoMu20"],
            (Era::Y2015, Dimuon) => &["HLT_Mu17_TrkIsoVVL_Mu8_TrkIsoVVL_DZ"],
            (Era::Y2015 | Era::Y2016, L2Dimuon) => {
                &["HLT_L2DoubleMu28_NoVertex_2Cha_Angle2p5_Mass10"]
            }
            (Era::Y2015 | Era::Y2016, DimuonNoVertex) => {
                &["HLT_DoubleMu33NoFiltersNoVtx"]
            }

            (Era::Y2016, DoubleElectron) => {
                &["HLT_Ele23_Ele12_CaloIdL_TrackIdL_IsoVL_DZ"]
            }
            (Era::Y2016, DoubleMuon) => &[
                "HLT_Mu17_TrkIsoVVL_Mu8_TrkIsoVVL_DZ",
                "HLT_Mu17_TrkIsoVVL_TkMu8_TrkIsoVVL_DZ",
            ],
            (Era::Y2016, MuonElectron) => &[
                "HLT_Mu23_TrkIsoVVL_Ele12_CaloIdL_TrackIdL_IsoVL",
                "HLT_Mu8_TrkIsoVVL_Ele23_CaloIdL_TrackIdL_IsoVL",
            ],
            (Era::Y2016, Met) => &[
                "HLT_MET250",
                "HLT_PFMET120_PFMHT120_IDTight",
                "HLT_PFMET170_HBHECleaned",
                "HLT_PFHT800",
                "HLT_PFHT750_4JetPt50",
                "HLT_PFHT300_PFMET100",
            ],
            (Era::Y2016, SingleMuon) => &["HLT_IsoMu24"],
            (Era::Y2016, Dimuon) => &["HLT_Mu17_TrkIsoVVL_Mu8_TrkIsoVVL_DZ"],

            (Era::Y2017, DoubleElectron) => {
                &["HLT_Ele23_Ele12_CaloIdL_TrackIdL_IsoVL"]
            }
            (Era::Y2017, DoubleMuon) => &[
                "HLT_Mu17_TrkIsoVVL_Mu8_TrkIsoVVL_DZ_Mass3p8",
                "HLT_Mu17_TrkIsoVVL_Mu8_TrkIsoVVL_DZ_Mass8",
            ],
            (Era::Y2017, MuonElectron) => &[
                "HLT_Mu23_TrkIsoVVL_Ele12_CaloIdL_TrackIdL_IsoVL_DZ",
                "HLT_Mu8_TrkIsoVVL_Ele23_CaloIdL_TrackIdL_IsoVL_DZ",
            ],
            (Era::Y2017, Met) => &[
                "HLT_PFMET120_PFMHT120_IDTight",
                "HLT_PFMET200_HBHECleaned",
                "HLT_PFMET250_HBHECleaned",
                "HLT_PFHT1050",
            ],
            (Era::Y2017, SingleMuon) => &["HLT_IsoMu27"],
            (Era::Y2017, Dimuon) => {
                &["HLT_Mu17_TrkIsoVVL_Mu8_TrkIsoVVL_DZ_Mass3p8"]
            }
            (Era::Y2017, L2Dimuon) => &["HLT_DoubleL2Mu23NoVtx_2Cha"],
            (Era::Y2017, DimuonNoVertex) => &["HLT_DoubleMu43NoFiltersNoVtx"],
        }
    }

    /// Whether any path in the group fired
    pub fn fired(self, group: TriggerGroup, event: &AnalysisEvent) -> bool {
        self.paths(group).iter().any(|path| event.fired(path))
    }

    /// Whether any of the muon triggers used by the plotters fired
    pub fn any_muon_trigger(self, event: &AnalysisEvent) -> bool {
        use TriggerGroup::*;
        [SingleMuon, Dimuon, L2Dimuon, DimuonNoVertex]
            .into_iter()
            .any(|group| self.fired(group, event))
    }

    /// MET filter flags an event has to pass
    pub fn met_filters(self, is_mc: bool) -> Vec<&'static str> {
        let mut filters = Vec::from(MET_FILTERS);
        match self {
            Era::Y2015 => {
                filters.push(EE_BAD_SC_FILTER);
                filters.push("Flag_CSCTightHalo2015Filter");
            }
            Era::Y2016 => {
                filters.push(EE_BAD_SC_FILTER);
                filters.push("Flag_globalTightHalo2016Filter");
            }
            Era::Y2017 => {
                filters.push("Flag_globalSuperTightHalo2016Filter");
                filters.push("Flag_BadPFMuonFilter");
                filters.push("Flag_ecalBadCalibFilter");
                if !is_mc {
                    filters.push(EE_BAD_SC_FILTER);
                }
            }
        }
        filters
    }

    pub fn passes_met_filters(self, event: &AnalysisEvent, is_mc: bool) -> bool {
        self.met_filters(is_mc)
            .into_iter()
            .all(|flag| event.passed_filter(flag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(triggers: &[&str], filters: &[&str]) -> AnalysisEvent {
        AnalysisEvent {
            triggers: triggers.iter().map(|s| s.to_string()).collect(),
            filters: filters.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn any_version_fires() {
        let ev = event(&["HLT_Ele23_Ele12_CaloIdL_TrackIdL_IsoVL_DZ_v7"], &[]);
        assert!(Era::Y2016.fired(TriggerGroup::DoubleElectron, &ev));
        assert!(!Era::Y2015.fired(TriggerGroup::DoubleElectron, &ev));
        assert!(!Era::Y2016.fired(TriggerGroup::Met, &ev));
    }

    #[test]
    fn met_cross_triggers() {
        let ev = event(&["HLT_PFHT300_PFMET100_v2"], &[]);
        assert!(Era::Y2016.fired(TriggerGroup::Met, &ev));
        assert!(!Era::Y2015.fired(TriggerGroup::Met, &ev));
    }

    #[test]
    fn muon_triggers() {
        let ev = event(&["HLT_DoubleL2Mu23NoVtx_2Cha_v3"], &[]);
        assert!(Era::Y2017.any_muon_trigger(&ev));
        assert!(!Era::Y2016.any_muon_trigger(&ev));
    }

    #[test]
    fn filters_per_era() {
        let common = MET_FILTERS.to_vec();
        let mut flags_2015 = common.clone();
        flags_2015.extend([EE_BAD_SC_FILTER, "Flag_CSCTightHalo2015Filter"]);
        let ev = event(&[], &flags_2015);
        assert!(Era::Y2015.passes_met_filters(&ev, true));
        assert!(!Era::Y2016.passes_met_filters(&ev, true));

        let mut flags_2017 = common;
        flags_2017.extend([
            "Flag_globalSuperTightHalo2016Filter",
            "Flag_BadPFMuonFilter",
            "Flag_ecalBadCalibFilter",
        ]);
        let ev = event(&[], &flags_2017);
        assert!(Era::Y2017.passes_met_filters(&ev, true));
        assert!(!Era::Y2017.passes_met_filters(&ev, false));
    }
}
