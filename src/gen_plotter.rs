//! Generator-level diagnostics of the scalar decay products
use log::debug;
use particle_id::{sm_elementary_particles::muon, ParticleID};

use crate::{
    analysis::{DatasetInfo, EventAnalysis},
    error::Result,
    event::{AnalysisEvent, Muon},
    genealogy::Genealogy,
    histogram::{Histogram1D, HistogramSet, Profile},
    momentum::FourVector,
    particles::{is_light_quark, same_species, KAON, PION, SCALAR},
    selection::{loose_muons, nearest_dimuon, Dilepton},
    trigger::Era,
};

const PROMPT_LABELS: [&str; 3] = ["Prompt Decayed", "Prompt Final State", "Hard Process"];

const MATCHING_LABELS: [&str; 4] = [
    "Both muon tracks genuine",
    "Leading muon track genuine",
    "Subleading muon track genuine",
    "Both tracks fake",
];

const FAKE_LABELS: [&str; 8] = [
    "0 #mu from a in event",
    "1 #mu from a in event",
    "2 #mu from a in event",
    "2+ #mu from a in event",
    "0 #mu from #mu in event",
    "1 #mu from #mu in event",
    "2 #mu from #mu in event",
    "2+ #mu from #mu in event",
];

/// Kinematics of a particle pair
#[derive(Clone, Debug)]
struct PairHistograms {
    delta_r: Histogram1D,
    mass: Histogram1D,
    pt: Histogram1D,
    eta: Histogram1D,
    leading_pt: Histogram1D,
    subleading_pt: Histogram1D,
}

impl PairHistograms {
    /// Histograms named `h_<stage><pair>DeltaR`, ..., `h_<stage>Leading<particle>Pt`
    fn new(stage: &str, pair: &str, particle: &str) -> Self {
        let pair_h = |var: &str, bins, lo, hi| {
            Histogram1D::new(
                &format!("h_{stage}{pair}{var}"),
                &format!("{pair} {stage} {var}"),
                bins,
                lo,
                hi,
            )
        };
        let single_h = |order: &str| {
            Histogram1D::new(
                &format!("h_{stage}{order}{particle}Pt"),
                &format!("{order} {stage} {particle}; p_{{T}} (GeV)"),
                300,
                0.,
                150.,
            )
        };
        Self {
            delta_r: pair_h("DeltaR", 500, 0., 10.),
            mass: pair_h("Mass", 30, 0., 11.),
            pt: pair_h("Pt", 200, 0., 200.),
            eta: pair_h("Eta", 60, 0., 5.),
            leading_pt: single_h("Leading"),
            subleading_pt: single_h("Subleading"),
        }
    }

    fn fill(&mut self, p1: FourVector, p2: FourVector, weight: f64) {
        let (leading, subleading) = if p1.pt() > p2.pt() { (p1, p2) } else { (p2, p1) };
        let sum = leading + subleading;
        self.delta_r.fill_weighted(leading.delta_r(&subleading), weight);
        self.mass.fill_weighted(sum.m(), weight);
        self.pt.fill_weighted(sum.pt(), weight);
        self.eta.fill_weighted(sum.eta(), weight);
        self.leading_pt.fill_weighted(leading.pt(), weight);
        self.subleading_pt.fill_weighted(subleading.pt(), weight);
    }

    fn fill_dilepton(&mut self, pair: &Dilepton, weight: f64) {
        self.fill(pair.p.0, pair.p.1, weight)
    }

    fn into_histograms(self) -> [Histogram1D; 6] {
        [
            self.delta_r,
            self.mass,
            self.pt,
            self.eta,
            self.leading_pt,
            self.subleading_pt,
        ]
    }
}

/// Positions of generator muons, pions and kaons from the scalar decay
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScalarDecayProducts {
    pub muons: Vec<usize>,
    pub pions: Vec<usize>,
    pub kaons: Vec<usize>,
}

impl ScalarDecayProducts {
    /// Muons have to come directly from the scalar. Hadrons need a
    /// light quark mother and the scalar among their ancestors.
    pub fn find(event: &AnalysisEvent) -> Self {
        let mut products = Self::default();
        if event.gen_particles.is_empty() {
            return products;
        }
        let genealogy = Genealogy::new(&event.gen_particles);
        for (idx, particle) in event.gen_particles.iter().enumerate() {
            let id = particle.id();
            if same_species(id, muon) {
                if same_species(particle.mother(), SCALAR) {
                    products.muons.push(idx);
                }
                continue;
            }
            let hadrons = if same_species(id, PION) {
                &mut products.pions
            } else if same_species(id, KAON) {
                &mut products.kaons
            } else {
                continue;
            };
            if is_light_quark(particle.mother()) && genealogy.has_ancestor(idx, SCALAR) {
                hadrons.push(idx);
            }
        }
        products
    }
}

fn genuine(mu: &Muon) -> bool {
    mu.is_from(SCALAR)
}

/// Generator and reconstructed dimuon histograms
#[derive(Clone, Debug)]
pub struct GenPlotter {
    era: Era,
    gen_dimuon: PairHistograms,
    gen_dipion: PairHistograms,
    gen_dikaon: PairHistograms,
    reco_dimuon: PairHistograms,
    prompt_flags: Profile,
    reco_matching: Profile,
    reco_gen_dimuon: PairHistograms,
    fake_selected: Profile,
}

impl GenPlotter {
    pub fn new(era: Era) -> Self {
        Self {
            era,
            gen_dimuon: PairHistograms::new("gen", "Dimuon", "Muon"),
            gen_dipion: PairHistograms::new("gen", "Dipion", "Pion"),
            gen_dikaon: PairHistograms::new("gen", "Dikaon", "Kaon"),
            reco_dimuon: PairHistograms::new("reco", "Dimuon", "Muon"),
            prompt_flags: Profile::labelled(
                "p_numPromptMuons",
                "Muon flags for selected reco muons",
                &PROMPT_LABELS,
            ),
            reco_matching: Profile::labelled(
                "p_recoSelectedMuonMatching",
                "Selected leading/subleading reco muon ancestry",
                &MATCHING_LABELS,
            ),
            reco_gen_dimuon: PairHistograms::new("recoGen", "Dimuon", "Muon"),
            fake_selected: Profile::labelled(
                "p_fakeSelected",
                "Debug info for why fake #mu#mu pair was selected",
                &FAKE_LABELS,
            ),
        }
    }

    fn fill_gen_pairs(&mut self, event: &AnalysisEvent, weight: f64) {
        let products = ScalarDecayProducts::find(event);
        let particles = &event.gen_particles;
        let pairs = [
            (&products.muons, &mut self.gen_dimuon, "muons"),
            (&products.pions, &mut self.gen_dipion, "pions"),
            (&products.kaons, &mut self.gen_dikaon, "kaons"),
        ];
        for (indices, histograms, kind) in pairs {
            match indices.as_slice() {
                &[i, j] => histograms.fill(particles[i].momentum(), particles[j].momentum(), weight),
                [] | [_] => {}
                more => debug!(
                    "event {}: {} generator {kind} from the scalar",
                    event.event_number,
                    more.len()
                ),
            }
        }
    }

    fn fill_fake_debug(&mut self, event: &AnalysisEvent, loose: &[usize]) {
        let muons = || loose.iter().map(|&idx| &event.muons[idx]);
        let from_scalar = muons().filter(|mu| genuine(mu)).count();
        let from_muon = muons()
            .filter(|mu| same_species(ParticleID::new(mu.gen_mother_id()), muon))
            .count();
        for (offset, count) in [(0, from_scalar), (4, from_muon)] {
            self.fake_selected.fill_flag(offset + 1, count == 0);
            self.fake_selected.fill_flag(offset + 2, count == 1);
            self.fake_selected.fill_flag(offset + 3, count == 2);
            self.fake_selected.fill_flag(offset + 4, count > 2);
        }
    }

    pub fn into_histograms(self) -> HistogramSet {
        let mut set = HistogramSet::new();
        for pair in [self.gen_dimuon, self.gen_dipion, self.gen_dikaon, self.reco_dimuon] {
            for h in pair.into_histograms() {
                set.push(h);
            }
        }
        set.push(self.prompt_flags);
        set.push(self.reco_matching);
        for h in self.reco_gen_dimuon.into_histograms() {
            set.push(h);
        }
        set.push(self.fake_selected);
        set
    }
}

impl EventAnalysis for GenPlotter {
    fn process(&mut self, event: &AnalysisEvent, dataset: &DatasetInfo<'_>) -> Result<()> {
        let weight = dataset.weight;
        self.fill_gen_pairs(event, weight);

        if !self.era.any_muon_trigger(event) {
            return Ok(());
        }
        if !self.era.passes_met_filters(event, dataset.is_mc()) {
            return Ok(());
        }
        let loose = loose_muons(event, false);
        if loose.len() < 2 {
            return Ok(());
        }
        let Some(dimuon) = nearest_dimuon(event, &loose, false) else {
            return Ok(());
        };
        self.reco_dimuon.fill_dilepton(&dimuon, weight);

        let (leading, subleading) = (&event.muons[dimuon.index.0], &event.muons[dimuon.index.1]);
        for mu in [leading, subleading] {
            self.prompt_flags.fill_flag(1, mu.prompt_decayed());
            self.prompt_flags.fill_flag(2, mu.prompt_final_state());
            self.prompt_flags.fill_flag(3, mu.hard_process());
        }
        let (genuine1, genuine2) = (genuine(leading), genuine(subleading));
        self.reco_matching.fill_flag(1, genuine1 && genuine2);
        self.reco_matching.fill_flag(2, genuine1 && !genuine2);
        self.reco_matching.fill_flag(3, !genuine1 && genuine2);
        self.reco_matching.fill_flag(4, !genuine1 && !genuine2);

        if !genuine1 && !genuine2 {
            self.fill_fake_debug(event, &loose);
        }

        if let Some(truth) = nearest_dimuon(event, &loose, true) {
            self.reco_gen_dimuon.fill_dilepton(&truth, weight);
        }
        Ok(())
    }
}
