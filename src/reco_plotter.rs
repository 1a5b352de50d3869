//! Reconstructed scalar candidates from a dimuon and a charged-hadron pair
use crate::{
    analysis::{DatasetInfo, EventAnalysis},
    error::Result,
    event::AnalysisEvent,
    histogram::{Histogram, Histogram1D, Histogram2D, HistogramSet},
    momentum::{delta_r, FourVector},
    particles::SCALAR,
    selection::{chs_candidates, leading_dihadron, leading_dimuon, loose_muons, RefittedPair},
    trigger::Era,
};

/// Only hadron pairs below this mass enter the ΔR distribution
const MAX_DIHADRON_MASS_FOR_DELTA_R: f64 = 5.;

/// Muon and hadron pairs forming a scalar candidate
#[derive(Clone, Debug, PartialEq)]
pub struct ScalarCandidate {
    pub muons: RefittedPair,
    pub hadrons: RefittedPair,
    /// Packed-candidate momenta of the two muons
    pub muon_pseudo_tracks: Option<(FourVector, FourVector)>,
    /// Jets the two hadrons are clustered into
    pub jets: Option<(FourVector, FourVector)>,
}

impl ScalarCandidate {
    /// Leading dimuon and dihadron candidates after the loose muon selection
    pub fn find(event: &AnalysisEvent, loose: &[usize]) -> Option<Self> {
        let muons = leading_dimuon(event, loose)?;
        let chs = chs_candidates(event);
        if chs.len() < 2 {
            return None;
        }
        let hadrons = leading_dihadron(event, &chs)?;

        let pseudo_track = |idx: usize| {
            let cand = event.muons.get(idx)?.packed_cand_index?;
            event.packed_cands.get(cand).map(|c| c.p)
        };
        let muon_pseudo_tracks = pseudo_track(muons.index.0).zip(pseudo_track(muons.index.1));

        let jet = |idx: usize| {
            let jet = event.packed_cands.get(idx)?.jet_index?;
            event.jets.get(jet).map(|j| j.momentum())
        };
        let jets = jet(hadrons.index.0).zip(jet(hadrons.index.1));

        Some(Self { muons, hadrons, muon_pseudo_tracks, jets })
    }
}

/// Scalar candidate distributions
#[derive(Clone, Debug)]
struct ScalarHistograms {
    leading_muon_pt: Histogram1D,
    subleading_muon_pt: Histogram1D,
    muon_delta_r: Histogram1D,
    dimuon_pt: Histogram1D,
    muon_pt_over_delta_r: Histogram1D,
    muon_pt_vs_delta_r: Histogram2D,
    dimuon_mass: Histogram1D,
    dimuon_refitted_mass: Histogram1D,

    leading_chs_pt: Histogram1D,
    subleading_chs_pt: Histogram1D,
    chs_delta_r: Histogram1D,
    dichs_pt: Histogram1D,
    dichs_pt_over_delta_r: Histogram1D,
    dichs_pt_vs_delta_r: Histogram2D,
    dichs_mass: Histogram1D,
    dichs_refitted_mass: Histogram1D,

    scalar_delta_r: Histogram1D,
    scalar_masses: Histogram2D,
    scalar_masses_pseudo_track: Histogram2D,
    scalar_refitted_masses: Histogram2D,
    scalar_mass: Histogram1D,
    scalar_refitted_mass: Histogram1D,

    leading_jet_pt: Histogram1D,
    subleading_jet_pt: Histogram1D,
    jet_delta_r: Histogram1D,
    dijet_pt: Histogram1D,
    dijet_pt_over_delta_r: Histogram1D,
    dijet_pt_vs_delta_r: Histogram2D,
    dijet_mass: Histogram1D,
    scalar_jet_delta_r: Histogram1D,
    scalar_jet_masses: Histogram2D,
    scalar_jet_mass: Histogram1D,
}

impl ScalarHistograms {
    fn new(prefix: &str) -> Self {
        let h1 = |name: &str, title: &str, bins, lo, hi| {
            Histogram1D::new(&format!("{prefix}_{name}"), title, bins, lo, hi)
        };
        let h2 = |name: &str, title: &str, x, y| {
            Histogram2D::new(&format!("{prefix}_{name}"), title, x, y)
        };
        let pt = |name: &str| h1(name, ";p_{T}", 200, 0., 100.);
        let pair_pt = |name: &str| h1(name, ";p_{T}", 400, 0., 200.);
        let mass = |name: &str| h1(name, ";Mass", 100, 0., 4.);
        let higgs_mass = |name: &str| h1(name, ";Higgs Mass", 200, 75., 175.);
        Self {
            leading_muon_pt: pt("leadingMuonPt"),
            subleading_muon_pt: pt("subleadingMuonPt"),
            muon_delta_r: h1("muonDeltaR", ";#Delta R", 500, 0., 1.),
            dimuon_pt: pair_pt("dimuonPt"),
            muon_pt_over_delta_r: h1("muonPtOverDeltaR", "p_{T}/#Delta R", 4000, 0., 10.),
            muon_pt_vs_delta_r: h2(
                "muonPtOverDeltaR2D",
                "; p_{T}; #Delta R",
                (200, 0., 100.),
                (500, 0., 5.),
            ),
            dimuon_mass: mass("diMuonMass"),
            dimuon_refitted_mass: mass("diMuonRefittedMass"),

            leading_chs_pt: pt("leadingChsPt"),
            subleading_chs_pt: pt("subleadingChsPt"),
            chs_delta_r: h1("chsDeltaR", ";#Delta R", 500, 0., 4.),
            dichs_pt: pair_pt("diChsPt"),
            dichs_pt_over_delta_r: h1("diChsPtOverDeltaR", "p_{T}/#Delta R", 4000, 0., 10.),
            dichs_pt_vs_delta_r: h2(
                "diChsPtOverDeltaR2D",
                "; p_{T}; #Delta R",
                (200, 0., 100.),
                (500, 0., 10.),
            ),
            dichs_mass: mass("diChsMass"),
            dichs_refitted_mass: mass("diChsRefittedMass"),

            scalar_delta_r: h1("scalarDeltaR", ";#Delta R", 500, 0., 10.),
            scalar_masses: h2(
                "scalarMasses",
                ";#mu#mu Mass; #pi#pi Mass",
                (400, 0., 4.),
                (400, 0., 4.),
            ),
            scalar_masses_pseudo_track: h2(
                "scalarMassesNew",
                ";#mu#mu Mass; #pi#pi Mass",
                (400, 0., 4.),
                (400, 0., 4.),
            ),
            scalar_refitted_masses: h2(
                "scalarRefittedMasses",
                ";#mu#mu Mass; #pi#pi Mass",
                (50, 0., 4.),
                (50, 0., 4.),
            ),
            scalar_mass: higgs_mass("scalarMass"),
            scalar_refitted_mass: higgs_mass("scalarRefittedMass"),

            leading_jet_pt: pt("leadingChsJetPt"),
            subleading_jet_pt: pt("subleadingChsJetPt"),
            jet_delta_r: h1("chsJetDeltaR", ";#Delta R", 500, 0., 4.),
            dijet_pt: pair_pt("diChsJetPt"),
            dijet_pt_over_delta_r: h1("diChsJetPtOverDeltaR", "p_{T}/#Delta R", 5000, 0., 10.),
            dijet_pt_vs_delta_r: h2(
                "diChsJetPtOverDeltaR2D",
                "; p_{T}; #Delta R",
                (200, 0., 100.),
                (500, 0., 10.),
            ),
            dijet_mass: mass("diChsJetMass"),
            scalar_jet_delta_r: h1("scalarJetDeltaR", ";#Delta R", 500, 0., 10.),
            scalar_jet_masses: h2(
                "scalarJetMasses",
                ";#mu#mu Mass; a#bar{a} Mass",
                (100, 0., 4.),
                (100, 0., 4.),
            ),
            scalar_jet_mass: higgs_mass("scalarJetMass"),
        }
    }

    fn fill(&mut self, candidate: &ScalarCandidate, w: f64) {
        let (mu1, mu2) = candidate.muons.p;
        let dimuon = candidate.muons.sum();
        let muon_delta_r = candidate.muons.delta_r();
        self.leading_muon_pt.fill_weighted(mu1.pt(), w);
        self.subleading_muon_pt.fill_weighted(mu2.pt(), w);
        self.muon_delta_r.fill_weighted(muon_delta_r, w);
        self.dimuon_pt.fill_weighted(dimuon.pt(), w);
        self.muon_pt_over_delta_r
            .fill_weighted(dimuon.pt() / (muon_delta_r + 1e-6), w);
        self.muon_pt_vs_delta_r.fill_weighted(dimuon.pt(), muon_delta_r, w);
        self.dimuon_mass.fill_weighted(dimuon.m(), w);

        let (chs1, chs2) = candidate.hadrons.p;
        let dichs = candidate.hadrons.sum();
        let chs_delta_r = candidate.hadrons.delta_r();
        self.leading_chs_pt.fill_weighted(chs1.pt(), w);
        self.subleading_chs_pt.fill_weighted(chs2.pt(), w);
        if dichs.m() < MAX_DIHADRON_MASS_FOR_DELTA_R {
            self.chs_delta_r.fill_weighted(chs_delta_r, w);
        }
        self.dichs_pt.fill_weighted(dichs.pt(), w);
        self.dichs_pt_over_delta_r
            .fill_weighted(dichs.pt() / (chs_delta_r + 1e-6), w);
        self.dichs_pt_vs_delta_r.fill_weighted(dichs.pt(), chs_delta_r, w);
        self.dichs_mass.fill_weighted(dichs.m(), w);

        self.scalar_delta_r.fill_weighted(dimuon.delta_r(&dichs), w);
        self.scalar_masses.fill_weighted(dimuon.m(), dichs.m(), w);
        if let Some((p1, p2)) = candidate.muon_pseudo_tracks {
            self.scalar_masses_pseudo_track
                .fill_weighted((p1 + p2).m(), dichs.m(), w);
        }
        self.scalar_mass.fill_weighted((dimuon + dichs).m(), w);

        let refitted_dimuon = candidate.muons.refitted_sum();
        let refitted_dichs = candidate.hadrons.refitted_sum();
        if let Some(p) = refitted_dimuon {
            self.dimuon_refitted_mass.fill_weighted(p.m(), w);
        }
        if let Some(p) = refitted_dichs {
            self.dichs_refitted_mass.fill_weighted(p.m(), w);
        }
        if let (Some(mumu), Some(hh)) = (refitted_dimuon, refitted_dichs) {
            self.scalar_refitted_masses.fill_weighted(mumu.m(), hh.m(), w);
            self.scalar_refitted_mass.fill_weighted((mumu + hh).m(), w);
        }

        if let Some((jet1, jet2)) = candidate.jets {
            let dijet = jet1 + jet2;
            let jet_delta_r = jet1.delta_r(&jet2);
            self.leading_jet_pt.fill_weighted(jet1.pt(), w);
            self.subleading_jet_pt.fill_weighted(jet2.pt(), w);
            self.jet_delta_r.fill_weighted(jet_delta_r, w);
            self.dijet_pt.fill_weighted(dijet.pt(), w);
            self.dijet_pt_over_delta_r
                .fill_weighted(dijet.pt() / (jet_delta_r + 1e-6), w);
            self.dijet_pt_vs_delta_r.fill_weighted(dijet.pt(), jet_delta_r, w);
            self.dijet_mass.fill_weighted(dijet.m(), w);
            self.scalar_jet_delta_r.fill_weighted(dimuon.delta_r(&dijet), w);
            self.scalar_jet_masses.fill_weighted(dimuon.m(), dijet.m(), w);
            self.scalar_jet_mass.fill_weighted((dimuon + dijet).m(), w);
        }
    }

    fn into_histograms(self, set: &mut HistogramSet) {
        let h1 = [
            self.leading_muon_pt,
            self.subleading_muon_pt,
            self.muon_delta_r,
            self.dimuon_pt,
            self.muon_pt_over_delta_r,
        ];
        set.extend(h1.into_iter().map(Histogram::from));
        set.push(self.muon_pt_vs_delta_r);
        set.push(self.dimuon_mass);
        set.push(self.dimuon_refitted_mass);

        let h1 = [
            self.leading_chs_pt,
            self.subleading_chs_pt,
            self.chs_delta_r,
            self.dichs_pt,
            self.dichs_pt_over_delta_r,
        ];
        set.extend(h1.into_iter().map(Histogram::from));
        set.push(self.dichs_pt_vs_delta_r);
        set.push(self.dichs_mass);
        set.push(self.dichs_refitted_mass);

        set.push(self.scalar_delta_r);
        set.push(self.scalar_masses);
        set.push(self.scalar_masses_pseudo_track);
        set.push(self.scalar_refitted_masses);
        set.push(self.scalar_mass);
        set.push(self.scalar_refitted_mass);

        let h1 = [
            self.leading_jet_pt,
            self.subleading_jet_pt,
            self.jet_delta_r,
            self.dijet_pt,
            self.dijet_pt_over_delta_r,
        ];
        set.extend(h1.into_iter().map(Histogram::from));
        set.push(self.dijet_pt_vs_delta_r);
        set.push(self.dijet_mass);
        set.push(self.scalar_jet_delta_r);
        set.push(self.scalar_jet_masses);
        set.push(self.scalar_jet_mass);
    }
}

/// Reconstructed and generator pt/ΔR of muons from the scalar
#[derive(Clone, Debug)]
struct GenuineMuonHistograms {
    pt: Histogram1D,
    leading_pt: Histogram1D,
    subleading_pt: Histogram1D,
    delta_r: Histogram1D,
}

impl GenuineMuonHistograms {
    fn new(prefix: &str) -> Self {
        let pt = |name: String| Histogram1D::new(&name, ";p_{T}", 200, 0., 100.);
        Self {
            pt: pt(format!("h_{prefix}PtGenuine")),
            leading_pt: pt(format!("h_{prefix}1PtGenuine")),
            subleading_pt: pt(format!("h_{prefix}2PtGenuine")),
            delta_r: Histogram1D::new(
                &format!("h_{prefix}DeltaRGenuine"),
                "#DeltaR between muons from scalar decay; #DeltaR",
                500,
                0.,
                1.,
            ),
        }
    }

    fn into_histograms(self) -> [Histogram1D; 4] {
        [self.pt, self.leading_pt, self.subleading_pt, self.delta_r]
    }
}

/// Histograms of the scalar candidate reconstruction
#[derive(Clone, Debug)]
pub struct RecoPlotter {
    era: Era,
    mc_truth: bool,
    reco_genuine: GenuineMuonHistograms,
    gen_genuine: GenuineMuonHistograms,
    all: ScalarHistograms,
    triggered: ScalarHistograms,
}

impl RecoPlotter {
    /// With `mc_truth`, only muons from the scalar enter the selection
    pub fn new(era: Era, mc_truth: bool) -> Self {
        Self {
            era,
            mc_truth,
            reco_genuine: GenuineMuonHistograms::new("muon"),
            gen_genuine: GenuineMuonHistograms::new("genMuon"),
            all: ScalarHistograms::new("h"),
            triggered: ScalarHistograms::new("ht"),
        }
    }

    fn fill_genuine(&mut self, event: &AnalysisEvent, selected: (usize, usize), w: f64) {
        for muon in event.muons.iter().filter(|mu| mu.is_from(SCALAR)) {
            self.reco_genuine.pt.fill_weighted(muon.pt(), w);
            if let Some(truth) = &muon.gen {
                self.gen_genuine.pt.fill_weighted(truth.pt, w);
            }
        }

        let (mu1, mu2) = (&event.muons[selected.0], &event.muons[selected.1]);
        let genuine1 = mu1.gen.as_ref().filter(|_| mu1.is_from(SCALAR));
        let genuine2 = mu2.gen.as_ref().filter(|_| mu2.is_from(SCALAR));
        if let Some(truth) = genuine1 {
            self.reco_genuine.leading_pt.fill_weighted(mu1.pt(), w);
            self.gen_genuine.leading_pt.fill_weighted(truth.pt, w);
        }
        if let Some(truth) = genuine2 {
            self.reco_genuine.subleading_pt.fill_weighted(mu2.pt(), w);
            self.gen_genuine.subleading_pt.fill_weighted(truth.pt, w);
        }
        if let (Some(gen1), Some(gen2)) = (genuine1, genuine2) {
            self.reco_genuine.delta_r.fill_weighted(mu1.p.delta_r(&mu2.p), w);
            self.gen_genuine
                .delta_r
                .fill_weighted(delta_r(gen1.eta, gen1.phi, gen2.eta, gen2.phi), w);
        }
    }

    pub fn into_histograms(self) -> HistogramSet {
        let mut set = HistogramSet::new();
        let genuine = self.reco_genuine.into_histograms();
        set.extend(genuine.into_iter().map(Histogram::from));
        let genuine = self.gen_genuine.into_histograms();
        set.extend(genuine.into_iter().map(Histogram::from));
        self.all.into_histograms(&mut set);
        self.triggered.into_histograms(&mut set);
        set
    }
}

impl EventAnalysis for RecoPlotter {
    fn process(&mut self, event: &AnalysisEvent, dataset: &DatasetInfo<'_>) -> Result<()> {
        let w = dataset.weight;
        let loose = loose_muons(event, self.mc_truth);
        if loose.len() < 2 {
            return Ok(());
        }
        let Some(dimuon) = leading_dimuon(event, &loose) else {
            return Ok(());
        };
        self.fill_genuine(event, dimuon.index, w);

        if !self.era.passes_met_filters(event, dataset.is_mc()) {
            return Ok(());
        }
        let Some(candidate) = ScalarCandidate::find(event, &loose) else {
            return Ok(());
        };
        self.all.fill(&candidate, w);
        if self.era.any_muon_trigger(event) {
            self.triggered.fill(&candidate, w);
        }
        Ok(())
    }
}
