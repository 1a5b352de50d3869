//! Muon selection diagnostics
//!
//! Trigger turn-on curves, loose-muon identification and isolation
//! profiles, dimuon candidate kinematics and the ancestry of refitted
//! muon track pairs.
use log::debug;

use crate::{
    analysis::{DatasetInfo, EventAnalysis},
    error::Result,
    event::{AnalysisEvent, Muon, Track, TrackPair},
    genealogy::Genealogy,
    histogram::{Histogram1D, Histogram2D, HistogramSet, Profile},
    particles::{same_species, D_PLUS, D_S_PLUS, D_ZERO, KAON, SCALAR},
    selection::{closest_mass_dimuon, loose_muons, split_prompt, MAX_DIMUON_MASS},
    trigger::{Era, TriggerGroup},
};

/// Default scalar mass hypothesis in GeV
pub const DEFAULT_SCALAR_MASS: f64 = 2.0;

const ID_LABELS: [&str; 9] = [
    "Pass PF ID",
    "Pass Loose Cut ID",
    "Pass Medium Cut ID",
    "Pass Tight Cut ID",
    "Pass Very Loose Iso Cut",
    "Pass Loose Iso Cut",
    "Pass Medium Iso Cut",
    "Pass Tight Iso Cut",
    "Pass Very Tight Iso Cut",
];

const ANCESTRY_LABELS: [&str; 3] = ["Scalar parentage", "PromptFinalState", "HardProcess"];

const KAON_LABELS: [&str; 5] = ["No D meson", "D inc", "D#pm", "D0", "D^{#pm}_{S}"];

const TRACK_PAIR_LABELS: [&str; 4] = [
    "Both muon tracks genuine",
    "Leading muon track genuine",
    "Subleading muon track genuine",
    "Both tracks fake",
];

/// Leading/subleading pt and ΔR, before or after a trigger
#[derive(Clone, Debug)]
struct TurnOn {
    leading_pt: Histogram1D,
    subleading_pt: Histogram1D,
    delta_r: Histogram1D,
}

impl TurnOn {
    fn new(suffix: &str, title: &str) -> Self {
        Self {
            leading_pt: Histogram1D::new(
                &format!("h_leadingMuonPt{suffix}"),
                &format!("{title}; p_{{T}} (GeV); #epsilon"),
                200,
                0.,
                100.,
            ),
            subleading_pt: Histogram1D::new(
                &format!("h_subLeadingMuonPt{suffix}"),
                &format!("{title}; p_{{T}} (GeV); #epsilon"),
                200,
                0.,
                100.,
            ),
            delta_r: Histogram1D::new(
                &format!("h_delR{suffix}"),
                &format!("{title}; #DeltaR; #epsilon"),
                100,
                0.,
                1.,
            ),
        }
    }

    fn fill(&mut self, (mu1, mu2): (&Muon, &Muon)) {
        self.leading_pt.fill(mu1.pt());
        self.subleading_pt.fill(mu2.pt());
        self.delta_r.fill(mu1.p.delta_r(&mu2.p));
    }

    fn divide(&mut self, denominator: &TurnOn) -> Result<()> {
        self.leading_pt.divide(&denominator.leading_pt)?;
        self.subleading_pt.divide(&denominator.subleading_pt)?;
        self.delta_r.divide(&denominator.delta_r)
    }

    fn into_histograms(self) -> [Histogram1D; 3] {
        [self.leading_pt, self.subleading_pt, self.delta_r]
    }
}

/// Turn-on curves for the single, double and L2/no-vertex muon triggers
#[derive(Clone, Debug)]
struct TriggerTurnOns {
    all: TurnOn,
    single_muon: TurnOn,
    dimuon: TurnOn,
    l2_dimuon: TurnOn,
}

impl TriggerTurnOns {
    fn new(suffix: &str, sample: &str) -> Self {
        Self {
            all: TurnOn::new(suffix, &format!("All {sample} events")),
            single_muon: TurnOn::new(
                &format!("{suffix}_muTrig"),
                &format!("#mu trigger turn-on for {sample}"),
            ),
            dimuon: TurnOn::new(
                &format!("{suffix}_mumuTrig"),
                &format!("#mu#mu trigger turn-on for {sample}"),
            ),
            l2_dimuon: TurnOn::new(
                &format!("{suffix}_L2muTrig"),
                &format!("L2 #mu#mu trigger turn-on for {sample}"),
            ),
        }
    }

    fn fill(&mut self, muons: (&Muon, &Muon), fired: &FiredTriggers) {
        self.all.fill(muons);
        if fired.single_muon {
            self.single_muon.fill(muons);
        }
        if fired.dimuon {
            self.dimuon.fill(muons);
        }
        if fired.l2_dimuon {
            self.l2_dimuon.fill(muons);
        }
    }

    /// Efficiencies after dividing by the untriggered distributions
    fn into_histograms(mut self) -> Result<Vec<Histogram1D>> {
        for turn_on in [&mut self.single_muon, &mut self.dimuon, &mut self.l2_dimuon] {
            turn_on.divide(&self.all)?;
        }
        Ok([self.single_muon, self.dimuon, self.l2_dimuon]
            .into_iter()
            .flat_map(TurnOn::into_histograms)
            .collect())
    }
}

struct FiredTriggers {
    single_muon: bool,
    dimuon: bool,
    l2_dimuon: bool,
}

impl FiredTriggers {
    fn new(era: Era, event: &AnalysisEvent) -> Self {
        Self {
            single_muon: era.fired(TriggerGroup::SingleMuon, event),
            dimuon: era.fired(TriggerGroup::Dimuon, event),
            l2_dimuon: era.fired(TriggerGroup::L2Dimuon, event)
                || era.fired(TriggerGroup::DimuonNoVertex, event),
        }
    }
}

/// Kinematics and identification of loose muons
#[derive(Clone, Debug)]
struct MuonHistograms {
    id: Profile,
    pt: Histogram1D,
    eta: Histogram1D,
    phi: Histogram1D,
    rel_iso: Histogram1D,
    dz: Histogram1D,
    dxy: Histogram1D,
    pdg_id: Histogram1D,
    mother_id: Histogram1D,
}

impl MuonHistograms {
    fn new(profile: &str, prefix: &str, desc: &str) -> Self {
        let h = |var: &str, bins, lo, hi| {
            Histogram1D::new(
                &format!("h_{prefix}Muon{var}"),
                &format!("{desc} muon {var}"),
                bins,
                lo,
                hi,
            )
        };
        Self {
            id: Profile::labelled(profile, &format!("{desc} muon ID and isolation"), &ID_LABELS),
            pt: h("Pt", 400, 0., 200.),
            eta: h("Eta", 120, 0., 3.2),
            phi: h("Phi", 300, -3.2, 3.2),
            rel_iso: h("RelIso", 500, 0., 1.),
            dz: h("Dz", 500, 0., 1.),
            dxy: h("Dxy", 500, 0., 1.),
            pdg_id: h("PdgId", 501, -0.5, 500.5),
            mother_id: h("MotherId", 502, -1.5, 500.5),
        }
    }

    fn fill(&mut self, muon: &Muon) {
        let iso = &muon.pf_iso;
        let flags = [
            muon.is_pf,
            muon.loose_id,
            muon.medium_id,
            muon.tight_id,
            iso.very_loose,
            iso.loose,
            iso.medium,
            iso.tight,
            iso.very_tight,
        ];
        for (label, flag) in flags.into_iter().enumerate() {
            self.id.fill_flag(label + 1, flag);
        }
        // scalar mothers go to the dedicated first bin
        let mother_id = match muon.gen_mother_id().abs() {
            id if id == SCALAR.id() => -1,
            id => id,
        };
        let pdg_id = muon.gen.as_ref().map(|g| g.pdg_id.abs()).unwrap_or_default();

        self.pt.fill(muon.pt());
        self.eta.fill(muon.eta().abs());
        self.phi.fill(muon.phi());
        self.rel_iso.fill(muon.rel_iso);
        self.dz.fill(muon.dz);
        self.dxy.fill(muon.dxy);
        self.pdg_id.fill(pdg_id.into());
        self.mother_id.fill(mother_id.into());
    }

    fn into_histograms(self, set: &mut HistogramSet) {
        set.push(self.id);
        for h in [
            self.pt,
            self.eta,
            self.phi,
            self.rel_iso,
            self.dz,
            self.dxy,
            self.pdg_id,
            self.mother_id,
        ] {
            set.push(h);
        }
    }
}

/// Fitted vertex quantities of muon track pairs
#[derive(Clone, Debug)]
struct VertexHistograms {
    px: Histogram1D,
    py: Histogram1D,
    pz: Histogram1D,
    p2: Histogram1D,
    vx: Histogram1D,
    vy: Histogram1D,
    vz: Histogram1D,
    v_abs: Histogram1D,
    chi2_ndof: Histogram1D,
    angle_xy: Histogram1D,
    angle_xyz: Histogram1D,
    sig_xy: Histogram1D,
    sig_xyz: Histogram1D,
    dca: Histogram1D,
}

impl VertexHistograms {
    fn new(prefix: &str, desc: &str) -> Self {
        let h = |var: &str, title: &str, bins, lo, hi| {
            Histogram1D::new(
                &format!("h_{prefix}Mu{var}"),
                &format!("{desc} Muon Vertex {title}"),
                bins,
                lo,
                hi,
            )
        };
        Self {
            px: h("VtxPx", "p_{x}; p_{x} (GeV);", 1000, -300., 300.),
            py: h("VtxPy", "p_{y}; p_{y} (GeV);", 1000, -300., 300.),
            pz: h("VtxPz", "p_{z}; p_{z} (GeV);", 1000, -300., 300.),
            p2: h("VtxP2", "p^{2}; p^{2} (GeV)^{2};", 800, 0., 400.),
            vx: h("TrkVx", "v_{x}; v_{x} (cm)", 400, -100., 100.),
            vy: h("TrkVy", "v_{y}; v_{y} (cm)", 400, -100., 100.),
            vz: h("TrkVz", "v_{z}; v_{z} (cm)", 400, -100., 100.),
            v_abs: h("TrkVabs", "v; v (cm)", 400, 0., 200.),
            chi2_ndof: h("VtxChi2Ndof", "#chi^{2}/N_{dof}; #chi^{2}/N_{dof}", 500, 0., 100.),
            angle_xy: h("VtxAngleXY", "2D angle; 2D angle", 120, -1.5, 1.5),
            angle_xyz: h("VtxAngleXYZ", "3D angle; 3D angle", 120, -1.5, 1.5),
            sig_xy: h("VtxSigXY", "XY Significance; XY Significance", 600, 0., 300.),
            sig_xyz: h("VtxSigXYZ", "XYZ Significance; XYZ Significance", 100, 0., 5.),
            dca: h("TrkDca", "tracks' distance of closest approach; dca (cm)", 100, 0., 50.),
        }
    }

    fn fill(&mut self, pair: &TrackPair) {
        let vx = &pair.vertex;
        self.px.fill(vx.px);
        self.py.fill(vx.py);
        self.pz.fill(vx.pz);
        self.p2.fill(vx.p2.sqrt());
        self.vx.fill(vx.x);
        self.vy.fill(vx.y);
        self.vz.fill(vx.z);
        self.v_abs.fill(vx.abs_position());
        self.chi2_ndof.fill(vx.norm_chi2());
        self.angle_xy.fill(vx.angle_xy);
        self.angle_xyz.fill(vx.angle_xyz);
        self.sig_xy.fill(vx.significance_xy());
        self.sig_xyz.fill(vx.significance_xyz());
        self.dca.fill(vx.dca_pre_fit);
    }

    fn into_histograms(self) -> [Histogram1D; 14] {
        [
            self.px,
            self.py,
            self.pz,
            self.p2,
            self.vx,
            self.vy,
            self.vz,
            self.v_abs,
            self.chi2_ndof,
            self.angle_xy,
            self.angle_xyz,
            self.sig_xy,
            self.sig_xyz,
            self.dca,
        ]
    }
}

/// Inner track before and after the common vertex fit
#[derive(Clone, Debug)]
struct TrackHistograms {
    original_pt: Histogram1D,
    original_eta: Histogram1D,
    original_chi2_ndof: Histogram1D,
    refitted_pt: Histogram1D,
    refitted_eta: Histogram1D,
    refitted_chi2_ndof: Histogram1D,
}

impl TrackHistograms {
    fn new(kind: &str, desc: &str, track: usize) -> Self {
        let h = |stage: &str, var: &str, title: &str, bins, lo, hi| {
            Histogram1D::new(
                &format!("h_{stage}{kind}MuTrk{var}{track}"),
                &format!("{title} ({desc})"),
                bins,
                lo,
                hi,
            )
        };
        Self {
            original_pt: h("original", "Pt", "Pre-refit track p_{T}", 400, 0., 200.),
            original_eta: h("original", "Eta", "Pre-refit track #eta", 600, -3., 3.),
            original_chi2_ndof: h(
                "original",
                "Chi2Ndof",
                "Pre-refit track #chi^{2}/N_{dof}",
                500,
                0.,
                100.,
            ),
            refitted_pt: h("refitted", "Pt", "Refitted track p_{T}", 400, 0., 200.),
            refitted_eta: h("refitted", "Eta", "Refitted track #eta", 600, -3., 3.),
            refitted_chi2_ndof: h(
                "refitted",
                "Chi2Ndof",
                "Refitted track #chi^{2}/N_{dof}",
                500,
                0.,
                100.,
            ),
        }
    }

    fn fill(&mut self, muon: &Muon, refitted: &Track) {
        self.original_pt.fill(muon.inner_pt);
        self.original_eta.fill(muon.inner_eta);
        self.original_chi2_ndof.fill(muon.inner_norm_chi2);
        self.refitted_pt.fill(refitted.pt);
        self.refitted_eta.fill(refitted.eta);
        self.refitted_chi2_ndof.fill(refitted.norm_chi2());
    }

    fn into_histograms(self) -> [Histogram1D; 6] {
        [
            self.original_pt,
            self.original_eta,
            self.original_chi2_ndof,
            self.refitted_pt,
            self.refitted_eta,
            self.refitted_chi2_ndof,
        ]
    }
}

/// Origin of the two muons of a track pair
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum PairAncestry {
    Genuine,
    LeadingGenuine,
    SubleadingGenuine,
    Fake,
}

impl PairAncestry {
    fn new(first_genuine: bool, second_genuine: bool) -> Self {
        match (first_genuine, second_genuine) {
            (true, true) => Self::Genuine,
            (true, false) => Self::LeadingGenuine,
            (false, true) => Self::SubleadingGenuine,
            (false, false) => Self::Fake,
        }
    }

    /// Position in [TRACK_PAIR_LABELS]
    fn label(self) -> usize {
        match self {
            Self::Genuine => 1,
            Self::LeadingGenuine => 2,
            Self::SubleadingGenuine => 3,
            Self::Fake => 4,
        }
    }
}

fn from_scalar(event: &AnalysisEvent, idx: usize) -> bool {
    event.muons.get(idx).is_some_and(|mu| mu.is_from(SCALAR))
}

/// Histograms of the muon selection study
#[derive(Clone, Debug)]
pub struct QuickPlotter {
    era: Era,
    scalar_mass: f64,
    exactly_two: bool,

    kaon_ancestry: Profile,

    turn_on: TriggerTurnOns,
    turn_on_truth: TriggerTurnOns,

    num_muons: Histogram1D,
    num_muons_from_scalar: Histogram1D,
    num_muons_prompt_final_state: Histogram1D,
    num_muons_hard_process: Histogram1D,

    prompt: MuonHistograms,
    nonprompt: MuonHistograms,

    dimuon_mass: Histogram1D,
    dimuon_pt: Histogram1D,
    dimuon_eta: Histogram1D,
    rel_iso_vs_eta: [Histogram2D; 2],
    dxy_vs_dz: [Histogram2D; 2],
    muon_ancestry: [Profile; 2],

    track_pair_ancestry: Profile,
    selected_track_matching: Profile,
    vertex_all: VertexHistograms,
    vertex_genuine: VertexHistograms,
    vertex_combinatorial: VertexHistograms,
    vertex_fake: VertexHistograms,
    tracks_genuine: [TrackHistograms; 2],
    tracks_fake: [TrackHistograms; 2],
}

impl QuickPlotter {
    pub fn new(era: Era, scalar_mass: f64, exactly_two: bool) -> Self {
        let multiplicity = |name: &str, title: &str| {
            Histogram1D::new(name, title, 21, -0.5, 20.5)
        };
        let rel_iso_vs_eta = |n: usize| {
            Histogram2D::new(
                &format!("h_relIsoVsEta{n}"),
                &format!("Muon {n} relIso vs #eta; #eta; rel. iso"),
                (300, -3., 3.),
                (100, 0., 1.),
            )
        };
        let dxy_vs_dz = |n: usize| {
            Histogram2D::new(
                &format!("h_dxyVsDz{n}"),
                &format!("Muon {n} d_{{xy}} vs d_{{z}}; d_{{z}} (cm); d_{{xy}} (cm)"),
                (500, 0., 1.),
                (500, 0., 1.),
            )
        };
        Self {
            era,
            scalar_mass,
            exactly_two,
            kaon_ancestry: Profile::labelled(
                "p_kaonAncestry",
                "Ancestry of kaons from scalar decays",
                &KAON_LABELS,
            ),
            turn_on: TriggerTurnOns::new("", "all muons"),
            turn_on_truth: TriggerTurnOns::new("_truth", "signal"),
            num_muons: multiplicity("h_numMuons", "Number of loose muons"),
            num_muons_from_scalar: multiplicity(
                "h_numMuonsFromScalar",
                "Number of loose muons from scalar decays",
            ),
            num_muons_prompt_final_state: multiplicity(
                "h_numMuonsPromptFinalState",
                "Number of prompt final state loose muons",
            ),
            num_muons_hard_process: multiplicity(
                "h_numMuonsHardProcess",
                "Number of hard process loose muons",
            ),
            prompt: MuonHistograms::new("p_hardMuonsIdProfile", "prompt", "Hard process"),
            nonprompt: MuonHistograms::new("p_softMuonsIdProfile", "nonprompt", "Non hard process"),
            dimuon_mass: Histogram1D::new(
                "h_recoDimuonMass",
                "Dimuon reco mass; m_{#mu#mu} (GeV)",
                30,
                0.,
                11.,
            ),
            dimuon_pt: Histogram1D::new(
                "h_recoDimuonPt",
                "Dimuon reco p_{T}; p_{T} (GeV)",
                200,
                0.,
                200.,
            ),
            dimuon_eta: Histogram1D::new("h_recoDimuonEta", "Dimuon reco #eta; #eta", 60, 0., 5.),
            rel_iso_vs_eta: [rel_iso_vs_eta(1), rel_iso_vs_eta(2)],
            dxy_vs_dz: [dxy_vs_dz(1), dxy_vs_dz(2)],
            muon_ancestry: [
                Profile::labelled(
                    "p_leadingMuonsProfile",
                    "Leading selected muon ancestry",
                    &ANCESTRY_LABELS,
                ),
                Profile::labelled(
                    "p_subleadingMuonsProfile",
                    "Subleading selected muon ancestry",
                    &ANCESTRY_LABELS,
                ),
            ],
            track_pair_ancestry: Profile::labelled(
                "p_muonTrackPairsAncestry",
                "Muon track pairs per event by ancestry",
                &TRACK_PAIR_LABELS,
            ),
            selected_track_matching: Profile::labelled(
                "p_selectedMuonTrkMatching",
                "Ancestry of the track pair of the selected muons",
                &TRACK_PAIR_LABELS,
            ),
            vertex_all: VertexHistograms::new("", "All"),
            vertex_genuine: VertexHistograms::new("gen", "Genuine"),
            vertex_combinatorial: VertexHistograms::new("comb", "Comb"),
            vertex_fake: VertexHistograms::new("fake", "Fake"),
            tracks_genuine: [
                TrackHistograms::new("Gen", "genuine", 1),
                TrackHistograms::new("Gen", "genuine", 2),
            ],
            tracks_fake: [
                TrackHistograms::new("Fake", "fake", 1),
                TrackHistograms::new("Fake", "fake", 2),
            ],
        }
    }

    fn fill_kaon_ancestry(&mut self, event: &AnalysisEvent) {
        if event.gen_particles.is_empty() {
            return;
        }
        let genealogy = Genealogy::new(&event.gen_particles);
        for (idx, particle) in event.gen_particles.iter().enumerate() {
            if !same_species(particle.id(), KAON) || !genealogy.has_ancestor(idx, SCALAR) {
                continue;
            }
            let d_plus = genealogy.has_ancestor(idx, D_PLUS);
            let d_zero = genealogy.has_ancestor(idx, D_ZERO);
            let d_s = genealogy.has_ancestor(idx, D_S_PLUS);
            let any_d = d_plus || d_zero || d_s;
            self.kaon_ancestry.fill_flag(1, !any_d);
            self.kaon_ancestry.fill_flag(2, any_d);
            self.kaon_ancestry.fill_flag(3, d_plus);
            self.kaon_ancestry.fill_flag(4, d_zero);
            self.kaon_ancestry.fill_flag(5, d_s);
        }
    }

    fn fill_turn_on(&mut self, event: &AnalysisEvent) {
        let muons = &event.muons;
        if muons.len() < 2 {
            return;
        }
        let fired = FiredTriggers::new(self.era, event);
        self.turn_on.fill((&muons[0], &muons[1]), &fired);

        let mut truth = muons.iter().filter(|mu| mu.is_from(SCALAR));
        if let (Some(mu1), Some(mu2)) = (truth.next(), truth.next()) {
            self.turn_on_truth.fill((mu1, mu2), &fired);
        }
    }

    fn fill_loose_muons(&mut self, event: &AnalysisEvent, loose: &[usize]) {
        let muons = || loose.iter().map(|&idx| &event.muons[idx]);
        let count = |pred: fn(&Muon) -> bool| muons().filter(|mu| pred(mu)).count() as f64;
        self.num_muons.fill(loose.len() as f64);
        self.num_muons_from_scalar.fill(count(|mu| mu.is_from(SCALAR)));
        self.num_muons_prompt_final_state.fill(count(Muon::prompt_final_state));
        self.num_muons_hard_process.fill(count(Muon::hard_process));

        let (prompt, nonprompt) = split_prompt(event, loose);
        for idx in prompt {
            self.prompt.fill(&event.muons[idx]);
        }
        for idx in nonprompt {
            self.nonprompt.fill(&event.muons[idx]);
        }
    }

    fn fill_track_pairs(&mut self, event: &AnalysisEvent, selected: (usize, usize)) {
        let mut per_class = [0u32; 4];
        for pair in &event.muon_track_pairs {
            let (genuine1, genuine2) = (from_scalar(event, pair.index1), from_scalar(event, pair.index2));
            let ancestry = PairAncestry::new(genuine1, genuine2);
            per_class[ancestry.label() - 1] += 1;

            if (pair.index1, pair.index2) == selected {
                for (label, _) in TRACK_PAIR_LABELS.iter().enumerate() {
                    self.selected_track_matching
                        .fill_flag(label + 1, label + 1 == ancestry.label());
                }
            }

            self.vertex_all.fill(pair);
            match ancestry {
                PairAncestry::Genuine => self.vertex_genuine.fill(pair),
                PairAncestry::LeadingGenuine | PairAncestry::SubleadingGenuine => {
                    self.vertex_combinatorial.fill(pair)
                }
                PairAncestry::Fake => self.vertex_fake.fill(pair),
            }

            let tracks = [
                (pair.index1, &pair.track1, genuine1),
                (pair.index2, &pair.track2, genuine2),
            ];
            for (n, (idx, track, genuine)) in tracks.into_iter().enumerate() {
                let Some(muon) = event.muons.get(idx) else {
                    debug!("Track pair refers to missing muon {idx}");
                    continue;
                };
                if genuine {
                    self.tracks_genuine[n].fill(muon, track);
                } else {
                    self.tracks_fake[n].fill(muon, track);
                }
            }
        }
        for (label, count) in per_class.into_iter().enumerate() {
            self.track_pair_ancestry.fill((label + 1) as f64, count.into());
        }
    }

    /// Final histograms, with the trigger turn-ons as efficiencies
    pub fn into_histograms(self) -> Result<HistogramSet> {
        let mut set = HistogramSet::new();
        set.push(self.kaon_ancestry);
        for h in self.turn_on_truth.into_histograms()? {
            set.push(h);
        }
        for h in self.turn_on.into_histograms()? {
            set.push(h);
        }
        for h in [
            self.num_muons,
            self.num_muons_from_scalar,
            self.num_muons_prompt_final_state,
            self.num_muons_hard_process,
        ] {
            set.push(h);
        }
        self.prompt.into_histograms(&mut set);
        self.nonprompt.into_histograms(&mut set);
        for h in [self.dimuon_mass, self.dimuon_pt, self.dimuon_eta] {
            set.push(h);
        }
        for h in self.rel_iso_vs_eta.into_iter().chain(self.dxy_vs_dz) {
            set.push(h);
        }
        for p in self.muon_ancestry {
            set.push(p);
        }
        set.push(self.track_pair_ancestry);
        set.push(self.selected_track_matching);
        for vertex in [
            self.vertex_all,
            self.vertex_genuine,
            self.vertex_combinatorial,
            self.vertex_fake,
        ] {
            for h in vertex.into_histograms() {
                set.push(h);
            }
        }
        let [genuine1, genuine2] = self.tracks_genuine;
        let [fake1, fake2] = self.tracks_fake;
        for tracks in [genuine1, fake1, genuine2, fake2] {
            for h in tracks.into_histograms() {
                set.push(h);
            }
        }
        Ok(set)
    }
}

impl EventAnalysis for QuickPlotter {
    fn process(&mut self, event: &AnalysisEvent, dataset: &DatasetInfo<'_>) -> Result<()> {
        self.fill_kaon_ancestry(event);

        if !self.era.passes_met_filters(event, dataset.is_mc()) {
            return Ok(());
        }
        self.fill_turn_on(event);

        let loose = loose_muons(event, false);
        self.fill_loose_muons(event, &loose);

        if loose.len() != 2 {
            return Ok(());
        }
        let Some(dimuon) = closest_mass_dimuon(event, &loose, self.scalar_mass, self.exactly_two)
        else {
            return Ok(());
        };
        let p = dimuon.sum();
        if p.m() > MAX_DIMUON_MASS {
            return Ok(());
        }
        let weight = dataset.weight;
        self.dimuon_mass.fill_weighted(p.m(), weight);
        self.dimuon_pt.fill_weighted(p.pt(), weight);
        self.dimuon_eta.fill_weighted(p.eta(), weight);

        let (i, j) = dimuon.index;
        let selected = [
            (&event.muons[i], dimuon.p.0, dimuon.rel_iso.0),
            (&event.muons[j], dimuon.p.1, dimuon.rel_iso.1),
        ];
        for (n, (muon, p, rel_iso)) in selected.into_iter().enumerate() {
            self.rel_iso_vs_eta[n].fill_weighted(p.eta(), rel_iso, weight);
            self.dxy_vs_dz[n].fill_weighted(muon.dz, muon.dxy, weight);
            let ancestry = &mut self.muon_ancestry[n];
            ancestry.fill_flag(1, muon.is_from(SCALAR));
            ancestry.fill_flag(2, muon.prompt_final_state());
            ancestry.fill_flag(3, muon.hard_process());
        }

        self.fill_track_pairs(event, dimuon.index);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Dataset,
        event::{GenMatch, GenParticle, PairVertex},
        momentum::FourVector,
        particles::MUON_MASS,
    };

    const FILTERS_2017_MC: [&str; 7] = [
        "Flag_HBHENoiseFilter",
        "Flag_HBHENoiseIsoFilter",
        "Flag_EcalDeadCellTriggerPrimitiveFilter",
        "Flag_goodVertices",
        "Flag_globalSuperTightHalo2016Filter",
        "Flag_BadPFMuonFilter",
        "Flag_ecalBadCalibFilter",
    ];

    fn signal() -> Dataset {
        Dataset {
            name: "HToSS".to_owned(),
            locations: Vec::new(),
            tree: String::new(),
            is_mc: true,
            cross_section: 1.,
            total_events: 1.,
            trigger_flag: String::new(),
            plot_label: String::new(),
        }
    }

    fn muon(pt: f64, phi: f64, charge: i32, mother_id: i32) -> Muon {
        let p = FourVector::from_pt_eta_phi_e(pt, 0.5, phi, 0.);
        Muon {
            p: FourVector::from_p_m(p.px(), p.py(), p.pz(), MUON_MASS),
            charge,
            is_pf: true,
            loose_id: true,
            rel_iso: 0.1,
            dxy: 0.01,
            dz: 0.02,
            inner_pt: pt,
            inner_eta: 0.5,
            gen: Some(GenMatch {
                pdg_id: 13 * charge,
                mother_id,
                hard_process: mother_id == SCALAR.id(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn event() -> AnalysisEvent {
        AnalysisEvent {
            filters: FILTERS_2017_MC.iter().map(|f| f.to_string()).collect(),
            triggers: ["HLT_IsoMu27_v3".to_owned()].into(),
            muons: vec![muon(30., 0., 1, 9000006), muon(20., 0.2, -1, 9000006)],
            muon_track_pairs: vec![
                TrackPair {
                    index1: 0,
                    index2: 1,
                    track1: Track { pt: 29., eta: 0.5, chi2: 2., ndof: 1., ..Default::default() },
                    track2: Track { pt: 19., eta: 0.5, ..Default::default() },
                    vertex: PairVertex { dist_xyz: 1., dist_xyz_sigma: 0.5, ..Default::default() },
                },
                TrackPair { index1: 1, index2: 7, ..Default::default() },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn selected_dimuon() {
        let ds = signal();
        let info = DatasetInfo { dataset: &ds, weight: 0.5 };
        let mut plotter = QuickPlotter::new(Era::Y2017, DEFAULT_SCALAR_MASS, true);
        plotter.process(&event(), &info).unwrap();
        let set = plotter.into_histograms().unwrap();

        let mass = set.h1("h_recoDimuonMass").unwrap();
        assert_eq!(mass.integral(), 0.5);
        assert_eq!(set.h1("h_numMuons").unwrap().content(3), 1.);
        assert_eq!(set.h1("h_numMuonsHardProcess").unwrap().content(3), 1.);

        let ancestry = set.profile("p_leadingMuonsProfile").unwrap();
        assert_eq!(ancestry.mean(1), 1.);
        assert_eq!(ancestry.mean(2), 0.);

        let matching = set.profile("p_selectedMuonTrkMatching").unwrap();
        assert_eq!(matching.mean(1), 1.);
        assert_eq!(matching.mean(4), 0.);
        let pairs = set.profile("p_muonTrackPairsAncestry").unwrap();
        assert_eq!(pairs.mean(1), 1.);
        assert_eq!(pairs.mean(3), 0.);
        assert_eq!(pairs.mean(4), 0.);
        assert_eq!(set.profile("p_hardMuonsIdProfile").unwrap().mean(1), 1.);
    }

    #[test]
    fn vertex_classes() {
        let ds = signal();
        let info = DatasetInfo { dataset: &ds, weight: 1. };
        let mut plotter = QuickPlotter::new(Era::Y2017, DEFAULT_SCALAR_MASS, false);
        plotter.process(&event(), &info).unwrap();
        let set = plotter.into_histograms().unwrap();

        assert_eq!(set.h1("h_MuVtxPx").unwrap().integral(), 2.);
        assert_eq!(set.h1("h_genMuVtxPx").unwrap().integral(), 1.);
        // index 7 is missing, so the second pair is combinatorial
        assert_eq!(set.h1("h_combMuVtxPx").unwrap().integral(), 1.);
        assert_eq!(set.h1("h_fakeMuVtxPx").unwrap().integral(), 0.);

        let sig = set.h1("h_genMuVtxSigXYZ").unwrap();
        assert_eq!(sig.find_bin(2.), 41);
        assert_eq!(sig.content(40), 1.);

        // both pairs start with a muon from the scalar
        let chi2 = set.h1("h_refittedGenMuTrkChi2Ndof1").unwrap();
        assert_eq!(chi2.integral(), 2.);
        assert_eq!(set.h1("h_originalGenMuTrkPt2").unwrap().integral(), 1.);
        assert_eq!(set.h1("h_originalGenMuTrkPt1").unwrap().integral(), 2.);
    }

    #[test]
    fn trigger_turn_on() {
        let ds = signal();
        let info = DatasetInfo { dataset: &ds, weight: 1. };
        let mut plotter = QuickPlotter::new(Era::Y2017, DEFAULT_SCALAR_MASS, true);
        let mut untriggered = event();
        untriggered.triggers.clear();
        plotter.process(&event(), &info).unwrap();
        plotter.process(&untriggered, &info).unwrap();
        let set = plotter.into_histograms().unwrap();

        let eff = set.h1("h_leadingMuonPt_truth_muTrig").unwrap();
        let bin = eff.find_bin(30.);
        assert!((eff.content(bin) - 0.5).abs() < 1e-12);
        assert_eq!(set.h1("h_leadingMuonPt_mumuTrig").unwrap().integral(), 0.);
        assert!(set.h1("h_leadingMuonPt").is_none());
    }

    #[test]
    fn met_filters_required() {
        let ds = signal();
        let info = DatasetInfo { dataset: &ds, weight: 1. };
        let mut plotter = QuickPlotter::new(Era::Y2017, DEFAULT_SCALAR_MASS, true);
        let mut ev = event();
        ev.filters.clear();
        plotter.process(&ev, &info).unwrap();
        let set = plotter.into_histograms().unwrap();
        assert_eq!(set.h1("h_numMuons").unwrap().integral(), 0.);
    }

    #[test]
    fn kaons_from_d_mesons() {
        let gen = |pdg_id: i32, mother_id: i32, mother_index: Option<usize>| GenParticle {
            pdg_id,
            mother_id,
            mother_index,
            ..Default::default()
        };
        let ev = AnalysisEvent {
            gen_particles: vec![
                gen(9000006, 25, None),
                gen(421, 9000006, Some(0)),
                gen(-321, 421, Some(1)),
                gen(321, 9000006, Some(0)),
                gen(321, 1, None),
            ],
            ..Default::default()
        };
        let mut plotter = QuickPlotter::new(Era::Y2017, DEFAULT_SCALAR_MASS, true);
        plotter.fill_kaon_ancestry(&ev);
        let p = &plotter.kaon_ancestry;
        assert_eq!(p.sum_of_weights(1), 2.);
        assert_eq!(p.mean(1), 0.5);
        assert_eq!(p.mean(4), 0.5);
        assert_eq!(p.mean(3), 0.);
    }
}
