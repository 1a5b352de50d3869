use std::collections::BTreeSet;

use particle_id::ParticleID;
use serde::{Deserialize, Serialize};

use crate::momentum::FourVector;

/// A reconstructed collision event
///
/// Collections hold all stored objects. Selections refer to them by
/// index.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisEvent {
    /// Run number
    pub run: u32,
    /// Luminosity block
    pub lumi_block: u32,
    /// Event number
    pub event_number: u64,
    /// Number of reconstructed primary vertices
    pub num_vertices: u32,
    /// HLT paths that fired, including their version suffix
    pub triggers: BTreeSet<String>,
    /// MET filter flags that passed
    pub filters: BTreeSet<String>,
    pub electrons: Vec<Electron>,
    pub muons: Vec<Muon>,
    /// Packed particle-flow candidates
    pub packed_cands: Vec<PackedCandidate>,
    /// Refitted vertices of muon track pairs
    pub muon_track_pairs: Vec<TrackPair>,
    /// Refitted vertices of charged-hadron track pairs
    pub chs_track_pairs: Vec<TrackPair>,
    pub jets: Vec<Jet>,
    /// Generator-level particles, empty for data
    pub gen_particles: Vec<GenParticle>,
}

impl AnalysisEvent {
    /// Whether a trigger path fired, in any version
    ///
    /// `stem` is the path name without the `_vN` suffix.
    pub fn fired(&self, stem: &str) -> bool {
        self.triggers
            .iter()
            .any(|path| strip_version(path) == stem)
    }

    pub fn passed_filter(&self, flag: &str) -> bool {
        self.filters.contains(flag)
    }
}

fn strip_version(path: &str) -> &str {
    if let Some((stem, version)) = path.rsplit_once("_v") {
        if !version.is_empty() && version.bytes().all(|b| b.is_ascii_digit()) {
            return stem;
        }
    }
    path
}

/// A particle-flow electron
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Electron {
    /// GSF track four-momentum
    pub gsf_p: FourVector,
    pub charge: i32,
    pub is_gsf: bool,
    /// Supercluster pseudorapidity
    pub sc_eta: f64,
    /// σ_iηiη in a 5x5 crystal matrix
    pub sigma_ieta_ieta: f64,
    /// Δη between supercluster and track
    pub delta_eta_sc: f64,
    /// Δφ between supercluster and track
    pub delta_phi_sc: f64,
    pub h_over_e: f64,
    /// Combined relative isolation with ρ correction
    pub rel_iso_rho: f64,
    /// Supercluster energy over track momentum
    pub sc_e_over_p: f64,
    pub ecal_energy: f64,
    /// Transverse impact parameter
    pub d0: f64,
    /// Longitudinal impact parameter
    pub dz: f64,
    pub missing_inner_layers: u32,
    pub photon_conversion_tag: bool,
}

/// A particle-flow muon
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Muon {
    pub p: FourVector,
    pub charge: i32,
    pub is_pf: bool,
    pub tracker_id: bool,
    pub global_id: bool,
    pub loose_id: bool,
    pub medium_id: bool,
    pub tight_id: bool,
    pub pf_iso: PfIsolation,
    /// Combined relative isolation with Δβ correction
    pub rel_iso: f64,
    pub chi2: f64,
    pub ndof: f64,
    pub tracker_layers: u32,
    pub muon_hits: u32,
    pub pixel_hits: u32,
    pub matched_stations: u32,
    /// Transverse impact parameter w.r.t. the primary vertex
    pub dxy: f64,
    /// Longitudinal impact parameter w.r.t. the primary vertex
    pub dz: f64,
    /// Inner track transverse momentum
    pub inner_pt: f64,
    /// Inner track pseudorapidity
    pub inner_eta: f64,
    /// Inner track χ²/ndof
    pub inner_norm_chi2: f64,
    /// Index into the packed candidates
    pub packed_cand_index: Option<usize>,
    /// Generator particle matched to this muon
    pub gen: Option<GenMatch>,
}

impl Muon {
    pub fn pt(&self) -> f64 {
        self.p.pt()
    }

    pub fn eta(&self) -> f64 {
        self.p.eta()
    }

    pub fn phi(&self) -> f64 {
        self.p.phi()
    }

    /// PDG id of the mother of the matched generator particle, 0 if unmatched
    pub fn gen_mother_id(&self) -> i32 {
        self.gen.as_ref().map(|g| g.mother_id).unwrap_or_default()
    }

    pub fn is_from(&self, mother: ParticleID) -> bool {
        self.gen_mother_id() == mother.id()
    }

    pub fn prompt_final_state(&self) -> bool {
        self.gen.as_ref().map(|g| g.prompt_final_state).unwrap_or_default()
    }

    pub fn hard_process(&self) -> bool {
        self.gen.as_ref().map(|g| g.hard_process).unwrap_or_default()
    }

    pub fn prompt_decayed(&self) -> bool {
        self.gen.as_ref().map(|g| g.prompt_decayed).unwrap_or_default()
    }
}

/// Particle-flow isolation working points
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PfIsolation {
    pub very_loose: bool,
    pub loose: bool,
    pub medium: bool,
    pub tight: bool,
    pub very_tight: bool,
}

/// Generator information matched to a reconstructed object
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenMatch {
    pub pdg_id: i32,
    pub mother_id: i32,
    pub pt: f64,
    pub eta: f64,
    pub phi: f64,
    pub prompt_final_state: bool,
    pub hard_process: bool,
    pub prompt_decayed: bool,
}

/// Packed particle-flow candidate
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackedCandidate {
    pub pdg_id: i32,
    pub charge: i32,
    pub has_track_details: bool,
    /// Momentum of the pseudo-track with the candidate energy
    pub p: FourVector,
    /// Index of the jet the candidate is clustered into
    pub jet_index: Option<usize>,
}

impl PackedCandidate {
    pub fn pt(&self) -> f64 {
        self.p.pt()
    }
}

/// A refitted track
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Track {
    pub px: f64,
    pub py: f64,
    pub pz: f64,
    pub pt: f64,
    pub eta: f64,
    pub chi2: f64,
    pub ndof: f64,
}

impl Track {
    /// Four-momentum under a mass hypothesis
    pub fn momentum(&self, mass: f64) -> FourVector {
        FourVector::from_p_m(self.px, self.py, self.pz, mass)
    }

    pub fn norm_chi2(&self) -> f64 {
        self.chi2 / (self.ndof + 1e-6)
    }
}

/// Two tracks refitted to a common vertex
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackPair {
    /// Index of the first object in its collection
    pub index1: usize,
    /// Index of the second object in its collection
    pub index2: usize,
    pub track1: Track,
    pub track2: Track,
    pub vertex: PairVertex,
}

/// Fitted vertex of a track pair
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairVertex {
    pub px: f64,
    pub py: f64,
    pub pz: f64,
    /// Squared momentum
    pub p2: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub chi2: f64,
    pub ndof: f64,
    pub angle_xy: f64,
    pub angle_xyz: f64,
    pub dist_xy: f64,
    pub dist_xy_sigma: f64,
    pub dist_xyz: f64,
    pub dist_xyz_sigma: f64,
    /// Distance of closest approach before the fit
    pub dca_pre_fit: f64,
}

impl PairVertex {
    pub fn norm_chi2(&self) -> f64 {
        self.chi2 / (self.ndof + 1e-6)
    }

    /// Distance from the origin
    pub fn abs_position(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn significance_xy(&self) -> f64 {
        self.dist_xy / (self.dist_xy_sigma + 1e-6)
    }

    pub fn significance_xyz(&self) -> f64 {
        self.dist_xyz / (self.dist_xyz_sigma + 1e-6)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Jet {
    pub pt: f64,
    pub eta: f64,
    pub phi: f64,
    pub e: f64,
}

impl Jet {
    pub fn momentum(&self) -> FourVector {
        FourVector::from_pt_eta_phi_e(self.pt, self.eta, self.phi, self.e)
    }
}

/// A generator-level particle
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenParticle {
    pub pdg_id: i32,
    /// Generator status code
    pub status: i32,
    pub pt: f64,
    pub eta: f64,
    pub phi: f64,
    pub e: f64,
    /// PDG id of the mother, 0 if there is none
    pub mother_id: i32,
    /// Position of the mother in the generator particle list
    ///
    /// May point past the end of the list if the mother was not stored.
    pub mother_index: Option<usize>,
}

impl GenParticle {
    pub fn id(&self) -> ParticleID {
        ParticleID::new(self.pdg_id)
    }

    pub fn mother(&self) -> ParticleID {
        ParticleID::new(self.mother_id)
    }

    pub fn momentum(&self) -> FourVector {
        FourVector::from_pt_eta_phi_e(self.pt, self.eta, self.phi, self.e)
    }
}
