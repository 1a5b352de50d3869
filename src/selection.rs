use itertools::Itertools;
use particle_id::ParticleID;

use crate::{
    event::{AnalysisEvent, Electron, Muon, TrackPair},
    momentum::FourVector,
    particles::{same_species, CHARGED_PION_MASS, MUON_MASS, PION, SCALAR},
};

/// Minimum invariant mass of the dilepton pair used for trigger studies
pub const MIN_DILEPTON_MASS: f64 = 20.;
/// Maximum invariant mass of the dimuon candidate in the plotters
pub const MAX_DIMUON_MASS: f64 = 10.;
/// Largest ΔR considered in the nearest-pair search
pub const MAX_DIMUON_DELTA_R: f64 = 10.;

const LOOSE_MUON_MAX_ETA: f64 = 2.8;
const LOOSE_MUON_MIN_PT_LEADING: f64 = 15.;
const LOOSE_MUON_MIN_PT: f64 = 6.;

/// Lepton flavour channel
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Flavour {
    Electron,
    Muon,
}

/// Two opposite-sign leptons, ordered by transverse momentum
#[derive(Clone, Debug, PartialEq)]
pub struct Dilepton {
    /// Positions in the lepton collection
    pub index: (usize, usize),
    pub p: (FourVector, FourVector),
    pub rel_iso: (f64, f64),
}

impl Dilepton {
    fn ordered(
        (i, j): (usize, usize),
        (pi, pj): (FourVector, FourVector),
        (iso_i, iso_j): (f64, f64),
    ) -> Self {
        if pi.pt() > pj.pt() {
            Self { index: (i, j), p: (pi, pj), rel_iso: (iso_i, iso_j) }
        } else {
            Self { index: (j, i), p: (pj, pi), rel_iso: (iso_j, iso_i) }
        }
    }

    /// Total four-momentum
    pub fn sum(&self) -> FourVector {
        self.p.0 + self.p.1
    }

    pub fn mass(&self) -> f64 {
        self.sum().m()
    }

    pub fn delta_r(&self) -> f64 {
        self.p.0.delta_r(&self.p.1)
    }
}

/// Leading opposite-charge pair with its refitted tracks
#[derive(Clone, Debug, PartialEq)]
pub struct RefittedPair {
    /// Positions in the object collection
    pub index: (usize, usize),
    pub p: (FourVector, FourVector),
    /// Position of the matching track pair
    pub track_pair: Option<usize>,
    /// Momenta after the common vertex fit
    pub refitted: Option<(FourVector, FourVector)>,
}

impl RefittedPair {
    pub fn sum(&self) -> FourVector {
        self.p.0 + self.p.1
    }

    pub fn refitted_sum(&self) -> Option<FourVector> {
        self.refitted.map(|(p1, p2)| p1 + p2)
    }

    pub fn delta_r(&self) -> f64 {
        self.p.0.delta_r(&self.p.1)
    }
}

fn passes_tight_electron_id(electron: &Electron) -> bool {
    if !electron.is_gsf {
        return false;
    }
    let p = &electron.gsf_p;
    if p.pt() <= 20. || p.eta().abs() >= 2.4 {
        return false;
    }
    let sc_eta = electron.sc_eta.abs();
    // ECAL barrel-endcap gap
    if sc_eta > 1.4442 && sc_eta < 1.566 {
        return false;
    }
    if electron.photon_conversion_tag {
        return false;
    }
    let e_over_p_term =
        (1. - electron.sc_e_over_p).abs() * (1. / electron.ecal_energy);
    if sc_eta <= 1.479 {
        electron.sigma_ieta_ieta < 0.0101
            && electron.delta_eta_sc.abs() < 0.00926
            && electron.delta_phi_sc.abs() < 0.0336
            && electron.h_over_e < 0.0597
            && electron.rel_iso_rho < 0.0354
            && e_over_p_term < 0.012
            && electron.d0.abs() < 0.0111
            && electron.dz.abs() < 0.0466
            && electron.missing_inner_layers <= 2
    } else if sc_eta < 2.5 {
        electron.sigma_ieta_ieta < 0.0279
            && electron.delta_eta_sc.abs() < 0.00724
            && electron.delta_phi_sc.abs() < 0.0918
            && electron.h_over_e < 0.0615
            && electron.rel_iso_rho < 0.0646
            && e_over_p_term < 0.00999
            && electron.d0.abs() < 0.0351
            && electron.dz.abs() < 0.417
            && electron.missing_inner_layers <= 1
    } else {
        false
    }
}

fn passes_tight_muon_id(muon: &Muon) -> bool {
    muon.is_pf
        && muon.tracker_id
        && muon.global_id
        && muon.pt() > 20.
        && muon.eta().abs() < 2.5
        && muon.rel_iso < 0.15
        && muon.ndof > 0.
        && muon.chi2 / muon.ndof < 10.
        && muon.tracker_layers > 5
        && muon.dxy.abs() < 0.2
        && muon.dz.abs() < 0.5
        && muon.muon_hits >= 1
        && muon.pixel_hits >= 1
        && muon.matched_stations >= 2
}

/// Positions of electrons passing the tight cut-based ID
pub fn tight_electrons(event: &AnalysisEvent) -> Vec<usize> {
    event
        .electrons
        .iter()
        .positions(passes_tight_electron_id)
        .collect()
}

/// Positions of muons passing the tight ID
pub fn tight_muons(event: &AnalysisEvent) -> Vec<usize> {
    event.muons.iter().positions(passes_tight_muon_id).collect()
}

/// Opposite-sign pair with the largest invariant mass above
/// [MIN_DILEPTON_MASS]
pub fn dilepton_selection(
    event: &AnalysisEvent,
    leptons: &[usize],
    flavour: Flavour,
) -> Option<Dilepton> {
    let lepton = |idx: usize| match flavour {
        Flavour::Electron => event
            .electrons
            .get(idx)
            .map(|el| (el.gsf_p, el.charge, el.rel_iso_rho)),
        Flavour::Muon => event.muons.get(idx).map(|mu| (mu.p, mu.charge, mu.rel_iso)),
    };
    let mut best: Option<(f64, Dilepton)> = None;
    for (&i, &j) in leptons.iter().tuple_combinations() {
        let (Some((pi, qi, iso_i)), Some((pj, qj, iso_j))) = (lepton(i), lepton(j)) else {
            continue;
        };
        if qi * qj >= 0 {
            continue;
        }
        let mass = (pi + pj).m();
        if best.as_ref().map_or(true, |(m, _)| mass.abs() > m.abs()) {
            best = Some((mass, Dilepton::ordered((i, j), (pi, pj), (iso_i, iso_j))));
        }
    }
    best.filter(|(m, _)| *m > MIN_DILEPTON_MASS).map(|(_, pair)| pair)
}

/// Positions of loose muons
///
/// The first accepted muon has to satisfy the leading transverse
/// momentum threshold. With `mc_truth`, only muons matched to a scalar
/// decay are considered.
pub fn loose_muons(event: &AnalysisEvent, mc_truth: bool) -> Vec<usize> {
    let mut muons = Vec::new();
    for (idx, muon) in event.muons.iter().enumerate() {
        if mc_truth && !muon.is_from(SCALAR) {
            continue;
        }
        if !muon.is_pf || !muon.loose_id || muon.eta().abs() >= LOOSE_MUON_MAX_ETA {
            continue;
        }
        let min_pt = if muons.is_empty() {
            LOOSE_MUON_MIN_PT_LEADING
        } else {
            LOOSE_MUON_MIN_PT
        };
        if muon.pt() >= min_pt {
            muons.push(idx);
        }
    }
    muons
}

/// Split muons into those from the hard process and the rest
pub fn split_prompt(event: &AnalysisEvent, muons: &[usize]) -> (Vec<usize>, Vec<usize>) {
    muons
        .iter()
        .partition(|&&idx| event.muons[idx].hard_process())
}

fn dimuon(event: &AnalysisEvent, i: usize, j: usize) -> Option<Dilepton> {
    let (mi, mj) = (&event.muons[i], &event.muons[j]);
    if mi.charge * mj.charge >= 0 {
        return None;
    }
    Some(Dilepton::ordered((i, j), (mi.p, mj.p), (mi.rel_iso, mj.rel_iso)))
}

/// Dimuon candidate for a given scalar mass hypothesis
///
/// With `exactly_two` the two muons have to form an opposite-sign pair.
/// Otherwise the opposite-sign pair with invariant mass closest to
/// `scalar_mass` is chosen.
pub fn closest_mass_dimuon(
    event: &AnalysisEvent,
    muons: &[usize],
    scalar_mass: f64,
    exactly_two: bool,
) -> Option<Dilepton> {
    if exactly_two {
        return match *muons {
            [i, j] => dimuon(event, i, j),
            _ => None,
        };
    }
    muons
        .iter()
        .tuple_combinations()
        .filter_map(|(&i, &j)| dimuon(event, i, j))
        .map(|pair| ((pair.mass() - scalar_mass).abs(), pair))
        .min_by(|(d1, _), (d2, _)| d1.total_cmp(d2))
        .map(|(_, pair)| pair)
}

/// Opposite-sign dimuon with the smallest angular separation
///
/// With `mc_truth` both muons have to come from a scalar decay.
pub fn nearest_dimuon(
    event: &AnalysisEvent,
    muons: &[usize],
    mc_truth: bool,
) -> Option<Dilepton> {
    let mut best: Option<(f64, Dilepton)> = None;
    for (&i, &j) in muons.iter().tuple_combinations() {
        if mc_truth && !(event.muons[i].is_from(SCALAR) && event.muons[j].is_from(SCALAR)) {
            continue;
        }
        let Some(pair) = dimuon(event, i, j) else {
            continue;
        };
        let delta_r = pair.delta_r();
        let max = best.as_ref().map_or(MAX_DIMUON_DELTA_R, |(dr, _)| *dr);
        if delta_r < max {
            best = Some((delta_r, pair));
        }
    }
    best.map(|(_, pair)| pair)
}

/// Highest-pt charged object and the highest-pt object of opposite charge
fn leading_opposite_pair(
    candidates: &[usize],
    charge: impl Fn(usize) -> i32,
    pt: impl Fn(usize) -> f64,
) -> Option<(usize, usize)> {
    let first = candidates
        .iter()
        .copied()
        .filter(|&idx| charge(idx) != 0)
        .max_by(|&a, &b| pt(a).total_cmp(&pt(b)))?;
    let second = candidates
        .iter()
        .copied()
        .filter(|&idx| idx != first && charge(idx) == -charge(first))
        .max_by(|&a, &b| pt(a).total_cmp(&pt(b)))?;
    Some((first, second))
}

fn track_pair_index(pairs: &[TrackPair], (i, j): (usize, usize)) -> Option<usize> {
    pairs
        .iter()
        .position(|pair| pair.index1 == i && pair.index2 == j)
}

fn refitted(pairs: &[TrackPair], idx: Option<usize>, mass: f64) -> Option<(FourVector, FourVector)> {
    let pair = &pairs[idx?];
    Some((pair.track1.momentum(mass), pair.track2.momentum(mass)))
}

/// Position of the muon track pair built from the given muons
pub fn muon_track_pair_index(event: &AnalysisEvent, index: (usize, usize)) -> Option<usize> {
    track_pair_index(&event.muon_track_pairs, index)
}

/// Position of the charged-hadron track pair built from the given candidates
pub fn chs_track_pair_index(event: &AnalysisEvent, index: (usize, usize)) -> Option<usize> {
    track_pair_index(&event.chs_track_pairs, index)
}

/// Leading muon and the leading muon of opposite charge
pub fn leading_dimuon(event: &AnalysisEvent, muons: &[usize]) -> Option<RefittedPair> {
    let index = leading_opposite_pair(
        muons,
        |idx| event.muons[idx].charge,
        |idx| event.muons[idx].pt(),
    )?;
    let track_pair = muon_track_pair_index(event, index);
    Some(RefittedPair {
        index,
        p: (event.muons[index.0].p, event.muons[index.1].p),
        track_pair,
        refitted: refitted(&event.muon_track_pairs, track_pair, MUON_MASS),
    })
}

/// Charged pion candidates with track details
pub fn chs_candidates(event: &AnalysisEvent) -> Vec<usize> {
    event
        .packed_cands
        .iter()
        .positions(|cand| {
            same_species(ParticleID::new(cand.pdg_id), PION)
                && cand.charge != 0
                && cand.has_track_details
        })
        .collect()
}

/// Leading charged hadron and the leading hadron of opposite charge
pub fn leading_dihadron(event: &AnalysisEvent, chs: &[usize]) -> Option<RefittedPair> {
    let cands = &event.packed_cands;
    let index = leading_opposite_pair(chs, |idx| cands[idx].charge, |idx| cands[idx].pt())?;
    let track_pair = chs_track_pair_index(event, index);
    Some(RefittedPair {
        index,
        p: (cands[index.0].p, cands[index.1].p),
        track_pair,
        refitted: refitted(&event.chs_track_pairs, track_pair, CHARGED_PION_MASS),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{GenMatch, PackedCandidate, Track};

    fn muon(pt: f64, eta: f64, phi: f64, charge: i32) -> Muon {
        let p = FourVector::from_pt_eta_phi_e(pt, eta, phi, 0.);
        let p = FourVector::from_p_m(p.px(), p.py(), p.pz(), MUON_MASS);
        Muon {
            p,
            charge,
            is_pf: true,
            tracker_id: true,
            global_id: true,
            loose_id: true,
            rel_iso: 0.05,
            chi2: 5.,
            ndof: 10.,
            tracker_layers: 10,
            muon_hits: 5,
            pixel_hits: 2,
            matched_stations: 3,
            ..Default::default()
        }
    }

    fn from_scalar(mut muon: Muon) -> Muon {
        muon.gen = Some(GenMatch {
            pdg_id: 13,
            mother_id: 9000006,
            hard_process: true,
            ..Default::default()
        });
        muon
    }

    fn tight_electron(pt: f64, phi: f64, charge: i32) -> Electron {
        Electron {
            gsf_p: FourVector::from_pt_eta_phi_e(pt, 0.5, phi, pt * 0.5f64.cosh()),
            charge,
            is_gsf: true,
            sc_eta: 0.5,
            sigma_ieta_ieta: 0.009,
            sc_e_over_p: 1.,
            ecal_energy: 50.,
            ..Default::default()
        }
    }

    #[test]
    fn tight_electron_cuts() {
        let mut event = AnalysisEvent {
            electrons: vec![
                tight_electron(30., 0., -1),
                tight_electron(15., 0., 1),
                tight_electron(30., 1., 1),
            ],
            ..Default::default()
        };
        assert_eq!(tight_electrons(&event), [0, 2]);

        event.electrons[0].sc_eta = 1.5;
        event.electrons[2].photon_conversion_tag = true;
        assert!(tight_electrons(&event).is_empty());

        // endcap thresholds are looser
        let mut endcap = tight_electron(30., 0., 1);
        endcap.sc_eta = 2.0;
        endcap.sigma_ieta_ieta = 0.02;
        endcap.missing_inner_layers = 1;
        assert!(passes_tight_electron_id(&endcap));
        endcap.missing_inner_layers = 2;
        assert!(!passes_tight_electron_id(&endcap));
    }

    #[test]
    fn tight_muon_cuts() {
        let mut mu = muon(25., 0.3, 0., 1);
        assert!(passes_tight_muon_id(&mu));
        mu.rel_iso = 0.2;
        assert!(!passes_tight_muon_id(&mu));
        let mut mu = muon(25., 0.3, 0., 1);
        mu.ndof = 0.;
        assert!(!passes_tight_muon_id(&mu));
        let mu = muon(19., 0.3, 0., 1);
        assert!(!passes_tight_muon_id(&mu));
    }

    #[test]
    fn dilepton_takes_largest_mass() {
        let event = AnalysisEvent {
            muons: vec![
                muon(30., 0., 0., 1),
                muon(25., 0., 0.3, -1),
                muon(40., 0., 3.0, -1),
            ],
            ..Default::default()
        };
        let leptons = tight_muons(&event);
        let pair = dilepton_selection(&event, &leptons, Flavour::Muon).unwrap();
        assert_eq!(pair.index, (2, 0));
        assert!(pair.mass() > MIN_DILEPTON_MASS);
        assert!(pair.p.0.pt() > pair.p.1.pt());
    }

    #[test]
    fn dilepton_mass_threshold() {
        let event = AnalysisEvent {
            electrons: vec![tight_electron(30., 0., 1), tight_electron(30., 0.2, -1)],
            ..Default::default()
        };
        let leptons = tight_electrons(&event);
        assert_eq!(leptons.len(), 2);
        assert!(dilepton_selection(&event, &leptons, Flavour::Electron).is_none());

        let same_sign = AnalysisEvent {
            electrons: vec![tight_electron(30., 0., 1), tight_electron(30., 3., 1)],
            ..Default::default()
        };
        assert!(dilepton_selection(&same_sign, &[0, 1], Flavour::Electron).is_none());
    }

    #[test]
    fn dilepton_skips_unknown_indices() {
        let event = AnalysisEvent {
            muons: vec![muon(30., 0., 0., 1), muon(40., 0., 3.0, -1)],
            ..Default::default()
        };
        let pair = dilepton_selection(&event, &[0, 5, 1], Flavour::Muon).unwrap();
        assert_eq!(pair.index, (1, 0));
        assert!(dilepton_selection(&event, &[0, 1], Flavour::Electron).is_none());
    }

    #[test]
    fn loose_muon_thresholds() {
        let event = AnalysisEvent {
            muons: vec![
                muon(10., 0., 0., 1),
                muon(16., 0., 0., -1),
                muon(7., 0., 0., 1),
                muon(20., 2.9, 0., 1),
            ],
            ..Default::default()
        };
        assert_eq!(loose_muons(&event, false), [1, 2]);
        assert!(loose_muons(&event, true).is_empty());
    }

    #[test]
    fn prompt_split() {
        let event = AnalysisEvent {
            muons: vec![from_scalar(muon(20., 0., 0., 1)), muon(10., 0., 0., -1)],
            ..Default::default()
        };
        let (prompt, nonprompt) = split_prompt(&event, &[0, 1]);
        assert_eq!(prompt, [0]);
        assert_eq!(nonprompt, [1]);
    }

    #[test]
    fn closest_mass_candidate() {
        let event = AnalysisEvent {
            muons: vec![
                muon(20., 0., 0., 1),
                muon(10., 0., 0.1, -1),
                muon(10., 0., 1.5, -1),
            ],
            ..Default::default()
        };
        let pair = closest_mass_dimuon(&event, &[0, 1, 2], 2.0, false).unwrap();
        assert_eq!(pair.index, (0, 1));
        assert!(closest_mass_dimuon(&event, &[0, 1, 2], 2.0, true).is_none());
        let pair = closest_mass_dimuon(&event, &[1, 0], 2.0, true).unwrap();
        assert_eq!(pair.index, (0, 1));
        assert_eq!(pair.rel_iso, (0.05, 0.05));
        assert!(closest_mass_dimuon(&event, &[1, 2], 2.0, true).is_none());
    }

    #[test]
    fn nearest_pair_candidate() {
        let event = AnalysisEvent {
            muons: vec![
                from_scalar(muon(20., 0., 0., 1)),
                muon(10., 0., 0.1, -1),
                from_scalar(muon(10., 0., 0.5, -1)),
            ],
            ..Default::default()
        };
        let pair = nearest_dimuon(&event, &[0, 1, 2], false).unwrap();
        assert_eq!(pair.index, (0, 1));
        let pair = nearest_dimuon(&event, &[0, 1, 2], true).unwrap();
        assert_eq!(pair.index, (0, 2));
        assert!(nearest_dimuon(&event, &[1, 2], false).is_none());
    }

    #[test]
    fn leading_dimuon_refit() {
        let track = |px: f64| Track { px, py: 1., pz: 0., ..Default::default() };
        let event = AnalysisEvent {
            muons: vec![
                muon(10., 0., 0., 1),
                muon(30., 0., 1., -1),
                muon(20., 0., 2., -1),
                muon(15., 0., 3., 1),
            ],
            muon_track_pairs: vec![TrackPair {
                index1: 1,
                index2: 3,
                track1: track(3.),
                track2: track(-3.),
                ..Default::default()
            }],
            ..Default::default()
        };
        let pair = leading_dimuon(&event, &[0, 1, 2, 3]).unwrap();
        assert_eq!(pair.index, (1, 3));
        assert_eq!(pair.track_pair, Some(0));
        let (p1, p2) = pair.refitted.unwrap();
        assert!((p1.m() - MUON_MASS).abs() < 1e-9);
        assert_eq!(p1.px(), 3.);
        assert_eq!(p2.px(), -3.);

        let pair = leading_dimuon(&event, &[0, 2]).unwrap();
        assert_eq!(pair.track_pair, None);
        assert!(pair.refitted_sum().is_none());
        assert!(leading_dimuon(&event, &[1, 2]).is_none());
    }

    #[test]
    fn dihadron_candidate() {
        let cand = |pdg_id: i32, charge: i32, pt: f64| PackedCandidate {
            pdg_id,
            charge,
            has_track_details: true,
            p: FourVector::from_pt_eta_phi_e(pt, 0., 0., pt),
            ..Default::default()
        };
        let event = AnalysisEvent {
            packed_cands: vec![
                cand(211, 1, 5.),
                cand(-211, -1, 3.),
                cand(321, -1, 10.),
                cand(211, 0, 20.),
                cand(-211, -1, 4.),
            ],
            chs_track_pairs: vec![TrackPair { index1: 0, index2: 4, ..Default::default() }],
            ..Default::default()
        };
        let chs = chs_candidates(&event);
        assert_eq!(chs, [0, 1, 4]);
        let pair = leading_dihadron(&event, &chs).unwrap();
        assert_eq!(pair.index, (0, 4));
        let (p1, _) = pair.refitted.unwrap();
        assert!((p1.m() - CHARGED_PION_MASS).abs() < 1e-9);
        assert_eq!(chs_track_pair_index(&event, (4, 0)), None);

        // the candidate list decides which hadrons are paired
        let pair = leading_dihadron(&event, &[0, 2]).unwrap();
        assert_eq!(pair.index, (2, 0));
        assert_eq!(pair.track_pair, None);
        assert!(leading_dihadron(&event, &[1, 2]).is_none());
    }
}
