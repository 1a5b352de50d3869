use itertools::izip;
use lhef::HEPEUP;

use crate::{
    event::{AnalysisEvent, GenParticle},
    momentum::FourVector,
};

/// Generator-level event from a Les Houches event record
///
/// Only the first mother of each particle is kept.
impl From<HEPEUP> for AnalysisEvent {
    fn from(source: HEPEUP) -> Self {
        let ids = source.IDUP;
        let particles = izip!(&ids, source.ISTUP, source.MOTHUP, source.PUP)
            .map(|(&id, status, parents, p)| {
                // Les Houches momenta are stored as [px, py, pz, E, m]
                let p = FourVector::new(p[3], p[0], p[1], p[2]);
                let mother_index = usize::try_from(parents[0] - 1).ok();
                let mother_id = mother_index
                    .and_then(|mother| ids.get(mother))
                    .copied()
                    .unwrap_or_default();
                GenParticle {
                    pdg_id: id,
                    status,
                    pt: p.pt(),
                    eta: p.eta(),
                    phi: p.phi(),
                    e: p.e(),
                    mother_id,
                    mother_index,
                }
            })
            .collect();
        Self {
            gen_particles: particles,
            ..Default::default()
        }
    }
}
