use ahash::AHashMap;

use crate::{
    event::{AnalysisEvent, GenParticle},
    momentum::FourVector,
};

const HEPMC_INCOMING: i32 = 4;

/// Generator-level event from a HepMC2 record
///
/// The mother of each particle is the first particle entering its
/// production vertex.
impl From<hepmc2::Event> for AnalysisEvent {
    fn from(source: hepmc2::Event) -> Self {
        let efact = if source.energy_unit == hepmc2::event::EnergyUnit::MEV {
            1e-3
        } else {
            1.
        };
        let mut particles = Vec::new();
        let mut production_vertex = Vec::new();
        let mut first_incoming: AHashMap<i32, usize> = AHashMap::new();
        for vx in source.vertices {
            let barcode = vx.barcode;
            // only beam particles lack a production vertex, all other
            // incident particles are recorded where they originate
            let incoming = vx
                .particles_in
                .into_iter()
                .filter(|p| p.status == HEPMC_INCOMING)
                .map(|p| (None, p));
            let outgoing = vx.particles_out.into_iter().map(|p| (Some(barcode), p));
            for (production, particle) in incoming.chain(outgoing) {
                let idx = particles.len();
                if particle.end_vtx != 0 {
                    first_incoming.entry(particle.end_vtx).or_insert(idx);
                }
                let [e, px, py, pz] = particle.p.0.map(|p| efact * p);
                let p = FourVector::new(e, px, py, pz);
                particles.push(GenParticle {
                    pdg_id: particle.id,
                    status: particle.status,
                    pt: p.pt(),
                    eta: p.eta(),
                    phi: p.phi(),
                    e: p.e(),
                    ..Default::default()
                });
                production_vertex.push(production);
            }
        }
        for (idx, production) in production_vertex.into_iter().enumerate() {
            let Some(barcode) = production else {
                continue;
            };
            let Some(&mother) = first_incoming.get(&barcode) else {
                continue;
            };
            if mother == idx {
                continue;
            }
            let mother_id = particles[mother].pdg_id;
            let particle = &mut particles[idx];
            particle.mother_index = Some(mother);
            particle.mother_id = mother_id;
        }
        Self {
            event_number: u64::try_from(source.number).unwrap_or_default(),
            gen_particles: particles,
            ..Default::default()
        }
    }
}
