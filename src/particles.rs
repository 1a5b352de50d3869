use particle_id::{sm_elementary_particles::bottom, ParticleID};

/// The light scalar searched for
pub const SCALAR: ParticleID = ParticleID::new(9000006);
pub const PION: ParticleID = ParticleID::new(211);
pub const KAON: ParticleID = ParticleID::new(321);
pub const D_PLUS: ParticleID = ParticleID::new(411);
pub const D_ZERO: ParticleID = ParticleID::new(421);
pub const D_S_PLUS: ParticleID = ParticleID::new(431);

/// Muon mass in GeV
pub const MUON_MASS: f64 = 0.1057;
/// Charged pion mass in GeV
pub const CHARGED_PION_MASS: f64 = 0.13957018;

/// Whether `id` is a quark lighter than the top (either sign)
pub fn is_light_quark(id: ParticleID) -> bool {
    let id = id.id().abs();
    id > 0 && id <= bottom.id()
}

/// Whether two ids agree up to the sign
pub fn same_species(a: ParticleID, b: ParticleID) -> bool {
    a.id().abs() == b.id().abs()
}
