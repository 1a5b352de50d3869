use std::{
    f64::consts::PI,
    iter::Sum,
    ops::{Add, AddAssign, Index},
};

use serde::{Deserialize, Serialize};

/// Pseudorapidity assigned to momenta along the beam axis
const ETA_AT_ZERO_PT: f64 = 1e10;

/// Four-momentum `[E, px, py, pz]` in GeV
#[derive(Copy, Clone, Debug, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct FourVector(pub [f64; 4]);

impl FourVector {
    pub fn new(e: f64, px: f64, py: f64, pz: f64) -> Self {
        Self([e, px, py, pz])
    }

    pub fn from_pt_eta_phi_e(pt: f64, eta: f64, phi: f64, e: f64) -> Self {
        Self([e, pt * phi.cos(), pt * phi.sin(), pt * eta.sinh()])
    }

    /// Four-momentum for a given three-momentum and mass hypothesis
    pub fn from_p_m(px: f64, py: f64, pz: f64, m: f64) -> Self {
        let e = (px * px + py * py + pz * pz + m * m).sqrt();
        Self([e, px, py, pz])
    }

    pub fn e(&self) -> f64 {
        self.0[0]
    }

    pub fn px(&self) -> f64 {
        self.0[1]
    }

    pub fn py(&self) -> f64 {
        self.0[2]
    }

    pub fn pz(&self) -> f64 {
        self.0[3]
    }

    /// Squared three-momentum
    pub fn p2(&self) -> f64 {
        self.px().powi(2) + self.py().powi(2) + self.pz().powi(2)
    }

    pub fn pt(&self) -> f64 {
        self.px().hypot(self.py())
    }

    pub fn eta(&self) -> f64 {
        let pt = self.pt();
        if pt == 0. {
            return ETA_AT_ZERO_PT.copysign(self.pz());
        }
        (self.pz() / pt).asinh()
    }

    pub fn phi(&self) -> f64 {
        if self.px() == 0. && self.py() == 0. {
            return 0.;
        }
        self.py().atan2(self.px())
    }

    /// Squared invariant mass
    pub fn m2(&self) -> f64 {
        self.e().powi(2) - self.p2()
    }

    /// Invariant mass
    ///
    /// Space-like momenta yield a negative mass `-sqrt(-m²)`.
    pub fn m(&self) -> f64 {
        let m2 = self.m2();
        if m2 < 0. {
            -(-m2).sqrt()
        } else {
            m2.sqrt()
        }
    }

    pub fn delta_r(&self, other: &Self) -> f64 {
        delta_r(self.eta(), self.phi(), other.eta(), other.phi())
    }
}

impl Index<usize> for FourVector {
    type Output = f64;

    fn index(&self, idx: usize) -> &Self::Output {
        &self.0[idx]
    }
}

impl From<[f64; 4]> for FourVector {
    fn from(p: [f64; 4]) -> Self {
        Self(p)
    }
}

impl Add for FourVector {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self::Output {
        self += rhs;
        self
    }
}

impl AddAssign for FourVector {
    fn add_assign(&mut self, rhs: Self) {
        for (lhs, rhs) in self.0.iter_mut().zip(rhs.0) {
            *lhs += rhs;
        }
    }
}

impl Sum for FourVector {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |acc, p| acc + p)
    }
}

/// Azimuthal difference wrapped into [-π, π]
pub fn delta_phi(phi1: f64, phi2: f64) -> f64 {
    let dphi = phi1 - phi2;
    if (-PI..=PI).contains(&dphi) {
        return dphi;
    }
    (dphi + PI).rem_euclid(2. * PI) - PI
}

pub fn delta_r(eta1: f64, phi1: f64, eta2: f64, phi2: f64) -> f64 {
    let deta = eta1 - eta2;
    deta.hypot(delta_phi(phi1, phi2))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn pt_eta_phi_round_trip() {
        let p = FourVector::from_pt_eta_phi_e(25., -1.3, 2.1, 60.);
        assert!((p.pt() - 25.).abs() < EPS);
        assert!((p.eta() + 1.3).abs() < EPS);
        assert!((p.phi() - 2.1).abs() < EPS);
        assert_eq!(p.e(), 60.);
    }

    #[test]
    fn beam_axis() {
        let p = FourVector::new(5., 0., 0., 5.);
        assert_eq!(p.eta(), 1e10);
        let p = FourVector::new(5., 0., 0., -5.);
        assert_eq!(p.eta(), -1e10);
        assert_eq!(p.phi(), 0.);
    }

    #[test]
    fn dimuon_mass() {
        let mu = 0.1057;
        let p1 = FourVector::from_p_m(3., 0., 0., mu);
        let p2 = FourVector::from_p_m(-3., 0., 0., mu);
        let m = (p1 + p2).m();
        let expected = 2. * (9. + mu * mu).sqrt();
        assert!((m - expected).abs() < EPS);
        let sum: FourVector = [p1, p2].into_iter().sum();
        assert_eq!(sum, p1 + p2);
    }

    #[test]
    fn spacelike_mass_is_negative() {
        let p = FourVector::new(1., 2., 0., 0.);
        assert!((p.m() + 3f64.sqrt()).abs() < EPS);
    }

    #[test]
    fn delta_phi_wraps() {
        let dphi = delta_phi(3.0, -3.0);
        assert!((dphi - (6.0 - 2. * PI)).abs() < EPS);
        assert!(delta_phi(-3.0, 3.0) > -PI);
        let dr = delta_r(0., 3.0, 0., -3.0);
        assert!((dr - (2. * PI - 6.0)).abs() < EPS);
        assert!((delta_phi(7. * PI, 0.).abs() - PI).abs() < 1e-9);
    }

    #[test]
    fn delta_phi_large_angles() {
        for phi in [1e17, -1e17, 1e300] {
            let dphi = delta_phi(phi, 0.);
            assert!(dphi.is_finite());
            assert!((-PI..=PI).contains(&dphi));
        }
        assert!(delta_phi(f64::NAN, 0.).is_nan());
    }
}
