use std::path::PathBuf;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{error::Result, histogram::Histogram1D};

/// Locations of the serialised pileup profiles
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PileupFiles {
    pub data: PathBuf,
    pub mc: PathBuf,
    pub up: PathBuf,
    pub down: PathBuf,
}

/// Per-event pileup weights from data and simulated vertex profiles
#[derive(Clone, Debug, PartialEq)]
pub struct PileupReweighting {
    nominal: Histogram1D,
    up: Histogram1D,
    down: Histogram1D,
}

impl PileupReweighting {
    pub fn from_files(files: &PileupFiles) -> Result<Self> {
        debug!("Reading pileup profiles from {files:?}");
        Self::from_profiles(
            Histogram1D::read_json(&files.data)?,
            Histogram1D::read_json(&files.mc)?,
            Histogram1D::read_json(&files.up)?,
            Histogram1D::read_json(&files.down)?,
        )
    }

    /// Normalise all profiles and divide by the simulated one
    pub fn from_profiles(
        data: Histogram1D,
        mut mc: Histogram1D,
        up: Histogram1D,
        down: Histogram1D,
    ) -> Result<Self> {
        normalise(&mut mc);
        let ratio = |mut profile: Histogram1D| -> Result<Histogram1D> {
            normalise(&mut profile);
            profile.divide(&mc)?;
            Ok(profile)
        };
        Ok(Self {
            nominal: ratio(data)?,
            up: ratio(up)?,
            down: ratio(down)?,
        })
    }

    pub fn weight(&self, num_vertices: u32) -> f64 {
        lookup(&self.nominal, num_vertices)
    }

    pub fn weight_up(&self, num_vertices: u32) -> f64 {
        lookup(&self.up, num_vertices)
    }

    pub fn weight_down(&self, num_vertices: u32) -> f64 {
        lookup(&self.down, num_vertices)
    }
}

fn normalise(profile: &mut Histogram1D) {
    let integral = profile.integral();
    if integral != 0. {
        profile.scale(1. / integral);
    }
}

fn lookup(weights: &Histogram1D, num_vertices: u32) -> f64 {
    let x = f64::from(num_vertices);
    weights.content(weights.find_bin(x))
}

/// Pileup weight of an event, 1 without reweighting or for data
pub fn event_weight(
    reweighting: Option<&PileupReweighting>,
    num_vertices: u32,
    is_mc: bool,
) -> f64 {
    match reweighting {
        Some(pu) if is_mc => pu.weight(num_vertices),
        _ => 1.,
    }
}
