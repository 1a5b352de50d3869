pub mod analysis;
pub mod config;
#[cfg(feature = "hepmc2")]
pub mod convert_hepmc2;
#[cfg(feature = "lhef")]
pub mod convert_lhef;
pub mod efficiency;
pub mod error;
pub mod event;
pub mod gen_plotter;
pub mod genealogy;
pub mod histogram;
pub mod momentum;
pub mod opt;
pub mod particles;
pub mod pileup;
pub mod quick_plotter;
pub mod reader;
pub mod reco_plotter;
pub mod scale_factors;
pub mod selection;
pub mod skim;
pub mod trigger;

pub use error::{Error, Result};
