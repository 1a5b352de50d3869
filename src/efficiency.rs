use serde::{Deserialize, Serialize};
use statrs::distribution::{Beta, ContinuousCDF};

use crate::{
    error::{Error, Result},
    histogram::{Axis, Histogram2D},
    selection::Flavour,
};

/// Default confidence level of the efficiency intervals
pub const DEFAULT_LEVEL: f64 = 0.60;

/// Regulator added to denominators
const EPSILON: f64 = 1e-6;

/// Relative tolerance for passing counts above the total
const ROUNDING: f64 = 1e-9;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleType {
    Mc,
    Data,
}

impl SampleType {
    pub fn from_is_mc(is_mc: bool) -> Self {
        if is_mc {
            Self::Mc
        } else {
            Self::Data
        }
    }
}

/// Weighted event counts of one channel and sample type
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Counters {
    /// Events passing the MET cross-trigger and the offline selection
    pub passed: f64,
    /// Passed events that also fire the double-lepton trigger
    pub triggered: f64,
    /// Events passing the offline selection
    pub selected: f64,
    /// Selected events that fire the double-lepton trigger
    pub selected_triggered: f64,
}

impl Counters {
    pub fn efficiency(&self) -> f64 {
        self.triggered / (self.passed + EPSILON)
    }

    /// Efficiency with its Clopper-Pearson interval
    pub fn measure(&self, level: f64) -> Result<Efficiency> {
        let value = self.efficiency();
        let lower = clopper_pearson(self.passed, self.triggered, level, false)?;
        let upper = clopper_pearson(self.passed, self.triggered, level, true)?;
        Ok(Efficiency {
            value,
            lower,
            upper,
            err_up: (upper - value).max(0.),
            err_down: (value - lower).max(0.),
        })
    }

    /// Correlation factor between the MET and double-lepton triggers
    ///
    /// `None` if no event was selected.
    pub fn alpha(&self) -> Option<f64> {
        if self.selected == 0. {
            return None;
        }
        let sel = self.selected;
        let numerator = (self.selected_triggered / sel) * (self.passed / sel);
        Some(numerator / (self.triggered / sel + EPSILON))
    }
}

/// Bound of the Clopper-Pearson interval for `passed` out of `total`
///
/// Weighted counts are accepted. Fails if `passed` exceeds `total`,
/// either count is negative, or `level` is outside (0, 1).
pub fn clopper_pearson(total: f64, passed: f64, level: f64, upper: bool) -> Result<f64> {
    if !(level > 0. && level < 1.) {
        return Err(Error::InvalidInput(format!(
            "Confidence level {level} outside (0, 1)"
        )));
    }
    if !(passed >= 0. && total >= 0.) {
        return Err(Error::InvalidInput(format!(
            "Negative event counts: {passed} out of {total}"
        )));
    }
    // weighted subset sums may exceed the total by rounding
    let passed = if passed > total && passed - total <= ROUNDING * total {
        total
    } else {
        passed
    };
    if passed > total {
        return Err(Error::InvalidInput(format!(
            "More passing than total events: {passed} > {total}"
        )));
    }
    let alpha = (1. - level) / 2.;
    let bound = if upper {
        if passed == total {
            return Ok(1.);
        }
        beta_quantile(1. - alpha, passed + 1., total - passed)?
    } else {
        if passed == 0. {
            return Ok(0.);
        }
        beta_quantile(alpha, passed, total - passed + 1.)?
    };
    Ok(bound.clamp(0., 1.))
}

fn beta_quantile(p: f64, a: f64, b: f64) -> Result<f64> {
    let beta = Beta::new(a, b)
        .map_err(|err| Error::InvalidInput(format!("Beta({a}, {b}): {err}")))?;
    Ok(beta.inverse_cdf(p))
}

/// Efficiency with asymmetric uncertainties
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Efficiency {
    pub value: f64,
    pub lower: f64,
    pub upper: f64,
    /// Distance to the upper bound
    pub err_up: f64,
    /// Distance to the lower bound
    pub err_down: f64,
}

/// Counters for both flavours and sample types
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyCounters {
    electron: [Counters; 2],
    muon: [Counters; 2],
}

impl EfficiencyCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, flavour: Flavour, sample: SampleType) -> &Counters {
        let channel = match flavour {
            Flavour::Electron => &self.electron,
            Flavour::Muon => &self.muon,
        };
        &channel[sample as usize]
    }

    pub fn get_mut(&mut self, flavour: Flavour, sample: SampleType) -> &mut Counters {
        let channel = match flavour {
            Flavour::Electron => &mut self.electron,
            Flavour::Muon => &mut self.muon,
        };
        &mut channel[sample as usize]
    }

    pub fn report(&self, level: f64) -> Result<ScaleFactorReport> {
        Ok(ScaleFactorReport {
            level,
            electron: self.channel_report(Flavour::Electron, level)?,
            muon: self.channel_report(Flavour::Muon, level)?,
        })
    }

    fn channel_report(&self, flavour: Flavour, level: f64) -> Result<ChannelReport> {
        let mc_counters = *self.get(flavour, SampleType::Mc);
        let data_counters = *self.get(flavour, SampleType::Data);
        let mc = mc_counters.measure(level)?;
        let data = data_counters.measure(level)?;
        Ok(ChannelReport {
            data,
            mc,
            scale_factor: data.value / (mc.value + EPSILON),
            alpha: mc_counters.alpha(),
            data_counters,
            mc_counters,
        })
    }
}

/// Trigger efficiencies and scale factor of one channel
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelReport {
    pub data: Efficiency,
    pub mc: Efficiency,
    pub scale_factor: f64,
    pub alpha: Option<f64>,
    pub data_counters: Counters,
    pub mc_counters: Counters,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScaleFactorReport {
    /// Confidence level of the intervals
    pub level: f64,
    pub electron: ChannelReport,
    pub muon: ChannelReport,
}

impl ScaleFactorReport {
    /// Efficiencies and scale factors per channel as a labelled histogram
    pub fn summary_histogram(&self) -> Histogram2D {
        let x = Axis {
            labels: vec!["Data #epsilon".into(), "MC #epsilon".into(), "SF".into()],
            ..Axis::new(3, 0., 3.)
        };
        let y = Axis {
            labels: vec!["ee trigger".into(), "#mu#mu trigger".into()],
            ..Axis::new(2, 0., 2.)
        };
        let mut hist = Histogram2D::with_axes(
            "histEfficiencies",
            "Efficiencies and Scale Factors of dilepton triggers.; ; Channel.",
            x,
            y,
        );
        for (ybin, channel) in [(1, &self.electron), (2, &self.muon)] {
            hist.fill_weighted(0.5, ybin as f64 - 0.5, channel.data.value);
            hist.fill_weighted(1.5, ybin as f64 - 0.5, channel.mc.value);
            hist.fill_weighted(2.5, ybin as f64 - 0.5, channel.scale_factor);
        }
        hist
    }
}
