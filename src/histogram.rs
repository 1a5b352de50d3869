use std::{
    fs::{self, File},
    io::{BufReader, BufWriter},
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Fixed-width binning
///
/// Bin 0 is the underflow and bin `bins + 1` the overflow.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    pub bins: usize,
    pub lo: f64,
    pub hi: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

impl Axis {
    pub fn new(bins: usize, lo: f64, hi: f64) -> Self {
        Self { bins, lo, hi, labels: Vec::new() }
    }

    /// One unit-width bin per label, centred on 1, 2, ...
    pub fn labelled<S: ToString>(labels: &[S]) -> Self {
        let n = labels.len();
        Self {
            bins: n,
            lo: 0.5,
            hi: n as f64 + 0.5,
            labels: labels.iter().map(|l| l.to_string()).collect(),
        }
    }

    pub fn bin_width(&self) -> f64 {
        (self.hi - self.lo) / self.bins as f64
    }

    pub fn find_bin(&self, x: f64) -> usize {
        if x.is_nan() || x < self.lo {
            0
        } else if x >= self.hi {
            self.bins + 1
        } else {
            let bin = ((x - self.lo) / self.bin_width()) as usize + 1;
            bin.min(self.bins)
        }
    }

    pub fn bin_center(&self, bin: usize) -> f64 {
        self.lo + (bin as f64 - 0.5) * self.bin_width()
    }

    pub fn set_label(&mut self, bin: usize, label: &str) {
        if bin == 0 || bin > self.bins {
            return;
        }
        if self.labels.len() < self.bins {
            self.labels.resize(self.bins, String::new());
        }
        self.labels[bin - 1] = label.to_owned();
    }

    /// Storage size including under- and overflow
    fn len(&self) -> usize {
        self.bins + 2
    }

    fn compatible(&self, other: &Self) -> bool {
        self.bins == other.bins && self.lo == other.lo && self.hi == other.hi
    }
}

/// Weighted one-dimensional histogram
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Histogram1D {
    pub name: String,
    pub title: String,
    pub axis: Axis,
    pub entries: u64,
    sumw: Vec<f64>,
    sumw2: Vec<f64>,
}

impl Histogram1D {
    pub fn new(name: &str, title: &str, bins: usize, lo: f64, hi: f64) -> Self {
        Self::with_axis(name, title, Axis::new(bins, lo, hi))
    }

    pub fn with_axis(name: &str, title: &str, axis: Axis) -> Self {
        let len = axis.len();
        Self {
            name: name.to_owned(),
            title: title.to_owned(),
            axis,
            entries: 0,
            sumw: vec![0.; len],
            sumw2: vec![0.; len],
        }
    }

    pub fn fill(&mut self, x: f64) {
        self.fill_weighted(x, 1.)
    }

    pub fn fill_weighted(&mut self, x: f64, w: f64) {
        let bin = self.axis.find_bin(x);
        self.sumw[bin] += w;
        self.sumw2[bin] += w * w;
        self.entries += 1;
    }

    pub fn find_bin(&self, x: f64) -> usize {
        self.axis.find_bin(x)
    }

    pub fn content(&self, bin: usize) -> f64 {
        self.sumw.get(bin).copied().unwrap_or_default()
    }

    pub fn error(&self, bin: usize) -> f64 {
        self.sumw2.get(bin).copied().unwrap_or_default().sqrt()
    }

    pub fn set_content(&mut self, bin: usize, value: f64) {
        if let Some(c) = self.sumw.get_mut(bin) {
            *c = value;
        }
    }

    pub fn set_error(&mut self, bin: usize, err: f64) {
        if let Some(e) = self.sumw2.get_mut(bin) {
            *e = err * err;
        }
    }

    pub fn set_bin_label(&mut self, bin: usize, label: &str) {
        self.axis.set_label(bin, label)
    }

    /// Sum of weights inside the axis range
    pub fn integral(&self) -> f64 {
        self.sumw[1..=self.axis.bins].iter().sum()
    }

    pub fn scale(&mut self, factor: f64) {
        for c in &mut self.sumw {
            *c *= factor;
        }
        for e in &mut self.sumw2 {
            *e *= factor * factor;
        }
    }

    /// Bin-by-bin division, yielding zero for empty denominator bins
    pub fn divide(&mut self, denominator: &Histogram1D) -> Result<()> {
        if !self.axis.compatible(&denominator.axis) {
            return Err(Error::InvalidInput(format!(
                "Cannot divide {} by {}: incompatible binning",
                self.name, denominator.name
            )));
        }
        divide_bins(
            (&mut self.sumw, &mut self.sumw2),
            (&denominator.sumw, &denominator.sumw2),
        );
        Ok(())
    }

    pub fn read_json(path: &Path) -> Result<Self> {
        read_json(path)
    }
}

fn divide_bins(
    (num, num_err2): (&mut [f64], &mut [f64]),
    (den, den_err2): (&[f64], &[f64]),
) {
    for (n, ne2, &d, &de2) in itertools::izip!(num, num_err2, den, den_err2) {
        if d == 0. {
            *n = 0.;
            *ne2 = 0.;
            continue;
        }
        let d2 = d * d;
        *ne2 = (*ne2 * d2 + de2 * *n * *n) / (d2 * d2);
        *n /= d;
    }
}

/// Weighted two-dimensional histogram
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Histogram2D {
    pub name: String,
    pub title: String,
    pub x: Axis,
    pub y: Axis,
    pub entries: u64,
    sumw: Vec<f64>,
    sumw2: Vec<f64>,
}

impl Histogram2D {
    pub fn new(
        name: &str,
        title: &str,
        (xbins, xlo, xhi): (usize, f64, f64),
        (ybins, ylo, yhi): (usize, f64, f64),
    ) -> Self {
        Self::with_axes(name, title, Axis::new(xbins, xlo, xhi), Axis::new(ybins, ylo, yhi))
    }

    pub fn with_axes(name: &str, title: &str, x: Axis, y: Axis) -> Self {
        let len = x.len() * y.len();
        Self {
            name: name.to_owned(),
            title: title.to_owned(),
            x,
            y,
            entries: 0,
            sumw: vec![0.; len],
            sumw2: vec![0.; len],
        }
    }

    fn global_bin(&self, xbin: usize, ybin: usize) -> Option<usize> {
        (xbin < self.x.len() && ybin < self.y.len()).then(|| ybin * self.x.len() + xbin)
    }

    pub fn fill(&mut self, x: f64, y: f64) {
        self.fill_weighted(x, y, 1.)
    }

    pub fn fill_weighted(&mut self, x: f64, y: f64, w: f64) {
        let bin = self.y.find_bin(y) * self.x.len() + self.x.find_bin(x);
        self.sumw[bin] += w;
        self.sumw2[bin] += w * w;
        self.entries += 1;
    }

    pub fn content(&self, xbin: usize, ybin: usize) -> f64 {
        self.global_bin(xbin, ybin)
            .map(|bin| self.sumw[bin])
            .unwrap_or_default()
    }

    pub fn error(&self, xbin: usize, ybin: usize) -> f64 {
        self.global_bin(xbin, ybin)
            .map(|bin| self.sumw2[bin].sqrt())
            .unwrap_or_default()
    }

    pub fn set_content(&mut self, xbin: usize, ybin: usize, value: f64) {
        if let Some(bin) = self.global_bin(xbin, ybin) {
            self.sumw[bin] = value;
        }
    }

    pub fn set_error(&mut self, xbin: usize, ybin: usize, err: f64) {
        if let Some(bin) = self.global_bin(xbin, ybin) {
            self.sumw2[bin] = err * err;
        }
    }

    pub fn integral(&self) -> f64 {
        let mut sum = 0.;
        for ybin in 1..=self.y.bins {
            for xbin in 1..=self.x.bins {
                sum += self.content(xbin, ybin);
            }
        }
        sum
    }

    pub fn scale(&mut self, factor: f64) {
        for c in &mut self.sumw {
            *c *= factor;
        }
        for e in &mut self.sumw2 {
            *e *= factor * factor;
        }
    }

    pub fn divide(&mut self, denominator: &Histogram2D) -> Result<()> {
        if !self.x.compatible(&denominator.x) || !self.y.compatible(&denominator.y) {
            return Err(Error::InvalidInput(format!(
                "Cannot divide {} by {}: incompatible binning",
                self.name, denominator.name
            )));
        }
        divide_bins(
            (&mut self.sumw, &mut self.sumw2),
            (&denominator.sumw, &denominator.sumw2),
        );
        Ok(())
    }
}

/// Per-bin weighted mean of y
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub title: String,
    pub axis: Axis,
    pub entries: u64,
    sum_wy: Vec<f64>,
    sum_w: Vec<f64>,
}

impl Profile {
    pub fn new(name: &str, title: &str, bins: usize, lo: f64, hi: f64) -> Self {
        Self::with_axis(name, title, Axis::new(bins, lo, hi))
    }

    /// Profile with one bin per label, filled at x = 1, 2, ...
    pub fn labelled<S: ToString>(name: &str, title: &str, labels: &[S]) -> Self {
        Self::with_axis(name, title, Axis::labelled(labels))
    }

    pub fn with_axis(name: &str, title: &str, axis: Axis) -> Self {
        let len = axis.len();
        Self {
            name: name.to_owned(),
            title: title.to_owned(),
            axis,
            entries: 0,
            sum_wy: vec![0.; len],
            sum_w: vec![0.; len],
        }
    }

    pub fn fill(&mut self, x: f64, y: f64) {
        self.fill_weighted(x, y, 1.)
    }

    pub fn fill_weighted(&mut self, x: f64, y: f64, w: f64) {
        let bin = self.axis.find_bin(x);
        self.sum_wy[bin] += w * y;
        self.sum_w[bin] += w;
        self.entries += 1;
    }

    /// Fill the bin with label position `label` (1-based)
    pub fn fill_flag(&mut self, label: usize, flag: bool) {
        self.fill(label as f64, f64::from(u8::from(flag)))
    }

    /// Mean of y in a bin, zero if the bin is empty
    pub fn mean(&self, bin: usize) -> f64 {
        match (self.sum_wy.get(bin), self.sum_w.get(bin)) {
            (Some(&wy), Some(&w)) if w != 0. => wy / w,
            _ => 0.,
        }
    }

    pub fn sum_of_weights(&self, bin: usize) -> f64 {
        self.sum_w.get(bin).copied().unwrap_or_default()
    }
}

/// Any of the supported histogram types
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Histogram {
    H1(Histogram1D),
    H2(Histogram2D),
    Profile(Profile),
}

impl Histogram {
    pub fn name(&self) -> &str {
        match self {
            Histogram::H1(h) => &h.name,
            Histogram::H2(h) => &h.name,
            Histogram::Profile(p) => &p.name,
        }
    }
}

impl From<Histogram1D> for Histogram {
    fn from(h: Histogram1D) -> Self {
        Self::H1(h)
    }
}

impl From<Histogram2D> for Histogram {
    fn from(h: Histogram2D) -> Self {
        Self::H2(h)
    }
}

impl From<Profile> for Histogram {
    fn from(p: Profile) -> Self {
        Self::Profile(p)
    }
}

/// Ordered collection of named histograms
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistogramSet {
    histograms: Vec<Histogram>,
}

impl HistogramSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, histogram: impl Into<Histogram>) {
        self.histograms.push(histogram.into())
    }

    pub fn get(&self, name: &str) -> Option<&Histogram> {
        self.histograms.iter().find(|h| h.name() == name)
    }

    pub fn h1(&self, name: &str) -> Option<&Histogram1D> {
        match self.get(name) {
            Some(Histogram::H1(h)) => Some(h),
            _ => None,
        }
    }

    pub fn h2(&self, name: &str) -> Option<&Histogram2D> {
        match self.get(name) {
            Some(Histogram::H2(h)) => Some(h),
            _ => None,
        }
    }

    pub fn profile(&self, name: &str) -> Option<&Profile> {
        match self.get(name) {
            Some(Histogram::Profile(p)) => Some(p),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.histograms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histograms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Histogram> {
        self.histograms.iter()
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        write_json(self, path)
    }

    pub fn read_json(path: &Path) -> Result<Self> {
        read_json(path)
    }
}

impl Extend<Histogram> for HistogramSet {
    fn extend<T: IntoIterator<Item = Histogram>>(&mut self, iter: T) {
        self.histograms.extend(iter)
    }
}

impl IntoIterator for HistogramSet {
    type Item = Histogram;
    type IntoIter = std::vec::IntoIter<Histogram>;

    fn into_iter(self) -> Self::IntoIter {
        self.histograms.into_iter()
    }
}

/// Serialise to pretty-printed JSON, creating parent directories
pub(crate) fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|err| Error::io(dir, err))?;
    }
    let file = File::create(path).map_err(|err| Error::io(path, err))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)?;
    Ok(())
}

/// Binned contents whose storage has to agree with their axes
pub(crate) trait Storage {
    fn check_storage(&self) -> Result<()>;
}

fn check_len(name: &str, what: &str, expected: Option<usize>, found: usize) -> Result<()> {
    match expected {
        Some(expected) if expected == found => Ok(()),
        Some(expected) => Err(Error::InvalidInput(format!(
            "{name}: {what} holds {found} bins, expected {expected}"
        ))),
        None => Err(Error::InvalidInput(format!("{name}: too many bins"))),
    }
}

impl Storage for Histogram1D {
    fn check_storage(&self) -> Result<()> {
        let len = self.axis.bins.checked_add(2);
        check_len(&self.name, "sumw", len, self.sumw.len())?;
        check_len(&self.name, "sumw2", len, self.sumw2.len())
    }
}

impl Storage for Histogram2D {
    fn check_storage(&self) -> Result<()> {
        let len = self
            .x
            .bins
            .checked_add(2)
            .zip(self.y.bins.checked_add(2))
            .and_then(|(x, y)| x.checked_mul(y));
        check_len(&self.name, "sumw", len, self.sumw.len())?;
        check_len(&self.name, "sumw2", len, self.sumw2.len())
    }
}

impl Storage for Profile {
    fn check_storage(&self) -> Result<()> {
        let len = self.axis.bins.checked_add(2);
        check_len(&self.name, "sum_wy", len, self.sum_wy.len())?;
        check_len(&self.name, "sum_w", len, self.sum_w.len())
    }
}

impl Storage for Histogram {
    fn check_storage(&self) -> Result<()> {
        match self {
            Histogram::H1(h) => h.check_storage(),
            Histogram::H2(h) => h.check_storage(),
            Histogram::Profile(p) => p.check_storage(),
        }
    }
}

impl Storage for HistogramSet {
    fn check_storage(&self) -> Result<()> {
        self.histograms.iter().try_for_each(Storage::check_storage)
    }
}

pub(crate) fn read_json<T>(path: &Path) -> Result<T>
where
    T: for<'de> Deserialize<'de> + Storage,
{
    let file = File::open(path).map_err(|err| Error::io(path, err))?;
    let value: T = serde_json::from_reader(BufReader::new(file)).map_err(|source| Error::Json {
        path: path.to_owned(),
        line: source.line(),
        source,
    })?;
    value.check_storage().map_err(|err| match err {
        Error::InvalidInput(msg) => Error::InvalidInput(format!("{}: {msg}", path.display())),
        err => err,
    })?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bin_lookup() {
        let axis = Axis::new(10, 0., 5.);
        assert_eq!(axis.find_bin(-0.1), 0);
        assert_eq!(axis.find_bin(0.), 1);
        assert_eq!(axis.find_bin(0.49), 1);
        assert_eq!(axis.find_bin(0.5), 2);
        assert_eq!(axis.find_bin(4.99), 10);
        assert_eq!(axis.find_bin(5.), 11);
        assert_eq!(axis.find_bin(f64::NAN), 0);
        assert!((axis.bin_center(1) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn weighted_fill() {
        let mut h = Histogram1D::new("h", "test", 4, 0., 4.);
        h.fill_weighted(0.5, 2.);
        h.fill_weighted(0.7, 3.);
        h.fill(10.);
        h.fill(-1.);
        assert_eq!(h.entries, 4);
        assert_eq!(h.content(1), 5.);
        assert!((h.error(1) - 13f64.sqrt()).abs() < 1e-12);
        assert_eq!(h.content(5), 1.);
        assert_eq!(h.content(0), 1.);
        assert_eq!(h.integral(), 5.);
        h.scale(0.5);
        assert_eq!(h.integral(), 2.5);
        assert!((h.error(1) - 0.5 * 13f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn divide_with_empty_bins() {
        let mut num = Histogram1D::new("num", "", 3, 0., 3.);
        let mut den = Histogram1D::new("den", "", 3, 0., 3.);
        num.fill(0.5);
        den.fill(0.5);
        den.fill(0.5);
        num.fill(2.5);
        num.divide(&den).unwrap();
        assert_eq!(num.content(1), 0.5);
        assert_eq!(num.content(3), 0.);
        assert_eq!(num.error(3), 0.);
        assert!(num.error(1) > 0.);

        let other = Histogram1D::new("other", "", 4, 0., 3.);
        assert!(num.divide(&other).is_err());
    }

    #[test]
    fn two_dimensional() {
        let mut h = Histogram2D::new("h2", "", (2, 0., 2.), (3, 0., 3.));
        h.fill(0.5, 2.5);
        h.fill_weighted(1.5, 0.5, 2.);
        h.fill(5., 5.);
        assert_eq!(h.content(1, 3), 1.);
        assert_eq!(h.content(2, 1), 2.);
        assert_eq!(h.content(3, 4), 1.);
        assert_eq!(h.integral(), 3.);
        h.set_content(1, 1, 7.);
        assert_eq!(h.content(1, 1), 7.);
        assert_eq!(h.content(10, 10), 0.);
    }

    #[test]
    fn profile_means() {
        let mut p = Profile::labelled("p", "", &["a", "b"]);
        p.fill_flag(1, true);
        p.fill_flag(1, false);
        p.fill_flag(2, true);
        assert_eq!(p.mean(1), 0.5);
        assert_eq!(p.mean(2), 1.);
        assert_eq!(p.mean(0), 0.);
        assert_eq!(p.axis.labels, ["a", "b"]);
    }

    #[test]
    fn set_to_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("out.json");
        let mut set = HistogramSet::new();
        let mut h = Histogram1D::new("h_mass", "mass", 10, 0., 10.);
        h.fill(3.3);
        h.set_bin_label(4, "three");
        set.push(h);
        set.push(Profile::labelled("p_flags", "", &["x"]));
        set.write_json(&path).unwrap();

        let read = HistogramSet::read_json(&path).unwrap();
        assert_eq!(read, set);
        let h = read.h1("h_mass").unwrap();
        assert_eq!(h.content(4), 1.);
        assert_eq!(h.axis.labels[3], "three");
        assert!(read.profile("p_flags").is_some());
        assert!(read.h2("h_mass").is_none());
    }

    #[test]
    fn truncated_storage_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pileup.json");
        let mut h = Histogram1D::new("pileup", "", 5, 0., 5.);
        h.fill(1.5);
        let mut json = serde_json::to_value(&h).unwrap();
        json["sumw"].as_array_mut().unwrap().truncate(3);
        fs::write(&path, json.to_string()).unwrap();

        let err = Histogram1D::read_json(&path).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let mut set = HistogramSet::new();
        set.push(Histogram2D::new("h2", "", (2, 0., 2.), (2, 0., 2.)));
        let mut json = serde_json::to_value(&set).unwrap();
        json[0]["sumw2"].as_array_mut().unwrap().pop();
        fs::write(&path, json.to_string()).unwrap();
        let err = HistogramSet::read_json(&path).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn parse_error_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "[\n  {\n    \"kind\": \"h1\",\n    \"name\": ,\n").unwrap();
        match HistogramSet::read_json(&path) {
            Err(Error::Json { line, .. }) => assert_eq!(line, 4),
            res => panic!("expected parse error, got {res:?}"),
        }
    }
}
