/// Fixed-width 1D histogram with TH1 fill semantics.
///
/// `cells` holds `n_bins + 2` values: underflow, the bins, overflow. Every
/// fill counts towards `entries`; the weight moments only see in-range fills.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram1D {
    pub name: String,
    pub title: String,
    pub n_bins: usize,
    pub x_min: f64,
    pub x_max: f64,
    pub cells: Vec<f64>,
    pub entries: f64,
    pub tsumw: f64,
    pub tsumw2: f64,
    pub tsumwx: f64,
    pub tsumwx2: f64,
}

impl Histogram1D {
    pub fn new(name: &str, title: &str, n_bins: usize, x_min: f64, x_max: f64) -> Self {
        Self {
            name: name.to_string(),
            title: title.to_string(),
            n_bins,
            x_min,
            x_max,
            cells: vec![0.0; n_bins + 2],
            entries: 0.0,
            tsumw: 0.0,
            tsumw2: 0.0,
            tsumwx: 0.0,
            tsumwx2: 0.0,
        }
    }

    /// Cell index for `x`; NaN lands in the overflow cell.
    pub fn find_bin(&self, x: f64) -> usize {
        if x < self.x_min {
            return 0;
        }
        if !(x < self.x_max) {
            return self.n_bins + 1;
        }
        let width = self.x_max - self.x_min;
        let bin = (self.n_bins as f64 * (x - self.x_min) / width) as usize;
        1 + bin.min(self.n_bins - 1)
    }

    pub fn fill(&mut self, x: f64) {
        let bin = self.find_bin(x);
        self.cells[bin] += 1.0;
        self.entries += 1.0;
        if bin >= 1 && bin <= self.n_bins {
            self.tsumw += 1.0;
            self.tsumw2 += 1.0;
            self.tsumwx += x;
            self.tsumwx2 += x * x;
        }
    }

    pub fn fill_all(&mut self, values: impl IntoIterator<Item = f32>) {
        for v in values {
            self.fill(v as f64);
        }
    }

    pub fn underflow(&self) -> f64 {
        self.cells[0]
    }

    pub fn overflow(&self) -> f64 {
        self.cells[self.n_bins + 1]
    }

    pub fn mean(&self) -> f64 {
        if self.tsumw == 0.0 {
            0.0
        } else {
            self.tsumwx / self.tsumw
        }
    }

    pub fn std_dev(&self) -> f64 {
        if self.tsumw == 0.0 {
            return 0.0;
        }
        let mean = self.mean();
        (self.tsumwx2 / self.tsumw - mean * mean).max(0.0).sqrt()
    }
}

#[cfg(test)]
#[path = "../tests/src_inline/histogram.rs"]
mod tests;
