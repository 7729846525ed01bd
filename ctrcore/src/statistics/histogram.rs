use std::collections::BTreeMap;

use ordered_float::OrderedFloat;

/// A binned view of a sample collection: bin centers paired with counts.
///
/// Zero-count bins are dropped at construction. The weighting scheme used by
/// the fitting code (Poisson errors, `sigma = sqrt(count)`) is undefined at
/// zero counts, so empty bins never reach a fit.
#[derive(Clone, Debug)]
pub struct Histogram {
    pub centers: Vec<f64>,
    pub counts: Vec<u64>,
}

impl Histogram {
    /// Bin `values` into `bins` equal-width buckets over `range`.
    ///
    /// Numpy conventions: buckets are right-open except the last, which is
    /// closed; values outside `range` are ignored.
    pub fn from_range(values: &[f64], range: (f64, f64), bins: usize) -> Histogram {
        let (lo, hi) = range;
        assert!(bins > 0, "histogram needs at least one bin");
        assert!(hi > lo, "histogram range must be non-empty");

        let width = (hi - lo) / bins as f64;
        let mut raw = vec![0u64; bins];
        for &v in values {
            if v < lo || v > hi {
                continue;
            }
            let mut idx = ((v - lo) / width) as usize;
            if idx >= bins {
                idx = bins - 1; // v == hi lands in the closed last bucket
            }
            raw[idx] += 1;
        }

        let mut centers = Vec::new();
        let mut counts = Vec::new();
        for (i, &c) in raw.iter().enumerate() {
            if c == 0 {
                continue;
            }
            centers.push(lo + (i as f64 + 0.5) * width);
            counts.push(c);
        }
        Histogram { centers, counts }
    }

    /// Restrict to bins whose centers fall strictly inside `window`.
    pub fn crop(&self, window: (f64, f64)) -> Histogram {
        let (lo, hi) = window;
        let mut centers = Vec::new();
        let mut counts = Vec::new();
        for (&x, &c) in self.centers.iter().zip(self.counts.iter()) {
            if x > lo && x < hi {
                centers.push(x);
                counts.push(c);
            }
        }
        Histogram { centers, counts }
    }

    pub fn counts_f64(&self) -> Vec<f64> {
        self.counts.iter().map(|&c| c as f64).collect()
    }

    pub fn len(&self) -> usize {
        self.centers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }
}

/// Frequency table of the distinct values in `values`, in ascending order.
///
/// Resamples drawn from an empirical CDF only ever land on observed values,
/// so counting distinct values is the natural rebinning for bootstrap refits.
pub fn value_counts(values: &[f64]) -> Histogram {
    let mut table: BTreeMap<OrderedFloat<f64>, u64> = BTreeMap::new();
    for &v in values {
        *table.entry(OrderedFloat(v)).or_insert(0) += 1;
    }
    let mut centers = Vec::with_capacity(table.len());
    let mut counts = Vec::with_capacity(table.len());
    for (v, c) in table {
        centers.push(v.into_inner());
        counts.push(c);
    }
    Histogram { centers, counts }
}
