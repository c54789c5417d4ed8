//! A single round's count histogram and the log-weights it was collected
//! under (`spec.md` §4.2).
#[cfg(feature = "serde_support")]
use serde::{Deserialize, Serialize};

use crate::array::{CArray, DArray};

/// Counts and log-weights over a shared shape, plus the running total of
/// observations. `N` and `lnw` always share shape; `n` is always `sum(N)`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct Histogram {
    n_counts: CArray,
    lnw: DArray,
    n: u64,
}

impl Histogram {
    /// An empty histogram of the given number of bins, with all-zero weights.
    pub fn new_empty(nbins: usize) -> Self {
        Histogram {
            n_counts: CArray::zeros(nbins),
            lnw: DArray::zeros(nbins),
            n: 0,
        }
    }

    /// An empty histogram initialized with a given set of weights.
    pub fn with_weights(lnw: DArray) -> Self {
        let nbins = lnw.len();
        Histogram {
            n_counts: CArray::zeros(nbins),
            lnw,
            n: 0,
        }
    }

    /// Rebuild a histogram directly from already-known counts and weights,
    /// as read back from a statistics log. Panics if the shapes don't match.
    pub fn from_parts(n_counts: CArray, lnw: DArray) -> Self {
        assert_eq!(n_counts.len(), lnw.len(), "from_parts shape mismatch");
        let n = n_counts.sum();
        Histogram { n_counts, lnw, n }
    }

    /// Record one observation in `bin`.
    pub fn add_observation(&mut self, bin: usize) {
        self.n_counts[bin] += 1;
        self.n += 1;
    }

    /// Pad both arrays with zero counts and zero weights; `set_lnw` is used
    /// afterwards to install the weight scheme's recomputed weights.
    pub fn extend(&mut self, add_under: usize, add_over: usize) {
        self.n_counts = self.n_counts.extended(add_under, add_over, 0);
        self.lnw = self.lnw.extended(add_under, add_over, 0.0);
    }

    /// Replace the weights this histogram collects under. Shape must match.
    pub fn set_lnw(&mut self, new_lnw: DArray) {
        assert_eq!(new_lnw.len(), self.lnw.len(), "set_lnw shape mismatch");
        self.lnw = new_lnw;
    }

    /// The observation counts.
    pub fn counts(&self) -> &CArray {
        &self.n_counts
    }

    /// The weights this histogram was collected under.
    pub fn lnw(&self) -> &DArray {
        &self.lnw
    }

    /// Total number of observations, `sum(N)`.
    pub fn n(&self) -> u64 {
        self.n
    }

    /// Number of bins.
    pub fn len(&self) -> usize {
        self.n_counts.len()
    }

    /// True if there are no bins.
    pub fn is_empty(&self) -> bool {
        self.n_counts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observations_increment_counts_and_total() {
        let mut h = Histogram::new_empty(5);
        h.add_observation(2);
        h.add_observation(2);
        h.add_observation(4);
        assert_eq!(h.counts()[2], 2);
        assert_eq!(h.counts()[4], 1);
        assert_eq!(h.n(), 3);
        assert_eq!(h.counts().sum(), h.n());
    }

    #[test]
    fn extend_pads_without_changing_totals() {
        let mut h = Histogram::new_empty(3);
        h.add_observation(1);
        h.extend(2, 1);
        assert_eq!(h.len(), 6);
        assert_eq!(h.n(), 1);
        assert_eq!(h.counts()[3], 1);
    }
}
