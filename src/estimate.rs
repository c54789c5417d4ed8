//! The current estimate of the density of states (`spec.md` §3, §4.3).
use std::collections::HashMap;

#[cfg(feature = "serde_support")]
use serde::{Deserialize, Serialize};

use crate::array::{BArray, DArray};

/// An estimate of `lnG` (the log density of states) over a shared shape,
/// together with its support mask and the reference bin `x0` held fixed
/// during re-estimation.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct Estimate {
    ln_g: DArray,
    ln_g_support: BArray,
    x0: Option<usize>,
    /// Per-history-entry free energies, keyed by the entry's stable id
    /// (`spec.md` §9: generation-stable identifier replacing
    /// address-as-key). Empty until the MLE estimator has run at least once.
    free_energies: HashMap<u64, f64>,
}

impl Estimate {
    /// An empty estimate (`lnG = 0`, no support, no reference bin) over
    /// `nbins` bins.
    pub fn new_empty(nbins: usize) -> Self {
        Estimate {
            ln_g: DArray::zeros(nbins),
            ln_g_support: BArray::falses(nbins),
            x0: None,
            free_energies: HashMap::new(),
        }
    }

    /// The estimated log density of states.
    pub fn ln_g(&self) -> &DArray {
        &self.ln_g
    }

    /// The support mask: `true` where `sum_N >= min_count`.
    pub fn ln_g_support(&self) -> &BArray {
        &self.ln_g_support
    }

    /// The reference bin, if one has been chosen yet.
    pub fn x0(&self) -> Option<usize> {
        self.x0
    }

    /// Replace `lnG`.
    pub fn set_ln_g(&mut self, new_ln_g: DArray) {
        assert_eq!(new_ln_g.len(), self.ln_g.len(), "set_ln_g shape mismatch");
        self.ln_g = new_ln_g;
    }

    /// Replace the support mask.
    pub fn set_ln_g_support(&mut self, new_support: BArray) {
        assert_eq!(
            new_support.len(),
            self.ln_g_support.len(),
            "set_ln_g_support shape mismatch"
        );
        self.ln_g_support = new_support;
    }

    /// Set the reference bin.
    pub fn set_x0(&mut self, x0: Option<usize>) {
        self.x0 = x0;
    }

    /// Free energy recorded for a given history entry id, if any.
    pub fn free_energy(&self, id: u64) -> Option<f64> {
        self.free_energies.get(&id).copied()
    }

    /// Replace the whole free-energy map (the estimator rebuilds it after
    /// every successful solve; stale ids from evicted history entries are
    /// dropped this way).
    pub fn set_free_energies(&mut self, map: HashMap<u64, f64>) {
        self.free_energies = map;
    }

    /// Extend the shape of the estimate, shifting `x0` to track the same
    /// bin if padding was added on the left.
    pub fn extend(&mut self, add_under: usize, add_over: usize) {
        self.ln_g = self.ln_g.extended(add_under, add_over, 0.0);
        self.ln_g_support = self.ln_g_support.extended(add_under, add_over, false);
        if let Some(x0) = self.x0 {
            self.x0 = Some(x0 + add_under);
        }
    }

    /// Number of bins.
    pub fn len(&self) -> usize {
        self.ln_g.len()
    }

    /// True if there are no bins.
    pub fn is_empty(&self) -> bool {
        self.ln_g.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extend_shifts_reference_bin() {
        let mut e = Estimate::new_empty(4);
        e.set_x0(Some(1));
        e.extend(2, 1);
        assert_eq!(e.x0(), Some(3));
        assert_eq!(e.len(), 7);
    }

    #[test]
    fn free_energy_map_round_trips() {
        let mut e = Estimate::new_empty(3);
        let mut map = HashMap::new();
        map.insert(7, -1.5);
        e.set_free_energies(map);
        assert_eq!(e.free_energy(7), Some(-1.5));
        assert_eq!(e.free_energy(8), None);
    }
}
