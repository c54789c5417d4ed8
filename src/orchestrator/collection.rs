//! A pool of [`Cge`] chains kept on a shared binning, as used by a
//! multicanonical-like driver running several chains in parallel
//! (`spec.md` §4.7).
use log::{debug, info};

use crate::error::{MuninnError, MuninnResult};
use crate::orchestrator::cge::Cge;

/// A pool of chains whose binners should track the same range, the same
/// extension protocol at the boundaries, or both. Holds no ownership
/// semantics of its own beyond the `Vec` (unlike the reference, which tracks
/// a per-entry `ownership` flag for manual `delete`).
#[derive(Default)]
pub struct CgeCollection {
    chains: Vec<Cge>,
}

impl CgeCollection {
    /// An empty collection.
    pub fn new() -> Self {
        CgeCollection { chains: Vec::new() }
    }

    /// Add a chain to the pool.
    pub fn add_cge(&mut self, cge: Cge) {
        self.chains.push(cge);
    }

    /// Number of chains in the pool.
    pub fn len(&self) -> usize {
        self.chains.len()
    }

    /// True if the pool holds no chains.
    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// The chain at `index`.
    pub fn at(&self, index: usize) -> &Cge {
        &self.chains[index]
    }

    /// The chain at `index`, mutably.
    pub fn at_mut(&mut self, index: usize) -> &mut Cge {
        &mut self.chains[index]
    }

    /// Bring every chain's binner onto the same range.
    ///
    /// While every chain is still in initial collection, all of their
    /// bootstrap samples are pooled and every binner is initialized from
    /// the combined sample (so they all pick the same range and, for a
    /// `NonUniformDynamicBinner`, the same initial bin width). Once chains
    /// have left initial collection, each binner is extended instead to
    /// cover the lowest and highest bin centers found across the whole
    /// pool (requires every chain's binner to be a
    /// [`crate::binner::NonUniformDynamicBinner`]).
    pub fn unify_binners_range(&mut self) -> MuninnResult<()> {
        info!("Unifying the range of the binners.");

        if self.chains.is_empty() {
            return Ok(());
        }

        if self.chains[0].is_initial_collection() {
            let mut pooled: Vec<f64> = Vec::new();
            for chain in &self.chains {
                pooled.extend_from_slice(chain.initial_observations());
            }
            for chain in self.chains.iter_mut() {
                let mut samples = pooled.clone();
                chain.initialize_binner_unified(&mut samples)?;
            }
        } else {
            let mut min_value = f64::INFINITY;
            let mut max_value = f64::NEG_INFINITY;
            for chain in &self.chains {
                let (low, high) = chain.binning_bounds();
                min_value = min_value.min(low);
                max_value = max_value.max(high);
            }

            for chain in self.chains.iter_mut() {
                chain.include_value(min_value)?;
                chain.include_value(max_value)?;
            }
        }

        Ok(())
    }

    /// Find the chain whose support reaches furthest left and the chain
    /// whose support reaches furthest right, estimate the boundary slope
    /// from each, and preset that pair of slopes on every chain's binner so
    /// future extensions agree on a bin width at the pool's edges.
    ///
    /// Requires every chain's binner to be a
    /// [`crate::binner::NonUniformDynamicBinner`].
    pub fn unify_binners_extension(&mut self) -> MuninnResult<()> {
        info!("Unifying the extension protocol of the binners.");

        let mut left_bin = usize::MAX;
        let mut left_chain = None;
        let mut right_bin = 0usize;
        let mut right_chain = None;

        for (i, chain) in self.chains.iter().enumerate() {
            let support = chain.get_ge().estimate().ln_g_support();
            if let Some(bound) = crate::binner::support::find_left_bound(support) {
                if bound < left_bin || left_chain.is_none() {
                    left_bin = bound;
                    left_chain = Some(i);
                }
            }
            if let Some(bound) = crate::binner::support::find_right_bound(support) {
                if bound > right_bin || right_chain.is_none() {
                    right_bin = bound;
                    right_chain = Some(i);
                }
            }
        }

        let left_chain = left_chain.ok_or(MuninnError::NoOverlap)?;
        let right_chain = right_chain.ok_or(MuninnError::NoOverlap)?;

        let slope_left = self.chains[left_chain].slope_at(left_bin)?;
        let slope_right = self.chains[right_chain].slope_at(right_bin)?;

        for chain in self.chains.iter_mut() {
            chain.set_binner_preset_slopes(slope_left, slope_right)?;
        }

        Ok(())
    }

    /// True if every chain's binner reports the same edges (within `1e-6`).
    pub fn check_consistent_binning(&self) -> bool {
        if self.chains.is_empty() {
            return true;
        }
        let reference = self.chains[0].get_binning();
        for chain in &self.chains[1..] {
            let binning = chain.get_binning();
            if binning.len() != reference.len() {
                debug!("Mismatch in shape.");
                return false;
            }
            for i in 0..reference.len() {
                if (reference[i] - binning[i]).abs() > 1e-6 {
                    debug!("Mismatch in binning.");
                    return false;
                }
            }
        }
        true
    }
}
