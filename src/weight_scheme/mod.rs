//! Weight schemes: turning an entropy estimate into the log-weights used to
//! bias the next round of sampling (`spec.md` §4.2).
pub mod fixed;
pub mod inv_k;
pub mod linear_polated;
pub mod multicanonical;

use crate::array::DArray;
use crate::binner::Binner;
use crate::estimate::Estimate;
use crate::history::MultiHistogramHistory;

pub use fixed::FixedWeights;
pub use inv_k::{InvK, InvKP};
pub use linear_polated::LinearPolated;
pub use multicanonical::Multicanonical;

/// Turns an entropy estimate (and possibly the history and binner) into a
/// new set of log-weights. Mirrors the reference `WeightScheme` interface,
/// which is non-`const` since implementations may cache extrapolation state.
pub trait WeightScheme {
    /// Compute weights. `binner`, if given, supplies non-uniform bin widths
    /// and bin centers; several schemes require one and will panic without.
    fn get_weights(
        &mut self,
        estimate: &Estimate,
        history: &MultiHistogramHistory,
        binner: Option<&dyn Binner>,
    ) -> DArray;
}

/// A weight scheme that can also produce a weight for a value falling
/// outside the currently binned range, without extending the binning.
pub trait ExtrapolatedWeightScheme: WeightScheme {
    /// The weight at `value`, which must fall outside `binner`'s range.
    /// Panics if called for a value inside the binned range, or before
    /// `get_weights` has run at least once.
    fn get_extrapolated_weight(
        &self,
        value: f64,
        lnw: &DArray,
        estimate: &Estimate,
        history: &MultiHistogramHistory,
        binner: &dyn Binner,
    ) -> f64;
}
