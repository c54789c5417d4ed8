//! The one-dimensional binner family (`spec.md` §4.1).
pub mod dynamic;
pub mod slope;
pub mod support;
pub mod uniform;

use std::any::Any;

use crate::array::DArray;
use crate::error::MuninnResult;
use crate::estimate::Estimate;
use crate::history::MultiHistogramHistory;

pub use dynamic::NonUniformDynamicBinner;
pub use uniform::UniformBinner;

/// The number of bins added on each side of an out-of-range value, returned
/// by [`Binner::extend`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Extension {
    /// Bins added to the left (lower) end.
    pub add_under: usize,
    /// Bins added to the right (upper) end.
    pub add_over: usize,
}

/// Capability set implemented by every binner variant.
///
/// Binners partition the energy axis into contiguous, half-open bins
/// `[E_i, E_{i+1})`. Calling [`Binner::calc_bin`] before
/// [`Binner::initialize`] is a programmer error.
pub trait Binner {
    /// Prepare the binning from a bootstrap sample collected while the
    /// driver was using canonical weights `w(E) = exp(-beta*E)`.
    fn initialize(&mut self, values: &mut Vec<f64>, beta: f64) -> MuninnResult<()>;

    /// The (possibly negative or out-of-range) bin index for `value`.
    fn calc_bin(&self, value: f64) -> isize;

    /// `calc_bin`, plus whether the result actually falls in range.
    fn calc_bin_validated(&self, value: f64) -> (isize, bool) {
        let bin = self.calc_bin(value);
        (bin, bin >= 0 && (bin as usize) < self.nbins())
    }

    /// Grow the binning to cover `value`, consulting the estimate/history/
    /// weights to choose a sensible new bin width on the growing side.
    fn extend(
        &mut self,
        value: f64,
        estimate: &Estimate,
        history: &MultiHistogramHistory,
        lnw: &DArray,
    ) -> MuninnResult<Extension>;

    /// Bin edges, `nbins() + 1` entries.
    fn get_binning(&self) -> DArray;

    /// Bin centers, `nbins()` entries.
    fn get_binning_centered(&self) -> DArray;

    /// Bin widths, `nbins()` entries.
    fn get_bin_widths(&self) -> DArray;

    /// Current number of bins.
    fn nbins(&self) -> usize;

    /// True if every bin has the same width.
    fn is_uniform(&self) -> bool;

    /// Type-erased view, for the rare caller (`CgeCollection`) that needs a
    /// concrete binner variant and reports [`crate::error::MuninnError::CastMismatch`]
    /// if it finds the wrong one, mirroring the reference's `cast_from_base`.
    fn as_any(&self) -> &dyn Any;

    /// Mutable type-erased view; see [`Binner::as_any`].
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
