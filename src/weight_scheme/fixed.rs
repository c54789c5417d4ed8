//! Wraps another weight scheme, freezing its weights to given values over a
//! contiguous region while keeping the overall weight function continuous
//! at the two seams (`spec.md` §4.2).
use super::WeightScheme;
use crate::array::DArray;
use crate::binner::Binner;
use crate::estimate::Estimate;
use crate::history::MultiHistogramHistory;

/// Wraps `underlying`, substituting `fixed_weights` starting at the bin
/// containing `reference_value`. The weights to the left and right of that
/// region are shifted by a constant offset so the overall function stays
/// continuous at the seams. Only meaningful for a one-dimensional binning.
pub struct FixedWeights {
    reference_value: f64,
    fixed_weights: DArray,
    underlying: Box<dyn WeightScheme>,
}

impl FixedWeights {
    /// `fixed_weights` must be non-empty; `underlying` computes the weights
    /// everywhere outside the fixed region.
    pub fn new(reference_value: f64, fixed_weights: DArray, underlying: Box<dyn WeightScheme>) -> Self {
        assert!(!fixed_weights.is_empty(), "fixed_weights must not be empty");
        FixedWeights {
            reference_value,
            fixed_weights,
            underlying,
        }
    }
}

impl WeightScheme for FixedWeights {
    fn get_weights(
        &mut self,
        estimate: &Estimate,
        history: &MultiHistogramHistory,
        binner: Option<&dyn Binner>,
    ) -> DArray {
        let binner = binner.expect("FixedWeights requires a binner");
        let underlying_weights = self.underlying.get_weights(estimate, history, Some(binner));
        let nbins = underlying_weights.len();
        let mut weights = underlying_weights.clone();

        let reference_index = binner.calc_bin(self.reference_value);
        if reference_index < 0 || reference_index as usize >= nbins {
            return weights;
        }
        let reference_index = reference_index as usize;
        let end_index = nbins.min(reference_index + self.fixed_weights.len());

        for index in 0..reference_index {
            weights[index] =
                underlying_weights[index] - underlying_weights[reference_index] + self.fixed_weights[0];
        }
        for index in reference_index..end_index {
            weights[index] = self.fixed_weights[index - reference_index];
        }
        for index in end_index..nbins {
            weights[index] = underlying_weights[index] - underlying_weights[end_index - 1]
                + self.fixed_weights[self.fixed_weights.len() - 1];
        }

        weights
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::BArray;
    use crate::binner::UniformBinner;
    use crate::history::DeletionPolicy;
    use crate::weight_scheme::Multicanonical;

    #[test]
    fn fixed_region_is_copied_verbatim() {
        let mut estimate = Estimate::new_empty(6);
        estimate.set_ln_g(DArray(vec![0.0, -1.0, -2.0, -3.0, -4.0, -5.0]));
        estimate.set_ln_g_support(BArray(vec![true; 6]));
        let history = MultiHistogramHistory::new(6, 10, 1, DeletionPolicy::DropNone);

        let mut binner = UniformBinner::with_bin_width(1.0, 0, 1000);
        let mut values: Vec<f64> = (0..6).map(|i| i as f64 + 0.5).collect();
        binner.initialize(&mut values, 0.0).unwrap();

        let mut fixed = FixedWeights::new(2.5, DArray(vec![9.0, 9.0]), Box::new(Multicanonical));
        let w = fixed.get_weights(&estimate, &history, Some(&binner));
        assert_eq!(w[2], 9.0);
        assert_eq!(w[3], 9.0);
    }
}
