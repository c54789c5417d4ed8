//! The multicanonical weight scheme, flat sampling over the support
//! (`spec.md` §4.2).
use super::WeightScheme;
use crate::array::DArray;
use crate::binner::Binner;
use crate::estimate::Estimate;
use crate::history::MultiHistogramHistory;

/// `w(E) = 1/g(E)` inside the support, `0` outside. Works in any dimension,
/// though this crate only ever binds a single reaction coordinate.
#[derive(Debug, Clone, Copy, Default)]
pub struct Multicanonical;

impl WeightScheme for Multicanonical {
    fn get_weights(
        &mut self,
        estimate: &Estimate,
        _history: &MultiHistogramHistory,
        binner: Option<&dyn Binner>,
    ) -> DArray {
        let nbins = estimate.len();
        let support = estimate.ln_g_support();
        let ln_g = estimate.ln_g();
        let bin_widths = binner.filter(|b| !b.is_uniform()).map(|b| b.get_bin_widths());

        DArray(
            (0..nbins)
                .map(|b| {
                    if !support[b] {
                        return 0.0;
                    }
                    let mut lnw = -ln_g[b];
                    if let Some(widths) = &bin_widths {
                        lnw += widths[b].ln();
                    }
                    lnw
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::BArray;
    use crate::history::DeletionPolicy;

    #[test]
    fn weight_is_negative_entropy_on_support() {
        let mut estimate = Estimate::new_empty(3);
        estimate.set_ln_g(DArray(vec![1.0, 2.0, 3.0]));
        estimate.set_ln_g_support(BArray(vec![true, true, false]));
        let history = MultiHistogramHistory::new(3, 10, 1, DeletionPolicy::DropNone);

        let w = Multicanonical.get_weights(&estimate, &history, None);
        assert_eq!(w[0], -1.0);
        assert_eq!(w[1], -2.0);
        assert_eq!(w[2], 0.0);
    }
}
