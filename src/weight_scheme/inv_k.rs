//! The `1/k` and `1/k^p` weight schemes, restricted to one-dimensional,
//! ordered binnings (`spec.md` §4.2, Open Question: 1/k is not generalized
//! beyond 1-D since "summed over all bins with lower energy" only has a
//! well-defined meaning along a single ordered axis).
use super::WeightScheme;
use crate::array::{log_sum_exp2, BArray, DArray};
use crate::binner::{support::find_left_bound, Binner};
use crate::estimate::Estimate;
use crate::history::MultiHistogramHistory;

/// `ln(k_i) = ln(sum_{j<=i, supported} G_j)`, a running log-sum-exp prefix
/// over the support; unsupported bins are left at `0.0` (overwritten by the
/// caller's shift, matching the reference implementation).
fn ln_k_prefix(ln_g: &DArray, support: &BArray) -> DArray {
    let nbins = ln_g.len();
    let mut ln_k = DArray::zeros(nbins);
    let mut running: Option<f64> = None;
    for b in 0..nbins {
        if !support[b] {
            continue;
        }
        running = Some(match running {
            None => ln_g[b],
            Some(prev) => log_sum_exp2(prev, ln_g[b]),
        });
        ln_k[b] = running.unwrap();
    }
    ln_k
}

/// `w(E) = 1/k(E)` where `k(E) = sum_{E'<=E} g(E')`, for a one-dimensional
/// simulation. Weights are shifted so the maximal-entropy bin gets weight
/// `-lnG` there, matching [`Multicanonical`](super::Multicanonical) at that
/// point.
#[derive(Debug, Clone, Copy, Default)]
pub struct InvK;

impl WeightScheme for InvK {
    fn get_weights(
        &mut self,
        estimate: &Estimate,
        _history: &MultiHistogramHistory,
        _binner: Option<&dyn Binner>,
    ) -> DArray {
        let support = estimate.ln_g_support();
        let ln_g = estimate.ln_g();
        let nbins = ln_g.len();

        if find_left_bound(support).is_none() {
            return DArray::zeros(nbins);
        }

        let ln_k = ln_k_prefix(ln_g, support);
        let mut lnw = DArray((0..nbins).map(|b| if support[b] { -ln_k[b] } else { 0.0 }).collect());

        let max_index = ln_g.arg_max_where(support).expect("support is non-empty");
        let shift = -ln_g[max_index] - lnw[max_index];
        for b in 0..nbins {
            if support[b] {
                lnw[b] += shift;
            }
        }
        lnw
    }
}

/// `w(E) = k(E)^{-p} * g(E)^{1-p}`, generalizing [`InvK`] (`p == 1.0`
/// recovers it exactly). Also restricted to one-dimensional, ordered
/// binnings.
#[derive(Debug, Clone, Copy)]
pub struct InvKP {
    p: f64,
}

impl InvKP {
    /// A new `1/k^p` scheme with exponent `p`.
    pub fn new(p: f64) -> Self {
        InvKP { p }
    }
}

impl WeightScheme for InvKP {
    fn get_weights(
        &mut self,
        estimate: &Estimate,
        _history: &MultiHistogramHistory,
        binner: Option<&dyn Binner>,
    ) -> DArray {
        let support = estimate.ln_g_support();
        let ln_g = estimate.ln_g();
        let nbins = ln_g.len();

        if find_left_bound(support).is_none() {
            return DArray::zeros(nbins);
        }

        let bin_widths = binner.filter(|b| !b.is_uniform()).map(|b| b.get_bin_widths());
        let lnw_g = DArray(
            (0..nbins)
                .map(|b| {
                    if !support[b] {
                        return 0.0;
                    }
                    let mut v = -ln_g[b];
                    if let Some(widths) = &bin_widths {
                        v += widths[b].ln();
                    }
                    v
                })
                .collect(),
        );

        let ln_k = ln_k_prefix(ln_g, support);
        let mut lnw_k = DArray::zeros(nbins);
        for b in 0..nbins {
            if support[b] {
                lnw_k[b] = -self.p * ln_k[b] + (1.0 - self.p) * lnw_g[b];
            }
        }

        let max_index = ln_g.arg_max_where(support).expect("support is non-empty");
        let shift = -ln_g[max_index] - lnw_k[max_index];
        for b in 0..nbins {
            if support[b] {
                lnw_k[b] += shift;
            }
        }
        lnw_k
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::DeletionPolicy;

    #[test]
    fn flat_entropy_gives_monotonically_decreasing_weight() {
        let mut estimate = Estimate::new_empty(5);
        estimate.set_ln_g(DArray(vec![0.0; 5]));
        estimate.set_ln_g_support(BArray(vec![true; 5]));
        let history = MultiHistogramHistory::new(5, 10, 1, DeletionPolicy::DropNone);

        let w = InvK.get_weights(&estimate, &history, None);
        for pair in w.0.windows(2) {
            assert!(pair[1] < pair[0], "1/k weight should strictly decrease with energy under flat entropy");
        }
    }

    #[test]
    fn invkp_with_p_one_matches_invk() {
        let mut estimate = Estimate::new_empty(5);
        estimate.set_ln_g(DArray(vec![0.2, -0.3, 0.5, 0.1, -0.7]));
        estimate.set_ln_g_support(BArray(vec![true; 5]));
        let history = MultiHistogramHistory::new(5, 10, 1, DeletionPolicy::DropNone);

        let w_k = InvK.get_weights(&estimate, &history, None);
        let w_kp = InvKP::new(1.0).get_weights(&estimate, &history, None);
        for i in 0..5 {
            assert!((w_k[i] - w_kp[i]).abs() < 1e-10);
        }
    }
}
