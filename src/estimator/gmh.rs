//! The generalized multi-histogram (GMH) equations, accumulated-support
//! variant (`spec.md` §4.4), solved by [`super::newton::newton`] to turn a
//! guess of the per-histogram free energies into a self-consistent one.
use nalgebra::{DMatrix, DVector};

use super::newton::NonlinearSystem;
use crate::array::{log_sum_exp, BArray, CArray, DArray};

/// `F(free_energy) = 0`, the spectral free-energy equations from the GMH
/// system. `support` must already have the reference bin's entry cleared
/// (it is handled by a dedicated term, not folded into the sum).
pub struct GmhEquations<'a> {
    /// Per-history-entry log-weights, newest first.
    pub lnw: Vec<&'a DArray>,
    /// `accumulated_n[i]` is the count histogram summed over entries `i..n`
    /// (entry `i` together with every *older* entry).
    pub accumulated_n: Vec<CArray>,
    /// Support mask with the reference bin's entry forced to `false`.
    pub support: BArray,
    /// Total supported counts per history entry.
    pub support_n: Vec<u64>,
    /// `ln(sum_N)`, `-inf` where `sum_N == 0`.
    pub ln_sum_n: DArray,
    /// The reference bin.
    pub x0: usize,
    /// The (fixed) entropy at the reference bin.
    pub ln_g_x0: f64,
}

impl GmhEquations<'_> {
    fn calc_ln_d(&self, free_energy: &DVector<f64>) -> DArray {
        let n = self.lnw.len();
        let nbins = self.support.len();
        let mut ln_d = DArray::zeros(nbins);
        let mut summands = vec![f64::NEG_INFINITY; n];
        for bin in 0..nbins {
            if !self.support[bin] {
                continue;
            }
            for (i, s) in summands.iter_mut().enumerate() {
                *s = if self.accumulated_n[i][bin] > 0 {
                    (self.support_n[i] as f64).ln() + self.lnw[i][bin] + free_energy[i]
                } else {
                    f64::NEG_INFINITY
                };
            }
            ln_d[bin] = log_sum_exp(&summands);
        }
        ln_d
    }
}

impl NonlinearSystem for GmhEquations<'_> {
    fn dims(&self) -> usize {
        self.lnw.len()
    }

    fn function(&self, x: &DVector<f64>, f: &mut DVector<f64>) {
        let ln_d = self.calc_ln_d(x);
        let nbins = self.support.len();
        let mut summands = vec![f64::NEG_INFINITY; nbins];

        for i in 0..self.lnw.len() {
            for (bin, s) in summands.iter_mut().enumerate() {
                *s = if self.support[bin] && self.accumulated_n[i][bin] > 0 {
                    self.lnw[i][bin] + self.ln_sum_n[bin] - ln_d[bin]
                } else {
                    f64::NEG_INFINITY
                };
            }

            let mut value = -1.0 + (x[i] + log_sum_exp(&summands)).exp();
            if self.accumulated_n[i][self.x0] > 0 {
                value += (x[i] + self.lnw[i][self.x0] + self.ln_g_x0).exp();
            }
            f[i] = value;
        }
    }

    fn jacobian(&self, x: &DVector<f64>, f: &DVector<f64>, j: &mut DMatrix<f64>) {
        let ln_d = self.calc_ln_d(x);
        let n = self.lnw.len();
        let nbins = self.support.len();
        let mut summands = vec![f64::NEG_INFINITY; nbins];

        for i in 0..n {
            for jj in i..n {
                for (bin, s) in summands.iter_mut().enumerate() {
                    *s = if self.support[bin]
                        && self.accumulated_n[i][bin] > 0
                        && self.accumulated_n[jj][bin] > 0
                    {
                        self.lnw[i][bin] + self.lnw[jj][bin] + self.ln_sum_n[bin] - 2.0 * ln_d[bin]
                    } else {
                        f64::NEG_INFINITY
                    };
                }

                let mut value =
                    -(self.support_n[jj] as f64) * (x[i] + x[jj] + log_sum_exp(&summands)).exp();
                if i == jj {
                    value += f[i] + 1.0;
                }
                j[(i, jj)] = value;
            }
        }

        for i in 0..n {
            for jj in 0..i {
                j[(i, jj)] = j[(jj, i)] * self.support_n[jj] as f64 / self.support_n[i].max(1) as f64;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_history_reduces_to_explicit_normalization() {
        // With a single histogram, D(bin) = support_n * lnw(bin) * F0, and
        // the equation reduces to F0 solving sum_N == sum_N (trivially
        // satisfied at any F since there's nothing to reweight against) -
        // so the Jacobian should be well defined and not divide by zero.
        let lnw = DArray(vec![0.0, 0.0, 0.0]);
        let counts = CArray(vec![5, 5, 5]);
        let support = BArray(vec![true, true, false]);
        let mut support_no_x0 = support.clone();
        support_no_x0[0] = false;

        let eqn = GmhEquations {
            lnw: vec![&lnw],
            accumulated_n: vec![counts.clone()],
            support: support_no_x0,
            support_n: vec![10],
            ln_sum_n: DArray(vec![(5f64).ln(), (5f64).ln(), f64::NEG_INFINITY]),
            x0: 0,
            ln_g_x0: 0.0,
        };

        let mut f = DVector::zeros(1);
        let x = DVector::from_vec(vec![0.0]);
        eqn.function(&x, &mut f);
        assert!(f[0].is_finite());

        let mut j = DMatrix::zeros(1, 1);
        eqn.jacobian(&x, &f, &mut j);
        assert!(j[(0, 0)].is_finite());
    }
}
