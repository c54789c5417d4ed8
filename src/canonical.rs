//! Canonical-ensemble thermodynamic properties obtained by reweighting an
//! entropy estimate with Boltzmann weights (`spec.md` §4.9).
use crate::array::{log_sum_exp, BArray, DArray};
use crate::binner::Binner;

/// Thermodynamic quantities derived from an entropy estimate by reweighting
/// with `w(E) = exp(-beta*E)`. Borrows the bin centers and the estimate it
/// was built from; construct a fresh one whenever the estimate changes.
pub struct CanonicalProperties<'a> {
    bin_centers: &'a DArray,
    ln_g: &'a DArray,
    ln_g_support: &'a BArray,
}

impl<'a> CanonicalProperties<'a> {
    /// Borrow `bin_centers`, `ln_g` and `ln_g_support`; all three must share
    /// the same length.
    pub fn new(bin_centers: &'a DArray, ln_g: &'a DArray, ln_g_support: &'a BArray) -> Self {
        CanonicalProperties {
            bin_centers,
            ln_g,
            ln_g_support,
        }
    }

    /// `ln(Z(beta)) = ln(sum_E G(E) exp(-beta*E))`, restricted to the support.
    pub fn ln_z(&self, beta: f64) -> f64 {
        let nbins = self.ln_g.len();
        let mut summands = vec![f64::NEG_INFINITY; nbins];
        for b in 0..nbins {
            if self.ln_g_support[b] {
                summands[b] = self.ln_g[b] - self.bin_centers[b] * beta;
            }
        }
        log_sum_exp(&summands)
    }

    /// `Z(beta)`.
    pub fn z(&self, beta: f64) -> f64 {
        self.ln_z(beta).exp()
    }

    /// Per-bin occupation probability at `beta`; zero outside the support.
    pub fn p_e(&self, beta: f64) -> DArray {
        let ln_z = self.ln_z(beta);
        let nbins = self.ln_g.len();
        DArray(
            (0..nbins)
                .map(|b| {
                    if self.ln_g_support[b] {
                        (self.ln_g[b] - self.bin_centers[b] * beta - ln_z).exp()
                    } else {
                        0.0
                    }
                })
                .collect(),
        )
    }

    /// `beta * F(beta) = -ln(Z(beta))`.
    pub fn beta_f(&self, beta: f64) -> f64 {
        -self.ln_z(beta)
    }

    /// Mean energy `<E>` at `beta`.
    pub fn e(&self, beta: f64) -> f64 {
        let p = self.p_e(beta);
        (0..self.ln_g.len())
            .filter(|&b| self.ln_g_support[b])
            .map(|b| self.bin_centers[b] * p[b])
            .sum()
    }

    /// Mean square energy `<E^2>` at `beta`.
    pub fn e_sq(&self, beta: f64) -> f64 {
        let p = self.p_e(beta);
        (0..self.ln_g.len())
            .filter(|&b| self.ln_g_support[b])
            .map(|b| self.bin_centers[b].powi(2) * p[b])
            .sum()
    }

    /// Entropy `S(beta)/k_B = beta*<E> - beta*F(beta)`.
    pub fn s(&self, beta: f64) -> f64 {
        beta * self.e(beta) - self.beta_f(beta)
    }

    /// Heat capacity `C(beta)/k_B = beta^2 * (<E^2> - <E>^2)`.
    pub fn c(&self, beta: f64) -> f64 {
        let mean = self.e(beta);
        beta.powi(2) * (self.e_sq(beta) - mean * mean)
    }
}

/// Per-sample weights for a canonical average at `beta`, given a sequence of
/// sampled energies and an entropy estimate.
///
/// `w_i = P_beta(bin(e_i)) / count(bin(e_i))`, where `count` is the number of
/// samples landing in that bin; samples falling outside the binned range, or
/// into a bin unsupported by `ln_g_support`, receive weight `0`.
pub fn canonical_average_weights(
    energies: &[f64],
    binner: &dyn Binner,
    ln_g: &DArray,
    ln_g_support: &BArray,
    beta: f64,
) -> Vec<f64> {
    let nbins = ln_g.len();
    let mut counts = vec![0u64; nbins];
    let bins: Vec<Option<usize>> = energies
        .iter()
        .map(|&e| {
            let bin = binner.calc_bin(e);
            if bin >= 0 && (bin as usize) < nbins {
                let bin = bin as usize;
                counts[bin] += 1;
                Some(bin)
            } else {
                None
            }
        })
        .collect();

    let bin_centers = binner.get_binning_centered();
    let support = BArray((0..nbins).map(|b| counts[b] > 0 && ln_g_support[b]).collect());

    let mut summands = vec![f64::NEG_INFINITY; nbins];
    for b in 0..nbins {
        if support[b] {
            summands[b] = ln_g[b] - beta * bin_centers[b];
        }
    }
    let ln_z_beta = log_sum_exp(&summands);

    let p_beta: Vec<f64> = (0..nbins)
        .map(|b| {
            if support[b] {
                (-beta * bin_centers[b] + ln_g[b] - ln_z_beta).exp()
            } else {
                0.0
            }
        })
        .collect();

    bins.into_iter()
        .map(|bin| match bin {
            Some(b) if support[b] => p_beta[b] / counts[b] as f64,
            _ => 0.0,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_density_recovers_uniform_distribution_at_beta_zero() {
        let bin_centers = DArray(vec![0.0, 1.0, 2.0, 3.0]);
        let ln_g = DArray(vec![0.0, 0.0, 0.0, 0.0]);
        let support = BArray(vec![true, true, true, true]);
        let props = CanonicalProperties::new(&bin_centers, &ln_g, &support);

        let p = props.p_e(0.0);
        for &prob in &p.0 {
            assert!((prob - 0.25).abs() < 1e-12);
        }
        assert!((props.e(0.0) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn high_beta_concentrates_on_lowest_energy_bin() {
        let bin_centers = DArray(vec![0.0, 1.0, 2.0]);
        let ln_g = DArray(vec![0.0, 0.0, 0.0]);
        let support = BArray(vec![true, true, true]);
        let props = CanonicalProperties::new(&bin_centers, &ln_g, &support);

        let e = props.e(50.0);
        assert!(e < 0.01, "at large beta the mean energy should collapse to the lowest bin, got {e}");
    }

    #[test]
    fn average_weights_sum_to_one_per_supported_bin_occupants() {
        use crate::binner::UniformBinner;

        let mut binner = UniformBinner::with_bin_width(1.0, 0, 10);
        let mut bootstrap = vec![0.5, 1.5, 2.5];
        binner.initialize(&mut bootstrap, 0.0).unwrap();

        let ln_g = DArray(vec![0.0, 0.0, 0.0]);
        let support = BArray(vec![true, true, true]);

        let energies = vec![0.5, 0.5, 1.5, 2.5, 2.5, 2.5];
        let weights = super::canonical_average_weights(&energies, &binner, &ln_g, &support, 0.0);

        // Two samples share bin 0, so each gets half of that bin's P_beta.
        assert!((weights[0] - weights[1]).abs() < 1e-12);
        let bin0_total: f64 = weights[0] + weights[1];
        let bin2_total: f64 = weights[3] + weights[4] + weights[5];
        // Flat entropy at beta=0 gives equal P_beta per bin, so equal totals.
        assert!((bin0_total - bin2_total).abs() < 1e-9);
    }

    #[test]
    fn average_weight_is_zero_outside_the_binned_range() {
        use crate::binner::UniformBinner;

        let mut binner = UniformBinner::with_bin_width(1.0, 0, 3);
        let mut bootstrap = vec![0.5, 1.5];
        binner.initialize(&mut bootstrap, 0.0).unwrap();

        let ln_g = DArray(vec![0.0, 0.0, 0.0]);
        let support = BArray(vec![true, true, true]);

        let weights = super::canonical_average_weights(&[100.0], &binner, &ln_g, &support, 0.0);
        assert_eq!(weights[0], 0.0);
    }
}
