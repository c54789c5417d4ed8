//! The maximum-likelihood estimator: turns a [`MultiHistogramHistory`] into
//! a self-consistent entropy estimate via the GMH equations (`spec.md`
//! §4.4).
use std::collections::HashMap;

use log::{debug, info, warn};
use nalgebra::DVector;

use super::gmh::GmhEquations;
use super::newton::{newton, NewtonOutcome, MAX_ITERATIONS};
use crate::array::{log_sum_exp, BArray, CArray, DArray};
use crate::binner::{support::find_left_bound, support::find_right_bound, slope::average_slope, Binner};
use crate::error::{MuninnError, MuninnResult};
use crate::estimate::Estimate;
use crate::history::{HistoryEntry, MultiHistogramHistory};

/// Maximum-likelihood / GMH estimator.
///
/// `sigma` bins are used only for the slope estimate that reports the
/// effective beta range at the edges of the support, not for the entropy
/// estimate itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mle {
    sigma: u64,
}

impl Mle {
    /// A new estimator; `sigma` bins feed the beta-range logging slope
    /// estimate.
    pub fn new(sigma: u64) -> Self {
        Mle { sigma }
    }

    /// Re-estimate `estimate` in place from `history`. `binner`, if given,
    /// is only used to report the effective beta range at the support's
    /// edges.
    pub fn estimate(
        &self,
        history: &MultiHistogramHistory,
        estimate: &mut Estimate,
        binner: Option<&dyn Binner>,
    ) -> MuninnResult<()> {
        let min_count = history.min_count();
        let sum_n = history.sum_n();
        let nbins = sum_n.len();
        let support = sum_n.at_least(min_count);

        if support.count() == 0 {
            warn!("The MLE entropy cannot be estimated: the histograms have no support.");
            estimate.set_ln_g(DArray::zeros(nbins));
            estimate.set_ln_g_support(BArray::falses(nbins));
            estimate.set_free_energies(HashMap::new());
            return Ok(());
        }

        let entries: Vec<&HistoryEntry> = history.iter().collect();
        let n = entries.len();

        let support_n: Vec<u64> = entries
            .iter()
            .map(|e| {
                (0..nbins)
                    .filter(|&b| support[b])
                    .map(|b| e.histogram.counts()[b])
                    .sum()
            })
            .collect();

        let mut free_energies: Vec<f64> = entries
            .iter()
            .enumerate()
            .map(|(i, e)| match estimate.free_energy(e.id) {
                Some(fe) => fe,
                None => {
                    if i > 0 {
                        warn!("Missing previous MLE free energy for history entry {}.", e.id);
                    }
                    0.0
                }
            })
            .collect();

        let x0 = match estimate.x0() {
            Some(x0) if sum_n[x0] >= min_count => x0,
            prev => {
                let new_x0 = (0..nbins).max_by_key(|&b| sum_n[b]).expect("nbins > 0");
                if let Some(prev) = prev {
                    info!("Moving x0 from {} to {}", prev, new_x0);
                }
                new_x0
            }
        };
        estimate.set_x0(Some(x0));

        free_energies[0] = initial_free_energy_estimate(
            &entries,
            estimate.ln_g(),
            sum_n,
            &support_n,
            min_count,
            x0,
        )?;

        // accumulated_n[i] = counts summed over entries i..n (entry i
        // together with every older entry).
        let mut accumulated_n: Vec<CArray> = vec![CArray::zeros(nbins); n];
        let mut running = CArray::zeros(nbins);
        for i in (0..n).rev() {
            for b in 0..nbins {
                running[b] += entries[i].histogram.counts()[b];
            }
            accumulated_n[i] = running.clone();
        }

        let mut support_no_x0 = support.clone();
        support_no_x0[x0] = false;

        let ln_sum_n = DArray(
            (0..nbins)
                .map(|b| {
                    if sum_n[b] > 0 {
                        (sum_n[b] as f64).ln()
                    } else {
                        f64::NEG_INFINITY
                    }
                })
                .collect(),
        );

        let lnw: Vec<&DArray> = entries.iter().map(|e| e.histogram.lnw()).collect();

        let eqn = GmhEquations {
            lnw,
            accumulated_n,
            support: support_no_x0,
            support_n: support_n.clone(),
            ln_sum_n: ln_sum_n.clone(),
            x0,
            ln_g_x0: estimate.ln_g()[x0],
        };

        let x_start = DVector::from_vec(free_energies.clone());
        let (solved, outcome) = newton(x_start, &eqn);
        if outcome != NewtonOutcome::Successful {
            return Err(MuninnError::NoSolution {
                iterations: MAX_ITERATIONS,
            });
        }
        free_energies = solved.iter().copied().collect();

        let mut new_ln_g = DArray::zeros(nbins);
        for bin in 0..nbins {
            if !support[bin] {
                continue;
            }
            let mut summands = vec![f64::NEG_INFINITY; n];
            for i in 0..n {
                if entries[i].histogram.counts()[bin] > 0 {
                    summands[i] =
                        (support_n[i] as f64).ln() + entries[i].histogram.lnw()[bin] + free_energies[i];
                }
            }
            new_ln_g[bin] = (sum_n[bin] as f64).ln() - log_sum_exp(&summands);
        }

        let beta_range_basis = new_ln_g.clone();
        estimate.set_ln_g(new_ln_g);
        estimate.set_ln_g_support(support.clone());

        let mut free_energy_map = HashMap::new();
        for (i, e) in entries.iter().enumerate() {
            free_energy_map.insert(e.id, free_energies[i]);
        }
        estimate.set_free_energies(free_energy_map);

        debug!("MLE estimated free energies: {:?}", free_energies);

        if let Some(binner) = binner {
            if let (Some(bin_left), Some(bin_right)) =
                (find_left_bound(&support), find_right_bound(&support))
            {
                let bin_centers = binner.get_binning_centered();
                let bin_widths = binner.get_bin_widths();
                let ln_density = DArray(
                    (0..nbins)
                        .map(|b| beta_range_basis[b] - bin_widths[b].ln())
                        .collect(),
                );
                let beta_left =
                    average_slope(bin_left, &ln_density, &support, sum_n, &bin_centers, self.sigma);
                let beta_right =
                    average_slope(bin_right, &ln_density, &support, sum_n, &bin_centers, self.sigma);
                debug!("MLE beta range: ({}, {})", beta_left, beta_right);
            }
        }

        Ok(())
    }
}

/// An initial guess of the free energy for the newest history entry,
/// following equation (A.4)/(A.5) in the reference derivation: either an
/// explicit normalization against the reference bin (single-entry history),
/// or a correction of the previous partition function estimate restricted
/// to the region where the new histogram overlaps the old support.
fn initial_free_energy_estimate(
    entries: &[&HistoryEntry],
    ln_g: &DArray,
    sum_n: &CArray,
    support_n: &[u64],
    min_count: u64,
    x0: usize,
) -> MuninnResult<f64> {
    let newest = &entries[0].histogram;

    if entries.len() == 1 {
        return Ok(-ln_g[x0] - newest.lnw()[x0] - (support_n[0] as f64).ln()
            + (newest.counts()[x0] as f64).ln());
    }

    let nbins = sum_n.len();
    let mut usable = BArray::falses(nbins);
    for b in 0..nbins {
        let rest = sum_n[b] - newest.counts()[b];
        usable[b] = rest >= min_count && newest.counts()[b] > 0;
    }

    let n_in: u64 = (0..nbins)
        .filter(|&b| usable[b])
        .map(|b| newest.counts()[b])
        .sum();
    let n_out = support_n[0].saturating_sub(n_in);

    if n_in == 0 {
        return Err(MuninnError::NoOverlap);
    }

    let mut summands = vec![f64::NEG_INFINITY; nbins];
    for b in 0..nbins {
        if usable[b] {
            summands[b] = ln_g[b] + newest.lnw()[b];
        }
    }
    let ln_z_in = log_sum_exp(&summands);
    let ln_z = ln_z_in + (1.0 + n_out as f64 / n_in as f64).ln();
    Ok(-ln_z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::DeletionPolicy;
    use crate::histogram::Histogram;

    fn flat_history(nbins: usize, min_count: u64) -> MultiHistogramHistory {
        let mut history = MultiHistogramHistory::new(nbins, 10, min_count, DeletionPolicy::DropNone);
        let mut h = Histogram::new_empty(nbins);
        for bin in 0..nbins {
            for _ in 0..20 {
                h.add_observation(bin);
            }
        }
        history.add_histogram(h);
        history
    }

    #[test]
    fn single_flat_histogram_recovers_flat_entropy() {
        let history = flat_history(5, 5);
        let mut estimate = Estimate::new_empty(5);
        let mle = Mle::new(10);
        mle.estimate(&history, &mut estimate, None).unwrap();

        assert!(estimate.ln_g_support().0.iter().all(|&s| s));
        let ln_g = estimate.ln_g();
        let spread = ln_g.0.iter().cloned().fold(f64::MIN, f64::max)
            - ln_g.0.iter().cloned().fold(f64::MAX, f64::min);
        assert!(spread < 1e-6, "flat sampling under flat weights should give ~flat entropy");
    }

    #[test]
    fn no_support_is_reported_without_error() {
        let history = MultiHistogramHistory::new(4, 10, 5, DeletionPolicy::DropNone);
        let mut estimate = Estimate::new_empty(4);
        let mle = Mle::new(10);
        mle.estimate(&history, &mut estimate, None).unwrap();
        assert_eq!(estimate.ln_g_support().count(), 0);
    }
}
