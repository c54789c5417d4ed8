//! Update schemes: deciding when a round of sampling has collected enough
//! observations to re-estimate the entropy and refresh the weights
//! (`spec.md` §4.5).
use log::debug;

use crate::array::BArray;
use crate::histogram::Histogram;
use crate::history::MultiHistogramHistory;

/// Decides when a round of sampling is over, and tracks the "prolonging"
/// extension requested by a caller whose estimator failed to converge on
/// the current round.
pub trait UpdateScheme {
    /// The number of iterations used for the very first (initial-collection)
    /// round, fixed for the lifetime of the scheme.
    fn initial_max(&self) -> u64;

    /// True once `current` has collected enough observations to end the
    /// round.
    fn update_required(&self, current: &Histogram, history: &MultiHistogramHistory) -> bool;

    /// Called just before `current` is pushed onto `history`, letting the
    /// scheme update its internal state (e.g. grow the round length).
    fn updating_history(&mut self, current: &Histogram, history: &MultiHistogramHistory);

    /// Extend the current round because the estimator failed to converge.
    /// Safe to call repeatedly; each call adds more time.
    fn prolong(&mut self);

    /// Clear any accumulated prolonging.
    fn reset_prolonging(&mut self);
}

/// The round length grows exponentially by `increase_factor` whenever the
/// newest histogram gains fewer than `fraction` of the history's existing
/// supported-bin count in new bins (or, if `fraction` is negative,
/// whenever it gains no new supported bins at all). A bin counts as
/// "supported" once it has at least `min_count` observations.
#[derive(Debug, Clone, Copy)]
pub struct IncreaseFactorScheme {
    initial_max: u64,
    this_max: u64,
    prolonging: u64,
    increase_factor: f64,
    min_count: u64,
    fraction: f64,
}

impl IncreaseFactorScheme {
    /// `initial_max` is also the starting round length; it grows from there.
    pub fn new(initial_max: u64, increase_factor: f64, min_count: u64, fraction: f64) -> Self {
        IncreaseFactorScheme {
            initial_max,
            this_max: initial_max,
            prolonging: 0,
            increase_factor,
            min_count,
            fraction,
        }
    }

    /// The number of iterations required for the current round, before
    /// prolonging.
    pub fn this_max(&self) -> u64 {
        self.this_max
    }
}

impl Default for IncreaseFactorScheme {
    fn default() -> Self {
        IncreaseFactorScheme::new(5000, 1.07, 20, 0.05)
    }
}

impl UpdateScheme for IncreaseFactorScheme {
    fn initial_max(&self) -> u64 {
        self.initial_max
    }

    fn update_required(&self, current: &Histogram, _history: &MultiHistogramHistory) -> bool {
        current.n() >= self.this_max + self.prolonging
    }

    fn updating_history(&mut self, current: &Histogram, history: &MultiHistogramHistory) {
        if history.is_empty() {
            return;
        }

        let nbins = history.shape_len();
        let mut prev_observed = BArray::falses(nbins);
        for entry in history.iter() {
            for b in 0..nbins {
                if entry.histogram.counts()[b] >= self.min_count {
                    prev_observed[b] = true;
                }
            }
        }
        let num_prev_observed = prev_observed.count();

        let new_observed_bins = (0..nbins)
            .filter(|&b| current.counts()[b] >= self.min_count && !prev_observed[b])
            .count();

        if (new_observed_bins as f64) < self.fraction * num_prev_observed as f64
            || (new_observed_bins == 0 && self.fraction < 0.0)
        {
            self.this_max = (self.this_max as f64 * self.increase_factor) as u64;
            debug!("Setting this_max to {}.", self.this_max);
        }
    }

    fn prolong(&mut self) {
        self.prolonging += self.this_max / 4;
    }

    fn reset_prolonging(&mut self) {
        self.prolonging = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::DeletionPolicy;

    #[test]
    fn round_ends_once_observation_budget_is_reached() {
        let scheme = IncreaseFactorScheme::new(10, 1.5, 2, 0.05);
        let history = MultiHistogramHistory::new(4, 10, 2, DeletionPolicy::DropNone);
        let mut h = Histogram::new_empty(4);
        for _ in 0..9 {
            h.add_observation(0);
        }
        assert!(!scheme.update_required(&h, &history));
        h.add_observation(0);
        assert!(scheme.update_required(&h, &history));
    }

    #[test]
    fn stagnant_support_growth_increases_round_length() {
        let mut scheme = IncreaseFactorScheme::new(100, 2.0, 1, 0.5);
        let mut history = MultiHistogramHistory::new(4, 10, 1, DeletionPolicy::DropNone);
        let mut first = Histogram::new_empty(4);
        first.add_observation(0);
        first.add_observation(1);
        history.add_histogram(first);

        let mut second = Histogram::new_empty(4);
        second.add_observation(0);
        scheme.updating_history(&second, &history);
        assert_eq!(scheme.this_max(), 200);
    }

    #[test]
    fn prolong_adds_a_quarter_of_this_max_and_resets_cleanly() {
        let mut scheme = IncreaseFactorScheme::new(100, 1.5, 1, 0.5);
        let history = MultiHistogramHistory::new(4, 10, 1, DeletionPolicy::DropNone);
        let mut h = Histogram::new_empty(4);
        for _ in 0..100 {
            h.add_observation(0);
        }
        assert!(scheme.update_required(&h, &history));

        scheme.prolong();
        h.add_observation(0);
        assert!(!scheme.update_required(&h, &history));

        scheme.reset_prolonging();
        assert!(scheme.update_required(&h, &history));
    }
}
