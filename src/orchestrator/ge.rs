//! The discrete generalized ensemble state machine (`spec.md` §4.5).
//!
//! `Ge` communicates in bin indices only; `Cge` is the user-facing wrapper
//! that translates energies to bins through a [`Binner`].
use log::{info, warn};

use crate::array::DArray;
use crate::binner::Binner;
use crate::error::MuninnResult;
use crate::estimate::Estimate;
use crate::estimator::Mle;
use crate::histogram::Histogram;
use crate::history::MultiHistogramHistory;
use crate::logger::StatisticsLogger;
use crate::update_scheme::UpdateScheme;
use crate::weight_scheme::WeightScheme;

/// The discrete generalized ensemble: a set of concurrently-filled "current"
/// histograms (one per logical observation thread; length 1 covers the
/// ordinary single-threaded case), a history of finished rounds, and the
/// current entropy estimate.
///
/// `current_sum` tracks the combined counts across all current histograms
/// purely for [`UpdateScheme::update_required`] bookkeeping; it always
/// carries the same `lnw` as every slot in `current_histograms`.
pub struct Ge {
    current_histograms: Vec<Option<Histogram>>,
    current_sum: Histogram,
    history: MultiHistogramHistory,
    estimate: Estimate,
    estimator: Mle,
    update_scheme: Box<dyn UpdateScheme>,
    logger: Option<StatisticsLogger>,
    new_weights_pending: bool,
    total_iterations: u64,
}

impl Ge {
    /// Build a `Ge` around a (possibly already populated) `history` and
    /// `estimate`; `n_threads` current histograms are opened, covering the
    /// same number of bins as `history`.
    ///
    /// Unlike the reference `GE`, this `Ge` does not own a weight scheme:
    /// `Cge` owns it instead (so it can also check whether the scheme is
    /// extrapolating) and passes it by reference into
    /// [`Ge::estimate_new_weights`]/[`Ge::extend`].
    pub fn new(
        history: MultiHistogramHistory,
        estimate: Estimate,
        estimator: Mle,
        update_scheme: Box<dyn UpdateScheme>,
        logger: Option<StatisticsLogger>,
        n_threads: usize,
    ) -> Self {
        let nbins = history.shape_len();
        Ge {
            current_histograms: (0..n_threads.max(1)).map(|_| Some(Histogram::new_empty(nbins))).collect(),
            current_sum: Histogram::new_empty(nbins),
            history,
            estimate,
            estimator,
            update_scheme,
            logger,
            new_weights_pending: false,
            total_iterations: 0,
        }
    }

    /// Record an observation in thread `0`'s current histogram.
    pub fn add_observation(&mut self, bin: usize) -> bool {
        self.add_observation_on_thread(0, bin)
    }

    /// Record an observation in thread `thread_id`'s current histogram.
    pub fn add_observation_on_thread(&mut self, thread_id: usize, bin: usize) -> bool {
        self.current_histograms[thread_id]
            .as_mut()
            .expect("add_observation called mid-estimation on an emptied thread slot")
            .add_observation(bin);
        self.current_sum.add_observation(bin);
        self.new_weights_pending = self.update_scheme.update_required(&self.current_sum, &self.history);
        self.new_weights_pending
    }

    /// The log weight for `bin`, read from the shared current weights.
    pub fn get_lnweights(&self, bin: usize) -> f64 {
        self.current_sum.lnw()[bin]
    }

    /// Cheap cached check: is it time to call [`Ge::estimate_new_weights`]?
    pub fn new_weights(&self) -> bool {
        self.new_weights_pending
    }

    /// The latest entropy estimate.
    pub fn estimate(&self) -> &Estimate {
        &self.estimate
    }

    /// The current history of finished rounds.
    pub fn history(&self) -> &MultiHistogramHistory {
        &self.history
    }

    /// The combined current histogram, used for its shape and shared `lnw`.
    pub fn current_sum(&self) -> &Histogram {
        &self.current_sum
    }

    /// Force a statistics-log write of the current state.
    pub fn force_statistics_log(&mut self, binner: Option<&dyn Binner>) -> MuninnResult<()> {
        if let Some(logger) = &mut self.logger {
            logger.log(&self.current_sum, &self.history, &self.estimate, binner)?;
        }
        Ok(())
    }

    /// End the current round: fold every non-empty current histogram into
    /// the history, re-estimate the entropy, and recompute the weights.
    ///
    /// On an estimator failure, the histograms that were folded in this call
    /// are rolled back out of the history and restored as "current", the
    /// round is prolonged, and the old weights are kept (`spec.md` §4.5
    /// step 3b).
    pub fn estimate_new_weights(
        &mut self,
        weight_scheme: &mut dyn WeightScheme,
        binner: Option<&dyn Binner>,
    ) -> MuninnResult<()> {
        info!("Estimating new weights.");
        self.total_iterations += self.current_sum.n();
        self.update_scheme.updating_history(&self.current_sum, &self.history);

        let mut failed_at_thread = None;
        for thread_id in 0..self.current_histograms.len() {
            let n = self.current_histograms[thread_id].as_ref().map(|h| h.n()).unwrap_or(0);
            if n == 0 {
                continue;
            }

            let histogram = self.current_histograms[thread_id].take().expect("checked Some above");
            self.history.add_histogram(histogram);

            match self.estimator.estimate(&self.history, &mut self.estimate, binner) {
                Ok(()) => {
                    if let Some(logger) = &mut self.logger {
                        let newest = self.history.iter().next().expect("just added a histogram");
                        logger.log(&newest.histogram, &self.history, &self.estimate, binner)?;
                    }
                }
                Err(error) => {
                    warn!("{error}");
                    warn!("Keeping old weights.");
                    failed_at_thread = Some(thread_id);
                    break;
                }
            }
        }

        match failed_at_thread {
            None => {
                let new_weights = weight_scheme.get_weights(&self.estimate, &self.history, binner);
                self.install_weights(new_weights);
                self.update_scheme.reset_prolonging();
            }
            Some(failed_thread) => {
                for thread_id in (0..=failed_thread).rev() {
                    if self.current_histograms[thread_id].is_none() {
                        self.current_histograms[thread_id] = self.history.remove_newest();
                    }
                }
                self.update_scheme.prolong();
            }
        }

        Ok(())
    }

    /// Grow the shape of the `Ge` on both ends, recomputing weights from the
    /// extended estimate.
    pub fn extend(
        &mut self,
        add_under: usize,
        add_over: usize,
        weight_scheme: &mut dyn WeightScheme,
        binner: Option<&dyn Binner>,
    ) {
        self.current_sum.extend(add_under, add_over);
        for slot in self.current_histograms.iter_mut() {
            if let Some(h) = slot {
                h.extend(add_under, add_over);
            }
        }
        self.history.extend(add_under, add_over);
        self.estimate.extend(add_under, add_over);

        let new_weights = weight_scheme.get_weights(&self.estimate, &self.history, binner);
        self.install_weights(new_weights);
    }

    /// Replace the current histograms wholesale with freshly-weighted, empty
    /// ones (used by `Cge` to seed the first round after initial collection).
    pub fn reset_current(&mut self, lnw: DArray) {
        self.install_weights(lnw);
    }

    fn install_weights(&mut self, lnw: DArray) {
        self.current_sum = Histogram::with_weights(lnw.clone());
        for slot in self.current_histograms.iter_mut() {
            *slot = Some(Histogram::with_weights(lnw.clone()));
        }
    }
}
