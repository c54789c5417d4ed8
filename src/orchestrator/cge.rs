//! The continuous generalized ensemble: the user-facing wrapper around [`Ge`]
//! that speaks energies instead of bin indices (`spec.md` §4.5).
use log::warn;

use crate::array::DArray;
use crate::binner::Binner;
use crate::error::{MuninnError, MuninnResult};
use crate::estimate::Estimate;
use crate::estimator::Mle;
use crate::history::MultiHistogramHistory;
use crate::logger::StatisticsLogger;
use crate::orchestrator::ge::Ge;
use crate::update_scheme::UpdateScheme;
use crate::weight_scheme::{ExtrapolatedWeightScheme, WeightScheme};

/// A weight scheme owned by a [`Cge`]. Stands in for the reference's
/// `dynamic_cast<ExtrapolatedWeightScheme*>` of a single owned object: Rust
/// has no such downcast, so the caller declares up front (by choosing the
/// variant) whether the scheme it is handing over also extrapolates.
pub enum WeightSchemeHandle {
    /// An ordinary scheme: out-of-range energies require extending the
    /// binning before a weight can be produced.
    Plain(Box<dyn WeightScheme>),
    /// A scheme that can also produce a weight outside the current binning
    /// without extending it.
    Extrapolated(Box<dyn ExtrapolatedWeightScheme>),
}

impl WeightScheme for WeightSchemeHandle {
    fn get_weights(
        &mut self,
        estimate: &Estimate,
        history: &MultiHistogramHistory,
        binner: Option<&dyn Binner>,
    ) -> DArray {
        match self {
            WeightSchemeHandle::Plain(scheme) => scheme.get_weights(estimate, history, binner),
            WeightSchemeHandle::Extrapolated(scheme) => scheme.get_weights(estimate, history, binner),
        }
    }
}

impl WeightSchemeHandle {
    fn extrapolated(&self) -> Option<&dyn ExtrapolatedWeightScheme> {
        match self {
            WeightSchemeHandle::Plain(_) => None,
            WeightSchemeHandle::Extrapolated(scheme) => Some(scheme.as_ref()),
        }
    }
}

/// The continuous generalized ensemble: a [`Ge`] plus a [`Binner`] to turn
/// energies into bins, and an "initial collection" pre-phase that gathers a
/// bootstrap sample of raw energies (under Boltzmann weights) before the
/// binner can be initialized at all.
pub struct Cge {
    ge: Ge,
    binner: Box<dyn Binner>,
    weight_scheme: WeightSchemeHandle,
    initial_max: u64,
    initial_collection: bool,
    initial_observations: Vec<f64>,
    initial_beta: f64,
}

impl Cge {
    /// Build a fresh `Cge`, starting in the initial-collection phase:
    /// `initial_beta` is used as the Boltzmann inverse-temperature for the
    /// bootstrap sample, and the binner is initialized from it once
    /// `update_scheme.initial_max()` observations have been gathered.
    /// `min_count` is the per-bin observation threshold the MLE estimator
    /// uses to decide support, matching [`crate::settings::Settings::min_count`].
    pub fn new(
        estimator: Mle,
        update_scheme: Box<dyn UpdateScheme>,
        weight_scheme: WeightSchemeHandle,
        binner: Box<dyn Binner>,
        logger: Option<StatisticsLogger>,
        initial_beta: f64,
        min_count: u64,
    ) -> Self {
        let initial_max = update_scheme.initial_max();
        let history = MultiHistogramHistory::new(0, 10, min_count, crate::history::DeletionPolicy::DropNone);
        let estimate = Estimate::new_empty(0);
        let ge = Ge::new(history, estimate, estimator, update_scheme, logger, 1);
        Cge {
            ge,
            binner,
            weight_scheme,
            initial_max,
            initial_collection: true,
            initial_observations: Vec::new(),
            initial_beta,
        }
    }

    /// Build a `Cge` around an already-initialized `history`/`estimate`
    /// pair whose shape matches `binner.nbins()`; skips the initial
    /// collection phase entirely.
    pub fn from_history(
        history: MultiHistogramHistory,
        estimate: Estimate,
        estimator: Mle,
        update_scheme: Box<dyn UpdateScheme>,
        weight_scheme: WeightSchemeHandle,
        binner: Box<dyn Binner>,
        logger: Option<StatisticsLogger>,
    ) -> MuninnResult<Self> {
        if history.shape_len() != binner.nbins() {
            return Err(MuninnError::ShapeMismatch {
                found: vec![history.shape_len()],
                expected: vec![binner.nbins()],
            });
        }
        let initial_max = update_scheme.initial_max();
        let ge = Ge::new(history, estimate, estimator, update_scheme, logger, 1);
        Ok(Cge {
            ge,
            binner,
            weight_scheme,
            initial_max,
            initial_collection: false,
            initial_observations: Vec::new(),
            initial_beta: 0.0,
        })
    }

    /// Record an observation of `energy`. Returns true if
    /// [`Cge::estimate_new_weights`] should now be called.
    pub fn add_observation(&mut self, energy: f64) -> bool {
        if self.initial_collection {
            self.initial_observations.push(energy);
            self.initial_new_weights()
        } else {
            match self.calc_bin_with_extension(energy) {
                Ok(bin) => self.ge.add_observation(bin),
                Err(error) => {
                    warn!("{error}");
                    self.ge.new_weights()
                }
            }
        }
    }

    /// The log weight to sample `energy` under.
    pub fn get_lnweights(&mut self, energy: f64) -> f64 {
        if self.initial_collection {
            return -self.initial_beta * energy;
        }

        if let Some(extrapolated) = self.weight_scheme.extrapolated() {
            let (bin, in_range) = self.binner.calc_bin_validated(energy);
            if in_range {
                self.ge.get_lnweights(bin as usize)
            } else {
                extrapolated.get_extrapolated_weight(
                    energy,
                    self.ge.current_sum().lnw(),
                    self.ge.estimate(),
                    self.ge.history(),
                    self.binner.as_ref(),
                )
            }
        } else {
            match self.calc_bin_with_extension(energy) {
                Ok(bin) => self.ge.get_lnweights(bin),
                Err(error) => {
                    warn!("{error}");
                    f64::INFINITY
                }
            }
        }
    }

    /// Cheap cached check: is it time to call
    /// [`Cge::estimate_new_weights`]?
    pub fn new_weights(&self) -> bool {
        if self.initial_collection {
            self.initial_new_weights()
        } else {
            self.ge.new_weights()
        }
    }

    /// End the current round (or, during initial collection, initialize the
    /// binner from the gathered bootstrap sample and transition to steady
    /// state).
    pub fn estimate_new_weights(&mut self) -> MuninnResult<()> {
        if self.initial_collection {
            self.binner.initialize(&mut self.initial_observations, self.initial_beta)?;
            let nbins = self.binner.nbins();

            self.ge.extend(0, nbins, &mut self.weight_scheme, Some(self.binner.as_ref()));

            let bin_centers = self.binner.get_binning_centered();
            let lnw = DArray((0..nbins).map(|b| -self.initial_beta * bin_centers[b]).collect());
            self.ge.reset_current(lnw);

            let observations = std::mem::take(&mut self.initial_observations);
            for energy in observations {
                let bin = self.binner.calc_bin(energy);
                self.ge.add_observation(bin as usize);
            }

            self.ge.estimate_new_weights(&mut self.weight_scheme, Some(self.binner.as_ref()))?;
            self.initial_collection = false;
            Ok(())
        } else {
            self.ge.estimate_new_weights(&mut self.weight_scheme, Some(self.binner.as_ref()))
        }
    }

    /// Force a statistics-log write of the current state.
    pub fn force_statistics_log(&mut self) -> MuninnResult<()> {
        self.ge.force_statistics_log(Some(self.binner.as_ref()))
    }

    /// The binner in use.
    pub fn get_binner(&self) -> &dyn Binner {
        self.binner.as_ref()
    }

    /// Shortcut to the binner's bin edges.
    pub fn get_binning(&self) -> DArray {
        self.binner.get_binning()
    }

    /// Shortcut to the binner's bin centers.
    pub fn get_binning_centered(&self) -> DArray {
        self.binner.get_binning_centered()
    }

    /// The underlying discrete `Ge`.
    pub fn get_ge(&self) -> &Ge {
        &self.ge
    }

    /// Whether this chain is still in the initial-collection phase.
    /// Used by [`crate::orchestrator::collection::CgeCollection`] to unify a
    /// pool of chains before the binners have been initialized.
    pub(crate) fn is_initial_collection(&self) -> bool {
        self.initial_collection
    }

    /// The raw observations gathered so far during initial collection.
    pub(crate) fn initial_observations(&self) -> &[f64] {
        &self.initial_observations
    }

    /// Initialize this chain's (still uninitialized) binner from a merged
    /// sample pooled across a collection of chains.
    pub(crate) fn initialize_binner_unified(&mut self, samples: &mut Vec<f64>) -> MuninnResult<()> {
        self.binner.initialize(samples, 0.0)
    }

    /// Extend this chain's binning to include `value`, using
    /// [`crate::binner::NonUniformDynamicBinner::include`] (no extra margin
    /// beyond what's needed). Fails with [`MuninnError::CastMismatch`] if
    /// this chain's binner is not a `NonUniformDynamicBinner`.
    pub(crate) fn include_value(&mut self, value: f64) -> MuninnResult<()> {
        let binner = self
            .binner
            .as_any_mut()
            .downcast_mut::<crate::binner::NonUniformDynamicBinner>()
            .ok_or(MuninnError::CastMismatch {
                expected: "NonUniformDynamicBinner",
                found: "other",
            })?;
        let extension = binner.include(value, self.ge.estimate(), self.ge.history(), self.ge.current_sum().lnw())?;
        self.ge.extend(
            extension.add_under,
            extension.add_over,
            &mut self.weight_scheme,
            Some(self.binner.as_ref()),
        );
        Ok(())
    }

    /// This chain's binning range's lowest and highest bin centers.
    /// Panics if the binning is still empty.
    pub(crate) fn binning_bounds(&self) -> (f64, f64) {
        let centered = self.binner.get_binning_centered();
        (centered[0], centered[centered.len() - 1])
    }

    /// The slope of the weights at `bin`, using this chain's own history and
    /// current weights; requires this chain's binner to be a
    /// `NonUniformDynamicBinner`.
    pub(crate) fn slope_at(&self, bin: usize) -> MuninnResult<f64> {
        let binner = self
            .binner
            .as_any()
            .downcast_ref::<crate::binner::NonUniformDynamicBinner>()
            .ok_or(MuninnError::CastMismatch {
                expected: "NonUniformDynamicBinner",
                found: "other",
            })?;
        Ok(crate::binner::slope::average_slope(
            bin,
            self.ge.current_sum().lnw(),
            self.ge.estimate().ln_g_support(),
            self.ge.history().sum_n(),
            &binner.get_binning_centered(),
            binner.sigma(),
        ))
    }

    /// Set preset boundary slopes on this chain's binner; requires this
    /// chain's binner to be a `NonUniformDynamicBinner`.
    pub(crate) fn set_binner_preset_slopes(&mut self, slope_left: f64, slope_right: f64) -> MuninnResult<()> {
        let binner = self
            .binner
            .as_any_mut()
            .downcast_mut::<crate::binner::NonUniformDynamicBinner>()
            .ok_or(MuninnError::CastMismatch {
                expected: "NonUniformDynamicBinner",
                found: "other",
            })?;
        binner.set_preset_slopes(slope_left, slope_right);
        Ok(())
    }

    fn initial_new_weights(&self) -> bool {
        self.initial_observations.len() as u64 > self.initial_max
    }

    fn calc_bin_with_extension(&mut self, energy: f64) -> MuninnResult<usize> {
        let (bin, in_range) = self.binner.calc_bin_validated(energy);
        if in_range {
            return Ok(bin as usize);
        }

        let extension = self.binner.extend(
            energy,
            self.ge.estimate(),
            self.ge.history(),
            self.ge.current_sum().lnw(),
        )?;
        self.ge.extend(
            extension.add_under,
            extension.add_over,
            &mut self.weight_scheme,
            Some(self.binner.as_ref()),
        );

        let (bin, _) = self.binner.calc_bin_validated(energy);
        Ok(bin as usize)
    }
}
