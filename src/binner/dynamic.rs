//! `NonUniformDynamicBinner`: bin widths chosen so that the weights keep a
//! roughly constant resolution `r` across bins (`spec.md` §4.1).
#[cfg(feature = "serde_support")]
use serde::{Deserialize, Serialize};

use super::slope::average_slope;
use super::support::{find_left_bound, find_right_bound};
use super::{Binner, Extension};
use crate::array::DArray;
use crate::error::{MuninnError, MuninnResult};
use crate::estimate::Estimate;
use crate::history::MultiHistogramHistory;
use crate::stats::calculate_fractiles;
use log::{debug, info};

/// Non-uniform binner that grows each side by estimating the local slope of
/// the weights and picking a bin width that keeps `|w(E_j) - w(E_{j+1})| ~ r`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct NonUniformDynamicBinner {
    resolution: f64,
    initial_width_is_max_left: bool,
    initial_width_is_max_right: bool,
    max_number_of_bins: usize,
    extend_factor: f64,
    sigma: u64,
    initial_bin_width: f64,
    use_preset_slopes: bool,
    preset_slope_left_bound: f64,
    preset_slope_right_bound: f64,
    binning: DArray,
    nbins: usize,
    initialized: bool,
}

impl Default for NonUniformDynamicBinner {
    fn default() -> Self {
        NonUniformDynamicBinner::new(0.2, true, false, 1_000_000, 1.0, 20)
    }
}

impl NonUniformDynamicBinner {
    /// Construct an uninitialized binner. `resolution` is the target
    /// `|ln w(E_j) - ln w(E_{j+1})|` step; `sigma` is the number of observed
    /// bins fed to the Gaussian-kernel slope estimate.
    pub fn new(
        resolution: f64,
        initial_width_is_max_left: bool,
        initial_width_is_max_right: bool,
        max_number_of_bins: usize,
        extend_factor: f64,
        sigma: u64,
    ) -> Self {
        NonUniformDynamicBinner {
            resolution,
            initial_width_is_max_left,
            initial_width_is_max_right,
            max_number_of_bins,
            extend_factor,
            sigma,
            initial_bin_width: 0.0,
            use_preset_slopes: false,
            preset_slope_left_bound: 0.0,
            preset_slope_right_bound: 0.0,
            binning: DArray(Vec::new()),
            nbins: 0,
            initialized: false,
        }
    }

    /// Construct a binner seeded from a previously estimated binning (used
    /// when restarting a chain from a saved state).
    pub fn from_previous(
        binning: DArray,
        beta: f64,
        resolution: f64,
        initial_width_is_max_left: bool,
        initial_width_is_max_right: bool,
        max_number_of_bins: usize,
        extend_factor: f64,
        sigma: u64,
    ) -> Self {
        let nbins = binning.len() - 1;
        let mut this = NonUniformDynamicBinner {
            resolution,
            initial_width_is_max_left,
            initial_width_is_max_right,
            max_number_of_bins,
            extend_factor,
            sigma,
            initial_bin_width: 0.0,
            use_preset_slopes: false,
            preset_slope_left_bound: 0.0,
            preset_slope_right_bound: 0.0,
            binning,
            nbins,
            initialized: true,
        };
        this.initial_bin_width = if beta.abs() < 1e-6 {
            this.get_bin_widths()
                .0
                .iter()
                .cloned()
                .fold(0.0_f64, f64::max)
        } else {
            (resolution / beta).abs()
        };
        this
    }

    /// Preset the slopes used for extension, bypassing the estimator
    /// (used by `CgeCollection` to keep pooled chains on a shared binning).
    pub fn set_preset_slopes(&mut self, slope_left_bound: f64, slope_right_bound: f64) {
        self.use_preset_slopes = true;
        self.preset_slope_left_bound = slope_left_bound;
        self.preset_slope_right_bound = slope_right_bound;
    }

    /// Stop using preset slopes; go back to estimating them from the weights.
    pub fn clear_preset_slopes(&mut self) {
        self.use_preset_slopes = false;
    }

    /// The number of observed bins used in the slope estimate's Gaussian
    /// kernel.
    pub fn sigma(&self) -> u64 {
        self.sigma
    }

    /// Extend the binned region to include `value` without padding beyond
    /// what's needed (`extend_factor` is temporarily zeroed).
    pub fn include(
        &mut self,
        value: f64,
        estimate: &Estimate,
        history: &MultiHistogramHistory,
        lnw: &DArray,
    ) -> MuninnResult<Extension> {
        let tmp = self.extend_factor;
        self.extend_factor = 0.0;
        let result = self.extend(value, estimate, history, lnw);
        self.extend_factor = tmp;
        result
    }
}

impl Binner for NonUniformDynamicBinner {
    fn initialize(&mut self, values: &mut Vec<f64>, beta: f64) -> MuninnResult<()> {
        let beta = if beta.abs() < 1e-6 {
            let fractiles = calculate_fractiles(values, &[0.1586553, 0.8413447]);
            if !(fractiles[1] - fractiles[0] > 0.0) {
                return Err(MuninnError::ConfigError {
                    message: "16% and 84% fractiles of the initial sample coincide; cannot \
                              estimate an initial binning"
                        .to_string(),
                });
            }
            let sigma = 0.5 * (fractiles[1] - fractiles[0]);
            1.0 / sigma
        } else {
            values.sort_by(|a, b| a.partial_cmp(b).unwrap());
            beta
        };

        self.initial_bin_width = (self.resolution / beta).abs();

        let min_value = values[0] - self.initial_bin_width / 2.0;
        let max_value = values.last().unwrap() + self.initial_bin_width / 2.0;
        if !min_value.is_finite() || !max_value.is_finite() {
            return Err(MuninnError::ConfigError {
                message: "a non-finite value was used to estimate the initial binning"
                    .to_string(),
            });
        }

        let nbins_exact = (max_value - min_value) / self.initial_bin_width + 1.0;
        if nbins_exact > self.max_number_of_bins as f64 {
            return Err(MuninnError::MaxBinsExceeded {
                attempted: nbins_exact as usize,
                max_bins: self.max_number_of_bins,
            });
        }
        self.nbins = nbins_exact as usize;
        self.binning = DArray(
            (0..=self.nbins)
                .map(|i| min_value + i as f64 * self.initial_bin_width)
                .collect(),
        );
        self.initialized = true;
        info!("Setting initial bin width to: {}", self.initial_bin_width);
        Ok(())
    }

    fn calc_bin(&self, value: f64) -> isize {
        if value < self.binning[0] {
            return -1;
        }
        if value >= self.binning[self.nbins] {
            return self.nbins as isize;
        }
        match self
            .binning
            .0
            .binary_search_by(|probe| probe.partial_cmp(&value).unwrap())
        {
            Ok(i) => i as isize,
            Err(i) => (i - 1) as isize,
        }
    }

    fn extend(
        &mut self,
        value: f64,
        estimate: &Estimate,
        history: &MultiHistogramHistory,
        lnw: &DArray,
    ) -> MuninnResult<Extension> {
        let bin = self.calc_bin(value);
        let mut extension = Extension::default();

        if bin < 0 {
            let bin_left = find_left_bound(estimate.ln_g_support())
                .expect("extend called with no established support");
            let slope = if self.use_preset_slopes {
                self.preset_slope_left_bound
            } else {
                average_slope(
                    bin_left,
                    lnw,
                    estimate.ln_g_support(),
                    history.sum_n(),
                    &self.get_binning_centered(),
                    self.sigma,
                )
            };

            let mut bin_width = (self.resolution / slope).abs();
            if self.initial_width_is_max_left {
                bin_width = bin_width.min(self.initial_bin_width);
            }

            let to_add_exact =
                (self.binning[0] - value) / bin_width + 1.0 + self.extend_factor / self.resolution;
            let to_add = to_add_exact as usize;
            if to_add_exact + self.nbins as f64 > self.max_number_of_bins as f64 {
                return Err(MuninnError::MaxBinsExceeded {
                    attempted: self.nbins + to_add,
                    max_bins: self.max_number_of_bins,
                });
            }

            self.nbins += to_add;
            self.binning = self.binning.extended(to_add, 0, 0.0);
            for index in 0..to_add {
                self.binning[index] = self.binning[to_add] - (to_add - index) as f64 * bin_width;
            }
            extension.add_under = to_add;
            debug!(
                "Extending left to {} bins with new width: {}",
                self.nbins, bin_width
            );
        } else if bin as usize >= self.nbins {
            let bin_right = find_right_bound(estimate.ln_g_support())
                .expect("extend called with no established support");
            let slope = if self.use_preset_slopes {
                self.preset_slope_right_bound
            } else {
                average_slope(
                    bin_right,
                    lnw,
                    estimate.ln_g_support(),
                    history.sum_n(),
                    &self.get_binning_centered(),
                    self.sigma,
                )
            };

            let mut bin_width = (self.resolution / slope).abs();
            if self.initial_width_is_max_right {
                bin_width = bin_width.min(self.initial_bin_width);
            }

            let prev_nbins = self.nbins;
            let to_add_exact = (value - self.binning[prev_nbins]) / bin_width
                + 1.0
                + self.extend_factor / self.resolution;
            let to_add = to_add_exact as usize;
            if to_add_exact + self.nbins as f64 > self.max_number_of_bins as f64 {
                return Err(MuninnError::MaxBinsExceeded {
                    attempted: self.nbins + to_add,
                    max_bins: self.max_number_of_bins,
                });
            }

            self.nbins += to_add;
            self.binning = self.binning.extended(0, to_add, 0.0);
            for index in (prev_nbins + 1)..=self.nbins {
                self.binning[index] = self.binning[prev_nbins] + (index - prev_nbins) as f64 * bin_width;
            }
            extension.add_over = to_add;
            debug!(
                "Extending right to {} bins with new width: {}",
                self.nbins, bin_width
            );
        }

        Ok(extension)
    }

    fn get_binning(&self) -> DArray {
        self.binning.clone()
    }

    fn get_binning_centered(&self) -> DArray {
        DArray(
            (0..self.nbins)
                .map(|i| 0.5 * (self.binning[i] + self.binning[i + 1]))
                .collect(),
        )
    }

    fn get_bin_widths(&self) -> DArray {
        DArray((0..self.nbins).map(|i| self.binning[i + 1] - self.binning[i]).collect())
    }

    fn nbins(&self) -> usize {
        self.nbins
    }

    fn is_uniform(&self) -> bool {
        false
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
