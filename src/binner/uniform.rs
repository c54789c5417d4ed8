//! `UniformBinner`: fixed bin width, constant-time `calc_bin` (`spec.md` §4.1).
#[cfg(feature = "serde_support")]
use serde::{Deserialize, Serialize};

use super::{Binner, Extension};
use crate::array::DArray;
use crate::error::{MuninnError, MuninnResult};
use crate::estimate::Estimate;
use crate::history::MultiHistogramHistory;
use crate::stats::calculate_fractiles;
use log::info;

/// How the bin width is chosen. Mirrors the three donor constructors.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
enum WidthSource {
    /// Bin width is given explicitly up front.
    Explicit,
    /// Bin width is estimated from the bootstrap sample's spread, as
    /// `sigma / std_bins`.
    FromStdBins { std_bins: u32 },
}

/// Uniform (fixed-width) binner.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct UniformBinner {
    width_source: WidthSource,
    extend_nbins: usize,
    max_number_of_bins: usize,
    min_value: f64,
    max_value: f64,
    bin_width: f64,
    nbins: usize,
    initialized: bool,
}

impl UniformBinner {
    /// Construct with an explicit, fixed bin width.
    pub fn with_bin_width(bin_width: f64, extend_nbins: usize, max_number_of_bins: usize) -> Self {
        UniformBinner {
            width_source: WidthSource::Explicit,
            extend_nbins,
            max_number_of_bins,
            min_value: 0.0,
            max_value: 0.0,
            bin_width,
            nbins: 0,
            initialized: false,
        }
    }

    /// Construct with a bin width to be estimated at `initialize` time from
    /// the bootstrap sample, expressed as a number of bins per standard
    /// deviation.
    pub fn with_std_bins(std_bins: u32, extend_nbins: usize, max_number_of_bins: usize) -> Self {
        UniformBinner {
            width_source: WidthSource::FromStdBins { std_bins },
            extend_nbins,
            max_number_of_bins,
            min_value: 0.0,
            max_value: 0.0,
            bin_width: 0.0,
            nbins: 0,
            initialized: false,
        }
    }

    /// Construct with an explicit initial range and bin count; `initialize`
    /// then only needs to ensure the bootstrap sample is covered.
    pub fn with_range(
        min_value: f64,
        max_value: f64,
        nbins: usize,
        extend_nbins: usize,
        max_number_of_bins: usize,
    ) -> Self {
        let bin_width = (max_value - min_value) / nbins as f64;
        UniformBinner {
            width_source: WidthSource::Explicit,
            extend_nbins,
            max_number_of_bins,
            min_value,
            max_value,
            bin_width,
            nbins,
            initialized: true,
        }
    }

    fn extend_single(&mut self, value: f64) -> MuninnResult<Extension> {
        let bin = self.calc_bin(value);
        let mut extension = Extension::default();

        if bin < 0 {
            let to_add = (-bin) as usize + self.extend_nbins;
            let total = self.nbins + to_add;
            if total > self.max_number_of_bins {
                return Err(MuninnError::MaxBinsExceeded {
                    attempted: total,
                    max_bins: self.max_number_of_bins,
                });
            }
            self.min_value -= to_add as f64 * self.bin_width;
            self.nbins = total;
            extension.add_under = to_add;
        } else if bin as usize >= self.nbins {
            let to_add = (bin as usize - self.nbins + 1) + self.extend_nbins;
            let total = self.nbins + to_add;
            if total > self.max_number_of_bins {
                return Err(MuninnError::MaxBinsExceeded {
                    attempted: total,
                    max_bins: self.max_number_of_bins,
                });
            }
            self.max_value += to_add as f64 * self.bin_width;
            self.nbins = total;
            extension.add_over = to_add;
        }
        Ok(extension)
    }
}

impl Binner for UniformBinner {
    fn initialize(&mut self, values: &mut Vec<f64>, _beta: f64) -> MuninnResult<()> {
        if !self.initialized {
            if self.bin_width == 0.0 {
                let std_bins = match self.width_source {
                    WidthSource::FromStdBins { std_bins } => std_bins,
                    WidthSource::Explicit => 20,
                };
                let quantiles = calculate_fractiles(values, &[0.1586553, 0.8413447]);
                if quantiles[1] - quantiles[0] <= 0.0 {
                    return Err(MuninnError::ConfigError {
                        message: "bootstrap sample is degenerate: cannot estimate a scale"
                            .to_string(),
                    });
                }
                let sigma = 0.5 * (quantiles[1] - quantiles[0]);
                self.bin_width = sigma / std_bins as f64;
            } else {
                values.sort_by(|a, b| a.partial_cmp(b).unwrap());
            }

            self.min_value = values[0] - self.bin_width / 2.0;
            self.max_value = *values.last().unwrap() + self.bin_width / 2.0;
            self.nbins = ((self.max_value - self.min_value) / self.bin_width + 1.0) as usize;
            self.initialized = true;
        } else {
            for &v in values.iter() {
                self.extend_single(v)?;
            }
        }
        info!("Setting bin width to: {}", self.bin_width);
        Ok(())
    }

    fn calc_bin(&self, value: f64) -> isize {
        ((value - self.min_value) / self.bin_width).floor() as isize
    }

    fn extend(
        &mut self,
        value: f64,
        _estimate: &Estimate,
        _history: &MultiHistogramHistory,
        _lnw: &DArray,
    ) -> MuninnResult<Extension> {
        self.extend_single(value)
    }

    fn get_binning(&self) -> DArray {
        DArray((0..=self.nbins).map(|i| self.min_value + i as f64 * self.bin_width).collect())
    }

    fn get_binning_centered(&self) -> DArray {
        DArray(
            (0..self.nbins)
                .map(|i| self.min_value + i as f64 * self.bin_width + 0.5 * self.bin_width)
                .collect(),
        )
    }

    fn get_bin_widths(&self) -> DArray {
        DArray::filled(self.nbins, self.bin_width)
    }

    fn nbins(&self) -> usize {
        self.nbins
    }

    fn is_uniform(&self) -> bool {
        true
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
