//! Wraps another weight scheme, filling in the regions without support by
//! linear interpolation (internal gaps) and linear extrapolation (the two
//! outer boundaries), with an optional thermodynamic cap on the boundary
//! slopes (`spec.md` §4.2).
use super::{ExtrapolatedWeightScheme, WeightScheme};
use crate::array::{BArray, CArray, DArray};
use crate::binner::slope::average_slope;
use crate::binner::support::{find_internal_unsupported, find_left_bound, find_right_bound, has_min_support_left, has_min_support_right};
use crate::binner::Binner;
use crate::canonical::CanonicalProperties;
use crate::estimate::Estimate;
use crate::history::MultiHistogramHistory;

/// Wraps `underlying`, extending its weights outside the support by linear
/// extrapolation and filling internal gaps by linear interpolation. Only
/// meaningful for a one-dimensional binning; `get_weights` panics if no
/// binner is supplied.
pub struct LinearPolated {
    underlying: Box<dyn WeightScheme>,
    slope_factor_up: f64,
    slope_factor_down: f64,
    sigma: u64,
    min_beta_extrapolation: f64,
    max_beta_extrapolation: f64,
    min_beta_thermodynamics: f64,
    max_beta_thermodynamics: f64,
    extrapolation_left: Option<(usize, f64)>,
    extrapolation_right: Option<(usize, f64)>,
    left_bound_center: f64,
    right_bound_center: f64,
}

impl LinearPolated {
    /// `sigma` sets both the width of the Gaussian kernel used to estimate
    /// the boundary slope and the support margin required before a
    /// thermodynamic beta bound is honored.
    pub fn new(underlying: Box<dyn WeightScheme>, slope_factor_up: f64, slope_factor_down: f64, sigma: u64) -> Self {
        LinearPolated {
            underlying,
            slope_factor_up,
            slope_factor_down,
            sigma,
            min_beta_extrapolation: f64::NEG_INFINITY,
            max_beta_extrapolation: f64::INFINITY,
            min_beta_thermodynamics: f64::NEG_INFINITY,
            max_beta_thermodynamics: f64::INFINITY,
            extrapolation_left: None,
            extrapolation_right: None,
            left_bound_center: 0.0,
            right_bound_center: 0.0,
        }
    }

    /// Defaults matching the reference scheme: `slope_factor_up = 0.3`,
    /// `slope_factor_down = 3.0`, `sigma = 20`.
    pub fn wrapping(underlying: Box<dyn WeightScheme>) -> Self {
        LinearPolated::new(underlying, 0.3, 3.0, 20)
    }

    /// Cap the extrapolation slope to `[-max_beta, -min_beta]`.
    pub fn set_beta_extrapolation_bounds(&mut self, min_beta: f64, max_beta: f64) {
        self.min_beta_extrapolation = min_beta;
        self.max_beta_extrapolation = max_beta;
    }

    /// Cap the in-support boundary slope using the mean energy at
    /// `min_beta`/`max_beta`, provided that energy falls at least `sigma`
    /// supported bins inside both edges of the support.
    pub fn set_beta_thermodynamics_bounds(&mut self, min_beta: f64, max_beta: f64) {
        self.min_beta_thermodynamics = min_beta;
        self.max_beta_thermodynamics = max_beta;
    }

    fn extrapolate_left(&self, weights: &mut DArray, support: &BArray, sum_n: &CArray, bin_centers: &DArray) -> (usize, f64) {
        let bin0 = find_left_bound(support).expect("support must be non-empty");
        let average_alpha = average_slope(bin0, weights, support, sum_n, bin_centers, self.sigma);
        let mut alpha = if average_alpha > 0.0 {
            self.slope_factor_down * average_alpha
        } else {
            self.slope_factor_up * average_alpha
        };
        alpha = alpha.max(-self.max_beta_extrapolation).min(-self.min_beta_extrapolation);

        let x0 = bin_centers[bin0];
        let s0 = weights[bin0];
        for bin in 0..bin0 {
            weights[bin] = s0 + alpha * (bin_centers[bin] - x0);
        }
        (bin0, alpha)
    }

    fn extrapolate_right(&self, weights: &mut DArray, support: &BArray, sum_n: &CArray, bin_centers: &DArray) -> (usize, f64) {
        let bin0 = find_right_bound(support).expect("support must be non-empty");
        let average_alpha = average_slope(bin0, weights, support, sum_n, bin_centers, self.sigma);
        let mut alpha = if average_alpha > 0.0 {
            self.slope_factor_up * average_alpha
        } else {
            self.slope_factor_down * average_alpha
        };
        alpha = alpha.max(-self.max_beta_extrapolation).min(-self.min_beta_extrapolation);

        let x0 = bin_centers[bin0];
        let s0 = weights[bin0];
        for bin in (bin0 + 1)..weights.len() {
            weights[bin] = s0 + alpha * (bin_centers[bin] - x0);
        }
        (bin0, alpha)
    }

    fn cap_thermodynamic_slope_left(&mut self, weights: &mut DArray, support: &BArray, bin_centers: &DArray, estimate: &Estimate, binner: &dyn Binner) {
        if !self.max_beta_thermodynamics.is_finite() {
            return;
        }
        let canonical = CanonicalProperties::new(bin_centers, estimate.ln_g(), estimate.ln_g_support());
        let energy = canonical.e(self.max_beta_thermodynamics);
        let bin0 = binner.calc_bin(energy);
        if bin0 < 0 || bin0 as usize >= weights.len() {
            return;
        }
        let bin0 = bin0 as usize;
        if !(has_min_support_left(self.sigma as usize, bin0, support) && has_min_support_right(self.sigma as usize, bin0, support)) {
            return;
        }

        let mut accumulated_offset = 0.0;
        let mut bin = bin0;
        while bin > 0 {
            let bin1 = bin - 1;
            weights[bin1] += accumulated_offset;
            let alpha = (weights[bin1] - weights[bin]) / (bin_centers[bin1] - bin_centers[bin]);
            if -alpha > self.max_beta_thermodynamics {
                let new_weight_bin1 = -self.max_beta_thermodynamics * (bin_centers[bin1] - bin_centers[bin]) + weights[bin];
                let offset = new_weight_bin1 - weights[bin1];
                weights[bin1] += offset;
                accumulated_offset += offset;
            }
            bin = bin1;
        }

        if let Some((_bin0, slope)) = &mut self.extrapolation_left {
            if -*slope > self.max_beta_thermodynamics {
                *slope = -self.max_beta_thermodynamics;
            }
        }
    }

    fn cap_thermodynamic_slope_right(&mut self, weights: &mut DArray, support: &BArray, bin_centers: &DArray, estimate: &Estimate, binner: &dyn Binner) {
        if !self.min_beta_thermodynamics.is_finite() {
            return;
        }
        let canonical = CanonicalProperties::new(bin_centers, estimate.ln_g(), estimate.ln_g_support());
        let energy = canonical.e(self.min_beta_thermodynamics);
        let bin0 = binner.calc_bin(energy);
        if bin0 < 0 || bin0 as usize >= weights.len() {
            return;
        }
        let bin0 = bin0 as usize;
        if !(has_min_support_left(self.sigma as usize, bin0, support) && has_min_support_right(self.sigma as usize, bin0, support)) {
            return;
        }

        let mut accumulated_offset = 0.0;
        let mut bin = bin0;
        while bin + 1 < weights.len() {
            let bin1 = bin + 1;
            weights[bin1] += accumulated_offset;
            let alpha = (weights[bin1] - weights[bin]) / (bin_centers[bin1] - bin_centers[bin]);
            if -alpha < self.min_beta_thermodynamics {
                let new_weight_bin1 = -self.min_beta_thermodynamics * (bin_centers[bin1] - bin_centers[bin]) + weights[bin];
                let offset = new_weight_bin1 - weights[bin1];
                weights[bin1] += offset;
                accumulated_offset += offset;
            }
            bin = bin1;
        }

        if let Some((_bin0, slope)) = &mut self.extrapolation_right {
            if -*slope < self.min_beta_thermodynamics {
                *slope = -self.min_beta_thermodynamics;
            }
        }
    }
}

impl WeightScheme for LinearPolated {
    fn get_weights(
        &mut self,
        estimate: &Estimate,
        history: &MultiHistogramHistory,
        binner: Option<&dyn Binner>,
    ) -> DArray {
        let binner = binner.expect("LinearPolated requires a binner");
        let mut weights = self.underlying.get_weights(estimate, history, Some(binner));

        let support = estimate.ln_g_support();
        if support.count() == 0 {
            self.extrapolation_left = None;
            self.extrapolation_right = None;
            return DArray::zeros(weights.len());
        }

        let sum_n = history.sum_n();
        let bin_centers = binner.get_binning_centered();

        let left = self.extrapolate_left(&mut weights, support, sum_n, &bin_centers);
        let right = self.extrapolate_right(&mut weights, support, sum_n, &bin_centers);
        self.extrapolation_left = Some(left);
        self.extrapolation_right = Some(right);
        self.left_bound_center = bin_centers[left.0];
        self.right_bound_center = bin_centers[right.0];

        for (bin_left, bin_right) in find_internal_unsupported(support) {
            let slope = (weights[bin_left] - weights[bin_right]) / (bin_centers[bin_left] - bin_centers[bin_right]);
            for bin in (bin_left + 1)..bin_right {
                weights[bin] = weights[bin_left] + slope * (bin_centers[bin] - bin_centers[bin_left]);
            }
        }

        if self.max_beta_thermodynamics.is_finite() || self.min_beta_thermodynamics.is_finite() {
            self.cap_thermodynamic_slope_left(&mut weights, support, &bin_centers, estimate, binner);
            self.cap_thermodynamic_slope_right(&mut weights, support, &bin_centers, estimate, binner);
        }

        weights
    }
}

impl ExtrapolatedWeightScheme for LinearPolated {
    fn get_extrapolated_weight(
        &self,
        value: f64,
        lnw: &DArray,
        _estimate: &Estimate,
        _history: &MultiHistogramHistory,
        binner: &dyn Binner,
    ) -> f64 {
        let bin = binner.calc_bin(value);
        if bin < 0 {
            let (bin0, slope) = self.extrapolation_left.expect("get_weights must run before get_extrapolated_weight");
            lnw[bin0] + slope * (value - self.left_bound_center)
        } else if bin as usize >= binner.nbins() {
            let (bin0, slope) = self.extrapolation_right.expect("get_weights must run before get_extrapolated_weight");
            lnw[bin0] + slope * (value - self.right_bound_center)
        } else {
            panic!("get_extrapolated_weight can only be called outside the binned area");
        }
    }
}
