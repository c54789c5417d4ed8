//! The weighted average-slope estimator shared by the dynamic binner's
//! extension logic (`spec.md` §4.1) and the `LinearPolated` weight scheme's
//! extrapolation boundary (`spec.md` §4.4).
use crate::array::{BArray, CArray, DArray};

const STD_WINDOWS: f64 = 3.0;

/// Estimate the local slope of `values` at `bin0`, using a Gaussian-kernel
/// weighted, Poisson-weighted, squared-distance weighted average over the
/// two-point slopes of adjacent supported bins in a window around `bin0`.
///
/// The window grows outward from `bin0` (asymmetrically: ties favor
/// extending left first, matching the reference implementation) until it
/// contains at least `3 * min_obs_bins_per_std` supported bins, or it has
/// consumed the whole array.
pub fn average_slope(
    bin0: usize,
    values: &DArray,
    support: &BArray,
    counts: &CArray,
    bin_centers: &DArray,
    min_obs_bins_per_std: u64,
) -> f64 {
    let n = values.len();
    let x0 = bin_centers[bin0];

    let mut start = bin0 as isize;
    let mut end = bin0 as isize;
    let mut nsupport = 0u64;
    let target = (STD_WINDOWS * min_obs_bins_per_std as f64) as u64;

    while nsupport < target && (start != 0 || end != (n as isize - 1)) {
        let start_dist = if start > 0 {
            x0 - bin_centers[(start - 1) as usize]
        } else {
            f64::INFINITY
        };
        let end_dist = if end < n as isize - 1 {
            bin_centers[(end + 1) as usize] - x0
        } else {
            f64::INFINITY
        };

        if start_dist < end_dist {
            start -= 1;
            if support[start as usize] {
                nsupport += 1;
            }
        } else {
            end += 1;
            if support[end as usize] {
                nsupport += 1;
            }
        }
    }

    let sigma = (x0 - bin_centers[start as usize])
        .max(bin_centers[end as usize] - x0)
        / STD_WINDOWS;

    let support_bins: Vec<usize> = (start as usize..=end as usize)
        .filter(|&b| support[b])
        .collect();

    let mut enumerator = 0.0;
    let mut denominator = 0.0;
    for pair in support_bins.windows(2) {
        let (b1, b2) = (pair[0], pair[1]);
        let alpha = calc_alpha(values, bin_centers, b1, b2);
        let w_poisson = calc_weight_poisson(counts, b1, b2);
        let w_sq = (bin_centers[b2] - bin_centers[b1]).powi(2);
        let w_gaussian = calc_weight_gaussian(bin_centers, x0, b1, b2, sigma);

        enumerator += alpha * w_poisson * w_sq * w_gaussian;
        denominator += w_poisson * w_sq * w_gaussian;
    }
    enumerator / denominator
}

fn calc_alpha(values: &DArray, bin_centers: &DArray, bin1: usize, bin2: usize) -> f64 {
    (values[bin2] - values[bin1]) / (bin_centers[bin2] - bin_centers[bin1])
}

fn calc_weight_poisson(counts: &CArray, bin1: usize, bin2: usize) -> f64 {
    let denom = (counts[bin2] + counts[bin1]) as f64;
    if denom > 0.0 {
        (counts[bin2] as f64) * (counts[bin1] as f64) / denom
    } else {
        0.0
    }
}

fn calc_weight_gaussian(bin_centers: &DArray, x0: f64, bin1: usize, bin2: usize, sigma: f64) -> f64 {
    let x = (bin_centers[bin1] + bin_centers[bin2]) / 2.0;
    (-(x - x0).powi(2) / (2.0 * sigma * sigma)).exp()
}
