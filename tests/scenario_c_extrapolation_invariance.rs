//! Scenario C: repeated out-of-range lookups through `LinearPolated` must
//! never perturb the binning, and the returned weights must be affine in
//! the queried energy with the stored boundary slope.
use muninn::array::{BArray, DArray};
use muninn::binner::{Binner, UniformBinner};
use muninn::estimate::Estimate;
use muninn::history::{DeletionPolicy, MultiHistogramHistory};
use muninn::histogram::Histogram;
use muninn::weight_scheme::{ExtrapolatedWeightScheme, LinearPolated, Multicanonical, WeightScheme};

fn setup() -> (Estimate, MultiHistogramHistory, UniformBinner) {
    let nbins = 20;
    let mut estimate = Estimate::new_empty(nbins);
    let mut ln_g = vec![0.0; nbins];
    let mut support = vec![false; nbins];
    for b in 5..15 {
        ln_g[b] = -((b as f64) - 10.0).powi(2) * 0.1;
        support[b] = true;
    }
    estimate.set_ln_g(DArray(ln_g));
    estimate.set_ln_g_support(BArray(support));

    let mut history = MultiHistogramHistory::new(nbins, 10, 1, DeletionPolicy::DropNone);
    let mut h = Histogram::new_empty(nbins);
    for b in 5..15 {
        for _ in 0..50 {
            h.add_observation(b);
        }
    }
    history.add_histogram(h);

    let mut binner = UniformBinner::with_bin_width(1.0, 0, 10_000);
    let mut values: Vec<f64> = (0..nbins).map(|i| i as f64 + 0.5).collect();
    binner.initialize(&mut values, 0.0).unwrap();

    (estimate, history, binner)
}

#[test]
fn binning_is_unchanged_by_repeated_extrapolated_lookups() {
    let (estimate, history, binner) = setup();
    let mut scheme = LinearPolated::wrapping(Box::new(Multicanonical));

    let edges_before = binner.get_binning();
    let weights = scheme.get_weights(&estimate, &history, Some(&binner));

    for &delta in &[1.0, 2.0, 5.0, 10.0] {
        let e_max = binner.get_binning_centered()[binner.nbins() - 1];
        let _ = scheme.get_extrapolated_weight(e_max + delta * 0.2, &weights, &estimate, &history, &binner);
    }
    let edges_after_first_pass = binner.get_binning();
    assert_eq!(edges_before, edges_after_first_pass);

    for &delta in &[1.0, 2.0, 5.0, 10.0] {
        let e_max = binner.get_binning_centered()[binner.nbins() - 1];
        let _ = scheme.get_extrapolated_weight(e_max + delta * 0.2, &weights, &estimate, &history, &binner);
    }
    let edges_after_second_pass = binner.get_binning();
    assert_eq!(edges_before, edges_after_second_pass);
}

#[test]
fn extrapolated_weight_is_affine_with_the_stored_slope() {
    let (estimate, history, binner) = setup();
    let mut scheme = LinearPolated::wrapping(Box::new(Multicanonical));
    let weights = scheme.get_weights(&estimate, &history, Some(&binner));

    let right_bound_center = binner.get_binning_centered()[binner.nbins() - 1];
    let w_at = |delta: f64| {
        let e = right_bound_center + delta;
        scheme.get_extrapolated_weight(e, &weights, &estimate, &history, &binner)
    };

    let w1 = w_at(1.0);
    let w2 = w_at(2.0);
    let w5 = w_at(5.0);
    let slope = w2 - w1;
    assert!((w5 - w1 - 3.0 * slope).abs() < 1e-9, "extrapolation is not affine: w1={w1} w2={w2} w5={w5}");
}
