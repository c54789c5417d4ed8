//! Scenario D: `DropOldestPossible` must refuse to shrink the history past
//! the point where a uniquely-covered bin would fall below `min_count`,
//! even though that means overshooting the configured `memory`.
use muninn::history::{DeletionPolicy, MultiHistogramHistory};
use muninn::histogram::Histogram;

fn hist_with_obs(nbins: usize, bin: usize, count: u64) -> Histogram {
    let mut h = Histogram::new_empty(nbins);
    for _ in 0..count {
        h.add_observation(bin);
    }
    h
}

#[test]
fn drop_oldest_possible_overshoots_memory_to_protect_a_unique_bin() {
    // memory=3, min_count=5; 5 histograms are added, the oldest of which
    // uniquely covers bin 0 with exactly the counts the support mask needs.
    let mut history = MultiHistogramHistory::new(2, 3, 5, DeletionPolicy::DropOldestPossible);
    history.add_histogram(hist_with_obs(2, 0, 10));
    history.add_histogram(hist_with_obs(2, 1, 1));
    history.add_histogram(hist_with_obs(2, 1, 1));
    history.add_histogram(hist_with_obs(2, 1, 1));
    history.add_histogram(hist_with_obs(2, 1, 1));

    assert_eq!(history.len(), 4, "history should overshoot memory=3 rather than lose bin 0's support");
    assert!(history.sum_n()[0] >= history.min_count());
}

#[test]
fn drop_any_possible_preserves_the_support_mask_entrywise() {
    let inserts = [(0usize, 3u64), (0, 3), (0, 3), (0, 3), (1, 3)];

    let mut unbounded = MultiHistogramHistory::new(2, 2, 3, DeletionPolicy::DropNone);
    let mut pruned = MultiHistogramHistory::new(2, 2, 3, DeletionPolicy::DropAnyPossible);
    for &(bin, count) in &inserts {
        unbounded.add_histogram(hist_with_obs(2, bin, count));
        pruned.add_histogram(hist_with_obs(2, bin, count));
    }

    assert!(pruned.len() < unbounded.len(), "DropAnyPossible should have actually dropped something");

    let reference_support = unbounded.sum_n().at_least(unbounded.min_count());
    let pruned_support = pruned.sum_n().at_least(pruned.min_count());
    for b in 0..2 {
        if reference_support[b] {
            assert!(pruned_support[b], "bin {b}'s support mask shrank under DropAnyPossible");
        }
    }
}
