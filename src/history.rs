//! The bounded-length history of finished histograms (`spec.md` §3, §4.2).
use std::collections::VecDeque;

#[cfg(feature = "serde_support")]
use serde::{Deserialize, Serialize};

use crate::array::CArray;
use crate::histogram::Histogram;
use log::{debug, warn};

/// Deletion policy applied after a new histogram is pushed onto the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub enum DeletionPolicy {
    /// Never remove anything.
    DropNone,
    /// Unconditionally drop the oldest entries down to `memory`.
    DropOldest,
    /// Drop the oldest entries down to `memory`, but stop (and warn) as
    /// soon as removing one more would shrink the support mask.
    DropOldestPossible,
    /// Scan oldest-to-newest past position `memory`; remove any entry whose
    /// removal would not shrink the support mask.
    DropAnyPossible,
}

/// One entry stored in the history: a histogram plus the generation-stable
/// id used to key the MLE free-energy map (`spec.md` §9).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct HistoryEntry {
    /// Stable identifier, assigned once at insertion and never reused.
    pub id: u64,
    /// The finished histogram.
    pub histogram: Histogram,
}

/// A deque of finished [`Histogram`]s, newest first, with a shared running
/// sum of counts and a deletion policy that preserves support where it can.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct MultiHistogramHistory {
    entries: VecDeque<HistoryEntry>,
    sum_n: CArray,
    memory: usize,
    min_count: u64,
    policy: DeletionPolicy,
    next_id: u64,
}

impl MultiHistogramHistory {
    /// A new, empty history over `nbins` bins.
    pub fn new(nbins: usize, memory: usize, min_count: u64, policy: DeletionPolicy) -> Self {
        MultiHistogramHistory {
            entries: VecDeque::new(),
            sum_n: CArray::zeros(nbins),
            memory,
            min_count,
            policy,
            next_id: 0,
        }
    }

    /// Number of histograms currently stored.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no histogram has been added yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of bins shared by every stored histogram.
    pub fn shape_len(&self) -> usize {
        self.sum_n.len()
    }

    /// The running total of counts per bin across all stored histograms.
    pub fn sum_n(&self) -> &CArray {
        &self.sum_n
    }

    /// Configured minimum per-bin count for the support mask.
    pub fn min_count(&self) -> u64 {
        self.min_count
    }

    /// Configured target history length.
    pub fn memory(&self) -> usize {
        self.memory
    }

    /// Iterate entries newest-first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Add a finished histogram to the front (newest), update `sum_N`, and
    /// apply the configured deletion policy. Returns the id of the inserted
    /// entry.
    pub fn add_histogram(&mut self, histogram: Histogram) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        for (b, &n) in histogram.counts().0.iter().enumerate() {
            self.sum_n[b] += n;
        }
        self.entries.push_front(HistoryEntry { id, histogram });
        self.apply_deletion_policy();
        id
    }

    /// Remove and return the newest (front) histogram, undoing its
    /// contribution to `sum_N`. Used by the orchestrator to roll back a
    /// round whose estimation failed.
    pub fn remove_newest(&mut self) -> Option<Histogram> {
        let entry = self.entries.pop_front()?;
        for (b, &n) in entry.histogram.counts().0.iter().enumerate() {
            self.sum_n[b] -= n;
        }
        Some(entry.histogram)
    }

    /// Pad `sum_N` and every stored histogram with zero counts on both ends.
    pub fn extend(&mut self, add_under: usize, add_over: usize) {
        self.sum_n = self.sum_n.extended(add_under, add_over, 0);
        for entry in self.entries.iter_mut() {
            entry.histogram.extend(add_under, add_over);
        }
    }

    fn support_mask_would_survive(&self, drop_index: usize) -> bool {
        // Recompute sum_N without the entry at `drop_index` and check no
        // currently-supported bin would drop below min_count.
        let mut reduced = self.sum_n.clone();
        let dropped = &self.entries[drop_index].histogram;
        for (b, &n) in dropped.counts().0.iter().enumerate() {
            reduced[b] -= n;
        }
        for b in 0..self.sum_n.len() {
            if self.sum_n[b] >= self.min_count && reduced[b] < self.min_count {
                return false;
            }
        }
        true
    }

    fn apply_deletion_policy(&mut self) {
        match self.policy {
            DeletionPolicy::DropNone => {}
            DeletionPolicy::DropOldest => {
                while self.entries.len() > self.memory {
                    let entry = self.entries.pop_back().expect("non-empty checked above");
                    for (b, &n) in entry.histogram.counts().0.iter().enumerate() {
                        self.sum_n[b] -= n;
                    }
                }
            }
            DeletionPolicy::DropOldestPossible => {
                while self.entries.len() > self.memory {
                    let last = self.entries.len() - 1;
                    if !self.support_mask_would_survive(last) {
                        warn!(
                            "DropOldestPossible: stopping early, history size {} exceeds memory {} \
                             because dropping the oldest entry would shrink the support mask",
                            self.entries.len(),
                            self.memory
                        );
                        break;
                    }
                    let entry = self.entries.pop_back().expect("checked non-empty");
                    for (b, &n) in entry.histogram.counts().0.iter().enumerate() {
                        self.sum_n[b] -= n;
                    }
                }
            }
            DeletionPolicy::DropAnyPossible => {
                // Scan oldest-to-newest past position `memory`; remove any
                // entry whose removal does not shrink the support mask.
                let mut idx = self.entries.len();
                while idx > self.memory {
                    idx -= 1;
                    if idx < self.memory {
                        break;
                    }
                    if self.support_mask_would_survive(idx) {
                        let entry = self.entries.remove(idx).expect("in-range index");
                        for (b, &n) in entry.histogram.counts().0.iter().enumerate() {
                            self.sum_n[b] -= n;
                        }
                    }
                }
                if self.entries.len() > self.memory {
                    debug!(
                        "DropAnyPossible: history size {} still exceeds memory {} after scan",
                        self.entries.len(),
                        self.memory
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hist_with_obs(nbins: usize, bin: usize, count: u64) -> Histogram {
        let mut h = Histogram::new_empty(nbins);
        for _ in 0..count {
            h.add_observation(bin);
        }
        h
    }

    #[test]
    fn sum_n_matches_sum_of_histograms() {
        let mut history = MultiHistogramHistory::new(4, 10, 1, DeletionPolicy::DropNone);
        history.add_histogram(hist_with_obs(4, 0, 3));
        history.add_histogram(hist_with_obs(4, 0, 2));
        history.add_histogram(hist_with_obs(4, 1, 5));
        assert_eq!(history.sum_n()[0], 5);
        assert_eq!(history.sum_n()[1], 5);
    }

    #[test]
    fn drop_oldest_possible_keeps_support() {
        // memory=3, 5 histograms; histogram #0 (oldest, pushed first) uniquely
        // covers bin 0 with enough counts to matter for the support mask.
        let mut history = MultiHistogramHistory::new(2, 3, 5, DeletionPolicy::DropOldestPossible);
        history.add_histogram(hist_with_obs(2, 0, 10)); // will become oldest
        history.add_histogram(hist_with_obs(2, 1, 1));
        history.add_histogram(hist_with_obs(2, 1, 1));
        history.add_histogram(hist_with_obs(2, 1, 1));
        history.add_histogram(hist_with_obs(2, 1, 1));

        assert_eq!(history.len(), 4);
        assert!(history.sum_n()[0] >= history.min_count());
    }

    #[test]
    fn drop_oldest_unconditionally_shrinks_to_memory() {
        let mut history = MultiHistogramHistory::new(2, 2, 1, DeletionPolicy::DropOldest);
        for _ in 0..5 {
            history.add_histogram(hist_with_obs(2, 0, 1));
        }
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn remove_newest_undoes_sum_n() {
        let mut history = MultiHistogramHistory::new(2, 10, 1, DeletionPolicy::DropNone);
        history.add_histogram(hist_with_obs(2, 0, 3));
        let before = history.sum_n().clone();
        let removed = history.remove_newest().unwrap();
        assert_eq!(removed.n(), 3);
        assert_eq!(history.sum_n()[0], before[0] - 3);
        assert_eq!(history.len(), 0);
    }
}
