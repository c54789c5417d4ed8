//! End-to-end checks of the history/estimate invariants under an actual
//! sampling run, as opposed to the isolated unit coverage in each module:
//! every histogram's counts stay non-negative and self-consistent (1),
//! `sum_N` tracks the sum over the live history (2), and a supported bin
//! always has at least `min_count` observations behind it (3).
use muninn::settings::{build_cge, Settings, WeightSchemeKind};

struct Xorshift(u64);

impl Xorshift {
    fn next_f64(&mut self) -> f64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }
}

#[test]
fn history_invariants_hold_throughout_a_run() {
    let settings = Settings {
        weight_scheme: WeightSchemeKind::Multicanonical,
        use_dynamic_binning: false,
        bin_width: 0.25,
        initial_max: 300,
        memory: 15,
        min_count: 10,
        statistics_log_filename: None,
        ..Settings::default()
    };
    let mut cge = build_cge(&settings).unwrap();
    let mut rng = Xorshift(0xDEAD_BEEF_CAFE_0001);

    let mut position = 0.0_f64;
    let mut current_lnw = cge.get_lnweights(position);

    for _ in 0..30_000 {
        let proposal = position + (rng.next_f64() - 0.5) * 1.0;
        if proposal.abs() > 6.0 {
            continue;
        }
        let proposal_lnw = cge.get_lnweights(proposal);
        if proposal_lnw >= current_lnw || rng.next_f64().ln() < proposal_lnw - current_lnw {
            position = proposal;
            current_lnw = proposal_lnw;
        }

        if cge.add_observation(position) {
            cge.estimate_new_weights().unwrap();
            current_lnw = cge.get_lnweights(position);

            // Invariant 1 & 2: every stored histogram has non-negative
            // counts that sum to its own N, and sum_N equals the sum over
            // the live history.
            let history = cge.get_ge().history();
            let mut recomputed_sum_n = vec![0u64; history.shape_len()];
            for entry in history.iter() {
                assert_eq!(entry.histogram.counts().sum(), entry.histogram.n());
                for b in 0..history.shape_len() {
                    recomputed_sum_n[b] += entry.histogram.counts()[b];
                }
            }
            for b in 0..history.shape_len() {
                assert_eq!(recomputed_sum_n[b], history.sum_n()[b]);
            }

            // Invariant 3: a supported bin has at least min_count
            // observations behind it.
            let estimate = cge.get_ge().estimate();
            for b in 0..estimate.len() {
                if estimate.ln_g_support()[b] {
                    assert!(history.sum_n()[b] >= history.min_count());
                }
            }
        }
    }

    assert!(cge.get_ge().estimate().ln_g_support().count() > 0, "should have gathered some support by now");
}
