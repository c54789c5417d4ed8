//! A toy host driver: a 1-D random walker whose energy is its position,
//! sampled under multicanonical weights from a dynamically-binned `Cge`.
//! Illustrates the host-facing API from `spec.md` §6; not part of the
//! library surface itself.
use muninn::binner::Binner;
use muninn::settings::{build_cge, Settings, WeightSchemeKind};

fn main() {
    env_logger::init();

    let settings = Settings {
        weight_scheme: WeightSchemeKind::Multicanonical,
        initial_max: 2000,
        initial_beta: 0.0,
        ..Settings::default()
    };
    let mut cge = build_cge(&settings).expect("failed to build the generalized ensemble");

    let mut rng_state: u64 = 0xC0FFEE;
    let mut next_f64 = move || {
        rng_state ^= rng_state << 13;
        rng_state ^= rng_state >> 7;
        rng_state ^= rng_state << 17;
        (rng_state >> 11) as f64 / (1u64 << 53) as f64
    };

    let mut position = 0.0_f64;
    let mut current_lnw = cge.get_lnweights(position);

    for step in 0..200_000 {
        let proposal = position + (next_f64() - 0.5) * 2.0;
        let proposal_lnw = cge.get_lnweights(proposal);

        if proposal_lnw >= current_lnw || next_f64().ln() < proposal_lnw - current_lnw {
            position = proposal;
            current_lnw = proposal_lnw;
        }

        if cge.add_observation(position) {
            cge.estimate_new_weights().expect("estimation step failed");
            current_lnw = cge.get_lnweights(position);
        }

        if step % 50_000 == 0 {
            cge.force_statistics_log().expect("failed to write statistics log");
        }
    }

    println!("final bin count: {}", cge.get_binner().nbins());
}
