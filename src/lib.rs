//! Adaptive generalized-ensemble Monte Carlo density-of-states estimation.
//!
//! * start with [`settings::Settings`] and [`settings::build_cge`] to get a
//!   ready [`orchestrator::Cge`] without wiring together an estimator,
//!   update scheme, weight scheme and binner by hand.
//! * [`orchestrator::Ge`] is the discrete, bin-index-only state machine;
//!   [`orchestrator::Cge`] wraps it with a [`binner::Binner`] so it can speak
//!   energies directly; [`orchestrator::CgeCollection`] pools several `Cge`
//!   chains on a shared binning.
//! * [`weight_scheme`] holds the available weight schemes
//!   (`Multicanonical`, `InvK`/`InvKP`, `LinearPolated`, `FixedWeights`).
//! * [`logger::StatisticsLogger`]/[`logger::LogReader`] write and re-read the
//!   text statistics log used to resume a run.
//!
//! # Example
//!
//! ```
//! use muninn::settings::{Settings, build_cge};
//!
//! let settings = Settings {
//!     use_dynamic_binning: false,
//!     bin_width: 1.0,
//!     initial_max: 50,
//!     ..Settings::default()
//! };
//! let mut cge = build_cge(&settings).unwrap();
//!
//! for step in 0..500 {
//!     let energy = (step as f64 * 0.37).sin() * 10.0;
//!     if cge.add_observation(energy) {
//!         cge.estimate_new_weights().unwrap();
//!     }
//! }
//! ```
#![deny(missing_docs, warnings)]
pub mod array;
pub mod binner;
pub mod canonical;
pub mod error;
pub mod estimate;
pub mod estimator;
pub mod histogram;
pub mod history;
pub mod logger;
pub mod orchestrator;
pub mod settings;
pub mod stats;
pub mod update_scheme;
pub mod weight_scheme;

pub use error::{MuninnError, MuninnResult};
pub use orchestrator::{Cge, CgeCollection, Ge};
pub use settings::{build_cge, Settings, WeightSchemeKind};
