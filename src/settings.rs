//! A single settings record plus a factory function that wires together an
//! estimator, update scheme, weight scheme, binner and logger into a ready
//! [`Cge`], either fresh or resumed from a statistics log (`spec.md` §6).
use crate::binner::{Binner, NonUniformDynamicBinner, UniformBinner};
use crate::error::{MuninnError, MuninnResult};
use crate::estimate::Estimate;
use crate::estimator::Mle;
use crate::histogram::Histogram;
use crate::history::{DeletionPolicy, MultiHistogramHistory};
use crate::logger::{LogReader, Mode, StatisticsLogger};
use crate::orchestrator::cge::WeightSchemeHandle;
use crate::orchestrator::Cge;
use crate::update_scheme::{IncreaseFactorScheme, UpdateScheme};
use crate::weight_scheme::{InvK, InvKP, LinearPolated, Multicanonical, WeightScheme};

/// Which base weight scheme to build, before it is wrapped in
/// [`LinearPolated`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WeightSchemeKind {
    /// `w(E) = 1/g(E)`.
    Multicanonical,
    /// `w(E) = 1/k(E)`, one-dimensional binnings only.
    InvK,
    /// `w(E) = k(E)^{-p} g(E)^{1-p}`, one-dimensional binnings only.
    InvKP(f64),
}

/// Everything needed to build a [`Cge`], collected in one place the way the
/// donor's `CGEfactory::Settings` collects constructor arguments scattered
/// across half a dozen classes.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base weight scheme, before `LinearPolated` wraps it.
    pub weight_scheme: WeightSchemeKind,
    /// `LinearPolated`'s slope factor applied when the boundary slope points
    /// towards lower entropy outward (up-slope extrapolation).
    pub slope_factor_up: f64,
    /// `LinearPolated`'s slope factor applied in the opposite case.
    pub slope_factor_down: f64,
    /// Lower cap on the extrapolated/thermodynamic beta.
    pub min_beta: f64,
    /// Upper cap on the extrapolated/thermodynamic beta.
    pub max_beta: f64,
    /// Boltzmann inverse temperature used during initial collection.
    pub initial_beta: f64,
    /// Target `|ln w(E_j) - ln w(E_{j+1})|` step for a dynamic binning.
    pub resolution: f64,
    /// Cap the left extension's bin width at the initial width.
    pub initial_width_is_max_left: bool,
    /// Cap the right extension's bin width at the initial width.
    pub initial_width_is_max_right: bool,
    /// Extra margin factor used by a dynamic binning's extension.
    pub extend_factor: f64,
    /// Extra bins padded onto a uniform binning's extension, beyond what's
    /// needed to cover the new value.
    pub extend_nbins: usize,
    /// Where to write the statistics log; `None` disables logging.
    pub statistics_log_filename: Option<String>,
    /// Logging mode, when a filename is given.
    pub log_mode: Mode,
    /// Decimal digits used when formatting logged floats.
    pub log_precision: usize,
    /// Number of observations gathered before the binner is initialized.
    pub initial_max: u64,
    /// Target history length (`MultiHistogramHistory`'s `memory`), and the
    /// cap on statistics-log entries kept per array kind when resuming.
    pub memory: usize,
    /// Minimum per-bin count for a bin to count as supported.
    pub min_count: u64,
    /// `IncreaseFactorScheme`'s growth factor.
    pub increase_factor: f64,
    /// `IncreaseFactorScheme`'s minimum fraction of newly-supported bins.
    pub fraction: f64,
    /// Use a `NonUniformDynamicBinner` instead of a `UniformBinner`.
    pub use_dynamic_binning: bool,
    /// Fixed bin width for a `UniformBinner` (ignored for dynamic binning).
    pub bin_width: f64,
    /// Hard cap on the number of bins either binner may grow to.
    pub max_number_of_bins: usize,
    /// Observed-bins window fed to the boundary slope estimate.
    pub sigma: u64,
    /// Resume from this statistics log instead of starting fresh, if given.
    pub read_statistics_log_filename: Option<String>,
}

impl Default for Settings {
    /// Defaults chosen to match the reference's own defaults: the retrieved
    /// `CGEfactory.h` constructor (`memory=40`, `min_count=30`,
    /// `bin_width=0.1`, `statistics_log_filename="muninn.txt"`,
    /// `log_mode=ALL`, `log_precision=10`) where it assigns one, and the
    /// crate's other defaulting constructors (`LinearPolated::wrapping`,
    /// `IncreaseFactorScheme::default`, `NonUniformDynamicBinner::default`)
    /// everywhere else.
    fn default() -> Self {
        Settings {
            weight_scheme: WeightSchemeKind::Multicanonical,
            slope_factor_up: 0.3,
            slope_factor_down: 3.0,
            min_beta: f64::NEG_INFINITY,
            max_beta: f64::INFINITY,
            initial_beta: 0.0,
            resolution: 0.2,
            initial_width_is_max_left: true,
            initial_width_is_max_right: false,
            extend_factor: 1.0,
            extend_nbins: 10,
            statistics_log_filename: Some("muninn.txt".to_string()),
            log_mode: Mode::All,
            log_precision: 10,
            initial_max: 5000,
            memory: 40,
            min_count: 30,
            increase_factor: 1.07,
            fraction: 0.05,
            use_dynamic_binning: true,
            bin_width: 0.1,
            max_number_of_bins: 1_000_000,
            sigma: 20,
            read_statistics_log_filename: None,
        }
    }
}

fn build_weight_scheme(settings: &Settings) -> WeightSchemeHandle {
    let base: Box<dyn WeightScheme> = match settings.weight_scheme {
        WeightSchemeKind::Multicanonical => Box::new(Multicanonical),
        WeightSchemeKind::InvK => Box::new(InvK),
        WeightSchemeKind::InvKP(p) => Box::new(InvKP::new(p)),
    };
    let mut polated = LinearPolated::new(base, settings.slope_factor_up, settings.slope_factor_down, settings.sigma);
    polated.set_beta_extrapolation_bounds(settings.min_beta, settings.max_beta);
    polated.set_beta_thermodynamics_bounds(settings.min_beta, settings.max_beta);
    WeightSchemeHandle::Extrapolated(Box::new(polated))
}

fn build_update_scheme(settings: &Settings) -> Box<dyn UpdateScheme> {
    Box::new(IncreaseFactorScheme::new(
        settings.initial_max,
        settings.increase_factor,
        settings.min_count,
        settings.fraction,
    ))
}

fn build_logger(settings: &Settings) -> Option<StatisticsLogger> {
    settings
        .statistics_log_filename
        .as_ref()
        .map(|filename| StatisticsLogger::new(filename.clone(), settings.log_mode, settings.log_precision))
}

fn build_fresh_binner(settings: &Settings) -> Box<dyn Binner> {
    if settings.use_dynamic_binning {
        Box::new(NonUniformDynamicBinner::new(
            settings.resolution,
            settings.initial_width_is_max_left,
            settings.initial_width_is_max_right,
            settings.max_number_of_bins,
            settings.extend_factor,
            settings.sigma,
        ))
    } else {
        Box::new(UniformBinner::with_bin_width(settings.bin_width, settings.extend_nbins, settings.max_number_of_bins))
    }
}

/// Build a fresh `Cge`, or resume one from `settings.read_statistics_log_filename`
/// if it is set.
pub fn build_cge(settings: &Settings) -> MuninnResult<Cge> {
    match &settings.read_statistics_log_filename {
        Some(filename) => resume_cge(settings, filename),
        None => Ok(Cge::new(
            Mle::new(settings.sigma),
            build_update_scheme(settings),
            build_weight_scheme(settings),
            build_fresh_binner(settings),
            build_logger(settings),
            settings.initial_beta,
            settings.min_count,
        )),
    }
}

fn missing_array(kind: &str, filename: &str) -> MuninnError {
    MuninnError::ConfigError {
        message: format!("statistics log {filename} has no {kind} entries to resume from"),
    }
}

fn resume_cge(settings: &Settings, filename: &str) -> MuninnResult<Cge> {
    let reader = LogReader::read(filename, settings.memory)?;
    if reader.is_partial() {
        return Err(missing_array("N/lnw/lnG/lnG_support", filename));
    }

    let ns = reader.ns();
    let lnws = reader.lnws();
    let nbins = ns.last().map(|(_, counts)| counts.len()).ok_or_else(|| missing_array("N", filename))?;

    let mut history = MultiHistogramHistory::new(nbins, settings.memory, settings.min_count, DeletionPolicy::DropNone);
    for ((_, counts), (_, lnw)) in ns.into_iter().zip(lnws) {
        history.add_histogram(Histogram::from_parts(counts, lnw));
    }

    let (_, ln_g) = reader.ln_gs().into_iter().last().ok_or_else(|| missing_array("lnG", filename))?;
    let (_, ln_g_support) = reader.ln_g_supports().into_iter().last().ok_or_else(|| missing_array("lnG_support", filename))?;
    let mut estimate = Estimate::new_empty(nbins);
    estimate.set_ln_g(ln_g);
    estimate.set_ln_g_support(ln_g_support);

    let (_, binning) = reader.binnings().into_iter().last().ok_or_else(|| missing_array("binning", filename))?;
    let binner: Box<dyn Binner> = if settings.use_dynamic_binning {
        Box::new(NonUniformDynamicBinner::from_previous(
            binning,
            settings.initial_beta,
            settings.resolution,
            settings.initial_width_is_max_left,
            settings.initial_width_is_max_right,
            settings.max_number_of_bins,
            settings.extend_factor,
            settings.sigma,
        ))
    } else {
        let nbins_read = binning.len() - 1;
        Box::new(UniformBinner::with_range(
            binning[0],
            binning[nbins_read],
            nbins_read,
            settings.extend_nbins,
            settings.max_number_of_bins,
        ))
    };

    Cge::from_history(
        history,
        estimate,
        Mle::new(settings.sigma),
        build_update_scheme(settings),
        build_weight_scheme(settings),
        binner,
        build_logger(settings),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_settings_build_an_unpopulated_cge() {
        let settings = Settings {
            statistics_log_filename: None,
            ..Settings::default()
        };
        let cge = build_cge(&settings).unwrap();
        assert_eq!(cge.get_ge().history().len(), 0);
    }

    #[test]
    fn resuming_from_a_logged_round_trip_recovers_the_binning() {
        let mut settings = Settings {
            use_dynamic_binning: false,
            bin_width: 1.0,
            statistics_log_filename: Some(scratch_path("write")),
            log_mode: Mode::All,
            initial_max: 3,
            ..Settings::default()
        };

        let mut cge = build_cge(&settings).unwrap();
        let mut done = false;
        for e in [0.5, 1.5, 2.5, 3.5] {
            done = cge.add_observation(e);
        }
        assert!(done);
        cge.estimate_new_weights().unwrap();
        cge.force_statistics_log().unwrap();

        let written = settings.statistics_log_filename.take().unwrap();
        settings.read_statistics_log_filename = Some(written.clone());
        let resumed = build_cge(&settings).unwrap();
        assert_eq!(resumed.get_binner().nbins(), cge.get_binner().nbins());

        std::fs::remove_file(&written).ok();
    }

    fn scratch_path(label: &str) -> String {
        std::env::temp_dir()
            .join(format!("muninn_settings_test_{label}_{}.log", std::process::id()))
            .to_str()
            .unwrap()
            .to_string()
    }
}
