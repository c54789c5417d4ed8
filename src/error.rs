//! Error taxonomy for the crate.
use std::fmt;

/// All error kinds that can be raised by the core.
///
/// Every fallible operation in this crate returns `Result<T, MuninnError>`.
/// The orchestrator treats [`MuninnError::MaxBinsExceeded`],
/// [`MuninnError::NoSolution`] and [`MuninnError::NoOverlap`] as recoverable
/// (keep old weights, prolong the round); the remaining kinds are
/// programmer/configuration errors and are surfaced to the caller unchanged.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde_support", derive(serde::Serialize, serde::Deserialize))]
pub enum MuninnError {
    /// A binner extension would grow the bin count past `max_number_of_bins`.
    MaxBinsExceeded {
        /// number of bins that would have resulted
        attempted: usize,
        /// configured cap
        max_bins: usize,
    },
    /// The MLE initial free-energy guess found no overlap between the
    /// newest histogram and the rest of the history.
    NoOverlap,
    /// The Newton solver did not converge within the allotted iterations.
    NoSolution {
        /// iterations actually run
        iterations: usize,
    },
    /// A collaborator supplied an object of the wrong concrete variant
    /// where a specific one was required (e.g. a history that is not a
    /// `MultiHistogramHistory`, a binner that is not a
    /// `NonUniformDynamicBinner`).
    CastMismatch {
        /// what was required
        expected: &'static str,
        /// what was found
        found: &'static str,
    },
    /// The statistics-log reader could not parse the input.
    ReadError {
        /// human-readable detail
        message: String,
    },
    /// Factory/settings were inconsistent at construction time.
    ConfigError {
        /// human-readable detail
        message: String,
    },
    /// An array-shape contract was violated.
    ShapeMismatch {
        /// shape actually held
        found: Vec<usize>,
        /// shape required
        expected: Vec<usize>,
    },
}

impl MuninnError {
    /// Short, stable name for the error kind, for printing and logging.
    pub fn kind_name(&self) -> &'static str {
        match self {
            MuninnError::MaxBinsExceeded { .. } => "MaxBinsExceeded",
            MuninnError::NoOverlap => "NoOverlap",
            MuninnError::NoSolution { .. } => "NoSolution",
            MuninnError::CastMismatch { .. } => "CastMismatch",
            MuninnError::ReadError { .. } => "ReadError",
            MuninnError::ConfigError { .. } => "ConfigError",
            MuninnError::ShapeMismatch { .. } => "ShapeMismatch",
        }
    }

    /// True for the errors the orchestrator can recover from by keeping the
    /// old weights and prolonging the current round.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MuninnError::MaxBinsExceeded { .. }
                | MuninnError::NoSolution { .. }
                | MuninnError::NoOverlap
        )
    }
}

impl fmt::Display for MuninnError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MuninnError::MaxBinsExceeded { attempted, max_bins } => write!(
                f,
                "MaxBinsExceeded: extension would require {attempted} bins, cap is {max_bins}"
            ),
            MuninnError::NoOverlap => write!(
                f,
                "NoOverlap: the newest histogram has no overlap with the rest of the history"
            ),
            MuninnError::NoSolution { iterations } => {
                write!(f, "NoSolution: Newton solver failed to converge after {iterations} iterations")
            }
            MuninnError::CastMismatch { expected, found } => {
                write!(f, "CastMismatch: expected {expected}, found {found}")
            }
            MuninnError::ReadError { message } => write!(f, "ReadError: {message}"),
            MuninnError::ConfigError { message } => write!(f, "ConfigError: {message}"),
            MuninnError::ShapeMismatch { found, expected } => write!(
                f,
                "ShapeMismatch: expected shape {expected:?}, found {found:?}"
            ),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type MuninnResult<T> = Result<T, MuninnError>;
