//! Error types for the Differential Evolution optimizer.
//!
//! This module provides structured error handling for DE optimization,
//! following the Microsoft Rust Guidelines pattern of using `thiserror`
//! for library error types with helper methods for error categorization.
//!
//! Nothing in this crate retries: every error is surfaced to the caller and
//! the run that produced it is abandoned.

use thiserror::Error;

/// Errors that can occur during Differential Evolution optimization.
#[derive(Debug, Error)]
pub enum DEError {
    /// Population size is too small (must be >= 4).
    #[error("population size ({pop_size}) must be >= 4")]
    PopulationTooSmall {
        /// The invalid population size
        pop_size: usize,
    },

    /// Scaling factor must be strictly positive and finite.
    #[error("invalid scaling factor: {factor} (must be > 0)")]
    InvalidScalingFactor {
        /// The invalid scaling factor
        factor: f64,
    },

    /// Crossover rate is out of valid range [0, 1].
    #[error("invalid crossover rate: {rate} (must be in [0, 1])")]
    InvalidCrossoverRate {
        /// The invalid crossover rate
        rate: f64,
    },

    /// Lower and upper bounds have different lengths.
    #[error("bounds mismatch: lower has {lower_len} elements, upper has {upper_len}")]
    BoundsMismatch {
        /// Length of the lower bounds array
        lower_len: usize,
        /// Length of the upper bounds array
        upper_len: usize,
    },

    /// A lower bound exceeds its corresponding upper bound.
    #[error("invalid bounds at index {index}: lower ({lower}) > upper ({upper})")]
    InvalidBounds {
        /// Index of the invalid bound pair
        index: usize,
        /// The lower bound value
        lower: f64,
        /// The upper bound value
        upper: f64,
    },

    /// The population initializer returned a matrix of the wrong shape.
    #[error("initial population has shape {rows}x{cols}, expected {expected} rows and at least one column")]
    InvalidInitialPopulation {
        /// Requested population size
        expected: usize,
        /// Rows actually returned
        rows: usize,
        /// Columns actually returned
        cols: usize,
    },

    /// A reduction trigger was configured with a meaningless value.
    #[error("invalid reduction trigger: {reason}")]
    InvalidReductionTrigger {
        /// Why the trigger was rejected
        reason: String,
    },

    /// The objective function failed on a candidate.
    #[error("objective evaluation failed: {message}")]
    ObjectiveEvaluation {
        /// Message reported by the objective
        message: String,
    },

    /// The clustering algorithm returned one label per row for a different row count.
    #[error("clustering returned {got} labels for a population of {expected}")]
    ClusterLabelMismatch {
        /// Population size
        expected: usize,
        /// Number of labels returned
        got: usize,
    },

    /// The clustering algorithm itself failed.
    #[error("clustering failed: {message}")]
    Clustering {
        /// Message reported by the clustering algorithm
        message: String,
    },

    /// A reduction left no individual (every point was labelled noise).
    #[error("population reduction at iteration {iteration} kept no individual")]
    EmptyReduction {
        /// Loop iteration at which the reduction ran
        iteration: usize,
    },

    /// A search-space entry used a kind other than `float`, `int` or `categorical`.
    #[error("hyperparameter '{name}': suggestion kind '{kind}' is not implemented")]
    UnrecognizedHyperparameterKind {
        /// Hyperparameter name
        name: String,
        /// The unsupported kind
        kind: String,
    },

    /// A search-space entry names a hyperparameter the engine does not take.
    #[error("unrecognized hyperparameter '{name}'")]
    UnrecognizedHyperparameter {
        /// Hyperparameter name
        name: String,
    },

    /// A suggested value has the wrong type for its hyperparameter.
    #[error("hyperparameter '{name}' expects a {expected} value")]
    HyperparameterType {
        /// Hyperparameter name
        name: String,
        /// Expected value type
        expected: &'static str,
    },

    /// A hyperparameter range is empty or malformed.
    #[error("invalid range for hyperparameter '{name}': {reason}")]
    InvalidHyperparameterRange {
        /// Hyperparameter name
        name: String,
        /// Why the range was rejected
        reason: String,
    },

    /// Tuning finished without any successful trial.
    #[error("no completed trials available")]
    NoCompletedTrials,

    /// The hyperparameter study (sampler or parameter suggestion) failed.
    #[error("hyperparameter study failed: {0}")]
    Study(#[from] optimizer::Error),

    /// I/O failure while persisting or loading traces.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A trace file could not be parsed.
    #[error("malformed trace file at line {line}: {reason}")]
    TraceFormat {
        /// 1-based line number
        line: usize,
        /// What was wrong
        reason: String,
    },

    /// A search space file could not be parsed.
    #[error("invalid search space: {0}")]
    SearchSpaceFormat(#[from] serde_json::Error),
}

/// A specialized `Result` type for DE operations.
pub type Result<T> = std::result::Result<T, DEError>;

impl DEError {
    /// Returns `true` if this is a configuration-related error.
    ///
    /// Configuration errors are detected before the first iteration runs.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            DEError::PopulationTooSmall { .. }
                | DEError::InvalidScalingFactor { .. }
                | DEError::InvalidCrossoverRate { .. }
                | DEError::BoundsMismatch { .. }
                | DEError::InvalidBounds { .. }
                | DEError::InvalidInitialPopulation { .. }
                | DEError::InvalidReductionTrigger { .. }
        )
    }

    /// Returns `true` if this error was raised by the clustering step of a reduction.
    pub fn is_clustering_error(&self) -> bool {
        matches!(
            self,
            DEError::ClusterLabelMismatch { .. }
                | DEError::Clustering { .. }
                | DEError::EmptyReduction { .. }
        )
    }

    /// Returns `true` if this error comes from the hyperparameter tuning boundary.
    pub fn is_hyperparameter_error(&self) -> bool {
        matches!(
            self,
            DEError::UnrecognizedHyperparameterKind { .. }
                | DEError::UnrecognizedHyperparameter { .. }
                | DEError::HyperparameterType { .. }
                | DEError::InvalidHyperparameterRange { .. }
                | DEError::NoCompletedTrials
                | DEError::Study(_)
        )
    }
}
