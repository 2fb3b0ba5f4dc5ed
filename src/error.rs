//! Error types for the statistics engine.

use thiserror::Error;

/// Result type for texture statistics operations
pub type StatsResult<T> = Result<T, StatsError>;

/// Errors reported by the texture and distribution builders.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StatsError {
    /// A closed-form curve produced a negative value.
    #[error("{distribution} distribution has a negative value {y} at x = {x}")]
    InvalidParameter {
        distribution: &'static str,
        x: f64,
        y: f64,
    },

    #[error("invalid {distribution} distribution: {reason}")]
    InvalidDistribution {
        distribution: &'static str,
        reason: String,
    },

    #[error("component {index} is invalid: {reason}")]
    InvalidComponent { index: usize, reason: String },

    #[error("{symmetry} expects a density of length {expected}, got {got}")]
    SizeMismatch {
        symmetry: &'static str,
        expected: usize,
        got: usize,
    },
}
