//! Error types for printtune
//!
//! Only validation errors ever reach the caller of a judgment submission.
//! Numerical failures are absorbed by the proposal fallback, and budget
//! exhaustion is a deterministic downgrade rather than an error.

use thiserror::Error;

/// Validation failure for a submitted judgment
///
/// Raised before any mutation; the session passed in is left untouched.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum JudgmentError {
    /// Round index outside `1..=round_count`
    #[error("Unknown round {round_index} (session has {round_count} rounds)")]
    UnknownRound {
        round_index: usize,
        round_count: usize,
    },

    /// The round already carries a judgment
    #[error("Round {0} has already been judged")]
    RoundAlreadyJudged(usize),

    /// The slot does not exist in the round
    #[error("Unknown slot {slot:?} in round {round_index}")]
    UnknownSlot { slot: String, round_index: usize },

    /// A field required by the judgment kind is absent
    #[error("Judgment kind {kind} requires field {field}")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },

    /// A field was supplied that the judgment kind does not accept
    #[error("Judgment kind {kind} does not accept field {field}")]
    UnexpectedField {
        kind: &'static str,
        field: &'static str,
    },

    /// Reprint widening factor must be finite and >= 1.0
    #[error("Invalid delta_scale {0}: must be finite and >= 1.0")]
    InvalidDeltaScale(f64),

    /// The session has no rounds yet
    #[error("Session has no rounds; create the initial round first")]
    NoRounds,
}

/// Numerical failure while fitting the preference model
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FitError {
    /// A matrix that must be positive definite was not
    #[error("Singular system: {0}")]
    Singular(String),

    /// NaN or infinity appeared in the latent utilities or evidence
    #[error("Non-finite value: {0}")]
    NonFinite(String),

    /// Newton iterations exhausted before convergence
    #[error("Did not converge after {iterations} iterations")]
    NotConverged { iterations: usize },

    /// Feature matrix and comparison list disagree
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Error type for session and best-parameter persistence
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error while reading or writing
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Stored data uses a newer schema than this build understands
    #[error("Stored session version {0} is newer than supported")]
    VersionTooNew(u32),

    /// Nothing stored under the requested id
    #[error("Not found: {0}")]
    NotFound(String),

    /// Stored data failed an integrity check
    #[error("Corrupted data: {0}")]
    Corrupted(String),

    /// Session id cannot be used as a storage key
    #[error("Invalid session id: {0:?}")]
    InvalidSessionId(String),
}

/// Error type for configuration loading
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// The configuration could not be parsed
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// The configuration parsed but holds unusable values
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Error type for named-parameter conversion
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SpaceError {
    /// A required axis was missing from the mapping
    #[error("Missing axis: {0}")]
    MissingAxis(String),

    /// The mapping contains a name that is not an axis
    #[error("Unknown axis: {0}")]
    UnknownAxis(String),
}

/// Top-level error type
#[derive(Debug, Error)]
pub enum TuneError {
    /// Judgment validation error
    #[error("Judgment rejected: {0}")]
    Judgment(#[from] JudgmentError),

    /// Model fit error
    #[error("Model fit failed: {0}")]
    Fit(#[from] FitError),

    /// Persistence error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Parameter space error
    #[error("Parameter space error: {0}")]
    Space(#[from] SpaceError),
}

/// Result type alias for printtune operations
pub type TuneResult<T> = Result<T, TuneError>;
