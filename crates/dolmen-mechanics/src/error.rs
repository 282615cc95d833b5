//! Error types for the mechanics crate.

/// Errors that can occur while parsing or rolling dice.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MechError {
    /// The notation string could not be parsed as `NdM[+K]`.
    #[error("invalid dice notation: {0}")]
    InvalidNotation(String),

    /// A die must have at least two faces.
    #[error("invalid die size: d{0}")]
    InvalidDieSize(u32),

    /// The notation was empty or asked for zero dice.
    #[error("no dice specified")]
    NoDice,
}

/// Convenience result type for mechanics operations.
pub type MechResult<T> = Result<T, MechError>;
