// =============================================================================
// Engine Errors
// =============================================================================
//
// Every engine component validates its own direct inputs and fails fast with
// one of these kinds.  The binary wraps them in `anyhow` at the edges.

use thiserror::Error;

/// Typed failure returned by every engine operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// The series is empty or does not cover enough sessions.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// A malformed bar, a non-positive period or invalid pivot inputs.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An EMA pair whose fast period is not strictly below its slow period.
    #[error("misconfigured EMA pair {fast}/{slow}: fast period must be below slow period")]
    MisconfiguredPairs { fast: usize, slow: usize },

    /// No EMA pairs were configured at all.
    #[error("no EMA pairs configured")]
    NoPairs,
}

impl EngineError {
    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InsufficientData(_) => "InsufficientData",
            Self::InvalidInput(_) => "InvalidInput",
            Self::MisconfiguredPairs { .. } | Self::NoPairs => "MisconfiguredPairs",
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
