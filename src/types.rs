// =============================================================================
// Shared types used across the signal engine
// =============================================================================

use serde::{Deserialize, Serialize};

/// Relative position of a fast EMA against its slow partner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CloudState {
    Bullish,
    Bearish,
}

impl Default for CloudState {
    fn default() -> Self {
        Self::Bearish
    }
}

impl std::fmt::Display for CloudState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bullish => write!(f, "BULLISH"),
            Self::Bearish => write!(f, "BEARISH"),
        }
    }
}

/// Discrete point-in-time trading signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Long,
    Short,
    Hold,
}

impl Default for Signal {
    fn default() -> Self {
        Self::Hold
    }
}

impl Signal {
    pub fn is_directional(self) -> bool {
        !matches!(self, Self::Hold)
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
            Self::Hold => write!(f, "HOLD"),
        }
    }
}
