// =============================================================================
// Classic Floor Pivots
// =============================================================================
//
// Daily support/resistance levels derived from the prior session:
//   PP = (H + L + C) / 3
//   R1 = 2*PP - L        S1 = 2*PP - H
//   R2 = PP + (H - L)    S2 = PP - (H - L)
//
// The caller picks the prior session; this module does no date logic.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// The five classic pivot levels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PivotLevels {
    pub pp: f64,
    pub s1: f64,
    pub s2: f64,
    pub r1: f64,
    pub r2: f64,
}

impl PivotLevels {
    /// Levels from lowest to highest, labelled for display.
    pub fn ladder(&self) -> [(&'static str, f64); 5] {
        [
            ("S2", self.s2),
            ("S1", self.s1),
            ("PP", self.pp),
            ("R1", self.r1),
            ("R2", self.r2),
        ]
    }
}

/// Compute pivot levels from the prior session's high, low and close.
///
/// Fails with `InvalidInput` when any input is non-finite, `high < low`, or a
/// level overflows to infinity.
pub fn calculate_pivots(high: f64, low: f64, close: f64) -> EngineResult<PivotLevels> {
    if !(high.is_finite() && low.is_finite() && close.is_finite()) {
        return Err(EngineError::InvalidInput(format!(
            "pivot inputs must be finite (h={high} l={low} c={close})"
        )));
    }
    if high < low {
        return Err(EngineError::InvalidInput(format!(
            "pivot high {high} is below low {low}"
        )));
    }

    let range = high - low;
    let pp = (high + low + close) / 3.0;

    let levels = PivotLevels {
        pp,
        s1: 2.0 * pp - high,
        s2: pp - range,
        r1: 2.0 * pp - low,
        r2: pp + range,
    };
    if let Some((label, level)) = levels.ladder().into_iter().find(|(_, v)| !v.is_finite()) {
        return Err(EngineError::InvalidInput(format!(
            "pivot {label} is not finite ({level}) for h={high} l={low} c={close}"
        )));
    }

    Ok(levels)
}
