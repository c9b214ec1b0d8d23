// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the indicators the signal engine
// is built from.

pub mod ema;
pub mod pivots;

pub use ema::calculate_ema;
pub use pivots::{calculate_pivots, PivotLevels};
