// =============================================================================
// Signals Module
// =============================================================================
//
// Signal processing pipeline for the engine:
// - EMA cloud calculation and per-bar cloud classification
// - Cloud / pivot confluence fusion into LONG / SHORT / HOLD

pub mod ema_cloud;
pub mod fuser;

pub use ema_cloud::{CloudPoint, EmaPair, PairTag};
pub use fuser::{fuse, CloudReading, FusedSignal};
