// =============================================================================
// Cloud Pivot: EMA cloud / daily pivot signal engine
// =============================================================================
//
// Bar series → {EMA clouds, prior-session pivots} → fused LONG / SHORT / HOLD.
// Every component is a pure transform over request-scoped data.
// =============================================================================

pub mod batch;
pub mod cache;
pub mod engine;
pub mod error;
pub mod indicators;
pub mod market_data;
pub mod runtime_config;
pub mod signals;
pub mod types;

pub use engine::{analyze, AnalysisEngine, AnalysisResult, StopHint};
pub use error::{EngineError, EngineResult};
pub use market_data::{Bar, BarSeries};
pub use runtime_config::EngineConfig;
pub use types::{CloudState, Signal};
