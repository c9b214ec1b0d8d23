pub mod bar_series;
pub mod session;

// Re-export the bar types for convenient access (e.g. `use crate::market_data::Bar`).
pub use bar_series::{Bar, BarSeries, SeriesVersion};
pub use session::Session;
