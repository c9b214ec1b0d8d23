use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A single OHLCV bar at a fixed intraday interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: u64,
}

impl Bar {
    /// Check the price fields of a single bar.
    ///
    /// All prices must be positive and finite, and
    /// `low <= min(open, close) <= max(open, close) <= high`.
    pub fn validate(&self) -> EngineResult<()> {
        for (name, value) in [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(EngineError::InvalidInput(format!(
                    "bar at {}: {name} must be positive and finite, got {value}",
                    self.timestamp
                )));
            }
        }

        let body_low = self.open.min(self.close);
        let body_high = self.open.max(self.close);
        if self.low > body_low || body_high > self.high {
            return Err(EngineError::InvalidInput(format!(
                "bar at {}: OHLC out of order (o={} h={} l={} c={})",
                self.timestamp, self.open, self.high, self.low, self.close
            )));
        }

        Ok(())
    }
}

/// Identifies one particular build of a series, used as a memoization key.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct SeriesVersion {
    pub symbol: String,
    pub interval_minutes: u32,
    pub bar_count: usize,
    pub last_timestamp: Option<DateTime<Utc>>,
    /// Hash over every bar's timestamp, prices and volume.
    pub content_hash: u64,
}

impl std::fmt::Display for SeriesVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.last_timestamp {
            Some(ts) => write!(
                f,
                "{}@{}m#{}:{}:{:016x}",
                self.symbol,
                self.interval_minutes,
                self.bar_count,
                ts.to_rfc3339(),
                self.content_hash
            ),
            None => write!(f, "{}@{}m#empty", self.symbol, self.interval_minutes),
        }
    }
}

// ---------------------------------------------------------------------------
// BarSeries -- validated, immutable once built
// ---------------------------------------------------------------------------

/// Ordered OHLCV bars for one instrument at one interval.
///
/// Construction validates every bar and the timestamp ordering; the series
/// is never mutated afterwards.  An empty series is representable so that
/// the EMA cloud calculator can reject it with `InsufficientData`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarSeries {
    symbol: String,
    interval_minutes: u32,
    bars: Vec<Bar>,
}

impl BarSeries {
    pub fn new(
        symbol: impl Into<String>,
        interval_minutes: u32,
        bars: Vec<Bar>,
    ) -> EngineResult<Self> {
        let symbol = symbol.into();

        if interval_minutes == 0 {
            return Err(EngineError::InvalidInput(format!(
                "{symbol}: bar interval must be positive"
            )));
        }

        for bar in &bars {
            bar.validate()?;
        }

        for pair in bars.windows(2) {
            if pair[1].timestamp <= pair[0].timestamp {
                return Err(EngineError::InvalidInput(format!(
                    "{symbol}: timestamps not strictly increasing ({} then {})",
                    pair[0].timestamp, pair[1].timestamp
                )));
            }
        }

        Ok(Self {
            symbol,
            interval_minutes,
            bars,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn interval_minutes(&self) -> u32 {
        self.interval_minutes
    }

    pub fn interval(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.interval_minutes))
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Close prices, oldest first.
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn latest(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn version(&self) -> SeriesVersion {
        let mut hasher = DefaultHasher::new();
        for bar in &self.bars {
            bar.timestamp.hash(&mut hasher);
            for price in [bar.open, bar.high, bar.low, bar.close] {
                price.to_bits().hash(&mut hasher);
            }
            bar.volume.hash(&mut hasher);
        }

        SeriesVersion {
            symbol: self.symbol.clone(),
            interval_minutes: self.interval_minutes,
            bar_count: self.bars.len(),
            last_timestamp: self.bars.last().map(|b| b.timestamp),
            content_hash: hasher.finish(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
