// =============================================================================
// Session Segmentation
// =============================================================================
//
// Splits a BarSeries into trading sessions.  A new session starts whenever
// the exchange-local calendar date of a bar differs from the previous bar's.
// Inside one session the bars must be exactly one interval apart; a hole is
// reported as InvalidInput and never filled.
//
// The last session is the current (possibly still running) one.  The session
// before it supplies the high / low / close used for pivot levels.
// =============================================================================

use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::Serialize;
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::market_data::BarSeries;

/// One contiguous trading day inside a series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    /// Exchange-local calendar date.
    pub date: NaiveDate,
    /// Index of the first bar of the session in the series.
    pub start: usize,
    /// One past the index of the last bar.
    pub end: usize,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Session {
    pub fn bar_count(&self) -> usize {
        self.end - self.start
    }
}

/// Parse an IANA zone name such as `America/New_York`.
pub fn parse_timezone(name: &str) -> EngineResult<Tz> {
    name.parse::<Tz>()
        .map_err(|e| EngineError::InvalidInput(format!("unknown session timezone {name:?}: {e}")))
}

/// Split `series` into sessions by exchange-local date.
pub fn segment(series: &BarSeries, tz: Tz) -> EngineResult<Vec<Session>> {
    let bars = series.bars();
    let interval = series.interval();
    let mut sessions: Vec<Session> = Vec::new();

    for (i, bar) in bars.iter().enumerate() {
        let date = bar.timestamp.with_timezone(&tz).date_naive();

        if let Some(current) = sessions.last_mut().filter(|s| s.date == date) {
            let prev = &bars[i - 1];
            if bar.timestamp - prev.timestamp != interval {
                return Err(EngineError::InvalidInput(format!(
                    "{}: gap inside session {date} between {} and {}",
                    series.symbol(),
                    prev.timestamp,
                    bar.timestamp
                )));
            }
            current.end = i + 1;
            current.high = current.high.max(bar.high);
            current.low = current.low.min(bar.low);
            current.close = bar.close;
            continue;
        }

        sessions.push(Session {
            date,
            start: i,
            end: i + 1,
            high: bar.high,
            low: bar.low,
            close: bar.close,
        });
    }

    debug!(
        symbol = series.symbol(),
        sessions = sessions.len(),
        "series segmented into sessions"
    );

    Ok(sessions)
}

/// The last completed session before the current one.
pub fn prior_session(series: &BarSeries, tz: Tz) -> EngineResult<Session> {
    let mut sessions = segment(series, tz)?;
    if sessions.len() < 2 {
        return Err(EngineError::InsufficientData(format!(
            "{}: need a completed prior session plus the current one, found {} session(s)",
            series.symbol(),
            sessions.len()
        )));
    }
    sessions.pop();
    // Length checked above.
    sessions
        .pop()
        .ok_or_else(|| EngineError::InsufficientData("no prior session".to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
