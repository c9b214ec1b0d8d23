// =============================================================================
// Analysis Engine: one instrument in, one signal out
// =============================================================================
//
// Pipeline:
//   1. Compute every EMA pair over the full series (fails first on empty data)
//   2. Classify clouds bar by bar
//   3. Segment sessions and take the prior completed session
//   4. Compute pivot levels from its high / low / close
//   5. Fuse latest cloud readings, pivots and latest close
//   6. Attach a stop hint from the widest cloud when the signal is directional
//
// The engine owns no mutable state; every call builds a fresh result.
// =============================================================================

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};
use crate::indicators::{calculate_pivots, PivotLevels};
use crate::market_data::session::{parse_timezone, prior_session};
use crate::market_data::{BarSeries, Session};
use crate::runtime_config::EngineConfig;
use crate::signals::ema_cloud::{self, validate_pairs};
use crate::signals::{fuse, CloudPoint, CloudReading, EmaPair, PairTag};
use crate::types::Signal;

// =============================================================================
// Result types
// =============================================================================

/// Band of the widest configured cloud at the latest bar, the reference
/// level for a protective stop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StopHint {
    pub pair: PairTag,
    pub lower: f64,
    pub upper: f64,
}

impl std::fmt::Display for StopHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Primary stop is the {} cloud ({:.2}-{:.2})",
            self.pair, self.lower, self.upper
        )
    }
}

/// Everything derived from one BarSeries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub symbol: String,
    pub latest_close: f64,
    pub latest_timestamp: DateTime<Utc>,
    pub prior_session: Session,
    pub pivots: PivotLevels,
    pub ema_pairs: BTreeMap<PairTag, EmaPair>,
    pub cloud_states: BTreeMap<PairTag, Vec<CloudPoint>>,
    pub signal: Signal,
    pub rationale: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_hint: Option<StopHint>,
}

impl AnalysisResult {
    pub fn rationale_text(&self) -> String {
        self.rationale.join("; ")
    }
}

// =============================================================================
// Analysis Engine
// =============================================================================

/// Validated engine settings.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisEngine {
    pairs: Vec<PairTag>,
    timezone: Tz,
}

impl AnalysisEngine {
    pub fn new(pairs: Vec<PairTag>, timezone: Tz) -> EngineResult<Self> {
        validate_pairs(&pairs)?;
        Ok(Self { pairs, timezone })
    }

    pub fn from_config(config: &EngineConfig) -> EngineResult<Self> {
        let timezone = parse_timezone(&config.session_timezone)?;
        Self::new(config.pair_tags(), timezone)
    }

    pub fn pairs(&self) -> &[PairTag] {
        &self.pairs
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Stable description of the settings, part of the memoization key.
    pub fn fingerprint(&self) -> String {
        let pairs: Vec<String> = self.pairs.iter().map(ToString::to_string).collect();
        format!("{}|{}", pairs.join(","), self.timezone.name())
    }

    /// Run the full pipeline for one instrument.
    pub fn analyze(&self, series: &BarSeries) -> EngineResult<AnalysisResult> {
        let symbol = series.symbol();

        // ── 1. EMA pairs ─────────────────────────────────────────────────
        let ema_pairs = ema_cloud::compute(series, &self.pairs)?;

        // ── 2. Cloud classification ──────────────────────────────────────
        let cloud_states: BTreeMap<PairTag, Vec<CloudPoint>> = ema_pairs
            .iter()
            .map(|(tag, pair)| (*tag, pair.clouds()))
            .collect();

        // ── 3. Prior session ─────────────────────────────────────────────
        let prior = prior_session(series, self.timezone)?;

        // ── 4. Pivots ────────────────────────────────────────────────────
        let pivots = calculate_pivots(prior.high, prior.low, prior.close)?;
        debug!(
            symbol,
            session = %prior.date,
            pp = pivots.pp,
            r1 = pivots.r1,
            s1 = pivots.s1,
            "pivot levels computed"
        );

        // ── 5. Fuse ──────────────────────────────────────────────────────
        let latest = series.latest().ok_or_else(|| {
            EngineError::InsufficientData(format!("{symbol}: series has no latest bar"))
        })?;

        let readings: BTreeMap<PairTag, CloudReading> = ema_pairs
            .iter()
            .filter_map(|(tag, pair)| {
                let point = *cloud_states.get(tag)?.last()?;
                Some((*tag, CloudReading::from_point(point, pair.history_len)))
            })
            .collect();

        let fused = fuse(latest.close, &readings, &pivots);

        // ── 6. Stop hint ─────────────────────────────────────────────────
        let stop_hint = if fused.signal.is_directional() {
            widest_cloud_band(&ema_pairs)
        } else {
            None
        };

        info!(
            symbol,
            signal = %fused.signal,
            close = latest.close,
            pp = pivots.pp,
            "analysis complete"
        );

        Ok(AnalysisResult {
            symbol: symbol.to_string(),
            latest_close: latest.close,
            latest_timestamp: latest.timestamp,
            prior_session: prior,
            pivots,
            ema_pairs,
            cloud_states,
            signal: fused.signal,
            rationale: fused.rationale,
            stop_hint,
        })
    }
}

/// Analyze one series with the settings in `config`.
pub fn analyze(series: &BarSeries, config: &EngineConfig) -> EngineResult<AnalysisResult> {
    AnalysisEngine::from_config(config)?.analyze(series)
}

/// Band of the pair with the longest slow period.
fn widest_cloud_band(pairs: &BTreeMap<PairTag, EmaPair>) -> Option<StopHint> {
    let pair = pairs.values().max_by_key(|p| (p.tag.slow, p.tag.fast))?;
    let (lower, upper) = pair.latest_band()?;
    Some(StopHint {
        pair: pair.tag,
        lower,
        upper,
    })
}
