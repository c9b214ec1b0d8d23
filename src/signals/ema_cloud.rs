// =============================================================================
// EMA Cloud Calculator
// =============================================================================
//
// Computes fast/slow EMA pairs over the full close history of a BarSeries and
// classifies every bar of every pair:
//
//   fast > slow  => BULLISH
//   fast < slow  => BEARISH
//   fast == slow => previous bar's state (BEARISH on the first bar)
//
// `just_crossed` is set only on a bar whose state differs from the bar
// before it.  Short histories are not suppressed here; the fuser applies the
// minimum-history gate.
// =============================================================================

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::indicators::ema::calculate_ema;
use crate::market_data::BarSeries;
use crate::types::CloudState;

// ---------------------------------------------------------------------------
// PairTag
// ---------------------------------------------------------------------------

/// A `(fast, slow)` period configuration.  Orders by fast, then slow.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct PairTag {
    pub fast: usize,
    pub slow: usize,
}

impl PairTag {
    pub const fn new(fast: usize, slow: usize) -> Self {
        Self { fast, slow }
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.fast == 0 || self.slow == 0 {
            return Err(EngineError::InvalidInput(format!(
                "EMA periods must be positive, got {self}"
            )));
        }
        if self.fast >= self.slow {
            return Err(EngineError::MisconfiguredPairs {
                fast: self.fast,
                slow: self.slow,
            });
        }
        Ok(())
    }
}

impl From<(usize, usize)> for PairTag {
    fn from((fast, slow): (usize, usize)) -> Self {
        Self { fast, slow }
    }
}

impl std::fmt::Display for PairTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.fast, self.slow)
    }
}

// Serialised as "5/12" so it can key a JSON object.
impl Serialize for PairTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Validate a whole pair set.
pub fn validate_pairs(pairs: &[PairTag]) -> EngineResult<()> {
    if pairs.is_empty() {
        return Err(EngineError::NoPairs);
    }
    pairs.iter().try_for_each(PairTag::validate)
}

// ---------------------------------------------------------------------------
// Per-bar cloud classification
// ---------------------------------------------------------------------------

/// Cloud state of one pair at one bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CloudPoint {
    pub state: CloudState,
    pub just_crossed: bool,
}

/// Classify index-aligned fast/slow series bar by bar.
pub fn classify_clouds(fast: &[f64], slow: &[f64]) -> Vec<CloudPoint> {
    let mut points = Vec::with_capacity(fast.len().min(slow.len()));
    let mut prev: Option<CloudState> = None;

    for (&f, &s) in fast.iter().zip(slow.iter()) {
        let carried = prev.unwrap_or_default();
        let state = if f > s {
            CloudState::Bullish
        } else if f < s {
            CloudState::Bearish
        } else {
            carried
        };
        let just_crossed = prev.is_some_and(|p| p != state);
        points.push(CloudPoint {
            state,
            just_crossed,
        });
        prev = Some(state);
    }

    points
}

// ---------------------------------------------------------------------------
// EmaPair
// ---------------------------------------------------------------------------

/// Fast and slow EMA values for one pair, aligned with the series bars.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmaPair {
    pub tag: PairTag,
    pub fast: Vec<f64>,
    pub slow: Vec<f64>,
    /// Number of closes the EMAs were computed over.
    pub history_len: usize,
}

impl EmaPair {
    /// Whether at least `slow` closes backed the computation.
    pub fn has_full_history(&self) -> bool {
        self.history_len >= self.tag.slow
    }

    pub fn latest(&self) -> Option<(f64, f64)> {
        Some((*self.fast.last()?, *self.slow.last()?))
    }

    pub fn clouds(&self) -> Vec<CloudPoint> {
        classify_clouds(&self.fast, &self.slow)
    }

    /// Lower and upper edge of the cloud at the latest bar.
    pub fn latest_band(&self) -> Option<(f64, f64)> {
        let (f, s) = self.latest()?;
        Some((f.min(s), f.max(s)))
    }
}

/// Compute every configured pair over the full history of `series`.
///
/// Fails with `NoPairs` / `InvalidInput` / `MisconfiguredPairs` for a bad
/// pair set and `InsufficientData` for an empty series.
pub fn compute(series: &BarSeries, pairs: &[PairTag]) -> EngineResult<BTreeMap<PairTag, EmaPair>> {
    validate_pairs(pairs)?;

    if series.is_empty() {
        return Err(EngineError::InsufficientData(format!(
            "{}: cannot compute EMA clouds on an empty series",
            series.symbol()
        )));
    }

    let closes = series.closes();
    let mut out = BTreeMap::new();

    for &tag in pairs {
        let pair = EmaPair {
            tag,
            fast: calculate_ema(&closes, tag.fast),
            slow: calculate_ema(&closes, tag.slow),
            history_len: closes.len(),
        };
        debug!(
            symbol = series.symbol(),
            pair = %tag,
            bars = closes.len(),
            full_history = pair.has_full_history(),
            "EMA pair computed"
        );
        out.insert(tag, pair);
    }

    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::Bar;
    use chrono::{TimeZone, Utc};

    fn series_from_closes(closes: &[f64]) -> BarSeries {
        let start = Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 0).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                timestamp: start + chrono::Duration::minutes(15 * i as i64),
                open: c,
                high: c,
                low: c,
                close: c,
                volume: 0,
            })
            .collect();
        BarSeries::new("TEST", 15, bars).unwrap()
    }

    fn default_pairs() -> Vec<PairTag> {
        vec![PairTag::new(5, 12), PairTag::new(8, 9), PairTag::new(34, 50)]
    }

    #[test]
    fn empty_series_is_insufficient_data() {
        let series = BarSeries::new("TEST", 15, Vec::new()).unwrap();
        let err = compute(&series, &default_pairs()).unwrap_err();
        assert!(matches!(err, EngineError::InsufficientData(_)));
    }

    #[test]
    fn fast_not_below_slow_is_misconfigured() {
        let series = series_from_closes(&[1.0, 2.0]);
        let err = compute(&series, &[PairTag::new(12, 5)]).unwrap_err();
        assert_eq!(err, EngineError::MisconfiguredPairs { fast: 12, slow: 5 });

        let err = compute(&series, &[PairTag::new(9, 9)]).unwrap_err();
        assert_eq!(err, EngineError::MisconfiguredPairs { fast: 9, slow: 9 });
    }

    #[test]
    fn zero_period_is_invalid_input() {
        let series = series_from_closes(&[1.0, 2.0]);
        let err = compute(&series, &[PairTag::new(0, 5)]).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn empty_pair_set_is_rejected() {
        let series = series_from_closes(&[1.0]);
        assert_eq!(compute(&series, &[]).unwrap_err(), EngineError::NoPairs);
    }

    #[test]
    fn pairs_are_aligned_with_series() {
        let closes: Vec<f64> = (1..=20).map(|x| x as f64).collect();
        let pairs = compute(&series_from_closes(&closes), &default_pairs()).unwrap();
        assert_eq!(pairs.len(), 3);
        for pair in pairs.values() {
            assert_eq!(pair.fast.len(), 20);
            assert_eq!(pair.slow.len(), 20);
            assert_eq!(pair.history_len, 20);
        }
        assert!(pairs[&PairTag::new(5, 12)].has_full_history());
        assert!(!pairs[&PairTag::new(34, 50)].has_full_history());
    }

    #[test]
    fn map_iterates_in_ascending_period_order() {
        let pairs = compute(
            &series_from_closes(&[1.0, 2.0, 3.0]),
            &[PairTag::new(34, 50), PairTag::new(8, 9), PairTag::new(5, 12)],
        )
        .unwrap();
        let order: Vec<String> = pairs.keys().map(|t| t.to_string()).collect();
        assert_eq!(order, vec!["5/12", "8/9", "34/50"]);
    }

    #[test]
    fn flat_series_has_equal_legs_and_stays_bearish() {
        let pairs = compute(&series_from_closes(&[100.0; 60]), &default_pairs()).unwrap();
        for pair in pairs.values() {
            assert_eq!(pair.latest(), Some((100.0, 100.0)));
            let clouds = pair.clouds();
            assert!(clouds.iter().all(|c| c.state == CloudState::Bearish));
            assert!(clouds.iter().all(|c| !c.just_crossed));
        }
    }

    #[test]
    fn ties_carry_previous_state() {
        let points = classify_clouds(&[1.0, 2.0, 2.0, 1.0], &[1.0, 1.0, 2.0, 2.0]);
        let states: Vec<CloudState> = points.iter().map(|p| p.state).collect();
        assert_eq!(
            states,
            vec![
                CloudState::Bearish,
                CloudState::Bullish,
                CloudState::Bullish,
                CloudState::Bearish
            ]
        );
        let crossed: Vec<bool> = points.iter().map(|p| p.just_crossed).collect();
        assert_eq!(crossed, vec![false, true, false, true]);
    }

    #[test]
    fn crossover_fires_once_per_sign_change() {
        // Rise for 30 bars, then fall for 30: the 5/12 pair turns bullish on
        // the first rising bar and bearish once, some bars after the peak.
        let mut closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        closes.extend((0..30).map(|i| 129.0 - 2.0 * i as f64));
        let pairs = compute(&series_from_closes(&closes), &[PairTag::new(5, 12)]).unwrap();
        let pair = &pairs[&PairTag::new(5, 12)];
        let clouds = pair.clouds();

        let crosses: Vec<usize> = clouds
            .iter()
            .enumerate()
            .filter(|(_, c)| c.just_crossed)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(crosses.len(), 2, "crosses at {crosses:?}");
        assert_eq!(crosses[0], 1);
        assert_eq!(clouds[crosses[0]].state, CloudState::Bullish);
        assert!(crosses[1] >= 30);
        assert_eq!(clouds[crosses[1]].state, CloudState::Bearish);

        // Every crossover bar is exactly where the sign of fast - slow flips.
        for &i in &crosses[1..] {
            assert!(pair.fast[i - 1] > pair.slow[i - 1]);
            assert!(pair.fast[i] < pair.slow[i]);
        }
    }

    #[test]
    fn pair_tag_serialises_as_string_key() {
        let mut map = BTreeMap::new();
        map.insert(PairTag::new(34, 50), 1);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"34/50":1}"#);
    }

    #[test]
    fn repeated_computation_is_identical() {
        let closes: Vec<f64> = (0..40).map(|i| 50.0 + (i as f64 * 0.7).sin()).collect();
        let series = series_from_closes(&closes);
        let a = compute(&series, &default_pairs()).unwrap();
        let b = compute(&series, &default_pairs()).unwrap();
        assert_eq!(a, b);
    }
}
