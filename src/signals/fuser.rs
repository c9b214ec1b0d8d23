// =============================================================================
// Signal Fuser: EMA cloud confluence + pivot filter
// =============================================================================
//
// Decision table (total over cloud alignment x price side, first match wins):
//
//   | clouds       | close vs PP  | signal |
//   |--------------|--------------|--------|
//   | all BULLISH  | above        | LONG   |
//   | all BEARISH  | below        | SHORT  |
//   | anything     | anything     | HOLD   |
//
// A LONG/SHORT verdict is downgraded to HOLD when any pair was computed over
// fewer closes than its slow period.
//
// The rationale is built in a fixed order (pairs by ascending periods, then
// the PP relation, then the history gate, then the verdict) so identical
// input always yields byte-identical text.
// =============================================================================

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::indicators::PivotLevels;
use crate::signals::ema_cloud::{CloudPoint, EmaPair, PairTag};
use crate::types::{CloudState, Signal};

/// Marker phrase for the minimum-history gate.
pub const INSUFFICIENT_HISTORY: &str = "insufficient history";

/// Latest cloud reading of one pair, as consumed by the fuser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CloudReading {
    pub state: CloudState,
    pub just_crossed: bool,
    /// Number of closes behind the EMA values.
    pub history_len: usize,
}

impl CloudReading {
    /// Reading from an already classified bar.
    pub fn from_point(point: CloudPoint, history_len: usize) -> Self {
        Self {
            state: point.state,
            just_crossed: point.just_crossed,
            history_len,
        }
    }

    /// Latest reading of a computed pair; `None` for an empty pair.
    pub fn latest_of(pair: &EmaPair) -> Option<Self> {
        let last = *pair.clouds().last()?;
        Some(Self::from_point(last, pair.history_len))
    }
}

/// Agreement across all configured clouds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    AllBullish,
    AllBearish,
    Mixed,
}

/// Where the latest close sits against the pivot point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceSide {
    Above,
    Below,
    AtPivot,
}

impl PriceSide {
    pub fn of(close: f64, pp: f64) -> Self {
        if close > pp {
            Self::Above
        } else if close < pp {
            Self::Below
        } else {
            Self::AtPivot
        }
    }
}

impl std::fmt::Display for PriceSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Above => write!(f, "above"),
            Self::Below => write!(f, "below"),
            Self::AtPivot => write!(f, "at"),
        }
    }
}

/// Alignment of a set of readings.  An empty set is never aligned.
pub fn alignment(clouds: &BTreeMap<PairTag, CloudReading>) -> Alignment {
    if clouds.is_empty() {
        return Alignment::Mixed;
    }
    if clouds.values().all(|r| r.state == CloudState::Bullish) {
        Alignment::AllBullish
    } else if clouds.values().all(|r| r.state == CloudState::Bearish) {
        Alignment::AllBearish
    } else {
        Alignment::Mixed
    }
}

/// The decision table itself.
pub fn decide(alignment: Alignment, side: PriceSide) -> Signal {
    match (alignment, side) {
        (Alignment::AllBullish, PriceSide::Above) => Signal::Long,
        (Alignment::AllBearish, PriceSide::Below) => Signal::Short,
        (Alignment::AllBullish, PriceSide::Below | PriceSide::AtPivot) => Signal::Hold,
        (Alignment::AllBearish, PriceSide::Above | PriceSide::AtPivot) => Signal::Hold,
        (Alignment::Mixed, _) => Signal::Hold,
    }
}

/// Final signal plus the ordered list of sub-conditions that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FusedSignal {
    pub signal: Signal,
    pub rationale: Vec<String>,
}

impl FusedSignal {
    /// Rationale joined into a single display line.
    pub fn rationale_text(&self) -> String {
        self.rationale.join("; ")
    }
}

/// Fuse cloud readings and pivots into one signal.
pub fn fuse(
    latest_close: f64,
    clouds: &BTreeMap<PairTag, CloudReading>,
    pivots: &PivotLevels,
) -> FusedSignal {
    let mut rationale = Vec::with_capacity(clouds.len() + 3);

    for (tag, reading) in clouds {
        let crossed = if reading.just_crossed {
            " (just crossed)"
        } else {
            ""
        };
        rationale.push(format!("EMA {tag} cloud {}{crossed}", reading.state));
    }

    let side = PriceSide::of(latest_close, pivots.pp);
    rationale.push(format!("close {latest_close} {side} PP {}", pivots.pp));

    let short_history: Vec<String> = clouds
        .iter()
        .filter(|(tag, r)| r.history_len < tag.slow)
        .map(|(tag, r)| format!("EMA {tag} has {} of {} bars", r.history_len, tag.slow))
        .collect();
    if !short_history.is_empty() {
        rationale.push(format!(
            "{INSUFFICIENT_HISTORY}: {}",
            short_history.join(", ")
        ));
    }

    let aligned = alignment(clouds);
    let table_signal = decide(aligned, side);

    let signal = if table_signal.is_directional() && !short_history.is_empty() {
        rationale.push(format!(
            "{table_signal} downgraded to HOLD ({INSUFFICIENT_HISTORY})"
        ));
        Signal::Hold
    } else {
        rationale.push(verdict_line(aligned, side, table_signal));
        table_signal
    };

    debug!(
        latest_close,
        pp = pivots.pp,
        signal = %signal,
        pairs = clouds.len(),
        "signal fused"
    );

    FusedSignal { signal, rationale }
}

fn verdict_line(aligned: Alignment, side: PriceSide, signal: Signal) -> String {
    match aligned {
        Alignment::AllBullish => format!("all clouds BULLISH, close {side} PP => {signal}"),
        Alignment::AllBearish => format!("all clouds BEARISH, close {side} PP => {signal}"),
        Alignment::Mixed => format!("mixed cloud states => {signal}"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::calculate_pivots;
    use crate::types::CloudState::{Bearish as Dn, Bullish as Up};

    fn reading(state: CloudState, history_len: usize) -> CloudReading {
        CloudReading {
            state,
            just_crossed: false,
            history_len,
        }
    }

    fn clouds(states: [CloudState; 3], history_len: usize) -> BTreeMap<PairTag, CloudReading> {
        let tags = [PairTag::new(5, 12), PairTag::new(8, 9), PairTag::new(34, 50)];
        tags.into_iter()
            .zip(states)
            .map(|(t, s)| (t, reading(s, history_len)))
            .collect()
    }

    fn pivots() -> PivotLevels {
        calculate_pivots(105.0, 95.0, 100.0).unwrap()
    }

    #[test]
    fn decision_table_is_total() {
        let alignments = [Alignment::AllBullish, Alignment::AllBearish, Alignment::Mixed];
        let sides = [PriceSide::Above, PriceSide::Below, PriceSide::AtPivot];
        let mut directional = Vec::new();
        for a in alignments {
            for s in sides {
                let signal = decide(a, s);
                if signal.is_directional() {
                    directional.push((a, s, signal));
                }
            }
        }
        assert_eq!(
            directional,
            vec![
                (Alignment::AllBullish, PriceSide::Above, Signal::Long),
                (Alignment::AllBearish, PriceSide::Below, Signal::Short),
            ]
        );
    }

    #[test]
    fn all_bullish_above_pivot_is_long() {
        let fused = fuse(150.0, &clouds([Up, Up, Up], 60), &pivots());
        assert_eq!(fused.signal, Signal::Long);
    }

    #[test]
    fn all_bearish_below_pivot_is_short() {
        let fused = fuse(90.0, &clouds([Dn, Dn, Dn], 60), &pivots());
        assert_eq!(fused.signal, Signal::Short);
    }

    #[test]
    fn aligned_clouds_on_wrong_side_hold() {
        assert_eq!(fuse(90.0, &clouds([Up, Up, Up], 60), &pivots()).signal, Signal::Hold);
        assert_eq!(fuse(110.0, &clouds([Dn, Dn, Dn], 60), &pivots()).signal, Signal::Hold);
        assert_eq!(fuse(100.0, &clouds([Up, Up, Up], 60), &pivots()).signal, Signal::Hold);
    }

    #[test]
    fn mixed_clouds_hold_regardless_of_price() {
        for close in [50.0, 100.0, 150.0] {
            let fused = fuse(close, &clouds([Up, Dn, Up], 60), &pivots());
            assert_eq!(fused.signal, Signal::Hold);
            assert!(fused.rationale_text().contains("mixed cloud states"));
        }
    }

    #[test]
    fn short_history_downgrades_to_hold() {
        let fused = fuse(150.0, &clouds([Up, Up, Up], 40), &pivots());
        assert_eq!(fused.signal, Signal::Hold);
        let text = fused.rationale_text();
        assert!(text.contains(INSUFFICIENT_HISTORY));
        assert!(text.contains("EMA 34/50 has 40 of 50 bars"));
        assert!(text.contains("LONG downgraded to HOLD"));
    }

    #[test]
    fn short_history_is_annotated_even_without_direction() {
        let fused = fuse(150.0, &clouds([Up, Dn, Up], 10), &pivots());
        assert_eq!(fused.signal, Signal::Hold);
        assert!(fused.rationale_text().contains(INSUFFICIENT_HISTORY));
    }

    #[test]
    fn empty_cloud_set_holds() {
        let fused = fuse(150.0, &BTreeMap::new(), &pivots());
        assert_eq!(fused.signal, Signal::Hold);
    }

    #[test]
    fn rationale_order_and_text_are_stable() {
        let mut input = clouds([Up, Up, Up], 60);
        if let Some(r) = input.get_mut(&PairTag::new(8, 9)) {
            r.just_crossed = true;
        }
        let a = fuse(150.0, &input, &pivots());
        let b = fuse(150.0, &input, &pivots());
        assert_eq!(a, b);
        assert_eq!(
            a.rationale,
            vec![
                "EMA 5/12 cloud BULLISH".to_string(),
                "EMA 8/9 cloud BULLISH (just crossed)".to_string(),
                "EMA 34/50 cloud BULLISH".to_string(),
                "close 150 above PP 100".to_string(),
                "all clouds BULLISH, close above PP => LONG".to_string(),
            ]
        );
    }

    #[test]
    fn price_line_keeps_sub_cent_distance_to_pivot() {
        let fused = fuse(100.004, &clouds([Up, Up, Up], 60), &pivots());
        assert_eq!(fused.signal, Signal::Long);
        assert!(fused.rationale_text().contains("close 100.004 above PP 100;"));

        let penny = calculate_pivots(0.0045, 0.0039, 0.0042).unwrap();
        let fused = fuse(0.0041, &clouds([Dn, Dn, Dn], 60), &penny);
        assert_eq!(fused.signal, Signal::Short);
        let line = &fused.rationale[3];
        assert!(line.starts_with("close 0.0041 below PP 0.004"), "{line}");
    }

    #[test]
    fn reading_from_point_keeps_cross_flag_and_history() {
        let point = CloudPoint {
            state: Up,
            just_crossed: true,
        };
        assert_eq!(
            CloudReading::from_point(point, 42),
            CloudReading {
                state: Up,
                just_crossed: true,
                history_len: 42,
            }
        );
    }
}
