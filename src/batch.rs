// =============================================================================
// Batch Runner: "analyze all" across a watchlist
// =============================================================================
//
// Each instrument runs on its own blocking task; instruments share nothing
// except the optional memo cache.  A failing instrument produces a `Failed`
// record and the batch carries on with the rest.  Records come back in the
// same order as the inputs.
//
// Every record carries a UUID and a creation timestamp so that an outcome can
// be traced in logs after the fact.
// =============================================================================

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::cache::{AnalysisCache, CacheKey};
use crate::engine::{AnalysisEngine, AnalysisResult};
use crate::error::{EngineError, EngineResult};
use crate::market_data::{Bar, BarSeries};

/// Raw bars for one instrument as handed over by a data collaborator.
#[derive(Debug, Clone)]
pub struct BatchInput {
    pub symbol: String,
    pub interval_minutes: u32,
    pub bars: Vec<Bar>,
}

/// What happened to one instrument.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    Analyzed {
        result: Box<AnalysisResult>,
        from_cache: bool,
    },
    Failed {
        kind: &'static str,
        error: String,
    },
}

impl From<EngineError> for AnalysisOutcome {
    fn from(e: EngineError) -> Self {
        Self::Failed {
            kind: e.kind(),
            error: e.to_string(),
        }
    }
}

/// Auditable record of one instrument's analysis inside a batch.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRecord {
    /// Unique identifier for this record (UUID v4).
    pub id: String,

    pub symbol: String,

    /// ISO 8601 timestamp of when this record was created.
    pub created_at: String,

    pub outcome: AnalysisOutcome,
}

impl AnalysisRecord {
    pub fn analyzed(result: AnalysisResult, from_cache: bool) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            symbol: result.symbol.clone(),
            created_at: chrono::Utc::now().to_rfc3339(),
            outcome: AnalysisOutcome::Analyzed {
                result: Box::new(result),
                from_cache,
            },
        }
    }

    pub fn failed(symbol: impl Into<String>, outcome: AnalysisOutcome) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            symbol: symbol.into(),
            created_at: chrono::Utc::now().to_rfc3339(),
            outcome,
        }
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        match &self.outcome {
            AnalysisOutcome::Analyzed { result, .. } => Some(result.as_ref()),
            AnalysisOutcome::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, AnalysisOutcome::Failed { .. })
    }
}

/// Build, analyse and memoize one instrument.
fn analyze_one(
    engine: &AnalysisEngine,
    cache: Option<&AnalysisCache>,
    input: BatchInput,
) -> EngineResult<(AnalysisResult, bool)> {
    let series = BarSeries::new(input.symbol, input.interval_minutes, input.bars)?;

    let key = cache.map(|_| CacheKey {
        version: series.version(),
        engine_fingerprint: engine.fingerprint(),
    });

    if let (Some(cache), Some(key)) = (cache, key.as_ref()) {
        if let Some(hit) = cache.get(key) {
            return Ok((hit, true));
        }
    }

    let result = engine.analyze(&series)?;

    if let (Some(cache), Some(key)) = (cache, key) {
        cache.insert(key, result.clone());
    }

    Ok((result, false))
}

/// Analyse every input concurrently and return one record per input, in
/// input order.
pub async fn analyze_all(
    engine: Arc<AnalysisEngine>,
    inputs: Vec<BatchInput>,
    cache: Option<Arc<AnalysisCache>>,
) -> Vec<AnalysisRecord> {
    let total = inputs.len();

    let handles: Vec<(String, tokio::task::JoinHandle<EngineResult<(AnalysisResult, bool)>>)> =
        inputs
            .into_iter()
            .map(|input| {
                let symbol = input.symbol.clone();
                let engine = engine.clone();
                let cache = cache.clone();
                let handle = tokio::task::spawn_blocking(move || {
                    analyze_one(&engine, cache.as_deref(), input)
                });
                (symbol, handle)
            })
            .collect();

    let mut records = Vec::with_capacity(total);
    for (symbol, handle) in handles {
        let record = match handle.await {
            Ok(Ok((result, from_cache))) => AnalysisRecord::analyzed(result, from_cache),
            Ok(Err(e)) => {
                warn!(symbol = %symbol, kind = e.kind(), error = %e, "analysis failed, continuing");
                AnalysisRecord::failed(symbol, e.into())
            }
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "analysis task aborted, continuing");
                AnalysisRecord::failed(
                    symbol,
                    AnalysisOutcome::Failed {
                        kind: "TaskFailed",
                        error: e.to_string(),
                    },
                )
            }
        };
        records.push(record);
    }

    let failed = records.iter().filter(|r| r.is_failed()).count();
    info!(total, failed, "batch analysis complete");

    records
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::session::parse_timezone;
    use crate::signals::PairTag;
    use crate::types::Signal;
    use chrono::{TimeZone, Utc};

    fn engine() -> Arc<AnalysisEngine> {
        let tz = parse_timezone("America/New_York").unwrap();
        Arc::new(AnalysisEngine::new(vec![PairTag::new(2, 3), PairTag::new(3, 6)], tz).unwrap())
    }

    fn rising_input(symbol: &str) -> BatchInput {
        let q = chrono::Duration::minutes(15);
        let day1 = Utc.with_ymd_and_hms(2024, 3, 4, 14, 30, 0).unwrap();
        let day2 = Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 0).unwrap();
        let mut bars = Vec::new();
        for i in 0..8 {
            bars.push(Bar {
                timestamp: day1 + q * i,
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0,
                volume: 5,
            });
        }
        for i in 0..8 {
            let close = 101.0 + i as f64;
            bars.push(Bar {
                timestamp: day2 + q * i,
                open: close,
                high: close,
                low: close,
                close,
                volume: 5,
            });
        }
        BatchInput {
            symbol: symbol.to_string(),
            interval_minutes: 15,
            bars,
        }
    }

    #[tokio::test]
    async fn failures_do_not_abort_the_batch() {
        let mut broken = rising_input("BROKEN");
        broken.bars[3].high = 1.0;
        let empty = BatchInput {
            symbol: "EMPTY".to_string(),
            interval_minutes: 15,
            bars: Vec::new(),
        };

        let records = analyze_all(
            engine(),
            vec![rising_input("AAA"), broken, empty, rising_input("BBB")],
            None,
        )
        .await;

        let symbols: Vec<&str> = records.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["AAA", "BROKEN", "EMPTY", "BBB"]);

        assert_eq!(records[0].result().map(|r| r.signal), Some(Signal::Long));
        assert!(matches!(
            records[1].outcome,
            AnalysisOutcome::Failed { kind: "InvalidInput", .. }
        ));
        assert!(matches!(
            records[2].outcome,
            AnalysisOutcome::Failed { kind: "InsufficientData", .. }
        ));
        assert!(!records[3].is_failed());
        assert_ne!(records[0].id, records[3].id);
    }

    #[tokio::test]
    async fn second_run_is_served_from_cache() {
        let cache = Arc::new(AnalysisCache::new(8));

        let first = analyze_all(engine(), vec![rising_input("AAA")], Some(cache.clone())).await;
        let second = analyze_all(engine(), vec![rising_input("AAA")], Some(cache.clone())).await;

        assert_eq!(cache.len(), 1);
        assert!(matches!(
            first[0].outcome,
            AnalysisOutcome::Analyzed { from_cache: false, .. }
        ));
        assert!(matches!(
            second[0].outcome,
            AnalysisOutcome::Analyzed { from_cache: true, .. }
        ));
        assert_eq!(first[0].result(), second[0].result());
    }

    #[test]
    fn failed_record_serialises_with_status_tag() {
        let record = AnalysisRecord::failed(
            "XYZ",
            EngineError::InsufficientData("empty".to_string()).into(),
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["outcome"]["status"], "failed");
        assert_eq!(json["outcome"]["kind"], "InsufficientData");
        assert!(!json["created_at"].as_str().unwrap().is_empty());
    }
}
