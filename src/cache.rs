use std::collections::{HashMap, VecDeque};

use parking_lot::RwLock;
use tracing::debug;

use crate::engine::AnalysisResult;
use crate::market_data::SeriesVersion;

// ---------------------------------------------------------------------------
// CacheKey
// ---------------------------------------------------------------------------

/// Identifies one analysis: which data, analysed with which settings.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct CacheKey {
    pub version: SeriesVersion,
    pub engine_fingerprint: String,
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]", self.version, self.engine_fingerprint)
    }
}

// ---------------------------------------------------------------------------
// AnalysisCache -- thread-safe memo of finished analyses
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Entries {
    results: HashMap<CacheKey, AnalysisResult>,
    /// Insertion order, oldest first.
    order: VecDeque<CacheKey>,
}

/// Thread-safe memo of analysis results keyed by data version and engine
/// settings.  Once `max_entries` is reached the oldest entry is evicted.
///
/// Purely an optimization: a hit returns exactly what a fresh analysis of
/// the same series would return.
pub struct AnalysisCache {
    entries: RwLock<Entries>,
    max_entries: usize,
}

impl AnalysisCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(Entries::default()),
            max_entries: max_entries.max(1),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<AnalysisResult> {
        self.entries.read().results.get(key).cloned()
    }

    pub fn insert(&self, key: CacheKey, result: AnalysisResult) {
        let mut entries = self.entries.write();
        if entries.results.insert(key.clone(), result).is_none() {
            entries.order.push_back(key);
        }
        // Trim oldest to stay within budget.
        while entries.order.len() > self.max_entries {
            if let Some(oldest) = entries.order.pop_front() {
                debug!(key = %oldest, "evicting cached analysis");
                entries.results.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut entries = self.entries.write();
        entries.results.clear();
        entries.order.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
