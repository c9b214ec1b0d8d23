// =============================================================================
// Runtime Configuration: engine settings with atomic save
// =============================================================================
//
// Every tunable parameter of the signal engine lives here: the EMA pair
// periods, the session timezone and bar interval, plus the watchlist and data
// directory used by the binary.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash.  All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
//
// =============================================================================

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::signals::PairTag;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_true() -> bool {
    true
}

fn default_ema_pairs() -> Vec<(usize, usize)> {
    vec![(5, 12), (8, 9), (34, 50)]
}

fn default_session_timezone() -> String {
    "America/New_York".to_string()
}

fn default_interval_minutes() -> u32 {
    15
}

fn default_symbols() -> Vec<String> {
    vec![
        "AAPL".to_string(),
        "MSFT".to_string(),
        "NVDA".to_string(),
        "SPY".to_string(),
        "QQQ".to_string(),
    ]
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_cache_capacity() -> usize {
    256
}

// =============================================================================
// EngineConfig
// =============================================================================

/// Top-level configuration for the signal engine and its runner.
///
/// Every field has a serde default so that older JSON files missing new fields
/// will still deserialise correctly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    // --- Engine ---------------------------------------------------------------

    /// EMA `(fast, slow)` period pairs whose clouds must agree.
    #[serde(default = "default_ema_pairs")]
    pub ema_pairs: Vec<(usize, usize)>,

    /// IANA timezone whose calendar date delimits trading sessions.
    #[serde(default = "default_session_timezone")]
    pub session_timezone: String,

    /// Expected spacing of intraday bars, in minutes.
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u32,

    // --- Runner ---------------------------------------------------------------

    /// Instruments analysed by an "analyze all" run.
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,

    /// Directory holding one `<SYMBOL>.json` bar file per instrument.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Memoize results per (instrument, data version).
    #[serde(default = "default_true")]
    pub enable_cache: bool,

    /// Maximum number of memoized results.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ema_pairs: default_ema_pairs(),
            session_timezone: default_session_timezone(),
            interval_minutes: default_interval_minutes(),
            symbols: default_symbols(),
            data_dir: default_data_dir(),
            enable_cache: true,
            cache_capacity: default_cache_capacity(),
        }
    }
}

impl EngineConfig {
    /// Configured pairs as tags, in configuration order.
    pub fn pair_tags(&self) -> Vec<PairTag> {
        self.ema_pairs.iter().copied().map(PairTag::from).collect()
    }

    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read engine config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse engine config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbols = ?config.symbols,
            ema_pairs = ?config.ema_pairs,
            "engine config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise engine config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "engine config saved (atomic)");
        Ok(())
    }
}
