// =============================================================================
// Cloud Pivot: Main Entry Point
// =============================================================================
//
// Runs one "analyze all" pass over the configured watchlist.  Bars for each
// symbol are read from `<data_dir>/<SYMBOL>.json` (an array of bars); a
// symbol whose file is missing or malformed is logged and skipped.
// =============================================================================

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use cloud_pivot::batch::{analyze_all, AnalysisOutcome, BatchInput};
use cloud_pivot::cache::AnalysisCache;
use cloud_pivot::{AnalysisEngine, Bar, EngineConfig};

const CONFIG_PATH: &str = "engine_config.json";

fn load_bars(path: &Path) -> Result<Vec<Bar>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read bars from {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse bars from {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path =
        std::env::var("CLOUDPIVOT_CONFIG").unwrap_or_else(|_| CONFIG_PATH.to_string());
    let mut config = EngineConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        EngineConfig::default()
    });

    // Override symbols from env if available.
    if let Ok(syms) = std::env::var("CLOUDPIVOT_SYMBOLS") {
        config.symbols = syms
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if let Ok(dir) = std::env::var("CLOUDPIVOT_DATA_DIR") {
        config.data_dir = dir.into();
    }

    info!(
        symbols = ?config.symbols,
        ema_pairs = ?config.ema_pairs,
        timezone = %config.session_timezone,
        "Configured watchlist"
    );

    // ── 2. Engine & cache ────────────────────────────────────────────────
    let engine = Arc::new(
        AnalysisEngine::from_config(&config).context("invalid engine configuration")?,
    );
    let cache = config
        .enable_cache
        .then(|| Arc::new(AnalysisCache::new(config.cache_capacity)));

    // ── 3. Load bars ─────────────────────────────────────────────────────
    let mut inputs = Vec::with_capacity(config.symbols.len());
    for symbol in &config.symbols {
        let path = config.data_dir.join(format!("{symbol}.json"));
        match load_bars(&path) {
            Ok(bars) => inputs.push(BatchInput {
                symbol: symbol.clone(),
                interval_minutes: config.interval_minutes,
                bars,
            }),
            Err(e) => error!(symbol = %symbol, error = %format!("{e:#}"), "Skipping symbol"),
        }
    }

    // ── 4. Analyze all ───────────────────────────────────────────────────
    let records = analyze_all(engine, inputs, cache).await;

    for record in &records {
        match &record.outcome {
            AnalysisOutcome::Analyzed { result, from_cache } => {
                info!(
                    id = %record.id,
                    symbol = %record.symbol,
                    signal = %result.signal,
                    close = result.latest_close,
                    pp = result.pivots.pp,
                    r1 = result.pivots.r1,
                    s1 = result.pivots.s1,
                    from_cache,
                    rationale = %result.rationale_text(),
                    "Signal"
                );
                if let Some(hint) = &result.stop_hint {
                    info!(symbol = %record.symbol, "{hint}");
                }
            }
            AnalysisOutcome::Failed { kind, error } => {
                warn!(id = %record.id, symbol = %record.symbol, kind, error = %error, "Analysis failed");
            }
        }
    }

    let analyzed = records.iter().filter(|r| !r.is_failed()).count();
    info!(
        analyzed,
        failed = records.len() - analyzed,
        skipped = config.symbols.len() - records.len(),
        "Analysis complete"
    );

    Ok(())
}
