// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// EMA gives more weight to recent prices, making it more responsive to new
// information than the Simple Moving Average (SMA).
//
// Formula:
//   multiplier = 2 / (period + 1)
//   EMA_0      = close_0
//   EMA_t      = close_t * multiplier + EMA_{t-1} * (1 - multiplier)
//
// Seeding with the first close keeps the output index-aligned with the input,
// so a fast and a slow EMA over the same closes can be compared bar by bar.
// Early values are low-confidence until `period` closes have been seen; that
// judgement belongs to the caller.
// =============================================================================

/// Smoothing factor `k = 2 / (period + 1)`.
pub fn smoothing_factor(period: usize) -> f64 {
    2.0 / (period as f64 + 1.0)
}

/// Compute the EMA series for the given `closes` slice and look-back `period`.
///
/// The result has exactly `closes.len()` elements; element `i` is the EMA up
/// to and including close `i`.
///
/// # Edge cases
/// - `period == 0` => empty vec
/// - empty `closes` => empty vec
pub fn calculate_ema(closes: &[f64], period: usize) -> Vec<f64> {
    let Some(&seed) = closes.first() else {
        return Vec::new();
    };
    if period == 0 {
        return Vec::new();
    }

    let multiplier = smoothing_factor(period);

    let mut result = Vec::with_capacity(closes.len());
    result.push(seed);

    let mut prev_ema = seed;
    for &close in &closes[1..] {
        // Same recurrence in incremental form; a flat run stays bit-exact.
        let ema = prev_ema + multiplier * (close - prev_ema);
        result.push(ema);
        prev_ema = ema;
    }

    result
}
