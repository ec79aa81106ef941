//! Fixed-schema feature vector for the online model.
//!
//! The layout is frozen per deployment: changing the order or length
//! invalidates trained weights, so the model reinitializes on a
//! dimension mismatch rather than guessing.

use crate::{
    fib::FibLevels,
    indicators::{atr, returns, EPSILON},
    patterns::{Pattern, PatternHit},
    waves::WaveReport,
    Candle,
};

/// Fixed feature-vector length.
///
/// Layout:
/// - 0: mean of the last 20 returns
/// - 1: standard deviation of the last 20 returns
/// - 2: ATR(14)
/// - 3: ATR / last close
/// - 4..=8: normalized counts (all patterns, order blocks, fair value
///   gaps, stop runs, channels)
/// - 9: impulse quality / 99
/// - 10: external sentiment
/// - 11: best pattern confidence / 100
/// - 12..=21: last 10 returns, zero-padded at the front
/// - 22: proximity to the 0.5 retracement
/// - 23: proximity to the 0.618 retracement
pub const FEATURE_DIM: usize = 24;

/// Count scale: anything at or past this many hits saturates to 1.0.
const COUNT_SCALE: f64 = 10.0;

fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (mean, var.sqrt())
}

fn norm_count(count: usize) -> f64 {
    (count as f64 / COUNT_SCALE).min(1.0)
}

/// Build the feature vector. Always returns exactly [`FEATURE_DIM`]
/// entries; short series produce zero-padded neutral features.
pub fn extract(
    candles: &[Candle],
    hits: &[PatternHit],
    report: &WaveReport,
    fib: &FibLevels,
    sentiment: f64,
) -> Vec<f64> {
    let mut out = Vec::with_capacity(FEATURE_DIM);

    let rets = returns(candles);
    let tail20 = &rets[rets.len().saturating_sub(20)..];
    let (mean, std) = mean_std(tail20);
    out.push(mean);
    out.push(std);

    let atr14 = atr(candles, 14);
    let last_close = candles.last().map(|c| c.close).unwrap_or(0.0);
    out.push(atr14);
    out.push(if last_close.abs() < EPSILON { 0.0 } else { atr14 / last_close });

    let order_blocks = hits.iter().filter(|h| matches!(h.pattern, Pattern::OrderBlock { .. })).count();
    let gaps = hits.iter().filter(|h| matches!(h.pattern, Pattern::FairValueGap { .. })).count();
    let stop_runs =
        hits.iter().filter(|h| matches!(h.pattern, Pattern::StopRunFailure { .. })).count();
    let channels = hits.iter().filter(|h| matches!(h.pattern, Pattern::Channel { .. })).count();
    out.push(norm_count(hits.len()));
    out.push(norm_count(order_blocks));
    out.push(norm_count(gaps));
    out.push(norm_count(stop_runs));
    out.push(norm_count(channels));

    out.push(report.impulse.as_ref().map(|i| i.quality / 99.0).unwrap_or(0.0));
    out.push(sentiment);
    out.push(hits.iter().map(|h| h.confidence).max().unwrap_or(0) as f64 / 100.0);

    let tail10 = &rets[rets.len().saturating_sub(10)..];
    for _ in 0..10 - tail10.len() {
        out.push(0.0);
    }
    out.extend_from_slice(tail10);

    out.push(fib.proximity(last_close, 0.5));
    out.push(fib.proximity(last_close, 0.618));

    debug_assert_eq!(out.len(), FEATURE_DIM);
    out
}

// ============================================================
// TESTS
// ============================================================
