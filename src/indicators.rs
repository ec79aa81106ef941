//! Indicator primitives shared by the layer scorers and the reversal
//! detector: EMA, RSI, MACD, ATR and a least-squares slope fit.
//!
//! All functions degrade to empty/neutral output on insufficient data
//! instead of erroring.

use crate::Candle;

/// Guard against zero-range denominators.
pub(crate) const EPSILON: f64 = 1e-9;

// ============================================================
// MOVING AVERAGES
// ============================================================

/// Exponential moving average. Output aligned to the input; the first
/// `period - 1` entries are seeded with a simple average warmup.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    if values.is_empty() || period == 0 {
        return Vec::new();
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut prev = values[0];
    out.push(prev);

    for &v in &values[1..] {
        prev = v * alpha + prev * (1.0 - alpha);
        out.push(prev);
    }
    out
}

// ============================================================
// RSI
// ============================================================

/// Relative Strength Index over closes, Wilder smoothing.
/// Returns one value per close from index `period` on; shorter input
/// yields an empty series.
pub fn rsi(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() <= period {
        return Vec::new();
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for w in closes[..=period].windows(2) {
        let change = w[1] - w[0];
        if change > 0.0 {
            avg_gain += change;
        } else {
            avg_loss += -change;
        }
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;

    let mut out = Vec::with_capacity(closes.len() - period);
    out.push(rsi_value(avg_gain, avg_loss));

    for w in closes[period..].windows(2) {
        let change = w[1] - w[0];
        let (gain, loss) = if change > 0.0 { (change, 0.0) } else { (0.0, -change) };
        avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
        out.push(rsi_value(avg_gain, avg_loss));
    }
    out
}

#[inline]
fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss < EPSILON {
        if avg_gain < EPSILON {
            return 50.0;
        }
        return 100.0;
    }
    100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
}

// ============================================================
// MACD
// ============================================================

/// MACD line, signal and histogram series, aligned to the input closes.
#[derive(Debug, Clone)]
pub struct MacdSeries {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

impl MacdSeries {
    #[inline]
    pub fn last_histogram(&self) -> Option<f64> {
        self.histogram.last().copied()
    }
}

/// MACD with the conventional 12/26/9 EMA stack.
pub fn macd(closes: &[f64]) -> MacdSeries {
    macd_with(closes, 12, 26, 9)
}

pub fn macd_with(closes: &[f64], fast: usize, slow: usize, signal_period: usize) -> MacdSeries {
    let fast_ema = ema(closes, fast);
    let slow_ema = ema(closes, slow);
    let macd: Vec<f64> = fast_ema.iter().zip(&slow_ema).map(|(f, s)| f - s).collect();
    let signal = ema(&macd, signal_period);
    let histogram = macd.iter().zip(&signal).map(|(m, s)| m - s).collect();
    MacdSeries { macd, signal, histogram }
}

// ============================================================
// ATR
// ============================================================

/// Average True Range over the trailing `period` candles (simple average
/// of true ranges). Returns 0.0 when fewer than two candles exist.
pub fn atr(candles: &[Candle], period: usize) -> f64 {
    if candles.len() < 2 || period == 0 {
        return 0.0;
    }

    let start = candles.len().saturating_sub(period + 1);
    let slice = &candles[start..];
    let mut sum = 0.0;
    let mut count = 0usize;

    for w in slice.windows(2) {
        let prev_close = w[0].close;
        let c = &w[1];
        let tr = (c.high - c.low)
            .max((c.high - prev_close).abs())
            .max((c.low - prev_close).abs());
        sum += tr;
        count += 1;
    }

    if count == 0 {
        return 0.0;
    }
    sum / count as f64
}

// ============================================================
// LEAST SQUARES
// ============================================================

/// Least-squares slope of `y` against `x`. Returns 0.0 for degenerate
/// input (fewer than two points, or zero x-variance).
pub fn lsq_slope(points: &[(f64, f64)]) -> f64 {
    let n = points.len() as f64;
    if points.len() < 2 {
        return 0.0;
    }

    let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var = 0.0;
    for (x, y) in points {
        cov += (x - mean_x) * (y - mean_y);
        var += (x - mean_x) * (x - mean_x);
    }

    if var < EPSILON {
        return 0.0;
    }
    cov / var
}

/// Per-bar close slope over the trailing `window` closes, normalized by the
/// last price (relative change per bar). Neutral 0.0 on short input.
pub fn trend_slope(candles: &[Candle], window: usize) -> f64 {
    if candles.len() < 2 || window < 2 {
        return 0.0;
    }
    let start = candles.len().saturating_sub(window);
    let points: Vec<(f64, f64)> = candles[start..]
        .iter()
        .enumerate()
        .map(|(i, c)| (i as f64, c.close))
        .collect();

    let last = candles[candles.len() - 1].close;
    if last.abs() < EPSILON {
        return 0.0;
    }
    lsq_slope(&points) / last
}

/// Single-period close-to-close returns.
pub fn returns(candles: &[Candle]) -> Vec<f64> {
    candles
        .windows(2)
        .map(|w| {
            if w[0].close.abs() < EPSILON {
                0.0
            } else {
                (w[1].close - w[0].close) / w[0].close
            }
        })
        .collect()
}

// ============================================================
// TESTS
// ============================================================
