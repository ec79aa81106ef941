//! Layer scorers: independent heuristics each mapping market context to
//! a bullish probability in [0, 1] with 0.5 neutral.

use crate::{
    indicators::{lsq_slope, macd, rsi, trend_slope, EPSILON},
    patterns::PatternHit,
    waves::WaveReport,
    Candle, Direction, NewsSignal,
};

/// Sub-weights inside the indicator layer: RSI, MACD, price trend,
/// volume trend.
const INDICATOR_WEIGHTS: [f64; 4] = [0.4, 0.25, 0.2, 0.15];

/// Lookback for the liquidity-sweep check.
const SWEEP_LOOKBACK: usize = 10;

/// One score per layer, aligned with the fusion weights.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LayerScores {
    pub indicator: f64,
    pub pattern: f64,
    pub elliott: f64,
    pub orderflow: f64,
    pub candle_shape: f64,
    pub news: f64,
}

impl LayerScores {
    pub const NEUTRAL: LayerScores = LayerScores {
        indicator: 0.5,
        pattern: 0.5,
        elliott: 0.5,
        orderflow: 0.5,
        candle_shape: 0.5,
        news: 0.5,
    };

    #[inline]
    pub fn as_array(&self) -> [f64; 6] {
        [self.indicator, self.pattern, self.elliott, self.orderflow, self.candle_shape, self.news]
    }
}

/// Score every layer for one analysis pass.
pub fn score_all(
    candles: &[Candle],
    hits: &[PatternHit],
    report: &WaveReport,
    news_signal: Option<&NewsSignal>,
) -> LayerScores {
    LayerScores {
        indicator: indicator(candles),
        pattern: pattern(hits),
        elliott: elliott(report),
        orderflow: orderflow(candles),
        candle_shape: candle_shape(candles),
        news: news(news_signal),
    }
}

// ============================================================
// INDICATOR LAYER
// ============================================================

/// Blend of normalized RSI, MACD histogram sign, price trend and volume
/// trend.
pub fn indicator(candles: &[Candle]) -> f64 {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

    let rsi_score = rsi(&closes, 14).last().map(|r| r / 100.0).unwrap_or(0.5);

    let macd_score = match macd(&closes).last_histogram() {
        Some(h) if h > EPSILON => 0.7,
        Some(h) if h < -EPSILON => 0.3,
        _ => 0.5,
    };

    let trend_score = 0.5 + (trend_slope(candles, 20) * 100.0).clamp(-0.5, 0.5);
    let volume_score = 0.5 + (volume_trend(candles, 20) * 10.0).clamp(-0.5, 0.5);

    let [w_rsi, w_macd, w_trend, w_vol] = INDICATOR_WEIGHTS;
    (rsi_score * w_rsi + macd_score * w_macd + trend_score * w_trend + volume_score * w_vol)
        .clamp(0.0, 1.0)
}

/// Per-bar volume slope over the trailing window, relative to mean
/// volume. Neutral 0.0 on short or zero-volume input.
fn volume_trend(candles: &[Candle], window: usize) -> f64 {
    if candles.len() < 2 || window < 2 {
        return 0.0;
    }
    let start = candles.len().saturating_sub(window);
    let points: Vec<(f64, f64)> =
        candles[start..].iter().enumerate().map(|(i, c)| (i as f64, c.volume)).collect();

    let mean = points.iter().map(|p| p.1).sum::<f64>() / points.len() as f64;
    if mean.abs() < EPSILON {
        return 0.0;
    }
    lsq_slope(&points) / mean
}

// ============================================================
// ORDERFLOW LAYER
// ============================================================

/// Volume-weighted last-candle delta, tanh-compressed, with a
/// liquidity-sweep adjustment.
pub fn orderflow(candles: &[Candle]) -> f64 {
    let Some(last) = candles.last() else {
        return 0.5;
    };
    let range = last.range();
    if range < EPSILON {
        return 0.5;
    }

    let start = candles.len().saturating_sub(21);
    let prior = &candles[start..candles.len() - 1];
    let avg_volume = if prior.is_empty() {
        last.volume
    } else {
        prior.iter().map(|c| c.volume).sum::<f64>() / prior.len() as f64
    };
    let vol_weight = if avg_volume < EPSILON { 1.0 } else { last.volume / avg_volume };

    let delta = (last.close - last.open) / range;
    let mut score = 0.5 + 0.35 * (delta * vol_weight).tanh();

    score += sweep_adjustment(candles);
    score.clamp(0.0, 1.0)
}

/// A poke beyond the recent extreme that closes back inside reads as a
/// sweep against the poke direction.
fn sweep_adjustment(candles: &[Candle]) -> f64 {
    if candles.len() < SWEEP_LOOKBACK + 1 {
        return 0.0;
    }
    let last = &candles[candles.len() - 1];
    let prior = &candles[candles.len() - 1 - SWEEP_LOOKBACK..candles.len() - 1];

    let prior_high = prior.iter().map(|c| c.high).fold(f64::MIN, f64::max);
    let prior_low = prior.iter().map(|c| c.low).fold(f64::MAX, f64::min);

    if last.high > prior_high && last.close < prior_high {
        return -0.2;
    }
    if last.low < prior_low && last.close > prior_low {
        return 0.2;
    }
    0.0
}

// ============================================================
// PATTERN LAYER
// ============================================================

/// Confidence-weighted net bullish lean of the detected patterns.
pub fn pattern(hits: &[PatternHit]) -> f64 {
    if hits.is_empty() {
        return 0.5;
    }

    let net: f64 = hits
        .iter()
        .map(|h| {
            let weight = h.confidence as f64 / 100.0;
            match h.side {
                Direction::Bullish => weight,
                Direction::Bearish => -weight,
                Direction::Neutral => 0.0,
            }
        })
        .sum();

    0.5 + 0.5 * (net / hits.len() as f64).clamp(-1.0, 1.0)
}

// ============================================================
// ELLIOTT LAYER
// ============================================================

/// Wave sentiment mapped into [0, 1]; a high-quality impulse pushes the
/// score further from neutral.
pub fn elliott(report: &WaveReport) -> f64 {
    let boost = match &report.impulse {
        Some(impulse) if impulse.quality >= 70.0 => 1.25,
        _ => 1.0,
    };
    (0.5 + 0.5 * report.sentiment * boost).clamp(0.0, 1.0)
}

// ============================================================
// CANDLE SHAPE LAYER
// ============================================================

/// Body/wick heuristic over the last candle, amplified on a volume
/// spike.
pub fn candle_shape(candles: &[Candle]) -> f64 {
    let Some(last) = candles.last() else {
        return 0.5;
    };
    let range = last.range();
    if range < EPSILON {
        return 0.5;
    }

    let body = last.body();
    let mut push = (last.close - last.open) / range * 0.15;

    // Hammer-like rejection wicks override the raw body direction.
    if last.lower_wick() > 2.0 * body && last.upper_wick() < body {
        push = 0.1;
    } else if last.upper_wick() > 2.0 * body && last.lower_wick() < body {
        push = -0.1;
    }

    let start = candles.len().saturating_sub(21);
    let prior = &candles[start..candles.len() - 1];
    if !prior.is_empty() {
        let avg_volume = prior.iter().map(|c| c.volume).sum::<f64>() / prior.len() as f64;
        if avg_volume > EPSILON && last.volume > 1.5 * avg_volume {
            push *= 1.5;
        }
    }

    (0.5 + push).clamp(0.0, 1.0)
}

// ============================================================
// NEWS LAYER
// ============================================================

/// Externally supplied sentiment, neutral when absent.
pub fn news(signal: Option<&NewsSignal>) -> f64 {
    signal.map(|s| s.sentiment.clamp(0.0, 1.0)).unwrap_or(0.5)
}

// ============================================================
// TESTS
// ============================================================
