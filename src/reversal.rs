//! Reversal-risk detector: signed sub-scores over divergence, volume
//! flushes, micro-timeframe slope flips, Elliott exhaustion and news
//! shocks, gated on a combined likelihood.

use crate::{
    config::AnalyzerConfig,
    indicators::{lsq_slope, macd, rsi, trend_slope, EPSILON},
    waves::WaveReport,
    Candle, Direction, NewsImpact, NewsSignal,
};

/// Trailing window for the dominant-trend slope.
const TREND_WINDOW: usize = 20;

/// RSI values inspected for divergence against the price trend.
const DIVERGENCE_TAIL: usize = 5;

/// What pushed the likelihood up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ReversalDriver {
    Divergence,
    VolumeFlush,
    MicroSlopeFlip,
    ElliottExhaustion,
    NewsShock,
}

impl ReversalDriver {
    pub fn label(&self) -> &'static str {
        match self {
            ReversalDriver::Divergence => "divergence",
            ReversalDriver::VolumeFlush => "volume_flush",
            ReversalDriver::MicroSlopeFlip => "micro_slope_flip",
            ReversalDriver::ElliottExhaustion => "elliott_exhaustion",
            ReversalDriver::NewsShock => "news_shock",
        }
    }
}

/// A gated reversal call against the prevailing trend.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ReversalSignal {
    /// Direction the reversal points to, opposite the prevailing trend.
    pub direction: Direction,
    /// 0..=100
    pub likelihood: f64,
    pub drivers: Vec<ReversalDriver>,
}

/// Assess reversal risk. Returns a signal only when the combined
/// likelihood clears the configured gate; a mild score is not a signal.
pub fn assess(
    candles: &[Candle],
    secondary: Option<&[Candle]>,
    report: &WaveReport,
    news: Option<&NewsSignal>,
    config: &AnalyzerConfig,
) -> Option<ReversalSignal> {
    if candles.len() < config.min_candles {
        return None;
    }

    let trend = trend_slope(candles, TREND_WINDOW);
    if trend.abs() < EPSILON {
        return None;
    }
    let uptrend = trend > 0.0;

    let mut score = 0.0;
    let mut drivers = Vec::new();
    let add = |value: f64, driver: ReversalDriver, drivers: &mut Vec<ReversalDriver>| {
        if value > 0.0 {
            drivers.push(driver);
        }
        value
    };

    score += add(divergence_score(candles, uptrend), ReversalDriver::Divergence, &mut drivers);
    score += add(flush_score(candles, uptrend), ReversalDriver::VolumeFlush, &mut drivers);
    score += add(micro_flip_score(secondary, uptrend), ReversalDriver::MicroSlopeFlip, &mut drivers);
    score += add(exhaustion_score(report, uptrend), ReversalDriver::ElliottExhaustion, &mut drivers);
    score += add(news_shock_score(news, uptrend), ReversalDriver::NewsShock, &mut drivers);

    let likelihood = (50.0 + score).clamp(0.0, 100.0);
    if likelihood < config.reversal_gate {
        return None;
    }

    let direction = if uptrend { Direction::Bearish } else { Direction::Bullish };
    log::debug!("reversal signal {:?} at likelihood {:.0}: {:?}", direction, likelihood, drivers);

    Some(ReversalSignal { direction, likelihood, drivers })
}

// ============================================================
// SUB-SCORES
// ============================================================

/// RSI or MACD momentum fading against the price trend: +12. Both
/// confirming the trend: -12.
fn divergence_score(candles: &[Candle], uptrend: bool) -> f64 {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

    let rsi_series = rsi(&closes, 14);
    let rsi_fading = momentum_fading(&rsi_series, uptrend);

    let histogram = macd(&closes).histogram;
    let macd_fading = momentum_fading(&histogram, uptrend);

    match (rsi_fading, macd_fading) {
        (Some(true), _) | (_, Some(true)) => 12.0,
        (Some(false), Some(false)) => -12.0,
        _ => 0.0,
    }
}

/// Slope over the oscillator tail: fading means it leans against the
/// trend direction. None on short series.
fn momentum_fading(series: &[f64], uptrend: bool) -> Option<bool> {
    if series.len() < DIVERGENCE_TAIL {
        return None;
    }
    let tail = &series[series.len() - DIVERGENCE_TAIL..];
    let points: Vec<(f64, f64)> = tail.iter().enumerate().map(|(i, &v)| (i as f64, v)).collect();
    let slope = lsq_slope(&points);
    Some(if uptrend { slope < -EPSILON } else { slope > EPSILON })
}

/// Volume spike with a rejection wick against the trend: +14.
fn flush_score(candles: &[Candle], uptrend: bool) -> f64 {
    let Some(last) = candles.last() else {
        return 0.0;
    };
    let start = candles.len().saturating_sub(21);
    let prior = &candles[start..candles.len() - 1];
    if prior.is_empty() {
        return 0.0;
    }

    let avg_volume = prior.iter().map(|c| c.volume).sum::<f64>() / prior.len() as f64;
    if avg_volume < EPSILON || last.volume < 2.0 * avg_volume {
        return 0.0;
    }

    let body = last.body().max(EPSILON);
    let rejecting =
        if uptrend { last.upper_wick() > 1.5 * body } else { last.lower_wick() > 1.5 * body };
    if rejecting { 14.0 } else { 0.0 }
}

/// Micro-timeframe slope opposing the dominant trend: +8. Agreeing: -8.
fn micro_flip_score(secondary: Option<&[Candle]>, uptrend: bool) -> f64 {
    let Some(micro) = secondary else {
        return 0.0;
    };
    let slope = trend_slope(micro, TREND_WINDOW);
    if slope.abs() < EPSILON {
        return 0.0;
    }
    let opposing = if uptrend { slope < 0.0 } else { slope > 0.0 };
    if opposing { 8.0 } else { -8.0 }
}

/// A mature impulse stretched with the trend reads as exhaustion: +12.
/// A strong impulse against the trend argues continuation risk instead:
/// -12.
fn exhaustion_score(report: &WaveReport, uptrend: bool) -> f64 {
    let Some(impulse) = &report.impulse else {
        return 0.0;
    };
    if report.sentiment.abs() <= 0.6 || impulse.quality < 50.0 {
        return 0.0;
    }
    let aligned = (report.sentiment > 0.0) == uptrend;
    if aligned { 12.0 } else { -12.0 }
}

/// High-impact news opposing the trend: +14. High-impact news backing
/// it: -14.
fn news_shock_score(news: Option<&NewsSignal>, uptrend: bool) -> f64 {
    let Some(signal) = news else {
        return 0.0;
    };
    if signal.impact != NewsImpact::High {
        return 0.0;
    }
    if uptrend {
        if signal.sentiment < 0.35 {
            return 14.0;
        }
        if signal.sentiment > 0.65 {
            return -14.0;
        }
    } else {
        if signal.sentiment > 0.65 {
            return 14.0;
        }
        if signal.sentiment < 0.35 {
            return -14.0;
        }
    }
    0.0
}

// ============================================================
// TESTS
// ============================================================
