//! Trend pattern detectors: triangles and channels, built on least-squares
//! fits of the HIGH and LOW pivot subsets.

use super::{Pattern, PatternHit, TriangleKind};
use crate::{
    config::AnalyzerConfig,
    indicators::{lsq_slope, EPSILON},
    pivots::Pivot,
    Direction,
};

/// A slope counts as flat when its magnitude is below this fraction of the
/// opposing slope's magnitude.
const FLAT_SLOPE_RATIO: f64 = 0.25;

/// Maximum trailing pivots considered for the channel fit.
const CHANNEL_MAX_PIVOTS: usize = 60;

fn fit_sides(pivots: &[Pivot]) -> Option<(f64, f64)> {
    let t0 = pivots.first()?.timestamp;
    let highs: Vec<(f64, f64)> = pivots
        .iter()
        .filter(|p| p.is_high())
        .map(|p| ((p.timestamp - t0) as f64, p.price))
        .collect();
    let lows: Vec<(f64, f64)> = pivots
        .iter()
        .filter(|p| p.is_low())
        .map(|p| ((p.timestamp - t0) as f64, p.price))
        .collect();

    if highs.len() < 2 || lows.len() < 2 {
        return None;
    }
    Some((lsq_slope(&highs), lsq_slope(&lows)))
}

fn classify(high_slope: f64, low_slope: f64) -> Option<TriangleKind> {
    let flat_high = high_slope.abs() < low_slope.abs() * FLAT_SLOPE_RATIO;
    let flat_low = low_slope.abs() < high_slope.abs() * FLAT_SLOPE_RATIO;

    if !flat_high && !flat_low && high_slope < 0.0 && low_slope > 0.0 {
        return Some(TriangleKind::Symmetrical);
    }
    if flat_high && low_slope > 0.0 {
        return Some(TriangleKind::Ascending);
    }
    if flat_low && high_slope < 0.0 {
        return Some(TriangleKind::Descending);
    }
    None
}

/// Triangle detection over sliding windows of 6 to 9 pivots. At most one
/// hit per kind is kept, the one ending latest.
pub fn triangles(pivots: &[Pivot]) -> Vec<PatternHit> {
    let mut best: [Option<PatternHit>; 3] = [None, None, None];

    for size in 6..=9usize {
        if pivots.len() < size {
            break;
        }
        for w in pivots.windows(size) {
            let Some((high_slope, low_slope)) = fit_sides(w) else {
                continue;
            };
            let Some(kind) = classify(high_slope, low_slope) else {
                continue;
            };

            let resistance = w.iter().filter(|p| p.is_high()).map(|p| p.price).fold(f64::MIN, f64::max);
            let support = w.iter().filter(|p| p.is_low()).map(|p| p.price).fold(f64::MAX, f64::min);
            let height = resistance - support;

            let (side, target) = match kind {
                TriangleKind::Symmetrical => (Direction::Neutral, None),
                TriangleKind::Ascending => (Direction::Bullish, Some(resistance + height)),
                TriangleKind::Descending => (Direction::Bearish, Some(support - height)),
            };

            let hit = PatternHit {
                pattern: Pattern::Triangle { kind, high_slope, low_slope },
                side,
                target,
                confidence: 55,
                start_index: w[0].index,
                end_index: w[size - 1].index,
            };

            let slot = &mut best[kind as usize];
            let newer = slot.as_ref().is_none_or(|prev| hit.end_index >= prev.end_index);
            if newer {
                *slot = Some(hit);
            }
        }
    }

    best.into_iter().flatten().collect()
}

/// Channel over the trailing pivots (at most 60). Confidence is boosted
/// when the two fitted lines are nearly parallel.
pub fn channel(pivots: &[Pivot], config: &AnalyzerConfig) -> Vec<PatternHit> {
    let start = pivots.len().saturating_sub(CHANNEL_MAX_PIVOTS);
    let window = &pivots[start..];

    let high_count = window.iter().filter(|p| p.is_high()).count();
    let low_count = window.iter().filter(|p| p.is_low()).count();
    if high_count < 3 || low_count < 3 {
        return Vec::new();
    }

    let Some((high_slope, low_slope)) = fit_sides(window) else {
        return Vec::new();
    };

    let mean_mag = (high_slope.abs() + low_slope.abs()) / 2.0;
    let parallel =
        mean_mag > EPSILON && (high_slope - low_slope).abs() < config.channel_parallel_tolerance * mean_mag;

    let side = if high_slope > 0.0 && low_slope > 0.0 {
        Direction::Bullish
    } else if high_slope < 0.0 && low_slope < 0.0 {
        Direction::Bearish
    } else {
        Direction::Neutral
    };

    let confidence = if parallel { 70 } else { 50 };

    vec![PatternHit {
        pattern: Pattern::Channel { high_slope, low_slope, parallel },
        side,
        target: None,
        confidence,
        start_index: window[0].index,
        end_index: window[window.len() - 1].index,
    }]
}

// ============================================================
// TESTS
// ============================================================
