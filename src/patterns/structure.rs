//! Market-structure detectors working directly on candles: order blocks,
//! fair value gaps, stop runs and structure breaks.

use super::{Pattern, PatternHit, StructureBreakKind};
use crate::{config::AnalyzerConfig, indicators::EPSILON, pivots::Pivot, Candle, Direction};

/// Minimum body as a fraction of the open for an order-block candidate.
/// Filters out near-doji candles that pass the body/range test on tiny
/// ranges.
const OB_MIN_BODY_TO_OPEN: f64 = 0.002;

/// A strong directional candle whose move is confirmed two candles later.
/// The candle body becomes the supply/demand zone.
pub fn order_blocks(candles: &[Candle], config: &AnalyzerConfig) -> Vec<PatternHit> {
    let mut hits = Vec::new();
    if candles.len() < 3 {
        return hits;
    }

    for i in 0..candles.len() - 2 {
        let c = &candles[i];
        let range = c.range();
        if range < EPSILON || c.open.abs() < EPSILON {
            continue;
        }
        if c.body() / range <= config.order_block_body_ratio {
            continue;
        }
        if c.body() / c.open.abs() < OB_MIN_BODY_TO_OPEN {
            continue;
        }

        let confirm = &candles[i + 2];
        let (side, confirmed) = if c.is_bullish() {
            (Direction::Bullish, confirm.close > c.close)
        } else {
            (Direction::Bearish, confirm.close < c.close)
        };
        if !confirmed {
            continue;
        }

        hits.push(PatternHit {
            pattern: Pattern::OrderBlock {
                index: i,
                zone_low: c.open.min(c.close),
                zone_high: c.open.max(c.close),
            },
            side,
            target: None,
            confidence: 60,
            start_index: i,
            end_index: i + 2,
        });
    }

    hits
}

/// Three-candle gaps: bullish when candle i+1's low clears candle i-1's
/// high, bearish on the mirror. A strong middle candle body adds
/// confidence.
pub fn fair_value_gaps(candles: &[Candle]) -> Vec<PatternHit> {
    let mut hits = Vec::new();

    for i in 1..candles.len().saturating_sub(1) {
        let prev = &candles[i - 1];
        let mid = &candles[i];
        let next = &candles[i + 1];

        let (side, gap_low, gap_high) = if next.low > prev.high {
            (Direction::Bullish, prev.high, next.low)
        } else if next.high < prev.low {
            (Direction::Bearish, next.high, prev.low)
        } else {
            continue;
        };

        let mid_range = mid.range();
        let strong_mid = mid_range > EPSILON && mid.body() / mid_range > 0.5;
        let confidence = if strong_mid { 65 } else { 55 };

        hits.push(PatternHit {
            pattern: Pattern::FairValueGap { index: i, gap_low, gap_high },
            side,
            target: None,
            confidence,
            start_index: i - 1,
            end_index: i + 1,
        });
    }

    hits
}

/// Swing failure: a pivot breaches the prior same-kind pivot, the breach
/// candle shows a long rejection wick, and the following candle closes
/// back beyond the swept level.
pub fn stop_runs(candles: &[Candle], pivots: &[Pivot], config: &AnalyzerConfig) -> Vec<PatternHit> {
    let mut hits = Vec::new();

    for (later_pos, later) in pivots.iter().enumerate() {
        let Some(prior) = pivots[..later_pos].iter().rev().find(|p| p.kind == later.kind) else {
            continue;
        };
        let Some(breach) = candles.get(later.index) else {
            continue;
        };
        let Some(reclaim) = candles.get(later.index + 1) else {
            continue;
        };

        let body = breach.body().max(EPSILON);
        let (swept, side) = if later.is_high() {
            if later.price <= prior.price
                || reclaim.close >= prior.price
                || breach.upper_wick() < config.sfp_wick_body_ratio * body
            {
                continue;
            }
            (prior, Direction::Bearish)
        } else {
            if later.price >= prior.price
                || reclaim.close <= prior.price
                || breach.lower_wick() < config.sfp_wick_body_ratio * body
            {
                continue;
            }
            (prior, Direction::Bullish)
        };

        hits.push(PatternHit {
            pattern: Pattern::StopRunFailure { swept: *swept, breach_index: later.index },
            side,
            target: None,
            confidence: 65,
            start_index: swept.index,
            end_index: later.index + 1,
        });
    }

    hits
}

/// Break of structure on the last close versus the most recent pivots,
/// plus change-of-character on the trailing 3-pivot sequence.
pub fn structure_breaks(candles: &[Candle], pivots: &[Pivot]) -> Vec<PatternHit> {
    let mut hits = Vec::new();
    let Some(last) = candles.last() else {
        return hits;
    };
    let last_index = candles.len() - 1;

    if let Some(high) = pivots.iter().rev().find(|p| p.is_high()) {
        if last.close > high.price {
            hits.push(PatternHit {
                pattern: Pattern::MarketStructureBreak {
                    kind: StructureBreakKind::BreakOfStructure,
                    level: high.price,
                },
                side: Direction::Bullish,
                target: None,
                confidence: 60,
                start_index: high.index,
                end_index: last_index,
            });
        }
    }
    if let Some(low) = pivots.iter().rev().find(|p| p.is_low()) {
        if last.close < low.price {
            hits.push(PatternHit {
                pattern: Pattern::MarketStructureBreak {
                    kind: StructureBreakKind::BreakOfStructure,
                    level: low.price,
                },
                side: Direction::Bearish,
                target: None,
                confidence: 60,
                start_index: low.index,
                end_index: last_index,
            });
        }
    }

    if pivots.len() >= 3 {
        let w = &pivots[pivots.len() - 3..];
        let (a, b, c) = (&w[0], &w[1], &w[2]);

        // Lower high then a close through the middle low: bearish CHoCH.
        if a.is_high() && b.is_low() && c.is_high() && c.price < a.price && last.close < b.price {
            hits.push(choch(b, last_index, Direction::Bearish));
        }
        // Higher low then a close through the middle high: bullish CHoCH.
        if a.is_low() && b.is_high() && c.is_low() && c.price > a.price && last.close > b.price {
            hits.push(choch(b, last_index, Direction::Bullish));
        }
    }

    hits
}

fn choch(middle: &Pivot, last_index: usize, side: Direction) -> PatternHit {
    PatternHit {
        pattern: Pattern::MarketStructureBreak {
            kind: StructureBreakKind::ChangeOfCharacter,
            level: middle.price,
        },
        side,
        target: None,
        confidence: 65,
        start_index: middle.index,
        end_index: last_index,
    }
}

// ============================================================
// TESTS
// ============================================================
