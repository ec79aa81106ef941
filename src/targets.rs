//! Target and stop selection: pools candidates from pattern targets,
//! Fibonacci extensions and swing extremes, scores them against the
//! current price and volatility, and pairs the winner with an ATR stop.

use crate::{
    config::AnalyzerConfig,
    fib::FibLevels,
    indicators::EPSILON,
    patterns::PatternHit,
    Direction,
};

/// Confidence assigned to Fibonacci extension candidates.
const FIB_CONFIDENCE: f64 = 0.55;

/// Confidence assigned to swing-extreme candidates.
const SWING_CONFIDENCE: f64 = 0.5;

/// Where a target candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TargetSource {
    Pattern,
    Fibonacci,
    SwingExtreme,
    AtrProjection,
}

/// A pooled target candidate before direction filtering and scoring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetCandidate {
    pub price: f64,
    /// 0..=1
    pub confidence: f64,
    pub source: TargetSource,
}

/// The chosen target/stop pair.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TargetPlan {
    pub target: f64,
    pub stop: f64,
    pub reward_risk: f64,
    pub source: TargetSource,
    /// Confidence of the winning candidate, 0..=1.
    pub confidence: f64,
    /// True when no pooled candidate survived and a bare ATR projection
    /// was used instead.
    pub fallback: bool,
}

// ============================================================
// CANDIDATE POOL
// ============================================================

/// Pool candidates from pattern targets, Fibonacci extensions and the
/// swing extremes, then deduplicate by price bucket keeping the most
/// confident.
pub fn pool_candidates(
    hits: &[PatternHit],
    fib: &FibLevels,
    last_index: usize,
    last_price: f64,
    atr: f64,
    config: &AnalyzerConfig,
) -> Vec<TargetCandidate> {
    let mut pool = Vec::new();

    for hit in hits {
        let Some(target) = hit.target else {
            continue;
        };
        let mut confidence = hit.confidence as f64 / 100.0;
        let age = last_index.saturating_sub(hit.end_index);
        if age > config.max_pattern_age {
            confidence *= 1.0 - config.pattern_age_decay;
        }
        pool.push(TargetCandidate { price: target, confidence, source: TargetSource::Pattern });
    }

    for &(_, price) in fib.extensions_up.iter().chain(&fib.extensions_down) {
        pool.push(TargetCandidate { price, confidence: FIB_CONFIDENCE, source: TargetSource::Fibonacci });
    }

    for price in [fib.low, fib.high] {
        pool.push(TargetCandidate { price, confidence: SWING_CONFIDENCE, source: TargetSource::SwingExtreme });
    }

    dedup_by_bucket(pool, last_price, atr)
}

/// Candidates landing in the same price bucket collapse to the most
/// confident one.
fn dedup_by_bucket(mut pool: Vec<TargetCandidate>, last_price: f64, atr: f64) -> Vec<TargetCandidate> {
    let step = (atr * 0.05).max(last_price.abs() * 1e-4).max(EPSILON);

    pool.sort_by(|a, b| {
        b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<TargetCandidate> = Vec::with_capacity(pool.len());
    let mut seen: Vec<i64> = Vec::with_capacity(pool.len());
    for cand in pool {
        let bucket = (cand.price / step).round() as i64;
        if seen.contains(&bucket) {
            continue;
        }
        seen.push(bucket);
        kept.push(cand);
    }
    kept
}

// ============================================================
// SELECTION
// ============================================================

/// Pick the best candidate in the trade direction, pair it with an ATR
/// stop and sanity-check the reward:risk ratio. Falls back to a pure
/// ATR projection when nothing survives.
pub fn choose(
    direction: Direction,
    last_price: f64,
    atr: f64,
    candidates: &[TargetCandidate],
    config: &AnalyzerConfig,
) -> Option<TargetPlan> {
    if direction == Direction::Neutral || atr < EPSILON || last_price.abs() < EPSILON {
        return None;
    }

    let stop_distance = config.stop_atr_multiple() * atr;
    let stop = match direction {
        Direction::Bullish => last_price - stop_distance,
        _ => last_price + stop_distance,
    };
    let min_distance = (0.6 * atr).max(0.0005 * last_price.abs());

    let mut best: Option<(f64, &TargetCandidate)> = None;
    for cand in candidates {
        let distance = match direction {
            Direction::Bullish => cand.price - last_price,
            _ => last_price - cand.price,
        };
        if distance < min_distance {
            continue;
        }

        let reward_risk = distance / stop_distance;
        if reward_risk <= 0.0 || reward_risk > config.rr_ceiling {
            continue;
        }

        let proximity_decay = 1.0 / (1.0 + distance / (4.0 * atr));
        let vol_factor = if distance <= 6.0 * atr { 1.0 } else { 6.0 * atr / distance };
        let score = cand.confidence * proximity_decay * vol_factor;

        let better = best.as_ref().is_none_or(|(s, _)| score > *s);
        if better {
            best = Some((score, cand));
        }
    }

    if let Some((_, cand)) = best {
        let distance = (cand.price - last_price).abs();
        return Some(TargetPlan {
            target: cand.price,
            stop,
            reward_risk: distance / stop_distance,
            source: cand.source,
            confidence: cand.confidence,
            fallback: false,
        });
    }

    log::debug!(
        "no target candidate survived in {:?} direction, falling back to ATR projection",
        direction
    );
    let target = match direction {
        Direction::Bullish => last_price + 2.0 * atr,
        _ => last_price - 2.0 * atr,
    };
    Some(TargetPlan {
        target,
        stop,
        reward_risk: 2.0 * atr / stop_distance,
        source: TargetSource::AtrProjection,
        confidence: 0.3,
        fallback: true,
    })
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RiskMode;
    use crate::patterns::Pattern;
    use crate::pivots::{Pivot, PivotKind};

    fn hit(target: f64, confidence: u8, end_index: usize) -> PatternHit {
        let peak = Pivot { index: 0, timestamp: 0, price: 100.0, kind: PivotKind::High };
        PatternHit {
            pattern: Pattern::DoubleTop { peaks: [peak, peak], neckline: 0.0 },
            side: Direction::Bearish,
            target: Some(target),
            confidence,
            start_index: 0,
            end_index,
        }
    }

    #[test]
    fn test_pool_includes_all_sources() {
        let fib = FibLevels::from_swing(90.0, 110.0);
        let pool = pool_candidates(&[hit(80.0, 70, 50)], &fib, 55, 100.0, 2.0, &AnalyzerConfig::default());

        assert!(pool.iter().any(|c| c.source == TargetSource::Pattern));
        assert!(pool.iter().any(|c| c.source == TargetSource::Fibonacci));
        assert!(pool.iter().any(|c| c.source == TargetSource::SwingExtreme));
    }

    #[test]
    fn test_old_pattern_confidence_decays() {
        let fib = FibLevels::from_swing(90.0, 110.0);
        let config = AnalyzerConfig::default();
        // end_index 0, last_index 100: well past the age threshold of 40.
        let pool = pool_candidates(&[hit(80.0, 70, 0)], &fib, 100, 100.0, 2.0, &config);

        let pattern = pool.iter().find(|c| c.source == TargetSource::Pattern).expect("pattern");
        assert!((pattern.confidence - 0.7 * 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_duplicate_buckets_keep_most_confident() {
        let cands = vec![
            TargetCandidate { price: 105.0, confidence: 0.5, source: TargetSource::Fibonacci },
            TargetCandidate { price: 105.01, confidence: 0.8, source: TargetSource::Pattern },
        ];
        // Bucket step 0.25 with atr 5.0: both land in the same bucket.
        let kept = dedup_by_bucket(cands, 100.0, 5.0);

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].source, TargetSource::Pattern);
    }

    #[test]
    fn test_bullish_choice_is_above_price() {
        let cands = vec![
            TargetCandidate { price: 108.0, confidence: 0.7, source: TargetSource::Pattern },
            TargetCandidate { price: 92.0, confidence: 0.9, source: TargetSource::Pattern },
        ];
        let plan = choose(Direction::Bullish, 100.0, 2.0, &cands, &AnalyzerConfig::default())
            .expect("plan");

        assert!(!plan.fallback);
        assert!((plan.target - 108.0).abs() < 1e-9);
        assert!(plan.stop < 100.0);
        assert!(plan.reward_risk > 0.0);
    }

    #[test]
    fn test_too_close_target_skipped() {
        // 0.5 away with atr 2.0: under the 0.6*ATR floor.
        let cands =
            vec![TargetCandidate { price: 100.5, confidence: 0.9, source: TargetSource::Pattern }];
        let plan = choose(Direction::Bullish, 100.0, 2.0, &cands, &AnalyzerConfig::default())
            .expect("plan");
        assert!(plan.fallback);
        assert_eq!(plan.source, TargetSource::AtrProjection);
    }

    #[test]
    fn test_absurd_reward_risk_rejected() {
        // 100 away with atr 2.0 and a 2.0 stop distance: rr = 50 > ceiling.
        let cands =
            vec![TargetCandidate { price: 200.0, confidence: 0.9, source: TargetSource::Pattern }];
        let plan = choose(Direction::Bullish, 100.0, 2.0, &cands, &AnalyzerConfig::default())
            .expect("plan");
        assert!(plan.fallback);
    }

    #[test]
    fn test_neutral_direction_has_no_plan() {
        assert!(choose(Direction::Neutral, 100.0, 2.0, &[], &AnalyzerConfig::default()).is_none());
    }

    #[test]
    fn test_aggressive_mode_widens_stop() {
        let cands =
            vec![TargetCandidate { price: 108.0, confidence: 0.7, source: TargetSource::Pattern }];
        let conservative = AnalyzerConfig::default();
        let aggressive = AnalyzerConfig { risk_mode: RiskMode::Aggressive, ..conservative.clone() };

        let c = choose(Direction::Bullish, 100.0, 2.0, &cands, &conservative).expect("plan");
        let a = choose(Direction::Bullish, 100.0, 2.0, &cands, &aggressive).expect("plan");
        assert!(a.stop < c.stop);
    }
}
