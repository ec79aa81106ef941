//! Reversal pattern detectors: double top/bottom and head & shoulders.

use super::{Pattern, PatternHit};
use crate::{config::AnalyzerConfig, indicators::EPSILON, pivots::Pivot, Direction};

/// Double tops (H-L-H) and double bottoms (L-H-L) over consecutive
/// pivot triples.
///
/// The two outer extremes must be symmetric: `1 - |p1 - p2| / avg >=
/// double_top_symmetry`. The neckline sits at the inner pivot; the target
/// is a measured move from the neckline using the more extreme outer
/// pivot.
pub fn double_tops_and_bottoms(pivots: &[Pivot], config: &AnalyzerConfig) -> Vec<PatternHit> {
    let mut hits = Vec::new();

    for w in pivots.windows(3) {
        let (a, b, c) = (&w[0], &w[1], &w[2]);

        let top = a.is_high() && b.is_low() && c.is_high();
        let bottom = a.is_low() && b.is_high() && c.is_low();
        if !top && !bottom {
            continue;
        }

        let avg = (a.price + c.price) / 2.0;
        if avg.abs() < EPSILON {
            continue;
        }
        let symmetry = 1.0 - (a.price - c.price).abs() / avg.abs();
        if symmetry < config.double_top_symmetry {
            continue;
        }

        let neckline = b.price;
        let span = 1.0 - config.double_top_symmetry;
        let excess = if span < EPSILON { 1.0 } else { (symmetry - config.double_top_symmetry) / span };
        let confidence = (55.0 + excess.clamp(0.0, 1.0) * 35.0).round() as u8;

        let hit = if top {
            let outer = a.price.max(c.price);
            PatternHit {
                pattern: Pattern::DoubleTop { peaks: [*a, *c], neckline },
                side: Direction::Bearish,
                target: Some(neckline - (outer - neckline)),
                confidence,
                start_index: a.index,
                end_index: c.index,
            }
        } else {
            let outer = a.price.min(c.price);
            PatternHit {
                pattern: Pattern::DoubleBottom { troughs: [*a, *c], neckline },
                side: Direction::Bullish,
                target: Some(neckline + (neckline - outer)),
                confidence,
                start_index: a.index,
                end_index: c.index,
            }
        };
        hits.push(hit);
    }

    hits
}

/// Head & shoulders (H-L-H-L-H with the middle high most extreme) and its
/// inverse. Neckline = mean of the two inner opposite pivots; target is the
/// head-to-neckline distance measured from the neckline.
pub fn head_and_shoulders(pivots: &[Pivot]) -> Vec<PatternHit> {
    let mut hits = Vec::new();

    for w in pivots.windows(5) {
        let (s1, t1, head, t2, s2) = (&w[0], &w[1], &w[2], &w[3], &w[4]);

        let regular = s1.is_high()
            && t1.is_low()
            && head.is_high()
            && t2.is_low()
            && s2.is_high()
            && head.price > s1.price
            && head.price > s2.price;
        let inverse = s1.is_low()
            && t1.is_high()
            && head.is_low()
            && t2.is_high()
            && s2.is_low()
            && head.price < s1.price
            && head.price < s2.price;
        if !regular && !inverse {
            continue;
        }

        let neckline = (t1.price + t2.price) / 2.0;
        let shoulder_avg = (s1.price + s2.price) / 2.0;
        let shoulder_symmetry = if shoulder_avg.abs() < EPSILON {
            0.0
        } else {
            (1.0 - (s1.price - s2.price).abs() / shoulder_avg.abs()).max(0.0)
        };
        let confidence = (50.0 + shoulder_symmetry * 40.0).round() as u8;

        let hit = if regular {
            PatternHit {
                pattern: Pattern::HeadAndShoulders { head: *head, shoulders: [*s1, *s2], neckline },
                side: Direction::Bearish,
                target: Some(neckline - (head.price - neckline)),
                confidence,
                start_index: s1.index,
                end_index: s2.index,
            }
        } else {
            PatternHit {
                pattern: Pattern::InverseHeadAndShoulders {
                    head: *head,
                    shoulders: [*s1, *s2],
                    neckline,
                },
                side: Direction::Bullish,
                target: Some(neckline + (neckline - head.price)),
                confidence,
                start_index: s1.index,
                end_index: s2.index,
            }
        };
        hits.push(hit);
    }

    hits
}

// ============================================================
// TESTS
// ============================================================
