//! Swing/pivot detection.
//!
//! A pivot is a local extremum confirmed by a symmetric window of
//! non-extreme neighbors, filtered against micro-noise and merged with
//! nearby same-kind pivots keeping the more extreme one.

use crate::Candle;

// ============================================================
// TYPES
// ============================================================

/// Kind of swing point
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PivotKind {
    High,
    Low,
}

/// A confirmed local extremum
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Pivot {
    pub index: usize,
    pub timestamp: i64,
    pub price: f64,
    pub kind: PivotKind,
}

impl Pivot {
    #[inline]
    pub fn is_high(&self) -> bool {
        matches!(self.kind, PivotKind::High)
    }

    #[inline]
    pub fn is_low(&self) -> bool {
        matches!(self.kind, PivotKind::Low)
    }
}

// ============================================================
// DETECTOR
// ============================================================

/// Pivot detector configuration
#[derive(Debug, Clone)]
pub struct PivotDetector {
    /// Candles on the left that must be non-extreme
    pub left: usize,
    /// Candles on the right that must be non-extreme
    pub right: usize,
    /// Minimum relative deviation from the local window average
    pub min_move_pct: f64,
}

impl Default for PivotDetector {
    fn default() -> Self {
        Self { left: 3, right: 3, min_move_pct: 0.001 }
    }
}

impl PivotDetector {
    pub fn new(left: usize, right: usize, min_move_pct: f64) -> Self {
        Self { left, right, min_move_pct }
    }

    /// Detect pivots over a canonical candle series, ordered by index.
    ///
    /// Series shorter than `left + right + 1` yield no pivots.
    pub fn detect(&self, candles: &[Candle]) -> Vec<Pivot> {
        let len = candles.len();
        if len < self.left + self.right + 1 {
            return Vec::new();
        }

        let mut pivots = Vec::new();

        for i in self.left..len - self.right {
            let candle = &candles[i];

            let is_high = candles[i - self.left..i]
                .iter()
                .chain(&candles[i + 1..=i + self.right])
                .all(|c| c.high <= candle.high);
            let is_low = candles[i - self.left..i]
                .iter()
                .chain(&candles[i + 1..=i + self.right])
                .all(|c| c.low >= candle.low);

            let candidate = if is_high {
                Some((candle.high, PivotKind::High))
            } else if is_low {
                Some((candle.low, PivotKind::Low))
            } else {
                None
            };

            let Some((price, kind)) = candidate else {
                continue;
            };

            if !self.clears_noise_floor(candles, i, price) {
                continue;
            }

            self.push_merged(&mut pivots, Pivot {
                index: i,
                timestamp: candle.timestamp,
                price,
                kind,
            });
        }

        pivots
    }

    /// Noise filter: the candidate must deviate from the local window
    /// average close by at least `min_move_pct`.
    fn clears_noise_floor(&self, candles: &[Candle], index: usize, price: f64) -> bool {
        let window = &candles[index - self.left..=index + self.right];
        let avg = window.iter().map(|c| c.close).sum::<f64>() / window.len() as f64;
        if avg.abs() < f64::EPSILON {
            return false;
        }
        (price - avg).abs() / avg.abs() >= self.min_move_pct
    }

    /// Keep-extreme merge: a same-kind pivot within `left` indices of the
    /// previous one replaces it only if more extreme.
    fn push_merged(&self, pivots: &mut Vec<Pivot>, pivot: Pivot) {
        if let Some(last) = pivots.last_mut() {
            if last.kind == pivot.kind && pivot.index - last.index <= self.left {
                let keep_new = match pivot.kind {
                    PivotKind::High => pivot.price >= last.price,
                    PivotKind::Low => pivot.price <= last.price,
                };
                if keep_new {
                    *last = pivot;
                }
                return;
            }
        }
        pivots.push(pivot);
    }
}

// ============================================================
// TESTS
// ============================================================
