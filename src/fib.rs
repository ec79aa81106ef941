//! Fibonacci retracement and extension levels for a swing range.

use crate::indicators::EPSILON;

/// Standard retracement ratios, shallow to deep.
pub const RETRACEMENT_RATIOS: [f64; 5] = [0.236, 0.382, 0.5, 0.618, 0.786];

/// Standard extension ratios.
pub const EXTENSION_RATIOS: [f64; 3] = [1.272, 1.618, 2.0];

/// Fibonacci levels derived from a swing range. `low <= high` always holds;
/// the constructor orders its arguments.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FibLevels {
    pub low: f64,
    pub high: f64,
    /// `(ratio, price)` pairs; every price lies within `[low, high]`.
    pub retracements: [(f64, f64); 5],
    /// `(ratio, price)` pairs above the swing high.
    pub extensions_up: [(f64, f64); 3],
    /// `(ratio, price)` pairs below the swing low.
    pub extensions_down: [(f64, f64); 3],
}

impl FibLevels {
    /// Build levels from a swing range. Arguments may arrive in either
    /// order; a zero-range swing yields collapsed levels at the same price.
    pub fn from_swing(a: f64, b: f64) -> Self {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        let range = high - low;

        let mut retracements = [(0.0, 0.0); 5];
        for (slot, &ratio) in retracements.iter_mut().zip(&RETRACEMENT_RATIOS) {
            *slot = (ratio, high - range * ratio);
        }

        let mut extensions_up = [(0.0, 0.0); 3];
        let mut extensions_down = [(0.0, 0.0); 3];
        for i in 0..EXTENSION_RATIOS.len() {
            let ratio = EXTENSION_RATIOS[i];
            extensions_up[i] = (ratio, low + range * ratio);
            extensions_down[i] = (ratio, high - range * ratio);
        }

        Self { low, high, retracements, extensions_up, extensions_down }
    }

    #[inline]
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Price of the retracement level closest to the given ratio.
    pub fn retracement(&self, ratio: f64) -> f64 {
        self.retracements
            .iter()
            .min_by(|a, b| (a.0 - ratio).abs().total_cmp(&(b.0 - ratio).abs()))
            .map(|&(_, price)| price)
            .unwrap_or(self.high)
    }

    /// Signed distance of `price` to the level at `ratio`, normalized by the
    /// swing range and clamped to [-1, 1]. Neutral 0.0 for degenerate swings.
    pub fn proximity(&self, price: f64, ratio: f64) -> f64 {
        let range = self.range();
        if range < EPSILON {
            return 0.0;
        }
        ((price - self.retracement(ratio)) / range).clamp(-1.0, 1.0)
    }
}

// ============================================================
// TESTS
// ============================================================
