//! Elliott-style impulse labeling over 5-pivot windows, with an ABC
//! correction search behind the best impulse.
//!
//! A 5-pivot window holds four waves. Candidates must pass the
//! wave-2-retrace, wave-3-not-shortest and wave-4-overlap rules before
//! scoring; the best scorer above the quality gate becomes the label.

use crate::{
    config::AnalyzerConfig,
    indicators::EPSILON,
    pivots::Pivot,
    Candle, Direction,
};

/// Quality granted to any candidate that passes the hard rules.
const BASE_QUALITY: f64 = 20.0;

/// Sentiment damping applied when a correction follows the impulse.
const CORRECTION_DAMP: f64 = 0.6;

// ============================================================
// WAVE TYPES
// ============================================================

/// A segment between two consecutive pivots.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Wave {
    pub from: Pivot,
    pub to: Pivot,
    pub direction: Direction,
    /// Signed price change from `from` to `to`.
    pub magnitude: f64,
    /// Magnitude as a percentage of the starting price.
    pub percent_magnitude: f64,
}

impl Wave {
    fn between(from: &Pivot, to: &Pivot) -> Self {
        let magnitude = to.price - from.price;
        let direction = if magnitude > 0.0 { Direction::Bullish } else { Direction::Bearish };
        let percent_magnitude =
            if from.price.abs() < EPSILON { 0.0 } else { magnitude / from.price * 100.0 };
        Self { from: *from, to: *to, direction, magnitude, percent_magnitude }
    }

    #[inline]
    pub fn abs_magnitude(&self) -> f64 {
        self.magnitude.abs()
    }
}

/// A scored 5-pivot impulse candidate with its rule-compliance notes.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ImpulseLabel {
    pub waves: [Wave; 4],
    pub direction: Direction,
    /// 0..=99
    pub quality: f64,
    /// Wave-2 retrace as a fraction of wave 1.
    pub wave2_retrace: f64,
    /// Wave-4 intrusion into wave-1 territory, fraction of wave 1.
    pub wave4_overlap: f64,
    /// Wave-3 vs wave-1 volume corroboration, -5..=5.
    pub volume_bias: f64,
    pub start_index: usize,
    pub end_index: usize,
}

/// Three alternating post-impulse pivots.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AbcCorrection {
    pub a: Pivot,
    pub b: Pivot,
    pub c: Pivot,
}

/// Wave-engine output for one analysis pass.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WaveReport {
    pub impulse: Option<ImpulseLabel>,
    pub correction: Option<AbcCorrection>,
    /// -1..=1, sign follows the impulse direction.
    pub sentiment: f64,
    pub data_sufficient: bool,
}

impl WaveReport {
    fn insufficient() -> Self {
        Self { impulse: None, correction: None, sentiment: 0.0, data_sufficient: false }
    }
}

// ============================================================
// LABELING
// ============================================================

fn alternating(window: &[Pivot]) -> bool {
    window.windows(2).all(|w| w[0].kind != w[1].kind)
}

fn avg_volume(candles: &[Candle], from: usize, to: usize) -> f64 {
    let to = to.min(candles.len().saturating_sub(1));
    if from > to {
        return 0.0;
    }
    let slice = &candles[from..=to];
    slice.iter().map(|c| c.volume).sum::<f64>() / slice.len() as f64
}

fn label_window(candles: &[Candle], w: &[Pivot], config: &AnalyzerConfig) -> Option<ImpulseLabel> {
    if !alternating(w) {
        return None;
    }
    let up = w[0].is_low();

    let waves = [
        Wave::between(&w[0], &w[1]),
        Wave::between(&w[1], &w[2]),
        Wave::between(&w[2], &w[3]),
        Wave::between(&w[3], &w[4]),
    ];
    let (w1, w2, w3, w4) = (
        waves[0].abs_magnitude(),
        waves[1].abs_magnitude(),
        waves[2].abs_magnitude(),
        waves[3].abs_magnitude(),
    );
    if w1 < EPSILON {
        return None;
    }

    // Wave 3 must not be the shortest by a clear margin.
    if w3 <= 0.9 * w1.min(w2).min(w4) {
        return None;
    }

    let wave2_retrace = w2 / w1;
    if wave2_retrace > 1.0 {
        return None;
    }

    // Wave 4 must stay out of wave-1 territory, up to the tolerance.
    let intrusion = if up { w[1].price - w[3].price } else { w[3].price - w[1].price };
    let wave4_overlap = (intrusion / w1).max(0.0);
    if wave4_overlap > config.wave4_overlap_tolerance {
        return None;
    }

    let mut quality = BASE_QUALITY;
    if w3 > w1 && w3 > w2 && w3 > w4 {
        quality += 20.0;
    }
    if wave2_retrace < 0.618 {
        quality += 10.0;
    }

    let v1 = avg_volume(candles, waves[0].from.index, waves[0].to.index);
    let v3 = avg_volume(candles, waves[2].from.index, waves[2].to.index);
    let volume_bias =
        if v1 < EPSILON { 0.0 } else { (v3 / v1 - 1.0).clamp(-1.0, 1.0) * 5.0 };
    quality = (quality + volume_bias).clamp(0.0, 99.0);

    Some(ImpulseLabel {
        waves,
        direction: if up { Direction::Bullish } else { Direction::Bearish },
        quality,
        wave2_retrace,
        wave4_overlap,
        volume_bias,
        start_index: w[0].index,
        end_index: w[4].index,
    })
}

fn find_correction(pivots: &[Pivot], after: usize) -> Option<AbcCorrection> {
    let mut picked: Vec<Pivot> = Vec::with_capacity(3);
    for p in &pivots[after..] {
        match picked.last() {
            Some(prev) if prev.kind == p.kind => continue,
            _ => picked.push(*p),
        }
        if picked.len() == 3 {
            return Some(AbcCorrection { a: picked[0], b: picked[1], c: picked[2] });
        }
    }
    None
}

/// Label the best impulse in the pivot sequence and search for a trailing
/// ABC correction. On ties the later window wins.
pub fn analyze(candles: &[Candle], pivots: &[Pivot], config: &AnalyzerConfig) -> WaveReport {
    if candles.len() < config.min_candles {
        return WaveReport::insufficient();
    }

    let mut best: Option<(usize, ImpulseLabel)> = None;
    if pivots.len() >= 5 {
        for (pos, w) in pivots.windows(5).enumerate() {
            let Some(label) = label_window(candles, w, config) else {
                continue;
            };
            if label.quality < config.impulse_min_quality {
                continue;
            }
            let better = best.as_ref().is_none_or(|(_, b)| label.quality >= b.quality);
            if better {
                best = Some((pos, label));
            }
        }
    }

    let Some((pos, impulse)) = best else {
        return WaveReport { impulse: None, correction: None, sentiment: 0.0, data_sufficient: true };
    };

    let correction = find_correction(pivots, pos + 5);

    let sign = match impulse.direction {
        Direction::Bullish => 1.0,
        Direction::Bearish => -1.0,
        Direction::Neutral => 0.0,
    };
    let mut sentiment = sign * impulse.quality / 99.0;
    if correction.is_some() {
        sentiment *= CORRECTION_DAMP;
    }

    WaveReport { impulse: Some(impulse), correction, sentiment, data_sufficient: true }
}

// ============================================================
// TESTS
// ============================================================
