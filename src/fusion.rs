//! Weighted fusion of the layer scores, with adaptive weight tuning
//! from labeled outcomes.

use crate::{indicators::EPSILON, layers::LayerScores};

/// Per-layer clamp applied during adaptive tuning, before
/// renormalization.
const WEIGHT_MIN: f64 = 0.02;
const WEIGHT_MAX: f64 = 0.6;

/// One labeled outcome for adaptive tuning: what the layers said, what
/// the fused prediction was, and what actually happened.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LabeledOutcome {
    /// Realized label: 1.0 bullish, 0.0 bearish, or a soft probability.
    pub label: f64,
    /// Fused probability that was predicted for this sample.
    pub predicted: f64,
    /// The layer scores that produced the prediction.
    pub contributions: LayerScores,
}

/// Named weight per layer, kept normalized to sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FusionWeights {
    pub indicator: f64,
    pub pattern: f64,
    pub elliott: f64,
    pub orderflow: f64,
    pub candle_shape: f64,
    pub news: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            indicator: 0.35,
            pattern: 0.18,
            elliott: 0.15,
            orderflow: 0.12,
            candle_shape: 0.08,
            news: 0.08,
        }
    }
}

impl FusionWeights {
    /// Weights in [`LayerScores::as_array`] order.
    #[inline]
    pub fn as_array(&self) -> [f64; 6] {
        [self.indicator, self.pattern, self.elliott, self.orderflow, self.candle_shape, self.news]
    }

    fn set_from_array(&mut self, w: [f64; 6]) {
        self.indicator = w[0];
        self.pattern = w[1];
        self.elliott = w[2];
        self.orderflow = w[3];
        self.candle_shape = w[4];
        self.news = w[5];
    }

    /// Rescale so the weights sum to 1. Degenerate all-zero weights
    /// reset to the defaults.
    pub fn normalize(&mut self) {
        let sum: f64 = self.as_array().iter().sum();
        if sum < EPSILON {
            *self = Self::default();
            return;
        }
        let mut w = self.as_array();
        for v in &mut w {
            *v /= sum;
        }
        self.set_from_array(w);
    }

    /// Weighted combination of the layer scores into a bullish
    /// probability.
    pub fn fuse(&self, scores: &LayerScores) -> f64 {
        let weights = self.as_array();
        let values = scores.as_array();
        let sum: f64 = weights.iter().sum();
        if sum < EPSILON {
            return 0.5;
        }

        let dot: f64 = weights.iter().zip(&values).map(|(w, v)| w * v).sum();
        (dot / sum).clamp(0.0, 1.0)
    }

    /// Nudge each weight toward layers whose lean agreed with the
    /// realized error direction, clamp per layer, then renormalize.
    pub fn tune(&mut self, samples: &[LabeledOutcome], learning_rate: f64) {
        if samples.is_empty() {
            return;
        }

        let mut w = self.as_array();
        for sample in samples {
            let error = sample.label - sample.predicted;
            let contributions = sample.contributions.as_array();
            for (weight, contribution) in w.iter_mut().zip(&contributions) {
                *weight += learning_rate * error * (contribution - 0.5);
                *weight = weight.clamp(WEIGHT_MIN, WEIGHT_MAX);
            }
        }
        self.set_from_array(w);
        self.normalize();

        log::debug!("fusion weights tuned over {} samples: {:?}", samples.len(), self);
    }
}

// ============================================================
// TESTS
// ============================================================
