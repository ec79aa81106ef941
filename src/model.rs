//! Online logistic model trained by per-sample SGD, blended with the
//! fused rule score by a training-volume-dependent factor.

use serde::{Deserialize, Serialize};

/// Snapshot format version. Older snapshots are discarded on load.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Blend factor bounds: the model starts with this much influence and
/// never takes more than the cap.
const BLEND_FLOOR: f64 = 0.2;
const BLEND_CAP: f64 = 0.6;

/// Sample count at which the log-growth blend factor reaches its cap.
const BLEND_SATURATION: f64 = 500.0;

#[inline]
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Logistic predictor with lazily fixed dimension.
///
/// The dimension locks to the first trained feature vector; a later
/// vector of a different length reinitializes the model. That loses the
/// trained weights, deliberately, instead of mixing incompatible
/// schemas.
#[derive(Debug, Clone, PartialEq)]
pub struct OnlineModel {
    weights: Vec<f64>,
    bias: f64,
    learning_rate: f64,
    trained_samples: u64,
}

impl Default for OnlineModel {
    fn default() -> Self {
        Self::new(0.05)
    }
}

impl OnlineModel {
    pub fn new(learning_rate: f64) -> Self {
        Self { weights: Vec::new(), bias: 0.0, learning_rate, trained_samples: 0 }
    }

    #[inline]
    pub fn trained_samples(&self) -> u64 {
        self.trained_samples
    }

    #[inline]
    pub fn dimension(&self) -> Option<usize> {
        if self.weights.is_empty() { None } else { Some(self.weights.len()) }
    }

    /// Predict the bullish probability for a feature vector. An
    /// untrained model scores `sigmoid(bias)`; a dimension mismatch
    /// scores neutral.
    pub fn predict(&self, features: &[f64]) -> f64 {
        if self.weights.is_empty() {
            return sigmoid(self.bias);
        }
        if features.len() != self.weights.len() {
            return 0.5;
        }

        let dot: f64 = self.weights.iter().zip(features).map(|(w, f)| w * f).sum();
        sigmoid(dot + self.bias)
    }

    /// One SGD step. `label` is 1.0 bullish, 0.0 bearish, or a soft
    /// probability in between.
    pub fn train(&mut self, features: &[f64], label: f64) {
        if features.is_empty() {
            return;
        }
        if !self.weights.is_empty() && features.len() != self.weights.len() {
            log::warn!(
                "feature schema changed from {} to {}, reinitializing model",
                self.weights.len(),
                features.len()
            );
            *self = Self::new(self.learning_rate);
        }
        if self.weights.is_empty() {
            self.weights = vec![0.0; features.len()];
        }

        let error = label - self.predict(features);
        for (w, f) in self.weights.iter_mut().zip(features) {
            *w += self.learning_rate * error * f;
        }
        self.bias += self.learning_rate * error;
        self.trained_samples += 1;
    }

    /// Model influence in the blend, growing logarithmically with
    /// training volume.
    pub fn blend_factor(&self) -> f64 {
        let n = self.trained_samples as f64;
        let growth = (1.0 + n).ln() / (1.0 + BLEND_SATURATION).ln();
        (BLEND_FLOOR + (BLEND_CAP - BLEND_FLOOR) * growth).min(BLEND_CAP)
    }

    /// Blend the fused rule probability with the model's own
    /// prediction.
    pub fn blend(&self, fused: f64, model_prob: f64) -> f64 {
        let factor = self.blend_factor();
        (fused * (1.0 - factor) + model_prob * factor).clamp(0.0, 1.0)
    }

    pub fn snapshot(&self) -> ModelSnapshot {
        ModelSnapshot {
            version: SNAPSHOT_VERSION,
            dimension: self.weights.len(),
            weights: self.weights.clone(),
            bias: self.bias,
            learning_rate: self.learning_rate,
            trained_samples: self.trained_samples,
        }
    }

    /// Restore from a snapshot. Version or shape mismatches yield a
    /// fresh model rather than an error.
    pub fn from_snapshot(snapshot: ModelSnapshot) -> Self {
        if snapshot.version != SNAPSHOT_VERSION || snapshot.weights.len() != snapshot.dimension {
            log::warn!(
                "discarding model snapshot (version {}, dimension {})",
                snapshot.version,
                snapshot.dimension
            );
            return Self::new(snapshot.learning_rate);
        }
        Self {
            weights: snapshot.weights,
            bias: snapshot.bias,
            learning_rate: snapshot.learning_rate,
            trained_samples: snapshot.trained_samples,
        }
    }
}

/// Whole-model persistence snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub version: u32,
    pub dimension: usize,
    pub weights: Vec<f64>,
    pub bias: f64,
    pub learning_rate: f64,
    pub trained_samples: u64,
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic pseudo-random value in [-1, 1].
    fn noise(i: usize, salt: f64) -> f64 {
        ((i as f64 * 12.9898 + salt) * 43758.5453).sin()
    }

    #[test]
    fn test_untrained_prediction_is_sigmoid_bias() {
        let model = OnlineModel::default();
        assert!((model.predict(&[0.0; 24]) - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zero_features_score_sigmoid_bias_after_training() {
        let mut model = OnlineModel::new(0.1);
        model.train(&[1.0, 0.0], 1.0);
        model.train(&[1.0, 0.0], 1.0);

        let expected = sigmoid(model.snapshot().bias);
        assert!((model.predict(&[0.0, 0.0]) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_separable_labels_converge() {
        let mut model = OnlineModel::new(0.1);
        for i in 0..1000 {
            let f0 = noise(i, 0.0);
            let features = [f0, noise(i, 1.0) * 0.1, noise(i, 2.0) * 0.1];
            let label = if f0 > 0.0 { 1.0 } else { 0.0 };
            model.train(&features, label);
        }

        assert!(model.snapshot().weights[0] > 0.0);

        let mut correct = 0;
        for i in 1000..1100 {
            let f0 = noise(i, 0.0);
            let features = [f0, noise(i, 1.0) * 0.1, noise(i, 2.0) * 0.1];
            let predicted_bull = model.predict(&features) > 0.5;
            if predicted_bull == (f0 > 0.0) {
                correct += 1;
            }
        }
        assert!(correct >= 90, "held-out accuracy {correct}/100");
    }

    #[test]
    fn test_dimension_change_reinitializes() {
        let mut model = OnlineModel::new(0.1);
        model.train(&[1.0, 2.0, 3.0], 1.0);
        assert_eq!(model.dimension(), Some(3));

        model.train(&[1.0, 2.0, 3.0, 4.0], 1.0);
        assert_eq!(model.dimension(), Some(4));
        assert_eq!(model.trained_samples(), 1);
    }

    #[test]
    fn test_blend_factor_grows_and_caps() {
        let mut model = OnlineModel::new(0.1);
        let fresh = model.blend_factor();
        assert!((fresh - 0.2).abs() < 1e-9);

        for _ in 0..100 {
            model.train(&[1.0], 1.0);
        }
        let mid = model.blend_factor();
        assert!(mid > fresh);
        assert!(mid < 0.6);

        for _ in 0..10_000 {
            model.train(&[1.0], 1.0);
        }
        assert!((model.blend_factor() - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_blend_weighs_fused_and_model() {
        let model = OnlineModel::default();
        // Fresh model: factor 0.2, so 0.8 * fused + 0.2 * model.
        let blended = model.blend(1.0, 0.0);
        assert!((blended - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut model = OnlineModel::new(0.07);
        for i in 0..50 {
            model.train(&[noise(i, 0.0), noise(i, 1.0)], if i % 2 == 0 { 1.0 } else { 0.0 });
        }

        let json = serde_json::to_string(&model.snapshot()).expect("serialize");
        let snapshot: ModelSnapshot = serde_json::from_str(&json).expect("deserialize");
        let restored = OnlineModel::from_snapshot(snapshot);

        assert_eq!(restored, model);
    }

    #[test]
    fn test_stale_snapshot_yields_fresh_model() {
        let mut snapshot = OnlineModel::default().snapshot();
        snapshot.version = 0;

        let restored = OnlineModel::from_snapshot(snapshot);
        assert_eq!(restored.trained_samples(), 0);
        assert_eq!(restored.dimension(), None);
    }
}
