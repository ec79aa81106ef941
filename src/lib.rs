//! # Swingcast - layered trading-signal engine
//!
//! Multi-layer technical analysis over OHLCV candle series: swing pivots,
//! chart patterns, Elliott-wave labeling, Fibonacci targets, six heuristic
//! layer scorers fused by adaptive weights, and an online logistic model
//! blended on top. Synchronous and free of I/O; callers fetch candles and
//! news sentiment, the engine turns them into a structured analysis.
//!
//! ## Quick Start
//!
//! ```rust
//! use swingcast::prelude::*;
//!
//! let candles: Vec<Candle> = (0..60)
//!     .map(|i| Candle {
//!         timestamp: i as i64 * 60,
//!         open: 100.0 + i as f64,
//!         high: 101.0 + i as f64,
//!         low: 99.5 + i as f64,
//!         close: 100.5 + i as f64,
//!         volume: 1_000.0,
//!     })
//!     .collect();
//!
//! let analyzer = AnalyzerBuilder::new().build().unwrap();
//! let state = ModelState::default();
//!
//! let analysis = analyzer.analyze(&candles, &MarketInputs::default(), &state).unwrap();
//! assert!(analysis.direction.is_bullish());
//! assert!(analysis.probabilities.bull > analysis.probabilities.bear);
//! ```

pub mod config;
pub mod features;
pub mod fib;
pub mod fusion;
pub mod indicators;
pub mod layers;
pub mod model;
pub mod normalize;
pub mod patterns;
pub mod pivots;
pub mod reversal;
pub mod targets;
pub mod waves;

pub mod prelude {
    pub use crate::{
        // Configuration
        config::{AnalyzerConfig, ParamMeta, ParamType, RiskMode},
        // Fibonacci
        fib::FibLevels,
        // Fusion
        fusion::{FusionWeights, LabeledOutcome},
        // Layers
        layers::LayerScores,
        // Model
        model::{ModelSnapshot, OnlineModel},
        // Normalization
        normalize::{normalize, normalize_json, RawCandle},
        // Patterns
        patterns::{Pattern, PatternHit},
        // Pivots
        pivots::{Pivot, PivotDetector, PivotKind},
        // Reversal
        reversal::{ReversalDriver, ReversalSignal},
        // Targets
        targets::{TargetPlan, TargetSource},
        // Waves
        waves::{ImpulseLabel, WaveReport},
        // Parallel
        analyze_parallel,
        // Engine
        AnalysisResult,
        Analyzer,
        AnalyzerBuilder,
        // Types
        Candle,
        Direction,
        FusionSnapshot,
        MarketInputs,
        ModelState,
        NewsImpact,
        NewsSignal,
        Probabilities,
        Probability,
        // Errors
        Result,
        SignalError,
        StateSnapshot,
        SymbolAnalysis,
        SymbolSkip,
    };
}

use std::collections::BTreeMap;
use std::io;

use rayon::prelude::*;

use crate::config::AnalyzerConfig;
use crate::fib::FibLevels;
use crate::fusion::{FusionWeights, LabeledOutcome};
use crate::indicators::EPSILON;
use crate::layers::LayerScores;
use crate::model::{ModelSnapshot, OnlineModel};
use crate::patterns::PatternHit;
use crate::pivots::PivotDetector;
use crate::reversal::ReversalSignal;
use crate::targets::TargetPlan;
use crate::waves::WaveReport;

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, SignalError>;

/// Errors surfaced by construction, validation and persistence.
///
/// The analysis pipeline itself soft-fails: detectors return empty
/// collections and degenerate arithmetic yields neutral scores, so
/// [`Analyzer::analyze`] only errors when candle validation is enabled.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SignalError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Insufficient data: need {need} candles, got {got}")]
    InsufficientData { need: usize, got: usize },

    #[error("Invalid candle at index {index}: {reason}")]
    InvalidCandle { index: usize, reason: &'static str },

    #[error("Feature schema mismatch: expected {expected}, got {got}")]
    SchemaMismatch { expected: usize, got: usize },

    #[error("Snapshot error: {0}")]
    Snapshot(String),
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Normalized value in range 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Probability(f64);

impl Probability {
    /// Create a new Probability, validating the value is in [0.0, 1.0]
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(SignalError::InvalidValue("Probability cannot be NaN or infinite"));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(SignalError::OutOfRange { field: "Probability", value, min: 0.0, max: 1.0 });
        }
        Ok(Self(value))
    }

    /// Create a Probability from a compile-time constant (library internal use)
    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl serde::Serialize for Probability {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Probability {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Probability::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// CANDLE
// ============================================================

/// One canonical OHLCV candle. Produced by [`normalize`](crate::normalize)
/// from loosely shaped upstream records.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Candle {
    /// Seconds (or any monotone unit) since the feed's epoch.
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    #[inline]
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    #[inline]
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    #[inline]
    pub fn upper_wick(&self) -> f64 {
        self.high - self.open.max(self.close)
    }

    #[inline]
    pub fn lower_wick(&self) -> f64 {
        self.open.min(self.close) - self.low
    }

    #[inline]
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    #[inline]
    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// Body as ratio of range. Returns None if range ≈ 0
    #[inline]
    pub fn body_ratio(&self) -> Option<f64> {
        let range = self.range();
        (range > f64::EPSILON).then(|| self.body() / range)
    }

    /// Structural problem with this candle, if any.
    pub fn flaw(&self) -> Option<&'static str> {
        let fields = [self.open, self.high, self.low, self.close, self.volume];
        if fields.iter().any(|v| !v.is_finite()) {
            return Some("non-finite field");
        }
        if self.high < self.low {
            return Some("high below low");
        }
        if self.volume < 0.0 {
            return Some("negative volume");
        }
        None
    }
}

// ============================================================
// MARKET TYPES
// ============================================================

/// Directional bias of a signal or pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Direction {
    Bullish,
    Neutral,
    Bearish,
}

impl Direction {
    #[inline]
    pub fn is_bullish(self) -> bool {
        matches!(self, Direction::Bullish)
    }

    #[inline]
    pub fn is_bearish(self) -> bool {
        matches!(self, Direction::Bearish)
    }

    pub fn label(self) -> &'static str {
        match self {
            Direction::Bullish => "bullish",
            Direction::Neutral => "neutral",
            Direction::Bearish => "bearish",
        }
    }
}

/// Impact tier of a news event
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum NewsImpact {
    Low,
    Moderate,
    High,
}

/// Externally supplied news sentiment for one analysis pass.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NewsSignal {
    /// 0..=1, 0.5 neutral.
    pub sentiment: f64,
    pub impact: NewsImpact,
}

/// Side inputs gathered by the caller before analysis. Data acquisition
/// and its async plumbing stay outside the crate.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MarketInputs {
    pub news: Option<NewsSignal>,
    /// Secondary candle series keyed by timeframe name.
    pub secondary: BTreeMap<String, Vec<Candle>>,
}

impl MarketInputs {
    /// The finest-grained secondary series, judged by average candle
    /// spacing. Series with fewer than two candles are ignored.
    pub fn micro_series(&self) -> Option<&[Candle]> {
        self.secondary
            .values()
            .filter(|series| series.len() >= 2)
            .min_by(|a, b| {
                avg_spacing(a).partial_cmp(&avg_spacing(b)).unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(Vec::as_slice)
    }
}

fn avg_spacing(candles: &[Candle]) -> f64 {
    let first = candles[0].timestamp;
    let last = candles[candles.len() - 1].timestamp;
    (last - first) as f64 / (candles.len() - 1) as f64
}

// ============================================================
// MODEL STATE
// ============================================================

/// Fusion-weight snapshot format version. Older snapshots are discarded
/// on load.
pub const FUSION_SNAPSHOT_VERSION: u32 = 1;

/// Fusion learning rate applied by [`ModelState::observe`].
const FUSION_TUNE_RATE: f64 = 0.02;

/// Versioned persistence wrapper for the fusion weights.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FusionSnapshot {
    pub version: u32,
    pub weights: FusionWeights,
}

/// Combined persistence snapshot of the learned state.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StateSnapshot {
    pub model: ModelSnapshot,
    pub fusion: FusionSnapshot,
}

/// The learned half of the engine: the online model and the adaptive
/// fusion weights. Owned by the caller and injected into every
/// [`Analyzer::analyze`] call; training is a `&mut` operation so one
/// writer at a time is enforced by the borrow checker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelState {
    pub model: OnlineModel,
    pub fusion: FusionWeights,
}

impl ModelState {
    /// Restore from optional snapshots; `None` (or a stale version)
    /// yields fresh untrained state for that half.
    pub fn from_snapshots(model: Option<ModelSnapshot>, fusion: Option<FusionSnapshot>) -> Self {
        let model = model.map(OnlineModel::from_snapshot).unwrap_or_default();
        let fusion = fusion
            .and_then(|snapshot| {
                if snapshot.version != FUSION_SNAPSHOT_VERSION {
                    log::warn!("discarding fusion snapshot (version {})", snapshot.version);
                    return None;
                }
                let mut weights = snapshot.weights;
                weights.normalize();
                Some(weights)
            })
            .unwrap_or_default();
        Self { model, fusion }
    }

    /// One SGD step on the online model.
    pub fn train(&mut self, features: &[f64], label: f64) {
        self.model.train(features, label);
    }

    /// Adaptive fusion-weight update from labeled outcomes.
    pub fn tune_fusion(&mut self, samples: &[LabeledOutcome], learning_rate: f64) {
        self.fusion.tune(samples, learning_rate);
    }

    /// Fold one realized outcome back into both the model and the
    /// fusion weights.
    pub fn observe(&mut self, analysis: &AnalysisResult, label: f64) {
        self.model.train(&analysis.features, label);
        self.fusion.tune(
            &[LabeledOutcome {
                label,
                predicted: analysis.fused_probability,
                contributions: analysis.layer_scores,
            }],
            FUSION_TUNE_RATE,
        );
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            model: self.model.snapshot(),
            fusion: FusionSnapshot { version: FUSION_SNAPSHOT_VERSION, weights: self.fusion },
        }
    }

    /// Serialize the learned state as JSON to a writer.
    pub fn save_to<W: io::Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer(writer, &self.snapshot())
            .map_err(|e| SignalError::Snapshot(e.to_string()))
    }

    /// Restore the learned state from a JSON reader. Unparseable input
    /// is a [`SignalError::Snapshot`]; an internally inconsistent model
    /// snapshot is a [`SignalError::SchemaMismatch`].
    pub fn load_from<R: io::Read>(reader: R) -> Result<Self> {
        let snapshot: StateSnapshot =
            serde_json::from_reader(reader).map_err(|e| SignalError::Snapshot(e.to_string()))?;
        if snapshot.model.weights.len() != snapshot.model.dimension {
            return Err(SignalError::SchemaMismatch {
                expected: snapshot.model.dimension,
                got: snapshot.model.weights.len(),
            });
        }
        Ok(Self::from_snapshots(Some(snapshot.model), Some(snapshot.fusion)))
    }
}

// ============================================================
// ANALYSIS RESULT
// ============================================================

/// Blended-probability gates for calling a direction.
const BULLISH_GATE: f64 = 0.55;
const BEARISH_GATE: f64 = 0.45;

/// Probability mass reserved for the neutral bucket when the blended
/// probability sits exactly at 0.5.
const NEUTRAL_SHARE: f64 = 30.0;

/// Layer names in [`LayerScores::as_array`] order, for explanations.
const LAYER_NAMES: [&str; 6] =
    ["indicator", "pattern", "elliott", "orderflow", "candle_shape", "news"];

/// Bull/bear/neutral percentages, always summing to 100.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Probabilities {
    pub bull: f64,
    pub bear: f64,
    pub neutral: f64,
}

impl Probabilities {
    /// Split 100 points between bull, bear and neutral. The neutral
    /// share shrinks as the blended probability moves away from 0.5.
    pub fn from_blended(blended: f64) -> Self {
        let blended = blended.clamp(0.0, 1.0);
        let certainty = (blended - 0.5).abs() * 2.0;
        let neutral = (1.0 - certainty) * NEUTRAL_SHARE;
        let bull = blended * (100.0 - neutral);
        let bear = 100.0 - neutral - bull;
        Self { bull, bear, neutral }
    }

    #[inline]
    pub fn sum(&self) -> f64 {
        self.bull + self.bear + self.neutral
    }
}

/// Full output of one analysis pass. Structurally valid even on
/// insufficient data, so consumers never null-check the top level.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AnalysisResult {
    pub direction: Direction,
    pub probabilities: Probabilities,
    /// Weighted rule-layer combination, before the model blend.
    pub fused_probability: f64,
    /// The online model's own prediction.
    pub model_probability: f64,
    /// Final probability after blending rules with the model.
    pub blended_probability: f64,
    pub layer_scores: LayerScores,
    pub patterns: Vec<PatternHit>,
    pub waves: WaveReport,
    /// None when the swing window has no usable range.
    pub fib: Option<FibLevels>,
    pub plan: Option<TargetPlan>,
    pub reversal: Option<ReversalSignal>,
    /// Feature vector the model saw, kept for outcome feedback.
    pub features: Vec<f64>,
    pub explanation: String,
    /// 0..=100, distance of the blended probability from neutral.
    pub confidence: u8,
}

fn direction_from(blended: f64) -> Direction {
    if blended >= BULLISH_GATE {
        Direction::Bullish
    } else if blended <= BEARISH_GATE {
        Direction::Bearish
    } else {
        Direction::Neutral
    }
}

fn explain(
    direction: Direction,
    probabilities: &Probabilities,
    scores: &LayerScores,
    hits: &[PatternHit],
    plan: Option<&TargetPlan>,
    reversal: Option<&ReversalSignal>,
) -> String {
    let mut parts = vec![format!(
        "{} (bull {:.0} / bear {:.0} / neutral {:.0})",
        direction.label(),
        probabilities.bull,
        probabilities.bear,
        probabilities.neutral
    )];

    let mut lead = ("", 0.5_f64);
    for (name, value) in LAYER_NAMES.iter().zip(scores.as_array()) {
        if (value - 0.5).abs() > (lead.1 - 0.5).abs() {
            lead = (name, value);
        }
    }
    if (lead.1 - 0.5).abs() > 0.05 {
        parts.push(format!("led by {} at {:.2}", lead.0, lead.1));
    }

    if let Some(best) = hits.iter().max_by_key(|h| h.confidence) {
        parts.push(format!("{} patterns, strongest {}", hits.len(), best.pattern.name()));
    }

    if let Some(plan) = plan {
        parts.push(format!(
            "target {:.4} stop {:.4} rr {:.2}",
            plan.target, plan.stop, plan.reward_risk
        ));
    }

    if let Some(signal) = reversal {
        let drivers: Vec<&str> = signal.drivers.iter().map(|d| d.label()).collect();
        parts.push(format!("reversal risk {:.0} ({})", signal.likelihood, drivers.join(", ")));
    }

    parts.join("; ")
}

// ============================================================
// ANALYZER
// ============================================================

/// The analysis engine. Holds configuration and the pivot detector;
/// learned state is injected per call via [`ModelState`].
#[derive(Debug, Clone)]
pub struct Analyzer {
    config: AnalyzerConfig,
    detector: PivotDetector,
    min_confidence: Option<Probability>,
    validate_candles: bool,
}

/// Builder for [`Analyzer`]
#[derive(Debug, Clone, Default)]
pub struct AnalyzerBuilder {
    config: AnalyzerConfig,
    min_confidence: Option<Probability>,
    validate_candles: bool,
}

impl AnalyzerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: AnalyzerConfig) -> Self {
        self.config = config;
        self
    }

    /// Drop pattern hits below this confidence before scoring.
    pub fn min_confidence(mut self, min: Probability) -> Self {
        self.min_confidence = Some(min);
        self
    }

    /// Reject series containing malformed candles instead of analyzing
    /// them.
    pub fn validate_candles(mut self, enabled: bool) -> Self {
        self.validate_candles = enabled;
        self
    }

    pub fn build(self) -> Result<Analyzer> {
        self.config.validate()?;
        let detector = PivotDetector::new(
            self.config.pivot_left,
            self.config.pivot_right,
            self.config.pivot_min_move_pct,
        );
        Ok(Analyzer {
            detector,
            config: self.config,
            min_confidence: self.min_confidence,
            validate_candles: self.validate_candles,
        })
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        let config = AnalyzerConfig::default();
        Self {
            detector: PivotDetector::new(
                config.pivot_left,
                config.pivot_right,
                config.pivot_min_move_pct,
            ),
            config,
            min_confidence: None,
            validate_candles: false,
        }
    }
}

impl Analyzer {
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        AnalyzerBuilder::new().config(config).build()
    }

    #[inline]
    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Run the full pipeline over one candle series.
    ///
    /// Fewer candles than the configured minimum yields a neutral,
    /// zero-confidence result rather than an error. The only error path
    /// is a malformed candle with validation enabled.
    pub fn analyze(
        &self,
        candles: &[Candle],
        inputs: &MarketInputs,
        state: &ModelState,
    ) -> Result<AnalysisResult> {
        if self.validate_candles {
            for (index, candle) in candles.iter().enumerate() {
                if let Some(reason) = candle.flaw() {
                    return Err(SignalError::InvalidCandle { index, reason });
                }
            }
        }

        if candles.len() < self.config.min_candles {
            return Ok(self.insufficient(candles, inputs));
        }

        let pivots = self.detector.detect(candles);
        let mut hits = patterns::scan(candles, &pivots, &self.config);
        if let Some(min) = self.min_confidence {
            let floor = (min.get() * 100.0).round() as u8;
            hits.retain(|hit| hit.confidence >= floor);
        }

        let report = waves::analyze(candles, &pivots, &self.config);
        let fib = self.swing_levels(candles);
        let atr = indicators::atr(candles, self.config.atr_period);
        let last = candles[candles.len() - 1];

        let news = inputs.news.as_ref();
        let sentiment = news.map(|n| n.sentiment.clamp(0.0, 1.0)).unwrap_or(0.5);

        let flat = FibLevels::from_swing(last.close, last.close);
        let fib_ref = fib.as_ref().unwrap_or(&flat);

        let features = features::extract(candles, &hits, &report, fib_ref, sentiment);
        let scores = layers::score_all(candles, &hits, &report, news);

        let fused = state.fusion.fuse(&scores);
        let model_probability = state.model.predict(&features);
        let blended_probability = state.model.blend(fused, model_probability);

        let direction = direction_from(blended_probability);
        let candidates = targets::pool_candidates(
            &hits,
            fib_ref,
            candles.len() - 1,
            last.close,
            atr,
            &self.config,
        );
        let plan = targets::choose(direction, last.close, atr, &candidates, &self.config);
        let reversal = reversal::assess(candles, inputs.micro_series(), &report, news, &self.config);

        let probabilities = Probabilities::from_blended(blended_probability);
        let confidence = ((blended_probability - 0.5).abs() * 200.0).round() as u8;
        let explanation =
            explain(direction, &probabilities, &scores, &hits, plan.as_ref(), reversal.as_ref());

        log::debug!(
            "analysis over {} candles: {} patterns, blended {:.3}, {}",
            candles.len(),
            hits.len(),
            blended_probability,
            explanation
        );

        Ok(AnalysisResult {
            direction,
            probabilities,
            fused_probability: fused,
            model_probability,
            blended_probability,
            layer_scores: scores,
            patterns: hits,
            waves: report,
            fib,
            plan,
            reversal,
            features,
            explanation,
            confidence,
        })
    }

    /// Neutral zero-confidence result for series below the candle
    /// minimum.
    fn insufficient(&self, candles: &[Candle], inputs: &MarketInputs) -> AnalysisResult {
        let report = waves::analyze(candles, &[], &self.config);
        let last_close = candles.last().map(|c| c.close).unwrap_or(0.0);
        let flat = FibLevels::from_swing(last_close, last_close);
        let sentiment =
            inputs.news.as_ref().map(|n| n.sentiment.clamp(0.0, 1.0)).unwrap_or(0.5);
        let features = features::extract(candles, &[], &report, &flat, sentiment);

        AnalysisResult {
            direction: Direction::Neutral,
            probabilities: Probabilities::from_blended(0.5),
            fused_probability: 0.5,
            model_probability: 0.5,
            blended_probability: 0.5,
            layer_scores: LayerScores::NEUTRAL,
            patterns: Vec::new(),
            waves: report,
            fib: None,
            plan: None,
            reversal: None,
            features,
            explanation: format!(
                "insufficient_data: need {} candles, got {}",
                self.config.min_candles,
                candles.len()
            ),
            confidence: 0,
        }
    }

    /// Fibonacci levels over the trailing swing window, None when the
    /// window has no usable range.
    fn swing_levels(&self, candles: &[Candle]) -> Option<FibLevels> {
        let start = candles.len().saturating_sub(self.config.swing_window);
        let window = &candles[start..];
        let low = window.iter().map(|c| c.low).fold(f64::MAX, f64::min);
        let high = window.iter().map(|c| c.high).fold(f64::MIN, f64::max);
        (high - low > EPSILON).then(|| FibLevels::from_swing(low, high))
    }
}

// ============================================================
// PARALLEL ANALYSIS
// ============================================================

/// One successfully analyzed instrument from a parallel batch.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SymbolAnalysis {
    pub symbol: String,
    pub analysis: AnalysisResult,
}

/// An instrument skipped during a parallel batch, with the reason.
#[derive(Debug, Clone)]
pub struct SymbolSkip {
    pub symbol: String,
    pub error: SignalError,
}

/// Analyze many instruments in parallel against a shared model state.
///
/// Series below the configured candle minimum are reported as skips
/// instead of producing neutral results, so batch consumers see dead
/// symbols explicitly.
pub fn analyze_parallel(
    analyzer: &Analyzer,
    instruments: &[(&str, &[Candle])],
    state: &ModelState,
) -> (Vec<SymbolAnalysis>, Vec<SymbolSkip>) {
    let inputs = MarketInputs::default();

    let outcomes: Vec<std::result::Result<SymbolAnalysis, SymbolSkip>> = instruments
        .par_iter()
        .map(|&(symbol, candles)| {
            if candles.len() < analyzer.config().min_candles {
                return Err(SymbolSkip {
                    symbol: symbol.to_string(),
                    error: SignalError::InsufficientData {
                        need: analyzer.config().min_candles,
                        got: candles.len(),
                    },
                });
            }
            analyzer
                .analyze(candles, &inputs, state)
                .map(|analysis| SymbolAnalysis { symbol: symbol.to_string(), analysis })
                .map_err(|error| SymbolSkip { symbol: symbol.to_string(), error })
        })
        .collect();

    let mut analyses = Vec::with_capacity(outcomes.len());
    let mut skips = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(analysis) => analyses.push(analysis),
            Err(skip) => skips.push(skip),
        }
    }
    (analyses, skips)
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn rising(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| Candle {
                timestamp: i as i64 * 60,
                open: 100.0 + i as f64,
                high: 101.0 + i as f64,
                low: 99.5 + i as f64,
                close: 100.5 + i as f64,
                volume: 1000.0,
            })
            .collect()
    }

    /// Flat series with one upward gap at index 20, leaving a bullish
    /// fair value gap.
    fn gap_series() -> Vec<Candle> {
        (0..40)
            .map(|i| {
                let close = if i < 20 { 100.0 } else { 106.0 };
                Candle {
                    timestamp: i as i64 * 60,
                    open: close - 0.2,
                    high: close + 0.5,
                    low: close - 0.7,
                    close,
                    volume: 1000.0,
                }
            })
            .collect()
    }

    #[test]
    fn test_probability_rejects_out_of_range() {
        assert!(Probability::new(1.5).is_err());
        assert!(Probability::new(-0.1).is_err());
        assert!(Probability::new(f64::NAN).is_err());
        assert!((Probability::new(0.3).unwrap().get() - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn test_candle_flaw_detection() {
        let good = Candle {
            timestamp: 0,
            open: 100.0,
            high: 101.0,
            low: 99.0,
            close: 100.5,
            volume: 10.0,
        };
        assert!(good.flaw().is_none());

        let inverted = Candle { high: 98.0, ..good };
        assert_eq!(inverted.flaw(), Some("high below low"));

        let nan = Candle { open: f64::NAN, ..good };
        assert_eq!(nan.flaw(), Some("non-finite field"));
    }

    #[test]
    fn test_rising_series_is_bullish() {
        let analyzer = Analyzer::default();
        let state = ModelState::default();

        let analysis =
            analyzer.analyze(&rising(60), &MarketInputs::default(), &state).expect("analysis");

        assert!(analysis.direction.is_bullish());
        assert!(analysis.confidence > 0);
        assert!(analysis.probabilities.bull > analysis.probabilities.bear);
        assert!(analysis.waves.data_sufficient);
        assert!(analysis.fib.is_some());
        assert!(analysis.reversal.is_none());
        assert!(analysis.explanation.contains("bullish"));

        let plan = analysis.plan.expect("target plan");
        assert!(plan.target > 159.5);
        assert!(plan.stop < 159.5);
    }

    #[test]
    fn test_short_series_is_neutral_with_zero_confidence() {
        let analyzer = Analyzer::default();
        let analysis = analyzer
            .analyze(&rising(10), &MarketInputs::default(), &ModelState::default())
            .expect("analysis");

        assert_eq!(analysis.direction, Direction::Neutral);
        assert_eq!(analysis.confidence, 0);
        assert!(analysis.explanation.contains("insufficient_data"));
        assert!(!analysis.waves.data_sufficient);
        assert!(analysis.fib.is_none());
        assert!(analysis.plan.is_none());
        assert!((analysis.probabilities.sum() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_probabilities_sum_to_100() {
        for blended in [0.0, 0.17, 0.45, 0.5, 0.55, 0.83, 1.0] {
            let p = Probabilities::from_blended(blended);
            assert!((p.sum() - 100.0).abs() < 1e-9, "sum for {blended}");
            assert!(p.bull >= 0.0 && p.bear >= 0.0 && p.neutral >= 0.0);
        }

        let certain = Probabilities::from_blended(1.0);
        assert!((certain.bull - 100.0).abs() < 1e-9);
        assert!((certain.neutral).abs() < 1e-9);
    }

    #[test]
    fn test_builder_rejects_bad_config() {
        let config = AnalyzerConfig { pivot_left: 0, ..Default::default() };
        assert!(AnalyzerBuilder::new().config(config).build().is_err());
    }

    #[test]
    fn test_validation_flags_malformed_candle() {
        let mut candles = rising(40);
        candles[5].open = f64::NAN;

        let analyzer = AnalyzerBuilder::new().validate_candles(true).build().unwrap();
        let err = analyzer
            .analyze(&candles, &MarketInputs::default(), &ModelState::default())
            .unwrap_err();
        assert!(matches!(err, SignalError::InvalidCandle { index: 5, .. }));
    }

    #[test]
    fn test_min_confidence_filters_patterns() {
        let candles = gap_series();
        let state = ModelState::default();

        let open = Analyzer::default()
            .analyze(&candles, &MarketInputs::default(), &state)
            .expect("analysis");
        assert!(open.patterns.iter().any(|h| h.pattern.name() == "fair_value_gap"));

        let strict = AnalyzerBuilder::new()
            .min_confidence(Probability::new(1.0).unwrap())
            .build()
            .unwrap();
        let filtered =
            strict.analyze(&candles, &MarketInputs::default(), &state).expect("analysis");
        assert!(filtered.patterns.is_empty());
    }

    #[test]
    fn test_model_state_round_trip() {
        let mut state = ModelState::default();
        state.train(&[0.5, 1.0], 1.0);
        state.train(&[0.2, -1.0], 0.0);

        let mut buffer = Vec::new();
        state.save_to(&mut buffer).expect("save");
        let restored = ModelState::load_from(buffer.as_slice()).expect("load");

        assert_eq!(restored, state);
    }

    #[test]
    fn test_load_rejects_garbage() {
        let err = ModelState::load_from(&b"not json"[..]).unwrap_err();
        assert!(matches!(err, SignalError::Snapshot(_)));
    }

    #[test]
    fn test_from_snapshots_none_is_fresh() {
        let state = ModelState::from_snapshots(None, None);
        assert_eq!(state.model.trained_samples(), 0);
        assert_eq!(state.fusion, FusionWeights::default());
    }

    #[test]
    fn test_observe_updates_model_and_weights() {
        let analyzer = Analyzer::default();
        let mut state = ModelState::default();
        let analysis = analyzer
            .analyze(&rising(60), &MarketInputs::default(), &state)
            .expect("analysis");

        state.observe(&analysis, 1.0);

        assert_eq!(state.model.trained_samples(), 1);
        // The indicator layer leaned bullish and the outcome was
        // bullish, so its weight grows.
        assert!(state.fusion.indicator > FusionWeights::default().indicator);
    }

    #[test]
    fn test_analyze_parallel_partitions_skips() {
        let long = rising(60);
        let short = rising(10);
        let instruments: Vec<(&str, &[Candle])> = vec![("UP", &long), ("SHORT", &short)];

        let (analyses, skips) =
            analyze_parallel(&Analyzer::default(), &instruments, &ModelState::default());

        assert_eq!(analyses.len(), 1);
        assert_eq!(analyses[0].symbol, "UP");
        assert_eq!(skips.len(), 1);
        assert_eq!(skips[0].symbol, "SHORT");
        assert!(matches!(skips[0].error, SignalError::InsufficientData { need: 30, got: 10 }));
    }

    #[test]
    fn test_micro_series_picks_finest_spacing() {
        let coarse: Vec<Candle> = (0..5)
            .map(|i| Candle {
                timestamp: i * 900,
                open: 1.0,
                high: 1.0,
                low: 1.0,
                close: 1.0,
                volume: 0.0,
            })
            .collect();
        let fine: Vec<Candle> = (0..5)
            .map(|i| Candle {
                timestamp: i * 60,
                open: 2.0,
                high: 2.0,
                low: 2.0,
                close: 2.0,
                volume: 0.0,
            })
            .collect();

        let mut inputs = MarketInputs::default();
        inputs.secondary.insert("15m".into(), coarse);
        inputs.secondary.insert("1m".into(), fine);

        let micro = inputs.micro_series().expect("micro series");
        assert!((micro[0].close - 2.0).abs() < f64::EPSILON);
    }
}
