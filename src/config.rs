//! Analyzer configuration and parameter metadata
//!
//! The thresholds behind swing detection, pattern geometry and signal gating
//! are empirical. This module exposes them as configurable fields with
//! metadata, enabling:
//! - Grid search optimization
//! - Parameter documentation
//! - Automatic configuration UI generation
//!
//! # Example
//!
//! ```rust
//! use swingcast::config::AnalyzerConfig;
//!
//! for param in AnalyzerConfig::param_meta() {
//!     println!("{}: {:?} (default: {})", param.name, param.param_type, param.default);
//! }
//! ```

use std::collections::HashMap;

use crate::{Result, SignalError};

// ============================================================
// PARAMETER TYPES
// ============================================================

/// Type of parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
  /// Ratio value (0.0..=1.0 typically, but can exceed 1.0 for multipliers)
  Ratio,
  /// Period/count value (positive integer)
  Period,
}

/// Metadata for a single configuration parameter
#[derive(Debug, Clone)]
pub struct ParamMeta {
  /// Parameter name (e.g., "double_top_symmetry")
  pub name: &'static str,
  /// Parameter type (Ratio or Period)
  pub param_type: ParamType,
  /// Default value
  pub default: f64,
  /// Range for optimization: (min, max, step)
  pub range: (f64, f64, f64),
  /// Human-readable description
  pub description: &'static str,
}

impl ParamMeta {
  /// Create a new ParamMeta for a Ratio parameter
  pub const fn ratio(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Ratio, default, range, description }
  }

  /// Create a new ParamMeta for a Period parameter
  pub const fn period(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Period, default, range, description }
  }

  /// Generate all values for grid search
  pub fn generate_grid(&self) -> Vec<f64> {
    let (min, max, step) = self.range;
    let mut values = Vec::new();
    let mut v = min;
    while v <= max + f64::EPSILON {
      values.push(v);
      v += step;
    }
    values
  }

  /// Validate a value for this parameter
  pub fn validate(&self, value: f64) -> Result<()> {
    let (min, max, _) = self.range;
    if value < min || value > max {
      return Err(SignalError::OutOfRange { field: self.name, value, min, max });
    }
    match self.param_type {
      ParamType::Ratio => Ok(()),
      ParamType::Period => {
        if value < 1.0 || value.fract() != 0.0 {
          return Err(SignalError::InvalidValue("Period must be a positive integer"));
        }
        Ok(())
      },
    }
  }
}

// ============================================================
// RISK MODE
// ============================================================

/// Stop-sizing mode: aggressive gives price more room, conservative cuts faster
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RiskMode {
  #[default]
  Conservative,
  Aggressive,
}

// ============================================================
// ANALYZER CONFIG
// ============================================================

/// All tunable thresholds of the analysis pipeline.
///
/// Defaults are empirical. Every field is exposed via [`AnalyzerConfig::param_meta`]
/// so it can be grid-searched instead of trusted blindly.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AnalyzerConfig {
  /// Candles on the left that must be non-extreme for a pivot
  pub pivot_left: usize,
  /// Candles on the right that must be non-extreme for a pivot
  pub pivot_right: usize,
  /// Minimum relative deviation from the local average for a pivot to count
  pub pivot_min_move_pct: f64,
  /// Minimum candle count for full analysis; fewer yields a neutral result
  pub min_candles: usize,
  /// ATR lookback
  pub atr_period: usize,
  /// Trailing window defining the active swing range
  pub swing_window: usize,
  /// Minimum price symmetry of the two extremes of a double top/bottom
  pub double_top_symmetry: f64,
  /// Allowed wave-4 incursion into wave-1 territory, as a fraction of wave 1
  pub wave4_overlap_tolerance: f64,
  /// Minimum impulse quality score to keep a wave label
  pub impulse_min_quality: f64,
  /// Minimum body/range ratio for an order-block candle
  pub order_block_body_ratio: f64,
  /// Minimum wick/body ratio on the breach side of a stop run
  pub sfp_wick_body_ratio: f64,
  /// Maximum |slope difference| / mean |slope| for channel lines to count as parallel
  pub channel_parallel_tolerance: f64,
  /// Pattern age (in candles) beyond which its target confidence is decayed
  pub max_pattern_age: usize,
  /// Confidence decay applied to stale pattern targets
  pub pattern_age_decay: f64,
  /// Reward:risk ratios above this are rejected as unrealistic
  pub rr_ceiling: f64,
  /// Stop-sizing mode
  pub risk_mode: RiskMode,
  /// Stop distance in ATR multiples, conservative mode
  pub stop_atr_conservative: f64,
  /// Stop distance in ATR multiples, aggressive mode
  pub stop_atr_aggressive: f64,
  /// Reversal likelihood gate; below this no reversal signal is emitted
  pub reversal_gate: f64,
}

impl Default for AnalyzerConfig {
  fn default() -> Self {
    Self {
      pivot_left: 3,
      pivot_right: 3,
      pivot_min_move_pct: 0.001,
      min_candles: 30,
      atr_period: 14,
      swing_window: 50,
      double_top_symmetry: 0.82,
      wave4_overlap_tolerance: 0.12,
      impulse_min_quality: 30.0,
      order_block_body_ratio: 0.65,
      sfp_wick_body_ratio: 0.8,
      channel_parallel_tolerance: 0.12,
      max_pattern_age: 40,
      pattern_age_decay: 0.4,
      rr_ceiling: 20.0,
      risk_mode: RiskMode::Conservative,
      stop_atr_conservative: 1.0,
      stop_atr_aggressive: 1.8,
      reversal_gate: 68.0,
    }
  }
}

static PARAMS: [ParamMeta; 16] = [
  ParamMeta::period(
    "pivot_left",
    3.0,
    (1.0, 8.0, 1.0),
    "Candles on the left that must be non-extreme for a pivot",
  ),
  ParamMeta::period(
    "pivot_right",
    3.0,
    (1.0, 8.0, 1.0),
    "Candles on the right that must be non-extreme for a pivot",
  ),
  ParamMeta::ratio(
    "pivot_min_move_pct",
    0.001,
    (0.0, 0.01, 0.001),
    "Minimum relative deviation from the local average for a pivot",
  ),
  ParamMeta::period("min_candles", 30.0, (20.0, 100.0, 10.0), "Minimum candles for full analysis"),
  ParamMeta::period("atr_period", 14.0, (7.0, 28.0, 7.0), "ATR lookback"),
  ParamMeta::period("swing_window", 50.0, (20.0, 120.0, 10.0), "Active swing range window"),
  ParamMeta::ratio(
    "double_top_symmetry",
    0.82,
    (0.7, 0.95, 0.01),
    "Minimum price symmetry of double top/bottom extremes",
  ),
  ParamMeta::ratio(
    "wave4_overlap_tolerance",
    0.12,
    (0.0, 0.3, 0.02),
    "Allowed wave-4 incursion into wave-1 territory",
  ),
  ParamMeta::ratio(
    "impulse_min_quality",
    30.0,
    (0.0, 60.0, 5.0),
    "Minimum impulse quality score to keep a wave label",
  ),
  ParamMeta::ratio(
    "order_block_body_ratio",
    0.65,
    (0.5, 0.9, 0.05),
    "Minimum body/range ratio for an order-block candle",
  ),
  ParamMeta::ratio(
    "sfp_wick_body_ratio",
    0.8,
    (0.5, 2.0, 0.1),
    "Minimum wick/body ratio on the breach side of a stop run",
  ),
  ParamMeta::ratio(
    "channel_parallel_tolerance",
    0.12,
    (0.05, 0.3, 0.01),
    "Maximum slope divergence for parallel channel lines",
  ),
  ParamMeta::period(
    "max_pattern_age",
    40.0,
    (10.0, 100.0, 10.0),
    "Pattern age beyond which its target confidence is decayed",
  ),
  ParamMeta::ratio(
    "pattern_age_decay",
    0.4,
    (0.0, 0.8, 0.1),
    "Confidence decay applied to stale pattern targets",
  ),
  ParamMeta::ratio("rr_ceiling", 20.0, (5.0, 25.0, 5.0), "Maximum accepted reward:risk ratio"),
  ParamMeta::ratio(
    "reversal_gate",
    68.0,
    (50.0, 90.0, 2.0),
    "Reversal likelihood gate for signal emission",
  ),
];

impl AnalyzerConfig {
  /// Returns metadata for all grid-searchable parameters
  pub fn param_meta() -> &'static [ParamMeta] {
    &PARAMS
  }

  /// Creates a config with parameters from a HashMap.
  ///
  /// Missing parameters use their default values. `risk_mode` and the stop
  /// ATR multiples are not grid-searchable and keep their defaults.
  pub fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
    let mut cfg = Self::default();
    for meta in Self::param_meta() {
      if let Some(&value) = params.get(meta.name) {
        meta.validate(value)?;
        match meta.name {
          "pivot_left" => cfg.pivot_left = value as usize,
          "pivot_right" => cfg.pivot_right = value as usize,
          "pivot_min_move_pct" => cfg.pivot_min_move_pct = value,
          "min_candles" => cfg.min_candles = value as usize,
          "atr_period" => cfg.atr_period = value as usize,
          "swing_window" => cfg.swing_window = value as usize,
          "double_top_symmetry" => cfg.double_top_symmetry = value,
          "wave4_overlap_tolerance" => cfg.wave4_overlap_tolerance = value,
          "impulse_min_quality" => cfg.impulse_min_quality = value,
          "order_block_body_ratio" => cfg.order_block_body_ratio = value,
          "sfp_wick_body_ratio" => cfg.sfp_wick_body_ratio = value,
          "channel_parallel_tolerance" => cfg.channel_parallel_tolerance = value,
          "max_pattern_age" => cfg.max_pattern_age = value as usize,
          "pattern_age_decay" => cfg.pattern_age_decay = value,
          "rr_ceiling" => cfg.rr_ceiling = value,
          "reversal_gate" => cfg.reversal_gate = value,
          _ => unreachable!("unknown parameter in PARAMS table"),
        }
      }
    }
    cfg.validate()?;
    Ok(cfg)
  }

  /// Validate cross-field consistency
  pub fn validate(&self) -> Result<()> {
    if self.pivot_left == 0 || self.pivot_right == 0 {
      return Err(SignalError::InvalidConfig("pivot window sides must be > 0".into()));
    }
    if self.min_candles < self.pivot_left + self.pivot_right + 1 {
      return Err(SignalError::InvalidConfig(format!(
        "min_candles {} is below the pivot window {}",
        self.min_candles,
        self.pivot_left + self.pivot_right + 1
      )));
    }
    if !(0.0..=1.0).contains(&self.double_top_symmetry) {
      return Err(SignalError::OutOfRange {
        field: "double_top_symmetry",
        value: self.double_top_symmetry,
        min: 0.0,
        max: 1.0,
      });
    }
    if !(0.0..=1.0).contains(&self.wave4_overlap_tolerance) {
      return Err(SignalError::OutOfRange {
        field: "wave4_overlap_tolerance",
        value: self.wave4_overlap_tolerance,
        min: 0.0,
        max: 1.0,
      });
    }
    if self.rr_ceiling <= 0.0 {
      return Err(SignalError::InvalidConfig("rr_ceiling must be > 0".into()));
    }
    if self.stop_atr_conservative <= 0.0 || self.stop_atr_aggressive <= 0.0 {
      return Err(SignalError::InvalidConfig("stop ATR multiples must be > 0".into()));
    }
    Ok(())
  }

  /// ATR multiple for stop sizing under the configured risk mode
  pub fn stop_atr_multiple(&self) -> f64 {
    match self.risk_mode {
      RiskMode::Conservative => self.stop_atr_conservative,
      RiskMode::Aggressive => self.stop_atr_aggressive,
    }
  }
}

// ============================================================
// TESTS
// ============================================================
