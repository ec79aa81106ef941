//! Geometric chart-pattern detectors over the pivot sequence.
//!
//! Three families, one module each:
//! - [`reversal`]: double top/bottom, head and shoulders
//! - [`trend`]: triangles, channels
//! - [`structure`]: order blocks, fair value gaps, stop runs, structure breaks
//!
//! Every detector soft-fails: insufficient pivots yield no hits, never an
//! error.

pub mod reversal;
pub mod structure;
pub mod trend;

use crate::{config::AnalyzerConfig, pivots::Pivot, Candle, Direction};

// ============================================================
// PATTERN TYPES
// ============================================================

/// Triangle classification by slope geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TriangleKind {
    Symmetrical,
    Ascending,
    Descending,
}

/// Market-structure break classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum StructureBreakKind {
    /// Close beyond the most recent pivot in trend direction
    BreakOfStructure,
    /// Violation of the middle pivot against the prevailing structure
    ChangeOfCharacter,
}

/// A detected chart pattern with its defining geometry
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Pattern {
    DoubleTop { peaks: [Pivot; 2], neckline: f64 },
    DoubleBottom { troughs: [Pivot; 2], neckline: f64 },
    HeadAndShoulders { head: Pivot, shoulders: [Pivot; 2], neckline: f64 },
    InverseHeadAndShoulders { head: Pivot, shoulders: [Pivot; 2], neckline: f64 },
    Triangle { kind: TriangleKind, high_slope: f64, low_slope: f64 },
    Channel { high_slope: f64, low_slope: f64, parallel: bool },
    OrderBlock { index: usize, zone_low: f64, zone_high: f64 },
    FairValueGap { index: usize, gap_low: f64, gap_high: f64 },
    StopRunFailure { swept: Pivot, breach_index: usize },
    MarketStructureBreak { kind: StructureBreakKind, level: f64 },
}

impl Pattern {
    /// Short name for explanations and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Pattern::DoubleTop { .. } => "double_top",
            Pattern::DoubleBottom { .. } => "double_bottom",
            Pattern::HeadAndShoulders { .. } => "head_and_shoulders",
            Pattern::InverseHeadAndShoulders { .. } => "inverse_head_and_shoulders",
            Pattern::Triangle { kind: TriangleKind::Symmetrical, .. } => "symmetrical_triangle",
            Pattern::Triangle { kind: TriangleKind::Ascending, .. } => "ascending_triangle",
            Pattern::Triangle { kind: TriangleKind::Descending, .. } => "descending_triangle",
            Pattern::Channel { .. } => "channel",
            Pattern::OrderBlock { .. } => "order_block",
            Pattern::FairValueGap { .. } => "fair_value_gap",
            Pattern::StopRunFailure { .. } => "stop_run",
            Pattern::MarketStructureBreak { kind: StructureBreakKind::BreakOfStructure, .. } => {
                "break_of_structure"
            }
            Pattern::MarketStructureBreak { kind: StructureBreakKind::ChangeOfCharacter, .. } => {
                "change_of_character"
            }
        }
    }
}

/// A pattern hit with directional side, optional price target and
/// confidence
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PatternHit {
    pub pattern: Pattern,
    pub side: Direction,
    pub target: Option<f64>,
    /// 0..=100
    pub confidence: u8,
    pub start_index: usize,
    pub end_index: usize,
}

// ============================================================
// ORCHESTRATOR
// ============================================================

/// Run every pattern family over the pivot sequence and candles.
pub fn scan(candles: &[Candle], pivots: &[Pivot], config: &AnalyzerConfig) -> Vec<PatternHit> {
    let mut hits = Vec::new();

    hits.extend(reversal::double_tops_and_bottoms(pivots, config));
    hits.extend(reversal::head_and_shoulders(pivots));
    hits.extend(trend::triangles(pivots));
    hits.extend(trend::channel(pivots, config));
    hits.extend(structure::order_blocks(candles, config));
    hits.extend(structure::fair_value_gaps(candles));
    hits.extend(structure::stop_runs(candles, pivots, config));
    hits.extend(structure::structure_breaks(candles, pivots));

    hits.sort_by_key(|h| h.end_index);
    hits
}

// ============================================================
// TESTS
// ============================================================
