//! Candle normalization boundary.
//!
//! Upstream feeds deliver candles either as `[t, o, h, l, c, v]` tuples or as
//! objects with loosely named fields, sometimes with numbers encoded as
//! strings. Everything past this module operates on one canonical, ordered
//! [`Candle`] series; no downstream component special-cases input shape.

use crate::Candle;

// ============================================================
// RAW INPUT SHAPES
// ============================================================

/// Loosely typed numeric field as delivered by upstream feeds
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(untagged)]
pub enum Num {
    F64(f64),
    I64(i64),
    Text(String),
}

impl Num {
    fn as_f64(&self) -> Option<f64> {
        match self {
            Num::F64(v) => v.is_finite().then_some(*v),
            Num::I64(v) => Some(*v as f64),
            Num::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        }
    }
}

/// A raw candle record in either of the accepted wire shapes.
///
/// Tuple form is `[t, o, h, l, c, v]` with trailing fields optional;
/// object form accepts the common short and long field names.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(untagged)]
pub enum RawCandle {
    Tuple(Vec<Num>),
    Object {
        #[serde(alias = "t", alias = "time", alias = "ts", default)]
        timestamp: Option<Num>,
        #[serde(alias = "o", default)]
        open: Option<Num>,
        #[serde(alias = "h", default)]
        high: Option<Num>,
        #[serde(alias = "l", default)]
        low: Option<Num>,
        #[serde(alias = "c", default)]
        close: Option<Num>,
        #[serde(alias = "v", alias = "vol", default)]
        volume: Option<Num>,
    },
}

impl RawCandle {
    /// Coerce into a canonical candle. Records missing a timestamp or a
    /// close are dropped; missing open/high/low default to the close.
    fn coerce(&self) -> Option<Candle> {
        let (timestamp, open, high, low, close, volume) = match self {
            RawCandle::Tuple(fields) => (
                fields.first().and_then(Num::as_f64),
                fields.get(1).and_then(Num::as_f64),
                fields.get(2).and_then(Num::as_f64),
                fields.get(3).and_then(Num::as_f64),
                fields.get(4).and_then(Num::as_f64),
                fields.get(5).and_then(Num::as_f64),
            ),
            RawCandle::Object { timestamp, open, high, low, close, volume } => (
                timestamp.as_ref().and_then(Num::as_f64),
                open.as_ref().and_then(Num::as_f64),
                high.as_ref().and_then(Num::as_f64),
                low.as_ref().and_then(Num::as_f64),
                close.as_ref().and_then(Num::as_f64),
                volume.as_ref().and_then(Num::as_f64),
            ),
        };

        let timestamp = timestamp? as i64;
        let close = close?;

        let open = open.unwrap_or(close);
        let high = high.unwrap_or(close).max(open).max(close);
        let low = low.unwrap_or(close).min(open).min(close);
        let volume = volume.unwrap_or(0.0).max(0.0);

        Some(Candle { timestamp, open, high, low, close, volume })
    }
}

// ============================================================
// NORMALIZATION
// ============================================================

/// Normalize raw records into a canonical candle series: strictly sorted by
/// timestamp, no duplicates (later input wins), malformed records dropped.
pub fn normalize(raw: &[RawCandle]) -> Vec<Candle> {
    let mut candles: Vec<Candle> = raw.iter().filter_map(RawCandle::coerce).collect();

    // Stable sort keeps input order among equal timestamps, so the last
    // record of a duplicate run is the later one in input order.
    candles.sort_by_key(|c| c.timestamp);

    let mut out: Vec<Candle> = Vec::with_capacity(candles.len());
    for candle in candles {
        match out.last_mut() {
            Some(last) if last.timestamp == candle.timestamp => *last = candle,
            _ => out.push(candle),
        }
    }
    out
}

/// Normalize a JSON document holding an array of raw candle records.
/// Malformed or non-array input yields an empty series rather than an error.
pub fn normalize_json(json: &str) -> Vec<Candle> {
    match serde_json::from_str::<Vec<RawCandle>>(json) {
        Ok(raw) => normalize(&raw),
        Err(_) => Vec::new(),
    }
}

// ============================================================
// TESTS
// ============================================================
