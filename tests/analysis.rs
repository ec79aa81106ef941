//! Integration tests for the swingcast analysis pipeline.
//!
//! These tests validate the public API end to end: normalization in,
//! a full analysis result out, state persistence round trips.

use swingcast::prelude::*;

fn bar(i: usize, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Candle {
    Candle { timestamp: i as i64 * 60, open, high, low, close, volume }
}

/// Generate uptrend candles
fn make_uptrend(n: usize) -> Vec<Candle> {
    (0..n)
        .map(|i| {
            let base = 100.0 + (i as f64) * 2.0;
            bar(i, base - 0.5, base + 1.5, base - 1.5, base + 1.0, 1000.0)
        })
        .collect()
}

/// Generate downtrend candles
fn make_downtrend(n: usize) -> Vec<Candle> {
    (0..n)
        .map(|i| {
            let base = 300.0 - (i as f64) * 2.0;
            bar(i, base + 0.5, base + 1.5, base - 1.5, base - 1.0, 1000.0)
        })
        .collect()
}

/// Generate sideways candles
fn make_sideways(n: usize) -> Vec<Candle> {
    (0..n).map(|i| bar(i, 100.0, 102.0, 98.0, 101.0, 1000.0)).collect()
}

/// Zig-zag series oscillating around a base price, so pivot highs and
/// lows alternate at a fixed period.
fn make_zigzag(n: usize, period: usize, amplitude: f64) -> Vec<Candle> {
    (0..n)
        .map(|i| {
            let phase = (i % (2 * period)) as f64 / period as f64;
            let offset = if phase < 1.0 { phase } else { 2.0 - phase };
            let close = 100.0 + amplitude * offset;
            bar(i, close - 0.2, close + 0.5, close - 0.5, close, 1000.0)
        })
        .collect()
}

// ============================================================
// END-TO-END ANALYSIS
// ============================================================

#[test]
fn test_uptrend_leans_bullish() {
    let candles = make_uptrend(60);
    let analyzer = Analyzer::default();
    let state = ModelState::default();

    let analysis = analyzer.analyze(&candles, &MarketInputs::default(), &state).unwrap();

    assert!(analysis.blended_probability > 0.5);
    assert_eq!(analysis.direction, Direction::Bullish);
    assert!(analysis.probabilities.bull > analysis.probabilities.bear);
    assert!(analysis.confidence > 0);
    assert!(analysis.waves.data_sufficient);
}

#[test]
fn test_downtrend_leans_bearish() {
    let candles = make_downtrend(60);
    let analyzer = Analyzer::default();
    let state = ModelState::default();

    let analysis = analyzer.analyze(&candles, &MarketInputs::default(), &state).unwrap();

    assert!(analysis.blended_probability < 0.5);
    assert_eq!(analysis.direction, Direction::Bearish);
    assert!(analysis.probabilities.bear > analysis.probabilities.bull);
}

#[test]
fn test_sideways_is_neutral() {
    let candles = make_sideways(60);
    let analyzer = Analyzer::default();
    let state = ModelState::default();

    let analysis = analyzer.analyze(&candles, &MarketInputs::default(), &state).unwrap();

    assert_eq!(analysis.direction, Direction::Neutral);
    assert!((analysis.blended_probability - 0.5).abs() < 0.1);
}

#[test]
fn test_short_series_yields_insufficient_data_result() {
    let candles = make_uptrend(10);
    let analyzer = Analyzer::default();
    let state = ModelState::default();

    let analysis = analyzer.analyze(&candles, &MarketInputs::default(), &state).unwrap();

    assert_eq!(analysis.direction, Direction::Neutral);
    assert_eq!(analysis.confidence, 0);
    assert!(!analysis.waves.data_sufficient);
    assert!(analysis.explanation.contains("insufficient_data"));
    assert!(analysis.plan.is_none());
}

#[test]
fn test_probabilities_always_sum_to_100() {
    let analyzer = Analyzer::default();
    let state = ModelState::default();

    for candles in [make_uptrend(60), make_downtrend(60), make_sideways(60), make_zigzag(80, 5, 8.0)]
    {
        let analysis = analyzer.analyze(&candles, &MarketInputs::default(), &state).unwrap();
        let sum = analysis.probabilities.sum();
        assert!((sum - 100.0).abs() < 1e-6, "probabilities sum to {sum}");
    }
}

#[test]
fn test_zigzag_produces_pivots_and_fib_levels() {
    let candles = make_zigzag(80, 5, 8.0);
    let analyzer = Analyzer::default();
    let state = ModelState::default();

    let analysis = analyzer.analyze(&candles, &MarketInputs::default(), &state).unwrap();

    let fib = analysis.fib.expect("swing range should produce fib levels");
    assert!(fib.high > fib.low);
    for (_, price) in fib.retracements {
        assert!(price >= fib.low && price <= fib.high);
    }
}

#[test]
fn test_trend_analysis_carries_a_target_plan() {
    let candles = make_uptrend(60);
    let analyzer = Analyzer::default();
    let state = ModelState::default();

    let analysis = analyzer.analyze(&candles, &MarketInputs::default(), &state).unwrap();
    let last_close = candles.last().unwrap().close;

    let plan = analysis.plan.expect("trending series should produce a plan");
    assert!(plan.target > last_close);
    assert!(plan.stop < last_close);
    assert!(plan.reward_risk > 0.0);
}

#[test]
fn test_explanation_mentions_direction() {
    let candles = make_uptrend(60);
    let analyzer = Analyzer::default();
    let state = ModelState::default();

    let analysis = analyzer.analyze(&candles, &MarketInputs::default(), &state).unwrap();
    assert!(analysis.explanation.contains("bullish"));
}

#[test]
fn test_news_input_moves_the_blend() {
    let candles = make_sideways(60);
    let analyzer = Analyzer::default();
    let state = ModelState::default();

    let neutral =
        analyzer.analyze(&candles, &MarketInputs::default(), &state).unwrap().blended_probability;

    let mut inputs = MarketInputs::default();
    inputs.news = Some(NewsSignal { sentiment: 0.95, impact: NewsImpact::High });
    let bullish = analyzer.analyze(&candles, &inputs, &state).unwrap().blended_probability;

    assert!(bullish > neutral);
}

#[test]
fn test_secondary_timeframe_feeds_reversal_detector() {
    // Primary rises while gains collapse near the end; micro timeframe
    // falls outright; high-impact bearish news. All reversal drivers
    // that need external inputs line up.
    let mut candles = Vec::new();
    let mut price = 100.0;
    for i in 0..60 {
        price += if i < 50 { 2.0 } else { 0.05 };
        candles.push(bar(i, price - 0.1, price + 0.3, price - 0.4, price, 1000.0));
    }

    let micro = make_downtrend(40);
    let mut inputs = MarketInputs::default();
    inputs.secondary.insert("1m".to_string(), micro);
    inputs.news = Some(NewsSignal { sentiment: 0.1, impact: NewsImpact::High });

    let analyzer = Analyzer::default();
    let state = ModelState::default();
    let analysis = analyzer.analyze(&candles, &inputs, &state).unwrap();

    let reversal = analysis.reversal.expect("stacked drivers should cross the gate");
    assert_eq!(reversal.direction, Direction::Bearish);
    assert!(reversal.likelihood >= 68.0);
}

// ============================================================
// BUILDER AND VALIDATION
// ============================================================

#[test]
fn test_builder_accepts_custom_config() {
    let mut config = AnalyzerConfig::default();
    config.min_candles = 50;

    let analyzer = AnalyzerBuilder::new().config(config).build().unwrap();
    assert_eq!(analyzer.config().min_candles, 50);
}

#[test]
fn test_builder_rejects_invalid_config() {
    let mut config = AnalyzerConfig::default();
    config.pivot_left = 0;

    assert!(AnalyzerBuilder::new().config(config).build().is_err());
}

#[test]
fn test_candle_validation_flags_bad_input() {
    let mut candles = make_uptrend(40);
    candles[7].low = f64::NAN;

    let analyzer = AnalyzerBuilder::new().validate_candles(true).build().unwrap();
    let state = ModelState::default();

    let err = analyzer.analyze(&candles, &MarketInputs::default(), &state).unwrap_err();
    assert!(matches!(err, SignalError::InvalidCandle { index: 7, .. }));
}

#[test]
fn test_validation_off_tolerates_bad_candle() {
    let mut candles = make_uptrend(40);
    candles[7].volume = -5.0;

    let analyzer = Analyzer::default();
    let state = ModelState::default();
    assert!(analyzer.analyze(&candles, &MarketInputs::default(), &state).is_ok());
}

#[test]
fn test_min_confidence_prunes_weak_patterns() {
    let candles = make_zigzag(80, 5, 8.0);
    let state = ModelState::default();

    let strict = AnalyzerBuilder::new()
        .min_confidence(Probability::new(1.0).unwrap())
        .build()
        .unwrap();
    let analysis = strict.analyze(&candles, &MarketInputs::default(), &state).unwrap();

    assert!(analysis.patterns.is_empty());
}

// ============================================================
// NORMALIZATION BOUNDARY
// ============================================================

#[test]
fn test_normalized_feed_flows_into_analysis() {
    let rows: Vec<String> = (0..60)
        .map(|i| {
            let base = 100.0 + (i as f64) * 2.0;
            format!(
                "[{}, {}, {}, {}, {}, 1000]",
                i * 60,
                base - 0.5,
                base + 1.5,
                base - 1.5,
                base + 1.0
            )
        })
        .collect();
    let json = format!("[{}]", rows.join(","));

    let candles = normalize_json(&json);
    assert_eq!(candles.len(), 60);

    let analyzer = Analyzer::default();
    let state = ModelState::default();
    let analysis = analyzer.analyze(&candles, &MarketInputs::default(), &state).unwrap();
    assert_eq!(analysis.direction, Direction::Bullish);
}

// ============================================================
// LEARNING LOOP
// ============================================================

#[test]
fn test_observe_then_snapshot_round_trip() {
    let candles = make_uptrend(60);
    let analyzer = Analyzer::default();
    let mut state = ModelState::default();

    let analysis = analyzer.analyze(&candles, &MarketInputs::default(), &state).unwrap();
    state.observe(&analysis, 1.0);
    state.observe(&analysis, 1.0);
    assert_eq!(state.model.trained_samples(), 2);

    let mut buffer = Vec::new();
    state.save_to(&mut buffer).unwrap();
    let restored = ModelState::load_from(buffer.as_slice()).unwrap();

    assert_eq!(restored, state);
}

#[test]
fn test_training_shifts_the_blend() {
    let candles = make_uptrend(60);
    let analyzer = Analyzer::default();
    let mut state = ModelState::default();

    let before = analyzer
        .analyze(&candles, &MarketInputs::default(), &state)
        .unwrap()
        .blended_probability;

    // Keep telling the model this feature vector resolves bullish.
    let features = analyzer
        .analyze(&candles, &MarketInputs::default(), &state)
        .unwrap()
        .features;
    for _ in 0..200 {
        state.train(&features, 1.0);
    }

    let after = analyzer
        .analyze(&candles, &MarketInputs::default(), &state)
        .unwrap()
        .blended_probability;
    assert!(after > before, "blend should move toward the trained label");
}

#[test]
fn test_load_from_rejects_garbage() {
    assert!(ModelState::load_from("not json".as_bytes()).is_err());
}

// ============================================================
// PARALLEL SCAN
// ============================================================

#[test]
fn test_analyze_parallel_over_instruments() {
    let up = make_uptrend(60);
    let down = make_downtrend(60);
    let short = make_sideways(10);

    let instruments: Vec<(&str, &[Candle])> =
        vec![("UP", &up), ("DOWN", &down), ("SHORT", &short)];

    let analyzer = Analyzer::default();
    let state = ModelState::default();
    let (analyses, skips) = analyze_parallel(&analyzer, &instruments, &state);

    assert_eq!(analyses.len(), 2);
    assert_eq!(skips.len(), 1);
    assert_eq!(skips[0].symbol, "SHORT");
    assert!(matches!(skips[0].error, SignalError::InsufficientData { .. }));

    let up_result = analyses.iter().find(|a| a.symbol == "UP").unwrap();
    assert_eq!(up_result.analysis.direction, Direction::Bullish);
}

// ============================================================
// SERIALIZATION OF RESULTS
// ============================================================

#[test]
fn test_analysis_result_serializes() {
    let candles = make_uptrend(60);
    let analyzer = Analyzer::default();
    let state = ModelState::default();

    let analysis = analyzer.analyze(&candles, &MarketInputs::default(), &state).unwrap();
    let json = serde_json::to_string(&analysis).unwrap();
    let back: AnalysisResult = serde_json::from_str(&json).unwrap();

    assert_eq!(back, analysis);
}

// ============================================================
// PROBABILITY NEWTYPE
// ============================================================

#[test]
fn test_probability_validation() {
    assert!(Probability::new(0.0).is_ok());
    assert!(Probability::new(0.5).is_ok());
    assert!(Probability::new(1.0).is_ok());

    assert!(Probability::new(-0.1).is_err());
    assert!(Probability::new(1.1).is_err());
}
