//! Property tests over the pipeline invariants.

use proptest::prelude::*;
use swingcast::model::sigmoid;
use swingcast::prelude::*;

/// Strategy for a well-formed candle series: positive prices with
/// high/low widened to contain the body, timestamps strictly ascending.
fn series_strategy(max_len: usize) -> impl Strategy<Value = Vec<Candle>> {
    proptest::collection::vec(
        (1.0..1000.0f64, 1.0..1000.0f64, 0.0..50.0f64, 0.0..50.0f64, 0.0..1e6f64),
        0..max_len,
    )
    .prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(i, (open, close, up, down, volume))| Candle {
                timestamp: i as i64 * 60,
                open,
                high: open.max(close) + up,
                low: (open.min(close) - down).max(0.01),
                close,
                volume,
            })
            .collect()
    })
}

proptest! {
    // ============================================================
    // NORMALIZER
    // ============================================================

    #[test]
    fn prop_normalize_output_is_sorted_and_deduped(
        rows in proptest::collection::vec((0i64..500, 1.0..100.0f64), 0..60)
    ) {
        let json_rows: Vec<String> = rows
            .iter()
            .map(|(t, c)| format!(r#"{{"t": {t}, "c": {c}}}"#))
            .collect();
        let json = format!("[{}]", json_rows.join(","));

        let candles = normalize_json(&json);
        for pair in candles.windows(2) {
            prop_assert!(pair[0].timestamp < pair[1].timestamp);
        }
        for c in &candles {
            prop_assert!(c.flaw().is_none(), "normalized candle has flaw: {c:?}");
        }
    }

    #[test]
    fn prop_normalize_is_idempotent(
        rows in proptest::collection::vec((0i64..500, 1.0..100.0f64), 0..60)
    ) {
        let json_rows: Vec<String> = rows
            .iter()
            .map(|(t, c)| format!(r#"[{t}, {c}, {c}, {c}, {c}, 10]"#))
            .collect();
        let json = format!("[{}]", json_rows.join(","));

        let once = normalize_json(&json);
        let rows_again: Vec<String> = once
            .iter()
            .map(|c| {
                format!("[{}, {}, {}, {}, {}, {}]", c.timestamp, c.open, c.high, c.low, c.close, c.volume)
            })
            .collect();
        let twice = normalize_json(&format!("[{}]", rows_again.join(",")));

        prop_assert_eq!(once, twice);
    }

    // ============================================================
    // PIVOTS
    // ============================================================

    #[test]
    fn prop_pivot_indices_are_in_bounds(candles in series_strategy(80)) {
        let detector = PivotDetector::new(3, 3, 0.0);
        for pivot in detector.detect(&candles) {
            prop_assert!(pivot.index < candles.len());
            prop_assert!(pivot.index >= 3);
            prop_assert!(pivot.index + 3 < candles.len());
        }
    }

    #[test]
    fn prop_pivot_prices_match_the_series(candles in series_strategy(80)) {
        let detector = PivotDetector::new(3, 3, 0.0);
        for pivot in detector.detect(&candles) {
            let candle = &candles[pivot.index];
            let expected = if pivot.is_high() { candle.high } else { candle.low };
            prop_assert!((pivot.price - expected).abs() < 1e-12);
        }
    }

    // ============================================================
    // FIBONACCI
    // ============================================================

    #[test]
    fn prop_fib_levels_are_ordered(a in 1.0..1000.0f64, b in 1.0..1000.0f64) {
        let fib = FibLevels::from_swing(a, b);
        prop_assert!(fib.low <= fib.high);
        for (_, price) in fib.retracements {
            prop_assert!(price >= fib.low - 1e-9 && price <= fib.high + 1e-9);
        }
        for (_, price) in fib.extensions_up {
            prop_assert!(price >= fib.high - 1e-9);
        }
        for (_, price) in fib.extensions_down {
            prop_assert!(price <= fib.low + 1e-9);
        }
    }

    // ============================================================
    // FUSION
    // ============================================================

    #[test]
    fn prop_fused_probability_stays_in_unit_interval(
        scores in proptest::array::uniform6(0.0..=1.0f64)
    ) {
        let layer_scores = LayerScores {
            indicator: scores[0],
            pattern: scores[1],
            elliott: scores[2],
            orderflow: scores[3],
            candle_shape: scores[4],
            news: scores[5],
        };
        let fused = FusionWeights::default().fuse(&layer_scores);
        prop_assert!((0.0..=1.0).contains(&fused));
    }

    #[test]
    fn prop_tuned_weights_stay_normalized(
        samples in proptest::collection::vec(
            (0.0..=1.0f64, 0.0..=1.0f64, proptest::array::uniform6(0.0..=1.0f64)),
            1..40
        ),
        rate in 0.001..0.5f64
    ) {
        let outcomes: Vec<LabeledOutcome> = samples
            .iter()
            .map(|&(label, predicted, s)| LabeledOutcome {
                label,
                predicted,
                contributions: LayerScores {
                    indicator: s[0],
                    pattern: s[1],
                    elliott: s[2],
                    orderflow: s[3],
                    candle_shape: s[4],
                    news: s[5],
                },
            })
            .collect();

        let mut weights = FusionWeights::default();
        weights.tune(&outcomes, rate);

        let sum: f64 = weights.as_array().iter().sum();
        prop_assert!((sum - 1.0).abs() < 1e-9, "weights sum to {sum}");
        for w in weights.as_array() {
            prop_assert!(w > 0.0);
        }
    }

    // ============================================================
    // MODEL
    // ============================================================

    #[test]
    fn prop_prediction_stays_in_unit_interval(
        features in proptest::collection::vec(-10.0..10.0f64, 1..32),
        labels in proptest::collection::vec(0.0..=1.0f64, 0..50)
    ) {
        let mut model = OnlineModel::default();
        for label in labels {
            model.train(&features, label);
        }
        let p = model.predict(&features);
        prop_assert!((0.0..=1.0).contains(&p));
    }

    #[test]
    fn prop_zero_features_predict_sigmoid_bias(
        features in proptest::collection::vec(-10.0..10.0f64, 1..32),
        labels in proptest::collection::vec(0.0..=1.0f64, 1..50)
    ) {
        let mut model = OnlineModel::default();
        for label in labels {
            model.train(&features, label);
        }

        let zeros = vec![0.0; features.len()];
        let expected = sigmoid(model.snapshot().bias);
        prop_assert!((model.predict(&zeros) - expected).abs() < 1e-12);
    }

    // ============================================================
    // END-TO-END
    // ============================================================

    #[test]
    fn prop_analysis_never_panics_and_sums_to_100(candles in series_strategy(90)) {
        let analyzer = Analyzer::default();
        let state = ModelState::default();

        let analysis = analyzer.analyze(&candles, &MarketInputs::default(), &state).unwrap();

        prop_assert!((analysis.probabilities.sum() - 100.0).abs() < 1e-6);
        prop_assert!((0.0..=1.0).contains(&analysis.blended_probability));
        prop_assert!(analysis.confidence <= 100);
        for score in analysis.layer_scores.as_array() {
            prop_assert!((0.0..=1.0).contains(&score));
        }
        if let Some(plan) = &analysis.plan {
            prop_assert!(plan.reward_risk <= analyzer.config().rr_ceiling + 1e-9);
        }
        if let Some(reversal) = &analysis.reversal {
            prop_assert!(reversal.likelihood >= analyzer.config().reversal_gate);
            prop_assert!(reversal.likelihood <= 100.0);
        }
    }
}
