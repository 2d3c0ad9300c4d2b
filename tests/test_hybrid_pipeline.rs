//! Integration test: load → engineer → train → score → hybrid decision

use polars::prelude::*;
use rand::prelude::*;
use session_sentinel::detection::{DetectionConfig, ForestConfig, HybridClassifier};
use session_sentinel::session::{self, columns};
use session_sentinel::SentinelError;

fn create_session_dataset(seed: u64) -> DataFrame {
    let mut rng = StdRng::seed_from_u64(seed);
    let n_humans = 120;
    let n_bots = 30;
    let n = n_humans + n_bots;

    let mut user_id = Vec::with_capacity(n);
    let mut rps = Vec::with_capacity(n);
    let mut scroll = Vec::with_capacity(n);
    let mut mouse = Vec::with_capacity(n);
    let mut pages = Vec::with_capacity(n);
    let mut duration = Vec::with_capacity(n);
    let mut classification = Vec::with_capacity(n);

    for i in 0..n_humans {
        user_id.push(format!("U{}", i));
        rps.push(rng.gen_range(0.1..1.5));
        scroll.push(rng.gen_range(30.0..95.0));
        mouse.push(rng.gen_range(80.0..400.0));
        pages.push(rng.gen_range(2i64..15));
        duration.push(rng.gen_range(60.0..900.0));
        classification.push("Human");
    }

    for i in 0..n_bots {
        user_id.push(format!("B{}", i));
        rps.push(rng.gen_range(8.0..40.0));
        scroll.push(rng.gen_range(0.0..5.0));
        mouse.push(rng.gen_range(0.0..3.0));
        pages.push(rng.gen_range(50i64..300));
        duration.push(rng.gen_range(5.0..40.0));
        // A third of the bots slip past the rules
        classification.push(match i % 3 {
            0 => "Human",
            1 => "Bot",
            _ => "Suspicious",
        });
    }

    df!(
        "user_id" => user_id,
        "requests_per_sec" => rps,
        "avg_scroll_depth" => scroll,
        "avg_mouse_movements" => mouse,
        "total_pages" => pages,
        "session_duration_sec" => duration,
        "classification" => classification,
    )
    .unwrap()
}

fn fast_config() -> DetectionConfig {
    DetectionConfig::default()
        .with_forest(ForestConfig::default().with_n_estimators(80))
        .with_baseline(Some(ForestConfig::baseline().with_n_estimators(40)))
}

#[test]
fn test_full_detection_pipeline() {
    let df = create_session_dataset(1);
    let output = HybridClassifier::new(fast_config()).run(&df).unwrap();

    assert_eq!(output.table.height(), df.height());
    assert_eq!(output.summary.n_train, 130);
    assert_eq!(output.summary.rule_bots, 20);
    assert!(output.summary.final_bots >= output.summary.rule_bots);

    // Input columns survive untouched
    let ids = session::string_column(&output.table, columns::USER_ID).unwrap();
    assert_eq!(ids[0].as_deref(), Some("U0"));
}

#[test]
fn test_rule_short_circuit() {
    let output = HybridClassifier::new(fast_config())
        .run(&create_session_dataset(2))
        .unwrap();

    let labels = session::session_labels(&output.table).unwrap();
    let final_bot = session::int_column(&output.table, columns::FINAL_BOT).unwrap();

    for (label, flag) in labels.iter().zip(final_bot.iter()) {
        if label.is_some_and(|l| l.is_rule_bot()) {
            assert_eq!(*flag, Some(1));
        }
    }
}

#[test]
fn test_human_rows_follow_severity_gate() {
    let config = fast_config();
    let threshold = config.severity_threshold;
    let output = HybridClassifier::new(config)
        .run(&create_session_dataset(3))
        .unwrap();
    let table = &output.table;

    let labels = session::session_labels(table).unwrap();
    let if_bot = session::int_column(table, columns::IF_BOT).unwrap();
    let svm_bot = session::int_column(table, columns::SVM_BOT).unwrap();
    let scores = session::float_column(table, columns::IF_ANOMALY_SCORE).unwrap();
    let final_bot = session::int_column(table, columns::FINAL_BOT).unwrap();

    for i in 0..table.height() {
        if labels[i] != Some(session::SessionLabel::Human) {
            continue;
        }
        let ml_bot = if_bot[i] == Some(1) || svm_bot[i] == Some(1);
        let severe = scores[i].unwrap() < threshold;
        assert_eq!(final_bot[i] == Some(1), ml_bot && severe, "row {}", i);
    }
}

#[test]
fn test_rate_features_non_negative() {
    let mut df = create_session_dataset(4);
    let mut duration = session::float_column(&df, columns::SESSION_DURATION_SEC).unwrap();
    duration[0] = Some(0.0);
    df.with_column(Series::new(columns::SESSION_DURATION_SEC.into(), duration))
        .unwrap();

    let output = HybridClassifier::new(fast_config()).run(&df).unwrap();
    let ppm = session::float_column(&output.table, columns::PAGES_PER_MIN).unwrap();
    let sps = session::float_column(&output.table, columns::SCROLL_PER_SEC).unwrap();

    assert_eq!(ppm[0], Some(0.0));
    assert_eq!(sps[0], Some(0.0));
    assert!(ppm.iter().chain(sps.iter()).all(|v| v.unwrap() >= 0.0));
}

#[test]
fn test_deterministic_with_fixed_seed() {
    let df = create_session_dataset(5);
    let a = HybridClassifier::new(fast_config()).run(&df).unwrap().table;
    let b = HybridClassifier::new(fast_config()).run(&df).unwrap().table;

    for name in [columns::IF_PRED, columns::SVM_PRED, columns::FINAL_BOT] {
        assert_eq!(
            session::int_column(&a, name).unwrap(),
            session::int_column(&b, name).unwrap(),
            "{} differs",
            name
        );
    }

    let sa = session::float_column(&a, columns::IF_ANOMALY_SCORE).unwrap();
    let sb = session::float_column(&b, columns::IF_ANOMALY_SCORE).unwrap();
    for (x, y) in sa.iter().zip(sb.iter()) {
        assert_eq!(x.unwrap().to_bits(), y.unwrap().to_bits());
    }
}

#[test]
fn test_missing_column_is_fatal() {
    let df = create_session_dataset(6)
        .drop(columns::AVG_MOUSE_MOVEMENTS)
        .unwrap();

    match HybridClassifier::new(fast_config()).run(&df) {
        Err(SentinelError::MissingColumns(missing)) => {
            assert_eq!(missing, vec![columns::AVG_MOUSE_MOVEMENTS.to_string()]);
        }
        other => panic!("expected MissingColumns, got {:?}", other.map(|o| o.summary)),
    }
}

#[test]
fn test_no_human_sessions_is_fatal() {
    let df = df!(
        "requests_per_sec" => &[10.0, 12.0],
        "avg_scroll_depth" => &[1.0, 2.0],
        "avg_mouse_movements" => &[0.0, 0.0],
        "total_pages" => &[90i64, 120],
        "session_duration_sec" => &[10.0, 12.0],
        "classification" => &["Bot", "Suspicious"],
    )
    .unwrap();

    let result = HybridClassifier::new(fast_config()).run(&df);
    assert!(matches!(result, Err(SentinelError::EmptyTrainingSet { .. })));
}

#[test]
fn test_empty_table_is_fatal() {
    let df = create_session_dataset(7).head(Some(0));
    let result = HybridClassifier::new(fast_config()).run(&df);
    assert!(matches!(result, Err(SentinelError::EmptyInput(_))));
}
