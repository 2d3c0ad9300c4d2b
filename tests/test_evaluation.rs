//! Integration test: detect → write CSV → reload → evaluate and report

use polars::prelude::*;
use session_sentinel::detection::{DetectionConfig, ForestConfig, HybridClassifier};
use session_sentinel::evaluation::{evaluate_signals, Signal};
use session_sentinel::reporting::{write_report, CLASS_DISTRIBUTION, FEATURE_CORRELATION};
use session_sentinel::session::{self, columns, load_sessions, write_sessions};
use tempfile::tempdir;

fn create_session_dataset() -> DataFrame {
    let n = 60;
    let mut user_id = Vec::with_capacity(n);
    let mut rps = Vec::with_capacity(n);
    let mut scroll = Vec::with_capacity(n);
    let mut mouse = Vec::with_capacity(n);
    let mut pages = Vec::with_capacity(n);
    let mut duration = Vec::with_capacity(n);
    let mut classification = Vec::with_capacity(n);

    for i in 0..n {
        let x = (i % 9) as f64;
        if i < 48 {
            user_id.push(format!("U{:03}", i));
            rps.push(0.3 + x * 0.1);
            scroll.push(40.0 + x * 5.0);
            mouse.push(120.0 + x * 20.0);
            pages.push(3 + (i % 8) as i64);
            duration.push(200.0 + x * 40.0);
            classification.push("Human");
        } else {
            user_id.push(format!("B{:03}", i));
            rps.push(18.0 + x);
            scroll.push(1.0);
            mouse.push(0.0);
            pages.push(150);
            duration.push(12.0);
            classification.push(if i % 2 == 0 { "Bot" } else { "Human" });
        }
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

fn labeled_table() -> DataFrame {
    let config = DetectionConfig::default()
        .with_forest(ForestConfig::default().with_n_estimators(60))
        .with_baseline(Some(ForestConfig::baseline().with_n_estimators(30)));
    let output = HybridClassifier::new(config)
        .run(&create_session_dataset())
        .unwrap();
    session::annotate_ground_truth(&output.table).unwrap()
}

#[test]
fn test_csv_round_trip_then_evaluate() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("labeled.csv");

    let labeled = labeled_table();
    write_sessions(&labeled, &path).unwrap();
    let reloaded = load_sessions(&path).unwrap();

    assert_eq!(reloaded.height(), 60);
    let actual = session::string_column(&reloaded, columns::ACTUAL_LABEL).unwrap();
    assert_eq!(actual[0].as_deref(), Some("Human"));
    assert_eq!(actual[59].as_deref(), Some("Bot"));

    let from_memory = evaluate_signals(&labeled).unwrap();
    let from_disk = evaluate_signals(&reloaded).unwrap();
    for signal in Signal::ALL {
        assert_eq!(
            from_memory.get(signal).map(|r| r.confusion),
            from_disk.get(signal).map(|r| r.confusion),
            "{} differs after reload",
            signal
        );
    }
}

#[test]
fn test_rule_signal_metrics() {
    let report = evaluate_signals(&labeled_table()).unwrap();
    assert_eq!(report.n_evaluated, 60);
    assert_eq!(report.n_excluded, 0);
    assert_eq!(report.signals.len(), 5);

    // Rules catch the 6 even-indexed bots and never flag a human
    let rule = report.get(Signal::RuleBot).unwrap();
    assert_eq!(rule.confusion.as_rows(), [[48, 0], [6, 6]]);
    assert_eq!(rule.bot.precision, 1.0);
    assert!((rule.bot.recall - 0.5).abs() < 1e-12);
    assert!((rule.accuracy - 0.9).abs() < 1e-12);
    assert_eq!(rule.human.support, 48);
    assert_eq!(rule.bot.support, 12);
}

#[test]
fn test_final_signal_never_below_rule_recall() {
    let report = evaluate_signals(&labeled_table()).unwrap();
    let rule = report.get(Signal::RuleBot).unwrap();
    let fin = report.get(Signal::Final).unwrap();
    assert!(fin.confusion.tp >= rule.confusion.tp);
}

#[test]
fn test_write_report_tables() {
    let dir = tempdir().unwrap();
    let written = write_report(&labeled_table(), dir.path()).unwrap();
    assert_eq!(written.len(), 5);

    let dist = load_sessions(&dir.path().join(format!("{}.csv", CLASS_DISTRIBUTION))).unwrap();
    let counts = session::int_column(&dist, "count").unwrap();
    assert_eq!(counts, vec![Some(48), Some(12)]);

    let corr = load_sessions(&dir.path().join(format!("{}.csv", FEATURE_CORRELATION))).unwrap();
    assert_eq!(corr.shape(), (5, 6));
}
