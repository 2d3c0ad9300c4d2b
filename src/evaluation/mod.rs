//! Ground-truth evaluation of each detection signal
//!
//! Ground truth comes from `user_id`; the signals come from a labeled table
//! alone, so a stored detection output can be evaluated later.

mod metrics;

pub use metrics::{ClassMetrics, ClassificationReport, ConfusionMatrix};

use crate::error::{Result, SentinelError};
use crate::session::{self, columns, GroundTruth, SessionLabel};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// A binary bot verdict that can be scored against ground truth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Signal {
    /// Re-derived from `classification`
    RuleBot,
    /// `if_baseline_bot`, when present
    Baseline,
    IsolationForest,
    OneClassSvm,
    Final,
}

impl Signal {
    pub const ALL: [Signal; 5] = [
        Signal::RuleBot,
        Signal::Baseline,
        Signal::IsolationForest,
        Signal::OneClassSvm,
        Signal::Final,
    ];

    /// Column the signal is read from
    pub fn column(self) -> &'static str {
        match self {
            Signal::RuleBot => columns::CLASSIFICATION,
            Signal::Baseline => columns::IF_BASELINE_BOT,
            Signal::IsolationForest => columns::IF_BOT,
            Signal::OneClassSvm => columns::SVM_BOT,
            Signal::Final => columns::FINAL_BOT,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Signal::RuleBot => "rule_bot",
            Signal::Baseline => "if_baseline_bot",
            Signal::IsolationForest => "if_bot",
            Signal::OneClassSvm => "svm_bot",
            Signal::Final => "final_bot",
        }
    }

    /// Only the baseline may be absent from a labeled table
    fn is_optional(self) -> bool {
        self == Signal::Baseline
    }

    /// Per-row verdicts. Missing flags count as not bot.
    fn predictions(self, df: &DataFrame) -> Result<Vec<bool>> {
        match self {
            Signal::RuleBot => Ok(session::session_labels(df)?
                .into_iter()
                .map(|label| label.is_some_and(SessionLabel::is_rule_bot))
                .collect()),
            _ => Ok(session::int_column(df, self.column())?
                .into_iter()
                .map(|flag| flag == Some(1))
                .collect()),
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Report for one signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalReport {
    pub signal: Signal,
    pub report: ClassificationReport,
}

/// Reports for every signal present in a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub n_evaluated: usize,
    /// Rows dropped for lacking a usable `user_id`
    pub n_excluded: usize,
    pub signals: Vec<SignalReport>,
}

impl EvaluationReport {
    pub fn get(&self, signal: Signal) -> Option<&ClassificationReport> {
        self.signals
            .iter()
            .find(|s| s.signal == signal)
            .map(|s| &s.report)
    }
}

/// Score every signal in `labeled` against the `user_id` ground truth
pub fn evaluate_signals(labeled: &DataFrame) -> Result<EvaluationReport> {
    session::require_columns(
        labeled,
        &[
            columns::USER_ID,
            columns::CLASSIFICATION,
            columns::IF_BOT,
            columns::SVM_BOT,
            columns::FINAL_BOT,
        ],
    )?;

    let truth = session::ground_truth(labeled)?;
    let keep: Vec<usize> = truth
        .iter()
        .enumerate()
        .filter_map(|(i, t)| t.map(|_| i))
        .collect();
    let n_excluded = truth.len() - keep.len();

    if n_excluded > 0 {
        warn!(n_excluded, "Rows without a user_id excluded from evaluation");
    }
    if keep.is_empty() {
        return Err(SentinelError::EmptyInput(
            "no rows carry ground truth".to_string(),
        ));
    }

    let y_true: Vec<bool> = keep
        .iter()
        .map(|&i| truth[i].is_some_and(GroundTruth::is_bot))
        .collect();

    let mut signals = Vec::with_capacity(Signal::ALL.len());
    for signal in Signal::ALL {
        if signal.is_optional() && labeled.column(signal.column()).is_err() {
            debug!(signal = signal.name(), "Signal not present, skipping");
            continue;
        }

        let predictions = signal.predictions(labeled)?;
        let y_pred: Vec<bool> = keep.iter().map(|&i| predictions[i]).collect();
        signals.push(SignalReport {
            signal,
            report: ClassificationReport::from_pairs(&y_true, &y_pred),
        });
    }

    Ok(EvaluationReport {
        n_evaluated: keep.len(),
        n_excluded,
        signals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labeled() -> DataFrame {
        df!(
            "user_id" => &[Some("U1"), Some("U2"), Some("U3"), Some("B1"), Some("X9"), None],
            "classification" => &["Human", "Human", "Suspicious", "Bot", "Human", "Human"],
            "if_bot" => &[0i32, 1, 0, 1, 1, 1],
            "svm_bot" => &[0i32, 0, 0, 1, 0, 0],
            "final_bot" => &[0i32, 0, 1, 1, 1, 1],
        )
        .unwrap()
    }

    #[test]
    fn test_evaluate_excludes_missing_user_id() {
        let report = evaluate_signals(&labeled()).unwrap();
        assert_eq!(report.n_evaluated, 5);
        assert_eq!(report.n_excluded, 1);
        assert!(report.get(Signal::Baseline).is_none());
        assert_eq!(report.signals.len(), 4);
    }

    #[test]
    fn test_rule_signal_from_classification() {
        let report = evaluate_signals(&labeled()).unwrap();
        let rule = report.get(Signal::RuleBot).unwrap();
        // truth: H H H B B ; rule: H H B B H
        assert_eq!(rule.confusion.as_rows(), [[2, 1], [1, 1]]);
        assert!((rule.accuracy - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_final_signal_metrics() {
        let report = evaluate_signals(&labeled()).unwrap();
        let fin = report.get(Signal::Final).unwrap();
        // truth: H H H B B ; final: H H B B B
        assert_eq!(fin.confusion.as_rows(), [[2, 1], [0, 2]]);
        assert!((fin.bot.precision - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(fin.bot.recall, 1.0);
    }

    #[test]
    fn test_baseline_included_when_present() {
        let mut df = labeled();
        df.with_column(Series::new(
            columns::IF_BASELINE_BOT.into(),
            vec![0i32, 0, 0, 0, 0, 0],
        ))
        .unwrap();
        let report = evaluate_signals(&df).unwrap();
        let baseline = report.get(Signal::Baseline).unwrap();
        assert_eq!(baseline.bot.precision, 0.0);
        assert_eq!(baseline.bot.recall, 0.0);
    }

    #[test]
    fn test_requires_user_id() {
        let df = labeled().drop(columns::USER_ID).unwrap();
        assert!(matches!(
            evaluate_signals(&df),
            Err(SentinelError::MissingColumns(_))
        ));
    }
}
