//! Hybrid bot decision
//!
//! ```text
//! rule_bot  = classification in {Bot, Suspicious}
//! ml_bot    = if_bot OR svm_bot
//! final_bot = rule_bot OR (ml_bot AND if_anomaly_score < severity_threshold)
//! ```
//!
//! The rule verdict is trusted outright. A detector verdict alone only counts
//! when the isolation forest also rates the session as severely anomalous.

use super::config::DEFAULT_SEVERITY_THRESHOLD;
use crate::error::Result;
use crate::session::{self, columns, SessionLabel};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Everything the decision reads for one session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSignals {
    /// Upstream rule label; `None` when missing or unrecognised
    pub label: Option<SessionLabel>,
    pub if_bot: bool,
    pub svm_bot: bool,
    /// `None` (or NaN) never satisfies the severity check
    pub if_anomaly_score: Option<f64>,
}

/// The per-row decision formula with its one tunable constant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HybridPolicy {
    severity_threshold: f64,
}

impl Default for HybridPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_SEVERITY_THRESHOLD)
    }
}

impl HybridPolicy {
    pub fn new(severity_threshold: f64) -> Self {
        Self { severity_threshold }
    }

    pub fn severity_threshold(&self) -> f64 {
        self.severity_threshold
    }

    pub fn rule_bot(label: Option<SessionLabel>) -> bool {
        label.is_some_and(SessionLabel::is_rule_bot)
    }

    pub fn ml_bot(signals: &SessionSignals) -> bool {
        signals.if_bot || signals.svm_bot
    }

    /// Strictly below the threshold; equality is not severe
    pub fn is_severe(&self, score: Option<f64>) -> bool {
        matches!(score, Some(s) if s < self.severity_threshold)
    }

    pub fn decide(&self, signals: &SessionSignals) -> bool {
        Self::rule_bot(signals.label)
            || (Self::ml_bot(signals) && self.is_severe(signals.if_anomaly_score))
    }

    /// Read the scored columns and append `final_bot` (0/1).
    pub fn apply(&self, scored: &DataFrame) -> Result<DataFrame> {
        session::require_columns(
            scored,
            &[
                columns::CLASSIFICATION,
                columns::IF_BOT,
                columns::SVM_BOT,
                columns::IF_ANOMALY_SCORE,
            ],
        )?;

        let labels = session::session_labels(scored)?;
        let if_bot = session::int_column(scored, columns::IF_BOT)?;
        let svm_bot = session::int_column(scored, columns::SVM_BOT)?;
        let scores = session::float_column(scored, columns::IF_ANOMALY_SCORE)?;

        let final_bot: Vec<i32> = labels
            .iter()
            .zip(if_bot.iter())
            .zip(svm_bot.iter())
            .zip(scores.iter())
            .map(|(((&label, &if_bot), &svm_bot), &score)| {
                let signals = SessionSignals {
                    label,
                    if_bot: if_bot == Some(1),
                    svm_bot: svm_bot == Some(1),
                    if_anomaly_score: score,
                };
                i32::from(self.decide(&signals))
            })
            .collect();

        debug!(
            threshold = self.severity_threshold,
            final_bots = final_bot.iter().filter(|&&b| b == 1).count(),
            "Applied hybrid decision"
        );

        let mut out = scored.clone();
        out.with_column(Series::new(columns::FINAL_BOT.into(), final_bot))?;
        Ok(out)
    }
}
