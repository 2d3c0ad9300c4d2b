//! End-to-end hybrid classification pipeline

use super::config::DetectionConfig;
use super::hybrid::HybridPolicy;
use super::training::{baseline_stage, train_detectors, TrainedDetectors};
use crate::error::Result;
use crate::feature_engineering::engineer_features;
use crate::session::{self, columns, SessionLabel};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

/// Row counts for one pipeline run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionSummary {
    pub n_sessions: usize,
    pub n_train: usize,
    pub rule_bots: usize,
    pub if_bots: usize,
    pub svm_bots: usize,
    pub baseline_bots: Option<usize>,
    pub final_bots: usize,
}

/// Labeled table plus its summary
#[derive(Debug, Clone)]
pub struct DetectionOutput {
    pub table: DataFrame,
    pub detectors: TrainedDetectors,
    pub summary: DetectionSummary,
}

/// Hybrid session classifier
///
/// Stages run in order, each taking the previous frame and returning a new one:
/// schema check, baseline forest, feature engineering, detector training on
/// the Human view, scoring, hybrid decision.
#[derive(Debug, Clone, Default)]
pub struct HybridClassifier {
    config: DetectionConfig,
}

impl HybridClassifier {
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    pub fn policy(&self) -> HybridPolicy {
        HybridPolicy::new(self.config.severity_threshold)
    }

    /// Run every stage over `sessions`
    pub fn run(&self, sessions: &DataFrame) -> Result<DetectionOutput> {
        let start = Instant::now();
        self.config.validate()?;
        session::validate_schema(sessions)?;

        info!(rows = sessions.height(), "Starting hybrid classification");

        let with_baseline = match &self.config.baseline {
            Some(baseline) => baseline_stage(sessions, baseline)?,
            None => sessions.clone(),
        };

        let engineered = engineer_features(&with_baseline)?;
        let detectors = train_detectors(&engineered, &self.config)?;
        let scored = detectors.score(&engineered)?;
        let table = self.policy().apply(&scored)?;

        let summary = summarize(&table, detectors.n_train, self.config.baseline.is_some())?;

        info!(
            rows = summary.n_sessions,
            rule_bots = summary.rule_bots,
            if_bots = summary.if_bots,
            svm_bots = summary.svm_bots,
            final_bots = summary.final_bots,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Hybrid classification complete"
        );

        Ok(DetectionOutput {
            table,
            detectors,
            summary,
        })
    }
}

fn count_flags(df: &DataFrame, name: &str) -> Result<usize> {
    Ok(session::int_column(df, name)?
        .into_iter()
        .filter(|v| *v == Some(1))
        .count())
}

fn summarize(table: &DataFrame, n_train: usize, with_baseline: bool) -> Result<DetectionSummary> {
    let rule_bots = session::session_labels(table)?
        .into_iter()
        .filter(|label| label.is_some_and(SessionLabel::is_rule_bot))
        .count();

    let baseline_bots = if with_baseline {
        Some(count_flags(table, columns::IF_BASELINE_BOT)?)
    } else {
        None
    };

    Ok(DetectionSummary {
        n_sessions: table.height(),
        n_train,
        rule_bots,
        if_bots: count_flags(table, columns::IF_BOT)?,
        svm_bots: count_flags(table, columns::SVM_BOT)?,
        baseline_bots,
        final_bots: count_flags(table, columns::FINAL_BOT)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::config::ForestConfig;
    use crate::error::SentinelError;

    fn sessions() -> DataFrame {
        let n = 48;
        let mut rps = Vec::with_capacity(n);
        let mut scroll = Vec::with_capacity(n);
        let mut mouse = Vec::with_capacity(n);
        let mut pages = Vec::with_capacity(n);
        let mut duration = Vec::with_capacity(n);
        let mut classification = Vec::with_capacity(n);

        for i in 0..n {
            let jitter = (i % 5) as f64 * 0.2;
            if i < 40 {
                rps.push(0.4 + jitter);
                scroll.push(55.0 + jitter * 20.0);
                mouse.push(180.0 + jitter * 40.0);
                pages.push(4 + (i % 6) as i64);
                duration.push(240.0 + jitter * 120.0);
                classification.push("Human");
            } else {
                rps.push(25.0 + jitter);
                scroll.push(1.0);
                mouse.push(0.0);
                pages.push(120);
                duration.push(if i == 47 { 0.0 } else { 15.0 });
                classification.push(if i % 2 == 0 { "Bot" } else { "Suspicious" });
            }
        }

        df!(
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
            .with_forest(ForestConfig::default().with_n_estimators(60))
            .with_baseline(Some(ForestConfig::baseline().with_n_estimators(30)))
    }

    #[test]
    fn test_run_produces_every_column() {
        let output = HybridClassifier::new(fast_config()).run(&sessions()).unwrap();
        let table = &output.table;

        assert_eq!(table.height(), 48);
        for name in [
            columns::PAGES_PER_MIN,
            columns::SCROLL_PER_SEC,
            columns::IF_BASELINE_PRED,
            columns::IF_BASELINE_BOT,
            columns::IF_PRED,
            columns::IF_ANOMALY_SCORE,
            columns::IF_BOT,
            columns::SVM_PRED,
            columns::SVM_BOT,
            columns::FINAL_BOT,
        ] {
            assert!(table.column(name).is_ok(), "missing {}", name);
        }

        assert_eq!(output.summary.n_train, 40);
        assert_eq!(output.summary.rule_bots, 8);
        assert!(output.summary.baseline_bots.is_some());
    }

    #[test]
    fn test_rule_bots_always_final() {
        let output = HybridClassifier::new(fast_config()).run(&sessions()).unwrap();
        let final_bot = session::int_column(&output.table, columns::FINAL_BOT).unwrap();
        assert!(final_bot[40..].iter().all(|&b| b == Some(1)));
        assert!(output.summary.final_bots >= output.summary.rule_bots);
    }

    #[test]
    fn test_zero_duration_ratio_is_zero() {
        let output = HybridClassifier::new(fast_config()).run(&sessions()).unwrap();
        let ppm = session::float_column(&output.table, columns::PAGES_PER_MIN).unwrap();
        assert_eq!(ppm[47], Some(0.0));
    }

    #[test]
    fn test_baseline_disabled() {
        let config = fast_config().with_baseline(None);
        let output = HybridClassifier::new(config).run(&sessions()).unwrap();
        assert!(output.table.column(columns::IF_BASELINE_BOT).is_err());
        assert_eq!(output.summary.baseline_bots, None);
    }

    #[test]
    fn test_no_human_sessions_is_fatal() {
        let df = sessions();
        let mask = session::label_mask(&df, SessionLabel::Human).unwrap();
        let bots_only = df.filter(&!&mask).unwrap();

        let result = HybridClassifier::new(fast_config()).run(&bots_only);
        assert!(matches!(result, Err(SentinelError::EmptyTrainingSet { .. })));
    }

    #[test]
    fn test_invalid_config_rejected_before_work() {
        let config = fast_config().with_severity_threshold(f64::INFINITY);
        let result = HybridClassifier::new(config).run(&sessions());
        assert!(matches!(result, Err(SentinelError::InvalidParameter { .. })));
    }
}
