//! Detector training and scoring stages

use super::config::{DetectionConfig, ForestConfig};
use crate::anomaly::{AnomalyDetector, IsolationForest, OneClassSvm, OUTLIER};
use crate::error::{Result, SentinelError};
use crate::feature_engineering::sanitized_matrix;
use crate::preprocessing::StandardScaler;
use crate::session::{self, columns, SessionLabel, BASE_FEATURES, MODEL_FEATURES};
use ndarray::Array1;
use polars::prelude::*;
use std::time::Instant;
use tracing::{debug, info};

/// Label whose sessions approximate the normal distribution
pub const TRAINING_LABEL: SessionLabel = SessionLabel::Human;

/// Scaler and detectors fitted on the Human-only view
#[derive(Debug, Clone)]
pub struct TrainedDetectors {
    pub scaler: StandardScaler,
    pub forest: IsolationForest,
    pub one_class: OneClassSvm,
    /// Rows in the training view
    pub n_train: usize,
}

/// Rows the rules labeled Human. A filtered copy; `df` is not modified.
pub fn training_view(df: &DataFrame) -> Result<DataFrame> {
    let mask = session::label_mask(df, TRAINING_LABEL)?;
    let view = df.filter(&mask)?;

    if view.height() == 0 {
        return Err(SentinelError::EmptyTrainingSet {
            label: TRAINING_LABEL.to_string(),
        });
    }
    Ok(view)
}

/// Fit the scaler once on the training view, then both detectors on the
/// scaled training rows. `engineered` must have gone through
/// [`crate::feature_engineering::engineer_features`].
pub fn train_detectors(engineered: &DataFrame, config: &DetectionConfig) -> Result<TrainedDetectors> {
    let start = Instant::now();
    let train = training_view(engineered)?;

    let mut scaler = StandardScaler::new();
    let x_train = scaler.fit_transform(&train, &MODEL_FEATURES)?;

    let mut forest = config.forest.build();
    forest.fit(&x_train)?;

    let mut one_class = config.one_class.build();
    one_class.fit(&x_train)?;

    info!(
        n_train = train.height(),
        n_estimators = forest.n_estimators(),
        offset = forest.offset().unwrap_or_default(),
        n_support = one_class.n_support(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Trained detectors on {} sessions",
        TRAINING_LABEL
    );

    Ok(TrainedDetectors {
        scaler,
        forest,
        one_class,
        n_train: train.height(),
    })
}

impl TrainedDetectors {
    /// Score every row and append `if_pred`, `if_anomaly_score`, `if_bot`,
    /// `svm_pred` and `svm_bot`.
    pub fn score(&self, engineered: &DataFrame) -> Result<DataFrame> {
        let x_all = self.scaler.transform(engineered)?;

        let if_result = self.forest.detect(&x_all)?;
        let svm_pred = self.one_class.predict(&x_all)?;
        let svm_outliers = svm_pred.iter().filter(|&&p| p == OUTLIER).count();

        debug!(
            rows = x_all.nrows(),
            if_outliers = if_result.n_anomalies,
            svm_outliers,
            "Scored sessions"
        );

        let mut out = engineered.clone();
        out.with_column(Series::new(columns::IF_PRED.into(), if_result.labels.to_vec()))?;
        out.with_column(Series::new(
            columns::IF_ANOMALY_SCORE.into(),
            if_result.scores.to_vec(),
        ))?;
        out.with_column(Series::new(columns::IF_BOT.into(), outlier_flags(&if_result.labels)))?;
        out.with_column(Series::new(columns::SVM_PRED.into(), svm_pred.to_vec()))?;
        out.with_column(Series::new(columns::SVM_BOT.into(), outlier_flags(&svm_pred)))?;
        Ok(out)
    }
}

/// 1 where a prediction is an outlier, else 0
pub fn outlier_flags(predictions: &Array1<i32>) -> Vec<i32> {
    predictions
        .iter()
        .map(|&p| i32::from(p == OUTLIER))
        .collect()
}

/// Reporting-only baseline: a forest fit on every row over the unscaled base
/// features. Appends `if_baseline_pred` and `if_baseline_bot`.
pub fn baseline_stage(df: &DataFrame, config: &ForestConfig) -> Result<DataFrame> {
    let x_base = sanitized_matrix(df, &BASE_FEATURES)?;

    let mut baseline = config.build();
    let predictions = baseline.fit_predict(&x_base)?;

    debug!(
        rows = x_base.nrows(),
        outliers = predictions.iter().filter(|&&p| p == OUTLIER).count(),
        "Fitted baseline forest"
    );

    let mut out = df.clone();
    out.with_column(Series::new(
        columns::IF_BASELINE_PRED.into(),
        predictions.to_vec(),
    ))?;
    out.with_column(Series::new(
        columns::IF_BASELINE_BOT.into(),
        outlier_flags(&predictions),
    ))?;
    Ok(out)
}
