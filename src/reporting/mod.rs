//! Exploratory report tables over a labeled session table
//!
//! Every table is a plain `DataFrame`; [`SessionReport::write`] stores them
//! as CSV files named after the table.

use crate::error::{Result, SentinelError};
use crate::feature_engineering::sanitized_column;
use crate::session::{self, columns, GroundTruth, SessionLabel, BASE_FEATURES, MODEL_FEATURES};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const CLASS_DISTRIBUTION: &str = "class_distribution";
pub const ML_CAUGHT_RULES_MISSED: &str = "ml_caught_rules_missed";
pub const ML_FALSE_POSITIVES: &str = "ml_false_positives";
pub const FEATURE_CORRELATION: &str = "feature_correlation";
pub const FEATURE_SUMMARY: &str = "feature_summary";

/// All report tables for one labeled table
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub class_distribution: DataFrame,
    pub ml_caught_rules_missed: DataFrame,
    pub ml_false_positives: DataFrame,
    pub feature_correlation: DataFrame,
    pub feature_summary: DataFrame,
}

impl SessionReport {
    /// Build every table. `labeled` is a detection output carrying `user_id`.
    pub fn build(labeled: &DataFrame) -> Result<Self> {
        let mut required = vec![columns::USER_ID, columns::CLASSIFICATION, columns::IF_BOT];
        required.extend_from_slice(&MODEL_FEATURES);
        session::require_columns(labeled, &required)?;

        let truth = session::ground_truth(labeled)?;
        let missing = truth.iter().filter(|t| t.is_none()).count();
        if missing > 0 {
            warn!(missing, "Rows without a user_id left out of per-label tables");
        }

        Ok(Self {
            class_distribution: class_distribution(&truth)?,
            ml_caught_rules_missed: ml_caught_rules_missed(labeled, &truth)?,
            ml_false_positives: ml_false_positives(labeled, &truth)?,
            feature_correlation: feature_correlation(labeled, &MODEL_FEATURES)?,
            feature_summary: feature_summary(labeled, &truth, &BASE_FEATURES)?,
        })
    }

    pub fn tables(&self) -> [(&'static str, &DataFrame); 5] {
        [
            (CLASS_DISTRIBUTION, &self.class_distribution),
            (ML_CAUGHT_RULES_MISSED, &self.ml_caught_rules_missed),
            (ML_FALSE_POSITIVES, &self.ml_false_positives),
            (FEATURE_CORRELATION, &self.feature_correlation),
            (FEATURE_SUMMARY, &self.feature_summary),
        ]
    }

    /// Write each table to `<dir>/<name>.csv`
    pub fn write(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;

        let mut written = Vec::with_capacity(5);
        for (name, table) in self.tables() {
            let path = dir.join(format!("{}.csv", name));
            session::write_sessions(table, &path)?;
            written.push(path);
        }

        info!(dir = %dir.display(), tables = written.len(), "Wrote report tables");
        Ok(written)
    }
}

/// Build and write the report in one step
pub fn write_report(labeled: &DataFrame, dir: &Path) -> Result<Vec<PathBuf>> {
    SessionReport::build(labeled)?.write(dir)
}

/// Counts per ground-truth label
pub fn class_distribution(truth: &[Option<GroundTruth>]) -> Result<DataFrame> {
    let labels = [GroundTruth::Human, GroundTruth::Bot];
    let counts: Vec<u32> = labels
        .iter()
        .map(|label| truth.iter().filter(|t| **t == Some(*label)).count() as u32)
        .collect();
    let names: Vec<&str> = labels.iter().map(|l| l.as_str()).collect();

    Ok(df!(
        columns::ACTUAL_LABEL => names,
        "count" => counts,
    )?)
}

fn filter_rows(labeled: &DataFrame, keep: impl Iterator<Item = bool>) -> Result<DataFrame> {
    let mask: BooleanChunked = keep.map(Some).collect();
    Ok(labeled.filter(&mask)?)
}

fn if_flags(labeled: &DataFrame) -> Result<Vec<bool>> {
    Ok(session::int_column(labeled, columns::IF_BOT)?
        .into_iter()
        .map(|flag| flag == Some(1))
        .collect())
}

/// Actual bots the rules called Human but the isolation forest flagged
pub fn ml_caught_rules_missed(
    labeled: &DataFrame,
    truth: &[Option<GroundTruth>],
) -> Result<DataFrame> {
    let labels = session::session_labels(labeled)?;
    let flags = if_flags(labeled)?;

    filter_rows(
        labeled,
        truth
            .iter()
            .zip(labels.iter())
            .zip(flags.iter())
            .map(|((t, l), &f)| *t == Some(GroundTruth::Bot) && *l == Some(SessionLabel::Human) && f),
    )
}

/// Actual humans the isolation forest flagged
pub fn ml_false_positives(labeled: &DataFrame, truth: &[Option<GroundTruth>]) -> Result<DataFrame> {
    let flags = if_flags(labeled)?;
    filter_rows(
        labeled,
        truth
            .iter()
            .zip(flags.iter())
            .map(|(t, &f)| *t == Some(GroundTruth::Human) && f),
    )
}

/// Pearson correlation. NaN when either side has zero variance.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return f64::NAN;
    }

    let mean_x = x[..n].iter().sum::<f64>() / n as f64;
    let mean_y = y[..n].iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (a, b) in x[..n].iter().zip(y[..n].iter()) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return f64::NAN;
    }
    cov / (var_x * var_y).sqrt()
}

/// Square correlation matrix with a leading `feature` column
pub fn feature_correlation(labeled: &DataFrame, features: &[&str]) -> Result<DataFrame> {
    let data: Vec<Vec<f64>> = features
        .iter()
        .map(|name| sanitized_column(labeled, name))
        .collect::<Result<_>>()?;

    let mut cols: Vec<Column> = Vec::with_capacity(features.len() + 1);
    cols.push(Column::new("feature".into(), features.to_vec()));
    for (j, name) in features.iter().enumerate() {
        let values: Vec<f64> = data.iter().map(|row| pearson(row, &data[j])).collect();
        cols.push(Column::new((*name).into(), values));
    }

    Ok(DataFrame::new(cols)?)
}

/// Mean, median and sample std of each feature per ground-truth label
pub fn feature_summary(
    labeled: &DataFrame,
    truth: &[Option<GroundTruth>],
    features: &[&str],
) -> Result<DataFrame> {
    let mut label_col = Vec::new();
    let mut feature_col = Vec::new();
    let mut means = Vec::new();
    let mut medians = Vec::new();
    let mut stds = Vec::new();

    for label in [GroundTruth::Human, GroundTruth::Bot] {
        let subset = filter_rows(labeled, truth.iter().map(|t| *t == Some(label)))?;
        for name in features {
            let values = Series::new((*name).into(), sanitized_column(&subset, name)?);
            label_col.push(label.as_str());
            feature_col.push(*name);
            means.push(values.mean());
            medians.push(values.median());
            stds.push(values.std(1));
        }
    }

    if label_col.is_empty() {
        return Err(SentinelError::EmptyInput("no features to summarize".to_string()));
    }

    Ok(df!(
        columns::ACTUAL_LABEL => label_col,
        "feature" => feature_col,
        "mean" => means,
        "median" => medians,
        "std" => stds,
    )?)
}
