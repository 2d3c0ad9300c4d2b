//! Session table schema, labels and column access helpers
//!
//! A session table is a polars `DataFrame` with one row per browsing session.
//! This module names its columns, parses the categorical ones into typed
//! labels, and extracts numeric columns for the model stages.

mod loader;

pub use loader::{load_sessions, write_sessions};

use crate::error::{Result, SentinelError};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Column names used across the pipeline
pub mod columns {
    pub const USER_ID: &str = "user_id";
    pub const CLASSIFICATION: &str = "classification";
    pub const ACTUAL_LABEL: &str = "actual_label";

    pub const REQUESTS_PER_SEC: &str = "requests_per_sec";
    pub const AVG_SCROLL_DEPTH: &str = "avg_scroll_depth";
    pub const AVG_MOUSE_MOVEMENTS: &str = "avg_mouse_movements";
    pub const TOTAL_PAGES: &str = "total_pages";
    pub const SESSION_DURATION_SEC: &str = "session_duration_sec";

    pub const PAGES_PER_MIN: &str = "pages_per_min";
    pub const SCROLL_PER_SEC: &str = "scroll_per_sec";

    pub const IF_BASELINE_PRED: &str = "if_baseline_pred";
    pub const IF_BASELINE_BOT: &str = "if_baseline_bot";
    pub const IF_PRED: &str = "if_pred";
    pub const IF_ANOMALY_SCORE: &str = "if_anomaly_score";
    pub const IF_BOT: &str = "if_bot";
    pub const SVM_PRED: &str = "svm_pred";
    pub const SVM_BOT: &str = "svm_bot";
    pub const FINAL_BOT: &str = "final_bot";
}

/// Raw numeric features every input table must carry
pub const RAW_FEATURES: [&str; 5] = [
    columns::REQUESTS_PER_SEC,
    columns::AVG_SCROLL_DEPTH,
    columns::AVG_MOUSE_MOVEMENTS,
    columns::TOTAL_PAGES,
    columns::SESSION_DURATION_SEC,
];

/// Feature set of the reporting-only baseline detector
pub const BASE_FEATURES: [&str; 3] = [
    columns::REQUESTS_PER_SEC,
    columns::AVG_SCROLL_DEPTH,
    columns::AVG_MOUSE_MOVEMENTS,
];

/// Engineered feature set the scaler and both main detectors consume
pub const MODEL_FEATURES: [&str; 5] = [
    columns::REQUESTS_PER_SEC,
    columns::PAGES_PER_MIN,
    columns::AVG_SCROLL_DEPTH,
    columns::AVG_MOUSE_MOVEMENTS,
    columns::SCROLL_PER_SEC,
];

/// Prior rule-based label produced upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionLabel {
    Human,
    Bot,
    Suspicious,
}

impl SessionLabel {
    /// Parse an upstream label. Matching is exact; anything else is `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Human" => Some(SessionLabel::Human),
            "Bot" => Some(SessionLabel::Bot),
            "Suspicious" => Some(SessionLabel::Suspicious),
            _ => None,
        }
    }

    /// Whether the rule stage already considers this session a bot
    pub fn is_rule_bot(self) -> bool {
        matches!(self, SessionLabel::Bot | SessionLabel::Suspicious)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionLabel::Human => "Human",
            SessionLabel::Bot => "Bot",
            SessionLabel::Suspicious => "Suspicious",
        }
    }
}

impl fmt::Display for SessionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ground truth encoded in the first character of `user_id`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroundTruth {
    Human,
    Bot,
}

impl GroundTruth {
    /// `U...` is a human; any other leading character is a bot.
    /// An empty id carries no ground truth.
    pub fn from_user_id(user_id: &str) -> Option<Self> {
        match user_id.trim().chars().next()? {
            'U' => Some(GroundTruth::Human),
            _ => Some(GroundTruth::Bot),
        }
    }

    pub fn is_bot(self) -> bool {
        self == GroundTruth::Bot
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GroundTruth::Human => "Human",
            GroundTruth::Bot => "Bot",
        }
    }
}

impl fmt::Display for GroundTruth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Refuse to proceed unless every named column exists.
pub fn require_columns(df: &DataFrame, required: &[&str]) -> Result<()> {
    let present: Vec<&str> = df
        .get_column_names()
        .into_iter()
        .map(|name| name.as_str())
        .collect();

    let missing: Vec<String> = required
        .iter()
        .filter(|name| !present.contains(*name))
        .map(|name| name.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(SentinelError::MissingColumns(missing))
    }
}

/// Check that a table can go through the detection pipeline.
pub fn validate_schema(df: &DataFrame) -> Result<()> {
    let mut required: Vec<&str> = RAW_FEATURES.to_vec();
    required.push(columns::CLASSIFICATION);
    require_columns(df, &required)?;

    if df.height() == 0 {
        return Err(SentinelError::EmptyInput("session table has no rows".to_string()));
    }
    Ok(())
}

fn series<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    df.column(name)
        .map(|column| column.as_materialized_series())
        .map_err(|_| SentinelError::MissingColumns(vec![name.to_string()]))
}

/// Column values as `f64`. Unparseable values and nulls come back as `None`.
pub fn float_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let casted = series(df, name)?.cast(&DataType::Float64)?;
    Ok(casted.f64()?.into_iter().collect())
}

/// Column values as `i64`. Unparseable values and nulls come back as `None`.
pub fn int_column(df: &DataFrame, name: &str) -> Result<Vec<Option<i64>>> {
    let casted = series(df, name)?.cast(&DataType::Int64)?;
    Ok(casted.i64()?.into_iter().collect())
}

/// Column values as owned strings.
pub fn string_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let casted = series(df, name)?.cast(&DataType::String)?;
    Ok(casted
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Parsed `classification` column
pub fn session_labels(df: &DataFrame) -> Result<Vec<Option<SessionLabel>>> {
    Ok(string_column(df, columns::CLASSIFICATION)?
        .into_iter()
        .map(|v| v.as_deref().and_then(SessionLabel::parse))
        .collect())
}

/// Ground truth per row, derived from `user_id`
pub fn ground_truth(df: &DataFrame) -> Result<Vec<Option<GroundTruth>>> {
    Ok(string_column(df, columns::USER_ID)?
        .into_iter()
        .map(|v| v.as_deref().and_then(GroundTruth::from_user_id))
        .collect())
}

/// Row mask selecting sessions the rules labeled `label`
pub fn label_mask(df: &DataFrame, label: SessionLabel) -> Result<BooleanChunked> {
    let mask: BooleanChunked = session_labels(df)?
        .into_iter()
        .map(|v| Some(v == Some(label)))
        .collect();
    Ok(mask.with_name(columns::CLASSIFICATION.into()))
}

/// Extract named columns into a row-major matrix. Nulls become 0.
pub fn columns_to_array2(df: &DataFrame, col_names: &[&str]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let n_cols = col_names.len();

    let col_data: Vec<Vec<f64>> = col_names
        .iter()
        .map(|name| -> Result<Vec<f64>> {
            Ok(float_column(df, name)?
                .into_iter()
                .map(|v| v.unwrap_or(0.0))
                .collect())
        })
        .collect::<Result<Vec<Vec<f64>>>>()?;

    Ok(Array2::from_shape_fn((n_rows, n_cols), |(r, c)| col_data[c][r]))
}

/// Append `actual_label` derived from `user_id`, if the table has one.
pub fn annotate_ground_truth(df: &DataFrame) -> Result<DataFrame> {
    let mut out = df.clone();
    if df.column(columns::USER_ID).is_err() {
        return Ok(out);
    }

    let labels: Vec<Option<&str>> = ground_truth(df)?
        .into_iter()
        .map(|v| v.map(GroundTruth::as_str))
        .collect();
    out.with_column(Series::new(columns::ACTUAL_LABEL.into(), labels))?;
    Ok(out)
}
