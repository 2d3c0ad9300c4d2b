//! Session feature engineering
//!
//! Derives rate features from the raw session counters and sanitizes every
//! numeric column the detectors read, so that no missing or non-finite value
//! reaches the model stages.

use crate::error::Result;
use crate::session::{self, columns, MODEL_FEATURES};
use ndarray::Array2;
use polars::prelude::*;
use tracing::debug;

/// A derived feature `numerator / (denominator / per)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatioFeature {
    /// Output column name
    pub name: &'static str,
    pub numerator: &'static str,
    pub denominator: &'static str,
    /// Unit conversion applied to the denominator (60.0 turns seconds into minutes)
    pub per: f64,
}

impl RatioFeature {
    /// Ratio value for one row.
    ///
    /// Zero denominators, missing inputs and non-finite results all map to 0.
    pub fn apply(&self, numerator: Option<f64>, denominator: Option<f64>) -> f64 {
        let (num, den) = match (numerator, denominator) {
            (Some(n), Some(d)) => (n, d / self.per),
            _ => return 0.0,
        };

        if den == 0.0 {
            return 0.0;
        }
        sanitize(Some(num / den))
    }
}

/// Rate features derived for every session
pub const SESSION_RATIOS: [RatioFeature; 2] = [
    RatioFeature {
        name: columns::PAGES_PER_MIN,
        numerator: columns::TOTAL_PAGES,
        denominator: columns::SESSION_DURATION_SEC,
        per: 60.0,
    },
    RatioFeature {
        name: columns::SCROLL_PER_SEC,
        numerator: columns::AVG_SCROLL_DEPTH,
        denominator: columns::SESSION_DURATION_SEC,
        per: 1.0,
    },
];

/// Missing and non-finite values become 0.
#[inline]
pub fn sanitize(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

/// Sanitized column values
pub fn sanitized_column(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let raw = session::float_column(df, name)?;
    let replaced = raw
        .iter()
        .filter(|v| !matches!(v, Some(x) if x.is_finite()))
        .count();
    if replaced > 0 {
        debug!(column = name, replaced, "Replaced missing/non-finite values with 0");
    }
    Ok(raw.into_iter().map(sanitize).collect())
}

/// Row-major matrix of sanitized feature columns
pub fn sanitized_matrix(df: &DataFrame, col_names: &[&str]) -> Result<Array2<f64>> {
    let col_data: Vec<Vec<f64>> = col_names
        .iter()
        .map(|name| sanitized_column(df, name))
        .collect::<Result<Vec<_>>>()?;

    Ok(Array2::from_shape_fn((df.height(), col_names.len()), |(r, c)| {
        col_data[c][r]
    }))
}

/// Append the rate features and sanitize every model feature column.
///
/// Pure function of the input table: the result is a new frame, the input is
/// left untouched.
pub fn engineer_features(df: &DataFrame) -> Result<DataFrame> {
    let mut out = df.clone();

    for ratio in SESSION_RATIOS.iter() {
        let numerator = session::float_column(df, ratio.numerator)?;
        let denominator = session::float_column(df, ratio.denominator)?;

        let values: Vec<f64> = numerator
            .iter()
            .zip(denominator.iter())
            .map(|(&n, &d)| ratio.apply(n, d))
            .collect();

        out.with_column(Series::new(ratio.name.into(), values))?;
    }

    for name in MODEL_FEATURES {
        let values = sanitized_column(&out, name)?;
        out.with_column(Series::new(name.into(), values))?;
    }

    debug!(rows = out.height(), "Engineered session features");
    Ok(out)
}
