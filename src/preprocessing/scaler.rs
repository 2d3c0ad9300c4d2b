//! Standard (z-score) feature scaling

use crate::error::{Result, SentinelError};
use crate::session;
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Parameters for one fitted column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    pub mean: f64,
    /// Population standard deviation; 1.0 for constant columns
    pub scale: f64,
}

/// Mean/variance scaler: `(x - mean) / std`
///
/// Fitted once on a training view and then applied unchanged to any frame
/// carrying the same columns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StandardScaler {
    columns: Vec<String>,
    params: Vec<ScalerParams>,
    n_samples_seen: usize,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit the scaler to the named columns of `df`
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        if df.height() == 0 {
            return Err(SentinelError::EmptyInput(
                "cannot fit scaler on an empty frame".to_string(),
            ));
        }

        let mut params = Vec::with_capacity(columns.len());
        for col_name in columns {
            let column = df
                .column(col_name)
                .map_err(|_| SentinelError::MissingColumns(vec![col_name.to_string()]))?;
            let series = column.as_materialized_series().cast(&DataType::Float64)?;
            let ca = series.f64()?;

            let mean = ca.mean().unwrap_or(0.0);
            let std = ca.std(0).unwrap_or(0.0);
            params.push(ScalerParams {
                mean,
                scale: if std == 0.0 || !std.is_finite() { 1.0 } else { std },
            });
        }

        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self.params = params;
        self.n_samples_seen = df.height();
        Ok(self)
    }

    /// Scale the fitted columns of `df` into a row-major matrix
    /// (columns in fit order).
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if !self.is_fitted() {
            return Err(SentinelError::ModelNotFitted);
        }

        let names: Vec<&str> = self.columns.iter().map(String::as_str).collect();
        let mut x = session::columns_to_array2(df, &names)?;
        self.transform_array(&mut x);
        Ok(x)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<Array2<f64>> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    /// Scale a matrix in place. Its columns must be in fit order.
    pub fn transform_array(&self, x: &mut Array2<f64>) {
        for (mut col, p) in x.columns_mut().into_iter().zip(self.params.iter()) {
            col.mapv_inplace(|v| (v - p.mean) / p.scale);
        }
    }

    pub fn is_fitted(&self) -> bool {
        !self.params.is_empty()
    }

    pub fn params(&self) -> &[ScalerParams] {
        &self.params
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn n_samples_seen(&self) -> usize {
        self.n_samples_seen
    }
}
