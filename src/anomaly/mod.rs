//! Anomaly detection module
//!
//! Provides the two unsupervised detectors used by the session classifier:
//! - Isolation Forest (ensemble of random partitioning trees)
//! - One-Class SVM (RBF kernel boundary estimator)
//!
//! Both follow the same convention: `score_samples` is lower for more
//! anomalous points and `predict` returns `-1` for outliers and `1` for inliers.

mod isolation_forest;
mod one_class_svm;

pub use isolation_forest::{IsolationForest, IsolationTree};
pub use one_class_svm::{Gamma, OneClassSvm};

use crate::error::Result;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Prediction label for an inlier
pub const INLIER: i32 = 1;
/// Prediction label for an outlier
pub const OUTLIER: i32 = -1;

/// Anomaly detection result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyResult {
    /// Anomaly scores (lower = more anomalous)
    pub scores: Array1<f64>,
    /// Labels (-1 = outlier, 1 = inlier)
    pub labels: Array1<i32>,
    /// Number of outliers
    pub n_anomalies: usize,
}

/// Trait for anomaly detectors
pub trait AnomalyDetector: Send + Sync {
    /// Fit the detector on training data
    fn fit(&mut self, x: &Array2<f64>) -> Result<()>;

    /// Anomaly scores for new data (lower = more anomalous)
    fn score_samples(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Predict labels (-1 = outlier, 1 = inlier)
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<i32>>;

    /// Fit and predict in one step
    fn fit_predict(&mut self, x: &Array2<f64>) -> Result<Array1<i32>> {
        self.fit(x)?;
        self.predict(x)
    }

    /// Scores and labels together
    fn detect(&self, x: &Array2<f64>) -> Result<AnomalyResult> {
        let scores = self.score_samples(x)?;
        let labels = self.predict(x)?;
        let n_anomalies = labels.iter().filter(|&&l| l == OUTLIER).count();

        Ok(AnomalyResult {
            scores,
            labels,
            n_anomalies,
        })
    }
}

/// Percentile of `values` with linear interpolation between closest ranks.
///
/// `q` is a fraction in [0, 1]. Returns `None` for an empty slice.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;

    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_interpolates() {
        let values = [4.0, 1.0, 3.0, 2.0, 5.0];
        assert_eq!(percentile(&values, 0.0), Some(1.0));
        assert_eq!(percentile(&values, 1.0), Some(5.0));
        assert_eq!(percentile(&values, 0.5), Some(3.0));
        assert!((percentile(&values, 0.1).unwrap() - 1.4).abs() < 1e-12);
        assert_eq!(percentile(&[], 0.5), None);
    }
}
