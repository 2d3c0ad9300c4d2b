//! One-Class SVM novelty detection
//!
//! Estimates the support of the training distribution with an RBF kernel.
//! The dual problem
//!
//! ```text
//! min 1/2 a^T K a   s.t.  0 <= a_i <= 1,  sum(a) = nu * n
//! ```
//!
//! is solved with SMO using maximal-violating-pair working-set selection.
//! A sample is an inlier when `sum_i a_i K(x_i, x) - rho > 0`.

use crate::anomaly::{AnomalyDetector, INLIER, OUTLIER};
use crate::error::{Result, SentinelError};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Maximum number of training samples for eager kernel matrix computation.
/// Beyond this, training will return an error to prevent OOM.
const MAX_KERNEL_MATRIX_SAMPLES: usize = 10_000;

/// Upper bound on every dual coefficient
const C: f64 = 1.0;

/// Smallest curvature used when two kernel columns coincide
const TAU: f64 = 1e-12;

/// RBF kernel bandwidth
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gamma {
    /// `1 / (n_features * Var(X))` over all training values; 1.0 if that variance is 0
    Scale,
    /// Fixed value
    Value(f64),
}

impl Default for Gamma {
    fn default() -> Self {
        Gamma::Scale
    }
}

impl Gamma {
    /// Resolve to a concrete bandwidth for a training matrix
    pub fn resolve(&self, x: &Array2<f64>) -> f64 {
        match *self {
            Gamma::Value(g) => g,
            Gamma::Scale => {
                let n = x.len();
                if n == 0 {
                    return 1.0;
                }
                let mean = x.sum() / n as f64;
                let var = x.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n as f64;
                if var == 0.0 || !var.is_finite() {
                    1.0
                } else {
                    1.0 / (x.ncols() as f64 * var)
                }
            }
        }
    }
}

/// One-Class SVM with an RBF kernel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneClassSvm {
    /// Upper bound on the fraction of training outliers (and lower bound on
    /// the fraction of support vectors)
    nu: f64,
    gamma: Gamma,
    /// Stopping tolerance on the maximal KKT violation
    tol: f64,
    max_iter: usize,
    /// Bandwidth resolved at fit time
    fitted_gamma: Option<f64>,
    support_vectors: Option<Array2<f64>>,
    dual_coef: Option<Array1<f64>>,
    rho: f64,
    n_iter: usize,
}

impl OneClassSvm {
    pub fn new() -> Self {
        Self {
            nu: 0.5,
            gamma: Gamma::Scale,
            tol: 1e-3,
            max_iter: 1_000_000,
            fitted_gamma: None,
            support_vectors: None,
            dual_coef: None,
            rho: 0.0,
            n_iter: 0,
        }
    }

    /// Set nu, kept inside (0, 1]
    pub fn with_nu(mut self, nu: f64) -> Self {
        self.nu = nu.clamp(f64::EPSILON, 1.0);
        self
    }

    pub fn with_gamma(mut self, gamma: Gamma) -> Self {
        self.gamma = gamma;
        self
    }

    /// Set the stopping tolerance, kept strictly positive
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = if tol.is_nan() { 1e-3 } else { tol.max(f64::EPSILON) };
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter.max(1);
        self
    }

    pub fn nu(&self) -> f64 {
        self.nu
    }

    pub fn tol(&self) -> f64 {
        self.tol
    }

    /// Kernel bandwidth in use after fitting
    pub fn fitted_gamma(&self) -> Option<f64> {
        self.fitted_gamma
    }

    pub fn rho(&self) -> f64 {
        self.rho
    }

    pub fn n_support(&self) -> usize {
        self.support_vectors.as_ref().map_or(0, |sv| sv.nrows())
    }

    /// SMO iterations run by the last fit
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Signed distance to the learned boundary; negative outside the support
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.score_samples(x)? - self.rho)
    }

    fn rbf(gamma: f64, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        let sq_dist: f64 = a.iter().zip(b.iter()).map(|(u, v)| (u - v) * (u - v)).sum();
        (-gamma * sq_dist).exp()
    }

    /// Compute kernel matrix (rows in parallel)
    fn compute_kernel_matrix(x: &Array2<f64>, gamma: f64) -> Array2<f64> {
        let n = x.nrows();

        let rows: Vec<Vec<(usize, f64)>> = (0..n)
            .into_par_iter()
            .map(|i| {
                (i..n)
                    .map(|j| (j, Self::rbf(gamma, x.row(i), x.row(j))))
                    .collect()
            })
            .collect();

        let mut k = Array2::zeros((n, n));
        for (i, row_vals) in rows.into_iter().enumerate() {
            for (j, val) in row_vals {
                k[[i, j]] = val;
                k[[j, i]] = val;
            }
        }
        k
    }

    /// Solve the dual. Returns the coefficients and the number of iterations.
    fn smo_train(&self, k: &Array2<f64>) -> (Array1<f64>, f64, usize) {
        let n = k.nrows();
        let total = self.nu * n as f64;

        // Feasible start: the first floor(nu * n) coefficients at the bound,
        // the remainder on the next one
        let mut alpha = Array1::<f64>::zeros(n);
        let n_full = (total.floor() as usize).min(n);
        for a in alpha.iter_mut().take(n_full) {
            *a = C;
        }
        if n_full < n {
            alpha[n_full] = total - n_full as f64;
        }

        // Gradient of 1/2 a^T K a
        let mut grad = k.dot(&alpha);

        let mut iter = 0;
        while iter < self.max_iter {
            // i: smallest gradient among coefficients that can grow
            // j: largest gradient among coefficients that can shrink
            let mut i = None;
            let mut j = None;
            for t in 0..n {
                if alpha[t] < C && i.map_or(true, |s: usize| grad[t] < grad[s]) {
                    i = Some(t);
                }
                if alpha[t] > 0.0 && j.map_or(true, |s: usize| grad[t] > grad[s]) {
                    j = Some(t);
                }
            }

            let (Some(i), Some(j)) = (i, j) else { break };
            if grad[j] - grad[i] < self.tol {
                break;
            }

            let eta = (k[[i, i]] + k[[j, j]] - 2.0 * k[[i, j]]).max(TAU);
            let room_i = C - alpha[i];
            let delta = ((grad[j] - grad[i]) / eta).min(room_i).min(alpha[j]);

            // Snap to the bounds exactly so the active sets stay clean
            alpha[i] = if delta >= room_i { C } else { alpha[i] + delta };
            alpha[j] = if delta >= alpha[j] { 0.0 } else { alpha[j] - delta };

            let col_i = k.column(i);
            let col_j = k.column(j);
            grad.zip_mut_with(&(&col_i - &col_j), |g, d| *g += delta * d);

            iter += 1;
        }

        if iter >= self.max_iter {
            warn!(max_iter = self.max_iter, "One-class SVM solver hit the iteration limit");
        }

        let rho = Self::compute_rho(&alpha, &grad);
        (alpha, rho, iter)
    }

    /// Offset from free coefficients, or the midpoint of the bound-derived
    /// interval when none is free
    fn compute_rho(alpha: &Array1<f64>, grad: &Array1<f64>) -> f64 {
        let mut ub = f64::INFINITY;
        let mut lb = f64::NEG_INFINITY;
        let mut n_free = 0usize;
        let mut sum_free = 0.0;

        for (&a, &g) in alpha.iter().zip(grad.iter()) {
            if a >= C {
                lb = lb.max(g);
            } else if a <= 0.0 {
                ub = ub.min(g);
            } else {
                n_free += 1;
                sum_free += g;
            }
        }

        if n_free > 0 {
            sum_free / n_free as f64
        } else if ub.is_finite() && lb.is_finite() {
            (ub + lb) / 2.0
        } else if ub.is_finite() {
            ub
        } else {
            lb
        }
    }
}

impl Default for OneClassSvm {
    fn default() -> Self {
        Self::new()
    }
}

impl AnomalyDetector for OneClassSvm {
    fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        let n = x.nrows();
        if n == 0 {
            return Err(SentinelError::TrainingError(
                "one-class SVM needs at least 1 sample".to_string(),
            ));
        }
        if n > MAX_KERNEL_MATRIX_SAMPLES {
            return Err(SentinelError::TrainingError(format!(
                "Training set has {} samples, exceeding the maximum {} for the SVM kernel matrix. \
                 Consider subsampling the training view.",
                n, MAX_KERNEL_MATRIX_SAMPLES
            )));
        }

        let gamma = self.gamma.resolve(x);
        let kernel_matrix = Self::compute_kernel_matrix(x, gamma);
        let (alpha, rho, n_iter) = self.smo_train(&kernel_matrix);

        let support_indices: Vec<usize> = alpha
            .iter()
            .enumerate()
            .filter(|(_, &a)| a > 0.0)
            .map(|(i, _)| i)
            .collect();

        let mut support_vectors = Array2::zeros((support_indices.len(), x.ncols()));
        let mut dual_coef = Array1::zeros(support_indices.len());
        for (row, &idx) in support_indices.iter().enumerate() {
            support_vectors.row_mut(row).assign(&x.row(idx));
            dual_coef[row] = alpha[idx];
        }

        debug!(
            gamma,
            rho,
            n_iter,
            n_support = support_indices.len(),
            "Fitted one-class SVM"
        );

        self.fitted_gamma = Some(gamma);
        self.support_vectors = Some(support_vectors);
        self.dual_coef = Some(dual_coef);
        self.rho = rho;
        self.n_iter = n_iter;
        Ok(())
    }

    /// Unshifted kernel expansion `sum_i a_i K(x_i, x)`
    fn score_samples(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (sv, coef, gamma) = match (&self.support_vectors, &self.dual_coef, self.fitted_gamma) {
            (Some(sv), Some(coef), Some(gamma)) => (sv, coef, gamma),
            _ => return Err(SentinelError::ModelNotFitted),
        };
        if x.ncols() != sv.ncols() {
            return Err(SentinelError::ShapeError {
                expected: format!("{} features", sv.ncols()),
                actual: format!("{} features", x.ncols()),
            });
        }

        let scores: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|r| {
                sv.rows()
                    .into_iter()
                    .zip(coef.iter())
                    .map(|(s, &a)| a * Self::rbf(gamma, s, x.row(r)))
                    .sum()
            })
            .collect();

        Ok(Array1::from_vec(scores))
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<i32>> {
        let decision = self.decision_function(x)?;
        Ok(decision.mapv(|d| if d > 0.0 { INLIER } else { OUTLIER }))
    }
}
