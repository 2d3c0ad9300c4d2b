//! Isolation Forest anomaly detection

use crate::anomaly::{percentile, AnomalyDetector, INLIER, OUTLIER};
use crate::error::{Result, SentinelError};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand::seq::index;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Sub-sample size used when `max_samples` is left on auto
const AUTO_MAX_SAMPLES: usize = 256;

/// Euler-Mascheroni constant
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Isolation Tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IsolationTree {
    /// Internal node with split
    Internal {
        /// Feature index for split
        feature: usize,
        /// Split threshold
        threshold: f64,
        /// Left subtree (values < threshold)
        left: Box<IsolationTree>,
        /// Right subtree (values >= threshold)
        right: Box<IsolationTree>,
    },
    /// External (leaf) node
    External {
        /// Number of samples in this node
        size: usize,
    },
}

/// Uniform draw in `[min_val, max_val]` as a convex combination, so the
/// width `max_val - min_val` is never formed and cannot overflow.
/// `None` when the bounds are not finite.
fn split_threshold(min_val: f64, max_val: f64, rng: &mut impl Rng) -> Option<f64> {
    let u: f64 = rng.gen();
    let threshold = min_val * (1.0 - u) + max_val * u;
    threshold.is_finite().then_some(threshold.clamp(min_val, max_val))
}

impl IsolationTree {
    /// Build an isolation tree over the rows in `indices`
    pub fn build(
        x: &Array2<f64>,
        indices: &[usize],
        height: usize,
        max_height: usize,
        rng: &mut impl Rng,
    ) -> Self {
        let n_samples = indices.len();

        if height >= max_height || n_samples <= 1 {
            return IsolationTree::External { size: n_samples };
        }

        // Try features in random order until one still varies in this node
        let mut features: Vec<usize> = (0..x.ncols()).collect();
        features.shuffle(rng);

        let split = features.into_iter().find_map(|feature| {
            let (min_val, max_val) = indices.iter().fold(
                (f64::INFINITY, f64::NEG_INFINITY),
                |(lo, hi), &i| (lo.min(x[[i, feature]]), hi.max(x[[i, feature]])),
            );
            (max_val > min_val).then_some((feature, min_val, max_val))
        });

        let Some((feature, min_val, max_val)) = split else {
            return IsolationTree::External { size: n_samples };
        };

        let Some(threshold) = split_threshold(min_val, max_val, rng) else {
            return IsolationTree::External { size: n_samples };
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, feature]] < threshold);

        if left_indices.is_empty() || right_indices.is_empty() {
            return IsolationTree::External { size: n_samples };
        }

        let left = Box::new(Self::build(x, &left_indices, height + 1, max_height, rng));
        let right = Box::new(Self::build(x, &right_indices, height + 1, max_height, rng));

        IsolationTree::Internal {
            feature,
            threshold,
            left,
            right,
        }
    }

    /// Path length of a sample, with the unbuilt subtree below a leaf
    /// estimated by `c(size)`
    pub fn path_length(&self, sample: ArrayView1<f64>, current_height: usize) -> f64 {
        match self {
            IsolationTree::External { size } => current_height as f64 + average_path_length(*size),
            IsolationTree::Internal {
                feature,
                threshold,
                left,
                right,
            } => {
                if sample[*feature] < *threshold {
                    left.path_length(sample, current_height + 1)
                } else {
                    right.path_length(sample, current_height + 1)
                }
            }
        }
    }

    /// Depth of the deepest leaf
    pub fn depth(&self) -> usize {
        match self {
            IsolationTree::External { .. } => 0,
            IsolationTree::Internal { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

/// Average path length of an unsuccessful search in a BST of `n` nodes:
/// c(n) = 2 H(n-1) - 2(n-1)/n, with H(i) ~ ln(i) + gamma
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n_f = n as f64;
            2.0 * ((n_f - 1.0).ln() + EULER_GAMMA) - 2.0 * (n_f - 1.0) / n_f
        }
    }
}

/// Isolation Forest anomaly detector
///
/// `score_samples` returns `-2^(-E[h(x)] / c(psi))` in `[-1, 0]`; the
/// decision offset is the `contamination` quantile of the training scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForest {
    /// Number of trees
    n_estimators: usize,
    /// Rows drawn per tree; `None` means `min(256, n_samples)`
    max_samples: Option<usize>,
    /// Expected proportion of outliers in the training data
    contamination: f64,
    /// Random seed
    seed: Option<u64>,
    /// Fitted trees
    trees: Option<Vec<IsolationTree>>,
    /// Score below which a sample is an outlier
    offset: Option<f64>,
    /// Rows actually drawn per tree at fit time
    samples_per_tree: Option<usize>,
}

impl IsolationForest {
    /// Create new Isolation Forest
    pub fn new() -> Self {
        Self {
            n_estimators: 100,
            max_samples: None,
            contamination: 0.1,
            seed: None,
            trees: None,
            offset: None,
            samples_per_tree: None,
        }
    }

    /// Set number of trees
    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n.max(1);
        self
    }

    /// Set maximum samples per tree
    pub fn with_max_samples(mut self, n: usize) -> Self {
        self.max_samples = Some(n.max(1));
        self
    }

    /// Set contamination ratio
    pub fn with_contamination(mut self, c: f64) -> Self {
        self.contamination = c.clamp(0.0, 0.5);
        self
    }

    /// Set random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn n_estimators(&self) -> usize {
        self.n_estimators
    }

    pub fn contamination(&self) -> f64 {
        self.contamination
    }

    /// Decision offset learned at fit time
    pub fn offset(&self) -> Option<f64> {
        self.offset
    }

    /// Fitted trees, if any
    pub fn trees(&self) -> Option<&[IsolationTree]> {
        self.trees.as_deref()
    }

    /// `score_samples(x) - offset`: negative for outliers
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let offset = self.offset.ok_or(SentinelError::ModelNotFitted)?;
        Ok(self.score_samples(x)? - offset)
    }

    fn compute_scores(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let trees = self.trees.as_ref().ok_or(SentinelError::ModelNotFitted)?;
        let c_n = average_path_length(self.samples_per_tree.unwrap_or(AUTO_MAX_SAMPLES));

        let scores: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|r| {
                let sample = x.row(r);
                let avg_path_length = trees
                    .iter()
                    .map(|tree| tree.path_length(sample, 0))
                    .sum::<f64>()
                    / trees.len() as f64;

                -(2.0_f64.powf(-avg_path_length / c_n))
            })
            .collect();

        Ok(Array1::from_vec(scores))
    }
}

impl Default for IsolationForest {
    fn default() -> Self {
        Self::new()
    }
}

impl AnomalyDetector for IsolationForest {
    fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        let n_samples = x.nrows();
        if n_samples < 2 {
            return Err(SentinelError::TrainingError(format!(
                "isolation forest needs at least 2 samples, got {}",
                n_samples
            )));
        }
        if x.ncols() == 0 {
            return Err(SentinelError::TrainingError(
                "isolation forest needs at least 1 feature".to_string(),
            ));
        }

        let samples_per_tree = self
            .max_samples
            .unwrap_or(AUTO_MAX_SAMPLES)
            .clamp(2, n_samples);
        let max_height = (samples_per_tree as f64).log2().ceil() as usize;

        // Per-tree seeds are drawn up front so the parallel build is reproducible
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let tree_seeds: Vec<u64> = (0..self.n_estimators).map(|_| rng.gen()).collect();

        let trees: Vec<IsolationTree> = tree_seeds
            .into_par_iter()
            .map(|tree_seed| {
                let mut tree_rng = Xoshiro256PlusPlus::seed_from_u64(tree_seed);
                let indices = index::sample(&mut tree_rng, n_samples, samples_per_tree).into_vec();
                IsolationTree::build(x, &indices, 0, max_height, &mut tree_rng)
            })
            .collect();

        self.trees = Some(trees);
        self.samples_per_tree = Some(samples_per_tree);

        let train_scores = self.compute_scores(x)?;
        self.offset = percentile(&train_scores.to_vec(), self.contamination);

        Ok(())
    }

    fn score_samples(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.compute_scores(x)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<i32>> {
        let offset = self.offset.ok_or(SentinelError::ModelNotFitted)?;
        let scores = self.score_samples(x)?;

        Ok(scores.mapv(|s| if s < offset { OUTLIER } else { INLIER }))
    }
}
