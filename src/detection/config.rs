//! Detection configuration

use crate::anomaly::{Gamma, IsolationForest, OneClassSvm};
use crate::error::{Result, SentinelError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default severity threshold on the isolation forest score
pub const DEFAULT_SEVERITY_THRESHOLD: f64 = -0.55;

/// Isolation forest hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    /// Number of trees
    pub n_estimators: usize,
    /// Expected fraction of outliers, in (0, 0.5]
    pub contamination: f64,
    /// Rows drawn per tree (`None` = min(256, n))
    pub max_samples: Option<usize>,
    /// Random seed for reproducibility
    pub random_state: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            contamination: 0.15,
            max_samples: None,
            random_state: 42,
        }
    }
}

impl ForestConfig {
    /// Reporting-only baseline: 100 trees, contamination 0.29
    pub fn baseline() -> Self {
        Self {
            n_estimators: 100,
            contamination: 0.29,
            ..Self::default()
        }
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_contamination(mut self, contamination: f64) -> Self {
        self.contamination = contamination;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Unfitted detector with these settings
    pub fn build(&self) -> IsolationForest {
        let forest = IsolationForest::new()
            .with_n_estimators(self.n_estimators)
            .with_contamination(self.contamination)
            .with_seed(self.random_state);
        match self.max_samples {
            Some(n) => forest.with_max_samples(n),
            None => forest,
        }
    }

    fn validate(&self, name: &str) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(invalid(
                &format!("{}.n_estimators", name),
                self.n_estimators,
                "must be at least 1",
            ));
        }
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(invalid(
                &format!("{}.contamination", name),
                self.contamination,
                "must be in (0, 0.5]",
            ));
        }
        if self.max_samples == Some(0) {
            return Err(invalid(&format!("{}.max_samples", name), 0, "must be at least 1"));
        }
        Ok(())
    }
}

/// One-class SVM hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OneClassConfig {
    /// Expected fraction of outliers, in (0, 1]
    pub nu: f64,
    /// RBF bandwidth
    pub gamma: Gamma,
    /// Solver stopping tolerance
    pub tol: f64,
    /// Solver iteration cap
    pub max_iter: usize,
}

impl Default for OneClassConfig {
    fn default() -> Self {
        Self {
            nu: 0.10,
            gamma: Gamma::Scale,
            tol: 1e-3,
            max_iter: 1_000_000,
        }
    }
}

impl OneClassConfig {
    pub fn with_nu(mut self, nu: f64) -> Self {
        self.nu = nu;
        self
    }

    pub fn with_gamma(mut self, gamma: Gamma) -> Self {
        self.gamma = gamma;
        self
    }

    /// Unfitted detector with these settings
    pub fn build(&self) -> OneClassSvm {
        OneClassSvm::new()
            .with_nu(self.nu)
            .with_gamma(self.gamma)
            .with_tol(self.tol)
            .with_max_iter(self.max_iter)
    }

    fn validate(&self) -> Result<()> {
        if !(self.nu > 0.0 && self.nu <= 1.0) {
            return Err(invalid("one_class.nu", self.nu, "must be in (0, 1]"));
        }
        if let Gamma::Value(g) = self.gamma {
            if !(g > 0.0 && g.is_finite()) {
                return Err(invalid("one_class.gamma", g, "must be a positive finite number"));
            }
        }
        if !(self.tol > 0.0 && self.tol.is_finite()) {
            return Err(invalid("one_class.tol", self.tol, "must be a positive finite number"));
        }
        if self.max_iter == 0 {
            return Err(invalid("one_class.max_iter", self.max_iter, "must be at least 1"));
        }
        Ok(())
    }
}

/// Configuration for the hybrid session classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// ML-only verdicts need `if_anomaly_score` strictly below this value
    pub severity_threshold: f64,
    /// Isolation forest trained on Human sessions
    pub forest: ForestConfig,
    /// One-class SVM trained on Human sessions
    pub one_class: OneClassConfig,
    /// Reporting-only baseline forest over the base features; `None` skips it
    pub baseline: Option<ForestConfig>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            severity_threshold: DEFAULT_SEVERITY_THRESHOLD,
            forest: ForestConfig::default(),
            one_class: OneClassConfig::default(),
            baseline: Some(ForestConfig::baseline()),
        }
    }
}

impl DetectionConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the severity threshold
    pub fn with_severity_threshold(mut self, threshold: f64) -> Self {
        self.severity_threshold = threshold;
        self
    }

    /// Builder method to set the isolation forest settings
    pub fn with_forest(mut self, forest: ForestConfig) -> Self {
        self.forest = forest;
        self
    }

    /// Builder method to set the one-class SVM settings
    pub fn with_one_class(mut self, one_class: OneClassConfig) -> Self {
        self.one_class = one_class;
        self
    }

    /// Builder method to set or disable the baseline forest
    pub fn with_baseline(mut self, baseline: Option<ForestConfig>) -> Self {
        self.baseline = baseline;
        self
    }

    /// Builder method to reseed every randomized detector
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.forest.random_state = seed;
        if let Some(baseline) = self.baseline.as_mut() {
            baseline.random_state = seed;
        }
        self
    }

    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if !self.severity_threshold.is_finite() {
            return Err(invalid(
                "severity_threshold",
                self.severity_threshold,
                "must be finite",
            ));
        }
        self.forest.validate("forest")?;
        self.one_class.validate()?;
        if let Some(baseline) = &self.baseline {
            baseline.validate("baseline")?;
        }
        Ok(())
    }

    /// Load from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn invalid(name: &str, value: impl ToString, reason: &str) -> SentinelError {
    SentinelError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
