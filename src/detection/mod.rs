//! Hybrid bot detection
//!
//! Rule labels from upstream are combined with two unsupervised detectors
//! trained on the sessions the rules consider human:
//!
//! - [`IsolationForest`](crate::anomaly::IsolationForest) supplies `if_bot`
//!   and the `if_anomaly_score` used as a severity gate
//! - [`OneClassSvm`](crate::anomaly::OneClassSvm) supplies `svm_bot`
//!
//! [`HybridClassifier`] runs the stages end to end.

mod config;
mod hybrid;
mod pipeline;
mod training;

pub use config::{DetectionConfig, ForestConfig, OneClassConfig, DEFAULT_SEVERITY_THRESHOLD};
pub use hybrid::{HybridPolicy, SessionSignals};
pub use pipeline::{DetectionOutput, DetectionSummary, HybridClassifier};
pub use training::{
    baseline_stage, outlier_flags, train_detectors, training_view, TrainedDetectors,
    TRAINING_LABEL,
};
