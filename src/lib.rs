//! Session Sentinel - hybrid bot session classifier
//!
//! Combines an upstream rule label with two unsupervised anomaly detectors
//! trained on the sessions the rules consider human:
//!
//! ```text
//! final_bot = rule_bot OR (ml_bot AND if_anomaly_score < severity_threshold)
//! ```
//!
//! # Modules
//!
//! ## Data
//! - [`session`] - Session table schema, labels, loading and writing
//! - [`feature_engineering`] - Rate features and value sanitization
//! - [`preprocessing`] - Standard scaling
//!
//! ## Detection
//! - [`anomaly`] - Isolation Forest and One-Class SVM
//! - [`detection`] - Configuration, training, hybrid decision and pipeline
//!
//! ## Analysis
//! - [`evaluation`] - Per-signal classification reports against ground truth
//! - [`reporting`] - Exploratory report tables
//!
//! ## Services
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Data
pub mod session;
pub mod feature_engineering;
pub mod preprocessing;

// Detection
pub mod anomaly;
pub mod detection;

// Analysis
pub mod evaluation;
pub mod reporting;

// Services
pub mod cli;

pub use error::{Result, SentinelError};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{Result, SentinelError};

    // Session data
    pub use crate::session::{
        columns, load_sessions, write_sessions, GroundTruth, SessionLabel, MODEL_FEATURES,
    };

    // Features and scaling
    pub use crate::feature_engineering::engineer_features;
    pub use crate::preprocessing::StandardScaler;

    // Anomaly detection
    pub use crate::anomaly::{AnomalyDetector, Gamma, IsolationForest, OneClassSvm};

    // Hybrid detection
    pub use crate::detection::{
        DetectionConfig, DetectionOutput, ForestConfig, HybridClassifier, HybridPolicy,
        OneClassConfig,
    };

    // Evaluation and reporting
    pub use crate::evaluation::{evaluate_signals, ClassificationReport, Signal};
    pub use crate::reporting::{write_report, SessionReport};
}
