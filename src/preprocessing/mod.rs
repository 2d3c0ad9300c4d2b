//! Data preprocessing module
//!
//! Feature standardization for the detector training stage.

mod scaler;

pub use scaler::{ScalerParams, StandardScaler};
