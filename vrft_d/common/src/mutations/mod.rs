pub mod calibration;
pub mod normalization;
pub mod smoothing;

pub use calibration::{CalibrationHandle, CalibrationMutation, CalibrationStatus};
pub use normalization::NormalizationMutation;
pub use smoothing::SmoothingMutation;
