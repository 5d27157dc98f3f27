use crate::UnifiedExpressions;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Ceiling of a channel that has never been observed.
pub const UNOBSERVED_CEILING: f32 = 0.0;
/// Floor of a channel that has never been observed.
pub const UNOBSERVED_FLOOR: f32 = 999.0;

/// Linear interpolation from `a` (t = 0) to `b` (t = 1).
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a * (1.0 - t) + b * t
}

#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationState {
    /// No range established, data passes through untouched.
    Idle,
    Learning { started: Instant, duration: Duration },
    SteadyState,
}

impl CalibrationState {
    pub fn is_learning(&self) -> bool {
        matches!(self, Self::Learning { .. })
    }

    /// Fraction of the learning window elapsed, 1.0 outside of learning.
    pub fn progress(&self) -> f32 {
        match self {
            Self::Learning { started, duration } if !duration.is_zero() => {
                (started.elapsed().as_secs_f32() / duration.as_secs_f32()).clamp(0.0, 1.0)
            }
            Self::Learning { .. } => 1.0,
            Self::Idle => 0.0,
            Self::SteadyState => 1.0,
        }
    }
}

/// Learned dynamic range of one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationParameter {
    pub name: String,
    pub ceiling: f32,
    pub floor: f32,
    /// Reserved for damping; stored but not applied.
    #[serde(default)]
    pub smoothness: f32,
}

impl CalibrationParameter {
    pub fn unobserved(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ceiling: UNOBSERVED_CEILING,
            floor: UNOBSERVED_FLOOR,
            smoothness: 0.0,
        }
    }

    /// Pull the range toward `weight` when it lies outside. A zero
    /// `calibration_weight` freezes the range.
    pub fn observe(&mut self, weight: f32, calibration_weight: f32) {
        if calibration_weight <= 0.0 {
            return;
        }
        if weight > self.ceiling {
            self.ceiling = lerp(weight, self.ceiling, calibration_weight);
        }
        if weight < self.floor {
            self.floor = lerp(weight, self.floor, calibration_weight);
        }
    }

    /// Rescale into the learned range. Not clamped: values outside the range
    /// map outside [0, 1]. A zero-width range yields 0.0.
    pub fn normalize(&self, weight: f32) -> f32 {
        let span = self.ceiling - self.floor;
        if span == 0.0 {
            return 0.0;
        }
        let normalized = (weight - self.floor) / span;
        if normalized.is_finite() {
            normalized
        } else {
            0.0
        }
    }

    /// Observe then normalize. Weights at or below zero are left alone.
    pub fn calibrate(&mut self, weight: f32, calibration_weight: f32) -> f32 {
        if weight <= 0.0 || weight.is_nan() {
            return weight;
        }
        self.observe(weight, calibration_weight);
        self.normalize(weight)
    }

    pub fn is_observed(&self) -> bool {
        self.ceiling != UNOBSERVED_CEILING || self.floor != UNOBSERVED_FLOOR
    }

    pub(crate) fn sanitize(&mut self) {
        if !self.ceiling.is_finite() {
            self.ceiling = UNOBSERVED_CEILING;
        }
        if !self.floor.is_finite() {
            self.floor = UNOBSERVED_FLOOR;
        }
        if !self.smoothness.is_finite() {
            self.smoothness = 0.0;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationData {
    pub pupil: CalibrationParameter,
    pub gaze: CalibrationParameter,
    pub openness: CalibrationParameter,
    pub shapes: Vec<CalibrationParameter>,
    pub calibration_weight: f32,
    #[serde(default = "default_continuous")]
    pub continuous_calibration: bool,
}

fn default_continuous() -> bool {
    true
}

impl Default for CalibrationData {
    fn default() -> Self {
        Self {
            pupil: CalibrationParameter::unobserved("Pupil"),
            gaze: CalibrationParameter::unobserved("Gaze"),
            openness: CalibrationParameter::unobserved("Openness"),
            shapes: UnifiedExpressions::iter()
                .map(|expr| CalibrationParameter::unobserved(expr.name()))
                .collect(),
            calibration_weight: 0.0,
            continuous_calibration: default_continuous(),
        }
    }
}

impl CalibrationData {
    /// Put every channel, eye records included, back to the unobserved sentinels.
    pub fn clear(&mut self) {
        let continuous = self.continuous_calibration;
        *self = Self {
            continuous_calibration: continuous,
            ..Self::default()
        };
    }

    pub fn has_observations(&self) -> bool {
        self.shapes.iter().any(CalibrationParameter::is_observed)
    }

    /// Copy records from `loaded` onto matching channel names. Unknown names
    /// are dropped, missing channels stay unobserved.
    pub fn merge_from(&mut self, loaded: CalibrationData) {
        for record in loaded.shapes {
            if let Some(slot) = self.shapes.iter_mut().find(|s| s.name == record.name) {
                *slot = record;
            }
        }
        self.pupil = loaded.pupil;
        self.gaze = loaded.gaze;
        self.openness = loaded.openness;
        self.calibration_weight = loaded.calibration_weight.clamp(0.0, 1.0);
        self.continuous_calibration = loaded.continuous_calibration;
        self.sanitize();
    }

    pub(crate) fn sanitize(&mut self) {
        self.pupil.sanitize();
        self.gaze.sanitize();
        self.openness.sanitize();
        for shape in &mut self.shapes {
            shape.sanitize();
        }
        if !self.calibration_weight.is_finite() {
            self.calibration_weight = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lerp_endpoints() {
        assert_eq!(lerp(2.0, 4.0, 0.0), 2.0);
        assert_eq!(lerp(2.0, 4.0, 1.0), 4.0);
        assert_eq!(lerp(2.0, 4.0, 0.5), 3.0);
    }

    #[test]
    fn observe_blends_toward_new_extremes() {
        let mut p = CalibrationParameter::unobserved("JawOpen");
        p.observe(0.8, 0.75);
        // 0.8 * 0.25 + 0.0 * 0.75
        assert!((p.ceiling - 0.2).abs() < 1e-6);
        // 0.8 * 0.25 + 999 * 0.75
        assert!((p.floor - 749.45).abs() < 1e-3);
    }

    #[test]
    fn zero_weight_freezes_range() {
        let mut p = CalibrationParameter {
            name: "JawOpen".into(),
            ceiling: 0.6,
            floor: 0.1,
            smoothness: 0.0,
        };
        p.observe(0.9, 0.0);
        p.observe(0.05, 0.0);
        assert_eq!(p.ceiling, 0.6);
        assert_eq!(p.floor, 0.1);
    }

    #[test]
    fn zero_width_range_normalizes_to_zero() {
        let p = CalibrationParameter {
            name: "JawOpen".into(),
            ceiling: 0.0,
            floor: 0.0,
            smoothness: 0.0,
        };
        assert_eq!(p.normalize(0.5), 0.0);
    }

    #[test]
    fn clear_keeps_continuous_flag() {
        let mut data = CalibrationData {
            continuous_calibration: false,
            calibration_weight: 0.5,
            ..CalibrationData::default()
        };
        data.shapes[0].ceiling = 0.9;

        data.clear();
        assert!(!data.continuous_calibration);
        assert_eq!(data.calibration_weight, 0.0);
        assert!(!data.has_observations());
    }

    #[test]
    fn merge_matches_by_name() {
        let mut loaded = CalibrationData::default();
        loaded.shapes.retain(|s| s.name == "JawOpen");
        loaded.shapes[0].ceiling = 0.7;
        loaded.shapes[0].floor = 0.05;
        loaded.shapes.push(CalibrationParameter::unobserved("NoLongerExists"));

        let mut data = CalibrationData::default();
        data.merge_from(loaded);

        let jaw = data.shapes.iter().find(|s| s.name == "JawOpen").unwrap();
        assert_eq!(jaw.ceiling, 0.7);
        assert_eq!(data.shapes.len(), UnifiedExpressions::Max as usize);
        assert!(data.shapes.iter().all(|s| s.name != "NoLongerExists"));
    }
}
