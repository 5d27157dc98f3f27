use crate::config::Config;
use crate::mutation_trait::{Mutation, MutationPhase};
use crate::UnifiedTrackingData;
use anyhow::Result;
use std::any::Any;

const MIN_PUPIL_SPAN: f32 = 0.001;
const UNKNOWN_PUPIL: f32 = 0.5;

#[derive(Debug, Clone, Copy)]
struct PupilRange {
    min: f32,
    max: f32,
}

impl Default for PupilRange {
    fn default() -> Self {
        Self {
            min: 999.0,
            max: 0.0,
        }
    }
}

impl PupilRange {
    fn normalize(&mut self, diameter_mm: f32) -> f32 {
        if diameter_mm > 0.0 {
            self.min = self.min.min(diameter_mm);
            self.max = self.max.max(diameter_mm);
        }

        let span = self.max - self.min;
        if span > MIN_PUPIL_SPAN {
            (diameter_mm - self.min) / span
        } else {
            UNKNOWN_PUPIL
        }
    }
}

/// Maps pupil diameters in millimetres onto the observed [min, max] range.
#[derive(Default)]
pub struct NormalizationMutation {
    left: PupilRange,
    right: PupilRange,
}

impl NormalizationMutation {
    pub fn new(_config: &Config) -> Self {
        Self::default()
    }
}

impl Mutation for NormalizationMutation {
    fn name(&self) -> &str {
        "Pupil Normalization"
    }

    fn description(&self) -> &str {
        "Rescales pupil diameter into the range seen since startup."
    }

    fn phase(&self) -> MutationPhase {
        MutationPhase::Preprocessor
    }

    fn initialize(&mut self, _config: &Config) -> Result<()> {
        Ok(())
    }

    fn mutate(&mut self, data: &mut UnifiedTrackingData, _dt: f32) -> Result<()> {
        data.eye.left.pupil_diameter_mm = self.left.normalize(data.eye.left.pupil_diameter_mm);
        data.eye.right.pupil_diameter_mm =
            self.right.normalize(data.eye.right.pupil_diameter_mm);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
