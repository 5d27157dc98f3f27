use crate::config::Config;
use crate::error::MutationError;
use crate::mutation_trait::{Mutation, PropertyDescriptor, PropertyValue};
use crate::{EuroFilter, UnifiedExpressions, UnifiedTrackingData};
use anyhow::Result;
use std::any::Any;

pub const SMOOTHNESS: &str = "Smoothness";

#[derive(Clone, Copy)]
struct EyeFilters {
    gaze_x: EuroFilter,
    gaze_y: EuroFilter,
    pupil: EuroFilter,
    openness: EuroFilter,
}

impl EyeFilters {
    fn new(template: EuroFilter) -> Self {
        Self {
            gaze_x: template,
            gaze_y: template,
            pupil: template,
            openness: template,
        }
    }
}

pub struct SmoothingMutation {
    smoothness: f32,
    shapes: Vec<EuroFilter>,
    left: EyeFilters,
    right: EyeFilters,
}

impl SmoothingMutation {
    pub fn new(config: &Config) -> Self {
        Self::with_smoothness(config.mutator.smoothness)
    }

    pub fn with_smoothness(smoothness: f32) -> Self {
        let smoothness = smoothness.clamp(0.0, 1.0);
        let template = EuroFilter::from_smoothness(smoothness);
        Self {
            smoothness,
            shapes: vec![template; UnifiedExpressions::Max as usize],
            left: EyeFilters::new(template),
            right: EyeFilters::new(template),
        }
    }
}

impl Mutation for SmoothingMutation {
    fn name(&self) -> &str {
        "Smoothing"
    }

    fn description(&self) -> &str {
        "One-Euro filtering of every expression and eye channel."
    }

    fn initialize(&mut self, config: &Config) -> Result<()> {
        *self = Self::new(config);
        Ok(())
    }

    fn mutate(&mut self, data: &mut UnifiedTrackingData, dt: f32) -> Result<()> {
        if self.smoothness <= 0.0 {
            return Ok(());
        }

        for (eye, filters) in [
            (&mut data.eye.left, &mut self.left),
            (&mut data.eye.right, &mut self.right),
        ] {
            eye.openness = filters.openness.filter(eye.openness, dt);
            eye.gaze.x = filters.gaze_x.filter(eye.gaze.x, dt);
            eye.gaze.y = filters.gaze_y.filter(eye.gaze.y, dt);
            eye.pupil_diameter_mm = filters.pupil.filter(eye.pupil_diameter_mm, dt);
        }

        for (shape, filter) in data.shapes.iter_mut().zip(self.shapes.iter_mut()) {
            shape.weight = filter.filter(shape.weight, dt);
        }
        Ok(())
    }

    fn properties(&self) -> Vec<PropertyDescriptor> {
        vec![PropertyDescriptor::numeric(SMOOTHNESS)]
    }

    fn property(&self, name: &str) -> Result<PropertyValue, MutationError> {
        match name {
            SMOOTHNESS => Ok(PropertyValue::Numeric(self.smoothness)),
            _ => Err(MutationError::UnknownProperty {
                stage: self.name().to_string(),
                property: name.to_string(),
            }),
        }
    }

    fn set_property(&mut self, name: &str, value: PropertyValue) -> Result<(), MutationError> {
        match name {
            SMOOTHNESS => {
                *self = Self::with_smoothness(value.as_numeric(name)?);
                Ok(())
            }
            _ => Err(MutationError::UnknownProperty {
                stage: self.name().to_string(),
                property: name.to_string(),
            }),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
