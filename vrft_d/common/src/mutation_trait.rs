use crate::config::Config;
use crate::error::MutationError;
use crate::UnifiedTrackingData;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::any::Any;

/// Stages run phase by phase, then in registration order inside a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MutationPhase {
    Preprocessor,
    Standard,
    Postprocessor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyKind {
    Numeric,
    Boolean,
    Action,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Boolean(bool),
    Numeric(f32),
}

impl PropertyValue {
    pub fn as_numeric(self, property: &str) -> Result<f32, MutationError> {
        match self {
            Self::Numeric(v) => Ok(v),
            Self::Boolean(_) => Err(MutationError::TypeMismatch {
                property: property.to_string(),
                expected: PropertyKind::Numeric,
            }),
        }
    }

    pub fn as_boolean(self, property: &str) -> Result<bool, MutationError> {
        match self {
            Self::Boolean(v) => Ok(v),
            Self::Numeric(_) => Err(MutationError::TypeMismatch {
                property: property.to_string(),
                expected: PropertyKind::Boolean,
            }),
        }
    }
}

/// An operator-editable field or triggerable procedure on a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PropertyDescriptor {
    pub name: &'static str,
    pub kind: PropertyKind,
}

impl PropertyDescriptor {
    pub const fn numeric(name: &'static str) -> Self {
        Self {
            name,
            kind: PropertyKind::Numeric,
        }
    }

    pub const fn boolean(name: &'static str) -> Self {
        Self {
            name,
            kind: PropertyKind::Boolean,
        }
    }

    pub const fn action(name: &'static str) -> Self {
        Self {
            name,
            kind: PropertyKind::Action,
        }
    }
}

/// Work detached from its stage. May block for a long time; run it off the tick path.
pub type ActionJob = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

pub trait Mutation: Send + Sync {
    /// Unique identifier for this mutation (e.g., "Smoothing", "Unified Calibration")
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    fn phase(&self) -> MutationPhase {
        MutationPhase::Standard
    }

    /// Whether the stage keeps state on disk across restarts.
    fn is_saved(&self) -> bool {
        false
    }

    /// Re-read settings after the config changed.
    fn initialize(&mut self, config: &Config) -> Result<()>;

    /// Process and modify the tracking data in-place
    fn mutate(&mut self, data: &mut UnifiedTrackingData, dt: f32) -> Result<()>;

    fn properties(&self) -> Vec<PropertyDescriptor> {
        Vec::new()
    }

    fn property(&self, name: &str) -> Result<PropertyValue, MutationError> {
        Err(MutationError::UnknownProperty {
            stage: self.name().to_string(),
            property: name.to_string(),
        })
    }

    fn set_property(&mut self, name: &str, _value: PropertyValue) -> Result<(), MutationError> {
        Err(MutationError::UnknownProperty {
            stage: self.name().to_string(),
            property: name.to_string(),
        })
    }

    fn action(&mut self, name: &str) -> Result<ActionJob, MutationError> {
        Err(MutationError::UnknownAction {
            stage: self.name().to_string(),
            action: name.to_string(),
        })
    }

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
