pub use api::{
    TrackingModule, TrackingStatus, UnifiedExpressionShape, UnifiedExpressions, UnifiedEyeData,
    UnifiedHeadData, UnifiedSingleEyeData, UnifiedTrackingData,
};

mod calibration;
pub mod calibration_manager;
pub mod config;
mod error;
mod euro_filter;
pub mod mutation_trait;
pub mod mutations;
mod mutator;

pub use calibration::{
    lerp, CalibrationData, CalibrationParameter, CalibrationState, UNOBSERVED_CEILING,
    UNOBSERVED_FLOOR,
};
pub use config::{
    CalibrationConfig, Config, ModuleConfig, MutatorConfig, OperatorConfig, OscConfig,
};
pub use error::MutationError;
pub use euro_filter::EuroFilter;
pub use mutation_trait::{
    ActionJob, Mutation, MutationPhase, PropertyDescriptor, PropertyKind, PropertyValue,
};
pub use mutator::{PropertyInfo, StageInfo, UnifiedTrackingMutator};
