use crate::mutation_trait::PropertyKind;

#[derive(Debug, thiserror::Error)]
pub enum MutationError {
    #[error("No mutation stage named '{0}'")]
    UnknownStage(String),
    #[error("'{stage}' has no property named '{property}'")]
    UnknownProperty { stage: String, property: String },
    #[error("'{stage}' has no action named '{action}'")]
    UnknownAction { stage: String, action: String },
    #[error("Property '{property}' expects a {expected:?} value")]
    TypeMismatch {
        property: String,
        expected: PropertyKind,
    },
    #[error("Calibration is already in progress")]
    CalibrationInProgress,
    #[error("Calibration is disabled in the config")]
    CalibrationDisabled,
    #[error("Calibration state lock was poisoned")]
    Poisoned,
}
