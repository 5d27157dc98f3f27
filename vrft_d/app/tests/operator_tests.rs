use common::mutations::calibration::{CALIBRATION_WEIGHT, INITIALIZE_CALIBRATION};
use common::mutations::smoothing::SMOOTHNESS;
use common::{CalibrationState, Config, MutationError, PropertyValue, UnifiedTrackingMutator};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use vrft_d::operator::OperatorCommand;

fn quick_mutator(dir: &str) -> (UnifiedTrackingMutator, std::path::PathBuf) {
    let storage = std::env::temp_dir().join(dir);
    let _ = std::fs::remove_dir_all(&storage);
    let mut config = Config::default();
    config.calibration.learning_duration_secs = 0.05;
    config.calibration.storage_dir = storage.clone();
    (UnifiedTrackingMutator::new(&config), storage)
}

fn set(
    mutator: &mut UnifiedTrackingMutator,
    stage: &str,
    name: &str,
    value: PropertyValue,
) -> Result<(), MutationError> {
    let (reply, rx) = oneshot::channel();
    OperatorCommand::SetProperty {
        stage: stage.to_string(),
        name: name.to_string(),
        value,
        reply,
    }
    .apply(mutator);
    rx.blocking_recv().unwrap()
}

fn invoke(mutator: &mut UnifiedTrackingMutator, stage: &str, name: &str) -> Result<(), MutationError> {
    let (reply, rx) = oneshot::channel();
    OperatorCommand::InvokeAction {
        stage: stage.to_string(),
        name: name.to_string(),
        reply,
    }
    .apply(mutator);
    rx.blocking_recv().unwrap()
}

#[test]
fn describe_lists_stages_in_order() {
    let (mut mutator, _) = quick_mutator("vrft_test_operator_describe");
    let (reply, rx) = oneshot::channel();
    OperatorCommand::Describe(reply).apply(&mut mutator);

    let stages = rx.blocking_recv().unwrap();
    let names: Vec<&str> = stages.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, mutator.stage_names());
}

#[test]
fn set_property_reaches_the_stage() {
    let (mut mutator, _) = quick_mutator("vrft_test_operator_set");
    set(&mut mutator, "Smoothing", SMOOTHNESS, PropertyValue::Numeric(0.4)).unwrap();
    assert_eq!(
        mutator.property("Smoothing", SMOOTHNESS).unwrap(),
        PropertyValue::Numeric(0.4)
    );
}

#[test]
fn routing_errors_come_back_typed() {
    let (mut mutator, _) = quick_mutator("vrft_test_operator_errors");

    let err = set(&mut mutator, "Nope", SMOOTHNESS, PropertyValue::Numeric(0.4)).unwrap_err();
    assert!(matches!(err, MutationError::UnknownStage(_)));

    let err = set(
        &mut mutator,
        "Unified Calibration",
        CALIBRATION_WEIGHT,
        PropertyValue::Boolean(true),
    )
    .unwrap_err();
    assert!(matches!(err, MutationError::TypeMismatch { .. }));

    let err = invoke(&mut mutator, "Smoothing", "Explode").unwrap_err();
    assert!(matches!(err, MutationError::UnknownAction { .. }));
}

#[test]
fn calibration_action_runs_in_the_background() {
    let (mut mutator, storage) = quick_mutator("vrft_test_operator_action");
    let handle = mutator.calibration().unwrap();

    invoke(&mut mutator, "Unified Calibration", INITIALIZE_CALIBRATION).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while handle.state().unwrap() != CalibrationState::SteadyState {
        assert!(Instant::now() < deadline, "calibration never settled");
        std::thread::sleep(Duration::from_millis(10));
    }
    // Saving happens right after the state flips.
    let saved = storage.join("calibration.json");
    while !saved.exists() {
        assert!(Instant::now() < deadline, "calibration was never saved");
        std::thread::sleep(Duration::from_millis(10));
    }
    let _ = std::fs::remove_dir_all(&storage);
}
