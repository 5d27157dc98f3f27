use anyhow::{bail, Result};
use common::mutations::calibration::INITIALIZE_CALIBRATION;
use common::{
    CalibrationState, Config, Mutation, MutationError, MutationPhase, UnifiedExpressions,
    UnifiedTrackingData, UnifiedTrackingMutator,
};
use std::any::Any;

/// Adds a fixed amount to JawOpen.
struct Offset(&'static str, f32);

impl Mutation for Offset {
    fn name(&self) -> &str {
        self.0
    }
    fn initialize(&mut self, _config: &Config) -> Result<()> {
        Ok(())
    }
    fn mutate(&mut self, data: &mut UnifiedTrackingData, _dt: f32) -> Result<()> {
        let jaw = data.weight(UnifiedExpressions::JawOpen);
        data.set_weight(UnifiedExpressions::JawOpen, jaw + self.1);
        Ok(())
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

struct Failing;

impl Mutation for Failing {
    fn name(&self) -> &str {
        "Failing"
    }
    fn initialize(&mut self, _config: &Config) -> Result<()> {
        Ok(())
    }
    fn mutate(&mut self, _data: &mut UnifiedTrackingData, _dt: f32) -> Result<()> {
        bail!("sensor table missing")
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

struct Panicking;

impl Mutation for Panicking {
    fn name(&self) -> &str {
        "Panicking"
    }
    fn phase(&self) -> MutationPhase {
        MutationPhase::Preprocessor
    }
    fn initialize(&mut self, _config: &Config) -> Result<()> {
        Ok(())
    }
    fn mutate(&mut self, _data: &mut UnifiedTrackingData, _dt: f32) -> Result<()> {
        panic!("index out of range")
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[test]
fn test_failing_stage_does_not_halt_pipeline() {
    let config = Config::default();
    let mut mutator = UnifiedTrackingMutator::empty(&config);
    mutator.add(Box::new(Panicking));
    mutator.add(Box::new(Failing));
    mutator.add(Box::new(Offset("Offset", 0.25)));

    let mut data = UnifiedTrackingData::default();
    mutator.mutate(&mut data, 0.01);
    mutator.mutate(&mut data, 0.01);

    assert_eq!(data.weight(UnifiedExpressions::JawOpen), 0.5);
    assert_eq!(mutator.fault_count("Failing"), Some(2));
    assert_eq!(mutator.fault_count("Panicking"), Some(2));
    assert_eq!(mutator.fault_count("Offset"), Some(0));
}

#[test]
fn test_disabled_pipeline_passes_data_through() {
    let mut config = Config::default();
    config.mutator.enabled = false;
    let mut mutator = UnifiedTrackingMutator::empty(&config);
    mutator.add(Box::new(Offset("Offset", 0.25)));

    let mut data = UnifiedTrackingData::default();
    data.set_weight(UnifiedExpressions::JawOpen, 0.3);
    mutator.mutate(&mut data, 0.01);
    assert_eq!(data.weight(UnifiedExpressions::JawOpen), 0.3);
}

#[test]
fn test_calibration_disabled_behavior() {
    let mut config = Config::default();
    config.calibration.enabled = false;
    config.calibration.storage_dir = std::env::temp_dir().join("vrft_test_protect_disabled");

    let mut mutator = UnifiedTrackingMutator::new(&config);
    let result = mutator.action("Unified Calibration", INITIALIZE_CALIBRATION);
    assert!(matches!(result, Err(MutationError::CalibrationDisabled)));

    let handle = mutator.calibration().unwrap();
    assert_eq!(handle.state().unwrap(), CalibrationState::Idle);
    assert!(!handle.load().unwrap());
}

#[test]
fn test_second_initialize_is_rejected_while_learning() {
    let mut config = Config::default();
    config.calibration.learning_duration_secs = 0.5;
    config.calibration.storage_dir = std::env::temp_dir().join("vrft_test_protect_twice");

    let mut mutator = UnifiedTrackingMutator::new(&config);
    let handle = mutator.calibration().unwrap();
    let job = mutator
        .action("Unified Calibration", INITIALIZE_CALIBRATION)
        .unwrap();
    let worker = std::thread::spawn(job);

    while !handle.state().unwrap().is_learning() {
        std::thread::sleep(std::time::Duration::from_millis(1));
    }
    let second = mutator.action("Unified Calibration", INITIALIZE_CALIBRATION);
    assert!(matches!(second, Err(MutationError::CalibrationInProgress)));
    assert!(matches!(
        handle.initialize_calibration().unwrap_err().downcast_ref::<MutationError>(),
        Some(MutationError::CalibrationInProgress)
    ));

    worker.join().unwrap().unwrap();
    assert_eq!(handle.state().unwrap(), CalibrationState::SteadyState);
    let _ = std::fs::remove_dir_all(&config.calibration.storage_dir);
}
