use crate::calibration::{CalibrationData, CalibrationState};
use crate::calibration_manager::CalibrationManager;
use crate::config::{CalibrationConfig, Config};
use crate::error::MutationError;
use crate::mutation_trait::{
    ActionJob, Mutation, MutationPhase, PropertyDescriptor, PropertyValue,
};
use crate::UnifiedTrackingData;
use anyhow::Result;
use log::{debug, info};
use serde::Serialize;
use std::any::Any;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

pub const CALIBRATION_WEIGHT: &str = "Calibration Weight";
pub const CONTINUOUS_CALIBRATION: &str = "Continuous Calibration";
pub const INITIALIZE_CALIBRATION: &str = "Initialize Calibration";

struct CalibrationCore {
    state: CalibrationState,
    data: CalibrationData,
    config: CalibrationConfig,
}

impl CalibrationCore {
    /// Weight held outside of learning: the configured steady weight while
    /// continuous calibration is on, otherwise frozen at 0.
    fn steady_weight(&self) -> f32 {
        if self.data.continuous_calibration {
            self.config.steady_weight.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

struct CalibrationShared {
    core: Mutex<CalibrationCore>,
    manager: CalibrationManager,
}

#[derive(Debug, Clone, Serialize)]
pub struct CalibrationStatus {
    pub state: &'static str,
    pub progress: f32,
    pub calibration_weight: f32,
    pub continuous: bool,
}

/// Shared view of the calibration table. The tick thread normalizes through it
/// while a worker runs the learning window.
#[derive(Clone)]
pub struct CalibrationHandle {
    shared: Arc<CalibrationShared>,
}

impl CalibrationHandle {
    pub fn new(config: &CalibrationConfig) -> Self {
        let data = CalibrationData {
            continuous_calibration: config.continuous,
            ..CalibrationData::default()
        };
        Self {
            shared: Arc::new(CalibrationShared {
                core: Mutex::new(CalibrationCore {
                    state: CalibrationState::Idle,
                    data,
                    config: config.clone(),
                }),
                manager: CalibrationManager::new(config.storage_dir.clone()),
            }),
        }
    }

    fn core(&self) -> Result<MutexGuard<'_, CalibrationCore>, MutationError> {
        self.shared.core.lock().map_err(|_| MutationError::Poisoned)
    }

    /// Restore persisted ranges. Returns true when a saved profile was applied,
    /// which puts the stage straight into steady state.
    pub fn load(&self) -> Result<bool> {
        if !self.core()?.config.enabled {
            return Ok(false);
        }
        let Some(loaded) = self.shared.manager.load()? else {
            return Ok(false);
        };

        let mut core = self.core()?;
        if core.state.is_learning() {
            debug!("Ignoring saved calibration while learning is in progress");
            return Ok(false);
        }
        core.data.merge_from(loaded);
        // A file written mid-learning carries the learning weight.
        core.data.calibration_weight = core.steady_weight();
        core.state = CalibrationState::SteadyState;
        Ok(true)
    }

    /// Persist the current ranges. Nothing is written before a range exists.
    pub fn save(&self) -> Result<()> {
        let data = {
            let core = self.core()?;
            if !core.config.enabled || core.state == CalibrationState::Idle {
                return Ok(());
            }
            core.data.clone()
        };
        self.shared.manager.save(&data)
    }

    pub fn state(&self) -> Result<CalibrationState, MutationError> {
        Ok(self.core()?.state.clone())
    }

    pub fn snapshot(&self) -> Result<CalibrationData, MutationError> {
        Ok(self.core()?.data.clone())
    }

    pub fn status(&self) -> Result<CalibrationStatus, MutationError> {
        let core = self.core()?;
        let state = match core.state {
            CalibrationState::Idle => "idle",
            CalibrationState::Learning { .. } => "learning",
            CalibrationState::SteadyState => "steady",
        };
        Ok(CalibrationStatus {
            state,
            progress: core.state.progress(),
            calibration_weight: core.data.calibration_weight,
            continuous: core.data.continuous_calibration,
        })
    }

    /// Reset every range, learn aggressively for the configured window, then
    /// settle to the steady weight and persist. Blocks for the whole window.
    pub fn initialize_calibration(&self) -> Result<()> {
        let duration = self.begin_learning()?;
        info!("Initialized calibration.");
        info!(
            "Calibrating deep normalization for {:.1}s.",
            duration.as_secs_f32()
        );

        thread::sleep(duration);

        let data = self.finish_learning()?;
        info!("Fine-tuning normalization. Values will be saved on exit.");
        self.shared.manager.save(&data)
    }

    fn begin_learning(&self) -> Result<Duration, MutationError> {
        let mut core = self.core()?;
        if !core.config.enabled {
            return Err(MutationError::CalibrationDisabled);
        }
        if core.state.is_learning() {
            return Err(MutationError::CalibrationInProgress);
        }

        let duration =
            Duration::from_secs_f32(core.config.learning_duration_secs.max(0.0));
        core.data.clear();
        core.data.calibration_weight = core.config.learning_weight.clamp(0.0, 1.0);
        core.state = CalibrationState::Learning {
            started: Instant::now(),
            duration,
        };
        Ok(duration)
    }

    fn finish_learning(&self) -> Result<CalibrationData, MutationError> {
        let mut core = self.core()?;
        core.data.calibration_weight = core.steady_weight();
        core.state = CalibrationState::SteadyState;
        Ok(core.data.clone())
    }

    fn configure(&self, config: &CalibrationConfig) -> Result<(), MutationError> {
        let mut core = self.core()?;
        core.config = config.clone();
        Ok(())
    }

    fn apply(&self, data: &mut UnifiedTrackingData) -> Result<(), MutationError> {
        let mut core = self.core()?;
        if !core.config.enabled || core.state == CalibrationState::Idle {
            return Ok(());
        }

        // Eye channels are intentionally not fed here.
        let calibration_weight = core.data.calibration_weight;
        for (shape, range) in data.shapes.iter_mut().zip(core.data.shapes.iter_mut()) {
            shape.weight = range.calibrate(shape.weight, calibration_weight);
        }
        Ok(())
    }

    fn set_calibration_weight(&self, weight: f32) -> Result<(), MutationError> {
        self.core()?.data.calibration_weight = weight.clamp(0.0, 1.0);
        Ok(())
    }

    fn set_continuous(&self, continuous: bool) -> Result<(), MutationError> {
        self.core()?.data.continuous_calibration = continuous;
        Ok(())
    }

    /// Install a complete profile and continue in steady state.
    pub fn restore(&self, mut data: CalibrationData) -> Result<(), MutationError> {
        data.sanitize();
        let mut core = self.core()?;
        if core.state.is_learning() {
            return Err(MutationError::CalibrationInProgress);
        }
        core.data = data;
        core.state = CalibrationState::SteadyState;
        Ok(())
    }
}

/// Adaptive per-channel range tracking and rescaling of expression weights.
pub struct CalibrationMutation {
    handle: CalibrationHandle,
}

impl CalibrationMutation {
    pub fn new(config: &Config) -> Self {
        Self {
            handle: CalibrationHandle::new(&config.calibration),
        }
    }

    pub fn handle(&self) -> CalibrationHandle {
        self.handle.clone()
    }
}

impl Mutation for CalibrationMutation {
    fn name(&self) -> &str {
        "Unified Calibration"
    }

    fn description(&self) -> &str {
        "Learns the range each expression actually reaches and rescales raw weights into it."
    }

    fn phase(&self) -> MutationPhase {
        MutationPhase::Preprocessor
    }

    fn is_saved(&self) -> bool {
        true
    }

    fn initialize(&mut self, config: &Config) -> Result<()> {
        self.handle.configure(&config.calibration)?;
        Ok(())
    }

    fn mutate(&mut self, data: &mut UnifiedTrackingData, _dt: f32) -> Result<()> {
        self.handle.apply(data)?;
        Ok(())
    }

    fn properties(&self) -> Vec<PropertyDescriptor> {
        vec![
            PropertyDescriptor::numeric(CALIBRATION_WEIGHT),
            PropertyDescriptor::boolean(CONTINUOUS_CALIBRATION),
            PropertyDescriptor::action(INITIALIZE_CALIBRATION),
        ]
    }

    fn property(&self, name: &str) -> Result<PropertyValue, MutationError> {
        let core = self.handle.core()?;
        match name {
            CALIBRATION_WEIGHT => Ok(PropertyValue::Numeric(core.data.calibration_weight)),
            CONTINUOUS_CALIBRATION => Ok(PropertyValue::Boolean(core.data.continuous_calibration)),
            _ => Err(MutationError::UnknownProperty {
                stage: self.name().to_string(),
                property: name.to_string(),
            }),
        }
    }

    fn set_property(&mut self, name: &str, value: PropertyValue) -> Result<(), MutationError> {
        match name {
            CALIBRATION_WEIGHT => self.handle.set_calibration_weight(value.as_numeric(name)?),
            CONTINUOUS_CALIBRATION => self.handle.set_continuous(value.as_boolean(name)?),
            _ => Err(MutationError::UnknownProperty {
                stage: self.name().to_string(),
                property: name.to_string(),
            }),
        }
    }

    fn action(&mut self, name: &str) -> Result<ActionJob, MutationError> {
        if name != INITIALIZE_CALIBRATION {
            return Err(MutationError::UnknownAction {
                stage: self.name().to_string(),
                action: name.to_string(),
            });
        }
        {
            let core = self.handle.core()?;
            if !core.config.enabled {
                return Err(MutationError::CalibrationDisabled);
            }
            if core.state.is_learning() {
                return Err(MutationError::CalibrationInProgress);
            }
        }
        let handle = self.handle.clone();
        Ok(Box::new(move || handle.initialize_calibration()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_config(dir: &str) -> Config {
        let mut config = Config::default();
        config.calibration.learning_duration_secs = 0.05;
        config.calibration.storage_dir = std::env::temp_dir().join(dir);
        config
    }

    #[test]
    fn idle_passes_data_through() {
        let mut stage = CalibrationMutation::new(&quick_config("vrft_test_cal_idle"));
        let mut data = UnifiedTrackingData::default();
        data.shapes[0].weight = 0.37;

        stage.mutate(&mut data, 0.01).unwrap();
        assert_eq!(data.shapes[0].weight, 0.37);
    }

    #[test]
    fn action_rejected_when_disabled() {
        let mut config = quick_config("vrft_test_cal_disabled");
        config.calibration.enabled = false;
        let mut stage = CalibrationMutation::new(&config);

        assert!(matches!(
            stage.action(INITIALIZE_CALIBRATION),
            Err(MutationError::CalibrationDisabled)
        ));
        assert_eq!(stage.handle().state().unwrap(), CalibrationState::Idle);
    }

    #[test]
    fn weight_property_is_clamped() {
        let mut stage = CalibrationMutation::new(&quick_config("vrft_test_cal_prop"));
        stage
            .set_property(CALIBRATION_WEIGHT, PropertyValue::Numeric(3.0))
            .unwrap();
        assert_eq!(
            stage.property(CALIBRATION_WEIGHT).unwrap(),
            PropertyValue::Numeric(1.0)
        );

        let err = stage
            .set_property(CALIBRATION_WEIGHT, PropertyValue::Boolean(true))
            .unwrap_err();
        assert!(matches!(err, MutationError::TypeMismatch { .. }));
    }
}
