use log::{info, warn};
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::error::MutationError;
use crate::mutation_trait::{
    ActionJob, Mutation, MutationPhase, PropertyKind, PropertyValue,
};
use crate::mutations::{
    CalibrationHandle, CalibrationMutation, NormalizationMutation, SmoothingMutation,
};
use crate::UnifiedTrackingData;

const FAULT_LOG_INTERVAL: Duration = Duration::from_secs(5);

struct StageSlot {
    stage: Box<dyn Mutation>,
    faults: u64,
    last_fault_log: Option<Instant>,
}

impl StageSlot {
    fn record_fault(&mut self, reason: &str) {
        self.faults += 1;
        let now = Instant::now();
        let should_log = match self.last_fault_log {
            Some(last) => now.duration_since(last) >= FAULT_LOG_INTERVAL,
            None => true,
        };
        if should_log {
            self.last_fault_log = Some(now);
            warn!(
                "Mutation '{}' failed ({} faults so far), skipped this tick: {}",
                self.stage.name(),
                self.faults,
                reason
            );
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PropertyInfo {
    pub name: &'static str,
    pub kind: PropertyKind,
    pub value: Option<PropertyValue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageInfo {
    pub name: String,
    pub description: String,
    pub phase: MutationPhase,
    pub saved: bool,
    pub faults: u64,
    pub properties: Vec<PropertyInfo>,
}

/// Ordered dispatcher over the registered mutation stages. It performs no
/// transformation itself.
pub struct UnifiedTrackingMutator {
    enabled: bool,
    stages: Vec<StageSlot>,
}

impl UnifiedTrackingMutator {
    /// Pipeline with the stock stages: calibration and pupil normalization as
    /// preprocessors, then smoothing.
    pub fn new(config: &Config) -> Self {
        let mut mutator = Self::empty(config);
        mutator.add(Box::new(CalibrationMutation::new(config)));
        mutator.add(Box::new(NormalizationMutation::new(config)));
        mutator.add(Box::new(SmoothingMutation::new(config)));
        mutator
    }

    pub fn empty(config: &Config) -> Self {
        Self {
            enabled: config.mutator.enabled,
            stages: Vec::new(),
        }
    }

    /// Insert after every stage of the same or an earlier phase.
    pub fn add(&mut self, stage: Box<dyn Mutation>) {
        let phase = stage.phase();
        let index = self
            .stages
            .iter()
            .position(|slot| slot.stage.phase() > phase)
            .unwrap_or(self.stages.len());
        self.stages.insert(
            index,
            StageSlot {
                stage,
                faults: 0,
                last_fault_log: None,
            },
        );
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|slot| slot.stage.name()).collect()
    }

    pub fn initialize(&mut self, config: &Config) {
        self.enabled = config.mutator.enabled;
        for slot in &mut self.stages {
            if let Err(e) = slot.stage.initialize(config) {
                warn!("Failed to initialize mutation '{}': {}", slot.stage.name(), e);
            }
        }
        info!("Mutation pipeline: {:?}", self.stage_names());
    }

    pub fn mutate(&mut self, data: &mut UnifiedTrackingData, dt: f32) {
        if !self.enabled {
            return;
        }

        for slot in &mut self.stages {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| slot.stage.mutate(data, dt)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => slot.record_fault(&format!("{:#}", e)),
                Err(payload) => {
                    let reason = payload
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "panic".to_string());
                    slot.record_fault(&reason);
                }
            }
        }
    }

    fn slot(&self, stage: &str) -> Result<&StageSlot, MutationError> {
        self.stages
            .iter()
            .find(|slot| slot.stage.name() == stage)
            .ok_or_else(|| MutationError::UnknownStage(stage.to_string()))
    }

    fn slot_mut(&mut self, stage: &str) -> Result<&mut StageSlot, MutationError> {
        self.stages
            .iter_mut()
            .find(|slot| slot.stage.name() == stage)
            .ok_or_else(|| MutationError::UnknownStage(stage.to_string()))
    }

    pub fn describe(&self) -> Vec<StageInfo> {
        self.stages
            .iter()
            .map(|slot| {
                let stage = &slot.stage;
                StageInfo {
                    name: stage.name().to_string(),
                    description: stage.description().to_string(),
                    phase: stage.phase(),
                    saved: stage.is_saved(),
                    faults: slot.faults,
                    properties: stage
                        .properties()
                        .into_iter()
                        .map(|p| PropertyInfo {
                            name: p.name,
                            kind: p.kind,
                            value: match p.kind {
                                PropertyKind::Action => None,
                                _ => stage.property(p.name).ok(),
                            },
                        })
                        .collect(),
                }
            })
            .collect()
    }

    pub fn property(&self, stage: &str, name: &str) -> Result<PropertyValue, MutationError> {
        self.slot(stage)?.stage.property(name)
    }

    pub fn set_property(
        &mut self,
        stage: &str,
        name: &str,
        value: PropertyValue,
    ) -> Result<(), MutationError> {
        let slot = self.slot_mut(stage)?;
        slot.stage.set_property(name, value)?;
        info!("Set '{}' on '{}' to {:?}", name, stage, value);
        Ok(())
    }

    /// The returned job may block; the caller decides where it runs.
    pub fn action(&mut self, stage: &str, name: &str) -> Result<ActionJob, MutationError> {
        self.slot_mut(stage)?.stage.action(name)
    }

    pub fn fault_count(&self, stage: &str) -> Option<u64> {
        self.slot(stage).ok().map(|slot| slot.faults)
    }

    pub fn find<T: Mutation + 'static>(&self) -> Option<&T> {
        self.stages
            .iter()
            .find_map(|slot| slot.stage.as_any().downcast_ref::<T>())
    }

    pub fn find_mut<T: Mutation + 'static>(&mut self) -> Option<&mut T> {
        self.stages
            .iter_mut()
            .find_map(|slot| slot.stage.as_any_mut().downcast_mut::<T>())
    }

    pub fn calibration(&self) -> Option<CalibrationHandle> {
        self.find::<CalibrationMutation>().map(|c| c.handle())
    }
}

