use crate::osc::namespace::{Namespace, ParamWrite};
use crate::osc::parameters::registry::ParameterRegistry;
use anyhow::Result;
use common::{Config, TrackingStatus, UnifiedTrackingData, UnifiedTrackingMutator};
use log::{error, info};

/// The active profile: the mutation pipeline and the live parameters it feeds.
pub struct TrackingRuntime {
    mutator: UnifiedTrackingMutator,
    registry: ParameterRegistry,
}

impl TrackingRuntime {
    pub fn new(config: &Config) -> Self {
        Self::with_parts(UnifiedTrackingMutator::new(config), ParameterRegistry::new())
    }

    pub fn with_parts(mutator: UnifiedTrackingMutator, registry: ParameterRegistry) -> Self {
        Self { mutator, registry }
    }

    pub fn mutator(&self) -> &UnifiedTrackingMutator {
        &self.mutator
    }

    pub fn mutator_mut(&mut self) -> &mut UnifiedTrackingMutator {
        &mut self.mutator
    }

    pub fn registry(&self) -> &ParameterRegistry {
        &self.registry
    }

    /// Restore persisted calibration, if any.
    pub fn load_calibration(&self) {
        let Some(calibration) = self.mutator.calibration() else {
            return;
        };
        match calibration.load() {
            Ok(true) => info!("Calibration restored; continuing in steady state"),
            Ok(false) => info!("No calibration restored"),
            Err(e) => error!("Failed to load calibration: {:#}", e),
        }
    }

    /// Rewire every parameter against the namespace's current declared set.
    pub fn reset(&mut self, namespace: &dyn Namespace) -> usize {
        self.registry.reset(&namespace.declared_parameters())
    }

    /// One tick: mutate the snapshot in place, then write whatever changed.
    /// Returns the number of values written.
    pub fn tick(
        &mut self,
        data: &mut UnifiedTrackingData,
        status: TrackingStatus,
        dt: f32,
        namespace: &mut dyn Namespace,
    ) -> Result<usize> {
        if namespace.refresh() {
            self.reset(namespace);
        }

        if status.any() {
            self.mutator.mutate(data, dt);
        }

        let writes = self.registry.process(data, status);
        self.send(&writes, namespace)?;
        Ok(writes.len())
    }

    /// Drive every wired output to its neutral value.
    pub fn zero(&mut self, namespace: &mut dyn Namespace) -> Result<()> {
        let writes = self.registry.zero_all();
        self.send(&writes, namespace)
    }

    /// Write and flush. On failure nothing counts as delivered, so the next
    /// tick resends every output.
    fn send(&mut self, writes: &[ParamWrite], namespace: &mut dyn Namespace) -> Result<()> {
        let result = writes
            .iter()
            .try_for_each(|write| namespace.write(&write.name, write.value))
            .and_then(|()| namespace.flush());
        if result.is_err() {
            self.registry.invalidate();
        }
        result
    }

    pub fn shutdown(&self) {
        if let Some(calibration) = self.mutator.calibration() {
            if let Err(e) = calibration.save() {
                error!("Failed to save calibration: {:#}", e);
            }
        }
    }
}
