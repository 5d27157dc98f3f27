pub mod base_param;
pub mod binary_param;
pub mod eparam;
pub mod registry;
pub mod unified_expressions;
pub mod xy_param;

use crate::osc::namespace::{DeclaredParameters, ParamWrite};
use common::UnifiedTrackingData;
use std::sync::Arc;

/// Reads one value out of a mutated snapshot.
pub type Getter<T> = Arc<dyn Fn(&UnifiedTrackingData) -> T + Send + Sync>;

/// An output adapter from the mutated snapshot onto named runtime values.
pub trait Parameter: Send {
    /// Rewire against a new declared set. Returns how many outputs are now wired;
    /// zero means the parameter stays silent until the next reset.
    fn reset(&mut self, declared: &DeclaredParameters) -> usize;

    /// Values to write for this tick. Unchanged values are not repeated.
    fn process(&mut self, data: &UnifiedTrackingData) -> Vec<ParamWrite>;

    /// Neutral value for every wired output. Wiring is kept.
    fn zero(&mut self) -> Vec<ParamWrite>;

    /// Forget what was last sent so the next `process` writes every output.
    fn invalidate(&mut self);

    /// Wired output names, or the logical name when nothing is wired.
    fn names(&self) -> Vec<String>;
}
