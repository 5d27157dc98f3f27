use super::base_param::{BoolParam, FloatParam};
use super::binary_param::BinaryBaseParameter;
use super::{Getter, Parameter};
use crate::osc::namespace::{DeclaredParameters, ParamWrite};
use common::UnifiedTrackingData;
use std::sync::Arc;

/// Bool, float and bit-packed views of one channel, so it lands on whichever
/// of those types the runtime declares under the name.
pub struct EParam {
    bool_param: BoolParam,
    float_param: FloatParam,
    binary_param: Option<BinaryBaseParameter>,
}

impl EParam {
    /// The bool view reads `value < min_bool_threshold`.
    pub fn new(
        name: &str,
        get_value: impl Fn(&UnifiedTrackingData) -> f32 + Send + Sync + 'static,
        min_bool_threshold: f32,
        skip_binary: bool,
    ) -> Self {
        let get_value: Getter<f32> = Arc::new(get_value);
        let for_bool = get_value.clone();

        Self {
            bool_param: BoolParam::new(name, move |d| for_bool(d) < min_bool_threshold),
            float_param: FloatParam::from_getter(name, get_value.clone()),
            binary_param: (!skip_binary)
                .then(|| BinaryBaseParameter::from_getter(name, get_value)),
        }
    }

    pub fn simple(
        name: &str,
        get_value: impl Fn(&UnifiedTrackingData) -> f32 + Send + Sync + 'static,
    ) -> Self {
        Self::new(name, get_value, 0.5, false)
    }

    /// Raw expression channels use a zero bool threshold.
    pub fn expression(
        name: &str,
        get_value: impl Fn(&UnifiedTrackingData) -> f32 + Send + Sync + 'static,
    ) -> Self {
        Self::new(name, get_value, 0.0, false)
    }

    fn parts(&mut self) -> impl Iterator<Item = &mut dyn Parameter> + '_ {
        [
            Some(&mut self.bool_param as &mut dyn Parameter),
            Some(&mut self.float_param as &mut dyn Parameter),
            self.binary_param.as_mut().map(|b| b as &mut dyn Parameter),
        ]
        .into_iter()
        .flatten()
    }
}

impl Parameter for EParam {
    fn reset(&mut self, declared: &DeclaredParameters) -> usize {
        self.parts().map(|p| p.reset(declared)).sum()
    }

    fn process(&mut self, data: &UnifiedTrackingData) -> Vec<ParamWrite> {
        self.parts().flat_map(|p| p.process(data)).collect()
    }

    fn zero(&mut self) -> Vec<ParamWrite> {
        self.parts().flat_map(|p| p.zero()).collect()
    }

    fn invalidate(&mut self) {
        self.parts().for_each(|p| p.invalidate());
    }

    fn names(&self) -> Vec<String> {
        let mut names = self.bool_param.names();
        names.extend(self.float_param.names());
        if let Some(binary) = &self.binary_param {
            names.extend(binary.names());
        }
        names.sort();
        names.dedup();
        names
    }
}
