use super::base_param::FloatParam;
use super::{Getter, Parameter};
use crate::osc::namespace::{DeclaredParameters, ParamWrite};
use common::UnifiedTrackingData;
use glam::Vec2;
use std::sync::Arc;

/// Two float outputs fed from one 2-D value.
pub struct XYParam {
    x: FloatParam,
    y: FloatParam,
}

impl XYParam {
    pub fn new(
        x_name: &str,
        y_name: &str,
        get_value: impl Fn(&UnifiedTrackingData) -> Vec2 + Send + Sync + 'static,
    ) -> Self {
        let get_value: Getter<Vec2> = Arc::new(get_value);
        let get_y = get_value.clone();
        Self {
            x: FloatParam::new(x_name, move |d| get_value(d).x),
            y: FloatParam::new(y_name, move |d| get_y(d).y),
        }
    }
}

impl Parameter for XYParam {
    fn reset(&mut self, declared: &DeclaredParameters) -> usize {
        self.x.reset(declared) + self.y.reset(declared)
    }

    fn process(&mut self, data: &UnifiedTrackingData) -> Vec<ParamWrite> {
        let mut writes = self.x.process(data);
        writes.extend(self.y.process(data));
        writes
    }

    fn zero(&mut self) -> Vec<ParamWrite> {
        let mut writes = self.x.zero();
        writes.extend(self.y.zero());
        writes
    }

    fn invalidate(&mut self) {
        self.x.invalidate();
        self.y.invalidate();
    }

    fn names(&self) -> Vec<String> {
        let mut names = self.x.names();
        names.extend(self.y.names());
        names
    }
}
