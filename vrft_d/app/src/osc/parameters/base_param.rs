//! Float and bool parameters with name matching and delta checking.

use super::{Getter, Parameter};
use crate::osc::namespace::{DeclaredParameters, ParamType, ParamWrite};
use common::UnifiedTrackingData;
use fancy_regex::Regex;
use std::sync::Arc;

const FLOAT_EPSILON: f32 = 0.00001;

/// Decides which declared names a logical parameter name answers to.
///
/// A declared name matches when it is the name itself, or ends in `/{name}`
/// under any prefix (`FT/`, `OSCm/Float/`, ...) as long as the segment right
/// before it is not another version tag (`v1/v2/Name` is rejected).
#[derive(Debug, Clone)]
pub struct NameMatcher {
    name: String,
    pattern: Option<Regex>,
}

impl NameMatcher {
    pub fn new(name: &str) -> Self {
        let escaped = fancy_regex::escape(name);
        let pattern = Regex::new(&format!(r"(?<!v\d)(/{escaped})$|^({escaped})$")).ok();
        Self {
            name: name.to_string(),
            pattern,
        }
    }

    pub fn matches(&self, declared: &str) -> bool {
        match &self.pattern {
            Some(re) => re.is_match(declared).unwrap_or(false),
            None => declared == self.name,
        }
    }

    /// Every declared name of type `ty` this matcher accepts.
    pub fn wire(&self, declared: &DeclaredParameters, ty: ParamType) -> Vec<String> {
        let mut outputs: Vec<String> = declared
            .names_of(ty)
            .filter(|name| self.matches(name))
            .map(str::to_string)
            .collect();
        outputs.sort();
        outputs.dedup();
        outputs
    }
}

pub struct FloatParam {
    name: String,
    matcher: NameMatcher,
    get_value: Getter<f32>,
    outputs: Vec<String>,
    last_value: Option<f32>,
}

impl FloatParam {
    pub fn new(
        name: &str,
        get_value: impl Fn(&UnifiedTrackingData) -> f32 + Send + Sync + 'static,
    ) -> Self {
        Self::from_getter(name, Arc::new(get_value))
    }

    pub fn from_getter(name: &str, get_value: Getter<f32>) -> Self {
        Self {
            name: name.to_string(),
            matcher: NameMatcher::new(name),
            get_value,
            outputs: Vec::new(),
            last_value: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_wired(&self) -> bool {
        !self.outputs.is_empty()
    }

    fn emit(&mut self, value: f32) -> Vec<ParamWrite> {
        self.last_value = Some(value);
        self.outputs
            .iter()
            .map(|name| ParamWrite::float(name, value))
            .collect()
    }
}

impl Parameter for FloatParam {
    fn reset(&mut self, declared: &DeclaredParameters) -> usize {
        self.outputs = self.matcher.wire(declared, ParamType::Float);
        self.last_value = None;
        self.outputs.len()
    }

    fn process(&mut self, data: &UnifiedTrackingData) -> Vec<ParamWrite> {
        if self.outputs.is_empty() {
            return vec![];
        }

        let value = (self.get_value)(data);
        if !value.is_finite() {
            return vec![];
        }

        let changed = match self.last_value {
            Some(last) => (value - last).abs() > FLOAT_EPSILON,
            None => true,
        };
        if !changed {
            return vec![];
        }
        self.emit(value)
    }

    fn zero(&mut self) -> Vec<ParamWrite> {
        self.emit(0.0)
    }

    fn invalidate(&mut self) {
        self.last_value = None;
    }

    fn names(&self) -> Vec<String> {
        if self.outputs.is_empty() {
            vec![self.name.clone()]
        } else {
            self.outputs.clone()
        }
    }
}

pub struct BoolParam {
    name: String,
    matcher: NameMatcher,
    get_value: Getter<bool>,
    outputs: Vec<String>,
    last_value: Option<bool>,
}

impl BoolParam {
    pub fn new(
        name: &str,
        get_value: impl Fn(&UnifiedTrackingData) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::from_getter(name, Arc::new(get_value))
    }

    pub fn from_getter(name: &str, get_value: Getter<bool>) -> Self {
        Self {
            name: name.to_string(),
            matcher: NameMatcher::new(name),
            get_value,
            outputs: Vec::new(),
            last_value: None,
        }
    }

    /// A flag whose value is handed in through [`BoolParam::process_value`]
    /// rather than read from the snapshot.
    pub fn manual(name: &str) -> Self {
        Self::new(name, |_| false)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn process_value(&mut self, value: bool) -> Vec<ParamWrite> {
        if self.outputs.is_empty() || self.last_value == Some(value) {
            return vec![];
        }
        self.last_value = Some(value);
        self.outputs
            .iter()
            .map(|name| ParamWrite::bool(name, value))
            .collect()
    }
}

impl Parameter for BoolParam {
    fn reset(&mut self, declared: &DeclaredParameters) -> usize {
        self.outputs = self.matcher.wire(declared, ParamType::Bool);
        self.last_value = None;
        self.outputs.len()
    }

    fn process(&mut self, data: &UnifiedTrackingData) -> Vec<ParamWrite> {
        if self.outputs.is_empty() {
            return vec![];
        }
        let value = (self.get_value)(data);
        self.process_value(value)
    }

    fn zero(&mut self) -> Vec<ParamWrite> {
        self.last_value = Some(false);
        self.outputs
            .iter()
            .map(|name| ParamWrite::bool(name, false))
            .collect()
    }

    fn invalidate(&mut self) {
        self.last_value = None;
    }

    fn names(&self) -> Vec<String> {
        if self.outputs.is_empty() {
            vec![self.name.clone()]
        } else {
            self.outputs.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::osc::namespace::DeclaredParameter;

    #[test]
    fn matches_exact_and_prefixed_names() {
        let m = NameMatcher::new("v2/EyeLeftX");
        assert!(m.matches("v2/EyeLeftX"));
        assert!(m.matches("FT/v2/EyeLeftX"));
        assert!(m.matches("OSCm/Float/FT/v2/EyeLeftX"));
        assert!(m.matches("Custom/v2/EyeLeftX"));
    }

    #[test]
    fn rejects_nested_versions_and_partial_names() {
        let m = NameMatcher::new("v2/EyeLeftX");
        assert!(!m.matches("v1/v2/EyeLeftX"));
        assert!(!m.matches("v2/EyeLeftXY"));
        assert!(!m.matches("EyeLeftX"));

        let plain = NameMatcher::new("JawOpen");
        assert!(!plain.matches("MyJawOpen"));
    }

    #[test]
    fn wiring_respects_types() {
        let declared: DeclaredParameters = [
            DeclaredParameter::new("v2/JawOpen", ParamType::Float),
            DeclaredParameter::new("FT/v2/JawOpen", ParamType::Bool),
        ]
        .into_iter()
        .collect();

        let mut float = FloatParam::new("v2/JawOpen", |_| 0.3);
        let mut flag = BoolParam::new("v2/JawOpen", |_| true);
        assert_eq!(float.reset(&declared), 1);
        assert_eq!(flag.reset(&declared), 1);
        assert_eq!(float.names(), vec!["v2/JawOpen".to_string()]);
        assert_eq!(flag.names(), vec!["FT/v2/JawOpen".to_string()]);
    }

    #[test]
    fn float_suppresses_tiny_deltas() {
        let declared: DeclaredParameters =
            [DeclaredParameter::new("JawOpen", ParamType::Float)].into_iter().collect();
        let mut param = FloatParam::new("JawOpen", |d| d.shapes[0].weight);
        param.reset(&declared);

        let mut data = UnifiedTrackingData::default();
        data.shapes[0].weight = 0.5;
        assert_eq!(param.process(&data).len(), 1);

        data.shapes[0].weight = 0.500001;
        assert!(param.process(&data).is_empty());

        data.shapes[0].weight = 0.6;
        assert_eq!(param.process(&data), vec![ParamWrite::float("JawOpen", 0.6)]);
    }
}
