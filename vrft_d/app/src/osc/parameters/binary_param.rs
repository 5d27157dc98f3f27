//! Packs a [-1, 1] value into whatever indexed bool slots the runtime declares.
//!
//! A base name `Foo` owns declared bools `Foo1`, `Foo2`, `Foo4`, ... where the
//! suffix is a power of two whose exponent is the bit position (`Foo1` is the
//! least significant bit). With N such positions the magnitude is quantized to
//! `floor(|v| * (2^N - 1))`. An optional `FooNegative` bool carries the sign.

use super::{Getter, Parameter};
use crate::osc::namespace::{DeclaredParameters, ParamType, ParamWrite};
use common::UnifiedTrackingData;
use log::debug;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

const FT_PREFIX: &str = "FT/";

/// Bit position for a slot index, or `None` when the index is not a power of two.
pub fn binary_step(index: u32) -> Option<u32> {
    if index.is_power_of_two() {
        Some(index.trailing_zeros())
    } else {
        None
    }
}

pub struct BinaryBaseParameter {
    name: String,
    get_value: Getter<f32>,
    bits: Vec<(String, u32)>,
    negative: Vec<String>,
    width: u32,
    last_bits: HashMap<String, bool>,
}

impl BinaryBaseParameter {
    pub fn new(
        name: &str,
        get_value: impl Fn(&UnifiedTrackingData) -> f32 + Send + Sync + 'static,
    ) -> Self {
        Self::from_getter(name, Arc::new(get_value))
    }

    pub fn from_getter(name: &str, get_value: Getter<f32>) -> Self {
        Self {
            name: name.to_string(),
            get_value,
            bits: Vec::new(),
            negative: Vec::new(),
            width: 0,
            last_bits: HashMap::new(),
        }
    }

    /// Strip an optional `FT/` and the base name, leaving the numeric index.
    fn slot_index(&self, declared: &str) -> Option<u32> {
        let unprefixed = declared.strip_prefix(FT_PREFIX).unwrap_or(declared);
        let suffix = unprefixed.strip_prefix(self.name.as_str())?;
        if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        suffix.parse().ok()
    }

    fn is_negative_slot(&self, declared: &str) -> bool {
        let unprefixed = declared.strip_prefix(FT_PREFIX).unwrap_or(declared);
        unprefixed
            .strip_prefix(self.name.as_str())
            .is_some_and(|rest| rest == "Negative")
    }

    /// Number of distinct bit positions wired.
    pub fn bit_width(&self) -> u32 {
        self.width
    }

    /// Largest representable magnitude, `2^N - 1`.
    pub fn max_value(&self) -> u64 {
        if self.width == 0 {
            0
        } else {
            (1u64 << self.width) - 1
        }
    }

    pub fn has_negative(&self) -> bool {
        !self.negative.is_empty()
    }

    /// Sign and quantized magnitude, or `None` when the value cannot be
    /// represented (NaN, or negative with no sign slot).
    pub fn quantize(&self, value: f32) -> Option<(bool, u64)> {
        if value.is_nan() {
            return None;
        }
        let value = value.clamp(-1.0, 1.0);
        if value < 0.0 && self.negative.is_empty() {
            return None;
        }
        let magnitude = f64::from(value.abs());
        let quantized = (magnitude * self.max_value() as f64).floor() as u64;
        Some((value < 0.0, quantized))
    }

    fn write_if_changed(&mut self, writes: &mut Vec<ParamWrite>, name: &str, value: bool) {
        if self.last_bits.get(name) != Some(&value) {
            self.last_bits.insert(name.to_string(), value);
            writes.push(ParamWrite::bool(name, value));
        }
    }
}

impl Parameter for BinaryBaseParameter {
    fn reset(&mut self, declared: &DeclaredParameters) -> usize {
        self.bits.clear();
        self.last_bits.clear();
        self.negative.clear();

        let mut positions = BTreeSet::new();
        for name in declared.names_of(ParamType::Bool) {
            if self.is_negative_slot(name) {
                self.negative.push(name.to_string());
                continue;
            }
            if let Some(position) = self.slot_index(name).and_then(binary_step) {
                positions.insert(position);
                self.bits.push((name.to_string(), position));
            }
        }

        if self.bits.is_empty() {
            self.negative.clear();
            self.width = 0;
            return 0;
        }

        self.bits.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        self.width = positions.len() as u32;
        self.negative.sort();

        debug!(
            "BinaryParam '{}': {} bits{}",
            self.name,
            self.width,
            if self.negative.is_empty() { "" } else { " + sign" }
        );
        self.bits.len() + self.negative.len()
    }

    fn process(&mut self, data: &UnifiedTrackingData) -> Vec<ParamWrite> {
        if self.bits.is_empty() {
            return vec![];
        }
        let Some((negative, quantized)) = self.quantize((self.get_value)(data)) else {
            return vec![];
        };

        let mut writes = Vec::new();
        for slot in self.negative.clone() {
            self.write_if_changed(&mut writes, &slot, negative);
        }
        for (slot, position) in self.bits.clone() {
            let bit = (quantized >> position) & 1 == 1;
            self.write_if_changed(&mut writes, &slot, bit);
        }
        writes
    }

    fn zero(&mut self) -> Vec<ParamWrite> {
        let slots: Vec<String> = self
            .bits
            .iter()
            .map(|(name, _)| name.clone())
            .chain(self.negative.clone())
            .collect();
        slots
            .into_iter()
            .map(|slot| {
                self.last_bits.insert(slot.clone(), false);
                ParamWrite::bool(&slot, false)
            })
            .collect()
    }

    fn invalidate(&mut self) {
        self.last_bits.clear();
    }

    fn names(&self) -> Vec<String> {
        if self.bits.is_empty() {
            return vec![self.name.clone()];
        }
        self.bits
            .iter()
            .map(|(name, _)| name.clone())
            .chain(self.negative.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::osc::namespace::DeclaredParameter;

    fn declared(names: &[(&str, ParamType)]) -> DeclaredParameters {
        names
            .iter()
            .map(|(n, t)| DeclaredParameter::new(*n, *t))
            .collect()
    }

    #[test]
    fn binary_steps_are_powers_of_two() {
        assert_eq!(binary_step(1), Some(0));
        assert_eq!(binary_step(2), Some(1));
        assert_eq!(binary_step(8), Some(3));
        assert_eq!(binary_step(1 << 31), Some(31));
        assert_eq!(binary_step(0), None);
        assert_eq!(binary_step(3), None);
        assert_eq!(binary_step(6), None);
    }

    #[test]
    fn slot_index_parsing() {
        let param = BinaryBaseParameter::new("v2/SmileFrown", |_| 0.0);
        assert_eq!(param.slot_index("v2/SmileFrown4"), Some(4));
        assert_eq!(param.slot_index("FT/v2/SmileFrown2"), Some(2));
        assert_eq!(param.slot_index("v2/SmileFrown"), None);
        assert_eq!(param.slot_index("v2/SmileFrown+1"), None);
        assert_eq!(param.slot_index("v2/SmileFrownLeft1"), None);
        assert_eq!(param.slot_index("Custom/v2/SmileFrown1"), None);
    }

    #[test]
    fn negative_slot_is_only_wired_with_bits() {
        let mut param = BinaryBaseParameter::new("Jaw", |_| -0.5);
        let only_sign = declared(&[("JawNegative", ParamType::Bool)]);
        assert_eq!(param.reset(&only_sign), 0);
        assert!(!param.has_negative());
        assert_eq!(param.names(), vec!["Jaw".to_string()]);
    }

    #[test]
    fn non_bool_slots_are_ignored() {
        let mut param = BinaryBaseParameter::new("Jaw", |_| 0.5);
        let ns = declared(&[("Jaw1", ParamType::Float), ("Jaw2", ParamType::Int)]);
        assert_eq!(param.reset(&ns), 0);
        assert_eq!(param.bit_width(), 0);
    }
}
