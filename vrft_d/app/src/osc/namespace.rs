//! The downstream runtime's declared parameter set and the write side of it.

use anyhow::Result;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ParamType {
    Bool,
    Float,
    Int,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum ParamValue {
    Bool(bool),
    Float(f32),
    Int(i32),
}

/// One named value the runtime has declared, with its type and, when known,
/// its current value.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclaredParameter {
    pub name: String,
    pub ty: ParamType,
    pub value: Option<ParamValue>,
}

impl DeclaredParameter {
    pub fn new(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            value: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeclaredParameters {
    params: Vec<DeclaredParameter>,
}

impl DeclaredParameters {
    pub fn new(params: Vec<DeclaredParameter>) -> Self {
        Self { params }
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeclaredParameter> {
        self.params.iter()
    }

    /// Declared names of the given type.
    pub fn names_of(&self, ty: ParamType) -> impl Iterator<Item = &str> {
        self.params
            .iter()
            .filter(move |p| p.ty == ty)
            .map(|p| p.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&DeclaredParameter> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn contains(&self, name: &str, ty: ParamType) -> bool {
        self.get(name).is_some_and(|p| p.ty == ty)
    }

    pub fn count(&self, ty: ParamType) -> usize {
        self.params.iter().filter(|p| p.ty == ty).count()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl FromIterator<DeclaredParameter> for DeclaredParameters {
    fn from_iter<I: IntoIterator<Item = DeclaredParameter>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// A value a parameter wants written this tick.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamWrite {
    pub name: String,
    pub value: ParamValue,
}

impl ParamWrite {
    pub fn float(name: &str, value: f32) -> Self {
        Self {
            name: name.to_string(),
            value: ParamValue::Float(value),
        }
    }

    pub fn bool(name: &str, value: bool) -> Self {
        Self {
            name: name.to_string(),
            value: ParamValue::Bool(value),
        }
    }
}

pub trait Namespace: Send {
    fn declared_parameters(&self) -> DeclaredParameters;

    fn write(&mut self, name: &str, value: ParamValue) -> Result<()>;

    /// Push everything written since the last flush.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Pick up a new declared set if one arrived. Returns true when the
    /// parameters must be rewired before the next tick.
    fn refresh(&mut self) -> bool {
        false
    }
}

/// Declared set and write log held in memory.
#[derive(Debug, Default)]
pub struct MemoryNamespace {
    declared: DeclaredParameters,
    values: HashMap<String, ParamValue>,
    writes: Vec<ParamWrite>,
    flushes: usize,
    changed: bool,
}

impl MemoryNamespace {
    pub fn new(declared: impl IntoIterator<Item = (&'static str, ParamType)>) -> Self {
        Self {
            declared: declared
                .into_iter()
                .map(|(name, ty)| DeclaredParameter::new(name, ty))
                .collect(),
            ..Default::default()
        }
    }

    /// Swap in a new declared set, as an avatar change would.
    pub fn redeclare(&mut self, declared: impl IntoIterator<Item = (&'static str, ParamType)>) {
        self.declared = declared
            .into_iter()
            .map(|(name, ty)| DeclaredParameter::new(name, ty))
            .collect();
        self.changed = true;
    }

    pub fn value(&self, name: &str) -> Option<ParamValue> {
        self.values.get(name).copied()
    }

    pub fn writes(&self) -> &[ParamWrite] {
        &self.writes
    }

    pub fn take_writes(&mut self) -> Vec<ParamWrite> {
        std::mem::take(&mut self.writes)
    }

    pub fn flushes(&self) -> usize {
        self.flushes
    }
}

impl Namespace for MemoryNamespace {
    fn declared_parameters(&self) -> DeclaredParameters {
        self.declared.clone()
    }

    fn write(&mut self, name: &str, value: ParamValue) -> Result<()> {
        self.values.insert(name.to_string(), value);
        self.writes.push(ParamWrite {
            name: name.to_string(),
            value,
        });
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.flushes += 1;
        Ok(())
    }

    fn refresh(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }
}
