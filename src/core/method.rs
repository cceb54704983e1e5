//! Descriptors for the methods a sensor exposes over the dispatch surface.
//!
//! Each sensor declares an ordered list of `(name, return kind, invoker)`
//! entries. The registry builds its dispatch table from these on every
//! lookup, so nothing here is cached.

use crate::core::value::SensorValue;
use serde_json::Value;
use std::fmt;

/// Return type tag reported by signature queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnKind {
    Array,
    String,
    Int,
    Double,
    Boolean,
    Struct,
    /// Payload shape varies between readings
    Dynamic,
}

impl ReturnKind {
    /// Tag used in method signatures.
    pub fn tag(&self) -> &'static str {
        match self {
            ReturnKind::Array => "array",
            ReturnKind::String => "string",
            ReturnKind::Int => "int",
            ReturnKind::Double => "double",
            ReturnKind::Boolean => "boolean",
            ReturnKind::Struct => "struct",
            ReturnKind::Dynamic => "object",
        }
    }
}

impl fmt::Display for ReturnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// What an exposed method hands back to the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodOutput {
    /// A reading that goes through privacy redaction before it leaves.
    Sensed(SensorValue),
    /// A raw value from a sensor that predates [`SensorValue`].
    ///
    /// Returned to the caller as-is; no privacy level applies.
    Legacy(Value),
}

/// Invoker for an exposed method on sensor type `D`.
pub type Invoker<D> = fn(&D) -> MethodOutput;

/// A zero-argument accessor that is part of the dispatch surface.
pub struct ExposedMethod<D> {
    pub name: &'static str,
    pub returns: ReturnKind,
    pub invoke: Invoker<D>,
}

impl<D> ExposedMethod<D> {
    pub fn new(name: &'static str, returns: ReturnKind, invoke: Invoker<D>) -> Self {
        Self {
            name,
            returns,
            invoke,
        }
    }

    /// The metadata half of the descriptor.
    pub fn signature(&self) -> MethodSignature {
        MethodSignature {
            name: self.name,
            returns: self.returns,
        }
    }
}

impl<D> Clone for ExposedMethod<D> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            returns: self.returns,
            invoke: self.invoke,
        }
    }
}

impl<D> fmt::Debug for ExposedMethod<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExposedMethod")
            .field("name", &self.name)
            .field("returns", &self.returns)
            .finish()
    }
}

/// Type-erased view of an exposed method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodSignature {
    pub name: &'static str,
    pub returns: ReturnKind,
}

impl MethodSignature {
    /// Parameter tags. Exposed methods take no arguments, so this is always
    /// the single `"nil"` marker.
    pub fn param_tags(&self) -> Vec<&'static str> {
        vec!["nil"]
    }
}

/// Strip any `::` path prefix from a type name.
pub fn short_type_name(type_name: &str) -> &str {
    // Generic parameters would contain `::` too; cut them off first.
    let base = type_name.split('<').next().unwrap_or(type_name);
    match base.rfind("::") {
        Some(idx) => &base[idx + 2..],
        None => base,
    }
}
