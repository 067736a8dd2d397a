//! Type conversion and the weight computation constructor/factory-method
//! resolution ranks candidates by.

use std::any::Any;
use std::sync::Arc;

use crate::arg::{AnyArc, TypeKeyOwned};
use crate::error::DiError;

/// A weight large enough that any candidate carrying it loses to every
/// candidate that doesn't, without overflowing when several such
/// mismatches are summed across a parameter list.
pub const UNASSIGNABLE_WEIGHT: i64 = 1_000_000;

/// Raw (unconverted) argument arrays are biased this far below their
/// converted counterpart so that, all else equal, a candidate matched by
/// already-correctly-typed values wins over one that merely widens.
pub const RAW_ARGUMENT_BIAS: i64 = -1024;

/// Converts a raw, type-erased argument into the type a parameter or
/// property declares. Implementors register with a `ConversionRegistry`;
/// the engine falls back to treating already-matching `TypeId`s as a
/// free, zero-weight conversion before consulting the registry.
pub trait TypeConverter: Send + Sync {
    fn target_type(&self) -> TypeKeyOwned;
    fn convert(&self, value: &dyn Any) -> Result<AnyArc, DiError>;
}

/// Registry of `TypeConverter`s, consulted when an argument's runtime
/// type does not already match the declared parameter type.
#[derive(Default)]
pub struct ConversionRegistry {
    converters: Vec<Arc<dyn TypeConverter>>,
}

impl ConversionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, converter: Arc<dyn TypeConverter>) {
        self.converters.push(converter);
    }

    pub fn find(&self, target: TypeKeyOwned) -> Option<&Arc<dyn TypeConverter>> {
        self.converters
            .iter()
            .find(|c| c.target_type().id == target.id)
    }
}

/// The weight contribution of matching one declared parameter type
/// against one supplied argument type. Zero means an exact match;
/// `UNASSIGNABLE_WEIGHT` means the argument cannot satisfy the parameter
/// even after conversion.
pub fn parameter_weight(declared: TypeKeyOwned, supplied: TypeKeyOwned, convertible: bool) -> i64 {
    if declared.id == supplied.id {
        0
    } else if convertible {
        // A successful conversion still costs something: an exact match
        // should always be preferred to a winning conversion.
        16
    } else {
        UNASSIGNABLE_WEIGHT
    }
}

/// Total weight for a candidate given its per-parameter weights, applying
/// the raw-argument bias when `raw` is true (the candidate is being
/// scored against its pre-conversion argument array — both the converted
/// and raw argument arrays get weighed so an exact raw match can beat a
/// lossy conversion).
pub fn total_weight(per_parameter: &[i64], raw: bool) -> i64 {
    let sum: i64 = per_parameter.iter().sum();
    if raw {
        sum + RAW_ARGUMENT_BIAS
    } else {
        sum
    }
}
