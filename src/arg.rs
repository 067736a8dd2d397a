//! Constructor arguments, property values, and the explicit stand-in for
//! "this parameter should be autowired" that a name-keyed,
//! definition-based container needs in place of reflection.

use std::any::{Any, TypeId};
use std::sync::Arc;

use crate::key::BeanName;

/// A type-erased, reference-counted bean instance — the Rust stand-in for
/// "an object of whatever type the reflective container produced".
/// `pub` (not `pub(crate)`) because `truss-di-derive`-generated code,
/// which lives in a downstream crate, names this type directly.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

/// A single resolved or pending argument.
///
/// `Autowired` is a real enum variant, not a sentinel pointer or a
/// magic string: the design notes single out the "prepared arguments
/// marker" as a place a reflective container reaches for a sentinel
/// value, and ask for a tagged variant instead.
#[derive(Clone)]
pub enum Arg {
    /// A literal value already converted to the declared parameter type.
    Value(AnyArc),
    /// A reference to another bean, resolved by name at creation time.
    Ref(BeanName),
    /// No value was declared; resolve by type when the candidate is used.
    Autowired,
}

impl std::fmt::Debug for Arg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Arg::Value(_) => write!(f, "Arg::Value(..)"),
            Arg::Ref(name) => write!(f, "Arg::Ref({name})"),
            Arg::Autowired => write!(f, "Arg::Autowired"),
        }
    }
}

/// A constructor argument as declared on a `BeanDefinition`, before
/// resolution. Arguments may be indexed (position in the argument list)
/// or generic (matched by declared type during candidate scoring).
#[derive(Clone, Debug)]
pub struct ConstructorArg {
    pub index: Option<usize>,
    pub declared_type: Option<TypeKeyOwned>,
    pub value: Arg,
}

/// A property value to populate after instantiation (setter/field
/// injection target), keyed by property name.
#[derive(Clone, Debug)]
pub struct PropertyValue {
    pub name: String,
    pub value: Arg,
}

/// An owned `TypeId` + display name pair, used where a definition needs
/// to carry type information across calls (the borrowed `TypeKey` in
/// `key.rs` requires a `'static` name, which is fine for compile-time
/// descriptors but definitions may be built from dynamic data).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TypeKeyOwned {
    pub id: TypeId,
    pub name: &'static str,
}

impl TypeKeyOwned {
    pub fn of<T: 'static>() -> Self {
        TypeKeyOwned {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }
}

/// One declared parameter of a constructor or factory-method candidate.
#[derive(Clone, Debug)]
pub struct ParamSpec {
    pub name: Option<&'static str>,
    pub type_key: TypeKeyOwned,
    pub required: bool,
}

/// A registered constructor or factory-method candidate: the explicit
/// stand-in for what reflection would otherwise discover by inspecting
/// a class's declared constructors. Candidates are ranked by
/// `crate::constructor::resolve` against the arguments a `BeanDefinition`
/// supplies.
pub struct ConstructorCandidate {
    pub params: Vec<ParamSpec>,
    pub is_public: bool,
    pub factory: Arc<dyn Fn(Vec<AnyArc>) -> crate::error::DiResult<AnyArc> + Send + Sync>,
}

impl std::fmt::Debug for ConstructorCandidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstructorCandidate")
            .field("params", &self.params)
            .field("is_public", &self.is_public)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn autowired_arg_is_distinct_variant() {
        let arg = Arg::Autowired;
        assert!(matches!(arg, Arg::Autowired));
    }

    #[test]
    fn type_key_owned_matches_type_id() {
        let k = TypeKeyOwned::of::<u32>();
        assert_eq!(k.id, TypeId::of::<u32>());
    }
}
