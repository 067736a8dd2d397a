//! Bean identity: the lookup keys the registry and caches are keyed by.

use std::any::TypeId;
use std::sync::Arc;

/// The name a bean is registered and looked up under.
///
/// Bean names are the primary identity in this container (unlike a
/// purely type-keyed DI container): two beans of the same Rust type can
/// coexist under different names, and a single name always resolves to
/// exactly one definition. `Arc<str>` keeps clones of the identity cheap
/// since the same name is threaded through the dependency graph, the
/// singleton caches, and every error path.
#[derive(Debug, Clone)]
pub struct BeanName(Arc<str>);

impl BeanName {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        BeanName(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `&beanName` dereference form used to request the backing
    /// `FactoryBean` itself rather than the object it produces.
    pub fn is_factory_dereference(&self) -> bool {
        self.0.starts_with('&')
    }

    /// Strips a leading `&` dereference prefix, if present.
    pub fn without_factory_prefix(&self) -> &str {
        self.0.strip_prefix('&').unwrap_or(&self.0)
    }
}

impl PartialEq for BeanName {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        *self.0 == *other.0
    }
}
impl Eq for BeanName {}

impl std::hash::Hash for BeanName {
    #[inline]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        (*self.0).hash(state);
    }
}

impl std::fmt::Display for BeanName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for BeanName {
    fn from(s: &str) -> Self {
        BeanName(Arc::from(s))
    }
}
impl From<String> for BeanName {
    fn from(s: String) -> Self {
        BeanName(Arc::from(s.as_str()))
    }
}

/// Secondary index key used for autowire-by-type lookups.
///
/// Carries the `TypeId` for fast equality plus the static type name for
/// diagnostics, splitting a fast comparison field from a display-only
/// field.
#[derive(Debug, Clone, Copy)]
pub struct TypeKey {
    pub id: TypeId,
    pub name: &'static str,
}

impl TypeKey {
    pub fn of<T: 'static>() -> Self {
        TypeKey {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }
}

impl PartialEq for TypeKey {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for TypeKey {}

impl std::hash::Hash for TypeKey {
    #[inline(always)]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
