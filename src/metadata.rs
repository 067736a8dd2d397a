//! Annotation-driven injection metadata, minus the annotations.
//!
//! A reflective container scans a class's declared fields, constructors,
//! and methods for injection markers at startup. Rust has no such scan;
//! instead, every injectable type implements `Injectable`, either by
//! hand or via `#[derive(Injectable)]` (the `truss-di-derive` crate),
//! which performs the equivalent work at compile time and hands back
//! the same `InjectionMetadata` shape a scanner would have produced.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::arg::{AnyArc, ConstructorCandidate, TypeKeyOwned};
use crate::dependency::ContainerKind;
use crate::error::DiResult;

/// One field or setter-method injection point discovered on a type.
#[derive(Clone, Debug)]
pub struct InjectedElement {
    pub member_name: &'static str,
    pub declared_type: TypeKeyOwned,
    pub required: bool,
    pub qualifier: Option<&'static str>,
    /// Single value, or one of the recognized container shapes
    /// (`Vec<Arc<T>>`, `HashMap<String, Arc<T>>`, ...).
    pub container_kind: ContainerKind,
}

/// An init or destroy lifecycle callback discovered on a type.
///
/// `method_name` is kept for diagnostics and for deduplicating externally
/// managed config members; `invoke` is the actual compile-time-generated
/// call site, since this container has no reflection to dispatch a method
/// by its string name at runtime.
#[derive(Clone)]
pub struct LifecycleCallback {
    pub method_name: &'static str,
    pub invoke: Arc<dyn Fn(&AnyArc) -> DiResult<()> + Send + Sync>,
}

impl std::fmt::Debug for LifecycleCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleCallback").field("method_name", &self.method_name).finish()
    }
}

/// Per-type lifecycle callback list: init callbacks run in declaration
/// order after property population, destroy callbacks run in reverse
/// during container shutdown.
#[derive(Clone, Debug, Default)]
pub struct LifecycleMetadata {
    pub init_callbacks: Vec<LifecycleCallback>,
    pub destroy_callbacks: Vec<LifecycleCallback>,
}

/// Resolves one injected field's value by declared type (and optional
/// qualifier). The creation engine implements this on top of the
/// container so generated `inject_fields` bodies never see the
/// container's full API, only what they need.
pub trait FieldResolver {
    /// Resolves a single-value injection point (`container_kind ==
    /// ContainerKind::Single`).
    fn resolve_field(&self, element: &InjectedElement) -> DiResult<AnyArc>;

    /// Resolves a collection injection point (`Vec`/`Map`), returning
    /// every matching bean paired with the name it was registered under
    /// so `Map` fields can key by it. `Vec` fields just drop the name.
    /// The default implementation satisfies `Single`-only resolvers.
    fn resolve_collection(&self, element: &InjectedElement) -> DiResult<Vec<(String, AnyArc)>> {
        let _ = element;
        Ok(Vec::new())
    }
}

/// The full compile-time-generated (or hand-written) descriptor for one
/// injectable type: its field injection points, its registered
/// constructor candidates, and its lifecycle callbacks.
pub struct InjectionMetadata {
    pub fields: Vec<InjectedElement>,
    pub constructors: Vec<ConstructorCandidate>,
    pub lifecycle: LifecycleMetadata,
    /// Applies every resolved field value onto a freshly constructed,
    /// not-yet-downcast instance. Takes `&dyn Any` (a shared reference,
    /// safely obtainable from an `Arc` regardless of its strong count)
    /// since the metadata cache is type-erased; the generated
    /// implementation downcasts internally before assigning. Fields
    /// populated this way must use interior mutability (`Mutex<..>`) to
    /// accept the write through a shared reference — required so a bean
    /// observed early through a circular reference is never exposed to
    /// unsynchronized mutable aliasing.
    pub inject_fields: Arc<dyn Fn(&dyn std::any::Any, &dyn FieldResolver) -> DiResult<()> + Send + Sync>,
}

/// A type that can describe its own injection points. Implement this by
/// hand for full control, or derive it:
///
/// ```ignore
/// #[derive(Injectable)]
/// struct OrderService {
///     #[autowired]
///     repository: Arc<OrderRepository>,
///     #[autowired(optional)]
///     notifier: Option<Arc<dyn Notifier>>,
/// }
/// ```
pub trait Injectable: 'static {
    fn injection_metadata() -> InjectionMetadata
    where
        Self: Sized;
}

/// Process-wide cache of `InjectionMetadata`, keyed by `TypeId` so each
/// type's descriptor is produced once no matter how many beans of that
/// type exist. A single `RwLock<HashMap<..>>` is enough since metadata
/// lookups are not as hot a path as service resolution itself.
#[derive(Default)]
pub struct MetadataCache {
    entries: RwLock<HashMap<TypeId, Arc<InjectionMetadata>>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_insert_with<T: Injectable>(&self) -> Arc<InjectionMetadata> {
        let type_id = TypeId::of::<T>();
        if let Some(existing) = self.entries.read().unwrap_or_else(|e| e.into_inner()).get(&type_id) {
            return existing.clone();
        }
        let metadata = Arc::new(T::injection_metadata());
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(type_id)
            .or_insert(metadata)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Plain;
    impl Injectable for Plain {
        fn injection_metadata() -> InjectionMetadata {
            InjectionMetadata {
                fields: Vec::new(),
                constructors: Vec::new(),
                lifecycle: LifecycleMetadata::default(),
                inject_fields: Arc::new(|_, _| Ok(())),
            }
        }
    }

    #[test]
    fn cache_returns_same_descriptor_for_repeated_lookups() {
        let cache = MetadataCache::new();
        let a = cache.get_or_insert_with::<Plain>();
        let b = cache.get_or_insert_with::<Plain>();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
