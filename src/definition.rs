//! The bean definition model: `BeanDefinition` as declared by a caller,
//! and `MergedBeanDefinition`, the resolved form the creation engine
//! actually runs against.

use std::any::TypeId;
use std::sync::Mutex;

use crate::arg::{Arg, ConstructorArg, PropertyValue, TypeKeyOwned};
use crate::error::{DiError, DiResult};

/// How a bean's lifetime is managed by the registry.
///
/// A three-way split, with the second variant generalized from a fixed
/// web-request "Scoped" to an arbitrarily named custom scope (web-tier
/// scopes are out of scope for this crate, but the general custom-scope
/// mechanism is not).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeanScope {
    /// One instance per container, cached for the container's lifetime.
    Singleton,
    /// A fresh instance on every lookup, never cached.
    Prototype,
    /// One instance per named custom scope (see `custom_scope.rs`).
    Custom(String),
}

/// How missing constructor/property values are filled in automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutowireMode {
    /// No autowiring; every required value must be declared explicitly.
    None,
    /// Resolve missing properties by matching their name to a bean name.
    ByName,
    /// Resolve missing properties/parameters by matching their type.
    ByType,
    /// Resolve missing constructor parameters by type (property autowiring off).
    ByConstructor,
}

/// How a bean's destroy callback is determined.
///
/// A real three-way enum in place of the "(inferred)" sentinel string
/// the original container uses: `Inferred` defers to whatever
/// `Injectable::lifecycle_metadata()` reports for the type, resolved
/// once and cached on the merged definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestroyMethod {
    /// Look up the destroy callback from the type's injection metadata.
    Inferred,
    /// Call the named method explicitly.
    Named(String),
    /// No destroy callback at all, even if the type declares one.
    None,
}

/// A declarative description of one component, as supplied by a caller
/// (there is no annotation/XML parser in this crate).
pub struct BeanDefinition {
    pub name: String,
    pub target_type: Option<TypeKeyOwned>,
    pub factory_bean_name: Option<String>,
    pub factory_method_name: Option<String>,
    pub scope: BeanScope,
    pub constructor_args: Vec<ConstructorArg>,
    pub property_values: Vec<PropertyValue>,
    pub init_method_name: Option<String>,
    pub destroy_method: DestroyMethod,
    pub parent: Option<String>,
    pub autowire_mode: AutowireMode,
    pub lazy_init: bool,
    pub primary: bool,
    pub lenient_constructor_resolution: bool,
    pub allow_non_public_access: bool,
    pub depends_on: Vec<String>,
    pub is_abstract: bool,
    /// Tie-break for by-type ambiguity once the primary flag has failed
    /// to single out a candidate: the highest-priority candidate wins.
    pub priority: Option<i32>,
}

impl BeanDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        BeanDefinition {
            name: name.into(),
            target_type: None,
            factory_bean_name: None,
            factory_method_name: None,
            scope: BeanScope::Singleton,
            constructor_args: Vec::new(),
            property_values: Vec::new(),
            init_method_name: None,
            destroy_method: DestroyMethod::Inferred,
            parent: None,
            autowire_mode: AutowireMode::None,
            lazy_init: false,
            primary: false,
            lenient_constructor_resolution: true,
            allow_non_public_access: false,
            depends_on: Vec::new(),
            is_abstract: false,
            priority: None,
        }
    }

    pub fn is_singleton(&self) -> bool {
        matches!(self.scope, BeanScope::Singleton)
    }

    pub fn is_prototype(&self) -> bool {
        matches!(self.scope, BeanScope::Prototype)
    }

    /// Merges `self` over `parent`, following parent-definition fields
    /// when `self` leaves them at their default ("not overridden").
    /// Constructor args and property values are unioned, with `self`'s
    /// entries taking precedence by index/name.
    fn merge_over(&self, parent: &BeanDefinition) -> BeanDefinition {
        let mut constructor_args = parent.constructor_args.clone();
        for arg in &self.constructor_args {
            if let Some(idx) = arg.index {
                if let Some(existing) = constructor_args
                    .iter_mut()
                    .find(|a| a.index == Some(idx))
                {
                    *existing = arg.clone();
                    continue;
                }
            }
            constructor_args.push(arg.clone());
        }

        let mut property_values = parent.property_values.clone();
        for pv in &self.property_values {
            if let Some(existing) = property_values.iter_mut().find(|p| p.name == pv.name) {
                *existing = pv.clone();
            } else {
                property_values.push(pv.clone());
            }
        }

        let mut depends_on = parent.depends_on.clone();
        for d in &self.depends_on {
            if !depends_on.contains(d) {
                depends_on.push(d.clone());
            }
        }

        BeanDefinition {
            name: self.name.clone(),
            target_type: self.target_type.or(parent.target_type),
            factory_bean_name: self
                .factory_bean_name
                .clone()
                .or_else(|| parent.factory_bean_name.clone()),
            factory_method_name: self
                .factory_method_name
                .clone()
                .or_else(|| parent.factory_method_name.clone()),
            scope: if self.is_singleton() && self.parent.is_some() {
                parent.scope.clone()
            } else {
                self.scope.clone()
            },
            constructor_args,
            property_values,
            init_method_name: self
                .init_method_name
                .clone()
                .or_else(|| parent.init_method_name.clone()),
            destroy_method: if matches!(self.destroy_method, DestroyMethod::Inferred) {
                parent.destroy_method.clone()
            } else {
                self.destroy_method.clone()
            },
            parent: None,
            autowire_mode: self.autowire_mode,
            lazy_init: self.lazy_init || parent.lazy_init,
            primary: self.primary,
            lenient_constructor_resolution: self.lenient_constructor_resolution,
            allow_non_public_access: self.allow_non_public_access,
            depends_on,
            is_abstract: self.is_abstract,
            priority: self.priority.or(parent.priority),
        }
    }
}

impl Clone for BeanDefinition {
    fn clone(&self) -> Self {
        BeanDefinition {
            name: self.name.clone(),
            target_type: self.target_type,
            factory_bean_name: self.factory_bean_name.clone(),
            factory_method_name: self.factory_method_name.clone(),
            scope: self.scope.clone(),
            constructor_args: self.constructor_args.clone(),
            property_values: self.property_values.clone(),
            init_method_name: self.init_method_name.clone(),
            destroy_method: self.destroy_method.clone(),
            parent: self.parent.clone(),
            autowire_mode: self.autowire_mode,
            lazy_init: self.lazy_init,
            primary: self.primary,
            lenient_constructor_resolution: self.lenient_constructor_resolution,
            allow_non_public_access: self.allow_non_public_access,
            depends_on: self.depends_on.clone(),
            is_abstract: self.is_abstract,
            priority: self.priority,
        }
    }
}

/// Resolved creation-time slots layered over a `BeanDefinition`.
///
/// Slots are filled in under `resolved`'s lock the first time a
/// definition is used to create a bean, then read without the lock on
/// every subsequent creation (prototypes re-enter `do_create_bean`
/// often, so this cache matters).
pub struct MergedBeanDefinition {
    pub definition: BeanDefinition,
    resolved: Mutex<ResolvedSlots>,
}

#[derive(Default)]
struct ResolvedSlots {
    constructor_candidate_index: Option<usize>,
    resolved_target_type: Option<TypeKeyOwned>,
    resolved_args: Option<Vec<Arg>>,
    constructor_arguments_resolved: bool,
    post_processed: bool,
}

impl MergedBeanDefinition {
    pub fn new(definition: BeanDefinition) -> Self {
        MergedBeanDefinition {
            definition,
            resolved: Mutex::new(ResolvedSlots::default()),
        }
    }

    /// Builds a merged definition from an optional parent: child fields
    /// win, unset child fields fall back to the parent's, constructor args
    /// and property values union by index/name.
    pub fn merge(child: &BeanDefinition, parent: Option<&BeanDefinition>) -> DiResult<Self> {
        let merged = match parent {
            Some(parent) => child.merge_over(parent),
            None => child.clone(),
        };
        if merged.is_abstract {
            return Err(DiError::Definition {
                bean: merged.name.clone(),
                message: "definition is abstract and has no concrete producer".into(),
            });
        }
        Ok(MergedBeanDefinition::new(merged))
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn resolved_target_type(&self) -> Option<TypeKeyOwned> {
        self.resolved.lock().unwrap_or_else(|e| e.into_inner()).resolved_target_type
    }

    pub fn set_resolved_target_type(&self, type_key: TypeKeyOwned) {
        self.resolved.lock().unwrap_or_else(|e| e.into_inner()).resolved_target_type = Some(type_key);
    }

    pub fn cached_constructor(&self) -> Option<(usize, Vec<Arg>)> {
        let slots = self.resolved.lock().unwrap_or_else(|e| e.into_inner());
        if slots.constructor_arguments_resolved {
            slots
                .constructor_candidate_index
                .zip(slots.resolved_args.clone())
        } else {
            None
        }
    }

    pub fn cache_constructor(&self, index: usize, args: Vec<Arg>) {
        let mut slots = self.resolved.lock().unwrap_or_else(|e| e.into_inner());
        slots.constructor_candidate_index = Some(index);
        slots.resolved_args = Some(args);
        slots.constructor_arguments_resolved = true;
    }

    /// Runs `f` exactly once for this merged definition (used to guard
    /// `MergedDefinitionPostProcessor` invocation), returning whether this
    /// call was the one that ran it.
    pub fn run_post_process_once(&self) -> bool {
        let mut slots = self.resolved.lock().unwrap_or_else(|e| e.into_inner());
        if slots.post_processed {
            false
        } else {
            slots.post_processed = true;
            true
        }
    }
}

#[allow(dead_code)]
fn assert_type_id_usable(_: TypeId) {}
