//! Fluent construction API: `BeanDefinitionBuilder` assembles one
//! `BeanDefinition`, `ContainerBuilder` collects definitions, aliases,
//! custom scopes, and post-processors into a `Container`.
//!
//! A name-keyed registration surface
//! (`register_instance`/`register_factory`/...) with the definition-level
//! knobs (`depends_on`, `parent`, `init_method`/`destroy_method`,
//! constructor/property values) a reflective container would otherwise
//! populate from annotations or XML.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use crate::arg::{Arg, AnyArc, ConstructorArg, PropertyValue, TypeKeyOwned};
use crate::container::{BeanEntry, Container, ContainerOptions};
use crate::convert::{ConversionRegistry, TypeConverter};
use crate::creation::Instantiator;
use crate::custom_scope::{Scope, ScopeRegistry};
use crate::definition::{BeanDefinition, BeanScope, DestroyMethod};
use crate::error::{DiError, DiResult};
use crate::factory_bean::FactoryBean;
use crate::key::BeanName;
use crate::metadata::Injectable;
use crate::observer::{DiObserver, Observers};
use crate::postprocessor::{
    AfterInitializationPostProcessor, BeforeInitializationPostProcessor,
    DestructionAwarePostProcessor, InstantiationAwarePostProcessor, MergedDefinitionPostProcessor,
    PostProcessorPipeline, SmartInstantiationAwarePostProcessor,
};

/// Fluent assembly of one `BeanDefinition`: `BeanDefinitionBuilder::new("svc")
/// .constructor_arg_value(...).scope(...).build()`.
pub struct BeanDefinitionBuilder {
    definition: BeanDefinition,
}

impl BeanDefinitionBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        BeanDefinitionBuilder {
            definition: BeanDefinition::new(name),
        }
    }

    pub fn scope(mut self, scope: BeanScope) -> Self {
        self.definition.scope = scope;
        self
    }

    pub fn prototype(self) -> Self {
        self.scope(BeanScope::Prototype)
    }

    pub fn custom_scope(self, name: impl Into<String>) -> Self {
        self.scope(BeanScope::Custom(name.into()))
    }

    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.definition.depends_on.push(name.into());
        self
    }

    pub fn primary(mut self, primary: bool) -> Self {
        self.definition.primary = primary;
        self
    }

    /// Tie-break among several non-primary by-type candidates: highest
    /// value wins. Consulted only after `primary` fails to narrow the
    /// field to one candidate.
    pub fn priority(mut self, priority: i32) -> Self {
        self.definition.priority = Some(priority);
        self
    }

    pub fn lazy_init(mut self, lazy: bool) -> Self {
        self.definition.lazy_init = lazy;
        self
    }

    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.definition.parent = Some(parent.into());
        self
    }

    /// Marks this definition as a template with no concrete producer of
    /// its own; a child definition must override it.
    pub fn abstract_definition(mut self) -> Self {
        self.definition.is_abstract = true;
        self
    }

    pub fn init_method(mut self, name: impl Into<String>) -> Self {
        self.definition.init_method_name = Some(name.into());
        self
    }

    pub fn destroy_method(mut self, method: DestroyMethod) -> Self {
        self.definition.destroy_method = method;
        self
    }

    pub fn lenient_constructor_resolution(mut self, lenient: bool) -> Self {
        self.definition.lenient_constructor_resolution = lenient;
        self
    }

    pub fn constructor_arg_value(mut self, index: usize, value: AnyArc) -> Self {
        self.definition.constructor_args.push(ConstructorArg {
            index: Some(index),
            declared_type: None,
            value: Arg::Value(value),
        });
        self
    }

    pub fn constructor_arg_ref(mut self, index: usize, bean_name: impl Into<String>) -> Self {
        self.definition.constructor_args.push(ConstructorArg {
            index: Some(index),
            declared_type: None,
            value: Arg::Ref(BeanName::from(bean_name.into())),
        });
        self
    }

    pub fn property_value(mut self, name: impl Into<String>, value: AnyArc) -> Self {
        self.definition.property_values.push(PropertyValue {
            name: name.into(),
            value: Arg::Value(value),
        });
        self
    }

    pub fn property_ref(mut self, name: impl Into<String>, bean_name: impl Into<String>) -> Self {
        self.definition.property_values.push(PropertyValue {
            name: name.into(),
            value: Arg::Ref(BeanName::from(bean_name.into())),
        });
        self
    }

    pub fn target_type<T: 'static>(mut self) -> Self {
        self.definition.target_type = Some(TypeKeyOwned::of::<T>());
        self
    }

    pub fn build(self) -> BeanDefinition {
        self.definition
    }
}

/// Collects bean definitions, aliases, custom scopes, and post-processors,
/// then produces an immutable `Container` — there is no hot-reloading
/// after `build()`.
pub struct ContainerBuilder {
    entries: HashMap<String, BeanEntry>,
    aliases: HashMap<String, String>,
    type_index: HashMap<TypeId, Vec<(String, bool)>>,
    scopes: ScopeRegistry,
    pipeline: PostProcessorPipeline,
    conversions: ConversionRegistry,
    options: ContainerOptions,
    observers: Observers,
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        ContainerBuilder {
            entries: HashMap::new(),
            aliases: HashMap::new(),
            type_index: HashMap::new(),
            scopes: ScopeRegistry::new(),
            pipeline: PostProcessorPipeline::new(),
            conversions: ConversionRegistry::new(),
            options: ContainerOptions::default(),
            observers: Observers::new(),
        }
    }
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert_entry(&mut self, name: String, entry: BeanEntry) {
        // A re-registration under a name already used ("last definition
        // wins" replace semantics) must not leave a stale by-type index
        // entry pointing at the overwritten definition's type, or by-type
        // lookups would see a phantom duplicate under the same name.
        if let Some(previous) = self.entries.get(&name) {
            if let Some(previous_type) = previous.type_id {
                if let Some(bucket) = self.type_index.get_mut(&previous_type) {
                    bucket.retain(|(existing, _)| existing != &name);
                }
            }
        }
        if let Some(type_id) = entry.type_id {
            self.type_index
                .entry(type_id)
                .or_default()
                .push((name.clone(), entry.definition.primary));
        }
        self.entries.insert(name, entry);
    }

    /// Registers a type whose constructor and field-injection points come
    /// from `T::injection_metadata()`, the compile-time stand-in for
    /// reflective constructor/field discovery.
    pub fn register<T: Injectable + Send + Sync + 'static>(&mut self, definition: BeanDefinition) -> &mut Self {
        let name = definition.name.clone();
        let lenient = definition.lenient_constructor_resolution;
        let metadata = Arc::new(T::injection_metadata());
        let entry = BeanEntry {
            definition,
            instantiator: Instantiator::Constructor { metadata, lenient },
            type_id: Some(TypeId::of::<T>()),
            explicit_init: None,
            explicit_destroy: None,
            factory_bean_product: None,
            factory_bean_caches_product: false,
        };
        self.insert_entry(name, entry);
        self
    }

    /// Registers an already-constructed value as a singleton, skipping
    /// the creation engine entirely.
    pub fn register_instance<T: Send + Sync + 'static>(&mut self, name: impl Into<String>, value: T) -> &mut Self {
        let name = name.into();
        let arc: AnyArc = Arc::new(value);
        let entry = BeanEntry {
            definition: BeanDefinition::new(name.clone()),
            instantiator: Instantiator::Producer(Arc::new(move || Ok(arc.clone()))),
            type_id: Some(TypeId::of::<T>()),
            explicit_init: None,
            explicit_destroy: None,
            factory_bean_product: None,
            factory_bean_caches_product: false,
        };
        self.insert_entry(name, entry);
        self
    }

    /// Registers a hand-written factory under the given scope, one method
    /// parameterized by `BeanScope` instead of a separate method per
    /// scope.
    pub fn register_factory<T, F>(&mut self, name: impl Into<String>, scope: BeanScope, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn() -> DiResult<T> + Send + Sync + 'static,
    {
        let name = name.into();
        let mut definition = BeanDefinition::new(name.clone());
        definition.scope = scope;
        let entry = BeanEntry {
            definition,
            instantiator: Instantiator::Producer(Arc::new(move || factory().map(|v| Arc::new(v) as AnyArc))),
            type_id: Some(TypeId::of::<T>()),
            explicit_init: None,
            explicit_destroy: None,
            factory_bean_product: None,
            factory_bean_caches_product: false,
        };
        self.insert_entry(name, entry);
        self
    }

    /// Registers a `FactoryBean`: the raw instance stored under `name` is
    /// the factory itself (reachable via `&name`), while a bare `name`
    /// lookup dispatches through `FactoryBean::get_object()` instead. The
    /// product is cached per name when `factory_bean.is_singleton()` is
    /// true, recomputed on every lookup otherwise.
    pub fn register_factory_bean<T>(&mut self, name: impl Into<String>, factory_bean: T) -> &mut Self
    where
        T: FactoryBean + Send + Sync + 'static,
    {
        let name = name.into();
        let caches_product = factory_bean.is_singleton();
        let factory_bean: AnyArc = Arc::new(factory_bean);
        let factory_for_entry = factory_bean.clone();
        let entry = BeanEntry {
            definition: BeanDefinition::new(name.clone()),
            instantiator: Instantiator::Producer(Arc::new(move || Ok(factory_for_entry.clone()))),
            // Not indexed by the factory's own type: a by-type lookup
            // should find the factory bean's *product*, which this
            // simplified container has no static type for until the
            // product is actually computed.
            type_id: None,
            explicit_init: None,
            explicit_destroy: None,
            factory_bean_product: Some(Arc::new(move |raw: &AnyArc| {
                let factory_bean = raw.clone().downcast::<T>().map_err(|_| DiError::WrongType {
                    expected: std::any::type_name::<T>(),
                    bean: std::any::type_name::<T>().to_string(),
                })?;
                factory_bean.get_object()
            })),
            factory_bean_caches_product: caches_product,
        };
        self.insert_entry(name, entry);
        self
    }

    /// Registers a converter consulted whenever a declared constructor
    /// argument or property value's runtime type doesn't already match
    /// the declared parameter type.
    pub fn register_converter(&mut self, converter: Arc<dyn TypeConverter>) -> &mut Self {
        self.conversions.register(converter);
        self
    }

    /// Escape hatch for a caller that already built its own definition and
    /// instantiator (e.g. `truss-di-derive`'s generated registration code).
    pub fn register_definition(
        &mut self,
        definition: BeanDefinition,
        instantiator: Instantiator,
        type_id: Option<TypeId>,
    ) -> &mut Self {
        let name = definition.name.clone();
        let entry = BeanEntry {
            definition,
            instantiator,
            type_id,
            explicit_init: None,
            explicit_destroy: None,
            factory_bean_product: None,
            factory_bean_caches_product: false,
        };
        self.insert_entry(name, entry);
        self
    }

    /// Attaches the closure backing a `BeanDefinitionBuilder::init_method`
    /// name. No-op if `name` was never registered (caught at `build()`
    /// only for `depends_on`/`parent`/alias references, not this).
    pub fn with_explicit_init(
        &mut self,
        name: &str,
        init: Arc<dyn Fn(&AnyArc) -> DiResult<()> + Send + Sync>,
    ) -> &mut Self {
        if let Some(entry) = self.entries.get_mut(name) {
            entry.explicit_init = Some(init);
        }
        self
    }

    /// Attaches the closure backing a `DestroyMethod::Named` name.
    pub fn with_explicit_destroy(
        &mut self,
        name: &str,
        destroy: Arc<dyn Fn(&AnyArc) -> DiResult<()> + Send + Sync>,
    ) -> &mut Self {
        if let Some(entry) = self.entries.get_mut(name) {
            entry.explicit_destroy = Some(destroy);
        }
        self
    }

    pub fn alias(&mut self, alias: impl Into<String>, target: impl Into<String>) -> &mut Self {
        self.aliases.insert(alias.into(), target.into());
        self
    }

    pub fn register_scope(&mut self, name: impl Into<String>, scope: Arc<dyn Scope>) -> &mut Self {
        self.scopes.register(name, scope);
        self
    }

    pub fn add_merged_definition_post_processor(&mut self, p: Arc<dyn MergedDefinitionPostProcessor>) -> &mut Self {
        self.pipeline.add_merged_definition(p);
        self
    }

    pub fn add_instantiation_aware_post_processor(&mut self, p: Arc<dyn InstantiationAwarePostProcessor>) -> &mut Self {
        self.pipeline.add_instantiation_aware(p);
        self
    }

    pub fn add_smart_instantiation_aware_post_processor(
        &mut self,
        p: Arc<dyn SmartInstantiationAwarePostProcessor>,
    ) -> &mut Self {
        self.pipeline.add_smart_instantiation_aware(p);
        self
    }

    pub fn add_before_initialization_post_processor(&mut self, p: Arc<dyn BeforeInitializationPostProcessor>) -> &mut Self {
        self.pipeline.add_before_init(p);
        self
    }

    pub fn add_after_initialization_post_processor(&mut self, p: Arc<dyn AfterInitializationPostProcessor>) -> &mut Self {
        self.pipeline.add_after_init(p);
        self
    }

    pub fn add_destruction_aware_post_processor(&mut self, p: Arc<dyn DestructionAwarePostProcessor>) -> &mut Self {
        self.pipeline.add_destruction_aware(p);
        self
    }

    pub fn options(&mut self, options: ContainerOptions) -> &mut Self {
        self.options = options;
        self
    }

    /// Registers an observer to be notified of every bean resolution, a
    /// diagnostic hook for logging or metrics.
    pub fn add_observer(&mut self, observer: Arc<dyn DiObserver>) -> &mut Self {
        self.observers.add(observer);
        self
    }

    /// Finalizes the builder into a `Container`. Validates that every
    /// `parent`, `depends_on`, and alias target names a bean that was
    /// actually registered — definitions are checked once at build time,
    /// not rediscovered on every lookup miss.
    pub fn build(self) -> DiResult<Container> {
        for entry in self.entries.values() {
            if let Some(parent) = &entry.definition.parent {
                if !self.entries.contains_key(parent) {
                    return Err(DiError::Definition {
                        bean: entry.definition.name.clone(),
                        message: format!("parent bean '{parent}' is not registered"),
                    });
                }
            }
            for dep in &entry.definition.depends_on {
                if !self.entries.contains_key(dep) {
                    return Err(DiError::Definition {
                        bean: entry.definition.name.clone(),
                        message: format!("depends-on bean '{dep}' is not registered"),
                    });
                }
            }
        }
        for target in self.aliases.values() {
            if !self.entries.contains_key(target) {
                return Err(DiError::Definition {
                    bean: target.clone(),
                    message: format!("alias target '{target}' is not registered"),
                });
            }
        }
        Ok(Container::new_with_observers(
            self.entries,
            self.aliases,
            self.type_index,
            self.scopes,
            self.pipeline,
            self.conversions,
            self.options,
            self.observers,
        ))
    }
}
