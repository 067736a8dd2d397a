//! The creation engine: turns a `MergedBeanDefinition` into a live
//! instance.

use std::any::Any;
use std::sync::Arc;

use crate::arg::{Arg, AnyArc};
use crate::constructor;
use crate::convert::ConversionRegistry;
use crate::definition::{BeanScope, DestroyMethod, MergedBeanDefinition};
use crate::error::{DiError, DiResult};
use crate::internal::DisposeBag;
use crate::metadata::{FieldResolver, InjectionMetadata};
use crate::postprocessor::PostProcessorPipeline;

/// Everything the creation engine needs from the surrounding container
/// to resolve a dependency by name or register a destroy callback,
/// without depending on `Container` directly (keeps this module testable
/// in isolation and keeps the dependency direction one-way).
pub trait CreationContext: FieldResolver {
    fn resolve_by_name(&self, name: &str) -> DiResult<AnyArc>;
    fn expose_early_reference(&self, name: &str, factory: Arc<dyn Fn() -> DiResult<AnyArc> + Send + Sync>);
    fn register_dependent(&self, dependency: &str, dependent: &str);

    /// Resolves a constructor parameter that has no declared value, by the
    /// parameter's static type: absent a declared value and with
    /// autowiring enabled, resolve a dependency by type. `name_hint` is the
    /// injection point's own name (a constructor parameter name, say),
    /// consulted only once the primary flag and priority tiers fail to
    /// single out a candidate. Default implementation reports not-found,
    /// for test doubles that never need by-type autowiring.
    fn resolve_by_type(&self, type_id: std::any::TypeId, qualifier: Option<&str>, name_hint: Option<&str>) -> DiResult<AnyArc> {
        let _ = (qualifier, name_hint);
        Err(DiError::NotFound(format!("{type_id:?}")))
    }

    /// Runs the explicit, definition-declared init method (a named init
    /// method distinct from any compile-time generated one), if one was
    /// attached when the bean was registered. Most bean registrations have
    /// none, so the default is a no-op.
    fn run_explicit_init(&self, instance: &AnyArc) -> DiResult<()> {
        let _ = instance;
        Ok(())
    }

    /// The explicit, definition-declared destroy method, as an owned
    /// closure so it can be captured into a disposal bag that outlives
    /// this creation call and runs only at container shutdown (unlike
    /// `run_explicit_init`, which runs synchronously during creation).
    fn explicit_destroy(&self) -> Option<Arc<dyn Fn(&AnyArc) -> DiResult<()> + Send + Sync>> {
        None
    }

    /// The `DestructionAwarePostProcessor` pipeline, as a closure bound to
    /// the bean currently being created, so `build_disposal_bag` can defer
    /// it into the bag alongside the declared destroy callbacks instead of
    /// running it eagerly. Returns `None` when there is nothing to defer
    /// (e.g. a bare `CreationContext` used outside a real container).
    fn destruction_pipeline_hook(&self) -> Option<Arc<dyn Fn(&AnyArc) -> DiResult<()> + Send + Sync>> {
        None
    }

    /// Hands a populated disposal bag (destroy callbacks for this bean,
    /// already bound to `instance`) to whoever owns the singleton
    /// registry's destruction bookkeeping. Called only for singleton-scoped
    /// beans.
    fn register_disposal(&self, name: &str, bag: DisposeBag) {
        let _ = (name, bag);
    }

    /// The early reference a circular dependent actually observed for
    /// `name`, if any — distinct from whether one was merely published,
    /// since a sibling that never looked `name` up mid-creation never
    /// forced the level-3 factory to run. Default reports none, so the
    /// wrapping-vs-raw check in `do_create_bean` is a no-op unless the
    /// surrounding container wires it to its singleton registry.
    fn observed_early_reference(&self, name: &str) -> Option<AnyArc> {
        let _ = name;
        None
    }

    /// When a `SmartInstantiationAwarePostProcessor` wraps a bean after an
    /// early reference was already handed to a circular dependent, continue
    /// with a warning instead of failing. Default is to fail.
    fn allow_raw_injection_despite_wrapping(&self) -> bool {
        false
    }
}

/// Produces the raw, unpopulated instance for one bean, via whichever
/// instantiation strategy the definition calls for (user-supplied
/// producer, factory method, or constructor resolution).
pub enum Instantiator {
    Producer(Arc<dyn Fn() -> DiResult<AnyArc> + Send + Sync>),
    Constructor {
        metadata: Arc<InjectionMetadata>,
        lenient: bool,
    },
}

pub struct CreationEngine<'a> {
    pub pipeline: &'a PostProcessorPipeline,
    pub conversions: &'a ConversionRegistry,
}

impl<'a> CreationEngine<'a> {
    pub fn new(pipeline: &'a PostProcessorPipeline, conversions: &'a ConversionRegistry) -> Self {
        CreationEngine { pipeline, conversions }
    }

    /// The top-level `create_bean`: merged-definition post-processing
    /// happens exactly once, then the instantiation short-circuit is
    /// checked, then `do_create_bean` runs.
    pub fn create_bean(
        &self,
        name: &str,
        definition: &MergedBeanDefinition,
        instantiator: &Instantiator,
        ctx: &dyn CreationContext,
    ) -> DiResult<AnyArc> {
        if definition.run_post_process_once() {
            self.pipeline.run_merged_definition(name, definition)?;
        }

        if let Some(short_circuited) = self.pipeline.run_before_instantiation(name, definition)? {
            return self
                .pipeline
                .run_after_initialization(name, short_circuited)
                .map_err(|e| DiError::creation(name, e));
        }

        self.do_create_bean(name, definition, instantiator, ctx, None)
            .map_err(|e| DiError::creation(name, e))
    }

    /// `getBean(name, args...)`: bypasses declared constructor args and
    /// autowiring entirely, picking the candidate whose arity matches
    /// `args` exactly and passing them straight through. Merged-definition
    /// post-processing and the `before_instantiation` short-circuit still
    /// run, same as `create_bean`.
    pub fn create_bean_with_args(
        &self,
        name: &str,
        definition: &MergedBeanDefinition,
        instantiator: &Instantiator,
        ctx: &dyn CreationContext,
        args: Vec<AnyArc>,
    ) -> DiResult<AnyArc> {
        if definition.run_post_process_once() {
            self.pipeline.run_merged_definition(name, definition)?;
        }

        if let Some(short_circuited) = self.pipeline.run_before_instantiation(name, definition)? {
            return self
                .pipeline
                .run_after_initialization(name, short_circuited)
                .map_err(|e| DiError::creation(name, e));
        }

        self.do_create_bean(name, definition, instantiator, ctx, Some(args))
            .map_err(|e| DiError::creation(name, e))
    }

    fn do_create_bean(
        &self,
        name: &str,
        definition: &MergedBeanDefinition,
        instantiator: &Instantiator,
        ctx: &dyn CreationContext,
        explicit_args: Option<Vec<AnyArc>>,
    ) -> DiResult<AnyArc> {
        let raw = match explicit_args {
            Some(args) => self.instantiate_with_args(name, instantiator, args)?,
            None => self.instantiate(name, definition, instantiator, ctx)?,
        };

        let is_singleton = matches!(definition.definition.scope, BeanScope::Singleton);
        if is_singleton {
            let raw_for_early = raw.clone();
            let pipeline_early: &PostProcessorPipeline = self.pipeline;
            let name_owned = name.to_string();
            ctx.expose_early_reference(
                name,
                Arc::new(move || pipeline_early.run_early_bean_reference(&name_owned, raw_for_early.clone())),
            );
        }

        self.pipeline.run_post_process_properties(name, &raw)?;

        let metadata = match instantiator {
            Instantiator::Constructor { metadata, .. } => Some(metadata.clone()),
            Instantiator::Producer(_) => None,
        };
        if let Some(metadata) = &metadata {
            self.populate_properties(&raw, metadata, ctx)?;
        }

        let initialized = self.initialize(name, raw.clone(), definition, metadata.as_deref(), ctx)?;

        if is_singleton {
            // A sibling under construction may already have captured the
            // early (pre-initialization) reference to `raw` via
            // `expose_early_reference` above. If initialization (a
            // `SmartInstantiationAwarePostProcessor` wrapping it, most
            // commonly) produced a different object than what that sibling
            // is holding, the sibling's dependency is now stale.
            if ctx.observed_early_reference(name).is_some() && !Arc::ptr_eq(&raw, &initialized) {
                if ctx.allow_raw_injection_despite_wrapping() {
                    tracing::warn!(
                        bean = name,
                        "a circular dependent already observed the raw, pre-initialization instance of this bean, \
                         which differs from the fully initialized instance; continuing because raw injection \
                         despite wrapping is allowed"
                    );
                } else {
                    return Err(DiError::Cycle {
                        path: vec![name.to_string()],
                    });
                }
            }

            let bag = self.build_disposal_bag(name, definition, metadata.as_deref(), &initialized, ctx)?;
            if !bag.is_empty() {
                ctx.register_disposal(name, bag);
            }
        }

        Ok(initialized)
    }

    fn instantiate(
        &self,
        name: &str,
        definition: &MergedBeanDefinition,
        instantiator: &Instantiator,
        ctx: &dyn CreationContext,
    ) -> DiResult<AnyArc> {
        match instantiator {
            Instantiator::Producer(producer) => producer(),
            Instantiator::Constructor { metadata, lenient } => {
                if let Some((index, args)) = definition.cached_constructor() {
                    let candidate = &metadata.constructors[index];
                    let resolved = self.resolve_args(name, &args, ctx)?;
                    return (candidate.factory)(resolved);
                }

                let declared = &definition.definition.constructor_args;
                let min_args = declared.len();
                let scored = constructor::resolve(
                    &metadata.constructors,
                    *lenient,
                    min_args,
                    self.conversions,
                    |_cand, idx, spec| {
                        if let Some(decl) = declared.iter().find(|a| a.index == Some(idx)) {
                            return Ok(Some(decl.value.clone()));
                        }
                        if let Some(decl) = declared
                            .iter()
                            .find(|a| a.declared_type.map(|t| t.id) == Some(spec.type_key.id))
                        {
                            return Ok(Some(decl.value.clone()));
                        }
                        match ctx.resolve_by_type(spec.type_key.id, None, spec.name) {
                            Ok(instance) => Ok(Some(Arg::Value(instance))),
                            Err(_) if !spec.required => Ok(None),
                            Err(e) => Err(e),
                        }
                    },
                )
                .map_err(|e| match e {
                    DiError::Definition { message, .. } => DiError::Definition {
                        bean: name.to_string(),
                        message,
                    },
                    other => other,
                })?;

                definition.cache_constructor(scored.candidate_index, scored.args.clone());
                let resolved = self.resolve_args(name, &scored.args, ctx)?;
                let candidate = &metadata.constructors[scored.candidate_index];
                (candidate.factory)(resolved)
            }
        }
    }

    /// Instantiates directly from caller-supplied arguments, bypassing
    /// declared constructor args and autowiring: the candidate whose
    /// arity matches `args` exactly wins, with no weighing.
    fn instantiate_with_args(
        &self,
        name: &str,
        instantiator: &Instantiator,
        args: Vec<AnyArc>,
    ) -> DiResult<AnyArc> {
        match instantiator {
            Instantiator::Producer(producer) => producer(),
            Instantiator::Constructor { metadata, .. } => {
                let candidate = metadata
                    .constructors
                    .iter()
                    .find(|c| c.params.len() == args.len())
                    .ok_or_else(|| DiError::Definition {
                        bean: name.to_string(),
                        message: format!("no constructor candidate accepts {} explicit argument(s)", args.len()),
                    })?;
                (candidate.factory)(args)
            }
        }
    }

    fn resolve_args(&self, bean: &str, args: &[Arg], ctx: &dyn CreationContext) -> DiResult<Vec<AnyArc>> {
        args.iter()
            .enumerate()
            .map(|(i, arg)| match arg {
                Arg::Value(v) => Ok(v.clone()),
                Arg::Ref(name) => ctx
                    .resolve_by_name(name.as_str())
                    .map_err(|e| DiError::unsatisfied(bean, format!("arg[{i}]"), e)),
                Arg::Autowired => Err(DiError::unsatisfied(
                    bean,
                    format!("arg[{i}]"),
                    DiError::Definition {
                        bean: bean.to_string(),
                        message: "autowired argument was not resolved before instantiation".into(),
                    },
                )),
            })
            .collect()
    }

    fn populate_properties(
        &self,
        instance: &AnyArc,
        metadata: &InjectionMetadata,
        ctx: &dyn CreationContext,
    ) -> DiResult<()> {
        if metadata.fields.is_empty() {
            return Ok(());
        }
        // A clone of `instance` may already be held by another bean under
        // construction, via the early-reference factory registered just
        // above in `do_create_bean` — that is the whole point of early
        // exposure. `inject_fields` only ever takes a shared reference, so
        // this stays sound no matter how many clones of `instance` are
        // already in circulation; fields it assigns into are required to
        // use interior mutability for the same reason.
        let any_ref: &dyn Any = &**instance;
        (metadata.inject_fields)(any_ref, ctx)
    }

    /// Initialization order: awareness callbacks (not modeled — no
    /// reflection-driven awareness interfaces in this container),
    /// before-init post-processors, the declared init (annotated init
    /// callbacks from `Injectable::injection_metadata()`, then a distinct
    /// explicit init-method name), after-init post-processors.
    fn initialize(
        &self,
        name: &str,
        instance: AnyArc,
        definition: &MergedBeanDefinition,
        metadata: Option<&InjectionMetadata>,
        ctx: &dyn CreationContext,
    ) -> DiResult<AnyArc> {
        let instance = self.pipeline.run_before_initialization(name, instance)?;

        if let Some(metadata) = metadata {
            for callback in &metadata.lifecycle.init_callbacks {
                (callback.invoke)(&instance).map_err(|e| {
                    DiError::PostProcessing {
                        phase: "declared-init",
                        bean: name.to_string(),
                        message: format!("init callback '{}' failed: {e}", callback.method_name),
                    }
                })?;
            }

            let already_ran = definition
                .definition
                .init_method_name
                .as_deref()
                .map(|explicit| metadata.lifecycle.init_callbacks.iter().any(|c| c.method_name == explicit))
                .unwrap_or(false);
            if definition.definition.init_method_name.is_some() && !already_ran {
                ctx.run_explicit_init(&instance)?;
            }
        } else if definition.definition.init_method_name.is_some() {
            ctx.run_explicit_init(&instance)?;
        }

        self.pipeline.run_after_initialization(name, instance)
    }

    /// Builds the destroy-callback bag for a singleton bean: the
    /// `DestroyMethod::Inferred` case defers entirely to the type's
    /// annotated destroy callbacks; `Named` additionally runs the
    /// explicit destroy method; `None` registers nothing even if the
    /// type declares annotated destroy callbacks.
    fn build_disposal_bag(
        &self,
        name: &str,
        definition: &MergedBeanDefinition,
        metadata: Option<&InjectionMetadata>,
        instance: &AnyArc,
        ctx: &dyn CreationContext,
    ) -> DiResult<DisposeBag> {
        let mut bag = DisposeBag::default();

        if matches!(definition.definition.destroy_method, DestroyMethod::None) {
            return Ok(bag);
        }

        // `DisposeBag` runs hooks in reverse push order, so the declared
        // destroy work is pushed first (runs last) and the
        // destruction-aware post-processor pass is pushed last (runs
        // first): the post-processor pass must happen before the declared
        // destroy callback.
        if let Some(metadata) = metadata {
            for callback in metadata.lifecycle.destroy_callbacks.clone() {
                let instance = instance.clone();
                let name_owned = name.to_string();
                bag.push(Box::new(move || {
                    if let Err(e) = (callback.invoke)(&instance) {
                        // Destruction errors are logged and swallowed so
                        // other beans still get torn down.
                        tracing::warn!(
                            bean = %name_owned,
                            callback = callback.method_name,
                            error = %e,
                            "destroy callback failed"
                        );
                    }
                }));
            }
        }

        if let DestroyMethod::Named(explicit) = &definition.definition.destroy_method {
            // If a callback already discovered via the type's lifecycle
            // metadata names this same method, it is the same externally
            // managed member and must not run twice.
            let already_covered = metadata
                .map(|m| m.lifecycle.destroy_callbacks.iter().any(|c| c.method_name == explicit))
                .unwrap_or(false);
            if !already_covered {
                if let Some(destroy_fn) = ctx.explicit_destroy() {
                    let instance = instance.clone();
                    let name_owned = name.to_string();
                    bag.push(Box::new(move || {
                        if let Err(e) = destroy_fn(&instance) {
                            tracing::warn!(bean = %name_owned, error = %e, "explicit destroy method failed");
                        }
                    }));
                }
            }
        }

        if let Some(hook) = ctx.destruction_pipeline_hook() {
            let instance = instance.clone();
            let name_owned = name.to_string();
            bag.push(Box::new(move || {
                if let Err(e) = hook(&instance) {
                    tracing::warn!(bean = %name_owned, error = %e, "destruction-aware post-processor failed");
                }
            }));
        }

        Ok(bag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::BeanDefinition;
    use crate::metadata::LifecycleMetadata;

    struct NullContext;
    impl FieldResolver for NullContext {
        fn resolve_field(&self, _element: &crate::metadata::InjectedElement) -> DiResult<AnyArc> {
            Err(DiError::NotFound("unused".into()))
        }
    }
    impl CreationContext for NullContext {
        fn resolve_by_name(&self, name: &str) -> DiResult<AnyArc> {
            Err(DiError::NotFound(name.to_string()))
        }
        fn expose_early_reference(&self, _name: &str, _factory: Arc<dyn Fn() -> DiResult<AnyArc> + Send + Sync>) {}
        fn register_dependent(&self, _dependency: &str, _dependent: &str) {}
    }

    #[test]
    fn producer_instantiator_short_circuits_constructor_resolution() {
        let pipeline = PostProcessorPipeline::new();
        let conversions = ConversionRegistry::new();
        let engine = CreationEngine::new(&pipeline, &conversions);
        let definition = MergedBeanDefinition::new(BeanDefinition::new("answer"));
        let instantiator = Instantiator::Producer(Arc::new(|| Ok(Arc::new(42u32) as AnyArc)));
        let ctx = NullContext;

        let result = engine
            .create_bean("answer", &definition, &instantiator, &ctx)
            .unwrap();
        assert_eq!(*result.downcast::<u32>().unwrap(), 42);
    }

    #[test]
    fn metadata_with_no_fields_skips_population() {
        let metadata = InjectionMetadata {
            fields: Vec::new(),
            constructors: Vec::new(),
            lifecycle: LifecycleMetadata::default(),
            inject_fields: Arc::new(|_, _| panic!("should not be called")),
        };
        let pipeline = PostProcessorPipeline::new();
        let conversions = ConversionRegistry::new();
        let engine = CreationEngine::new(&pipeline, &conversions);
        let ctx = NullContext;
        let instance: AnyArc = Arc::new(1u32);
        engine.populate_properties(&instance, &metadata, &ctx).unwrap();
    }

    #[test]
    fn declared_init_callback_runs_exactly_once() {
        use crate::metadata::LifecycleCallback;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_cb = calls.clone();
        let metadata = Arc::new(InjectionMetadata {
            fields: Vec::new(),
            constructors: vec![crate::arg::ConstructorCandidate {
                params: Vec::new(),
                is_public: true,
                factory: Arc::new(|_| Ok(Arc::new(0u32) as AnyArc)),
            }],
            lifecycle: LifecycleMetadata {
                init_callbacks: vec![LifecycleCallback {
                    method_name: "bump",
                    invoke: Arc::new(move |_| {
                        calls_cb.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }),
                }],
                destroy_callbacks: Vec::new(),
            },
            inject_fields: Arc::new(|_, _| Ok(())),
        });

        let pipeline = PostProcessorPipeline::new();
        let conversions = ConversionRegistry::new();
        let engine = CreationEngine::new(&pipeline, &conversions);
        let definition = MergedBeanDefinition::new(BeanDefinition::new("counter"));
        let instantiator = Instantiator::Constructor { metadata, lenient: true };
        let ctx = NullContext;

        engine.create_bean("counter", &definition, &instantiator, &ctx).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn destroy_method_none_registers_no_disposal() {
        let mut def = BeanDefinition::new("x");
        def.destroy_method = DestroyMethod::None;
        let definition = MergedBeanDefinition::new(def);
        let pipeline = PostProcessorPipeline::new();
        let conversions = ConversionRegistry::new();
        let engine = CreationEngine::new(&pipeline, &conversions);
        let ctx = NullContext;
        let instance: AnyArc = Arc::new(1u32);
        let bag = engine
            .build_disposal_bag("x", &definition, None, &instance, &ctx)
            .unwrap();
        assert!(bag.is_empty());
    }

    #[test]
    fn named_destroy_is_skipped_when_already_covered_by_lifecycle_callback() {
        use crate::metadata::LifecycleCallback;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let mut def = BeanDefinition::new("x");
        def.destroy_method = DestroyMethod::Named("shutdown".into());
        let definition = MergedBeanDefinition::new(def);

        let lifecycle_calls = Arc::new(AtomicUsize::new(0));
        let lifecycle_calls_cb = lifecycle_calls.clone();
        let metadata = InjectionMetadata {
            fields: Vec::new(),
            constructors: Vec::new(),
            lifecycle: LifecycleMetadata {
                init_callbacks: Vec::new(),
                destroy_callbacks: vec![LifecycleCallback {
                    method_name: "shutdown",
                    invoke: Arc::new(move |_| {
                        lifecycle_calls_cb.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }),
                }],
            },
            inject_fields: Arc::new(|_, _| Ok(())),
        };

        struct ExplicitDestroyContext(Arc<AtomicUsize>);
        impl FieldResolver for ExplicitDestroyContext {
            fn resolve_field(&self, _element: &crate::metadata::InjectedElement) -> DiResult<AnyArc> {
                Err(DiError::NotFound("unused".into()))
            }
        }
        impl CreationContext for ExplicitDestroyContext {
            fn resolve_by_name(&self, name: &str) -> DiResult<AnyArc> {
                Err(DiError::NotFound(name.to_string()))
            }
            fn expose_early_reference(&self, _name: &str, _factory: Arc<dyn Fn() -> DiResult<AnyArc> + Send + Sync>) {}
            fn register_dependent(&self, _dependency: &str, _dependent: &str) {}
            fn explicit_destroy(&self) -> Option<Arc<dyn Fn(&AnyArc) -> DiResult<()> + Send + Sync>> {
                let calls = self.0.clone();
                Some(Arc::new(move |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }))
            }
        }

        let explicit_calls = Arc::new(AtomicUsize::new(0));
        let ctx = ExplicitDestroyContext(explicit_calls.clone());
        let pipeline = PostProcessorPipeline::new();
        let conversions = ConversionRegistry::new();
        let engine = CreationEngine::new(&pipeline, &conversions);
        let instance: AnyArc = Arc::new(1u32);

        let mut bag = engine
            .build_disposal_bag("x", &definition, Some(&metadata), &instance, &ctx)
            .unwrap();
        bag.run_all_reverse();

        assert_eq!(lifecycle_calls.load(Ordering::SeqCst), 1);
        assert_eq!(explicit_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn named_destroy_runs_when_distinct_from_lifecycle_callbacks() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let mut def = BeanDefinition::new("x");
        def.destroy_method = DestroyMethod::Named("shutdown".into());
        let definition = MergedBeanDefinition::new(def);

        let metadata = InjectionMetadata {
            fields: Vec::new(),
            constructors: Vec::new(),
            lifecycle: LifecycleMetadata::default(),
            inject_fields: Arc::new(|_, _| Ok(())),
        };

        struct ExplicitDestroyContext(Arc<AtomicUsize>);
        impl FieldResolver for ExplicitDestroyContext {
            fn resolve_field(&self, _element: &crate::metadata::InjectedElement) -> DiResult<AnyArc> {
                Err(DiError::NotFound("unused".into()))
            }
        }
        impl CreationContext for ExplicitDestroyContext {
            fn resolve_by_name(&self, name: &str) -> DiResult<AnyArc> {
                Err(DiError::NotFound(name.to_string()))
            }
            fn expose_early_reference(&self, _name: &str, _factory: Arc<dyn Fn() -> DiResult<AnyArc> + Send + Sync>) {}
            fn register_dependent(&self, _dependency: &str, _dependent: &str) {}
            fn explicit_destroy(&self) -> Option<Arc<dyn Fn(&AnyArc) -> DiResult<()> + Send + Sync>> {
                let calls = self.0.clone();
                Some(Arc::new(move |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }))
            }
        }

        let explicit_calls = Arc::new(AtomicUsize::new(0));
        let ctx = ExplicitDestroyContext(explicit_calls.clone());
        let pipeline = PostProcessorPipeline::new();
        let conversions = ConversionRegistry::new();
        let engine = CreationEngine::new(&pipeline, &conversions);
        let instance: AnyArc = Arc::new(1u32);

        let mut bag = engine
            .build_disposal_bag("x", &definition, Some(&metadata), &instance, &ctx)
            .unwrap();
        bag.run_all_reverse();

        assert_eq!(explicit_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn wrapping_after_early_exposure_fails_by_default() {
        struct WrappingContext;
        impl FieldResolver for WrappingContext {
            fn resolve_field(&self, _element: &crate::metadata::InjectedElement) -> DiResult<AnyArc> {
                Err(DiError::NotFound("unused".into()))
            }
        }
        impl CreationContext for WrappingContext {
            fn resolve_by_name(&self, name: &str) -> DiResult<AnyArc> {
                Err(DiError::NotFound(name.to_string()))
            }
            fn expose_early_reference(&self, _name: &str, _factory: Arc<dyn Fn() -> DiResult<AnyArc> + Send + Sync>) {}
            fn register_dependent(&self, _dependency: &str, _dependent: &str) {}
            fn observed_early_reference(&self, _name: &str) -> Option<AnyArc> {
                Some(Arc::new(0u32) as AnyArc)
            }
        }

        struct Wrap;
        impl AfterInitializationPostProcessor for Wrap {
            fn after_initialization(&self, _name: &str, _instance: AnyArc) -> DiResult<AnyArc> {
                Ok(Arc::new(99u32) as AnyArc)
            }
        }

        use crate::postprocessor::AfterInitializationPostProcessor;
        let mut pipeline = PostProcessorPipeline::new();
        pipeline.add_after_init(Arc::new(Wrap));
        let conversions = ConversionRegistry::new();
        let engine = CreationEngine::new(&pipeline, &conversions);
        let definition = MergedBeanDefinition::new(BeanDefinition::new("wrapped"));
        let instantiator = Instantiator::Producer(Arc::new(|| Ok(Arc::new(1u32) as AnyArc)));
        let ctx = WrappingContext;

        let err = engine
            .create_bean("wrapped", &definition, &instantiator, &ctx)
            .unwrap_err();
        assert!(matches!(err, DiError::Cycle { .. }));
    }

    #[test]
    fn create_bean_with_args_picks_the_matching_arity_candidate() {
        let metadata = Arc::new(InjectionMetadata {
            fields: Vec::new(),
            constructors: vec![
                crate::arg::ConstructorCandidate {
                    params: Vec::new(),
                    is_public: true,
                    factory: Arc::new(|_| Ok(Arc::new(0u32) as AnyArc)),
                },
                crate::arg::ConstructorCandidate {
                    params: vec![crate::arg::ParamSpec {
                        name: Some("seed"),
                        type_key: crate::arg::TypeKeyOwned::of::<u32>(),
                        required: true,
                    }],
                    is_public: true,
                    factory: Arc::new(|args| Ok(args[0].clone())),
                },
            ],
            lifecycle: LifecycleMetadata::default(),
            inject_fields: Arc::new(|_, _| Ok(())),
        });
        let pipeline = PostProcessorPipeline::new();
        let conversions = ConversionRegistry::new();
        let engine = CreationEngine::new(&pipeline, &conversions);
        let definition = MergedBeanDefinition::new(BeanDefinition::new("svc"));
        let instantiator = Instantiator::Constructor { metadata, lenient: true };
        let ctx = NullContext;

        let result = engine
            .create_bean_with_args("svc", &definition, &instantiator, &ctx, vec![Arc::new(5u32)])
            .unwrap();
        assert_eq!(*result.downcast::<u32>().unwrap(), 5);
    }
}
