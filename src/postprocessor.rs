//! Capability-typed post-processor pipeline: small independent traits
//! over one mega-interface.
//!
//! Each extension point is its own trait so an implementor only needs to
//! provide the phases it actually participates in; the pipeline holds one
//! `Vec<Arc<dyn _>>` per capability and walks the relevant one at each
//! fixed phase of `creation.rs`'s algorithm.

use std::sync::Arc;

use crate::arg::AnyArc;
use crate::definition::MergedBeanDefinition;
use crate::error::DiResult;

/// Where a post-processor falls in the three-tier precedence every
/// capability's registration list is sorted by: a priority-ordered
/// processor always runs before an ordered one, which always runs before
/// an unordered one; within a tier, lower numeric order runs first; ties
/// (including every `Unordered` processor, against each other) keep
/// registration order, since sorting is stable.
///
/// Relies on the derived `Ord` comparing variants in declaration order
/// before comparing their field, so `Priority(_) < Ordered(_) < Unordered`
/// falls out of the enum's shape with no hand-written `Ord` impl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OrderTier {
    /// Highest precedence, analogous to a `PriorityOrdered` processor.
    Priority(i32),
    /// Ordered, but after every `Priority` processor regardless of value.
    Ordered(i32),
    /// No declared order; runs after every ordered processor.
    Unordered,
}

/// Rewrites a merged definition before any instantiation strategy runs
/// (adding constructor candidates, changing the destroy method, etc).
pub trait MergedDefinitionPostProcessor: Send + Sync {
    fn post_process_merged_definition(&self, name: &str, definition: &MergedBeanDefinition) -> DiResult<()>;

    fn order_tier(&self) -> OrderTier {
        OrderTier::Unordered
    }
}

/// May short-circuit instantiation entirely by returning an instance of
/// its own construction, and is always given a chance to rewrite
/// property values before population.
pub trait InstantiationAwarePostProcessor: Send + Sync {
    fn before_instantiation(&self, name: &str, definition: &MergedBeanDefinition) -> DiResult<Option<AnyArc>> {
        let _ = (name, definition);
        Ok(None)
    }

    fn post_process_properties(&self, name: &str, instance: &AnyArc) -> DiResult<()> {
        let _ = (name, instance);
        Ok(())
    }

    fn order_tier(&self) -> OrderTier {
        OrderTier::Unordered
    }
}

/// Allows wrapping the raw instance before it is exposed as an early
/// reference to break a circular dependency.
pub trait SmartInstantiationAwarePostProcessor: Send + Sync {
    fn get_early_bean_reference(&self, name: &str, instance: AnyArc) -> DiResult<AnyArc>;

    fn order_tier(&self) -> OrderTier {
        OrderTier::Unordered
    }
}

/// Runs before `init_method`/`@PostConstruct`-equivalent callbacks.
pub trait BeforeInitializationPostProcessor: Send + Sync {
    fn before_initialization(&self, name: &str, instance: AnyArc) -> DiResult<AnyArc>;

    fn order_tier(&self) -> OrderTier {
        OrderTier::Unordered
    }
}

/// Runs after init callbacks; the conventional place proxying wrapping
/// happens, which is why the name comparison in `creation.rs` checks
/// pointer identity against the pre-wrap instance.
pub trait AfterInitializationPostProcessor: Send + Sync {
    fn after_initialization(&self, name: &str, instance: AnyArc) -> DiResult<AnyArc>;

    fn order_tier(&self) -> OrderTier {
        OrderTier::Unordered
    }
}

/// Runs once per singleton at container shutdown, before its declared
/// destroy callback.
pub trait DestructionAwarePostProcessor: Send + Sync {
    fn requires_destruction(&self, instance: &AnyArc) -> bool;
    fn post_process_before_destruction(&self, name: &str, instance: &AnyArc) -> DiResult<()>;

    fn order_tier(&self) -> OrderTier {
        OrderTier::Unordered
    }
}

/// The ordered collection of every registered post-processor, split by
/// capability. Order within each `Vec` is registration order.
#[derive(Default)]
pub struct PostProcessorPipeline {
    merged_definition: Vec<Arc<dyn MergedDefinitionPostProcessor>>,
    instantiation_aware: Vec<Arc<dyn InstantiationAwarePostProcessor>>,
    smart_instantiation_aware: Vec<Arc<dyn SmartInstantiationAwarePostProcessor>>,
    before_init: Vec<Arc<dyn BeforeInitializationPostProcessor>>,
    after_init: Vec<Arc<dyn AfterInitializationPostProcessor>>,
    destruction_aware: Vec<Arc<dyn DestructionAwarePostProcessor>>,
}

impl PostProcessorPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `p` and keeps this capability's list sorted by
    /// `order_tier()` (priority-ordered, then ordered, then unordered, with
    /// registration order as the tie-break within a tier — `sort_by_key` is
    /// stable).
    pub fn add_merged_definition(&mut self, p: Arc<dyn MergedDefinitionPostProcessor>) {
        self.merged_definition.push(p);
        self.merged_definition.sort_by_key(|p| p.order_tier());
    }
    pub fn add_instantiation_aware(&mut self, p: Arc<dyn InstantiationAwarePostProcessor>) {
        self.instantiation_aware.push(p);
        self.instantiation_aware.sort_by_key(|p| p.order_tier());
    }
    pub fn add_smart_instantiation_aware(&mut self, p: Arc<dyn SmartInstantiationAwarePostProcessor>) {
        self.smart_instantiation_aware.push(p);
        self.smart_instantiation_aware.sort_by_key(|p| p.order_tier());
    }
    pub fn add_before_init(&mut self, p: Arc<dyn BeforeInitializationPostProcessor>) {
        self.before_init.push(p);
        self.before_init.sort_by_key(|p| p.order_tier());
    }
    pub fn add_after_init(&mut self, p: Arc<dyn AfterInitializationPostProcessor>) {
        self.after_init.push(p);
        self.after_init.sort_by_key(|p| p.order_tier());
    }
    pub fn add_destruction_aware(&mut self, p: Arc<dyn DestructionAwarePostProcessor>) {
        self.destruction_aware.push(p);
        self.destruction_aware.sort_by_key(|p| p.order_tier());
    }

    pub fn run_merged_definition(&self, name: &str, definition: &MergedBeanDefinition) -> DiResult<()> {
        for p in &self.merged_definition {
            p.post_process_merged_definition(name, definition)?;
        }
        Ok(())
    }

    pub fn run_before_instantiation(&self, name: &str, definition: &MergedBeanDefinition) -> DiResult<Option<AnyArc>> {
        for p in &self.instantiation_aware {
            if let Some(instance) = p.before_instantiation(name, definition)? {
                return Ok(Some(instance));
            }
        }
        Ok(None)
    }

    pub fn run_post_process_properties(&self, name: &str, instance: &AnyArc) -> DiResult<()> {
        for p in &self.instantiation_aware {
            p.post_process_properties(name, instance)?;
        }
        Ok(())
    }

    pub fn run_early_bean_reference(&self, name: &str, mut instance: AnyArc) -> DiResult<AnyArc> {
        for p in &self.smart_instantiation_aware {
            instance = p.get_early_bean_reference(name, instance)?;
        }
        Ok(instance)
    }

    pub fn run_before_initialization(&self, name: &str, mut instance: AnyArc) -> DiResult<AnyArc> {
        for p in &self.before_init {
            instance = p.before_initialization(name, instance)?;
        }
        Ok(instance)
    }

    pub fn run_after_initialization(&self, name: &str, mut instance: AnyArc) -> DiResult<AnyArc> {
        for p in &self.after_init {
            instance = p.after_initialization(name, instance)?;
        }
        Ok(instance)
    }

    pub fn run_before_destruction(&self, name: &str, instance: &AnyArc) -> DiResult<()> {
        for p in &self.destruction_aware {
            if p.requires_destruction(instance) {
                p.post_process_before_destruction(name, instance)?;
            }
        }
        Ok(())
    }
}
