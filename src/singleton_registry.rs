//! The singleton registry: the three-level cache that lets a circular
//! reference between two singletons resolve, plus the dependency graph
//! and destruction bookkeeping.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

use crate::arg::AnyArc;
use crate::error::{DiError, DiResult};
use crate::internal::{with_circular_catch, CycleClass, DisposeBag};

type EarlyFactory = Arc<dyn Fn() -> DiResult<AnyArc> + Send + Sync>;

#[derive(Default)]
struct Caches {
    singleton_objects: HashMap<String, AnyArc>,
    early_singleton_objects: HashMap<String, AnyArc>,
    singleton_factories: HashMap<String, EarlyFactory>,
    registered_singletons: Vec<String>,
    singletons_currently_in_creation: HashSet<String>,
    disposable_beans: Vec<(String, DisposeBag)>,
    dependent_bean_map: HashMap<String, HashSet<String>>,
    dependencies_for_bean_map: HashMap<String, HashSet<String>>,
}

/// Owns the four singleton caches behind one `Mutex`, plus a lock-free
/// `RwLock`-backed fast-read path for the common case of a singleton
/// that has already been fully created.
pub struct SingletonRegistry {
    fast_read: RwLock<HashMap<String, AnyArc>>,
    state: Mutex<Caches>,
}

impl Default for SingletonRegistry {
    fn default() -> Self {
        SingletonRegistry {
            fast_read: RwLock::new(HashMap::new()),
            state: Mutex::new(Caches::default()),
        }
    }
}

impl SingletonRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the level-1 cache first (lock-free on the common path),
    /// falling back to the guarded state for early references.
    pub fn get_singleton(&self, name: &str, allow_early: bool) -> Option<AnyArc> {
        if let Some(instance) = self.fast_read.read().unwrap_or_else(|e| e.into_inner()).get(name) {
            return Some(instance.clone());
        }

        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(instance) = state.singleton_objects.get(name) {
            return Some(instance.clone());
        }
        if !allow_early {
            return None;
        }
        if let Some(instance) = state.early_singleton_objects.get(name) {
            return Some(instance.clone());
        }
        // Take the factory out under this same lock acquisition, so only
        // the thread that wins the `remove` ever sees `Some` and runs it;
        // a second thread racing in here sees `None` and falls through to
        // wait on `early_singleton_objects` via its own subsequent call
        // (the factory is gone, but the producing thread is about to
        // publish the result below). The factory itself runs outside the
        // lock since it may re-enter the registry for other beans.
        let Some(factory) = state.singleton_factories.remove(name) else {
            return None;
        };
        drop(state);

        let instance = factory().ok()?;
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .early_singleton_objects
            .insert(name.to_string(), instance.clone());
        Some(instance)
    }

    /// Double-checked get-or-create: returns the cached instance if one
    /// exists, otherwise runs `producer` under circular-dependency
    /// protection and publishes the result to the level-1 cache.
    pub fn get_or_create_singleton(
        &self,
        name: &str,
        producer: impl FnOnce() -> DiResult<AnyArc>,
    ) -> DiResult<AnyArc> {
        if let Some(existing) = self.get_singleton(name, false) {
            return Ok(existing);
        }

        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(existing) = state.singleton_objects.get(name) {
                return Ok(existing.clone());
            }
            if state.singletons_currently_in_creation.contains(name) {
                return Err(DiError::Cycle {
                    path: vec![name.to_string()],
                });
            }
            state.singletons_currently_in_creation.insert(name.to_string());
        }

        let result = with_circular_catch(name, CycleClass::Resolvable, producer);

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.singletons_currently_in_creation.remove(name);
        state.early_singleton_objects.remove(name);
        state.singleton_factories.remove(name);

        match result {
            Ok(instance) => {
                state.singleton_objects.insert(name.to_string(), instance.clone());
                if !state.registered_singletons.contains(&name.to_string()) {
                    state.registered_singletons.push(name.to_string());
                }
                drop(state);
                self.fast_read
                    .write()
                    .unwrap_or_else(|e| e.into_inner())
                    .insert(name.to_string(), instance.clone());
                Ok(instance)
            }
            Err(e) => Err(e),
        }
    }

    /// Publishes a level-3 early-reference producer for `name`, called
    /// after raw instantiation but before property population so a
    /// dependent singleton under construction can observe a (possibly
    /// wrapped, via `SmartInstantiationAwarePostProcessor`) reference.
    pub fn add_singleton_factory(&self, name: &str, factory: EarlyFactory) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !state.singleton_objects.contains_key(name) {
            state.singleton_factories.insert(name.to_string(), factory);
        }
    }

    /// Returns the early reference for `name` if one was ever published and
    /// observed (i.e. exists in the level-2 cache right now), without
    /// forcing the level-3 factory to run. Used after initialization to
    /// check whether a circular dependent could have captured a reference
    /// to the pre-initialization raw instance.
    pub fn early_reference(&self, name: &str) -> Option<AnyArc> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .early_singleton_objects
            .get(name)
            .cloned()
    }

    pub fn is_currently_in_creation(&self, name: &str) -> bool {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .singletons_currently_in_creation
            .contains(name)
    }

    pub fn register_dependent_bean(&self, dependency: &str, dependent: &str) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .dependent_bean_map
            .entry(dependency.to_string())
            .or_default()
            .insert(dependent.to_string());
        state
            .dependencies_for_bean_map
            .entry(dependent.to_string())
            .or_default()
            .insert(dependency.to_string());
    }

    pub fn register_disposable_bean(&self, name: &str, bag: DisposeBag) {
        if bag.is_empty() {
            return;
        }
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .disposable_beans
            .push((name.to_string(), bag));
    }

    /// Destroys every singleton in the reverse of its registration order,
    /// which (since dependents are always created, hence registered,
    /// after their dependencies) also guarantees a bean is destroyed only
    /// after everything depending on it.
    pub fn destroy_singletons(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let mut disposables = std::mem::take(&mut state.disposable_beans);
        state.singleton_objects.clear();
        state.registered_singletons.clear();
        drop(state);
        self.fast_read.write().unwrap_or_else(|e| e.into_inner()).clear();

        while let Some((_, mut bag)) = disposables.pop() {
            bag.run_all_reverse();
        }
    }

    pub fn registered_names(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .registered_singletons
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn get_or_create_caches_after_first_call() {
        let registry = SingletonRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let make = {
            let calls = calls.clone();
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(42u32) as AnyArc)
            }
        };
        let first = registry.get_or_create_singleton("answer", make.clone()).unwrap();
        let second = registry.get_or_create_singleton("answer", make).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn early_reference_resolves_via_factory() {
        let registry = SingletonRegistry::new();
        registry.add_singleton_factory("a", Arc::new(|| Ok(Arc::new(1u32) as AnyArc)));
        let early = registry.get_singleton("a", true);
        assert!(early.is_some());
    }

    #[test]
    fn early_reference_is_none_until_observed() {
        let registry = SingletonRegistry::new();
        registry.add_singleton_factory("a", Arc::new(|| Ok(Arc::new(1u32) as AnyArc)));
        assert!(registry.early_reference("a").is_none());
        registry.get_singleton("a", true);
        assert!(registry.early_reference("a").is_some());
    }

    #[test]
    fn destroy_runs_disposables_in_reverse_registration_order() {
        let registry = SingletonRegistry::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut bag_a = DisposeBag::default();
        let order_a = order.clone();
        bag_a.push(Box::new(move || order_a.lock().unwrap().push("a")));
        registry.register_disposable_bean("a", bag_a);

        let mut bag_b = DisposeBag::default();
        let order_b = order.clone();
        bag_b.push(Box::new(move || order_b.lock().unwrap().push("b")));
        registry.register_disposable_bean("b", bag_b);

        registry.destroy_singletons();
        assert_eq!(*order.lock().unwrap(), vec!["b", "a"]);
    }

    #[test]
    fn dependent_bean_map_tracks_both_directions() {
        let registry = SingletonRegistry::new();
        registry.register_dependent_bean("database", "repository");
        let state = registry.state.lock().unwrap();
        assert!(state.dependent_bean_map["database"].contains("repository"));
        assert!(state.dependencies_for_bean_map["repository"].contains("database"));
    }
}
