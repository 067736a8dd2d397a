//! Custom scopes: named lifetimes beyond singleton and prototype, each
//! backed by its own cache with caller-defined lifetime rules, keyed by
//! bean name and split between a root registry and per-scope caches.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::arg::AnyArc;
use crate::error::DiResult;

/// A custom scope implementation: get-or-create semantics over whatever
/// storage the scope wants (e.g. "current HTTP request", "current batch
/// job"), plus an optional destruction callback run when the scope ends.
pub trait Scope: Send + Sync {
    fn get(&self, name: &str, producer: &mut dyn FnMut() -> DiResult<AnyArc>) -> DiResult<AnyArc>;
    fn register_destruction_callback(&self, name: &str, callback: Box<dyn FnOnce() + Send>);
    fn remove(&self, name: &str) -> Option<AnyArc>;
}

/// A straightforward in-memory `Scope`: one `HashMap` cache plus one
/// LIFO destruction-callback list, ended explicitly by the caller (there
/// is no web request/response cycle in this crate to end it implicitly).
#[derive(Default)]
pub struct SimpleScope {
    cache: RwLock<HashMap<String, AnyArc>>,
    callbacks: Mutex<Vec<(String, Box<dyn FnOnce() + Send>)>>,
}

impl SimpleScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ends the scope: runs every registered destruction callback in
    /// reverse order and clears the cache.
    pub fn end(&self) {
        let mut callbacks = std::mem::take(&mut *self.callbacks.lock().unwrap_or_else(|e| e.into_inner()));
        self.cache.write().unwrap_or_else(|e| e.into_inner()).clear();
        while let Some((_, cb)) = callbacks.pop() {
            cb();
        }
    }
}

impl Scope for SimpleScope {
    fn get(&self, name: &str, producer: &mut dyn FnMut() -> DiResult<AnyArc>) -> DiResult<AnyArc> {
        if let Some(existing) = self.cache.read().unwrap_or_else(|e| e.into_inner()).get(name) {
            return Ok(existing.clone());
        }
        let instance = producer()?;
        self.cache
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string(), instance.clone());
        Ok(instance)
    }

    fn register_destruction_callback(&self, name: &str, callback: Box<dyn FnOnce() + Send>) {
        self.callbacks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((name.to_string(), callback));
    }

    fn remove(&self, name: &str) -> Option<AnyArc> {
        self.cache.write().unwrap_or_else(|e| e.into_inner()).remove(name)
    }
}

/// The registry of named custom scopes a `Container` consults when a
/// bean declares `BeanScope::Custom(name)`.
#[derive(Default)]
pub struct ScopeRegistry {
    scopes: RwLock<HashMap<String, Arc<dyn Scope>>>,
}

impl ScopeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: impl Into<String>, scope: Arc<dyn Scope>) {
        self.scopes
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.into(), scope);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Scope>> {
        self.scopes.read().unwrap_or_else(|e| e.into_inner()).get(name).cloned()
    }
}
