//! The factory-bean pattern: a registered bean whose purpose is to
//! produce a *different* object, not to be consumed itself.
//!
//! `&beanName` resolves to the factory bean itself; bare `beanName`
//! resolves to `get_object()`'s result. This is how a container exposes
//! something that needs nontrivial construction logic (a connection pool
//! handle, a proxy, a parsed config document) as a plain bean without
//! forcing callers to know it was built by a factory.

use crate::arg::AnyArc;
use crate::error::DiResult;

/// Implemented by a bean that stands in for another object.
pub trait FactoryBean: Send + Sync {
    /// Produces the object this factory bean is standing in for.
    fn get_object(&self) -> DiResult<AnyArc>;

    /// Whether `get_object()`'s result should be cached per bean name
    /// (the common case — a pool handle, say, should not be rebuilt on
    /// every lookup) or recomputed on every call.
    fn is_singleton(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingFactory(Arc<AtomicUsize>);
    impl FactoryBean for CountingFactory {
        fn get_object(&self) -> DiResult<AnyArc> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(self.0.load(Ordering::SeqCst)) as AnyArc)
        }
    }

    #[test]
    fn default_is_singleton() {
        let factory = CountingFactory(Arc::new(AtomicUsize::new(0)));
        assert!(factory.is_singleton());
    }

    #[test]
    fn get_object_produces_a_distinct_value_each_call_when_not_cached() {
        let counter = Arc::new(AtomicUsize::new(0));
        let factory = CountingFactory(counter.clone());
        let first = factory.get_object().unwrap();
        let second = factory.get_object().unwrap();
        assert_ne!(*first.downcast::<usize>().unwrap(), *second.downcast::<usize>().unwrap());
    }
}
