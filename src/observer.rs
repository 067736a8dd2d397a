//! Diagnostic observers for dependency injection traceability.
//!
//! This module provides hooks for observing bean-resolution events, enabling
//! structured tracing, performance monitoring, and debugging of a running
//! container.

use std::sync::Arc;
use std::time::Duration;

use crate::key::BeanName;

/// Observer trait for dependency injection resolution events.
///
/// This trait enables structured tracing and monitoring of the container's
/// behavior: which beans are being resolved, how long resolution takes, and
/// whether a factory failed.
///
/// # Performance
///
/// Observer calls are made synchronously during resolution. Keep
/// implementations lightweight; a slow observer slows down every bean
/// creation.
///
/// # Examples
///
/// ```
/// use truss_di::{DiObserver, BeanName, LoggingObserver, ContainerBuilder};
/// use std::sync::Arc;
///
/// let mut builder = ContainerBuilder::new();
/// builder.add_observer(Arc::new(LoggingObserver::new()));
/// let container = builder.build();
/// ```
pub trait DiObserver: Send + Sync {
    /// Called when starting to create a bean.
    ///
    /// This is called before the constructor or factory is invoked. Use this
    /// to start timing measurements and emit trace events.
    fn resolving(&self, name: &BeanName);

    /// Called when a bean is successfully created.
    ///
    /// # Arguments
    ///
    /// * `name` - The bean that was created
    /// * `duration` - Time elapsed from `resolving` to `resolved`
    fn resolved(&self, name: &BeanName, duration: Duration);

    /// Called when a constructor or factory panics during creation.
    ///
    /// The panic is still propagated after this call; this hook exists only
    /// so the failure can be recorded before unwinding continues.
    fn factory_panic(&self, name: &BeanName, message: &str);
}

/// Container for registered observers.
///
/// Holds all registered observers and notifies them of resolution events.
/// Designed to have minimal overhead when no observers are registered.
#[derive(Default)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn DiObserver>>,
}

impl Observers {
    /// Creates a new empty observer collection.
    pub(crate) fn new() -> Self {
        Self {
            observers: Vec::new(),
        }
    }

    /// Adds an observer to the collection.
    pub(crate) fn add(&mut self, observer: Arc<dyn DiObserver>) {
        self.observers.push(observer);
    }

    /// Returns true if any observers are registered.
    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    #[inline]
    pub(crate) fn resolving(&self, name: &BeanName) {
        for observer in &self.observers {
            observer.resolving(name);
        }
    }

    #[inline]
    pub(crate) fn resolved(&self, name: &BeanName, duration: Duration) {
        for observer in &self.observers {
            observer.resolved(name, duration);
        }
    }

    #[inline]
    #[allow(dead_code)]
    pub(crate) fn factory_panic(&self, name: &BeanName, message: &str) {
        for observer in &self.observers {
            observer.factory_panic(name, message);
        }
    }
}

/// Built-in observer that logs events to stdout.
///
/// Useful for development and debugging. For production use prefer
/// [`TracingObserver`], which integrates with a structured logging
/// subscriber instead of printing directly.
///
/// # Examples
///
/// ```
/// use truss_di::{ContainerBuilder, LoggingObserver};
/// use std::sync::Arc;
///
/// let mut builder = ContainerBuilder::new();
/// builder.add_observer(Arc::new(LoggingObserver::new()));
/// ```
pub struct LoggingObserver {
    prefix: String,
}

impl LoggingObserver {
    /// Creates a new logging observer with the default prefix.
    pub fn new() -> Self {
        Self {
            prefix: "[truss-di]".to_string(),
        }
    }

    /// Creates a new logging observer with a custom prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for LoggingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl DiObserver for LoggingObserver {
    fn resolving(&self, name: &BeanName) {
        println!("{} resolving: {}", self.prefix, name);
    }

    fn resolved(&self, name: &BeanName, duration: Duration) {
        println!("{} resolved: {} in {:?}", self.prefix, name, duration);
    }

    fn factory_panic(&self, name: &BeanName, message: &str) {
        eprintln!("{} factory panic in {}: {}", self.prefix, name, message);
    }
}

/// Built-in observer that emits [`tracing`] events instead of printing
/// directly, for containers embedded in an application that already uses a
/// `tracing` subscriber.
///
/// # Examples
///
/// ```
/// use truss_di::{ContainerBuilder, TracingObserver};
/// use std::sync::Arc;
///
/// let mut builder = ContainerBuilder::new();
/// builder.add_observer(Arc::new(TracingObserver::new()));
/// ```
pub struct TracingObserver {
    target: &'static str,
}

impl TracingObserver {
    /// Creates a new tracing observer that emits events under the
    /// `truss_di::container` target.
    pub fn new() -> Self {
        Self {
            target: "truss_di::container",
        }
    }

    /// Creates a tracing observer that emits events under a custom target.
    pub fn with_target(target: &'static str) -> Self {
        Self { target }
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl DiObserver for TracingObserver {
    fn resolving(&self, name: &BeanName) {
        tracing::trace!(target: self.target, bean = %name, "resolving bean");
    }

    fn resolved(&self, name: &BeanName, duration: Duration) {
        tracing::debug!(target: self.target, bean = %name, ?duration, "resolved bean");
    }

    fn factory_panic(&self, name: &BeanName, message: &str) {
        tracing::error!(target: self.target, bean = %name, message, "factory panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observers_notify_all_registered() {
        let mut observers = Observers::new();
        assert!(!observers.has_observers());

        observers.add(Arc::new(LoggingObserver::new()));
        observers.add(Arc::new(TracingObserver::new()));
        assert!(observers.has_observers());

        let name = BeanName::from("demoBean");
        observers.resolving(&name);
        observers.resolved(&name, Duration::from_millis(1));
        observers.factory_panic(&name, "boom");
    }

    #[test]
    fn logging_observer_custom_prefix() {
        let observer = LoggingObserver::with_prefix("[custom]");
        let name = BeanName::from("demoBean");
        observer.resolving(&name);
        observer.resolved(&name, Duration::from_millis(1));
    }

    #[test]
    fn tracing_observer_custom_target() {
        let observer = TracingObserver::with_target("my_app::di");
        let name = BeanName::from("demoBean");
        observer.resolving(&name);
        observer.resolved(&name, Duration::from_micros(5));
        observer.factory_panic(&name, "test panic");
    }
}
