//! Circular dependency detection infrastructure.
//!
//! A thread-local resolution stack combined with `panic_any`/`catch_unwind`
//! detects re-entrant creation without threading a result type through every
//! call site. `CycleClass` lets the singleton registry tell a resolvable
//! early-reference cycle (allowed, maybe with a warning) from a fatal one
//! (prototype or constructor-injection cycle, always an error).

use std::cell::RefCell;
use std::panic;

const MAX_DEPTH: usize = 1024;

thread_local! {
    static RESOLUTION_TLS: RefCell<ResolutionTls> = RefCell::new(ResolutionTls::default());
}

#[derive(Default)]
struct ResolutionTls {
    stack: Vec<String>,
    frozen: bool,
    depth: usize,
}

/// Whether the caller can break a detected cycle using an early
/// reference, or whether the cycle is necessarily fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CycleClass {
    /// The in-progress bean is a singleton eligible for early-reference
    /// exposure; a cycle through it may still resolve.
    Resolvable,
    /// Constructor injection, a prototype, or a non-singleton scope: no
    /// early reference exists, so a cycle here can never resolve.
    Fatal,
}

#[derive(Debug)]
pub(crate) struct CircularPanic {
    pub path: Vec<String>,
    pub class: CycleClass,
}

/// Guard for managing the thread-local resolution stack. Pushes `name`
/// on construction (panicking with `CircularPanic` if it is already on
/// the stack) and pops it on drop.
pub(crate) struct StackGuard {
    name: String,
}

impl StackGuard {
    pub(crate) fn new(name: &str, class: CycleClass) -> Self {
        RESOLUTION_TLS.with(|tls| {
            let mut tls = tls.borrow_mut();

            if tls.stack.iter().any(|n| n == name) {
                let mut path = tls.stack.clone();
                path.push(name.to_string());
                tls.frozen = true;
                panic::panic_any(CircularPanic { path, class });
            }

            if tls.depth >= MAX_DEPTH {
                tls.frozen = true;
                panic::panic_any(crate::error::DiError::Cycle {
                    path: tls.stack.clone(),
                });
            }

            tls.stack.push(name.to_string());
            tls.depth += 1;
        });

        Self { name: name.to_string() }
    }
}

impl Drop for StackGuard {
    fn drop(&mut self) {
        RESOLUTION_TLS.with(|tls| {
            let mut tls = tls.borrow_mut();
            if !tls.frozen {
                if let Some(last) = tls.stack.pop() {
                    debug_assert_eq!(last, self.name);
                }
                tls.depth = tls.depth.saturating_sub(1);
            } else if tls.stack.first().map(|n| n == &self.name).unwrap_or(false) {
                // This guard is the outermost frame of the call that froze
                // the stack (a cycle was detected somewhere beneath it and
                // converted into a `DiError` by `with_circular_catch`). The
                // thread's resolution state must not stay frozen past that
                // point, or the next unrelated top-level call on this same
                // (possibly pooled) thread would see stale entries and
                // report a false cycle.
                tls.stack.clear();
                tls.depth = 0;
                tls.frozen = false;
            }
        });
    }
}

/// Executes `f` with `name` pushed onto the resolution stack, converting
/// a detected cycle into a `DiError::Cycle` instead of letting the panic
/// propagate. Callers that can tolerate a `Resolvable` cycle (the
/// singleton registry's early-reference path) inspect `CircularPanic`
/// before converting; everyone else just wants the `DiResult`.
pub(crate) fn with_circular_catch<T, F>(name: &str, class: CycleClass, f: F) -> crate::error::DiResult<T>
where
    F: FnOnce() -> crate::error::DiResult<T>,
{
    use std::panic::AssertUnwindSafe;

    let _guard = StackGuard::new(name, class);

    match std::panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            if let Some(circular_panic) = payload.downcast_ref::<CircularPanic>() {
                Err(crate::error::DiError::Cycle {
                    path: circular_panic.path.clone(),
                })
            } else if let Some(di_err) = payload.downcast_ref::<crate::error::DiError>() {
                Err(crate::error::DiError::Cycle {
                    path: match di_err {
                        crate::error::DiError::Cycle { path } => path.clone(),
                        _ => Vec::new(),
                    },
                })
            } else {
                std::panic::resume_unwind(payload);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiError;
    use serial_test::serial;

    // These share `RESOLUTION_TLS`, which lives on whichever OS thread the
    // test harness happens to schedule this test function onto; the harness
    // reuses pooled threads across tests, so two of these running at once
    // (or with a stale panic-frozen stack left by a neighbor) would corrupt
    // each other's view of the resolution stack. `#[serial]` keeps them
    // mutually exclusive.
    #[test]
    #[serial]
    fn detects_direct_cycle() {
        let result: crate::error::DiResult<()> = with_circular_catch("a", CycleClass::Fatal, || {
            with_circular_catch("a", CycleClass::Fatal, || Ok(()))
        });
        assert!(matches!(result, Err(DiError::Cycle { .. })));
    }

    #[test]
    #[serial]
    fn no_cycle_when_names_differ() {
        let result = with_circular_catch("a", CycleClass::Fatal, || {
            with_circular_catch("b", CycleClass::Fatal, || Ok(42))
        });
        assert_eq!(result.unwrap(), 42);
    }
}
