//! Error types for the dependency injection container.

use thiserror::Error;

/// Dependency injection errors.
///
/// Covers every failure condition the container can surface: malformed
/// definitions, lookup misses and ambiguities, creation-time failures
/// (wrapped recursively so a deep failure keeps its whole causal chain),
/// dependency cycles, and post-processor rejections.
#[derive(Error, Debug)]
pub enum DiError {
    /// A bean definition is malformed: abstract with no concrete producer,
    /// references a missing parent, or names a bad method override.
    #[error("bad definition for bean '{bean}': {message}")]
    Definition { bean: String, message: String },

    /// No bean is registered under the requested name.
    #[error("no bean named '{0}'")]
    NotFound(String),

    /// More than one candidate satisfies a by-type lookup and none is
    /// marked primary (or more than one is).
    #[error("no unique bean of type {type_name}: candidates {candidates:?}")]
    NotUnique {
        type_name: &'static str,
        candidates: Vec<String>,
    },

    /// A bean exists but does not match the statically requested type.
    #[error("bean '{bean}' is not of the requested type {expected}")]
    WrongType { expected: &'static str, bean: String },

    /// Creation of a bean failed; `source` carries the underlying cause.
    #[error("failed to create bean '{bean}': {source}")]
    Creation {
        bean: String,
        #[source]
        source: Box<DiError>,
    },

    /// A circular dependency was detected that could not be broken by
    /// early-reference exposure (e.g. a constructor-injection cycle).
    #[error("circular dependency: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },

    /// A required injection point (constructor parameter, field, setter)
    /// could not be satisfied.
    #[error("unsatisfied dependency for '{injection_point}' of bean '{bean}': {source}")]
    UnsatisfiedDependency {
        bean: String,
        injection_point: String,
        #[source]
        source: Box<DiError>,
    },

    /// A post-processor rejected or failed a bean during the named phase.
    #[error("post-processor failed for bean '{bean}' during {phase}: {message}")]
    PostProcessing {
        phase: &'static str,
        bean: String,
        message: String,
    },

    /// A value could not be converted to the type a constructor parameter
    /// or property declares.
    #[error("cannot convert value for '{target}': {message}")]
    Conversion { target: String, message: String },

    /// A shared lock was poisoned by a panicking holder.
    #[error("internal lock poisoned: {0}")]
    LockPoisoned(&'static str),
}

impl DiError {
    pub(crate) fn creation(bean: impl Into<String>, source: DiError) -> Self {
        DiError::Creation {
            bean: bean.into(),
            source: Box::new(source),
        }
    }

    pub(crate) fn unsatisfied(
        bean: impl Into<String>,
        injection_point: impl Into<String>,
        source: DiError,
    ) -> Self {
        DiError::UnsatisfiedDependency {
            bean: bean.into(),
            injection_point: injection_point.into(),
            source: Box::new(source),
        }
    }
}

/// Result type for DI operations.
pub type DiResult<T> = Result<T, DiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creation_wraps_source() {
        let inner = DiError::NotFound("db".into());
        let wrapped = DiError::creation("repo", inner);
        match wrapped {
            DiError::Creation { bean, source } => {
                assert_eq!(bean, "repo");
                assert!(matches!(*source, DiError::NotFound(_)));
            }
            _ => panic!("expected Creation variant"),
        }
    }

    #[test]
    fn display_renders_cycle_path() {
        let err = DiError::Cycle {
            path: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "circular dependency: a -> b -> a");
    }
}
