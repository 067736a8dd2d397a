//! # truss-di
//!
//! A name-keyed dependency-injection container: a creation engine, a
//! three-level singleton cache, a capability-typed post-processor pipeline,
//! and a compile-time (`#[derive(Injectable)]`-driven) injection metadata
//! layer standing in for reflective constructor/field discovery.
//!
//! ## Quick start
//!
//! Constructor injection goes through the [`Injectable`] trait (normally
//! generated by `#[derive(Injectable)]` in `truss-di-derive`); this example
//! implements it by hand to show what the derive produces.
//!
//! ```rust
//! use truss_di::{
//!     AnyArc, BeanDefinitionBuilder, ConstructorCandidate, ContainerBuilder,
//!     Injectable, InjectionMetadata, LifecycleMetadata, ParamSpec, TypeKeyOwned,
//! };
//! use std::sync::Arc;
//!
//! struct Database {
//!     connection_string: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! impl Injectable for UserService {
//!     fn injection_metadata() -> InjectionMetadata {
//!         InjectionMetadata {
//!             fields: Vec::new(),
//!             constructors: vec![ConstructorCandidate {
//!                 params: vec![ParamSpec {
//!                     name: Some("db"),
//!                     type_key: TypeKeyOwned::of::<Database>(),
//!                     required: true,
//!                 }],
//!                 is_public: true,
//!                 factory: Arc::new(|mut args: Vec<AnyArc>| {
//!                     let db = args.remove(0).downcast::<Database>().unwrap();
//!                     Ok(Arc::new(UserService { db }) as AnyArc)
//!                 }),
//!             }],
//!             lifecycle: LifecycleMetadata::default(),
//!             inject_fields: Arc::new(|_, _| Ok(())),
//!         }
//!     }
//! }
//!
//! let mut builder = ContainerBuilder::new();
//! builder.register_instance("database", Database {
//!     connection_string: "postgres://localhost".to_string(),
//! });
//! let definition = BeanDefinitionBuilder::new("userService")
//!     .constructor_arg_ref(0, "database")
//!     .build();
//! builder.register::<UserService>(definition);
//!
//! let container = builder.build().unwrap();
//! let user_service = container.get_bean_typed::<UserService>("userService").unwrap();
//! assert_eq!(user_service.db.connection_string, "postgres://localhost");
//! ```
//!
//! ## Bean scopes
//!
//! - **Singleton**: created once and cached for the container's lifetime
//! - **Prototype**: created fresh on every lookup
//! - **Custom**: a named [`custom_scope::Scope`], e.g. a request or session
//!   scope, backed by whatever cache that scope implementation chooses
//!
//! ## Name-keyed resolution, by-name and by-type
//!
//! ```rust
//! use truss_di::ContainerBuilder;
//!
//! let mut builder = ContainerBuilder::new();
//! builder.register_instance("answer", 42u32);
//! let container = builder.build().unwrap();
//!
//! let by_name = container.get_bean_typed::<u32>("answer").unwrap();
//! let by_type = container.get_bean_by_type::<u32>().unwrap();
//! assert_eq!(*by_name, *by_type);
//! ```
//!
//! ## Observing resolution
//!
//! ```rust
//! use truss_di::{ContainerBuilder, LoggingObserver};
//! use std::sync::Arc;
//!
//! let mut builder = ContainerBuilder::new();
//! builder.add_observer(Arc::new(LoggingObserver::new()));
//! builder.register_instance("greeting", "hello".to_string());
//! let container = builder.build().unwrap();
//! let _ = container.get_bean_typed::<String>("greeting").unwrap();
//! ```

pub mod arg;
pub mod builder;
pub mod constructor;
pub mod container;
pub mod convert;
pub mod creation;
pub mod custom_scope;
pub mod definition;
pub mod dependency;
pub mod diagnostics;
pub mod error;
pub mod factory_bean;
pub mod key;
pub mod metadata;
pub mod observer;
pub mod postprocessor;
pub mod singleton_registry;

mod internal;

pub use arg::{AnyArc, Arg, ConstructorArg, ConstructorCandidate, ParamSpec, PropertyValue, TypeKeyOwned};
pub use builder::{BeanDefinitionBuilder, ContainerBuilder};
pub use container::{Container, ContainerOptions};
pub use convert::{ConversionRegistry, TypeConverter, RAW_ARGUMENT_BIAS, UNASSIGNABLE_WEIGHT};
pub use creation::{CreationContext, CreationEngine, Instantiator};
pub use custom_scope::{Scope, ScopeRegistry, SimpleScope};
pub use definition::{AutowireMode, BeanDefinition, BeanScope, DestroyMethod, MergedBeanDefinition};
pub use dependency::{pick_primary, ContainerKind, DependencyDescriptor};
pub use diagnostics::BeanDescriptor;
pub use error::{DiError, DiResult};
pub use factory_bean::FactoryBean;
pub use key::{BeanName, TypeKey};
pub use metadata::{FieldResolver, InjectedElement, Injectable, InjectionMetadata, LifecycleCallback, LifecycleMetadata};
pub use observer::{DiObserver, LoggingObserver, TracingObserver};
pub use postprocessor::{
    AfterInitializationPostProcessor, BeforeInitializationPostProcessor, DestructionAwarePostProcessor,
    InstantiationAwarePostProcessor, MergedDefinitionPostProcessor, OrderTier, PostProcessorPipeline,
    SmartInstantiationAwarePostProcessor,
};
