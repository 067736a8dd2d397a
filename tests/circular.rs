use std::sync::{Arc, Mutex};

use truss_di::{
    AnyArc, BeanDefinitionBuilder, ConstructorCandidate, ContainerBuilder, ContainerKind, DiError,
    FieldResolver, Injectable, InjectedElement, InjectionMetadata, LifecycleMetadata, ParamSpec,
    TypeKeyOwned,
};

fn is_cycle(err: &DiError) -> bool {
    let mut current = err;
    loop {
        match current {
            DiError::Cycle { .. } => return true,
            DiError::Creation { source, .. } => current = source,
            DiError::UnsatisfiedDependency { source, .. } => current = source,
            _ => return false,
        }
    }
}

// Two singletons, each depending on the other through a constructor
// argument, can never resolve: the dependency must exist in full before
// either constructor runs, so there is no early reference to break the
// cycle.
mod constructor_cycle {
    use super::*;

    struct A {
        #[allow(dead_code)]
        b: Arc<B>,
    }
    struct B {
        #[allow(dead_code)]
        a: Arc<A>,
    }

    impl Injectable for A {
        fn injection_metadata() -> InjectionMetadata {
            InjectionMetadata {
                fields: Vec::new(),
                constructors: vec![ConstructorCandidate {
                    params: vec![ParamSpec {
                        name: Some("b"),
                        type_key: TypeKeyOwned::of::<B>(),
                        required: true,
                    }],
                    is_public: true,
                    factory: Arc::new(|mut args: Vec<AnyArc>| {
                        let b = args.remove(0).downcast::<B>().unwrap();
                        Ok(Arc::new(A { b }) as AnyArc)
                    }),
                }],
                lifecycle: LifecycleMetadata::default(),
                inject_fields: Arc::new(|_, _| Ok(())),
            }
        }
    }

    impl Injectable for B {
        fn injection_metadata() -> InjectionMetadata {
            InjectionMetadata {
                fields: Vec::new(),
                constructors: vec![ConstructorCandidate {
                    params: vec![ParamSpec {
                        name: Some("a"),
                        type_key: TypeKeyOwned::of::<A>(),
                        required: true,
                    }],
                    is_public: true,
                    factory: Arc::new(|mut args: Vec<AnyArc>| {
                        let a = args.remove(0).downcast::<A>().unwrap();
                        Ok(Arc::new(B { a }) as AnyArc)
                    }),
                }],
                lifecycle: LifecycleMetadata::default(),
                inject_fields: Arc::new(|_, _| Ok(())),
            }
        }
    }

    #[test]
    fn two_constructor_singletons_fail_with_cycle_error() {
        let mut builder = ContainerBuilder::new();
        builder.register::<A>(BeanDefinitionBuilder::new("a").constructor_arg_ref(0, "b").build());
        builder.register::<B>(BeanDefinitionBuilder::new("b").constructor_arg_ref(0, "a").build());

        let container = builder.build().unwrap();
        let err = container.get_bean("a").unwrap_err();
        assert!(is_cycle(&err), "expected a cycle error, got {err}");
    }

    #[test]
    fn self_referencing_constructor_fails_with_cycle_error() {
        struct SelfRef {
            #[allow(dead_code)]
            inner: Arc<SelfRef>,
        }
        impl Injectable for SelfRef {
            fn injection_metadata() -> InjectionMetadata {
                InjectionMetadata {
                    fields: Vec::new(),
                    constructors: vec![ConstructorCandidate {
                        params: vec![ParamSpec {
                            name: Some("inner"),
                            type_key: TypeKeyOwned::of::<SelfRef>(),
                            required: true,
                        }],
                        is_public: true,
                        factory: Arc::new(|mut args: Vec<AnyArc>| {
                            let inner = args.remove(0).downcast::<SelfRef>().unwrap();
                            Ok(Arc::new(SelfRef { inner }) as AnyArc)
                        }),
                    }],
                    lifecycle: LifecycleMetadata::default(),
                    inject_fields: Arc::new(|_, _| Ok(())),
                }
            }
        }

        let mut builder = ContainerBuilder::new();
        builder.register::<SelfRef>(
            BeanDefinitionBuilder::new("selfRef").constructor_arg_ref(0, "selfRef").build(),
        );
        let container = builder.build().unwrap();
        let err = container.get_bean("selfRef").unwrap_err();
        assert!(is_cycle(&err), "expected a cycle error, got {err}");
    }
}

// Two singletons wired via setter/field injection resolve their mutual
// cycle: each bean is exposed as an early reference right after raw
// construction, before properties are populated, so the other bean's
// field injection can observe it.
mod setter_cycle {
    use super::*;

    struct A {
        b: Mutex<Option<Arc<B>>>,
    }
    struct B {
        a: Mutex<Option<Arc<A>>>,
    }

    impl Injectable for A {
        fn injection_metadata() -> InjectionMetadata {
            InjectionMetadata {
                fields: vec![InjectedElement {
                    member_name: "b",
                    declared_type: TypeKeyOwned::of::<B>(),
                    required: true,
                    qualifier: Some("b"),
                    container_kind: ContainerKind::Single,
                }],
                constructors: vec![ConstructorCandidate {
                    params: Vec::new(),
                    is_public: true,
                    factory: Arc::new(|_| {
                        Ok(Arc::new(A { b: Mutex::new(None) }) as AnyArc)
                    }),
                }],
                lifecycle: LifecycleMetadata::default(),
                inject_fields: Arc::new(|any, resolver: &dyn FieldResolver| {
                    let a = any.downcast_ref::<A>().expect("downcast A");
                    let element = InjectedElement {
                        member_name: "b",
                        declared_type: TypeKeyOwned::of::<B>(),
                        required: true,
                        qualifier: Some("b"),
                        container_kind: ContainerKind::Single,
                    };
                    let value = resolver.resolve_field(&element)?.downcast::<B>().unwrap();
                    *a.b.lock().unwrap() = Some(value);
                    Ok(())
                }),
            }
        }
    }

    impl Injectable for B {
        fn injection_metadata() -> InjectionMetadata {
            InjectionMetadata {
                fields: vec![InjectedElement {
                    member_name: "a",
                    declared_type: TypeKeyOwned::of::<A>(),
                    required: true,
                    qualifier: Some("a"),
                    container_kind: ContainerKind::Single,
                }],
                constructors: vec![ConstructorCandidate {
                    params: Vec::new(),
                    is_public: true,
                    factory: Arc::new(|_| {
                        Ok(Arc::new(B { a: Mutex::new(None) }) as AnyArc)
                    }),
                }],
                lifecycle: LifecycleMetadata::default(),
                inject_fields: Arc::new(|any, resolver: &dyn FieldResolver| {
                    let b = any.downcast_ref::<B>().expect("downcast B");
                    let element = InjectedElement {
                        member_name: "a",
                        declared_type: TypeKeyOwned::of::<A>(),
                        required: true,
                        qualifier: Some("a"),
                        container_kind: ContainerKind::Single,
                    };
                    let value = resolver.resolve_field(&element)?.downcast::<A>().unwrap();
                    *b.a.lock().unwrap() = Some(value);
                    Ok(())
                }),
            }
        }
    }

    #[test]
    fn two_setter_injected_singletons_resolve_their_cycle() {
        let mut builder = ContainerBuilder::new();
        builder.register::<A>(BeanDefinitionBuilder::new("a").build());
        builder.register::<B>(BeanDefinitionBuilder::new("b").build());

        let container = builder.build().unwrap();
        let a = container.get_bean_typed::<A>("a").unwrap();
        let b = container.get_bean_typed::<B>("b").unwrap();

        let a_b = a.b.lock().unwrap().clone().expect("a.b populated");
        let b_a = b.a.lock().unwrap().clone().expect("b.a populated");

        assert!(Arc::ptr_eq(&a_b, &b));
        assert!(Arc::ptr_eq(&b_a, &a));
    }
}
