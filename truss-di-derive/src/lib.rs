//! `#[derive(Injectable)]` — the compile-time stand-in for an annotation
//! scan. Rust has no reflection, so instead of scanning a class's
//! declared fields and constructors at startup, this macro walks the
//! struct definition once at compile time and emits the same
//! `InjectionMetadata` shape a scanner would have produced.
//!
//! # Attributes
//!
//! - `#[autowired]` — a required constructor-injected dependency. The
//!   field type must be `Arc<T>`. Becomes a constructor parameter resolved
//!   either from a declared `BeanDefinition` constructor argument or, when
//!   none was declared, by autowiring against the container's type index.
//! - `#[autowired(optional)]` — an optional, post-construction field
//!   injection point. The field type must be `Mutex<Option<Arc<T>>>`; left
//!   `None` when nothing of type `T` is registered. `Mutex`-wrapped so the
//!   field can be populated through the shared reference every bean
//!   (including one observed early through a circular reference) is
//!   populated through.
//! - `#[autowired(optional, qualifier = "beanName")]` — the same, but
//!   resolved by bean name instead of by type.
//! - `#[autowired(vec)]` — a collection injection point gathering every
//!   registered bean of type `T`. The field type must be
//!   `Mutex<Vec<Arc<T>>>`.
//! - `#[autowired(map)]` — the same, keyed by the bean name each value was
//!   registered under. The field type must be `Mutex<HashMap<String, Arc<T>>>`.
//! - Fields with no `#[autowired]` attribute use `Default::default()`.
//!
//! A struct-level `#[injectable(init = "method", destroy = "method")]`
//! names the declared init/destroy callbacks; either side may be omitted.
//! Both methods must take `&self` and return `()`.
//!
//! ```rust,ignore
//! #[derive(Injectable)]
//! #[injectable(init = "warm_up")]
//! struct OrderService {
//!     #[autowired]
//!     repository: Arc<OrderRepository>,
//!     #[autowired(optional)]
//!     notifier: Mutex<Option<Arc<dyn Notifier>>>,
//!     #[autowired(vec)]
//!     validators: Mutex<Vec<Arc<dyn Validator>>>,
//!     request_count: u64,
//! }
//! ```

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Fields, Type};

#[proc_macro_derive(Injectable, attributes(autowired, injectable))]
pub fn derive_injectable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return syn::Error::new_spanned(&input, "Injectable can only be derived for structs with named fields")
                    .to_compile_error()
                    .into();
            }
        },
        _ => {
            return syn::Error::new_spanned(&input, "Injectable can only be derived for structs")
                .to_compile_error()
                .into();
        }
    };

    let lifecycle = match find_injectable_attr(&input.attrs) {
        Ok(l) => l,
        Err(e) => return e.to_compile_error().into(),
    };

    let mut param_specs = Vec::new();
    let mut param_names = Vec::new();
    let mut param_types = Vec::new();
    let mut injected_fields: Vec<InjectedFieldSpec> = Vec::new();
    let mut plain_field_inits = Vec::new();

    for field in fields.iter() {
        let field_name = field.ident.as_ref().unwrap();
        let field_type = &field.ty;

        let autowired = match find_autowired_attr(&field.attrs) {
            Ok(a) => a,
            Err(e) => return e.to_compile_error().into(),
        };

        match autowired {
            Some(Autowired::Required) => {
                let inner = match extract_arc_inner_type(field_type) {
                    Some(t) => t,
                    None => {
                        return syn::Error::new_spanned(field_type, "#[autowired] fields must have type Arc<T>")
                            .to_compile_error()
                            .into();
                    }
                };
                let field_name_str = field_name.to_string();
                param_specs.push(quote! {
                    ::truss_di::ParamSpec {
                        name: Some(#field_name_str),
                        type_key: ::truss_di::TypeKeyOwned::of::<#inner>(),
                        required: true,
                    }
                });
                param_names.push(field_name.clone());
                param_types.push(inner.clone());
            }
            Some(Autowired::Optional { qualifier }) => {
                let inner = match extract_mutex_option_arc_inner_type(field_type) {
                    Some(t) => t.clone(),
                    None => {
                        return syn::Error::new_spanned(
                            field_type,
                            "#[autowired(optional)] fields must have type Mutex<Option<Arc<T>>>",
                        )
                        .to_compile_error()
                        .into();
                    }
                };
                plain_field_inits.push(quote! {
                    #field_name: ::std::sync::Mutex::new(::std::option::Option::None)
                });
                injected_fields.push(InjectedFieldSpec::Optional {
                    field_name: field_name.clone(),
                    inner,
                    name_str: field_name.to_string(),
                    qualifier,
                });
            }
            Some(Autowired::VecCollection { qualifier }) => {
                let inner = match extract_mutex_vec_arc_inner_type(field_type) {
                    Some(t) => t.clone(),
                    None => {
                        return syn::Error::new_spanned(
                            field_type,
                            "#[autowired(vec)] fields must have type Mutex<Vec<Arc<T>>>",
                        )
                        .to_compile_error()
                        .into();
                    }
                };
                plain_field_inits.push(quote! {
                    #field_name: ::std::sync::Mutex::new(::std::vec::Vec::new())
                });
                injected_fields.push(InjectedFieldSpec::Vec {
                    field_name: field_name.clone(),
                    inner,
                    name_str: field_name.to_string(),
                    qualifier,
                });
            }
            Some(Autowired::MapCollection { qualifier }) => {
                let inner = match extract_mutex_map_arc_inner_type(field_type) {
                    Some(t) => t.clone(),
                    None => {
                        return syn::Error::new_spanned(
                            field_type,
                            "#[autowired(map)] fields must have type Mutex<HashMap<String, Arc<T>>>",
                        )
                        .to_compile_error()
                        .into();
                    }
                };
                plain_field_inits.push(quote! {
                    #field_name: ::std::sync::Mutex::new(::std::collections::HashMap::new())
                });
                injected_fields.push(InjectedFieldSpec::Map {
                    field_name: field_name.clone(),
                    inner,
                    name_str: field_name.to_string(),
                    qualifier,
                });
            }
            None => {
                plain_field_inits.push(quote! { #field_name: ::std::default::Default::default() });
            }
        }
    }

    let element_defs: Vec<_> = injected_fields.iter().map(InjectedFieldSpec::element_def).collect();
    let inject_field_arms: Vec<_> = injected_fields
        .iter()
        .enumerate()
        .map(|(i, spec)| spec.inject_arm(i))
        .collect();

    let construct_factory = if param_names.is_empty() {
        quote! {
            ::std::sync::Arc::new(|_args: ::std::vec::Vec<::truss_di::AnyArc>| {
                ::std::result::Result::Ok(::std::sync::Arc::new(#name {
                    #(#plain_field_inits,)*
                }) as ::truss_di::AnyArc)
            })
        }
    } else {
        let indices: Vec<usize> = (0..param_names.len()).collect();
        quote! {
            ::std::sync::Arc::new(|mut args: ::std::vec::Vec<::truss_di::AnyArc>| {
                #(
                    let #param_names = ::std::mem::replace(&mut args[#indices], ::std::sync::Arc::new(()))
                        .downcast::<#param_types>()
                        .map_err(|_| ::truss_di::DiError::WrongType {
                            expected: ::std::any::type_name::<#param_types>(),
                            bean: ::std::any::type_name::<#name>().to_string(),
                        })?;
                )*
                ::std::result::Result::Ok(::std::sync::Arc::new(#name {
                    #(#param_names,)*
                    #(#plain_field_inits,)*
                }) as ::truss_di::AnyArc)
            })
        }
    };

    let init_callback = match &lifecycle.init {
        Some(method) => {
            let method_ident = syn::Ident::new(method, proc_macro2::Span::call_site());
            quote! {
                init_callbacks.push(::truss_di::LifecycleCallback {
                    method_name: #method,
                    invoke: ::std::sync::Arc::new(|instance: &::truss_di::AnyArc| {
                        let typed = instance.downcast_ref::<#name>().ok_or_else(|| ::truss_di::DiError::WrongType {
                            expected: ::std::any::type_name::<#name>(),
                            bean: ::std::any::type_name::<#name>().to_string(),
                        })?;
                        typed.#method_ident();
                        ::std::result::Result::Ok(())
                    }),
                });
            }
        }
        None => quote! {},
    };

    let destroy_callback = match &lifecycle.destroy {
        Some(method) => {
            let method_ident = syn::Ident::new(method, proc_macro2::Span::call_site());
            quote! {
                destroy_callbacks.push(::truss_di::LifecycleCallback {
                    method_name: #method,
                    invoke: ::std::sync::Arc::new(|instance: &::truss_di::AnyArc| {
                        let typed = instance.downcast_ref::<#name>().ok_or_else(|| ::truss_di::DiError::WrongType {
                            expected: ::std::any::type_name::<#name>(),
                            bean: ::std::any::type_name::<#name>().to_string(),
                        })?;
                        typed.#method_ident();
                        ::std::result::Result::Ok(())
                    }),
                });
            }
        }
        None => quote! {},
    };

    let is_public = true;
    let expanded = quote! {
        impl ::truss_di::Injectable for #name {
            fn injection_metadata() -> ::truss_di::InjectionMetadata {
                let elements: ::std::vec::Vec<::truss_di::InjectedElement> = ::std::vec![ #(#element_defs),* ];

                let mut init_callbacks: ::std::vec::Vec<::truss_di::LifecycleCallback> = ::std::vec::Vec::new();
                #init_callback
                let mut destroy_callbacks: ::std::vec::Vec<::truss_di::LifecycleCallback> = ::std::vec::Vec::new();
                #destroy_callback

                let elements_for_inject = elements.clone();
                ::truss_di::InjectionMetadata {
                    fields: elements,
                    constructors: ::std::vec![::truss_di::ConstructorCandidate {
                        params: ::std::vec![ #(#param_specs),* ],
                        is_public: #is_public,
                        factory: #construct_factory,
                    }],
                    lifecycle: ::truss_di::LifecycleMetadata { init_callbacks, destroy_callbacks },
                    inject_fields: ::std::sync::Arc::new(move |any: &dyn ::std::any::Any, resolver: &dyn ::truss_di::FieldResolver| {
                        let elements = &elements_for_inject;
                        let instance = any.downcast_ref::<#name>().ok_or_else(|| ::truss_di::DiError::WrongType {
                            expected: ::std::any::type_name::<#name>(),
                            bean: ::std::any::type_name::<#name>().to_string(),
                        })?;
                        #(#inject_field_arms)*
                        ::std::result::Result::Ok(())
                    }),
                }
            }
        }
    };

    TokenStream::from(expanded)
}

enum Autowired {
    Required,
    Optional { qualifier: Option<String> },
    VecCollection { qualifier: Option<String> },
    MapCollection { qualifier: Option<String> },
}

/// One post-construction field injection point, carrying enough to emit
/// both its `InjectedElement` descriptor and its `inject_fields` arm.
enum InjectedFieldSpec {
    Optional {
        field_name: syn::Ident,
        inner: Type,
        name_str: String,
        qualifier: Option<String>,
    },
    Vec {
        field_name: syn::Ident,
        inner: Type,
        name_str: String,
        qualifier: Option<String>,
    },
    Map {
        field_name: syn::Ident,
        inner: Type,
        name_str: String,
        qualifier: Option<String>,
    },
}

impl InjectedFieldSpec {
    fn qualifier_tok(qualifier: &Option<String>) -> proc_macro2::TokenStream {
        match qualifier {
            Some(q) => quote! { ::std::option::Option::Some(#q) },
            None => quote! { ::std::option::Option::None },
        }
    }

    fn element_def(&self) -> proc_macro2::TokenStream {
        match self {
            InjectedFieldSpec::Optional { inner, name_str, qualifier, .. } => {
                let qualifier_tok = Self::qualifier_tok(qualifier);
                quote! {
                    ::truss_di::InjectedElement {
                        member_name: #name_str,
                        declared_type: ::truss_di::TypeKeyOwned::of::<#inner>(),
                        required: false,
                        qualifier: #qualifier_tok,
                        container_kind: ::truss_di::ContainerKind::Single,
                    }
                }
            }
            InjectedFieldSpec::Vec { inner, name_str, qualifier, .. } => {
                let qualifier_tok = Self::qualifier_tok(qualifier);
                quote! {
                    ::truss_di::InjectedElement {
                        member_name: #name_str,
                        declared_type: ::truss_di::TypeKeyOwned::of::<#inner>(),
                        required: false,
                        qualifier: #qualifier_tok,
                        container_kind: ::truss_di::ContainerKind::Vec,
                    }
                }
            }
            InjectedFieldSpec::Map { inner, name_str, qualifier, .. } => {
                let qualifier_tok = Self::qualifier_tok(qualifier);
                quote! {
                    ::truss_di::InjectedElement {
                        member_name: #name_str,
                        declared_type: ::truss_di::TypeKeyOwned::of::<#inner>(),
                        required: false,
                        qualifier: #qualifier_tok,
                        container_kind: ::truss_di::ContainerKind::Map,
                    }
                }
            }
        }
    }

    fn inject_arm(&self, index: usize) -> proc_macro2::TokenStream {
        match self {
            InjectedFieldSpec::Optional { field_name, inner, .. } => quote! {
                if let ::std::result::Result::Ok(value) = resolver.resolve_field(&elements[#index]) {
                    if let ::std::result::Result::Ok(downcast) = value.downcast::<#inner>() {
                        *instance.#field_name.lock().unwrap_or_else(|e| e.into_inner()) = ::std::option::Option::Some(downcast);
                    }
                }
            },
            InjectedFieldSpec::Vec { field_name, inner, .. } => quote! {
                if let ::std::result::Result::Ok(values) = resolver.resolve_collection(&elements[#index]) {
                    let mut collected: ::std::vec::Vec<::std::sync::Arc<#inner>> = ::std::vec::Vec::new();
                    for (_, value) in values {
                        if let ::std::result::Result::Ok(downcast) = value.downcast::<#inner>() {
                            collected.push(downcast);
                        }
                    }
                    *instance.#field_name.lock().unwrap_or_else(|e| e.into_inner()) = collected;
                }
            },
            InjectedFieldSpec::Map { field_name, inner, .. } => quote! {
                if let ::std::result::Result::Ok(values) = resolver.resolve_collection(&elements[#index]) {
                    let mut collected: ::std::collections::HashMap<::std::string::String, ::std::sync::Arc<#inner>> =
                        ::std::collections::HashMap::new();
                    for (name, value) in values {
                        if let ::std::result::Result::Ok(downcast) = value.downcast::<#inner>() {
                            collected.insert(name, downcast);
                        }
                    }
                    *instance.#field_name.lock().unwrap_or_else(|e| e.into_inner()) = collected;
                }
            },
        }
    }
}

/// Parses `#[autowired]` / `#[autowired(optional[, qualifier = "name"])]` /
/// `#[autowired(vec)]` / `#[autowired(map)]` off one field.
fn find_autowired_attr(attrs: &[Attribute]) -> syn::Result<Option<Autowired>> {
    for attr in attrs {
        if attr.path().is_ident("autowired") {
            if attr.meta.require_path_only().is_ok() {
                return Ok(Some(Autowired::Required));
            }

            let mut optional = false;
            let mut vec_flag = false;
            let mut map_flag = false;
            let mut qualifier = None;
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("optional") {
                    optional = true;
                    return Ok(());
                }
                if meta.path.is_ident("vec") {
                    vec_flag = true;
                    return Ok(());
                }
                if meta.path.is_ident("map") {
                    map_flag = true;
                    return Ok(());
                }
                if meta.path.is_ident("qualifier") {
                    let value = meta.value()?;
                    let lit: syn::LitStr = value.parse()?;
                    qualifier = Some(lit.value());
                    return Ok(());
                }
                Err(meta.error("unrecognized #[autowired(...)] argument"))
            })?;

            if vec_flag && map_flag {
                return Err(syn::Error::new_spanned(
                    attr,
                    "#[autowired] cannot combine `vec` and `map` on the same field",
                ));
            }

            return Ok(Some(if vec_flag {
                Autowired::VecCollection { qualifier }
            } else if map_flag {
                Autowired::MapCollection { qualifier }
            } else if optional {
                Autowired::Optional { qualifier }
            } else {
                Autowired::Required
            }));
        }
    }
    Ok(None)
}

#[derive(Default)]
struct Lifecycle {
    init: Option<String>,
    destroy: Option<String>,
}

/// Parses the struct-level `#[injectable(init = "...", destroy = "...")]`.
fn find_injectable_attr(attrs: &[Attribute]) -> syn::Result<Lifecycle> {
    let mut lifecycle = Lifecycle::default();
    for attr in attrs {
        if attr.path().is_ident("injectable") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("init") {
                    let value = meta.value()?;
                    let lit: syn::LitStr = value.parse()?;
                    lifecycle.init = Some(lit.value());
                    return Ok(());
                }
                if meta.path.is_ident("destroy") {
                    let value = meta.value()?;
                    let lit: syn::LitStr = value.parse()?;
                    lifecycle.destroy = Some(lit.value());
                    return Ok(());
                }
                Err(meta.error("unrecognized #[injectable(...)] argument"))
            })?;
        }
    }
    Ok(lifecycle)
}

/// Extracts `T` from `Wrapper<T>` for the named single-generic-argument wrapper.
fn extract_generic<'t>(ty: &'t Type, wrapper: &str) -> Option<&'t Type> {
    if let Type::Path(type_path) = ty {
        let segment = type_path.path.segments.last()?;
        if segment.ident == wrapper {
            if let syn::PathArguments::AngleBracketed(args) = &segment.arguments {
                if let Some(syn::GenericArgument::Type(inner)) = args.args.first() {
                    return Some(inner);
                }
            }
        }
    }
    None
}

/// Extracts `T` from `Arc<T>`.
fn extract_arc_inner_type(ty: &Type) -> Option<&Type> {
    extract_generic(ty, "Arc")
}

/// Extracts `T` from `Mutex<Option<Arc<T>>>`.
fn extract_mutex_option_arc_inner_type(ty: &Type) -> Option<&Type> {
    let mutex_inner = extract_generic(ty, "Mutex")?;
    let option_inner = extract_generic(mutex_inner, "Option")?;
    extract_arc_inner_type(option_inner)
}

/// Extracts `T` from `Mutex<Vec<Arc<T>>>`.
fn extract_mutex_vec_arc_inner_type(ty: &Type) -> Option<&Type> {
    let mutex_inner = extract_generic(ty, "Mutex")?;
    let vec_inner = extract_generic(mutex_inner, "Vec")?;
    extract_arc_inner_type(vec_inner)
}

/// Extracts `T` from `Mutex<HashMap<String, Arc<T>>>` (the value type's
/// `Arc<T>` inner; the key type is always `String`, unchecked here beyond
/// `HashMap` needing two generic arguments).
fn extract_mutex_map_arc_inner_type(ty: &Type) -> Option<&Type> {
    let mutex_inner = extract_generic(ty, "Mutex")?;
    if let Type::Path(type_path) = mutex_inner {
        let segment = type_path.path.segments.last()?;
        if segment.ident == "HashMap" {
            if let syn::PathArguments::AngleBracketed(args) = &segment.arguments {
                let mut type_args = args.args.iter().filter_map(|a| match a {
                    syn::GenericArgument::Type(t) => Some(t),
                    _ => None,
                });
                let _key = type_args.next()?;
                let value = type_args.next()?;
                return extract_arc_inner_type(value);
            }
        }
    }
    None
}
