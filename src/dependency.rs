//! Dependency resolution by type, including the container-typed cases
//! (`Vec<T>`, `HashSet<T>`, `HashMap<String, T>`) that a reflective
//! container infers from the declared parameter type but a Rust container
//! must be told about explicitly.

use crate::arg::TypeKeyOwned;

/// What shape of container a dependency descriptor wants resolved.
///
/// Rust cannot distinguish "give me the one bean of type T" from "give
/// me every bean of type T, collected into a Vec" purely from `T`'s
/// static type the way reflection-based matching can infer it from
/// `Vec<T>` vs `T`; the descriptor carries this discriminant explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// Resolve exactly one bean of the element type.
    Single,
    /// Resolve every bean of the element type, in registration order.
    Vec,
    /// Resolve every bean of the element type, deduplicated by name.
    Set,
    /// Resolve every bean of the element type, keyed by bean name.
    Map,
}

/// A single dependency to resolve: the element type, the container shape
/// wrapping it, and whether a missing match is an error.
#[derive(Debug, Clone)]
pub struct DependencyDescriptor {
    pub element_type: TypeKeyOwned,
    pub container_kind: ContainerKind,
    pub required: bool,
    /// Qualifier hint (explicit bean name) to disambiguate among several
    /// candidates of the same type, analogous to `@Qualifier`.
    pub qualifier: Option<String>,
}

impl DependencyDescriptor {
    pub fn single<T: 'static>(required: bool) -> Self {
        DependencyDescriptor {
            element_type: TypeKeyOwned::of::<T>(),
            container_kind: ContainerKind::Single,
            required,
            qualifier: None,
        }
    }

    pub fn qualified<T: 'static>(required: bool, qualifier: impl Into<String>) -> Self {
        DependencyDescriptor {
            element_type: TypeKeyOwned::of::<T>(),
            container_kind: ContainerKind::Single,
            required,
            qualifier: Some(qualifier.into()),
        }
    }

    pub fn collection<T: 'static>(kind: ContainerKind) -> Self {
        DependencyDescriptor {
            element_type: TypeKeyOwned::of::<T>(),
            container_kind: kind,
            required: false,
            qualifier: None,
        }
    }
}

/// Picks the winning candidate name among several of the same type.
///
/// Three tiers, in order: a single `primary`-flagged candidate wins
/// outright; failing that, the candidate with the strictly highest
/// `priority` (via `priority_of`) wins if unique; failing that, a
/// candidate whose name matches `name_hint` (the injection point's own
/// name, analogous to matching a constructor parameter or field name)
/// wins. Exhausting all three tiers is ambiguous.
pub fn pick_primary<'a>(
    candidates: &[(&'a str, bool)],
    priority_of: impl Fn(&str) -> Option<i32>,
    name_hint: Option<&str>,
) -> Result<&'a str, Vec<&'a str>> {
    let all_names = || candidates.iter().map(|(name, _)| *name).collect();

    let primaries: Vec<&str> = candidates
        .iter()
        .filter(|(_, primary)| *primary)
        .map(|(name, _)| *name)
        .collect();
    if let [one] = primaries.as_slice() {
        return Ok(one);
    }
    if primaries.len() > 1 {
        return Err(all_names());
    }

    let mut prioritized: Vec<(&str, i32)> = candidates
        .iter()
        .filter_map(|(name, _)| priority_of(name).map(|p| (*name, p)))
        .collect();
    if !prioritized.is_empty() {
        prioritized.sort_by_key(|(_, p)| std::cmp::Reverse(*p));
        let highest = prioritized[0].1;
        let at_highest: Vec<&str> = prioritized.iter().filter(|(_, p)| *p == highest).map(|(n, _)| *n).collect();
        if at_highest.len() == 1 {
            return Ok(at_highest[0]);
        }
    }

    if let Some(hint) = name_hint {
        if let Some((name, _)) = candidates.iter().find(|(name, _)| *name == hint) {
            return Ok(name);
        }
    }

    Err(all_names())
}
