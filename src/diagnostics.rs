//! Introspection: listing registered beans and dumping the object graph
//! for debugging. No serialized graph export or circular-dependency
//! visualizer — just the plain per-bean descriptor list a caller actually
//! needs to answer "what's registered, and is it alive yet".

use crate::container::Container;
use crate::definition::BeanScope;

/// One registered bean's static configuration plus its current runtime
/// state, for introspection and debugging (not part of the resolution
/// hot path).
#[derive(Debug, Clone)]
pub struct BeanDescriptor {
    pub name: String,
    pub scope: BeanScope,
    pub primary: bool,
    pub lazy_init: bool,
    pub aliases: Vec<String>,
    pub depends_on: Vec<String>,
    /// Whether a singleton instance already exists in the registry. Always
    /// `false` for non-singleton scopes, which never cache an instance.
    pub is_created: bool,
}

impl BeanDescriptor {
    pub fn is_singleton(&self) -> bool {
        matches!(self.scope, BeanScope::Singleton)
    }

    pub fn is_prototype(&self) -> bool {
        matches!(self.scope, BeanScope::Prototype)
    }
}

impl Container {
    /// Every registered bean name, in no particular order.
    pub fn bean_definition_names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// A descriptor per registered bean, for debugging and health checks.
    pub fn bean_descriptors(&self) -> Vec<BeanDescriptor> {
        let created = self.registry_registered_names();
        self.entries
            .iter()
            .map(|(name, entry)| BeanDescriptor {
                name: name.clone(),
                scope: entry.definition.scope.clone(),
                primary: entry.definition.primary,
                lazy_init: entry.definition.lazy_init,
                aliases: self.get_aliases(name),
                depends_on: entry.definition.depends_on.clone(),
                is_created: created.contains(name),
            })
            .collect()
    }

    /// A human-readable dump of every registered bean: name, scope,
    /// aliases, and whether its singleton instance has already been
    /// created. Intended for logs and test failure output, not for
    /// machine parsing.
    pub fn debug_dump(&self) -> String {
        let mut descriptors = self.bean_descriptors();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));

        let mut out = String::new();
        for d in &descriptors {
            out.push_str(&format!(
                "{} [{:?}]{}{}{}\n",
                d.name,
                d.scope,
                if d.primary { " primary" } else { "" },
                if d.is_created { " created" } else { "" },
                if d.aliases.is_empty() {
                    String::new()
                } else {
                    format!(" aliases={:?}", d.aliases)
                },
            ));
        }
        out
    }
}
