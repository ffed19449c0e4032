//! The package/type index of one build layer.

use std::collections::{BTreeMap, BTreeSet};

use strata_common::{LayerId, TypeName};
use strata_layer::SourceEntry;

/// Maps every type visible to a build layer to the source that defines it,
/// and every package to its types.
///
/// Entries are inserted in build-order traversal, so a later layer's
/// definition replaces an earlier one with the same type name. Iteration
/// follows the order in which each type was first discovered.
#[derive(Debug, Clone, Default)]
pub struct PackageIndex {
    types: BTreeMap<TypeName, SourceEntry>,
    discovered: Vec<TypeName>,
    packages: BTreeMap<String, BTreeSet<TypeName>>,
}

impl PackageIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a definition, returning the layer it replaced.
    pub fn insert(&mut self, type_name: TypeName, entry: SourceEntry) -> Option<LayerId> {
        self.packages
            .entry(type_name.package().to_string())
            .or_default()
            .insert(type_name.clone());
        let replaced = self.types.insert(type_name.clone(), entry).map(|old| old.layer);
        if replaced.is_none() {
            self.discovered.push(type_name);
        }
        replaced
    }

    /// The source defining a type.
    pub fn source(&self, type_name: &TypeName) -> Option<&SourceEntry> {
        self.types.get(type_name)
    }

    /// The layer defining a type.
    pub fn owner(&self, type_name: &TypeName) -> Option<LayerId> {
        self.types.get(type_name).map(|e| e.layer)
    }

    /// Returns `true` if the type is defined.
    pub fn contains(&self, type_name: &TypeName) -> bool {
        self.types.contains_key(type_name)
    }

    /// Types of a package, in name order.
    pub fn types_in(&self, package: &str) -> impl Iterator<Item = &TypeName> {
        self.packages.get(package).into_iter().flatten()
    }

    /// Package names, in order.
    pub fn packages(&self) -> impl Iterator<Item = &str> {
        self.packages.keys().map(String::as_str)
    }

    /// Effective sources in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = (&TypeName, &SourceEntry)> {
        self.discovered
            .iter()
            .filter_map(|t| self.types.get_key_value(t))
    }

    /// Number of types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns `true` if no type is defined.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
