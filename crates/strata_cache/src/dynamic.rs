//! The per-build-layer set of types left uncompiled.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strata_common::TypeName;

use crate::error::{CacheError, SnapshotError};
use crate::layout::BuildLayout;
use crate::snapshot::{read_snapshot, write_snapshot, DYNAMIC_MAGIC};

/// How a dynamic type participates in the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeRole {
    /// An ordinary dynamic type.
    Plain,
    /// A type taking part in cross-process object synchronization.
    Synchronized,
}

/// Types a build layer loads from source instead of compiled artifacts.
///
/// Queries only look at this layer's own set. Callers that want the view
/// inherited from earlier build layers walk the build-layer chain themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DynamicTypeRegistry {
    types: BTreeMap<TypeName, TypeRole>,
}

impl DynamicTypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the dynamic-type snapshot of a build layer.
    pub fn load(layout: &BuildLayout) -> Result<Self, SnapshotError> {
        let types = read_snapshot(&layout.dynamic_path(), DYNAMIC_MAGIC)?;
        Ok(Self { types })
    }

    /// Writes the dynamic-type snapshot of a build layer.
    pub fn persist(&self, layout: &BuildLayout) -> Result<(), CacheError> {
        write_snapshot(&layout.dynamic_path(), DYNAMIC_MAGIC, &self.types)
    }

    /// Marks a type dynamic, keeping an existing synchronized role.
    pub fn mark(&mut self, type_name: TypeName) {
        self.types.entry(type_name).or_insert(TypeRole::Plain);
    }

    /// Marks a type dynamic with the synchronized role.
    pub fn mark_synchronized(&mut self, type_name: TypeName) {
        self.types.insert(type_name, TypeRole::Synchronized);
    }

    /// Returns `true` if this layer's set contains the type.
    pub fn is_dynamic(&self, type_name: &TypeName) -> bool {
        self.types.contains_key(type_name)
    }

    /// The role of a dynamic type.
    pub fn role(&self, type_name: &TypeName) -> Option<TypeRole> {
        self.types.get(type_name).copied()
    }

    /// Number of dynamic types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns `true` if no type is dynamic.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Iterates over dynamic types in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&TypeName, TypeRole)> {
        self.types.iter().map(|(t, r)| (t, *r))
    }

    /// Replaces this set with a copy of a preceding build layer's set.
    pub fn inherit_from(&mut self, previous: &DynamicTypeRegistry) {
        self.types = previous.types.clone();
    }

    /// Removes every type for which `keep` returns `false`, returning the
    /// removed entries in name order.
    pub fn prune(&mut self, mut keep: impl FnMut(&TypeName) -> bool) -> Vec<(TypeName, TypeRole)> {
        let mut removed = Vec::new();
        self.types.retain(|name, role| {
            if keep(name) {
                true
            } else {
                removed.push((name.clone(), *role));
                false
            }
        });
        removed
    }

    /// Empties the set.
    pub fn clear(&mut self) {
        self.types.clear();
    }
}
