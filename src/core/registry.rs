//! # Unit registry - case-insensitive catalogue of known units.
//!
//! The registry maps lowercased names and ids to shared, immutable
//! [`UnitDescriptor`]s. It knows nothing about supervision: adding a unit to the
//! active set copies the descriptor out, and unregistering never touches a unit
//! that is already supervised.
//!
//! ## Architecture
//! ```text
//! raw JSON ──► parse_definition() ──► insert(desc)
//!                                        ├─► drop every key pointing at desc.id
//!                                        ├─► entries["<id lowercased>"]   = Arc(desc)
//!                                        └─► entries["<name lowercased>"] = Arc(desc)
//! ```
//!
//! ## Rules
//! - Keys are compared after trim + lowercase.
//! - Re-registering an id replaces the previous descriptor under every key.
//! - A later unit whose name equals an earlier id (or name) wins that key.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde_json::Value;

use crate::error::SupervisorError;
use crate::units::{UnitDescriptor, parse_definition};

/// Case-insensitive index of unit descriptors.
#[derive(Debug, Default)]
pub struct UnitRegistry {
    entries: HashMap<String, Arc<UnitDescriptor>>,
}

impl UnitRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a raw definition and registers it.
    ///
    /// Returns the registered descriptor, or [`SupervisorError::InvalidDefinition`]
    /// leaving the registry untouched.
    pub fn register(&mut self, raw: &Value) -> Result<Arc<UnitDescriptor>, SupervisorError> {
        let desc = parse_definition(raw)?;
        Ok(self.insert(desc))
    }

    /// Registers an already-built descriptor, replacing any unit with the same id.
    pub fn insert(&mut self, desc: UnitDescriptor) -> Arc<UnitDescriptor> {
        let desc = Arc::new(desc);
        self.entries.retain(|_, d| d.id != desc.id);
        self.entries.insert(fold(&desc.id), Arc::clone(&desc));
        self.entries.insert(fold(&desc.name), Arc::clone(&desc));
        desc
    }

    /// Finds a unit by name or id (case-insensitive).
    pub fn lookup(&self, name_or_id: &str) -> Option<Arc<UnitDescriptor>> {
        self.entries.get(&fold(name_or_id)).cloned()
    }

    /// Sorted, de-duplicated display names of every registered unit.
    pub fn names(&self) -> Vec<String> {
        self.entries
            .values()
            .map(|d| d.name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Removes every index entry of the unit `name_or_id` resolves to.
    ///
    /// Returns the removed descriptor, `None` when nothing matched.
    pub fn unregister(&mut self, name_or_id: &str) -> Option<Arc<UnitDescriptor>> {
        let desc = self.lookup(name_or_id)?;
        self.entries.retain(|_, d| d.id != desc.id);
        Some(desc)
    }

    /// Number of distinct registered units.
    pub fn len(&self) -> usize {
        self.entries
            .values()
            .map(|d| d.id.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn fold(key: &str) -> String {
    key.trim().to_lowercase()
}
