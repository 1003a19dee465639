//! Output registry keyed by reference prefix.
//!
//! The registry maps a key (for editor-built registries this is
//! `"__" + step_id + output.key`) to the descriptor of the output it names.
//! Authoring order is preserved with `IndexMap`; the reference resolver
//! relies on it to break ties between equally long prefixes.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::StepOutputDescriptor;

/// Error raised while populating an [`OutputRegistry`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// An empty key would be a prefix of every token.
    #[error("output registry keys must not be empty")]
    EmptyKey,
    #[error("output registry key '{key}' is already registered")]
    DuplicateKey { key: String },
}

/// Read-mostly mapping from a reference prefix to a step output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "IndexMap<String, StepOutputDescriptor>", into = "IndexMap<String, StepOutputDescriptor>")]
pub struct OutputRegistry {
    entries: IndexMap<String, StepOutputDescriptor>,
}

impl OutputRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from `(key, descriptor)` pairs, rejecting empty and
    /// duplicate keys.
    pub fn from_entries<I, K>(entries: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = (K, StepOutputDescriptor)>,
        K: Into<String>,
    {
        let mut registry = Self::new();
        for (key, descriptor) in entries {
            registry.insert(key, descriptor)?;
        }
        Ok(registry)
    }

    pub fn insert(&mut self, key: impl Into<String>, descriptor: StepOutputDescriptor) -> Result<(), RegistryError> {
        let key = key.into();
        if key.is_empty() {
            return Err(RegistryError::EmptyKey);
        }
        if self.entries.contains_key(&key) {
            return Err(RegistryError::DuplicateKey { key });
        }
        self.entries.insert(key, descriptor);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&StepOutputDescriptor> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &StepOutputDescriptor)> {
        self.entries.iter().map(|(key, descriptor)| (key.as_str(), descriptor))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TryFrom<IndexMap<String, StepOutputDescriptor>> for OutputRegistry {
    type Error = RegistryError;

    fn try_from(entries: IndexMap<String, StepOutputDescriptor>) -> Result<Self, Self::Error> {
        Self::from_entries(entries)
    }
}

impl From<OutputRegistry> for IndexMap<String, StepOutputDescriptor> {
    fn from(registry: OutputRegistry) -> Self {
        registry.entries
    }
}
