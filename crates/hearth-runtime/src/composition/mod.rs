//! Composition storage: the parts and context tables owned by a component.
//!
//! Both tables preserve insertion order, which is what makes termination
//! fallback order and context listing deterministic. Context entries hold
//! their declaration; resolution happens in the component layer, outside the
//! table lock, and only non-volatile results are written back through
//! [`ContextTable::cache`].

use std::sync::{Mutex, MutexGuard, PoisonError};

use hearth_model::{ComponentId, ContextDecl, Value};

use crate::component::Component;
use crate::error::RuntimeError;
use crate::registry::Instance;

/// A resolved context value: either a live object or plain data.
#[derive(Clone)]
pub enum ContextValue {
    /// A backing instance (a part's or a service provider's).
    Instance(Instance),
    /// A resolved data value.
    Value(Value),
}

impl std::fmt::Debug for ContextValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Instance(_) => f.write_str("Instance"),
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
        }
    }
}

/// Insertion-ordered table of a container's child components, keyed by part
/// name.
#[derive(Debug, Default)]
pub struct PartsTable {
    entries: Mutex<Vec<(String, Component)>>,
}

impl PartsTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, Vec<(String, Component)>> {
        // Entries are append-only pairs; a poisoned guard is still coherent.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a part under its key.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::DuplicatePart`] when the key is taken; the
    /// check and the insert happen under one lock acquisition.
    pub fn add(&self, owner: &ComponentId, key: &str, part: Component) -> Result<(), RuntimeError> {
        let mut entries = self.entries();
        if entries.iter().any(|(existing, _)| existing == key) {
            return Err(RuntimeError::DuplicatePart {
                id: owner.clone(),
                key: key.to_owned(),
            });
        }
        entries.push((key.to_owned(), part));
        Ok(())
    }

    /// Looks a part up by key.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::PartNotFound`] when nothing is registered
    /// under the key.
    pub fn get(&self, owner: &ComponentId, key: &str) -> Result<Component, RuntimeError> {
        self.entries()
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, part)| part.clone())
            .ok_or_else(|| RuntimeError::PartNotFound {
                id: owner.clone(),
                key: key.to_owned(),
            })
    }

    /// Returns the registered keys, in insertion order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.entries().iter().map(|(key, _)| key.clone()).collect()
    }

    /// Returns a snapshot of the table, in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(String, Component)> {
        self.entries().clone()
    }

    /// Returns the number of registered parts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Returns `true` when no parts are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

struct ContextEntry {
    decl: ContextDecl,
    cached: Option<ContextValue>,
}

/// Insertion-ordered table of a component's context declarations and their
/// cached resolutions.
#[derive(Default)]
pub struct ContextTable {
    entries: Mutex<Vec<(String, ContextEntry)>>,
}

impl std::fmt::Debug for ContextTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextTable")
            .field("keys", &self.keys())
            .finish_non_exhaustive()
    }
}

impl ContextTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, Vec<(String, ContextEntry)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a context declaration under its key.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::DuplicateContext`] when the key is taken.
    pub fn add(&self, owner: &ComponentId, key: &str, decl: ContextDecl) -> Result<(), RuntimeError> {
        let mut entries = self.entries();
        if entries.iter().any(|(existing, _)| existing == key) {
            return Err(RuntimeError::DuplicateContext {
                id: owner.clone(),
                key: key.to_owned(),
            });
        }
        entries.push((key.to_owned(), ContextEntry { decl, cached: None }));
        Ok(())
    }

    /// Returns the declaration registered under the key.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::ContextNotFound`] when nothing is registered
    /// under the key.
    pub fn declaration(&self, owner: &ComponentId, key: &str) -> Result<ContextDecl, RuntimeError> {
        self.entries()
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, entry)| entry.decl.clone())
            .ok_or_else(|| RuntimeError::ContextNotFound {
                id: owner.clone(),
                key: key.to_owned(),
            })
    }

    /// Returns the cached resolution for the key, if one was stored.
    ///
    /// Volatile entries are never cached, so this always misses for them.
    #[must_use]
    pub fn cached(&self, key: &str) -> Option<ContextValue> {
        self.entries()
            .iter()
            .find(|(existing, _)| existing == key)
            .and_then(|(_, entry)| entry.cached.clone())
    }

    /// Stores a resolution for a non-volatile entry.
    ///
    /// Ignored for volatile entries and unknown keys; re-resolution is the
    /// contract there.
    pub fn cache(&self, key: &str, value: ContextValue) {
        let mut entries = self.entries();
        if let Some((_, entry)) = entries.iter_mut().find(|(existing, _)| existing == key)
            && !entry.decl.is_volatile()
        {
            entry.cached = Some(value);
        }
    }

    /// Drops every cached resolution, forcing re-resolution on next access.
    pub fn invalidate(&self) {
        for (_, entry) in self.entries().iter_mut() {
            entry.cached = None;
        }
    }

    /// Returns the registered keys, in insertion order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.entries().iter().map(|(key, _)| key.clone()).collect()
    }

    /// Returns the number of registered entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Returns `true` when no entries are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}
