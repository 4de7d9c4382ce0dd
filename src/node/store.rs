//! Deduplicated set of accepted broadcast values.
//!
//! Values are never removed: once present, a value stays present for the
//! life of the process, which is what stops a node from fanning the same
//! value out twice.
use std::collections::HashSet;

use parking_lot::RwLock;

/// A broadcast payload. Values are compared by equality only.
pub type Value = i64;

#[derive(Debug, Default)]
pub struct MessageStore {
    messages: RwLock<HashSet<Value>>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Union `values` into the store
    pub fn seed<I>(&self, values: I)
    where
        I: IntoIterator<Item = Value>,
    {
        self.messages.write().extend(values);
    }

    /// Add `value`, returning `true` if it was not already present
    pub fn insert(&self, value: Value) -> bool {
        self.messages.write().insert(value)
    }

    pub fn contains(&self, value: Value) -> bool {
        self.messages.read().contains(&value)
    }

    /// Copy of every stored value, in no particular order
    pub fn snapshot(&self) -> Vec<Value> {
        self.messages.read().iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.messages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.read().is_empty()
    }
}
