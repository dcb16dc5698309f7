#![forbid(unsafe_code)]

//! An opaque, type-keyed bag of collaborators.
//!
//! The binder stores a [`Dependencies`] value and hands it to field
//! factories at build time (for example, a loader used by a selection
//! field's fetch function). The engine itself never reads it.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Collaborators keyed by type. At most one value per type.
#[derive(Clone, Default)]
pub struct Dependencies {
    entries: HashMap<TypeId, Rc<dyn Any>>,
}

impl Dependencies {
    /// An empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `value`, replacing any earlier value of the same type.
    pub fn insert<T: 'static>(&mut self, value: T) {
        self.entries.insert(TypeId::of::<T>(), Rc::new(value));
    }

    /// Builder form of [`insert`](Self::insert).
    #[must_use]
    pub fn with<T: 'static>(mut self, value: T) -> Self {
        self.insert(value);
        self
    }

    /// The value of type `T`, if present.
    #[must_use]
    pub fn get<T: 'static>(&self) -> Option<Rc<T>> {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(|entry| Rc::clone(entry).downcast::<T>().ok())
    }

    /// Whether a value of type `T` is present.
    #[must_use]
    pub fn contains<T: 'static>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    /// Number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the bag is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependencies")
            .field("len", &self.entries.len())
            .finish()
    }
}
