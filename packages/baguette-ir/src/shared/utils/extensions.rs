//! Typed per-package state
//!
//! Each type package keeps its own mutable tables (open handles, latest
//! registry versions, ...) for the duration of one build. The map is keyed by
//! the state's type so packages never see each other's state.

use ahash::AHashMap;
use std::any::{Any, TypeId};

#[derive(Default)]
pub struct Extensions {
    map: AHashMap<TypeId, Box<dyn Any + Send>>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// State of type `T`, created on first access
    pub fn get_or_default<T: Default + Send + 'static>(&mut self) -> &mut T {
        self.map
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(T::default()))
            .downcast_mut::<T>()
            .expect("extension stored under its own TypeId")
    }

    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|state| state.downcast_ref::<T>())
    }

    pub fn remove<T: 'static>(&mut self) -> Option<T> {
        self.map
            .remove(&TypeId::of::<T>())
            .and_then(|state| state.downcast::<T>().ok())
            .map(|boxed| *boxed)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl std::fmt::Debug for Extensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extensions")
            .field("len", &self.map.len())
            .finish()
    }
}
