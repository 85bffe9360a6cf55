//! Name-to-factory registries for collaborators and processors.
//!
//! A registry never hands out shared state: `get` invokes the registered
//! factory and returns a fresh instance, with the registry's lock held only
//! long enough to clone the factory handle out — never across the factory
//! call itself.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{Component, EngineError};

type Factory<T> = Arc<dyn Fn() -> Arc<T> + Send + Sync>;

pub struct Registry<T: ?Sized> {
    entries: RwLock<HashMap<String, Factory<T>>>,
}

impl<T: ?Sized> Registry<T> {
    pub fn new() -> Self {
        Self { entries: RwLock::new(HashMap::new()) }
    }

    pub fn register(
        &self,
        name: impl Into<String>,
        factory: impl Fn() -> Arc<T> + Send + Sync + 'static,
    ) -> Result<(), EngineError> {
        let name = name.into();
        if name.is_empty() {
            return Err(EngineError::configuration(Component::Registry, "register")
                .with_context("reason", "name must not be empty"));
        }
        self.entries
            .write()
            .expect("registry lock poisoned")
            .insert(name, Arc::new(factory));
        Ok(())
    }

    /// Looks up `name` and invokes its factory. A miss is always an explicit
    /// error, never a silent `None`.
    pub fn get(&self, name: &str) -> Result<Arc<T>, EngineError> {
        let factory = {
            let guard = self.entries.read().expect("registry lock poisoned");
            guard.get(name).cloned()
        };
        match factory {
            Some(factory) => Ok(factory()),
            None => Err(EngineError::permanent(Component::Registry, "get").with_context("name", name)),
        }
    }

    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.read().expect("registry lock poisoned").keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.entries.read().expect("registry lock poisoned").contains_key(name)
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.entries.write().expect("registry lock poisoned").remove(name).is_some()
    }

    pub fn clear(&self) {
        self.entries.write().expect("registry lock poisoned").clear();
    }

    pub fn count(&self) -> usize {
        self.entries.read().expect("registry lock poisoned").len()
    }
}

impl<T: ?Sized> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}
