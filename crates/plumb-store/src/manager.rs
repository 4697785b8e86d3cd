use crate::store::EntityStore;
use crate::StoreError;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Handle to a managed entity. Every holder of a handle for the same key
/// observes the same object.
pub type Shared<E> = Arc<RwLock<E>>;

/// A managed test-domain object.
pub trait Entity: Send + Sync + 'static {
    /// Kind name used in log lines and `NotFound` errors.
    const KIND: &'static str;
}

/// Typed facade over an [`EntityStore`] of shared entities.
///
/// The manager is the only mutator of its store; other components read
/// through the accessors below.
pub struct EntityManager<E: Entity> {
    store: EntityStore<Shared<E>>,
}

impl<E: Entity> Default for EntityManager<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> EntityManager<E> {
    pub fn new() -> Self {
        Self {
            store: EntityStore::new(E::KIND),
        }
    }

    /// Return the entity registered under `key`, constructing and storing it
    /// with `factory` on first use. Concurrent callers for the same key
    /// receive the same instance.
    pub fn get_or_create_default<F>(&self, key: &str, factory: F) -> Shared<E>
    where
        F: FnOnce() -> E,
    {
        self.store.get_or_insert_with(key, || {
            debug!(kind = E::KIND, key, "registering default entity");
            Arc::new(RwLock::new(factory()))
        })
    }

    /// Insert or replace the entity under `key` and return its handle.
    pub fn set(&self, key: impl Into<String>, entity: E) -> Shared<E> {
        let shared = Arc::new(RwLock::new(entity));
        self.store.set(key, Arc::clone(&shared));
        shared
    }

    pub fn get(&self, key: &str) -> Option<Shared<E>> {
        self.store.get(key)
    }

    pub fn require(&self, key: &str) -> Result<Shared<E>, StoreError> {
        self.store.require(key)
    }

    pub fn delete(&self, key: &str) {
        self.store.delete(key);
    }

    /// Retire the entity under `key`, keeping it in the removal history.
    pub fn remove(&self, key: &str) -> bool {
        let removed = self.store.remove(key);
        if removed {
            debug!(kind = E::KIND, key, "entity removed");
        }
        removed
    }

    pub fn removed(&self, key: &str) -> Vec<Shared<E>> {
        self.store.removed(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.store.keys()
    }

    pub fn is_present(&self, key: &str) -> bool {
        self.store.is_present(key)
    }

    pub fn is_removed(&self, key: &str) -> bool {
        self.store.is_removed(key)
    }

    pub fn is_recorded(&self, key: &str) -> bool {
        self.store.is_recorded(key)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}
