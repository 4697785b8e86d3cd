use crate::StoreError;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

struct Maps<T> {
    present: HashMap<String, T>,
    removed: HashMap<String, Vec<T>>,
}

/// Keyed registry shared by reference.
///
/// Cloning an `EntityStore` yields another handle to the same maps, so a
/// `set` through one handle is visible through every other. Reads and writes
/// go through a single `RwLock`: a reader sees either the previous value or
/// the new one, never a partial write.
///
/// Absent keys have one contract for every `T`: [`get`](Self::get) returns
/// `None`, [`get_or_zero`](Self::get_or_zero) returns `(T::default(), false)`,
/// and [`require`](Self::require) returns [`StoreError::NotFound`].
pub struct EntityStore<T> {
    kind: &'static str,
    inner: Arc<RwLock<Maps<T>>>,
}

impl<T> Clone for EntityStore<T> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for EntityStore<T> {
    fn default() -> Self {
        Self::new("entity")
    }
}

impl<T> EntityStore<T> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            inner: Arc::new(RwLock::new(Maps {
                present: HashMap::new(),
                removed: HashMap::new(),
            })),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    // A panic while holding the lock cannot leave a map half-updated (every
    // mutation is a single HashMap call), so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, Maps<T>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Maps<T>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set(&self, key: impl Into<String>, value: T) {
        self.write().present.insert(key.into(), value);
    }

    pub fn delete(&self, key: &str) {
        self.write().present.remove(key);
    }

    /// Move the present value for `key` into its removal history.
    /// Returns `false` if nothing was present.
    pub fn remove(&self, key: &str) -> bool {
        let mut maps = self.write();
        match maps.present.remove(key) {
            Some(value) => {
                maps.removed.entry(key.to_owned()).or_default().push(value);
                true
            }
            None => false,
        }
    }

    pub fn is_present(&self, key: &str) -> bool {
        self.read().present.contains_key(key)
    }

    pub fn is_removed(&self, key: &str) -> bool {
        self.read().removed.contains_key(key)
    }

    /// Present now, or removed at some point during this run.
    pub fn is_recorded(&self, key: &str) -> bool {
        let maps = self.read();
        maps.present.contains_key(key) || maps.removed.contains_key(key)
    }

    /// Sorted snapshot of the present keys.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.read().present.keys().cloned().collect();
        keys.sort_unstable();
        keys
    }

    pub fn len(&self) -> usize {
        self.read().present.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().present.is_empty()
    }
}

impl<T: Clone> EntityStore<T> {
    pub fn get(&self, key: &str) -> Option<T> {
        self.read().present.get(key).cloned()
    }

    pub fn require(&self, key: &str) -> Result<T, StoreError> {
        self.get(key).ok_or_else(|| StoreError::NotFound {
            kind: self.kind,
            key: key.to_owned(),
        })
    }

    /// Return the value for `key`, inserting `factory()` first if absent.
    /// The check and the insert happen under one write lock.
    pub fn get_or_insert_with<F>(&self, key: &str, factory: F) -> T
    where
        F: FnOnce() -> T,
    {
        if let Some(value) = self.read().present.get(key) {
            return value.clone();
        }
        self.write()
            .present
            .entry(key.to_owned())
            .or_insert_with(factory)
            .clone()
    }

    /// Removal history for `key`, oldest first.
    pub fn removed(&self, key: &str) -> Vec<T> {
        self.read().removed.get(key).cloned().unwrap_or_default()
    }
}

impl<T: Clone + Default> EntityStore<T> {
    /// Zero-value lookup: `(value, true)` when present, `(T::default(), false)` otherwise.
    pub fn get_or_zero(&self, key: &str) -> (T, bool) {
        match self.get(key) {
            Some(value) => (value, true),
            None => (T::default(), false),
        }
    }
}
