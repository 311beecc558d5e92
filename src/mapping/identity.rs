//! Identity cache
//!
//! Maps (entity type, primary key) to the single live instance for that key
//! within one session. It is a cache, not a source of truth: entries stay
//! until they are removed explicitly.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::error::{OrmError, Result};
use crate::mapping::{Entity, Handle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
    type_id: TypeId,
    key: i64,
}

impl CacheKey {
    fn of<T: Entity>(key: i64) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            key,
        }
    }
}

#[derive(Default)]
pub struct IdentityCache {
    entries: RefCell<HashMap<CacheKey, Rc<dyn Any>>>,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a persisted instance
    ///
    /// Adding the instance that is already cached is a no-op. A different
    /// instance under the same key is refused.
    pub fn add<T: Entity>(&self, handle: &Handle<T>) -> Result<()> {
        let key = handle.id().ok_or_else(|| {
            OrmError::invalid_state(format!("cannot cache {}", handle.describe()))
        })?;

        if let Some(existing) = self.get::<T>(key) {
            if Handle::ptr_eq(&existing, handle) {
                return Ok(());
            }
            return Err(OrmError::invalid_state(format!(
                "another instance of {} is already live",
                handle.describe()
            )));
        }

        self.entries
            .borrow_mut()
            .insert(CacheKey::of::<T>(key), handle.clone().into_any());
        Ok(())
    }

    pub fn get<T: Entity>(&self, key: i64) -> Option<Handle<T>> {
        self.get_erased(TypeId::of::<T>(), key)
            .and_then(Handle::from_any)
    }

    pub(crate) fn get_erased(&self, type_id: TypeId, key: i64) -> Option<Rc<dyn Any>> {
        self.entries
            .borrow()
            .get(&CacheKey { type_id, key })
            .cloned()
    }

    /// Remove `handle` if it is the cached instance for its key
    pub fn remove<T: Entity>(&self, handle: &Handle<T>) -> bool {
        let Some(key) = handle.id() else {
            return false;
        };
        match self.get::<T>(key) {
            Some(existing) if Handle::ptr_eq(&existing, handle) => {
                self.entries.borrow_mut().remove(&CacheKey::of::<T>(key));
                true
            }
            _ => false,
        }
    }

    /// Remove whatever instance is cached for `key`
    pub fn evict<T: Entity>(&self, key: i64) -> Option<Handle<T>> {
        self.entries
            .borrow_mut()
            .remove(&CacheKey::of::<T>(key))
            .and_then(Handle::from_any)
    }

    pub fn contains<T: Entity>(&self, key: i64) -> bool {
        self.entries
            .borrow()
            .contains_key(&CacheKey::of::<T>(key))
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

impl fmt::Debug for IdentityCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityCache")
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{Author, Note};

    #[test]
    fn test_add_and_get() {
        let cache = IdentityCache::new();
        let note = Handle::with_id(Note::new("a", false), Some(1));
        cache.add(&note).unwrap();

        let found = cache.get::<Note>(1).unwrap();
        assert!(Handle::ptr_eq(&found, &note));
        assert!(cache.contains::<Note>(1));
        // same key, different type
        assert!(cache.get::<Author>(1).is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_add_is_idempotent() {
        let cache = IdentityCache::new();
        let note = Handle::with_id(Note::default(), Some(4));
        cache.add(&note).unwrap();
        cache.add(&note.clone()).unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_add_refuses_divergent_instance() {
        let cache = IdentityCache::new();
        cache
            .add(&Handle::with_id(Note::default(), Some(4)))
            .unwrap();
        let other = Handle::with_id(Note::default(), Some(4));
        assert!(matches!(
            cache.add(&other),
            Err(OrmError::InvalidState(_))
        ));
    }

    #[test]
    fn test_add_refuses_transient() {
        let cache = IdentityCache::new();
        assert!(cache.add(&Handle::new(Note::default())).is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_remove_only_same_instance() {
        let cache = IdentityCache::new();
        let note = Handle::with_id(Note::default(), Some(2));
        cache.add(&note).unwrap();

        assert!(!cache.remove(&Handle::with_id(Note::default(), Some(2))));
        assert!(cache.contains::<Note>(2));
        assert!(cache.remove(&note));
        assert!(!cache.remove(&note));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_evict_and_clear() {
        let cache = IdentityCache::new();
        let note = Handle::with_id(Note::default(), Some(9));
        cache.add(&note).unwrap();
        cache
            .add(&Handle::with_id(Author::default(), Some(9)))
            .unwrap();

        let evicted = cache.evict::<Note>(9).unwrap();
        assert!(Handle::ptr_eq(&evicted, &note));
        assert!(cache.evict::<Note>(9).is_none());
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }
}
