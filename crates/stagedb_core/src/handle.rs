//! Shared handles to live entities.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard,
};
use stagedb_model::{Entity, EntityId};

/// Owning handle to a live entity.
///
/// The unit of work holds one handle per tracked entity; application
/// code and lookup caches share it. The entity sits behind a
/// read-write lock, so field access goes through [`read`]/[`write`],
/// or [`read_as`]/[`write_as`] for the concrete type.
///
/// [`read`]: EntityHandle::read
/// [`write`]: EntityHandle::write
/// [`read_as`]: EntityHandle::read_as
/// [`write_as`]: EntityHandle::write_as
#[derive(Clone)]
pub struct EntityHandle {
    inner: Arc<RwLock<Box<dyn Entity>>>,
}

impl EntityHandle {
    /// Wraps an entity in a fresh handle.
    #[must_use]
    pub fn new(entity: Box<dyn Entity>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(entity)),
        }
    }

    /// Locks the entity for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, Box<dyn Entity>> {
        self.inner.read()
    }

    /// Locks the entity for writing.
    pub fn write(&self) -> RwLockWriteGuard<'_, Box<dyn Entity>> {
        self.inner.write()
    }

    /// Locks for reading and downcasts to the concrete type.
    ///
    /// `None` if the entity is of a different type.
    pub fn read_as<T: Entity + 'static>(&self) -> Option<MappedRwLockReadGuard<'_, T>> {
        RwLockReadGuard::try_map(self.read(), |entity| entity.as_any().downcast_ref::<T>()).ok()
    }

    /// Locks for writing and downcasts to the concrete type.
    ///
    /// `None` if the entity is of a different type.
    pub fn write_as<T: Entity + 'static>(&self) -> Option<MappedRwLockWriteGuard<'_, T>> {
        RwLockWriteGuard::try_map(self.write(), |entity| {
            entity.as_any_mut().downcast_mut::<T>()
        })
        .ok()
    }

    /// Returns the entity's id, if assigned.
    #[must_use]
    pub fn id(&self) -> Option<EntityId> {
        self.read().id()
    }

    /// Returns a copy of the entity's slug, if available.
    #[must_use]
    pub fn slug(&self) -> Option<String> {
        self.read().slug().map(str::to_owned)
    }

    /// Returns this handle's identity key.
    ///
    /// Stable while the entity lives; two handles produce the same key
    /// exactly when they share the entity.
    #[must_use]
    pub fn handle_id(&self) -> HandleId {
        HandleId(Arc::as_ptr(&self.inner) as *const () as usize)
    }

    /// Returns whether two handles share the same entity.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Downgrades to a non-owning handle.
    #[must_use]
    pub fn downgrade(&self) -> WeakEntityHandle {
        WeakEntityHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl fmt::Debug for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EntityHandle").field(&self.handle_id()).finish()
    }
}

/// Identity key of a live entity handle.
///
/// Derived from the allocation address: unique among live handles,
/// reusable after the entity drops. Keys are only compared within one
/// unit of work, which keeps its entities alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(usize);

/// Non-owning handle used by cache maps.
#[derive(Clone)]
pub struct WeakEntityHandle {
    inner: Weak<RwLock<Box<dyn Entity>>>,
}

impl WeakEntityHandle {
    /// Upgrades to an owning handle if the entity is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<EntityHandle> {
        self.inner.upgrade().map(|inner| EntityHandle { inner })
    }
}

impl fmt::Debug for WeakEntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WeakEntityHandle")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Memo, Ticket};

    #[test]
    fn typed_read_and_write() {
        let handle = EntityHandle::new(Box::new(Ticket::new("draft")));
        handle.write_as::<Ticket>().unwrap().set_title("final");
        assert_eq!(handle.read_as::<Ticket>().unwrap().title(), "final");
    }

    #[test]
    fn downcast_to_wrong_type_is_none() {
        let handle = EntityHandle::new(Box::new(Ticket::new("draft")));
        assert!(handle.read_as::<Memo>().is_none());
        assert!(handle.write_as::<Memo>().is_none());
    }

    #[test]
    fn id_and_slug_convenience() {
        let handle = EntityHandle::new(Box::new(Ticket::with_slug("draft", "draft-1")));
        assert_eq!(handle.id(), None);
        assert_eq!(handle.slug().as_deref(), Some("draft-1"));

        handle.write().assign_id(EntityId::new(4));
        assert_eq!(handle.id(), Some(EntityId::new(4)));
    }

    #[test]
    fn clones_share_identity() {
        let handle = EntityHandle::new(Box::new(Ticket::new("a")));
        let clone = handle.clone();
        assert!(handle.ptr_eq(&clone));
        assert_eq!(handle.handle_id(), clone.handle_id());

        let other = EntityHandle::new(Box::new(Ticket::new("a")));
        assert!(!handle.ptr_eq(&other));
        assert_ne!(handle.handle_id(), other.handle_id());
    }

    #[test]
    fn weak_handles_die_with_the_owner() {
        let handle = EntityHandle::new(Box::new(Ticket::new("a")));
        let weak = handle.downgrade();
        assert!(weak.upgrade().is_some());

        drop(handle);
        assert!(weak.upgrade().is_none());
    }
}
