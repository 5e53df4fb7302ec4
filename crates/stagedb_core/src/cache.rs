//! Identity and slug lookup caches.

use std::collections::HashMap;

use stagedb_model::{EntityClass, EntityId};

use crate::error::{CoreError, CoreResult};
use crate::handle::{EntityHandle, WeakEntityHandle};

/// Per-class lookup cache holding non-owning entity references.
///
/// The unit of work's live set owns entities; cache entries are weak
/// and simply stop resolving once an entity dies. The slug map is a
/// subset of the id map: a slug entry always has an id entry sharing
/// its entity, never the other way around.
pub struct EntityCache {
    class: EntityClass,
    by_id: HashMap<EntityId, WeakEntityHandle>,
    by_slug: HashMap<String, WeakEntityHandle>,
}

impl EntityCache {
    /// Creates an empty cache for `class`.
    #[must_use]
    pub fn new(class: EntityClass) -> Self {
        Self {
            class,
            by_id: HashMap::new(),
            by_slug: HashMap::new(),
        }
    }

    /// Returns the class this cache serves.
    #[must_use]
    pub fn class(&self) -> EntityClass {
        self.class
    }

    /// Indexes an entity by id, and by slug when one is available.
    ///
    /// The entity must already carry an id. Slug-less entities get an
    /// id entry only; the slug can be indexed later with
    /// [`index_slug`]. Duplicate policy belongs to the session, which
    /// checks before adding; an entry under the same key is displaced.
    ///
    /// [`index_slug`]: EntityCache::index_slug
    pub fn add(&mut self, handle: &EntityHandle) -> CoreResult<()> {
        let id = handle.id().ok_or_else(|| CoreError::missing_id(self.class))?;
        self.purge_dead();
        self.by_id.insert(id, handle.downgrade());
        if let Some(slug) = handle.slug() {
            self.by_slug.insert(slug, handle.downgrade());
        }
        Ok(())
    }

    /// Drops an entity's entries.
    ///
    /// The id entry must exist; a missing slug entry is not an error
    /// (the slug may never have been indexed).
    pub fn remove(&mut self, handle: &EntityHandle) -> CoreResult<()> {
        let id = handle.id().ok_or_else(|| CoreError::missing_id(self.class))?;
        if self.by_id.remove(&id).is_none() {
            return Err(CoreError::missing_entry(self.class, id));
        }
        if let Some(slug) = handle.slug() {
            self.by_slug.remove(&slug);
        }
        Ok(())
    }

    /// Swaps the entry at the entity's id for this entity.
    ///
    /// The displaced entity's slug entry goes with it.
    pub fn replace(&mut self, handle: &EntityHandle) -> CoreResult<()> {
        let id = handle.id().ok_or_else(|| CoreError::missing_id(self.class))?;
        match self.by_id.remove(&id) {
            Some(old) => {
                if let Some(old) = old.upgrade() {
                    if let Some(slug) = old.slug() {
                        self.by_slug.remove(&slug);
                    }
                }
            }
            None => return Err(CoreError::missing_entry(self.class, id)),
        }
        self.add(handle)
    }

    /// Indexes a slug that became available after [`add`].
    ///
    /// No-op when the entity has no slug yet, is not indexed by id,
    /// or the slug is already taken.
    ///
    /// [`add`]: EntityCache::add
    pub fn index_slug(&mut self, handle: &EntityHandle) {
        let (Some(id), Some(slug)) = (handle.id(), handle.slug()) else {
            return;
        };
        if self.by_id.contains_key(&id) && !self.by_slug.contains_key(&slug) {
            self.by_slug.insert(slug, handle.downgrade());
        }
    }

    /// Looks up a live entity by id.
    #[must_use]
    pub fn get_by_id(&self, id: EntityId) -> Option<EntityHandle> {
        self.by_id.get(&id).and_then(WeakEntityHandle::upgrade)
    }

    /// Looks up a live entity by slug.
    #[must_use]
    pub fn get_by_slug(&self, slug: &str) -> Option<EntityHandle> {
        self.by_slug.get(slug).and_then(WeakEntityHandle::upgrade)
    }

    /// Returns whether an id resolves to a live entity.
    #[must_use]
    pub fn has_id(&self, id: EntityId) -> bool {
        self.get_by_id(id).is_some()
    }

    /// Returns whether a slug resolves to a live entity.
    #[must_use]
    pub fn has_slug(&self, slug: &str) -> bool {
        self.get_by_slug(slug).is_some()
    }

    /// Returns every live entity, ordered by id.
    #[must_use]
    pub fn live_handles(&self) -> Vec<EntityHandle> {
        let mut alive: Vec<(EntityId, EntityHandle)> = self
            .by_id
            .iter()
            .filter_map(|(id, weak)| weak.upgrade().map(|handle| (*id, handle)))
            .collect();
        alive.sort_by_key(|(id, _)| *id);
        alive.into_iter().map(|(_, handle)| handle).collect()
    }

    fn purge_dead(&mut self) {
        self.by_id.retain(|_, weak| weak.upgrade().is_some());
        self.by_slug.retain(|_, weak| weak.upgrade().is_some());
    }
}

/// Lazily-created per-class caches for one session.
pub struct CacheManager {
    caches: HashMap<EntityClass, EntityCache>,
}

impl CacheManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self {
            caches: HashMap::new(),
        }
    }

    /// Returns whether the cache for `class` has been created.
    #[must_use]
    pub fn is_initialized(&self, class: EntityClass) -> bool {
        self.caches.contains_key(&class)
    }

    /// Returns the cache for `class`, creating it if needed.
    pub fn cache_mut(&mut self, class: EntityClass) -> &mut EntityCache {
        self.caches
            .entry(class)
            .or_insert_with(|| EntityCache::new(class))
    }

    /// Returns the cache for `class`, if created.
    #[must_use]
    pub fn get(&self, class: EntityClass) -> Option<&EntityCache> {
        self.caches.get(&class)
    }

    /// Returns the created classes, ascending.
    #[must_use]
    pub fn classes(&self) -> Vec<EntityClass> {
        let mut classes: Vec<EntityClass> = self.caches.keys().copied().collect();
        classes.sort_unstable();
        classes
    }

    /// Drops every cache.
    pub fn clear(&mut self) {
        self.caches.clear();
    }
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new()
    }
}
