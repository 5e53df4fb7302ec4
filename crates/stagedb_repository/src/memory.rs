//! In-memory repository for testing and ephemeral use.

use std::collections::{BTreeMap, HashSet};
use std::ops::RangeInclusive;

use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard, RwLock};
use stagedb_model::{Entity, EntityClass, EntityId};

use crate::allocator::SequentialIdAllocator;
use crate::error::{RepositoryError, RepositoryResult};
use crate::repository::Repository;

/// Bulk loader: produces seed entities for a class on first touch.
pub type EntityLoader = Box<dyn Fn(EntityClass) -> Vec<Box<dyn Entity>> + Send + Sync>;

/// A repository holding entity snapshots in process memory.
///
/// Snapshots are keyed by `(class, id)` and taken with
/// [`Entity::boxed_clone`], so sessions never observe each other's
/// live objects through the store. An optional bulk loader seeds a
/// class the first time it is loaded; seeded entities without ids get
/// allocator-assigned ones, and the allocator is advanced past every
/// pre-existing id it sees. Seeding is all-or-nothing: a failing batch
/// publishes nothing, and the next load runs the loader again.
pub struct InMemoryRepository {
    lock: ReentrantMutex<()>,
    allocator: SequentialIdAllocator,
    store: RwLock<BTreeMap<(EntityClass, EntityId), Box<dyn Entity>>>,
    loader: Option<EntityLoader>,
    loaded: Mutex<HashSet<EntityClass>>,
}

impl InMemoryRepository {
    /// Creates an empty repository with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Starts building a repository.
    #[must_use]
    pub fn builder() -> MemoryRepositoryBuilder {
        MemoryRepositoryBuilder::new()
    }

    /// Returns a snapshot of the stored entity, if present.
    #[must_use]
    pub fn get(&self, class: EntityClass, id: EntityId) -> Option<Box<dyn Entity>> {
        self.store
            .read()
            .get(&(class, id))
            .map(|entity| entity.boxed_clone())
    }

    /// Returns whether a snapshot with this class and id is stored.
    #[must_use]
    pub fn contains(&self, class: EntityClass, id: EntityId) -> bool {
        self.store.read().contains_key(&(class, id))
    }

    /// Returns the number of stored snapshots of `class`.
    #[must_use]
    pub fn len(&self, class: EntityClass) -> usize {
        self.store.read().range(Self::class_range(class)).count()
    }

    /// Returns whether no snapshot of `class` is stored.
    #[must_use]
    pub fn is_empty(&self, class: EntityClass) -> bool {
        self.len(class) == 0
    }

    fn class_range(class: EntityClass) -> RangeInclusive<(EntityClass, EntityId)> {
        (class, EntityId::new(0))..=(class, EntityId::new(u64::MAX))
    }

    fn identified(class: EntityClass, entity: &dyn Entity) -> RepositoryResult<EntityId> {
        entity
            .id()
            .ok_or_else(|| RepositoryError::unidentified_entity(class))
    }

    fn run_loader(&self, class: EntityClass) -> RepositoryResult<()> {
        let Some(loader) = &self.loader else {
            return Ok(());
        };
        // held across the whole run: concurrent first touches serialize
        // here, and a failed run leaves the class unmarked so the next
        // touch re-runs the loader and re-surfaces its error
        let mut loaded = self.loaded.lock();
        if loaded.contains(&class) {
            return Ok(());
        }

        let mut staged: BTreeMap<EntityId, Box<dyn Entity>> = BTreeMap::new();
        for mut entity in loader(class) {
            let id = match entity.id() {
                Some(id) => {
                    self.allocator.advance(class, id.next());
                    id
                }
                None => {
                    let id = self.allocator.next(class);
                    entity.assign_id(id);
                    id
                }
            };
            if staged.insert(id, entity).is_some() {
                return Err(RepositoryError::loader(format!(
                    "seed data repeats {id} in {class}"
                )));
            }
        }

        // publish the batch only once the whole of it checks out
        let mut store = self.store.write();
        if let Some(id) = staged.keys().find(|id| store.contains_key(&(class, **id))) {
            return Err(RepositoryError::loader(format!(
                "seed {id} already stored in {class}"
            )));
        }
        store.extend(staged.into_iter().map(|(id, entity)| ((class, id), entity)));
        loaded.insert(class);
        Ok(())
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl Repository for InMemoryRepository {
    fn lock(&self) -> ReentrantMutexGuard<'_, ()> {
        self.lock.lock()
    }

    fn add(&self, class: EntityClass, entity: &dyn Entity) -> RepositoryResult<()> {
        let id = Self::identified(class, entity)?;
        let mut store = self.store.write();
        if store.contains_key(&(class, id)) {
            return Err(RepositoryError::duplicate_entity(class, id));
        }
        store.insert((class, id), entity.boxed_clone());
        Ok(())
    }

    fn replace(&self, class: EntityClass, entity: &dyn Entity) -> RepositoryResult<()> {
        let id = Self::identified(class, entity)?;
        let mut store = self.store.write();
        if !store.contains_key(&(class, id)) {
            return Err(RepositoryError::missing_entity(class, id));
        }
        store.insert((class, id), entity.boxed_clone());
        Ok(())
    }

    fn remove(&self, class: EntityClass, entity: &dyn Entity) -> RepositoryResult<()> {
        let id = Self::identified(class, entity)?;
        let mut store = self.store.write();
        if store.remove(&(class, id)).is_none() {
            return Err(RepositoryError::missing_entity(class, id));
        }
        Ok(())
    }

    fn next_id(&self, class: EntityClass) -> EntityId {
        self.allocator.next(class)
    }

    fn current_id(&self, class: EntityClass) -> EntityId {
        self.allocator.current(class)
    }

    fn advance_id(&self, class: EntityClass, at_least: EntityId) {
        self.allocator.advance(class, at_least);
    }

    fn load_all(&self, class: EntityClass) -> RepositoryResult<Vec<Box<dyn Entity>>> {
        self.run_loader(class)?;
        let store = self.store.read();
        Ok(store
            .range(Self::class_range(class))
            .map(|(_, entity)| entity.boxed_clone())
            .collect())
    }
}

/// Builder for [`InMemoryRepository`].
pub struct MemoryRepositoryBuilder {
    id_base: u64,
    loader: Option<EntityLoader>,
}

impl MemoryRepositoryBuilder {
    /// Starts a builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id_base: 0,
            loader: None,
        }
    }

    /// Sets the first id the allocator issues for every class.
    #[must_use]
    pub fn id_base(mut self, base: u64) -> Self {
        self.id_base = base;
        self
    }

    /// Installs a bulk loader that seeds a class on first load.
    #[must_use]
    pub fn loader<F>(mut self, loader: F) -> Self
    where
        F: Fn(EntityClass) -> Vec<Box<dyn Entity>> + Send + Sync + 'static,
    {
        self.loader = Some(Box::new(loader));
        self
    }

    /// Builds the repository.
    #[must_use]
    pub fn build(self) -> InMemoryRepository {
        InMemoryRepository {
            lock: ReentrantMutex::new(()),
            allocator: SequentialIdAllocator::with_base(self.id_base),
            store: RwLock::new(BTreeMap::new()),
            loader: self.loader,
            loaded: Mutex::new(HashSet::new()),
        }
    }
}

impl Default for MemoryRepositoryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
