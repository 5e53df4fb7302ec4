//! Registration, state accounting, and commit dispatch.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use stagedb_model::EntityClass;
use stagedb_repository::Repository;
use tracing::debug;

use crate::error::{CoreError, CoreResult};
use crate::handle::{EntityHandle, HandleId};
use crate::state::{EntityState, StateTracker};

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(0);

struct EntityRecord {
    class: EntityClass,
    handle: EntityHandle,
    tracker: StateTracker,
}

impl EntityRecord {
    fn observed(&self) -> EntityState {
        self.tracker.observed_state(self.handle.read().as_ref())
    }
}

/// Tracks every entity registered in one session and dispatches the
/// whole batch to the repository at commit.
///
/// The unit of work owns the live set. Dropping a registration (by
/// committing a deletion, or by rollback) releases the engine's hold
/// on the entity; weak cache entries die with it once no caller keeps
/// a handle. Iteration and commit order are deterministic: classes
/// ascending, registration order within a class.
pub struct UnitOfWork {
    serial: u64,
    repository: Arc<dyn Repository>,
    records: HashMap<HandleId, EntityRecord>,
    order: BTreeMap<EntityClass, Vec<HandleId>>,
}

impl UnitOfWork {
    /// Creates an empty unit of work against `repository`.
    #[must_use]
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self {
            serial: NEXT_SERIAL.fetch_add(1, Ordering::Relaxed),
            repository,
            records: HashMap::new(),
            order: BTreeMap::new(),
        }
    }

    /// Returns this unit of work's process-unique serial.
    ///
    /// Two-phase participants derive their ordering key from it.
    #[must_use]
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Returns the repository this unit of work commits against.
    #[must_use]
    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repository
    }

    /// Returns the number of tracked entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns whether nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns whether the entity is registered here.
    #[must_use]
    pub fn is_registered(&self, handle: &EntityHandle) -> bool {
        self.records.contains_key(&handle.handle_id())
    }

    /// Returns the class the entity was registered under.
    #[must_use]
    pub fn class_of(&self, handle: &EntityHandle) -> Option<EntityClass> {
        self.records.get(&handle.handle_id()).map(|record| record.class)
    }

    /// Returns the entity's observed state, if registered.
    #[must_use]
    pub fn observed_state(&self, handle: &EntityHandle) -> Option<EntityState> {
        self.records
            .get(&handle.handle_id())
            .map(EntityRecord::observed)
    }

    /// Registers a brand-new entity, assigning an id if it has none.
    ///
    /// Id assignment happens under the repository lock, so the
    /// issued id and the registration are atomic with respect to
    /// other sessions.
    pub fn register_new(&mut self, class: EntityClass, handle: &EntityHandle) -> CoreResult<()> {
        let key = handle.handle_id();
        if self.records.contains_key(&key) {
            return Err(CoreError::duplicate_registration(class));
        }
        if handle.id().is_none() {
            let _guard = self.repository.lock();
            let id = self.repository.next_id(class);
            handle.write().assign_id(id);
        }
        let tracker = StateTracker::new(handle.read().as_ref(), EntityState::New)?;
        self.insert(key, class, handle, tracker);
        Ok(())
    }

    /// Registers an entity as persisted, or settles an edited one.
    ///
    /// Untracked entities attach with a CLEAN tracker; this is how
    /// loaded entities join the session. Tracked entities go through
    /// the transition table, which only admits DIRTY -> CLEAN.
    pub fn mark_clean(&mut self, class: EntityClass, handle: &EntityHandle) -> CoreResult<()> {
        let key = handle.handle_id();
        match self.records.get_mut(&key) {
            Some(record) => {
                if record.class != class {
                    return Err(CoreError::UnregisteredEntity);
                }
                record
                    .tracker
                    .set_state(handle.read().as_ref(), EntityState::Clean)
            }
            None => {
                let tracker = StateTracker::new(handle.read().as_ref(), EntityState::Clean)?;
                self.insert(key, class, handle, tracker);
                Ok(())
            }
        }
    }

    /// Marks a tracked entity modified.
    pub fn mark_dirty(&mut self, class: EntityClass, handle: &EntityHandle) -> CoreResult<()> {
        self.transition(class, handle, EntityState::Dirty)
    }

    /// Schedules a tracked entity for removal at the next commit.
    pub fn mark_deleted(&mut self, class: EntityClass, handle: &EntityHandle) -> CoreResult<()> {
        self.transition(class, handle, EntityState::Deleted)
    }

    /// Entities observed NEW, optionally restricted to one class.
    ///
    /// Lazy and restartable; order is the deterministic commit order.
    pub fn get_new(
        &self,
        class: Option<EntityClass>,
    ) -> impl Iterator<Item = EntityHandle> + '_ {
        self.in_state(EntityState::New, class)
    }

    /// Entities observed CLEAN, optionally restricted to one class.
    pub fn get_clean(
        &self,
        class: Option<EntityClass>,
    ) -> impl Iterator<Item = EntityHandle> + '_ {
        self.in_state(EntityState::Clean, class)
    }

    /// Entities observed DIRTY, optionally restricted to one class.
    ///
    /// Includes entities whose fields drifted from the clean point
    /// without an explicit mark.
    pub fn get_dirty(
        &self,
        class: Option<EntityClass>,
    ) -> impl Iterator<Item = EntityHandle> + '_ {
        self.in_state(EntityState::Dirty, class)
    }

    /// Entities observed DELETED, optionally restricted to one class.
    pub fn get_deleted(
        &self,
        class: Option<EntityClass>,
    ) -> impl Iterator<Item = EntityHandle> + '_ {
        self.in_state(EntityState::Deleted, class)
    }

    /// Flushes every pending change to the repository.
    ///
    /// The repository lock is held across the whole dispatch. Classes
    /// commit in ascending order, entities in registration order:
    /// observed DIRTY entities are replaced, NEW added, DELETED
    /// removed, CLEAN skipped. Every tracker is reset to a fresh clean
    /// point; deleted entities then leave the live set.
    ///
    /// # Errors
    ///
    /// A repository failure propagates immediately and leaves this
    /// unit of work partially committed. There is no compensation of
    /// operations already applied.
    pub fn commit(&mut self) -> CoreResult<()> {
        let _guard = self.repository.lock();
        debug!(
            serial = self.serial,
            entities = self.records.len(),
            "committing unit of work"
        );

        let mut dropped: Vec<(EntityClass, HandleId)> = Vec::new();
        let mut added = 0_usize;
        let mut replaced = 0_usize;
        let mut removed = 0_usize;

        for (class, keys) in &self.order {
            for key in keys {
                let Some(record) = self.records.get_mut(key) else {
                    continue;
                };
                let state = record.tracker.observed_state(record.handle.read().as_ref());
                match state {
                    EntityState::Dirty => {
                        let entity = record.handle.read();
                        self.repository.replace(*class, entity.as_ref())?;
                        replaced += 1;
                    }
                    EntityState::New => {
                        let entity = record.handle.read();
                        self.repository.add(*class, entity.as_ref())?;
                        added += 1;
                    }
                    EntityState::Deleted => {
                        let entity = record.handle.read();
                        self.repository.remove(*class, entity.as_ref())?;
                        removed += 1;
                        dropped.push((*class, *key));
                    }
                    EntityState::Clean => {}
                }
                record.tracker.reset(record.handle.read().as_ref());
            }
        }

        for (class, key) in dropped {
            self.records.remove(&key);
            if let Some(keys) = self.order.get_mut(&class) {
                keys.retain(|k| *k != key);
                if keys.is_empty() {
                    self.order.remove(&class);
                }
            }
        }

        debug!(serial = self.serial, added, replaced, removed, "commit dispatched");
        Ok(())
    }

    /// Discards every registration and pending change.
    ///
    /// No repository calls are made; the live set empties wholesale.
    pub fn rollback(&mut self) {
        debug!(
            serial = self.serial,
            entities = self.records.len(),
            "rolling back unit of work"
        );
        self.records.clear();
        self.order.clear();
    }

    fn insert(
        &mut self,
        key: HandleId,
        class: EntityClass,
        handle: &EntityHandle,
        tracker: StateTracker,
    ) {
        self.order.entry(class).or_default().push(key);
        self.records.insert(
            key,
            EntityRecord {
                class,
                handle: handle.clone(),
                tracker,
            },
        );
    }

    fn transition(
        &mut self,
        class: EntityClass,
        handle: &EntityHandle,
        target: EntityState,
    ) -> CoreResult<()> {
        let record = self
            .records
            .get_mut(&handle.handle_id())
            .filter(|record| record.class == class)
            .ok_or(CoreError::UnregisteredEntity)?;
        record.tracker.set_state(handle.read().as_ref(), target)
    }

    fn in_state(
        &self,
        state: EntityState,
        class: Option<EntityClass>,
    ) -> impl Iterator<Item = EntityHandle> + '_ {
        self.entries(class)
            .filter(move |record| record.observed() == state)
            .map(|record| record.handle.clone())
    }

    fn entries(&self, class: Option<EntityClass>) -> impl Iterator<Item = &EntityRecord> + '_ {
        self.order
            .iter()
            .filter(move |(entry_class, _)| class.map_or(true, |want| **entry_class == want))
            .flat_map(|(_, keys)| keys.iter())
            .filter_map(move |key| self.records.get(key))
    }
}
