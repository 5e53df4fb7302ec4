//! Thread-scoped sessions over a shared repository.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use stagedb_model::{Entity, EntityClass, EntityId};
use stagedb_repository::{Repository, RepositoryError};
use tracing::debug;

use crate::cache::CacheManager;
use crate::error::{CoreError, CoreResult};
use crate::handle::EntityHandle;
use crate::state::EntityState;
use crate::unit_of_work::UnitOfWork;

/// A session shared within one thread.
pub type SharedSession = Rc<RefCell<Session>>;

static NEXT_FACTORY_SERIAL: AtomicU64 = AtomicU64::new(0);

thread_local! {
    static SESSIONS: RefCell<HashMap<u64, SharedSession>> = RefCell::new(HashMap::new());
}

/// One thread's window onto the repository.
///
/// A session pairs a [`UnitOfWork`] with per-class lookup caches.
/// Entities enter through [`add`] or come back from lookups after the
/// class cache hydrates itself from the repository on first touch.
/// Nothing reaches the repository until [`commit`].
///
/// Sessions are single-threaded; cross-thread coordination happens at
/// the repository, never here.
///
/// [`add`]: Session::add
/// [`commit`]: Session::commit
pub struct Session {
    unit_of_work: UnitOfWork,
    caches: CacheManager,
}

impl Session {
    /// Creates a session against `repository`.
    #[must_use]
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self {
            unit_of_work: UnitOfWork::new(repository),
            caches: CacheManager::new(),
        }
    }

    /// Returns this session's process-unique serial.
    #[must_use]
    pub fn serial(&self) -> u64 {
        self.unit_of_work.serial()
    }

    /// Returns the backing repository.
    #[must_use]
    pub fn repository(&self) -> &Arc<dyn Repository> {
        self.unit_of_work.repository()
    }

    /// Returns the unit of work for state inspection.
    #[must_use]
    pub fn unit_of_work(&self) -> &UnitOfWork {
        &self.unit_of_work
    }

    /// Returns the entity's observed state, if it belongs to this
    /// session.
    #[must_use]
    pub fn state_of(&self, handle: &EntityHandle) -> Option<EntityState> {
        self.unit_of_work.observed_state(handle)
    }

    /// Adds a new entity, wiring it into the unit of work and the
    /// class cache.
    ///
    /// The entity receives a repository-issued id unless it already
    /// carries one. The returned handle is the entity's identity
    /// within this session; lookups by id or slug resolve to it.
    ///
    /// # Errors
    ///
    /// Fails with a duplicate-key error before any state changes when
    /// the entity carries an id or slug already present in the class
    /// cache.
    pub fn add(
        &mut self,
        class: EntityClass,
        entity: Box<dyn Entity>,
    ) -> CoreResult<EntityHandle> {
        self.touch(class)?;
        let cache = self.caches.cache_mut(class);
        if let Some(id) = entity.id() {
            if cache.has_id(id) {
                return Err(CoreError::duplicate_id(class, id));
            }
        }
        if let Some(slug) = entity.slug() {
            if cache.has_slug(slug) {
                return Err(CoreError::duplicate_slug(class, slug));
            }
        }
        let handle = EntityHandle::new(entity);
        self.unit_of_work.register_new(class, &handle)?;
        self.caches.cache_mut(class).add(&handle)?;
        Ok(handle)
    }

    /// Schedules an entity of this session for removal at commit.
    ///
    /// The entity stays resolvable through lookups until the commit
    /// goes through; callers that just removed it should treat it as
    /// gone regardless.
    ///
    /// # Errors
    ///
    /// Fails when the entity does not belong to this session, or its
    /// current state does not admit deletion.
    pub fn remove(&mut self, handle: &EntityHandle) -> CoreResult<()> {
        let class = self
            .unit_of_work
            .class_of(handle)
            .ok_or(CoreError::UnregisteredEntity)?;
        self.unit_of_work.mark_deleted(class, handle)
    }

    /// Looks up an entity by id.
    ///
    /// # Errors
    ///
    /// Fails only when first-touch hydration of the class cache fails.
    pub fn get_by_id(
        &mut self,
        class: EntityClass,
        id: EntityId,
    ) -> CoreResult<Option<EntityHandle>> {
        self.touch(class)?;
        Ok(self.caches.get(class).and_then(|cache| cache.get_by_id(id)))
    }

    /// Looks up an entity by slug.
    ///
    /// Slugs can derive from fields that settle after [`add`], so a
    /// cache miss falls back to scanning this session's pending NEW
    /// entities of the class.
    ///
    /// # Errors
    ///
    /// Fails only when first-touch hydration of the class cache fails.
    ///
    /// [`add`]: Session::add
    pub fn get_by_slug(
        &mut self,
        class: EntityClass,
        slug: &str,
    ) -> CoreResult<Option<EntityHandle>> {
        self.touch(class)?;
        if let Some(found) = self
            .caches
            .get(class)
            .and_then(|cache| cache.get_by_slug(slug))
        {
            return Ok(Some(found));
        }
        Ok(self
            .unit_of_work
            .get_new(Some(class))
            .find(|handle| handle.slug().as_deref() == Some(slug)))
    }

    /// Returns every live entity of `class`, ordered by id.
    ///
    /// Covers repository-loaded entities and pending NEW ones alike.
    ///
    /// # Errors
    ///
    /// Fails only when first-touch hydration of the class cache fails.
    pub fn get_all(&mut self, class: EntityClass) -> CoreResult<Vec<EntityHandle>> {
        self.touch(class)?;
        Ok(self
            .caches
            .get(class)
            .map(|cache| cache.live_handles())
            .unwrap_or_default())
    }

    /// Returns whether an entity with `id` is resolvable in `class`.
    ///
    /// # Errors
    ///
    /// Fails only when first-touch hydration of the class cache fails.
    pub fn contains(&mut self, class: EntityClass, id: EntityId) -> CoreResult<bool> {
        self.touch(class)?;
        Ok(self
            .caches
            .get(class)
            .is_some_and(|cache| cache.has_id(id)))
    }

    /// Flushes buffered work down to the unit of work.
    ///
    /// Nothing is buffered above the unit of work in the current
    /// design; two-phase participants call this during prepare.
    pub fn flush(&mut self) {}

    /// Commits the unit of work.
    ///
    /// Before dispatch, slugs that settled after [`add`] are promoted
    /// to first-class cache entries so post-commit lookups keep
    /// finding them. After dispatch, committed deletions leave the
    /// caches even if a caller still holds a handle.
    ///
    /// # Errors
    ///
    /// A repository failure propagates and leaves the unit of work
    /// partially committed.
    ///
    /// [`add`]: Session::add
    pub fn commit(&mut self) -> CoreResult<()> {
        for class in self.caches.classes() {
            let pending: Vec<EntityHandle> = self.unit_of_work.get_new(Some(class)).collect();
            let cache = self.caches.cache_mut(class);
            for handle in &pending {
                cache.index_slug(handle);
            }
        }
        let deleted: Vec<(EntityClass, EntityHandle)> = self
            .unit_of_work
            .get_deleted(None)
            .filter_map(|handle| {
                self.unit_of_work
                    .class_of(&handle)
                    .map(|class| (class, handle))
            })
            .collect();

        self.unit_of_work.commit()?;

        for (class, handle) in deleted {
            // the entry may already be dead
            let _ = self.caches.cache_mut(class).remove(&handle);
        }
        Ok(())
    }

    /// Rolls back the unit of work and forgets every cached entity.
    pub fn rollback(&mut self) {
        self.unit_of_work.rollback();
        self.caches.clear();
    }

    /// Hydrates the class cache from the repository on first touch.
    fn touch(&mut self, class: EntityClass) -> CoreResult<()> {
        if self.caches.is_initialized(class) {
            return Ok(());
        }
        let loaded = self
            .unit_of_work
            .repository()
            .load_all(class)
            .map_err(|err| match err {
                RepositoryError::Loader { message } => CoreError::configuration(message),
                other => CoreError::Repository(other),
            })?;
        debug!(%class, entities = loaded.len(), "hydrating session cache");
        let cache = self.caches.cache_mut(class);
        for entity in loaded {
            let handle = EntityHandle::new(entity);
            self.unit_of_work.mark_clean(class, &handle)?;
            cache.add(&handle)?;
        }
        Ok(())
    }
}

/// Hands out one [`Session`] per thread.
///
/// Every call from the same thread returns the same session until
/// [`reset`]. Distinct factories keep distinct sessions even on one
/// thread, keyed by a factory serial.
///
/// [`reset`]: SessionFactory::reset
pub struct SessionFactory {
    serial: u64,
    repository: Arc<dyn Repository>,
}

impl SessionFactory {
    /// Creates a factory bound to `repository`.
    #[must_use]
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self {
            serial: NEXT_FACTORY_SERIAL.fetch_add(1, Ordering::Relaxed),
            repository,
        }
    }

    /// Returns the calling thread's session, creating it on first use.
    #[must_use]
    pub fn session(&self) -> SharedSession {
        SESSIONS.with(|registry| {
            registry
                .borrow_mut()
                .entry(self.serial)
                .or_insert_with(|| {
                    debug!(factory = self.serial, "creating thread session");
                    Rc::new(RefCell::new(Session::new(self.repository.clone())))
                })
                .clone()
        })
    }

    /// Discards the calling thread's session.
    ///
    /// The next [`session`] call on this thread builds a fresh one.
    /// Other threads keep theirs.
    ///
    /// [`session`]: SessionFactory::session
    pub fn reset(&self) {
        SESSIONS.with(|registry| {
            registry.borrow_mut().remove(&self.serial);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Memo, Ticket, MEMOS, TICKETS};
    use stagedb_repository::InMemoryRepository;

    fn empty_session() -> Session {
        Session::new(Arc::new(InMemoryRepository::new()))
    }

    fn seeded_repository() -> Arc<InMemoryRepository> {
        let repository = InMemoryRepository::builder()
            .loader(|class| {
                if class != TICKETS {
                    return Vec::new();
                }
                let mut alpha = Ticket::with_id(0, "alpha");
                alpha.set_slug("alpha");
                let mut beta = Ticket::with_id(1, "beta");
                beta.set_slug("beta");
                vec![Box::new(alpha) as Box<dyn Entity>, Box::new(beta)]
            })
            .build();
        Arc::new(repository)
    }

    fn seeded_session() -> Session {
        Session::new(seeded_repository())
    }

    #[test]
    fn add_assigns_id_and_indexes() {
        let mut session = empty_session();
        let handle = session
            .add(TICKETS, Box::new(Ticket::with_slug("first", "first")))
            .unwrap();

        assert_eq!(handle.id(), Some(EntityId::new(0)));
        assert_eq!(session.state_of(&handle), Some(EntityState::New));
        let by_id = session.get_by_id(TICKETS, EntityId::new(0)).unwrap().unwrap();
        assert!(by_id.ptr_eq(&handle));
        let by_slug = session.get_by_slug(TICKETS, "first").unwrap().unwrap();
        assert!(by_slug.ptr_eq(&handle));
    }

    #[test]
    fn add_rejects_duplicate_id() {
        let mut session = seeded_session();
        let err = session
            .add(TICKETS, Box::new(Ticket::with_id(0, "clash")))
            .unwrap_err();
        assert!(matches!(err, CoreError::DuplicateId { id, .. } if id == EntityId::new(0)));

        // the rejected entity left no trace: the seed still answers
        // for its id and nothing joined the live set
        let survivor = session.get_by_id(TICKETS, EntityId::new(0)).unwrap().unwrap();
        assert_eq!(survivor.read_as::<Ticket>().unwrap().title(), "alpha");
        assert_eq!(session.state_of(&survivor), Some(EntityState::Clean));
        assert_eq!(session.get_all(TICKETS).unwrap().len(), 2);
    }

    #[test]
    fn add_rejects_duplicate_slug() {
        let mut session = seeded_session();
        let err = session
            .add(TICKETS, Box::new(Ticket::with_slug("other", "alpha")))
            .unwrap_err();
        assert!(matches!(err, CoreError::DuplicateSlug { ref slug, .. } if slug == "alpha"));

        // the contested slug still resolves to the seed, untouched
        let survivor = session.get_by_slug(TICKETS, "alpha").unwrap().unwrap();
        assert_eq!(survivor.read_as::<Ticket>().unwrap().title(), "alpha");
        assert_eq!(session.state_of(&survivor), Some(EntityState::Clean));
        assert_eq!(session.get_all(TICKETS).unwrap().len(), 2);
    }

    #[test]
    fn loader_seeds_lookups_and_allocator() {
        let mut session = seeded_session();

        let alpha = session.get_by_id(TICKETS, EntityId::new(0)).unwrap().unwrap();
        assert_eq!(alpha.read_as::<Ticket>().unwrap().title(), "alpha");
        assert_eq!(session.state_of(&alpha), Some(EntityState::Clean));
        assert!(session.get_by_slug(TICKETS, "beta").unwrap().is_some());

        // fresh additions start past the seeded ids
        let fresh = session.add(TICKETS, Box::new(Ticket::new("fresh"))).unwrap();
        assert_eq!(fresh.id(), Some(EntityId::new(2)));
    }

    #[test]
    fn get_by_slug_falls_back_to_pending_entities() {
        let mut session = empty_session();
        let handle = session.add(TICKETS, Box::new(Ticket::new("late"))).unwrap();

        // slug settles only after the entity is in the session
        handle.write_as::<Ticket>().unwrap().set_slug("late-slug");

        let found = session.get_by_slug(TICKETS, "late-slug").unwrap().unwrap();
        assert!(found.ptr_eq(&handle));
    }

    #[test]
    fn commit_promotes_late_slugs_into_the_cache() {
        let mut session = empty_session();
        let handle = session.add(TICKETS, Box::new(Ticket::new("draft"))).unwrap();
        handle.write_as::<Ticket>().unwrap().set_slug("draft-1");

        session.commit().unwrap();

        // the entity is CLEAN now, so the NEW fallback no longer
        // applies; only a real cache entry can satisfy this lookup
        assert_eq!(session.state_of(&handle), Some(EntityState::Clean));
        let found = session.get_by_slug(TICKETS, "draft-1").unwrap().unwrap();
        assert!(found.ptr_eq(&handle));
    }

    #[test]
    fn commit_persists_additions() {
        let repository = Arc::new(InMemoryRepository::new());
        let mut session = Session::new(repository.clone() as Arc<dyn Repository>);

        let handle = session.add(TICKETS, Box::new(Ticket::new("draft"))).unwrap();
        assert!(!repository.contains(TICKETS, handle.id().unwrap()));

        session.commit().unwrap();
        assert!(repository.contains(TICKETS, handle.id().unwrap()));
    }

    #[test]
    fn modified_loaded_entity_commits_as_replace() {
        let repository = seeded_repository();
        let mut session = Session::new(repository.clone() as Arc<dyn Repository>);

        let alpha = session.get_by_id(TICKETS, EntityId::new(0)).unwrap().unwrap();
        alpha.write_as::<Ticket>().unwrap().set_points(5);
        session.commit().unwrap();

        let stored = repository.get(TICKETS, EntityId::new(0)).unwrap();
        assert_eq!(stored.as_any().downcast_ref::<Ticket>().unwrap().points(), 5);
    }

    #[test]
    fn removed_entity_resolves_until_commit_then_disappears() {
        let repository = seeded_repository();
        let mut session = Session::new(repository.clone() as Arc<dyn Repository>);

        let alpha = session.get_by_id(TICKETS, EntityId::new(0)).unwrap().unwrap();
        session.remove(&alpha).unwrap();
        assert!(session.get_by_id(TICKETS, EntityId::new(0)).unwrap().is_some());

        session.commit().unwrap();

        assert!(!repository.contains(TICKETS, EntityId::new(0)));
        // gone from the session even though this test still holds a handle
        assert!(session.get_by_id(TICKETS, EntityId::new(0)).unwrap().is_none());
        assert!(session.get_by_slug(TICKETS, "alpha").unwrap().is_none());
        assert!(session.state_of(&alpha).is_none());
    }

    #[test]
    fn remove_unknown_entity_is_rejected() {
        let mut session = empty_session();
        let loose = EntityHandle::new(Box::new(Ticket::new("loose")));
        assert!(matches!(
            session.remove(&loose),
            Err(CoreError::UnregisteredEntity)
        ));
    }

    #[test]
    fn rollback_forgets_pending_work() {
        let repository = seeded_repository();
        let mut session = Session::new(repository.clone() as Arc<dyn Repository>);
        let handle = session.add(TICKETS, Box::new(Ticket::new("pending"))).unwrap();
        let id = handle.id().unwrap();

        session.rollback();

        assert!(session.state_of(&handle).is_none());
        assert!(!repository.contains(TICKETS, id));
        // the cache rebuilds from the repository, which never saw it
        assert!(session.get_by_id(TICKETS, id).unwrap().is_none());
        // seeded entities come back
        assert!(session.get_by_id(TICKETS, EntityId::new(0)).unwrap().is_some());
    }

    #[test]
    fn get_all_spans_loaded_and_pending_entities() {
        let mut session = seeded_session();
        session.add(TICKETS, Box::new(Ticket::new("fresh"))).unwrap();
        session.add(MEMOS, Box::new(Memo::new("note"))).unwrap();

        let tickets = session.get_all(TICKETS).unwrap();
        let ids: Vec<u64> = tickets.iter().map(|h| h.id().unwrap().as_u64()).collect();
        assert_eq!(ids, vec![0, 1, 2]);

        assert_eq!(session.get_all(MEMOS).unwrap().len(), 1);
        assert!(session.contains(TICKETS, EntityId::new(2)).unwrap());
        assert!(!session.contains(TICKETS, EntityId::new(3)).unwrap());
    }

    #[test]
    fn factory_reuses_the_thread_session() {
        let factory = SessionFactory::new(Arc::new(InMemoryRepository::new()));
        let first = factory.session();
        let second = factory.session();
        assert!(Rc::ptr_eq(&first, &second));

        factory.reset();
        let third = factory.session();
        assert!(!Rc::ptr_eq(&first, &third));
    }

    #[test]
    fn factories_keep_their_sessions_apart() {
        let repository: Arc<dyn Repository> = Arc::new(InMemoryRepository::new());
        let a = SessionFactory::new(repository.clone());
        let b = SessionFactory::new(repository);
        assert!(!Rc::ptr_eq(&a.session(), &b.session()));
    }

    #[test]
    fn each_thread_gets_its_own_session() {
        let factory = SessionFactory::new(Arc::new(InMemoryRepository::new()));
        let here = factory.session();
        here.borrow_mut()
            .add(TICKETS, Box::new(Ticket::new("local")))
            .unwrap();
        assert_eq!(here.borrow().unit_of_work().len(), 1);

        std::thread::spawn(move || {
            let there = factory.session();
            assert!(there.borrow().unit_of_work().is_empty());
        })
        .join()
        .unwrap();
    }
}
