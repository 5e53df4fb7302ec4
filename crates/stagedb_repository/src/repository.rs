//! The repository trait.

use parking_lot::ReentrantMutexGuard;
use stagedb_model::{Entity, EntityClass, EntityId};

use crate::error::RepositoryResult;

/// The committed side of the engine: snapshot storage plus id issue.
///
/// Implementations must be `Send + Sync`; one repository is shared by
/// every session working against it. The persistence primitives are
/// commit-time operations. Sessions never call them for individual
/// mutations; a unit of work calls them in a batch while holding
/// [`lock`].
///
/// [`lock`]: Repository::lock
pub trait Repository: Send + Sync {
    /// Acquires the repository lock.
    ///
    /// The lock serializes compound operations: id generation followed
    /// by registration, and the whole commit dispatch. It is reentrant,
    /// so a holder may call primitives that also take it.
    fn lock(&self) -> ReentrantMutexGuard<'_, ()>;

    /// Stores a snapshot of a new entity.
    ///
    /// # Errors
    ///
    /// Returns [`UnidentifiedEntity`] if the entity has no id, or
    /// [`DuplicateEntity`] if a snapshot with the same class and id
    /// already exists.
    ///
    /// [`UnidentifiedEntity`]: crate::RepositoryError::UnidentifiedEntity
    /// [`DuplicateEntity`]: crate::RepositoryError::DuplicateEntity
    fn add(&self, class: EntityClass, entity: &dyn Entity) -> RepositoryResult<()>;

    /// Overwrites the snapshot of an existing entity.
    ///
    /// # Errors
    ///
    /// Returns [`UnidentifiedEntity`] if the entity has no id, or
    /// [`MissingEntity`] if no snapshot with its class and id exists.
    ///
    /// [`UnidentifiedEntity`]: crate::RepositoryError::UnidentifiedEntity
    /// [`MissingEntity`]: crate::RepositoryError::MissingEntity
    fn replace(&self, class: EntityClass, entity: &dyn Entity) -> RepositoryResult<()>;

    /// Deletes the snapshot of an existing entity.
    ///
    /// # Errors
    ///
    /// Returns [`UnidentifiedEntity`] if the entity has no id, or
    /// [`MissingEntity`] if no snapshot with its class and id exists.
    ///
    /// [`UnidentifiedEntity`]: crate::RepositoryError::UnidentifiedEntity
    /// [`MissingEntity`]: crate::RepositoryError::MissingEntity
    fn remove(&self, class: EntityClass, entity: &dyn Entity) -> RepositoryResult<()>;

    /// Issues the next id for `class`.
    fn next_id(&self, class: EntityClass) -> EntityId;

    /// Returns the id the next [`next_id`] call would issue.
    ///
    /// [`next_id`]: Repository::next_id
    fn current_id(&self, class: EntityClass) -> EntityId;

    /// Raises the next id for `class` to at least `at_least`.
    fn advance_id(&self, class: EntityClass, at_least: EntityId);

    /// Returns snapshots of every stored entity of `class`.
    ///
    /// Sessions call this once per class to seed their caches.
    /// Repositories without bulk loading return an empty set.
    ///
    /// # Errors
    ///
    /// Returns [`Loader`] if a configured bulk loader produced
    /// unusable data.
    ///
    /// [`Loader`]: crate::RepositoryError::Loader
    fn load_all(&self, class: EntityClass) -> RepositoryResult<Vec<Box<dyn Entity>>> {
        let _ = class;
        Ok(Vec::new())
    }
}
