//! Error types for the StageDB engine.

use stagedb_model::{EntityClass, EntityId};
use stagedb_repository::RepositoryError;
use thiserror::Error;

use crate::state::EntityState;

/// Result type for engine operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in engine operations.
///
/// Everything surfaces synchronously at the operation that caused it;
/// nothing is swallowed or retried.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A state change outside the transition table was requested.
    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition {
        /// The observed source state.
        from: EntityState,
        /// The requested target state.
        to: EntityState,
    },

    /// Tracking was attached with a state other than NEW or CLEAN.
    #[error("tracking must start NEW or CLEAN, got {state}")]
    InvalidInitialState {
        /// The rejected initial state.
        state: EntityState,
    },

    /// A state operation addressed an entity that is not registered.
    #[error("entity is not registered with the unit of work")]
    UnregisteredEntity,

    /// `register_new` was called for an already-tracked entity.
    #[error("entity already registered in {class}")]
    DuplicateRegistration {
        /// The class the registration targeted.
        class: EntityClass,
    },

    /// An added entity's id collides with a cached one.
    #[error("duplicate id {id} in {class}")]
    DuplicateId {
        /// The class that was checked.
        class: EntityClass,
        /// The colliding id.
        id: EntityId,
    },

    /// An added entity's slug collides with a cached one.
    #[error("duplicate slug '{slug}' in {class}")]
    DuplicateSlug {
        /// The class that was checked.
        class: EntityClass,
        /// The colliding slug.
        slug: String,
    },

    /// A cache removal or swap addressed an unindexed id.
    #[error("no cache entry for {id} in {class}")]
    MissingEntry {
        /// The class of the cache.
        class: EntityClass,
        /// The id that was not indexed.
        id: EntityId,
    },

    /// An entity without an id reached the cache.
    #[error("entity in {class} has no id to index")]
    MissingId {
        /// The class of the id-less entity.
        class: EntityClass,
    },

    /// The repository or its loader is misconfigured.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the problem.
        message: String,
    },

    /// Repository failure during commit or cache seeding.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl CoreError {
    /// Creates an invalid transition error.
    pub fn invalid_transition(from: EntityState, to: EntityState) -> Self {
        Self::InvalidTransition { from, to }
    }

    /// Creates an invalid initial state error.
    pub fn invalid_initial_state(state: EntityState) -> Self {
        Self::InvalidInitialState { state }
    }

    /// Creates a duplicate registration error.
    pub fn duplicate_registration(class: EntityClass) -> Self {
        Self::DuplicateRegistration { class }
    }

    /// Creates a duplicate id error.
    pub fn duplicate_id(class: EntityClass, id: EntityId) -> Self {
        Self::DuplicateId { class, id }
    }

    /// Creates a duplicate slug error.
    pub fn duplicate_slug(class: EntityClass, slug: impl Into<String>) -> Self {
        Self::DuplicateSlug {
            class,
            slug: slug.into(),
        }
    }

    /// Creates a missing cache entry error.
    pub fn missing_entry(class: EntityClass, id: EntityId) -> Self {
        Self::MissingEntry { class, id }
    }

    /// Creates a missing id error.
    pub fn missing_id(class: EntityClass) -> Self {
        Self::MissingId { class }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_message_names_both_states() {
        let err = CoreError::invalid_transition(EntityState::Clean, EntityState::New);
        assert_eq!(err.to_string(), "invalid state transition: CLEAN -> NEW");
    }

    #[test]
    fn repository_errors_convert() {
        let err: CoreError =
            RepositoryError::missing_entity(EntityClass::new(1), EntityId::new(2)).into();
        assert!(matches!(err, CoreError::Repository(_)));
        assert_eq!(err.to_string(), "repository error: no entity ent:2 in class:1");
    }
}
