//! Error types for StageDB repositories.

use stagedb_model::{EntityClass, EntityId};
use thiserror::Error;

/// Result type for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Errors that can occur in repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// An `add` collided with an existing snapshot.
    #[error("duplicate entity {id} in {class}")]
    DuplicateEntity {
        /// The class of the colliding entity.
        class: EntityClass,
        /// The id already present.
        id: EntityId,
    },

    /// A `replace` or `remove` addressed an absent snapshot.
    #[error("no entity {id} in {class}")]
    MissingEntity {
        /// The class that was searched.
        class: EntityClass,
        /// The id that was not found.
        id: EntityId,
    },

    /// A persistence primitive was handed an entity without an id.
    #[error("entity in {class} has no id")]
    UnidentifiedEntity {
        /// The class of the id-less entity.
        class: EntityClass,
    },

    /// The configured bulk loader produced unusable data.
    #[error("loader failed: {message}")]
    Loader {
        /// Description of the failure.
        message: String,
    },
}

impl RepositoryError {
    /// Creates a duplicate entity error.
    pub fn duplicate_entity(class: EntityClass, id: EntityId) -> Self {
        Self::DuplicateEntity { class, id }
    }

    /// Creates a missing entity error.
    pub fn missing_entity(class: EntityClass, id: EntityId) -> Self {
        Self::MissingEntity { class, id }
    }

    /// Creates an unidentified entity error.
    pub fn unidentified_entity(class: EntityClass) -> Self {
        Self::UnidentifiedEntity { class }
    }

    /// Creates a loader error.
    pub fn loader(message: impl Into<String>) -> Self {
        Self::Loader {
            message: message.into(),
        }
    }
}
