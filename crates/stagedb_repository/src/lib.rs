//! # StageDB Repository
//!
//! Repository contract and reference backend for StageDB.
//!
//! A repository is the committed side of the world: it stores entity
//! snapshots keyed by class and id, hands out sequential ids, and owns
//! the lock that serializes id generation and commit dispatch.
//!
//! ## Design Principles
//!
//! - Repositories store snapshots, never live objects. Sessions hold
//!   live entities; commit copies them in via [`Entity::boxed_clone`].
//! - Id allocation belongs to the repository instance. There is no
//!   process-global id state.
//! - The repository lock is reentrant so a commit holding it can call
//!   primitives that also take it.
//!
//! [`Entity::boxed_clone`]: stagedb_model::Entity::boxed_clone

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod allocator;
mod error;
mod memory;
mod repository;

pub use allocator::SequentialIdAllocator;
pub use error::{RepositoryError, RepositoryResult};
pub use memory::{EntityLoader, InMemoryRepository, MemoryRepositoryBuilder};
pub use repository::Repository;
