//! # StageDB Core
//!
//! Session and unit-of-work engine over a [`Repository`].
//!
//! Callers work against a thread-scoped [`Session`]: entities enter
//! through `add` or come back from id/slug lookups, get mutated in
//! place through their handles, and reach the repository only when
//! the session commits. The [`UnitOfWork`] underneath tracks every
//! entity's lifecycle state and dispatches the whole batch under the
//! repository lock.
//!
//! ## Design Principles
//!
//! - Sessions are thread-scoped; cross-thread contention is confined
//!   to the shared repository and its id allocator
//! - Observed state is fingerprint-based, so silent field edits
//!   surface as DIRTY without explicit marks
//! - The unit of work's live set owns entities; lookup caches hold
//!   weak references and never keep a dead entity alive
//! - Commit order is deterministic: classes ascending, registration
//!   order within a class
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use stagedb_core::{EntityClass, Session};
//! use stagedb_repository::InMemoryRepository;
//! # use std::any::Any;
//! # use stagedb_core::{Entity, EntityId, Fingerprinter};
//! # #[derive(Clone)]
//! # struct Note { id: Option<EntityId>, text: String }
//! # impl Entity for Note {
//! #     fn id(&self) -> Option<EntityId> { self.id }
//! #     fn assign_id(&mut self, id: EntityId) { self.id = Some(id); }
//! #     fn slug(&self) -> Option<&str> { None }
//! #     fn fingerprint(&self, hasher: &mut Fingerprinter) { hasher.field("text", &self.text); }
//! #     fn boxed_clone(&self) -> Box<dyn Entity> { Box::new(self.clone()) }
//! #     fn as_any(&self) -> &dyn Any { self }
//! #     fn as_any_mut(&mut self) -> &mut dyn Any { self }
//! # }
//!
//! const NOTES: EntityClass = EntityClass::new(1);
//!
//! let repository = Arc::new(InMemoryRepository::new());
//! let mut session = Session::new(repository.clone());
//!
//! let note = session.add(NOTES, Box::new(Note { id: None, text: "draft".into() }))?;
//! assert!(!repository.contains(NOTES, note.id().unwrap()));
//!
//! session.commit()?;
//! assert!(repository.contains(NOTES, note.id().unwrap()));
//! # Ok::<(), stagedb_core::CoreError>(())
//! ```
//!
//! [`Repository`]: stagedb_repository::Repository

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod error;
mod handle;
mod session;
mod state;
mod twophase;
mod unit_of_work;

#[cfg(test)]
mod test_support;

pub use cache::{CacheManager, EntityCache};
pub use error::{CoreError, CoreResult};
pub use handle::{EntityHandle, HandleId, WeakEntityHandle};
pub use session::{Session, SessionFactory, SharedSession};
pub use state::{EntityState, StateTracker};
pub use twophase::{SessionParticipant, TransactionParticipant, TwoPhaseCoordinator};
pub use unit_of_work::UnitOfWork;

pub use stagedb_model::{Entity, EntityClass, EntityId, Fingerprint, Fingerprinter};
