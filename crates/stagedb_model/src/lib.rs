//! # StageDB Model
//!
//! Entity contract for StageDB.
//!
//! This crate defines the surface the engine needs from application
//! objects and nothing more:
//!
//! - [`Entity`] - the trait application records implement
//! - [`EntityId`] / [`EntityClass`] - identifier newtypes
//! - [`Fingerprint`] / [`Fingerprinter`] - field-stream hashing used for
//!   dirty detection
//!
//! Entities stay opaque to the engine. The engine never inspects fields
//! directly; it reads the id and slug through the trait and compares
//! fingerprints to decide whether an object changed.
//!
//! ## Example
//!
//! ```rust
//! use std::any::Any;
//! use stagedb_model::{Entity, EntityId, Fingerprint, Fingerprinter};
//!
//! #[derive(Clone)]
//! struct Account {
//!     id: Option<EntityId>,
//!     name: String,
//! }
//!
//! impl Entity for Account {
//!     fn id(&self) -> Option<EntityId> {
//!         self.id
//!     }
//!     fn assign_id(&mut self, id: EntityId) {
//!         self.id = Some(id);
//!     }
//!     fn slug(&self) -> Option<&str> {
//!         None
//!     }
//!     fn fingerprint(&self, hasher: &mut Fingerprinter) {
//!         hasher.opt_field("id", self.id);
//!         hasher.field("name", &self.name);
//!     }
//!     fn boxed_clone(&self) -> Box<dyn Entity> {
//!         Box::new(self.clone())
//!     }
//!     fn as_any(&self) -> &dyn Any {
//!         self
//!     }
//!     fn as_any_mut(&mut self) -> &mut dyn Any {
//!         self
//!     }
//! }
//!
//! let mut account = Account { id: None, name: "ops".into() };
//! let before = Fingerprint::of(&account);
//! account.name = "finance".into();
//! assert_ne!(before, Fingerprint::of(&account));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod entity;
mod fingerprint;
mod id;

pub use entity::Entity;
pub use fingerprint::{Fingerprint, Fingerprinter};
pub use id::{EntityClass, EntityId};
