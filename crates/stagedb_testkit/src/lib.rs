//! # StageDB Testkit
//!
//! Test utilities for StageDB.
//!
//! This crate provides:
//! - A sample entity type and session/repository fixtures
//! - Property-based generators using proptest
//! - Tracing setup for test binaries
//!
//! ## Usage
//!
//! ```rust
//! use stagedb_testkit::prelude::*;
//!
//! let mut bed = TestBed::with_people(&[("ada", "Ada", 36)]);
//! let ada = bed.session.get_by_slug(PEOPLE, "ada").unwrap().unwrap();
//! assert_eq!(ada.read_as::<Person>().unwrap().name(), "Ada");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod logging;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::logging::*;
}

pub use fixtures::*;
pub use generators::*;
pub use logging::*;
