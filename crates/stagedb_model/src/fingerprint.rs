//! Field-stream fingerprinting for dirty detection.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::entity::Entity;

/// Separator between a field name and its value in the hash stream.
const UNIT_SEP: u8 = 0x1f;
/// Separator between consecutive fields in the hash stream.
const RECORD_SEP: u8 = 0x1e;

/// Digest over an entity's public fields.
///
/// Two fingerprints of the same entity are equal exactly when every
/// field fed by [`Entity::fingerprint`] rendered identically. The
/// engine compares the fingerprint taken at the last clean point
/// against a fresh one to detect modifications without explicit
/// dirty marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Computes the fingerprint of an entity.
    #[must_use]
    pub fn of(entity: &dyn Entity) -> Self {
        let mut hasher = Fingerprinter::new();
        entity.fingerprint(&mut hasher);
        hasher.finish()
    }

    /// Returns the raw digest bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fp:")?;
        for byte in &self.0[..8] {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Incremental hasher entities feed their fields into.
///
/// Fields must be fed in a fixed order; each entity type picks one
/// (declaration order by convention) and sticks to it. Names and
/// values are framed with separator bytes so adjacent fields cannot
/// alias each other.
pub struct Fingerprinter {
    hasher: Sha256,
}

impl Fingerprinter {
    /// Creates an empty fingerprinter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            hasher: Sha256::new(),
        }
    }

    /// Feeds one named field value.
    pub fn field<V: fmt::Display>(&mut self, name: &str, value: V) {
        self.hasher.update(name.as_bytes());
        self.hasher.update([UNIT_SEP]);
        self.hasher.update(value.to_string().as_bytes());
        self.hasher.update([RECORD_SEP]);
    }

    /// Feeds one optional named field value.
    ///
    /// Presence is part of the digest, so `None` and a value that
    /// renders empty hash differently.
    pub fn opt_field<V: fmt::Display>(&mut self, name: &str, value: Option<V>) {
        match value {
            Some(value) => {
                self.hasher.update(name.as_bytes());
                self.hasher.update([UNIT_SEP, 1]);
                self.hasher.update(value.to_string().as_bytes());
                self.hasher.update([RECORD_SEP]);
            }
            None => {
                self.hasher.update(name.as_bytes());
                self.hasher.update([UNIT_SEP, 0, RECORD_SEP]);
            }
        }
    }

    /// Feeds one named field as raw bytes.
    pub fn field_bytes(&mut self, name: &str, value: &[u8]) {
        self.hasher.update(name.as_bytes());
        self.hasher.update([UNIT_SEP]);
        self.hasher.update(value);
        self.hasher.update([RECORD_SEP]);
    }

    /// Finalizes the digest.
    #[must_use]
    pub fn finish(self) -> Fingerprint {
        Fingerprint(self.hasher.finalize().into())
    }
}

impl Default for Fingerprinter {
    fn default() -> Self {
        Self::new()
    }
}
