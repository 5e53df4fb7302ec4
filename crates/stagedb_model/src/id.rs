//! Identifier newtypes for StageDB.

use std::fmt;

/// Unique identifier for an entity within its class.
///
/// Entity IDs are sequential per class, starting at zero, and never
/// reused within one repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(pub u64);

impl EntityId {
    /// Creates a new entity ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next entity ID in sequence.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ent:{}", self.0)
    }
}

/// Identifier for an entity class (the kind of record).
///
/// Class IDs are stable application-defined constants; id allocation,
/// caching, and commit dispatch are all partitioned by class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityClass(pub u32);

impl EntityClass {
    /// Creates a new entity class ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw class value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for EntityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "class:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_ordering() {
        let a = EntityId::new(1);
        let b = EntityId::new(2);
        assert!(a < b);
    }

    #[test]
    fn entity_id_next() {
        let id = EntityId::new(5);
        assert_eq!(id.next().as_u64(), 6);
    }

    #[test]
    fn entity_id_display() {
        assert_eq!(format!("{}", EntityId::new(7)), "ent:7");
    }

    #[test]
    fn entity_class_display() {
        assert_eq!(format!("{}", EntityClass::new(42)), "class:42");
    }
}
