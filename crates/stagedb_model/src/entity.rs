//! The entity contract.

use std::any::Any;

use crate::fingerprint::Fingerprinter;
use crate::id::EntityId;

/// A record the engine can track, cache, and persist.
///
/// Application types implement this trait; the engine treats them as
/// opaque otherwise. Implementations must uphold two rules:
///
/// - `fingerprint` feeds the same fields in the same order on every
///   call, so unequal digests imply a real field change.
/// - `slug`, when the type has one, is stable once it becomes
///   available. It may be `None` early in the object's life (derived
///   slugs often need other fields first) and appear later.
pub trait Entity: Send + Sync {
    /// Returns the entity's id, if one has been assigned.
    fn id(&self) -> Option<EntityId>;

    /// Assigns the entity's id.
    ///
    /// Called once by the engine when an id-less entity is registered.
    fn assign_id(&mut self, id: EntityId);

    /// Returns the entity's slug, if available.
    ///
    /// Slugs are secondary lookup keys, unique within a class.
    fn slug(&self) -> Option<&str>;

    /// Feeds the entity's public fields to the fingerprint hasher.
    fn fingerprint(&self, hasher: &mut Fingerprinter);

    /// Clones the entity behind a fresh box.
    ///
    /// Repositories use this to take snapshots of committed state, so
    /// the clone must be deep enough that later mutation of the
    /// original does not show through.
    fn boxed_clone(&self) -> Box<dyn Entity>;

    /// Upcasts for concrete-type access.
    fn as_any(&self) -> &dyn Any;

    /// Upcasts for concrete-type mutation.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::Fingerprint;

    #[derive(Clone)]
    struct Sample {
        id: Option<EntityId>,
        slug: Option<String>,
        label: String,
    }

    impl Entity for Sample {
        fn id(&self) -> Option<EntityId> {
            self.id
        }
        fn assign_id(&mut self, id: EntityId) {
            self.id = Some(id);
        }
        fn slug(&self) -> Option<&str> {
            self.slug.as_deref()
        }
        fn fingerprint(&self, hasher: &mut Fingerprinter) {
            hasher.opt_field("id", self.id);
            hasher.opt_field("slug", self.slug.as_deref());
            hasher.field("label", &self.label);
        }
        fn boxed_clone(&self) -> Box<dyn Entity> {
            Box::new(self.clone())
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn sample() -> Sample {
        Sample {
            id: None,
            slug: None,
            label: "widget".into(),
        }
    }

    #[test]
    fn assign_id_sets_id() {
        let mut entity = sample();
        assert_eq!(entity.id(), None);
        entity.assign_id(EntityId::new(3));
        assert_eq!(entity.id(), Some(EntityId::new(3)));
    }

    #[test]
    fn fingerprint_tracks_field_changes() {
        let mut entity = sample();
        let clean = Fingerprint::of(&entity);
        entity.label = "gadget".into();
        assert_ne!(clean, Fingerprint::of(&entity));
        entity.label = "widget".into();
        assert_eq!(clean, Fingerprint::of(&entity));
    }

    #[test]
    fn fingerprint_sees_id_assignment() {
        let mut entity = sample();
        let unassigned = Fingerprint::of(&entity);
        entity.assign_id(EntityId::new(0));
        assert_ne!(unassigned, Fingerprint::of(&entity));
    }

    #[test]
    fn boxed_clone_is_independent() {
        let mut entity = sample();
        entity.assign_id(EntityId::new(1));
        let snapshot = entity.boxed_clone();
        entity.label = "gadget".into();
        let copy = snapshot.as_any().downcast_ref::<Sample>().unwrap();
        assert_eq!(copy.label, "widget");
        assert_eq!(snapshot.id(), Some(EntityId::new(1)));
    }

    #[test]
    fn downcast_mut_reaches_concrete_type() {
        let mut boxed: Box<dyn Entity> = Box::new(sample());
        boxed
            .as_any_mut()
            .downcast_mut::<Sample>()
            .unwrap()
            .label = "renamed".into();
        let copy = boxed.as_any().downcast_ref::<Sample>().unwrap();
        assert_eq!(copy.label, "renamed");
    }
}
