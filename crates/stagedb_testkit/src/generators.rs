//! Property-based generators for engine types.

use proptest::prelude::*;
use stagedb_core::{EntityClass, EntityId, EntityState};

use crate::fixtures::Person;

/// Strategy over entity ids.
pub fn entity_id_strategy() -> impl Strategy<Value = EntityId> {
    any::<u64>().prop_map(EntityId::new)
}

/// Strategy over entity classes drawn from a small pool.
///
/// The narrow pool makes generated cases land on the same class often
/// enough to exercise per-class grouping.
pub fn entity_class_strategy() -> impl Strategy<Value = EntityClass> {
    (1u32..=8).prop_map(EntityClass::new)
}

/// Strategy over lifecycle states.
pub fn entity_state_strategy() -> impl Strategy<Value = EntityState> {
    prop_oneof![
        Just(EntityState::New),
        Just(EntityState::Clean),
        Just(EntityState::Dirty),
        Just(EntityState::Deleted),
    ]
}

/// Strategy over well-formed slugs.
pub fn slug_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9-]{0,14}").expect("slug regex")
}

/// Strategy over unidentified [`Person`] entities.
pub fn person_strategy() -> impl Strategy<Value = Person> {
    ("[A-Z][a-z]{1,11}", 1u32..120).prop_map(|(name, age)| Person::new(&name, age))
}
