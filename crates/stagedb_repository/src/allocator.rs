//! Sequential per-class id allocation.

use std::collections::HashMap;

use parking_lot::Mutex;
use stagedb_model::{EntityClass, EntityId};

/// Issues sequential entity ids, partitioned by class.
///
/// Each class counts independently from the configured base (zero by
/// default). Issued ids are strictly increasing per class and never
/// reused; `advance` can raise the floor but nothing rewinds it. All
/// operations synchronize on an internal mutex, so concurrent callers
/// always see pairwise-distinct ids from [`next`].
///
/// [`next`]: SequentialIdAllocator::next
pub struct SequentialIdAllocator {
    base: u64,
    next: Mutex<HashMap<EntityClass, u64>>,
}

impl SequentialIdAllocator {
    /// Creates an allocator that counts from zero.
    #[must_use]
    pub fn new() -> Self {
        Self::with_base(0)
    }

    /// Creates an allocator that counts from `base` for every class.
    #[must_use]
    pub fn with_base(base: u64) -> Self {
        Self {
            base,
            next: Mutex::new(HashMap::new()),
        }
    }

    /// Issues the next id for `class`.
    pub fn next(&self, class: EntityClass) -> EntityId {
        let mut next = self.next.lock();
        let slot = next.entry(class).or_insert(self.base);
        let id = EntityId::new(*slot);
        *slot += 1;
        id
    }

    /// Returns the id that the next [`next`] call would issue.
    ///
    /// [`next`]: SequentialIdAllocator::next
    #[must_use]
    pub fn current(&self, class: EntityClass) -> EntityId {
        let next = self.next.lock();
        EntityId::new(next.get(&class).copied().unwrap_or(self.base))
    }

    /// Raises the next id for `class` to at least `at_least`.
    ///
    /// A value at or below the current position is a no-op; the
    /// allocator never goes backwards.
    pub fn advance(&self, class: EntityClass, at_least: EntityId) {
        let mut next = self.next.lock();
        let slot = next.entry(class).or_insert(self.base);
        if at_least.as_u64() > *slot {
            *slot = at_least.as_u64();
        }
    }
}

impl Default for SequentialIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
