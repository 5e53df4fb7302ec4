//! Entity lifecycle states and per-entity tracking.

use std::fmt;

use stagedb_model::{Entity, Fingerprint};

use crate::error::{CoreError, CoreResult};

/// Lifecycle state of a tracked entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityState {
    /// Created this session and not yet persisted.
    New,
    /// Matches the persisted snapshot.
    Clean,
    /// Modified since the last clean point.
    Dirty,
    /// Scheduled for removal at the next commit.
    Deleted,
}

impl EntityState {
    /// Returns whether the transition table allows `self -> target`.
    ///
    /// The legal transitions are NEW -> DIRTY, NEW -> DELETED,
    /// CLEAN -> DIRTY, CLEAN -> DELETED, DIRTY -> CLEAN, and
    /// DIRTY -> DELETED. Everything else, identity included, is
    /// rejected.
    #[must_use]
    pub fn can_transition_to(self, target: EntityState) -> bool {
        use EntityState::{Clean, Deleted, Dirty, New};
        matches!(
            (self, target),
            (New, Dirty)
                | (New, Deleted)
                | (Clean, Dirty)
                | (Clean, Deleted)
                | (Dirty, Clean)
                | (Dirty, Deleted)
        )
    }
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::New => "NEW",
            Self::Clean => "CLEAN",
            Self::Dirty => "DIRTY",
            Self::Deleted => "DELETED",
        })
    }
}

/// Records one entity's state and the fingerprint of its last clean
/// point.
///
/// The recorded state is what the engine was told; the observed state
/// is what readers get. They differ in exactly one case: a recorded
/// CLEAN whose entity no longer matches the clean-point fingerprint
/// is observed DIRTY. Explicit transitions validate against the
/// observed state, so silent field edits take part in the legality
/// check.
#[derive(Debug, Clone)]
pub struct StateTracker {
    recorded: EntityState,
    baseline: Fingerprint,
}

impl StateTracker {
    /// Attaches tracking to an entity.
    ///
    /// Only NEW and CLEAN are legal starting points; every other
    /// state is reached by transition. The entity's current
    /// fingerprint becomes the clean point.
    pub fn new(entity: &dyn Entity, initial: EntityState) -> CoreResult<Self> {
        if !matches!(initial, EntityState::New | EntityState::Clean) {
            return Err(CoreError::invalid_initial_state(initial));
        }
        Ok(Self {
            recorded: initial,
            baseline: Fingerprint::of(entity),
        })
    }

    /// Returns the recorded state, without dirty checking.
    #[must_use]
    pub fn recorded_state(&self) -> EntityState {
        self.recorded
    }

    /// Returns the observed state.
    ///
    /// A recorded CLEAN is checked against the clean-point
    /// fingerprint and reported DIRTY on mismatch. No stored state
    /// changes; this is a read-time computation.
    #[must_use]
    pub fn observed_state(&self, entity: &dyn Entity) -> EntityState {
        if self.recorded == EntityState::Clean && Fingerprint::of(entity) != self.baseline {
            EntityState::Dirty
        } else {
            self.recorded
        }
    }

    /// Transitions to `target`, validating against the observed state.
    ///
    /// Marking CLEAN does not move the clean point. An entity whose
    /// fields still differ from the baseline is observed DIRTY again
    /// immediately; only [`reset`] re-baselines.
    ///
    /// [`reset`]: StateTracker::reset
    pub fn set_state(&mut self, entity: &dyn Entity, target: EntityState) -> CoreResult<()> {
        let from = self.observed_state(entity);
        if !from.can_transition_to(target) {
            return Err(CoreError::invalid_transition(from, target));
        }
        self.recorded = target;
        Ok(())
    }

    /// Records CLEAN and captures a fresh clean point.
    ///
    /// Commit-only: bypasses the transition table.
    pub fn reset(&mut self, entity: &dyn Entity) {
        self.recorded = EntityState::Clean;
        self.baseline = Fingerprint::of(entity);
    }
}
