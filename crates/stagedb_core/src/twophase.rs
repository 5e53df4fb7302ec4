//! Two-phase commit hooks and a minimal coordinator.

use tracing::{debug, warn};

use crate::error::CoreResult;
use crate::session::SharedSession;

/// Hook points an external transaction coordinator drives.
///
/// Phase one is [`prepare`] then [`vote`]; phase two is [`commit`]
/// then [`finish`]. [`abort`] may be called instead of phase two when
/// phase one fails anywhere. Participants are ordered by [`sort_key`]
/// so multi-participant transactions replay deterministically.
///
/// [`prepare`]: TransactionParticipant::prepare
/// [`vote`]: TransactionParticipant::vote
/// [`commit`]: TransactionParticipant::commit
/// [`finish`]: TransactionParticipant::finish
/// [`abort`]: TransactionParticipant::abort
/// [`sort_key`]: TransactionParticipant::sort_key
pub trait TransactionParticipant {
    /// Abandons pending work.
    ///
    /// # Errors
    ///
    /// Abort failures are reported but cannot stop an abort sweep.
    fn abort(&mut self) -> CoreResult<()>;

    /// Pushes buffered work down ahead of the vote.
    ///
    /// # Errors
    ///
    /// A failure here vetoes the transaction.
    fn prepare(&mut self) -> CoreResult<()>;

    /// Casts this participant's vote on the prepared work.
    ///
    /// # Errors
    ///
    /// A failure here vetoes the transaction.
    fn vote(&mut self) -> CoreResult<()>;

    /// Applies the prepared work.
    ///
    /// # Errors
    ///
    /// Failures propagate to the coordinator's caller; earlier
    /// participants stay committed.
    fn commit(&mut self) -> CoreResult<()>;

    /// Releases resources after a successful commit.
    ///
    /// # Errors
    ///
    /// Failures propagate to the coordinator's caller.
    fn finish(&mut self) -> CoreResult<()>;

    /// Deterministic ordering key, stable for this participant's
    /// lifetime.
    fn sort_key(&self) -> String;
}

/// Adapts a [`Session`] to the participant hooks.
///
/// Single-resource participant: prepare flushes, the vote always
/// passes, commit and abort delegate to the session.
///
/// [`Session`]: crate::session::Session
pub struct SessionParticipant {
    session: SharedSession,
}

impl SessionParticipant {
    /// Wraps a session for enlistment.
    #[must_use]
    pub fn new(session: SharedSession) -> Self {
        Self { session }
    }

    /// Returns the wrapped session.
    #[must_use]
    pub fn session(&self) -> &SharedSession {
        &self.session
    }
}

impl TransactionParticipant for SessionParticipant {
    fn abort(&mut self) -> CoreResult<()> {
        self.session.borrow_mut().rollback();
        Ok(())
    }

    fn prepare(&mut self) -> CoreResult<()> {
        self.session.borrow_mut().flush();
        Ok(())
    }

    fn vote(&mut self) -> CoreResult<()> {
        Ok(())
    }

    fn commit(&mut self) -> CoreResult<()> {
        self.session.borrow_mut().commit()
    }

    fn finish(&mut self) -> CoreResult<()> {
        Ok(())
    }

    fn sort_key(&self) -> String {
        // zero padding keeps string order equal to serial order
        format!("stagedb:{:020}", self.session.borrow().serial())
    }
}

/// Drives enlisted participants through both commit phases.
#[derive(Default)]
pub struct TwoPhaseCoordinator {
    participants: Vec<Box<dyn TransactionParticipant>>,
}

impl TwoPhaseCoordinator {
    /// Creates a coordinator with no participants.
    #[must_use]
    pub fn new() -> Self {
        Self {
            participants: Vec::new(),
        }
    }

    /// Enlists a participant for the next [`run`].
    ///
    /// [`run`]: TwoPhaseCoordinator::run
    pub fn enlist(&mut self, participant: Box<dyn TransactionParticipant>) {
        self.participants.push(participant);
    }

    /// Returns the number of enlisted participants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    /// Returns whether no participant is enlisted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Runs both phases over every participant in sort-key order.
    ///
    /// Phase one runs `prepare` on everyone, then `vote` on everyone.
    /// Any phase-one failure triggers [`abort_all`] and propagates.
    /// Phase two runs `commit` on everyone, then `finish` on everyone;
    /// a phase-two failure propagates with earlier participants
    /// already committed, mirroring the unit of work's own partial
    /// commit semantics.
    ///
    /// # Errors
    ///
    /// The first participant failure, after any abort sweep.
    ///
    /// [`abort_all`]: TwoPhaseCoordinator::abort_all
    pub fn run(&mut self) -> CoreResult<()> {
        self.participants
            .sort_by_key(|participant| participant.sort_key());
        debug!(
            participants = self.participants.len(),
            "starting two-phase commit"
        );
        if let Err(err) = self.phase_one() {
            self.abort_all();
            return Err(err);
        }
        self.phase_two()
    }

    /// Aborts every participant, best effort.
    pub fn abort_all(&mut self) {
        for participant in &mut self.participants {
            if let Err(err) = participant.abort() {
                warn!(%err, "participant abort failed");
            }
        }
    }

    fn phase_one(&mut self) -> CoreResult<()> {
        for participant in &mut self.participants {
            participant.prepare()?;
        }
        for participant in &mut self.participants {
            participant.vote()?;
        }
        Ok(())
    }

    fn phase_two(&mut self) -> CoreResult<()> {
        for participant in &mut self.participants {
            participant.commit()?;
        }
        for participant in &mut self.participants {
            participant.finish()?;
        }
        Ok(())
    }
}
