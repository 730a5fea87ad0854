//! Raffle State Machine
//!
//! ```text
//! NOT_STARTED ──> REGISTRATION_OPEN ──> SIMULATING ──> COMPLETED
//!                        ^                  │
//!                        └──── rollback ────┘   (only before commit)
//! ```
//!
//! The check is pure: the store performs the actual compare-and-swap.

use chrono::{DateTime, Utc};

use raffle_core::{Event, RaffleStatus, StateError};

/// Facts a transition may depend on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionGuard {
    pub now: DateTime<Utc>,
    pub registration_end_date: Option<DateTime<Utc>>,
    pub raffle_enabled: bool,
    /// Outcome write-back has committed
    pub resolution_committed: bool,
}

impl TransitionGuard {
    pub fn for_event(event: &Event, now: DateTime<Utc>) -> Self {
        Self {
            now,
            registration_end_date: event.registration_end_date,
            raffle_enabled: event.raffle_enabled,
            resolution_committed: false,
        }
    }

    pub fn with_committed(mut self, committed: bool) -> Self {
        self.resolution_committed = committed;
        self
    }

    fn registration_closed(&self) -> bool {
        self.registration_end_date.is_some_and(|end| end <= self.now)
    }
}

/// Lifecycle rules
pub struct RaffleStateMachine;

impl RaffleStateMachine {
    /// Is `from -> to` legal under `guard`?
    pub fn check(
        from: RaffleStatus,
        to: RaffleStatus,
        guard: &TransitionGuard,
    ) -> Result<(), StateError> {
        use RaffleStatus::*;

        match (from, to) {
            (NotStarted, RegistrationOpen) => Ok(()),
            (RegistrationOpen, RegistrationOpen) => Err(StateError::AlreadyOpened),

            (RegistrationOpen, Simulating) => {
                if !guard.registration_closed() {
                    Err(StateError::RegistrationStillOpen {
                        ends_at: guard.registration_end_date,
                    })
                } else if !guard.raffle_enabled {
                    Err(StateError::RaffleDisabled)
                } else {
                    Ok(())
                }
            }

            (Simulating, Completed) if guard.resolution_committed => Ok(()),
            (Simulating, Completed) => Err(StateError::ResolutionIncomplete),

            (Simulating, RegistrationOpen) if !guard.resolution_committed => Ok(()),

            _ => Err(StateError::IllegalTransition(from, to)),
        }
    }

    /// Is `from -> to` allowed as a bare status swap?
    ///
    /// Entering, completing and rolling back a run go through the store's run
    /// operations instead.
    pub fn check_swap(from: RaffleStatus, to: RaffleStatus) -> Result<(), StateError> {
        use RaffleStatus::*;

        match (from, to) {
            (NotStarted, RegistrationOpen) => Ok(()),
            (RegistrationOpen, RegistrationOpen) => Err(StateError::AlreadyOpened),
            (Simulating, Completed) => Err(StateError::ResolutionIncomplete),
            _ => Err(StateError::IllegalTransition(from, to)),
        }
    }

    /// Statuses reachable from `from` when every guard passes
    pub fn successors(from: RaffleStatus) -> &'static [RaffleStatus] {
        use RaffleStatus::*;

        match from {
            NotStarted => &[RegistrationOpen],
            RegistrationOpen => &[Simulating],
            Simulating => &[Completed, RegistrationOpen],
            Completed => &[],
        }
    }
}
