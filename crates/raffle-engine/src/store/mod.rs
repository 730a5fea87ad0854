//! Raffle persistence
//!
//! The store owns the only real lock a raffle run has: a compare-and-swap on
//! the persisted `raffle_status`. Acquiring a run swaps
//! `REGISTRATION_OPEN -> SIMULATING`, appends the simulation record and marks
//! it active in one step; committing applies every signup update, seals the
//! record and swaps `SIMULATING -> COMPLETED` in one step. Anything between
//! those two calls can fail and be rolled back with [`RaffleStore::release_run`].

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use raffle_core::{
    Event, EventData, EventId, PersistenceError, PhysicsState, RaffleSimulation, RaffleStatus,
    Signup, SignupId, SignupStatus, SignupUpdate, SimulationId,
};

use crate::state::RaffleStateMachine;

/// Everything a successful run writes back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunCommit {
    pub simulation_id: SimulationId,
    pub physics_state: PhysicsState,
    pub end_time: DateTime<Utc>,
    pub updates: Vec<SignupUpdate>,
}

/// Persistent raffle state
pub trait RaffleStore: Send + Sync {
    /// Event row only
    fn event(&self, event_id: &EventId) -> Result<Event, PersistenceError>;

    /// All known event ids, ascending
    fn events(&self) -> Result<Vec<EventId>, PersistenceError>;

    /// Event with its quotas and signups, read consistently
    fn event_data(&self, event_id: &EventId) -> Result<EventData, PersistenceError>;

    /// Compare-and-swap on `raffle_status` for transitions that carry no run
    /// bookkeeping. Anything else fails with [`PersistenceError::Lifecycle`].
    fn swap_status(
        &self,
        event_id: &EventId,
        expected: RaffleStatus,
        new: RaffleStatus,
    ) -> Result<(), PersistenceError>;

    /// Swap `REGISTRATION_OPEN -> SIMULATING`, append `record` and mark it
    /// active. Returns the event data as it was read just before the swap.
    fn acquire_run(
        &self,
        event_id: &EventId,
        record: RaffleSimulation,
    ) -> Result<EventData, PersistenceError>;

    /// Apply `commit` all-or-nothing and swap `SIMULATING -> COMPLETED`
    fn commit_run(&self, event_id: &EventId, commit: RunCommit) -> Result<(), PersistenceError>;

    /// Swap `SIMULATING -> REGISTRATION_OPEN` and clear the active run.
    /// With `Some(id)` the release only succeeds while `id` is the active run.
    fn release_run(
        &self,
        event_id: &EventId,
        simulation_id: Option<SimulationId>,
    ) -> Result<(), PersistenceError>;

    /// Simulation records of an event, oldest first
    fn simulations(&self, event_id: &EventId) -> Result<Vec<RaffleSimulation>, PersistenceError>;
}

/// Persisted per-event state shared by both stores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct EventRecord {
    pub data: EventData,
    #[serde(default)]
    pub simulations: Vec<RaffleSimulation>,
    #[serde(default)]
    pub active_run: Option<SimulationId>,
}

impl EventRecord {
    pub fn new(data: EventData) -> Self {
        Self {
            data,
            simulations: Vec::new(),
            active_run: None,
        }
    }

    fn id(&self) -> &EventId {
        &self.data.event.id
    }

    fn expect_status(&self, expected: RaffleStatus) -> Result<(), PersistenceError> {
        let actual = self.data.event.raffle_status;
        if actual != expected {
            return Err(PersistenceError::StatusConflict {
                event_id: self.id().clone(),
                expected,
                actual,
            });
        }
        Ok(())
    }

    fn refuse_while_simulating(&self) -> Result<(), PersistenceError> {
        let actual = self.data.event.raffle_status;
        if actual == RaffleStatus::Simulating {
            return Err(PersistenceError::StatusConflict {
                event_id: self.id().clone(),
                expected: RaffleStatus::RegistrationOpen,
                actual,
            });
        }
        Ok(())
    }

    /// Replace quotas and signups. The persisted lifecycle status is kept.
    pub fn replace_data(&mut self, mut data: EventData) -> Result<(), PersistenceError> {
        self.refuse_while_simulating()?;
        data.event.raffle_status = self.data.event.raffle_status;
        self.data = data;
        Ok(())
    }

    pub fn add_signup(&mut self, signup: Signup) -> Result<(), PersistenceError> {
        self.refuse_while_simulating()?;
        self.data.signups.push(signup);
        Ok(())
    }

    pub fn swap_status(
        &mut self,
        expected: RaffleStatus,
        new: RaffleStatus,
    ) -> Result<(), PersistenceError> {
        self.expect_status(expected)?;
        RaffleStateMachine::check_swap(expected, new).map_err(|source| {
            PersistenceError::Lifecycle {
                event_id: self.id().clone(),
                source,
            }
        })?;
        self.data.event.raffle_status = new;
        Ok(())
    }

    pub fn acquire(&mut self, record: RaffleSimulation) -> Result<EventData, PersistenceError> {
        self.expect_status(RaffleStatus::RegistrationOpen)?;
        let observed = self.data.clone();
        self.data.event.raffle_status = RaffleStatus::Simulating;
        self.active_run = Some(record.id);
        self.simulations.push(record);
        Ok(observed)
    }

    /// Validate the whole commit first, then apply it
    pub fn commit(&mut self, commit: RunCommit) -> Result<(), PersistenceError> {
        self.expect_status(RaffleStatus::Simulating)?;
        if self.active_run != Some(commit.simulation_id) {
            return Err(PersistenceError::StaleRun {
                event_id: self.id().clone(),
                simulation_id: commit.simulation_id,
            });
        }

        let record_index = self
            .simulations
            .iter()
            .position(|s| s.id == commit.simulation_id)
            .ok_or(PersistenceError::SimulationNotFound(commit.simulation_id))?;
        if self.simulations[record_index].is_sealed() {
            return Err(PersistenceError::RecordSealed(commit.simulation_id));
        }

        let targets = {
            let index: HashMap<&SignupId, usize> = self
                .data
                .signups
                .iter()
                .enumerate()
                .map(|(i, s)| (&s.id, i))
                .collect();
            let mut targets = Vec::with_capacity(commit.updates.len());
            for update in &commit.updates {
                let i = *index.get(&update.signup_id).ok_or_else(|| {
                    PersistenceError::SignupNotFound {
                        event_id: self.id().clone(),
                        signup_id: update.signup_id.clone(),
                    }
                })?;
                let status = self.data.signups[i].status;
                if status != SignupStatus::Pending {
                    return Err(PersistenceError::SignupNotPending {
                        event_id: self.id().clone(),
                        signup_id: update.signup_id.clone(),
                        status,
                    });
                }
                targets.push(i);
            }
            targets
        };

        for (index, update) in targets.into_iter().zip(&commit.updates) {
            self.data.signups[index].apply(update);
        }

        let record = &mut self.simulations[record_index];
        record.end_time = Some(commit.end_time);
        record.physics_state = Some(commit.physics_state);

        self.active_run = None;
        self.data.event.raffle_status = RaffleStatus::Completed;
        Ok(())
    }

    pub fn release(&mut self, simulation_id: Option<SimulationId>) -> Result<(), PersistenceError> {
        self.expect_status(RaffleStatus::Simulating)?;
        match simulation_id {
            Some(id) if self.active_run != Some(id) => {
                return Err(PersistenceError::StaleRun {
                    event_id: self.id().clone(),
                    simulation_id: id,
                });
            }
            _ => {}
        }
        self.active_run = None;
        self.data.event.raffle_status = RaffleStatus::RegistrationOpen;
        Ok(())
    }
}
