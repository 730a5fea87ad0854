//! In-process store

use std::collections::BTreeMap;

use parking_lot::RwLock;

use raffle_core::{
    Event, EventData, EventId, PersistenceError, QuotaId, RaffleSimulation, RaffleStatus, Signup,
    SimulationId,
};

use super::{EventRecord, RaffleStore, RunCommit};

/// Store backed by a map under one `RwLock`
#[derive(Default)]
pub struct MemoryStore {
    events: RwLock<BTreeMap<EventId, EventRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an event with its quotas and signups, or replace the data of
    /// an existing one. Replacing keeps the persisted `raffle_status` and is
    /// refused while a run holds the event.
    pub fn insert_event(&self, data: EventData) -> Result<(), PersistenceError> {
        let mut events = self.events.write();
        let id = data.event.id.clone();
        match events.get_mut(&id) {
            Some(existing) => existing.replace_data(data)?,
            None => {
                events.insert(id, EventRecord::new(data));
            }
        }
        Ok(())
    }

    /// Add one signup to an existing event
    pub fn add_signup(&self, signup: Signup) -> Result<(), PersistenceError> {
        let event_id = signup.event_id.clone();
        self.write(&event_id, |r| r.add_signup(signup))
    }

    /// Does the event exist and own `quota_id`?
    pub fn has_quota(&self, event_id: &EventId, quota_id: &QuotaId) -> bool {
        self.read(event_id, |r| r.data.quota(quota_id).is_some())
            .unwrap_or(false)
    }

    fn read<T>(
        &self,
        event_id: &EventId,
        f: impl FnOnce(&EventRecord) -> T,
    ) -> Result<T, PersistenceError> {
        let events = self.events.read();
        let record = events
            .get(event_id)
            .ok_or_else(|| PersistenceError::EventNotFound(event_id.clone()))?;
        Ok(f(record))
    }

    fn write<T>(
        &self,
        event_id: &EventId,
        f: impl FnOnce(&mut EventRecord) -> Result<T, PersistenceError>,
    ) -> Result<T, PersistenceError> {
        let mut events = self.events.write();
        let record = events
            .get_mut(event_id)
            .ok_or_else(|| PersistenceError::EventNotFound(event_id.clone()))?;
        f(record)
    }
}

impl RaffleStore for MemoryStore {
    fn event(&self, event_id: &EventId) -> Result<Event, PersistenceError> {
        self.read(event_id, |r| r.data.event.clone())
    }

    fn events(&self) -> Result<Vec<EventId>, PersistenceError> {
        Ok(self.events.read().keys().cloned().collect())
    }

    fn event_data(&self, event_id: &EventId) -> Result<EventData, PersistenceError> {
        self.read(event_id, |r| r.data.clone())
    }

    fn swap_status(
        &self,
        event_id: &EventId,
        expected: RaffleStatus,
        new: RaffleStatus,
    ) -> Result<(), PersistenceError> {
        self.write(event_id, |r| r.swap_status(expected, new))
    }

    fn acquire_run(
        &self,
        event_id: &EventId,
        record: RaffleSimulation,
    ) -> Result<EventData, PersistenceError> {
        self.write(event_id, |r| r.acquire(record))
    }

    fn commit_run(&self, event_id: &EventId, commit: RunCommit) -> Result<(), PersistenceError> {
        self.write(event_id, |r| r.commit(commit))
    }

    fn release_run(
        &self,
        event_id: &EventId,
        simulation_id: Option<SimulationId>,
    ) -> Result<(), PersistenceError> {
        self.write(event_id, |r| r.release(simulation_id))
    }

    fn simulations(&self, event_id: &EventId) -> Result<Vec<RaffleSimulation>, PersistenceError> {
        self.read(event_id, |r| r.simulations.clone())
    }
}
