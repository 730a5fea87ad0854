//! Batch scheduling
//!
//! Runs every due event in parallel. Different events never share state, and
//! a second run of the same event is excluded by the status CAS.

use chrono::{DateTime, Utc};
use rayon::prelude::*;

use raffle_core::{Event, EventId, OperatorId, PersistenceError, RaffleResult, RaffleStatus};

use crate::engine::{RaffleEngine, RunReport};

/// Is the event ready to be drawn at `now`?
///
/// Raffle enabled, registration open but past its end date, and inside the
/// scheduling window (`raffle_start_time <= now < raffle_end_time`, either
/// bound optional).
pub fn is_due(event: &Event, now: DateTime<Utc>) -> bool {
    event.raffle_enabled
        && event.raffle_status == RaffleStatus::RegistrationOpen
        && event.registration_closed(now)
        && event.raffle_start_time.is_none_or(|start| start <= now)
        && event.raffle_end_time.is_none_or(|end| now < end)
}

/// Events due at `now`, by id
pub fn due_events<'a>(
    events: impl IntoIterator<Item = &'a Event>,
    now: DateTime<Utc>,
) -> Vec<EventId> {
    let mut due: Vec<EventId> = events
        .into_iter()
        .filter(|e| is_due(e, now))
        .map(|e| e.id.clone())
        .collect();
    due.sort();
    due
}

impl RaffleEngine {
    /// Ids of stored events due now
    pub fn due_events(&self) -> Result<Vec<EventId>, PersistenceError> {
        let ids = self.store().events()?;

        let mut events = Vec::with_capacity(ids.len());
        for id in &ids {
            match self.store().event(id) {
                Ok(event) => events.push(event),
                Err(e) => log::warn!("Skipping {id} while scheduling: {e}"),
            }
        }
        Ok(due_events(&events, self.clock().now()))
    }

    /// Run every due event in parallel, one result per event
    pub fn run_due(
        &self,
        operator: &OperatorId,
    ) -> Result<Vec<(EventId, RaffleResult<RunReport>)>, PersistenceError> {
        let due = self.due_events()?;
        if due.is_empty() {
            log::debug!("No raffles due");
            return Ok(Vec::new());
        }
        log::info!("Running {} due raffle(s)", due.len());

        Ok(due
            .into_par_iter()
            .map(|id| {
                let result = self.run(&id, operator, None);
                (id, result)
            })
            .collect())
    }
}
