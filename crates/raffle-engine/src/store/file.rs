//! JSON file store
//!
//! ```text
//! <root>/events/<event_id>.json   { data, simulations, active_run }
//! <root>/events/<event_id>.lock   exclusive flock held for each mutation
//! ```
//!
//! Every mutation is read-modify-write of one document while holding the
//! event's lock file, so stores in different processes sharing one directory
//! still see a single compare-and-swap. The new document goes to a uniquely
//! named temp file, is synced, then renamed over the original. Simulation
//! records are appended and never removed.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tempfile::NamedTempFile;

use raffle_core::{
    Event, EventData, EventId, PersistenceError, RaffleSimulation, RaffleStatus, Signup,
    SimulationId,
};

use super::{EventRecord, RaffleStore, RunCommit};

const EVENTS_DIR: &str = "events";

/// Store keeping one JSON document per event
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `root`
    pub fn open(root: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(EVENTS_DIR))?;
        log::debug!("File store opened at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Insert an event with its quotas and signups, or replace the data of
    /// an existing one. Replacing keeps the persisted `raffle_status` and is
    /// refused while a run holds the event.
    pub fn insert_event(&self, data: EventData) -> Result<(), PersistenceError> {
        let event_id = data.event.id.clone();
        let path = self.path_for(&event_id)?;
        let _lock = self.lock_event(&event_id)?;
        let record = match self.load(&event_id)? {
            Some(mut existing) => {
                existing.replace_data(data)?;
                existing
            }
            None => EventRecord::new(data),
        };
        write_atomic(&path, &record)
    }

    /// Add one signup to an existing event
    pub fn add_signup(&self, signup: Signup) -> Result<(), PersistenceError> {
        let event_id = signup.event_id.clone();
        self.update(&event_id, |record| record.add_signup(signup))
    }

    fn path_for(&self, event_id: &EventId) -> Result<PathBuf, PersistenceError> {
        let id = event_id.as_str();
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !id.starts_with('.');
        if !valid {
            return Err(PersistenceError::Backend(format!(
                "event id {id:?} cannot be used as a file name"
            )));
        }
        Ok(self.root.join(EVENTS_DIR).join(format!("{id}.json")))
    }

    /// Block until this handle holds the event's lock file. Dropping the
    /// returned file releases the lock.
    fn lock_event(&self, event_id: &EventId) -> Result<File, PersistenceError> {
        let path = self.path_for(event_id)?.with_extension("lock");
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)?;
        FileExt::lock_exclusive(&file)?;
        Ok(file)
    }

    fn load(&self, event_id: &EventId) -> Result<Option<EventRecord>, PersistenceError> {
        let path = self.path_for(event_id)?;
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path)?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn load_existing(&self, event_id: &EventId) -> Result<EventRecord, PersistenceError> {
        self.load(event_id)?
            .ok_or_else(|| PersistenceError::EventNotFound(event_id.clone()))
    }

    /// Read-modify-write one document; nothing is written if `f` fails
    fn update<T>(
        &self,
        event_id: &EventId,
        f: impl FnOnce(&mut EventRecord) -> Result<T, PersistenceError>,
    ) -> Result<T, PersistenceError> {
        let _lock = self.lock_event(event_id)?;
        let mut record = self.load_existing(event_id)?;
        let out = f(&mut record)?;
        write_atomic(&self.path_for(event_id)?, &record)?;
        Ok(out)
    }
}

fn write_atomic(path: &Path, record: &EventRecord) -> Result<(), PersistenceError> {
    let dir = path
        .parent()
        .ok_or_else(|| PersistenceError::Backend(format!("{} has no parent", path.display())))?;
    let bytes = serde_json::to_vec_pretty(record)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| PersistenceError::Io(e.error))?;
    Ok(())
}

impl RaffleStore for FileStore {
    fn event(&self, event_id: &EventId) -> Result<Event, PersistenceError> {
        Ok(self.load_existing(event_id)?.data.event)
    }

    fn events(&self) -> Result<Vec<EventId>, PersistenceError> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(self.root.join(EVENTS_DIR))? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(EventId::new(stem));
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn event_data(&self, event_id: &EventId) -> Result<EventData, PersistenceError> {
        Ok(self.load_existing(event_id)?.data)
    }

    fn swap_status(
        &self,
        event_id: &EventId,
        expected: RaffleStatus,
        new: RaffleStatus,
    ) -> Result<(), PersistenceError> {
        self.update(event_id, |r| r.swap_status(expected, new))
    }

    fn acquire_run(
        &self,
        event_id: &EventId,
        record: RaffleSimulation,
    ) -> Result<EventData, PersistenceError> {
        self.update(event_id, |r| r.acquire(record))
    }

    fn commit_run(&self, event_id: &EventId, commit: RunCommit) -> Result<(), PersistenceError> {
        self.update(event_id, |r| r.commit(commit))
    }

    fn release_run(
        &self,
        event_id: &EventId,
        simulation_id: Option<SimulationId>,
    ) -> Result<(), PersistenceError> {
        self.update(event_id, |r| r.release(simulation_id))
    }

    fn simulations(&self, event_id: &EventId) -> Result<Vec<RaffleSimulation>, PersistenceError> {
        Ok(self.load_existing(event_id)?.simulations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;

    use chrono::{TimeZone, Utc};
    use raffle_core::{RngAlgorithm, StateError};

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let t = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let id = EventId::new("spring-gala");

        {
            let store = FileStore::open(dir.path()).unwrap();
            let mut event = Event::new("spring-gala");
            event.raffle_status = RaffleStatus::RegistrationOpen;
            store.insert_event(EventData::new(event)).unwrap();
            store
                .add_signup(Signup::pending("s1", "spring-gala", "a", t))
                .unwrap();
            store
                .acquire_run(
                    &id,
                    RaffleSimulation::started(id.clone(), "seed", RngAlgorithm::CURRENT, t),
                )
                .unwrap();
        }

        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.events().unwrap(), vec![id.clone()]);
        assert_eq!(store.event(&id).unwrap().raffle_status, RaffleStatus::Simulating);
        assert_eq!(store.simulations(&id).unwrap().len(), 1);
        assert_eq!(store.event_data(&id).unwrap().signups.len(), 1);
    }

    #[test]
    fn test_failed_update_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let id = EventId::new("e1");
        store.insert_event(EventData::new(Event::new("e1"))).unwrap();

        assert!(
            store
                .swap_status(&id, RaffleStatus::Completed, RaffleStatus::RegistrationOpen)
                .is_err()
        );
        assert_eq!(store.event(&id).unwrap().raffle_status, RaffleStatus::NotStarted);
    }

    #[test]
    fn test_separate_stores_share_one_run_lock() {
        let dir = tempfile::tempdir().unwrap();
        let t = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let stores = [
            Arc::new(FileStore::open(dir.path()).unwrap()),
            Arc::new(FileStore::open(dir.path()).unwrap()),
        ];

        for round in 0..50 {
            let id = EventId::new(format!("race-{round}"));
            let mut event = Event::new(id.as_str());
            event.raffle_status = RaffleStatus::RegistrationOpen;
            stores[0].insert_event(EventData::new(event)).unwrap();

            let barrier = Arc::new(Barrier::new(2));
            let handles: Vec<_> = stores
                .iter()
                .map(|store| {
                    let store = Arc::clone(store);
                    let barrier = Arc::clone(&barrier);
                    let id = id.clone();
                    thread::spawn(move || {
                        barrier.wait();
                        let record =
                            RaffleSimulation::started(id.clone(), "race", RngAlgorithm::CURRENT, t);
                        store.acquire_run(&id, record).is_ok()
                    })
                })
                .collect();
            let winners = handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|won| *won)
                .count();

            assert_eq!(winners, 1, "round {round}");
            assert_eq!(stores[1].simulations(&id).unwrap().len(), 1, "round {round}");
        }
    }

    #[test]
    fn test_reinsert_keeps_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let id = EventId::new("e1");
        store.insert_event(EventData::new(Event::new("e1"))).unwrap();
        store
            .swap_status(&id, RaffleStatus::NotStarted, RaffleStatus::RegistrationOpen)
            .unwrap();

        // A re-import cannot rewind the lifecycle
        store.insert_event(EventData::new(Event::new("e1"))).unwrap();
        assert_eq!(store.event(&id).unwrap().raffle_status, RaffleStatus::RegistrationOpen);

        assert!(matches!(
            store.swap_status(&id, RaffleStatus::RegistrationOpen, RaffleStatus::Completed),
            Err(PersistenceError::Lifecycle {
                source: StateError::IllegalTransition(..),
                ..
            })
        ));
    }

    #[test]
    fn test_writes_leave_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.insert_event(EventData::new(Event::new("e1"))).unwrap();
        store.insert_event(EventData::new(Event::new("e1"))).unwrap();

        let mut names: Vec<String> = fs::read_dir(dir.path().join(EVENTS_DIR))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["e1.json", "e1.lock"]);
    }

    #[test]
    fn test_rejects_path_like_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.event(&EventId::new("../escape")),
            Err(PersistenceError::Backend(_))
        ));
    }
}
