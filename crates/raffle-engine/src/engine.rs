//! Raffle Engine: run orchestration
//!
//! ```text
//! run(event)
//!   ├─ authorize operator
//!   ├─ guard REGISTRATION_OPEN -> SIMULATING     (no snapshot read on failure)
//!   ├─ store.acquire_run      CAS + new simulation record
//!   ├─ SnapshotBuilder        freeze pending signups
//!   ├─ OutcomeResolver        quota draws + open-quota draw
//!   └─ store.commit_run       signups + sealed record + COMPLETED
//!        on any failure: store.release_run -> REGISTRATION_OPEN
//!        on PersistenceError: retry with a fresh seed and a new record
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use raffle_core::{
    Event, EventData, EventId, OperatorId, PersistenceError, RaffleError, RaffleResult,
    RaffleSimulation, RaffleStatus, RngAlgorithm, SimulationError, SimulationId, StateError,
    TraceError,
};
use raffle_draw::{DrawSeed, DrawSimulator, PhysicsDrawSimulator};

use crate::auth::{AllowAll, Authorizer};
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::replay::{self, ReplayReport};
use crate::resolver::{Decision, OutcomeResolver};
use crate::snapshot::SnapshotBuilder;
use crate::state::{RaffleStateMachine, TransitionGuard};
use crate::store::{RaffleStore, RunCommit};
use crate::trace::{RunTrace, TraceRegistry};

/// Summary of a committed run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub event_id: EventId,
    pub simulation_id: SimulationId,
    pub seed: DrawSeed,
    /// Attempts made, including the successful one
    pub attempts: u32,
    pub confirmed: usize,
    pub rejected: usize,
    pub promoted: usize,
    pub decisions: Vec<Decision>,
}

/// Orchestrates raffle runs against a store
pub struct RaffleEngine {
    store: Arc<dyn RaffleStore>,
    simulator: Arc<dyn DrawSimulator>,
    authorizer: Arc<dyn Authorizer>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    registry: TraceRegistry,
}

impl RaffleEngine {
    /// Engine with the physics simulator from `config`, the system clock and no
    /// authorization restrictions
    pub fn new(store: Arc<dyn RaffleStore>, config: EngineConfig) -> Result<Self, SimulationError> {
        let simulator = PhysicsDrawSimulator::new(config.chamber.clone())?;
        Ok(Self {
            store,
            simulator: Arc::new(simulator),
            authorizer: Arc::new(AllowAll),
            clock: Arc::new(SystemClock),
            config,
            registry: TraceRegistry::with_builtins(),
        })
    }

    pub fn with_simulator(mut self, simulator: Arc<dyn DrawSimulator>) -> Self {
        self.simulator = simulator;
        self
    }

    pub fn with_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = authorizer;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_registry(mut self, registry: TraceRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn RaffleStore> {
        &self.store
    }

    pub(crate) fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // OPERATOR TRANSITIONS
    // ═══════════════════════════════════════════════════════════════════════

    /// `NOT_STARTED -> REGISTRATION_OPEN`
    pub fn open_registration(&self, event_id: &EventId, operator: &OperatorId) -> RaffleResult<()> {
        self.authorize(event_id, operator)?;
        self.guarded_swap(event_id, RaffleStatus::RegistrationOpen)?;
        log::info!("Registration opened for {event_id} by {operator}");
        Ok(())
    }

    /// Roll a stuck run back to `REGISTRATION_OPEN`. The run's record stays
    /// unsealed and any late commit from it is refused.
    pub fn abandon_run(&self, event_id: &EventId, operator: &OperatorId) -> RaffleResult<()> {
        self.authorize(event_id, operator)?;
        let event = self.load_event(event_id)?;
        let guard = TransitionGuard::for_event(&event, self.clock.now());
        RaffleStateMachine::check(event.raffle_status, RaffleStatus::RegistrationOpen, &guard)
            .map_err(|e| RaffleError::state(event_id, e))?;

        self.store.release_run(event_id, None).map_err(|e| {
            self.conflict_or_persistence(event_id, RaffleStatus::RegistrationOpen, &guard, e)
        })?;
        log::warn!("Run for {event_id} abandoned by {operator}");
        Ok(())
    }

    /// Run the raffle for `event_id`. `seed` is used for the first attempt;
    /// retries after a persistence failure generate fresh seeds.
    pub fn run(
        &self,
        event_id: &EventId,
        operator: &OperatorId,
        seed: Option<DrawSeed>,
    ) -> RaffleResult<RunReport> {
        self.authorize(event_id, operator)?;

        let mut seed = seed;
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let attempt_seed = seed.take().unwrap_or_else(DrawSeed::generate);
            match self.attempt(event_id, attempt_seed, attempts) {
                Err(err @ RaffleError::Persistence { .. })
                    if attempts <= self.config.persistence_retries =>
                {
                    log::warn!("Attempt {attempts} for {event_id} failed, retrying: {err}");
                }
                result => return result,
            }
        }
    }

    fn attempt(&self, event_id: &EventId, seed: DrawSeed, attempts: u32) -> RaffleResult<RunReport> {
        let now = self.clock.now();
        let event = self.load_event(event_id)?;
        let guard = TransitionGuard::for_event(&event, now);
        RaffleStateMachine::check(event.raffle_status, RaffleStatus::Simulating, &guard)
            .map_err(|e| RaffleError::state(event_id, e))?;

        let record =
            RaffleSimulation::started(event_id.clone(), seed.as_str(), RngAlgorithm::CURRENT, now);
        let simulation_id = record.id;
        let data = self
            .store
            .acquire_run(event_id, record)
            .map_err(|e| self.conflict_or_persistence(event_id, RaffleStatus::Simulating, &guard, e))?;
        log::info!("Run {simulation_id} started for {event_id} (attempt {attempts})");

        match self.simulate_and_commit(event_id, simulation_id, &seed, &data, attempts) {
            Ok(report) => {
                log::info!(
                    "Run {simulation_id} committed for {event_id}: {} confirmed, {} rejected, {} promoted",
                    report.confirmed,
                    report.rejected,
                    report.promoted
                );
                Ok(report)
            }
            Err(err) => {
                log::warn!("Run {simulation_id} for {event_id} failed, rolling back: {err}");
                if let Err(release) = self.store.release_run(event_id, Some(simulation_id)) {
                    log::error!("Rollback of run {simulation_id} for {event_id} failed: {release}");
                }
                Err(err)
            }
        }
    }

    fn simulate_and_commit(
        &self,
        event_id: &EventId,
        simulation_id: SimulationId,
        seed: &DrawSeed,
        data: &EventData,
        attempts: u32,
    ) -> RaffleResult<RunReport> {
        // Guards again on the view the CAS actually won against
        let guard = TransitionGuard::for_event(&data.event, self.clock.now());
        RaffleStateMachine::check(data.event.raffle_status, RaffleStatus::Simulating, &guard)
            .map_err(|e| RaffleError::state(event_id, e))?;

        let snapshot = SnapshotBuilder::build(data)?;
        let resolution = OutcomeResolver::new(self.simulator.as_ref())
            .resolve(&snapshot, seed)
            .map_err(|e| RaffleError::simulation(event_id, e))?;

        let trace = RunTrace {
            algorithm: RngAlgorithm::CURRENT,
            seed: seed.clone(),
            chamber: self.config.chamber.clone(),
            snapshot,
            draws: resolution.draws.clone(),
        };
        let physics_state = trace
            .encode()
            .map_err(|e| RaffleError::persistence(event_id, e.into()))?;

        let end_time = self.clock.now();
        let commit = RunCommit {
            simulation_id,
            physics_state,
            end_time,
            updates: resolution.updates(end_time),
        };
        self.store
            .commit_run(event_id, commit)
            .map_err(|e| self.conflict_or_persistence(event_id, RaffleStatus::Completed, &guard, e))?;

        Ok(RunReport {
            event_id: event_id.clone(),
            simulation_id,
            seed: seed.clone(),
            attempts,
            confirmed: resolution.confirmed().count(),
            rejected: resolution.rejected().count(),
            promoted: resolution.promoted().count(),
            decisions: resolution.decisions,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // RECORDS & AUDIT
    // ═══════════════════════════════════════════════════════════════════════

    /// Every simulation record of the event, oldest first
    pub fn simulations(&self, event_id: &EventId) -> RaffleResult<Vec<RaffleSimulation>> {
        self.store
            .simulations(event_id)
            .map_err(|e| RaffleError::persistence(event_id, e))
    }

    /// The run whose commit completed the event, if any
    pub fn authoritative_run(&self, event_id: &EventId) -> RaffleResult<Option<RaffleSimulation>> {
        Ok(self
            .simulations(event_id)?
            .into_iter()
            .rev()
            .find(RaffleSimulation::is_sealed))
    }

    /// Decode the authoritative run's trace
    pub fn run_trace(&self, event_id: &EventId) -> RaffleResult<(RaffleSimulation, RunTrace)> {
        let run = self
            .authoritative_run(event_id)?
            .ok_or_else(|| RaffleError::trace(event_id, TraceError::NoCompletedRun))?;
        let state = run
            .physics_state
            .as_ref()
            .ok_or_else(|| RaffleError::trace(event_id, TraceError::Unsealed(run.id)))?;
        let trace = self
            .registry
            .decode(state)
            .map_err(|e| RaffleError::trace(event_id, e))?;
        Ok((run, trace))
    }

    /// Re-resolve the authoritative run from its recorded draws and compare
    /// with the store
    pub fn replay(&self, event_id: &EventId) -> RaffleResult<ReplayReport> {
        let (run, trace) = self.run_trace(event_id)?;
        let resolution =
            replay::replay_recorded(&trace).map_err(|e| RaffleError::simulation(event_id, e))?;
        let data = self
            .store
            .event_data(event_id)
            .map_err(|e| RaffleError::persistence(event_id, e))?;

        let report = ReplayReport {
            simulation_id: run.id,
            seed: trace.seed.clone(),
            draws: trace.draws.len(),
            verdict: replay::compare(&resolution, &data),
            traces_match: None,
        };
        log::info!("Replay of {} for {event_id}: {:?}", run.id, report.verdict);
        Ok(report)
    }

    /// Re-run the chamber from the recorded seed and compare outcome and traces
    pub fn resimulate(&self, event_id: &EventId) -> RaffleResult<ReplayReport> {
        let (run, trace) = self.run_trace(event_id)?;
        let resolution =
            replay::resimulate(&trace).map_err(|e| RaffleError::simulation(event_id, e))?;
        let data = self
            .store
            .event_data(event_id)
            .map_err(|e| RaffleError::persistence(event_id, e))?;

        let report = ReplayReport {
            simulation_id: run.id,
            seed: trace.seed.clone(),
            draws: resolution.draws.len(),
            verdict: replay::compare(&resolution, &data),
            traces_match: Some(replay::traces_equal(&trace.draws, &resolution.draws)),
        };
        log::info!(
            "Re-simulation of {} for {event_id}: {:?}, traces match: {:?}",
            run.id,
            report.verdict,
            report.traces_match
        );
        Ok(report)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // HELPERS
    // ═══════════════════════════════════════════════════════════════════════

    fn authorize(&self, event_id: &EventId, operator: &OperatorId) -> RaffleResult<()> {
        if self.authorizer.is_authorized(operator, event_id) {
            Ok(())
        } else {
            log::warn!("Operator {operator} refused for {event_id}");
            Err(RaffleError::Unauthorized {
                event_id: event_id.clone(),
                operator: operator.clone(),
            })
        }
    }

    fn load_event(&self, event_id: &EventId) -> RaffleResult<Event> {
        self.store
            .event(event_id)
            .map_err(|e| RaffleError::persistence(event_id, e))
    }

    /// Check then CAS from the observed status to `to`
    fn guarded_swap(&self, event_id: &EventId, to: RaffleStatus) -> RaffleResult<()> {
        let event = self.load_event(event_id)?;
        let guard = TransitionGuard::for_event(&event, self.clock.now());
        RaffleStateMachine::check(event.raffle_status, to, &guard)
            .map_err(|e| RaffleError::state(event_id, e))?;
        self.store
            .swap_status(event_id, event.raffle_status, to)
            .map_err(|e| self.conflict_or_persistence(event_id, to, &guard, e))
    }

    /// A lost CAS is reported as the lifecycle error the winner's status
    /// implies; a run that was abandoned underneath us as `RunSuperseded`
    fn conflict_or_persistence(
        &self,
        event_id: &EventId,
        to: RaffleStatus,
        guard: &TransitionGuard,
        err: PersistenceError,
    ) -> RaffleError {
        match err {
            PersistenceError::StatusConflict { actual, .. } => {
                let source = RaffleStateMachine::check(actual, to, guard)
                    .err()
                    .unwrap_or(StateError::IllegalTransition(actual, to));
                RaffleError::state(event_id, source)
            }
            PersistenceError::StaleRun { simulation_id, .. } => {
                RaffleError::state(event_id, StateError::RunSuperseded(simulation_id))
            }
            PersistenceError::Lifecycle { source, .. } => RaffleError::state(event_id, source),
            other => RaffleError::persistence(event_id, other),
        }
    }
}
