//! Error taxonomy for raffle runs
//!
//! - [`StateError`]: illegal lifecycle transition, fix by retrying in the right state
//! - [`SnapshotError`]: stale or inconsistent input, fix by re-snapshotting
//! - [`SimulationError`]: malformed or non-deterministic draw input, a data bug
//! - [`PersistenceError`]: store failure, triggers rollback to `REGISTRATION_OPEN`
//! - [`TraceError`]: a persisted `physics_state` that cannot be decoded

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{DrawLabel, EventId, OperatorId, QuotaId, RaffleStatus, SignupId, SignupStatus, SimulationId};

/// Illegal raffle lifecycle transition
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("registration has already been opened")]
    AlreadyOpened,

    #[error("registration is still open (ends at {})", fmt_end(.ends_at))]
    RegistrationStillOpen { ends_at: Option<DateTime<Utc>> },

    #[error("raffle is disabled for this event")]
    RaffleDisabled,

    #[error("outcome write-back has not committed")]
    ResolutionIncomplete,

    #[error("illegal transition {0} -> {1}")]
    IllegalTransition(RaffleStatus, RaffleStatus),

    #[error("run {0} is no longer the active run")]
    RunSuperseded(SimulationId),
}

fn fmt_end(ends_at: &Option<DateTime<Utc>>) -> String {
    ends_at
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "never".to_string())
}

/// Why an event cannot be snapshotted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IneligibleReason {
    /// Observed status was not `REGISTRATION_OPEN`
    Status(RaffleStatus),
    /// A signup references a quota the event does not have
    MissingQuota { quota_id: QuotaId, signup_id: SignupId },
}

impl std::fmt::Display for IneligibleReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Status(status) => write!(f, "raffle status is {status}"),
            Self::MissingQuota { quota_id, signup_id } => {
                write!(f, "signup {signup_id} references missing quota {quota_id}")
            }
        }
    }
}

/// Snapshot could not be built
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("event {event_id} is not eligible for a raffle: {reason}")]
    NotEligible {
        event_id: EventId,
        reason: IneligibleReason,
    },

    #[error("event {event_id} has inconsistent data: {detail}")]
    Inconsistent { event_id: EventId, detail: String },
}

impl SnapshotError {
    pub fn event_id(&self) -> &EventId {
        match self {
            Self::NotEligible { event_id, .. } | Self::Inconsistent { event_id, .. } => event_id,
        }
    }
}

/// Draw input was malformed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimulationError {
    #[error("{label}: nothing to draw")]
    EmptyDraw { label: DrawLabel },

    #[error("{label}: entrant {signup_id} at position {index} breaks the stable order")]
    NonDeterministicInput {
        label: DrawLabel,
        index: usize,
        signup_id: SignupId,
    },

    #[error("{label}: no recorded draw")]
    MissingDraw { label: DrawLabel },

    #[error("{label}: draw order is not a permutation of the entrants")]
    InvalidDrawOrder { label: DrawLabel },

    #[error("invalid chamber config: {0}")]
    InvalidConfig(String),
}

impl SimulationError {
    pub fn label(&self) -> Option<&DrawLabel> {
        match self {
            Self::EmptyDraw { label }
            | Self::NonDeterministicInput { label, .. }
            | Self::MissingDraw { label }
            | Self::InvalidDrawOrder { label } => Some(label),
            Self::InvalidConfig(_) => None,
        }
    }
}

/// Store failure
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("event not found: {0}")]
    EventNotFound(EventId),

    #[error("event {event_id}: expected status {expected}, found {actual}")]
    StatusConflict {
        event_id: EventId,
        expected: RaffleStatus,
        actual: RaffleStatus,
    },

    #[error("event {event_id}: signup not found: {signup_id}")]
    SignupNotFound { event_id: EventId, signup_id: SignupId },

    #[error("event {event_id}: signup {signup_id} is {status}, not PENDING")]
    SignupNotPending {
        event_id: EventId,
        signup_id: SignupId,
        status: SignupStatus,
    },

    #[error("simulation not found: {0}")]
    SimulationNotFound(SimulationId),

    #[error("simulation {0} is sealed")]
    RecordSealed(SimulationId),

    #[error("event {event_id}: simulation {simulation_id} is not the active run")]
    StaleRun {
        event_id: EventId,
        simulation_id: SimulationId,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("event {event_id}: {source}")]
    Lifecycle {
        event_id: EventId,
        #[source]
        source: StateError,
    },

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Persisted trace could not be decoded
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("no decoder registered for trace version {0}")]
    UnknownVersion(u32),

    #[error("trace version {version} is malformed: {source}")]
    Malformed {
        version: u32,
        #[source]
        source: serde_json::Error,
    },

    #[error("simulation {0} has no physics state")]
    Unsealed(SimulationId),

    #[error("no completed run to replay")]
    NoCompletedRun,
}

/// Top-level error returned by engine operations
#[derive(Error, Debug)]
pub enum RaffleError {
    #[error("event {event_id}: {source}")]
    State {
        event_id: EventId,
        source: StateError,
    },

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("event {event_id}: simulation failed: {source}")]
    Simulation {
        event_id: EventId,
        source: SimulationError,
    },

    #[error("event {event_id}: persistence failed: {source}")]
    Persistence {
        event_id: EventId,
        source: PersistenceError,
    },

    #[error("event {event_id}: {source}")]
    Trace {
        event_id: EventId,
        source: TraceError,
    },

    #[error("event {event_id}: operator {operator} is not authorized")]
    Unauthorized {
        event_id: EventId,
        operator: OperatorId,
    },
}

/// Coarse error class for operator diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    State,
    Snapshot,
    Simulation,
    Persistence,
    Trace,
    Unauthorized,
}

impl RaffleError {
    pub fn state(event_id: &EventId, source: StateError) -> Self {
        Self::State {
            event_id: event_id.clone(),
            source,
        }
    }

    pub fn simulation(event_id: &EventId, source: SimulationError) -> Self {
        Self::Simulation {
            event_id: event_id.clone(),
            source,
        }
    }

    pub fn persistence(event_id: &EventId, source: PersistenceError) -> Self {
        Self::Persistence {
            event_id: event_id.clone(),
            source,
        }
    }

    pub fn trace(event_id: &EventId, source: TraceError) -> Self {
        Self::Trace {
            event_id: event_id.clone(),
            source,
        }
    }

    /// Event the failure belongs to
    pub fn event_id(&self) -> &EventId {
        match self {
            Self::State { event_id, .. }
            | Self::Simulation { event_id, .. }
            | Self::Persistence { event_id, .. }
            | Self::Trace { event_id, .. }
            | Self::Unauthorized { event_id, .. } => event_id,
            Self::Snapshot(e) => e.event_id(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::State { .. } => ErrorKind::State,
            Self::Snapshot(_) => ErrorKind::Snapshot,
            Self::Simulation { .. } => ErrorKind::Simulation,
            Self::Persistence { .. } => ErrorKind::Persistence,
            Self::Trace { .. } => ErrorKind::Trace,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
        }
    }

    /// Lifecycle error, if this is one
    pub fn as_state(&self) -> Option<&StateError> {
        match self {
            Self::State { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type alias
pub type RaffleResult<T> = Result<T, RaffleError>;
