//! Event / Quota / Signup / RaffleSimulation records

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reserved identifier of the event-level overflow quota
pub const OPEN_QUOTA_ID: &str = "open";

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Create a new ID
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the ID string
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id!(
    /// Event identifier
    EventId
);
string_id!(
    /// Quota identifier
    QuotaId
);
string_id!(
    /// Signup identifier
    SignupId
);
string_id!(
    /// Operator identity supplied by the session subsystem
    OperatorId
);

impl QuotaId {
    /// The event-level open quota
    pub fn open() -> Self {
        Self::new(OPEN_QUOTA_ID)
    }

    /// Is this the open quota?
    pub fn is_open(&self) -> bool {
        self.0 == OPEN_QUOTA_ID
    }
}

/// Simulation record identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimulationId(pub Uuid);

impl SimulationId {
    /// Fresh random ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SimulationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SimulationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// STATUSES
// ═══════════════════════════════════════════════════════════════════════════

/// Event-level raffle lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RaffleStatus {
    NotStarted,
    RegistrationOpen,
    Simulating,
    Completed,
}

impl RaffleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "NOT_STARTED",
            Self::RegistrationOpen => "REGISTRATION_OPEN",
            Self::Simulating => "SIMULATING",
            Self::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for RaffleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signup lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignupStatus {
    Pending,
    Confirmed,
    Rejected,
}

impl SignupStatus {
    /// Confirmed or rejected
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for SignupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Rejected => "REJECTED",
        };
        f.write_str(s)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// RECORDS
// ═══════════════════════════════════════════════════════════════════════════

/// An event that signups register for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub registration_start_date: Option<DateTime<Utc>>,
    /// `None` means registration never closes
    #[serde(default)]
    pub registration_end_date: Option<DateTime<Utc>>,
    /// Overflow capacity shared by signups rejected from their own quota
    #[serde(default)]
    pub open_quota_size: u32,
    #[serde(default)]
    pub raffle_enabled: bool,
    /// Scheduling window, not the simulation wall clock
    #[serde(default)]
    pub raffle_start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub raffle_end_time: Option<DateTime<Utc>>,
    pub raffle_status: RaffleStatus,
}

impl Event {
    /// Create an event in `NOT_STARTED` with the raffle disabled
    pub fn new(id: impl Into<EventId>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            registration_start_date: None,
            registration_end_date: None,
            open_quota_size: 0,
            raffle_enabled: false,
            raffle_start_time: None,
            raffle_end_time: None,
            raffle_status: RaffleStatus::NotStarted,
        }
    }

    /// Has registration closed at `now`?
    pub fn registration_closed(&self, now: DateTime<Utc>) -> bool {
        self.registration_end_date.is_some_and(|end| end <= now)
    }
}

/// A capacity bucket within an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quota {
    pub id: QuotaId,
    pub event_id: EventId,
    #[serde(default)]
    pub title: String,
    /// `None` = unbounded
    pub size: Option<u32>,
    #[serde(default)]
    pub sort_id: i32,
}

impl Quota {
    pub fn new(id: impl Into<QuotaId>, event_id: impl Into<EventId>, size: Option<u32>) -> Self {
        Self {
            id: id.into(),
            event_id: event_id.into(),
            title: String::new(),
            size,
            sort_id: 0,
        }
    }

    pub fn with_sort_id(mut self, sort_id: i32) -> Self {
        self.sort_id = sort_id;
        self
    }

    pub fn is_bounded(&self) -> bool {
        self.size.is_some()
    }
}

/// A participant's registration request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signup {
    pub id: SignupId,
    pub event_id: EventId,
    /// Quota the signup currently holds or competes for
    pub quota_id: QuotaId,
    /// Quota originally requested; differs from `quota_id` only after promotion
    pub original_quota_id: QuotaId,
    pub status: SignupStatus,
    pub registration_intent: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Signup {
    /// Create a pending signup for `quota_id`
    pub fn pending(
        id: impl Into<SignupId>,
        event_id: impl Into<EventId>,
        quota_id: impl Into<QuotaId>,
        registration_intent: DateTime<Utc>,
    ) -> Self {
        let quota_id = quota_id.into();
        Self {
            id: id.into(),
            event_id: event_id.into(),
            original_quota_id: quota_id.clone(),
            quota_id,
            status: SignupStatus::Pending,
            registration_intent,
            completed_at: None,
        }
    }

    /// Was this signup moved out of its requested quota?
    pub fn is_reassigned(&self) -> bool {
        self.quota_id != self.original_quota_id
    }

    /// Apply a resolver write-back. `original_quota_id` is never touched.
    pub fn apply(&mut self, update: &SignupUpdate) {
        self.status = update.status;
        self.quota_id = update.quota_id.clone();
        self.completed_at = Some(update.completed_at);
    }
}

/// Status change produced by the outcome resolver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignupUpdate {
    pub signup_id: SignupId,
    pub status: SignupStatus,
    pub quota_id: QuotaId,
    pub completed_at: DateTime<Utc>,
}

/// Consistent view of one event as read from the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    pub event: Event,
    #[serde(default)]
    pub quotas: Vec<Quota>,
    #[serde(default)]
    pub signups: Vec<Signup>,
}

impl EventData {
    pub fn new(event: Event) -> Self {
        Self {
            event,
            quotas: Vec::new(),
            signups: Vec::new(),
        }
    }

    pub fn with_quota(mut self, quota: Quota) -> Self {
        self.quotas.push(quota);
        self
    }

    pub fn with_signup(mut self, signup: Signup) -> Self {
        self.signups.push(signup);
        self
    }

    pub fn quota(&self, id: &QuotaId) -> Option<&Quota> {
        self.quotas.iter().find(|q| &q.id == id)
    }

    pub fn signup(&self, id: &SignupId) -> Option<&Signup> {
        self.signups.iter().find(|s| &s.id == id)
    }

    /// Signups currently holding `status`
    pub fn signups_with_status(&self, status: SignupStatus) -> impl Iterator<Item = &Signup> {
        self.signups.iter().filter(move |s| s.status == status)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SIMULATION RECORDS
// ═══════════════════════════════════════════════════════════════════════════

/// Versioned RNG algorithm, persisted next to every seed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RngAlgorithm {
    /// SHA-256(seed) keyed ChaCha8, 53-bit float extraction
    #[serde(rename = "chacha8-sha256/1")]
    ChaCha8Sha256V1,
}

impl RngAlgorithm {
    pub const CURRENT: Self = Self::ChaCha8Sha256V1;

    pub fn tag(&self) -> &'static str {
        match self {
            Self::ChaCha8Sha256V1 => "chacha8-sha256/1",
        }
    }
}

impl Default for RngAlgorithm {
    fn default() -> Self {
        Self::CURRENT
    }
}

impl fmt::Display for RngAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Which draw of a run a trace belongs to
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "quota_id", rename_all = "snake_case")]
pub enum DrawLabel {
    /// Draw among the pending signups of one named quota
    Quota(QuotaId),
    /// Re-draw of rejected signups against the open quota
    Open,
}

impl DrawLabel {
    /// Label mixed into the run seed to derive this draw's sub-seed
    pub fn seed_label(&self) -> String {
        match self {
            Self::Quota(id) => format!("quota:{id}"),
            Self::Open => "open".to_string(),
        }
    }
}

impl fmt::Display for DrawLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quota(id) => write!(f, "quota {id}"),
            Self::Open => f.write_str("open quota"),
        }
    }
}

/// Opaque, version-tagged simulation trace (`physicsState`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicsState {
    pub version: u32,
    pub payload: serde_json::Value,
}

/// One attempted raffle run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaffleSimulation {
    pub id: SimulationId,
    pub event_id: EventId,
    /// Sole source of nondeterminism, fixed at run start
    pub seed: String,
    pub rng_algorithm: RngAlgorithm,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// Populated once, when the run commits
    #[serde(default)]
    pub physics_state: Option<PhysicsState>,
}

impl RaffleSimulation {
    /// Record created at run start, before the simulator executes
    pub fn started(
        event_id: EventId,
        seed: impl Into<String>,
        rng_algorithm: RngAlgorithm,
        start_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SimulationId::new(),
            event_id,
            seed: seed.into(),
            rng_algorithm,
            start_time,
            end_time: None,
            physics_state: None,
        }
    }

    /// Has this run committed its trace?
    pub fn is_sealed(&self) -> bool {
        self.physics_state.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_signup_apply_keeps_original_quota() {
        let t = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let mut signup = Signup::pending("s1", "e1", "a", t);
        signup.apply(&SignupUpdate {
            signup_id: SignupId::new("s1"),
            status: SignupStatus::Confirmed,
            quota_id: QuotaId::open(),
            completed_at: t,
        });

        assert_eq!(signup.status, SignupStatus::Confirmed);
        assert_eq!(signup.original_quota_id, QuotaId::new("a"));
        assert!(signup.quota_id.is_open());
        assert!(signup.is_reassigned());
        assert_eq!(signup.completed_at, Some(t));
    }

    #[test]
    fn test_registration_closed() {
        let end = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let mut event = Event::new("e1");
        assert!(!event.registration_closed(end));

        event.registration_end_date = Some(end);
        assert!(!event.registration_closed(end - chrono::Duration::seconds(1)));
        assert!(event.registration_closed(end));
    }

    #[test]
    fn test_status_serde_names() {
        let json = serde_json::to_string(&RaffleStatus::RegistrationOpen).unwrap();
        assert_eq!(json, "\"REGISTRATION_OPEN\"");

        let algo = serde_json::to_string(&RngAlgorithm::CURRENT).unwrap();
        assert_eq!(algo, "\"chacha8-sha256/1\"");
    }

    #[test]
    fn test_draw_label_seed_labels() {
        assert_eq!(DrawLabel::Quota(QuotaId::new("a")).seed_label(), "quota:a");
        assert_eq!(DrawLabel::Open.seed_label(), "open");
    }
}
