//! Raffle Engine
//!
//! Turns an oversubscribed event into a committed, replayable set of
//! confirm/reject decisions.
//!
//! ```text
//! ┌──────────────┐  acquire_run   ┌──────────────┐  Snapshot  ┌────────────────┐
//! │ RaffleEngine │ ─────────────> │ RaffleStore  │ ─────────> │ OutcomeResolver│
//! │ (state check)│ <───────────── │ (status CAS) │            │ + DrawSimulator│
//! └──────────────┘   commit_run   └──────────────┘ <───────── └────────────────┘
//!                                                   decisions + RunTrace
//! ```
//!
//! - [`snapshot`] freezes pending signups into a [`Snapshot`]
//! - [`resolver`] maps draw orders onto decisions
//! - [`state`] holds the lifecycle rules
//! - [`store`] persists events, signups and simulation records
//! - [`replay`] audits a completed run from its trace

pub mod auth;
pub mod clock;
pub mod config;
pub mod engine;
pub mod replay;
pub mod resolver;
pub mod schedule;
pub mod snapshot;
pub mod state;
pub mod store;
pub mod trace;

pub use auth::{AllowAll, AllowList, Authorizer};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::EngineConfig;
pub use engine::{RaffleEngine, RunReport};
pub use replay::{RecordedDraws, ReplayReport, ReplayVerdict};
pub use resolver::{Decision, OutcomeResolver, Resolution};
pub use schedule::{due_events, is_due};
pub use snapshot::{Snapshot, SnapshotBuilder, SnapshotQuota};
pub use state::{RaffleStateMachine, TransitionGuard};
pub use store::{FileStore, MemoryStore, RaffleStore, RunCommit};
pub use trace::{RunTrace, TRACE_VERSION, TraceDecoder, TraceRegistry};
