//! # raffle-core: Domain model for the quota raffle engine
//!
//! Plain data shared by every other crate in the workspace: events, quotas,
//! signups, persisted simulation records, and the error taxonomy used when a
//! raffle run fails.
//!
//! ## Architecture
//!
//! ```text
//! Event ──owns──> Quota*
//!   │               ^
//!   │               │ quota_id / original_quota_id
//!   │             Signup*
//!   │
//!   └──owns──> RaffleSimulation* { seed, rng_algorithm, physics_state }
//! ```

pub mod error;
pub mod model;

pub use error::*;
pub use model::*;
