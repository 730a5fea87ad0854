//! # raffle-draw: Deterministic lottery-chamber draws
//!
//! Turns an ordered list of entrants and a seed string into a draw order
//! that is byte-for-byte reproducible on any machine, plus a trace that
//! proves how the order came about.
//!
//! ## Architecture
//!
//! ```text
//! DrawSeed ──SHA-256──> RngState (ChaCha8)
//!                           │
//!                           v
//! [Entrant] ──> Chamber (Q16 fixed-point physics, suction gate)
//!                           │
//!                           v
//!               Draw { DrawOrder, DrawTrace }
//! ```

pub mod chamber;
pub mod config;
pub mod fixed;
pub mod rng;
pub mod simulator;
pub mod trace;

pub use config::*;
pub use fixed::Fixed;
pub use rng::*;
pub use simulator::*;
pub use trace::*;
