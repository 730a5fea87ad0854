//! DrawTrace: replayable record of one chamber draw
//!
//! A trace holds the draw's seed, the entrant list, the starting layout and
//! every exit through the gate. The exit list alone reconstructs the
//! [`DrawOrder`]; optional frames let an auditor re-render the chamber.

use serde::{Deserialize, Serialize};

use raffle_core::{DrawLabel, RngAlgorithm, SignupId};

use crate::fixed::Fixed;
use crate::rng::DrawSeed;

/// Strict draw priority for one draw, first drawn first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DrawOrder(Vec<SignupId>);

impl DrawOrder {
    pub fn new(order: Vec<SignupId>) -> Self {
        Self(order)
    }

    pub fn as_slice(&self) -> &[SignupId] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SignupId> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Draw position of a signup (0 = first out)
    pub fn position(&self, signup_id: &SignupId) -> Option<usize> {
        self.0.iter().position(|id| id == signup_id)
    }

    pub fn into_inner(self) -> Vec<SignupId> {
        self.0
    }
}

impl<'a> IntoIterator for &'a DrawOrder {
    type Item = &'a SignupId;
    type IntoIter = std::slice::Iter<'a, SignupId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Ball centre
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallPosition {
    pub x: Fixed,
    pub y: Fixed,
}

/// A ball pulled through the gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitEvent {
    pub tick: u64,
    /// Index into the trace's entrant list
    pub ball: usize,
    pub signup_id: SignupId,
    pub x: Fixed,
    pub y: Fixed,
}

/// Ball state inside a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallFrame {
    pub ball: usize,
    pub x: Fixed,
    pub y: Fixed,
}

/// Chamber state at one tick (balls still inside only)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub tick: u64,
    pub balls: Vec<BallFrame>,
}

/// Full trace of one draw
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawTrace {
    pub label: DrawLabel,
    pub algorithm: RngAlgorithm,
    /// Sub-seed this draw was simulated with
    pub seed: DrawSeed,
    /// Entrants in snapshot order; ball `i` is `entrants[i]`
    pub entrants: Vec<SignupId>,
    pub initial: Vec<BallPosition>,
    pub exits: Vec<ExitEvent>,
    #[serde(default)]
    pub frames: Vec<Frame>,
    /// Ticks simulated
    pub ticks: u64,
    /// RNG words consumed
    pub rng_words: u64,
}

impl DrawTrace {
    /// Draw order reconstructed from the exit sequence
    pub fn order(&self) -> DrawOrder {
        DrawOrder::new(self.exits.iter().map(|e| e.signup_id.clone()).collect())
    }

    /// Does the exit list form a permutation of the entrants?
    pub fn is_complete(&self) -> bool {
        if self.exits.len() != self.entrants.len() {
            return false;
        }
        let mut seen = vec![false; self.entrants.len()];
        for exit in &self.exits {
            match seen.get_mut(exit.ball) {
                Some(flag) if !*flag && self.entrants[exit.ball] == exit.signup_id => *flag = true,
                _ => return false,
            }
        }
        true
    }

    /// Canonical serialized form
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
