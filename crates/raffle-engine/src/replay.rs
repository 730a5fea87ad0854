//! Replay and audit
//!
//! Two ways to check a completed run:
//!
//! - **Replay**: re-resolve the recorded snapshot with [`RecordedDraws`], which
//!   hands back the persisted draw orders and never touches the RNG.
//! - **Re-simulation**: run the physics chamber again from the recorded seed,
//!   algorithm and chamber config, and compare both the outcome and the traces.
//!
//! Either way the outcome is compared with the signup rows currently in the
//! store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use raffle_core::{DrawLabel, EventData, SignupId, SimulationError, SimulationId};
use raffle_draw::{Draw, DrawSeed, DrawSimulator, DrawTrace, Entrant, PhysicsDrawSimulator};

use crate::resolver::{OutcomeResolver, Resolution};
use crate::trace::RunTrace;

/// Simulator that serves recorded draws by label
#[derive(Debug, Clone, Default)]
pub struct RecordedDraws {
    draws: BTreeMap<DrawLabel, DrawTrace>,
}

impl RecordedDraws {
    pub fn new(draws: impl IntoIterator<Item = DrawTrace>) -> Self {
        Self {
            draws: draws.into_iter().map(|d| (d.label.clone(), d)).collect(),
        }
    }

    pub fn from_trace(trace: &RunTrace) -> Self {
        Self::new(trace.draws.iter().cloned())
    }

    pub fn len(&self) -> usize {
        self.draws.len()
    }

    pub fn is_empty(&self) -> bool {
        self.draws.is_empty()
    }
}

impl DrawSimulator for RecordedDraws {
    fn draw(
        &self,
        label: &DrawLabel,
        entrants: &[Entrant],
        _seed: &DrawSeed,
    ) -> Result<Draw, SimulationError> {
        let trace = self
            .draws
            .get(label)
            .ok_or_else(|| SimulationError::MissingDraw {
                label: label.clone(),
            })?;

        let matches_input = trace.entrants.len() == entrants.len()
            && trace
                .entrants
                .iter()
                .zip(entrants)
                .all(|(recorded, e)| recorded == &e.signup_id);
        if !matches_input || !trace.is_complete() {
            return Err(SimulationError::InvalidDrawOrder {
                label: label.clone(),
            });
        }

        Ok(Draw {
            order: trace.order(),
            trace: trace.clone(),
        })
    }
}

/// Outcome of comparing a recomputed resolution with the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum ReplayVerdict {
    Match,
    /// Signups whose persisted status or quota differs from the recomputation
    Mismatch { signup_ids: Vec<SignupId> },
}

impl ReplayVerdict {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Match)
    }
}

/// Result of a replay or re-simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayReport {
    pub simulation_id: SimulationId,
    pub seed: DrawSeed,
    pub draws: usize,
    pub verdict: ReplayVerdict,
    /// Re-simulation only: did every regenerated trace equal the recorded one?
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traces_match: Option<bool>,
}

/// Re-resolve a run from its recorded draws
pub fn replay_recorded(trace: &RunTrace) -> Result<Resolution, SimulationError> {
    let recorded = RecordedDraws::from_trace(trace);
    OutcomeResolver::new(&recorded).resolve(&trace.snapshot, &trace.seed)
}

/// Re-run the chamber from the recorded seed and config
pub fn resimulate(trace: &RunTrace) -> Result<Resolution, SimulationError> {
    let simulator =
        PhysicsDrawSimulator::new(trace.chamber.clone())?.with_algorithm(trace.algorithm);
    OutcomeResolver::new(&simulator).resolve(&trace.snapshot, &trace.seed)
}

/// Compare a resolution with the persisted signup rows
pub fn compare(resolution: &Resolution, data: &EventData) -> ReplayVerdict {
    let mut mismatched: Vec<SignupId> = resolution
        .decisions
        .iter()
        .filter(|d| match data.signup(&d.signup_id) {
            Some(s) => {
                s.status != d.status
                    || s.quota_id != d.quota_id
                    || s.original_quota_id != d.original_quota_id
            }
            None => true,
        })
        .map(|d| d.signup_id.clone())
        .collect();

    if mismatched.is_empty() {
        ReplayVerdict::Match
    } else {
        mismatched.sort();
        ReplayVerdict::Mismatch {
            signup_ids: mismatched,
        }
    }
}

/// Do regenerated traces equal the recorded ones, label by label?
pub fn traces_equal(recorded: &[DrawTrace], regenerated: &[DrawTrace]) -> bool {
    let index = |draws: &[DrawTrace]| -> BTreeMap<DrawLabel, DrawTrace> {
        draws.iter().map(|d| (d.label.clone(), d.clone())).collect()
    };
    index(recorded) == index(regenerated)
}
