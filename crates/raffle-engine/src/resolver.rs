//! Outcome Resolver: maps draw orders onto confirm/reject decisions
//!
//! 1. Each bounded quota: the first `capacity` signups of its draw order are
//!    confirmed, the rest rejected.
//! 2. Unbounded quotas confirm everyone without drawing.
//! 3. Rejected signups are pooled and re-drawn against the event's open
//!    quota with the `open` sub-seed; winners move to [`QuotaId::open`].
//!
//! A quota that is not oversubscribed (`entrants <= capacity`) or has zero
//! capacity is decided without a draw. The draw order is the only tie-break.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use raffle_core::{DrawLabel, QuotaId, SignupId, SignupStatus, SignupUpdate, SimulationError};
use raffle_draw::{DrawSeed, DrawSimulator, DrawTrace, Entrant, sort_entrants};

use crate::snapshot::Snapshot;

/// Final decision for one signup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub signup_id: SignupId,
    pub original_quota_id: QuotaId,
    /// Quota held after resolution; [`QuotaId::open`] when promoted
    pub quota_id: QuotaId,
    pub status: SignupStatus,
}

impl Decision {
    pub fn is_promoted(&self) -> bool {
        self.quota_id != self.original_quota_id
    }
}

/// Output of one resolution
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Resolution {
    /// Snapshot order: quotas in order, entrants in order
    pub decisions: Vec<Decision>,
    /// Draws actually performed, in execution order
    pub draws: Vec<DrawTrace>,
}

impl Resolution {
    pub fn confirmed(&self) -> impl Iterator<Item = &Decision> {
        self.decisions
            .iter()
            .filter(|d| d.status == SignupStatus::Confirmed)
    }

    pub fn rejected(&self) -> impl Iterator<Item = &Decision> {
        self.decisions
            .iter()
            .filter(|d| d.status == SignupStatus::Rejected)
    }

    pub fn promoted(&self) -> impl Iterator<Item = &Decision> {
        self.decisions.iter().filter(|d| d.is_promoted())
    }

    pub fn decision(&self, signup_id: &SignupId) -> Option<&Decision> {
        self.decisions.iter().find(|d| &d.signup_id == signup_id)
    }

    /// Confirmed count per quota held after resolution
    pub fn confirmed_per_quota(&self) -> HashMap<&QuotaId, u32> {
        let mut counts = HashMap::new();
        for d in self.confirmed() {
            *counts.entry(&d.quota_id).or_insert(0) += 1;
        }
        counts
    }

    /// Write-back rows, all stamped with `completed_at`
    pub fn updates(&self, completed_at: DateTime<Utc>) -> Vec<SignupUpdate> {
        self.decisions
            .iter()
            .map(|d| SignupUpdate {
                signup_id: d.signup_id.clone(),
                status: d.status,
                quota_id: d.quota_id.clone(),
                completed_at,
            })
            .collect()
    }

    /// Same signups in the same final state, ignoring traces
    pub fn same_partition(&self, other: &Resolution) -> bool {
        let key = |r: &Resolution| {
            let mut v: Vec<(SignupId, SignupStatus, QuotaId)> = r
                .decisions
                .iter()
                .map(|d| (d.signup_id.clone(), d.status, d.quota_id.clone()))
                .collect();
            v.sort_by(|a, b| a.0.cmp(&b.0));
            v
        };
        key(self) == key(other)
    }
}

/// Resolves a snapshot through a draw simulator
pub struct OutcomeResolver<'a> {
    simulator: &'a dyn DrawSimulator,
}

impl<'a> OutcomeResolver<'a> {
    pub fn new(simulator: &'a dyn DrawSimulator) -> Self {
        Self { simulator }
    }

    pub fn resolve(&self, snapshot: &Snapshot, seed: &DrawSeed) -> Result<Resolution, SimulationError> {
        let mut resolution = Resolution::default();
        let mut pool: Vec<Entrant> = Vec::new();

        for quota in &snapshot.quotas {
            if quota.entrants.is_empty() {
                continue;
            }

            let winners = match quota.capacity {
                None => quota.entrants.len(),
                Some(capacity) => capacity as usize,
            };

            let ranked: Vec<SignupId> = if winners >= quota.entrants.len() || winners == 0 {
                quota.entrants.iter().map(|e| e.signup_id.clone()).collect()
            } else {
                let label = DrawLabel::Quota(quota.quota_id.clone());
                self.draw(&label, &quota.entrants, seed, &mut resolution)?
            };

            let intents: HashMap<&SignupId, DateTime<Utc>> = quota
                .entrants
                .iter()
                .map(|e| (&e.signup_id, e.registration_intent))
                .collect();

            for (position, signup_id) in ranked.into_iter().enumerate() {
                let status = if position < winners {
                    SignupStatus::Confirmed
                } else {
                    if let Some(&intent) = intents.get(&signup_id) {
                        pool.push(Entrant::new(signup_id.clone(), intent));
                    }
                    SignupStatus::Rejected
                };
                resolution.decisions.push(Decision {
                    signup_id,
                    original_quota_id: quota.quota_id.clone(),
                    quota_id: quota.quota_id.clone(),
                    status,
                });
            }
        }

        let open_size = snapshot.open_quota_size as usize;
        if open_size > 0 && !pool.is_empty() {
            sort_entrants(&mut pool);
            let promoted: HashSet<SignupId> = if pool.len() <= open_size {
                pool.into_iter().map(|e| e.signup_id).collect()
            } else {
                let order = self.draw(&DrawLabel::Open, &pool, seed, &mut resolution)?;
                order.into_iter().take(open_size).collect()
            };

            for d in &mut resolution.decisions {
                if promoted.contains(&d.signup_id) {
                    d.status = SignupStatus::Confirmed;
                    d.quota_id = QuotaId::open();
                }
            }
        }

        // Re-emit decisions in snapshot order (quota draws reorder within a quota)
        let position: HashMap<&SignupId, usize> = snapshot
            .quotas
            .iter()
            .flat_map(|q| q.entrants.iter())
            .enumerate()
            .map(|(i, e)| (&e.signup_id, i))
            .collect();
        resolution
            .decisions
            .sort_by_key(|d| position.get(&d.signup_id).copied().unwrap_or(usize::MAX));

        Ok(resolution)
    }

    /// Run one draw and check it is a permutation of its entrants
    fn draw(
        &self,
        label: &DrawLabel,
        entrants: &[Entrant],
        seed: &DrawSeed,
        resolution: &mut Resolution,
    ) -> Result<Vec<SignupId>, SimulationError> {
        let sub_seed = seed.derive(&label.seed_label());
        let draw = self.simulator.draw(label, entrants, &sub_seed)?;

        let mut drawn: Vec<&SignupId> = draw.order.iter().collect();
        let mut expected: Vec<&SignupId> = entrants.iter().map(|e| &e.signup_id).collect();
        drawn.sort();
        expected.sort();
        if drawn != expected {
            return Err(SimulationError::InvalidDrawOrder {
                label: label.clone(),
            });
        }

        log::debug!("{label}: draw order {:?}", draw.order.as_slice());
        let order = draw.order.into_inner();
        resolution.draws.push(draw.trace);
        Ok(order)
    }
}
