//! Quota Snapshot Builder
//!
//! Freezes an event's pending signups into the only input a raffle run sees.
//! Every ordering here comes from persisted fields, never from the order rows
//! happened to arrive in.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use raffle_core::{
    EventData, EventId, IneligibleReason, QuotaId, RaffleStatus, SignupStatus, SnapshotError,
};
use raffle_draw::{Entrant, sort_entrants};

/// One quota's frozen competition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotQuota {
    pub quota_id: QuotaId,
    pub sort_id: i32,
    /// `None` = unbounded
    pub capacity: Option<u32>,
    /// Pending signups ordered by `(registration_intent, signup_id)`
    pub entrants: Vec<Entrant>,
}

/// Immutable input of one raffle run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub event_id: EventId,
    /// Quotas ordered by `(sort_id, quota_id)`
    pub quotas: Vec<SnapshotQuota>,
    pub open_quota_size: u32,
}

impl Snapshot {
    pub fn quota(&self, id: &QuotaId) -> Option<&SnapshotQuota> {
        self.quotas.iter().find(|q| &q.quota_id == id)
    }

    /// Total pending signups across all quotas
    pub fn entrant_count(&self) -> usize {
        self.quotas.iter().map(|q| q.entrants.len()).sum()
    }
}

/// Builds [`Snapshot`]s from store reads
pub struct SnapshotBuilder;

impl SnapshotBuilder {
    /// Freeze `data`, which must have been read while the event was `REGISTRATION_OPEN`
    pub fn build(data: &EventData) -> Result<Snapshot, SnapshotError> {
        let event = &data.event;
        let event_id = &event.id;

        if event.raffle_status != RaffleStatus::RegistrationOpen {
            return Err(SnapshotError::NotEligible {
                event_id: event_id.clone(),
                reason: IneligibleReason::Status(event.raffle_status),
            });
        }

        let inconsistent = |detail: String| SnapshotError::Inconsistent {
            event_id: event_id.clone(),
            detail,
        };

        let mut quotas: BTreeMap<&QuotaId, SnapshotQuota> = BTreeMap::new();
        for quota in &data.quotas {
            if &quota.event_id != event_id {
                return Err(inconsistent(format!(
                    "quota {} belongs to event {}",
                    quota.id, quota.event_id
                )));
            }
            if quota.id.is_open() {
                return Err(inconsistent(format!(
                    "quota id {} is reserved for the open quota",
                    quota.id
                )));
            }
            let entry = SnapshotQuota {
                quota_id: quota.id.clone(),
                sort_id: quota.sort_id,
                capacity: quota.size,
                entrants: Vec::new(),
            };
            if quotas.insert(&quota.id, entry).is_some() {
                return Err(inconsistent(format!("duplicate quota {}", quota.id)));
            }
        }

        let mut seen = HashSet::with_capacity(data.signups.len());
        for signup in &data.signups {
            if !seen.insert(&signup.id) {
                return Err(inconsistent(format!("duplicate signup {}", signup.id)));
            }
            if &signup.event_id != event_id {
                return Err(inconsistent(format!(
                    "signup {} belongs to event {}",
                    signup.id, signup.event_id
                )));
            }
            if signup.status != SignupStatus::Pending {
                continue;
            }
            let quota = quotas
                .get_mut(&signup.quota_id)
                .ok_or_else(|| SnapshotError::NotEligible {
                    event_id: event_id.clone(),
                    reason: IneligibleReason::MissingQuota {
                        quota_id: signup.quota_id.clone(),
                        signup_id: signup.id.clone(),
                    },
                })?;
            quota
                .entrants
                .push(Entrant::new(signup.id.clone(), signup.registration_intent));
        }

        let mut quotas: Vec<SnapshotQuota> = quotas.into_values().collect();
        for quota in &mut quotas {
            sort_entrants(&mut quota.entrants);
        }
        // BTreeMap already ordered by id; a stable sort on sort_id keeps that as the tie-break
        quotas.sort_by_key(|q| q.sort_id);

        log::debug!(
            "Snapshot for {event_id}: {} quotas, {} pending signups",
            quotas.len(),
            quotas.iter().map(|q| q.entrants.len()).sum::<usize>()
        );

        Ok(Snapshot {
            event_id: event_id.clone(),
            quotas,
            open_quota_size: event.open_quota_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use raffle_core::{Event, Quota, Signup};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_767_225_600 + secs, 0).unwrap()
    }

    fn open_event() -> Event {
        let mut event = Event::new("e1");
        event.raffle_status = RaffleStatus::RegistrationOpen;
        event.open_quota_size = 3;
        event
    }

    fn data() -> EventData {
        EventData::new(open_event())
            .with_quota(Quota::new("b", "e1", Some(2)).with_sort_id(1))
            .with_quota(Quota::new("a", "e1", None).with_sort_id(1))
            .with_quota(Quota::new("z", "e1", Some(5)).with_sort_id(0))
            .with_signup(Signup::pending("s3", "e1", "b", at(30)))
            .with_signup(Signup::pending("s1", "e1", "b", at(10)))
            .with_signup(Signup::pending("s2", "e1", "b", at(10)))
            .with_signup(Signup::pending("s4", "e1", "a", at(5)))
    }

    #[test]
    fn test_orders_quotas_and_entrants() {
        let snapshot = SnapshotBuilder::build(&data()).unwrap();

        let quota_ids: Vec<&str> = snapshot.quotas.iter().map(|q| q.quota_id.as_str()).collect();
        assert_eq!(quota_ids, ["z", "a", "b"]);

        let b = snapshot.quota(&QuotaId::new("b")).unwrap();
        let ids: Vec<&str> = b.entrants.iter().map(|e| e.signup_id.as_str()).collect();
        assert_eq!(ids, ["s1", "s2", "s3"]);

        assert_eq!(snapshot.open_quota_size, 3);
        assert_eq!(snapshot.entrant_count(), 4);
    }

    #[test]
    fn test_insertion_order_does_not_matter() {
        let mut reversed = data();
        reversed.quotas.reverse();
        reversed.signups.reverse();
        assert_eq!(
            SnapshotBuilder::build(&data()).unwrap(),
            SnapshotBuilder::build(&reversed).unwrap()
        );
    }

    #[test]
    fn test_skips_non_pending() {
        let mut d = data();
        d.signups[0].status = SignupStatus::Confirmed;
        let snapshot = SnapshotBuilder::build(&d).unwrap();
        assert_eq!(snapshot.entrant_count(), 3);
    }

    #[test]
    fn test_rejects_wrong_status() {
        let mut d = data();
        d.event.raffle_status = RaffleStatus::Completed;
        let err = SnapshotBuilder::build(&d).unwrap_err();
        assert_eq!(
            err,
            SnapshotError::NotEligible {
                event_id: EventId::new("e1"),
                reason: IneligibleReason::Status(RaffleStatus::Completed),
            }
        );
    }

    #[test]
    fn test_rejects_missing_quota() {
        let d = data().with_signup(Signup::pending("s9", "e1", "gone", at(1)));
        let err = SnapshotBuilder::build(&d).unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::NotEligible {
                reason: IneligibleReason::MissingQuota { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_duplicates_and_reserved_id() {
        let dup = data().with_quota(Quota::new("a", "e1", Some(1)));
        assert!(matches!(
            SnapshotBuilder::build(&dup),
            Err(SnapshotError::Inconsistent { .. })
        ));

        let reserved = data().with_quota(Quota::new(QuotaId::open(), "e1", Some(1)));
        assert!(matches!(
            SnapshotBuilder::build(&reserved),
            Err(SnapshotError::Inconsistent { .. })
        ));

        let dup_signup = data().with_signup(Signup::pending("s1", "e1", "a", at(99)));
        assert!(matches!(
            SnapshotBuilder::build(&dup_signup),
            Err(SnapshotError::Inconsistent { .. })
        ));
    }
}
