//! Inactivity selection
//!
//! Groups the active event records by user, keeps the most recent event of
//! each user, and selects users whose last event and registration date both
//! fall strictly before their cutoffs.

use crate::core::{EventRecord, RecordId, Result, UserId, UserSnapshot};
use crate::storage::EventStore;
use chrono::{DateTime, Duration, Utc};
use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// The two instants a user is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cutoffs {
    /// Last activity must be strictly before this instant
    pub inactivity: DateTime<Utc>,
    /// Registration must be strictly before this instant
    pub registration: DateTime<Utc>,
}

impl Cutoffs {
    pub fn new(inactivity: DateTime<Utc>, registration: DateTime<Utc>) -> Self {
        Self {
            inactivity,
            registration,
        }
    }

    /// `now - inactivity_days` and `now - registration_days`.
    pub fn from_now(now: DateTime<Utc>, inactivity_days: u32, registration_days: u32) -> Self {
        Self {
            inactivity: now - Duration::days(i64::from(inactivity_days)),
            registration: now - Duration::days(i64::from(registration_days)),
        }
    }

    pub fn matches(&self, snapshot: &UserSnapshot) -> bool {
        snapshot.last_event < self.inactivity
            && snapshot.user_info.registration_date < self.registration
    }
}

/// Per-user aggregate of the given records.
///
/// The representative record of a user is the one with the greatest
/// `event_time`; among records with the same time the smallest record id
/// wins, so the result does not depend on the order of `records`.
pub fn summarize<I>(records: I) -> HashMap<UserId, UserSnapshot>
where
    I: IntoIterator<Item = EventRecord>,
{
    // (snapshot, record id of the representative)
    let mut latest: HashMap<UserId, (UserSnapshot, RecordId)> = HashMap::new();

    for record in records {
        match latest.entry(record.user_id.clone()) {
            Entry::Vacant(slot) => {
                let id = record.id;
                slot.insert((snapshot_of(record), id));
            }
            Entry::Occupied(mut slot) => {
                let (current, current_id) = slot.get();
                let newer = record.event_time > current.last_event
                    || (record.event_time == current.last_event && record.id < *current_id);
                if newer {
                    let id = record.id;
                    slot.insert((snapshot_of(record), id));
                }
            }
        }
    }

    latest
        .into_iter()
        .map(|(user_id, (snapshot, _))| (user_id, snapshot))
        .collect()
}

fn snapshot_of(record: EventRecord) -> UserSnapshot {
    UserSnapshot {
        user_id: record.user_id,
        last_event: record.event_time,
        user_info: record.user_info,
    }
}

/// Read-only selection of archival candidates from an event store.
pub struct InactivitySelector {
    store: Arc<dyn EventStore>,
}

impl InactivitySelector {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// Distinct users whose most recent event is before `cutoffs.inactivity`
    /// and whose most recent event's registration date is before
    /// `cutoffs.registration`. Fails as a whole if the store cannot be read.
    pub async fn select(&self, cutoffs: &Cutoffs) -> Result<BTreeSet<UserId>> {
        let records = self.store.scan().await?;
        let scanned = records.len();

        let users = summarize(records);
        let total_users = users.len();

        let candidates: BTreeSet<UserId> = users
            .into_values()
            .filter(|snapshot| cutoffs.matches(snapshot))
            .map(|snapshot| snapshot.user_id)
            .collect();

        tracing::info!(
            records = scanned,
            users = total_users,
            candidates = candidates.len(),
            inactivity_cutoff = %cutoffs.inactivity,
            registration_cutoff = %cutoffs.registration,
            "Selected inactive users"
        );

        Ok(candidates)
    }
}
