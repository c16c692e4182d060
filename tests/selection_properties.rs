//! Property tests for inactivity selection

use chrono::{DateTime, Duration, TimeZone, Utc};
use event_archiver::{
    Cutoffs, DocumentDb, EventRecord, EventStore, InactivitySelector, RecordId, UserId,
};
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use uuid::Uuid;

const ACTIVE: &str = "user_events";

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
}

/// (user, event day, registration day, id seed). Small day ranges make
/// equal event times common and hit both cutoffs exactly.
fn events() -> impl Strategy<Value = Vec<(u8, i64, i64, u32)>> {
    prop::collection::vec((0u8..6, 0i64..30, 0i64..60, any::<u32>()), 0..40)
}

fn build(events: &[(u8, i64, i64, u32)]) -> Vec<EventRecord> {
    // event days span 2024-05-03 .. 2024-06-01, registration days 2024-04-03 .. 2024-06-01
    let event_base = now() - Duration::days(29);
    let registration_base = now() - Duration::days(59);

    events
        .iter()
        .enumerate()
        .map(|(i, &(user, event_day, reg_day, seed))| {
            let mut record = EventRecord::new(
                format!("u{}", user),
                event_base + Duration::days(event_day),
                registration_base + Duration::days(reg_day),
            );
            record.id = RecordId::from_uuid(Uuid::from_u128(((seed as u128) << 32) | i as u128));
            record
        })
        .collect()
}

/// Latest event per user, ties to the smallest record id, then strict
/// comparison against both cutoffs.
fn expected(records: &[EventRecord], cutoffs: &Cutoffs) -> BTreeSet<UserId> {
    let mut by_user: HashMap<&UserId, Vec<&EventRecord>> = HashMap::new();
    for record in records {
        by_user.entry(&record.user_id).or_default().push(record);
    }

    by_user
        .into_iter()
        .filter_map(|(user_id, mut events)| {
            events.sort_by(|a, b| b.event_time.cmp(&a.event_time).then(a.id.cmp(&b.id)));
            let latest = events[0];
            let inactive = latest.event_time < cutoffs.inactivity
                && latest.user_info.registration_date < cutoffs.registration;
            inactive.then(|| user_id.clone())
        })
        .collect()
}

fn select(records: Vec<EventRecord>, cutoffs: &Cutoffs) -> BTreeSet<UserId> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    runtime.block_on(async {
        let db = Arc::new(DocumentDb::in_memory(&[ACTIVE]).unwrap());
        db.insert_many(ACTIVE, records).await.unwrap();
        let store: Arc<dyn EventStore> = Arc::new(db.collection(ACTIVE).unwrap());
        InactivitySelector::new(store).select(cutoffs).await.unwrap()
    })
}

proptest! {
    #[test]
    fn selection_matches_latest_event_rule(events in events()) {
        let cutoffs = Cutoffs::from_now(now(), 14, 30);
        let records = build(&events);

        let want = expected(&records, &cutoffs);
        prop_assert_eq!(select(records, &cutoffs), want);
    }

    #[test]
    fn selection_ignores_insertion_order(events in events()) {
        let cutoffs = Cutoffs::from_now(now(), 14, 30);
        let records = build(&events);
        let mut reversed = records.clone();
        reversed.reverse();

        prop_assert_eq!(select(records, &cutoffs), select(reversed, &cutoffs));
    }
}
