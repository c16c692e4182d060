//! End-to-end archival runs against the in-memory document store

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use event_archiver::{
    ArchivalJob, ArchiveError, ArchiveStore, ArchiverConfig, Archiver, ArchiveStrategy,
    CollectionHandle, Cutoffs, DocumentDb, EventRecord, EventStore, InactivitySelector, RecordId,
    Result, UserId,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

const ACTIVE: &str = "user_events";
const ARCHIVE: &str = "archived_users";

fn at(month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, month, day, 0, 0, 0).unwrap()
}

fn now() -> DateTime<Utc> {
    at(6, 1)
}

fn ids(users: &[&str]) -> Vec<UserId> {
    users.iter().map(|u| UserId::from(*u)).collect()
}

async fn seeded_db() -> Arc<DocumentDb> {
    let db = Arc::new(DocumentDb::in_memory(&[ACTIVE, ARCHIVE]).unwrap());
    db.insert_many(
        ACTIVE,
        vec![
            // inactive since May 1st, registered in March
            EventRecord::new("u1", at(4, 20), at(3, 1)),
            EventRecord::new("u1", at(5, 1), at(3, 1)),
            // active two days ago
            EventRecord::new("u2", at(5, 30), at(1, 10)),
            // inactive but registered too recently
            EventRecord::new("u3", at(5, 10), at(5, 20)),
            // inactive, will be removed by someone else mid-run
            EventRecord::new("u4", at(4, 1), at(2, 1)),
        ],
    )
    .await
    .unwrap();
    db
}

fn job(db: &Arc<DocumentDb>, strategy: ArchiveStrategy) -> ArchivalJob {
    let config = ArchiverConfig::new().strategy(strategy);
    ArchivalJob::from_db(db.clone(), &config).unwrap()
}

#[tokio::test]
async fn test_inactive_user_is_archived() {
    let db = seeded_db().await;
    let report = job(&db, ArchiveStrategy::Atomic).run_at(now()).await.unwrap();

    assert_eq!(report.date, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
    assert_eq!(report.archived_user_ids, ids(&["u1", "u4"]));
    assert_eq!(report.archived_user_count, 2);

    let u1 = UserId::from("u1");
    assert!(db.find_user(ACTIVE, &u1).await.unwrap().is_empty());
    // only the representative record lands in the archive
    assert_eq!(db.find_user(ARCHIVE, &u1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_recently_active_user_is_kept() {
    let db = seeded_db().await;
    job(&db, ArchiveStrategy::Atomic).run_at(now()).await.unwrap();

    let u2 = UserId::from("u2");
    assert_eq!(db.find_user(ACTIVE, &u2).await.unwrap().len(), 1);
    assert!(db.find_user(ARCHIVE, &u2).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_recently_registered_user_is_kept() {
    let db = seeded_db().await;
    let report = job(&db, ArchiveStrategy::Sequential).run_at(now()).await.unwrap();

    let u3 = UserId::from("u3");
    assert!(!report.archived_user_ids.contains(&u3));
    assert_eq!(db.find_user(ACTIVE, &u3).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_candidate_deleted_before_archival_is_skipped() {
    let db = seeded_db().await;
    let active: Arc<dyn EventStore> = Arc::new(db.collection(ACTIVE).unwrap());
    let selector = InactivitySelector::new(active);

    let candidates = selector
        .select(&Cutoffs::from_now(now(), 14, 30))
        .await
        .unwrap();
    assert_eq!(candidates.iter().cloned().collect::<Vec<_>>(), ids(&["u1", "u4"]));

    // removed by another process between selection and archival
    db.delete_many(ACTIVE, &UserId::from("u4")).await.unwrap();

    let archiver = Archiver::atomic(db.clone(), ACTIVE, ARCHIVE);
    let outcome = archiver.archive(candidates).await.unwrap();

    assert_eq!(outcome.archived_ids, ids(&["u1"]));
    assert_eq!(outcome.archived_count, 1);
    assert!(db.find_user(ARCHIVE, &UserId::from("u4")).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_strategies_agree() {
    let atomic_db = seeded_db().await;
    let sequential_db = seeded_db().await;

    let atomic = job(&atomic_db, ArchiveStrategy::Atomic).run_at(now()).await.unwrap();
    let sequential = job(&sequential_db, ArchiveStrategy::Sequential)
        .run_at(now())
        .await
        .unwrap();

    assert_eq!(atomic, sequential);
    assert_eq!(
        atomic_db.count(ACTIVE).await.unwrap(),
        sequential_db.count(ACTIVE).await.unwrap()
    );
    assert_eq!(
        atomic_db.count(ARCHIVE).await.unwrap(),
        sequential_db.count(ARCHIVE).await.unwrap()
    );
}

#[tokio::test]
async fn test_archived_and_active_users_are_disjoint() {
    let db = seeded_db().await;
    let report = job(&db, ArchiveStrategy::Atomic).run_at(now()).await.unwrap();

    let active: BTreeSet<UserId> = db.scan(ACTIVE).await.unwrap().into_iter().map(|r| r.user_id).collect();
    let archived: BTreeSet<UserId> = db.scan(ARCHIVE).await.unwrap().into_iter().map(|r| r.user_id).collect();

    assert!(active.is_disjoint(&archived));
    assert_eq!(archived, report.archived_user_ids.iter().cloned().collect());
}

#[tokio::test]
async fn test_second_run_archives_nothing() {
    let db = seeded_db().await;
    let job = job(&db, ArchiveStrategy::Atomic);
    job.run_at(now()).await.unwrap();

    let report = job.run_at(now()).await.unwrap();
    assert_eq!(report.archived_user_count, 0);
    assert!(report.archived_user_ids.is_empty());
}

#[tokio::test]
async fn test_cutoff_boundaries_are_strict() {
    let db = Arc::new(DocumentDb::in_memory(&[ACTIVE, ARCHIVE]).unwrap());
    db.insert_many(
        ACTIVE,
        vec![
            // last event exactly at the inactivity cutoff
            EventRecord::new("edge_event", at(5, 18), at(1, 1)),
            // registered exactly at the registration cutoff
            EventRecord::new("edge_reg", at(4, 1), at(5, 2)),
            // one second past both
            EventRecord::new(
                "inside",
                at(5, 18) - chrono::Duration::seconds(1),
                at(5, 2) - chrono::Duration::seconds(1),
            ),
        ],
    )
    .await
    .unwrap();

    let report = job(&db, ArchiveStrategy::Atomic).run_at(now()).await.unwrap();
    assert_eq!(report.archived_user_ids, ids(&["inside"]));
}

#[tokio::test]
async fn test_latest_event_decides_user_info() {
    let db = Arc::new(DocumentDb::in_memory(&[ACTIVE, ARCHIVE]).unwrap());
    db.insert_many(
        ACTIVE,
        vec![
            // older record claims a recent registration, newest one an old one
            EventRecord::new("u5", at(4, 1), at(5, 25)),
            EventRecord::new("u5", at(4, 10), at(1, 1)),
            // reverse situation: newest record says recently registered
            EventRecord::new("u6", at(4, 1), at(1, 1)),
            EventRecord::new("u6", at(4, 10), at(5, 25)),
        ],
    )
    .await
    .unwrap();

    let planned = job(&db, ArchiveStrategy::Atomic).plan_at(now()).await.unwrap();
    assert_eq!(planned.into_iter().collect::<Vec<_>>(), ids(&["u5"]));
}

#[tokio::test]
async fn test_equal_event_times_pick_smallest_record_id() {
    let mut recent = EventRecord::new("u7", at(4, 10), at(5, 25));
    recent.id = RecordId::from_uuid(Uuid::from_u128(1));
    let mut old = EventRecord::new("u7", at(4, 10), at(1, 1));
    old.id = RecordId::from_uuid(Uuid::from_u128(2));

    let db = Arc::new(DocumentDb::in_memory(&[ACTIVE, ARCHIVE]).unwrap());
    db.insert_many(ACTIVE, vec![old, recent]).await.unwrap();

    // the record with the smaller id says "registered recently"
    let planned = job(&db, ArchiveStrategy::Atomic).plan_at(now()).await.unwrap();
    assert!(planned.is_empty());
}

#[tokio::test]
async fn test_empty_store_produces_empty_report() {
    let db = Arc::new(DocumentDb::in_memory(&[ACTIVE, ARCHIVE]).unwrap());
    let report = job(&db, ArchiveStrategy::Atomic).run_at(now()).await.unwrap();

    assert_eq!(report.archived_user_count, 0);
    assert_eq!(
        report.to_json().unwrap(),
        "{\n    \"date\": \"2024-06-01\",\n    \"archived_user_count\": 0,\n    \"archived_user_ids\": []\n}"
    );
}

#[tokio::test]
async fn test_closed_store_fails_selection() {
    let db = seeded_db().await;
    db.close();

    let err = job(&db, ArchiveStrategy::Atomic).run_at(now()).await.unwrap_err();
    assert!(matches!(err, ArchiveError::StoreUnavailable(_)));
    assert!(err.is_connectivity());
}

/// Archive store that rejects inserts after a number of successes.
struct FlakyArchive {
    inner: CollectionHandle,
    allowed: usize,
    inserts: AtomicUsize,
}

#[async_trait]
impl ArchiveStore for FlakyArchive {
    async fn insert_one(&self, record: EventRecord) -> Result<()> {
        if self.inserts.fetch_add(1, Ordering::SeqCst) >= self.allowed {
            return Err(ArchiveError::WriteFailed("archive is read-only".to_string()));
        }
        self.inner.insert_one(record).await
    }

    async fn count(&self) -> Result<usize> {
        ArchiveStore::count(&self.inner).await
    }
}

#[tokio::test]
async fn test_write_failure_aborts_and_keeps_earlier_users() {
    let db = seeded_db().await;
    let active = Arc::new(db.collection(ACTIVE).unwrap());
    let archive = Arc::new(FlakyArchive {
        inner: db.collection(ARCHIVE).unwrap(),
        allowed: 1,
        inserts: AtomicUsize::new(0),
    });

    let selector = InactivitySelector::new(active.clone());
    let candidates = selector
        .select(&Cutoffs::from_now(now(), 14, 30))
        .await
        .unwrap();

    let err = Archiver::sequential(active, archive)
        .archive(candidates)
        .await
        .unwrap_err();

    match err {
        ArchiveError::Aborted {
            user_id,
            archived,
            source,
        } => {
            assert_eq!(user_id, UserId::from("u4"));
            assert_eq!(archived, ids(&["u1"]));
            assert!(matches!(*source, ArchiveError::WriteFailed(_)));
        }
        other => panic!("expected Aborted, got {:?}", other),
    }

    // u1 stays archived, u4 was never deleted
    assert_eq!(db.find_user(ARCHIVE, &UserId::from("u1")).await.unwrap().len(), 1);
    assert_eq!(db.find_user(ACTIVE, &UserId::from("u4")).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_attributes_survive_archival() {
    let db = Arc::new(DocumentDb::in_memory(&[ACTIVE, ARCHIVE]).unwrap());
    db.insert(
        ACTIVE,
        EventRecord::new("u8", at(4, 1), at(1, 1)).with_attribute("event_type", serde_json::json!("login")),
    )
    .await
    .unwrap();

    job(&db, ArchiveStrategy::Atomic).run_at(now()).await.unwrap();

    let archived = db.scan(ARCHIVE).await.unwrap();
    assert_eq!(archived.len(), 1);
    assert_eq!(archived[0].attributes["event_type"], serde_json::json!("login"));
}
