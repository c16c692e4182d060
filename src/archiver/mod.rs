//! Moves selected users from the active store to the archive store.
//!
//! Two move strategies are available:
//!
//! - [`SequentialMove`] - find one record, insert it into the archive, then
//!   delete every record of the user. Works with any pair of stores but a
//!   failure between the insert and the delete leaves the user in both.
//! - [`AtomicMove`] - both collections live in one [`DocumentDb`] and the
//!   move is applied and logged as a single unit.

use crate::core::{ArchiveError, MoveOutcome, Result, UserId};
use crate::facade::DocumentDb;
use crate::storage::{ArchiveStore, EventStore};
use async_trait::async_trait;
use std::sync::Arc;

/// How one user gets from the active store into the archive.
#[async_trait]
pub trait MoveStrategy: Send + Sync {
    async fn move_user(&self, user_id: &UserId) -> Result<MoveOutcome>;
}

/// Non-atomic fetch, insert, delete over two independent stores.
pub struct SequentialMove {
    active: Arc<dyn EventStore>,
    archive: Arc<dyn ArchiveStore>,
}

impl SequentialMove {
    pub fn new(active: Arc<dyn EventStore>, archive: Arc<dyn ArchiveStore>) -> Self {
        Self { active, archive }
    }
}

#[async_trait]
impl MoveStrategy for SequentialMove {
    async fn move_user(&self, user_id: &UserId) -> Result<MoveOutcome> {
        let Some(record) = self.active.find_one(user_id).await? else {
            return Ok(MoveOutcome::Missing);
        };
        self.archive.insert_one(record).await?;
        let deleted = self.active.delete_many(user_id).await?;
        Ok(MoveOutcome::Moved { deleted })
    }
}

/// Single-unit move between two collections of the same database.
pub struct AtomicMove {
    db: Arc<DocumentDb>,
    from: String,
    to: String,
}

impl AtomicMove {
    pub fn new(db: Arc<DocumentDb>, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            db,
            from: from.into(),
            to: to.into(),
        }
    }
}

#[async_trait]
impl MoveStrategy for AtomicMove {
    async fn move_user(&self, user_id: &UserId) -> Result<MoveOutcome> {
        self.db.move_user(&self.from, &self.to, user_id).await
    }
}

/// Users archived by one run, in candidate order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveOutcome {
    pub archived_ids: Vec<UserId>,
    pub archived_count: usize,
}

impl ArchiveOutcome {
    fn push(&mut self, user_id: UserId) {
        self.archived_ids.push(user_id);
        self.archived_count += 1;
    }
}

pub struct Archiver {
    mover: Arc<dyn MoveStrategy>,
}

impl Archiver {
    pub fn new(mover: Arc<dyn MoveStrategy>) -> Self {
        Self { mover }
    }

    pub fn sequential(active: Arc<dyn EventStore>, archive: Arc<dyn ArchiveStore>) -> Self {
        Self::new(Arc::new(SequentialMove::new(active, archive)))
    }

    pub fn atomic(db: Arc<DocumentDb>, from: &str, to: &str) -> Self {
        Self::new(Arc::new(AtomicMove::new(db, from, to)))
    }

    /// Archive each candidate in iteration order, one at a time.
    ///
    /// Candidates without any active record are skipped without error. The
    /// first store failure aborts the run; users archived before it stay
    /// archived and are listed in the returned `ArchiveError::Aborted`.
    pub async fn archive<I>(&self, candidates: I) -> Result<ArchiveOutcome>
    where
        I: IntoIterator<Item = UserId>,
    {
        let mut outcome = ArchiveOutcome::default();
        let mut skipped = 0usize;

        for user_id in candidates {
            match self.mover.move_user(&user_id).await {
                Ok(MoveOutcome::Moved { deleted }) => {
                    tracing::debug!(user_id = %user_id, deleted, "Archived user");
                    outcome.push(user_id);
                }
                Ok(MoveOutcome::Missing) => {
                    // Selected but gone by now; tolerated, not escalated
                    tracing::warn!(user_id = %user_id, "No active records left for candidate, skipping");
                    skipped += 1;
                }
                Err(source) => {
                    tracing::warn!(
                        user_id = %user_id,
                        archived = outcome.archived_count,
                        error = %source,
                        "Archival aborted"
                    );
                    return Err(ArchiveError::Aborted {
                        user_id,
                        archived: outcome.archived_ids,
                        source: Box::new(source),
                    });
                }
            }
        }

        tracing::info!(archived = outcome.archived_count, skipped, "Archival complete");
        Ok(outcome)
    }
}
