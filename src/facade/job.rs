use super::database::DocumentDb;
use crate::archiver::Archiver;
use crate::config::{ArchiveStrategy, ArchiverConfig};
use crate::core::{Result, UserId};
use crate::report::ArchivalReport;
use crate::selector::{Cutoffs, InactivitySelector};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;

/// One archival run: select, archive, summarize.
///
/// The job produces the report value but never writes it; the caller
/// persists it only once the run has succeeded.
pub struct ArchivalJob {
    selector: InactivitySelector,
    archiver: Archiver,
    inactivity_days: u32,
    registration_days: u32,
}

impl ArchivalJob {
    pub fn new(
        selector: InactivitySelector,
        archiver: Archiver,
        inactivity_days: u32,
        registration_days: u32,
    ) -> Self {
        Self {
            selector,
            archiver,
            inactivity_days,
            registration_days,
        }
    }

    /// Wire a job against the configured collections of `db`.
    pub fn from_db(db: Arc<DocumentDb>, config: &ArchiverConfig) -> Result<Self> {
        config.validate()?;
        let active = db.collection(&config.active_collection)?;
        let archive = db.collection(&config.archive_collection)?;

        let archiver = match config.strategy {
            ArchiveStrategy::Atomic => {
                Archiver::atomic(db, &config.active_collection, &config.archive_collection)
            }
            ArchiveStrategy::Sequential => {
                Archiver::sequential(Arc::new(active.clone()), Arc::new(archive))
            }
        };

        Ok(Self::new(
            InactivitySelector::new(Arc::new(active)),
            archiver,
            config.inactivity_days,
            config.registration_days,
        ))
    }

    pub fn cutoffs_at(&self, now: DateTime<Utc>) -> Cutoffs {
        Cutoffs::from_now(now, self.inactivity_days, self.registration_days)
    }

    /// Candidates that a run at `now` would archive. Read-only.
    pub async fn plan_at(&self, now: DateTime<Utc>) -> Result<BTreeSet<UserId>> {
        self.selector.select(&self.cutoffs_at(now)).await
    }

    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<ArchivalReport> {
        let cutoffs = self.cutoffs_at(now);
        tracing::info!(
            inactivity_days = self.inactivity_days,
            registration_days = self.registration_days,
            "Starting archival run"
        );

        let candidates = self.selector.select(&cutoffs).await?;
        let outcome = self.archiver.archive(candidates).await?;

        Ok(ArchivalReport::new(now.date_naive(), outcome.archived_ids))
    }

    pub async fn run(&self) -> Result<ArchivalReport> {
        self.run_at(Utc::now()).await
    }
}
