use crate::core::{EventRecord, Result, UserId};
use async_trait::async_trait;

/// Active-event store consumed by selection and archival
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Read every event record
    async fn scan(&self) -> Result<Vec<EventRecord>>;

    /// Fetch one representative record of the user
    async fn find_one(&self, user_id: &UserId) -> Result<Option<EventRecord>>;

    /// Delete all records of the user, returning how many were removed
    async fn delete_many(&self, user_id: &UserId) -> Result<usize>;

    /// Number of stored records
    async fn count(&self) -> Result<usize>;
}

/// Archive store receiving records of archived users
#[async_trait]
pub trait ArchiveStore: Send + Sync {
    /// Insert a single record
    async fn insert_one(&self, record: EventRecord) -> Result<()>;

    /// Number of stored records
    async fn count(&self) -> Result<usize>;
}
