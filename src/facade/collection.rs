use super::database::DocumentDb;
use crate::core::{EventRecord, Result, UserId};
use crate::storage::{ArchiveStore, EventStore};
use async_trait::async_trait;
use std::sync::Arc;

/// Named collection of a `DocumentDb`.
///
/// Each call is an independent store operation; nothing here spans more
/// than one collection. Use `DocumentDb::move_user` for an atomic move.
#[derive(Clone)]
pub struct CollectionHandle {
    db: Arc<DocumentDb>,
    name: String,
}

impl CollectionHandle {
    pub(crate) fn new(db: Arc<DocumentDb>, name: &str) -> Self {
        Self {
            db,
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn count(&self) -> Result<usize> {
        self.db.count(&self.name).await
    }

    pub async fn find_user(&self, user_id: &UserId) -> Result<Vec<EventRecord>> {
        self.db.find_user(&self.name, user_id).await
    }

    pub async fn insert_many(&self, records: Vec<EventRecord>) -> Result<()> {
        self.db.insert_many(&self.name, records).await
    }
}

impl std::fmt::Debug for CollectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionHandle")
            .field("name", &self.name)
            .finish()
    }
}

#[async_trait]
impl EventStore for CollectionHandle {
    async fn scan(&self) -> Result<Vec<EventRecord>> {
        self.db.scan(&self.name).await
    }

    async fn find_one(&self, user_id: &UserId) -> Result<Option<EventRecord>> {
        self.db.find_one(&self.name, user_id).await
    }

    async fn delete_many(&self, user_id: &UserId) -> Result<usize> {
        self.db.delete_many(&self.name, user_id).await
    }

    async fn count(&self) -> Result<usize> {
        self.db.count(&self.name).await
    }
}

#[async_trait]
impl ArchiveStore for CollectionHandle {
    async fn insert_one(&self, record: EventRecord) -> Result<()> {
        self.db.insert(&self.name, record).await
    }

    async fn count(&self) -> Result<usize> {
        self.db.count(&self.name).await
    }
}
