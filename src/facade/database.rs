use crate::config::ArchiverConfig;
use crate::core::{ArchiveError, EventRecord, MoveOutcome, Result, UserId};
use crate::storage::{
    DurabilityMode, InMemoryStorage, PersistenceManager, WalEntry, validate_collection_name,
};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

use super::collection::CollectionHandle;

/// Embedded document store holding named event collections.
///
/// Every mutation takes the persistence lock before any collection lock,
/// so WAL order always matches the order mutations are applied.
pub struct DocumentDb {
    storage: InMemoryStorage,
    /// Persistence manager for WAL and snapshots (None for in-memory mode)
    persistence: Option<Arc<Mutex<PersistenceManager>>>,
    closed: AtomicBool,
}

impl DocumentDb {
    /// Purely in-memory store with the given collections.
    pub fn in_memory(collections: &[&str]) -> Result<Self> {
        let mut storage = InMemoryStorage::new();
        for name in collections {
            storage.create_collection(name)?;
        }
        Ok(Self {
            storage,
            persistence: None,
            closed: AtomicBool::new(false),
        })
    }

    /// Open the file-backed store described by `config`, recovering any
    /// snapshot and WAL found in its data directory.
    ///
    /// Any failure to reach or read the data directory is reported as
    /// `StoreUnavailable`.
    pub async fn open(config: &ArchiverConfig) -> Result<Self> {
        let collections = [
            config.active_collection.as_str(),
            config.archive_collection.as_str(),
        ];
        Self::open_path(
            &config.data_dir,
            config.durability,
            config.checkpoint_threshold,
            &collections,
        )
        .await
    }

    pub async fn open_path<P: AsRef<Path>>(
        data_dir: P,
        durability: DurabilityMode,
        checkpoint_threshold: usize,
        collections: &[&str],
    ) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        let unavailable = |e: ArchiveError| {
            ArchiveError::StoreUnavailable(format!("{}: {}", data_dir.display(), e))
        };

        let mut persistence = PersistenceManager::new(data_dir, durability).map_err(unavailable)?;
        persistence.wal_mut().set_checkpoint_threshold(checkpoint_threshold);

        let mut storage = InMemoryStorage::new();
        if let Some(recovered) = persistence.recover().map_err(unavailable)? {
            tracing::info!(
                path = %data_dir.display(),
                collections = recovered.len(),
                "Recovered document store from disk"
            );
            storage.restore_collections(recovered);
        }

        for name in collections {
            if !storage.collection_exists(name) {
                validate_collection_name(name)?;
                persistence
                    .log(&WalEntry::CreateCollection {
                        name: name.to_string(),
                    })
                    .map_err(unavailable)?;
                storage.create_collection(name)?;
            }
        }

        Ok(Self {
            storage,
            persistence: Some(Arc::new(Mutex::new(persistence))),
            closed: AtomicBool::new(false),
        })
    }

    /// Connectivity check.
    pub fn ping(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ArchiveError::StoreUnavailable("store is closed".to_string()));
        }
        Ok(())
    }

    /// Mark the store closed. Every later operation fails with
    /// `StoreUnavailable`.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_persistent(&self) -> bool {
        self.persistence.is_some()
    }

    pub fn collection_exists(&self, name: &str) -> bool {
        self.storage.collection_exists(name)
    }

    pub fn list_collections(&self) -> Vec<String> {
        self.storage.list_collections()
    }

    /// Handle to a collection usable as an `EventStore` or `ArchiveStore`.
    pub fn collection(self: &Arc<Self>, name: &str) -> Result<CollectionHandle> {
        self.storage.get_collection(name)?;
        Ok(CollectionHandle::new(Arc::clone(self), name))
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub async fn scan(&self, collection: &str) -> Result<Vec<EventRecord>> {
        self.ping()?;
        let handle = self.storage.get_collection(collection)?;
        let coll = handle.read().await;
        Ok(coll.scan())
    }

    pub async fn find_one(&self, collection: &str, user_id: &UserId) -> Result<Option<EventRecord>> {
        self.ping()?;
        let handle = self.storage.get_collection(collection)?;
        let coll = handle.read().await;
        Ok(coll.first_for_user(user_id).cloned())
    }

    pub async fn find_user(&self, collection: &str, user_id: &UserId) -> Result<Vec<EventRecord>> {
        self.ping()?;
        let handle = self.storage.get_collection(collection)?;
        let coll = handle.read().await;
        Ok(coll.records_for_user(user_id))
    }

    pub async fn count(&self, collection: &str) -> Result<usize> {
        self.ping()?;
        let handle = self.storage.get_collection(collection)?;
        let coll = handle.read().await;
        Ok(coll.len())
    }

    pub async fn stats(&self) -> Result<Vec<CollectionStats>> {
        self.ping()?;
        let mut stats = Vec::new();
        for name in self.storage.list_collections() {
            let handle = self.storage.get_collection(&name)?;
            let coll = handle.read().await;
            stats.push(CollectionStats {
                name,
                record_count: coll.len(),
                user_count: coll.user_count(),
            });
        }
        Ok(stats)
    }

    // ========================================================================
    // Writes
    // ========================================================================

    pub async fn insert(&self, collection: &str, record: EventRecord) -> Result<()> {
        self.insert_many(collection, vec![record]).await
    }

    pub async fn insert_many(&self, collection: &str, records: Vec<EventRecord>) -> Result<()> {
        self.ping()?;
        let handle = self.storage.get_collection(collection)?;
        {
            let mut persistence = self.lock_persistence().await;
            let mut coll = handle.write().await;
            for record in records {
                // 1. Log to WAL BEFORE making changes
                if let Some(persistence) = persistence.as_mut() {
                    persistence.log(&WalEntry::Insert {
                        collection: collection.to_string(),
                        record: record.clone(),
                    })?;
                }
                // 2. Apply
                coll.insert(record);
            }
        }
        self.maybe_checkpoint().await;
        Ok(())
    }

    pub async fn delete_many(&self, collection: &str, user_id: &UserId) -> Result<usize> {
        self.ping()?;
        let handle = self.storage.get_collection(collection)?;
        let deleted = {
            let mut persistence = self.lock_persistence().await;
            let mut coll = handle.write().await;
            if !coll.contains_user(user_id) {
                return Ok(0);
            }
            if let Some(persistence) = persistence.as_mut() {
                persistence.log(&WalEntry::DeleteUser {
                    collection: collection.to_string(),
                    user_id: user_id.clone(),
                })?;
            }
            coll.delete_user(user_id)
        };
        self.maybe_checkpoint().await;
        Ok(deleted)
    }

    /// Move a user from `from` to `to` as one unit: the earliest-inserted
    /// record is inserted into `to` and every record of the user is removed
    /// from `from`. Both collections stay write-locked for the whole move and
    /// the move is logged as a single WAL entry, so no reader or recovery can
    /// observe it half done.
    pub async fn move_user(&self, from: &str, to: &str, user_id: &UserId) -> Result<MoveOutcome> {
        self.ping()?;
        if from == to {
            return Err(ArchiveError::WriteFailed(format!(
                "cannot move user '{}' within collection '{}'",
                user_id, from
            )));
        }
        let source_handle = self.storage.get_collection(from)?;
        let target_handle = self.storage.get_collection(to)?;

        let outcome = {
            let mut persistence = self.lock_persistence().await;

            // Lock in name order
            let (mut source, mut target) = if from < to {
                let source = source_handle.write().await;
                let target = target_handle.write().await;
                (source, target)
            } else {
                let target = target_handle.write().await;
                let source = source_handle.write().await;
                (source, target)
            };

            let Some(record) = source.first_for_user(user_id).cloned() else {
                return Ok(MoveOutcome::Missing);
            };

            if let Some(persistence) = persistence.as_mut() {
                persistence.log(&WalEntry::MoveUser {
                    from: from.to_string(),
                    to: to.to_string(),
                    user_id: user_id.clone(),
                    record: record.clone(),
                })?;
            }

            target.insert(record);
            let deleted = source.delete_user(user_id);
            MoveOutcome::Moved { deleted }
        };

        self.maybe_checkpoint().await;
        Ok(outcome)
    }

    // ========================================================================
    // Persistence Management
    // ========================================================================

    /// Write a snapshot and truncate the WAL.
    pub async fn checkpoint(&self) -> Result<()> {
        if let Some(ref persistence) = self.persistence {
            let mut guard = persistence.lock().await;
            let collections = self.storage.get_all_collections().await;
            guard.checkpoint(collections)?;
            tracing::debug!("Checkpoint written");
        }
        Ok(())
    }

    /// Runs after a mutation is already logged and applied. A failure here
    /// loses nothing, so it is logged and the next mutation retries.
    async fn maybe_checkpoint(&self) {
        if let Some(ref persistence) = self.persistence {
            let mut guard = persistence.lock().await;
            if guard.needs_checkpoint() {
                let collections = self.storage.get_all_collections().await;
                match guard.checkpoint(collections) {
                    Ok(()) => tracing::debug!("Automatic checkpoint written"),
                    Err(e) => tracing::warn!(error = %e, "Automatic checkpoint failed"),
                }
            }
        }
    }

    async fn lock_persistence(&self) -> Option<tokio::sync::MutexGuard<'_, PersistenceManager>> {
        match self.persistence {
            Some(ref persistence) => Some(persistence.lock().await),
            None => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionStats {
    pub name: String,
    pub record_count: usize,
    pub user_count: usize,
}

impl std::fmt::Display for CollectionStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Collection '{}': {} records, {} users",
            self.name, self.record_count, self.user_count
        )
    }
}
