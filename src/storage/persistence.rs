//! Write-ahead log and snapshot files for the document store

use crate::core::{ArchiveError, EventRecord, Result, UserId};
use crate::storage::collection::Collection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub const WAL_FILE_NAME: &str = "events.wal";
pub const SNAPSHOT_FILE_NAME: &str = "events.snapshot";
pub const DEFAULT_CHECKPOINT_THRESHOLD: usize = 1000;

// ============================================================================
// WAL Entry Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WalEntry {
    CreateCollection { name: String },
    Insert { collection: String, record: EventRecord },
    DeleteUser { collection: String, user_id: UserId },
    /// Insert of the representative record and delete of all the user's
    /// records, logged and replayed as one unit.
    MoveUser {
        from: String,
        to: String,
        user_id: UserId,
        record: EventRecord,
    },
}

impl WalEntry {
    /// Applies the entry to recovered collections. Entries for unknown
    /// collections are ignored.
    fn apply(self, collections: &mut HashMap<String, Collection>) {
        match self {
            WalEntry::CreateCollection { name } => {
                collections
                    .entry(name.clone())
                    .or_insert_with(|| Collection::new(name));
            }
            WalEntry::Insert { collection, record } => {
                if let Some(coll) = collections.get_mut(&collection) {
                    coll.insert(record);
                }
            }
            WalEntry::DeleteUser { collection, user_id } => {
                if let Some(coll) = collections.get_mut(&collection) {
                    coll.delete_user(&user_id);
                }
            }
            WalEntry::MoveUser { from, to, user_id, record } => {
                if !collections.contains_key(&from) || !collections.contains_key(&to) {
                    return;
                }
                if let Some(target) = collections.get_mut(&to) {
                    target.insert(record);
                }
                if let Some(source) = collections.get_mut(&from) {
                    source.delete_user(&user_id);
                }
            }
        }
    }
}

// ============================================================================
// Database Snapshot
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSnapshot {
    pub version: u32,
    /// Last WAL entry already reflected in `collections`
    pub wal_lsn: u64,
    pub collections: HashMap<String, Collection>,
    pub metadata: SnapshotMetadata,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub created_at: u64,
    pub record_count: usize,
    pub collection_count: usize,
}

impl DatabaseSnapshot {
    pub fn new(collections: HashMap<String, Collection>, wal_lsn: u64) -> Self {
        let record_count = collections.values().map(|c| c.len()).sum();
        let collection_count = collections.len();

        Self {
            version: 2,
            wal_lsn,
            collections,
            metadata: SnapshotMetadata {
                created_at: unix_millis(),
                record_count,
                collection_count,
            },
        }
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ============================================================================
// Durability Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurabilityMode {
    /// fsync after every WAL append
    #[default]
    Sync,
    /// flush to the OS, no fsync
    Async,
    /// nothing is written to disk
    None,
}

impl std::str::FromStr for DurabilityMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sync" => Ok(Self::Sync),
            "async" => Ok(Self::Async),
            "none" => Ok(Self::None),
            other => Err(format!(
                "unknown durability '{}', expected 'sync', 'async' or 'none'",
                other
            )),
        }
    }
}

// ============================================================================
// WAL Manager
// ============================================================================

/// Frame written for each logged entry. `lsn` increases by one per entry
/// and keeps counting across checkpoints.
#[derive(Serialize)]
struct WalFrame<'a> {
    lsn: u64,
    entry: &'a WalEntry,
}

#[derive(Debug, Deserialize)]
pub struct WalRecord {
    pub lsn: u64,
    pub entry: WalEntry,
}

pub struct WalManager {
    wal_path: PathBuf,
    wal_file: Option<BufWriter<File>>,
    durability_mode: DurabilityMode,
    entries_since_checkpoint: usize,
    checkpoint_threshold: usize,
    next_lsn: u64,
}

impl WalManager {
    pub fn new<P: AsRef<Path>>(wal_path: P, durability_mode: DurabilityMode) -> Result<Self> {
        let wal_path = wal_path.as_ref().to_path_buf();
        if let Some(parent) = wal_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ArchiveError::Io(format!("Failed to create WAL directory: {}", e))
            })?;
        }

        let wal_file = if durability_mode != DurabilityMode::None {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&wal_path)
                .map_err(|e| ArchiveError::Io(format!("Failed to open WAL file: {}", e)))?;
            Some(BufWriter::new(file))
        } else {
            None
        };

        Ok(Self {
            wal_path,
            wal_file,
            durability_mode,
            entries_since_checkpoint: 0,
            checkpoint_threshold: DEFAULT_CHECKPOINT_THRESHOLD,
            next_lsn: 1,
        })
    }

    pub fn append(&mut self, entry: &WalEntry) -> Result<()> {
        if self.durability_mode == DurabilityMode::None {
            return Ok(());
        }
        let file = self
            .wal_file
            .as_mut()
            .ok_or_else(|| ArchiveError::WriteFailed("WAL file not initialized".to_string()))?;
        let frame = WalFrame {
            lsn: self.next_lsn,
            entry,
        };
        let serialized = rmp_serde::to_vec(&frame).map_err(|e| {
            ArchiveError::Serialization(format!("Failed to serialize WAL entry: {}", e))
        })?;
        let len = serialized.len() as u32;
        file.write_all(&len.to_le_bytes())
            .and_then(|_| file.write_all(&serialized))
            .and_then(|_| file.flush())
            .map_err(|e| ArchiveError::WriteFailed(format!("Failed to write WAL: {}", e)))?;
        if self.durability_mode == DurabilityMode::Sync {
            file.get_mut()
                .sync_all()
                .map_err(|e| ArchiveError::WriteFailed(format!("Failed to sync WAL: {}", e)))?;
        }
        self.next_lsn += 1;
        self.entries_since_checkpoint += 1;
        Ok(())
    }

    /// Reads every complete entry. A torn tail from an interrupted append
    /// is ignored.
    pub fn read_all(&self) -> Result<Vec<WalRecord>> {
        Ok(self.read_complete()?.0)
    }

    /// Reads every complete entry and cuts a torn tail off the file, so
    /// later appends directly follow the last complete entry.
    pub fn recover(&mut self) -> Result<Vec<WalRecord>> {
        let (records, complete_len) = self.read_complete()?;
        if !self.wal_path.exists() {
            return Ok(records);
        }

        let file_len = fs::metadata(&self.wal_path)
            .map_err(|e| ArchiveError::Io(format!("Failed to stat WAL: {}", e)))?
            .len();
        if file_len > complete_len {
            tracing::warn!(
                path = %self.wal_path.display(),
                dropped_bytes = file_len - complete_len,
                "Truncating torn WAL tail"
            );
            OpenOptions::new()
                .write(true)
                .open(&self.wal_path)
                .and_then(|f| f.set_len(complete_len))
                .map_err(|e| ArchiveError::Io(format!("Failed to truncate WAL: {}", e)))?;
        }
        Ok(records)
    }

    /// Complete entries and the byte length they occupy.
    fn read_complete(&self) -> Result<(Vec<WalRecord>, u64)> {
        if !self.wal_path.exists() {
            return Ok((Vec::new(), 0));
        }
        let file = File::open(&self.wal_path)
            .map_err(|e| ArchiveError::Io(format!("Failed to open WAL for reading: {}", e)))?;
        let mut reader = BufReader::new(file);
        let mut records = Vec::new();
        let mut complete_len = 0u64;
        loop {
            let mut len_bytes = [0u8; 4];
            match reader.read_exact(&mut len_bytes) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => {
                    return Err(ArchiveError::Io(format!(
                        "Failed to read WAL entry length: {}",
                        e
                    )));
                }
            }
            let len = u32::from_le_bytes(len_bytes) as usize;
            let mut data = vec![0u8; len];
            match reader.read_exact(&mut data) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    tracing::warn!(path = %self.wal_path.display(), "Ignoring truncated WAL entry");
                    break;
                }
                Err(e) => {
                    return Err(ArchiveError::Io(format!("Failed to read WAL entry data: {}", e)));
                }
            }
            let record: WalRecord = rmp_serde::from_slice(&data).map_err(|e| {
                ArchiveError::Serialization(format!("Failed to deserialize WAL entry: {}", e))
            })?;
            records.push(record);
            complete_len += (len_bytes.len() + len) as u64;
        }
        Ok((records, complete_len))
    }

    pub fn clear(&mut self) -> Result<()> {
        if self.durability_mode == DurabilityMode::None {
            return Ok(());
        }
        self.wal_file = None;
        let file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.wal_path)
            .map_err(|e| ArchiveError::Io(format!("Failed to truncate WAL: {}", e)))?;
        // Reopen in append mode so later writes never land at a stale offset
        drop(file);
        let file = OpenOptions::new()
            .append(true)
            .open(&self.wal_path)
            .map_err(|e| ArchiveError::Io(format!("Failed to reopen WAL: {}", e)))?;
        self.wal_file = Some(BufWriter::new(file));
        self.entries_since_checkpoint = 0;
        Ok(())
    }

    /// Sequence number of the most recently logged entry, 0 if none.
    pub fn last_lsn(&self) -> u64 {
        self.next_lsn - 1
    }

    fn resume_after(&mut self, lsn: u64) {
        self.next_lsn = self.next_lsn.max(lsn + 1);
    }

    pub fn needs_checkpoint(&self) -> bool {
        self.entries_since_checkpoint >= self.checkpoint_threshold
    }

    pub fn entries_since_checkpoint(&self) -> usize {
        self.entries_since_checkpoint
    }

    pub fn set_checkpoint_threshold(&mut self, threshold: usize) {
        self.checkpoint_threshold = threshold.max(1);
    }
}

// ============================================================================
// Snapshot Manager
// ============================================================================

pub struct SnapshotManager {
    snapshot_path: PathBuf,
}

impl SnapshotManager {
    pub fn new<P: AsRef<Path>>(snapshot_path: P) -> Self {
        Self {
            snapshot_path: snapshot_path.as_ref().to_path_buf(),
        }
    }

    pub fn save(&self, snapshot: &DatabaseSnapshot) -> Result<()> {
        let parent = self
            .snapshot_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)
            .map_err(|e| ArchiveError::Io(format!("Failed to create snapshot directory: {}", e)))?;

        let serialized = rmp_serde::to_vec(snapshot).map_err(|e| {
            ArchiveError::Serialization(format!("Failed to serialize snapshot: {}", e))
        })?;

        let mut temp = tempfile::NamedTempFile::new_in(parent)
            .map_err(|e| ArchiveError::Io(format!("Failed to create temp file: {}", e)))?;
        temp.write_all(&serialized)
            .and_then(|_| temp.flush())
            .and_then(|_| temp.as_file().sync_all())
            .map_err(|e| ArchiveError::Io(format!("Failed to write snapshot: {}", e)))?;
        temp.persist(&self.snapshot_path)
            .map_err(|e| ArchiveError::Io(format!("Failed to replace snapshot: {}", e)))?;
        Ok(())
    }

    pub fn load(&self) -> Result<Option<DatabaseSnapshot>> {
        if !self.snapshot_path.exists() {
            return Ok(None);
        }
        let data = fs::read(&self.snapshot_path)
            .map_err(|e| ArchiveError::Io(format!("Failed to read snapshot: {}", e)))?;
        let snapshot: DatabaseSnapshot = rmp_serde::from_slice(&data).map_err(|e| {
            ArchiveError::Serialization(format!("Failed to deserialize snapshot: {}", e))
        })?;
        Ok(Some(snapshot))
    }

    pub fn exists(&self) -> bool {
        self.snapshot_path.exists()
    }
}

// ============================================================================
// Persistence Manager
// ============================================================================

pub struct PersistenceManager {
    wal: WalManager,
    snapshot: SnapshotManager,
    durability_mode: DurabilityMode,
}

impl PersistenceManager {
    pub fn new<P: AsRef<Path>>(data_dir: P, durability_mode: DurabilityMode) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        let wal = WalManager::new(data_dir.join(WAL_FILE_NAME), durability_mode)?;
        let snapshot = SnapshotManager::new(data_dir.join(SNAPSHOT_FILE_NAME));
        Ok(Self {
            wal,
            snapshot,
            durability_mode,
        })
    }

    pub fn log(&mut self, entry: &WalEntry) -> Result<()> {
        self.wal.append(entry)
    }

    pub fn checkpoint(&mut self, collections: HashMap<String, Collection>) -> Result<()> {
        if self.durability_mode == DurabilityMode::None {
            return Ok(());
        }
        let snapshot = DatabaseSnapshot::new(collections, self.wal.last_lsn());
        self.snapshot.save(&snapshot)?;
        self.wal.clear()?;
        Ok(())
    }

    pub fn needs_checkpoint(&self) -> bool {
        self.wal.needs_checkpoint()
    }

    /// Snapshot plus replayed WAL, or `None` when nothing was ever persisted.
    ///
    /// Entries the snapshot already covers are skipped, so a crash between
    /// writing a snapshot and clearing the WAL replays nothing twice.
    pub fn recover(&mut self) -> Result<Option<HashMap<String, Collection>>> {
        let snapshot = self.snapshot.load()?;
        let wal_records = self.wal.recover()?;
        if snapshot.is_none() && wal_records.is_empty() {
            return Ok(None);
        }

        let (snapshot_lsn, mut collections) = snapshot
            .map(|s| (s.wal_lsn, s.collections))
            .unwrap_or_default();
        for coll in collections.values_mut() {
            coll.rebuild_index();
        }

        let mut last_lsn = snapshot_lsn;
        let mut skipped = 0usize;
        for record in wal_records {
            last_lsn = last_lsn.max(record.lsn);
            if record.lsn <= snapshot_lsn {
                skipped += 1;
                continue;
            }
            record.entry.apply(&mut collections);
        }
        if skipped > 0 {
            tracing::warn!(skipped, "Skipped WAL entries already contained in the snapshot");
        }
        self.wal.resume_after(last_lsn);
        Ok(Some(collections))
    }

    pub fn wal(&self) -> &WalManager {
        &self.wal
    }

    pub fn wal_mut(&mut self) -> &mut WalManager {
        &mut self.wal
    }

    pub fn snapshot(&self) -> &SnapshotManager {
        &self.snapshot
    }
}
