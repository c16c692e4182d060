use crate::core::{ArchiveError, Result};
use crate::storage::DurabilityMode;
use crate::storage::persistence::DEFAULT_CHECKPOINT_THRESHOLD;
use crate::storage::validate_collection_name;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_INACTIVITY_DAYS: u32 = 14;
pub const DEFAULT_REGISTRATION_DAYS: u32 = 30;
pub const DEFAULT_ACTIVE_COLLECTION: &str = "user_events";
pub const DEFAULT_ARCHIVE_COLLECTION: &str = "archived_users";

/// How users are moved into the archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArchiveStrategy {
    /// One logged unit per user inside the document store
    #[default]
    Atomic,
    /// Find, insert and delete as separate store calls
    Sequential,
}

impl FromStr for ArchiveStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "atomic" => Ok(Self::Atomic),
            "sequential" => Ok(Self::Sequential),
            other => Err(format!(
                "unknown strategy '{}', expected 'atomic' or 'sequential'",
                other
            )),
        }
    }
}

impl fmt::Display for ArchiveStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Atomic => f.write_str("atomic"),
            Self::Sequential => f.write_str("sequential"),
        }
    }
}

/// Archival run configuration
///
/// # Examples
///
/// ```
/// use event_archiver::ArchiverConfig;
///
/// let config = ArchiverConfig::new()
///     .inactivity_days(7)
///     .report_dir("/tmp/reports");
///
/// assert_eq!(config.inactivity_days, 7);
/// assert_eq!(config.registration_days, 30);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct ArchiverConfig {
    /// Users inactive for longer than this are candidates
    pub inactivity_days: u32,

    /// Users registered more recently than this are never archived
    pub registration_days: u32,

    /// Directory of the document store (WAL + snapshot)
    pub data_dir: PathBuf,

    /// Directory receiving dated report files
    pub report_dir: PathBuf,

    /// Collection holding current user events
    pub active_collection: String,

    /// Collection receiving archived users
    pub archive_collection: String,

    pub strategy: ArchiveStrategy,

    pub durability: DurabilityMode,

    /// WAL entries between automatic snapshots
    pub checkpoint_threshold: usize,
}

impl ArchiverConfig {
    pub fn new() -> Self {
        Self {
            inactivity_days: DEFAULT_INACTIVITY_DAYS,
            registration_days: DEFAULT_REGISTRATION_DAYS,
            data_dir: PathBuf::from("data"),
            report_dir: PathBuf::from("."),
            active_collection: DEFAULT_ACTIVE_COLLECTION.to_string(),
            archive_collection: DEFAULT_ARCHIVE_COLLECTION.to_string(),
            strategy: ArchiveStrategy::default(),
            durability: DurabilityMode::default(),
            checkpoint_threshold: DEFAULT_CHECKPOINT_THRESHOLD,
        }
    }

    pub fn inactivity_days(mut self, days: u32) -> Self {
        self.inactivity_days = days;
        self
    }

    pub fn registration_days(mut self, days: u32) -> Self {
        self.registration_days = days;
        self
    }

    pub fn data_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.data_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn report_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.report_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn active_collection(mut self, name: &str) -> Self {
        self.active_collection = name.to_string();
        self
    }

    pub fn archive_collection(mut self, name: &str) -> Self {
        self.archive_collection = name.to_string();
        self
    }

    pub fn strategy(mut self, strategy: ArchiveStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn durability(mut self, mode: DurabilityMode) -> Self {
        self.durability = mode;
        self
    }

    pub fn checkpoint_threshold(mut self, entries: usize) -> Self {
        self.checkpoint_threshold = entries;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.inactivity_days == 0 {
            return Err(ArchiveError::ConfigError(
                "inactivity_days must be at least 1".to_string(),
            ));
        }
        if self.registration_days == 0 {
            return Err(ArchiveError::ConfigError(
                "registration_days must be at least 1".to_string(),
            ));
        }
        validate_collection_name(&self.active_collection)?;
        validate_collection_name(&self.archive_collection)?;
        if self.active_collection == self.archive_collection {
            return Err(ArchiveError::ConfigError(format!(
                "active and archive collection are both '{}'",
                self.active_collection
            )));
        }
        if self.checkpoint_threshold == 0 {
            return Err(ArchiveError::ConfigError(
                "checkpoint_threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ArchiverConfig {
    fn default() -> Self {
        Self::new()
    }
}
