// ============================================================================
// Event Archiver Library
// ============================================================================

pub mod archiver;
pub mod config;
pub mod core;
pub mod facade;
pub mod json;
pub mod report;
pub mod selector;
pub mod storage;

// Re-export main types for convenience
pub use archiver::{ArchiveOutcome, Archiver, AtomicMove, MoveStrategy, SequentialMove};
pub use config::{ArchiveStrategy, ArchiverConfig};
pub use core::{ArchiveError, EventRecord, MoveOutcome, RecordId, Result, UserId, UserInfo, UserSnapshot};
pub use facade::{ArchivalJob, CollectionHandle, CollectionStats, DocumentDb};
pub use report::{ArchivalReport, ReportWriter};
pub use selector::{Cutoffs, InactivitySelector};
pub use storage::{ArchiveStore, DurabilityMode, EventStore};
