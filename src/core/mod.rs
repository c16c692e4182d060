pub mod error;
pub mod types;

pub use error::{ArchiveError, Result};
pub use types::{EventRecord, MoveOutcome, RecordId, UserId, UserInfo, UserSnapshot};
