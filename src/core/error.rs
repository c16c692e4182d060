use super::types::UserId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Collection '{0}' not found")]
    CollectionNotFound(String),

    #[error("Collection '{0}' already exists")]
    CollectionExists(String),

    #[error("Invalid collection name: {0}")]
    InvalidCollectionName(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Archival aborted at user '{user_id}' after {} users were archived: {source}", archived.len())]
    Aborted {
        user_id: UserId,
        /// Users fully archived before the failure. These are not rolled back.
        archived: Vec<UserId>,
        #[source]
        source: Box<ArchiveError>,
    },
}

impl ArchiveError {
    /// True for failures caused by the store being unreachable or closed.
    pub fn is_connectivity(&self) -> bool {
        match self {
            ArchiveError::StoreUnavailable(_) => true,
            ArchiveError::Aborted { source, .. } => source.is_connectivity(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ArchiveError>;

impl From<std::io::Error> for ArchiveError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ArchiveError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aborted_message_counts_archived_users() {
        let err = ArchiveError::Aborted {
            user_id: UserId::from("u3"),
            archived: vec![UserId::from("u1"), UserId::from("u2")],
            source: Box::new(ArchiveError::WriteFailed("disk full".into())),
        };
        let msg = err.to_string();
        assert!(msg.contains("'u3'"));
        assert!(msg.contains("after 2 users"));
        assert!(msg.contains("disk full"));
    }

    #[test]
    fn test_connectivity_classification() {
        assert!(ArchiveError::StoreUnavailable("closed".into()).is_connectivity());
        assert!(!ArchiveError::WriteFailed("x".into()).is_connectivity());

        let nested = ArchiveError::Aborted {
            user_id: UserId::from("u1"),
            archived: Vec::new(),
            source: Box::new(ArchiveError::StoreUnavailable("closed".into())),
        };
        assert!(nested.is_connectivity());
    }
}
