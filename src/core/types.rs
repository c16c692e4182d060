use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Opaque, stable identifier of a user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifier of a single event record. Preserved when a record moves
/// between collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// User details embedded in every event record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub registration_date: DateTime<Utc>,
    #[serde(default)]
    pub extra: BTreeMap<String, JsonValue>,
}

impl UserInfo {
    pub fn new(registration_date: DateTime<Utc>) -> Self {
        Self {
            registration_date,
            extra: BTreeMap::new(),
        }
    }
}

/// One activity occurrence of one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: RecordId,
    pub user_id: UserId,
    pub event_time: DateTime<Utc>,
    pub user_info: UserInfo,
    /// Any other document fields, kept verbatim.
    #[serde(default)]
    pub attributes: BTreeMap<String, JsonValue>,
}

impl EventRecord {
    pub fn new(
        user_id: impl Into<UserId>,
        event_time: DateTime<Utc>,
        registration_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RecordId::new(),
            user_id: user_id.into(),
            event_time,
            user_info: UserInfo::new(registration_date),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}

/// Per-user aggregate computed during selection. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct UserSnapshot {
    pub user_id: UserId,
    pub last_event: DateTime<Utc>,
    /// User info of the most recent event record.
    pub user_info: UserInfo,
}

/// Result of moving one user from the active store to the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Representative record archived, `deleted` active records removed.
    Moved { deleted: usize },
    /// No active record was found for the user.
    Missing,
}
