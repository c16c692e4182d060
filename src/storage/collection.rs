use crate::core::{ArchiveError, EventRecord, Result, UserId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Maximum length of a collection name.
pub const MAX_COLLECTION_NAME_LEN: usize = 64;

/// Insertion-ordered set of event records with a per-user index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    name: String,
    records: BTreeMap<u64, EventRecord>,
    next_seq: u64,
    #[serde(skip)]
    by_user: HashMap<UserId, BTreeSet<u64>>,
}

impl Collection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: BTreeMap::new(),
            next_seq: 0,
            by_user: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn insert(&mut self, record: EventRecord) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;

        self.by_user
            .entry(record.user_id.clone())
            .or_default()
            .insert(seq);
        self.records.insert(seq, record);
        seq
    }

    /// Earliest-inserted record of the user, if any.
    pub fn first_for_user(&self, user_id: &UserId) -> Option<&EventRecord> {
        self.by_user
            .get(user_id)
            .and_then(|seqs| seqs.iter().next())
            .and_then(|seq| self.records.get(seq))
    }

    /// Removes every record of the user and returns how many were removed.
    pub fn delete_user(&mut self, user_id: &UserId) -> usize {
        let Some(seqs) = self.by_user.remove(user_id) else {
            return 0;
        };
        seqs.iter()
            .filter(|seq| self.records.remove(seq).is_some())
            .count()
    }

    pub fn records_for_user(&self, user_id: &UserId) -> Vec<EventRecord> {
        self.by_user
            .get(user_id)
            .map(|seqs| {
                seqs.iter()
                    .filter_map(|seq| self.records.get(seq).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn contains_user(&self, user_id: &UserId) -> bool {
        self.by_user.contains_key(user_id)
    }

    /// All records in insertion order.
    pub fn scan(&self) -> Vec<EventRecord> {
        self.records.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn user_count(&self) -> usize {
        self.by_user.len()
    }

    /// Rebuilds the user index. Needed after deserializing a snapshot.
    pub fn rebuild_index(&mut self) {
        self.by_user.clear();
        for (seq, record) in &self.records {
            self.by_user
                .entry(record.user_id.clone())
                .or_default()
                .insert(*seq);
        }
    }
}

pub fn validate_collection_name(name: &str) -> Result<()> {
    let Some(first) = name.chars().next() else {
        return Err(ArchiveError::InvalidCollectionName(
            "Collection name cannot be empty".to_string(),
        ));
    };

    if !first.is_alphabetic() && first != '_' {
        return Err(ArchiveError::InvalidCollectionName(format!(
            "'{}' must start with a letter or underscore",
            name
        )));
    }

    if !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(ArchiveError::InvalidCollectionName(format!(
            "'{}' can only contain letters, numbers, and underscores",
            name
        )));
    }

    if name.len() > MAX_COLLECTION_NAME_LEN {
        return Err(ArchiveError::InvalidCollectionName(format!(
            "'{}' is too long (max {} characters)",
            name, MAX_COLLECTION_NAME_LEN
        )));
    }

    Ok(())
}
