use super::collection::{Collection, validate_collection_name};
use crate::core::{ArchiveError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct InMemoryStorage {
    /// Each collection has its own lock
    collections: HashMap<String, Arc<RwLock<Collection>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            collections: HashMap::new(),
        }
    }

    pub fn create_collection(&mut self, name: &str) -> Result<()> {
        validate_collection_name(name)?;

        if self.collections.contains_key(name) {
            return Err(ArchiveError::CollectionExists(name.to_string()));
        }

        self.collections
            .insert(name.to_string(), Arc::new(RwLock::new(Collection::new(name))));
        Ok(())
    }

    /// Handle for concurrent access to one collection
    pub fn get_collection(&self, name: &str) -> Result<Arc<RwLock<Collection>>> {
        self.collections
            .get(name)
            .cloned()
            .ok_or_else(|| ArchiveError::CollectionNotFound(name.to_string()))
    }

    pub fn collection_exists(&self, name: &str) -> bool {
        self.collections.contains_key(name)
    }

    pub fn list_collections(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.keys().cloned().collect();
        names.sort();
        names
    }

    /// Copy of every collection (for snapshots)
    pub async fn get_all_collections(&self) -> HashMap<String, Collection> {
        let mut collections = HashMap::new();

        for (name, handle) in &self.collections {
            let collection = handle.read().await;
            collections.insert(name.clone(), collection.clone());
        }

        collections
    }

    /// Replace all collections with recovered ones
    pub fn restore_collections(&mut self, collections: HashMap<String, Collection>) {
        self.collections.clear();

        for (name, mut collection) in collections {
            collection.rebuild_index();
            self.collections.insert(name, Arc::new(RwLock::new(collection)));
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}
