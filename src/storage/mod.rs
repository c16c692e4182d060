pub mod collection;
pub mod engine;
pub mod memory;
pub mod persistence;

pub use collection::{Collection, validate_collection_name};
pub use engine::{ArchiveStore, EventStore};
pub use memory::InMemoryStorage;
pub use persistence::{DurabilityMode, PersistenceManager, WalEntry};
