pub mod collection;
pub mod database;
pub mod job;

pub use collection::CollectionHandle;
pub use database::{CollectionStats, DocumentDb};
pub use job::ArchivalJob;
