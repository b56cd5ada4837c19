// Infra store module - DocumentStore implementations.

pub mod in_memory;
pub mod sqlite_store;

pub use in_memory::InMemoryDocumentStore;
pub use sqlite_store::SqliteDocumentStore;
