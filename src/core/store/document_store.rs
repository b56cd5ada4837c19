// The storage port. Any key-value backend with simple equality queries can
// sit behind this trait; the engine never sees transport details.

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::store_models::{Document, EntityKey, Query, StoreError};

/// Trait for the underlying document store.
///
/// Following the same pattern as the other storage ports: core defines the
/// contract, infra provides the implementations.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch the entity at a fully-specified key, if any.
    async fn get(&self, key: &EntityKey) -> Result<Option<Document>, StoreError>;

    /// Upsert the entity at a fully-specified key.
    async fn save(&self, key: &EntityKey, fields: Map<String, Value>) -> Result<(), StoreError>;

    /// Insert a new entity of `kind`, letting the store allocate a numeric
    /// flat id. Returns the completed key.
    async fn insert(
        &self,
        kind: &str,
        fields: Map<String, Value>,
    ) -> Result<EntityKey, StoreError>;

    /// Delete the entity at a key. Deleting a missing key is not an error.
    async fn delete(&self, key: &EntityKey) -> Result<(), StoreError>;

    /// Run a kind query with equality filters.
    async fn run_query(&self, query: &Query) -> Result<Vec<Document>, StoreError>;
}
