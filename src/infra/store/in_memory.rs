// In-memory implementation of DocumentStore.
//
// Backs tests and zero-setup runs. Uses DashMap so concurrent tasks can hit
// the store without a Mutex, same as the other in-memory stores.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value};

use crate::core::store::{Document, DocumentStore, EntityKey, KeyId, Query, StoreError};

pub struct InMemoryDocumentStore {
    documents: DashMap<EntityKey, Map<String, Value>>,
    /// Store-allocated ids, mimicking the real store's numeric id assignment.
    next_id: AtomicI64,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            documents: DashMap::new(),
            // Start well away from small test ids to keep allocated and
            // hand-written keys distinguishable.
            next_id: AtomicI64::new(5_000_000_000_000_001),
        }
    }

    /// Number of stored entities of a kind. Test helper.
    pub fn count(&self, kind: &str) -> usize {
        self.documents
            .iter()
            .filter(|entry| entry.key().kind() == kind)
            .count()
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, key: &EntityKey) -> Result<Option<Document>, StoreError> {
        Ok(self
            .documents
            .get(key)
            .map(|entry| Document::new(key.clone(), entry.value().clone())))
    }

    async fn save(&self, key: &EntityKey, fields: Map<String, Value>) -> Result<(), StoreError> {
        self.documents.insert(key.clone(), fields);
        Ok(())
    }

    async fn insert(
        &self,
        kind: &str,
        fields: Map<String, Value>,
    ) -> Result<EntityKey, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let key = EntityKey::flat(kind, KeyId::Numeric(id));
        self.documents.insert(key.clone(), fields);
        Ok(key)
    }

    async fn delete(&self, key: &EntityKey) -> Result<(), StoreError> {
        self.documents.remove(key);
        Ok(())
    }

    async fn run_query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        Ok(self
            .documents
            .iter()
            .map(|entry| Document::new(entry.key().clone(), entry.value().clone()))
            .filter(|document| query.matches(document))
            .collect())
    }
}
