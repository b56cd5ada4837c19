// SQLite-backed implementation of DocumentStore.
//
// One table holds every document: the serialized entity key addresses the
// row, the kind column serves kind queries, and the autoincrement rowid
// backs store-generated numeric ids. Equality filters are applied in Rust
// via the shared Query::matches semantics.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{Pool, Row, Sqlite};

use crate::core::store::{Document, DocumentStore, EntityKey, KeyId, Query, StoreError};

pub struct SqliteDocumentStore {
    pool: Pool<Sqlite>,
}

impl SqliteDocumentStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                doc_id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                key_json TEXT UNIQUE,
                fields_json TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS documents_kind_idx ON documents(kind)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn encode_key(key: &EntityKey) -> Result<String, StoreError> {
    serde_json::to_string(key).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn encode_fields(fields: &Map<String, Value>) -> Result<String, StoreError> {
    serde_json::to_string(fields).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode_document(key_json: &str, fields_json: &str) -> Result<Document, StoreError> {
    let key: EntityKey =
        serde_json::from_str(key_json).map_err(|e| StoreError::Serialization(e.to_string()))?;
    let fields: Map<String, Value> =
        serde_json::from_str(fields_json).map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(Document::new(key, fields))
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn get(&self, key: &EntityKey) -> Result<Option<Document>, StoreError> {
        let key_json = encode_key(key)?;
        let row = sqlx::query("SELECT fields_json FROM documents WHERE key_json = ?")
            .bind(&key_json)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        match row {
            Some(row) => {
                let fields_json: String = row.get("fields_json");
                Ok(Some(decode_document(&key_json, &fields_json)?))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, key: &EntityKey, fields: Map<String, Value>) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO documents (kind, key_json, fields_json)
            VALUES (?, ?, ?)
            ON CONFLICT(key_json) DO UPDATE SET
                kind = excluded.kind,
                fields_json = excluded.fields_json
            "#,
        )
        .bind(key.kind())
        .bind(encode_key(key)?)
        .bind(encode_fields(&fields)?)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn insert(
        &self,
        kind: &str,
        fields: Map<String, Value>,
    ) -> Result<EntityKey, StoreError> {
        let fields_json = encode_fields(&fields)?;
        let mut tx = self.pool.begin().await.map_err(backend)?;

        // Two steps: let the autoincrement allocate the id, then record the
        // completed key the row is addressable under.
        let inserted =
            sqlx::query("INSERT INTO documents (kind, key_json, fields_json) VALUES (?, NULL, ?)")
                .bind(kind)
                .bind(&fields_json)
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
        let key = EntityKey::flat(kind, KeyId::Numeric(inserted.last_insert_rowid()));

        sqlx::query("UPDATE documents SET key_json = ? WHERE doc_id = ?")
            .bind(encode_key(&key)?)
            .bind(inserted.last_insert_rowid())
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        tx.commit().await.map_err(backend)?;
        Ok(key)
    }

    async fn delete(&self, key: &EntityKey) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM documents WHERE key_json = ?")
            .bind(encode_key(key)?)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn run_query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        let rows = sqlx::query("SELECT key_json, fields_json FROM documents WHERE kind = ?")
            .bind(&query.kind)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        let mut documents = Vec::with_capacity(rows.len());
        for row in rows {
            let key_json: String = row.get("key_json");
            let fields_json: String = row.get("fields_json");
            let document = decode_document(&key_json, &fields_json)?;
            if query.matches(&document) {
                documents.push(document);
            }
        }
        Ok(documents)
    }
}
