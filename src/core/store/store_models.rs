// Document-store domain models.
//
// The comment engine talks to its storage backend through these types only.
// Historical data was written under two different key shapes (flat and
// ancestor-path), and flat ids may be strings or store-native integers, so
// the key is modeled as a closed set of variants instead of an opaque blob.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// The id component of a key. Flat comment ids exist in the wild both as
/// strings and as store-native integers; the two address different records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyId {
    Name(String),
    Numeric(i64),
}

impl KeyId {
    /// String form used for external exposure and scan-time comparisons.
    pub fn to_display_string(&self) -> String {
        match self {
            KeyId::Name(name) => name.clone(),
            KeyId::Numeric(id) => id.to_string(),
        }
    }
}

impl std::fmt::Display for KeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

/// An addressing path into the document store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKey {
    /// `(kind, id)` - the current addressing scheme.
    Flat { kind: String, id: KeyId },
    /// A chain of `(kind, id)` pairs ending at the addressed entity - the
    /// legacy ancestor-path scheme some records were migrated from.
    Ancestor { path: Vec<(String, KeyId)> },
}

impl EntityKey {
    pub fn flat(kind: impl Into<String>, id: KeyId) -> Self {
        EntityKey::Flat {
            kind: kind.into(),
            id,
        }
    }

    /// Kind of the addressed entity (the last path element for ancestors).
    pub fn kind(&self) -> &str {
        match self {
            EntityKey::Flat { kind, .. } => kind,
            EntityKey::Ancestor { path } => path.last().map(|(k, _)| k.as_str()).unwrap_or(""),
        }
    }

    /// Id of the addressed entity itself.
    pub fn leaf_id(&self) -> Option<&KeyId> {
        match self {
            EntityKey::Flat { id, .. } => Some(id),
            EntityKey::Ancestor { path } => path.last().map(|(_, id)| id),
        }
    }
}

/// A stored record together with the key it lives under.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub key: EntityKey,
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(key: EntityKey, fields: Map<String, Value>) -> Self {
        Self { key, fields }
    }

    /// A field as a string slice, if present and actually a string.
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// String form of the entity's own id, derived from its key.
    pub fn key_id_string(&self) -> Option<String> {
        self.key.leaf_id().map(KeyId::to_display_string)
    }
}

/// A kind query with simple equality filters, built the same way the
/// store's native query builder chains `.filter()` calls.
#[derive(Debug, Clone)]
pub struct Query {
    pub kind: String,
    pub filters: Vec<(String, Value)>,
}

impl Query {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            filters: Vec::new(),
        }
    }

    pub fn filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    /// Equality-filter semantics shared by every store adapter.
    pub fn matches(&self, document: &Document) -> bool {
        if document.key.kind() != self.kind {
            return false;
        }
        self.filters
            .iter()
            .all(|(field, expected)| document.fields.get(field) == Some(expected))
    }
}
