// Comment key resolution.
//
// The addressing scheme evolved over the system's life: comments were
// migrated from ancestor-path keys to flat keys, and flat ids exist both as
// strings and as store-native integers. No single scheme is sufficient, so a
// caller-supplied identifier is resolved through an ordered list of
// strategies, stopping at the first that yields an existing entity. The
// exhaustive scan is the correctness backstop - bounded O(n), acceptable
// while the dataset stays small.

use std::sync::Arc;

use serde_json::Value;

use crate::core::comments::{COMMENT_KIND, LOCATION_KIND, USER_KIND};
use crate::core::store::{Document, DocumentStore, EntityKey, KeyId, Query, StoreError};

/// One addressing scheme to try.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveStrategy {
    /// Flat key with the identifier as a string name.
    FlatName,
    /// Flat key with the identifier as a store-native integer, attempted
    /// only when the identifier is syntactically numeric.
    FlatNumeric,
    /// Ancestor-path key composed from the author and location hints.
    Hierarchical,
    /// Load every comment and filter linearly.
    FullScan,
}

/// The resolution policy. This order is load-bearing: an identifier can be
/// ambiguous between strategies (numeric, or equal to another entity's `id`
/// property), and reordering changes which entity wins.
pub const STRATEGY_ORDER: [ResolveStrategy; 4] = [
    ResolveStrategy::FlatName,
    ResolveStrategy::FlatNumeric,
    ResolveStrategy::Hierarchical,
    ResolveStrategy::FullScan,
];

/// Optional author/location context for resolution. The hierarchical
/// strategy and the attribute half of the scan only apply when both are set.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveHints<'a> {
    pub author_id: Option<&'a str>,
    pub location_id: Option<&'a str>,
}

impl<'a> ResolveHints<'a> {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn both(author_id: &'a str, location_id: &'a str) -> Self {
        Self {
            author_id: Some(author_id),
            location_id: Some(location_id),
        }
    }

    fn complete(&self) -> Option<(&'a str, &'a str)> {
        match (self.author_id, self.location_id) {
            (Some(author), Some(location)) => Some((author, location)),
            _ => None,
        }
    }
}

/// Maps a caller-supplied comment identifier to the entity actually stored,
/// whatever key shape it was written under.
pub struct KeyResolver<S: DocumentStore> {
    store: Arc<S>,
}

impl<S: DocumentStore> KeyResolver<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Resolve an identifier to the stored document (key included), or
    /// `None` once every strategy is exhausted. Strategy-internal
    /// inapplicability (e.g. a non-numeric identifier for `FlatNumeric`) is
    /// never an error; only store failures propagate.
    pub async fn resolve(
        &self,
        identifier: &str,
        hints: ResolveHints<'_>,
    ) -> Result<Option<Document>, StoreError> {
        for strategy in STRATEGY_ORDER {
            let found = match strategy {
                ResolveStrategy::FlatName => self.try_flat_name(identifier).await?,
                ResolveStrategy::FlatNumeric => self.try_flat_numeric(identifier).await?,
                ResolveStrategy::Hierarchical => self.try_hierarchical(identifier, hints).await?,
                ResolveStrategy::FullScan => self.scan(identifier, hints).await?,
            };
            if let Some(document) = found {
                tracing::debug!(identifier, ?strategy, "comment key resolved");
                return Ok(Some(document));
            }
        }

        tracing::debug!(identifier, "comment not found by any resolution strategy");
        Ok(None)
    }

    async fn try_flat_name(&self, identifier: &str) -> Result<Option<Document>, StoreError> {
        let key = EntityKey::flat(COMMENT_KIND, KeyId::Name(identifier.to_string()));
        self.store.get(&key).await
    }

    async fn try_flat_numeric(&self, identifier: &str) -> Result<Option<Document>, StoreError> {
        // Parse failure means the strategy is inapplicable, not fatal.
        let Ok(id) = identifier.parse::<i64>() else {
            return Ok(None);
        };
        let key = EntityKey::flat(COMMENT_KIND, KeyId::Numeric(id));
        self.store.get(&key).await
    }

    async fn try_hierarchical(
        &self,
        identifier: &str,
        hints: ResolveHints<'_>,
    ) -> Result<Option<Document>, StoreError> {
        let Some((author_id, location_id)) = hints.complete() else {
            return Ok(None);
        };
        let key = EntityKey::Ancestor {
            path: vec![
                (USER_KIND.to_string(), KeyId::Name(author_id.to_string())),
                (LOCATION_KIND.to_string(), KeyId::Name(location_id.to_string())),
                (COMMENT_KIND.to_string(), KeyId::Name(identifier.to_string())),
            ],
        };
        self.store.get(&key).await
    }

    /// The escape hatch: load all comments and take the first whose
    /// key-derived id or stored `id` property equals the identifier, or
    /// (when hints are supplied) whose author and location match the hints.
    async fn scan(
        &self,
        identifier: &str,
        hints: ResolveHints<'_>,
    ) -> Result<Option<Document>, StoreError> {
        let all = self.store.run_query(&Query::new(COMMENT_KIND)).await?;
        tracing::debug!(total = all.len(), identifier, "falling back to full comment scan");

        Ok(all.into_iter().find(|document| {
            let id_matches = document.key_id_string().as_deref() == Some(identifier)
                || id_property_string(document).as_deref() == Some(identifier);

            let attributes_match = hints.complete().is_some_and(|(author, location)| {
                document.str_field("userId") == Some(author)
                    && document.str_field("locationId") == Some(location)
            });

            id_matches || attributes_match
        }))
    }
}

/// The stored `id` property as a string, whatever type it was written as.
fn id_property_string(document: &Document) -> Option<String> {
    match document.fields.get("id") {
        Some(Value::String(id)) => Some(id.clone()),
        Some(Value::Number(id)) => Some(id.to_string()),
        _ => None,
    }
}
