// Comment repository - the façade every comment operation goes through.
//
// Composes the key resolver, the field cipher and the document store:
// identity resolution is delegated to KeyResolver, encryption to
// FieldCipher, persistence to the DocumentStore port. Formatting into the
// transport-safe DTO is total - a single malformed record degrades to a
// placeholder instead of failing the whole operation.

use std::cmp::Reverse;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Map, Value};

use crate::core::crypto::{FieldCipher, FieldContent};
use crate::core::keys::{KeyResolver, ResolveHints};
use crate::core::moderation::initial_status;
use crate::core::store::{Document, DocumentStore, Query, StoreError};

use super::comment_models::{
    stored_status, validate_content, Actor, Comment, CommentError, CommentStatus, NewComment,
    Role, COMMENT_KIND, DEFAULT_DISPLAY_NAME, DEFAULT_LOCATION_NAME, ENCRYPTED_FIELDS,
    UNAVAILABLE_CONTENT,
};

pub struct CommentRepository<S: DocumentStore> {
    store: Arc<S>,
    resolver: KeyResolver<S>,
    cipher: FieldCipher,
}

impl<S: DocumentStore> CommentRepository<S> {
    pub fn new(store: Arc<S>, cipher: FieldCipher) -> Self {
        Self {
            resolver: KeyResolver::new(Arc::clone(&store)),
            store,
            cipher,
        }
    }

    /// Create a comment. Validation happens before anything touches the
    /// store; the initial status is role-dependent (privileged authors skip
    /// the moderation queue); sensitive fields are encrypted at rest. The
    /// record is persisted under a store-generated flat key.
    pub async fn create(
        &self,
        actor: &Actor,
        display_name: &str,
        payload: NewComment,
    ) -> Result<Comment, CommentError> {
        validate_content(&payload.content)?;

        let status = initial_status(actor.role);
        let location_name = payload
            .location_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOCATION_NAME.to_string());
        let display_name = if display_name.trim().is_empty() {
            DEFAULT_DISPLAY_NAME
        } else {
            display_name
        };

        let mut fields = Map::new();
        fields.insert("content".to_string(), json!(payload.content));
        fields.insert("locationId".to_string(), json!(payload.location_id));
        fields.insert("locationName".to_string(), json!(location_name));
        fields.insert("userId".to_string(), json!(actor.id));
        fields.insert("userDisplayName".to_string(), json!(display_name));
        fields.insert("timestamp".to_string(), json!(Utc::now().to_rfc3339()));
        fields.insert("approved".to_string(), json!(status.is_approved()));
        fields.insert("status".to_string(), json!(status.as_str()));

        self.cipher.encrypt_fields(&mut fields, ENCRYPTED_FIELDS);

        let key = self.store.insert(COMMENT_KIND, fields.clone()).await?;
        tracing::info!(
            user_id = %actor.id,
            location_id = %payload.location_id,
            status = %status,
            "comment created"
        );

        Ok(self.format(&Document::new(key, fields), actor.role))
    }

    /// All comments for a location, newest first. Unprivileged viewers only
    /// see approved comments; moderators and admins see everything.
    pub async fn list_for_location(
        &self,
        location_id: &str,
        viewer_role: Role,
    ) -> Result<Vec<Comment>, CommentError> {
        let mut query = Query::new(COMMENT_KIND).filter("locationId", location_id);
        if !viewer_role.is_privileged() {
            query = query.filter("approved", true);
        }

        let documents = self.store.run_query(&query).await?;
        tracing::debug!(
            location_id,
            count = documents.len(),
            ?viewer_role,
            "fetched comments for location"
        );

        let mut comments: Vec<Comment> = documents
            .iter()
            .map(|document| self.format(document, viewer_role))
            .collect();
        comments.sort_by_key(|comment| Reverse(sort_instant(&comment.timestamp)));
        Ok(comments)
    }

    /// The moderation queue: pending comments, oldest first (FIFO).
    pub async fn list_pending(&self) -> Result<Vec<Comment>, CommentError> {
        let query = Query::new(COMMENT_KIND).filter("status", CommentStatus::Pending.as_str());
        let documents = self.store.run_query(&query).await?;

        let mut comments: Vec<Comment> = documents
            .iter()
            .map(|document| self.format(document, Role::Moderator))
            .collect();
        comments.sort_by_key(|comment| sort_instant(&comment.timestamp));
        Ok(comments)
    }

    /// Fetch one comment by identifier (any historical key shape).
    pub async fn get(
        &self,
        identifier: &str,
        hints: ResolveHints<'_>,
        viewer_role: Role,
    ) -> Result<Comment, CommentError> {
        let document = self
            .resolver
            .resolve(identifier, hints)
            .await?
            .ok_or(CommentError::NotFound)?;
        Ok(self.format(&document, viewer_role))
    }

    /// Delete a comment. Allowed for the original author and for privileged
    /// roles; anyone else gets `Forbidden` with the entity untouched.
    pub async fn delete(
        &self,
        identifier: &str,
        hints: ResolveHints<'_>,
        requester: &Actor,
    ) -> Result<(), CommentError> {
        let document = self
            .resolver
            .resolve(identifier, hints)
            .await?
            .ok_or(CommentError::NotFound)?;

        let is_author = document.str_field("userId") == Some(requester.id.as_str());
        if !is_author && !requester.role.is_privileged() {
            return Err(CommentError::Forbidden);
        }

        self.store.delete(&document.key).await?;
        tracing::info!(identifier, requester = %requester.id, "comment deleted");
        Ok(())
    }

    /// Resolve an identifier to the raw stored document. Used by the
    /// moderation workflow, which mutates and re-saves in place.
    pub async fn resolve_document(
        &self,
        identifier: &str,
        hints: ResolveHints<'_>,
    ) -> Result<Option<Document>, StoreError> {
        self.resolver.resolve(identifier, hints).await
    }

    /// Persist a document back under the key it was resolved at.
    pub async fn save_document(&self, document: &Document) -> Result<(), StoreError> {
        self.store.save(&document.key, document.fields.clone()).await
    }

    /// Normalize a raw stored entity into the transport-safe DTO. Total:
    /// whatever shape the record is in, the caller gets something usable.
    pub fn format(&self, document: &Document, viewer_role: Role) -> Comment {
        // The id comes from the key when the key carries one, otherwise from
        // the stored `id` property. A record with neither is unaddressable -
        // surface the minimal safe shape instead of inventing an identity.
        let id = match document.key_id_string().or_else(|| {
            document
                .fields
                .get("id")
                .and_then(stringified_scalar)
        }) {
            Some(id) => id,
            None => {
                tracing::warn!("comment record has no id, returning fallback shape");
                return Comment::formatting_fallback("error");
            }
        };

        tracing::debug!(id = %id, ?viewer_role, "formatting comment");

        let content = match self.cipher.decrypt_field(&document.fields, "content", false) {
            Some(FieldContent::Plain(text)) => text,
            Some(_) => {
                tracing::warn!(id = %id, "comment content could not be decrypted");
                UNAVAILABLE_CONTENT.to_string()
            }
            None => String::new(),
        };

        let status = stored_status(&document.fields);

        Comment {
            id,
            content,
            location_id: document.str_field("locationId").unwrap_or("").to_string(),
            location_name: document
                .str_field("locationName")
                .filter(|name| !name.is_empty())
                .unwrap_or(DEFAULT_LOCATION_NAME)
                .to_string(),
            user_id: document.str_field("userId").unwrap_or("").to_string(),
            user_display_name: document
                .str_field("userDisplayName")
                .filter(|name| !name.is_empty())
                .unwrap_or(DEFAULT_DISPLAY_NAME)
                .to_string(),
            timestamp: format_timestamp(document.fields.get("timestamp")),
            approved: status.is_approved(),
            status,
            moderated_at: document.str_field("moderatedAt").map(str::to_string),
            moderated_by: document.str_field("moderatedBy").map(str::to_string),
        }
    }
}

/// Stored timestamps are RFC 3339 strings, but legacy records carry epoch
/// milliseconds. Missing or unusable values default to now.
fn format_timestamp(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(number)) => number
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
            .map(|time| time.to_rfc3339())
            .unwrap_or_else(|| Utc::now().to_rfc3339()),
        _ => Utc::now().to_rfc3339(),
    }
}

/// Sort key for timestamp strings; unparseable values sort as the epoch.
fn sort_instant(timestamp: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|time| time.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc.timestamp_opt(0, 0).unwrap())
}

/// String form of a scalar id value (string or number).
fn stringified_scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::crypto::CipherKey;
    use crate::core::store::{EntityKey, KeyId};
    use crate::infra::store::InMemoryDocumentStore;

    fn repository() -> (CommentRepository<InMemoryDocumentStore>, Arc<InMemoryDocumentStore>) {
        let store = Arc::new(InMemoryDocumentStore::new());
        let cipher = FieldCipher::new(&CipherKey::generate());
        (CommentRepository::new(Arc::clone(&store), cipher), store)
    }

    fn user(id: &str) -> Actor {
        Actor::new(id, Role::User)
    }

    fn payload(content: &str, location_id: &str) -> NewComment {
        NewComment {
            content: content.to_string(),
            location_id: location_id.to_string(),
            location_name: Some("Bergen".to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_then_get_round_trips_content() {
        let (repo, _store) = repository();
        let created = repo
            .create(&user("u1"), "Kari", payload("Nice view!", "loc-1"))
            .await
            .unwrap();

        let fetched = repo
            .get(&created.id, ResolveHints::none(), Role::User)
            .await
            .unwrap();
        assert_eq!(fetched.content, "Nice view!");
        assert_eq!(fetched.location_name, "Bergen");
        assert_eq!(fetched.user_display_name, "Kari");
    }

    #[tokio::test]
    async fn test_content_is_encrypted_at_rest() {
        let (repo, store) = repository();
        let created = repo
            .create(&user("u1"), "Kari", payload("Nice view!", "loc-1"))
            .await
            .unwrap();

        let key = EntityKey::flat(COMMENT_KIND, KeyId::Numeric(created.id.parse().unwrap()));
        let raw = store.get(&key).await.unwrap().unwrap();
        let stored_content = raw.str_field("content").unwrap();
        assert_ne!(stored_content, "Nice view!");
        assert!(!stored_content.contains("Nice view"));
    }

    #[tokio::test]
    async fn test_overlong_content_is_rejected_and_nothing_persisted() {
        let (repo, store) = repository();
        let result = repo
            .create(&user("u1"), "Kari", payload(&"x".repeat(1001), "loc-1"))
            .await;

        assert!(matches!(result, Err(CommentError::Validation(_))));
        assert_eq!(store.count(COMMENT_KIND), 0);
    }

    #[tokio::test]
    async fn test_initial_status_depends_on_role() {
        let (repo, _store) = repository();

        let plain = repo
            .create(&user("u1"), "Kari", payload("hello", "loc-1"))
            .await
            .unwrap();
        assert_eq!(plain.status, CommentStatus::Pending);
        assert!(!plain.approved);

        for role in [Role::Moderator, Role::Admin] {
            let privileged = repo
                .create(&Actor::new("m1", role), "Mod", payload("hello", "loc-1"))
                .await
                .unwrap();
            assert_eq!(privileged.status, CommentStatus::Approved);
            assert!(privileged.approved);
        }
    }

    #[tokio::test]
    async fn test_unprivileged_listing_hides_unapproved_comments() {
        let (repo, _store) = repository();
        repo.create(&user("u1"), "Kari", payload("pending one", "loc-1"))
            .await
            .unwrap();
        repo.create(&Actor::new("m1", Role::Admin), "Admin", payload("visible", "loc-1"))
            .await
            .unwrap();

        let for_user = repo.list_for_location("loc-1", Role::User).await.unwrap();
        assert_eq!(for_user.len(), 1);
        assert!(for_user.iter().all(|comment| comment.approved));

        let for_moderator = repo
            .list_for_location("loc-1", Role::Moderator)
            .await
            .unwrap();
        assert_eq!(for_moderator.len(), 2);
    }

    #[tokio::test]
    async fn test_location_listing_is_newest_first() {
        let (repo, store) = repository();
        // Write records with explicit timestamps so ordering is deterministic.
        for (id, stamp) in [("a", "2024-01-01T00:00:00+00:00"), ("b", "2024-03-01T00:00:00+00:00")] {
            let mut fields = Map::new();
            fields.insert("content".to_string(), json!("x"));
            fields.insert("locationId".to_string(), json!("loc-1"));
            fields.insert("approved".to_string(), json!(true));
            fields.insert("status".to_string(), json!("approved"));
            fields.insert("timestamp".to_string(), json!(stamp));
            store
                .save(
                    &EntityKey::flat(COMMENT_KIND, KeyId::Name(id.to_string())),
                    fields,
                )
                .await
                .unwrap();
        }

        let comments = repo.list_for_location("loc-1", Role::User).await.unwrap();
        assert_eq!(comments[0].id, "b");
        assert_eq!(comments[1].id, "a");
    }

    #[tokio::test]
    async fn test_listing_tolerates_garbage_and_missing_timestamps() {
        let (repo, store) = repository();
        let records = [
            ("dated", json!("2024-03-01T00:00:00+00:00")),
            ("garbage", json!("not-a-date")),
            ("bare", Value::Null),
        ];
        for (id, stamp) in records {
            let mut fields = Map::new();
            fields.insert("content".to_string(), json!("x"));
            fields.insert("locationId".to_string(), json!("loc-1"));
            fields.insert("approved".to_string(), json!(true));
            fields.insert("status".to_string(), json!("approved"));
            if !stamp.is_null() {
                fields.insert("timestamp".to_string(), stamp);
            }
            store
                .save(
                    &EntityKey::flat(COMMENT_KIND, KeyId::Name(id.to_string())),
                    fields,
                )
                .await
                .unwrap();
        }

        let comments = repo.list_for_location("loc-1", Role::User).await.unwrap();
        // Missing timestamps format as now and so lead the newest-first
        // listing; unparseable ones sort as the epoch and land last.
        assert_eq!(comments[0].id, "bare");
        assert_eq!(comments[1].id, "dated");
        assert_eq!(comments[2].id, "garbage");
        assert!(DateTime::parse_from_rfc3339(&comments[0].timestamp).is_ok());
        assert_eq!(comments[2].timestamp, "not-a-date");
    }

    #[tokio::test]
    async fn test_pending_queue_is_oldest_first() {
        let (repo, store) = repository();
        for (id, stamp) in [("late", "2024-03-01T00:00:00+00:00"), ("early", "2024-01-01T00:00:00+00:00")] {
            let mut fields = Map::new();
            fields.insert("content".to_string(), json!("x"));
            fields.insert("locationId".to_string(), json!("loc-1"));
            fields.insert("approved".to_string(), json!(false));
            fields.insert("status".to_string(), json!("pending"));
            fields.insert("timestamp".to_string(), json!(stamp));
            store
                .save(
                    &EntityKey::flat(COMMENT_KIND, KeyId::Name(id.to_string())),
                    fields,
                )
                .await
                .unwrap();
        }

        let queue = repo.list_pending().await.unwrap();
        assert_eq!(queue[0].id, "early");
        assert_eq!(queue[1].id, "late");
    }

    #[tokio::test]
    async fn test_delete_requires_authorship_or_privilege() {
        let (repo, store) = repository();
        let created = repo
            .create(&user("u1"), "Kari", payload("mine", "loc-1"))
            .await
            .unwrap();

        // A stranger with the default role is refused and the entity stays.
        let refused = repo
            .delete(&created.id, ResolveHints::none(), &user("u2"))
            .await;
        assert!(matches!(refused, Err(CommentError::Forbidden)));
        assert_eq!(store.count(COMMENT_KIND), 1);

        // The author may delete their own comment.
        repo.delete(&created.id, ResolveHints::none(), &user("u1"))
            .await
            .unwrap();
        assert_eq!(store.count(COMMENT_KIND), 0);
    }

    #[tokio::test]
    async fn test_moderator_can_delete_any_comment() {
        let (repo, store) = repository();
        let created = repo
            .create(&user("u1"), "Kari", payload("mine", "loc-1"))
            .await
            .unwrap();

        repo.delete(
            &created.id,
            ResolveHints::none(),
            &Actor::new("m1", Role::Moderator),
        )
        .await
        .unwrap();
        assert_eq!(store.count(COMMENT_KIND), 0);
    }

    #[tokio::test]
    async fn test_delete_missing_comment_is_not_found() {
        let (repo, _store) = repository();
        let result = repo.delete("ghost", ResolveHints::none(), &user("u1")).await;
        assert!(matches!(result, Err(CommentError::NotFound)));
    }

    #[tokio::test]
    async fn test_format_substitutes_placeholder_for_undecryptable_content() {
        let (repo, store) = repository();
        // Legacy record whose content was stored as plaintext, never encrypted.
        let mut fields = Map::new();
        fields.insert("content".to_string(), json!("legacy plaintext"));
        fields.insert("locationId".to_string(), json!("loc-1"));
        let key = EntityKey::flat(COMMENT_KIND, KeyId::Name("legacy".to_string()));
        store.save(&key, fields).await.unwrap();

        let comment = repo
            .get("legacy", ResolveHints::none(), Role::User)
            .await
            .unwrap();
        assert_eq!(comment.content, UNAVAILABLE_CONTENT);
    }

    #[tokio::test]
    async fn test_format_defaults_missing_display_fields() {
        let (repo, store) = repository();
        let mut fields = Map::new();
        fields.insert("locationId".to_string(), json!("loc-1"));
        fields.insert("timestamp".to_string(), json!(1_714_560_000_000_i64));
        let key = EntityKey::flat(COMMENT_KIND, KeyId::Name("bare".to_string()));
        store.save(&key, fields).await.unwrap();

        let comment = repo
            .get("bare", ResolveHints::none(), Role::User)
            .await
            .unwrap();
        assert_eq!(comment.id, "bare");
        assert_eq!(comment.content, "");
        assert_eq!(comment.user_display_name, DEFAULT_DISPLAY_NAME);
        assert_eq!(comment.location_name, DEFAULT_LOCATION_NAME);
        // Numeric epoch-millis timestamps come back as RFC 3339.
        assert!(comment.timestamp.starts_with("2024-05-01"));
        assert!(!comment.approved);
        assert_eq!(comment.status, CommentStatus::Pending);
    }

    #[tokio::test]
    async fn test_format_falls_back_on_unaddressable_record() {
        let (repo, _store) = repository();
        let document = Document::new(EntityKey::Ancestor { path: vec![] }, Map::new());
        let comment = repo.format(&document, Role::User);
        assert_eq!(comment.status, CommentStatus::Error);
        assert_eq!(comment.content, "[Error formatting comment]");
    }
}
