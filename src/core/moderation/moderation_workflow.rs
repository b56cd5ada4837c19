// Moderation workflow - the state machine layered on top of the repository.
//
// Validates who may moderate and which transitions are legal, then applies
// the decision through the repository. All checks happen before any store
// mutation. There is no conditional write underneath: two concurrent
// moderations of the same comment race, later write wins.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use crate::core::comments::{
    stored_status, Actor, Comment, CommentError, CommentRepository, CommentStatus,
};
use crate::core::keys::ResolveHints;
use crate::core::store::DocumentStore;

use super::moderation_models::ModerationDecision;

pub struct ModerationWorkflow<S: DocumentStore> {
    repository: Arc<CommentRepository<S>>,
}

impl<S: DocumentStore> ModerationWorkflow<S> {
    pub fn new(repository: Arc<CommentRepository<S>>) -> Self {
        Self { repository }
    }

    /// Apply a moderation decision to a comment.
    ///
    /// Transition rules:
    /// - `pending -> approved` and `pending -> rejected` stamp the entity
    ///   with the moderation time and the acting moderator's id.
    /// - Repeating the current status is an idempotent no-op (no restamp).
    /// - Any other transition is rejected without touching the store.
    pub async fn moderate(
        &self,
        moderator: &Actor,
        identifier: &str,
        hints: ResolveHints<'_>,
        decision: ModerationDecision,
    ) -> Result<Comment, CommentError> {
        if !moderator.role.is_privileged() {
            return Err(CommentError::Forbidden);
        }

        let mut document = self
            .repository
            .resolve_document(identifier, hints)
            .await?
            .ok_or(CommentError::NotFound)?;

        let current = stored_status(&document.fields);
        let target = decision.target_status();

        if current == target {
            tracing::debug!(identifier, status = %target, "moderation repeat, no-op");
            return Ok(self.repository.format(&document, moderator.role));
        }
        if current != CommentStatus::Pending {
            return Err(CommentError::InvalidTransition {
                from: current,
                to: target,
            });
        }

        document
            .fields
            .insert("status".to_string(), json!(target.as_str()));
        document
            .fields
            .insert("approved".to_string(), json!(target.is_approved()));
        document
            .fields
            .insert("moderatedAt".to_string(), json!(Utc::now().to_rfc3339()));
        document
            .fields
            .insert("moderatedBy".to_string(), json!(moderator.id));

        self.repository.save_document(&document).await?;
        tracing::info!(identifier, moderator = %moderator.id, status = %target, "comment moderated");

        Ok(self.repository.format(&document, moderator.role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::comments::{NewComment, Role};
    use crate::core::crypto::{CipherKey, FieldCipher};
    use crate::infra::store::InMemoryDocumentStore;

    fn setup() -> (
        Arc<CommentRepository<InMemoryDocumentStore>>,
        ModerationWorkflow<InMemoryDocumentStore>,
    ) {
        let store = Arc::new(InMemoryDocumentStore::new());
        let cipher = FieldCipher::new(&CipherKey::generate());
        let repository = Arc::new(CommentRepository::new(store, cipher));
        let workflow = ModerationWorkflow::new(Arc::clone(&repository));
        (repository, workflow)
    }

    async fn pending_comment(repository: &CommentRepository<InMemoryDocumentStore>) -> Comment {
        repository
            .create(
                &Actor::new("u1", Role::User),
                "Kari",
                NewComment {
                    content: "Nice view!".to_string(),
                    location_id: "loc-1".to_string(),
                    location_name: None,
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_approve_stamps_moderator_and_syncs_approved() {
        let (repository, workflow) = setup();
        let comment = pending_comment(&repository).await;
        let moderator = Actor::new("mod-1", Role::Moderator);

        let approved = workflow
            .moderate(
                &moderator,
                &comment.id,
                ResolveHints::none(),
                ModerationDecision::Approve,
            )
            .await
            .unwrap();

        assert_eq!(approved.status, CommentStatus::Approved);
        assert!(approved.approved);
        assert_eq!(approved.moderated_by.as_deref(), Some("mod-1"));
        assert!(approved.moderated_at.is_some());

        // The approved comment now shows up for unprivileged viewers.
        let listing = repository
            .list_for_location("loc-1", Role::User)
            .await
            .unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].content, "Nice view!");
    }

    #[tokio::test]
    async fn test_reject_is_terminal_and_hidden_from_users() {
        let (repository, workflow) = setup();
        let comment = pending_comment(&repository).await;

        let rejected = workflow
            .moderate(
                &Actor::new("mod-1", Role::Admin),
                &comment.id,
                ResolveHints::none(),
                ModerationDecision::Reject,
            )
            .await
            .unwrap();
        assert_eq!(rejected.status, CommentStatus::Rejected);
        assert!(!rejected.approved);

        let listing = repository
            .list_for_location("loc-1", Role::User)
            .await
            .unwrap();
        assert!(listing.is_empty());
    }

    #[tokio::test]
    async fn test_repeat_decision_is_idempotent() {
        let (repository, workflow) = setup();
        let comment = pending_comment(&repository).await;
        let moderator = Actor::new("mod-1", Role::Moderator);

        let first = workflow
            .moderate(
                &moderator,
                &comment.id,
                ResolveHints::none(),
                ModerationDecision::Approve,
            )
            .await
            .unwrap();
        let second = workflow
            .moderate(
                &moderator,
                &comment.id,
                ResolveHints::none(),
                ModerationDecision::Approve,
            )
            .await
            .unwrap();

        // Same resulting state, original stamp preserved.
        assert_eq!(first.moderated_at, second.moderated_at);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_terminal_states_cannot_be_crossed() {
        let (repository, workflow) = setup();
        let comment = pending_comment(&repository).await;
        let moderator = Actor::new("mod-1", Role::Moderator);

        workflow
            .moderate(
                &moderator,
                &comment.id,
                ResolveHints::none(),
                ModerationDecision::Approve,
            )
            .await
            .unwrap();

        let result = workflow
            .moderate(
                &moderator,
                &comment.id,
                ResolveHints::none(),
                ModerationDecision::Reject,
            )
            .await;
        assert!(matches!(
            result,
            Err(CommentError::InvalidTransition {
                from: CommentStatus::Approved,
                to: CommentStatus::Rejected,
            })
        ));

        // The entity is untouched.
        let fetched = repository
            .get(&comment.id, ResolveHints::none(), Role::Moderator)
            .await
            .unwrap();
        assert_eq!(fetched.status, CommentStatus::Approved);
    }

    #[tokio::test]
    async fn test_unprivileged_moderator_is_forbidden() {
        let (repository, workflow) = setup();
        let comment = pending_comment(&repository).await;

        let result = workflow
            .moderate(
                &Actor::new("u2", Role::User),
                &comment.id,
                ResolveHints::none(),
                ModerationDecision::Approve,
            )
            .await;
        assert!(matches!(result, Err(CommentError::Forbidden)));
    }

    #[tokio::test]
    async fn test_missing_comment_is_not_found() {
        let (_repository, workflow) = setup();
        let result = workflow
            .moderate(
                &Actor::new("mod-1", Role::Moderator),
                "ghost",
                ResolveHints::none(),
                ModerationDecision::Approve,
            )
            .await;
        assert!(matches!(result, Err(CommentError::NotFound)));
    }
}
