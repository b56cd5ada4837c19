// Moderation domain models.
//
// The status machine is deliberately small: `pending` can go to `approved`
// or `rejected`, both of which are terminal. Creation can bypass `pending`
// entirely for privileged authors.

use crate::core::comments::{CommentError, CommentStatus, Role};

/// A moderator's verdict on a pending comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationDecision {
    Approve,
    Reject,
}

impl ModerationDecision {
    /// Parse the wire form. Anything other than the two valid target
    /// statuses is rejected here, before any store access.
    pub fn parse(raw: &str) -> Result<Self, CommentError> {
        match raw {
            "approved" => Ok(ModerationDecision::Approve),
            "rejected" => Ok(ModerationDecision::Reject),
            other => Err(CommentError::Validation(format!(
                "Invalid status value: {other}"
            ))),
        }
    }

    pub fn target_status(&self) -> CommentStatus {
        match self {
            ModerationDecision::Approve => CommentStatus::Approved,
            ModerationDecision::Reject => CommentStatus::Rejected,
        }
    }
}

/// Status a freshly created comment starts in. Privileged authors
/// auto-approve; everyone else queues for moderation.
pub fn initial_status(role: Role) -> CommentStatus {
    if role.is_privileged() {
        CommentStatus::Approved
    } else {
        CommentStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_parsing() {
        assert_eq!(
            ModerationDecision::parse("approved").unwrap(),
            ModerationDecision::Approve
        );
        assert_eq!(
            ModerationDecision::parse("rejected").unwrap(),
            ModerationDecision::Reject
        );
        assert!(matches!(
            ModerationDecision::parse("pending"),
            Err(CommentError::Validation(_))
        ));
        assert!(matches!(
            ModerationDecision::parse("APPROVED"),
            Err(CommentError::Validation(_))
        ));
    }

    #[test]
    fn test_initial_status_by_role() {
        assert_eq!(initial_status(Role::User), CommentStatus::Pending);
        assert_eq!(initial_status(Role::Moderator), CommentStatus::Approved);
        assert_eq!(initial_status(Role::Admin), CommentStatus::Approved);
    }
}
