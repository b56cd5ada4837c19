// Comment domain models - data structures for the comment engine.
//
// These are pure domain types with no storage-backend dependencies. The
// transport layer serializes the `Comment` DTO as-is.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::store::StoreError;

/// Entity kinds used in comment addressing.
pub const COMMENT_KIND: &str = "Comment";
pub const USER_KIND: &str = "User";
pub const LOCATION_KIND: &str = "Location";

/// Fields stored encrypted at rest.
pub const ENCRYPTED_FIELDS: &[&str] = &["content"];

/// Maximum accepted comment length, in characters.
pub const MAX_CONTENT_CHARS: usize = 1000;

/// Placeholder exposed when stored content cannot be decrypted.
pub const UNAVAILABLE_CONTENT: &str = "[Content unavailable due to encryption error]";

pub const DEFAULT_LOCATION_NAME: &str = "Unknown Location";
pub const DEFAULT_DISPLAY_NAME: &str = "Anonymous";

#[derive(Debug, Error)]
pub enum CommentError {
    #[error("{0}")]
    Validation(String),

    #[error("comment not found")]
    NotFound,

    #[error("you do not have permission to perform this action")]
    Forbidden,

    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: CommentStatus, to: CommentStatus },

    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

/// Caller roles, as supplied by the authorization layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Moderator,
    Admin,
}

impl Role {
    /// Moderators and admins may moderate and see unapproved comments.
    pub fn is_privileged(&self) -> bool {
        matches!(self, Role::Moderator | Role::Admin)
    }

    /// Unknown role strings fall back to the default `user` role.
    pub fn parse_or_default(raw: &str) -> Role {
        match raw {
            "moderator" => Role::Moderator,
            "admin" => Role::Admin,
            _ => Role::User,
        }
    }
}

/// An authenticated caller: who they are and what they may do.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }
}

/// Moderation status of a comment. `approved` on the DTO is always derived
/// from this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentStatus {
    Pending,
    Approved,
    Rejected,
    /// Only produced by the formatting fallback for a record that could not
    /// be read at all. Never stored.
    Error,
}

impl CommentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommentStatus::Pending => "pending",
            CommentStatus::Approved => "approved",
            CommentStatus::Rejected => "rejected",
            CommentStatus::Error => "error",
        }
    }

    /// Parse a stored status value. Unknown values read back as `pending`,
    /// matching how legacy records without a status behave.
    pub fn parse_or_pending(raw: &str) -> CommentStatus {
        match raw {
            "approved" => CommentStatus::Approved,
            "rejected" => CommentStatus::Rejected,
            _ => CommentStatus::Pending,
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, CommentStatus::Approved)
    }
}

impl std::fmt::Display for CommentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payload for creating a comment.
#[derive(Debug, Clone, Deserialize)]
pub struct NewComment {
    pub content: String,
    pub location_id: String,
    pub location_name: Option<String>,
}

/// The transport-safe comment shape. Ids are always strings here regardless
/// of how the store addressed the record, and `content` is always decrypted
/// (or the placeholder).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub content: String,
    pub location_id: String,
    pub location_name: String,
    pub user_id: String,
    pub user_display_name: String,
    /// RFC 3339 / ISO-8601.
    pub timestamp: String,
    pub approved: bool,
    pub status: CommentStatus,
    /// Set only once a moderator has acted on the comment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moderated_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moderated_by: Option<String>,
}

impl Comment {
    /// Minimal safe shape returned when a record cannot be formatted. The
    /// caller's UI must never crash on one malformed record.
    pub fn formatting_fallback(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: "[Error formatting comment]".to_string(),
            location_id: String::new(),
            location_name: DEFAULT_LOCATION_NAME.to_string(),
            user_id: String::new(),
            user_display_name: "Unknown".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            approved: false,
            status: CommentStatus::Error,
            moderated_at: None,
            moderated_by: None,
        }
    }
}

/// Read the moderation status recorded on a stored field map. Records from
/// before the status field existed carry only the `approved` boolean, so it
/// is used as the tiebreaker when `status` is absent.
pub fn stored_status(fields: &serde_json::Map<String, serde_json::Value>) -> CommentStatus {
    match fields.get("status").and_then(serde_json::Value::as_str) {
        Some(raw) => CommentStatus::parse_or_pending(raw),
        None => {
            if fields.get("approved") == Some(&serde_json::Value::Bool(true)) {
                CommentStatus::Approved
            } else {
                CommentStatus::Pending
            }
        }
    }
}

/// Validate a comment payload before anything touches the store.
pub fn validate_content(content: &str) -> Result<(), CommentError> {
    if content.trim().is_empty() {
        return Err(CommentError::Validation(
            "Comment content is required".to_string(),
        ));
    }
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(CommentError::Validation(format!(
            "Comment content cannot exceed {MAX_CONTENT_CHARS} characters"
        )));
    }
    Ok(())
}
