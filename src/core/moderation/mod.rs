// Core moderation module - the status state machine over comments.
// Following the same pattern as the comments module.

pub mod moderation_models;
pub mod moderation_workflow;

pub use moderation_models::*;
pub use moderation_workflow::*;
