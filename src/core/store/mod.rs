// Core store module - the document-store port and its key/query models.
// Following the same pattern as the moderation module.

pub mod document_store;
pub mod store_models;

pub use document_store::*;
pub use store_models::*;
