// Core comments module - domain models and the repository façade.

pub mod comment_models;
pub mod comment_repository;

pub use comment_models::*;
pub use comment_repository::*;
