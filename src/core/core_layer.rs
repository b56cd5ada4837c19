// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "store/mod.rs"]
pub mod store;

#[path = "crypto/field_cipher.rs"]
pub mod crypto;

#[path = "keys/key_resolver.rs"]
pub mod keys;

#[path = "comments/mod.rs"]
pub mod comments;

#[path = "moderation/mod.rs"]
pub mod moderation;
