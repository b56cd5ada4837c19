// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "store/mod.rs"]
pub mod store;

#[path = "crypto/key_source.rs"]
pub mod crypto;
