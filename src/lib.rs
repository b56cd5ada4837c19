// Comment storage and moderation engine for the weather app backend.
//
// **Architecture Overview:**
// - `core/` = Business logic (storage-backend-agnostic)
// - `infra/` = Implementations of core traits (document stores, key bootstrap)
//
// Route handlers consume this crate with already-authenticated inputs: they
// hand over an actor (id + role) and a payload or target identifier, and get
// back transport-safe DTOs or a typed `CommentError`.

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
pub mod core;
#[path = "infra/infra_layer.rs"]
pub mod infra;
