//! # Hawk Store
//!
//! Storage collaborator for the repository layer: the per-entity store traits
//! and [`MemoryStore`], an in-memory implementation with optimistic locking.
//!
//! Content writes bump an entity's revision and fail with
//! `HawkError::OptimisticLock` when the caller's expected revision is stale.
//! Poll timestamps are written through [`TargetStore::touch_last_query`],
//! which never bumps a revision.

#![forbid(unsafe_code)]

mod memory;
mod model;
mod traits;

pub use memory::{MemoryStore, StoreStats};
pub use model::*;
pub use traits::{
    ActionStore, RepositoryStore, RolloutGroupStore, SoftwareModuleTypeStore, TagStore,
    TargetStore,
};
