//! # Hawk Repository
//!
//! Permission-guarded management services over the storage collaborators of
//! `hawk-store`, and the write path for device polls.
//!
//! - [`services`]: one service per entity family; every method evaluates its
//!   operation's permission expression before any storage access
//! - [`poll`]: immediate or coalescing persistence of poll timestamps
//! - [`locks`]: per-target write serialization shared by both write paths
//! - [`events`]: notifications published after successful writes
//! - [`runtime`]: wiring, the background flush sweep and shutdown

#![forbid(unsafe_code)]

pub mod events;
pub mod locks;
pub mod poll;
pub mod runtime;
pub mod services;
pub mod tasks;

pub use events::{BroadcastPublisher, EventPublisher, NoopPublisher, RepositoryEvent};
pub use locks::EntityLocks;
pub use poll::{
    poll_writer_from_config, CoalescingWriter, FlushReport, ImmediateWriter, Poll, PollOutcome,
    PollStrategy, PollWriter,
};
pub use runtime::RepositoryRuntime;
pub use services::{
    AttributeUpdateMode, ConfirmationManagement, ControllerManagement, ModuleTypeRequest,
    Registration, RepositoryContext, RolloutGroupManagement, SoftwareModuleTypeManagement,
    SystemManagement, TagManagement, TagRequest, TargetEdit, TargetManagement, TargetRequest,
    TenantUsage, MAX_ATTRIBUTES_PER_TARGET, MAX_ATTRIBUTE_LEN,
};
pub use tasks::TaskRegistry;
