//! Guarded management services
//!
//! Each public method names exactly one [`OperationId`] and runs its body
//! through [`Gatekeeper::guard`], so a denied caller never reaches storage.
//! The tenant is always the caller's own.

mod confirmation;
mod controller;
mod module_type;
mod rollout_group;
mod system;
mod tag;
mod target;

pub use confirmation::ConfirmationManagement;
pub use controller::{
    AttributeUpdateMode, ControllerManagement, Registration, MAX_ATTRIBUTES_PER_TARGET,
    MAX_ATTRIBUTE_LEN,
};
pub use module_type::{ModuleTypeRequest, SoftwareModuleTypeManagement};
pub use rollout_group::RolloutGroupManagement;
pub use system::{SystemManagement, TenantUsage};
pub use tag::{TagManagement, TagRequest};
pub use target::{TargetEdit, TargetManagement, TargetRequest};

use crate::events::{EventPublisher, RepositoryEvent};
use crate::locks::EntityLocks;
use crate::poll::PollWriter;
use hawk_authorization::{Gatekeeper, OperationId};
use hawk_core::{Clock, HawkError, HawkResult, Principal};
use hawk_store::RepositoryStore;
use std::future::Future;
use std::sync::Arc;

/// Collaborators shared by every service
#[derive(Clone)]
pub struct RepositoryContext {
    pub(crate) store: Arc<dyn RepositoryStore>,
    pub(crate) gatekeeper: Gatekeeper,
    pub(crate) events: Arc<dyn EventPublisher>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) locks: Arc<EntityLocks>,
    pub(crate) poll_writer: Arc<dyn PollWriter>,
}

impl RepositoryContext {
    /// Gatekeeper in front of every service
    pub fn gatekeeper(&self) -> &Gatekeeper {
        &self.gatekeeper
    }

    pub(crate) async fn guard<T, F, Fut>(
        &self,
        principal: &Principal,
        operation: OperationId,
        body: F,
    ) -> HawkResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = HawkResult<T>>,
    {
        self.gatekeeper.guard(principal, operation, body).await
    }

    pub(crate) fn publish(&self, event: RepositoryEvent) {
        self.events.publish(event);
    }

    pub(crate) fn now(&self) -> u64 {
        self.clock.now_millis()
    }
}

/// Reject empty or oversized text fields
pub(crate) fn check_text(field: &str, value: &str, max_len: usize) -> HawkResult<()> {
    if value.trim().is_empty() {
        return Err(HawkError::invalid(format!("{field} must not be empty")));
    }
    if value.chars().count() > max_len {
        return Err(HawkError::invalid(format!(
            "{field} exceeds {max_len} characters"
        )));
    }
    Ok(())
}

/// Maximum length of entity names
pub(crate) const NAME_MAX_LEN: usize = 128;
