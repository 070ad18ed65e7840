//! Repository events
//!
//! Notifications emitted after a write succeeds. Delivery is best effort:
//! publishing never fails the write that caused it.

use hawk_core::{ActionId, ControllerId, SoftwareModuleTypeId, TagId, TenantId};
use hawk_store::TagKind;
use serde::Serialize;
use tokio::sync::broadcast;

/// Something observable happened in the repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[allow(missing_docs)]
pub enum RepositoryEvent {
    TargetCreated {
        tenant: TenantId,
        controller_id: ControllerId,
    },
    /// A device polled; emitted per poll, independent of when it is persisted
    TargetPolled {
        tenant: TenantId,
        controller_id: ControllerId,
        polled_at: u64,
    },
    TargetUpdated {
        tenant: TenantId,
        controller_id: ControllerId,
        revision: u64,
    },
    TargetDeleted {
        tenant: TenantId,
        controller_id: ControllerId,
    },
    TagCreated {
        tenant: TenantId,
        kind: TagKind,
        id: TagId,
    },
    TagUpdated {
        tenant: TenantId,
        kind: TagKind,
        id: TagId,
    },
    TagDeleted {
        tenant: TenantId,
        kind: TagKind,
        id: TagId,
    },
    SoftwareModuleTypeCreated {
        tenant: TenantId,
        id: SoftwareModuleTypeId,
    },
    SoftwareModuleTypeUpdated {
        tenant: TenantId,
        id: SoftwareModuleTypeId,
    },
    SoftwareModuleTypeDeleted {
        tenant: TenantId,
        id: SoftwareModuleTypeId,
    },
    ActionConfirmed {
        tenant: TenantId,
        action: ActionId,
    },
    ActionDenied {
        tenant: TenantId,
        action: ActionId,
    },
    AutoConfirmationActivated {
        tenant: TenantId,
        controller_id: ControllerId,
    },
    AutoConfirmationDeactivated {
        tenant: TenantId,
        controller_id: ControllerId,
    },
}

impl RepositoryEvent {
    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            RepositoryEvent::TargetCreated { .. } => "target_created",
            RepositoryEvent::TargetPolled { .. } => "target_polled",
            RepositoryEvent::TargetUpdated { .. } => "target_updated",
            RepositoryEvent::TargetDeleted { .. } => "target_deleted",
            RepositoryEvent::TagCreated { .. } => "tag_created",
            RepositoryEvent::TagUpdated { .. } => "tag_updated",
            RepositoryEvent::TagDeleted { .. } => "tag_deleted",
            RepositoryEvent::SoftwareModuleTypeCreated { .. } => "software_module_type_created",
            RepositoryEvent::SoftwareModuleTypeUpdated { .. } => "software_module_type_updated",
            RepositoryEvent::SoftwareModuleTypeDeleted { .. } => "software_module_type_deleted",
            RepositoryEvent::ActionConfirmed { .. } => "action_confirmed",
            RepositoryEvent::ActionDenied { .. } => "action_denied",
            RepositoryEvent::AutoConfirmationActivated { .. } => "auto_confirmation_activated",
            RepositoryEvent::AutoConfirmationDeactivated { .. } => "auto_confirmation_deactivated",
        }
    }
}

/// Sink for repository events
pub trait EventPublisher: Send + Sync {
    /// Hand an event to subscribers
    fn publish(&self, event: RepositoryEvent);
}

/// Fan-out to in-process subscribers over a tokio broadcast channel
#[derive(Debug, Clone)]
pub struct BroadcastPublisher {
    sender: broadcast::Sender<RepositoryEvent>,
}

impl BroadcastPublisher {
    /// Channel buffering up to `capacity` events per lagging subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// New subscriber receiving every event published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<RepositoryEvent> {
        self.sender.subscribe()
    }
}

impl EventPublisher for BroadcastPublisher {
    fn publish(&self, event: RepositoryEvent) {
        tracing::trace!(event = event.kind(), "publishing repository event");
        // No subscribers is not an error
        let _ = self.sender.send(event);
    }
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPublisher;

impl EventPublisher for NoopPublisher {
    fn publish(&self, _event: RepositoryEvent) {}
}
