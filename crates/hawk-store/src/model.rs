//! Stored entities and their write payloads

#![allow(missing_docs)]

use hawk_core::{
    ActionId, ControllerId, RolloutGroupId, RolloutId, SoftwareModuleTypeId, TagId, TenantId,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Deployment state of a target as seen by the server
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetUpdateStatus {
    /// Created by management but never polled
    #[default]
    Unknown,
    /// Polled at least once, nothing assigned
    Registered,
    /// An update is assigned but not finished
    Pending,
    /// Installed distribution set matches the assigned one
    InSync,
    /// Last update failed
    Error,
}

/// Who switched auto-confirmation on, and when
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoConfirmationStatus {
    /// Principal or device that activated it
    pub initiator: Option<String>,
    /// Free-text remark
    pub remark: Option<String>,
    /// Epoch milliseconds of activation
    pub activated_at: u64,
}

/// Device known to the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub tenant: TenantId,
    pub controller_id: ControllerId,
    pub name: String,
    pub description: Option<String>,
    /// Address the device last reported itself at
    pub address: Option<String>,
    pub target_type: Option<String>,
    pub update_status: TargetUpdateStatus,
    /// Attributes reported by the device
    pub attributes: BTreeMap<String, String>,
    pub tags: BTreeSet<TagId>,
    pub security_token: String,
    pub auto_confirmation: Option<AutoConfirmationStatus>,
    /// Epoch milliseconds of the latest poll; metadata, outside the revision
    pub last_target_query: Option<u64>,
    pub created_at: u64,
    /// Optimistic-lock revision, bumped by every content write
    pub revision: u64,
}

/// Fields of a target to create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTarget {
    pub controller_id: ControllerId,
    /// Defaults to the controller id
    pub name: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub target_type: Option<String>,
    pub update_status: TargetUpdateStatus,
    pub security_token: String,
    pub last_target_query: Option<u64>,
}

impl NewTarget {
    /// Minimal target with the given identity and token
    pub fn new(controller_id: ControllerId, security_token: impl Into<String>) -> Self {
        Self {
            controller_id,
            name: None,
            description: None,
            address: None,
            target_type: None,
            update_status: TargetUpdateStatus::Unknown,
            security_token: security_token.into(),
            last_target_query: None,
        }
    }
}

/// Content changes to a target; `None` leaves the field untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub target_type: Option<String>,
    pub update_status: Option<TargetUpdateStatus>,
    pub attributes: Option<BTreeMap<String, String>>,
    pub tags: Option<BTreeSet<TagId>>,
    /// `Some(None)` switches auto-confirmation off
    pub auto_confirmation: Option<Option<AutoConfirmationStatus>>,
    /// Applied only if newer than the stored value
    pub last_target_query: Option<u64>,
}

impl TargetUpdate {
    /// Whether applying the update would change nothing
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub(crate) fn apply(self, target: &mut Target) {
        if let Some(name) = self.name {
            target.name = name;
        }
        if let Some(description) = self.description {
            target.description = Some(description);
        }
        if let Some(address) = self.address {
            target.address = Some(address);
        }
        if let Some(target_type) = self.target_type {
            target.target_type = Some(target_type);
        }
        if let Some(status) = self.update_status {
            target.update_status = status;
        }
        if let Some(attributes) = self.attributes {
            target.attributes = attributes;
        }
        if let Some(tags) = self.tags {
            target.tags = tags;
        }
        if let Some(auto_confirmation) = self.auto_confirmation {
            target.auto_confirmation = auto_confirmation;
        }
        if let Some(polled_at) = self.last_target_query {
            target.last_target_query = target.last_target_query.max(Some(polled_at));
        }
    }
}

/// Which entity family a tag labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TagKind {
    Target,
    DistributionSet,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub tenant: TenantId,
    pub kind: TagKind,
    pub name: String,
    pub description: Option<String>,
    pub colour: Option<String>,
    pub revision: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTag {
    pub kind: TagKind,
    pub name: String,
    pub description: Option<String>,
    pub colour: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub colour: Option<String>,
}

/// Kind of software module a distribution set may contain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftwareModuleType {
    pub id: SoftwareModuleTypeId,
    pub tenant: TenantId,
    /// Unique technical key
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub colour: Option<String>,
    /// How many modules of this type one distribution set may hold
    pub max_assignments: u32,
    pub revision: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSoftwareModuleType {
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub colour: Option<String>,
    pub max_assignments: u32,
}

/// Only presentation fields of a type are mutable
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SoftwareModuleTypeUpdate {
    pub description: Option<String>,
    pub colour: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RolloutGroupStatus {
    Creating,
    Ready,
    Scheduled,
    Running,
    Finished,
    Error,
}

/// Slice of a rollout's targets that is deployed together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolloutGroup {
    pub id: RolloutGroupId,
    pub tenant: TenantId,
    pub rollout: RolloutId,
    pub name: String,
    pub description: Option<String>,
    pub status: RolloutGroupStatus,
    pub targets: Vec<ControllerId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRolloutGroup {
    pub rollout: RolloutId,
    pub name: String,
    pub description: Option<String>,
    pub status: RolloutGroupStatus,
    pub targets: Vec<ControllerId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionStatus {
    /// Waiting for an operator or the device to confirm
    WaitForConfirmation,
    Running,
    Finished,
    Canceled,
    Error,
}

/// Assignment of a distribution set to one target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub id: ActionId,
    pub tenant: TenantId,
    pub controller_id: ControllerId,
    pub distribution_set: String,
    pub status: ActionStatus,
    /// Status messages in arrival order
    pub messages: Vec<String>,
    pub created_at: u64,
    pub revision: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAction {
    pub controller_id: ControllerId,
    pub distribution_set: String,
    pub status: ActionStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionUpdate {
    pub status: Option<ActionStatus>,
    /// Appended to the action's messages
    pub message: Option<String>,
}
