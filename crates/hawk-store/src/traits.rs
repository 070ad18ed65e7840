//! Storage collaborator interfaces
//!
//! Every write that changes entity content carries the revision the caller
//! read and fails with `OptimisticLock` if another writer got there first.
//! The single exception is [`TargetStore::touch_last_query`], which records
//! poll metadata without taking part in optimistic locking.

use crate::model::*;
use async_trait::async_trait;
use hawk_core::{
    ActionId, ControllerId, HawkResult, RolloutGroupId, RolloutId, SoftwareModuleTypeId, TagId,
    TenantId,
};

/// Target persistence
#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Target by controller id, `None` if absent
    async fn get_target(
        &self,
        tenant: &TenantId,
        controller_id: &ControllerId,
    ) -> HawkResult<Option<Target>>;

    /// All targets of a tenant ordered by controller id
    async fn list_targets(&self, tenant: &TenantId) -> HawkResult<Vec<Target>>;

    /// Number of targets of a tenant
    async fn count_targets(&self, tenant: &TenantId) -> HawkResult<usize>;

    /// Insert a target at revision 1; `AlreadyExists` if the id is taken
    async fn create_target(
        &self,
        tenant: &TenantId,
        target: NewTarget,
        now: u64,
    ) -> HawkResult<Target>;

    /// Apply a content update and bump the revision
    async fn update_target(
        &self,
        tenant: &TenantId,
        controller_id: &ControllerId,
        expected_revision: u64,
        update: TargetUpdate,
    ) -> HawkResult<Target>;

    /// Record poll times as a single statement without bumping revisions
    ///
    /// Each stored value only moves forward. Returns how many of the listed
    /// targets exist and were touched; missing ones are skipped.
    async fn touch_last_query(
        &self,
        tenant: &TenantId,
        entries: &[(ControllerId, u64)],
    ) -> HawkResult<usize>;

    /// Remove a target
    async fn delete_target(&self, tenant: &TenantId, controller_id: &ControllerId)
        -> HawkResult<()>;
}

/// Target tag and distribution set tag persistence
#[async_trait]
pub trait TagStore: Send + Sync {
    /// Insert a tag; names are unique per tenant and kind
    async fn create_tag(&self, tenant: &TenantId, tag: NewTag) -> HawkResult<Tag>;

    /// Tag by id, `None` if absent or of another kind
    async fn get_tag(&self, tenant: &TenantId, kind: TagKind, id: TagId)
        -> HawkResult<Option<Tag>>;

    /// Tag by exact name
    async fn find_tag_by_name(
        &self,
        tenant: &TenantId,
        kind: TagKind,
        name: &str,
    ) -> HawkResult<Option<Tag>>;

    /// All tags of one kind ordered by id
    async fn list_tags(&self, tenant: &TenantId, kind: TagKind) -> HawkResult<Vec<Tag>>;

    /// Apply an update and bump the revision
    async fn update_tag(
        &self,
        tenant: &TenantId,
        kind: TagKind,
        id: TagId,
        expected_revision: u64,
        update: TagUpdate,
    ) -> HawkResult<Tag>;

    /// Remove a tag; target tags are also detached from every target
    async fn delete_tag(&self, tenant: &TenantId, kind: TagKind, id: TagId) -> HawkResult<()>;
}

/// Software module type persistence
#[async_trait]
pub trait SoftwareModuleTypeStore: Send + Sync {
    /// Insert a type; key and name are unique per tenant
    async fn create_module_type(
        &self,
        tenant: &TenantId,
        module_type: NewSoftwareModuleType,
    ) -> HawkResult<SoftwareModuleType>;

    async fn get_module_type(
        &self,
        tenant: &TenantId,
        id: SoftwareModuleTypeId,
    ) -> HawkResult<Option<SoftwareModuleType>>;

    /// All types of a tenant ordered by id
    async fn list_module_types(&self, tenant: &TenantId) -> HawkResult<Vec<SoftwareModuleType>>;

    async fn update_module_type(
        &self,
        tenant: &TenantId,
        id: SoftwareModuleTypeId,
        expected_revision: u64,
        update: SoftwareModuleTypeUpdate,
    ) -> HawkResult<SoftwareModuleType>;

    async fn delete_module_type(&self, tenant: &TenantId, id: SoftwareModuleTypeId)
        -> HawkResult<()>;
}

/// Rollout group persistence
#[async_trait]
pub trait RolloutGroupStore: Send + Sync {
    /// Insert a group; used by rollout creation and fixtures
    async fn create_rollout_group(
        &self,
        tenant: &TenantId,
        group: NewRolloutGroup,
    ) -> HawkResult<RolloutGroup>;

    async fn get_rollout_group(
        &self,
        tenant: &TenantId,
        id: RolloutGroupId,
    ) -> HawkResult<Option<RolloutGroup>>;

    /// Groups of one rollout ordered by id
    async fn list_rollout_groups(
        &self,
        tenant: &TenantId,
        rollout: RolloutId,
    ) -> HawkResult<Vec<RolloutGroup>>;
}

/// Deployment action persistence
#[async_trait]
pub trait ActionStore: Send + Sync {
    async fn create_action(&self, tenant: &TenantId, action: NewAction, now: u64)
        -> HawkResult<Action>;

    async fn get_action(&self, tenant: &TenantId, id: ActionId) -> HawkResult<Option<Action>>;

    /// Actions of one target ordered by id
    async fn list_actions(
        &self,
        tenant: &TenantId,
        controller_id: &ControllerId,
    ) -> HawkResult<Vec<Action>>;

    /// Number of actions of a tenant
    async fn count_actions(&self, tenant: &TenantId) -> HawkResult<usize>;

    /// Apply a status change and bump the revision
    async fn update_action(
        &self,
        tenant: &TenantId,
        id: ActionId,
        expected_revision: u64,
        update: ActionUpdate,
    ) -> HawkResult<Action>;
}

/// Every storage interface the repository layer needs
pub trait RepositoryStore:
    TargetStore + TagStore + SoftwareModuleTypeStore + RolloutGroupStore + ActionStore
{
}

impl<T> RepositoryStore for T where
    T: TargetStore + TagStore + SoftwareModuleTypeStore + RolloutGroupStore + ActionStore
{
}
