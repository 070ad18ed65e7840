//! Rollout group queries

use super::RepositoryContext;
use hawk_authorization::OperationId;
use hawk_core::{HawkError, HawkResult, Principal, RolloutGroupId, RolloutId, TenantId};
use hawk_store::{RolloutGroup, Target};

/// Read access to rollout groups and their members
#[derive(Clone)]
pub struct RolloutGroupManagement {
    ctx: RepositoryContext,
}

impl RolloutGroupManagement {
    /// Service over the shared context
    pub fn new(ctx: RepositoryContext) -> Self {
        Self { ctx }
    }

    /// Group by id
    pub async fn get(&self, principal: &Principal, id: RolloutGroupId) -> HawkResult<RolloutGroup> {
        let tenant = principal.tenant();
        self.ctx
            .guard(principal, OperationId::RolloutGroupRead, || async move {
                self.group(tenant, id).await
            })
            .await
    }

    /// Groups of one rollout
    pub async fn find_by_rollout(
        &self,
        principal: &Principal,
        rollout: RolloutId,
    ) -> HawkResult<Vec<RolloutGroup>> {
        let tenant = principal.tenant();
        self.ctx
            .guard(principal, OperationId::RolloutGroupRead, || async move {
                self.ctx.store.list_rollout_groups(tenant, rollout).await
            })
            .await
    }

    /// Number of groups of one rollout
    pub async fn count_by_rollout(
        &self,
        principal: &Principal,
        rollout: RolloutId,
    ) -> HawkResult<usize> {
        let tenant = principal.tenant();
        self.ctx
            .guard(principal, OperationId::RolloutGroupRead, || async move {
                Ok(self.ctx.store.list_rollout_groups(tenant, rollout).await?.len())
            })
            .await
    }

    /// Targets of a group that still exist
    pub async fn find_targets(
        &self,
        principal: &Principal,
        id: RolloutGroupId,
    ) -> HawkResult<Vec<Target>> {
        let tenant = principal.tenant();
        self.ctx
            .guard(principal, OperationId::RolloutGroupReadTargets, || async move {
                self.members(tenant, id).await
            })
            .await
    }

    /// Number of existing targets in a group
    pub async fn count_targets(
        &self,
        principal: &Principal,
        id: RolloutGroupId,
    ) -> HawkResult<usize> {
        let tenant = principal.tenant();
        self.ctx
            .guard(principal, OperationId::RolloutGroupReadTargets, || async move {
                Ok(self.members(tenant, id).await?.len())
            })
            .await
    }

    async fn group(&self, tenant: &TenantId, id: RolloutGroupId) -> HawkResult<RolloutGroup> {
        self.ctx
            .store
            .get_rollout_group(tenant, id)
            .await?
            .ok_or_else(|| HawkError::not_found(format!("{id}")))
    }

    async fn members(&self, tenant: &TenantId, id: RolloutGroupId) -> HawkResult<Vec<Target>> {
        let group = self.group(tenant, id).await?;
        let mut targets = Vec::with_capacity(group.targets.len());
        for controller_id in &group.targets {
            // Deleted targets stay listed in the group
            if let Some(target) = self.ctx.store.get_target(tenant, controller_id).await? {
                targets.push(target);
            }
        }
        Ok(targets)
    }
}
