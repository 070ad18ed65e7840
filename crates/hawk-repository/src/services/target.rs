//! Target management

use super::{check_text, RepositoryContext, NAME_MAX_LEN};
use crate::events::RepositoryEvent;
use hawk_authorization::OperationId;
use hawk_core::{ControllerId, HawkError, HawkResult, Principal, TenantId};
use hawk_store::{NewTarget, Target, TargetUpdate};

/// Management-side request to create a target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetRequest {
    /// Identity the device will use
    pub controller_id: ControllerId,
    /// Display name, defaults to the controller id
    pub name: Option<String>,
    /// Free text
    pub description: Option<String>,
    /// Target type
    pub target_type: Option<String>,
    /// Token the device authenticates with; generated when absent
    pub security_token: Option<String>,
}

impl TargetRequest {
    /// Request with nothing but the controller id
    pub fn new(controller_id: ControllerId) -> Self {
        Self {
            controller_id,
            name: None,
            description: None,
            target_type: None,
            security_token: None,
        }
    }
}

/// Editable target fields; `None` keeps the stored value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetEdit {
    /// New display name
    pub name: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New target type
    pub target_type: Option<String>,
}

/// Random 128-bit token, hex encoded
pub(crate) fn generate_security_token() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

/// Operator access to targets
#[derive(Clone)]
pub struct TargetManagement {
    ctx: RepositoryContext,
}

impl TargetManagement {
    /// Service over the shared context
    pub fn new(ctx: RepositoryContext) -> Self {
        Self { ctx }
    }

    /// Target by controller id
    pub async fn get(
        &self,
        principal: &Principal,
        controller_id: &ControllerId,
    ) -> HawkResult<Target> {
        let tenant = principal.tenant();
        self.ctx
            .guard(principal, OperationId::TargetRead, || async move {
                self.ctx
                    .store
                    .get_target(tenant, controller_id)
                    .await?
                    .ok_or_else(|| HawkError::not_found(format!("target {controller_id}")))
            })
            .await
    }

    /// Every target of the caller's tenant
    pub async fn find_all(&self, principal: &Principal) -> HawkResult<Vec<Target>> {
        let tenant = principal.tenant();
        self.ctx
            .guard(principal, OperationId::TargetRead, || async move {
                self.ctx.store.list_targets(tenant).await
            })
            .await
    }

    /// Number of targets in the caller's tenant
    pub async fn count(&self, principal: &Principal) -> HawkResult<usize> {
        let tenant = principal.tenant();
        self.ctx
            .guard(principal, OperationId::TargetRead, || async move {
                self.ctx.store.count_targets(tenant).await
            })
            .await
    }

    /// Create a target that has not polled yet
    pub async fn create(
        &self,
        principal: &Principal,
        request: TargetRequest,
    ) -> HawkResult<Target> {
        let tenant = principal.tenant();
        self.ctx
            .guard(principal, OperationId::TargetCreate, || async move {
                if let Some(name) = &request.name {
                    check_text("name", name, NAME_MAX_LEN)?;
                }
                let controller_id = request.controller_id.clone();
                let mut new_target = NewTarget::new(
                    request.controller_id,
                    request
                        .security_token
                        .unwrap_or_else(generate_security_token),
                );
                new_target.name = request.name;
                new_target.description = request.description;
                new_target.target_type = request.target_type;

                let _guard = self.ctx.locks.lock(tenant, &controller_id).await;
                let created = self
                    .ctx
                    .store
                    .create_target(tenant, new_target, self.ctx.now())
                    .await?;
                tracing::info!(%tenant, %controller_id, "target created");
                self.ctx.publish(RepositoryEvent::TargetCreated {
                    tenant: tenant.clone(),
                    controller_id,
                });
                Ok(created)
            })
            .await
    }

    /// Edit name, description or type against an expected revision
    pub async fn update(
        &self,
        principal: &Principal,
        controller_id: &ControllerId,
        expected_revision: u64,
        edit: TargetEdit,
    ) -> HawkResult<Target> {
        let tenant = principal.tenant();
        self.ctx
            .guard(principal, OperationId::TargetUpdate, || async move {
                if let Some(name) = &edit.name {
                    check_text("name", name, NAME_MAX_LEN)?;
                }
                let update = TargetUpdate {
                    name: edit.name,
                    description: edit.description,
                    target_type: edit.target_type,
                    ..TargetUpdate::default()
                };

                let _guard = self.ctx.locks.lock(tenant, controller_id).await;
                let updated = self
                    .ctx
                    .store
                    .update_target(tenant, controller_id, expected_revision, update)
                    .await?;
                self.ctx.publish(RepositoryEvent::TargetUpdated {
                    tenant: tenant.clone(),
                    controller_id: controller_id.clone(),
                    revision: updated.revision,
                });
                Ok(updated)
            })
            .await
    }

    /// Remove a target and anything buffered for it
    pub async fn delete(
        &self,
        principal: &Principal,
        controller_id: &ControllerId,
    ) -> HawkResult<()> {
        let tenant = principal.tenant();
        self.ctx
            .guard(principal, OperationId::TargetDelete, || async move {
                delete_target(&self.ctx, tenant, controller_id).await
            })
            .await
    }
}

/// Shared by operator and device deletion
pub(crate) async fn delete_target(
    ctx: &RepositoryContext,
    tenant: &TenantId,
    controller_id: &ControllerId,
) -> HawkResult<()> {
    let _guard = ctx.locks.lock(tenant, controller_id).await;
    ctx.store.delete_target(tenant, controller_id).await?;
    ctx.poll_writer.discard(tenant, controller_id);
    tracing::info!(%tenant, %controller_id, "target deleted");
    ctx.publish(RepositoryEvent::TargetDeleted {
        tenant: tenant.clone(),
        controller_id: controller_id.clone(),
    });
    Ok(())
}
