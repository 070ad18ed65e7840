//! Confirmation workflow
//!
//! An action created for a target that requires confirmation starts in
//! `WaitForConfirmation`. It moves to `Running` when confirmed, either by a
//! caller or automatically once auto-confirmation is active on the target.
//! Denying records the answer and leaves the action waiting.

use super::RepositoryContext;
use crate::events::RepositoryEvent;
use hawk_authorization::OperationId;
use hawk_core::{ActionId, ControllerId, HawkError, HawkResult, Principal, TenantId};
use hawk_store::{Action, ActionStatus, ActionUpdate, AutoConfirmationStatus, TargetUpdate};

/// Operator access to confirmations
#[derive(Clone)]
pub struct ConfirmationManagement {
    ctx: RepositoryContext,
}

impl ConfirmationManagement {
    /// Service over the shared context
    pub fn new(ctx: RepositoryContext) -> Self {
        Self { ctx }
    }

    /// Switch auto-confirmation on and confirm every waiting action
    ///
    /// `initiator` defaults to the caller's name.
    pub async fn activate_auto(
        &self,
        principal: &Principal,
        controller_id: &ControllerId,
        initiator: Option<String>,
        remark: Option<String>,
    ) -> HawkResult<AutoConfirmationStatus> {
        let tenant = principal.tenant();
        let initiator = initiator.or_else(|| Some(principal.name().to_string()));
        self.ctx
            .guard(principal, OperationId::ConfirmationActivateAuto, || async move {
                activate_auto_confirmation(&self.ctx, tenant, controller_id, initiator, remark).await
            })
            .await
    }

    /// Switch auto-confirmation off
    pub async fn deactivate_auto(
        &self,
        principal: &Principal,
        controller_id: &ControllerId,
    ) -> HawkResult<()> {
        let tenant = principal.tenant();
        self.ctx
            .guard(principal, OperationId::ConfirmationDeactivateAuto, || async move {
                deactivate_auto_confirmation(&self.ctx, tenant, controller_id).await
            })
            .await
    }

    /// Auto-confirmation state of a target, `None` when off
    pub async fn status(
        &self,
        principal: &Principal,
        controller_id: &ControllerId,
    ) -> HawkResult<Option<AutoConfirmationStatus>> {
        let tenant = principal.tenant();
        self.ctx
            .guard(principal, OperationId::ConfirmationStatus, || async move {
                let target = self
                    .ctx
                    .store
                    .get_target(tenant, controller_id)
                    .await?
                    .ok_or_else(|| HawkError::not_found(format!("target {controller_id}")))?;
                Ok(target.auto_confirmation)
            })
            .await
    }

    /// Confirm a waiting action; it starts running
    pub async fn confirm(
        &self,
        principal: &Principal,
        action_id: ActionId,
        message: Option<String>,
    ) -> HawkResult<Action> {
        let tenant = principal.tenant();
        self.ctx
            .guard(principal, OperationId::ConfirmationConfirm, || async move {
                let message = message.unwrap_or_else(|| "Assignment confirmed".to_string());
                let action = self
                    .answer(tenant, action_id, Some(ActionStatus::Running), message)
                    .await?;
                self.ctx.publish(RepositoryEvent::ActionConfirmed {
                    tenant: tenant.clone(),
                    action: action_id,
                });
                Ok(action)
            })
            .await
    }

    /// Deny a waiting action; it keeps waiting with the answer recorded
    pub async fn deny(
        &self,
        principal: &Principal,
        action_id: ActionId,
        message: Option<String>,
    ) -> HawkResult<Action> {
        let tenant = principal.tenant();
        self.ctx
            .guard(principal, OperationId::ConfirmationDeny, || async move {
                let message = message.unwrap_or_else(|| "Assignment denied".to_string());
                let action = self.answer(tenant, action_id, None, message).await?;
                self.ctx.publish(RepositoryEvent::ActionDenied {
                    tenant: tenant.clone(),
                    action: action_id,
                });
                Ok(action)
            })
            .await
    }

    /// Actions of a target still waiting for confirmation
    pub async fn find_waiting(
        &self,
        principal: &Principal,
        controller_id: &ControllerId,
    ) -> HawkResult<Vec<Action>> {
        let tenant = principal.tenant();
        self.ctx
            .guard(principal, OperationId::ConfirmationFindWaiting, || async move {
                waiting_actions(&self.ctx, tenant, controller_id).await
            })
            .await
    }

    async fn answer(
        &self,
        tenant: &TenantId,
        action_id: ActionId,
        status: Option<ActionStatus>,
        message: String,
    ) -> HawkResult<Action> {
        let controller_id = self.action(tenant, action_id).await?.controller_id;
        let _guard = self.ctx.locks.lock(tenant, &controller_id).await;
        let action = self.action(tenant, action_id).await?;
        if action.status != ActionStatus::WaitForConfirmation {
            return Err(HawkError::invalid(format!(
                "{action_id} is not waiting for confirmation"
            )));
        }
        self.ctx
            .store
            .update_action(
                tenant,
                action_id,
                action.revision,
                ActionUpdate {
                    status,
                    message: Some(message),
                },
            )
            .await
    }

    async fn action(&self, tenant: &TenantId, action_id: ActionId) -> HawkResult<Action> {
        self.ctx
            .store
            .get_action(tenant, action_id)
            .await?
            .ok_or_else(|| HawkError::not_found(format!("{action_id}")))
    }
}

async fn waiting_actions(
    ctx: &RepositoryContext,
    tenant: &TenantId,
    controller_id: &ControllerId,
) -> HawkResult<Vec<Action>> {
    let actions = ctx.store.list_actions(tenant, controller_id).await?;
    Ok(actions
        .into_iter()
        .filter(|action| action.status == ActionStatus::WaitForConfirmation)
        .collect())
}

/// Shared by the operator and device paths
pub(crate) async fn activate_auto_confirmation(
    ctx: &RepositoryContext,
    tenant: &TenantId,
    controller_id: &ControllerId,
    initiator: Option<String>,
    remark: Option<String>,
) -> HawkResult<AutoConfirmationStatus> {
    let _guard = ctx.locks.lock(tenant, controller_id).await;
    let target = ctx
        .store
        .get_target(tenant, controller_id)
        .await?
        .ok_or_else(|| HawkError::not_found(format!("target {controller_id}")))?;
    if target.auto_confirmation.is_some() {
        return Err(HawkError::already_exists(format!(
            "auto-confirmation of {controller_id}"
        )));
    }

    let status = AutoConfirmationStatus {
        initiator,
        remark,
        activated_at: ctx.now(),
    };
    ctx.store
        .update_target(
            tenant,
            controller_id,
            target.revision,
            TargetUpdate {
                auto_confirmation: Some(Some(status.clone())),
                ..TargetUpdate::default()
            },
        )
        .await?;
    ctx.publish(RepositoryEvent::AutoConfirmationActivated {
        tenant: tenant.clone(),
        controller_id: controller_id.clone(),
    });

    let message = match &status.initiator {
        Some(initiator) => format!("Assignment automatically confirmed by initiator '{initiator}'"),
        None => "Assignment automatically confirmed".to_string(),
    };
    let waiting = waiting_actions(ctx, tenant, controller_id).await?;
    for action in &waiting {
        ctx.store
            .update_action(
                tenant,
                action.id,
                action.revision,
                ActionUpdate {
                    status: Some(ActionStatus::Running),
                    message: Some(message.clone()),
                },
            )
            .await?;
        ctx.publish(RepositoryEvent::ActionConfirmed {
            tenant: tenant.clone(),
            action: action.id,
        });
    }
    tracing::info!(%tenant, %controller_id, confirmed = waiting.len(), "auto-confirmation activated");
    Ok(status)
}

/// Shared by the operator and device paths; a no-op when already off
pub(crate) async fn deactivate_auto_confirmation(
    ctx: &RepositoryContext,
    tenant: &TenantId,
    controller_id: &ControllerId,
) -> HawkResult<()> {
    let _guard = ctx.locks.lock(tenant, controller_id).await;
    let target = ctx
        .store
        .get_target(tenant, controller_id)
        .await?
        .ok_or_else(|| HawkError::not_found(format!("target {controller_id}")))?;
    if target.auto_confirmation.is_none() {
        return Ok(());
    }
    ctx.store
        .update_target(
            tenant,
            controller_id,
            target.revision,
            TargetUpdate {
                auto_confirmation: Some(None),
                ..TargetUpdate::default()
            },
        )
        .await?;
    tracing::info!(%tenant, %controller_id, "auto-confirmation deactivated");
    ctx.publish(RepositoryEvent::AutoConfirmationDeactivated {
        tenant: tenant.clone(),
        controller_id: controller_id.clone(),
    });
    Ok(())
}
