//! Device-facing operations
//!
//! Every call a device makes while polling lands here. The first poll of an
//! unknown controller id registers the target synchronously; polls of known
//! targets go through the configured [`PollWriter`](crate::poll::PollWriter),
//! which may buffer the timestamp. `TargetPolled` is published for every
//! poll as it is received, whatever the write strategy.

use super::confirmation::{activate_auto_confirmation, deactivate_auto_confirmation};
use super::target::{delete_target, generate_security_token};
use super::{check_text, RepositoryContext, NAME_MAX_LEN};
use crate::events::RepositoryEvent;
use crate::poll::{Poll, PollOutcome};
use hawk_authorization::OperationId;
use hawk_core::{ControllerId, ControllerPollConfig, HawkError, HawkResult, Principal, TenantId};
use hawk_store::{AutoConfirmationStatus, NewTarget, Target, TargetUpdate, TargetUpdateStatus};
use std::collections::BTreeMap;
use std::time::Duration;

/// Longest accepted attribute key or value
pub const MAX_ATTRIBUTE_LEN: usize = 128;

/// Most attributes one target may carry
pub const MAX_ATTRIBUTES_PER_TARGET: usize = 100;

/// How reported attributes combine with the stored ones
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AttributeUpdateMode {
    /// Add or overwrite the reported keys, keep the rest
    #[default]
    Merge,
    /// Replace the stored attributes with the reported ones
    Replace,
    /// Remove the reported keys
    Remove,
}

/// What a device announces about itself when it polls
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registration {
    /// Address the device is reachable at
    pub address: Option<String>,
    /// Display name
    pub name: Option<String>,
    /// Target type
    pub target_type: Option<String>,
}

impl Registration {
    /// Registration carrying only an address
    pub fn at_address(address: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            ..Self::default()
        }
    }
}

/// Device-side access to the repository
#[derive(Clone)]
pub struct ControllerManagement {
    ctx: RepositoryContext,
    polling_time: Duration,
    min_polling_time: Duration,
    max_polling_time: Duration,
}

impl ControllerManagement {
    /// Service over the shared context with the configured polling intervals
    pub fn new(ctx: RepositoryContext, config: &ControllerPollConfig) -> HawkResult<Self> {
        let (polling_time, min_polling_time, max_polling_time) = config.intervals()?;
        if min_polling_time > max_polling_time {
            return Err(HawkError::invalid(
                "min_polling_time must not exceed max_polling_time",
            ));
        }
        Ok(Self {
            ctx,
            polling_time,
            min_polling_time,
            max_polling_time,
        })
    }

    /// Find the polling target, registering it on its first poll
    pub async fn find_or_register(
        &self,
        principal: &Principal,
        controller_id: &ControllerId,
        registration: Registration,
    ) -> HawkResult<Target> {
        let tenant = principal.tenant();
        self.ctx
            .guard(principal, OperationId::ControllerRegister, || async move {
                if let Some(name) = &registration.name {
                    check_text("name", name, NAME_MAX_LEN)?;
                }
                let poll = Poll {
                    polled_at: self.ctx.now(),
                    address: registration.address,
                    name: registration.name,
                    target_type: registration.target_type,
                };

                let target = match self.ctx.store.get_target(tenant, controller_id).await? {
                    Some(target) => target,
                    None => match self.register(tenant, controller_id, &poll).await? {
                        Registered::Created(target) => return Ok(target),
                        Registered::Existing(target) => target,
                    },
                };
                self.poll_existing(tenant, target, &poll).await
            })
            .await
    }

    /// Target by controller id
    pub async fn find_target(
        &self,
        principal: &Principal,
        controller_id: &ControllerId,
    ) -> HawkResult<Option<Target>> {
        let tenant = principal.tenant();
        self.ctx
            .guard(principal, OperationId::ControllerFindTarget, || async move {
                self.ctx.store.get_target(tenant, controller_id).await
            })
            .await
    }

    /// Interval the device should wait before its next poll
    pub async fn polling_time(&self, principal: &Principal) -> HawkResult<Duration> {
        self.ctx
            .guard(principal, OperationId::ControllerPollingTime, || async move {
                Ok(self
                    .polling_time
                    .clamp(self.min_polling_time, self.max_polling_time))
            })
            .await
    }

    /// Store attributes reported by the device
    pub async fn update_attributes(
        &self,
        principal: &Principal,
        controller_id: &ControllerId,
        attributes: BTreeMap<String, String>,
        mode: AttributeUpdateMode,
    ) -> HawkResult<Target> {
        let tenant = principal.tenant();
        self.ctx
            .guard(principal, OperationId::ControllerUpdateAttributes, || async move {
                for (key, value) in &attributes {
                    check_text("attribute key", key, MAX_ATTRIBUTE_LEN)?;
                    if value.chars().count() > MAX_ATTRIBUTE_LEN {
                        return Err(HawkError::invalid(format!(
                            "value of attribute '{key}' exceeds {MAX_ATTRIBUTE_LEN} characters"
                        )));
                    }
                }

                let _guard = self.ctx.locks.lock(tenant, controller_id).await;
                let target = self
                    .ctx
                    .store
                    .get_target(tenant, controller_id)
                    .await?
                    .ok_or_else(|| HawkError::not_found(format!("target {controller_id}")))?;

                let merged = merge_attributes(&target.attributes, attributes, mode);
                if merged.len() > MAX_ATTRIBUTES_PER_TARGET {
                    return Err(HawkError::invalid(format!(
                        "target {controller_id} would carry {} attributes, at most {MAX_ATTRIBUTES_PER_TARGET} allowed",
                        merged.len()
                    )));
                }
                if merged == target.attributes {
                    return Ok(target);
                }

                let updated = self
                    .ctx
                    .store
                    .update_target(
                        tenant,
                        controller_id,
                        target.revision,
                        TargetUpdate {
                            attributes: Some(merged),
                            ..TargetUpdate::default()
                        },
                    )
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

    /// Device asks to be removed
    pub async fn delete_target(
        &self,
        principal: &Principal,
        controller_id: &ControllerId,
    ) -> HawkResult<()> {
        let tenant = principal.tenant();
        self.ctx
            .guard(principal, OperationId::ControllerDeleteTarget, || async move {
                delete_target(&self.ctx, tenant, controller_id).await
            })
            .await
    }

    /// Device switches auto-confirmation on
    pub async fn activate_auto_confirm(
        &self,
        principal: &Principal,
        controller_id: &ControllerId,
        initiator: Option<String>,
        remark: Option<String>,
    ) -> HawkResult<AutoConfirmationStatus> {
        let tenant = principal.tenant();
        self.ctx
            .guard(principal, OperationId::ControllerActivateAutoConfirm, || async move {
                activate_auto_confirmation(&self.ctx, tenant, controller_id, initiator, remark).await
            })
            .await
    }

    /// Device switches auto-confirmation off
    pub async fn deactivate_auto_confirm(
        &self,
        principal: &Principal,
        controller_id: &ControllerId,
    ) -> HawkResult<()> {
        let tenant = principal.tenant();
        self.ctx
            .guard(principal, OperationId::ControllerDeactivateAutoConfirm, || async move {
                deactivate_auto_confirmation(&self.ctx, tenant, controller_id).await
            })
            .await
    }

    async fn register(
        &self,
        tenant: &TenantId,
        controller_id: &ControllerId,
        poll: &Poll,
    ) -> HawkResult<Registered> {
        let _guard = self.ctx.locks.lock(tenant, controller_id).await;
        // Lost the race to another registration or a management create
        if let Some(existing) = self.ctx.store.get_target(tenant, controller_id).await? {
            return Ok(Registered::Existing(existing));
        }

        let mut new_target = NewTarget::new(controller_id.clone(), generate_security_token());
        new_target.name = poll.name.clone();
        new_target.address = poll.address.clone();
        new_target.target_type = poll.target_type.clone();
        new_target.update_status = TargetUpdateStatus::Registered;
        new_target.last_target_query = Some(poll.polled_at);

        let created = self
            .ctx
            .store
            .create_target(tenant, new_target, poll.polled_at)
            .await?;
        tracing::info!(%tenant, %controller_id, "target registered on first poll");
        self.ctx.publish(RepositoryEvent::TargetCreated {
            tenant: tenant.clone(),
            controller_id: controller_id.clone(),
        });
        self.ctx.publish(RepositoryEvent::TargetPolled {
            tenant: tenant.clone(),
            controller_id: controller_id.clone(),
            polled_at: poll.polled_at,
        });
        Ok(Registered::Created(created))
    }

    async fn poll_existing(
        &self,
        tenant: &TenantId,
        target: Target,
        poll: &Poll,
    ) -> HawkResult<Target> {
        let outcome = self.ctx.poll_writer.record_poll(tenant, &target, poll).await?;
        self.ctx.publish(RepositoryEvent::TargetPolled {
            tenant: tenant.clone(),
            controller_id: target.controller_id.clone(),
            polled_at: poll.polled_at,
        });

        match outcome {
            PollOutcome::Updated(updated) => {
                self.ctx.publish(RepositoryEvent::TargetUpdated {
                    tenant: tenant.clone(),
                    controller_id: updated.controller_id.clone(),
                    revision: updated.revision,
                });
                Ok(updated)
            }
            PollOutcome::Touched | PollOutcome::Buffered => {
                let mut target = target;
                target.last_target_query = target.last_target_query.max(Some(poll.polled_at));
                Ok(target)
            }
        }
    }
}

enum Registered {
    Created(Target),
    Existing(Target),
}

fn merge_attributes(
    stored: &BTreeMap<String, String>,
    reported: BTreeMap<String, String>,
    mode: AttributeUpdateMode,
) -> BTreeMap<String, String> {
    match mode {
        AttributeUpdateMode::Replace => reported,
        AttributeUpdateMode::Merge => {
            let mut merged = stored.clone();
            merged.extend(reported);
            merged
        }
        AttributeUpdateMode::Remove => {
            let mut remaining = stored.clone();
            for key in reported.keys() {
                remaining.remove(key);
            }
            remaining
        }
    }
}
