//! Tag management for target tags and distribution set tags
//!
//! Both families share one service; the operation guarding each call depends
//! on the family, so target tags are governed by target permissions and
//! distribution set tags by repository permissions.

use super::{check_text, RepositoryContext, NAME_MAX_LEN};
use crate::events::RepositoryEvent;
use hawk_authorization::OperationId;
use hawk_core::{ControllerId, HawkError, HawkResult, Principal, TagId, TenantId};
use hawk_store::{NewTag, Tag, TagKind, TagUpdate, Target, TargetUpdate};
use std::collections::BTreeSet;

/// Fields of a tag to create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRequest {
    /// Unique name within the tenant and family
    pub name: String,
    /// Free text
    pub description: Option<String>,
    /// Display colour, e.g. `#336699`
    pub colour: Option<String>,
}

impl TagRequest {
    /// Request with only a name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            colour: None,
        }
    }
}

#[derive(Clone, Copy)]
enum TagAction {
    Read,
    Create,
    Update,
    Delete,
}

fn operation(kind: TagKind, action: TagAction) -> OperationId {
    match (kind, action) {
        (TagKind::Target, TagAction::Read) => OperationId::TargetTagRead,
        (TagKind::Target, TagAction::Create) => OperationId::TargetTagCreate,
        (TagKind::Target, TagAction::Update) => OperationId::TargetTagUpdate,
        (TagKind::Target, TagAction::Delete) => OperationId::TargetTagDelete,
        (TagKind::DistributionSet, TagAction::Read) => OperationId::DistributionSetTagRead,
        (TagKind::DistributionSet, TagAction::Create) => OperationId::DistributionSetTagCreate,
        (TagKind::DistributionSet, TagAction::Update) => OperationId::DistributionSetTagUpdate,
        (TagKind::DistributionSet, TagAction::Delete) => OperationId::DistributionSetTagDelete,
    }
}

fn not_found(id: TagId) -> HawkError {
    HawkError::not_found(format!("{id}"))
}

/// Operator access to tags
#[derive(Clone)]
pub struct TagManagement {
    ctx: RepositoryContext,
}

impl TagManagement {
    /// Service over the shared context
    pub fn new(ctx: RepositoryContext) -> Self {
        Self { ctx }
    }

    /// Create a tag
    pub async fn create(
        &self,
        principal: &Principal,
        kind: TagKind,
        request: TagRequest,
    ) -> HawkResult<Tag> {
        let tenant = principal.tenant();
        self.ctx
            .guard(principal, operation(kind, TagAction::Create), || async move {
                check_text("name", &request.name, NAME_MAX_LEN)?;
                let tag = self
                    .ctx
                    .store
                    .create_tag(
                        tenant,
                        NewTag {
                            kind,
                            name: request.name,
                            description: request.description,
                            colour: request.colour,
                        },
                    )
                    .await?;
                self.ctx.publish(RepositoryEvent::TagCreated {
                    tenant: tenant.clone(),
                    kind,
                    id: tag.id,
                });
                Ok(tag)
            })
            .await
    }

    /// Tag by id
    pub async fn get(&self, principal: &Principal, kind: TagKind, id: TagId) -> HawkResult<Tag> {
        let tenant = principal.tenant();
        self.ctx
            .guard(principal, operation(kind, TagAction::Read), || async move {
                self.ctx
                    .store
                    .get_tag(tenant, kind, id)
                    .await?
                    .ok_or_else(|| not_found(id))
            })
            .await
    }

    /// Tag by exact name
    pub async fn find_by_name(
        &self,
        principal: &Principal,
        kind: TagKind,
        name: &str,
    ) -> HawkResult<Option<Tag>> {
        let tenant = principal.tenant();
        self.ctx
            .guard(principal, operation(kind, TagAction::Read), || async move {
                self.ctx.store.find_tag_by_name(tenant, kind, name).await
            })
            .await
    }

    /// Every tag of one family
    pub async fn find_all(&self, principal: &Principal, kind: TagKind) -> HawkResult<Vec<Tag>> {
        let tenant = principal.tenant();
        self.ctx
            .guard(principal, operation(kind, TagAction::Read), || async move {
                self.ctx.store.list_tags(tenant, kind).await
            })
            .await
    }

    /// Number of tags of one family
    pub async fn count(&self, principal: &Principal, kind: TagKind) -> HawkResult<usize> {
        let tenant = principal.tenant();
        self.ctx
            .guard(principal, operation(kind, TagAction::Read), || async move {
                Ok(self.ctx.store.list_tags(tenant, kind).await?.len())
            })
            .await
    }

    /// Rename or restyle a tag against an expected revision
    pub async fn update(
        &self,
        principal: &Principal,
        kind: TagKind,
        id: TagId,
        expected_revision: u64,
        update: TagUpdate,
    ) -> HawkResult<Tag> {
        let tenant = principal.tenant();
        self.ctx
            .guard(principal, operation(kind, TagAction::Update), || async move {
                if let Some(name) = &update.name {
                    check_text("name", name, NAME_MAX_LEN)?;
                }
                let tag = self
                    .ctx
                    .store
                    .update_tag(tenant, kind, id, expected_revision, update)
                    .await?;
                self.ctx.publish(RepositoryEvent::TagUpdated {
                    tenant: tenant.clone(),
                    kind,
                    id,
                });
                Ok(tag)
            })
            .await
    }

    /// Delete a tag; a target tag is detached from every target first
    pub async fn delete(&self, principal: &Principal, kind: TagKind, id: TagId) -> HawkResult<()> {
        let tenant = principal.tenant();
        self.ctx
            .guard(principal, operation(kind, TagAction::Delete), || async move {
                self.ctx.store.delete_tag(tenant, kind, id).await?;
                tracing::debug!(%tenant, %id, ?kind, "tag deleted");
                self.ctx.publish(RepositoryEvent::TagDeleted {
                    tenant: tenant.clone(),
                    kind,
                    id,
                });
                Ok(())
            })
            .await
    }

    /// Attach a target tag to each listed target
    ///
    /// Every listed target must exist; if one is missing nothing is changed.
    pub async fn assign(
        &self,
        principal: &Principal,
        id: TagId,
        controller_ids: &[ControllerId],
    ) -> HawkResult<Vec<Target>> {
        let tenant = principal.tenant();
        self.ctx
            .guard(principal, OperationId::TargetTagAssign, || async move {
                self.require_target_tag(tenant, id).await?;

                let mut seen = BTreeSet::new();
                let unique: Vec<&ControllerId> = controller_ids
                    .iter()
                    .filter(|controller_id| seen.insert(*controller_id))
                    .collect();
                let _guards = self.ctx.locks.lock_all(tenant, unique.iter().copied()).await;

                let mut targets = Vec::with_capacity(unique.len());
                for controller_id in &unique {
                    targets.push(self.load_target(tenant, controller_id).await?);
                }

                let mut assigned = Vec::with_capacity(targets.len());
                for target in targets {
                    let updated = self
                        .apply_tags(tenant, target, |tags| {
                            tags.insert(id);
                        })
                        .await?;
                    assigned.push(updated);
                }
                Ok(assigned)
            })
            .await
    }

    /// Detach a target tag from one target
    pub async fn unassign(
        &self,
        principal: &Principal,
        id: TagId,
        controller_id: &ControllerId,
    ) -> HawkResult<Target> {
        let tenant = principal.tenant();
        self.ctx
            .guard(principal, OperationId::TargetTagAssign, || async move {
                self.require_target_tag(tenant, id).await?;
                let _guard = self.ctx.locks.lock(tenant, controller_id).await;
                let target = self.load_target(tenant, controller_id).await?;
                self.apply_tags(tenant, target, |tags| {
                    tags.remove(&id);
                })
                .await
            })
            .await
    }

    async fn require_target_tag(&self, tenant: &TenantId, id: TagId) -> HawkResult<()> {
        match self.ctx.store.get_tag(tenant, TagKind::Target, id).await? {
            Some(_) => Ok(()),
            None => Err(not_found(id)),
        }
    }

    async fn load_target(
        &self,
        tenant: &TenantId,
        controller_id: &ControllerId,
    ) -> HawkResult<Target> {
        self.ctx
            .store
            .get_target(tenant, controller_id)
            .await?
            .ok_or_else(|| HawkError::not_found(format!("target {controller_id}")))
    }

    /// Caller holds the target's stripe
    async fn apply_tags(
        &self,
        tenant: &TenantId,
        target: Target,
        change: impl FnOnce(&mut BTreeSet<TagId>),
    ) -> HawkResult<Target> {
        let controller_id = &target.controller_id;
        let mut tags = target.tags.clone();
        change(&mut tags);
        if tags == target.tags {
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
                    tags: Some(tags),
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
    }
}
