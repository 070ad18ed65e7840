//! Software module type management

use super::{check_text, RepositoryContext, NAME_MAX_LEN};
use crate::events::RepositoryEvent;
use hawk_authorization::OperationId;
use hawk_core::{HawkError, HawkResult, Principal, SoftwareModuleTypeId};
use hawk_store::{NewSoftwareModuleType, SoftwareModuleType, SoftwareModuleTypeUpdate};

const KEY_MAX_LEN: usize = 64;

/// Fields of a software module type to create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleTypeRequest {
    /// Technical key, unique per tenant
    pub key: String,
    /// Display name, unique per tenant
    pub name: String,
    /// Free text
    pub description: Option<String>,
    /// Display colour
    pub colour: Option<String>,
    /// Modules of this type one distribution set may hold; at least 1
    pub max_assignments: u32,
}

impl ModuleTypeRequest {
    /// Single-assignment type
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            description: None,
            colour: None,
            max_assignments: 1,
        }
    }
}

/// Operator access to software module types
#[derive(Clone)]
pub struct SoftwareModuleTypeManagement {
    ctx: RepositoryContext,
}

impl SoftwareModuleTypeManagement {
    /// Service over the shared context
    pub fn new(ctx: RepositoryContext) -> Self {
        Self { ctx }
    }

    /// Type by id
    pub async fn get(
        &self,
        principal: &Principal,
        id: SoftwareModuleTypeId,
    ) -> HawkResult<SoftwareModuleType> {
        let tenant = principal.tenant();
        self.ctx
            .guard(principal, OperationId::SoftwareModuleTypeRead, || async move {
                self.ctx
                    .store
                    .get_module_type(tenant, id)
                    .await?
                    .ok_or_else(|| HawkError::not_found(format!("{id}")))
            })
            .await
    }

    /// Type by technical key
    pub async fn find_by_key(
        &self,
        principal: &Principal,
        key: &str,
    ) -> HawkResult<Option<SoftwareModuleType>> {
        let tenant = principal.tenant();
        self.ctx
            .guard(principal, OperationId::SoftwareModuleTypeRead, || async move {
                let types = self.ctx.store.list_module_types(tenant).await?;
                Ok(types.into_iter().find(|t| t.key == key))
            })
            .await
    }

    /// Type by display name
    pub async fn find_by_name(
        &self,
        principal: &Principal,
        name: &str,
    ) -> HawkResult<Option<SoftwareModuleType>> {
        let tenant = principal.tenant();
        self.ctx
            .guard(principal, OperationId::SoftwareModuleTypeRead, || async move {
                let types = self.ctx.store.list_module_types(tenant).await?;
                Ok(types.into_iter().find(|t| t.name == name))
            })
            .await
    }

    /// Every type of the caller's tenant
    pub async fn find_all(&self, principal: &Principal) -> HawkResult<Vec<SoftwareModuleType>> {
        let tenant = principal.tenant();
        self.ctx
            .guard(principal, OperationId::SoftwareModuleTypeRead, || async move {
                self.ctx.store.list_module_types(tenant).await
            })
            .await
    }

    /// Number of types
    pub async fn count(&self, principal: &Principal) -> HawkResult<usize> {
        let tenant = principal.tenant();
        self.ctx
            .guard(principal, OperationId::SoftwareModuleTypeRead, || async move {
                Ok(self.ctx.store.list_module_types(tenant).await?.len())
            })
            .await
    }

    /// Create a type
    pub async fn create(
        &self,
        principal: &Principal,
        request: ModuleTypeRequest,
    ) -> HawkResult<SoftwareModuleType> {
        let tenant = principal.tenant();
        self.ctx
            .guard(principal, OperationId::SoftwareModuleTypeCreate, || async move {
                check_text("key", &request.key, KEY_MAX_LEN)?;
                check_text("name", &request.name, NAME_MAX_LEN)?;
                if request.max_assignments == 0 {
                    return Err(HawkError::invalid("max_assignments must be at least 1"));
                }
                let module_type = self
                    .ctx
                    .store
                    .create_module_type(
                        tenant,
                        NewSoftwareModuleType {
                            key: request.key,
                            name: request.name,
                            description: request.description,
                            colour: request.colour,
                            max_assignments: request.max_assignments,
                        },
                    )
                    .await?;
                tracing::info!(%tenant, id = %module_type.id, key = %module_type.key, "software module type created");
                self.ctx.publish(RepositoryEvent::SoftwareModuleTypeCreated {
                    tenant: tenant.clone(),
                    id: module_type.id,
                });
                Ok(module_type)
            })
            .await
    }

    /// Change description or colour against an expected revision
    pub async fn update(
        &self,
        principal: &Principal,
        id: SoftwareModuleTypeId,
        expected_revision: u64,
        update: SoftwareModuleTypeUpdate,
    ) -> HawkResult<SoftwareModuleType> {
        let tenant = principal.tenant();
        self.ctx
            .guard(principal, OperationId::SoftwareModuleTypeUpdate, || async move {
                let module_type = self
                    .ctx
                    .store
                    .update_module_type(tenant, id, expected_revision, update)
                    .await?;
                self.ctx.publish(RepositoryEvent::SoftwareModuleTypeUpdated {
                    tenant: tenant.clone(),
                    id,
                });
                Ok(module_type)
            })
            .await
    }

    /// Delete a type
    pub async fn delete(&self, principal: &Principal, id: SoftwareModuleTypeId) -> HawkResult<()> {
        let tenant = principal.tenant();
        self.ctx
            .guard(principal, OperationId::SoftwareModuleTypeDelete, || async move {
                self.ctx.store.delete_module_type(tenant, id).await?;
                self.ctx.publish(RepositoryEvent::SoftwareModuleTypeDeleted {
                    tenant: tenant.clone(),
                    id,
                });
                Ok(())
            })
            .await
    }
}
