//! System-level queries

use super::RepositoryContext;
use hawk_authorization::OperationId;
use hawk_core::{HawkResult, Principal};
use hawk_store::TagKind;
use serde::Serialize;

/// Entity counts of one tenant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TenantUsage {
    /// Registered targets
    pub targets: usize,
    /// Deployment actions
    pub actions: usize,
    /// Target tags
    pub target_tags: usize,
    /// Distribution set tags
    pub distribution_set_tags: usize,
    /// Software module types
    pub software_module_types: usize,
}

/// Server time and tenant statistics
#[derive(Clone)]
pub struct SystemManagement {
    ctx: RepositoryContext,
}

impl SystemManagement {
    /// Service over the shared context
    pub fn new(ctx: RepositoryContext) -> Self {
        Self { ctx }
    }

    /// Epoch milliseconds of the server clock; open to anyone
    pub async fn server_time(&self, principal: &Principal) -> HawkResult<u64> {
        self.ctx
            .guard(principal, OperationId::SystemServerTime, || async move {
                Ok(self.ctx.now())
            })
            .await
    }

    /// Usage counters of the caller's tenant
    pub async fn usage(&self, principal: &Principal) -> HawkResult<TenantUsage> {
        let tenant = principal.tenant();
        self.ctx
            .guard(principal, OperationId::SystemUsage, || async move {
                let store = &self.ctx.store;
                Ok(TenantUsage {
                    targets: store.count_targets(tenant).await?,
                    actions: store.count_actions(tenant).await?,
                    target_tags: store.list_tags(tenant, TagKind::Target).await?.len(),
                    distribution_set_tags: store
                        .list_tags(tenant, TagKind::DistributionSet)
                        .await?
                        .len(),
                    software_module_types: store.list_module_types(tenant).await?.len(),
                })
            })
            .await
    }
}
