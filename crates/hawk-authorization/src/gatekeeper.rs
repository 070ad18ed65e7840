//! Gatekeeper
//!
//! Every repository operation passes through [`Gatekeeper::guard`] before its
//! body runs. The check is a pure function of the principal's authorities and
//! the operation's registered expression; nothing is cached per call.
//!
//! # Usage
//!
//! ```rust,ignore
//! use hawk_authorization::{Gatekeeper, OperationId};
//!
//! let gatekeeper = Gatekeeper::with_defaults();
//! let tag = gatekeeper
//!     .guard(&principal, OperationId::DistributionSetTagDelete, || async {
//!         store.delete_tag(tenant, id).await
//!     })
//!     .await?;
//! ```
//!
//! A denied call never runs its body, so it cannot observe or change state and
//! an absent entity is indistinguishable from a denied one.

use crate::{OperationId, PolicyRegistry};
use hawk_core::{HawkError, HawkResult, Principal};
use std::future::Future;
use std::sync::Arc;

/// Outcome of an access check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    /// The operation may run
    Allow,
    /// The operation must not run
    Deny(DenyReason),
}

/// Why an access check failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// The caller presented no credentials
    Unauthenticated,
    /// The caller lacks the required authorities
    InsufficientPermission,
    /// The operation has no registered expression
    NoPolicy,
}

impl AccessDecision {
    /// Whether the decision permits the operation
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allow)
    }

    /// Convert into the error surfaced to callers
    pub fn into_result(self, operation: OperationId) -> HawkResult<()> {
        match self {
            AccessDecision::Allow => Ok(()),
            AccessDecision::Deny(DenyReason::Unauthenticated) => Err(HawkError::unauthenticated(
                format!("operation {operation} requires an authenticated caller"),
            )),
            AccessDecision::Deny(DenyReason::InsufficientPermission | DenyReason::NoPolicy) => {
                Err(HawkError::insufficient_permission(operation.as_str()))
            }
        }
    }
}

/// Permission check in front of every repository operation
#[derive(Debug, Clone, Default)]
pub struct Gatekeeper {
    registry: Arc<PolicyRegistry>,
}

impl Gatekeeper {
    /// Create a gatekeeper over the given registry
    pub fn new(registry: PolicyRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// Create a gatekeeper with the built-in policies
    pub fn with_defaults() -> Self {
        Self::new(PolicyRegistry::new())
    }

    /// Registry consulted by this gatekeeper
    pub fn registry(&self) -> &PolicyRegistry {
        &self.registry
    }

    /// Decide whether `principal` may run `operation`
    pub fn authorize(&self, principal: &Principal, operation: OperationId) -> AccessDecision {
        let Some(expression) = self.registry.get(operation) else {
            tracing::warn!(%operation, "no permission policy registered, denying");
            return AccessDecision::Deny(DenyReason::NoPolicy);
        };

        if expression.is_permit_all() {
            return AccessDecision::Allow;
        }
        if !principal.is_authenticated() {
            tracing::debug!(%operation, tenant = %principal.tenant(), "unauthenticated caller denied");
            return AccessDecision::Deny(DenyReason::Unauthenticated);
        }
        if expression.evaluate(principal.authorities()) {
            tracing::trace!(%operation, principal = principal.name(), "access granted");
            AccessDecision::Allow
        } else {
            tracing::debug!(
                %operation,
                principal = principal.name(),
                tenant = %principal.tenant(),
                "access denied"
            );
            AccessDecision::Deny(DenyReason::InsufficientPermission)
        }
    }

    /// Check access, mapping a denial to its error
    pub fn check(&self, principal: &Principal, operation: OperationId) -> HawkResult<()> {
        self.authorize(principal, operation).into_result(operation)
    }

    /// Run `body` only if `principal` may run `operation`
    ///
    /// The check completes before the body's future is even created.
    pub async fn guard<T, F, Fut>(
        &self,
        principal: &Principal,
        operation: OperationId,
        body: F,
    ) -> HawkResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = HawkResult<T>>,
    {
        self.check(principal, operation)?;
        body().await
    }
}
