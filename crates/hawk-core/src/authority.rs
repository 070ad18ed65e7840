//! Authorities and the principals that carry them
//!
//! An [`Authority`] is an opaque permission token. There is no hierarchy: a
//! principal holds exactly the authorities it was granted, nothing is implied.
//! Roles are authorities too, distinguished only by their `ROLE_` prefix.

use crate::TenantId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Opaque permission token
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Authority(String);

impl Authority {
    /// Create an authority from its token text
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Borrow the token text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this authority is a role (`ROLE_*`)
    pub fn is_role(&self) -> bool {
        self.0.starts_with("ROLE_")
    }
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Authority {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

impl From<String> for Authority {
    fn from(token: String) -> Self {
        Self::new(token)
    }
}

/// Well-known authority tokens
#[allow(missing_docs)]
pub mod authorities {
    pub const READ_TARGET: &str = "READ_TARGET";
    pub const CREATE_TARGET: &str = "CREATE_TARGET";
    pub const UPDATE_TARGET: &str = "UPDATE_TARGET";
    pub const DELETE_TARGET: &str = "DELETE_TARGET";

    pub const READ_REPOSITORY: &str = "READ_REPOSITORY";
    pub const CREATE_REPOSITORY: &str = "CREATE_REPOSITORY";
    pub const UPDATE_REPOSITORY: &str = "UPDATE_REPOSITORY";
    pub const DELETE_REPOSITORY: &str = "DELETE_REPOSITORY";

    pub const READ_ROLLOUT: &str = "READ_ROLLOUT";
    pub const CREATE_ROLLOUT: &str = "CREATE_ROLLOUT";
    pub const UPDATE_ROLLOUT: &str = "UPDATE_ROLLOUT";
    pub const DELETE_ROLLOUT: &str = "DELETE_ROLLOUT";

    pub const SYSTEM_ADMIN: &str = "SYSTEM_ADMIN";

    /// Authenticated device
    pub const ROLE_CONTROLLER: &str = "ROLE_CONTROLLER";
    /// Device admitted without credentials (anonymous download / poll)
    pub const ROLE_CONTROLLER_ANONYMOUS: &str = "ROLE_CONTROLLER_ANONYMOUS";
    /// Server-internal code running on behalf of the system
    pub const ROLE_SYSTEM_CODE: &str = "ROLE_SYSTEM_CODE";

    /// Every non-role permission a management user can be granted
    pub const ALL_PERMISSIONS: &[&str] = &[
        READ_TARGET,
        CREATE_TARGET,
        UPDATE_TARGET,
        DELETE_TARGET,
        READ_REPOSITORY,
        CREATE_REPOSITORY,
        UPDATE_REPOSITORY,
        DELETE_REPOSITORY,
        READ_ROLLOUT,
        CREATE_ROLLOUT,
        UPDATE_ROLLOUT,
        DELETE_ROLLOUT,
        SYSTEM_ADMIN,
    ];
}

/// Set of granted authorities; membership is the only query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthoritySet(BTreeSet<Authority>);

impl AuthoritySet {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the set contains the given authority token
    pub fn contains(&self, authority: &str) -> bool {
        self.0.iter().any(|granted| granted.as_str() == authority)
    }

    /// Number of granted authorities
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no authority is granted
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate granted authorities in sorted order
    pub fn iter(&self) -> impl Iterator<Item = &Authority> {
        self.0.iter()
    }
}

impl<A: Into<Authority>> FromIterator<A> for AuthoritySet {
    fn from_iter<I: IntoIterator<Item = A>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Authenticated (or explicitly anonymous) caller identity
///
/// The authority set is fixed at construction; there are no mutators, so it
/// cannot change while a call is in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    name: String,
    tenant: TenantId,
    authorities: AuthoritySet,
    authenticated: bool,
}

impl Principal {
    /// Management user with the given authorities
    pub fn user<A, I>(name: impl Into<String>, tenant: TenantId, authorities: I) -> Self
    where
        A: Into<Authority>,
        I: IntoIterator<Item = A>,
    {
        Self {
            name: name.into(),
            tenant,
            authorities: authorities.into_iter().collect(),
            authenticated: true,
        }
    }

    /// Management user holding every permission
    pub fn admin(name: impl Into<String>, tenant: TenantId) -> Self {
        Self::user(name, tenant, authorities::ALL_PERMISSIONS.iter().copied())
    }

    /// Authenticated device
    pub fn controller(controller_id: impl Into<String>, tenant: TenantId) -> Self {
        Self::user(controller_id, tenant, [authorities::ROLE_CONTROLLER])
    }

    /// Device admitted without credentials
    pub fn anonymous_controller(tenant: TenantId) -> Self {
        Self::user(
            "anonymous-controller",
            tenant,
            [authorities::ROLE_CONTROLLER_ANONYMOUS],
        )
    }

    /// Server-internal code acting for a tenant
    pub fn system(tenant: TenantId) -> Self {
        Self::user("system", tenant, [authorities::ROLE_SYSTEM_CODE])
    }

    /// Caller that presented no credentials at all
    pub fn anonymous(tenant: TenantId) -> Self {
        Self {
            name: "anonymous".to_string(),
            tenant,
            authorities: AuthoritySet::new(),
            authenticated: false,
        }
    }

    /// Principal name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tenant the principal acts in
    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    /// Granted authorities
    pub fn authorities(&self) -> &AuthoritySet {
        &self.authorities
    }

    /// Whether the principal presented credentials
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Whether the principal holds the given authority
    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.contains(authority)
    }
}

#[cfg(test)]
mod tests {
    use super::authorities::*;
    use super::*;

    #[test]
    fn test_no_implied_authorities() {
        let principal = Principal::user("alice", TenantId::default(), [UPDATE_TARGET]);
        assert!(principal.has_authority(UPDATE_TARGET));
        assert!(!principal.has_authority(READ_TARGET));
    }

    #[test]
    fn test_admin_holds_permissions_but_no_roles() {
        let admin = Principal::admin("root", TenantId::default());
        assert!(admin.has_authority(DELETE_REPOSITORY));
        assert!(!admin.has_authority(ROLE_CONTROLLER));
        assert!(admin.authorities().iter().all(|a| !a.is_role()));
    }

    #[test]
    fn test_anonymous_is_unauthenticated() {
        let anonymous = Principal::anonymous(TenantId::default());
        assert!(!anonymous.is_authenticated());
        assert!(anonymous.authorities().is_empty());

        let device = Principal::anonymous_controller(TenantId::default());
        assert!(device.is_authenticated());
        assert!(device.has_authority(ROLE_CONTROLLER_ANONYMOUS));
    }
}
