//! Identifier types used across the repository layer

use crate::{HawkError, HawkResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum length of a controller identifier
pub const CONTROLLER_ID_MAX_LEN: usize = 256;

/// Tenant identifier
///
/// Every stored entity belongs to exactly one tenant; lookups never cross tenants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TenantId(String);

impl TenantId {
    /// Create a tenant identifier, normalised to upper case
    pub fn new(tenant: impl AsRef<str>) -> Self {
        Self(tenant.as_ref().trim().to_uppercase())
    }

    /// Borrow the tenant name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self::new("DEFAULT")
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier a device uses for itself when it talks to the server
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ControllerId(String);

impl ControllerId {
    /// Create a validated controller identifier
    pub fn new(id: impl Into<String>) -> HawkResult<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(HawkError::invalid("controller id must not be empty"));
        }
        if id.len() > CONTROLLER_ID_MAX_LEN {
            return Err(HawkError::invalid(format!(
                "controller id exceeds {CONTROLLER_ID_MAX_LEN} characters"
            )));
        }
        if id.chars().any(char::is_whitespace) {
            return Err(HawkError::invalid(format!(
                "controller id '{id}' must not contain whitespace"
            )));
        }
        Ok(Self(id))
    }

    /// Borrow the identifier text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ControllerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ControllerId {
    type Err = HawkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ControllerId {
    type Error = HawkError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ControllerId> for String {
    fn from(id: ControllerId) -> Self {
        id.0
    }
}

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl $name {
            /// Get the raw value
            pub fn value(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "-{}"), self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

numeric_id!(
    /// Tag identifier (target tags and distribution set tags share the sequence)
    TagId,
    "tag"
);
numeric_id!(
    /// Software module type identifier
    SoftwareModuleTypeId,
    "smtype"
);
numeric_id!(
    /// Rollout identifier
    RolloutId,
    "rollout"
);
numeric_id!(
    /// Rollout group identifier
    RolloutGroupId,
    "rollout-group"
);
numeric_id!(
    /// Deployment action identifier
    ActionId,
    "action"
);
