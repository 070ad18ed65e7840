//! # Hawk Core - Foundation
//!
//! Types shared by every layer of the update-management repository:
//!
//! - identifiers for tenants, devices and repository entities
//! - [`Authority`] tokens and the [`Principal`] that carries them
//! - the unified [`HawkError`] and [`HawkResult`]
//! - startup configuration ([`HawkConfig`])
//! - the [`Clock`] abstraction used for poll timestamps and flush deadlines

#![forbid(unsafe_code)]

pub mod authority;
pub mod config;
pub mod errors;
pub mod identifiers;
pub mod time;

pub use authority::{authorities, Authority, AuthoritySet, Principal};
pub use config::{ControllerPollConfig, HawkConfig, PolicyConfig, RepositoryConfig};
pub use errors::{HawkError, HawkResult};
pub use identifiers::{
    ActionId, ControllerId, RolloutGroupId, RolloutId, SoftwareModuleTypeId, TagId, TenantId,
};
pub use time::{Clock, ManualClock, SystemClock};
