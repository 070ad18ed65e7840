//! # Hawk Authorization
//!
//! Declarative permission policies for repository operations.
//!
//! - [`PermissionExpr`]: boolean combination of authority tokens
//! - [`parse_expression`]: textual form used in configuration overrides
//! - [`OperationId`]: the closed catalogue of guarded operations
//! - [`PolicyRegistry`]: one expression per operation, total by construction
//! - [`Gatekeeper`]: checks a principal before an operation body runs

#![forbid(unsafe_code)]

mod expression;
mod gatekeeper;
mod operation;
mod parser;
mod policy;

pub use expression::PermissionExpr;
pub use gatekeeper::{AccessDecision, DenyReason, Gatekeeper};
pub use operation::OperationId;
pub use parser::parse_expression;
pub use policy::{default_expression, PolicyRegistry};
