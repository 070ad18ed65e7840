//! Policy registry
//!
//! Maps every [`OperationId`] to exactly one [`PermissionExpr`]. Built-in
//! expressions come from an exhaustive `match`, so adding an operation without
//! deciding its policy does not compile. Configuration may replace individual
//! expressions; it can never remove one.

use crate::{parse_expression, OperationId, PermissionExpr};
use hawk_core::authorities::*;
use hawk_core::{HawkError, HawkResult, PolicyConfig};
use std::collections::BTreeMap;

/// Built-in permission expression of an operation
pub fn default_expression(operation: OperationId) -> PermissionExpr {
    use OperationId::*;

    let authority = PermissionExpr::authority;
    let is_controller = || PermissionExpr::any_of([ROLE_CONTROLLER, ROLE_CONTROLLER_ANONYMOUS]);

    match operation {
        TargetRead | TargetTagRead => authority(READ_TARGET),
        TargetCreate | TargetTagCreate => authority(CREATE_TARGET),
        TargetUpdate | TargetTagUpdate | TargetTagAssign => authority(UPDATE_TARGET),
        TargetDelete | TargetTagDelete => authority(DELETE_TARGET),

        DistributionSetTagRead | SoftwareModuleTypeRead => authority(READ_REPOSITORY),
        DistributionSetTagCreate | SoftwareModuleTypeCreate => authority(CREATE_REPOSITORY),
        DistributionSetTagUpdate | SoftwareModuleTypeUpdate => authority(UPDATE_REPOSITORY),
        DistributionSetTagDelete | SoftwareModuleTypeDelete => authority(DELETE_REPOSITORY),

        RolloutGroupRead => authority(READ_ROLLOUT),
        RolloutGroupReadTargets => PermissionExpr::all_of([READ_ROLLOUT, READ_TARGET]),

        ControllerRegister
        | ControllerPollingTime
        | ControllerUpdateAttributes
        | ControllerDeleteTarget
        | ControllerActivateAutoConfirm
        | ControllerDeactivateAutoConfirm => is_controller(),
        ControllerFindTarget => is_controller().or(authority(ROLE_SYSTEM_CODE)),

        ConfirmationActivateAuto | ConfirmationConfirm | ConfirmationDeny => {
            PermissionExpr::all_of([READ_REPOSITORY, UPDATE_TARGET])
        }
        ConfirmationDeactivateAuto => authority(UPDATE_TARGET),
        ConfirmationStatus | ConfirmationFindWaiting => authority(READ_TARGET).or(is_controller()),

        SystemServerTime => PermissionExpr::PermitAll,
        SystemUsage => authority(SYSTEM_ADMIN),
    }
}

/// Effective operation → expression table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyRegistry {
    policies: BTreeMap<OperationId, PermissionExpr>,
}

impl PolicyRegistry {
    /// Registry holding only the built-in expressions
    pub fn new() -> Self {
        Self {
            policies: OperationId::ALL
                .iter()
                .map(|operation| (*operation, default_expression(*operation)))
                .collect(),
        }
    }

    /// Built-in expressions with configured overrides applied
    pub fn from_config(config: &PolicyConfig) -> HawkResult<Self> {
        let mut registry = Self::new();
        for (operation, expression) in &config.overrides {
            let operation: OperationId = operation.parse()?;
            let expression = parse_expression(expression).map_err(|err| {
                HawkError::invalid(format!("policy override for {operation}: {err}"))
            })?;
            tracing::info!(%operation, %expression, "permission policy overridden");
            registry.set_override(operation, expression);
        }
        Ok(registry)
    }

    /// Replace the expression of one operation
    pub fn set_override(&mut self, operation: OperationId, expression: PermissionExpr) {
        self.policies.insert(operation, expression);
    }

    /// Expression guarding an operation
    pub fn get(&self, operation: OperationId) -> Option<&PermissionExpr> {
        self.policies.get(&operation)
    }

    /// Iterate the full table in operation order
    pub fn iter(&self) -> impl Iterator<Item = (OperationId, &PermissionExpr)> {
        self.policies
            .iter()
            .map(|(operation, expression)| (*operation, expression))
    }

    /// Operations whose effective expression differs from the built-in one
    pub fn overridden(&self) -> Vec<OperationId> {
        self.iter()
            .filter(|(operation, expression)| *expression != &default_expression(*operation))
            .map(|(operation, _)| operation)
            .collect()
    }
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        Self::new()
    }
}
