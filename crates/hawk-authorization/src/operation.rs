//! Catalogue of guarded operations

use hawk_core::HawkError;
use std::fmt;
use std::str::FromStr;

macro_rules! operations {
    ($( $(#[$meta:meta])* $variant:ident => $id:literal, )+) => {
        /// Every repository operation that runs behind the gatekeeper
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum OperationId {
            $( $(#[$meta])* $variant, )+
        }

        impl OperationId {
            /// All operations in declaration order
            pub const ALL: &'static [OperationId] = &[ $( OperationId::$variant, )+ ];

            /// Stable dotted identifier used in configuration and logs
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( OperationId::$variant => $id, )+
                }
            }
        }

        impl FromStr for OperationId {
            type Err = HawkError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $id => Ok(OperationId::$variant), )+
                    other => Err(HawkError::invalid(format!("unknown operation '{other}'"))),
                }
            }
        }
    };
}

operations! {
    /// Read targets
    TargetRead => "target.read",
    /// Create targets
    TargetCreate => "target.create",
    /// Update target content
    TargetUpdate => "target.update",
    /// Delete targets
    TargetDelete => "target.delete",

    /// Read target tags
    TargetTagRead => "tag.target.read",
    /// Create target tags
    TargetTagCreate => "tag.target.create",
    /// Update target tags
    TargetTagUpdate => "tag.target.update",
    /// Delete target tags
    TargetTagDelete => "tag.target.delete",
    /// Assign or unassign target tags
    TargetTagAssign => "tag.target.assign",

    /// Read distribution set tags
    DistributionSetTagRead => "tag.distribution_set.read",
    /// Create distribution set tags
    DistributionSetTagCreate => "tag.distribution_set.create",
    /// Update distribution set tags
    DistributionSetTagUpdate => "tag.distribution_set.update",
    /// Delete distribution set tags
    DistributionSetTagDelete => "tag.distribution_set.delete",

    /// Look up software module types
    SoftwareModuleTypeRead => "software_module_type.read",
    /// Create software module types
    SoftwareModuleTypeCreate => "software_module_type.create",
    /// Update software module types
    SoftwareModuleTypeUpdate => "software_module_type.update",
    /// Delete software module types
    SoftwareModuleTypeDelete => "software_module_type.delete",

    /// Query rollout groups
    RolloutGroupRead => "rollout_group.read",
    /// Query the targets inside rollout groups
    RolloutGroupReadTargets => "rollout_group.read_targets",

    /// Device poll: find or register the calling target
    ControllerRegister => "controller.register",
    /// Look up a target from the device side or from system code
    ControllerFindTarget => "controller.find_target",
    /// Polling interval handed to a device
    ControllerPollingTime => "controller.polling_time",
    /// Device reports its attributes
    ControllerUpdateAttributes => "controller.update_attributes",
    /// Device requests its own removal
    ControllerDeleteTarget => "controller.delete_target",
    /// Device switches auto-confirmation on
    ControllerActivateAutoConfirm => "controller.auto_confirm.activate",
    /// Device switches auto-confirmation off
    ControllerDeactivateAutoConfirm => "controller.auto_confirm.deactivate",

    /// Operator switches auto-confirmation on
    ConfirmationActivateAuto => "confirmation.activate_auto",
    /// Operator switches auto-confirmation off
    ConfirmationDeactivateAuto => "confirmation.deactivate_auto",
    /// Auto-confirmation status of a target
    ConfirmationStatus => "confirmation.status",
    /// Confirm an action waiting for confirmation
    ConfirmationConfirm => "confirmation.confirm",
    /// Deny an action waiting for confirmation
    ConfirmationDeny => "confirmation.deny",
    /// List actions waiting for confirmation
    ConfirmationFindWaiting => "confirmation.find_waiting",

    /// Server wall-clock time
    SystemServerTime => "system.server_time",
    /// Per-tenant usage counters
    SystemUsage => "system.usage",
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_identifiers_round_trip() {
        for op in OperationId::ALL {
            assert_eq!(op.as_str().parse::<OperationId>().unwrap(), *op);
        }
    }

    #[test]
    fn test_identifiers_unique() {
        let ids: HashSet<_> = OperationId::ALL.iter().map(OperationId::as_str).collect();
        assert_eq!(ids.len(), OperationId::ALL.len());
    }

    #[test]
    fn test_unknown_identifier() {
        assert!("tag.delete_everything".parse::<OperationId>().is_err());
    }
}
