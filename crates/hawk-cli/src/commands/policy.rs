//! `hawkctl policy ...`

use anyhow::{Context, Result};
use clap::Subcommand;
use hawk_authorization::{AccessDecision, DenyReason, Gatekeeper, OperationId, PolicyRegistry};
use hawk_core::{HawkConfig, Principal, TenantId};
use std::io::Write;

/// Exit status of a check that was denied
pub const DENIED_EXIT_CODE: u8 = 2;

/// Policy commands
#[derive(Debug, Subcommand)]
pub enum PolicyCommand {
    /// Print every operation with its effective expression
    List,

    /// Check whether a caller holding the given authorities may run an operation
    Check {
        /// Operation identifier, e.g. `tag.distribution_set.delete`
        #[arg(long)]
        operation: String,

        /// Granted authority; repeat for several
        #[arg(long = "authority")]
        authorities: Vec<String>,

        /// Check as a caller without credentials
        #[arg(long, conflicts_with = "authorities")]
        anonymous: bool,
    },
}

/// Run a policy command; returns whether the outcome counts as success
pub fn run(command: &PolicyCommand, config: &HawkConfig, out: &mut impl Write) -> Result<bool> {
    let registry = PolicyRegistry::from_config(&config.policy).context("building policy table")?;
    match command {
        PolicyCommand::List => {
            list(&registry, out)?;
            Ok(true)
        }
        PolicyCommand::Check {
            operation,
            authorities,
            anonymous,
        } => {
            let operation: OperationId = operation.parse()?;
            let principal = if *anonymous {
                Principal::anonymous(TenantId::default())
            } else {
                Principal::user("hawkctl", TenantId::default(), authorities.iter().cloned())
            };
            let decision = Gatekeeper::new(registry).authorize(&principal, operation);
            writeln!(out, "{}", describe(decision))?;
            Ok(decision.is_allowed())
        }
    }
}

fn list(registry: &PolicyRegistry, out: &mut impl Write) -> Result<()> {
    let overridden = registry.overridden();
    for (operation, expression) in registry.iter() {
        let marker = if overridden.contains(&operation) {
            "  (override)"
        } else {
            ""
        };
        writeln!(out, "{:<40} {expression}{marker}", operation.as_str())?;
    }
    Ok(())
}

fn describe(decision: AccessDecision) -> &'static str {
    match decision {
        AccessDecision::Allow => "allow",
        AccessDecision::Deny(DenyReason::Unauthenticated) => "deny: unauthenticated",
        AccessDecision::Deny(DenyReason::InsufficientPermission) => "deny: insufficient permission",
        AccessDecision::Deny(DenyReason::NoPolicy) => "deny: no policy",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(
        config: &HawkConfig,
        operation: &str,
        authorities: &[&str],
        anonymous: bool,
    ) -> (bool, String) {
        let command = PolicyCommand::Check {
            operation: operation.to_string(),
            authorities: authorities.iter().map(ToString::to_string).collect(),
            anonymous,
        };
        let mut out = Vec::new();
        let allowed = run(&command, config, &mut out).unwrap();
        (allowed, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_list_covers_every_operation() {
        let mut out = Vec::new();
        assert!(run(&PolicyCommand::List, &HawkConfig::default(), &mut out).unwrap());
        let listing = String::from_utf8(out).unwrap();
        assert_eq!(listing.lines().count(), OperationId::ALL.len());
        assert!(listing.contains("system.server_time"));
        assert!(!listing.contains("(override)"));
    }

    #[test]
    fn test_list_marks_overrides() {
        let mut config = HawkConfig::default();
        config
            .policy
            .overrides
            .insert("system.usage".to_string(), "READ_TARGET".to_string());
        let mut out = Vec::new();
        run(&PolicyCommand::List, &config, &mut out).unwrap();
        let listing = String::from_utf8(out).unwrap();
        let line = listing
            .lines()
            .find(|line| line.starts_with("system.usage"))
            .unwrap();
        assert!(line.ends_with("(override)"));
    }

    #[test]
    fn test_check_outcomes() {
        let config = HawkConfig::default();
        assert_eq!(
            check(&config, "tag.distribution_set.delete", &["DELETE_REPOSITORY"], false),
            (true, "allow\n".to_string())
        );
        assert_eq!(
            check(&config, "tag.distribution_set.delete", &["READ_REPOSITORY", "UPDATE_TARGET"], false),
            (false, "deny: insufficient permission\n".to_string())
        );
        assert_eq!(
            check(&config, "target.read", &[], true),
            (false, "deny: unauthenticated\n".to_string())
        );
        assert!(check(&config, "system.server_time", &[], true).0);
    }

    #[test]
    fn test_unknown_operation_is_an_error() {
        let command = PolicyCommand::Check {
            operation: "target.explode".to_string(),
            authorities: Vec::new(),
            anonymous: false,
        };
        assert!(run(&command, &HawkConfig::default(), &mut Vec::new()).is_err());
    }
}
