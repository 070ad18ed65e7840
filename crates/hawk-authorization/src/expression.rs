//! Permission expressions
//!
//! A boolean combination of required authorities. Conjunction is used for
//! read-then-write operations (`READ_REPOSITORY and UPDATE_TARGET`),
//! disjunction for alternative paths such as a device role standing in for a
//! management permission (`READ_TARGET or ROLE_CONTROLLER`).

use hawk_core::{Authority, AuthoritySet};
use std::collections::BTreeSet;
use std::fmt;

/// Boolean expression over authority tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionExpr {
    /// Satisfied by every caller, authenticated or not
    PermitAll,
    /// Satisfied when the authority is granted
    Authority(Authority),
    /// Satisfied when every operand is satisfied
    All(Vec<PermissionExpr>),
    /// Satisfied when at least one operand is satisfied; empty means never
    Any(Vec<PermissionExpr>),
}

impl PermissionExpr {
    /// Single required authority
    pub fn authority(token: impl Into<String>) -> Self {
        Self::Authority(Authority::new(token))
    }

    /// Every listed authority is required
    pub fn all_of<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::All(tokens.into_iter().map(Self::authority).collect())
    }

    /// Any listed authority suffices
    pub fn any_of<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Any(tokens.into_iter().map(Self::authority).collect())
    }

    /// Conjunction, flattening nested conjunctions
    pub fn and(self, other: PermissionExpr) -> Self {
        match (self, other) {
            (Self::All(mut left), Self::All(right)) => {
                left.extend(right);
                Self::All(left)
            }
            (Self::All(mut left), right) => {
                left.push(right);
                Self::All(left)
            }
            (left, right) => Self::All(vec![left, right]),
        }
    }

    /// Disjunction, flattening nested disjunctions
    pub fn or(self, other: PermissionExpr) -> Self {
        match (self, other) {
            (Self::Any(mut left), Self::Any(right)) => {
                left.extend(right);
                Self::Any(left)
            }
            (Self::Any(mut left), right) => {
                left.push(right);
                Self::Any(left)
            }
            (left, right) => Self::Any(vec![left, right]),
        }
    }

    /// Evaluate against a granted authority set. Pure.
    pub fn evaluate(&self, granted: &AuthoritySet) -> bool {
        match self {
            Self::PermitAll => true,
            Self::Authority(required) => granted.contains(required.as_str()),
            Self::All(operands) => operands.iter().all(|operand| operand.evaluate(granted)),
            Self::Any(operands) => operands.iter().any(|operand| operand.evaluate(granted)),
        }
    }

    /// Whether the expression admits callers without any authority
    pub fn is_permit_all(&self) -> bool {
        self.evaluate(&AuthoritySet::new())
    }

    /// Alternative authority sets, each sufficient on its own (disjunctive normal form).
    ///
    /// `READ_TARGET or (READ_REPOSITORY and UPDATE_TARGET)` yields
    /// `[{READ_TARGET}, {READ_REPOSITORY, UPDATE_TARGET}]`. `PermitAll` yields one
    /// empty set; an empty `Any` yields none.
    pub fn sufficient_sets(&self) -> Vec<BTreeSet<Authority>> {
        let mut sets = match self {
            Self::PermitAll => vec![BTreeSet::new()],
            Self::Authority(required) => vec![BTreeSet::from([required.clone()])],
            Self::Any(operands) => operands
                .iter()
                .flat_map(PermissionExpr::sufficient_sets)
                .collect(),
            Self::All(operands) => {
                operands
                    .iter()
                    .fold(vec![BTreeSet::new()], |acc, operand| {
                        let alternatives = operand.sufficient_sets();
                        acc.iter()
                            .flat_map(|prefix| {
                                alternatives.iter().map(move |alternative| {
                                    prefix.union(alternative).cloned().collect()
                                })
                            })
                            .collect()
                    })
            }
        };
        sets.sort();
        sets.dedup();
        sets
    }

    /// Every authority mentioned anywhere in the expression
    pub fn required_authorities(&self) -> BTreeSet<Authority> {
        match self {
            Self::PermitAll => BTreeSet::new(),
            Self::Authority(required) => BTreeSet::from([required.clone()]),
            Self::All(operands) | Self::Any(operands) => operands
                .iter()
                .flat_map(PermissionExpr::required_authorities)
                .collect(),
        }
    }
}

impl fmt::Display for PermissionExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(
            f: &mut fmt::Formatter<'_>,
            operands: &[PermissionExpr],
            separator: &str,
            parenthesize_any: bool,
        ) -> fmt::Result {
            for (index, operand) in operands.iter().enumerate() {
                if index > 0 {
                    f.write_str(separator)?;
                }
                match operand {
                    PermissionExpr::Any(_) if parenthesize_any => write!(f, "({operand})")?,
                    PermissionExpr::All(_) | PermissionExpr::Any(_) if operands.len() > 1 => {
                        write!(f, "({operand})")?;
                    }
                    _ => write!(f, "{operand}")?,
                }
            }
            Ok(())
        }

        match self {
            Self::PermitAll => f.write_str("permitAll"),
            Self::Authority(required) => write!(f, "{required}"),
            // An empty disjunction has no textual form; render something that parses to a deny
            Self::Any(operands) if operands.is_empty() => f.write_str("denyAll"),
            Self::All(operands) if operands.is_empty() => f.write_str("permitAll"),
            Self::All(operands) => join(f, operands, " and ", true),
            Self::Any(operands) => join(f, operands, " or ", false),
        }
    }
}
