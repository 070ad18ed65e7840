//! Configuration validation utilities

use crate::HawkError;

/// Configuration validation result
pub type ValidationResult = Result<(), ValidationError>;

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Value is below its lower bound
    #[error("Field '{field}' must be at least {min} (got {actual})")]
    TooSmall {
        /// Offending field
        field: String,
        /// Smallest accepted value
        min: u64,
        /// Configured value
        actual: u64,
    },
    /// Value format is invalid
    #[error("Field '{field}' has invalid format. Expected: {expected}, got: {actual}")]
    InvalidFormat {
        /// Offending field
        field: String,
        /// Description of the expected format
        expected: String,
        /// Configured value
        actual: String,
    },
    /// Custom validation failed
    #[error("Field '{field}': {message}")]
    Custom {
        /// Offending field
        field: String,
        /// What went wrong
        message: String,
    },
}

impl From<ValidationError> for HawkError {
    fn from(err: ValidationError) -> Self {
        HawkError::invalid(err.to_string())
    }
}

/// Trait for configuration sections that can check themselves
pub trait ConfigValidation {
    /// Validate this configuration section
    fn validate(&self) -> ValidationResult;
}

/// Accumulates validation failures for one configuration section
#[derive(Debug, Default)]
pub struct ConfigValidator {
    errors: Vec<ValidationError>,
    field_prefix: String,
}

impl ConfigValidator {
    /// Create a new validator
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a validator whose field names are prefixed with `section.`
    pub fn for_section(section: &str) -> Self {
        Self {
            errors: Vec::new(),
            field_prefix: section.to_string(),
        }
    }

    /// Validate that an unsigned value is at least `min`
    pub fn at_least(&mut self, field_name: &str, value: u64, min: u64) -> &mut Self {
        if value < min {
            self.errors.push(ValidationError::TooSmall {
                field: self.full_field_name(field_name),
                min,
                actual: value,
            });
        }
        self
    }

    /// Validate a string through a parser, recording its expected format on failure
    pub fn parses<T, E>(
        &mut self,
        field_name: &str,
        value: &str,
        expected: &str,
        parse: impl FnOnce(&str) -> Result<T, E>,
    ) -> Option<T> {
        match parse(value) {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                self.errors.push(ValidationError::InvalidFormat {
                    field: self.full_field_name(field_name),
                    expected: expected.to_string(),
                    actual: value.to_string(),
                });
                None
            }
        }
    }

    /// Validate using a custom predicate
    pub fn custom(&mut self, field_name: &str, holds: bool, message: &str) -> &mut Self {
        if !holds {
            self.errors.push(ValidationError::Custom {
                field: self.full_field_name(field_name),
                message: message.to_string(),
            });
        }
        self
    }

    /// Get validation result; the first recorded failure wins
    pub fn result(self) -> ValidationResult {
        match self.errors.into_iter().next() {
            Some(first) => Err(first),
            None => Ok(()),
        }
    }

    /// Get all validation errors
    pub fn all_errors(self) -> Vec<ValidationError> {
        self.errors
    }

    fn full_field_name(&self, field_name: &str) -> String {
        if self.field_prefix.is_empty() {
            field_name.to_string()
        } else {
            format!("{}.{}", self.field_prefix, field_name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixed_field_names() {
        let mut validator = ConfigValidator::for_section("repository");
        validator.at_least("poll_persistence_queue_size", 0, 1);
        let err = validator.result().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Field 'repository.poll_persistence_queue_size' must be at least 1 (got 0)"
        );
    }

    #[test]
    fn test_collects_all_errors() {
        let mut validator = ConfigValidator::new();
        validator.at_least("a", 0, 1).custom("b", false, "broken");
        let parsed: Option<u32> = validator.parses("c", "x", "integer", str::parse);
        assert!(parsed.is_none());
        assert_eq!(validator.all_errors().len(), 3);
    }
}
