use serde::{Deserialize, Serialize};

use crate::errors::ValidationFault;
use crate::rules::ValidationRule;
use crate::value::AsFieldValue;

/// Member being checked. Built fresh for every check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationContext<'a> {
    pub member_name: &'a str,
    pub display_name: &'a str,
}

impl<'a> ValidationContext<'a> {
    /// Context whose display name is the member path itself.
    pub fn new(member: &'a str) -> Self {
        Self {
            member_name: member,
            display_name: member,
        }
    }
}

/// Outcome of one rule check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ValidationResult {
    Success,
    Failure { member: String, message: String },
}

impl ValidationResult {
    pub fn failure(member: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationResult::Failure {
            member: member.into(),
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ValidationResult::Success)
    }
}

/// Run one rule against a member value and record the outcome.
pub fn check<V: AsFieldValue + ?Sized>(
    rule: &dyn ValidationRule,
    value: &V,
    member: &str,
    results: &mut Vec<ValidationResult>,
) -> Result<(), ValidationFault> {
    let context = ValidationContext::new(member);
    let outcome = rule
        .validate(&value.field_value(), &context)
        .map_err(|source| ValidationFault::Rule {
            member: member.to_string(),
            source,
        })?;
    results.push(outcome);
    Ok(())
}
