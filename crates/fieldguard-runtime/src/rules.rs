//! Builtin validation rules and the [`ValidationRule`] contract custom
//! rules implement.
//!
//! Messages follow the wording host frameworks report for the equivalent
//! data annotations, with the member path as display name.

use std::fmt;

use regex::Regex;

use fieldguard_core::Literal;

use crate::context::{ValidationContext, ValidationResult};
use crate::errors::RuleError;
use crate::value::FieldValue;

/// A constraint evaluated against one member value.
///
/// Every rule except [`Required`] accepts null values.
pub trait ValidationRule: Send + Sync {
    /// Rule type name (`Range`).
    fn name(&self) -> &'static str;

    fn is_valid(&self, value: &FieldValue<'_>) -> Result<bool, RuleError>;

    /// Failure message for a member shown as `display_name`.
    fn format_message(&self, display_name: &str) -> String;

    fn validate(
        &self,
        value: &FieldValue<'_>,
        context: &ValidationContext<'_>,
    ) -> Result<ValidationResult, RuleError> {
        if self.is_valid(value)? {
            return Ok(ValidationResult::Success);
        }
        Ok(ValidationResult::failure(
            context.member_name,
            self.format_message(context.display_name),
        ))
    }
}

/// Value must be present; strings must not be blank.
#[derive(Debug, Clone, Copy, Default)]
pub struct Required;

impl Required {
    pub fn new() -> Self {
        Required
    }
}

impl ValidationRule for Required {
    fn name(&self) -> &'static str {
        "Required"
    }

    fn is_valid(&self, value: &FieldValue<'_>) -> Result<bool, RuleError> {
        Ok(match value {
            FieldValue::Null => false,
            FieldValue::Str(text) => !text.trim().is_empty(),
            _ => true,
        })
    }

    fn format_message(&self, display_name: &str) -> String {
        format!("The {display_name} field is required.")
    }
}

/// Numeric bound of a [`Range`]; keeps the integer form for messages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    Int(i64),
    Float(f64),
}

impl Bound {
    fn as_f64(self) -> f64 {
        match self {
            Bound::Int(value) => value as f64,
            Bound::Float(value) => value,
        }
    }
}

impl From<i64> for Bound {
    fn from(value: i64) -> Self {
        Bound::Int(value)
    }
}

impl From<i32> for Bound {
    fn from(value: i32) -> Self {
        Bound::Int(value as i64)
    }
}

impl From<f64> for Bound {
    fn from(value: f64) -> Self {
        Bound::Float(value)
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::Int(value) => write!(f, "{value}"),
            Bound::Float(value) => write!(f, "{value}"),
        }
    }
}

/// Inclusive numeric range. Strings are parsed as numbers.
#[derive(Debug, Clone, Copy)]
pub struct Range {
    min: Bound,
    max: Bound,
}

impl Range {
    pub fn new(min: impl Into<Bound>, max: impl Into<Bound>) -> Self {
        Self {
            min: min.into(),
            max: max.into(),
        }
    }

    fn contains_int(&self, value: i128) -> bool {
        match (self.min, self.max) {
            (Bound::Int(min), Bound::Int(max)) => (min as i128) <= value && value <= (max as i128),
            _ => self.contains_float(value as f64),
        }
    }

    fn contains_float(&self, value: f64) -> bool {
        self.min.as_f64() <= value && value <= self.max.as_f64()
    }
}

impl ValidationRule for Range {
    fn name(&self) -> &'static str {
        "Range"
    }

    fn is_valid(&self, value: &FieldValue<'_>) -> Result<bool, RuleError> {
        match value {
            FieldValue::Null => Ok(true),
            FieldValue::Int(int) => Ok(self.contains_int(*int)),
            FieldValue::Float(float) => Ok(self.contains_float(*float)),
            FieldValue::Str(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return Ok(true);
                }
                if let Ok(int) = text.parse::<i128>() {
                    return Ok(self.contains_int(int));
                }
                Ok(text
                    .parse::<f64>()
                    .is_ok_and(|float| self.contains_float(float)))
            }
            other => Err(RuleError::UnsupportedValue {
                rule: "Range",
                found: other.kind_name(),
            }),
        }
    }

    fn format_message(&self, display_name: &str) -> String {
        format!(
            "The field {display_name} must be between {} and {}.",
            self.min, self.max
        )
    }
}

fn length_of(rule: &'static str, value: &FieldValue<'_>) -> Result<Option<usize>, RuleError> {
    match value {
        FieldValue::Null => Ok(None),
        FieldValue::Str(text) => Ok(Some(text.chars().count())),
        FieldValue::Seq(len) => Ok(Some(*len)),
        other => Err(RuleError::UnsupportedValue {
            rule,
            found: other.kind_name(),
        }),
    }
}

/// Minimum length of a string (in characters) or collection.
#[derive(Debug, Clone, Copy)]
pub struct MinLength {
    length: usize,
}

impl MinLength {
    pub fn new(length: usize) -> Self {
        Self { length }
    }
}

impl ValidationRule for MinLength {
    fn name(&self) -> &'static str {
        "MinLength"
    }

    fn is_valid(&self, value: &FieldValue<'_>) -> Result<bool, RuleError> {
        Ok(length_of("MinLength", value)?.is_none_or(|len| len >= self.length))
    }

    fn format_message(&self, display_name: &str) -> String {
        format!(
            "The field {display_name} must be a string or array type with a minimum length of '{}'.",
            self.length
        )
    }
}

/// Maximum length of a string (in characters) or collection.
#[derive(Debug, Clone, Copy)]
pub struct MaxLength {
    length: usize,
}

impl MaxLength {
    pub fn new(length: usize) -> Self {
        Self { length }
    }
}

impl ValidationRule for MaxLength {
    fn name(&self) -> &'static str {
        "MaxLength"
    }

    fn is_valid(&self, value: &FieldValue<'_>) -> Result<bool, RuleError> {
        Ok(length_of("MaxLength", value)?.is_none_or(|len| len <= self.length))
    }

    fn format_message(&self, display_name: &str) -> String {
        format!(
            "The field {display_name} must be a string or array type with a maximum length of '{}'.",
            self.length
        )
    }
}

/// The whole string must match the pattern. Empty strings pass.
#[derive(Debug, Clone)]
pub struct RegularExpression {
    pattern: String,
    compiled: Result<Regex, RuleError>,
}

impl RegularExpression {
    pub fn new(pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        let compiled = Regex::new(&format!("^(?:{pattern})$")).map_err(|err| RuleError::InvalidPattern {
            pattern: pattern.clone(),
            message: err.to_string(),
        });
        Self { pattern, compiled }
    }
}

impl ValidationRule for RegularExpression {
    fn name(&self) -> &'static str {
        "RegularExpression"
    }

    fn is_valid(&self, value: &FieldValue<'_>) -> Result<bool, RuleError> {
        let regex = self.compiled.as_ref().map_err(Clone::clone)?;
        match value {
            FieldValue::Null => Ok(true),
            FieldValue::Str(text) => Ok(text.is_empty() || regex.is_match(text)),
            FieldValue::Int(int) => Ok(regex.is_match(&int.to_string())),
            FieldValue::Float(float) => Ok(regex.is_match(&float.to_string())),
            FieldValue::Bool(flag) => Ok(regex.is_match(&flag.to_string())),
            other => Err(RuleError::UnsupportedValue {
                rule: "RegularExpression",
                found: other.kind_name(),
            }),
        }
    }

    fn format_message(&self, display_name: &str) -> String {
        format!(
            "The field {display_name} must match the regular expression '{}'.",
            self.pattern
        )
    }
}

/// Exactly one `@`, neither first nor last.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmailAddress;

impl EmailAddress {
    pub fn new() -> Self {
        EmailAddress
    }
}

impl ValidationRule for EmailAddress {
    fn name(&self) -> &'static str {
        "EmailAddress"
    }

    fn is_valid(&self, value: &FieldValue<'_>) -> Result<bool, RuleError> {
        Ok(match value {
            FieldValue::Null => true,
            FieldValue::Str(text) => {
                let mut at = text.match_indices('@').map(|(idx, _)| idx);
                match (at.next(), at.next()) {
                    (Some(idx), None) => idx > 0 && idx + 1 < text.len(),
                    _ => false,
                }
            }
            _ => false,
        })
    }

    fn format_message(&self, display_name: &str) -> String {
        format!("The {display_name} field is not a valid e-mail address.")
    }
}

/// Construct a builtin rule from its type name and annotation arguments.
pub fn build(rule_type: &str, args: &[Literal]) -> Result<Box<dyn ValidationRule>, RuleError> {
    let invalid = |expected: &str| RuleError::InvalidArguments {
        rule: rule_type.to_string(),
        expected: expected.to_string(),
    };
    let bound = |literal: &Literal| match literal {
        Literal::Int(value) => Some(Bound::Int(*value)),
        Literal::Float(_) => literal.as_f64().map(Bound::Float),
        _ => None,
    };
    let length = |literal: &Literal| literal.as_i64().and_then(|value| usize::try_from(value).ok());

    match (rule_type, args) {
        ("Required", []) => Ok(Box::new(Required)),
        ("EmailAddress", []) => Ok(Box::new(EmailAddress)),
        ("Range", [min, max]) => match (bound(min), bound(max)) {
            (Some(min), Some(max)) => Ok(Box::new(Range::new(min, max))),
            _ => Err(invalid("two numeric bounds")),
        },
        ("MinLength", [len]) => length(len)
            .map(|len| Box::new(MinLength::new(len)) as Box<dyn ValidationRule>)
            .ok_or_else(|| invalid("a non-negative length")),
        ("MaxLength", [len]) => length(len)
            .map(|len| Box::new(MaxLength::new(len)) as Box<dyn ValidationRule>)
            .ok_or_else(|| invalid("a non-negative length")),
        ("RegularExpression", [pattern]) => pattern
            .as_str()
            .map(|pattern| Box::new(RegularExpression::new(pattern)) as Box<dyn ValidationRule>)
            .ok_or_else(|| invalid("a pattern string")),
        ("Required" | "EmailAddress" | "Range" | "MinLength" | "MaxLength" | "RegularExpression", _) => {
            Err(invalid("a different argument count"))
        }
        _ => Err(RuleError::UnknownRule(rule_type.to_string())),
    }
}
