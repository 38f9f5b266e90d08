use thiserror::Error;

/// A rule could not evaluate a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("`{rule}` cannot validate a {found} value")]
    UnsupportedValue { rule: &'static str, found: &'static str },
    #[error("invalid pattern `{pattern}`: {message}")]
    InvalidPattern { pattern: String, message: String },
    #[error("`{rule}` expects {expected}")]
    InvalidArguments { rule: String, expected: String },
    #[error("no runtime rule named `{0}`")]
    UnknownRule(String),
}

/// Validation could not run. Distinct from a rejected payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFault {
    #[error("expected to validate {expected} but got {found}")]
    TypeMismatch { expected: String, found: String },
    #[error("handler argument {0} is missing")]
    MissingArgument(usize),
    #[error("{member}: {source}")]
    Rule {
        member: String,
        #[source]
        source: RuleError,
    },
    #[error("no validation plan for call site {file}:{line}")]
    UnanalyzableCallSite { file: String, line: u32 },
    #[error("no validation routine for type `{0}`")]
    UnknownType(String),
}

impl ValidationFault {
    pub fn mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        ValidationFault::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }
}
