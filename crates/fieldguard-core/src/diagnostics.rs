use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Severity level for analysis diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// Stable diagnostic codes emitted by the analysis pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticCode {
    /// The handler at a call site could not be resolved to a signature.
    UnresolvedHandler,
    /// A nesting edge leads back to its owner and was cut.
    RecursiveType,
    /// Multi-argument collections are not traversed.
    UnsupportedCollection,
    /// Annotation kind is not registered in the rule catalog.
    UnknownRule,
    /// Annotation arguments do not match the rule parameters.
    InvalidRuleArguments,
    /// A source unit failed to parse.
    ParseError,
    /// Two call sites reported the same location.
    DuplicateLocation,
    /// Two described types share a short name.
    DuplicateType,
    /// A `#[serde(...)]` attribute could not be read; defaults were used.
    InvalidSerdeAttribute,
}

impl DiagnosticCode {
    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticCode::UnresolvedHandler => "unresolved_handler",
            DiagnosticCode::RecursiveType => "recursive_type",
            DiagnosticCode::UnsupportedCollection => "unsupported_collection",
            DiagnosticCode::UnknownRule => "unknown_rule",
            DiagnosticCode::InvalidRuleArguments => "invalid_rule_arguments",
            DiagnosticCode::ParseError => "parse_error",
            DiagnosticCode::DuplicateLocation => "duplicate_location",
            DiagnosticCode::DuplicateType => "duplicate_type",
            DiagnosticCode::InvalidSerdeAttribute => "invalid_serde_attribute",
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured analysis diagnostic with location and hint.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagnosticCode,
    /// Where the issue was found (`src/main.rs:12`, `Todo.parent`).
    pub path: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl Diagnostic {
    pub fn new(
        severity: Severity,
        code: DiagnosticCode,
        path: impl Into<String>,
        message: impl Into<String>,
        hint: Option<String>,
    ) -> Self {
        Self {
            severity,
            code,
            path: path.into(),
            message: message.into(),
            hint,
        }
    }

    pub fn warning(code: DiagnosticCode, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, path, message, None)
    }

    pub fn error(code: DiagnosticCode, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, path, message, None)
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{level}[{}] {}: {}", self.code, self.path, self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, " (hint: {hint})")?;
        }
        Ok(())
    }
}

/// Aggregated diagnostics with errors and warnings.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DiagnosticReport {
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

impl DiagnosticReport {
    /// Returns true when there are no errors.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }

    /// Add a diagnostic to the list matching its severity.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => self.errors.push(diagnostic),
            Severity::Warning => self.warnings.push(diagnostic),
        }
    }

    /// Merge another report into this one.
    pub fn merge(&mut self, other: DiagnosticReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// Sort and deduplicate both lists so reports compare independent of
    /// discovery order.
    pub fn normalize(&mut self) {
        self.errors.sort();
        self.errors.dedup();
        self.warnings.sort();
        self.warnings.dedup();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.errors.iter().chain(self.warnings.iter())
    }

    pub fn count(&self, code: DiagnosticCode) -> usize {
        self.iter().filter(|diagnostic| diagnostic.code == code).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_routes_by_severity() {
        let mut report = DiagnosticReport::default();
        report.push(Diagnostic::warning(
            DiagnosticCode::RecursiveType,
            "Node.next",
            "cut",
        ));
        assert!(report.is_ok());
        report.push(Diagnostic::error(DiagnosticCode::ParseError, "src/lib.rs", "bad"));
        assert!(!report.is_ok());
        assert_eq!(report.count(DiagnosticCode::RecursiveType), 1);
    }

    #[test]
    fn normalize_dedups_and_orders() {
        let mut report = DiagnosticReport::default();
        let late = Diagnostic::warning(DiagnosticCode::UnknownRule, "b", "x");
        let early = Diagnostic::warning(DiagnosticCode::UnknownRule, "a", "x");
        report.push(late.clone());
        report.push(early.clone());
        report.push(late.clone());
        report.normalize();
        assert_eq!(report.warnings, vec![early, late]);
    }

    #[test]
    fn display_includes_code_and_hint() {
        let diagnostic = Diagnostic::warning(
            DiagnosticCode::UnresolvedHandler,
            "src/main.rs:4",
            "handler is not a function",
        )
        .with_hint("pass a closure or fn item");
        assert_eq!(
            diagnostic.to_string(),
            "warning[unresolved_handler] src/main.rs:4: handler is not a function (hint: pass a closure or fn item)"
        );
    }
}
