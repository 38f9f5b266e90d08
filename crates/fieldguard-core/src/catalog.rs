use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::annotations::ValidationAnnotation;
use crate::error::{Error, Result};
use crate::types::Literal;

/// Expected literal kind of one rule constructor parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    /// Integer literal.
    Int,
    /// Integer or float literal.
    Number,
    /// String literal.
    Str,
    /// String literal holding a regular expression.
    Pattern,
}

impl ParamKind {
    fn accepts(self, literal: &Literal) -> bool {
        matches!(
            (self, literal),
            (ParamKind::Int, Literal::Int(_))
                | (ParamKind::Number, Literal::Int(_) | Literal::Float(_))
                | (ParamKind::Str | ParamKind::Pattern, Literal::Str(_))
        )
    }

    fn label(self) -> &'static str {
        match self {
            ParamKind::Int => "int",
            ParamKind::Number => "number",
            ParamKind::Str => "str",
            ParamKind::Pattern => "pattern",
        }
    }
}

/// Registration of one rule kind: the capability that makes an annotation a
/// validation constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RuleDescriptor {
    /// Annotation kind as written in source (`min_length`).
    pub kind: String,
    /// Runtime rule type. Builtins are resolved inside the runtime crate,
    /// custom rules are full paths (`crate::rules::Slug`).
    pub rule_type: String,
    #[serde(default)]
    pub params: Vec<ParamKind>,
    #[serde(default, skip_serializing)]
    pub builtin: bool,
}

impl RuleDescriptor {
    fn builtin(kind: &str, rule_type: &str, params: &[ParamKind]) -> Self {
        Self {
            kind: kind.to_string(),
            rule_type: rule_type.to_string(),
            params: params.to_vec(),
            builtin: true,
        }
    }

    /// Check arity and literal kinds of an annotation against this rule.
    pub fn check_args(&self, annotation: &ValidationAnnotation) -> std::result::Result<(), String> {
        if annotation.args.len() != self.params.len() {
            return Err(format!(
                "`{}` expects {} argument(s), found {}",
                self.kind,
                self.params.len(),
                annotation.args.len()
            ));
        }
        for (idx, (param, arg)) in self.params.iter().zip(&annotation.args).enumerate() {
            if !param.accepts(arg) {
                return Err(format!(
                    "`{}` argument {} must be {}, found {}",
                    self.kind,
                    idx + 1,
                    param.label(),
                    arg.kind_name()
                ));
            }
        }
        Ok(())
    }
}

/// Closed registry of rule kinds recognized as validation constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RuleCatalog {
    rules: BTreeMap<String, RuleDescriptor>,
}

impl Default for RuleCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl RuleCatalog {
    /// Catalog with the rule kinds shipped by the runtime crate.
    pub fn builtin() -> Self {
        let rules = [
            RuleDescriptor::builtin("required", "Required", &[]),
            RuleDescriptor::builtin("range", "Range", &[ParamKind::Number, ParamKind::Number]),
            RuleDescriptor::builtin("min_length", "MinLength", &[ParamKind::Int]),
            RuleDescriptor::builtin("max_length", "MaxLength", &[ParamKind::Int]),
            RuleDescriptor::builtin("regex", "RegularExpression", &[ParamKind::Pattern]),
            RuleDescriptor::builtin("email", "EmailAddress", &[]),
        ]
        .into_iter()
        .map(|rule| (rule.kind.clone(), rule))
        .collect();
        Self { rules }
    }

    /// Register a custom rule kind.
    pub fn register(&mut self, rule: RuleDescriptor) -> Result<()> {
        if let Some(existing) = self.rules.get(&rule.kind) {
            if existing != &rule {
                return Err(Error::DuplicateRule(rule.kind));
            }
            return Ok(());
        }
        self.rules.insert(rule.kind.clone(), rule);
        Ok(())
    }

    pub fn lookup(&self, kind: &str) -> Option<&RuleDescriptor> {
        self.rules.get(kind)
    }

    /// Capability query: does this annotation kind denote a validation rule?
    pub fn is_validation_rule(&self, kind: &str) -> bool {
        self.rules.contains_key(kind)
    }

    pub fn rules(&self) -> impl Iterator<Item = &RuleDescriptor> {
        self.rules.values()
    }

    /// Validate an annotation, returning its rule on success.
    pub fn resolve(&self, annotation: &ValidationAnnotation) -> Result<&RuleDescriptor> {
        let rule = self.lookup(&annotation.kind).ok_or_else(|| {
            Error::InvalidAnnotation(format!("unknown rule kind `{}`", annotation.kind))
        })?;
        rule.check_args(annotation).map_err(Error::InvalidAnnotation)?;
        Ok(rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_range_accepts_int_and_float() {
        let catalog = RuleCatalog::builtin();
        let range = ValidationAnnotation::new(
            "range",
            vec![Literal::Int(1), Literal::Float("9.5".to_string())],
        );
        assert!(catalog.resolve(&range).is_ok());
    }

    #[test]
    fn rejects_wrong_arity_and_kind() {
        let catalog = RuleCatalog::builtin();
        let missing = ValidationAnnotation::new("min_length", Vec::new());
        let err = catalog.resolve(&missing).unwrap_err();
        assert!(err.to_string().contains("expects 1 argument(s), found 0"));

        let wrong = ValidationAnnotation::new("min_length", vec![Literal::Str("3".to_string())]);
        let err = catalog.resolve(&wrong).unwrap_err();
        assert!(err.to_string().contains("must be int, found str"));
    }

    #[test]
    fn custom_rules_are_capabilities() {
        let mut catalog = RuleCatalog::builtin();
        assert!(!catalog.is_validation_rule("slug"));
        catalog
            .register(RuleDescriptor {
                kind: "slug".to_string(),
                rule_type: "crate::rules::Slug".to_string(),
                params: Vec::new(),
                builtin: false,
            })
            .unwrap();
        assert!(catalog.is_validation_rule("slug"));

        let clash = RuleDescriptor {
            kind: "slug".to_string(),
            rule_type: "crate::other::Slug".to_string(),
            params: Vec::new(),
            builtin: false,
        };
        assert!(matches!(catalog.register(clash), Err(Error::DuplicateRule(_))));
    }
}
