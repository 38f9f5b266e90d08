use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Nominal type reference with optional generic arguments.
///
/// `name` may be a path (`models::Todo`); rendering produces Rust type syntax
/// such as `Vec<Todo>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
pub struct TypeRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<TypeRef>,
}

impl TypeRef {
    /// Non-generic type reference.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Generic type reference (`Vec<Todo>`).
    pub fn generic(name: impl Into<String>, args: Vec<TypeRef>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// Last path segment of the type name.
    pub fn short_name(&self) -> &str {
        self.name.rsplit("::").next().unwrap_or(&self.name)
    }

    /// The only generic argument, when there is exactly one.
    pub fn single_arg(&self) -> Option<&TypeRef> {
        match self.args.as_slice() {
            [arg] => Some(arg),
            _ => None,
        }
    }

    pub fn is_generic(&self) -> bool {
        !self.args.is_empty()
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name == "[]" {
            return match self.single_arg() {
                Some(elem) => write!(f, "[{elem}]"),
                None => write!(f, "[]"),
            };
        }
        write!(f, "{}", self.name)?;
        if self.args.is_empty() {
            return Ok(());
        }
        write!(f, "<")?;
        for (idx, arg) in self.args.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{arg}")?;
        }
        write!(f, ">")
    }
}

/// Literal constructor argument of a validation annotation.
///
/// Float literals keep their source text so the emitted constructor call
/// reproduces the argument exactly.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Float(String),
    Str(String),
}

impl Literal {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Literal::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Literal::Int(value) => Some(*value as f64),
            Literal::Float(text) => text.parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::Str(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Short name of the literal kind, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Literal::Bool(_) => "bool",
            Literal::Int(_) => "int",
            Literal::Float(_) => "float",
            Literal::Str(_) => "str",
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Bool(value) => write!(f, "{value}"),
            Literal::Int(value) => write!(f, "{value}"),
            Literal::Float(text) => write!(f, "{text}"),
            Literal::Str(value) => write!(f, "{value:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_rust_type_syntax() {
        let ty = TypeRef::generic(
            "HashMap",
            vec![TypeRef::named("String"), TypeRef::generic("Vec", vec![TypeRef::named("Todo")])],
        );
        assert_eq!(ty.to_string(), "HashMap<String, Vec<Todo>>");
        assert_eq!(
            TypeRef::generic("[]", vec![TypeRef::named("u8")]).to_string(),
            "[u8]"
        );
    }

    #[test]
    fn short_name_strips_module_path() {
        assert_eq!(TypeRef::named("crate::models::Todo").short_name(), "Todo");
        assert_eq!(TypeRef::named("Todo").short_name(), "Todo");
    }

    #[test]
    fn literal_numeric_views() {
        assert_eq!(Literal::Int(3).as_f64(), Some(3.0));
        assert_eq!(Literal::Float("2.5".to_string()).as_f64(), Some(2.5));
        assert_eq!(Literal::Str("x".to_string()).as_i64(), None);
        assert_eq!(Literal::Str("a\"b".to_string()).to_string(), "\"a\\\"b\"");
    }
}
