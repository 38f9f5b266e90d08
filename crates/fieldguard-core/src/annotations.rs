use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::types::Literal;

/// Declarative constraint attached to a property or parameter.
///
/// Two annotations are interchangeable when kind and arguments match, which
/// is exactly the derived equality.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
pub struct ValidationAnnotation {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Literal>,
}

impl ValidationAnnotation {
    pub fn new(kind: impl Into<String>, args: Vec<Literal>) -> Self {
        Self {
            kind: kind.into(),
            args,
        }
    }

    /// Annotation without constructor arguments (`required`).
    pub fn marker(kind: impl Into<String>) -> Self {
        Self::new(kind, Vec::new())
    }
}

impl fmt::Display for ValidationAnnotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if self.args.is_empty() {
            return Ok(());
        }
        write!(f, "(")?;
        for (idx, arg) in self.args.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{arg}")?;
        }
        write!(f, ")")
    }
}
