use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::annotations::ValidationAnnotation;
use crate::error::Result;
use crate::fingerprint::fingerprint;
use crate::types::TypeRef;

/// Number of hex characters kept from the signature digest.
const KEY_LEN: usize = 16;

/// Source position of a call site: file path and 1-based line.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Content-addressed key of a validation plan.
///
/// Derived from the resolved handler signature, so moving a call site keeps
/// its plan and two call sites with identical signatures share one plan.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct CallSiteKey(String);

impl CallSiteKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallSiteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One handler parameter with its directly attached annotations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct ParameterDescriptor {
    pub index: usize,
    pub name: String,
    pub ty: TypeRef,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<ValidationAnnotation>,
}

impl ParameterDescriptor {
    pub fn new(index: usize, name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            index,
            name: name.into(),
            ty,
            annotations: Vec::new(),
        }
    }

    pub fn with_annotation(mut self, annotation: ValidationAnnotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn has_direct_annotations(&self) -> bool {
        !self.annotations.is_empty()
    }
}

/// Resolved parameter list of the function invoked at a call site.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct HandlerSignature {
    pub parameters: Vec<ParameterDescriptor>,
}

impl HandlerSignature {
    pub fn new(parameters: Vec<ParameterDescriptor>) -> Self {
        Self { parameters }
    }

    /// Content-addressed plan key for this signature.
    pub fn key(&self) -> Result<CallSiteKey> {
        let digest = fingerprint(self)?;
        Ok(CallSiteKey(digest[..KEY_LEN].to_string()))
    }
}

/// A handler-mapping call site with validation enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CallSite {
    pub location: SourceLocation,
    /// Mapping method name (`map_post`).
    pub method: String,
    /// Route pattern as written at the call site.
    pub route: String,
    pub handler: HandlerSignature,
}

impl CallSite {
    pub fn key(&self) -> Result<CallSiteKey> {
        self.handler.key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Literal;

    fn signature(annotated: bool) -> HandlerSignature {
        let mut param = ParameterDescriptor::new(0, "id", TypeRef::named("i32"));
        if annotated {
            param = param.with_annotation(ValidationAnnotation::new(
                "range",
                vec![Literal::Int(1), Literal::Int(10)],
            ));
        }
        HandlerSignature::new(vec![param])
    }

    #[test]
    fn key_depends_on_annotations() {
        let plain = signature(false).key().unwrap();
        let annotated = signature(true).key().unwrap();
        assert_ne!(plain, annotated);
        assert_eq!(annotated, signature(true).key().unwrap());
        assert_eq!(annotated.as_str().len(), KEY_LEN);
    }
}
