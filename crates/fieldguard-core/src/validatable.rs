use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::annotations::ValidationAnnotation;
use crate::types::TypeRef;

/// Whether a nested value is a single object or a collection of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Multiplicity {
    Single,
    Sequence,
}

/// Delegation target of a property whose type is itself validatable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct NestedValidation {
    /// Element type name of the nested routine.
    pub target: String,
    pub multiplicity: Multiplicity,
    /// The property is `Option<..>`; absent values are skipped.
    pub optional: bool,
}

/// Member of a validatable type that takes part in validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct ValidatableProperty {
    /// Member name used in member paths (`Todo.{name}`).
    pub name: String,
    /// Key of the member in serialized payloads.
    pub wire_name: String,
    /// Field path from the owning value (`["base", "id"]` for inherited members).
    pub accessor: Vec<String>,
    pub ty: TypeRef,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<ValidationAnnotation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nested: Option<NestedValidation>,
    /// Delegation was cut because the nested type leads back to the owner.
    #[serde(default)]
    pub recursive: bool,
}

impl ValidatableProperty {
    /// Validating this property requires another type's routine.
    pub fn is_other_validatable_type(&self) -> bool {
        self.nested.is_some()
    }

    /// Nothing to run for this property (recursive and unannotated).
    pub fn is_inert(&self) -> bool {
        self.annotations.is_empty() && self.nested.is_none()
    }
}

/// Validatable shape of one element type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ValidatableType {
    /// Element type (collection wrappers removed).
    pub element: TypeRef,
    /// Reached through a collection at least once.
    #[serde(default)]
    pub sequence: bool,
    /// Own properties first, then inherited ones, each in declaration order.
    pub properties: Vec<ValidatableProperty>,
    /// Wrapped by another validatable property.
    #[serde(default)]
    pub nested: bool,
    /// At least one property had its delegation cut by the cycle policy.
    #[serde(default)]
    pub recursive: bool,
}

impl ValidatableType {
    pub fn name(&self) -> &str {
        self.element.short_name()
    }

    /// Fold another discovery of the same type into this one.
    ///
    /// Shapes depend only on the type itself; only the discovery flags differ.
    pub fn absorb(&mut self, other: &ValidatableType) {
        self.sequence |= other.sequence;
        self.nested |= other.nested;
        self.recursive |= other.recursive;
    }
}
