use std::collections::BTreeMap;

use convert_case::{Case, Casing};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use fieldguard_core::{TypeRef, ValidationAnnotation};

use crate::adapter::TypeShape;
use crate::options::IntrospectOptions;

/// One declared member of a described type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct PropertyDescriptor {
    /// Member name used in member paths (`Id`).
    pub name: String,
    /// Key in serialized payloads.
    pub wire_name: String,
    /// Rust field name.
    pub accessor: String,
    pub ty: TypeRef,
    /// Every annotation written on the member, recognized or not.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<ValidationAnnotation>,
}

impl PropertyDescriptor {
    /// Property whose wire name is camelCase and accessor snake_case of `name`.
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        let name = name.into();
        Self {
            wire_name: name.to_case(Case::Camel),
            accessor: name.to_case(Case::Snake),
            name,
            ty,
            annotations: Vec::new(),
        }
    }

    pub fn annotate(mut self, annotation: ValidationAnnotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn wire_name(mut self, wire_name: impl Into<String>) -> Self {
        self.wire_name = wire_name.into();
        self
    }
}

/// A base whose members are inherited (a flattened field in Rust).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct BaseDescriptor {
    /// Field holding the base value.
    pub accessor: String,
    pub ty: TypeRef,
}

/// Member metadata for one nominal type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct TypeDescriptor {
    /// Short type name (`Todo`).
    pub name: String,
    /// Path used to name the type in generated code (`crate::models::Todo`).
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub properties: Vec<PropertyDescriptor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bases: Vec<BaseDescriptor>,
}

impl TypeDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            path: name.clone(),
            name,
            properties: Vec::new(),
            bases: Vec::new(),
        }
    }

    pub fn at_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn property(mut self, property: PropertyDescriptor) -> Self {
        self.properties.push(property);
        self
    }

    pub fn base(mut self, accessor: impl Into<String>, ty: TypeRef) -> Self {
        self.bases.push(BaseDescriptor {
            accessor: accessor.into(),
            ty,
        });
        self
    }

    /// Reference to the type as generated code names it.
    pub fn type_ref(&self) -> TypeRef {
        TypeRef::named(self.path.clone())
    }
}

/// Set of described types plus the rules used to classify references.
#[derive(Debug, Clone, Default)]
pub struct TypeUniverse {
    types: BTreeMap<String, TypeDescriptor>,
    options: IntrospectOptions,
}

impl TypeUniverse {
    pub fn new(options: IntrospectOptions) -> Self {
        Self {
            types: BTreeMap::new(),
            options,
        }
    }

    /// Insert a descriptor; returns the displaced one when the short name was taken.
    pub fn insert(&mut self, mut descriptor: TypeDescriptor) -> Option<TypeDescriptor> {
        if descriptor.path.is_empty() {
            descriptor.path = descriptor.name.clone();
        }
        self.types.insert(descriptor.name.clone(), descriptor)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.types.values()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn options(&self) -> &IntrospectOptions {
        &self.options
    }

    pub fn describe(&self, ty: &TypeRef) -> Option<&TypeDescriptor> {
        if ty.is_generic() {
            return None;
        }
        self.types.get(ty.short_name())
    }

    pub fn classify(&self, ty: &TypeRef) -> TypeShape {
        let name = ty.short_name();
        let options = &self.options;
        let listed = |names: &Vec<String>| names.iter().any(|candidate| candidate == name);

        if listed(&options.map_types) {
            return TypeShape::Unsupported;
        }
        match ty.single_arg() {
            Some(arg) if listed(&options.optional_types) => TypeShape::Optional(arg.clone()),
            Some(arg) if listed(&options.pointer_types) => TypeShape::Pointer(arg.clone()),
            Some(arg) if listed(&options.sequence_types) => TypeShape::Sequence(arg.clone()),
            None if ty.is_generic() && listed(&options.sequence_types) => TypeShape::Unsupported,
            _ => TypeShape::Single,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_defaults_follow_member_name() {
        let property = PropertyDescriptor::new("IsCompleted", TypeRef::named("bool"));
        assert_eq!(property.wire_name, "isCompleted");
        assert_eq!(property.accessor, "is_completed");
    }

    #[test]
    fn classify_unwraps_known_wrappers() {
        let universe = TypeUniverse::new(IntrospectOptions::default());
        let todo = TypeRef::named("Todo");
        assert_eq!(
            universe.classify(&TypeRef::generic("Vec", vec![todo.clone()])),
            TypeShape::Sequence(todo.clone())
        );
        assert_eq!(
            universe.classify(&TypeRef::generic("std::option::Option", vec![todo.clone()])),
            TypeShape::Optional(todo.clone())
        );
        assert_eq!(
            universe.classify(&TypeRef::generic("[]", vec![todo.clone()])),
            TypeShape::Sequence(todo.clone())
        );
        assert_eq!(
            universe.classify(&TypeRef::generic(
                "HashMap",
                vec![TypeRef::named("String"), todo.clone()]
            )),
            TypeShape::Unsupported
        );
        assert_eq!(universe.classify(&todo), TypeShape::Single);
    }

    #[test]
    fn describe_matches_short_name() {
        let mut universe = TypeUniverse::new(IntrospectOptions::default());
        universe.insert(TypeDescriptor::new("Todo").at_path("crate::models::Todo"));
        let found = universe
            .describe(&TypeRef::named("models::Todo"))
            .expect("described");
        assert_eq!(found.path, "crate::models::Todo");
        assert!(universe.describe(&TypeRef::named("Other")).is_none());
    }
}
