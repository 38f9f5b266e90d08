use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use fieldguard_core::TypeRef;

use crate::adapter::{TypeIntrospector, TypeShape};
use crate::descriptor::{TypeDescriptor, TypeUniverse};
use crate::errors::{IntrospectError, Result};
use crate::options::IntrospectOptions;

/// JSON document listing described types.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct MetadataDocument {
    #[serde(default)]
    pub types: Vec<TypeDescriptor>,
}

/// Introspector backed by explicitly provided metadata.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIntrospector {
    universe: TypeUniverse,
}

impl InMemoryIntrospector {
    pub fn new(options: IntrospectOptions) -> Self {
        Self {
            universe: TypeUniverse::new(options),
        }
    }

    /// Add a type; a second type with the same short name is rejected.
    pub fn insert(&mut self, descriptor: TypeDescriptor) -> Result<()> {
        if self.universe.contains(&descriptor.name) {
            return Err(IntrospectError::Metadata(format!(
                "type `{}` described twice",
                descriptor.name
            )));
        }
        self.universe.insert(descriptor);
        Ok(())
    }

    /// Builder-style variant of [`InMemoryIntrospector::insert`] for tests and fixtures.
    pub fn with_type(mut self, descriptor: TypeDescriptor) -> Self {
        self.universe.insert(descriptor);
        self
    }

    pub fn from_document(document: MetadataDocument, options: IntrospectOptions) -> Result<Self> {
        let mut introspector = Self::new(options);
        for descriptor in document.types {
            introspector.insert(descriptor)?;
        }
        Ok(introspector)
    }

    pub fn from_json(json: &str, options: IntrospectOptions) -> Result<Self> {
        let document: MetadataDocument = serde_json::from_str(json)?;
        Self::from_document(document, options)
    }

    pub fn load(path: &Path, options: IntrospectOptions) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json, options)
    }

    pub fn universe(&self) -> &TypeUniverse {
        &self.universe
    }
}

impl TypeIntrospector for InMemoryIntrospector {
    fn origin(&self) -> &'static str {
        "memory"
    }

    fn describe(&self, ty: &TypeRef) -> Option<&TypeDescriptor> {
        self.universe.describe(ty)
    }

    fn classify(&self, ty: &TypeRef) -> TypeShape {
        self.universe.classify(ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::PropertyDescriptor;

    #[test]
    fn loads_metadata_from_json() {
        let json = r#"{
          "types": [
            {
              "name": "Todo",
              "properties": [
                {
                  "name": "Id",
                  "wire_name": "id",
                  "accessor": "id",
                  "ty": { "name": "i32" },
                  "annotations": [{ "kind": "required" }]
                }
              ]
            }
          ]
        }"#;
        let introspector =
            InMemoryIntrospector::from_json(json, IntrospectOptions::default()).unwrap();
        let todo = introspector.describe(&TypeRef::named("Todo")).unwrap();
        assert_eq!(todo.path, "Todo");
        assert_eq!(todo.properties[0].annotations[0].kind, "required");
    }

    #[test]
    fn duplicate_types_are_rejected() {
        let mut introspector = InMemoryIntrospector::new(IntrospectOptions::default());
        introspector.insert(TypeDescriptor::new("Todo")).unwrap();
        let err = introspector.insert(TypeDescriptor::new("Todo")).unwrap_err();
        assert!(err.to_string().contains("described twice"));
    }

    fn project(extra: TypeDescriptor) -> InMemoryIntrospector {
        let todo = TypeDescriptor::new("Todo").property(PropertyDescriptor::new(
            "Title",
            TypeRef::named("String"),
        ));
        let project = TypeDescriptor::new("Project").property(PropertyDescriptor::new(
            "Todos",
            TypeRef::generic("Vec", vec![TypeRef::named("Todo")]),
        ));
        InMemoryIntrospector::new(IntrospectOptions::default())
            .with_type(todo)
            .with_type(project)
            .with_type(extra)
    }

    #[test]
    fn reachable_fingerprint_ignores_unrelated_types() {
        let root = TypeRef::named("Project");
        let before = project(TypeDescriptor::new("Audit")).reachable_fingerprint(&root).unwrap();
        let unrelated = project(
            TypeDescriptor::new("Audit")
                .property(PropertyDescriptor::new("By", TypeRef::named("String"))),
        )
        .reachable_fingerprint(&root)
        .unwrap();
        assert_eq!(before, unrelated);

        // `Todo` is reached through `Vec<Todo>`, so editing it counts.
        let nested = InMemoryIntrospector::new(IntrospectOptions::default())
            .with_type(TypeDescriptor::new("Todo"))
            .with_type(TypeDescriptor::new("Project").property(PropertyDescriptor::new(
                "Todos",
                TypeRef::generic("Vec", vec![TypeRef::named("Todo")]),
            )))
            .reachable_fingerprint(&root)
            .unwrap();
        assert_ne!(before, nested);
    }
}
