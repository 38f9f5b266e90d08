//! Source-backed introspection over parsed Rust units.

pub mod attrs;
pub mod callsite;
pub mod index;
pub mod resolve;
pub mod types;

use std::path::Path;

use convert_case::{Case, Casing};
use syn::{Fields, Item, ItemStruct};
use tracing::debug;

use fieldguard_core::{Diagnostic, DiagnosticCode, DiagnosticReport, TypeRef};

use crate::adapter::{TypeIntrospector, TypeShape};
use crate::descriptor::{PropertyDescriptor, TypeDescriptor, TypeUniverse};
use crate::errors::{IntrospectError, Result};
use crate::options::IntrospectOptions;

pub use callsite::{Binding, CallSiteCandidate, find_call_sites};
pub use index::DeclarationIndex;
pub use resolve::{Dependency, Lookup, Resolution, ResolvedHandler, resolve_handler, resolve_traced};

/// One source file: its path as the compiler reports it and its text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    pub path: String,
    pub text: String,
}

impl SourceUnit {
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }

    pub fn parse(&self) -> Result<ParsedUnit> {
        let file = syn::parse_file(&self.text).map_err(|err| IntrospectError::Parse {
            path: self.path.clone(),
            message: format!("{err} at line {}", err.span().start().line),
        })?;
        Ok(ParsedUnit {
            path: self.path.clone(),
            file,
        })
    }
}

/// A parsed source unit. Syntax trees are not `Send`; parsed units stay on
/// the thread that parsed them.
#[derive(Debug, Clone)]
pub struct ParsedUnit {
    pub path: String,
    pub file: syn::File,
}

impl ParsedUnit {
    /// Module path of the unit inside its crate (`src/models/mod.rs` ->
    /// `crate::models`).
    pub fn module_path(&self) -> String {
        let normalized = self.path.replace('\\', "/");
        let relative = match normalized.rfind("src/") {
            Some(pos) => &normalized[pos + 4..],
            None => normalized.as_str(),
        };
        let stem = relative.strip_suffix(".rs").unwrap_or(relative);
        let mut segments: Vec<&str> = stem.split('/').filter(|segment| !segment.is_empty()).collect();
        if matches!(segments.last(), Some(&"mod") | Some(&"lib") | Some(&"main")) {
            segments.pop();
        }
        std::iter::once("crate")
            .chain(segments)
            .collect::<Vec<_>>()
            .join("::")
    }
}

/// Introspector built from the named-field structs of parsed units.
///
/// Member names are the PascalCase field names, wire names follow
/// `#[serde(rename)]` / `#[serde(rename_all)]`, and `#[serde(flatten)]`
/// fields act as bases whose members are inherited.
#[derive(Debug, Clone, Default)]
pub struct SourceIntrospector {
    universe: TypeUniverse,
    diagnostics: DiagnosticReport,
}

impl SourceIntrospector {
    pub fn from_units(units: &[ParsedUnit], options: IntrospectOptions) -> Self {
        let mut introspector = Self {
            universe: TypeUniverse::new(options),
            diagnostics: DiagnosticReport::default(),
        };
        let mut ordered: Vec<&ParsedUnit> = units.iter().collect();
        ordered.sort_by(|left, right| left.path.cmp(&right.path));
        for unit in ordered {
            introspector.collect(&unit.path, &unit.module_path(), &unit.file.items);
        }
        debug!(
            event = "introspect.source.collected",
            types = introspector.universe.len(),
            warnings = introspector.diagnostics.warnings.len()
        );
        introspector
    }

    /// Parse and collect files from disk; paths are recorded as given.
    pub fn load(paths: &[&Path], options: IntrospectOptions) -> Result<Self> {
        let mut units = Vec::with_capacity(paths.len());
        for path in paths {
            let text = std::fs::read_to_string(path)?;
            units.push(SourceUnit::new(path.display().to_string(), text).parse()?);
        }
        Ok(Self::from_units(&units, options))
    }

    pub fn universe(&self) -> &TypeUniverse {
        &self.universe
    }

    /// Annotation problems and duplicate type names met while collecting.
    pub fn diagnostics(&self) -> &DiagnosticReport {
        &self.diagnostics
    }

    fn collect(&mut self, file: &str, module: &str, items: &[Item]) {
        for item in items {
            match item {
                Item::Struct(item_struct) => {
                    if let Some(descriptor) = self.describe_struct(file, module, item_struct) {
                        let name = descriptor.name.clone();
                        if self.universe.contains(&name) {
                            self.diagnostics.push(
                                Diagnostic::warning(
                                    DiagnosticCode::DuplicateType,
                                    format!("{module}::{name}"),
                                    format!("type `{name}` is declared more than once"),
                                )
                                .with_hint("the first declaration in path order is used"),
                            );
                            continue;
                        }
                        self.universe.insert(descriptor);
                    }
                }
                Item::Mod(item_mod) => {
                    if let Some((_, nested)) = &item_mod.content {
                        let nested_module = format!("{module}::{}", item_mod.ident);
                        self.collect(file, &nested_module, nested);
                    }
                }
                _ => {}
            }
        }
    }

    fn describe_struct(&mut self, file: &str, module: &str, item: &ItemStruct) -> Option<TypeDescriptor> {
        let Fields::Named(fields) = &item.fields else {
            return None;
        };
        if !item.generics.params.is_empty() {
            return None;
        }

        let name = item.ident.to_string();
        let container = attrs::serde_container(&item.attrs);
        for problem in container.problems {
            self.diagnostics.push(Diagnostic::warning(
                DiagnosticCode::InvalidSerdeAttribute,
                format!("{file}: {name}"),
                problem,
            ));
        }
        let rename_all = container.rename_all;
        let attribute = self.universe.options().attribute.clone();
        let mut descriptor = TypeDescriptor::new(&name).at_path(format!("{module}::{name}"));

        for field in &fields.named {
            let Some(ident) = &field.ident else {
                continue;
            };
            let accessor = ident.to_string();
            let plain = accessor.strip_prefix("r#").unwrap_or(&accessor).to_string();
            let Some(ty) = types::type_ref(&field.ty) else {
                continue;
            };
            let serde = attrs::serde_field(&field.attrs);
            for problem in &serde.problems {
                self.diagnostics.push(Diagnostic::warning(
                    DiagnosticCode::InvalidSerdeAttribute,
                    format!("{file}: {name}.{}", plain.to_case(Case::Pascal)),
                    problem.clone(),
                ));
            }
            if serde.flatten {
                descriptor = descriptor.base(accessor, ty);
                continue;
            }

            let parsed = attrs::validation_annotations(&field.attrs, &attribute);
            let member = plain.to_case(Case::Pascal);
            for problem in parsed.problems {
                self.diagnostics.push(Diagnostic::warning(
                    DiagnosticCode::InvalidRuleArguments,
                    format!("{file}: {name}.{member}"),
                    problem,
                ));
            }

            let wire_name = match (serde.rename, &rename_all) {
                (Some(rename), _) => rename,
                (None, Some(rule)) => attrs::apply_rename_rule(rule, &plain),
                (None, None) => plain,
            };
            descriptor = descriptor.property(PropertyDescriptor {
                name: member,
                wire_name,
                accessor,
                ty,
                annotations: parsed.annotations,
            });
        }
        Some(descriptor)
    }
}

impl TypeIntrospector for SourceIntrospector {
    fn origin(&self) -> &'static str {
        "source"
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

    fn introspector(text: &str) -> SourceIntrospector {
        let unit = SourceUnit::new("src/models.rs", text).parse().unwrap();
        SourceIntrospector::from_units(&[unit], IntrospectOptions::default())
    }

    #[test]
    fn module_paths_follow_file_layout() {
        let unit = |path: &str| SourceUnit::new(path, "").parse().unwrap().module_path();
        assert_eq!(unit("src/main.rs"), "crate");
        assert_eq!(unit("src/models/mod.rs"), "crate::models");
        assert_eq!(unit("app/src/api/todo.rs"), "crate::api::todo");
    }

    #[test]
    fn describes_fields_bases_and_wire_names() {
        let introspector = introspector(
            r#"
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    #[validate(required, range(1, i32::MAX))]
    pub id: i32,
    #[serde(rename = "name")]
    pub title: String,
    pub is_completed: bool,
    #[serde(flatten)]
    pub audit: Audit,
}

pub mod nested {
    pub struct Audit { pub created_by: String }
}
"#,
        );
        let todo = introspector.describe(&TypeRef::named("Todo")).unwrap();
        assert_eq!(todo.path, "crate::models::Todo");
        let names: Vec<(&str, &str)> = todo
            .properties
            .iter()
            .map(|p| (p.name.as_str(), p.wire_name.as_str()))
            .collect();
        assert_eq!(
            names,
            vec![("Id", "id"), ("Title", "name"), ("IsCompleted", "isCompleted")]
        );
        assert_eq!(todo.properties[0].annotations.len(), 2);
        assert_eq!(todo.bases[0].accessor, "audit");

        let audit = introspector.describe(&TypeRef::named("Audit")).unwrap();
        assert_eq!(audit.path, "crate::models::nested::Audit");
    }

    #[test]
    fn unreadable_serde_attributes_become_diagnostics() {
        let introspector = introspector(
            "#[serde(rename_all)]\npub struct Todo { #[serde(rename = 5)] pub id: i32 }",
        );
        assert_eq!(
            introspector
                .diagnostics()
                .count(DiagnosticCode::InvalidSerdeAttribute),
            2
        );
        let todo = introspector.describe(&TypeRef::named("Todo")).unwrap();
        assert_eq!(todo.properties[0].wire_name, "id");
    }

    #[test]
    fn malformed_annotations_become_diagnostics() {
        let introspector = introspector(
            "pub struct Todo { #[validate(range(1, compute()))] pub id: i32 }",
        );
        assert_eq!(
            introspector
                .diagnostics()
                .count(DiagnosticCode::InvalidRuleArguments),
            1
        );
    }
}
