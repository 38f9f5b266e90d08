//! Type-graph extraction: from one parameter type to every validatable type
//! reachable from it.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::trace;

use fieldguard_core::{
    Diagnostic, DiagnosticCode, DiagnosticReport, Multiplicity, NestedValidation, NestingGraph,
    ParamKind, RuleCatalog, TypeRef, ValidatableProperty, ValidatableType, ValidationAnnotation,
};
use fieldguard_introspect::{PropertyDescriptor, TypeDescriptor, TypeIntrospector, TypeShape};

/// Result of extracting one parameter type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeGraph {
    /// Short name of the root element type, when it is validatable.
    pub root: Option<String>,
    /// The parameter is a collection of the root type.
    pub sequence: bool,
    /// The parameter is `Option` of the root type.
    pub optional: bool,
    /// Every validatable type discovered, keyed by short name.
    pub types: BTreeMap<String, ValidatableType>,
    pub diagnostics: DiagnosticReport,
}

impl TypeGraph {
    pub fn is_validatable(&self) -> bool {
        self.root.is_some()
    }
}

/// A type reference with optional, pointer and collection wrappers removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peeled {
    pub element: TypeRef,
    pub multiplicity: Multiplicity,
    pub optional: bool,
}

/// Strip wrappers down to the element type. `None` for keyed collections,
/// nested collections and collections of optional values.
pub fn peel(introspector: &dyn TypeIntrospector, ty: &TypeRef) -> Option<Peeled> {
    let mut current = ty.clone();
    let mut multiplicity = Multiplicity::Single;
    let mut optional = false;
    loop {
        match introspector.classify(&current) {
            TypeShape::Optional(inner) if multiplicity == Multiplicity::Single => {
                optional = true;
                current = inner;
            }
            TypeShape::Pointer(inner) => current = inner,
            TypeShape::Sequence(inner) if multiplicity == Multiplicity::Single => {
                multiplicity = Multiplicity::Sequence;
                current = inner;
            }
            TypeShape::Single => {
                return Some(Peeled {
                    element: current,
                    multiplicity,
                    optional,
                });
            }
            _ => return None,
        }
    }
}

/// Extract the validatable type graph rooted at `ty`.
///
/// Types are visited once each. A nesting edge `T.p -> U` whose target can
/// reach `T` again is cut: `p` keeps its own checks, stops delegating, and
/// is flagged recursive. The decision depends only on the type graph.
pub fn extract(introspector: &dyn TypeIntrospector, catalog: &RuleCatalog, ty: &TypeRef) -> TypeGraph {
    let mut extractor = Extractor {
        introspector,
        catalog,
        members: BTreeMap::new(),
        graph: NestingGraph::new(),
        validatable: BTreeMap::new(),
        diagnostics: DiagnosticReport::default(),
    };

    let Some(root) = peel(introspector, ty) else {
        if mentions_described(introspector, ty) {
            extractor.diagnostics.push(
                Diagnostic::warning(
                    DiagnosticCode::UnsupportedCollection,
                    ty.to_string(),
                    format!("`{ty}` is not traversed; only single-argument collections are"),
                )
                .with_hint("wrap the values in a struct or use Vec<T>"),
            );
        }
        return TypeGraph {
            diagnostics: extractor.diagnostics,
            ..TypeGraph::default()
        };
    };

    let Some(descriptor) = introspector.describe(&root.element) else {
        return TypeGraph::default();
    };
    let root_name = descriptor.name.clone();
    extractor.discover(&root_name);

    let mut graph = TypeGraph {
        root: None,
        sequence: root.multiplicity == Multiplicity::Sequence,
        optional: root.optional,
        types: BTreeMap::new(),
        diagnostics: DiagnosticReport::default(),
    };
    if extractor.is_validatable(&root_name) {
        graph.root = Some(root_name.clone());
        graph.types = extractor.build(&root_name, graph.sequence);
    }
    extractor.diagnostics.normalize();
    graph.diagnostics = extractor.diagnostics;
    trace!(
        event = "plan.extract.done",
        root = %ty,
        types = graph.types.len(),
        warnings = graph.diagnostics.warnings.len()
    );
    graph
}

/// Member of a type after inheritance flattening and annotation filtering.
#[derive(Debug, Clone)]
struct Member {
    name: String,
    wire_name: String,
    accessor: Vec<String>,
    ty: TypeRef,
    annotations: Vec<ValidationAnnotation>,
    target: Option<(String, Multiplicity, bool)>,
}

struct Extractor<'a> {
    introspector: &'a dyn TypeIntrospector,
    catalog: &'a RuleCatalog,
    members: BTreeMap<String, (TypeRef, Vec<Member>)>,
    graph: NestingGraph,
    validatable: BTreeMap<String, bool>,
    diagnostics: DiagnosticReport,
}

impl<'a> Extractor<'a> {
    /// Breadth-first walk over described types, recording members and
    /// nesting edges.
    fn discover(&mut self, root: &str) {
        let introspector = self.introspector;
        let mut queue = VecDeque::from([root.to_string()]);
        while let Some(name) = queue.pop_front() {
            if self.members.contains_key(&name) {
                continue;
            }
            let Some(descriptor) = introspector.describe(&TypeRef::named(name.clone())) else {
                continue;
            };
            self.graph.add_node(&name);
            let members = self.members_of(descriptor);
            for member in &members {
                if let Some((target, _, _)) = &member.target {
                    self.graph.add_edge(&name, &member.name, target);
                    queue.push_back(target.clone());
                }
            }
            self.members.insert(name, (descriptor.type_ref(), members));
        }
    }

    /// Own members first, then inherited ones; derived members hide base
    /// members of the same name.
    fn members_of(&mut self, descriptor: &'a TypeDescriptor) -> Vec<Member> {
        let introspector = self.introspector;
        let mut members = Vec::new();
        let mut seen_names = BTreeSet::new();
        let mut seen_bases = BTreeSet::from([descriptor.name.clone()]);
        let mut pending: VecDeque<(&'a TypeDescriptor, Vec<String>)> =
            VecDeque::from([(descriptor, Vec::new())]);

        while let Some((current, prefix)) = pending.pop_front() {
            for property in &current.properties {
                if !seen_names.insert(property.name.clone()) {
                    continue;
                }
                members.push(self.member(&descriptor.name, property, &prefix));
            }
            for base in &current.bases {
                let Some(base_descriptor) = introspector.describe(&base.ty) else {
                    continue;
                };
                if !seen_bases.insert(base_descriptor.name.clone()) {
                    continue;
                }
                let mut accessor = prefix.clone();
                accessor.push(base.accessor.clone());
                pending.push_back((base_descriptor, accessor));
            }
        }
        members
    }

    fn member(&mut self, owner: &str, property: &PropertyDescriptor, prefix: &[String]) -> Member {
        let path = format!("{owner}.{}", property.name);
        let annotations = property
            .annotations
            .iter()
            .filter(|annotation| self.accept(&path, annotation))
            .cloned()
            .collect();

        let target = match peel(self.introspector, &property.ty) {
            Some(peeled) => self
                .introspector
                .describe(&peeled.element)
                .map(|described| (described.name.clone(), peeled.multiplicity, peeled.optional)),
            None => {
                if mentions_described(self.introspector, &property.ty) {
                    self.diagnostics.push(Diagnostic::warning(
                        DiagnosticCode::UnsupportedCollection,
                        path.clone(),
                        format!("`{}` is not traversed", property.ty),
                    ));
                }
                None
            }
        };

        let mut accessor = prefix.to_vec();
        accessor.push(property.accessor.clone());
        Member {
            name: property.name.clone(),
            wire_name: property.wire_name.clone(),
            accessor,
            ty: property.ty.clone(),
            annotations,
            target,
        }
    }

    /// Keep only annotations the catalog recognizes with matching arguments.
    fn accept(&mut self, path: &str, annotation: &ValidationAnnotation) -> bool {
        let Some(rule) = self.catalog.lookup(&annotation.kind) else {
            self.diagnostics.push(Diagnostic::warning(
                DiagnosticCode::UnknownRule,
                path,
                format!("`{}` is not a registered validation rule", annotation.kind),
            ));
            return false;
        };
        if let Err(reason) = rule.check_args(annotation) {
            self.diagnostics.push(Diagnostic::warning(
                DiagnosticCode::InvalidRuleArguments,
                path,
                reason,
            ));
            return false;
        }
        for (param, arg) in rule.params.iter().zip(&annotation.args) {
            if *param != ParamKind::Pattern {
                continue;
            }
            if let Some(pattern) = arg.as_str() {
                if let Err(err) = regex::Regex::new(pattern) {
                    self.diagnostics.push(Diagnostic::warning(
                        DiagnosticCode::InvalidRuleArguments,
                        path,
                        format!("invalid pattern for `{}`: {err}", annotation.kind),
                    ));
                    return false;
                }
            }
        }
        true
    }

    /// A type is validatable when it has a recognized annotation or a
    /// non-recursive edge to a validatable type. Non-recursive edges form
    /// a DAG, so the recursion terminates.
    fn is_validatable(&mut self, name: &str) -> bool {
        if let Some(known) = self.validatable.get(name) {
            return *known;
        }
        let Some((_, members)) = self.members.get(name) else {
            return false;
        };
        let annotated = members.iter().any(|member| !member.annotations.is_empty());
        let targets: Vec<String> = members
            .iter()
            .filter_map(|member| member.target.as_ref().map(|(target, _, _)| target.clone()))
            .filter(|target| !self.graph.is_recursive_edge(name, target))
            .collect();

        let mut validatable = annotated;
        for target in targets {
            if self.is_validatable(&target) {
                validatable = true;
            }
        }
        self.validatable.insert(name.to_string(), validatable);
        validatable
    }

    fn build(&mut self, root: &str, root_sequence: bool) -> BTreeMap<String, ValidatableType> {
        let mut types: BTreeMap<String, ValidatableType> = BTreeMap::new();
        let mut queue = VecDeque::from([(root.to_string(), root_sequence, false)]);

        while let Some((name, sequence, nested)) = queue.pop_front() {
            if let Some(existing) = types.get_mut(&name) {
                existing.sequence |= sequence;
                existing.nested |= nested;
                continue;
            }
            let Some((element, members)) = self.members.get(&name).cloned() else {
                continue;
            };

            let mut properties = Vec::new();
            let mut recursive = false;
            for member in members {
                let mut delegate = None;
                let mut cut = false;
                if let Some((target, multiplicity, optional)) = member.target.clone() {
                    if self.is_validatable(&target) {
                        if self.graph.is_recursive_edge(&name, &target) {
                            cut = true;
                            self.diagnostics.push(
                                Diagnostic::warning(
                                    DiagnosticCode::RecursiveType,
                                    format!("{name}.{}", member.name),
                                    format!(
                                        "`{name}.{}` leads back to `{name}`; nested validation of `{target}` is skipped here",
                                        member.name
                                    ),
                                )
                                .with_hint("validate the nested value explicitly"),
                            );
                        } else {
                            queue.push_back((
                                target.clone(),
                                multiplicity == Multiplicity::Sequence,
                                true,
                            ));
                            delegate = Some(NestedValidation {
                                target,
                                multiplicity,
                                optional,
                            });
                        }
                    }
                }
                recursive |= cut;

                let property = ValidatableProperty {
                    name: member.name,
                    wire_name: member.wire_name,
                    accessor: member.accessor,
                    ty: member.ty,
                    annotations: member.annotations,
                    nested: delegate,
                    recursive: cut,
                };
                if !property.is_inert() {
                    properties.push(property);
                }
            }

            types.insert(
                name,
                ValidatableType {
                    element,
                    sequence,
                    properties,
                    nested,
                    recursive,
                },
            );
        }
        types
    }
}

fn mentions_described(introspector: &dyn TypeIntrospector, ty: &TypeRef) -> bool {
    introspector.describe(ty).is_some()
        || ty.args.iter().any(|arg| mentions_described(introspector, arg))
}
