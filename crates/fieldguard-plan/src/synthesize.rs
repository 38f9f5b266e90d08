//! Validation plan synthesis: instance table, per-type routines and
//! per-call-site plans.

use std::collections::{BTreeMap, BTreeSet};

use convert_case::{Case, Casing};
use tracing::debug;

use fieldguard_core::{
    CallSite, CallSiteKey, Diagnostic, DiagnosticCode, DiagnosticReport, MANIFEST_VERSION,
    Multiplicity, RuleCatalog, SourceLocation, TypeRef, ValidatableType, ValidationAnnotation,
};

use crate::errors::Result;
use crate::extract::TypeGraph;
use crate::model::{
    CallSitePlan, ParameterStep, PlanSite, RoutineStep, SynthesizedPlans, TypeRoutine,
    ValidatorInstance,
};

/// Order-independent union of extracted graphs keyed by type name.
pub fn merge_types<'g>(graphs: impl IntoIterator<Item = &'g TypeGraph>) -> BTreeMap<String, ValidatableType> {
    let mut merged: BTreeMap<String, ValidatableType> = BTreeMap::new();
    for graph in graphs {
        for (name, ty) in &graph.types {
            match merged.get_mut(name) {
                Some(existing) => existing.absorb(ty),
                None => {
                    merged.insert(name.clone(), ty.clone());
                }
            }
        }
    }
    merged
}

/// (type, property, kind, ordinal) identity of an instance.
type InstanceKey = (String, String, String, usize);

/// Annotations of a property paired with their per-kind ordinal.
fn with_ordinals(annotations: &[ValidationAnnotation]) -> Vec<(&ValidationAnnotation, usize)> {
    let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
    annotations
        .iter()
        .map(|annotation| {
            let ordinal = seen.entry(annotation.kind.as_str()).or_insert(0);
            *ordinal += 1;
            (annotation, *ordinal)
        })
        .collect()
}

/// Build the canonical instance table for a merged type set.
pub fn build_instances(
    types: &BTreeMap<String, ValidatableType>,
    catalog: &RuleCatalog,
) -> Vec<ValidatorInstance> {
    let mut entries: BTreeMap<InstanceKey, &ValidationAnnotation> = BTreeMap::new();
    for (type_name, ty) in types {
        for property in &ty.properties {
            for (annotation, ordinal) in with_ordinals(&property.annotations) {
                entries.insert(
                    (
                        type_name.clone(),
                        property.name.clone(),
                        annotation.kind.clone(),
                        ordinal,
                    ),
                    annotation,
                );
            }
        }
    }

    let mut used = BTreeSet::new();
    let mut instances = Vec::with_capacity(entries.len());
    for ((type_name, property, kind, ordinal), annotation) in entries {
        let Some(rule) = catalog.lookup(&kind) else {
            continue;
        };
        let mut base = format!("{type_name}_{property}_{kind}").to_case(Case::Constant);
        if ordinal > 1 {
            base = format!("{base}_{ordinal}");
        }
        let mut name = base.clone();
        let mut suffix = 2;
        while !used.insert(name.clone()) {
            name = format!("{base}_{suffix}");
            suffix += 1;
        }
        instances.push(ValidatorInstance {
            name,
            type_name,
            property,
            kind,
            ordinal,
            rule_type: rule.rule_type.clone(),
            builtin: rule.builtin,
            args: annotation.args.clone(),
        });
    }
    instances
}

/// Routine function stem for a type (`validate_todo_item`).
pub fn routine_function(type_name: &str) -> String {
    format!("validate_{}", type_name.to_case(Case::Snake))
}

/// Build one routine per merged type, sorted by type name.
pub fn build_routines(
    types: &BTreeMap<String, ValidatableType>,
    instances: &[ValidatorInstance],
) -> Vec<TypeRoutine> {
    let names: BTreeMap<InstanceKey, &str> = instances
        .iter()
        .map(|instance| {
            (
                (
                    instance.type_name.clone(),
                    instance.property.clone(),
                    instance.kind.clone(),
                    instance.ordinal,
                ),
                instance.name.as_str(),
            )
        })
        .collect();

    types
        .iter()
        .map(|(type_name, ty)| {
            let mut steps = Vec::new();
            for property in &ty.properties {
                for (annotation, ordinal) in with_ordinals(&property.annotations) {
                    let key = (
                        type_name.clone(),
                        property.name.clone(),
                        annotation.kind.clone(),
                        ordinal,
                    );
                    if let Some(instance) = names.get(&key) {
                        steps.push(RoutineStep::Check {
                            property: property.name.clone(),
                            wire_name: property.wire_name.clone(),
                            accessor: property.accessor.clone(),
                            ty: qualify(&property.ty, types),
                            instance: instance.to_string(),
                        });
                    }
                }
                if let Some(nested) = &property.nested {
                    if types.contains_key(&nested.target) {
                        steps.push(RoutineStep::Delegate {
                            property: property.name.clone(),
                            wire_name: property.wire_name.clone(),
                            accessor: property.accessor.clone(),
                            ty: qualify(&property.ty, types),
                            target: nested.target.clone(),
                            multiplicity: nested.multiplicity,
                            optional: nested.optional,
                        });
                    }
                }
            }
            TypeRoutine {
                type_name: type_name.clone(),
                type_path: ty.element.name.clone(),
                function: routine_function(type_name),
                recursive: ty.recursive,
                steps,
            }
        })
        .collect()
}

/// Replace validatable type names with the paths generated code uses.
pub fn qualify(ty: &TypeRef, types: &BTreeMap<String, ValidatableType>) -> TypeRef {
    if !ty.is_generic() {
        if let Some(known) = types.get(ty.short_name()) {
            return known.element.clone();
        }
    }
    TypeRef::generic(
        ty.name.clone(),
        ty.args.iter().map(|arg| qualify(arg, types)).collect(),
    )
}

/// Plan for one resolved call site.
///
/// Direct annotations on a parameter take precedence over delegation to
/// the parameter type's routine.
pub fn plan_call_site(
    site: &CallSite,
    graphs: &BTreeMap<TypeRef, TypeGraph>,
    types: &BTreeMap<String, ValidatableType>,
    catalog: &RuleCatalog,
    diagnostics: &mut DiagnosticReport,
) -> Result<CallSitePlan> {
    let mut steps = Vec::new();
    for param in &site.handler.parameters {
        let path = format!("{}: {}", site.location, param.name);
        let rules: Vec<ValidationAnnotation> = param
            .annotations
            .iter()
            .filter(|annotation| match catalog.resolve(annotation) {
                Ok(_) => true,
                Err(err) => {
                    let code = if catalog.is_validation_rule(&annotation.kind) {
                        DiagnosticCode::InvalidRuleArguments
                    } else {
                        DiagnosticCode::UnknownRule
                    };
                    diagnostics.push(Diagnostic::warning(code, path.clone(), err.to_string()));
                    false
                }
            })
            .cloned()
            .collect();

        if !rules.is_empty() {
            steps.push(ParameterStep::Check {
                index: param.index,
                name: param.name.clone(),
                ty: qualify(&param.ty, types),
                rules,
            });
            continue;
        }

        let Some(graph) = graphs.get(&param.ty) else {
            continue;
        };
        let Some(root) = graph.root.as_ref().filter(|root| types.contains_key(*root)) else {
            continue;
        };
        steps.push(ParameterStep::Delegate {
            index: param.index,
            name: param.name.clone(),
            ty: qualify(&param.ty, types),
            target: root.clone(),
            multiplicity: if graph.sequence {
                Multiplicity::Sequence
            } else {
                Multiplicity::Single
            },
            optional: graph.optional,
        });
    }

    Ok(CallSitePlan {
        key: site.key()?,
        sites: vec![PlanSite {
            location: site.location.clone(),
            method: site.method.clone(),
            route: site.route.clone(),
        }],
        steps,
    })
}

/// Merge plans with equal keys and make locations unique across plans.
///
/// When two plans claim one location, the plan with the smaller key keeps it
/// and a `duplicate_location` warning is recorded.
pub fn merge_plans(plans: impl IntoIterator<Item = CallSitePlan>) -> (Vec<CallSitePlan>, DiagnosticReport) {
    let mut by_key: BTreeMap<CallSiteKey, CallSitePlan> = BTreeMap::new();
    for plan in plans {
        match by_key.get_mut(&plan.key) {
            Some(existing) => existing.sites.extend(plan.sites),
            None => {
                by_key.insert(plan.key.clone(), plan);
            }
        }
    }

    let mut diagnostics = DiagnosticReport::default();
    let mut claimed: BTreeMap<SourceLocation, CallSiteKey> = BTreeMap::new();
    let mut merged = Vec::with_capacity(by_key.len());
    for (key, mut plan) in by_key {
        plan.sites.sort();
        plan.sites.dedup_by(|left, right| left.location == right.location);
        plan.sites.retain(|site| match claimed.get(&site.location) {
            Some(owner) => {
                diagnostics.push(
                    Diagnostic::warning(
                        DiagnosticCode::DuplicateLocation,
                        site.location.to_string(),
                        format!("location already maps to plan {owner}; plan {key} is not attached here"),
                    )
                    .with_hint("register one validated handler per line"),
                );
                false
            }
            None => {
                claimed.insert(site.location.clone(), key.clone());
                true
            }
        });
        if !plan.sites.is_empty() {
            merged.push(plan);
        }
    }
    (merged, diagnostics)
}

/// Assemble the synthesis output from merged types and merged plans.
pub fn synthesize(
    types: &BTreeMap<String, ValidatableType>,
    plans: Vec<CallSitePlan>,
    catalog: &RuleCatalog,
    diagnostics: DiagnosticReport,
) -> SynthesizedPlans {
    let instances = build_instances(types, catalog);
    let routines = build_routines(types, &instances);
    debug!(
        event = "plan.synthesize.done",
        types = types.len(),
        instances = instances.len(),
        plans = plans.len()
    );
    SynthesizedPlans {
        version: MANIFEST_VERSION.to_string(),
        types: types.values().cloned().collect(),
        instances,
        routines,
        plans,
        diagnostics,
    }
}
