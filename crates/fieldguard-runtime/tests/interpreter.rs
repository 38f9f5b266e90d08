use std::collections::BTreeMap;

use serde_json::json;

use fieldguard_core::{
    CallSite, DiagnosticReport, HandlerSignature, Literal, ParameterDescriptor, RuleCatalog,
    SourceLocation, TypeRef, ValidationAnnotation,
};
use fieldguard_introspect::{InMemoryIntrospector, IntrospectOptions, PropertyDescriptor, TypeDescriptor};
use fieldguard_plan::{SynthesizedPlans, TypeGraph, extract, merge_plans, merge_types, plan_call_site, synthesize};
use fieldguard_runtime::{DynamicArgument, PlanInterpreter, ValidationFault};

fn todo() -> TypeDescriptor {
    TypeDescriptor::new("Todo")
        .property(
            PropertyDescriptor::new("Id", TypeRef::named("i32"))
                .annotate(ValidationAnnotation::marker("required"))
                .annotate(ValidationAnnotation::new(
                    "range",
                    vec![Literal::Int(1), Literal::Int(2147483647)],
                )),
        )
        .property(
            PropertyDescriptor::new("Title", TypeRef::named("String"))
                .annotate(ValidationAnnotation::marker("required"))
                .annotate(ValidationAnnotation::new("min_length", vec![Literal::Int(3)])),
        )
}

fn project() -> TypeDescriptor {
    TypeDescriptor::new("Project")
        .property(
            PropertyDescriptor::new("Name", TypeRef::named("String"))
                .annotate(ValidationAnnotation::marker("required")),
        )
        .property(PropertyDescriptor::new("Todos", TypeRef::generic("Vec", vec![TypeRef::named("Todo")])))
        .property(PropertyDescriptor::new("Lead", TypeRef::generic("Option", vec![TypeRef::named("Todo")])))
}

/// Plans for `map_post(.., |todo: Todo|)` at line 10, `|todos: Vec<Todo>|`
/// at line 11 and `|project: Project|` at line 12.
fn plans() -> SynthesizedPlans {
    let introspector = InMemoryIntrospector::new(IntrospectOptions::default())
        .with_type(todo())
        .with_type(project());
    let catalog = RuleCatalog::builtin();
    let params = [
        TypeRef::named("Todo"),
        TypeRef::generic("Vec", vec![TypeRef::named("Todo")]),
        TypeRef::named("Project"),
    ];
    let graphs: BTreeMap<TypeRef, TypeGraph> = params
        .iter()
        .map(|ty| (ty.clone(), extract(&introspector, &catalog, ty)))
        .collect();
    let types = merge_types(graphs.values());

    let mut diagnostics = DiagnosticReport::default();
    let sites: Vec<_> = params
        .iter()
        .enumerate()
        .map(|(offset, ty)| {
            let site = CallSite {
                location: SourceLocation::new("src/main.rs", 10 + offset as u32),
                method: "map_post".to_string(),
                route: "/todo".to_string(),
                handler: HandlerSignature::new(vec![ParameterDescriptor::new(0, "value", ty.clone())]),
            };
            plan_call_site(&site, &graphs, &types, &catalog, &mut diagnostics).unwrap()
        })
        .collect();
    let (merged, _) = merge_plans(sites);
    synthesize(&types, merged, &catalog, diagnostics)
}

#[test]
fn single_value_reports_only_the_failing_member() {
    let plans = plans();
    let interpreter = PlanInterpreter::new(&plans);
    let args = [DynamicArgument::new(json!({"id": 0, "title": "A valid title"}))];

    let problem = interpreter.run_at("src/main.rs", 10, &args).unwrap().expect("rejected");
    assert_eq!(problem.errors.len(), 1);
    assert_eq!(
        problem.errors["Todo.Id"],
        vec!["The field Todo.Id must be between 1 and 2147483647."]
    );
}

#[test]
fn sequence_uses_indexed_member_paths() {
    let plans = plans();
    let interpreter = PlanInterpreter::new(&plans);
    let args = [DynamicArgument::new(json!([
        {"id": 1, "title": "A valid title"},
        {"id": 0, "title": "A valid title"}
    ]))];

    let problem = interpreter.run_at("src/main.rs", 11, &args).unwrap().expect("rejected");
    let members: Vec<&str> = problem.errors.keys().map(String::as_str).collect();
    assert_eq!(members, vec!["Todo[1].Id"]);
}

#[test]
fn only_the_first_failure_of_a_member_is_reported() {
    let plans = plans();
    let interpreter = PlanInterpreter::new(&plans);
    let args = [DynamicArgument::new(json!({"id": 1, "title": ""}))];

    let problem = interpreter.run_at("src/main.rs", 10, &args).unwrap().expect("rejected");
    let messages = &problem.errors["Todo.Title"];
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("required"), "{messages:?}");
}

#[test]
fn non_object_sequence_elements_are_a_type_mismatch() {
    let plans = plans();
    let interpreter = PlanInterpreter::new(&plans);
    let args = [DynamicArgument::new(json!([{"id": 1, "title": "A valid title"}, 5]))];

    let err = interpreter.run_at("src/main.rs", 11, &args).unwrap_err();
    assert!(matches!(
        err,
        ValidationFault::TypeMismatch { ref expected, ref found }
            if expected.contains("Todo[1]") && found == "number"
    ));
}

#[test]
fn valid_payload_passes() {
    let plans = plans();
    let interpreter = PlanInterpreter::new(&plans);
    let args = [DynamicArgument::new(json!({"Id": 3, "TITLE": "A valid title"}))];
    assert!(interpreter.run_at("src/main.rs", 10, &args).unwrap().is_none());
}

#[test]
fn nested_values_delegate_to_their_routines() {
    let plans = plans();
    let interpreter = PlanInterpreter::new(&plans);
    let args = [DynamicArgument::new(json!({
        "name": "",
        "todos": [{"id": 1, "title": "ok"}],
        "lead": null
    }))];

    let problem = interpreter.run_at("src/main.rs", 12, &args).unwrap().expect("rejected");
    let members: Vec<&str> = problem.errors.keys().map(String::as_str).collect();
    assert_eq!(members, vec!["Project.Name", "Todo[0].Title"]);
}

#[test]
fn runtime_subtype_is_a_type_mismatch() {
    let plans = plans();
    let interpreter = PlanInterpreter::new(&plans);

    let declared = [DynamicArgument::typed("TodoWithProject", json!({"id": 1, "title": "abc"}))];
    let err = interpreter.run_at("src/main.rs", 10, &declared).unwrap_err();
    assert!(matches!(err, ValidationFault::TypeMismatch { .. }));

    let discriminated = [DynamicArgument::new(json!({
        "name": "p",
        "lead": {"$type": "TodoWithProject", "id": 1, "title": "abc"}
    }))];
    let err = interpreter.run_at("src/main.rs", 12, &discriminated).unwrap_err();
    assert!(matches!(err, ValidationFault::TypeMismatch { ref found, .. } if found == "TodoWithProject"));
}

#[test]
fn unknown_locations_are_unanalyzable() {
    let plans = plans();
    let interpreter = PlanInterpreter::new(&plans);
    let err = interpreter.run_at("src/other.rs", 10, &[]).unwrap_err();
    assert!(matches!(err, ValidationFault::UnanalyzableCallSite { line: 10, .. }));
    assert!(interpreter.plan_at("app/src/main.rs", 11).is_some());
}
