use fieldguard_core::{
    DiagnosticCode, Multiplicity, ParamKind, RuleCatalog, RuleDescriptor, SourceLocation,
};
use fieldguard_generate::{
    FILTERS_FILE, GeneratedFile, INSTANCES_FILE, Pipeline, PipelineOutput, ROUTINES_FILE,
};
use fieldguard_introspect::{IntrospectOptions, SourceUnit};
use fieldguard_plan::ParameterStep;

const MODELS: &str = r#"
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    #[validate(required, range(1, i32::MAX))]
    pub id: i32,
    #[validate(required, min_length(3))]
    pub title: String,
    pub is_completed: bool,
}

#[derive(Deserialize)]
pub struct Project {
    #[validate(required)]
    pub name: String,
    pub todos: Vec<Todo>,
    pub lead: Option<Box<Todo>>,
}
"#;

const MAIN: &str = r#"
mod models;
use models::{Project, Todo};

fn create(Json(todo): Json<Todo>) {}

fn main() {
    let mut app = App::new();
    app.map_post("/todo", create).with_validation();
    app.map_post("/todos", |Json(todos): Json<Vec<Todo>>| todos.len()).with_validation();
    app.map_get("/todo/{id}", |#[validate(range(1, 10))] id: i32| id).with_validation();
    app.map_post("/project", |Json(project): Json<Project>| project.name).with_validation();
    app.map_get("/dynamic", make_handler()).with_validation();
}
"#;

fn units(main: &str, models: &str) -> Vec<SourceUnit> {
    vec![
        SourceUnit::new("src/main.rs", main),
        SourceUnit::new("src/models.rs", models),
    ]
}

fn pipeline() -> Pipeline {
    Pipeline::new(
        IntrospectOptions::default(),
        RuleCatalog::builtin(),
        "::fieldguard_runtime",
    )
}

fn file<'a>(output: &'a PipelineOutput, name: &str) -> &'a GeneratedFile {
    output
        .files
        .iter()
        .find(|file| file.name == name)
        .expect("artifact emitted")
}

/// Whitespace-free text with the trailing commas of wrapped lists removed.
fn compact(output: &PipelineOutput, name: &str) -> String {
    let text: String = file(output, name).contents.split_whitespace().collect();
    text.replace(",)", ")").replace(",>", ">").replace(",]", "]")
}

fn key_at(output: &PipelineOutput, line: u32) -> String {
    output
        .plans
        .plan_at(&SourceLocation::new("src/main.rs", line))
        .expect("plan at line")
        .key
        .as_str()
        .to_string()
}

#[test]
fn synthesizes_plans_for_resolved_call_sites() {
    let output = pipeline().run(&units(MAIN, MODELS)).unwrap();
    let plans = &output.plans;

    assert_eq!(plans.plans.len(), 4);
    assert_eq!(output.stats.call_sites, 5);
    assert_eq!(plans.diagnostics.count(DiagnosticCode::UnresolvedHandler), 1);

    let names: Vec<&str> = plans.routines.iter().map(|r| r.type_name.as_str()).collect();
    assert_eq!(names, vec!["Project", "Todo"]);
    let instances: Vec<&str> = plans.instances.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(
        instances,
        vec![
            "PROJECT_NAME_REQUIRED",
            "TODO_ID_RANGE",
            "TODO_ID_REQUIRED",
            "TODO_TITLE_MIN_LENGTH",
            "TODO_TITLE_REQUIRED",
        ]
    );

    let list = plans
        .plan_at(&SourceLocation::new("src/main.rs", 10))
        .unwrap();
    match &list.steps[0] {
        ParameterStep::Delegate {
            target,
            multiplicity,
            ..
        } => {
            assert_eq!(target, "Todo");
            assert_eq!(*multiplicity, Multiplicity::Sequence);
        }
        other => panic!("unexpected step {other:?}"),
    }
    let by_id = plans
        .plan_at(&SourceLocation::new("src/main.rs", 11))
        .unwrap();
    assert!(matches!(&by_id.steps[0], ParameterStep::Check { name, .. } if name == "id"));
}

#[test]
fn generated_sources_parse_as_rust() {
    let output = pipeline().run(&units(MAIN, MODELS)).unwrap();
    assert_eq!(output.files.len(), 3);
    for generated in &output.files {
        assert!(generated.contents.starts_with("// @generated by fieldguard"));
        assert!(generated.contents.lines().count() > 3);
        syn::parse_file(&generated.contents)
            .unwrap_or_else(|err| panic!("{} does not parse: {err}", generated.name));
    }
}

#[test]
fn emitted_code_follows_the_plans() {
    let output = pipeline().run(&units(MAIN, MODELS)).unwrap();

    let instances = compact(&output, INSTANCES_FILE);
    assert!(instances.contains(
        "pubstaticTODO_ID_RANGE:::std::sync::LazyLock<::std::boxed::Box<dyn::fieldguard_runtime::ValidationRule>>"
    ));
    assert!(instances.contains("::fieldguard_runtime::rules::Range::new(1i64,2147483647i64)"));
    assert!(instances.contains("::fieldguard_runtime::rules::MinLength::new(3)"));

    let routines = compact(&output, ROUTINES_FILE);
    assert!(routines.contains("impl::fieldguard_runtime::AsFieldValueforcrate::models::Todo"));
    assert!(routines.contains("::fieldguard_runtime::downcast::<crate::models::Todo>(value)?"));
    assert!(routines.contains(
        "::fieldguard_runtime::check(&**TODO_ID_RANGE,&value.id,&::std::format!(\"{}.Id\",path),results)?;"
    ));
    assert!(routines.contains("validate_todo_seq(&value.todos,results)?;"));
    assert!(routines.contains("check_todo(&**(item),\"Todo\",results)?;"));

    let filters = compact(&output, FILTERS_FILE);
    let single = key_at(&output, 9);
    assert!(filters.contains(&format!(".location(\"src/main.rs\",9u32,\"{single}\")")));
    assert!(filters.contains(&format!(".plan(\"{single}\",plan_{single})")));
    assert!(filters.contains("validate_todo(context.argument(0usize)?,results)?;"));
    assert!(filters.contains("context.get::<Vec<crate::models::Todo>>(0usize)?"));
    assert!(filters.contains(
        "::fieldguard_runtime::check(&::fieldguard_runtime::rules::Range::new(1i64,10i64),value,\"id\",results)?;"
    ));
    assert!(filters.contains("#[track_caller]"));
}

#[test]
fn nested_routine_has_one_statement_per_step() {
    let output = pipeline().run(&units(MAIN, MODELS)).unwrap();
    let parsed = syn::parse_file(&file(&output, ROUTINES_FILE).contents).unwrap();
    let check_project = parsed
        .items
        .iter()
        .find_map(|item| match item {
            syn::Item::Fn(function) if function.sig.ident == "check_project" => Some(function),
            _ => None,
        })
        .expect("check_project emitted");
    // name check, todos sequence, optional lead, trailing Ok(())
    assert_eq!(check_project.block.stmts.len(), 4);
}

#[test]
fn unchanged_input_is_fully_reused() {
    let mut pipeline = pipeline();
    let first = pipeline.run(&units(MAIN, MODELS)).unwrap();
    assert_eq!(first.stats.sites_resolved, 5);
    assert!(first.stats.routines_rebuilt);
    assert!(first.stats.emitted);

    let second = pipeline.run(&units(MAIN, MODELS)).unwrap();
    assert!(second.stats.fully_reused());
    assert_eq!(second.stats.sites_reused, 5);
    assert_eq!(second.files, first.files);
}

#[test]
fn handler_body_edits_keep_every_stage() {
    let mut pipeline = pipeline();
    let first = pipeline.run(&units(MAIN, MODELS)).unwrap();

    let edited = MAIN.replace(
        "fn create(Json(todo): Json<Todo>) {}",
        "fn create(Json(todo): Json<Todo>) { drop(todo); }",
    );
    let second = pipeline.run(&units(&edited, MODELS)).unwrap();
    assert!(second.stats.fully_reused());
    assert_eq!(second.files, first.files);
}

#[test]
fn model_edits_reextract_types_but_reuse_call_sites() {
    let mut pipeline = pipeline();
    pipeline.run(&units(MAIN, MODELS)).unwrap();

    let edited = MODELS.replace("min_length(3)", "min_length(5)");
    let output = pipeline.run(&units(MAIN, &edited)).unwrap();
    assert_eq!(output.stats.sites_resolved, 0);
    assert_eq!(output.stats.sites_reused, 5);
    assert!(output.stats.types_extracted > 0);
    assert!(output.stats.routines_rebuilt);
    assert!(output.stats.emitted);
    assert!(compact(&output, INSTANCES_FILE).contains("MinLength::new(5)"));
}

#[test]
fn editing_one_registration_resolves_only_that_site() {
    let mut pipeline = pipeline();
    let first = pipeline.run(&units(MAIN, MODELS)).unwrap();

    let edited = MAIN.replace("todos.len()", "todos.is_empty()");
    let second = pipeline.run(&units(&edited, MODELS)).unwrap();
    assert_eq!(second.stats.sites_resolved, 1);
    assert_eq!(second.stats.sites_reused, 4);
    assert_eq!(second.stats.types_extracted, 0);
    assert_eq!(second.files, first.files);
}

#[test]
fn unrelated_types_keep_extracted_graphs() {
    let mut pipeline = pipeline();
    let first = pipeline.run(&units(MAIN, MODELS)).unwrap();
    assert!(first.stats.types_extracted > 0);

    let extended = format!(
        "{MODELS}\n#[derive(Deserialize)]\npub struct Unused {{\n    #[validate(required)]\n    pub x: String,\n}}\n"
    );
    let second = pipeline.run(&units(MAIN, &extended)).unwrap();
    assert_eq!(second.stats.sites_resolved, 0);
    assert_eq!(second.stats.types_extracted, 0);
    assert_eq!(second.stats.types_reused, first.stats.types_extracted);
    assert!(!second.stats.routines_rebuilt);
}

#[test]
fn instance_and_routine_tables_ignore_call_site_order() {
    let reordered = MAIN.replace(
        "    app.map_post(\"/todo\", create).with_validation();\n",
        "",
    ) + "fn later() { app.map_post(\"/todo\", create).with_validation(); }\n";

    let first = pipeline().run(&units(MAIN, MODELS)).unwrap();
    let second = pipeline().run(&units(&reordered, MODELS)).unwrap();
    assert_eq!(file(&first, INSTANCES_FILE), file(&second, INSTANCES_FILE));
    assert_eq!(file(&first, ROUTINES_FILE), file(&second, ROUTINES_FILE));

    let again = pipeline().run(&units(MAIN, MODELS)).unwrap();
    assert_eq!(first.files, again.files);
}

#[test]
fn broken_units_are_reported_and_skipped() {
    let mut sources = units(MAIN, MODELS);
    sources.push(SourceUnit::new("src/broken.rs", "fn broken( {"));
    let output = pipeline().run(&sources).unwrap();
    assert_eq!(output.stats.units_failed, 1);
    assert_eq!(output.plans.diagnostics.count(DiagnosticCode::ParseError), 1);
    assert_eq!(output.plans.plans.len(), 4);
}

#[test]
fn custom_rules_are_constructed_by_path() {
    let mut catalog = RuleCatalog::builtin();
    catalog
        .register(RuleDescriptor {
            kind: "slug".to_string(),
            rule_type: "crate::rules::Slug".to_string(),
            params: vec![ParamKind::Str],
            builtin: false,
        })
        .unwrap();
    let models = MODELS.replace(
        "#[validate(required)]\n    pub name: String,",
        "#[validate(required, slug(\"-\"))]\n    pub name: String,",
    );
    let mut pipeline = Pipeline::new(IntrospectOptions::default(), catalog, "fieldguard_runtime");
    let output = pipeline.run(&units(MAIN, &models)).unwrap();

    let instances = compact(&output, INSTANCES_FILE);
    assert!(instances.contains("pubstaticPROJECT_NAME_SLUG"));
    assert!(instances.contains("crate::rules::Slug::new(\"-\")"));
    assert!(instances.contains("fieldguard_runtime::rules::Required::new()"));
}
