use std::fs;

use fieldguard_core::{DiagnosticCode, TypeRef};
use fieldguard_introspect::source::{DeclarationIndex, find_call_sites, resolve_handler};
use fieldguard_introspect::{
    IntrospectError, IntrospectOptions, SourceIntrospector, SourceUnit, TypeIntrospector, TypeShape,
};

const MODELS: &str = r#"
#[derive(Deserialize)]
pub struct Audit {
    #[validate(required)]
    pub created_by: String,
}

#[derive(Deserialize)]
pub struct Todo {
    #[validate(required, range(1, i32::MAX))]
    pub id: i32,
    #[serde(flatten)]
    pub audit: Audit,
    pub tags: HashMap<String, String>,
}
"#;

const DUPLICATE: &str = "pub struct Todo { pub other: bool }";

#[test]
fn loads_types_from_files_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    fs::create_dir_all(src.join("api")).unwrap();
    fs::write(src.join("models.rs"), MODELS).unwrap();
    fs::write(src.join("api").join("legacy.rs"), DUPLICATE).unwrap();

    let models = src.join("models.rs");
    let legacy = src.join("api").join("legacy.rs");
    let introspector =
        SourceIntrospector::load(&[legacy.as_path(), models.as_path()], IntrospectOptions::default())
            .unwrap();

    // `api/legacy.rs` sorts first, so its `Todo` wins.
    let todo = introspector.describe(&TypeRef::named("Todo")).unwrap();
    assert_eq!(todo.path, "crate::api::legacy::Todo");
    assert_eq!(
        introspector.diagnostics().count(DiagnosticCode::DuplicateType),
        1
    );

    let audit = introspector.describe(&TypeRef::named("Audit")).unwrap();
    assert_eq!(audit.properties[0].name, "CreatedBy");
    assert_eq!(
        introspector.classify(&TypeRef::generic(
            "HashMap",
            vec![TypeRef::named("String"), TypeRef::named("String")]
        )),
        TypeShape::Unsupported
    );
    assert_ne!(
        introspector.reachable_fingerprint(&TypeRef::named("Todo")).unwrap(),
        introspector.reachable_fingerprint(&TypeRef::named("Audit")).unwrap()
    );
}

#[test]
fn parse_failures_name_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let broken = dir.path().join("broken.rs");
    fs::write(&broken, "pub struct {").unwrap();

    let err = SourceIntrospector::load(&[broken.as_path()], IntrospectOptions::default()).unwrap_err();
    match err {
        IntrospectError::Parse { path, .. } => assert!(path.ends_with("broken.rs")),
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn resolution_spans_units() {
    let handlers = SourceUnit::new(
        "src/handlers.rs",
        "pub fn create(Json(todo): Json<Todo>) {}",
    )
    .parse()
    .unwrap();
    let main = SourceUnit::new(
        "src/main.rs",
        "fn main() {\n    app.map_post(\"/todo\", handlers::create)\n        .with_validation();\n}\n",
    )
    .parse()
    .unwrap();
    let units = vec![handlers, main];
    let index = DeclarationIndex::build(&units);
    let options = IntrospectOptions::default();

    let candidates = find_call_sites(&units[1], &options);
    assert_eq!(candidates.len(), 1);
    // the marker method's line, as `#[track_caller]` reports it
    assert_eq!(candidates[0].location.line, 3);
    assert_eq!(candidates[0].route, "/todo");

    let resolved = resolve_handler(&candidates[0], &index, &options).unwrap();
    let parameter = &resolved.signature.parameters[0];
    assert_eq!(parameter.name, "todo");
    assert_eq!(parameter.ty, TypeRef::named("Todo"));
}
