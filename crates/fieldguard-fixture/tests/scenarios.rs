use fieldguard_fixture::app::{endpoint, endpoints};
use fieldguard_fixture::models::{Audit, Note, Todo};
use fieldguard_fixture::validation::PLANS;
use fieldguard_runtime::{EndpointFilter, FilterOutcome, InvocationContext, ValidationFault};

fn todo(id: i32, title: &str) -> Todo {
    Todo {
        id,
        title: title.to_string(),
        is_completed: false,
    }
}

fn filter(route: &str) -> EndpointFilter {
    let endpoint = endpoint(route).expect("route registered");
    assert_eq!(endpoint.filters.len(), 1);
    endpoint.filters[0].clone()
}

async fn handler(context: InvocationContext) -> usize {
    context.len()
}

#[test]
fn every_registration_finds_its_plan() {
    let endpoints = endpoints().unwrap();
    assert_eq!(endpoints.len(), 4);
    assert!(endpoints.iter().all(|endpoint| endpoint.filters.len() == 1));
    assert!(PLANS.lookup("src/app.rs", 1).is_none());
}

#[tokio::test]
async fn single_value_reports_the_failing_member() {
    let context = InvocationContext::new().with_argument(todo(0, "A valid title"));
    let outcome = filter("/todo").run(context, &handler).await.unwrap();
    let FilterOutcome::Rejected(problem) = outcome else {
        panic!("expected rejection");
    };
    assert_eq!(problem.errors.len(), 1);
    assert_eq!(
        problem.errors["Todo.Id"],
        vec!["The field Todo.Id must be between 1 and 2147483647."]
    );
}

#[tokio::test]
async fn sequence_members_carry_the_element_index() {
    let context =
        InvocationContext::new().with_argument(vec![todo(1, "A valid title"), todo(0, "A valid title")]);
    let outcome = filter("/todos").run(context, &handler).await.unwrap();
    let FilterOutcome::Rejected(problem) = outcome else {
        panic!("expected rejection");
    };
    let members: Vec<&str> = problem.errors.keys().map(String::as_str).collect();
    assert_eq!(members, vec!["Todo[1].Id"]);
}

#[tokio::test]
async fn valid_payload_reaches_the_handler() {
    let context = InvocationContext::new().with_argument(todo(7, "A valid title"));
    let outcome = filter("/todo").run(context, &handler).await.unwrap();
    assert_eq!(outcome, FilterOutcome::Forwarded(1));
}

#[tokio::test]
async fn flattened_members_are_checked_as_own_members() {
    let note = Note {
        body: "hello".to_string(),
        audit: Audit {
            created_by: String::new(),
        },
    };
    let context = InvocationContext::new().with_argument(note);
    let outcome = filter("/note").run(context, &handler).await.unwrap();
    let FilterOutcome::Rejected(problem) = outcome else {
        panic!("expected rejection");
    };
    let members: Vec<&str> = problem.errors.keys().map(String::as_str).collect();
    assert_eq!(members, vec!["Note.CreatedBy"]);
}

#[tokio::test]
async fn first_failure_of_a_member_wins() {
    let context = InvocationContext::new().with_argument(todo(1, ""));
    let outcome = filter("/todo").run(context, &handler).await.unwrap();
    let FilterOutcome::Rejected(problem) = outcome else {
        panic!("expected rejection");
    };
    assert_eq!(
        problem.errors["Todo.Title"],
        vec!["The Todo.Title field is required."]
    );
}

#[tokio::test]
async fn direct_parameter_rules_use_the_parameter_name() {
    let context = InvocationContext::new().with_argument(42_i32);
    let outcome = filter("/todo/{id}").run(context, &handler).await.unwrap();
    let FilterOutcome::Rejected(problem) = outcome else {
        panic!("expected rejection");
    };
    assert_eq!(problem.errors["id"], vec!["The field id must be between 1 and 10."]);
}

#[tokio::test]
async fn other_argument_types_are_a_fault() {
    let context = InvocationContext::new().with_argument("not a todo".to_string());
    let err = filter("/todo").run(context, &handler).await.unwrap_err();
    assert!(matches!(err, ValidationFault::TypeMismatch { .. }));
}
