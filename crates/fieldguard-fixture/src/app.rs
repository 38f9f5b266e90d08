use fieldguard_runtime::{EndpointFilter, FilterHost, ValidationFault};

use crate::models::{Note, Todo};
use crate::validation::WithValidation;

/// Request body extractor.
pub struct Json<T>(pub T);

/// A registered route and the filters attached to it.
#[derive(Debug)]
pub struct Endpoint {
    pub method: &'static str,
    pub route: String,
    pub filters: Vec<EndpointFilter>,
}

impl FilterHost for Endpoint {
    fn add_endpoint_filter(&mut self, filter: EndpointFilter) {
        self.filters.push(filter);
    }
}

#[derive(Debug, Default)]
pub struct App;

impl App {
    pub fn map_get<H>(&self, route: &str, _handler: H) -> Endpoint {
        Self::endpoint("GET", route)
    }

    pub fn map_post<H>(&self, route: &str, _handler: H) -> Endpoint {
        Self::endpoint("POST", route)
    }

    fn endpoint(method: &'static str, route: &str) -> Endpoint {
        Endpoint {
            method,
            route: route.to_string(),
            filters: Vec::new(),
        }
    }
}

fn create(Json(todo): Json<Todo>) -> i32 {
    todo.id
}

/// Register every route of the program with its validation filter.
pub fn endpoints() -> Result<Vec<Endpoint>, ValidationFault> {
    // Registrations stay outside macros so the generator can see them.
    let app = App;
    let mut endpoints = Vec::new();
    endpoints.push(app.map_post("/todo", create).with_validation()?);
    endpoints.push(app.map_post("/todos", |Json(todos): Json<Vec<Todo>>| todos.len()).with_validation()?);
    endpoints.push(app.map_get("/todo/{id}", |#[cfg_attr(fieldguard, validate(range(1, 10)))] id: i32| id).with_validation()?);
    endpoints.push(app.map_post("/note", |Json(note): Json<Note>| note.body).with_validation()?);
    Ok(endpoints)
}

/// The endpoint registered for `route`.
pub fn endpoint(route: &str) -> Result<Endpoint, ValidationFault> {
    endpoints()?
        .into_iter()
        .find(|endpoint| endpoint.route == route)
        .ok_or_else(|| ValidationFault::UnanalyzableCallSite {
            file: "src/app.rs".to_string(),
            line: 0,
        })
}
