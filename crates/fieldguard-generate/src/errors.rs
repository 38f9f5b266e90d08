use thiserror::Error;

use crate::model::GenerationReport;

/// Errors emitted by the generation engine.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("invalid plan: {0}")]
    InvalidPlan(String),
    #[error("cannot emit `{text}` as {what}: {message}")]
    Syntax {
        what: &'static str,
        text: String,
        message: String,
    },
    #[error("generated output is out of date: {}", .0.join(", "))]
    Stale(Vec<String>),
    #[error(transparent)]
    Core(#[from] fieldguard_core::Error),
    #[error(transparent)]
    Introspect(#[from] fieldguard_introspect::IntrospectError),
    #[error(transparent)]
    Plan(#[from] fieldguard_plan::PlanError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("generation failed with {} warning(s) in strict mode", .0.diagnostics.warnings.len())]
    Failed(Box<GenerationReport>),
}

impl GenerationError {
    pub(crate) fn syntax(what: &'static str, text: &str, err: syn::Error) -> Self {
        GenerationError::Syntax {
            what,
            text: text.to_string(),
            message: err.to_string(),
        }
    }
}

/// Result type for generation operations.
pub type Result<T> = std::result::Result<T, GenerationError>;
