use thiserror::Error;

/// Plan synthesis errors that are not analysis diagnostics.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error(transparent)]
    Core(#[from] fieldguard_core::Error),
    #[error(transparent)]
    Introspect(#[from] fieldguard_introspect::IntrospectError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("manifest error: {0}")]
    Manifest(String),
}

/// Result type for plan operations.
pub type Result<T> = std::result::Result<T, PlanError>;
