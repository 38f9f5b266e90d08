use thiserror::Error;

/// Introspection errors that abort loading metadata or sources.
#[derive(Debug, Error)]
pub enum IntrospectError {
    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },
    #[error("invalid metadata: {0}")]
    Metadata(String),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Core(#[from] fieldguard_core::Error),
}

/// Result type for introspection operations.
pub type Result<T> = std::result::Result<T, IntrospectError>;
