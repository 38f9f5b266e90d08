use thiserror::Error;

/// Core error type shared across fieldguard crates.
#[derive(Debug, Error)]
pub enum Error {
    /// An annotation does not match the declared rule parameters.
    #[error("invalid annotation: {0}")]
    InvalidAnnotation(String),
    /// A rule kind was registered twice with different definitions.
    #[error("duplicate rule kind: {0}")]
    DuplicateRule(String),
    /// Canonical serialization failed while fingerprinting.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience alias for results returned by fieldguard crates.
pub type Result<T> = std::result::Result<T, Error>;
