use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    #[cfg_attr(fieldguard, validate(required, range(1, i32::MAX)))]
    pub id: i32,
    #[cfg_attr(fieldguard, validate(required, min_length(3)))]
    pub title: String,
    pub is_completed: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Audit {
    #[cfg_attr(fieldguard, validate(required))]
    pub created_by: String,
}

/// Carries the audit members as its own.
#[derive(Debug, Clone, Deserialize)]
pub struct Note {
    #[cfg_attr(fieldguard, validate(required))]
    pub body: String,
    #[serde(flatten)]
    pub audit: Audit,
}
