use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::context::ValidationResult;

pub const PROBLEM_TYPE: &str = "https://tools.ietf.org/html/rfc9110#section-15.5.1";
pub const PROBLEM_TITLE: &str = "One or more validation errors occurred.";
pub const PROBLEM_STATUS: u16 = 400;

/// Problem-details body returned when validation rejects a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationProblem {
    #[serde(rename = "type")]
    pub problem_type: String,
    pub title: String,
    pub status: u16,
    /// Member path to messages. Only the first failure per member is kept.
    pub errors: BTreeMap<String, Vec<String>>,
}

impl ValidationProblem {
    pub fn new(errors: BTreeMap<String, Vec<String>>) -> Self {
        Self {
            problem_type: PROBLEM_TYPE.to_string(),
            title: PROBLEM_TITLE.to_string(),
            status: PROBLEM_STATUS,
            errors,
        }
    }

    /// Group failures by member path, keeping the first failure of each
    /// member. `None` when every check succeeded.
    pub fn from_results(results: &[ValidationResult]) -> Option<Self> {
        let mut errors: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for result in results {
            if let ValidationResult::Failure { member, message } = result {
                errors
                    .entry(member.clone())
                    .or_insert_with(|| vec![message.clone()]);
            }
        }
        if errors.is_empty() {
            None
        } else {
            Some(Self::new(errors))
        }
    }
}
