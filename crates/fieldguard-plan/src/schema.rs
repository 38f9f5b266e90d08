use schemars::schema::RootSchema;
use schemars::schema_for;

use crate::model::SynthesizedPlans;

/// Emit the JSON Schema for `fieldguard-plans.json`.
pub fn plans_json_schema() -> RootSchema {
    schema_for!(SynthesizedPlans)
}
