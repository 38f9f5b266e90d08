//! Type-graph extraction and validation plan synthesis.
//!
//! [`extract`] turns one handler parameter type into the set of validatable
//! types reachable from it, applying the cycle policy. [`synthesize`] merges
//! those graphs, assigns canonical validator instances and builds one plan
//! per distinct handler signature.

pub mod errors;
pub mod extract;
pub mod model;
pub mod schema;
pub mod synthesize;

pub use errors::{PlanError, Result};
pub use extract::{Peeled, TypeGraph, extract, peel};
pub use model::{
    CallSitePlan, ParameterStep, PlanSite, RoutineStep, SynthesizedPlans, TypeRoutine,
    ValidatorInstance,
};
pub use schema::plans_json_schema;
pub use synthesize::{
    build_instances, build_routines, merge_plans, merge_types, plan_call_site, qualify,
    routine_function, synthesize,
};

/// Parse a plan manifest and check its contract version.
pub fn parse_manifest(text: &str) -> Result<SynthesizedPlans> {
    let plans: SynthesizedPlans = serde_json::from_str(text)?;
    if plans.version != fieldguard_core::MANIFEST_VERSION {
        return Err(PlanError::Manifest(format!(
            "unsupported manifest version `{}` (expected {})",
            plans.version,
            fieldguard_core::MANIFEST_VERSION
        )));
    }
    Ok(plans)
}
