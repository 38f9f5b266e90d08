use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use fieldguard_core::{
    CallSiteKey, DiagnosticReport, Literal, Multiplicity, SourceLocation, TypeRef,
    ValidatableType, ValidationAnnotation,
};

/// Canonical, deduplicated rule instance shared by every routine that
/// checks the same (type, property, kind, ordinal).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ValidatorInstance {
    /// Constant name in the generated instance table (`TODO_ID_RANGE`).
    pub name: String,
    pub type_name: String,
    pub property: String,
    pub kind: String,
    /// 1-based position among rules of the same kind on the property.
    pub ordinal: usize,
    pub rule_type: String,
    #[serde(default)]
    pub builtin: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Literal>,
}

/// One step of a type routine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum RoutineStep {
    /// Run an instance against the property value.
    Check {
        property: String,
        wire_name: String,
        accessor: Vec<String>,
        ty: TypeRef,
        instance: String,
    },
    /// Hand the property value to another type's routine.
    Delegate {
        property: String,
        wire_name: String,
        accessor: Vec<String>,
        /// Declared member type, wrappers included.
        ty: TypeRef,
        target: String,
        multiplicity: Multiplicity,
        optional: bool,
    },
}

/// Validation routine for one element type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TypeRoutine {
    /// Short type name used in member paths (`Todo`).
    pub type_name: String,
    /// Path naming the type in generated code.
    pub type_path: String,
    /// Function name stem (`validate_todo`).
    pub function: String,
    #[serde(default)]
    pub recursive: bool,
    pub steps: Vec<RoutineStep>,
}

/// How one handler parameter is validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ParameterStep {
    /// Rules written directly on the parameter, checked with the
    /// parameter name as member path.
    Check {
        index: usize,
        name: String,
        ty: TypeRef,
        rules: Vec<ValidationAnnotation>,
    },
    /// The parameter is a validatable type (or a collection of one).
    Delegate {
        index: usize,
        name: String,
        ty: TypeRef,
        target: String,
        multiplicity: Multiplicity,
        optional: bool,
    },
}

impl ParameterStep {
    pub fn index(&self) -> usize {
        match self {
            ParameterStep::Check { index, .. } | ParameterStep::Delegate { index, .. } => *index,
        }
    }
}

/// A registration that maps onto a plan.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub struct PlanSite {
    pub location: SourceLocation,
    pub method: String,
    pub route: String,
}

/// Validation plan shared by every call site with the same handler signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CallSitePlan {
    pub key: CallSiteKey,
    /// Sorted by location.
    pub sites: Vec<PlanSite>,
    pub steps: Vec<ParameterStep>,
}

impl CallSitePlan {
    pub fn locations(&self) -> impl Iterator<Item = &SourceLocation> {
        self.sites.iter().map(|site| &site.location)
    }
}

/// Complete synthesis output; serialized as the plan manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SynthesizedPlans {
    pub version: String,
    /// Merged validatable types, sorted by name.
    pub types: Vec<ValidatableType>,
    /// Sorted by (type, property, kind, ordinal).
    pub instances: Vec<ValidatorInstance>,
    /// Sorted by type name.
    pub routines: Vec<TypeRoutine>,
    /// Sorted by key.
    pub plans: Vec<CallSitePlan>,
    #[serde(default)]
    pub diagnostics: DiagnosticReport,
}

impl SynthesizedPlans {
    pub fn routine(&self, type_name: &str) -> Option<&TypeRoutine> {
        self.routines
            .iter()
            .find(|routine| routine.type_name == type_name)
    }

    pub fn instance(&self, name: &str) -> Option<&ValidatorInstance> {
        self.instances.iter().find(|instance| instance.name == name)
    }

    pub fn plan(&self, key: &CallSiteKey) -> Option<&CallSitePlan> {
        self.plans.iter().find(|plan| &plan.key == key)
    }

    /// Plan registered at a source location.
    pub fn plan_at(&self, location: &SourceLocation) -> Option<&CallSitePlan> {
        self.plans
            .iter()
            .find(|plan| plan.locations().any(|candidate| candidate == location))
    }
}
