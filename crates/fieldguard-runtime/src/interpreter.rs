//! Executes a plan manifest against JSON arguments without generated code.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use fieldguard_core::{Multiplicity, RuleCatalog};
use fieldguard_plan::{CallSitePlan, ParameterStep, RoutineStep, SynthesizedPlans};

use crate::context::{ValidationContext, ValidationResult};
use crate::errors::{RuleError, ValidationFault};
use crate::problem::ValidationProblem;
use crate::rules::{self, ValidationRule};
use crate::table::same_file;
use crate::value::FieldValue;

/// Key of the runtime type discriminator on nested objects.
pub const TYPE_DISCRIMINATOR: &str = "$type";

/// One handler argument: its JSON value and, optionally, the name of its
/// runtime type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicArgument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_type: Option<String>,
    pub value: Value,
}

impl DynamicArgument {
    pub fn new(value: Value) -> Self {
        Self {
            runtime_type: None,
            value,
        }
    }

    pub fn typed(runtime_type: impl Into<String>, value: Value) -> Self {
        Self {
            runtime_type: Some(runtime_type.into()),
            value,
        }
    }

    /// `"$type"` on the value wins over the declared runtime type.
    pub fn effective_type(&self) -> Option<&str> {
        discriminator(&self.value).or(self.runtime_type.as_deref())
    }
}

fn discriminator(value: &Value) -> Option<&str> {
    value.get(TYPE_DISCRIMINATOR).and_then(Value::as_str)
}

fn short_name(name: &str) -> &str {
    name.rsplit("::").next().unwrap_or(name)
}

type BuiltRule = Result<Box<dyn ValidationRule>, RuleError>;

/// Interprets synthesized plans with the builtin rule library.
pub struct PlanInterpreter<'a> {
    plans: &'a SynthesizedPlans,
    catalog: RuleCatalog,
    instances: BTreeMap<&'a str, BuiltRule>,
}

impl<'a> PlanInterpreter<'a> {
    pub fn new(plans: &'a SynthesizedPlans) -> Self {
        Self::with_catalog(plans, RuleCatalog::builtin())
    }

    pub fn with_catalog(plans: &'a SynthesizedPlans, catalog: RuleCatalog) -> Self {
        let instances = plans
            .instances
            .iter()
            .map(|instance| {
                (
                    instance.name.as_str(),
                    rules::build(&instance.rule_type, &instance.args),
                )
            })
            .collect();
        Self {
            plans,
            catalog,
            instances,
        }
    }

    /// Plan registered for a location, matching paths like [`crate::PlanTable`].
    pub fn plan_at(&self, file: &str, line: u32) -> Option<&'a CallSitePlan> {
        let file = file.replace('\\', "/");
        let plans = self.plans;
        if let Some(plan) = plans
            .plans
            .iter()
            .find(|plan| plan.locations().any(|loc| loc.line == line && loc.file == file))
        {
            return Some(plan);
        }
        let mut matches = plans.plans.iter().filter(|plan| {
            plan.locations()
                .any(|loc| loc.line == line && same_file(&loc.file, &file))
        });
        match (matches.next(), matches.next()) {
            (Some(plan), None) => Some(plan),
            _ => None,
        }
    }

    /// Evaluate the plan at `file:line` and aggregate failures.
    pub fn run_at(
        &self,
        file: &str,
        line: u32,
        arguments: &[DynamicArgument],
    ) -> Result<Option<ValidationProblem>, ValidationFault> {
        let plan = self
            .plan_at(file, line)
            .ok_or_else(|| ValidationFault::UnanalyzableCallSite {
                file: file.to_string(),
                line,
            })?;
        let results = self.evaluate(plan, arguments)?;
        debug!(
            event = "runtime.interpreter.evaluated",
            key = %plan.key,
            checks = results.len()
        );
        Ok(ValidationProblem::from_results(&results))
    }

    pub fn evaluate(
        &self,
        plan: &CallSitePlan,
        arguments: &[DynamicArgument],
    ) -> Result<Vec<ValidationResult>, ValidationFault> {
        let mut results = Vec::new();
        for step in &plan.steps {
            let argument = arguments
                .get(step.index())
                .ok_or(ValidationFault::MissingArgument(step.index()))?;
            match step {
                ParameterStep::Check {
                    name,
                    rules: annotations,
                    ..
                } => {
                    let value = FieldValue::from_json(&argument.value);
                    for annotation in annotations {
                        let rule = self
                            .catalog
                            .lookup(&annotation.kind)
                            .ok_or_else(|| RuleError::UnknownRule(annotation.kind.clone()))
                            .and_then(|rule| rules::build(&rule.rule_type, &annotation.args))
                            .map_err(|source| ValidationFault::Rule {
                                member: name.clone(),
                                source,
                            })?;
                        results.push(run_rule(rule.as_ref(), &value, name)?);
                    }
                }
                ParameterStep::Delegate {
                    target,
                    multiplicity,
                    optional,
                    ..
                } => {
                    if argument.value.is_null() && *optional {
                        continue;
                    }
                    match multiplicity {
                        Multiplicity::Single => self.validate_value(
                            target,
                            &argument.value,
                            argument.effective_type(),
                            &mut results,
                        )?,
                        Multiplicity::Sequence => {
                            self.validate_sequence(target, &argument.value, &mut results)?
                        }
                    }
                }
            }
        }
        Ok(results)
    }

    /// Single-value routine: the runtime type must be exactly `type_name`.
    pub fn validate_value(
        &self,
        type_name: &str,
        value: &Value,
        runtime_type: Option<&str>,
        results: &mut Vec<ValidationResult>,
    ) -> Result<(), ValidationFault> {
        if let Some(runtime_type) = runtime_type {
            if short_name(runtime_type) != type_name {
                return Err(ValidationFault::mismatch(type_name, runtime_type));
            }
        }
        let object = value
            .as_object()
            .ok_or_else(|| ValidationFault::mismatch(type_name, json_kind(value)))?;
        self.run_routine(type_name, object, type_name, results)
    }

    /// Sequence routine: members are `Type[index].Property`, no exact type
    /// check on the elements. An element that is not an object is a fault.
    pub fn validate_sequence(
        &self,
        type_name: &str,
        values: &Value,
        results: &mut Vec<ValidationResult>,
    ) -> Result<(), ValidationFault> {
        let items = values
            .as_array()
            .ok_or_else(|| ValidationFault::mismatch(format!("sequence of {type_name}"), json_kind(values)))?;
        for (index, item) in items.iter().enumerate() {
            let object = item.as_object().ok_or_else(|| {
                ValidationFault::mismatch(format!("{type_name} at {type_name}[{index}]"), json_kind(item))
            })?;
            self.run_routine(type_name, object, &format!("{type_name}[{index}]"), results)?;
        }
        Ok(())
    }

    fn run_routine(
        &self,
        type_name: &str,
        object: &Map<String, Value>,
        prefix: &str,
        results: &mut Vec<ValidationResult>,
    ) -> Result<(), ValidationFault> {
        let routine = self
            .plans
            .routine(type_name)
            .ok_or_else(|| ValidationFault::UnknownType(type_name.to_string()))?;
        for step in &routine.steps {
            match step {
                RoutineStep::Check {
                    property,
                    wire_name,
                    instance,
                    ..
                } => {
                    let member = format!("{prefix}.{property}");
                    let rule = match self.instances.get(instance.as_str()) {
                        Some(Ok(rule)) => rule,
                        Some(Err(source)) => {
                            return Err(ValidationFault::Rule {
                                member,
                                source: source.clone(),
                            });
                        }
                        None => {
                            return Err(ValidationFault::Rule {
                                member,
                                source: RuleError::UnknownRule(instance.clone()),
                            });
                        }
                    };
                    let value = member_value(object, wire_name);
                    results.push(run_rule(rule.as_ref(), &FieldValue::from_json(value), &member)?);
                }
                RoutineStep::Delegate {
                    wire_name,
                    target,
                    multiplicity,
                    ..
                } => {
                    let value = member_value(object, wire_name);
                    if value.is_null() {
                        continue;
                    }
                    match multiplicity {
                        Multiplicity::Single => {
                            self.validate_value(target, value, discriminator(value), results)?
                        }
                        Multiplicity::Sequence => self.validate_sequence(target, value, results)?,
                    }
                }
            }
        }
        Ok(())
    }
}

fn run_rule(
    rule: &dyn ValidationRule,
    value: &FieldValue<'_>,
    member: &str,
) -> Result<ValidationResult, ValidationFault> {
    rule.validate(value, &ValidationContext::new(member))
        .map_err(|source| ValidationFault::Rule {
            member: member.to_string(),
            source,
        })
}

static NULL: Value = Value::Null;

/// Member lookup by wire name, falling back to a case-insensitive match.
fn member_value<'v>(object: &'v Map<String, Value>, wire_name: &str) -> &'v Value {
    object
        .get(wire_name)
        .or_else(|| {
            object
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(wire_name))
                .map(|(_, value)| value)
        })
        .unwrap_or(&NULL)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
