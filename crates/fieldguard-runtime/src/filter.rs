//! Endpoint filter contract: plan evaluation before the wrapped handler.

use std::any::{Any, type_name};
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, trace};

use crate::context::ValidationResult;
use crate::errors::ValidationFault;
use crate::problem::ValidationProblem;
use crate::table::PlanTable;

/// Bound handler arguments of one invocation, in parameter order.
#[derive(Default)]
pub struct InvocationContext {
    arguments: Vec<Box<dyn Any + Send + Sync>>,
}

impl InvocationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_argument(mut self, value: impl Any + Send + Sync) -> Self {
        self.arguments.push(Box::new(value));
        self
    }

    pub fn push(&mut self, value: Box<dyn Any + Send + Sync>) {
        self.arguments.push(value);
    }

    pub fn len(&self) -> usize {
        self.arguments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty()
    }

    pub fn argument(&self, index: usize) -> Result<&dyn Any, ValidationFault> {
        self.arguments
            .get(index)
            .map(|value| value.as_ref() as &dyn Any)
            .ok_or(ValidationFault::MissingArgument(index))
    }

    /// Argument `index` as its declared type.
    pub fn get<T: Any>(&self, index: usize) -> Result<&T, ValidationFault> {
        downcast(self.argument(index)?)
    }

    pub fn into_arguments(self) -> Vec<Box<dyn Any + Send + Sync>> {
        self.arguments
    }
}

impl std::fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationContext")
            .field("arguments", &self.arguments.len())
            .finish()
    }
}

/// Exact type check: the value must be a `T`, not something convertible.
pub fn downcast<T: Any>(value: &dyn Any) -> Result<&T, ValidationFault> {
    value
        .downcast_ref::<T>()
        .ok_or_else(|| ValidationFault::mismatch(type_name::<T>(), "a value of another type"))
}

/// Produces the ordered check outcomes for one call site.
pub trait PlanEvaluator: Send + Sync {
    fn evaluate(&self, context: &InvocationContext) -> Result<Vec<ValidationResult>, ValidationFault>;
}

impl<F> PlanEvaluator for F
where
    F: Fn(&InvocationContext) -> Result<Vec<ValidationResult>, ValidationFault> + Send + Sync,
{
    fn evaluate(&self, context: &InvocationContext) -> Result<Vec<ValidationResult>, ValidationFault> {
        self(context)
    }
}

/// The rest of the pipeline after the filter.
#[async_trait]
pub trait Next<T>: Send + Sync {
    async fn call(&self, context: InvocationContext) -> T;
}

#[async_trait]
impl<F, Fut, T> Next<T> for F
where
    F: Fn(InvocationContext) -> Fut + Send + Sync,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    async fn call(&self, context: InvocationContext) -> T {
        self(context).await
    }
}

/// Filter result: rejected without calling the handler, or the handler's
/// output unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterOutcome<T> {
    Rejected(ValidationProblem),
    Forwarded(T),
}

impl<T> FilterOutcome<T> {
    pub fn is_rejected(&self) -> bool {
        matches!(self, FilterOutcome::Rejected(_))
    }
}

/// Validation filter bound to one plan.
#[derive(Clone)]
pub struct EndpointFilter {
    key: String,
    evaluator: Arc<dyn PlanEvaluator>,
}

impl EndpointFilter {
    pub fn new(key: impl Into<String>, evaluator: Arc<dyn PlanEvaluator>) -> Self {
        Self {
            key: key.into(),
            evaluator,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Evaluate the plan and aggregate failures.
    pub fn evaluate(&self, context: &InvocationContext) -> Result<Option<ValidationProblem>, ValidationFault> {
        let results = self.evaluator.evaluate(context)?;
        trace!(event = "runtime.plan.evaluated", key = %self.key, checks = results.len());
        Ok(ValidationProblem::from_results(&results))
    }

    pub async fn run<T, N>(&self, context: InvocationContext, next: &N) -> Result<FilterOutcome<T>, ValidationFault>
    where
        N: Next<T> + ?Sized,
    {
        if let Some(problem) = self.evaluate(&context)? {
            debug!(
                event = "runtime.request.rejected",
                key = %self.key,
                members = problem.errors.len()
            );
            return Ok(FilterOutcome::Rejected(problem));
        }
        Ok(FilterOutcome::Forwarded(next.call(context).await))
    }
}

impl std::fmt::Debug for EndpointFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointFilter").field("key", &self.key).finish()
    }
}

/// Endpoint builder that accepts filters.
pub trait FilterHost {
    fn add_endpoint_filter(&mut self, filter: EndpointFilter);
}

/// Attach the plan registered for `file:line` to `host`.
pub fn install<H: FilterHost + ?Sized>(
    host: &mut H,
    table: &PlanTable,
    file: &str,
    line: u32,
) -> Result<(), ValidationFault> {
    let filter = table
        .lookup(file, line)
        .ok_or_else(|| ValidationFault::UnanalyzableCallSite {
            file: file.to_string(),
            line,
        })?;
    debug!(event = "runtime.filter.installed", file, line, key = filter.key());
    host.add_endpoint_filter(filter);
    Ok(())
}
