//! Runtime support for generated validation filters.
//!
//! Generated code links against this crate: builtin [`rules`], the
//! [`check`] helper routines call per member, the [`PlanTable`] looked up by
//! call-site location, and the [`EndpointFilter`] that rejects a request
//! with a [`ValidationProblem`] before the handler runs. [`PlanInterpreter`]
//! executes a plan manifest directly against JSON arguments.

pub mod context;
pub mod errors;
pub mod filter;
pub mod interpreter;
pub mod problem;
pub mod rules;
pub mod table;
pub mod value;

pub use context::{ValidationContext, ValidationResult, check};
pub use errors::{RuleError, ValidationFault};
pub use filter::{
    EndpointFilter, FilterHost, FilterOutcome, InvocationContext, Next, PlanEvaluator, downcast,
    install,
};
pub use interpreter::{DynamicArgument, PlanInterpreter, TYPE_DISCRIMINATOR};
pub use problem::ValidationProblem;
pub use rules::ValidationRule;
pub use table::{PlanTable, PlanTableBuilder};
pub use value::{AsFieldValue, FieldValue};
