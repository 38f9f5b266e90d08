//! Core contracts shared by the fieldguard crates.
//!
//! This crate defines the canonical model produced by the analysis pipeline
//! (call sites, handler signatures, validatable types), the rule catalog used
//! to decide which annotations are validation constraints, structured
//! diagnostics, and the type nesting graph used by the cycle policy.

pub mod annotations;
pub mod callsite;
pub mod catalog;
pub mod diagnostics;
pub mod error;
pub mod fingerprint;
pub mod graph;
pub mod types;
pub mod validatable;

pub use annotations::ValidationAnnotation;
pub use callsite::{CallSite, CallSiteKey, HandlerSignature, ParameterDescriptor, SourceLocation};
pub use catalog::{ParamKind, RuleCatalog, RuleDescriptor};
pub use diagnostics::{Diagnostic, DiagnosticCode, DiagnosticReport, Severity};
pub use error::{Error, Result};
pub use graph::{NestingGraph, NestingGraphReport, NestingGraphSummary, build_nesting_graph_report};
pub use types::{Literal, TypeRef};
pub use validatable::{Multiplicity, NestedValidation, ValidatableProperty, ValidatableType};

/// Contract version written into plan manifests.
pub const MANIFEST_VERSION: &str = "0.1";
