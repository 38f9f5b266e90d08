//! Source generation for fieldguard.
//!
//! [`GenerationEngine`] reads a source tree, runs the incremental
//! [`Pipeline`] (call-site resolution, type-graph extraction, plan
//! synthesis) and writes three Rust artifacts plus a JSON plan manifest.

pub mod emit;
pub mod engine;
pub mod errors;
pub mod model;
pub mod pipeline;

pub use emit::Emitter;
pub use engine::{GenerationEngine, GenerationResult, collect_sources, write_if_changed};
pub use errors::{GenerationError, Result};
pub use model::{
    DEFAULT_RUNTIME_CRATE, FILTERS_FILE, FileReport, FileStatus, GenerateOptions, GeneratedFile,
    GenerationReport, INSTANCES_FILE, MANIFEST_FILE, PipelineStats, ROUTINES_FILE,
};
pub use pipeline::{Pipeline, PipelineOutput};
