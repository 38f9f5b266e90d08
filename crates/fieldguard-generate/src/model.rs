use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use fieldguard_core::{DiagnosticCode, DiagnosticReport, RuleDescriptor};
use fieldguard_introspect::IntrospectOptions;

/// Runtime crate path used by generated code unless configured otherwise.
pub const DEFAULT_RUNTIME_CRATE: &str = "::fieldguard_runtime";

/// File names of the emitted artifacts.
pub const INSTANCES_FILE: &str = "validation_instances.rs";
pub const ROUTINES_FILE: &str = "validation_routines.rs";
pub const FILTERS_FILE: &str = "validation_filters.rs";
pub const MANIFEST_FILE: &str = "fieldguard-plans.json";

/// Options for the generation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateOptions {
    /// Source files or directories scanned for `*.rs` units.
    pub sources: Vec<PathBuf>,
    /// Directory where the generated artifacts are written.
    pub out_dir: PathBuf,
    /// Fail when analysis reports any warning.
    pub strict: bool,
    /// Compare against existing output instead of writing.
    pub check: bool,
    /// Path of the runtime crate as seen from the generated module.
    pub runtime_crate: String,
    pub introspect: IntrospectOptions,
    /// Rule kinds registered on top of the builtin catalog.
    pub custom_rules: Vec<RuleDescriptor>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            sources: vec![PathBuf::from("src")],
            out_dir: PathBuf::from("src/generated"),
            strict: false,
            check: false,
            runtime_crate: DEFAULT_RUNTIME_CRATE.to_string(),
            introspect: IntrospectOptions::default(),
            custom_rules: Vec::new(),
        }
    }
}

/// One emitted artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFile {
    pub name: String,
    pub contents: String,
}

impl GeneratedFile {
    pub fn new(name: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
        }
    }
}

/// What happened to one artifact on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Written,
    Unchanged,
    /// `check` mode found different content.
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub status: FileStatus,
    /// Hex SHA-256 of the generated content.
    pub sha256: String,
}

/// What the incremental pipeline recomputed and what it reused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    pub units: usize,
    pub units_failed: usize,
    pub call_sites: usize,
    pub sites_resolved: usize,
    pub sites_reused: usize,
    pub types_extracted: usize,
    pub types_reused: usize,
    pub routines_rebuilt: bool,
    pub emitted: bool,
}

impl PipelineStats {
    /// Nothing was recomputed.
    pub fn fully_reused(&self) -> bool {
        self.sites_resolved == 0 && self.types_extracted == 0 && !self.routines_rebuilt && !self.emitted
    }
}

/// Report for a generation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationReport {
    pub files: Vec<FileReport>,
    pub stats: PipelineStats,
    pub plans: usize,
    pub routines: usize,
    pub instances: usize,
    pub diagnostics: DiagnosticReport,
    pub duration_ms: u64,
}

impl GenerationReport {
    pub fn record_file(&mut self, path: PathBuf, status: FileStatus, sha256: String) {
        self.files.push(FileReport { path, status, sha256 });
    }

    pub fn written(&self) -> usize {
        self.count(FileStatus::Written)
    }

    pub fn stale(&self) -> Vec<String> {
        self.files
            .iter()
            .filter(|file| file.status == FileStatus::Stale)
            .map(|file| file.path.display().to_string())
            .collect()
    }

    pub fn warnings_by_code(&self, code: DiagnosticCode) -> usize {
        self.diagnostics.count(code)
    }

    fn count(&self, status: FileStatus) -> usize {
        self.files.iter().filter(|file| file.status == status).count()
    }
}
