use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info, warn};

use fieldguard_core::fingerprint::sha256_hex;
use fieldguard_introspect::SourceUnit;
use fieldguard_plan::SynthesizedPlans;

use crate::emit::GENERATED_HEADER;
use crate::errors::{GenerationError, Result};
use crate::model::{FileStatus, GenerateOptions, GenerationReport, MANIFEST_FILE};
use crate::pipeline::Pipeline;

/// Result of a generation run.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub plans: SynthesizedPlans,
    pub report: GenerationReport,
}

/// Entry point for generating validation sources from a source tree.
///
/// The engine keeps its [`Pipeline`] between runs, so calling [`run`] again
/// after an edit only recomputes what the edit touched.
///
/// [`run`]: GenerationEngine::run
#[derive(Debug)]
pub struct GenerationEngine {
    options: GenerateOptions,
    pipeline: Pipeline,
}

impl GenerationEngine {
    pub fn new(options: GenerateOptions) -> Result<Self> {
        let pipeline = Pipeline::from_options(&options)?;
        Ok(Self { options, pipeline })
    }

    pub fn options(&self) -> &GenerateOptions {
        &self.options
    }

    pub fn run(&mut self) -> Result<GenerationResult> {
        let start = Instant::now();
        let units = collect_sources(&self.options.sources, &self.options.out_dir)?;
        info!(
            event = "generate.started",
            units = units.len(),
            out_dir = %self.options.out_dir.display(),
            strict = self.options.strict,
            check = self.options.check
        );

        let output = self.pipeline.run(&units)?;
        let mut report = GenerationReport {
            stats: output.stats,
            plans: output.plans.plans.len(),
            routines: output.plans.routines.len(),
            instances: output.plans.instances.len(),
            diagnostics: output.plans.diagnostics.clone(),
            ..GenerationReport::default()
        };
        for diagnostic in report.diagnostics.iter() {
            warn!(event = "generate.diagnostic", code = %diagnostic.code, path = %diagnostic.path, "{}", diagnostic.message);
        }

        if self.options.strict && !report.diagnostics.is_empty() {
            report.duration_ms = start.elapsed().as_millis() as u64;
            warn!(
                event = "generate.failed",
                warnings = report.diagnostics.warnings.len(),
                "strict mode rejects analysis warnings"
            );
            return Err(GenerationError::Failed(Box::new(report)));
        }

        let mut manifest = serde_json::to_string_pretty(&output.plans)?;
        manifest.push('\n');
        let artifacts = output
            .files
            .iter()
            .map(|file| (file.name.as_str(), file.contents.as_str()))
            .chain(std::iter::once((MANIFEST_FILE, manifest.as_str())));

        for (name, contents) in artifacts {
            let path = self.options.out_dir.join(name);
            let status = if self.options.check {
                if read_existing(&path)?.as_deref() == Some(contents) {
                    FileStatus::Unchanged
                } else {
                    FileStatus::Stale
                }
            } else if write_if_changed(&path, contents.as_bytes())? {
                FileStatus::Written
            } else {
                FileStatus::Unchanged
            };
            debug!(event = "generate.file", path = %path.display(), status = ?status);
            report.record_file(path, status, sha256_hex(contents.as_bytes()));
        }
        report.duration_ms = start.elapsed().as_millis() as u64;

        let stale = report.stale();
        if !stale.is_empty() {
            warn!(event = "generate.stale", files = stale.len());
            return Err(GenerationError::Stale(stale));
        }

        info!(
            event = "generate.completed",
            plans = report.plans,
            routines = report.routines,
            instances = report.instances,
            written = report.written(),
            duration_ms = report.duration_ms
        );
        Ok(GenerationResult {
            plans: output.plans,
            report,
        })
    }
}

/// Read `*.rs` units from files and directories, recursively and in path
/// order. Anything under `exclude` and previously generated files are
/// skipped.
pub fn collect_sources(paths: &[PathBuf], exclude: &Path) -> Result<Vec<SourceUnit>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            walk(path, exclude, &mut files)?;
        } else {
            files.push(path.clone());
        }
    }
    files.sort();
    files.dedup();

    let mut units = Vec::with_capacity(files.len());
    for file in files {
        let text = fs::read_to_string(&file)?;
        if text.starts_with(GENERATED_HEADER) {
            continue;
        }
        units.push(SourceUnit::new(display_path(&file), text));
    }
    Ok(units)
}

fn walk(dir: &Path, exclude: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    if excluded(dir, exclude) {
        return Ok(());
    }
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let hidden = path
            .file_name()
            .map(|name| name.to_string_lossy().starts_with('.') || name == "target")
            .unwrap_or(false);
        if hidden || excluded(&path, exclude) {
            continue;
        }
        if path.is_dir() {
            walk(&path, exclude, files)?;
        } else if path.extension().is_some_and(|ext| ext == "rs") {
            files.push(path);
        }
    }
    Ok(())
}

fn excluded(path: &Path, exclude: &Path) -> bool {
    let root = exclude.as_os_str().is_empty() || exclude == Path::new(".");
    !root && path.starts_with(exclude)
}

/// Forward-slash path, the form `#[track_caller]` locations are compared in.
fn display_path(path: &Path) -> String {
    let text = path.display().to_string().replace('\\', "/");
    text.strip_prefix("./").map(str::to_string).unwrap_or(text)
}

fn read_existing(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Atomically replace `path` with `data` unless it already holds exactly
/// that content. Returns whether the file was written.
pub fn write_if_changed(path: &Path, data: &[u8]) -> io::Result<bool> {
    if let Ok(existing) = fs::read(path) {
        if existing == data {
            return Ok(false);
        }
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = temp_path(path)?;
    let mut file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(&tmp_path)?;
    file.write_all(data)?;
    file.sync_all()?;
    fs::rename(&tmp_path, path)?;
    Ok(true)
}

fn temp_path(path: &Path) -> io::Result<PathBuf> {
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid path for atomic write"))?;
    Ok(path.with_file_name(format!("{}.tmp", file_name.to_string_lossy())))
}
