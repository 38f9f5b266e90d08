mod config;
mod logging;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use fieldguard_core::{
    Error as CoreError, NestingGraph, NestingGraphReport, RuleCatalog, build_nesting_graph_report,
};
use fieldguard_generate::{
    GenerationEngine, GenerationError, GenerationReport, Pipeline, collect_sources,
};
use fieldguard_plan::{PlanError, SynthesizedPlans, parse_manifest, plans_json_schema};
use fieldguard_runtime::{DynamicArgument, PlanInterpreter, ValidationFault};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use config::{FieldguardConfig, Overrides};
use logging::init_logging;

#[derive(Debug, Error)]
enum CliError {
    #[error("logging error: {0}")]
    Logging(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("config error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("plan error: {0}")]
    Plan(#[from] PlanError),
    #[error("core error: {0}")]
    Core(#[from] CoreError),
    #[error("validation fault: {0}")]
    Fault(#[from] ValidationFault),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Parser, Debug)]
#[command(name = "fieldguard", version, about = "Fieldguard validation generator")]
struct Cli {
    /// Append JSON log lines to this file instead of logging to stderr.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate validation sources and the plan manifest.
    Generate(GenerateArgs),
    /// Print the synthesized plans without writing anything.
    Inspect(InspectArgs),
    /// Validate arguments against a plan manifest.
    Check(CheckArgs),
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Source files or directories to scan.
    #[arg(long = "src", value_name = "PATH")]
    sources: Vec<PathBuf>,
    /// Output directory for generated files.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Config file (defaults to fieldguard.toml when present).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Fail when any call site cannot be analyzed.
    #[arg(long, default_value_t = false)]
    strict: bool,
    /// Report stale output instead of writing.
    #[arg(long, default_value_t = false)]
    check: bool,
}

#[derive(Args, Debug)]
struct InspectArgs {
    #[arg(long = "src", value_name = "PATH")]
    sources: Vec<PathBuf>,
    #[arg(long)]
    config: Option<PathBuf>,
    /// Print the full plan set as JSON.
    #[arg(long, default_value_t = false)]
    json: bool,
    /// Print the JSON schema of the plan manifest and exit.
    #[arg(long, default_value_t = false)]
    schema: bool,
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Plan manifest written by `generate`.
    #[arg(long, default_value = "src/generated/fieldguard-plans.json")]
    manifest: PathBuf,
    /// Source file of the call site.
    #[arg(long)]
    file: String,
    /// Line of the marker call.
    #[arg(long)]
    line: u32,
    /// Handler arguments: an inline JSON array or a file holding one.
    #[arg(long, default_value = "[]")]
    args: String,
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct InspectOutput<'a> {
    plans: &'a SynthesizedPlans,
    nesting: NestingGraphReport,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = init_logging(cli.log_file.as_deref(), "info") {
        eprintln!("{err}");
        return ExitCode::from(2);
    }

    let result = match cli.command {
        Command::Generate(args) => run_generate(args),
        Command::Inspect(args) => run_inspect(args),
        Command::Check(args) => run_check(args),
    };
    match result {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(event = "command_failed", error = %err);
            eprintln!("error: {err}");
            ExitCode::from(2)
        }
    }
}

fn run_generate(args: GenerateArgs) -> Result<ExitCode, CliError> {
    let config = FieldguardConfig::load(args.config.as_deref())?;
    let options = config.generate_options(Overrides {
        sources: args.sources,
        out_dir: args.out,
        strict: args.strict,
        check: args.check,
    });
    tracing::info!(
        event = "generate_started",
        out_dir = %options.out_dir.display(),
        strict = options.strict,
        check = options.check
    );

    let mut engine = GenerationEngine::new(options)?;
    match engine.run() {
        Ok(result) => {
            print_report(&result.report);
            Ok(ExitCode::SUCCESS)
        }
        Err(GenerationError::Stale(files)) => {
            for file in &files {
                println!("stale: {file}");
            }
            tracing::warn!(event = "generate_stale", files = files.len());
            Ok(ExitCode::from(1))
        }
        Err(GenerationError::Failed(report)) => {
            print_report(&report);
            tracing::warn!(event = "generate_failed", errors = report.diagnostics.errors.len());
            Ok(ExitCode::from(1))
        }
        Err(err) => Err(err.into()),
    }
}

fn run_inspect(args: InspectArgs) -> Result<ExitCode, CliError> {
    if args.schema {
        println!("{}", serde_json::to_string_pretty(&plans_json_schema())?);
        return Ok(ExitCode::SUCCESS);
    }

    let config = FieldguardConfig::load(args.config.as_deref())?;
    let options = config.generate_options(Overrides {
        sources: args.sources,
        ..Overrides::default()
    });
    let timer = Instant::now();
    let units = collect_sources(&options.sources, &options.out_dir)?;
    let mut pipeline = Pipeline::from_options(&options)?;
    let output = pipeline.run(&units)?;
    tracing::info!(
        event = "inspect_finished",
        plans = output.plans.plans.len(),
        duration_ms = timer.elapsed().as_millis() as u64
    );

    let nesting = build_nesting_graph_report(&nesting_graph(&output.plans));
    if args.json {
        let view = InspectOutput {
            plans: &output.plans,
            nesting,
        };
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(ExitCode::SUCCESS);
    }

    let plans = &output.plans;
    println!(
        "{} plan(s), {} routine(s), {} instance(s), {} call site(s) in {} unit(s)",
        plans.plans.len(),
        plans.routines.len(),
        plans.instances.len(),
        output.stats.call_sites,
        output.stats.units
    );
    for plan in &plans.plans {
        for site in &plan.sites {
            println!(
                "  {}:{} {} {} -> {}",
                site.location.file, site.location.line, site.method, site.route, plan.key
            );
        }
    }
    if !nesting.recursive_edges.is_empty() {
        println!("recursive edges: {}", nesting.recursive_edges.join(", "));
    }
    for diagnostic in plans.diagnostics.iter() {
        println!("{diagnostic}");
    }
    Ok(ExitCode::SUCCESS)
}

fn run_check(args: CheckArgs) -> Result<ExitCode, CliError> {
    let plans = load_manifest(&args.manifest)?;
    let config = FieldguardConfig::load(args.config.as_deref())?;
    let mut catalog = RuleCatalog::builtin();
    for rule in config.rules {
        catalog.register(rule)?;
    }

    let arguments = if args.args.trim_start().starts_with('[') {
        parse_arguments(&args.args)?
    } else {
        parse_arguments(&std::fs::read_to_string(&args.args)?)?
    };
    let interpreter = PlanInterpreter::with_catalog(&plans, catalog);
    let problem = interpreter.run_at(&args.file, args.line, &arguments)?;
    tracing::info!(
        event = "check_finished",
        file = %args.file,
        line = args.line,
        rejected = problem.is_some()
    );
    match problem {
        Some(problem) => {
            println!("{}", serde_json::to_string_pretty(&problem)?);
            Ok(ExitCode::from(1))
        }
        None => {
            println!("valid");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_manifest(path: &Path) -> Result<SynthesizedPlans, CliError> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| CliError::InvalidConfig(format!("{}: {err}", path.display())))?;
    Ok(parse_manifest(&text)?)
}

fn parse_arguments(text: &str) -> Result<Vec<DynamicArgument>, CliError> {
    match serde_json::from_str::<Value>(text)? {
        Value::Array(values) => Ok(values.into_iter().map(DynamicArgument::new).collect()),
        _ => Err(CliError::InvalidConfig(
            "--args must be a JSON array".to_string(),
        )),
    }
}

fn nesting_graph(plans: &SynthesizedPlans) -> NestingGraph {
    let mut graph = NestingGraph::new();
    for ty in &plans.types {
        graph.add_node(ty.name());
        for property in &ty.properties {
            if let Some(nested) = &property.nested {
                graph.add_edge(ty.name(), &property.name, &nested.target);
            }
        }
    }
    graph
}

fn print_report(report: &GenerationReport) {
    for file in &report.files {
        println!("{:?} {}", file.status, file.path.display());
    }
    println!(
        "{} plan(s), {} routine(s), {} instance(s) in {} ms",
        report.plans, report.routines, report.instances, report.duration_ms
    );
    for diagnostic in report.diagnostics.iter() {
        println!("{diagnostic}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_generate_flags() {
        let cli = Cli::try_parse_from([
            "fieldguard",
            "--log-file",
            "run.log",
            "generate",
            "--src",
            "app/src",
            "--src",
            "lib/src",
            "--strict",
        ])
        .unwrap();
        assert_eq!(cli.log_file, Some(PathBuf::from("run.log")));
        let Command::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        assert_eq!(args.sources.len(), 2);
        assert!(args.strict);
        assert!(!args.check);
        assert!(args.out.is_none());
    }

    #[test]
    fn check_requires_a_location() {
        assert!(Cli::try_parse_from(["fieldguard", "check", "--file", "src/main.rs"]).is_err());
        let cli = Cli::try_parse_from([
            "fieldguard",
            "check",
            "--file",
            "src/main.rs",
            "--line",
            "12",
        ])
        .unwrap();
        let Command::Check(args) = cli.command else {
            panic!("expected check");
        };
        assert_eq!(args.line, 12);
        assert_eq!(args.args, "[]");
    }

    #[test]
    fn arguments_must_be_an_array() {
        let arguments = parse_arguments(r#"[{"Id": 0}, 5]"#).unwrap();
        assert_eq!(arguments.len(), 2);
        assert!(arguments[0].runtime_type.is_none());
        assert!(matches!(
            parse_arguments(r#"{"Id": 0}"#),
            Err(CliError::InvalidConfig(_))
        ));
    }
}
