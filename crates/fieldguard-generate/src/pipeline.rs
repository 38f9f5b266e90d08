//! Incremental analysis pipeline.
//!
//! Stage 1 resolves call sites. A site is re-resolved only when its own
//! tokens or location change, or when a name its handler resolution looked
//! up now finds something else. Stage 2 extracts type graphs per parameter
//! type on the rayon pool, keyed by the descriptors reachable from that
//! type. Stage 3 merges the graphs and synthesizes plans; instances,
//! routines and emitted sources are reused while their inputs keep the same
//! fingerprint.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use rayon::prelude::*;
use tracing::{debug, info};

use fieldguard_core::fingerprint::{FingerprintBuilder, fingerprint};
use fieldguard_core::{
    CallSite, Diagnostic, DiagnosticCode, DiagnosticReport, MANIFEST_VERSION, RuleCatalog,
    TypeRef, ValidatableType,
};
use fieldguard_introspect::source::{
    CallSiteCandidate, DeclarationIndex, Dependency, find_call_sites, resolve_traced,
};
use fieldguard_introspect::{IntrospectOptions, ParsedUnit, SourceIntrospector, SourceUnit, TypeIntrospector};
use fieldguard_plan::{
    SynthesizedPlans, TypeGraph, TypeRoutine, ValidatorInstance, build_instances, build_routines,
    extract, merge_plans, merge_types, plan_call_site,
};

use crate::emit::Emitter;
use crate::errors::Result;
use crate::model::{GenerateOptions, GeneratedFile, PipelineStats};

/// Output of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub plans: SynthesizedPlans,
    pub files: Vec<GeneratedFile>,
    pub stats: PipelineStats,
}

/// Stage 1 result for one call site.
#[derive(Debug, Clone)]
struct SiteEntry {
    site: Option<CallSite>,
    diagnostics: Vec<Diagnostic>,
    dependencies: Vec<Dependency>,
}

impl SiteEntry {
    fn is_current(&self, candidate: &CallSiteCandidate, index: &DeclarationIndex) -> bool {
        self.dependencies
            .iter()
            .all(|dependency| dependency.holds(candidate, index))
    }
}

#[derive(Debug, Clone)]
struct Synthesized {
    fingerprint: String,
    instances: Vec<ValidatorInstance>,
    routines: Vec<TypeRoutine>,
}

#[derive(Debug, Clone)]
struct Emitted {
    fingerprint: String,
    files: Vec<GeneratedFile>,
}

/// Long-lived pipeline holding the caches of previous runs.
#[derive(Debug)]
pub struct Pipeline {
    options: IntrospectOptions,
    catalog: RuleCatalog,
    runtime_crate: String,
    sites: HashMap<String, SiteEntry>,
    graphs: HashMap<(TypeRef, String), TypeGraph>,
    synthesized: Option<Synthesized>,
    emitted: Option<Emitted>,
}

impl Pipeline {
    pub fn new(options: IntrospectOptions, catalog: RuleCatalog, runtime_crate: impl Into<String>) -> Self {
        Self {
            options,
            catalog,
            runtime_crate: runtime_crate.into(),
            sites: HashMap::new(),
            graphs: HashMap::new(),
            synthesized: None,
            emitted: None,
        }
    }

    /// Pipeline for engine options; custom rules are added to the builtin
    /// catalog.
    pub fn from_options(options: &GenerateOptions) -> Result<Self> {
        let mut catalog = RuleCatalog::builtin();
        for rule in &options.custom_rules {
            catalog.register(rule.clone())?;
        }
        Ok(Self::new(
            options.introspect.clone(),
            catalog,
            options.runtime_crate.clone(),
        ))
    }

    pub fn catalog(&self) -> &RuleCatalog {
        &self.catalog
    }

    pub fn options(&self) -> &IntrospectOptions {
        &self.options
    }

    pub fn run(&mut self, units: &[SourceUnit]) -> Result<PipelineOutput> {
        let mut stats = PipelineStats {
            units: units.len(),
            ..PipelineStats::default()
        };
        let mut diagnostics = DiagnosticReport::default();
        let config = fingerprint(&(&self.options, &self.catalog))?;

        let mut ordered: Vec<&SourceUnit> = units.iter().collect();
        ordered.sort_by(|left, right| left.path.cmp(&right.path));
        let mut parsed = Vec::with_capacity(ordered.len());
        for unit in ordered {
            match unit.parse() {
                Ok(unit) => parsed.push(unit),
                Err(err) => {
                    stats.units_failed += 1;
                    diagnostics.push(
                        Diagnostic::warning(DiagnosticCode::ParseError, unit.path.clone(), err.to_string())
                            .with_hint("call sites and types in this file are skipped"),
                    );
                }
            }
        }

        let introspector = SourceIntrospector::from_units(&parsed, self.options.clone());
        diagnostics.merge(introspector.diagnostics().clone());

        let sites = self.resolve_sites(&parsed, &config, &mut stats, &mut diagnostics);
        let graphs = self.extract_graphs(&introspector, &sites, &config, &mut stats)?;
        for graph in graphs.values() {
            diagnostics.merge(graph.diagnostics.clone());
        }

        let types = merge_types(graphs.values());
        let (instances, routines) = self.synthesize_types(&types, &config, &mut stats)?;

        let mut plans = Vec::with_capacity(sites.len());
        for site in &sites {
            plans.push(plan_call_site(site, &graphs, &types, &self.catalog, &mut diagnostics)?);
        }
        let (plans, merge_diagnostics) = merge_plans(plans);
        diagnostics.merge(merge_diagnostics);
        diagnostics.normalize();

        let plans = SynthesizedPlans {
            version: MANIFEST_VERSION.to_string(),
            types: types.values().cloned().collect(),
            instances,
            routines,
            plans,
            diagnostics,
        };
        let files = self.emit(&plans, &config, &mut stats)?;

        info!(
            event = "generate.pipeline.done",
            units = stats.units,
            call_sites = stats.call_sites,
            plans = plans.plans.len(),
            types = plans.types.len(),
            warnings = plans.diagnostics.warnings.len(),
            reused = stats.fully_reused()
        );
        Ok(PipelineOutput { plans, files, stats })
    }

    fn resolve_sites(
        &mut self,
        parsed: &[ParsedUnit],
        config: &str,
        stats: &mut PipelineStats,
        diagnostics: &mut DiagnosticReport,
    ) -> Vec<CallSite> {
        let index = DeclarationIndex::build(parsed);
        let mut cache = HashMap::with_capacity(self.sites.len());
        let mut sites = Vec::new();

        for unit in parsed {
            for candidate in find_call_sites(unit, &self.options) {
                stats.call_sites += 1;
                let key = FingerprintBuilder::new()
                    .field(&candidate.fingerprint)
                    .field(config)
                    .finish();
                let cached = self
                    .sites
                    .remove(&key)
                    .filter(|entry| entry.is_current(&candidate, &index));
                let entry = match cached {
                    Some(entry) => {
                        stats.sites_reused += 1;
                        entry
                    }
                    None => {
                        stats.sites_resolved += 1;
                        resolve_entry(&candidate, &index, &self.options)
                    }
                };
                if let Some(site) = &entry.site {
                    sites.push(site.clone());
                }
                for diagnostic in &entry.diagnostics {
                    diagnostics.push(diagnostic.clone());
                }
                cache.insert(key, entry);
            }
        }
        self.sites = cache;
        debug!(
            event = "generate.stage1.done",
            call_sites = stats.call_sites,
            resolved = stats.sites_resolved,
            reused = stats.sites_reused
        );
        sites
    }

    fn extract_graphs(
        &mut self,
        introspector: &SourceIntrospector,
        sites: &[CallSite],
        config: &str,
        stats: &mut PipelineStats,
    ) -> Result<BTreeMap<TypeRef, TypeGraph>> {
        let wanted: BTreeSet<&TypeRef> = sites
            .iter()
            .flat_map(|site| site.handler.parameters.iter().map(|param| &param.ty))
            .collect();

        let mut graphs = BTreeMap::new();
        let mut keys = BTreeMap::new();
        let mut missing = Vec::new();
        for ty in wanted {
            let key = FingerprintBuilder::new()
                .field(introspector.reachable_fingerprint(ty)?)
                .field(config)
                .finish();
            match self.graphs.remove(&(ty.clone(), key.clone())) {
                Some(graph) => {
                    stats.types_reused += 1;
                    graphs.insert(ty.clone(), graph);
                }
                None => missing.push(ty.clone()),
            }
            keys.insert(ty.clone(), key);
        }

        stats.types_extracted = missing.len();
        let catalog = &self.catalog;
        let dynamic: &dyn TypeIntrospector = introspector;
        let extracted: Vec<(TypeRef, TypeGraph)> = missing
            .into_par_iter()
            .map(|ty| {
                let graph = extract(dynamic, catalog, &ty);
                (ty, graph)
            })
            .collect();
        graphs.extend(extracted);

        self.graphs = graphs
            .iter()
            .filter_map(|(ty, graph)| {
                let key = keys.get(ty)?.clone();
                Some(((ty.clone(), key), graph.clone()))
            })
            .collect();
        debug!(
            event = "generate.stage2.done",
            extracted = stats.types_extracted,
            reused = stats.types_reused
        );
        Ok(graphs)
    }

    fn synthesize_types(
        &mut self,
        types: &BTreeMap<String, ValidatableType>,
        config: &str,
        stats: &mut PipelineStats,
    ) -> Result<(Vec<ValidatorInstance>, Vec<TypeRoutine>)> {
        let key = FingerprintBuilder::new()
            .field(fingerprint(types)?)
            .field(config)
            .finish();
        if let Some(cached) = self.synthesized.as_ref().filter(|cached| cached.fingerprint == key) {
            return Ok((cached.instances.clone(), cached.routines.clone()));
        }

        stats.routines_rebuilt = true;
        let instances = build_instances(types, &self.catalog);
        let routines = build_routines(types, &instances);
        self.synthesized = Some(Synthesized {
            fingerprint: key,
            instances: instances.clone(),
            routines: routines.clone(),
        });
        Ok((instances, routines))
    }

    fn emit(&mut self, plans: &SynthesizedPlans, config: &str, stats: &mut PipelineStats) -> Result<Vec<GeneratedFile>> {
        let key = FingerprintBuilder::new()
            .field(fingerprint(&(&plans.types, &plans.plans))?)
            .field(&self.runtime_crate)
            .field(config)
            .finish();
        if let Some(cached) = self.emitted.as_ref().filter(|cached| cached.fingerprint == key) {
            return Ok(cached.files.clone());
        }

        stats.emitted = true;
        let files = Emitter::new(&self.runtime_crate, &self.catalog, &self.options)?.emit(plans)?;
        self.emitted = Some(Emitted {
            fingerprint: key,
            files: files.clone(),
        });
        Ok(files)
    }
}

fn resolve_entry(
    candidate: &CallSiteCandidate,
    index: &DeclarationIndex,
    options: &IntrospectOptions,
) -> SiteEntry {
    let path = candidate.location.to_string();
    let resolution = resolve_traced(candidate, index, options);
    let dependencies = resolution.dependencies;
    match resolution.outcome {
        Ok(resolved) => {
            let diagnostics = resolved
                .problems
                .iter()
                .map(|problem| {
                    Diagnostic::warning(DiagnosticCode::InvalidRuleArguments, path.clone(), problem.clone())
                })
                .collect();
            SiteEntry {
                site: Some(CallSite {
                    location: candidate.location.clone(),
                    method: candidate.method.clone(),
                    route: candidate.route.clone(),
                    handler: resolved.signature,
                }),
                diagnostics,
                dependencies,
            }
        }
        Err(reason) => {
            debug!(event = "generate.site.unresolved", location = %path, reason = %reason);
            SiteEntry {
                site: None,
                diagnostics: vec![
                    Diagnostic::warning(DiagnosticCode::UnresolvedHandler, path, reason)
                        .with_hint("use a closure, a fn item or a const/let bound to one"),
                ],
                dependencies,
            }
        }
    }
}
