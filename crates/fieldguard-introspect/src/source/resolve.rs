use std::collections::{BTreeSet, HashSet};

use quote::ToTokens;
use syn::{Attribute, Expr, ExprClosure, FnArg, Pat, Path, Signature, Type};

use fieldguard_core::fingerprint::FingerprintBuilder;
use fieldguard_core::{HandlerSignature, ParameterDescriptor};

use crate::options::IntrospectOptions;

use super::attrs::validation_annotations;
use super::callsite::{Binding, CallSiteCandidate};
use super::index::DeclarationIndex;
use super::types::{type_ref, unwrap_extractor};

/// Upper bound on reference hops while following a handler expression.
const MAX_DEPTH: usize = 32;

/// Signature of a resolved handler plus annotation problems met on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedHandler {
    pub signature: HandlerSignature,
    pub problems: Vec<String>,
}

/// A name lookup performed while resolving a handler.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Lookup {
    /// Call-site scope, ignoring the `skip` innermost bindings.
    Scope { name: String, skip: usize },
    Method { owner: String, name: String },
    Value { name: String, file: String },
    Function { name: String, file: String },
}

impl Lookup {
    /// Fingerprint of what the lookup finds for `candidate` in `index`.
    pub fn answer(&self, candidate: &CallSiteCandidate, index: &DeclarationIndex) -> String {
        let hasher = FingerprintBuilder::new();
        match self {
            Lookup::Scope { name, skip } => {
                let scope = candidate.scope.get(*skip..).unwrap_or_default();
                match scope.iter().position(|binding| binding.name() == name.as_str()) {
                    Some(position) => binding_answer(hasher.field(position.to_string()), &scope[position]),
                    None => hasher.field("absent").finish(),
                }
            }
            Lookup::Method { owner, name } => match index.method(owner, name) {
                Some(method) => hasher.field(&method.file).field(tokens(&method.sig)).finish(),
                None => hasher.field("absent").finish(),
            },
            Lookup::Value { name, file } => match index.value(name, file) {
                Some(value) => hasher
                    .field(&value.file)
                    .field(value.mutable.to_string())
                    .field(tokens(&value.init))
                    .finish(),
                None => hasher.field("absent").finish(),
            },
            Lookup::Function { name, file } => match index.function(name, file) {
                Some(function) => hasher.field(&function.file).field(tokens(&function.sig)).finish(),
                None => hasher.field("absent").finish(),
            },
        }
    }
}

/// A lookup and the fingerprint of its answer when it was made.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dependency {
    pub lookup: Lookup,
    pub answer: String,
}

impl Dependency {
    /// The lookup still finds the same declaration.
    pub fn holds(&self, candidate: &CallSiteCandidate, index: &DeclarationIndex) -> bool {
        self.lookup.answer(candidate, index) == self.answer
    }
}

/// Outcome of resolving one call site, with every lookup it depended on.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub outcome: Result<ResolvedHandler, String>,
    pub dependencies: Vec<Dependency>,
}

impl Resolution {
    /// A cached resolution is still valid for `candidate`.
    pub fn is_current(&self, candidate: &CallSiteCandidate, index: &DeclarationIndex) -> bool {
        self.dependencies
            .iter()
            .all(|dependency| dependency.holds(candidate, index))
    }
}

enum Target<'a> {
    Closure(&'a ExprClosure),
    Function(&'a Signature),
}

/// Follow the handler expression of a call site to a concrete signature.
///
/// Returns a human-readable reason when the chain ends at anything other
/// than a closure literal or a function declaration.
pub fn resolve_handler(
    candidate: &CallSiteCandidate,
    index: &DeclarationIndex,
    options: &IntrospectOptions,
) -> Result<ResolvedHandler, String> {
    resolve_traced(candidate, index, options).outcome
}

/// [`resolve_handler`] that also records the lookups the result depends on.
pub fn resolve_traced(
    candidate: &CallSiteCandidate,
    index: &DeclarationIndex,
    options: &IntrospectOptions,
) -> Resolution {
    let mut resolver = Resolver {
        index,
        candidate,
        dependencies: Vec::new(),
    };
    let mut visiting = BTreeSet::new();
    let outcome = resolver
        .expr(&candidate.handler, Some(0), 0, &mut visiting)
        .and_then(|target| match target {
            Target::Closure(closure) => closure_signature(closure, options),
            Target::Function(sig) => function_signature(sig, options),
        });
    let mut dependencies = resolver.dependencies;
    let mut recorded = HashSet::new();
    dependencies.retain(|dependency| recorded.insert(dependency.lookup.clone()));
    Resolution {
        outcome,
        dependencies,
    }
}

struct Resolver<'a> {
    index: &'a DeclarationIndex,
    candidate: &'a CallSiteCandidate,
    dependencies: Vec<Dependency>,
}

impl<'a> Resolver<'a> {
    fn record(&mut self, lookup: Lookup) {
        let answer = lookup.answer(self.candidate, self.index);
        self.dependencies.push(Dependency { lookup, answer });
    }

    /// `scope` is the offset of the visible call-site bindings; `None` for
    /// module-level initializers, which see no local bindings.
    fn expr(
        &mut self,
        expr: &'a Expr,
        scope: Option<usize>,
        depth: usize,
        visiting: &mut BTreeSet<String>,
    ) -> Result<Target<'a>, String> {
        if depth > MAX_DEPTH {
            return Err("handler reference chain is too deep".to_string());
        }
        match expr {
            Expr::Closure(closure) => Ok(Target::Closure(closure)),
            Expr::Paren(paren) => self.expr(&paren.expr, scope, depth + 1, visiting),
            Expr::Group(group) => self.expr(&group.expr, scope, depth + 1, visiting),
            Expr::Reference(reference) => self.expr(&reference.expr, scope, depth + 1, visiting),
            Expr::Cast(cast) => self.expr(&cast.expr, scope, depth + 1, visiting),
            Expr::MethodCall(call)
                if call.args.is_empty() && (call.method == "into" || call.method == "clone") =>
            {
                self.expr(&call.receiver, scope, depth + 1, visiting)
            }
            Expr::Call(call) if call.args.len() == 1 && is_wrapping_constructor(&call.func) => {
                self.expr(&call.args[0], scope, depth + 1, visiting)
            }
            Expr::Path(path) if path.qself.is_none() => {
                self.path(&path.path, scope, depth, visiting)
            }
            other => Err(format!(
                "handler expression `{}` is not a function reference",
                other.to_token_stream()
            )),
        }
    }

    fn path(
        &mut self,
        path: &'a Path,
        scope: Option<usize>,
        depth: usize,
        visiting: &mut BTreeSet<String>,
    ) -> Result<Target<'a>, String> {
        let segments: Vec<String> = path
            .segments
            .iter()
            .map(|segment| segment.ident.to_string())
            .collect();

        if let ([name], Some(skip)) = (segments.as_slice(), scope) {
            self.record(Lookup::Scope {
                name: name.clone(),
                skip,
            });
            let candidate = self.candidate;
            let bindings = candidate.scope.get(skip..).unwrap_or_default();
            if let Some(position) = bindings.iter().position(|binding| binding.name() == name.as_str()) {
                return match &bindings[position] {
                    Binding::Let {
                        init: Some(init),
                        mutable: false,
                        ..
                    } => {
                        let absolute = skip + position;
                        if !visiting.insert(format!("let:{absolute}")) {
                            return Err(format!("`{name}` refers to itself"));
                        }
                        self.expr(init, Some(absolute + 1), depth + 1, visiting)
                    }
                    Binding::Let { mutable: true, .. } => {
                        Err(format!("`{name}` is a mutable binding"))
                    }
                    Binding::Let { init: None, .. } => {
                        Err(format!("`{name}` is declared without an initializer"))
                    }
                    Binding::Fn { sig, .. } => Ok(Target::Function(sig)),
                    Binding::Param { .. } => {
                        Err(format!("`{name}` is a parameter of the enclosing function"))
                    }
                };
            }
        }

        let Some(last) = segments.last() else {
            return Err("empty handler path".to_string());
        };
        let index = self.index;
        let file = self.candidate.location.file.as_str();
        if segments.len() >= 2 {
            let owner = &segments[segments.len() - 2];
            self.record(Lookup::Method {
                owner: owner.clone(),
                name: last.clone(),
            });
            if let Some(method) = index.method(owner, last) {
                return Ok(Target::Function(&method.sig));
            }
        }
        self.record(Lookup::Value {
            name: last.clone(),
            file: file.to_string(),
        });
        if let Some(value) = index.value(last, file) {
            if value.mutable {
                return Err(format!("`{last}` is a mutable static"));
            }
            if !visiting.insert(format!("value:{last}")) {
                return Err(format!("`{last}` refers to itself"));
            }
            return self.expr(&value.init, None, depth + 1, visiting);
        }
        self.record(Lookup::Function {
            name: last.clone(),
            file: file.to_string(),
        });
        if let Some(function) = index.function(last, file) {
            return Ok(Target::Function(&function.sig));
        }
        Err(format!(
            "`{}` does not name a known function",
            path.to_token_stream()
        ))
    }
}

fn tokens(node: &impl ToTokens) -> String {
    node.to_token_stream().to_string()
}

fn binding_answer(hasher: FingerprintBuilder, binding: &Binding) -> String {
    match binding {
        Binding::Let { init, mutable, .. } => hasher
            .field("let")
            .field(mutable.to_string())
            .field(init.as_ref().map(|init| tokens(init)).unwrap_or_default())
            .finish(),
        Binding::Fn { sig, .. } => hasher.field("fn").field(tokens(sig)).finish(),
        Binding::Param { .. } => hasher.field("param").finish(),
    }
}

fn is_wrapping_constructor(func: &Expr) -> bool {
    let Expr::Path(path) = func else {
        return false;
    };
    let segments: Vec<String> = path
        .path
        .segments
        .iter()
        .map(|segment| segment.ident.to_string())
        .collect();
    match segments.as_slice() {
        [.., owner, method] => {
            method == "new" && matches!(owner.as_str(), "Box" | "Arc" | "Rc")
        }
        _ => false,
    }
}

fn function_signature(sig: &Signature, options: &IntrospectOptions) -> Result<ResolvedHandler, String> {
    let params = sig.inputs.iter().filter_map(|input| match input {
        FnArg::Receiver(_) => None,
        FnArg::Typed(typed) => Some((typed.attrs.as_slice(), &*typed.pat, Some(&*typed.ty))),
    });
    build_signature(params, options)
}

fn closure_signature(
    closure: &ExprClosure,
    options: &IntrospectOptions,
) -> Result<ResolvedHandler, String> {
    let params = closure.inputs.iter().map(|input| match input {
        Pat::Type(typed) => (typed.attrs.as_slice(), &*typed.pat, Some(&*typed.ty)),
        other => (&[][..], other, None),
    });
    build_signature(params, options)
}

fn build_signature<'p>(
    params: impl Iterator<Item = (&'p [Attribute], &'p Pat, Option<&'p Type>)>,
    options: &IntrospectOptions,
) -> Result<ResolvedHandler, String> {
    let mut parameters = Vec::new();
    let mut problems = Vec::new();

    for (index, (attrs, pat, ty)) in params.enumerate() {
        let name = parameter_name(pat).unwrap_or_else(|| format!("arg{index}"));
        let Some(ty) = ty else {
            return Err(format!("closure parameter `{name}` has no type annotation"));
        };
        let ty = type_ref(ty)
            .ok_or_else(|| format!("parameter `{name}` has an unsupported type"))?;
        let ty = unwrap_extractor(ty, &options.extractor_wrappers);

        let parsed = validation_annotations(attrs, &options.attribute);
        problems.extend(
            parsed
                .problems
                .into_iter()
                .map(|problem| format!("parameter `{name}`: {problem}")),
        );
        let mut parameter = ParameterDescriptor::new(index, name, ty);
        parameter.annotations = parsed.annotations;
        parameters.push(parameter);
    }

    Ok(ResolvedHandler {
        signature: HandlerSignature::new(parameters),
        problems,
    })
}

/// `x`, `mut x`, `&x`, `Json(x)` and `x: T` all name the parameter `x`.
fn parameter_name(pat: &Pat) -> Option<String> {
    match pat {
        Pat::Ident(ident) => Some(ident.ident.to_string()),
        Pat::Type(typed) => parameter_name(&typed.pat),
        Pat::Reference(reference) => parameter_name(&reference.pat),
        Pat::TupleStruct(tuple) if tuple.elems.len() == 1 => parameter_name(&tuple.elems[0]),
        Pat::Wild(_) => Some("_".to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceUnit;
    use crate::source::callsite::find_call_sites;

    fn resolve_all(text: &str) -> Vec<Result<ResolvedHandler, String>> {
        let unit = SourceUnit::new("src/main.rs", text).parse().unwrap();
        let index = DeclarationIndex::build(std::slice::from_ref(&unit));
        let options = IntrospectOptions::default();
        find_call_sites(&unit, &options)
            .iter()
            .map(|candidate| resolve_handler(candidate, &index, &options))
            .collect()
    }

    fn param_names(resolved: &Result<ResolvedHandler, String>) -> Vec<String> {
        resolved
            .as_ref()
            .unwrap()
            .signature
            .parameters
            .iter()
            .map(|param| format!("{}: {}", param.name, param.ty))
            .collect()
    }

    #[test]
    fn resolves_closures_and_extractors() {
        let results = resolve_all(
            r#"
fn main() {
    app.map_post("/todo", |Json(todo): Json<Todo>, #[validate(required)] id: i32| ok())
        .with_validation();
}
"#,
        );
        assert_eq!(param_names(&results[0]), vec!["todo: Todo", "id: i32"]);
        let resolved = results[0].as_ref().unwrap();
        assert_eq!(resolved.signature.parameters[1].annotations[0].kind, "required");
    }

    #[test]
    fn follows_reference_chains() {
        let results = resolve_all(
            r#"
const BOXED: fn(Vec<Todo>) = create_many;
fn create(todo: Todo) {}
fn create_many(todos: Vec<Todo>) {}
struct Api;
impl Api { fn find(&self, id: i32) {} }

fn main() {
    fn local(name: String) {}
    let first = create;
    let second = (&first) as fn(Todo);
    app.map_post("/a", second).with_validation();
    app.map_post("/b", Box::new(BOXED)).with_validation();
    app.map_post("/c", local.into()).with_validation();
    app.map_get("/d", Api::find).with_validation();
}
"#,
        );
        assert_eq!(param_names(&results[0]), vec!["todo: Todo"]);
        assert_eq!(param_names(&results[1]), vec!["todos: Vec<Todo>"]);
        assert_eq!(param_names(&results[2]), vec!["name: String"]);
        assert_eq!(param_names(&results[3]), vec!["id: i32"]);
    }

    #[test]
    fn unresolvable_handlers_explain_themselves() {
        let results = resolve_all(
            r#"
fn register(handler: fn(i32)) {
    let mut swapped = create;
    app.map_get("/a", handler).with_validation();
    app.map_get("/b", swapped).with_validation();
    app.map_get("/c", make_handler()).with_validation();
    app.map_get("/d", |id| id).with_validation();
}
"#,
        );
        let reasons: Vec<String> = results.into_iter().map(|result| result.unwrap_err()).collect();
        assert!(reasons[0].contains("parameter of the enclosing function"));
        assert!(reasons[1].contains("mutable binding"));
        assert!(reasons[2].contains("not a function reference"));
        assert!(reasons[3].contains("no type annotation"));
    }

    #[test]
    fn self_referencing_constants_terminate() {
        let results = resolve_all(
            r#"
const A: fn() = B;
const B: fn() = A;
fn main() { app.map_get("/", A).with_validation(); }
"#,
        );
        assert!(results[0].as_ref().unwrap_err().contains("refers to itself"));
    }

    fn traced(text: &str) -> (Vec<CallSiteCandidate>, DeclarationIndex, Vec<Resolution>) {
        let unit = SourceUnit::new("src/main.rs", text).parse().unwrap();
        let index = DeclarationIndex::build(std::slice::from_ref(&unit));
        let options = IntrospectOptions::default();
        let candidates = find_call_sites(&unit, &options);
        let resolutions = candidates
            .iter()
            .map(|candidate| resolve_traced(candidate, &index, &options))
            .collect();
        (candidates, index, resolutions)
    }

    #[test]
    fn resolutions_track_only_the_names_they_read() {
        let source = r#"
fn create(todo: Todo) {}
fn unrelated(x: i32) {}
fn main() {
    let handler = create;
    app.map_post("/a", handler).with_validation();
    app.map_get("/b", missing).with_validation();
}
"#;
        let (_, _, resolutions) = traced(source);
        let lookups: Vec<&Lookup> = resolutions[0]
            .dependencies
            .iter()
            .map(|dependency| &dependency.lookup)
            .collect();
        assert!(matches!(lookups[0], Lookup::Scope { name, skip: 0 } if name == "handler"));
        assert!(lookups.iter().any(|lookup| matches!(lookup, Lookup::Function { name, .. } if name == "create")));
        assert!(!lookups.iter().any(|lookup| matches!(lookup, Lookup::Function { name, .. } if name == "unrelated")));

        let (candidates, index, _) = traced(&source.replace("fn unrelated(x: i32)", "fn unrelated(x: i64)"));
        assert!(resolutions[0].is_current(&candidates[0], &index));
        assert!(resolutions[1].is_current(&candidates[1], &index));

        let (candidates, index, _) = traced(&source.replace("fn create(todo: Todo) {}", "fn create(todo: Todo) { drop(todo); }"));
        assert!(resolutions[0].is_current(&candidates[0], &index));

        let (candidates, index, _) = traced(&source.replace("fn create(todo: Todo)", "fn create(todo: Vec<Todo>)"));
        assert!(!resolutions[0].is_current(&candidates[0], &index));

        let (candidates, index, _) = traced(&source.replace("fn unrelated", "fn missing"));
        assert!(!resolutions[1].is_current(&candidates[1], &index));
    }
}
