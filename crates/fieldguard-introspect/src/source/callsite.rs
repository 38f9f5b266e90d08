use quote::ToTokens;
use syn::visit::{self, Visit};
use syn::{
    Block, Expr, ExprClosure, ExprLit, ExprMethodCall, ImplItemFn, Item, ItemFn, Lit, Local, Pat,
    Signature, Stmt,
};

use fieldguard_core::SourceLocation;
use fieldguard_core::fingerprint::FingerprintBuilder;

use crate::options::IntrospectOptions;

use super::ParsedUnit;

/// A name visible at a call site, innermost declarations first.
#[derive(Debug, Clone)]
pub enum Binding {
    /// `let name = init;`
    Let {
        name: String,
        init: Option<Expr>,
        mutable: bool,
    },
    /// Block-local `fn` item.
    Fn { name: String, sig: Signature },
    /// Function or closure parameter; opaque to resolution.
    Param { name: String },
}

impl Binding {
    pub fn name(&self) -> &str {
        match self {
            Binding::Let { name, .. } | Binding::Fn { name, .. } | Binding::Param { name } => name,
        }
    }
}

/// A matched handler registration with everything resolution needs.
#[derive(Debug, Clone)]
pub struct CallSiteCandidate {
    pub location: SourceLocation,
    /// Mapping method name (`map_post`).
    pub method: String,
    pub route: String,
    pub handler: Expr,
    /// Bindings in scope at the registration, innermost first.
    pub scope: Vec<Binding>,
    /// Fingerprint of the registration's own tokens and location. Names the
    /// handler refers to are tracked separately by the resolver.
    pub fingerprint: String,
}

/// Find every `<mapping>(route, handler)...<marker>()` chain in a unit.
pub fn find_call_sites(unit: &ParsedUnit, options: &IntrospectOptions) -> Vec<CallSiteCandidate> {
    let mut finder = CallSiteFinder {
        options,
        file: &unit.path,
        frames: Vec::new(),
        found: Vec::new(),
    };
    finder.visit_file(&unit.file);
    finder.found
}

struct CallSiteFinder<'a> {
    options: &'a IntrospectOptions,
    file: &'a str,
    frames: Vec<Vec<Binding>>,
    found: Vec<CallSiteCandidate>,
}

impl CallSiteFinder<'_> {
    fn snapshot(&self) -> Vec<Binding> {
        self.frames
            .iter()
            .rev()
            .flat_map(|frame| frame.iter().rev().cloned())
            .collect()
    }

    fn with_params<F>(&mut self, names: Vec<String>, visit_body: F)
    where
        F: FnOnce(&mut Self),
    {
        self.frames
            .push(names.into_iter().map(|name| Binding::Param { name }).collect());
        visit_body(self);
        self.frames.pop();
    }

    fn record(&mut self, marker: &ExprMethodCall, mapping: &ExprMethodCall) {
        let line = marker.method.span().start().line as u32;
        let location = SourceLocation::new(self.file, line);
        let route = match mapping.args.first() {
            Some(Expr::Lit(ExprLit {
                lit: Lit::Str(text), ..
            })) => text.value(),
            Some(other) => other.to_token_stream().to_string(),
            None => String::new(),
        };
        let Some(handler) = mapping.args.last().cloned() else {
            return;
        };
        let fingerprint = FingerprintBuilder::new()
            .field(marker.to_token_stream().to_string())
            .field(location.to_string())
            .finish();

        self.found.push(CallSiteCandidate {
            location,
            method: mapping.method.to_string(),
            route,
            handler,
            scope: self.snapshot(),
            fingerprint,
        });
    }
}

/// Walk the receiver chain of a marker call down to its mapping call.
fn mapping_call<'e>(receiver: &'e Expr, options: &IntrospectOptions) -> Option<&'e ExprMethodCall> {
    let mut current = receiver;
    loop {
        match current {
            Expr::MethodCall(call) => {
                if options.is_mapping_method(&call.method.to_string()) && call.args.len() >= 2 {
                    return Some(call);
                }
                current = &call.receiver;
            }
            Expr::Paren(paren) => current = &paren.expr,
            Expr::Group(group) => current = &group.expr,
            Expr::Reference(reference) => current = &reference.expr,
            _ => return None,
        }
    }
}

fn pattern_names(pat: &Pat, names: &mut Vec<String>) {
    match pat {
        Pat::Ident(ident) => names.push(ident.ident.to_string()),
        Pat::Type(typed) => pattern_names(&typed.pat, names),
        Pat::Reference(reference) => pattern_names(&reference.pat, names),
        Pat::TupleStruct(tuple) => tuple.elems.iter().for_each(|elem| pattern_names(elem, names)),
        Pat::Tuple(tuple) => tuple.elems.iter().for_each(|elem| pattern_names(elem, names)),
        Pat::Struct(fields) => fields
            .fields
            .iter()
            .for_each(|field| pattern_names(&field.pat, names)),
        _ => {}
    }
}

fn signature_params(sig: &Signature) -> Vec<String> {
    let mut names = Vec::new();
    for input in &sig.inputs {
        if let syn::FnArg::Typed(typed) = input {
            pattern_names(&typed.pat, &mut names);
        }
    }
    names
}

fn local_binding(local: &Local) -> Vec<Binding> {
    let init = local
        .init
        .as_ref()
        .filter(|init| init.diverge.is_none())
        .map(|init| (*init.expr).clone());
    let pat = match &local.pat {
        Pat::Type(typed) => &*typed.pat,
        other => other,
    };
    match pat {
        Pat::Ident(ident) if ident.subpat.is_none() => vec![Binding::Let {
            name: ident.ident.to_string(),
            init,
            mutable: ident.mutability.is_some(),
        }],
        // Destructured names shadow outer ones but cannot be resolved.
        other => {
            let mut names = Vec::new();
            pattern_names(other, &mut names);
            names.into_iter().map(|name| Binding::Param { name }).collect()
        }
    }
}

impl<'ast> Visit<'ast> for CallSiteFinder<'_> {
    fn visit_item_fn(&mut self, item: &'ast ItemFn) {
        let params = signature_params(&item.sig);
        self.with_params(params, |finder| visit::visit_item_fn(finder, item));
    }

    fn visit_impl_item_fn(&mut self, item: &'ast ImplItemFn) {
        let params = signature_params(&item.sig);
        self.with_params(params, |finder| visit::visit_impl_item_fn(finder, item));
    }

    fn visit_expr_closure(&mut self, closure: &'ast ExprClosure) {
        let mut params = Vec::new();
        for input in &closure.inputs {
            pattern_names(input, &mut params);
        }
        self.with_params(params, |finder| visit::visit_expr_closure(finder, closure));
    }

    fn visit_block(&mut self, block: &'ast Block) {
        // Items are visible in the whole block, `let` bindings only after
        // their statement.
        let mut frame = Vec::new();
        for stmt in &block.stmts {
            match stmt {
                Stmt::Item(Item::Fn(item)) => frame.push(Binding::Fn {
                    name: item.sig.ident.to_string(),
                    sig: item.sig.clone(),
                }),
                Stmt::Item(Item::Const(item)) => frame.push(Binding::Let {
                    name: item.ident.to_string(),
                    init: Some((*item.expr).clone()),
                    mutable: false,
                }),
                Stmt::Item(Item::Static(item)) => frame.push(Binding::Let {
                    name: item.ident.to_string(),
                    init: Some((*item.expr).clone()),
                    mutable: matches!(item.mutability, syn::StaticMutability::Mut(_)),
                }),
                _ => {}
            }
        }
        self.frames.push(frame);

        for stmt in &block.stmts {
            self.visit_stmt(stmt);
            if let Stmt::Local(local) = stmt {
                let bindings = local_binding(local);
                if let Some(frame) = self.frames.last_mut() {
                    frame.extend(bindings);
                }
            }
        }
        self.frames.pop();
    }

    fn visit_expr_method_call(&mut self, call: &'ast ExprMethodCall) {
        if call.method == self.options.marker_method.as_str() && call.args.is_empty() {
            if let Some(mapping) = mapping_call(&call.receiver, self.options) {
                self.record(call, mapping);
            }
        }
        visit::visit_expr_method_call(self, call);
    }
}
