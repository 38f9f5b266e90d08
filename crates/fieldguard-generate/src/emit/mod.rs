//! Rust source emission for synthesized plans.
//!
//! Three artifacts are produced and meant to be `include!`d into one module
//! of the host program: the validator instance table, the per-type
//! routines, and the per-call-site plans with their lookup table.

mod filters;
mod instances;
mod routines;

use proc_macro2::{Ident, Literal as TokenLiteral, TokenStream};
use quote::quote;

use fieldguard_core::{Literal, RuleCatalog, TypeRef};
use fieldguard_introspect::{IntrospectOptions, TypeShape, TypeUniverse};
use fieldguard_plan::SynthesizedPlans;

use crate::errors::{GenerationError, Result};
use crate::model::{FILTERS_FILE, GeneratedFile, INSTANCES_FILE, ROUTINES_FILE};

pub(crate) const GENERATED_HEADER: &str = "// @generated by fieldguard. Do not edit.\n";

/// Turns synthesized plans into source artifacts.
pub struct Emitter<'a> {
    runtime: syn::Path,
    catalog: &'a RuleCatalog,
    shapes: TypeUniverse,
}

impl<'a> Emitter<'a> {
    pub fn new(runtime_crate: &str, catalog: &'a RuleCatalog, options: &IntrospectOptions) -> Result<Self> {
        let runtime = syn::parse_str::<syn::Path>(runtime_crate)
            .map_err(|err| GenerationError::syntax("path", runtime_crate, err))?;
        Ok(Self {
            runtime,
            catalog,
            shapes: TypeUniverse::new(options.clone()),
        })
    }

    /// Emit the three artifacts in a fixed order.
    pub fn emit(&self, plans: &SynthesizedPlans) -> Result<Vec<GeneratedFile>> {
        Ok(vec![
            GeneratedFile::new(INSTANCES_FILE, render(INSTANCES_FILE, self.instances(plans)?)?),
            GeneratedFile::new(ROUTINES_FILE, render(ROUTINES_FILE, self.routines(plans)?)?),
            GeneratedFile::new(FILTERS_FILE, render(FILTERS_FILE, self.filters(plans)?)?),
        ])
    }

    /// Constructor expression of a rule type with literal arguments.
    fn rule_expr(&self, rule_type: &str, builtin: bool, args: &[Literal]) -> Result<TokenStream> {
        let runtime = &self.runtime;
        let args = args
            .iter()
            .map(|arg| literal_tokens(arg, rule_type == "Range" && builtin))
            .collect::<Result<Vec<_>>>()?;
        if builtin {
            let rule = ident(rule_type)?;
            Ok(quote! { #runtime::rules::#rule::new(#(#args),*) })
        } else {
            let rule = syn::parse_str::<syn::Path>(rule_type)
                .map_err(|err| GenerationError::syntax("rule type", rule_type, err))?;
            Ok(quote! { #rule::new(#(#args),*) })
        }
    }

    /// Statements that hand `access` (an expression of type `&ty`) to the
    /// routine of `target`, unwrapping options, pointers and collections.
    fn delegate(&self, ty: &TypeRef, access: TokenStream, target: &Target) -> TokenStream {
        match self.shapes.classify(ty) {
            TypeShape::Optional(inner) => {
                let body = self.delegate(&inner, quote!(item), target);
                quote! {
                    if let ::std::option::Option::Some(item) = (#access).as_ref() {
                        #body
                    }
                }
            }
            TypeShape::Pointer(inner) => self.delegate(&inner, quote!(&**(#access)), target),
            TypeShape::Sequence(inner) => {
                let seq = &target.seq;
                let mut element = inner;
                let mut item = quote!(item);
                let mut mapped = false;
                while let TypeShape::Pointer(next) = self.shapes.classify(&element) {
                    item = quote!(&**(#item));
                    element = next;
                    mapped = true;
                }
                if mapped {
                    quote! { #seq((#access).into_iter().map(|item| #item), results)?; }
                } else {
                    quote! { #seq(#access, results)?; }
                }
            }
            TypeShape::Single => {
                let check = &target.check;
                let name = &target.name;
                quote! { #check(#access, #name, results)?; }
            }
            TypeShape::Unsupported => TokenStream::new(),
        }
    }

    /// Function names of the routine for a type.
    fn target(&self, plans: &SynthesizedPlans, type_name: &str) -> Result<Target> {
        let routine = plans.routine(type_name).ok_or_else(|| {
            GenerationError::InvalidPlan(format!("no routine for delegated type `{type_name}`"))
        })?;
        Target::new(type_name, &routine.function)
    }

    fn type_tokens(&self, ty: &TypeRef) -> Result<syn::Type> {
        let text = ty.to_string();
        syn::parse_str::<syn::Type>(&text).map_err(|err| GenerationError::syntax("type", &text, err))
    }
}

/// Routine functions generated for one type.
struct Target {
    name: String,
    validate: Ident,
    seq: Ident,
    check: Ident,
}

impl Target {
    fn new(type_name: &str, function: &str) -> Result<Self> {
        let stem = function.strip_prefix("validate_").unwrap_or(function);
        Ok(Self {
            name: type_name.to_string(),
            validate: ident(function)?,
            seq: ident(&format!("{function}_seq"))?,
            check: ident(&format!("check_{stem}"))?,
        })
    }
}

pub(crate) fn ident(text: &str) -> Result<Ident> {
    syn::parse_str::<Ident>(text).map_err(|err| GenerationError::syntax("identifier", text, err))
}

/// Field access chain `value.a.b`.
pub(crate) fn accessor(base: TokenStream, path: &[String]) -> Result<TokenStream> {
    let fields = path.iter().map(|field| ident(field)).collect::<Result<Vec<_>>>()?;
    Ok(quote! { #base #(.#fields)* })
}

fn literal_tokens(literal: &Literal, wide: bool) -> Result<TokenStream> {
    Ok(match literal {
        Literal::Bool(value) => quote!(#value),
        Literal::Int(value) if wide => {
            let lit = TokenLiteral::i64_suffixed(*value);
            quote!(#lit)
        }
        Literal::Int(value) => {
            let lit = TokenLiteral::i64_unsuffixed(*value);
            quote!(#lit)
        }
        Literal::Float(text) => {
            let value = text
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .ok_or_else(|| GenerationError::InvalidPlan(format!("`{text}` is not a finite float")))?;
            let lit = TokenLiteral::f64_suffixed(value);
            quote!(#lit)
        }
        Literal::Str(value) => {
            let lit = TokenLiteral::string(value);
            quote!(#lit)
        }
    })
}

/// Pretty-printed file after the header.
fn render(name: &str, items: Vec<TokenStream>) -> Result<String> {
    let file: syn::File = syn::parse2(quote! { #(#items)* })
        .map_err(|err| GenerationError::syntax("generated file", name, err))?;
    let mut out = String::from(GENERATED_HEADER);
    out.push('\n');
    out.push_str(&prettyplease::unparse(&file));
    Ok(out)
}
