use convert_case::{Case, Casing};
use proc_macro2::TokenStream;
use quote::ToTokens;
use syn::meta::ParseNestedMeta;
use syn::parse::ParseStream;
use syn::punctuated::Punctuated;
use syn::{Attribute, Expr, ExprLit, ExprUnary, Lit, LitStr, Meta, Token, UnOp};

use fieldguard_core::{Literal, ValidationAnnotation};

/// Annotations read from a member's attributes plus anything unreadable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationParse {
    pub annotations: Vec<ValidationAnnotation>,
    pub problems: Vec<String>,
}

/// Collect `#[<attribute>(...)]` constraints, including ones behind `cfg_attr`.
pub fn validation_annotations(attrs: &[Attribute], attribute: &str) -> AnnotationParse {
    let mut parsed = AnnotationParse::default();
    for attr in attrs {
        let metas = if attr.path().is_ident(attribute) {
            attr.parse_args_with(Punctuated::<Meta, Token![,]>::parse_terminated)
                .map(|metas| metas.into_iter().collect::<Vec<_>>())
        } else if attr.path().is_ident("cfg_attr") {
            match cfg_attr_targets(attr, attribute) {
                Ok(metas) => Ok(metas),
                Err(_) => continue,
            }
        } else {
            continue;
        };

        match metas {
            Ok(metas) => {
                for meta in &metas {
                    match annotation(meta) {
                        Ok(annotation) => parsed.annotations.push(annotation),
                        Err(problem) => parsed.problems.push(problem),
                    }
                }
            }
            Err(err) => parsed
                .problems
                .push(format!("malformed `{attribute}` attribute: {err}")),
        }
    }
    parsed
}

fn cfg_attr_targets(attr: &Attribute, attribute: &str) -> syn::Result<Vec<Meta>> {
    let nested = attr.parse_args_with(|input: ParseStream| {
        let _predicate: Meta = input.parse()?;
        input.parse::<Token![,]>()?;
        Punctuated::<Meta, Token![,]>::parse_terminated(input)
    })?;

    let mut metas = Vec::new();
    for meta in nested {
        if let Meta::List(list) = meta {
            if list.path.is_ident(attribute) {
                metas.extend(list.parse_args_with(Punctuated::<Meta, Token![,]>::parse_terminated)?);
            }
        }
    }
    Ok(metas)
}

fn annotation(meta: &Meta) -> Result<ValidationAnnotation, String> {
    match meta {
        Meta::Path(path) => Ok(ValidationAnnotation::marker(path_name(path))),
        Meta::NameValue(pair) => Ok(ValidationAnnotation::new(
            path_name(&pair.path),
            vec![literal(&pair.value)?],
        )),
        Meta::List(list) => {
            let kind = path_name(&list.path);
            let args = list
                .parse_args_with(Punctuated::<Expr, Token![,]>::parse_terminated)
                .map_err(|err| format!("`{kind}` arguments are not expressions: {err}"))?;
            let args = args.iter().map(literal).collect::<Result<Vec<_>, _>>()?;
            Ok(ValidationAnnotation::new(kind, args))
        }
    }
}

fn path_name(path: &syn::Path) -> String {
    path.segments
        .iter()
        .map(|segment| segment.ident.to_string())
        .collect::<Vec<_>>()
        .join("::")
}

/// Evaluate a constant constructor argument.
pub fn literal(expr: &Expr) -> Result<Literal, String> {
    match expr {
        Expr::Lit(ExprLit { lit, .. }) => match lit {
            Lit::Int(int) => int
                .base10_parse::<i64>()
                .map(Literal::Int)
                .map_err(|err| format!("integer `{int}` out of range: {err}")),
            Lit::Float(float) => Ok(Literal::Float(float.base10_digits().to_string())),
            Lit::Str(text) => Ok(Literal::Str(text.value())),
            Lit::Bool(flag) => Ok(Literal::Bool(flag.value)),
            other => Err(format!(
                "unsupported literal `{}`",
                other.to_token_stream()
            )),
        },
        Expr::Unary(ExprUnary {
            op: UnOp::Neg(_),
            expr,
            ..
        }) => match literal(expr)? {
            Literal::Int(value) => value
                .checked_neg()
                .map(Literal::Int)
                .ok_or_else(|| format!("integer `-{value}` out of range")),
            Literal::Float(text) => Ok(Literal::Float(format!("-{text}"))),
            other => Err(format!("cannot negate {} literal", other.kind_name())),
        },
        Expr::Paren(paren) => literal(&paren.expr),
        Expr::Group(group) => literal(&group.expr),
        Expr::Assign(assign) => literal(&assign.right),
        Expr::Path(path) if path.qself.is_none() => {
            let name = path_name(&path.path);
            bound_constant(&name)
                .map(Literal::Int)
                .ok_or_else(|| format!("unsupported constant `{name}`"))
        }
        other => Err(format!(
            "unsupported argument `{}`",
            other.to_token_stream()
        )),
    }
}

fn bound_constant(name: &str) -> Option<i64> {
    let name = name.strip_prefix("std::").or_else(|| name.strip_prefix("core::")).unwrap_or(name);
    let value = match name {
        "i8::MIN" => i8::MIN as i64,
        "i8::MAX" => i8::MAX as i64,
        "u8::MAX" => u8::MAX as i64,
        "i16::MIN" => i16::MIN as i64,
        "i16::MAX" => i16::MAX as i64,
        "u16::MAX" => u16::MAX as i64,
        "i32::MIN" => i32::MIN as i64,
        "i32::MAX" => i32::MAX as i64,
        "u32::MAX" => u32::MAX as i64,
        "i64::MIN" => i64::MIN,
        "i64::MAX" => i64::MAX,
        "u8::MIN" | "u16::MIN" | "u32::MIN" | "u64::MIN" | "usize::MIN" => 0,
        _ => return None,
    };
    Some(value)
}

/// Serde settings of one field that affect validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SerdeField {
    pub rename: Option<String>,
    pub flatten: bool,
    pub problems: Vec<String>,
}

/// Serde settings of a container that affect validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SerdeContainer {
    pub rename_all: Option<String>,
    pub problems: Vec<String>,
}

/// Read `#[serde(rename = "..")]` and `#[serde(flatten)]` from a field.
pub fn serde_field(attrs: &[Attribute]) -> SerdeField {
    let mut field = SerdeField::default();
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("serde")) {
        let parsed = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("flatten") {
                field.flatten = true;
                Ok(())
            } else if meta.path.is_ident("rename") {
                field.rename = renamed(&meta)?.or(field.rename.take());
                Ok(())
            } else {
                skip_value(&meta)
            }
        });
        if let Err(err) = parsed {
            field.problems.push(format!("unreadable serde attribute: {err}"));
        }
    }
    field
}

/// Read `#[serde(rename_all = "..")]` from a container.
pub fn serde_container(attrs: &[Attribute]) -> SerdeContainer {
    let mut container = SerdeContainer::default();
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("serde")) {
        let parsed = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename_all") {
                container.rename_all = renamed(&meta)?;
                Ok(())
            } else {
                skip_value(&meta)
            }
        });
        if let Err(err) = parsed {
            container.problems.push(format!("unreadable serde attribute: {err}"));
        }
    }
    container
}

/// `rename = "x"` or `rename(deserialize = "x")`; the deserialize name wins.
fn renamed(meta: &ParseNestedMeta<'_>) -> syn::Result<Option<String>> {
    if meta.input.peek(Token![=]) {
        let value: LitStr = meta.value()?.parse()?;
        return Ok(Some(value.value()));
    }
    let mut name = None;
    meta.parse_nested_meta(|inner| {
        let value: LitStr = inner.value()?.parse()?;
        if inner.path.is_ident("deserialize") || name.is_none() {
            name = Some(value.value());
        }
        Ok(())
    })?;
    Ok(name)
}

fn skip_value(meta: &ParseNestedMeta<'_>) -> syn::Result<()> {
    if meta.input.peek(Token![=]) {
        let _: Expr = meta.value()?.parse()?;
    } else if meta.input.peek(syn::token::Paren) {
        let content;
        syn::parenthesized!(content in meta.input);
        let _: TokenStream = content.parse()?;
    }
    Ok(())
}

/// Apply a serde `rename_all` rule to a snake_case field name.
pub fn apply_rename_rule(rule: &str, field: &str) -> String {
    match rule {
        "lowercase" => field.to_ascii_lowercase(),
        "UPPERCASE" => field.to_ascii_uppercase(),
        "PascalCase" => field.to_case(Case::Pascal),
        "camelCase" => field.to_case(Case::Camel),
        "snake_case" => field.to_string(),
        "SCREAMING_SNAKE_CASE" => field.to_ascii_uppercase(),
        "kebab-case" => field.replace('_', "-"),
        "SCREAMING-KEBAB-CASE" => field.to_ascii_uppercase().replace('_', "-"),
        _ => field.to_string(),
    }
}
