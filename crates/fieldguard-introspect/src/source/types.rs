use syn::{GenericArgument, PathArguments, Type};

use fieldguard_core::TypeRef;

/// Convert a syntactic type into a [`TypeRef`].
///
/// References and parentheses are peeled; slices and arrays become `[]`.
/// Returns `None` for types without a nominal shape (trait objects, fn
/// pointers, non-empty tuples).
pub fn type_ref(ty: &Type) -> Option<TypeRef> {
    match ty {
        Type::Path(type_path) if type_path.qself.is_none() => {
            let path = &type_path.path;
            let name = path
                .segments
                .iter()
                .map(|segment| segment.ident.to_string())
                .collect::<Vec<_>>()
                .join("::");
            let mut args = Vec::new();
            if let Some(last) = path.segments.last() {
                if let PathArguments::AngleBracketed(generics) = &last.arguments {
                    for arg in &generics.args {
                        if let GenericArgument::Type(inner) = arg {
                            args.push(type_ref(inner)?);
                        }
                    }
                }
            }
            Some(TypeRef::generic(name, args))
        }
        Type::Reference(reference) => type_ref(&reference.elem),
        Type::Paren(paren) => type_ref(&paren.elem),
        Type::Group(group) => type_ref(&group.elem),
        Type::Slice(slice) => Some(TypeRef::generic("[]", vec![type_ref(&slice.elem)?])),
        Type::Array(array) => Some(TypeRef::generic("[]", vec![type_ref(&array.elem)?])),
        Type::Tuple(tuple) if tuple.elems.is_empty() => Some(TypeRef::named("()")),
        _ => None,
    }
}

/// Unwrap an extractor wrapper (`Json<Todo>` -> `Todo`) when listed.
pub fn unwrap_extractor(ty: TypeRef, wrappers: &[String]) -> TypeRef {
    let is_wrapper = wrappers.iter().any(|wrapper| wrapper == ty.short_name());
    match (is_wrapper, ty.single_arg()) {
        (true, Some(inner)) => inner.clone(),
        _ => ty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> TypeRef {
        let ty: Type = syn::parse_str(text).unwrap();
        type_ref(&ty).unwrap()
    }

    #[test]
    fn converts_paths_and_generics() {
        assert_eq!(parse("models::Todo").name, "models::Todo");
        assert_eq!(parse("&'a Vec<Todo>").to_string(), "Vec<Todo>");
        assert_eq!(parse("[Todo; 4]").to_string(), "[Todo]");
        assert_eq!(parse("HashMap<String, Todo>").args.len(), 2);
    }

    #[test]
    fn rejects_trait_objects() {
        let ty: Type = syn::parse_str("dyn Fn(i32)").unwrap();
        assert!(type_ref(&ty).is_none());
    }

    #[test]
    fn unwraps_listed_extractors_only() {
        let wrappers = vec!["Json".to_string()];
        assert_eq!(unwrap_extractor(parse("Json<Todo>"), &wrappers).name, "Todo");
        assert_eq!(unwrap_extractor(parse("axum::Json<Todo>"), &wrappers).name, "Todo");
        assert_eq!(unwrap_extractor(parse("Vec<Todo>"), &wrappers).name, "Vec");
    }
}
