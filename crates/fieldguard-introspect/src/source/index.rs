use std::collections::BTreeMap;

use syn::{Expr, ImplItem, Item, Signature, StaticMutability, Type};

use super::ParsedUnit;

/// A module-level function or method signature.
#[derive(Debug, Clone)]
pub struct IndexedFn {
    pub file: String,
    pub sig: Signature,
}

/// A module-level `const` or `static` initializer.
#[derive(Debug, Clone)]
pub struct IndexedValue {
    pub file: String,
    pub init: Expr,
    pub mutable: bool,
}

/// Module-level declarations a handler reference may resolve to.
///
/// Only signatures and initializers are indexed; function bodies never
/// influence resolution.
#[derive(Debug, Clone, Default)]
pub struct DeclarationIndex {
    fns: BTreeMap<String, Vec<IndexedFn>>,
    methods: BTreeMap<String, Vec<IndexedFn>>,
    values: BTreeMap<String, Vec<IndexedValue>>,
}

impl DeclarationIndex {
    pub fn build(units: &[ParsedUnit]) -> Self {
        let mut index = Self::default();
        let mut ordered: Vec<&ParsedUnit> = units.iter().collect();
        ordered.sort_by(|left, right| left.path.cmp(&right.path));

        for unit in ordered {
            index.collect(&unit.path, &unit.file.items);
        }
        index
    }

    fn collect(&mut self, file: &str, items: &[Item]) {
        for item in items {
            match item {
                Item::Fn(item_fn) => {
                    self.fns
                        .entry(item_fn.sig.ident.to_string())
                        .or_default()
                        .push(IndexedFn {
                            file: file.to_string(),
                            sig: item_fn.sig.clone(),
                        });
                }
                Item::Const(item_const) => {
                    self.values
                        .entry(item_const.ident.to_string())
                        .or_default()
                        .push(IndexedValue {
                            file: file.to_string(),
                            init: (*item_const.expr).clone(),
                            mutable: false,
                        });
                }
                Item::Static(item_static) => {
                    self.values
                        .entry(item_static.ident.to_string())
                        .or_default()
                        .push(IndexedValue {
                            file: file.to_string(),
                            init: (*item_static.expr).clone(),
                            mutable: matches!(item_static.mutability, StaticMutability::Mut(_)),
                        });
                }
                Item::Impl(item_impl) => {
                    let Some(owner) = self_type_name(&item_impl.self_ty) else {
                        continue;
                    };
                    for impl_item in &item_impl.items {
                        if let ImplItem::Fn(method) = impl_item {
                            self.methods
                                .entry(format!("{owner}::{}", method.sig.ident))
                                .or_default()
                                .push(IndexedFn {
                                    file: file.to_string(),
                                    sig: method.sig.clone(),
                                });
                        }
                    }
                }
                Item::Mod(item_mod) => {
                    if let Some((_, nested)) = &item_mod.content {
                        self.collect(file, nested);
                    }
                }
                _ => {}
            }
        }
    }

    pub fn function(&self, name: &str, file: &str) -> Option<&IndexedFn> {
        pick(self.fns.get(name)?, file, |entry| &entry.file)
    }

    pub fn method(&self, owner: &str, name: &str) -> Option<&IndexedFn> {
        let entries = self.methods.get(&format!("{owner}::{name}"))?;
        match entries.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    pub fn value(&self, name: &str, file: &str) -> Option<&IndexedValue> {
        pick(self.values.get(name)?, file, |entry| &entry.file)
    }
}

/// Prefer a declaration from the same file, else the only one; ambiguous
/// names resolve to nothing.
fn pick<'a, T>(entries: &'a [T], file: &str, file_of: impl Fn(&T) -> &String) -> Option<&'a T> {
    let mut local = entries
        .iter()
        .filter(|entry| file_of(*entry).as_str() == file);
    if let Some(first) = local.next() {
        return local.next().is_none().then_some(first);
    }
    match entries {
        [only] => Some(only),
        _ => None,
    }
}

fn self_type_name(ty: &Type) -> Option<String> {
    match ty {
        Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .map(|segment| segment.ident.to_string()),
        _ => None,
    }
}
