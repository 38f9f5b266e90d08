use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use fieldguard_core::TypeRef;
use fieldguard_core::fingerprint::fingerprint;

use crate::descriptor::TypeDescriptor;
use crate::errors::Result;

/// Structural classification of a type reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TypeShape {
    /// Plain type; may or may not be described.
    Single,
    /// `Option<T>`.
    Optional(TypeRef),
    /// `Box<T>` and friends.
    Pointer(TypeRef),
    /// Single-argument collection of `T`.
    Sequence(TypeRef),
    /// Keyed or multi-argument collection.
    Unsupported,
}

/// Metadata provider consulted by the type-graph extractor.
///
/// Implementations must be shareable across the extraction worker pool.
pub trait TypeIntrospector: Send + Sync {
    /// Identifier used in logs (`memory`, `source`).
    fn origin(&self) -> &'static str;

    /// Member metadata for a nominal type, if known.
    fn describe(&self, ty: &TypeRef) -> Option<&TypeDescriptor>;

    /// Structural shape of a type reference.
    fn classify(&self, ty: &TypeRef) -> TypeShape;

    /// Fingerprint of everything extraction can observe from `ty`: the shape
    /// of every type reference reachable through wrappers, members and bases,
    /// and the descriptor (or its absence) of each. Descriptors outside that
    /// closure do not affect it.
    fn reachable_fingerprint(&self, ty: &TypeRef) -> Result<String> {
        let mut seen = BTreeSet::new();
        let mut reached: BTreeMap<String, (TypeShape, Option<&TypeDescriptor>)> = BTreeMap::new();
        let mut pending = vec![ty.clone()];

        while let Some(current) = pending.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            let shape = self.classify(&current);
            let descriptor = match &shape {
                TypeShape::Optional(inner) | TypeShape::Pointer(inner) | TypeShape::Sequence(inner) => {
                    pending.push(inner.clone());
                    None
                }
                TypeShape::Unsupported => {
                    pending.extend(current.args.iter().cloned());
                    None
                }
                TypeShape::Single => {
                    let descriptor = self.describe(&current);
                    if let Some(descriptor) = descriptor {
                        pending.extend(descriptor.properties.iter().map(|property| property.ty.clone()));
                        pending.extend(descriptor.bases.iter().map(|base| base.ty.clone()));
                    }
                    descriptor
                }
            };
            reached.insert(current.to_string(), (shape, descriptor));
        }
        Ok(fingerprint(&reached)?)
    }
}
