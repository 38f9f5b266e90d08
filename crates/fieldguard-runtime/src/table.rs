use std::collections::BTreeMap;
use std::sync::Arc;

use crate::filter::{EndpointFilter, PlanEvaluator};

/// Immutable map from call-site location to plan key to evaluator.
///
/// Generated code builds one inside a `LazyLock`; after that it is only
/// read.
#[derive(Clone, Default)]
pub struct PlanTable {
    plans: BTreeMap<String, Arc<dyn PlanEvaluator>>,
    locations: BTreeMap<(String, u32), String>,
}

impl PlanTable {
    pub fn builder() -> PlanTableBuilder {
        PlanTableBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.plans.keys().map(String::as_str)
    }

    /// Plan key registered for a location.
    ///
    /// Paths match exactly first; otherwise a unique entry whose path ends
    /// with the other on a `/` boundary is accepted, so crate-relative and
    /// workspace-relative paths meet.
    pub fn key_at(&self, file: &str, line: u32) -> Option<&str> {
        let file = file.replace('\\', "/");
        if let Some(key) = self.locations.get(&(file.clone(), line)) {
            return Some(key.as_str());
        }
        let mut matches = self
            .locations
            .iter()
            .filter(|((stored, stored_line), _)| *stored_line == line && same_file(stored, &file))
            .map(|(_, key)| key.as_str());
        match (matches.next(), matches.next()) {
            (Some(key), None) => Some(key),
            _ => None,
        }
    }

    pub fn lookup(&self, file: &str, line: u32) -> Option<EndpointFilter> {
        let key = self.key_at(file, line)?;
        let evaluator = self.plans.get(key)?;
        Some(EndpointFilter::new(key, Arc::clone(evaluator)))
    }
}

impl std::fmt::Debug for PlanTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanTable")
            .field("plans", &self.plans.keys().collect::<Vec<_>>())
            .field("locations", &self.locations)
            .finish()
    }
}

pub(crate) fn same_file(left: &str, right: &str) -> bool {
    let suffix = |long: &str, short: &str| {
        long.len() > short.len() && long.ends_with(short) && long[..long.len() - short.len()].ends_with('/')
    };
    suffix(left, right) || suffix(right, left)
}

#[derive(Default)]
pub struct PlanTableBuilder {
    table: PlanTable,
}

impl PlanTableBuilder {
    pub fn plan(mut self, key: &str, evaluator: impl PlanEvaluator + 'static) -> Self {
        self.table.plans.insert(key.to_string(), Arc::new(evaluator));
        self
    }

    pub fn location(mut self, file: &str, line: u32, key: &str) -> Self {
        self.table
            .locations
            .insert((file.replace('\\', "/"), line), key.to_string());
        self
    }

    pub fn build(self) -> PlanTable {
        self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ValidationResult;
    use crate::errors::ValidationFault;
    use crate::filter::InvocationContext;

    fn ok(_: &InvocationContext) -> Result<Vec<ValidationResult>, ValidationFault> {
        Ok(Vec::new())
    }

    fn table() -> PlanTable {
        PlanTable::builder()
            .plan("a1", ok)
            .location("src/main.rs", 12, "a1")
            .location("src/api.rs", 12, "a1")
            .build()
    }

    #[test]
    fn exact_and_suffix_lookup() {
        let table = table();
        assert_eq!(table.key_at("src/main.rs", 12), Some("a1"));
        assert_eq!(table.key_at("app/src/main.rs", 12), Some("a1"));
        assert_eq!(table.key_at("app\\src\\main.rs", 12), Some("a1"));
        assert_eq!(table.key_at("src/main.rs", 13), None);
        assert_eq!(table.key_at("xsrc/main.rs", 12), None);
    }

    #[test]
    fn lookup_needs_a_registered_plan() {
        let table = PlanTable::builder().location("src/main.rs", 3, "missing").build();
        assert!(table.lookup("src/main.rs", 3).is_none());
        assert_eq!(self::table().lookup("src/main.rs", 12).unwrap().key(), "a1");
    }
}
