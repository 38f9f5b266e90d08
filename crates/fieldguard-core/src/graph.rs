use std::collections::{BTreeMap, BTreeSet, VecDeque};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Directed graph of "type T has a property whose element type is U" edges.
///
/// Nodes are element type names. Edges carry the owning property so cut
/// edges can be reported precisely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NestingGraph {
    edges: BTreeMap<String, BTreeMap<String, BTreeSet<String>>>,
}

impl NestingGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: impl Into<String>) {
        self.edges.entry(node.into()).or_default();
    }

    /// Record `owner.property -> target`.
    pub fn add_edge(&mut self, owner: &str, property: &str, target: &str) {
        self.add_node(target);
        self.edges
            .entry(owner.to_string())
            .or_default()
            .entry(target.to_string())
            .or_default()
            .insert(property.to_string());
    }

    pub fn contains(&self, node: &str) -> bool {
        self.edges.contains_key(node)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.edges.keys().map(String::as_str)
    }

    pub fn targets(&self, node: &str) -> impl Iterator<Item = &str> {
        self.edges
            .get(node)
            .into_iter()
            .flat_map(|targets| targets.keys().map(String::as_str))
    }

    /// True when `to` is reachable from `from` through at least zero edges.
    pub fn reaches(&self, from: &str, to: &str) -> bool {
        if from == to {
            return true;
        }
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([from]);
        while let Some(node) = queue.pop_front() {
            if !seen.insert(node) {
                continue;
            }
            for target in self.targets(node) {
                if target == to {
                    return true;
                }
                queue.push_back(target);
            }
        }
        false
    }

    /// An edge `owner -> target` closes a cycle when the target leads back.
    pub fn is_recursive_edge(&self, owner: &str, target: &str) -> bool {
        self.reaches(target, owner)
    }

    /// All `(owner, property, target)` triples that close a cycle.
    pub fn recursive_edges(&self) -> Vec<(String, String, String)> {
        let mut cut = Vec::new();
        for (owner, targets) in &self.edges {
            for (target, properties) in targets {
                if self.is_recursive_edge(owner, target) {
                    for property in properties {
                        cut.push((owner.clone(), property.clone(), target.clone()));
                    }
                }
            }
        }
        cut
    }

    fn adjacency(&self) -> BTreeMap<String, BTreeSet<String>> {
        self.edges
            .iter()
            .map(|(node, targets)| (node.clone(), targets.keys().cloned().collect()))
            .collect()
    }
}

/// Summary of nesting graph structure.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NestingGraphSummary {
    pub nodes: usize,
    pub edges: usize,
}

/// Report for nesting order and cycles.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NestingGraphReport {
    pub summary: NestingGraphSummary,
    /// Leaf-first order (nested types before their owners) when acyclic.
    pub topo_order: Option<Vec<String>>,
    pub cycle: Option<Vec<String>>,
    pub recursive_edges: Vec<String>,
}

/// Build a deterministic nesting report for a graph.
pub fn build_nesting_graph_report(graph: &NestingGraph) -> NestingGraphReport {
    let adjacency = reverse(&graph.adjacency());
    let nodes = adjacency.len();
    let edges = adjacency.values().map(|targets| targets.len()).sum();
    let summary = NestingGraphSummary { nodes, edges };
    let recursive_edges = graph
        .recursive_edges()
        .into_iter()
        .map(|(owner, property, target)| format!("{owner}.{property} -> {target}"))
        .collect();

    match toposort(&adjacency) {
        Ok(order) => NestingGraphReport {
            summary,
            topo_order: Some(order),
            cycle: None,
            recursive_edges,
        },
        Err(cycle) => NestingGraphReport {
            summary,
            topo_order: None,
            cycle: Some(cycle),
            recursive_edges,
        },
    }
}

fn reverse(graph: &BTreeMap<String, BTreeSet<String>>) -> BTreeMap<String, BTreeSet<String>> {
    let mut reversed: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for (node, targets) in graph {
        reversed.entry(node.clone()).or_default();
        for target in targets {
            reversed
                .entry(target.clone())
                .or_default()
                .insert(node.clone());
        }
    }
    reversed
}

fn toposort(graph: &BTreeMap<String, BTreeSet<String>>) -> Result<Vec<String>, Vec<String>> {
    let mut indegree: BTreeMap<String, usize> =
        graph.keys().map(|node| (node.clone(), 0)).collect();
    for targets in graph.values() {
        for target in targets {
            *indegree.entry(target.clone()).or_insert(0) += 1;
        }
    }

    let mut ready: BTreeSet<String> = indegree
        .iter()
        .filter_map(|(node, count)| (*count == 0).then(|| node.clone()))
        .collect();

    let mut order = Vec::with_capacity(graph.len());
    while let Some(node) = ready.pop_first() {
        if let Some(targets) = graph.get(&node) {
            for target in targets {
                if let Some(count) = indegree.get_mut(target) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        ready.insert(target.clone());
                    }
                }
            }
        }
        order.push(node);
    }

    if order.len() == indegree.len() {
        Ok(order)
    } else {
        Err(indegree
            .into_iter()
            .filter_map(|(node, count)| (count > 0).then_some(node))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> NestingGraph {
        let mut graph = NestingGraph::new();
        graph.add_edge("Order", "customer", "Customer");
        graph.add_edge("Customer", "address", "Address");
        graph
    }

    #[test]
    fn topo_order_puts_leaves_first() {
        let report = build_nesting_graph_report(&chain());
        assert_eq!(
            report.topo_order,
            Some(vec![
                "Address".to_string(),
                "Customer".to_string(),
                "Order".to_string()
            ])
        );
        assert!(report.cycle.is_none());
        assert_eq!(report.summary.edges, 2);
    }

    #[test]
    fn self_reference_is_recursive() {
        let mut graph = NestingGraph::new();
        graph.add_edge("Node", "next", "Node");
        assert!(graph.is_recursive_edge("Node", "Node"));
        let report = build_nesting_graph_report(&graph);
        assert_eq!(report.cycle, Some(vec!["Node".to_string()]));
        assert_eq!(report.recursive_edges, vec!["Node.next -> Node".to_string()]);
    }

    #[test]
    fn mutual_recursion_cuts_both_edges() {
        let mut graph = chain();
        graph.add_edge("Employee", "manager", "Manager");
        graph.add_edge("Manager", "reports", "Employee");
        let cut = graph.recursive_edges();
        assert_eq!(cut.len(), 2);
        assert!(!graph.is_recursive_edge("Order", "Customer"));
        assert!(graph.reaches("Order", "Address"));
        assert!(!graph.reaches("Address", "Order"));
    }
}
