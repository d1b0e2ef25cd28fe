//! Dependency graph over registered artifacts.
//!
//! Edges point from a dependent artifact to each artifact filling one of its
//! slots. The graph is validated once (every slot resolves, no cycles) and then
//! exposes a deterministic topological order.

use std::{
    cmp::Reverse,
    collections::{BTreeMap, BTreeSet, BinaryHeap},
};

use crate::{AddressTable, ArtifactId, ArtifactRegistry, DeployError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Read-only, validated dependency graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyGraph {
    /// Registry artifacts, dependencies first.
    order: Vec<ArtifactId>,
    /// Outgoing edges (dependent -> dependencies), by registry index.
    edges: Vec<Vec<usize>>,
    nodes: Vec<ArtifactId>,
    /// Dependencies satisfied by a seeded address table instead of the registry.
    external: BTreeMap<ArtifactId, BTreeSet<ArtifactId>>,
}

impl DependencyGraph {
    /// Build the graph from the registry alone.
    pub fn build(registry: &ArtifactRegistry) -> Result<Self, DeployError> {
        Self::build_with_external(registry, &AddressTable::default())
    }

    /// Build the graph, accepting slots that point at artifacts recorded in
    /// `deployed` even when they are not registered.
    pub fn build_with_external(
        registry: &ArtifactRegistry,
        deployed: &AddressTable,
    ) -> Result<Self, DeployError> {
        let nodes: Vec<ArtifactId> = registry.iter().map(|a| a.id().clone()).collect();
        let mut edges = Vec::with_capacity(nodes.len());
        let mut external: BTreeMap<ArtifactId, BTreeSet<ArtifactId>> = BTreeMap::new();

        for artifact in registry {
            let mut targets = Vec::new();
            for dependency in artifact.dependencies() {
                match registry.position(dependency) {
                    Some(index) => targets.push(index),
                    None if deployed.contains(dependency) => {
                        external
                            .entry(dependency.clone())
                            .or_default()
                            .insert(artifact.id().clone());
                    }
                    None => {
                        return Err(DeployError::UnresolvedDependency {
                            artifact: artifact.id().clone(),
                            dependency: dependency.clone(),
                        });
                    }
                }
            }
            edges.push(targets);
        }

        if let Some(cycle) = find_cycle(&edges) {
            return Err(DeployError::CyclicDependency(
                cycle.into_iter().map(|i| nodes[i].clone()).collect(),
            ));
        }

        let order = topological_order(&edges)
            .into_iter()
            .map(|i| nodes[i].clone())
            .collect();

        Ok(Self {
            order,
            edges,
            nodes,
            external,
        })
    }

    /// Deployment order: every dependency precedes its dependents.
    pub fn order(&self) -> &[ArtifactId] {
        &self.order
    }

    /// Registered artifacts the given artifact depends on.
    pub fn dependencies(&self, id: &ArtifactId) -> Vec<&ArtifactId> {
        self.index_of(id)
            .map(|i| self.edges[i].iter().map(|&d| &self.nodes[d]).collect())
            .unwrap_or_default()
    }

    /// Registered artifacts that depend on the given artifact.
    pub fn dependents(&self, id: &ArtifactId) -> Vec<&ArtifactId> {
        let Some(target) = self.index_of(id) else {
            return self
                .external
                .get(id)
                .map(|dependents| dependents.iter().collect())
                .unwrap_or_default();
        };

        self.edges
            .iter()
            .enumerate()
            .filter(|(_, targets)| targets.contains(&target))
            .map(|(i, _)| &self.nodes[i])
            .collect()
    }

    /// Dependencies resolved from the seed table, with the artifacts using them.
    pub fn external(&self) -> &BTreeMap<ArtifactId, BTreeSet<ArtifactId>> {
        &self.external
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn index_of(&self, id: &ArtifactId) -> Option<usize> {
        self.nodes.iter().position(|node| node == id)
    }
}

/// Depth-first search with three-colour marking. Returns the first cycle found
/// as a path whose first and last entries are the same node.
fn find_cycle(edges: &[Vec<usize>]) -> Option<Vec<usize>> {
    let mut marks = vec![Mark::Unvisited; edges.len()];
    let mut path = Vec::new();

    for root in 0..edges.len() {
        if marks[root] == Mark::Unvisited {
            if let Some(cycle) = visit(root, edges, &mut marks, &mut path) {
                return Some(cycle);
            }
        }
    }
    None
}

fn visit(
    node: usize,
    edges: &[Vec<usize>],
    marks: &mut [Mark],
    path: &mut Vec<usize>,
) -> Option<Vec<usize>> {
    marks[node] = Mark::InProgress;
    path.push(node);

    for &next in &edges[node] {
        match marks[next] {
            Mark::InProgress => {
                let start = path.iter().position(|&n| n == next).unwrap_or(0);
                let mut cycle = path[start..].to_vec();
                cycle.push(next);
                return Some(cycle);
            }
            Mark::Unvisited => {
                if let Some(cycle) = visit(next, edges, marks, path) {
                    return Some(cycle);
                }
            }
            Mark::Done => {}
        }
    }

    path.pop();
    marks[node] = Mark::Done;
    None
}

/// Kahn's algorithm over an acyclic graph. Among ready nodes the one
/// registered first is emitted first.
fn topological_order(edges: &[Vec<usize>]) -> Vec<usize> {
    let mut pending: Vec<usize> = edges.iter().map(Vec::len).collect();
    let mut dependents = vec![Vec::new(); edges.len()];
    for (node, targets) in edges.iter().enumerate() {
        for &target in targets {
            dependents[target].push(node);
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = pending
        .iter()
        .enumerate()
        .filter(|&(_, &count)| count == 0)
        .map(|(node, _)| Reverse(node))
        .collect();

    let mut order = Vec::with_capacity(edges.len());
    while let Some(Reverse(node)) = ready.pop() {
        order.push(node);
        for &dependent in &dependents[node] {
            pending[dependent] -= 1;
            if pending[dependent] == 0 {
                ready.push(Reverse(dependent));
            }
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Artifact, DependencySlot, artifact::legacy_placeholder};

    fn artifact(name: &str, deps: &[&str]) -> Artifact {
        let payload: String = std::iter::once("6080".to_string())
            .chain(deps.iter().map(|d| legacy_placeholder(d)))
            .collect();
        let slots = deps.iter().map(|d| DependencySlot::legacy(*d)).collect();
        Artifact::new(name, payload, slots, vec![]).unwrap()
    }

    fn registry(entries: &[(&str, &[&str])]) -> ArtifactRegistry {
        let mut registry = ArtifactRegistry::new();
        for (name, deps) in entries {
            registry.register(artifact(name, deps)).unwrap();
        }
        registry
    }

    fn names(order: &[ArtifactId]) -> Vec<&str> {
        order.iter().map(ArtifactId::as_str).collect()
    }

    #[test]
    fn test_two_node_order() {
        let registry = registry(&[("Exchange", &["Arithmetic"]), ("Arithmetic", &[])]);
        let graph = DependencyGraph::build(&registry).unwrap();
        assert_eq!(names(graph.order()), vec!["Arithmetic", "Exchange"]);
        assert_eq!(
            graph.dependencies(&"Exchange".into()),
            vec![&ArtifactId::from("Arithmetic")]
        );
        assert_eq!(
            graph.dependents(&"Arithmetic".into()),
            vec![&ArtifactId::from("Exchange")]
        );
    }

    #[test]
    fn test_order_respects_every_edge() {
        let registry = registry(&[
            ("App", &["Router", "Oracle"]),
            ("Router", &["Math", "Tokens"]),
            ("Oracle", &["Math"]),
            ("Tokens", &[]),
            ("Math", &[]),
            ("Standalone", &[]),
        ]);
        let graph = DependencyGraph::build(&registry).unwrap();
        let order = graph.order();
        assert_eq!(order.len(), registry.len());

        let pos = |id: &ArtifactId| order.iter().position(|o| o == id).unwrap();
        for artifact in &registry {
            for dep in artifact.dependencies() {
                assert!(pos(dep) < pos(artifact.id()), "{dep} must precede {}", artifact.id());
            }
        }
    }

    #[test]
    fn test_ties_follow_registration_order() {
        let registry = registry(&[("Zeta", &[]), ("Alpha", &[]), ("Mid", &["Zeta"])]);
        let graph = DependencyGraph::build(&registry).unwrap();
        assert_eq!(names(graph.order()), vec!["Zeta", "Alpha", "Mid"]);
    }

    #[test]
    fn test_order_is_deterministic() {
        let registry = registry(&[
            ("C", &["A"]),
            ("B", &["A"]),
            ("A", &[]),
            ("D", &["B", "C"]),
        ]);
        let first = DependencyGraph::build(&registry).unwrap();
        for _ in 0..10 {
            assert_eq!(DependencyGraph::build(&registry).unwrap(), first);
        }
        assert_eq!(names(first.order()), vec!["A", "C", "B", "D"]);
    }

    #[test]
    fn test_unresolved_dependency() {
        let registry = registry(&[("Arithmetic", &[]), ("Exchange", &["Missing"])]);
        let err = DependencyGraph::build(&registry).unwrap_err();
        assert_eq!(
            err,
            DeployError::UnresolvedDependency {
                artifact: "Exchange".into(),
                dependency: "Missing".into(),
            }
        );
    }

    #[test]
    fn test_cycle_is_reported_with_path() {
        let registry = registry(&[("A", &["B"]), ("B", &["C"]), ("C", &["A"])]);
        let err = DependencyGraph::build(&registry).unwrap_err();
        let DeployError::CyclicDependency(path) = err else {
            panic!("expected a cycle, got {err:?}");
        };
        assert_eq!(names(&path), vec!["A", "B", "C", "A"]);
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let registry = registry(&[("Loop", &["Loop"])]);
        let err = DependencyGraph::build(&registry).unwrap_err();
        assert_eq!(
            err,
            DeployError::CyclicDependency(vec!["Loop".into(), "Loop".into()])
        );
    }

    #[test]
    fn test_external_dependency_from_seed() {
        use crate::DeploymentRecord;
        use alloy_core::primitives::{Address, B256};

        let registry = registry(&[("Exchange", &["Arithmetic"])]);
        assert!(DependencyGraph::build(&registry).is_err());

        let mut seed = AddressTable::new();
        seed.insert(DeploymentRecord {
            artifact: "Arithmetic".into(),
            address: Address::repeat_byte(0xaa),
            tx_hash: B256::ZERO,
            sequence: 0,
            deployed_at: chrono::Utc::now(),
            fingerprint: String::new(),
        })
        .unwrap();

        let graph = DependencyGraph::build_with_external(&registry, &seed).unwrap();
        assert_eq!(names(graph.order()), vec!["Exchange"]);
        assert!(graph.dependencies(&"Exchange".into()).is_empty());
        assert_eq!(
            graph.dependents(&"Arithmetic".into()),
            vec![&ArtifactId::from("Exchange")]
        );
    }

    #[test]
    fn test_empty_registry() {
        let graph = DependencyGraph::build(&ArtifactRegistry::new()).unwrap();
        assert!(graph.is_empty());
        assert!(graph.order().is_empty());
    }
}
