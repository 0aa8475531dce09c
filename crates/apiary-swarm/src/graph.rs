use std::collections::{BTreeSet, HashMap, HashSet};

use apiary_core::{TaskDecomposition, TaskDependency};
use uuid::Uuid;

/// Dependency graph over subtask ids.
///
/// Built from a decomposition's nodes and edges; edges whose endpoints are
/// unknown are kept aside for reporting and excluded from cycle/ordering
/// computations.
pub struct DependencyGraph {
    nodes: Vec<Uuid>,
    index: HashMap<Uuid, usize>,
    /// Edges between known nodes, by node index.
    edges: Vec<(usize, usize)>,
    unknown: Vec<(Uuid, Uuid)>,
}

impl DependencyGraph {
    /// Builds a graph from explicit nodes and dependency edges.
    pub fn new(nodes: Vec<Uuid>, dependencies: &[TaskDependency]) -> Self {
        let index: HashMap<Uuid, usize> =
            nodes.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let mut edges = Vec::new();
        let mut unknown = Vec::new();
        for dep in dependencies {
            match (index.get(&dep.from), index.get(&dep.to)) {
                (Some(&from), Some(&to)) => edges.push((from, to)),
                _ => unknown.push((dep.from, dep.to)),
            }
        }
        Self {
            nodes,
            index,
            edges,
            unknown,
        }
    }

    /// Builds a graph from a decomposition.
    pub fn from_decomposition(decomposition: &TaskDecomposition) -> Self {
        Self::new(decomposition.subtask_ids(), &decomposition.dependencies)
    }

    /// Edges referencing at least one id that is not a known subtask.
    pub fn unknown_endpoints(&self) -> &[(Uuid, Uuid)] {
        &self.unknown
    }

    /// Nodes with an edge to themselves.
    pub fn self_loops(&self) -> Vec<Uuid> {
        self.edges
            .iter()
            .filter(|(from, to)| from == to)
            .map(|&(from, _)| self.nodes[from])
            .collect()
    }

    /// Edges that appear more than once, reported once per duplicated pair.
    pub fn duplicate_edges(&self) -> Vec<(Uuid, Uuid)> {
        let mut seen = HashSet::new();
        let mut dups = Vec::new();
        for &(from, to) in &self.edges {
            if !seen.insert((from, to)) && !dups.contains(&(from, to)) {
                dups.push((from, to));
            }
        }
        dups.into_iter()
            .map(|(from, to)| (self.nodes[from], self.nodes[to]))
            .collect()
    }

    /// Whether the graph contains a cycle (self-loops included).
    ///
    /// Depth-first search with tri-state coloring: a back edge into a node
    /// still on the recursion stack is a cycle.
    pub fn has_cycle(&self) -> bool {
        let adjacency = self.adjacency();
        // 0 = unvisited, 1 = on the recursion stack, 2 = done
        let mut state = vec![0u8; self.nodes.len()];
        for start in 0..self.nodes.len() {
            if state[start] == 0 && self.dfs_cycle(start, &adjacency, &mut state) {
                return true;
            }
        }
        false
    }

    fn dfs_cycle(&self, node: usize, adjacency: &[Vec<usize>], state: &mut [u8]) -> bool {
        state[node] = 1;
        for &next in &adjacency[node] {
            let next_state = state[next];
            if next_state == 1 {
                return true;
            }
            if next_state == 0 && self.dfs_cycle(next, adjacency, state) {
                return true;
            }
        }
        state[node] = 2;
        false
    }

    /// One valid topological order via Kahn's algorithm, or `None` on a cycle.
    ///
    /// Ties among zero-in-degree nodes are broken by insertion order; the
    /// tie-break is behavior-defining and must be preserved.
    pub fn topological_order(&self) -> Option<Vec<Uuid>> {
        let adjacency = self.adjacency();
        let mut in_degree = vec![0usize; self.nodes.len()];
        for &(_, to) in &self.edges {
            in_degree[to] += 1;
        }

        let mut ready: BTreeSet<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &d)| d == 0)
            .map(|(i, _)| i)
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(&node) = ready.iter().next() {
            ready.remove(&node);
            order.push(self.nodes[node]);
            for &next in &adjacency[node] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.insert(next);
                }
            }
        }

        if order.len() == self.nodes.len() {
            Some(order)
        } else {
            None
        }
    }

    /// Looks up a node's insertion index.
    pub fn position(&self, id: Uuid) -> Option<usize> {
        self.index.get(&id).copied()
    }

    fn adjacency(&self) -> Vec<Vec<usize>> {
        let mut adjacency = vec![Vec::new(); self.nodes.len()];
        for &(from, to) in &self.edges {
            adjacency[from].push(to);
        }
        adjacency
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use apiary_core::DependencyKind;

    fn edge(from: Uuid, to: Uuid) -> TaskDependency {
        TaskDependency {
            from,
            to,
            kind: DependencyKind::Sequential,
            condition: None,
        }
    }

    fn ids(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    #[test]
    fn test_no_cycle_in_chain() {
        let nodes = ids(3);
        let deps = vec![edge(nodes[0], nodes[1]), edge(nodes[1], nodes[2])];
        let graph = DependencyGraph::new(nodes, &deps);
        assert!(!graph.has_cycle());
    }

    #[test]
    fn test_two_node_cycle() {
        let nodes = ids(2);
        let deps = vec![edge(nodes[0], nodes[1]), edge(nodes[1], nodes[0])];
        let graph = DependencyGraph::new(nodes, &deps);
        assert!(graph.has_cycle());
        assert!(graph.topological_order().is_none());
    }

    #[test]
    fn test_self_loop_is_a_cycle() {
        let nodes = ids(2);
        let deps = vec![edge(nodes[0], nodes[0])];
        let graph = DependencyGraph::new(nodes.clone(), &deps);
        assert!(graph.has_cycle());
        assert_eq!(graph.self_loops(), vec![nodes[0]]);
    }

    #[test]
    fn test_topological_order_of_chain() {
        let nodes = ids(3);
        let deps = vec![edge(nodes[0], nodes[1]), edge(nodes[1], nodes[2])];
        let graph = DependencyGraph::new(nodes.clone(), &deps);
        assert_eq!(graph.topological_order().unwrap(), nodes);
    }

    #[test]
    fn test_ties_broken_by_insertion_order() {
        // Diamond: a -> {b, c} -> d, with b inserted before c.
        let nodes = ids(4);
        let deps = vec![
            edge(nodes[0], nodes[1]),
            edge(nodes[0], nodes[2]),
            edge(nodes[1], nodes[3]),
            edge(nodes[2], nodes[3]),
        ];
        let graph = DependencyGraph::new(nodes.clone(), &deps);
        let order = graph.topological_order().unwrap();
        assert_eq!(order, vec![nodes[0], nodes[1], nodes[2], nodes[3]]);
    }

    #[test]
    fn test_order_is_a_permutation_respecting_edges() {
        let nodes = ids(5);
        let deps = vec![
            edge(nodes[3], nodes[1]),
            edge(nodes[1], nodes[4]),
            edge(nodes[0], nodes[4]),
        ];
        let graph = DependencyGraph::new(nodes.clone(), &deps);
        let order = graph.topological_order().unwrap();
        assert_eq!(order.len(), nodes.len());
        for &(ref from, ref to) in &[(nodes[3], nodes[1]), (nodes[1], nodes[4]), (nodes[0], nodes[4])] {
            let from_pos = order.iter().position(|id| id == from).unwrap();
            let to_pos = order.iter().position(|id| id == to).unwrap();
            assert!(from_pos < to_pos);
        }
    }

    #[test]
    fn test_unknown_endpoints_are_reported_and_ignored() {
        let nodes = ids(2);
        let stranger = Uuid::new_v4();
        let deps = vec![edge(nodes[0], stranger), edge(nodes[0], nodes[1])];
        let graph = DependencyGraph::new(nodes.clone(), &deps);
        assert_eq!(graph.unknown_endpoints(), &[(nodes[0], stranger)]);
        assert!(!graph.has_cycle());
        assert_eq!(graph.topological_order().unwrap().len(), 2);
    }

    #[test]
    fn test_duplicate_edges_detected() {
        let nodes = ids(2);
        let deps = vec![
            edge(nodes[0], nodes[1]),
            edge(nodes[0], nodes[1]),
            edge(nodes[0], nodes[1]),
        ];
        let graph = DependencyGraph::new(nodes.clone(), &deps);
        assert_eq!(graph.duplicate_edges(), vec![(nodes[0], nodes[1])]);
    }

    #[test]
    fn test_empty_graph() {
        let graph = DependencyGraph::new(Vec::new(), &[]);
        assert!(!graph.has_cycle());
        assert!(graph.topological_order().unwrap().is_empty());
    }
}
