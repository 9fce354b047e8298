//! Topological ordering of directed acyclic graphs.
//!
//! Read/write-set inference traverses each concurrent subgraph in dependency
//! order so that reads masked by earlier writes can be filtered out; code
//! generators consume the same order for emission. Both use the Kahn-style
//! orderings in this module.

use std::collections::HashSet;

use crate::graph::{NodeId, Predecessors, Successors};

/// Computes a topological ordering of all live nodes in the graph.
///
/// Ties are broken by node insertion order, so the result is deterministic
/// for a given construction sequence.
///
/// # Arguments
///
/// * `graph` - The graph to order
/// * `nodes` - The identifiers of all live nodes
///
/// # Returns
///
/// `Some(order)` if the graph is acyclic, `None` if it contains a cycle.
///
/// # Complexity
///
/// - Time: O(V + E) amortized (plus ordering maintenance)
/// - Space: O(V)
#[must_use]
pub fn topological_sort<G>(graph: &G, nodes: &[NodeId]) -> Option<Vec<NodeId>>
where
    G: Successors + Predecessors,
{
    topological_sort_subset(graph, nodes, None)
}

/// Computes a topological ordering restricted to a subset of nodes.
///
/// Only edges with both endpoints inside the subset contribute to the
/// ordering constraints. With `subset == None` all passed nodes are ordered.
///
/// # Arguments
///
/// * `graph` - The graph to order
/// * `nodes` - The nodes to order (in tie-breaking priority order)
/// * `subset` - Optional membership filter; edges leaving the subset are ignored
///
/// # Returns
///
/// `Some(order)` covering every node of `nodes` if the induced subgraph is
/// acyclic, `None` otherwise.
#[must_use]
pub fn topological_sort_subset<G>(
    graph: &G,
    nodes: &[NodeId],
    subset: Option<&HashSet<NodeId>>,
) -> Option<Vec<NodeId>>
where
    G: Successors + Predecessors,
{
    let in_view = |n: NodeId| subset.is_none_or(|s| s.contains(&n));

    let mut in_degree: Vec<usize> = Vec::with_capacity(nodes.len());
    let mut position = vec![usize::MAX; graph.node_bound()];
    for (i, &node) in nodes.iter().enumerate() {
        position[node.index()] = i;
        in_degree.push(graph.predecessors(node).filter(|p| in_view(*p)).count());
    }

    // Ready queue kept sorted by insertion order for deterministic output
    let mut ready: Vec<NodeId> = nodes
        .iter()
        .enumerate()
        .filter(|(i, _)| in_degree[*i] == 0)
        .map(|(_, n)| *n)
        .collect();

    let mut result = Vec::with_capacity(nodes.len());
    let mut cursor = 0;
    while cursor < ready.len() {
        let node = ready[cursor];
        cursor += 1;
        result.push(node);

        for succ in graph.successors(node) {
            if !in_view(succ) {
                continue;
            }
            let pos = position[succ.index()];
            if pos == usize::MAX {
                continue;
            }
            in_degree[pos] -= 1;
            if in_degree[pos] == 0 {
                ready.push(succ);
            }
        }
    }

    if result.len() == nodes.len() {
        Some(result)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::DirectedGraph;

    #[test]
    fn test_topological_sort_linear() {
        let mut graph: DirectedGraph<(), ()> = DirectedGraph::new();
        let a = graph.add_node(());
        let b = graph.add_node(());
        let c = graph.add_node(());
        graph.add_edge(a, b, ()).unwrap();
        graph.add_edge(b, c, ()).unwrap();

        let nodes: Vec<_> = graph.node_ids().collect();
        let order = topological_sort(&graph, &nodes).unwrap();
        assert_eq!(order, vec![a, b, c]);
    }

    #[test]
    fn test_topological_sort_diamond() {
        let mut graph: DirectedGraph<(), ()> = DirectedGraph::new();
        let a = graph.add_node(());
        let b = graph.add_node(());
        let c = graph.add_node(());
        let d = graph.add_node(());
        graph.add_edge(a, b, ()).unwrap();
        graph.add_edge(a, c, ()).unwrap();
        graph.add_edge(b, d, ()).unwrap();
        graph.add_edge(c, d, ()).unwrap();

        let nodes: Vec<_> = graph.node_ids().collect();
        let order = topological_sort(&graph, &nodes).unwrap();

        let pos = |n: NodeId| order.iter().position(|&x| x == n).unwrap();
        assert!(pos(a) < pos(b));
        assert!(pos(a) < pos(c));
        assert!(pos(b) < pos(d));
        assert!(pos(c) < pos(d));
    }

    #[test]
    fn test_topological_sort_cycle() {
        let mut graph: DirectedGraph<(), ()> = DirectedGraph::new();
        let a = graph.add_node(());
        let b = graph.add_node(());
        graph.add_edge(a, b, ()).unwrap();
        graph.add_edge(b, a, ()).unwrap();

        let nodes: Vec<_> = graph.node_ids().collect();
        assert!(topological_sort(&graph, &nodes).is_none());
    }

    #[test]
    fn test_topological_sort_subset_ignores_outside_edges() {
        let mut graph: DirectedGraph<(), ()> = DirectedGraph::new();
        let a = graph.add_node(());
        let b = graph.add_node(());
        let c = graph.add_node(());
        graph.add_edge(a, b, ()).unwrap();
        graph.add_edge(c, b, ()).unwrap();

        // Subset excludes c, so b only waits on a
        let subset: HashSet<NodeId> = [a, b].into_iter().collect();
        let order = topological_sort_subset(&graph, &[a, b], Some(&subset)).unwrap();
        assert_eq!(order, vec![a, b]);
    }

    #[test]
    fn test_topological_sort_deterministic_ties() {
        let mut graph: DirectedGraph<(), ()> = DirectedGraph::new();
        let a = graph.add_node(());
        let b = graph.add_node(());
        let c = graph.add_node(());
        // No edges: order falls back to insertion order
        let order = topological_sort(&graph, &[a, b, c]).unwrap();
        assert_eq!(order, vec![a, b, c]);
    }
}
