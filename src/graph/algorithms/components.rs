//! Weakly connected components.
//!
//! Within one dataflow state, nodes not ordered by any data dependency form
//! maximal concurrently-executable subgraphs. Ignoring edge direction, these
//! are exactly the weakly connected components of the state graph; read/write
//! set inference computes its masking per component and unions the results.

use crate::graph::{NodeId, Predecessors, Successors};

/// Partitions the given nodes into weakly connected components.
///
/// Two nodes share a component iff they are connected by a path that may
/// follow edges in either direction and stays within `nodes`; edges leading
/// outside the given node set are ignored, so the decomposition also works
/// for node-induced subgraph views. Components are returned in order of
/// their smallest member, with members in input order.
///
/// # Arguments
///
/// * `graph` - The graph to decompose
/// * `nodes` - The nodes to partition (all live nodes, or a view subset)
///
/// # Returns
///
/// A vector of components, each a vector of node IDs.
///
/// # Complexity
///
/// - Time: O(V + E)
/// - Space: O(V)
#[must_use]
pub fn weakly_connected_components<G>(graph: &G, nodes: &[NodeId]) -> Vec<Vec<NodeId>>
where
    G: Successors + Predecessors,
{
    let bound = graph.node_bound();
    const OUTSIDE: usize = usize::MAX;
    const UNASSIGNED: usize = usize::MAX - 1;

    let mut component = vec![OUTSIDE; bound];
    for &node in nodes {
        component[node.index()] = UNASSIGNED;
    }

    let mut count = 0;
    for &start in nodes {
        if component[start.index()] != UNASSIGNED {
            continue;
        }
        // Flood fill over undirected adjacency, restricted to the node set
        let id = count;
        count += 1;
        component[start.index()] = id;
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            let neighbors = graph
                .successors(node)
                .chain(graph.predecessors(node))
                .collect::<Vec<_>>();
            for next in neighbors {
                if component[next.index()] == UNASSIGNED {
                    component[next.index()] = id;
                    stack.push(next);
                }
            }
        }
    }

    let mut result: Vec<Vec<NodeId>> = vec![Vec::new(); count];
    for &node in nodes {
        result[component[node.index()]].push(node);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::DirectedGraph;

    #[test]
    fn test_single_component() {
        let mut graph: DirectedGraph<(), ()> = DirectedGraph::new();
        let a = graph.add_node(());
        let b = graph.add_node(());
        let c = graph.add_node(());
        graph.add_edge(a, b, ()).unwrap();
        graph.add_edge(b, c, ()).unwrap();

        let nodes: Vec<_> = graph.node_ids().collect();
        let components = weakly_connected_components(&graph, &nodes);
        assert_eq!(components, vec![vec![a, b, c]]);
    }

    #[test]
    fn test_two_independent_chains() {
        let mut graph: DirectedGraph<(), ()> = DirectedGraph::new();
        let a = graph.add_node(());
        let b = graph.add_node(());
        let c = graph.add_node(());
        let d = graph.add_node(());
        graph.add_edge(a, b, ()).unwrap();
        graph.add_edge(c, d, ()).unwrap();

        let nodes: Vec<_> = graph.node_ids().collect();
        let components = weakly_connected_components(&graph, &nodes);
        assert_eq!(components, vec![vec![a, b], vec![c, d]]);
    }

    #[test]
    fn test_direction_is_ignored() {
        let mut graph: DirectedGraph<(), ()> = DirectedGraph::new();
        let a = graph.add_node(());
        let b = graph.add_node(());
        let c = graph.add_node(());
        // a -> b <- c: one weak component despite no directed a..c path
        graph.add_edge(a, b, ()).unwrap();
        graph.add_edge(c, b, ()).unwrap();

        let nodes: Vec<_> = graph.node_ids().collect();
        let components = weakly_connected_components(&graph, &nodes);
        assert_eq!(components.len(), 1);
    }

    #[test]
    fn test_isolated_nodes() {
        let mut graph: DirectedGraph<(), ()> = DirectedGraph::new();
        let a = graph.add_node(());
        let b = graph.add_node(());

        let components = weakly_connected_components(&graph, &[a, b]);
        assert_eq!(components, vec![vec![a], vec![b]]);
    }

    #[test]
    fn test_subset_restriction_splits_components() {
        let mut graph: DirectedGraph<(), ()> = DirectedGraph::new();
        let a = graph.add_node(());
        let b = graph.add_node(());
        let c = graph.add_node(());
        graph.add_edge(a, b, ()).unwrap();
        graph.add_edge(b, c, ()).unwrap();

        // Excluding the middle node separates a and c
        let components = weakly_connected_components(&graph, &[a, c]);
        assert_eq!(components, vec![vec![a], vec![c]]);
    }
}
