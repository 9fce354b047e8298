//! Cycle detection for directed graphs.
//!
//! Dataflow states are required to be acyclic at steady state; scope
//! computation and the topological decomposition used by read/write-set
//! inference rely on it. This module provides the detection primitives used
//! to turn "leftover nodes after traversal" into a precise structural error.

use crate::graph::{NodeId, Successors};

/// Visitation state for the three-color DFS.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Checks whether any cycle is reachable from the given node.
///
/// # Arguments
///
/// * `graph` - The graph to inspect
/// * `start` - The node to start the search from
///
/// # Returns
///
/// `true` if a cycle is reachable from `start`, `false` otherwise.
///
/// # Complexity
///
/// - Time: O(V + E)
/// - Space: O(V)
#[must_use]
pub fn has_cycle<G: Successors>(graph: &G, start: NodeId) -> bool {
    let bound = graph.node_bound();
    if start.index() >= bound {
        return false;
    }
    let mut colors = vec![Color::White; bound];
    dfs_finds_back_edge(graph, start, &mut colors)
}

/// Collects all nodes that participate in some cycle of the graph.
///
/// Every node is used as a potential search root, so cycles in disconnected
/// parts of the graph are found as well. The result is used to produce
/// diagnosable [`CyclicGraph`](crate::Error::CyclicGraph) errors naming the
/// offending nodes.
///
/// # Arguments
///
/// * `graph` - The graph to inspect
/// * `nodes` - The identifiers of all live nodes in the graph
///
/// # Returns
///
/// The subset of `nodes` lying on at least one cycle, in input order.
/// Empty if the graph is acyclic.
#[must_use]
pub fn find_cycles<G: Successors>(graph: &G, nodes: &[NodeId]) -> Vec<NodeId> {
    let bound = graph.node_bound();
    // A node lies on a cycle iff it is reachable from one of its own successors
    let mut result = Vec::new();
    for &node in nodes {
        if node.index() >= bound {
            continue;
        }
        let mut colors = vec![Color::White; bound];
        colors[node.index()] = Color::Gray;
        let on_cycle = graph
            .successors(node)
            .any(|succ| reaches(graph, succ, node, &mut colors));
        if on_cycle {
            result.push(node);
        }
    }
    result
}

/// Returns whether `target` is reachable from `from` (inclusive).
fn reaches<G: Successors>(graph: &G, from: NodeId, target: NodeId, colors: &mut [Color]) -> bool {
    if from == target {
        return true;
    }
    if colors[from.index()] != Color::White {
        return false;
    }
    colors[from.index()] = Color::Black;

    let mut stack = vec![from];
    while let Some(node) = stack.pop() {
        for succ in graph.successors(node) {
            if succ == target {
                return true;
            }
            if colors[succ.index()] == Color::White {
                colors[succ.index()] = Color::Black;
                stack.push(succ);
            }
        }
    }
    false
}

/// Iterative three-color DFS; a gray-to-gray edge is a back edge.
fn dfs_finds_back_edge<G: Successors>(graph: &G, start: NodeId, colors: &mut [Color]) -> bool {
    // Stack holds (node, expanded); gray nodes are on the current path
    let mut stack: Vec<(NodeId, bool)> = vec![(start, false)];

    while let Some((node, expanded)) = stack.pop() {
        if expanded {
            colors[node.index()] = Color::Black;
            continue;
        }
        if colors[node.index()] == Color::Black {
            continue;
        }
        colors[node.index()] = Color::Gray;
        stack.push((node, true));

        for succ in graph.successors(node) {
            match colors[succ.index()] {
                Color::Gray => return true,
                Color::White => stack.push((succ, false)),
                Color::Black => {}
            }
        }
    }
    false
}
