//! Generic directed multigraph infrastructure.
//!
//! This module provides the arena-based [`DirectedGraph`] that underpins both the
//! dataflow layer (nodes connected by data-movement edges) and the control layer
//! (control blocks connected by inter-state transitions), together with the
//! strongly-typed [`NodeId`]/[`EdgeId`] identifiers and the shared
//! [`algorithms`].
//!
//! # Design
//!
//! Nodes and edges live in slot arenas addressed by plain indices. Removal leaves
//! a tombstone so that all other identifiers stay stable, which lets higher
//! layers cache per-node analysis results across unrelated edits. Ownership
//! relations between graph elements are expressed exclusively through indices,
//! never through references, so nested graph structures contain no reference
//! cycles while parent lookup stays O(1).
//!
//! Parallel edges between the same pair of nodes are permitted; the dataflow
//! layer relies on this to express multiple data movements between two nodes
//! through different connectors.
//!
//! # Examples
//!
//! ```rust
//! use stategraph::graph::{DirectedGraph, NodeId};
//!
//! let mut graph: DirectedGraph<&str, u32> = DirectedGraph::new();
//! let a = graph.add_node("A");
//! let b = graph.add_node("B");
//! let e = graph.add_edge(a, b, 7).unwrap();
//!
//! assert_eq!(graph.node(a), Some(&"A"));
//! assert_eq!(graph.edge(e), Some(&7));
//! assert_eq!(graph.successors(a).collect::<Vec<_>>(), vec![b]);
//! ```

pub mod algorithms;
mod edge;
mod node;

pub use edge::EdgeId;
pub use node::NodeId;

use crate::Result;

/// Storage slot for a live node and its adjacency lists.
#[derive(Debug, Clone)]
struct NodeSlot<N> {
    data: N,
    incoming: Vec<EdgeId>,
    outgoing: Vec<EdgeId>,
}

/// Storage slot for a live edge.
#[derive(Debug, Clone)]
struct EdgeSlot<E> {
    source: NodeId,
    target: NodeId,
    data: E,
}

/// Capability trait for graphs that can enumerate node successors.
///
/// Algorithms in [`algorithms`] are generic over this trait so they apply to
/// the raw [`DirectedGraph`] as well as domain wrappers that restrict or remap
/// the node set.
pub trait Successors {
    /// Returns an exclusive upper bound on node indices in this graph.
    ///
    /// The bound covers tombstoned slots, so `vec![false; node_bound()]` is a
    /// valid visited-set for any [`NodeId`] the graph can yield.
    fn node_bound(&self) -> usize;

    /// Returns an iterator over the successor nodes of `node`.
    ///
    /// A node reachable through several parallel edges is yielded once per edge.
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_;
}

/// Capability trait for graphs that can enumerate node predecessors.
pub trait Predecessors {
    /// Returns an iterator over the predecessor nodes of `node`.
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_;
}

/// An arena-based directed multigraph with stable identifiers.
///
/// `DirectedGraph<N, E>` stores node data of type `N` and edge data of type `E`.
/// Identifiers remain valid across removals of other elements; removing a node
/// detaches all of its incident edges.
///
/// # Type Parameters
///
/// * `N` - The node data type (e.g. a dataflow node or a control block)
/// * `E` - The edge data type (e.g. a memlet or an inter-state transition)
///
/// # Thread Safety
///
/// `DirectedGraph<N, E>` is `Send` and `Sync` when both `N` and `E` are. Note
/// that per the ownership policy of the IR, mutation requires exclusive access
/// (`&mut self`), which is what invalidates caches in the layers above.
#[derive(Debug, Clone)]
pub struct DirectedGraph<N, E> {
    nodes: Vec<Option<NodeSlot<N>>>,
    edges: Vec<Option<EdgeSlot<E>>>,
    node_count: usize,
    edge_count: usize,
}

impl<N, E> Default for DirectedGraph<N, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N, E> DirectedGraph<N, E> {
    /// Creates a new empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            node_count: 0,
            edge_count: 0,
        }
    }

    /// Creates a new graph with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(node_capacity: usize, edge_capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(node_capacity),
            edges: Vec::with_capacity(edge_capacity),
            node_count: 0,
            edge_count: 0,
        }
    }

    /// Adds a node to the graph and returns its identifier.
    ///
    /// # Arguments
    ///
    /// * `data` - The node data to store
    ///
    /// # Returns
    ///
    /// The [`NodeId`] of the newly added node.
    pub fn add_node(&mut self, data: N) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(Some(NodeSlot {
            data,
            incoming: Vec::new(),
            outgoing: Vec::new(),
        }));
        self.node_count += 1;
        id
    }

    /// Removes a node and all of its incident edges.
    ///
    /// The slot is tombstoned; all other node and edge identifiers remain
    /// valid.
    ///
    /// # Arguments
    ///
    /// * `node` - The node to remove
    ///
    /// # Returns
    ///
    /// The node data, or an error if the identifier is invalid.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::GraphError`] if the node does not exist.
    pub fn remove_node(&mut self, node: NodeId) -> Result<N> {
        let slot = self
            .nodes
            .get_mut(node.index())
            .and_then(Option::take)
            .ok_or_else(|| crate::Error::GraphError(format!("Node {node} does not exist")))?;

        for edge in slot.incoming.iter().chain(slot.outgoing.iter()) {
            if let Some(removed) = self.edges.get_mut(edge.index()).and_then(Option::take) {
                self.edge_count -= 1;
                // Detach from the opposite endpoint (self-loops were fully
                // detached when the slot was taken above)
                let opposite = if removed.source == node {
                    removed.target
                } else {
                    removed.source
                };
                if let Some(other) = self.nodes.get_mut(opposite.index()).and_then(Option::as_mut) {
                    other.incoming.retain(|e| e != edge);
                    other.outgoing.retain(|e| e != edge);
                }
            }
        }

        self.node_count -= 1;
        Ok(slot.data)
    }

    /// Adds a directed edge between two nodes.
    ///
    /// Parallel edges between the same endpoints are permitted.
    ///
    /// # Arguments
    ///
    /// * `source` - The source node
    /// * `target` - The target node
    /// * `data` - The edge data to store
    ///
    /// # Returns
    ///
    /// The [`EdgeId`] of the newly added edge.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::GraphError`] if either endpoint does not exist.
    pub fn add_edge(&mut self, source: NodeId, target: NodeId, data: E) -> Result<EdgeId> {
        if !self.contains_node(source) {
            return Err(crate::Error::GraphError(format!(
                "Source node {source} does not exist"
            )));
        }
        if !self.contains_node(target) {
            return Err(crate::Error::GraphError(format!(
                "Target node {target} does not exist"
            )));
        }

        let id = EdgeId::new(self.edges.len());
        self.edges.push(Some(EdgeSlot {
            source,
            target,
            data,
        }));
        self.edge_count += 1;

        // Unwraps are safe: both endpoints were checked above
        self.nodes[source.index()].as_mut().unwrap().outgoing.push(id);
        self.nodes[target.index()].as_mut().unwrap().incoming.push(id);
        Ok(id)
    }

    /// Removes an edge from the graph.
    ///
    /// # Arguments
    ///
    /// * `edge` - The edge to remove
    ///
    /// # Returns
    ///
    /// The edge data, or an error if the identifier is invalid.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::GraphError`] if the edge does not exist.
    pub fn remove_edge(&mut self, edge: EdgeId) -> Result<E> {
        let slot = self
            .edges
            .get_mut(edge.index())
            .and_then(Option::take)
            .ok_or_else(|| crate::Error::GraphError(format!("Edge {edge} does not exist")))?;

        if let Some(src) = self.nodes.get_mut(slot.source.index()).and_then(Option::as_mut) {
            src.outgoing.retain(|e| *e != edge);
        }
        if let Some(dst) = self.nodes.get_mut(slot.target.index()).and_then(Option::as_mut) {
            dst.incoming.retain(|e| *e != edge);
        }

        self.edge_count -= 1;
        Ok(slot.data)
    }

    /// Returns `true` if the node identifier refers to a live node.
    #[must_use]
    pub fn contains_node(&self, node: NodeId) -> bool {
        self.nodes.get(node.index()).is_some_and(Option::is_some)
    }

    /// Returns a reference to the node data, or `None` if the ID is invalid.
    #[must_use]
    pub fn node(&self, node: NodeId) -> Option<&N> {
        self.nodes
            .get(node.index())
            .and_then(Option::as_ref)
            .map(|slot| &slot.data)
    }

    /// Returns a mutable reference to the node data, or `None` if the ID is invalid.
    #[must_use]
    pub fn node_mut(&mut self, node: NodeId) -> Option<&mut N> {
        self.nodes
            .get_mut(node.index())
            .and_then(Option::as_mut)
            .map(|slot| &mut slot.data)
    }

    /// Returns a reference to the edge data, or `None` if the ID is invalid.
    #[must_use]
    pub fn edge(&self, edge: EdgeId) -> Option<&E> {
        self.edges
            .get(edge.index())
            .and_then(Option::as_ref)
            .map(|slot| &slot.data)
    }

    /// Returns a mutable reference to the edge data, or `None` if the ID is invalid.
    #[must_use]
    pub fn edge_mut(&mut self, edge: EdgeId) -> Option<&mut E> {
        self.edges
            .get_mut(edge.index())
            .and_then(Option::as_mut)
            .map(|slot| &mut slot.data)
    }

    /// Returns the `(source, target)` endpoints of an edge, or `None` if the ID is invalid.
    #[must_use]
    pub fn edge_endpoints(&self, edge: EdgeId) -> Option<(NodeId, NodeId)> {
        self.edges
            .get(edge.index())
            .and_then(Option::as_ref)
            .map(|slot| (slot.source, slot.target))
    }

    /// Returns the source node of an edge, or `None` if the ID is invalid.
    #[must_use]
    pub fn edge_source(&self, edge: EdgeId) -> Option<NodeId> {
        self.edge_endpoints(edge).map(|(s, _)| s)
    }

    /// Returns the target node of an edge, or `None` if the ID is invalid.
    #[must_use]
    pub fn edge_target(&self, edge: EdgeId) -> Option<NodeId> {
        self.edge_endpoints(edge).map(|(_, t)| t)
    }

    /// Returns the number of live nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Returns the number of live edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Returns an exclusive upper bound on node indices, including tombstones.
    #[must_use]
    pub fn node_bound(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the graph contains no live nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.node_count == 0
    }

    /// Returns an iterator over all live node identifiers, in insertion order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|_| NodeId::new(i)))
    }

    /// Returns an iterator over `(id, data)` pairs of all live nodes.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &N)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|s| (NodeId::new(i), &s.data)))
    }

    /// Returns an iterator over all live edge identifiers, in insertion order.
    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|_| EdgeId::new(i)))
    }

    /// Returns an iterator over `(id, source, target, data)` tuples of all live edges.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, NodeId, NodeId, &E)> + '_ {
        self.edges.iter().enumerate().filter_map(|(i, slot)| {
            slot.as_ref()
                .map(|s| (EdgeId::new(i), s.source, s.target, &s.data))
        })
    }

    /// Returns the identifiers of edges entering `node`, in insertion order.
    pub fn in_edges(&self, node: NodeId) -> impl Iterator<Item = EdgeId> + '_ {
        self.nodes
            .get(node.index())
            .and_then(Option::as_ref)
            .map(|slot| slot.incoming.iter().copied())
            .into_iter()
            .flatten()
    }

    /// Returns the identifiers of edges leaving `node`, in insertion order.
    pub fn out_edges(&self, node: NodeId) -> impl Iterator<Item = EdgeId> + '_ {
        self.nodes
            .get(node.index())
            .and_then(Option::as_ref)
            .map(|slot| slot.outgoing.iter().copied())
            .into_iter()
            .flatten()
    }

    /// Returns the number of edges entering `node`.
    #[must_use]
    pub fn in_degree(&self, node: NodeId) -> usize {
        self.nodes
            .get(node.index())
            .and_then(Option::as_ref)
            .map_or(0, |slot| slot.incoming.len())
    }

    /// Returns the number of edges leaving `node`.
    #[must_use]
    pub fn out_degree(&self, node: NodeId) -> usize {
        self.nodes
            .get(node.index())
            .and_then(Option::as_ref)
            .map_or(0, |slot| slot.outgoing.len())
    }

    /// Returns an iterator over the successor nodes of `node`.
    ///
    /// A node reachable through several parallel edges is yielded once per
    /// edge.
    pub fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.out_edges(node).filter_map(|e| self.edge_target(e))
    }

    /// Returns an iterator over the predecessor nodes of `node`.
    pub fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.in_edges(node).filter_map(|e| self.edge_source(e))
    }

    /// Returns all nodes with no incoming edges, in insertion order.
    #[must_use]
    pub fn source_nodes(&self) -> Vec<NodeId> {
        self.node_ids().filter(|n| self.in_degree(*n) == 0).collect()
    }

    /// Returns all nodes with no outgoing edges, in insertion order.
    #[must_use]
    pub fn sink_nodes(&self) -> Vec<NodeId> {
        self.node_ids().filter(|n| self.out_degree(*n) == 0).collect()
    }
}

impl<N, E> Successors for DirectedGraph<N, E> {
    fn node_bound(&self) -> usize {
        self.nodes.len()
    }

    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        DirectedGraph::successors(self, node)
    }
}

impl<N, E> Predecessors for DirectedGraph<N, E> {
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        DirectedGraph::predecessors(self, node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_basic() {
        let mut graph: DirectedGraph<&str, ()> = DirectedGraph::new();
        let a = graph.add_node("A");
        let b = graph.add_node("B");

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.node(a), Some(&"A"));
        assert_eq!(graph.node(b), Some(&"B"));
        assert!(!graph.is_empty());
    }

    #[test]
    fn test_graph_add_edge() {
        let mut graph: DirectedGraph<&str, i32> = DirectedGraph::new();
        let a = graph.add_node("A");
        let b = graph.add_node("B");

        let e = graph.add_edge(a, b, 10).unwrap();
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.edge(e), Some(&10));
        assert_eq!(graph.edge_endpoints(e), Some((a, b)));
        assert_eq!(graph.successors(a).collect::<Vec<_>>(), vec![b]);
        assert_eq!(graph.predecessors(b).collect::<Vec<_>>(), vec![a]);
    }

    #[test]
    fn test_graph_parallel_edges() {
        let mut graph: DirectedGraph<&str, i32> = DirectedGraph::new();
        let a = graph.add_node("A");
        let b = graph.add_node("B");

        graph.add_edge(a, b, 1).unwrap();
        graph.add_edge(a, b, 2).unwrap();

        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.out_degree(a), 2);
        assert_eq!(graph.in_degree(b), 2);
    }

    #[test]
    fn test_graph_invalid_endpoint() {
        let mut graph: DirectedGraph<&str, ()> = DirectedGraph::new();
        let a = graph.add_node("A");

        assert!(graph.add_edge(a, NodeId::new(7), ()).is_err());
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_graph_remove_edge() {
        let mut graph: DirectedGraph<&str, i32> = DirectedGraph::new();
        let a = graph.add_node("A");
        let b = graph.add_node("B");
        let e = graph.add_edge(a, b, 10).unwrap();

        assert_eq!(graph.remove_edge(e).unwrap(), 10);
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.out_degree(a), 0);
        assert_eq!(graph.in_degree(b), 0);
        assert!(graph.remove_edge(e).is_err());
    }

    #[test]
    fn test_graph_remove_node_detaches_edges() {
        let mut graph: DirectedGraph<&str, ()> = DirectedGraph::new();
        let a = graph.add_node("A");
        let b = graph.add_node("B");
        let c = graph.add_node("C");
        graph.add_edge(a, b, ()).unwrap();
        graph.add_edge(b, c, ()).unwrap();

        assert_eq!(graph.remove_node(b).unwrap(), "B");
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.out_degree(a), 0);
        assert_eq!(graph.in_degree(c), 0);
    }

    #[test]
    fn test_graph_stable_ids_after_removal() {
        let mut graph: DirectedGraph<&str, ()> = DirectedGraph::new();
        let a = graph.add_node("A");
        let b = graph.add_node("B");
        let c = graph.add_node("C");

        graph.remove_node(b).unwrap();

        // Remaining identifiers are unaffected
        assert_eq!(graph.node(a), Some(&"A"));
        assert_eq!(graph.node(c), Some(&"C"));
        assert_eq!(graph.node(b), None);
        assert!(!graph.contains_node(b));

        // New nodes get fresh identifiers, tombstones are not reused
        let d = graph.add_node("D");
        assert_eq!(d.index(), 3);
    }

    #[test]
    fn test_graph_self_loop_removal() {
        let mut graph: DirectedGraph<&str, ()> = DirectedGraph::new();
        let a = graph.add_node("A");
        graph.add_edge(a, a, ()).unwrap();

        graph.remove_node(a).unwrap();
        assert_eq!(graph.node_count(), 0);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_graph_source_and_sink_nodes() {
        let mut graph: DirectedGraph<&str, ()> = DirectedGraph::new();
        let a = graph.add_node("A");
        let b = graph.add_node("B");
        let c = graph.add_node("C");
        graph.add_edge(a, b, ()).unwrap();
        graph.add_edge(b, c, ()).unwrap();

        assert_eq!(graph.source_nodes(), vec![a]);
        assert_eq!(graph.sink_nodes(), vec![c]);
    }
}
