//! Node identifier implementation for directed graphs.
//!
//! This module provides the [`NodeId`] type, a strongly-typed identifier for nodes
//! within a directed graph. The newtype wrapper provides type safety and prevents
//! accidental confusion between node indices and other integer values.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A strongly-typed identifier for nodes within a directed graph.
///
/// `NodeId` wraps a `usize` index, providing type safety to prevent
/// accidental mixing of node indices with other integer values. Node IDs are assigned
/// sequentially starting from 0 when nodes are added to a graph, and remain stable
/// when other nodes are removed.
///
/// # Usage
///
/// Node IDs are created by [`DirectedGraph::add_node`](crate::graph::DirectedGraph::add_node)
/// and should not typically be constructed manually. They are used to:
///
/// - Reference nodes when adding data-movement or inter-state edges
/// - Look up node data
/// - Query adjacency relationships
/// - Store analysis results indexed by node
///
/// # Examples
///
/// ```rust,ignore
/// use stategraph::graph::{DirectedGraph, NodeId};
///
/// let mut graph: DirectedGraph<&str, ()> = DirectedGraph::new();
/// let node_a: NodeId = graph.add_node("A");
/// let node_b: NodeId = graph.add_node("B");
///
/// // NodeIds can be compared
/// assert_ne!(node_a, node_b);
///
/// // NodeIds can be used as keys in collections
/// use std::collections::HashMap;
/// let mut data: HashMap<NodeId, i32> = HashMap::new();
/// data.insert(node_a, 42);
/// ```
///
/// # Thread Safety
///
/// `NodeId` is [`Copy`], [`Send`], and [`Sync`], enabling efficient passing between
/// threads and use in concurrent data structures.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Creates a new `NodeId` from a raw index value.
    ///
    /// This constructor is primarily intended for internal use and testing.
    /// Normal usage should obtain `NodeId` values from
    /// [`DirectedGraph::add_node`](crate::graph::DirectedGraph::add_node).
    ///
    /// # Arguments
    ///
    /// * `index` - The raw node index (0-based)
    ///
    /// # Returns
    ///
    /// A new `NodeId` wrapping the provided index.
    #[must_use]
    #[inline]
    pub const fn new(index: usize) -> Self {
        NodeId(index)
    }

    /// Returns the raw index value of this node identifier.
    ///
    /// The index is a 0-based position that can be used to index into vectors
    /// or arrays that store per-node data.
    ///
    /// # Returns
    ///
    /// The underlying index value.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for NodeId {
    /// Formats the node ID for debugging output.
    ///
    /// The format shows the type name and index value for clear identification
    /// in debug output and logging.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    /// Formats the node ID for user display.
    ///
    /// The display format shows just the prefix and index for compact output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl From<usize> for NodeId {
    /// Converts a raw `usize` index into a `NodeId`.
    ///
    /// This conversion is provided for convenience but should be used carefully
    /// to avoid creating invalid node IDs that don't correspond to actual nodes
    /// in a graph.
    #[inline]
    fn from(index: usize) -> Self {
        NodeId(index)
    }
}

impl From<NodeId> for usize {
    /// Extracts the raw index from a `NodeId`.
    #[inline]
    fn from(node: NodeId) -> Self {
        node.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};

    #[test]
    fn test_node_id_new() {
        let node = NodeId::new(42);
        assert_eq!(node.index(), 42);
    }

    #[test]
    fn test_node_id_equality() {
        let node1 = NodeId::new(5);
        let node2 = NodeId::new(5);
        let node3 = NodeId::new(10);

        assert_eq!(node1, node2);
        assert_ne!(node1, node3);
    }

    #[test]
    fn test_node_id_ordering() {
        let node1 = NodeId::new(1);
        let node2 = NodeId::new(2);
        let node3 = NodeId::new(3);

        let mut nodes = vec![node3, node1, node2];
        nodes.sort();
        assert_eq!(nodes, vec![node1, node2, node3]);
    }

    #[test]
    fn test_node_id_hash() {
        let mut set: HashSet<NodeId> = HashSet::new();
        set.insert(NodeId::new(1));
        set.insert(NodeId::new(2));
        set.insert(NodeId::new(1)); // Should not add duplicate

        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_node_id_as_map_key() {
        let mut map: HashMap<NodeId, &str> = HashMap::new();
        map.insert(NodeId::new(1), "first");
        map.insert(NodeId::new(2), "second");

        assert_eq!(map.get(&NodeId::new(1)), Some(&"first"));
        assert_eq!(map.get(&NodeId::new(3)), None);
    }

    #[test]
    fn test_node_id_from_usize() {
        let node: NodeId = 123usize.into();
        assert_eq!(node.index(), 123);

        let value: usize = node.into();
        assert_eq!(value, 123);
    }

    #[test]
    fn test_node_id_debug_format() {
        let node = NodeId::new(42);
        assert_eq!(format!("{node:?}"), "NodeId(42)");
    }

    #[test]
    fn test_node_id_display_format() {
        let node = NodeId::new(42);
        assert_eq!(format!("{node}"), "n42");
    }
}
