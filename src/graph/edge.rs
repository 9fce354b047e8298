//! Edge identifier implementation for directed graphs.
//!
//! This module provides the [`EdgeId`] type, a strongly-typed identifier for edges
//! within a directed graph. The newtype wrapper provides type safety and prevents
//! accidental confusion between edge indices and other integer values.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A strongly-typed identifier for edges within a directed graph.
///
/// `EdgeId` wraps a `usize` index, providing type safety to prevent
/// accidental mixing of edge indices with other integer values or node indices.
/// Edge IDs are assigned sequentially starting from 0 when edges are added to a graph,
/// and remain stable when other edges are removed.
///
/// # Usage
///
/// Edge IDs are created by [`DirectedGraph::add_edge`](crate::graph::DirectedGraph::add_edge)
/// and should not typically be constructed manually. They are used to:
///
/// - Reference edges when querying edge data (e.g. memlets or inter-state transitions)
/// - Look up edge endpoints (source and target nodes)
/// - Trace data-movement paths and trees across scope boundaries
///
/// # Thread Safety
///
/// `EdgeId` is [`Copy`], [`Send`], and [`Sync`], enabling efficient passing between
/// threads and use in concurrent data structures.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub(crate) usize);

impl EdgeId {
    /// Creates a new `EdgeId` from a raw index value.
    ///
    /// This constructor is primarily intended for internal use and testing.
    /// Normal usage should obtain `EdgeId` values from
    /// [`DirectedGraph::add_edge`](crate::graph::DirectedGraph::add_edge).
    ///
    /// # Arguments
    ///
    /// * `index` - The raw edge index (0-based)
    ///
    /// # Returns
    ///
    /// A new `EdgeId` wrapping the provided index.
    #[must_use]
    #[inline]
    pub const fn new(index: usize) -> Self {
        EdgeId(index)
    }

    /// Returns the raw index value of this edge identifier.
    ///
    /// The index is a 0-based position that can be used to index into vectors
    /// or arrays that store per-edge data.
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

impl fmt::Debug for EdgeId {
    /// Formats the edge ID for debugging output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EdgeId({})", self.0)
    }
}

impl fmt::Display for EdgeId {
    /// Formats the edge ID for user display.
    ///
    /// The display format shows just the prefix and index for compact output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

impl From<usize> for EdgeId {
    /// Converts a raw `usize` index into an `EdgeId`.
    ///
    /// This conversion is provided for convenience but should be used carefully
    /// to avoid creating invalid edge IDs that don't correspond to actual edges
    /// in a graph.
    #[inline]
    fn from(index: usize) -> Self {
        EdgeId(index)
    }
}

impl From<EdgeId> for usize {
    /// Extracts the raw index from an `EdgeId`.
    #[inline]
    fn from(edge: EdgeId) -> Self {
        edge.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_edge_id_new() {
        let edge = EdgeId::new(42);
        assert_eq!(edge.index(), 42);
    }

    #[test]
    fn test_edge_id_equality() {
        assert_eq!(EdgeId::new(5), EdgeId::new(5));
        assert_ne!(EdgeId::new(5), EdgeId::new(10));
    }

    #[test]
    fn test_edge_id_ordering() {
        let mut edges = vec![EdgeId::new(3), EdgeId::new(1), EdgeId::new(2)];
        edges.sort();
        assert_eq!(edges, vec![EdgeId::new(1), EdgeId::new(2), EdgeId::new(3)]);
    }

    #[test]
    fn test_edge_id_hash() {
        let mut set: HashSet<EdgeId> = HashSet::new();
        set.insert(EdgeId::new(1));
        set.insert(EdgeId::new(2));
        set.insert(EdgeId::new(1)); // Should not add duplicate

        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_edge_id_display_format() {
        assert_eq!(format!("{}", EdgeId::new(42)), "e42");
        assert_eq!(format!("{:?}", EdgeId::new(42)), "EdgeId(42)");
    }

    #[test]
    fn test_edge_id_distinct_from_node_id() {
        // This test demonstrates that EdgeId and NodeId are distinct types
        // and cannot be accidentally mixed (verified at compile time)
        use crate::graph::NodeId;

        let node = NodeId::new(5);
        let edge = EdgeId::new(5);

        // Both have the same underlying value but are different types
        assert_eq!(node.index(), edge.index());

        // The following would not compile, demonstrating type safety:
        // let _: NodeId = edge; // Error: expected NodeId, found EdgeId
        // let _: EdgeId = node; // Error: expected EdgeId, found NodeId
    }
}
