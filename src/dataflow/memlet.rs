//! Data-movement edges ("memlets").
//!
//! A memlet describes which elements of a named data container move along one
//! edge of a dataflow state: the container, an index subset, and optionally a
//! reduction operator for conflicting writes. Connector names ride on the
//! edge payload ([`MemletEdge`]) since they describe the attachment points,
//! not the data movement itself.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::graph::EdgeId;
use crate::symbolic::Subset;

/// Reduction operator applied to conflicting writes.
///
/// A memlet carrying a reduction operator may be written concurrently by all
/// iterations of a parallel scope; the operator resolves the conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReductionOp {
    /// Elementwise addition
    Sum,
    /// Elementwise multiplication
    Product,
    /// Elementwise minimum
    Min,
    /// Elementwise maximum
    Max,
    /// A custom commutative operator given as an expression over `a` and `b`
    Custom(String),
}

impl fmt::Display for ReductionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReductionOp::Sum => f.write_str("sum"),
            ReductionOp::Product => f.write_str("product"),
            ReductionOp::Min => f.write_str("min"),
            ReductionOp::Max => f.write_str("max"),
            ReductionOp::Custom(expr) => write!(f, "custom({expr})"),
        }
    }
}

/// A data movement descriptor.
///
/// # Empty Memlets
///
/// A memlet without a data container (`data == None`) moves nothing and only
/// expresses an ordering dependency between its endpoints. Empty memlets are
/// excluded from read/write sets and are their own data-movement path.
///
/// # Examples
///
/// ```rust
/// use stategraph::dataflow::Memlet;
/// use stategraph::symbolic::Subset;
///
/// let m = Memlet::new("A", Subset::parse("0:9").unwrap());
/// assert!(!m.is_empty());
/// assert_eq!(m.to_string(), "A[0:9]");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memlet {
    /// Name of the data container being moved; `None` for empty memlets
    pub data: Option<String>,
    /// The accessed element subset, relative to `data`
    pub subset: Subset,
    /// The element subset on the opposite edge side, if it differs
    /// (reshaping or copying between containers)
    pub other_subset: Option<Subset>,
    /// Reduction operator for conflicting writes
    pub wcr: Option<ReductionOp>,
}

impl Memlet {
    /// Creates a memlet moving `subset` of the container `data`.
    pub fn new(data: impl Into<String>, subset: Subset) -> Self {
        Memlet {
            data: Some(data.into()),
            subset,
            other_subset: None,
            wcr: None,
        }
    }

    /// Creates an empty memlet expressing only an ordering dependency.
    #[must_use]
    pub fn empty() -> Self {
        Memlet {
            data: None,
            subset: Subset::elements(&["0"]),
            other_subset: None,
            wcr: None,
        }
    }

    /// Creates a memlet from the textual form `A[0:N, i]`.
    ///
    /// # Returns
    ///
    /// The parsed memlet, or `None` on a malformed description.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let open = text.find('[')?;
        if !text.ends_with(']') || open == 0 {
            return None;
        }
        let data = &text[..open];
        let subset = Subset::parse(&text[open + 1..text.len() - 1])?;
        Some(Memlet::new(data, subset))
    }

    /// Attaches a reduction operator for conflicting writes and returns the
    /// memlet.
    #[must_use]
    pub fn with_wcr(mut self, wcr: ReductionOp) -> Self {
        self.wcr = Some(wcr);
        self
    }

    /// Attaches the subset of the opposite edge side and returns the memlet.
    #[must_use]
    pub fn with_other_subset(mut self, other: Subset) -> Self {
        self.other_subset = Some(other);
        self
    }

    /// Returns `true` if this memlet moves no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_none()
    }

    /// Extracts the free symbols referenced by the memlet subsets.
    ///
    /// Symbols appear in subset bounds either from global definitions or
    /// from enclosing scope parameters; both are reported.
    #[must_use]
    pub fn used_symbols(&self) -> BTreeSet<String> {
        if self.is_empty() {
            return BTreeSet::new();
        }
        let mut result = self.subset.free_symbols();
        if let Some(other) = &self.other_subset {
            result.extend(other.free_symbols());
        }
        result
    }

    /// Renames the data container and every whole-identifier symbol
    /// occurrence in the subsets.
    pub fn replace(&mut self, old: &str, new: &str) {
        if self.data.as_deref() == Some(old) {
            self.data = Some(new.to_string());
        }
        self.subset.replace(old, new);
        if let Some(other) = &mut self.other_subset {
            other.replace(old, new);
        }
    }
}

impl fmt::Display for Memlet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data {
            Some(data) => {
                write!(f, "{data}[{}]", self.subset)?;
                if let Some(wcr) = &self.wcr {
                    write!(f, " ({wcr})")?;
                }
                Ok(())
            }
            None => f.write_str("(empty)"),
        }
    }
}

/// The payload of one dataflow edge: a memlet plus its attachment
/// connectors.
///
/// Edges entering or leaving scope nodes follow the structured connector
/// convention: an `IN_<id>` destination connector on the way in pairs with
/// the `OUT_<id>` source connector on the way out, with matching `<id>`
/// denoting "passes through the scope unchanged". Path and tree tracing
/// rely on this invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemletEdge {
    /// Connector on the source node this edge leaves from
    pub src_conn: Option<String>,
    /// Connector on the destination node this edge enters
    pub dst_conn: Option<String>,
    /// The data movement carried by the edge
    pub memlet: Memlet,
}

impl MemletEdge {
    /// Creates an edge payload without connectors.
    #[must_use]
    pub fn new(memlet: Memlet) -> Self {
        MemletEdge {
            src_conn: None,
            dst_conn: None,
            memlet,
        }
    }

    /// Creates an edge payload with explicit connectors.
    pub fn with_connectors(
        memlet: Memlet,
        src_conn: Option<impl Into<String>>,
        dst_conn: Option<impl Into<String>>,
    ) -> Self {
        MemletEdge {
            src_conn: src_conn.map(Into::into),
            dst_conn: dst_conn.map(Into::into),
            memlet,
        }
    }
}

/// A tree of sibling data-movement edges across scope nesting levels.
///
/// For edges crossing a scope boundary with broadcast or reduction fan-out,
/// the tree collects all edges sharing the same connector id at every
/// nesting level, rooted at the outermost involved edge. Edges with no scope
/// involvement yield a degenerate single-node tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemletTree {
    /// The edge at this tree position
    pub edge: EdgeId,
    /// Edges one nesting level further along the propagation direction
    pub children: Vec<MemletTree>,
}

impl MemletTree {
    /// Creates a leaf tree node.
    #[must_use]
    pub fn leaf(edge: EdgeId) -> Self {
        MemletTree {
            edge,
            children: Vec::new(),
        }
    }

    /// Returns the edge at the tree root.
    #[must_use]
    pub fn edge(&self) -> EdgeId {
        self.edge
    }

    /// Returns an iterator over all edges in the tree, in pre-order.
    pub fn iter(&self) -> MemletTreeIter<'_> {
        MemletTreeIter { stack: vec![self] }
    }

    /// Returns the edges at the leaves of the tree.
    #[must_use]
    pub fn leaves(&self) -> Vec<EdgeId> {
        let mut result = Vec::new();
        for node in self.iter_nodes() {
            if node.children.is_empty() {
                result.push(node.edge);
            }
        }
        result
    }

    /// Finds the subtree rooted at the given edge, if present.
    #[must_use]
    pub fn find(&self, edge: EdgeId) -> Option<&MemletTree> {
        self.iter_nodes().find(|node| node.edge == edge)
    }

    /// Returns the number of edges in the tree.
    #[must_use]
    pub fn len(&self) -> usize {
        self.iter_nodes().count()
    }

    /// Returns `true` if the tree consists of a single edge.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.children.is_empty()
    }

    fn iter_nodes(&self) -> MemletTreeIter<'_> {
        MemletTreeIter { stack: vec![self] }
    }
}

/// Pre-order iterator over the nodes of a [`MemletTree`].
pub struct MemletTreeIter<'a> {
    stack: Vec<&'a MemletTree>,
}

impl<'a> Iterator for MemletTreeIter<'a> {
    type Item = &'a MemletTree;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        for child in node.children.iter().rev() {
            self.stack.push(child);
        }
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memlet_display() {
        let m = Memlet::new("A", Subset::parse("0:9, i").unwrap());
        assert_eq!(m.to_string(), "A[0:9, i]");

        let m = m.with_wcr(ReductionOp::Sum);
        assert_eq!(m.to_string(), "A[0:9, i] (sum)");

        assert_eq!(Memlet::empty().to_string(), "(empty)");
    }

    #[test]
    fn test_memlet_parse() {
        let m = Memlet::parse("A[0:N, i]").unwrap();
        assert_eq!(m.data.as_deref(), Some("A"));
        assert_eq!(m.subset.dims(), 2);

        assert!(Memlet::parse("A").is_none());
        assert!(Memlet::parse("[0:9]").is_none());
    }

    #[test]
    fn test_memlet_used_symbols() {
        let m = Memlet::new("A", Subset::parse("0:N, i").unwrap());
        let syms = m.used_symbols();
        assert!(syms.contains("N"));
        assert!(syms.contains("i"));
        // The container name is not a symbol
        assert!(!syms.contains("A"));

        assert!(Memlet::empty().used_symbols().is_empty());
    }

    #[test]
    fn test_memlet_replace() {
        let mut m = Memlet::new("A", Subset::parse("0:N").unwrap());
        m.replace("A", "B");
        m.replace("N", "M");
        assert_eq!(m.to_string(), "B[0:M]");

        // Non-occurrence is silently ignored
        m.replace("X", "Y");
        assert_eq!(m.to_string(), "B[0:M]");
    }

    #[test]
    fn test_memlet_tree_iteration() {
        let tree = MemletTree {
            edge: EdgeId::new(0),
            children: vec![
                MemletTree::leaf(EdgeId::new(1)),
                MemletTree {
                    edge: EdgeId::new(2),
                    children: vec![MemletTree::leaf(EdgeId::new(3))],
                },
            ],
        };

        let order: Vec<usize> = tree.iter().map(|t| t.edge.index()).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
        assert_eq!(tree.leaves(), vec![EdgeId::new(1), EdgeId::new(3)]);
        assert_eq!(tree.len(), 4);
        assert!(tree.find(EdgeId::new(3)).is_some());
        assert!(tree.find(EdgeId::new(9)).is_none());
    }
}
