//! Graph algorithms for IR analysis.
//!
//! This module provides standard graph algorithms used by the dataflow and
//! control layers: scope computation, data-dependency decomposition, and
//! structural validation all bottom out here.
//!
//! # Available Algorithms
//!
//! ## Traversal
//!
//! - [`dfs`] - Depth-first search traversal
//! - [`bfs`] - Breadth-first search traversal
//! - [`reverse_postorder`] - Reverse postorder traversal (useful for forward analyses)
//! - [`postorder`] - Postorder traversal
//!
//! ## Cycle Detection
//!
//! - [`has_cycle`] - Check if any cycle is reachable from a node
//! - [`find_cycles`] - Collect the nodes participating in cycles
//!
//! ## Topological Ordering
//!
//! - [`topological_sort`] - Compute a topological ordering of all nodes
//! - [`topological_sort_subset`] - Topological ordering restricted to a node subset
//!
//! ## Connectivity
//!
//! - [`weakly_connected_components`] - Partition nodes into maximal
//!   data-independent components (ignoring edge direction)
//!
//! # Algorithm Selection
//!
//! | Algorithm | Time Complexity | Use Case |
//! |-----------|-----------------|----------|
//! | DFS/BFS | O(V + E) | General traversal |
//! | Topological Sort | O(V + E) | Dependency ordering, write masking |
//! | Cycle Detection | O(V + E) | Structural validation |
//! | Components | O(V + E) | Concurrent-subgraph decomposition |
//!
//! # Examples
//!
//! ```rust
//! use stategraph::graph::{DirectedGraph, NodeId, algorithms};
//!
//! let mut graph: DirectedGraph<&str, ()> = DirectedGraph::new();
//! let a = graph.add_node("A");
//! let b = graph.add_node("B");
//! let c = graph.add_node("C");
//! graph.add_edge(a, b, ()).unwrap();
//! graph.add_edge(b, c, ()).unwrap();
//!
//! let order: Vec<NodeId> = algorithms::dfs(&graph, a).collect();
//! assert_eq!(order, vec![a, b, c]);
//! assert!(!algorithms::has_cycle(&graph, a));
//! ```

mod components;
mod cycles;
mod topological;
mod traversal;

// Re-export all public items
pub use components::weakly_connected_components;
pub use cycles::{find_cycles, has_cycle};
pub use topological::{topological_sort, topological_sort_subset};
#[allow(unused_imports)]
pub use traversal::{bfs, dfs, postorder, reverse_postorder};
