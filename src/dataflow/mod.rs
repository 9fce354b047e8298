//! The dataflow layer: states, nodes, and data-movement edges.
//!
//! A dataflow state is one control block's computation: an acyclic
//! multigraph in which access nodes name data containers, code nodes carry
//! executable logic behind named connectors, paired scope entry/exit nodes
//! delimit parallel iteration scopes, and nested-graph nodes embed whole IR
//! instances. Edges carry [`Memlet`]s describing exactly which container
//! elements move.
//!
//! # Key Components
//!
//! - [`DataflowState`] - The state graph with cached scope nesting,
//!   data-movement path/tree tracing, and read/write-set inference
//! - [`DataflowNode`] - The closed node taxonomy
//! - [`Memlet`] / [`MemletEdge`] / [`MemletTree`] - Data-movement payloads
//! - [`GraphView`] / [`SubgraphView`] - The shared read-only query surface,
//!   including call-argument inference
//!
//! # Example
//!
//! ```rust
//! use stategraph::data::ScheduleKind;
//! use stategraph::dataflow::{CodeBlock, DataflowState, Memlet};
//! use stategraph::symbolic::Subset;
//!
//! let mut state = DataflowState::new("axpy");
//! let x = state.add_access("x");
//! let y = state.add_access("y");
//! let (entry, exit) = state.add_scope(
//!     "map",
//!     &["i"],
//!     Subset::parse("0:N - 1").unwrap(),
//!     ScheduleKind::Parallel,
//! );
//! let code = state.add_code(
//!     "scale",
//!     CodeBlock::expression("out = a * xi"),
//!     vec!["xi".to_string()],
//!     vec!["out".to_string()],
//! );
//! state
//!     .add_memlet_path(
//!         &[x, entry, code],
//!         Memlet::new("x", Subset::parse("i").unwrap()),
//!         None,
//!         Some("xi"),
//!     )
//!     .unwrap();
//! state
//!     .add_memlet_path(
//!         &[code, exit, y],
//!         Memlet::new("y", Subset::parse("i").unwrap()),
//!         Some("out"),
//!         None,
//!     )
//!     .unwrap();
//!
//! assert_eq!(state.scope_dict().unwrap()[&code], Some(entry));
//! ```

mod memlet;
mod node;
mod state;
mod view;

pub use memlet::{Memlet, MemletEdge, MemletTree, MemletTreeIter, ReductionOp};
pub use node::{
    connector_id, is_in_connector, is_out_connector, matching_in, matching_out, AccessNode,
    CodeBlock, CodeLanguage, CodeNode, DataflowNode, NestedGraphNode, ScopeEntryNode,
    ScopeExitNode, IN_PREFIX, OUT_PREFIX,
};
pub use state::{DataflowState, ScopeInfo, ScopeTreeNode};
pub use view::{GraphView, RecursiveEdgeIter, RecursiveNodeIter, SubgraphView};
