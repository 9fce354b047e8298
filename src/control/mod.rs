//! The control layer: regions, blocks, transitions, and the root graph.
//!
//! Control flow is a hierarchy of [`ControlRegion`]s whose nodes are
//! [`ControlBlock`]s — dataflow states, nested regions, or terminators —
//! connected by conditioned, symbol-assigning [`InterstateEdge`]s. The
//! whole hierarchy is owned by one [`FlowGraph`], which also carries the
//! container, symbol, and constant tables and implements structural
//! inlining of nested regions and loops.
//!
//! # Key Components
//!
//! - [`FlowGraph`] - The root IR instance and region arena
//! - [`ControlRegion`] / [`RegionKind`] / [`LoopParams`] - Regions and loops
//! - [`ControlBlock`] - The closed block taxonomy
//! - [`InterstateEdge`] - Conditioned transitions
//!
//! # Example
//!
//! ```rust
//! use stategraph::control::{FlowGraph, LoopParams};
//!
//! let mut graph = FlowGraph::new("program");
//! let looped = graph
//!     .add_loop_region(
//!         FlowGraph::ROOT,
//!         "sum_loop",
//!         LoopParams::for_loop("i", "i = 0", "i < 10", "i = i + 1"),
//!         true,
//!     )
//!     .unwrap();
//! graph.add_state(looped, "body", true).unwrap();
//!
//! // Lower the loop into explicit guard/latch states
//! assert!(graph.inline_loop(looped).unwrap());
//! ```

mod edge;
mod graph;
mod region;

pub use edge::InterstateEdge;
pub use graph::FlowGraph;
pub use region::{ControlBlock, ControlRegion, LoopParams, RegionId, RegionKind};
