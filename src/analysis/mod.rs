//! Analysis algorithms over the IR.
//!
//! This module hosts the cross-cutting analyses that operate on whole
//! control-flow regions rather than on one dataflow state: currently the
//! symbol liveness engine, which computes free, defined, and
//! used-before-assignment symbol sets across nested regions and feeds both
//! declaration emission in code generators and argument inference.
//!
//! # Key Components
//!
//! - [`SymbolLiveness`] - The free/defined/used-before-assignment triple
//! - [`region_symbols`] - The liveness computation over a region tree
//!
//! # Examples
//!
//! ```rust
//! use stategraph::analysis::region_symbols;
//! use stategraph::control::{FlowGraph, LoopParams};
//!
//! let mut graph = FlowGraph::new("program");
//! let looped = graph
//!     .add_loop_region(
//!         FlowGraph::ROOT,
//!         "loop",
//!         LoopParams::for_loop("i", "i = 0", "i < 10", "i = i + 1"),
//!         true,
//!     )
//!     .unwrap();
//! graph.add_state(looped, "body", true).unwrap();
//!
//! let liveness = region_symbols(&graph, looped, true);
//! assert!(liveness.defined.contains("i"));
//! assert!(!liveness.free.contains("i"));
//! ```

mod liveness;

pub use liveness::{defined_symbols, free_symbols, region_symbols, SymbolLiveness};
