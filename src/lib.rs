// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]
#![forbid(unsafe_code)]

//! # stategraph
//!
//! [![Crates.io](https://img.shields.io/crates/v/stategraph.svg)](https://crates.io/crates/stategraph)
//! [![Documentation](https://docs.rs/stategraph/badge.svg)](https://docs.rs/stategraph)
//! [![License](https://img.shields.io/badge/license-Apache--2.0-blue.svg)](https://github.com/BinFlip/stategraph/blob/main/LICENSE-APACHE)
//!
//! A graph-based intermediate representation for data-centric parallel-program
//! compilers. `stategraph` combines a *dataflow* view (how data moves between
//! computational nodes within one control state) with a *control-flow* view
//! (how execution transitions between states, including structured loops and
//! early exits), and implements the graph algorithms both views need: scope
//! nesting, data-movement tracing, read/write-set inference, symbol liveness,
//! and structural lowering of loops and regions into flat state machines.
//!
//! ## Features
//!
//! - **Dataflow states** - Multigraphs of access, code, scope, and nested-graph
//!   nodes connected by element-precise data-movement edges (memlets)
//! - **Scope nesting** - Cached entry/exit scope computation with cycle
//!   diagnosis, scope trees, and connector-based path and tree tracing
//! - **Control-flow regions** - Conditioned, symbol-assigning transitions
//!   between states, nested regions, loops, and break/continue/return blocks
//! - **Symbol liveness** - Free/defined/used-before-assignment analysis across
//!   nested regions with loop-variable correction
//! - **Structural inlining** - Lowering of loops and regions into explicit
//!   `init`/`guard`/`latch`/`end` state machines
//! - **Stable call signatures** - Argument inference over states and subgraph
//!   views for code generation
//! - **Persistence** - JSON round-tripping of whole graphs including nested
//!   instances
//!
//! ## Quick Start
//!
//! Add `stategraph` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! stategraph = "0.2"
//! ```
//!
//! ### Using the Prelude
//!
//! For convenient access to the most commonly used types, import the prelude:
//!
//! ```rust
//! use stategraph::prelude::*;
//!
//! let mut graph = FlowGraph::new("program");
//! graph.add_symbol("N", ElementType::Int32);
//! graph.add_container("A", DataDescriptor::array(ElementType::Float64, &["N".into()]))?;
//!
//! let state = graph.add_state(FlowGraph::ROOT, "compute", true)?;
//! # Ok::<(), stategraph::Error>(())
//! ```
//!
//! ### Building a Mapped Computation
//!
//! ```rust
//! use stategraph::prelude::*;
//!
//! let mut graph = FlowGraph::new("doubler");
//! graph.add_symbol("N", ElementType::Int32);
//! graph.add_container("A", DataDescriptor::array(ElementType::Float64, &["N".into()]))?;
//! graph.add_container("B", DataDescriptor::array(ElementType::Float64, &["N".into()]))?;
//!
//! let block = graph.add_state(FlowGraph::ROOT, "compute", true)?;
//! let state = graph.state_mut(FlowGraph::ROOT, block).unwrap();
//!
//! let a = state.add_access("A");
//! let b = state.add_access("B");
//! let (entry, exit) = state.add_scope(
//!     "map",
//!     &["i"],
//!     Subset::parse("0:N - 1").unwrap(),
//!     ScheduleKind::Parallel,
//! );
//! let code = state.add_code(
//!     "double",
//!     CodeBlock::expression("out = x * 2"),
//!     vec!["x".to_string()],
//!     vec!["out".to_string()],
//! );
//! state.add_memlet_path(&[a, entry, code], Memlet::parse("A[i]").unwrap(), None, Some("x"))?;
//! state.add_memlet_path(&[code, exit, b], Memlet::parse("B[i]").unwrap(), Some("out"), None)?;
//!
//! // The stable call signature for code generation
//! let state = graph.state(FlowGraph::ROOT, block).unwrap();
//! let signature = state.signature(&graph)?;
//! assert_eq!(signature, vec!["double *A", "double *B", "int32_t N"]);
//! # Ok::<(), stategraph::Error>(())
//! ```
//!
//! ## Architecture
//!
//! `stategraph` is organized into several key modules:
//!
//! - [`prelude`] - Convenient re-exports of commonly used types and traits
//! - [`graph`] - The generic arena multigraph and shared graph algorithms
//! - [`symbolic`] - Symbolic expressions, assignments, and index subsets
//! - [`data`] - Data container descriptors and storage/lifetime vocabulary
//! - [`dataflow`] - States, nodes, memlets, views, and argument inference
//! - [`control`] - Regions, loops, transitions, and structural inlining
//! - [`analysis`] - Symbol liveness across nested regions
//! - [`serialize`] - The persisted document representation
//! - [`Error`] and [`Result`] - Comprehensive error handling
//!
//! ### Ownership Model
//!
//! All graph elements live in index-addressed arenas: nodes and edges inside
//! their graph, control-flow regions inside the root [`control::FlowGraph`].
//! Parent/child relations are plain indices, so the deeply nested structure
//! contains no reference cycles and parent lookup is O(1). Derived data
//! (scope nesting, start blocks) is cached per graph and invalidated
//! transactionally by every structural mutation.
//!
//! ### Consumers
//!
//! The crate is the middle of a compiler pipeline: frontends construct
//! graphs bottom-up through the builder APIs; transformation engines match
//! patterns through the read-only [`dataflow::GraphView`] interface and
//! apply rewrites through the edit operations; code generators consume
//! final traversal orders, argument lists, and data dependencies.
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`](Result) with comprehensive error
//! information:
//!
//! ```rust
//! use stategraph::{Error, control::FlowGraph};
//!
//! let mut graph = FlowGraph::new("program");
//! graph.add_state(FlowGraph::ROOT, "a", false).unwrap();
//! graph.add_state(FlowGraph::ROOT, "b", false).unwrap();
//!
//! match graph.region(FlowGraph::ROOT).unwrap().start_block() {
//!     Err(Error::AmbiguousStartBlock { region }) => {
//!         println!("region {region} needs an explicit start block");
//!     }
//!     other => println!("start: {other:?}"),
//! }
//! ```
//!
//! Structural errors (cyclic dataflow graphs, missing scope exits, ambiguous
//! start blocks) abort the triggering operation with diagnosable context.
//! Applicability probes — structural inlining of regions whose statements do
//! not qualify — return `Ok(false)` instead, since transformation engines
//! routinely test transformations before applying them.

#[macro_use]
pub(crate) mod error;

pub mod analysis;
pub mod control;
pub mod data;
pub mod dataflow;
pub mod graph;
pub mod symbolic;
pub mod utils;

/// Convenient re-exports of the most commonly used types and traits.
///
/// This module provides a curated selection of the most frequently used types
/// from across the stategraph library, allowing for convenient glob imports.
///
/// # Example
///
/// ```rust
/// use stategraph::prelude::*;
///
/// let graph = FlowGraph::new("program");
/// assert_eq!(graph.region_count(), 1);
/// ```
pub mod prelude;

/// The persisted document representation and JSON round-tripping.
///
/// See [`serialize::FlowGraphDoc`] for the document layout: typed records
/// per block/node, edges as `(src, dst, payload)` triples, and a
/// `scope_dict` side-table per state.
pub mod serialize;

/// `stategraph` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is
/// always [`Error`]. This is used consistently throughout the crate for all
/// fallible operations.
///
/// # Examples
///
/// ```rust
/// use stategraph::{control::FlowGraph, Result};
///
/// fn build() -> Result<FlowGraph> {
///     let mut graph = FlowGraph::new("program");
///     graph.add_state(FlowGraph::ROOT, "entry", true)?;
///     Ok(graph)
/// }
/// # build().unwrap();
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `stategraph` Error type
///
/// The main error type for all operations in this crate. Provides detailed
/// error information for graph construction, scope computation, data-movement
/// tracing, and persistence.
pub use error::Error;

/// The root graph type: one complete IR instance.
///
/// See [`control::FlowGraph`] for the full builder, traversal, and
/// structural-inlining API.
///
/// # Example
///
/// ```rust
/// use stategraph::FlowGraph;
///
/// let graph = FlowGraph::new("program");
/// assert_eq!(graph.name(), "program");
/// ```
pub use control::FlowGraph;

/// One dataflow state: a single control block's computation graph.
///
/// See [`dataflow::DataflowState`] for scope queries, memlet tracing, and
/// read/write-set inference.
pub use dataflow::DataflowState;
