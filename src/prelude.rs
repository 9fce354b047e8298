//! # stategraph Prelude
//!
//! This module provides a convenient prelude for the most commonly used types
//! and traits of the stategraph library. Import this module to get quick
//! access to the essential types for building, querying, and transforming
//! graphs.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all stategraph operations
pub use crate::Error;

/// The result type used throughout stategraph
pub use crate::Result;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// The root graph type: one complete IR instance
pub use crate::control::FlowGraph;

/// One dataflow state: a single control block's computation
pub use crate::dataflow::DataflowState;

// ================================================================================================
// Control Layer
// ================================================================================================

/// Control blocks, regions, loops, and transitions
pub use crate::control::{ControlBlock, ControlRegion, InterstateEdge, LoopParams, RegionId, RegionKind};

// ================================================================================================
// Dataflow Layer
// ================================================================================================

/// Node kinds and connector helpers
pub use crate::dataflow::{
    AccessNode, CodeBlock, CodeLanguage, CodeNode, DataflowNode, NestedGraphNode, ScopeEntryNode,
    ScopeExitNode,
};

/// Data-movement payloads and trees
pub use crate::dataflow::{Memlet, MemletEdge, MemletTree, ReductionOp};

/// The read-only query surface and subgraph views
pub use crate::dataflow::{GraphView, SubgraphView};

// ================================================================================================
// Symbolic Layer
// ================================================================================================

/// Symbolic expressions, assignments, and index subsets
pub use crate::symbolic::{Assignment, Range, Subset, SymbolicExpr};

// ================================================================================================
// Data Descriptors
// ================================================================================================

/// Container descriptors and the storage/lifetime vocabulary
pub use crate::data::{
    AllocationLifetime, ConstantValue, DataDescriptor, ElementType, ScheduleKind, StorageClass,
};

// ================================================================================================
// Graph Infrastructure
// ================================================================================================

/// Strongly-typed graph element identifiers
pub use crate::graph::{EdgeId, NodeId};

// ================================================================================================
// Analysis
// ================================================================================================

/// Symbol liveness over control-flow regions
pub use crate::analysis::{region_symbols, SymbolLiveness};
