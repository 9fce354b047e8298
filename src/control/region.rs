//! Control blocks and control-flow regions.
//!
//! A control-flow region is a directed graph of control blocks connected by
//! [`InterstateEdge`]s. Blocks are either dataflow states, references to
//! nested regions held in the root graph's arena, or one of the three
//! contentless terminators (break, continue, return). Loop behavior is a
//! *kind* of region ([`RegionKind::Loop`]) rather than a separate type, so
//! every algorithm matches the kind exhaustively.

use std::collections::HashSet;
use std::fmt;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::control::InterstateEdge;
use crate::dataflow::DataflowState;
use crate::graph::{DirectedGraph, EdgeId, NodeId};
use crate::symbolic::SymbolicExpr;
use crate::{Error, Result};

/// A strongly-typed identifier for control-flow regions within the root
/// graph's region arena.
///
/// Region IDs are assigned sequentially when regions are added and remain
/// stable across removals; the root region is always
/// [`FlowGraph::ROOT`](crate::control::FlowGraph::ROOT).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionId(pub(crate) usize);

impl RegionId {
    /// Creates a new `RegionId` from a raw index value.
    #[must_use]
    #[inline]
    pub const fn new(index: usize) -> Self {
        RegionId(index)
    }

    /// Returns the raw index value of this region identifier.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RegionId({})", self.0)
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Loop-specific parameters of a [`RegionKind::Loop`] region.
///
/// A loop with only a condition is a while loop; adding init and update
/// statements makes it a for loop. An inverted loop checks its condition
/// after the first iteration instead of before.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopParams {
    /// The loop condition, checked before (or after, if inverted) each
    /// iteration
    pub condition: SymbolicExpr,
    /// Statement(s) run once before the first iteration; must consist of
    /// simple assignments for structural inlining to apply
    pub init_statement: Option<String>,
    /// Statement(s) run after each iteration; same restriction as
    /// `init_statement`
    pub update_statement: Option<String>,
    /// The loop variable, if the loop has one
    pub loop_variable: Option<String>,
    /// `true` if the condition is checked after the first iteration
    pub inverted: bool,
}

impl LoopParams {
    /// Creates while-loop parameters with only a condition.
    pub fn while_loop(condition: impl Into<SymbolicExpr>) -> Self {
        LoopParams {
            condition: condition.into(),
            init_statement: None,
            update_statement: None,
            loop_variable: None,
            inverted: false,
        }
    }

    /// Creates classic for-loop parameters.
    pub fn for_loop(
        loop_variable: impl Into<String>,
        init: impl Into<String>,
        condition: impl Into<SymbolicExpr>,
        update: impl Into<String>,
    ) -> Self {
        LoopParams {
            condition: condition.into(),
            init_statement: Some(init.into()),
            update_statement: Some(update.into()),
            loop_variable: Some(loop_variable.into()),
            inverted: false,
        }
    }

    /// Marks the loop as condition-checked-after-body and returns the
    /// parameters.
    #[must_use]
    pub fn inverted(mut self) -> Self {
        self.inverted = true;
        self
    }
}

/// The kind of a control-flow region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegionKind {
    /// A plain region: blocks execute according to transition conditions
    Sequence,
    /// A loop region: the body repeats under the loop parameters
    Loop(LoopParams),
}

/// A control block: one node of a control-flow region.
///
/// The closed set of block kinds; algorithms over regions match this enum
/// exhaustively.
#[derive(Debug, Clone)]
pub enum ControlBlock {
    /// A dataflow state
    State(DataflowState),
    /// A nested control-flow region, held in the root graph's arena
    Region(RegionId),
    /// Terminator: transfers control to the enclosing loop's exit
    Break {
        /// Display label of the block
        label: String,
    },
    /// Terminator: transfers control to the enclosing loop's update step
    Continue {
        /// Display label of the block
        label: String,
    },
    /// Terminator: propagates an early exit out of the whole procedure
    Return {
        /// Display label of the block
        label: String,
    },
}

impl ControlBlock {
    /// Returns the display label of the block.
    ///
    /// Region blocks are labeled by the region they reference only through
    /// the owning [`FlowGraph`](crate::control::FlowGraph); at this level
    /// they render as their identifier.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            ControlBlock::State(state) => state.label().to_string(),
            ControlBlock::Region(id) => id.to_string(),
            ControlBlock::Break { label }
            | ControlBlock::Continue { label }
            | ControlBlock::Return { label } => label.clone(),
        }
    }

    /// Returns `true` for dataflow states.
    #[must_use]
    pub const fn is_state(&self) -> bool {
        matches!(self, ControlBlock::State(_))
    }

    /// Returns `true` for nested region references.
    #[must_use]
    pub const fn is_region(&self) -> bool {
        matches!(self, ControlBlock::Region(_))
    }

    /// Returns `true` for break, continue, and return terminators.
    #[must_use]
    pub const fn is_terminator(&self) -> bool {
        matches!(
            self,
            ControlBlock::Break { .. } | ControlBlock::Continue { .. } | ControlBlock::Return { .. }
        )
    }

    /// Returns the referenced region id for region blocks.
    #[must_use]
    pub const fn region_id(&self) -> Option<RegionId> {
        match self {
            ControlBlock::Region(id) => Some(*id),
            _ => None,
        }
    }

    /// Returns the contained state for state blocks.
    #[must_use]
    pub const fn as_state(&self) -> Option<&DataflowState> {
        match self {
            ControlBlock::State(state) => Some(state),
            _ => None,
        }
    }
}

/// A control-flow region: a directed graph of control blocks connected by
/// inter-state transitions.
///
/// # Start Block
///
/// Every region has exactly one unambiguous start block, computed as the
/// unique source node of its graph or set manually through
/// [`set_start_block`](Self::set_start_block). The computed start block is
/// cached and invalidated on every structural mutation.
#[derive(Debug, Clone)]
pub struct ControlRegion {
    label: String,
    kind: RegionKind,
    graph: DirectedGraph<ControlBlock, InterstateEdge>,
    start_override: Option<NodeId>,
    start_cache: OnceLock<NodeId>,
}

impl ControlRegion {
    /// Creates a new empty plain region.
    pub fn new(label: impl Into<String>) -> Self {
        ControlRegion {
            label: label.into(),
            kind: RegionKind::Sequence,
            graph: DirectedGraph::new(),
            start_override: None,
            start_cache: OnceLock::new(),
        }
    }

    /// Creates a new empty loop region with the given parameters.
    pub fn new_loop(label: impl Into<String>, params: LoopParams) -> Self {
        ControlRegion {
            label: label.into(),
            kind: RegionKind::Loop(params),
            graph: DirectedGraph::new(),
            start_override: None,
            start_cache: OnceLock::new(),
        }
    }

    /// Returns the region's label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Sets the region's label.
    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    /// Returns the region's kind.
    #[must_use]
    pub fn kind(&self) -> &RegionKind {
        &self.kind
    }

    /// Returns `true` for loop regions.
    #[must_use]
    pub const fn is_loop(&self) -> bool {
        matches!(self.kind, RegionKind::Loop(_))
    }

    /// Returns the loop parameters of a loop region.
    #[must_use]
    pub const fn loop_params(&self) -> Option<&LoopParams> {
        match &self.kind {
            RegionKind::Loop(params) => Some(params),
            RegionKind::Sequence => None,
        }
    }

    /// Returns a mutable reference to the loop parameters of a loop region.
    #[must_use]
    pub fn loop_params_mut(&mut self) -> Option<&mut LoopParams> {
        match &mut self.kind {
            RegionKind::Loop(params) => Some(params),
            RegionKind::Sequence => None,
        }
    }

    /// Returns a reference to the underlying block graph.
    #[must_use]
    pub fn graph(&self) -> &DirectedGraph<ControlBlock, InterstateEdge> {
        &self.graph
    }

    /// Returns the number of blocks in the region.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns `true` if the region contains no blocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    /// Returns a reference to a block, or `None` if the ID is invalid.
    #[must_use]
    pub fn block(&self, block: NodeId) -> Option<&ControlBlock> {
        self.graph.node(block)
    }

    /// Returns a mutable reference to a block, or `None` if the ID is
    /// invalid.
    #[must_use]
    pub fn block_mut(&mut self, block: NodeId) -> Option<&mut ControlBlock> {
        self.graph.node_mut(block)
    }

    /// Returns the contained state of a state block.
    #[must_use]
    pub fn state(&self, block: NodeId) -> Option<&DataflowState> {
        self.graph.node(block).and_then(ControlBlock::as_state)
    }

    /// Returns the contained state of a state block, mutably.
    #[must_use]
    pub fn state_mut(&mut self, block: NodeId) -> Option<&mut DataflowState> {
        match self.graph.node_mut(block) {
            Some(ControlBlock::State(state)) => Some(state),
            _ => None,
        }
    }

    /// Returns an iterator over all `(id, block)` pairs.
    pub fn blocks(&self) -> impl Iterator<Item = (NodeId, &ControlBlock)> + '_ {
        self.graph.nodes()
    }

    /// Returns an iterator over all block identifiers.
    pub fn block_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.graph.node_ids()
    }

    /// Returns an iterator over the region's dataflow states.
    pub fn states(&self) -> impl Iterator<Item = (NodeId, &DataflowState)> + '_ {
        self.graph
            .nodes()
            .filter_map(|(id, block)| block.as_state().map(|s| (id, s)))
    }

    /// Returns an iterator over all `(id, src, dst, edge)` transition
    /// tuples.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, NodeId, NodeId, &InterstateEdge)> + '_ {
        self.graph.edges()
    }

    /// Returns the payload of a transition edge.
    #[must_use]
    pub fn edge(&self, edge: EdgeId) -> Option<&InterstateEdge> {
        self.graph.edge(edge)
    }

    /// Returns the identifiers of transitions entering `block`.
    pub fn in_edges(&self, block: NodeId) -> impl Iterator<Item = EdgeId> + '_ {
        self.graph.in_edges(block)
    }

    /// Returns the identifiers of transitions leaving `block`.
    pub fn out_edges(&self, block: NodeId) -> impl Iterator<Item = EdgeId> + '_ {
        self.graph.out_edges(block)
    }

    /// Returns the blocks with no outgoing transitions.
    #[must_use]
    pub fn sink_blocks(&self) -> Vec<NodeId> {
        self.graph.sink_nodes()
    }

    ///////////////////////////////////////////////////////////////////
    // Start block

    /// Returns the region's start block.
    ///
    /// The start block is the unique source node of the block graph; when
    /// several sources exist, a manual override set through
    /// [`set_start_block`](Self::set_start_block) disambiguates. The result
    /// is cached until the next structural mutation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AmbiguousStartBlock`] when no unique source exists
    /// and no valid override was set.
    pub fn start_block(&self) -> Result<NodeId> {
        if let Some(id) = self.start_cache.get() {
            return Ok(*id);
        }
        let sources = self.graph.source_nodes();
        let start = if sources.len() == 1 {
            sources[0]
        } else if let Some(o) = self.start_override.filter(|o| self.graph.contains_node(*o)) {
            o
        } else {
            return Err(Error::AmbiguousStartBlock {
                region: self.label.clone(),
            });
        };
        Ok(*self.start_cache.get_or_init(|| start))
    }

    /// Manually overrides the start block.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStartBlock`] if the block does not exist.
    pub fn set_start_block(&mut self, block: NodeId) -> Result<()> {
        if !self.graph.contains_node(block) {
            return Err(Error::InvalidStartBlock {
                region: self.label.clone(),
                id: block.index(),
            });
        }
        self.start_override = Some(block);
        self.start_cache = OnceLock::new();
        Ok(())
    }

    /// Returns the manual start-block override, if set.
    #[must_use]
    pub fn start_override(&self) -> Option<NodeId> {
        self.start_override
    }

    ///////////////////////////////////////////////////////////////////
    // Mutation

    fn invalidate_caches(&mut self) {
        self.start_cache = OnceLock::new();
    }

    /// Qualifies a proposed label so it is unique among the region's
    /// blocks.
    fn ensure_unique_label(&self, proposed: &str) -> String {
        let taken: HashSet<String> = self
            .graph
            .nodes()
            .map(|(_, block)| block.label())
            .collect();
        if !taken.contains(proposed) {
            return proposed.to_string();
        }
        let mut i = 0;
        loop {
            let candidate = format!("{proposed}_{i}");
            if !taken.contains(&candidate) {
                return candidate;
            }
            i += 1;
        }
    }

    /// Adds a control block, qualifying its label for uniqueness.
    ///
    /// # Arguments
    ///
    /// * `block` - The block to add
    /// * `is_start` - If `true`, sets the start-block override to the new
    ///   block
    pub fn add_block(&mut self, mut block: ControlBlock, is_start: bool) -> NodeId {
        match &mut block {
            ControlBlock::State(state) => {
                let unique = self.ensure_unique_label(state.label());
                state.set_label(unique);
            }
            ControlBlock::Break { label }
            | ControlBlock::Continue { label }
            | ControlBlock::Return { label } => {
                *label = self.ensure_unique_label(label);
            }
            ControlBlock::Region(_) => {}
        }
        self.invalidate_caches();
        let id = self.graph.add_node(block);
        if is_start {
            self.start_override = Some(id);
        }
        id
    }

    /// Adds a new empty dataflow state.
    pub fn add_state(&mut self, label: impl Into<String>, is_start: bool) -> NodeId {
        let label = self.ensure_unique_label(&label.into());
        self.add_block(ControlBlock::State(DataflowState::new(label)), is_start)
    }

    /// Adds a break terminator block.
    pub fn add_break(&mut self, label: impl Into<String>) -> NodeId {
        let label = self.ensure_unique_label(&label.into());
        self.add_block(ControlBlock::Break { label }, false)
    }

    /// Adds a continue terminator block.
    pub fn add_continue(&mut self, label: impl Into<String>) -> NodeId {
        let label = self.ensure_unique_label(&label.into());
        self.add_block(ControlBlock::Continue { label }, false)
    }

    /// Adds a return terminator block.
    pub fn add_return(&mut self, label: impl Into<String>) -> NodeId {
        let label = self.ensure_unique_label(&label.into());
        self.add_block(ControlBlock::Return { label }, false)
    }

    /// Adds a transition between two blocks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::GraphError`] if either endpoint does not exist.
    pub fn add_edge(&mut self, src: NodeId, dst: NodeId, edge: InterstateEdge) -> Result<EdgeId> {
        self.invalidate_caches();
        self.graph.add_edge(src, dst, edge)
    }

    /// Removes a block and its incident transitions.
    ///
    /// A start-block override pointing at the removed block is cleared.
    ///
    /// # Errors
    ///
    /// Returns [`Error::GraphError`] if the block does not exist.
    pub fn remove_block(&mut self, block: NodeId) -> Result<ControlBlock> {
        self.invalidate_caches();
        if self.start_override == Some(block) {
            self.start_override = None;
        }
        self.graph.remove_node(block)
    }

    /// Removes a transition.
    ///
    /// # Errors
    ///
    /// Returns [`Error::GraphError`] if the edge does not exist.
    pub fn remove_edge(&mut self, edge: EdgeId) -> Result<InterstateEdge> {
        self.invalidate_caches();
        self.graph.remove_edge(edge)
    }

    /// Adds a new state before an existing block, reconnecting the block's
    /// predecessors to the new state.
    ///
    /// # Arguments
    ///
    /// * `block` - The block to prepend the state before
    /// * `label` - Label of the new state
    /// * `edge` - Transition from the new state to `block`
    ///
    /// # Errors
    ///
    /// Returns [`Error::GraphError`] if `block` does not exist.
    pub fn add_state_before(
        &mut self,
        block: NodeId,
        label: impl Into<String>,
        edge: InterstateEdge,
    ) -> Result<NodeId> {
        if !self.graph.contains_node(block) {
            return Err(Error::GraphError(format!("Block {block} does not exist")));
        }
        let new_state = self.add_state(label, false);
        let incoming: Vec<EdgeId> = self.graph.in_edges(block).collect();
        for e in incoming {
            let (src, _) = self.graph.edge_endpoints(e).unwrap();
            let payload = self.remove_edge(e)?;
            self.add_edge(src, new_state, payload)?;
        }
        self.add_edge(new_state, block, edge)?;
        Ok(new_state)
    }

    /// Adds a new state after an existing block, reconnecting the block's
    /// successors to leave from the new state.
    ///
    /// # Arguments
    ///
    /// * `block` - The block to append the state after
    /// * `label` - Label of the new state
    /// * `edge` - Transition from `block` to the new state
    ///
    /// # Errors
    ///
    /// Returns [`Error::GraphError`] if `block` does not exist.
    pub fn add_state_after(
        &mut self,
        block: NodeId,
        label: impl Into<String>,
        edge: InterstateEdge,
    ) -> Result<NodeId> {
        if !self.graph.contains_node(block) {
            return Err(Error::GraphError(format!("Block {block} does not exist")));
        }
        let new_state = self.add_state(label, false);
        let outgoing: Vec<EdgeId> = self.graph.out_edges(block).collect();
        for e in outgoing {
            let (_, dst) = self.graph.edge_endpoints(e).unwrap();
            let payload = self.remove_edge(e)?;
            self.add_edge(new_state, dst, payload)?;
        }
        self.add_edge(block, new_state, edge)?;
        Ok(new_state)
    }

    /// Applies a renaming to the region's loop parameters, transitions, and
    /// states. Fails silently on non-occurrence.
    pub fn replace(&mut self, old: &str, new: &str) {
        if let RegionKind::Loop(params) = &mut self.kind {
            params.condition.replace(old, new);
            if params.loop_variable.as_deref() == Some(old) {
                params.loop_variable = Some(new.to_string());
            }
            for stmt in [&mut params.init_statement, &mut params.update_statement]
                .into_iter()
                .flatten()
            {
                let mut expr = SymbolicExpr::new(stmt.as_str());
                expr.replace(old, new);
                *stmt = expr.as_str().to_string();
            }
        }
        let edge_ids: Vec<EdgeId> = self.graph.edge_ids().collect();
        for e in edge_ids {
            if let Some(payload) = self.graph.edge_mut(e) {
                payload.replace(old, new);
            }
        }
        let block_ids: Vec<NodeId> = self.graph.node_ids().collect();
        for b in block_ids {
            if let Some(ControlBlock::State(state)) = self.graph.node_mut(b) {
                state.replace(old, new);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_block_unique_source() {
        let mut region = ControlRegion::new("r");
        let a = region.add_state("a", false);
        let b = region.add_state("b", false);
        region.add_edge(a, b, InterstateEdge::new()).unwrap();

        assert_eq!(region.start_block().unwrap(), a);
    }

    #[test]
    fn test_start_block_ambiguous_without_override() {
        let mut region = ControlRegion::new("r");
        let a = region.add_state("a", false);
        let _b = region.add_state("b", false);

        assert!(matches!(
            region.start_block(),
            Err(Error::AmbiguousStartBlock { .. })
        ));

        region.set_start_block(a).unwrap();
        assert_eq!(region.start_block().unwrap(), a);
    }

    #[test]
    fn test_start_block_cache_invalidation() {
        let mut region = ControlRegion::new("r");
        let a = region.add_state("a", false);
        let b = region.add_state("b", false);
        region.add_edge(a, b, InterstateEdge::new()).unwrap();
        assert_eq!(region.start_block().unwrap(), a);

        // A new source makes the start ambiguous again
        let c = region.add_state("c", false);
        region.add_edge(c, b, InterstateEdge::new()).unwrap();
        assert!(region.start_block().is_err());
    }

    #[test]
    fn test_set_start_block_validates() {
        let mut region = ControlRegion::new("r");
        region.add_state("a", false);
        assert!(matches!(
            region.set_start_block(NodeId::new(9)),
            Err(Error::InvalidStartBlock { .. })
        ));
    }

    #[test]
    fn test_unique_labels() {
        let mut region = ControlRegion::new("r");
        let a = region.add_state("s", false);
        let b = region.add_state("s", false);
        let c = region.add_state("s", false);

        assert_eq!(region.state(a).unwrap().label(), "s");
        assert_eq!(region.state(b).unwrap().label(), "s_0");
        assert_eq!(region.state(c).unwrap().label(), "s_1");
    }

    #[test]
    fn test_add_state_before_and_after() {
        let mut region = ControlRegion::new("r");
        let a = region.add_state("a", true);
        let b = region.add_state("b", false);
        region.add_edge(a, b, InterstateEdge::new()).unwrap();

        let mid = region
            .add_state_before(b, "mid", InterstateEdge::new().with_condition("x > 0"))
            .unwrap();

        // a -> mid -> b
        let succ_a: Vec<NodeId> = region.graph().successors(a).collect();
        assert_eq!(succ_a, vec![mid]);
        let succ_mid: Vec<NodeId> = region.graph().successors(mid).collect();
        assert_eq!(succ_mid, vec![b]);

        let tail = region
            .add_state_after(b, "tail", InterstateEdge::new())
            .unwrap();
        let succ_b: Vec<NodeId> = region.graph().successors(b).collect();
        assert_eq!(succ_b, vec![tail]);
    }

    #[test]
    fn test_remove_block_clears_override() {
        let mut region = ControlRegion::new("r");
        let a = region.add_state("a", true);
        let _b = region.add_state("b", false);
        region.remove_block(a).unwrap();

        assert!(region.start_override().is_none());
    }

    #[test]
    fn test_loop_region_params() {
        let params = LoopParams::for_loop("i", "i = 0", "i < 10", "i = i + 1");
        let region = ControlRegion::new_loop("loop", params);

        assert!(region.is_loop());
        let params = region.loop_params().unwrap();
        assert_eq!(params.loop_variable.as_deref(), Some("i"));
        assert!(!params.inverted);
    }

    #[test]
    fn test_region_replace_touches_loop_params() {
        let mut region = ControlRegion::new_loop(
            "loop",
            LoopParams::for_loop("i", "i = 0", "i < N", "i = i + 1"),
        );
        region.replace("i", "k");

        let params = region.loop_params().unwrap();
        assert_eq!(params.loop_variable.as_deref(), Some("k"));
        assert_eq!(params.condition.as_str(), "k < N");
        assert_eq!(params.init_statement.as_deref(), Some("k = 0"));
        assert_eq!(params.update_statement.as_deref(), Some("k = k + 1"));
    }
}
