//! The root flow graph: one complete IR instance.
//!
//! A [`FlowGraph`] owns everything one program (or one nested procedure)
//! consists of: the container and symbol tables, and a flat arena of
//! [`ControlRegion`]s forming the control-flow hierarchy. Regions reference
//! each other exclusively through [`RegionId`] indices, so the nesting tree
//! contains no reference cycles, parent lookup is O(1), and the arena
//! doubles as the always-consistent flat registry of all regions.
//!
//! # Structural Inlining
//!
//! [`inline_region`](FlowGraph::inline_region) and
//! [`inline_loop`](FlowGraph::inline_loop) flatten nested control flow into
//! the parent region's plain block/edge graph. Loop inlining lowers the
//! loop's init/condition/update structure into explicit `init`, `guard`,
//! `latch`, and `end` states with conditioned transitions, resolving break
//! and continue blocks to the appropriate targets.

use std::collections::{BTreeSet, HashMap};
use std::fmt::Write as _;

use indexmap::IndexMap;
use tracing::debug;

use crate::analysis::region_symbols;
use crate::control::{ControlBlock, ControlRegion, InterstateEdge, LoopParams, RegionId, RegionKind};
use crate::data::{ConstantValue, DataDescriptor, ElementType};
use crate::dataflow::DataflowState;
use crate::graph::{EdgeId, NodeId};
use crate::symbolic::Assignment;
use crate::utils::escape_dot;
use crate::{Error, Result};

/// One arena slot: a live region plus its parent link.
#[derive(Debug, Clone)]
struct RegionSlot {
    region: ControlRegion,
    parent: Option<RegionId>,
}

/// A complete IR instance: container/symbol tables plus the control-flow
/// region hierarchy.
///
/// # Examples
///
/// ```rust
/// use stategraph::control::{FlowGraph, InterstateEdge, LoopParams};
/// use stategraph::data::{DataDescriptor, ElementType};
///
/// let mut graph = FlowGraph::new("program");
/// graph.add_symbol("N", ElementType::Int32);
/// graph
///     .add_container("A", DataDescriptor::array(ElementType::Float64, &["N".into()]))
///     .unwrap();
///
/// let init = graph.add_state(FlowGraph::ROOT, "init", true).unwrap();
/// let body = graph.add_state(FlowGraph::ROOT, "body", false).unwrap();
/// graph
///     .add_edge(FlowGraph::ROOT, init, body, InterstateEdge::new())
///     .unwrap();
///
/// assert_eq!(graph.all_states().len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct FlowGraph {
    name: String,
    containers: IndexMap<String, DataDescriptor>,
    symbols: IndexMap<String, ElementType>,
    constants: IndexMap<String, ConstantValue>,
    regions: Vec<Option<RegionSlot>>,
}

impl FlowGraph {
    /// The identifier of the root region present in every graph.
    pub const ROOT: RegionId = RegionId(0);

    /// Creates a new graph with an empty root region.
    pub fn new(name: impl Into<String>) -> Self {
        let name: String = name.into();
        let root = ControlRegion::new(name.clone());
        FlowGraph {
            name,
            containers: IndexMap::new(),
            symbols: IndexMap::new(),
            constants: IndexMap::new(),
            regions: vec![Some(RegionSlot {
                region: root,
                parent: None,
            })],
        }
    }

    /// Returns the graph's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    ///////////////////////////////////////////////////////////////////
    // Container, symbol, and constant tables

    /// Registers a data container descriptor under a name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateContainer`] if the name is taken.
    pub fn add_container(
        &mut self,
        name: impl Into<String>,
        descriptor: DataDescriptor,
    ) -> Result<()> {
        let name: String = name.into();
        if self.containers.contains_key(&name) {
            return Err(Error::DuplicateContainer(name));
        }
        self.containers.insert(name, descriptor);
        Ok(())
    }

    /// Registers a transient (graph-local) container.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateContainer`] if the name is taken.
    pub fn add_transient(
        &mut self,
        name: impl Into<String>,
        descriptor: DataDescriptor,
    ) -> Result<()> {
        self.add_container(name, descriptor.transient())
    }

    /// Returns the descriptor registered under `name`.
    #[must_use]
    pub fn container(&self, name: &str) -> Option<&DataDescriptor> {
        self.containers.get(name)
    }

    /// Returns the container registry.
    #[must_use]
    pub fn containers(&self) -> &IndexMap<String, DataDescriptor> {
        &self.containers
    }

    /// Declares a typed symbol.
    pub fn add_symbol(&mut self, name: impl Into<String>, dtype: ElementType) {
        self.symbols.insert(name.into(), dtype);
    }

    /// Returns the symbol table.
    #[must_use]
    pub fn symbols(&self) -> &IndexMap<String, ElementType> {
        &self.symbols
    }

    /// Declares a compile-time constant.
    pub fn add_constant(&mut self, name: impl Into<String>, value: ConstantValue) {
        self.constants.insert(name.into(), value);
    }

    /// Returns the constant table.
    #[must_use]
    pub fn constants(&self) -> &IndexMap<String, ConstantValue> {
        &self.constants
    }

    ///////////////////////////////////////////////////////////////////
    // Region arena

    /// Returns a reference to a region, or `None` if the ID is invalid.
    #[must_use]
    pub fn region(&self, id: RegionId) -> Option<&ControlRegion> {
        self.regions
            .get(id.index())
            .and_then(Option::as_ref)
            .map(|slot| &slot.region)
    }

    /// Returns a mutable reference to a region, or `None` if the ID is
    /// invalid.
    #[must_use]
    pub fn region_mut(&mut self, id: RegionId) -> Option<&mut ControlRegion> {
        self.regions
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .map(|slot| &mut slot.region)
    }

    /// Returns the parent region of `id`, or `None` for the root.
    #[must_use]
    pub fn parent_of(&self, id: RegionId) -> Option<RegionId> {
        self.regions
            .get(id.index())
            .and_then(Option::as_ref)
            .and_then(|slot| slot.parent)
    }

    /// Returns the identifiers of all live regions, root first.
    ///
    /// The arena itself is the flat region registry: a structural change to
    /// any region is immediately visible here, with no reconciliation pass.
    #[must_use]
    pub fn region_ids(&self) -> Vec<RegionId> {
        self.regions
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|_| RegionId::new(i)))
            .collect()
    }

    /// Returns the number of live regions, including the root.
    #[must_use]
    pub fn region_count(&self) -> usize {
        self.regions.iter().flatten().count()
    }

    /// Adds a nested plain region as a block of `parent`.
    ///
    /// # Arguments
    ///
    /// * `parent` - The region to nest into
    /// * `label` - Label of the new region
    /// * `is_start` - If `true`, the new region becomes the parent's start
    ///   block
    ///
    /// # Errors
    ///
    /// Returns [`Error::GraphError`] if the parent does not exist.
    pub fn add_region(
        &mut self,
        parent: RegionId,
        label: impl Into<String>,
        is_start: bool,
    ) -> Result<RegionId> {
        self.add_region_slot(parent, ControlRegion::new(label), is_start)
    }

    /// Adds a nested loop region as a block of `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::GraphError`] if the parent does not exist.
    pub fn add_loop_region(
        &mut self,
        parent: RegionId,
        label: impl Into<String>,
        params: LoopParams,
        is_start: bool,
    ) -> Result<RegionId> {
        self.add_region_slot(parent, ControlRegion::new_loop(label, params), is_start)
    }

    fn add_region_slot(
        &mut self,
        parent: RegionId,
        region: ControlRegion,
        is_start: bool,
    ) -> Result<RegionId> {
        if self.region(parent).is_none() {
            return Err(Error::GraphError(format!("Region {parent} does not exist")));
        }
        let id = RegionId::new(self.regions.len());
        self.regions.push(Some(RegionSlot {
            region,
            parent: Some(parent),
        }));
        // Checked above
        let parent_region = self.region_mut(parent).unwrap();
        parent_region.add_block(ControlBlock::Region(id), is_start);
        Ok(id)
    }

    /// Removes a region, its block in the parent graph, and every region
    /// nested below it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::GraphError`] if the region does not exist or is the
    /// root.
    pub fn remove_region(&mut self, id: RegionId) -> Result<ControlRegion> {
        if id == Self::ROOT {
            return Err(Error::GraphError(
                "The root region cannot be removed".to_string(),
            ));
        }
        let parent = self
            .parent_of(id)
            .ok_or_else(|| Error::GraphError(format!("Region {id} does not exist")))?;

        // Detach the referencing block from the parent graph
        if let Some(parent_region) = self.region_mut(parent) {
            let block = parent_region
                .block_ids()
                .find(|b| parent_region.block(*b).and_then(ControlBlock::region_id) == Some(id));
            if let Some(block) = block {
                parent_region.remove_block(block)?;
            }
        }

        let slot = self.regions[id.index()].take().ok_or_else(|| {
            Error::GraphError(format!("Region {id} does not exist"))
        })?;

        // Tombstone everything nested below
        let nested: Vec<RegionId> = slot
            .region
            .blocks()
            .filter_map(|(_, b)| b.region_id())
            .collect();
        for n in nested {
            let _ = self.remove_region_subtree(n);
        }
        Ok(slot.region)
    }

    fn remove_region_subtree(&mut self, id: RegionId) -> Option<ControlRegion> {
        let slot = self.regions.get_mut(id.index()).and_then(Option::take)?;
        let nested: Vec<RegionId> = slot
            .region
            .blocks()
            .filter_map(|(_, b)| b.region_id())
            .collect();
        for n in nested {
            self.remove_region_subtree(n);
        }
        Some(slot.region)
    }

    ///////////////////////////////////////////////////////////////////
    // Block-level convenience passthroughs

    /// Adds a new empty state to a region.
    ///
    /// # Errors
    ///
    /// Returns [`Error::GraphError`] if the region does not exist.
    pub fn add_state(
        &mut self,
        region: RegionId,
        label: impl Into<String>,
        is_start: bool,
    ) -> Result<NodeId> {
        self.region_checked_mut(region)
            .map(|r| r.add_state(label, is_start))
    }

    /// Adds a transition between two blocks of a region.
    ///
    /// # Errors
    ///
    /// Returns [`Error::GraphError`] on unknown region or endpoints.
    pub fn add_edge(
        &mut self,
        region: RegionId,
        src: NodeId,
        dst: NodeId,
        edge: InterstateEdge,
    ) -> Result<EdgeId> {
        self.region_checked_mut(region)?.add_edge(src, dst, edge)
    }

    /// Adds a break terminator to a region.
    ///
    /// # Errors
    ///
    /// Returns [`Error::GraphError`] if the region does not exist.
    pub fn add_break(&mut self, region: RegionId, label: impl Into<String>) -> Result<NodeId> {
        self.region_checked_mut(region).map(|r| r.add_break(label))
    }

    /// Adds a continue terminator to a region.
    ///
    /// # Errors
    ///
    /// Returns [`Error::GraphError`] if the region does not exist.
    pub fn add_continue(&mut self, region: RegionId, label: impl Into<String>) -> Result<NodeId> {
        self.region_checked_mut(region).map(|r| r.add_continue(label))
    }

    /// Adds a return terminator to a region.
    ///
    /// # Errors
    ///
    /// Returns [`Error::GraphError`] if the region does not exist.
    pub fn add_return(&mut self, region: RegionId, label: impl Into<String>) -> Result<NodeId> {
        self.region_checked_mut(region).map(|r| r.add_return(label))
    }

    /// Returns a state contained in a region's block.
    #[must_use]
    pub fn state(&self, region: RegionId, block: NodeId) -> Option<&DataflowState> {
        self.region(region).and_then(|r| r.state(block))
    }

    /// Returns a state contained in a region's block, mutably.
    #[must_use]
    pub fn state_mut(&mut self, region: RegionId, block: NodeId) -> Option<&mut DataflowState> {
        self.region_mut(region).and_then(|r| r.state_mut(block))
    }

    fn region_checked_mut(&mut self, id: RegionId) -> Result<&mut ControlRegion> {
        self.region_mut(id)
            .ok_or_else(|| Error::GraphError(format!("Region {id} does not exist")))
    }

    ///////////////////////////////////////////////////////////////////
    // Traversal

    /// Returns all dataflow states of this graph, across every region.
    ///
    /// Nested graphs embedded in states are separate IR instances and are
    /// not descended into; use
    /// [`GraphView::all_nodes_recursive`](crate::dataflow::GraphView::all_nodes_recursive)
    /// for that.
    #[must_use]
    pub fn all_states(&self) -> Vec<&DataflowState> {
        let mut result = Vec::new();
        for slot in self.regions.iter().flatten() {
            for (_, block) in slot.region.blocks() {
                if let ControlBlock::State(state) = block {
                    result.push(state);
                }
            }
        }
        result
    }

    /// Returns `(region, block)` pairs of all control blocks across every
    /// region.
    #[must_use]
    pub fn all_blocks(&self) -> Vec<(RegionId, NodeId)> {
        let mut result = Vec::new();
        for (i, slot) in self.regions.iter().enumerate() {
            if let Some(slot) = slot {
                for id in slot.region.block_ids() {
                    result.push((RegionId::new(i), id));
                }
            }
        }
        result
    }

    /// Returns the transitions of every region of this graph.
    #[must_use]
    pub fn all_interstate_edges_recursive(&self) -> Vec<&InterstateEdge> {
        let mut result = Vec::new();
        for slot in self.regions.iter().flatten() {
            for (_, _, _, edge) in slot.region.edges() {
                result.push(edge);
            }
        }
        result
    }

    /// Returns the names of transient containers that are shared across
    /// control blocks: accessed in more than one state, or carrying a
    /// lifetime beyond a single invocation.
    #[must_use]
    pub fn shared_transients(&self) -> BTreeSet<String> {
        let mut seen_in: HashMap<&str, usize> = HashMap::new();
        for state in self.all_states() {
            let mut in_this_state: BTreeSet<&str> = BTreeSet::new();
            for node in state.node_ids() {
                if let Some(crate::dataflow::DataflowNode::Access(a)) = state.node(node) {
                    in_this_state.insert(a.data.as_str());
                }
            }
            for name in in_this_state {
                *seen_in.entry(name).or_insert(0) += 1;
            }
        }

        let mut result = BTreeSet::new();
        for (name, desc) in &self.containers {
            if !desc.transient {
                continue;
            }
            let shared_lifetime = matches!(
                desc.lifetime,
                crate::data::AllocationLifetime::Global | crate::data::AllocationLifetime::Persistent
            );
            if shared_lifetime || seen_in.get(name.as_str()).copied().unwrap_or(0) > 1 {
                result.insert(name.clone());
            }
        }
        result
    }

    /// Returns `true` if the given loop region contains a break block,
    /// without descending into nested loops or states.
    #[must_use]
    pub fn has_break(&self, region: RegionId) -> bool {
        self.contains_terminator(region, |b| matches!(b, ControlBlock::Break { .. }))
    }

    /// Returns `true` if the given loop region contains a continue block,
    /// without descending into nested loops or states.
    #[must_use]
    pub fn has_continue(&self, region: RegionId) -> bool {
        self.contains_terminator(region, |b| matches!(b, ControlBlock::Continue { .. }))
    }

    /// Returns `true` if the given region contains a return block, without
    /// descending into nested loops or states.
    #[must_use]
    pub fn has_return(&self, region: RegionId) -> bool {
        self.contains_terminator(region, |b| matches!(b, ControlBlock::Return { .. }))
    }

    fn contains_terminator(&self, region: RegionId, pred: impl Fn(&ControlBlock) -> bool) -> bool {
        let mut stack = vec![region];
        while let Some(id) = stack.pop() {
            let Some(r) = self.region(id) else { continue };
            for (_, block) in r.blocks() {
                if pred(block) {
                    return true;
                }
                // Nested loops capture their own terminators
                if let Some(rid) = block.region_id() {
                    if self.region(rid).is_some_and(|nested| !nested.is_loop()) {
                        stack.push(rid);
                    }
                }
            }
        }
        false
    }

    ///////////////////////////////////////////////////////////////////
    // Symbols

    /// Returns the free symbol names used by this graph.
    ///
    /// With `all_symbols == false` the result is restricted to symbols that
    /// must be materialized as explicit call arguments.
    #[must_use]
    pub fn used_symbols(&self, all_symbols: bool) -> BTreeSet<String> {
        let mut liveness = region_symbols(self, Self::ROOT, all_symbols);
        if all_symbols {
            liveness.free.extend(self.symbols.keys().cloned());
            liveness.free.retain(|s| !liveness.defined.contains(s));
        }
        liveness
            .free
            .retain(|s| !self.constants.contains_key(s));
        liveness.free
    }

    /// Returns the symbols used but not defined in this graph.
    #[must_use]
    pub fn free_symbols(&self) -> BTreeSet<String> {
        self.used_symbols(true)
    }

    /// Applies a renaming across the whole graph: container and symbol
    /// tables, loop parameters, transitions, and states. Fails silently on
    /// non-occurrence.
    pub fn replace_dict(&mut self, repl: &IndexMap<String, String>) {
        for (old, new) in repl {
            self.containers = rename_key(std::mem::take(&mut self.containers), old, new);
            self.symbols = rename_key(std::mem::take(&mut self.symbols), old, new);
            self.constants = rename_key(std::mem::take(&mut self.constants), old, new);
            for slot in self.regions.iter_mut().flatten() {
                slot.region.replace(old, new);
            }
        }
    }

    ///////////////////////////////////////////////////////////////////
    // Structural inlining

    /// Inlines a nested plain region into its parent region.
    ///
    /// The region's blocks move into the parent with uniqueness-qualified,
    /// region-prefixed labels. Incoming transitions are redirected to a new
    /// `<label>_init` state wired to the region's start block; outgoing
    /// transitions originate from a new `<label>_end` state, and every sink
    /// block of the region is connected to `end`. Return blocks become
    /// plain states when the parent is the root region and remain explicit
    /// terminators otherwise.
    ///
    /// # Returns
    ///
    /// `Ok(true)` on success, `Ok(false)` if the region is the root
    /// (nothing to inline into).
    ///
    /// # Errors
    ///
    /// Returns [`Error::GraphError`] for unknown or loop regions, and
    /// start-block errors for malformed regions.
    pub fn inline_region(&mut self, id: RegionId) -> Result<bool> {
        if id == Self::ROOT {
            return Ok(false);
        }
        let Some(region) = self.region(id) else {
            return Err(Error::GraphError(format!("Region {id} does not exist")));
        };
        if region.is_loop() {
            return Err(Error::GraphError(format!(
                "Region '{}' is a loop; use inline_loop",
                region.label()
            )));
        }
        let child_start = region.start_block()?;
        let parent_id = self.parent_of(id).ok_or_else(|| {
            consistency_error!("Non-root region {} has no parent", id)
        })?;
        let parent_node = self.block_of_region(parent_id, id)?;
        let parent_is_root = parent_id == Self::ROOT;

        // Take the child out of the arena; its id becomes a tombstone
        let mut child = self.regions[id.index()].take().unwrap().region;
        let child_label = child.label().to_string();
        debug!(region = %child_label, "inlining control-flow region");

        let child_edges: Vec<(NodeId, NodeId, InterstateEdge)> = child
            .edges()
            .map(|(_, s, d, e)| (s, d, e.clone()))
            .collect();
        let child_nodes: Vec<NodeId> = child.block_ids().collect();
        let child_out_degree: HashMap<NodeId, usize> = child_nodes
            .iter()
            .map(|n| (*n, child.graph().out_degree(*n)))
            .collect();

        let parent = self.regions[parent_id.index()].as_mut().unwrap();
        let end = parent.region.add_state(format!("{child_label}_end"), false);
        let init = parent.region.add_state(format!("{child_label}_init"), false);

        // Move the child's blocks into the parent
        let mut map: HashMap<NodeId, NodeId> = HashMap::new();
        let mut to_connect: Vec<NodeId> = Vec::new();
        let mut moved_regions: Vec<RegionId> = Vec::new();
        for n in &child_nodes {
            let block = child.remove_block(*n)?;
            let is_root_return = parent_is_root && matches!(block, ControlBlock::Return { .. });
            let new_id = match block {
                ControlBlock::Return { label } if parent_is_root => parent
                    .region
                    .add_state(format!("{child_label}_{label}"), false),
                mut moved => {
                    relabel_block(&mut moved, &child_label);
                    if let Some(rid) = moved.region_id() {
                        moved_regions.push(rid);
                    }
                    parent.region.add_block(moved, false)
                }
            };
            map.insert(*n, new_id);
            if !is_root_return && child_out_degree[n] == 0 {
                to_connect.push(new_id);
            }
        }

        // Re-add the child's transitions between the moved blocks
        for (src, dst, edge) in child_edges {
            parent.region.add_edge(map[&src], map[&dst], edge)?;
        }

        // Redirect transitions that entered or left the region block
        let incoming: Vec<(NodeId, InterstateEdge)> = parent
            .region
            .in_edges(parent_node)
            .collect::<Vec<_>>()
            .into_iter()
            .map(|e| {
                let (src, _) = parent.region.graph().edge_endpoints(e).unwrap();
                (src, parent.region.edge(e).unwrap().clone())
            })
            .collect();
        let outgoing: Vec<(NodeId, InterstateEdge)> = parent
            .region
            .out_edges(parent_node)
            .collect::<Vec<_>>()
            .into_iter()
            .map(|e| {
                let (_, dst) = parent.region.graph().edge_endpoints(e).unwrap();
                (dst, parent.region.edge(e).unwrap().clone())
            })
            .collect();
        for (src, edge) in incoming {
            parent.region.add_edge(src, init, edge)?;
        }
        for (dst, edge) in outgoing {
            parent.region.add_edge(end, dst, edge)?;
        }
        parent.region.add_edge(init, map[&child_start], InterstateEdge::new())?;
        for sink in to_connect {
            parent.region.add_edge(sink, end, InterstateEdge::new())?;
        }

        // Remove the region block; incident edges were already replaced
        parent.region.remove_block(parent_node)?;

        // Regions moved up one level get the parent as their new owner
        for rid in moved_regions {
            if let Some(slot) = self.regions.get_mut(rid.index()).and_then(Option::as_mut) {
                slot.parent = Some(parent_id);
            }
        }
        Ok(true)
    }

    /// Inlines a loop region into its parent region, lowering its
    /// init/condition/update structure to explicit states and conditioned
    /// transitions.
    ///
    /// The lowering creates `<label>_init`, `<label>_guard`, `<label>_end`,
    /// and `<label>_latch` states. The init transition carries the init
    /// statement's assignments and targets the guard (or the body's start
    /// block for inverted loops); the latch transition back to the guard
    /// carries the update assignments; the guard branches to the body under
    /// the loop condition and to `end` under its negation. Break blocks
    /// resolve to `end`, continue blocks to `latch`, sinks to `latch`, and
    /// return blocks become plain states when the parent is the root.
    /// Nested non-loop regions are recursively inlined first so these
    /// targets resolve correctly.
    ///
    /// # Returns
    ///
    /// `Ok(true)` on success, `Ok(false)` if the init or update statements
    /// contain anything other than simple assignments (structural
    /// precondition; the caller may probe freely).
    ///
    /// # Errors
    ///
    /// Returns [`Error::GraphError`] for unknown or non-loop regions, and
    /// start-block errors for malformed regions.
    pub fn inline_loop(&mut self, id: RegionId) -> Result<bool> {
        let Some(region) = self.region(id) else {
            return Err(Error::GraphError(format!("Region {id} does not exist")));
        };
        let Some(params) = region.loop_params().cloned() else {
            return Err(Error::GraphError(format!(
                "Region '{}' is not a loop; use inline_region",
                region.label()
            )));
        };
        let Some(parent_id) = self.parent_of(id) else {
            return Ok(false);
        };

        // Structural precondition: init/update must be simple assignments
        let init_assignments = match &params.init_statement {
            Some(stmt) => match Assignment::parse_all(stmt) {
                Some(assignments) => assignments,
                None => return Ok(false),
            },
            None => Vec::new(),
        };
        let update_assignments = match &params.update_statement {
            Some(stmt) => match Assignment::parse_all(stmt) {
                Some(assignments) => assignments,
                None => return Ok(false),
            },
            None => Vec::new(),
        };

        // Resolve break/continue/return targets by flattening nested
        // non-loop regions first
        self.inline_nested_sequences(id)?;

        let child_start = self.region(id).unwrap().start_block()?;
        let parent_node = self.block_of_region(parent_id, id)?;
        let parent_is_root = parent_id == Self::ROOT;

        let mut child = self.regions[id.index()].take().unwrap().region;
        let child_label = child.label().to_string();
        debug!(region = %child_label, "inlining loop region");

        let child_edges: Vec<(NodeId, NodeId, InterstateEdge)> = child
            .edges()
            .map(|(_, s, d, e)| (s, d, e.clone()))
            .collect();
        let child_nodes: Vec<NodeId> = child.block_ids().collect();
        let child_out_degree: HashMap<NodeId, usize> = child_nodes
            .iter()
            .map(|n| (*n, child.graph().out_degree(*n)))
            .collect();

        let parent = self.regions[parent_id.index()].as_mut().unwrap();
        let init = parent.region.add_state(format!("{child_label}_init"), false);
        let guard = parent.region.add_state(format!("{child_label}_guard"), false);
        let end = parent.region.add_state(format!("{child_label}_end"), false);
        let latch = parent.region.add_state(format!("{child_label}_latch"), false);

        // Move the loop's blocks, resolving terminators
        let mut map: HashMap<NodeId, NodeId> = HashMap::new();
        let mut connect_to_latch: Vec<NodeId> = Vec::new();
        let mut connect_to_end: Vec<NodeId> = Vec::new();
        let mut moved_regions: Vec<RegionId> = Vec::new();
        for n in &child_nodes {
            let block = child.remove_block(*n)?;
            match block {
                ControlBlock::Break { label } => {
                    let s = parent
                        .region
                        .add_state(format!("{child_label}_{label}"), false);
                    connect_to_end.push(s);
                    map.insert(*n, s);
                }
                ControlBlock::Continue { label } => {
                    let s = parent
                        .region
                        .add_state(format!("{child_label}_{label}"), false);
                    connect_to_latch.push(s);
                    map.insert(*n, s);
                }
                ControlBlock::Return { label } if parent_is_root => {
                    let s = parent
                        .region
                        .add_state(format!("{child_label}_{label}"), false);
                    map.insert(*n, s);
                }
                mut moved => {
                    relabel_block(&mut moved, &child_label);
                    if let Some(rid) = moved.region_id() {
                        moved_regions.push(rid);
                    }
                    let new_id = parent.region.add_block(moved, false);
                    if child_out_degree[n] == 0 {
                        connect_to_latch.push(new_id);
                    }
                    map.insert(*n, new_id);
                }
            }
        }

        // Re-add the loop's internal transitions
        for (src, dst, edge) in child_edges {
            parent.region.add_edge(map[&src], map[&dst], edge)?;
        }

        // Redirect transitions that entered or left the loop block
        let incoming: Vec<(NodeId, InterstateEdge)> = parent
            .region
            .in_edges(parent_node)
            .collect::<Vec<_>>()
            .into_iter()
            .map(|e| {
                let (src, _) = parent.region.graph().edge_endpoints(e).unwrap();
                (src, parent.region.edge(e).unwrap().clone())
            })
            .collect();
        let outgoing: Vec<(NodeId, InterstateEdge)> = parent
            .region
            .out_edges(parent_node)
            .collect::<Vec<_>>()
            .into_iter()
            .map(|e| {
                let (_, dst) = parent.region.graph().edge_endpoints(e).unwrap();
                (dst, parent.region.edge(e).unwrap().clone())
            })
            .collect();
        for (src, edge) in incoming {
            parent.region.add_edge(src, init, edge)?;
        }
        for (dst, edge) in outgoing {
            parent.region.add_edge(end, dst, edge)?;
        }

        // init: run the loop initialization once
        let mut init_edge = InterstateEdge::new();
        for assignment in init_assignments {
            init_edge = init_edge.with_assignment(assignment.target, assignment.value);
        }
        if params.inverted {
            // Condition is checked after the first iteration
            parent.region.add_edge(init, map[&child_start], init_edge)?;
        } else {
            parent.region.add_edge(init, guard, init_edge)?;
        }

        // latch: run the update, then re-check the condition
        let mut update_edge = InterstateEdge::new();
        for assignment in update_assignments {
            update_edge = update_edge.with_assignment(assignment.target, assignment.value);
        }
        parent.region.add_edge(latch, guard, update_edge)?;

        // guard: enter the body while the condition holds, exit otherwise
        parent.region.add_edge(
            guard,
            map[&child_start],
            InterstateEdge::new().with_condition(params.condition.clone()),
        )?;
        parent.region.add_edge(
            guard,
            end,
            InterstateEdge::new().with_condition(params.condition.negated()),
        )?;

        // Completed iterations and continues go through the latch; breaks
        // leave the loop
        for s in connect_to_latch {
            parent.region.add_edge(s, latch, InterstateEdge::new())?;
        }
        for s in connect_to_end {
            parent.region.add_edge(s, end, InterstateEdge::new())?;
        }

        parent.region.remove_block(parent_node)?;

        for rid in moved_regions {
            if let Some(slot) = self.regions.get_mut(rid.index()).and_then(Option::as_mut) {
                slot.parent = Some(parent_id);
            }
        }
        Ok(true)
    }

    /// Recursively inlines every nested non-loop region of `region`.
    fn inline_nested_sequences(&mut self, region: RegionId) -> Result<()> {
        loop {
            let next = {
                let Some(r) = self.region(region) else { break };
                r.blocks()
                    .filter_map(|(_, b)| b.region_id())
                    .find(|rid| self.region(*rid).is_some_and(|nested| !nested.is_loop()))
            };
            match next {
                Some(rid) => {
                    self.inline_nested_sequences(rid)?;
                    self.inline_region(rid)?;
                }
                None => break,
            }
        }
        Ok(())
    }

    /// Locates the block of `parent` that references region `id`.
    fn block_of_region(&self, parent: RegionId, id: RegionId) -> Result<NodeId> {
        let parent_region = self
            .region(parent)
            .ok_or_else(|| Error::GraphError(format!("Region {parent} does not exist")))?;
        parent_region
            .block_ids()
            .find(|b| parent_region.block(*b).and_then(ControlBlock::region_id) == Some(id))
            .ok_or_else(|| consistency_error!("Region {} not referenced by its parent graph", id))
    }

    ///////////////////////////////////////////////////////////////////
    // Rendering

    /// Generates a DOT format representation of the control-flow
    /// hierarchy, one cluster per region.
    #[must_use]
    pub fn to_dot(&self) -> String {
        let mut dot = String::new();
        dot.push_str("digraph flowgraph {\n");
        let _ = writeln!(dot, "    label=\"{}\";", escape_dot(&self.name));
        dot.push_str("    compound=true;\n");
        dot.push_str("    node [shape=box, fontname=\"Courier\", fontsize=10];\n\n");

        for (i, slot) in self.regions.iter().enumerate() {
            let Some(slot) = slot else { continue };
            let _ = writeln!(dot, "    subgraph cluster_{i} {{");
            let _ = writeln!(dot, "        label=\"{}\";", escape_dot(slot.region.label()));
            for (id, block) in slot.region.blocks() {
                let _ = writeln!(
                    dot,
                    "        r{i}_{id} [label=\"{}\"];",
                    escape_dot(&block.label())
                );
            }
            for (_, src, dst, edge) in slot.region.edges() {
                let _ = writeln!(
                    dot,
                    "        r{i}_{src} -> r{i}_{dst} [label=\"{}\"];",
                    escape_dot(&edge.to_string())
                );
            }
            dot.push_str("    }\n");
        }
        dot.push_str("}\n");
        dot
    }
}

/// Prefixes a moved block's label with its former region's label.
fn relabel_block(block: &mut ControlBlock, prefix: &str) {
    match block {
        ControlBlock::State(state) => {
            let label = format!("{prefix}_{}", state.label());
            state.set_label(label);
        }
        ControlBlock::Break { label }
        | ControlBlock::Continue { label }
        | ControlBlock::Return { label } => {
            *label = format!("{prefix}_{label}");
        }
        ControlBlock::Region(_) => {}
    }
}

/// Renames one key of an insertion-ordered map, preserving entry order.
fn rename_key<V>(map: IndexMap<String, V>, old: &str, new: &str) -> IndexMap<String, V> {
    if !map.contains_key(old) {
        return map;
    }
    map.into_iter()
        .map(|(k, v)| if k == old { (new.to_string(), v) } else { (k, v) })
        .collect()
}
