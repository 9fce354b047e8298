//! Read-only graph views and call-signature inference.
//!
//! The [`GraphView`] trait is the shared query surface of a full
//! [`DataflowState`] and of an arbitrary node-induced [`SubgraphView`]:
//! element enumeration (optionally recursing into nested graphs), symbol
//! usage, read/write sets, and call-argument inference. The transformation
//! engine matches patterns against this interface, and the code generator
//! obtains stable call signatures from it.

use std::collections::{BTreeSet, HashMap, HashSet};

use indexmap::IndexMap;

use crate::control::FlowGraph;
use crate::data::{can_allocate, AllocationLifetime, DataDescriptor, ElementType};
use crate::dataflow::{DataflowNode, DataflowState};
use crate::graph::{EdgeId, NodeId};
use crate::{Error, Result};

/// Read-only query interface over a dataflow graph or a subgraph view.
///
/// Provided methods implement all shared algorithms in terms of the few
/// required accessors, so a view only decides *membership*; the state
/// supplies the structure.
pub trait GraphView {
    /// Returns the underlying full state.
    fn state(&self) -> &DataflowState;

    /// Returns `true` if the node belongs to this view.
    fn contains_node(&self, node: NodeId) -> bool;

    /// Returns the nodes of this view, in insertion order.
    fn view_nodes(&self) -> Vec<NodeId>;

    /// Returns `true` for proper subgraph views, `false` for full states.
    ///
    /// Argument inference treats subgraph views differently: containers
    /// referenced outside the view and allocation-lifetime escapes make
    /// additional containers external.
    fn is_subgraph_view(&self) -> bool;

    /// Returns the edges with both endpoints inside this view, in insertion
    /// order.
    fn view_edges(&self) -> Vec<EdgeId> {
        let state = self.state();
        state
            .edge_ids()
            .filter(|e| {
                state
                    .edge_endpoints(*e)
                    .is_some_and(|(s, d)| self.contains_node(s) && self.contains_node(d))
            })
            .collect()
    }

    /// Returns all access nodes of this view, without recursing into nested
    /// graphs.
    fn data_nodes(&self) -> Vec<NodeId> {
        let state = self.state();
        self.view_nodes()
            .into_iter()
            .filter(|n| state.node(*n).is_some_and(DataflowNode::is_access))
            .collect()
    }

    /// Returns a lazy iterator over all `(state, node)` pairs of this view,
    /// descending into nested graphs where `predicate` allows.
    ///
    /// The predicate is consulted on each nested-graph node; pass
    /// `|_, _| true` to always descend. The sequence is finite and
    /// non-restartable.
    fn all_nodes_recursive<P>(&self, predicate: P) -> RecursiveNodeIter<'_, P>
    where
        P: FnMut(&DataflowState, NodeId) -> bool,
        Self: Sized,
    {
        RecursiveNodeIter {
            predicate,
            stack: vec![(self.state(), self.view_nodes().into_iter())],
        }
    }

    /// Returns a lazy iterator over all `(state, edge)` pairs of this view,
    /// descending into every nested graph.
    fn all_edges_recursive(&self) -> RecursiveEdgeIter<'_>
    where
        Self: Sized,
    {
        let state = self.state();
        let mut pending = Vec::new();
        for node in self.view_nodes() {
            if let Some(DataflowNode::Nested(nested)) = state.node(node) {
                pending.extend(nested.graph.all_states());
            }
        }
        RecursiveEdgeIter {
            pending,
            edges: self.view_edges().into_iter(),
            current_state: state,
        }
    }

    /// Returns the free symbol names used by this view.
    ///
    /// With `all_symbols == true`, every referenced symbol is reported. With
    /// `all_symbols == false`, the result is restricted to symbols that must
    /// be materialized as explicit call arguments: symbols exercised by
    /// native (non-declarative) code nodes, leaf memlets, scope ranges, and
    /// container shapes.
    ///
    /// Symbols newly defined inside the view (scope parameters) and graph
    /// constants are excluded. With `keep_defined_in_mapping`, symbols bound
    /// by nested-graph symbol mappings are reported as free nonetheless.
    fn used_symbols(
        &self,
        sdfg: &FlowGraph,
        all_symbols: bool,
        keep_defined_in_mapping: bool,
    ) -> BTreeSet<String> {
        let state = self.state();
        let mut new_symbols: BTreeSet<String> = BTreeSet::new();
        let mut freesyms: BTreeSet<String> = BTreeSet::new();

        for node_id in self.view_nodes() {
            let Some(node) = state.node(node_id) else {
                continue;
            };
            match node {
                DataflowNode::ScopeEntry(n) => {
                    new_symbols.extend(n.new_symbols());
                    freesyms.extend(n.free_symbols());
                }
                DataflowNode::Access(n) => {
                    if let Some(desc) = sdfg.container(&n.data) {
                        freesyms.extend(desc.used_symbols(all_symbols));
                    }
                }
                DataflowNode::Code(n) => {
                    if all_symbols {
                        freesyms.extend(n.free_symbols());
                    } else if matches!(n.code.language, crate::dataflow::CodeLanguage::Native) {
                        // Native code references symbols by name at runtime;
                        // restrict to declared graph symbols
                        freesyms.extend(
                            n.free_symbols()
                                .into_iter()
                                .filter(|s| sdfg.symbols().contains_key(s)),
                        );
                    }
                }
                DataflowNode::ScopeExit(_) => {}
                DataflowNode::Nested(n) => {
                    freesyms.extend(n.used_symbols(all_symbols, keep_defined_in_mapping));
                }
            }
        }

        for edge_id in self.view_edges() {
            // For argument materialization only memlet-tree leaves matter
            if !all_symbols && !state.is_leaf_memlet(edge_id) {
                continue;
            }
            if let Some(payload) = state.edge(edge_id) {
                freesyms.extend(payload.memlet.used_symbols());
            }
        }

        // Constants are never free
        new_symbols.extend(sdfg.constants().keys().cloned());
        freesyms.retain(|s| !new_symbols.contains(s));
        freesyms
    }

    /// Returns the symbols used but not defined in this view.
    fn free_symbols(&self, sdfg: &FlowGraph) -> BTreeSet<String> {
        self.used_symbols(sdfg, true, false)
    }

    /// Returns the symbols defined when this view executes, with their
    /// types: graph symbols, container-shape symbols, inter-state
    /// assignment targets, and enclosing scope parameters.
    fn defined_symbols(&self, sdfg: &FlowGraph) -> IndexMap<String, ElementType> {
        let mut defined: IndexMap<String, ElementType> = sdfg.symbols().clone();

        for desc in sdfg.containers().values() {
            for sym in desc.used_symbols(true) {
                defined.entry(sym).or_insert(ElementType::Int32);
            }
        }
        for edge in sdfg.all_interstate_edges_recursive() {
            for target in edge.assignments.keys() {
                defined.entry(target.clone()).or_insert(ElementType::Int32);
            }
        }

        // Scope parameters visible to this view
        let state = self.state();
        if let Ok(sdict) = state.scope_dict() {
            for node in self.view_nodes() {
                let mut cur = sdict.get(&node).copied().flatten();
                while let Some(entry) = cur {
                    if let Some(DataflowNode::ScopeEntry(e)) = state.node(entry) {
                        for param in &e.params {
                            defined.entry(param.clone()).or_insert(ElementType::Int32);
                        }
                    }
                    cur = sdict.get(&entry).copied().flatten();
                }
            }
        }
        defined
    }

    /// Determines which data containers this view reads and writes.
    ///
    /// Within each maximal concurrently-executable subgraph of the view, a
    /// read fully covered by a prior write of the same container is
    /// excluded; results of independent subgraphs are unioned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CyclicGraph`] if a subgraph cannot be ordered.
    fn read_and_write_sets(&self) -> Result<(BTreeSet<String>, BTreeSet<String>)> {
        let (reads, writes) = self.state().rw_subsets_for(&self.view_nodes())?;
        Ok((reads.into_keys().collect(), writes.into_keys().collect()))
    }

    /// Computes the unordered call arguments of this view.
    ///
    /// A container is a required data argument iff it is referenced outside
    /// the view while defined inside it, is non-transient, is a transient
    /// shared across control blocks, or has an allocation lifetime exceeding
    /// this view with no enclosing scope supporting its storage class.
    /// Scalar containers without access nodes and every free symbol of the
    /// view become scalar arguments; symbols with no known definition are
    /// treated as externally supplied 32-bit integer scalars.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownContainer`] for unregistered container
    /// references, and scope-computation errors for malformed states.
    fn unordered_arg_list(
        &self,
        sdfg: &FlowGraph,
    ) -> Result<(
        IndexMap<String, DataDescriptor>,
        IndexMap<String, DataDescriptor>,
    )> {
        let state = self.state();
        let shared = sdfg.shared_transients();
        let sdict = state.scope_dict()?;

        let mut data_args: IndexMap<String, DataDescriptor> = IndexMap::new();
        let mut scalar_args: IndexMap<String, DataDescriptor> = IndexMap::new();

        // Gather data descriptors from access nodes in the view
        let mut descs: IndexMap<String, DataDescriptor> = IndexMap::new();
        let mut descs_with_nodes: HashMap<String, NodeId> = HashMap::new();
        let mut scalars_with_nodes: HashSet<String> = HashSet::new();
        for node_id in self.view_nodes() {
            if let Some(DataflowNode::Access(a)) = state.node(node_id) {
                let desc = sdfg
                    .container(&a.data)
                    .ok_or_else(|| Error::UnknownContainer(a.data.clone()))?;
                descs.insert(a.data.clone(), desc.clone());
                descs_with_nodes.entry(a.data.clone()).or_insert(node_id);
                if desc.is_scalar() {
                    scalars_with_nodes.insert(a.data.clone());
                }
            }
        }

        // A container also referenced outside the view is externally
        // allocated
        if self.is_subgraph_view() {
            for node_id in state.node_ids() {
                if self.contains_node(node_id) {
                    continue;
                }
                if let Some(DataflowNode::Access(a)) = state.node(node_id) {
                    if let Some(desc) = descs.get(&a.data) {
                        if desc.is_scalar() {
                            scalar_args.insert(a.data.clone(), desc.clone());
                        } else {
                            data_args.insert(a.data.clone(), desc.clone());
                        }
                    }
                }
            }
        }

        // Containers referenced only through memlets originate externally
        for edge_id in self.view_edges() {
            let Some(payload) = state.edge(edge_id) else {
                continue;
            };
            let Some(data) = &payload.memlet.data else {
                continue;
            };
            if descs.contains_key(data) {
                continue;
            }
            let desc = sdfg
                .container(data)
                .ok_or_else(|| Error::UnknownContainer(data.clone()))?;
            if desc.is_scalar() {
                // Ignore code-to-code scalar movement
                let code_to_code = state.edge_endpoints(edge_id).is_some_and(|(s, d)| {
                    state.node(s).is_some_and(|n| n.is_code() || n.is_nested())
                        && state.node(d).is_some_and(|n| n.is_code() || n.is_nested())
                });
                if code_to_code {
                    continue;
                }
                scalar_args.insert(data.clone(), desc.clone());
            } else {
                data_args.insert(data.clone(), desc.clone());
            }
        }

        // Classify locally-accessed containers
        for (name, desc) in &descs {
            if data_args.contains_key(name) || scalar_args.contains_key(name) {
                continue;
            }
            if desc.is_scalar() && !scalars_with_nodes.contains(name) {
                scalar_args.insert(name.clone(), desc.clone());
            } else if !desc.transient || shared.contains(name) {
                data_args.insert(name.clone(), desc.clone());
            } else if !self.is_subgraph_view() {
                // Full state: lifetimes beyond the state make the transient
                // external
                if !matches!(
                    desc.lifetime,
                    AllocationLifetime::Scope | AllocationLifetime::State
                ) {
                    data_args.insert(name.clone(), desc.clone());
                }
            } else if desc.lifetime != AllocationLifetime::Scope {
                data_args.insert(name.clone(), desc.clone());
            } else {
                // Scope lifetime inside a subgraph view: external unless an
                // enclosing scope supports the storage class
                let mut cur = sdict.get(&descs_with_nodes[name]).copied().flatten();
                let mut allocatable = false;
                while let Some(entry) = cur {
                    if let Some(DataflowNode::ScopeEntry(e)) = state.node(entry) {
                        if can_allocate(desc.storage, e.schedule) {
                            allocatable = true;
                            break;
                        }
                    }
                    cur = sdict.get(&entry).copied().flatten();
                }
                if !allocatable {
                    data_args.insert(name.clone(), desc.clone());
                }
            }
        }

        // Scalar arguments from free symbols; unknown definitions default
        // to externally supplied 32-bit integers
        let defined = self.defined_symbols(sdfg);
        for sym in self.used_symbols(sdfg, false, false) {
            if sym.starts_with("__") || sdfg.constants().contains_key(&sym) {
                continue;
            }
            if data_args.contains_key(&sym) || scalar_args.contains_key(&sym) {
                continue;
            }
            let desc = match defined.get(&sym) {
                Some(ty) => DataDescriptor::scalar(*ty),
                None => sdfg
                    .container(&sym)
                    .cloned()
                    .unwrap_or_else(|| DataDescriptor::scalar(ElementType::Int32)),
            };
            scalar_args.insert(sym, desc);
        }

        // Free symbols of data-argument shapes are arguments as well
        let mut shape_syms: Vec<String> = Vec::new();
        for desc in data_args.values() {
            for sym in desc.used_symbols(false) {
                if !sym.starts_with("__") && !sdfg.constants().contains_key(&sym) {
                    shape_syms.push(sym);
                }
            }
        }
        for sym in shape_syms {
            if !scalar_args.contains_key(&sym) && !data_args.contains_key(&sym) {
                let ty = defined.get(&sym).copied().unwrap_or(ElementType::Int32);
                scalar_args.insert(sym, DataDescriptor::scalar(ty));
            }
        }

        Ok((data_args, scalar_args))
    }

    /// Computes the ordered call signature of this view.
    ///
    /// Data arguments come first, sorted lexicographically, followed by
    /// scalar arguments, sorted lexicographically — a stable contract the
    /// code generator relies on.
    ///
    /// # Errors
    ///
    /// See [`unordered_arg_list`](Self::unordered_arg_list).
    fn arg_list(&self, sdfg: &FlowGraph) -> Result<Vec<(String, DataDescriptor)>> {
        let (data_args, scalar_args) = self.unordered_arg_list(sdfg)?;

        let mut data: Vec<(String, DataDescriptor)> = data_args.into_iter().collect();
        data.sort_by(|a, b| a.0.cmp(&b.0));
        let mut scalars: Vec<(String, DataDescriptor)> = scalar_args.into_iter().collect();
        scalars.sort_by(|a, b| a.0.cmp(&b.0));

        data.extend(scalars);
        Ok(data)
    }

    /// Returns the C-like parameter strings of the call signature, e.g.
    /// `["double *A", "int32_t N"]`.
    ///
    /// # Errors
    ///
    /// See [`unordered_arg_list`](Self::unordered_arg_list).
    fn signature(&self, sdfg: &FlowGraph) -> Result<Vec<String>> {
        Ok(self
            .arg_list(sdfg)?
            .into_iter()
            .map(|(name, desc)| {
                if desc.is_scalar() {
                    format!("{} {name}", desc.dtype.c_name())
                } else {
                    format!("{} *{name}", desc.dtype.c_name())
                }
            })
            .collect())
    }
}

impl GraphView for DataflowState {
    fn state(&self) -> &DataflowState {
        self
    }

    fn contains_node(&self, node: NodeId) -> bool {
        self.graph().contains_node(node)
    }

    fn view_nodes(&self) -> Vec<NodeId> {
        self.node_ids().collect()
    }

    fn is_subgraph_view(&self) -> bool {
        false
    }
}

/// A node-induced read-only view over part of a dataflow state.
///
/// # Examples
///
/// ```rust,ignore
/// use stategraph::dataflow::{GraphView, SubgraphView};
///
/// let scope_nodes = state.scope_subgraph(entry, true)?;
/// let view = SubgraphView::new(&state, scope_nodes);
/// let (data_args, scalar_args) = view.unordered_arg_list(&graph)?;
/// ```
#[derive(Debug, Clone)]
pub struct SubgraphView<'a> {
    state: &'a DataflowState,
    nodes: BTreeSet<NodeId>,
}

impl<'a> SubgraphView<'a> {
    /// Creates a view over the given nodes of a state.
    ///
    /// Unknown node identifiers are silently dropped from the view.
    pub fn new(state: &'a DataflowState, nodes: impl IntoIterator<Item = NodeId>) -> Self {
        let nodes = nodes
            .into_iter()
            .filter(|n| state.graph().contains_node(*n))
            .collect();
        SubgraphView { state, nodes }
    }

    /// Returns the number of nodes in the view.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the view contains no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl GraphView for SubgraphView<'_> {
    fn state(&self) -> &DataflowState {
        self.state
    }

    fn contains_node(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    fn view_nodes(&self) -> Vec<NodeId> {
        self.nodes.iter().copied().collect()
    }

    fn is_subgraph_view(&self) -> bool {
        true
    }
}

/// Work-stack iterator over `(state, node)` pairs, descending into nested
/// graphs where the predicate allows.
pub struct RecursiveNodeIter<'a, P> {
    predicate: P,
    stack: Vec<(&'a DataflowState, std::vec::IntoIter<NodeId>)>,
}

impl<'a, P> Iterator for RecursiveNodeIter<'a, P>
where
    P: FnMut(&DataflowState, NodeId) -> bool,
{
    type Item = (&'a DataflowState, NodeId);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let top = self.stack.last_mut()?;
            let state: &'a DataflowState = top.0;
            match top.1.next() {
                Some(node) => {
                    if let Some(DataflowNode::Nested(nested)) = state.node(node) {
                        if (self.predicate)(state, node) {
                            for inner in nested.graph.all_states() {
                                let ids: Vec<NodeId> = inner.node_ids().collect();
                                self.stack.push((inner, ids.into_iter()));
                            }
                        }
                    }
                    return Some((state, node));
                }
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

/// Work-stack iterator over `(state, edge)` pairs, descending into every
/// nested graph.
pub struct RecursiveEdgeIter<'a> {
    pending: Vec<&'a DataflowState>,
    edges: std::vec::IntoIter<EdgeId>,
    current_state: &'a DataflowState,
}

impl<'a> Iterator for RecursiveEdgeIter<'a> {
    type Item = (&'a DataflowState, EdgeId);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(edge) = self.edges.next() {
                return Some((self.current_state, edge));
            }
            // Advance to the next pending state, queueing its own nested
            // graphs for later
            let state = self.pending.pop()?;
            for node in state.node_ids() {
                if let Some(DataflowNode::Nested(nested)) = state.node(node) {
                    self.pending.extend(nested.graph.all_states());
                }
            }
            self.edges = state.edge_ids().collect::<Vec<_>>().into_iter();
            self.current_state = state;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ElementType, ScheduleKind};
    use crate::dataflow::{CodeBlock, Memlet};
    use crate::symbolic::Subset;

    /// A graph with containers A (N-array, input), B (N-array, output),
    /// tmp (transient), and a state computing B from A through a map scope.
    fn example_graph() -> (FlowGraph, crate::control::RegionId, NodeId) {
        let mut fg = FlowGraph::new("program");
        fg.add_symbol("N", ElementType::Int32);
        fg.add_container("A", DataDescriptor::array(ElementType::Float64, &["N".into()]))
            .unwrap();
        fg.add_container("B", DataDescriptor::array(ElementType::Float64, &["N".into()]))
            .unwrap();

        let state_id = fg.add_state(FlowGraph::ROOT, "compute", true).unwrap();
        let state = fg.state_mut(FlowGraph::ROOT, state_id).unwrap();

        let a = state.add_access("A");
        let b = state.add_access("B");
        let (entry, exit) = state.add_scope(
            "map",
            &["i"],
            Subset::parse("0:N - 1").unwrap(),
            ScheduleKind::Parallel,
        );
        let code = state.add_code(
            "double",
            CodeBlock::expression("out = x * 2"),
            vec!["x".to_string()],
            vec!["out".to_string()],
        );
        state
            .add_memlet_path(
                &[a, entry, code],
                Memlet::new("A", Subset::parse("i").unwrap()),
                None,
                Some("x"),
            )
            .unwrap();
        state
            .add_memlet_path(
                &[code, exit, b],
                Memlet::new("B", Subset::parse("i").unwrap()),
                Some("out"),
                None,
            )
            .unwrap();

        (fg, FlowGraph::ROOT, state_id)
    }

    #[test]
    fn test_data_nodes() {
        let (fg, region, state_id) = example_graph();
        let state = fg.state(region, state_id).unwrap();
        assert_eq!(state.data_nodes().len(), 2);
    }

    #[test]
    fn test_used_symbols_full_state() {
        let (fg, region, state_id) = example_graph();
        let state = fg.state(region, state_id).unwrap();

        let syms = state.used_symbols(&fg, true, false);
        // N from the map range and container shapes; i is defined by the scope
        assert!(syms.contains("N"));
        assert!(!syms.contains("i"));
    }

    #[test]
    fn test_arg_list_order_and_content() {
        let (fg, region, state_id) = example_graph();
        let state = fg.state(region, state_id).unwrap();

        let args = state.arg_list(&fg).unwrap();
        let names: Vec<&str> = args.iter().map(|(n, _)| n.as_str()).collect();
        // Data args sorted first, then scalar args
        assert_eq!(names, vec!["A", "B", "N"]);
        assert!(args[2].1.is_scalar());
    }

    #[test]
    fn test_signature_strings() {
        let (fg, region, state_id) = example_graph();
        let state = fg.state(region, state_id).unwrap();

        let sig = state.signature(&fg).unwrap();
        assert_eq!(sig, vec!["double *A", "double *B", "int32_t N"]);
    }

    #[test]
    fn test_unknown_symbol_defaults_to_external_scalar() {
        let mut fg = FlowGraph::new("program");
        fg.add_container("A", DataDescriptor::array(ElementType::Float64, &["M".into()]))
            .unwrap();
        let state_id = fg.add_state(FlowGraph::ROOT, "s", true).unwrap();
        let state = fg.state_mut(FlowGraph::ROOT, state_id).unwrap();
        let a = state.add_access("A");
        let b = state.add_code(
            "consume",
            CodeBlock::expression("o = x"),
            vec!["x".to_string()],
            vec!["o".to_string()],
        );
        state
            .add_edge(a, None, b, Some("x"), Memlet::new("A", Subset::parse("0:M - 1").unwrap()))
            .unwrap();

        // M is never declared as a symbol: silently treated as an external
        // 32-bit scalar argument
        let state = fg.state(FlowGraph::ROOT, state_id).unwrap();
        let args = state.arg_list(&fg).unwrap();
        let m = args.iter().find(|(n, _)| n == "M").unwrap();
        assert_eq!(m.1.dtype, ElementType::Int32);
        assert!(m.1.is_scalar());
    }

    #[test]
    fn test_subgraph_view_membership() {
        let (fg, region, state_id) = example_graph();
        let state = fg.state(region, state_id).unwrap();

        let data = state.data_nodes();
        let view = SubgraphView::new(state, data.iter().copied());
        assert_eq!(view.len(), 2);
        assert!(view.is_subgraph_view());
        // No edges connect two access nodes directly
        assert!(view.view_edges().is_empty());
    }

    #[test]
    fn test_subgraph_view_externally_referenced_container() {
        let (fg, region, state_id) = example_graph();
        let state = fg.state(region, state_id).unwrap();

        // View containing only the A access node; A is an external input,
        // so it must surface as a data argument
        let a = state.data_nodes()[0];
        let view = SubgraphView::new(state, [a]);
        let (data_args, _) = view.unordered_arg_list(&fg).unwrap();
        assert!(data_args.contains_key("A"));
    }

    #[test]
    fn test_all_nodes_recursive_flat_graph() {
        let (fg, region, state_id) = example_graph();
        let state = fg.state(region, state_id).unwrap();

        let all: Vec<_> = state.all_nodes_recursive(|_, _| true).collect();
        assert_eq!(all.len(), state.node_count());
        assert!(all.iter().all(|(s, _)| std::ptr::eq(*s, state)));
    }

    #[test]
    fn test_all_nodes_recursive_descends_into_nested() {
        let (inner_fg, ..) = example_graph();
        let inner_nodes: usize = inner_fg.all_states().iter().map(|s| s.node_count()).sum();

        let mut fg = FlowGraph::new("outer");
        fg.add_container("X", DataDescriptor::array(ElementType::Float64, &["4".into()]))
            .unwrap();
        let state_id = fg.add_state(FlowGraph::ROOT, "s", true).unwrap();
        let state = fg.state_mut(FlowGraph::ROOT, state_id).unwrap();
        let x = state.add_access("X");
        let nested = state.add_nested_graph(crate::dataflow::NestedGraphNode {
            label: "inner".to_string(),
            graph: Box::new(inner_fg),
            symbol_mapping: IndexMap::new(),
            in_connectors: [String::from("A")].into_iter().collect(),
            out_connectors: BTreeSet::new(),
        });
        state
            .add_edge(x, None, nested, Some("A"), Memlet::new("X", Subset::parse("0:3").unwrap()))
            .unwrap();

        let state = fg.state(FlowGraph::ROOT, state_id).unwrap();
        let with_descent = state.all_nodes_recursive(|_, _| true).count();
        assert_eq!(with_descent, 2 + inner_nodes);

        // Pruning predicate stops the descent
        let without_descent = state.all_nodes_recursive(|_, _| false).count();
        assert_eq!(without_descent, 2);
    }
}
