//! The dataflow state: one control block's computation graph.
//!
//! A [`DataflowState`] is an acyclic (at steady state) directed multigraph of
//! [`DataflowNode`]s connected by [`MemletEdge`]s. It forms one indivisible
//! unit of concurrent computation: everything inside a state may execute
//! concurrently subject only to data dependencies.
//!
//! # Caching
//!
//! Scope nesting is expensive to compute and queried constantly, so the
//! state caches it. Every structural mutation funnels through
//! [`invalidate_caches`](DataflowState::invalidate_caches), which resets the
//! cache before the mutation returns; the next query recomputes lazily.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt::Write as _;

use tracing::trace;

use crate::dataflow::node::{is_in_connector, is_out_connector, matching_in, matching_out};
use crate::dataflow::{DataflowNode, Memlet, MemletEdge, MemletTree};
use crate::graph::{algorithms, DirectedGraph, EdgeId, NodeId};
use crate::symbolic::Subset;
use crate::utils::escape_dot;
use crate::{Error, Result};

use std::sync::OnceLock;

/// Cached scope-nesting information of one state.
///
/// `parent` assigns each node its innermost enclosing scope entry (`None`
/// for top-level nodes); `children` is the exact inverse grouping, keyed by
/// entry node (`None` for the top level).
#[derive(Debug, Clone, Default)]
pub struct ScopeInfo {
    /// Node to innermost enclosing scope entry
    pub parent: HashMap<NodeId, Option<NodeId>>,
    /// Scope entry (or `None` for top level) to directly contained nodes
    pub children: HashMap<Option<NodeId>, Vec<NodeId>>,
}

/// One scope of the scope tree derived from [`ScopeInfo`].
#[derive(Debug, Clone)]
pub struct ScopeTreeNode {
    /// The scope's entry node, or `None` for the top-level scope
    pub entry: Option<NodeId>,
    /// The scope's exit node, or `None` for the top-level scope
    pub exit: Option<NodeId>,
    /// The enclosing scope's entry node (`None` for the top-level scope's
    /// absent parent and for scopes directly at the top level)
    pub parent: Option<NodeId>,
    /// Entry nodes of scopes nested directly inside this one
    pub children: Vec<NodeId>,
}

/// A dataflow graph representing one control state's computation.
///
/// # Examples
///
/// ```rust
/// use stategraph::dataflow::{DataflowState, Memlet};
/// use stategraph::symbolic::Subset;
///
/// let mut state = DataflowState::new("compute");
/// let a = state.add_access("A");
/// let b = state.add_access("B");
/// state
///     .add_edge(a, None, b, None, Memlet::new("A", Subset::parse("0:9").unwrap()))
///     .unwrap();
///
/// let (reads, writes) = state.read_and_write_sets().unwrap();
/// assert!(reads.contains("A"));
/// assert!(writes.contains("B"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct DataflowState {
    label: String,
    graph: DirectedGraph<DataflowNode, MemletEdge>,
    scope_cache: OnceLock<ScopeInfo>,
}

impl DataflowState {
    /// Creates a new empty state with the given label.
    pub fn new(label: impl Into<String>) -> Self {
        DataflowState {
            label: label.into(),
            graph: DirectedGraph::new(),
            scope_cache: OnceLock::new(),
        }
    }

    /// Returns the state's label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Sets the state's label.
    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    /// Returns `true` if the state contains no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    /// Returns the number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns a reference to the underlying graph.
    ///
    /// This provides access to the full graph API for advanced use cases
    /// such as custom traversals.
    #[must_use]
    pub fn graph(&self) -> &DirectedGraph<DataflowNode, MemletEdge> {
        &self.graph
    }

    /// Returns a reference to the node data, or `None` if the ID is invalid.
    #[must_use]
    pub fn node(&self, node: NodeId) -> Option<&DataflowNode> {
        self.graph.node(node)
    }

    /// Returns a reference to the edge payload, or `None` if the ID is invalid.
    #[must_use]
    pub fn edge(&self, edge: EdgeId) -> Option<&MemletEdge> {
        self.graph.edge(edge)
    }

    /// Returns the `(source, target)` endpoints of an edge.
    #[must_use]
    pub fn edge_endpoints(&self, edge: EdgeId) -> Option<(NodeId, NodeId)> {
        self.graph.edge_endpoints(edge)
    }

    /// Returns an iterator over all live node identifiers.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.graph.node_ids()
    }

    /// Returns an iterator over all live edge identifiers.
    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.graph.edge_ids()
    }

    /// Returns the identifiers of edges entering `node`.
    pub fn in_edges(&self, node: NodeId) -> impl Iterator<Item = EdgeId> + '_ {
        self.graph.in_edges(node)
    }

    /// Returns the identifiers of edges leaving `node`.
    pub fn out_edges(&self, node: NodeId) -> impl Iterator<Item = EdgeId> + '_ {
        self.graph.out_edges(node)
    }

    /// Returns the identifiers of edges entering `node` through the given
    /// connector.
    pub fn in_edges_by_connector<'a>(
        &'a self,
        node: NodeId,
        connector: &'a str,
    ) -> impl Iterator<Item = EdgeId> + 'a {
        self.graph
            .in_edges(node)
            .filter(move |e| self.graph.edge(*e).is_some_and(|p| p.dst_conn.as_deref() == Some(connector)))
    }

    /// Returns the identifiers of edges leaving `node` through the given
    /// connector.
    pub fn out_edges_by_connector<'a>(
        &'a self,
        node: NodeId,
        connector: &'a str,
    ) -> impl Iterator<Item = EdgeId> + 'a {
        self.graph
            .out_edges(node)
            .filter(move |e| self.graph.edge(*e).is_some_and(|p| p.src_conn.as_deref() == Some(connector)))
    }

    /// Returns all nodes with no incoming edges.
    #[must_use]
    pub fn source_nodes(&self) -> Vec<NodeId> {
        self.graph.source_nodes()
    }

    /// Returns all nodes with no outgoing edges.
    #[must_use]
    pub fn sink_nodes(&self) -> Vec<NodeId> {
        self.graph.sink_nodes()
    }

    ///////////////////////////////////////////////////////////////////
    // Mutation

    /// Clears all cached derived data.
    ///
    /// Called from every structural mutation entry point before it returns,
    /// so queries never observe stale scope information.
    pub fn invalidate_caches(&mut self) {
        self.scope_cache = OnceLock::new();
    }

    /// Adds a node to the state.
    pub fn add_node(&mut self, node: DataflowNode) -> NodeId {
        self.invalidate_caches();
        self.graph.add_node(node)
    }

    /// Adds an access node for the given data container.
    pub fn add_access(&mut self, data: impl Into<String>) -> NodeId {
        self.add_node(DataflowNode::access(data))
    }

    /// Adds a code node with the given connectors.
    pub fn add_code(
        &mut self,
        label: impl Into<String>,
        code: crate::dataflow::CodeBlock,
        in_connectors: impl IntoIterator<Item = String>,
        out_connectors: impl IntoIterator<Item = String>,
    ) -> NodeId {
        self.add_node(DataflowNode::Code(crate::dataflow::CodeNode::new(
            label,
            code,
            in_connectors,
            out_connectors,
        )))
    }

    /// Adds a paired scope entry and exit delimiting a parallel iteration
    /// scope.
    ///
    /// # Arguments
    ///
    /// * `label` - Scope label; the exit is labeled `<label>_exit`
    /// * `params` - Iteration parameters defined by the scope
    /// * `range` - Iteration range, one dimension per parameter
    /// * `schedule` - Execution schedule
    ///
    /// # Returns
    ///
    /// The `(entry, exit)` node identifiers.
    pub fn add_scope(
        &mut self,
        label: impl Into<String>,
        params: &[&str],
        range: Subset,
        schedule: crate::data::ScheduleKind,
    ) -> (NodeId, NodeId) {
        let label: String = label.into();
        let entry = self.add_node(DataflowNode::ScopeEntry(crate::dataflow::ScopeEntryNode {
            label: label.clone(),
            params: params.iter().map(|p| (*p).to_string()).collect(),
            range,
            schedule,
            in_connectors: BTreeSet::new(),
            out_connectors: BTreeSet::new(),
        }));
        let exit = self.add_node(DataflowNode::ScopeExit(crate::dataflow::ScopeExitNode {
            label: format!("{label}_exit"),
            in_connectors: BTreeSet::new(),
            out_connectors: BTreeSet::new(),
        }));
        (entry, exit)
    }

    /// Adds a nested-graph node embedding an entire IR instance.
    pub fn add_nested_graph(&mut self, node: crate::dataflow::NestedGraphNode) -> NodeId {
        self.add_node(DataflowNode::Nested(node))
    }

    /// Adds a data-movement edge.
    ///
    /// Connector names are validated against the endpoint nodes: a named
    /// connector must exist on the respective side.
    ///
    /// # Arguments
    ///
    /// * `src` - Source node
    /// * `src_conn` - Source connector, if attaching to a named connector
    /// * `dst` - Destination node
    /// * `dst_conn` - Destination connector, if attaching to a named connector
    /// * `memlet` - The data movement carried by the edge
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingConnector`] if a named connector does not
    /// exist on its node, or [`Error::GraphError`] on invalid endpoints.
    pub fn add_edge(
        &mut self,
        src: NodeId,
        src_conn: Option<&str>,
        dst: NodeId,
        dst_conn: Option<&str>,
        memlet: Memlet,
    ) -> Result<EdgeId> {
        if let Some(conn) = src_conn {
            let node = self
                .graph
                .node(src)
                .ok_or_else(|| Error::GraphError(format!("Source node {src} does not exist")))?;
            if !node.has_out_connector(conn) {
                return Err(Error::MissingConnector {
                    node: node.label().to_string(),
                    connector: conn.to_string(),
                });
            }
        }
        if let Some(conn) = dst_conn {
            let node = self
                .graph
                .node(dst)
                .ok_or_else(|| Error::GraphError(format!("Destination node {dst} does not exist")))?;
            if !node.has_in_connector(conn) {
                return Err(Error::MissingConnector {
                    node: node.label().to_string(),
                    connector: conn.to_string(),
                });
            }
        }

        self.invalidate_caches();
        self.graph.add_edge(
            src,
            dst,
            MemletEdge::with_connectors(memlet, src_conn, dst_conn),
        )
    }

    /// Removes a node and all of its incident edges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::GraphError`] if the node does not exist.
    pub fn remove_node(&mut self, node: NodeId) -> Result<DataflowNode> {
        self.invalidate_caches();
        self.graph.remove_node(node)
    }

    /// Removes an edge.
    ///
    /// # Errors
    ///
    /// Returns [`Error::GraphError`] if the edge does not exist.
    pub fn remove_edge(&mut self, edge: EdgeId) -> Result<MemletEdge> {
        self.invalidate_caches();
        self.graph.remove_edge(edge)
    }

    /// Threads a memlet through a chain of nodes, filling scope connectors.
    ///
    /// Consecutive nodes are connected by copies of `memlet`; intermediate
    /// scope entry/exit nodes get a passthrough connector pair keyed by the
    /// memlet's container name, so the resulting edges satisfy the
    /// `IN_`/`OUT_` naming invariant that path tracing relies on.
    ///
    /// # Arguments
    ///
    /// * `path` - At least two nodes, outermost to innermost
    /// * `memlet` - The data movement carried along the path
    /// * `src_conn` - Connector on the first node, if any
    /// * `dst_conn` - Connector on the last node, if any
    ///
    /// # Returns
    ///
    /// The identifiers of the created edges, in path order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::GraphError`] for paths of fewer than two nodes or
    /// empty memlets, and connector/endpoint errors from the underlying
    /// edge insertions.
    pub fn add_memlet_path(
        &mut self,
        path: &[NodeId],
        memlet: Memlet,
        src_conn: Option<&str>,
        dst_conn: Option<&str>,
    ) -> Result<Vec<EdgeId>> {
        if path.len() < 2 {
            return Err(Error::GraphError(
                "Memlet path requires at least two nodes".to_string(),
            ));
        }
        let Some(conn_id) = memlet.data.clone() else {
            return Err(Error::GraphError(
                "Cannot thread an empty memlet through a path".to_string(),
            ));
        };

        // Register passthrough connectors on all intermediate scope nodes
        for &node in &path[1..path.len() - 1] {
            let node_ref = self
                .graph
                .node_mut(node)
                .ok_or_else(|| Error::GraphError(format!("Node {node} does not exist")))?;
            if node_ref.is_scope_node() {
                node_ref.add_scope_connectors(&conn_id);
            } else {
                return Err(Error::GraphError(format!(
                    "Intermediate path node '{}' is not a scope node",
                    node_ref.label()
                )));
            }
        }

        let last = path.len() - 1;
        let mut edges = Vec::with_capacity(last);
        for i in 0..last {
            let (a, b) = (path[i], path[i + 1]);
            let sconn: Option<String> = if i == 0 {
                src_conn.map(str::to_string)
            } else {
                Some(format!("OUT_{conn_id}"))
            };
            let dconn: Option<String> = if i + 1 == last {
                dst_conn.map(str::to_string)
            } else {
                Some(format!("IN_{conn_id}"))
            };
            edges.push(self.add_edge(a, sconn.as_deref(), b, dconn.as_deref(), memlet.clone())?);
        }
        Ok(edges)
    }

    ///////////////////////////////////////////////////////////////////
    // Scope computation

    /// Returns the cached scope information, computing it if necessary.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CyclicGraph`] if the state contains a cycle, or a
    /// consistency error if nodes remain unprocessed on an acyclic graph.
    pub fn scopes(&self) -> Result<&ScopeInfo> {
        if let Some(info) = self.scope_cache.get() {
            return Ok(info);
        }
        let info = self.compute_scopes()?;
        Ok(self.scope_cache.get_or_init(|| info))
    }

    /// Returns the map from each node to its innermost enclosing scope
    /// entry (`None` for top-level nodes).
    ///
    /// # Errors
    ///
    /// See [`scopes`](Self::scopes).
    pub fn scope_dict(&self) -> Result<&HashMap<NodeId, Option<NodeId>>> {
        Ok(&self.scopes()?.parent)
    }

    /// Returns the inverse grouping of [`scope_dict`](Self::scope_dict):
    /// scope entry (or `None` for the top level) to directly contained
    /// nodes.
    ///
    /// # Errors
    ///
    /// See [`scopes`](Self::scopes).
    pub fn scope_children(&self) -> Result<&HashMap<Option<NodeId>, Vec<NodeId>>> {
        Ok(&self.scopes()?.children)
    }

    /// Returns the innermost scope entry enclosing `node`, or `None` for
    /// top-level nodes.
    ///
    /// # Errors
    ///
    /// Scope computation errors, or a graph error for unknown nodes.
    pub fn entry_node(&self, node: NodeId) -> Result<Option<NodeId>> {
        self.scope_dict()?
            .get(&node)
            .copied()
            .ok_or_else(|| Error::GraphError(format!("Node {node} does not exist")))
    }

    /// Returns the unique scope exit matching the given entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingScopeExit`] if no exit is found among the
    /// scope's children, which indicates a malformed graph.
    pub fn exit_node(&self, entry: NodeId) -> Result<NodeId> {
        let children = self.scope_children()?;
        children
            .get(&Some(entry))
            .and_then(|nodes| {
                nodes
                    .iter()
                    .copied()
                    .find(|n| self.graph.node(*n).is_some_and(DataflowNode::is_exit))
            })
            .ok_or_else(|| Error::MissingScopeExit {
                state: self.label.clone(),
                entry: self
                    .graph
                    .node(entry)
                    .map_or_else(|| entry.to_string(), |n| n.label().to_string()),
            })
    }

    /// Builds the scope tree: one entry per scope, with parent and child
    /// scope links.
    ///
    /// # Errors
    ///
    /// See [`scopes`](Self::scopes) and [`exit_node`](Self::exit_node).
    pub fn scope_tree(&self) -> Result<HashMap<Option<NodeId>, ScopeTreeNode>> {
        let info = self.scopes()?;
        let mut result = HashMap::new();

        for (&scope, nodes) in &info.children {
            let exit = match scope {
                Some(entry) => Some(self.exit_node(entry)?),
                None => None,
            };
            let parent = scope.and_then(|entry| info.parent.get(&entry).copied().flatten());
            let children = nodes
                .iter()
                .copied()
                .filter(|n| self.graph.node(*n).is_some_and(DataflowNode::is_entry))
                .collect();
            result.insert(
                scope,
                ScopeTreeNode {
                    entry: scope,
                    exit,
                    parent,
                    children,
                },
            );
        }
        Ok(result)
    }

    /// Returns the entries of scopes containing no nested scopes.
    ///
    /// # Errors
    ///
    /// See [`scope_tree`](Self::scope_tree).
    pub fn scope_leaves(&self) -> Result<Vec<Option<NodeId>>> {
        let tree = self.scope_tree()?;
        Ok(tree
            .values()
            .filter(|s| s.children.is_empty())
            .map(|s| s.entry)
            .collect())
    }

    /// Returns all nodes contained in the scope of `entry`, optionally
    /// including nested scopes' contents.
    ///
    /// # Errors
    ///
    /// See [`scopes`](Self::scopes).
    pub fn scope_subgraph(&self, entry: NodeId, recursive: bool) -> Result<Vec<NodeId>> {
        let children = self.scope_children()?;
        let mut result = Vec::new();
        let mut stack = vec![entry];
        while let Some(scope) = stack.pop() {
            if let Some(nodes) = children.get(&Some(scope)) {
                for &node in nodes {
                    result.push(node);
                    if recursive && self.graph.node(node).is_some_and(DataflowNode::is_entry) {
                        stack.push(node);
                    }
                }
            }
        }
        Ok(result)
    }

    /// Breadth-first scope assignment from the source nodes.
    ///
    /// Entry nodes recurse one scope level down; exit nodes hand their
    /// successors back to the enclosing level. Leftover nodes mean the
    /// graph is cyclic or inconsistent.
    fn compute_scopes(&self) -> Result<ScopeInfo> {
        trace!(state = %self.label, "computing scope nesting");
        let mut info = ScopeInfo::default();
        info.children.entry(None).or_default();

        let queue: VecDeque<NodeId> = self.graph.source_nodes().into();
        let leftover = self.scope_inner(queue, None, &mut info);

        if !leftover.is_empty() {
            return Err(self.cycle_or_consistency_error(format!(
                "Leftover nodes in queue: {leftover:?}"
            )));
        }
        if info.parent.len() != self.graph.node_count() {
            let missing: Vec<NodeId> = self
                .graph
                .node_ids()
                .filter(|n| !info.parent.contains_key(n))
                .collect();
            return Err(self.cycle_or_consistency_error(format!(
                "Some nodes were not processed: {missing:?}"
            )));
        }
        Ok(info)
    }

    fn scope_inner(
        &self,
        mut queue: VecDeque<NodeId>,
        current: Option<NodeId>,
        info: &mut ScopeInfo,
    ) -> VecDeque<NodeId> {
        let mut external = VecDeque::new();
        let mut visited = HashSet::new();

        while let Some(node) = queue.pop_front() {
            if !visited.insert(node) {
                continue;
            }
            info.parent.insert(node, current);
            info.children.entry(current).or_default().push(node);

            let successors: VecDeque<NodeId> = self
                .graph
                .successors(node)
                .filter(|s| !visited.contains(s))
                .collect();

            match self.graph.node(node) {
                Some(DataflowNode::ScopeEntry(_)) => {
                    let returned = self.scope_inner(successors, Some(node), info);
                    queue.extend(returned);
                }
                Some(DataflowNode::ScopeExit(_)) => {
                    external.extend(successors);
                }
                _ => queue.extend(successors),
            }
        }
        external
    }

    /// Classifies a failed scope traversal: cyclic graph if cycles exist,
    /// internal inconsistency otherwise.
    fn cycle_or_consistency_error(&self, detail: String) -> Error {
        let nodes: Vec<NodeId> = self.graph.node_ids().collect();
        let cyclic = algorithms::find_cycles(&self.graph, &nodes);
        if cyclic.is_empty() {
            consistency_error!("{} (state '{}')", detail, self.label)
        } else {
            Error::CyclicGraph {
                state: self.label.clone(),
                nodes: cyclic
                    .into_iter()
                    .map(|n| {
                        self.graph
                            .node(n)
                            .map_or_else(|| n.to_string(), |d| d.label().to_string())
                    })
                    .collect(),
            }
        }
    }

    ///////////////////////////////////////////////////////////////////
    // Data-movement tracing

    /// Returns the ordered list of edges connecting the true source of a
    /// data movement to its true sink, given any edge along the way.
    ///
    /// The walk crosses scope boundaries through the `OUT_<id>`/`IN_<id>`
    /// connector convention. Behavior is undefined when more than one path
    /// involves the edge; the first matching connector edge wins.
    ///
    /// # Arguments
    ///
    /// * `edge` - An edge within this state
    ///
    /// # Returns
    ///
    /// The path edges ordered from source to sink; an empty memlet without
    /// connectors is its own path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingConnector`] on a dangling scope connector and
    /// [`Error::CyclicPath`] if the connector structure loops.
    pub fn memlet_path(&self, edge: EdgeId) -> Result<Vec<EdgeId>> {
        let payload = self
            .edge_payload(edge)?;

        let mut result = VecDeque::from([edge]);

        // An empty memlet without connectors is its own path
        if payload.src_conn.is_none() && payload.dst_conn.is_none() && payload.memlet.is_empty() {
            return Ok(result.into());
        }

        // Prepend incoming edges until reaching the true source
        let mut cur = edge;
        let mut visited = HashSet::new();
        loop {
            let (src, _) = self.endpoints(cur)?;
            let src_node = self.node_ref(src)?;
            if src_node.terminates_paths() {
                break;
            }
            visited.insert(cur);

            let src_conn = self.edge_payload(cur)?.src_conn.clone().ok_or_else(|| {
                Error::MissingConnector {
                    node: src_node.label().to_string(),
                    connector: "<source connector>".to_string(),
                }
            })?;
            if !is_out_connector(&src_conn) {
                return Err(consistency_error!(
                    "Edge leaves scope node '{}' through non-OUT connector '{}'",
                    src_node.label(),
                    src_conn
                ));
            }
            let want = matching_in(&src_conn).unwrap();
            let next = self
                .in_edges_by_connector(src, &want)
                .next()
                .ok_or_else(|| Error::MissingConnector {
                    node: src_node.label().to_string(),
                    connector: want.clone(),
                })?;
            if visited.contains(&next) {
                return Err(Error::CyclicPath {
                    state: self.label.clone(),
                });
            }
            result.push_front(next);
            cur = next;
        }

        // Append outgoing edges until reaching the true sink
        let mut cur = edge;
        visited.clear();
        loop {
            let (_, dst) = self.endpoints(cur)?;
            let dst_node = self.node_ref(dst)?;
            if dst_node.terminates_paths() {
                break;
            }
            visited.insert(cur);

            let dst_conn = self.edge_payload(cur)?.dst_conn.clone().ok_or_else(|| {
                Error::MissingConnector {
                    node: dst_node.label().to_string(),
                    connector: "<destination connector>".to_string(),
                }
            })?;
            if !is_in_connector(&dst_conn) {
                // Dynamic scope inputs (e.g. range symbols) end the path here
                break;
            }
            let want = matching_out(&dst_conn).unwrap();
            let next = self
                .out_edges_by_connector(dst, &want)
                .next()
                .ok_or_else(|| Error::MissingConnector {
                    node: dst_node.label().to_string(),
                    connector: want.clone(),
                })?;
            if visited.contains(&next) {
                return Err(Error::CyclicPath {
                    state: self.label.clone(),
                });
            }
            result.push_back(next);
            cur = next;
        }

        Ok(result.into())
    }

    /// Builds the tree of sibling data-movement edges sharing connector ids
    /// across scope nesting levels, rooted at the outermost involved edge.
    ///
    /// Edges with no scope involvement (and edges with inconsistent
    /// involvement on both sides) yield a degenerate single-node tree.
    ///
    /// # Arguments
    ///
    /// * `edge` - An edge within this state
    ///
    /// # Errors
    ///
    /// Returns [`Error::CyclicPath`] if the connector structure loops, and
    /// graph errors on invalid identifiers.
    pub fn memlet_tree(&self, edge: EdgeId) -> Result<MemletTree> {
        let payload = self.edge_payload(edge)?;
        let (src, dst) = self.endpoints(edge)?;
        let src_node = self.node_ref(src)?;
        let dst_node = self.node_ref(dst)?;

        let propagate_forward = (src_node.is_entry() && payload.src_conn.is_some())
            || (dst_node.is_entry()
                && payload.dst_conn.as_deref().is_some_and(is_in_connector));
        let propagate_backward = (src_node.is_exit() && payload.src_conn.is_some())
            || (dst_node.is_exit() && payload.dst_conn.is_some());

        // No scopes involved, or involvement on both sides: degenerate tree
        if propagate_forward == propagate_backward {
            return Ok(MemletTree::leaf(edge));
        }

        // Walk to the outermost edge of the tree
        let mut root = edge;
        let mut visited = HashSet::new();
        if propagate_forward {
            loop {
                let (src, _) = self.endpoints(root)?;
                let payload = self.edge_payload(root)?;
                let Some(src_conn) = payload.src_conn.as_deref() else {
                    break;
                };
                if !self.node_ref(src)?.is_entry() {
                    break;
                }
                visited.insert(root);
                let want = matching_in(src_conn).ok_or_else(|| {
                    consistency_error!(
                        "Edge leaves scope entry through non-OUT connector '{src_conn}'"
                    )
                })?;
                let next = match self.in_edges_by_connector(src, &want).next() {
                    Some(e) => e,
                    None => break,
                };
                if visited.contains(&next) {
                    return Err(Error::CyclicPath {
                        state: self.label.clone(),
                    });
                }
                root = next;
            }
        } else {
            loop {
                let (_, dst) = self.endpoints(root)?;
                let payload = self.edge_payload(root)?;
                let Some(dst_conn) = payload.dst_conn.as_deref() else {
                    break;
                };
                if !self.node_ref(dst)?.is_exit() {
                    break;
                }
                visited.insert(root);
                let want = matching_out(dst_conn).ok_or_else(|| {
                    consistency_error!(
                        "Edge enters scope exit through non-IN connector '{dst_conn}'"
                    )
                })?;
                let next = match self.out_edges_by_connector(dst, &want).next() {
                    Some(e) => e,
                    None => break,
                };
                if visited.contains(&next) {
                    return Err(Error::CyclicPath {
                        state: self.label.clone(),
                    });
                }
                root = next;
            }
        }

        // Expand children level by level along the propagation direction
        Ok(self.expand_tree(root, propagate_forward))
    }

    fn expand_tree(&self, edge: EdgeId, forward: bool) -> MemletTree {
        let mut children = Vec::new();

        if let (Ok(payload), Ok((src, dst))) = (self.edge_payload(edge), self.endpoints(edge)) {
            if forward {
                let descend = self
                    .node_ref(dst)
                    .is_ok_and(|n| n.is_entry())
                    && payload.dst_conn.as_deref().is_some_and(is_in_connector);
                if descend {
                    let want = matching_out(payload.dst_conn.as_deref().unwrap()).unwrap();
                    children = self
                        .out_edges_by_connector(dst, &want)
                        .map(|e| self.expand_tree(e, forward))
                        .collect();
                }
            } else {
                let descend = self.node_ref(src).is_ok_and(|n| n.is_exit())
                    && payload.src_conn.is_some();
                if descend {
                    if let Some(want) = matching_in(payload.src_conn.as_deref().unwrap()) {
                        children = self
                            .in_edges_by_connector(src, &want)
                            .map(|e| self.expand_tree(e, forward))
                            .collect();
                    }
                }
            }
        }

        MemletTree { edge, children }
    }

    /// Returns `true` if the edge is a leaf of its data-movement tree.
    ///
    /// Leaf memlets are the innermost edges of their propagation trees;
    /// argument inference only considers these when collecting symbols for
    /// materialization.
    #[must_use]
    pub fn is_leaf_memlet(&self, edge: EdgeId) -> bool {
        let Some(payload) = self.graph.edge(edge) else {
            return true;
        };
        let Some((src, dst)) = self.graph.edge_endpoints(edge) else {
            return true;
        };
        if self.graph.node(src).is_some_and(DataflowNode::is_exit)
            && payload.src_conn.as_deref().is_some_and(is_out_connector)
        {
            return false;
        }
        if self.graph.node(dst).is_some_and(DataflowNode::is_entry)
            && payload.dst_conn.as_deref().is_some_and(is_in_connector)
        {
            return false;
        }
        true
    }

    ///////////////////////////////////////////////////////////////////
    // Read/write sets

    /// Determines which data containers are read and written in this state.
    ///
    /// Within each maximal concurrently-executable subgraph (nodes not
    /// ordered by any data dependency), a read fully covered by a prior
    /// write of the same container is masked out. Results of independent
    /// subgraphs are unioned, so an early write in one subgraph never masks
    /// a read in another.
    ///
    /// # Returns
    ///
    /// The `(read containers, written containers)` name sets.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CyclicGraph`] if a subgraph cannot be ordered
    /// topologically.
    pub fn read_and_write_sets(&self) -> Result<(BTreeSet<String>, BTreeSet<String>)> {
        let (reads, writes) = self.read_and_write_subsets()?;
        Ok((
            reads.into_keys().collect(),
            writes.into_keys().collect(),
        ))
    }

    /// Determines the read and written subsets per data container.
    ///
    /// See [`read_and_write_sets`](Self::read_and_write_sets) for the
    /// masking rule.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CyclicGraph`] if a subgraph cannot be ordered
    /// topologically.
    pub fn read_and_write_subsets(
        &self,
    ) -> Result<(HashMap<String, Vec<Subset>>, HashMap<String, Vec<Subset>>)> {
        let nodes: Vec<NodeId> = self.graph.node_ids().collect();
        self.rw_subsets_for(&nodes)
    }

    /// Read/write subset computation over an arbitrary node-induced view of
    /// this state; edges leaving the view do not contribute.
    pub(crate) fn rw_subsets_for(
        &self,
        nodes: &[NodeId],
    ) -> Result<(HashMap<String, Vec<Subset>>, HashMap<String, Vec<Subset>>)> {
        let view: HashSet<NodeId> = nodes.iter().copied().collect();
        let components = algorithms::weakly_connected_components(&self.graph, nodes);

        let mut read_set: HashMap<String, Vec<Subset>> = HashMap::new();
        let mut write_set: HashMap<String, Vec<Subset>> = HashMap::new();

        for component in components {
            let membership: HashSet<NodeId> = component.iter().copied().collect();
            let order = algorithms::topological_sort_subset(
                &self.graph,
                &component,
                Some(&membership),
            )
            .ok_or_else(|| {
                self.cycle_or_consistency_error("Cyclic concurrent subgraph".to_string())
            })?;

            // Traverse in dependency order so data written before being read
            // is not counted as an external read
            for node in order {
                let Some(DataflowNode::Access(access)) = self.graph.node(node) else {
                    continue;
                };
                let in_view = |e: &EdgeId| {
                    self.graph
                        .edge_endpoints(*e)
                        .is_some_and(|(s, d)| view.contains(&s) && view.contains(&d))
                };
                let in_edges: Vec<EdgeId> = self.graph.in_edges(node).filter(in_view).collect();
                let mut out_edges: Vec<EdgeId> =
                    self.graph.out_edges(node).filter(in_view).collect();

                // Mask reads fully covered by a same-container write
                out_edges.retain(|o| {
                    let out_payload = &self.graph.edge(*o).unwrap().memlet;
                    !in_edges.iter().any(|i| {
                        let in_payload = &self.graph.edge(*i).unwrap().memlet;
                        in_payload.data == out_payload.data
                            && self
                                .written_subset(in_payload, &access.data)
                                .covers(self.read_subset(out_payload, &access.data))
                    })
                });

                for i in &in_edges {
                    let memlet = &self.graph.edge(*i).unwrap().memlet;
                    if memlet.is_empty() {
                        continue;
                    }
                    write_set
                        .entry(access.data.clone())
                        .or_default()
                        .push(memlet.subset.clone());
                }
                for o in &out_edges {
                    let memlet = &self.graph.edge(*o).unwrap().memlet;
                    if memlet.is_empty() {
                        continue;
                    }
                    read_set
                        .entry(access.data.clone())
                        .or_default()
                        .push(memlet.subset.clone());
                }
            }
        }
        Ok((read_set, write_set))
    }

    /// Resolves the subset a memlet writes into the given container.
    fn written_subset<'a>(&self, memlet: &'a Memlet, container: &str) -> &'a Subset {
        if memlet.data.as_deref() == Some(container) {
            &memlet.subset
        } else {
            memlet.other_subset.as_ref().unwrap_or(&memlet.subset)
        }
    }

    /// Resolves the subset a memlet reads from the given container.
    fn read_subset<'a>(&self, memlet: &'a Memlet, container: &str) -> &'a Subset {
        self.written_subset(memlet, container)
    }

    ///////////////////////////////////////////////////////////////////
    // Replacement

    /// Finds and replaces all occurrences of a symbol or container name in
    /// this state. Fails silently on non-occurrence.
    pub fn replace(&mut self, name: &str, new_name: &str) {
        let nodes: Vec<NodeId> = self.graph.node_ids().collect();
        for node in nodes {
            if let Some(data) = self.graph.node_mut(node) {
                data.replace(name, new_name);
            }
        }
        let edges: Vec<EdgeId> = self.graph.edge_ids().collect();
        for edge in edges {
            if let Some(payload) = self.graph.edge_mut(edge) {
                payload.memlet.replace(name, new_name);
            }
        }
    }

    /// Applies a set of renamings to this state.
    pub fn replace_dict(&mut self, repl: &indexmap::IndexMap<String, String>) {
        for (old, new) in repl {
            self.replace(old, new);
        }
    }

    ///////////////////////////////////////////////////////////////////
    // Rendering

    /// Generates a DOT format representation of this state.
    ///
    /// The generated DOT can be rendered using Graphviz tools. Scope
    /// entry/exit nodes are drawn as trapezia, access nodes as ellipses,
    /// and code nodes as octagons.
    #[must_use]
    pub fn to_dot(&self) -> String {
        let mut dot = String::new();
        dot.push_str("digraph state {\n");
        let _ = writeln!(dot, "    label=\"{}\";", escape_dot(&self.label));
        dot.push_str("    node [fontname=\"Courier\", fontsize=10];\n\n");

        for (id, node) in self.graph.nodes() {
            let shape = match node {
                DataflowNode::Access(_) => "ellipse",
                DataflowNode::Code(_) => "octagon",
                DataflowNode::ScopeEntry(_) => "trapezium",
                DataflowNode::ScopeExit(_) => "invtrapezium",
                DataflowNode::Nested(_) => "doubleoctagon",
            };
            let _ = writeln!(
                dot,
                "    {id} [label=\"{}\", shape={shape}];",
                escape_dot(node.label())
            );
        }

        dot.push('\n');
        for (_, src, dst, payload) in self.graph.edges() {
            let _ = writeln!(
                dot,
                "    {src} -> {dst} [label=\"{}\"];",
                escape_dot(&payload.memlet.to_string())
            );
        }
        dot.push_str("}\n");
        dot
    }

    ///////////////////////////////////////////////////////////////////
    // Internal lookups

    fn node_ref(&self, node: NodeId) -> Result<&DataflowNode> {
        self.graph
            .node(node)
            .ok_or_else(|| Error::GraphError(format!("Node {node} does not exist")))
    }

    fn edge_payload(&self, edge: EdgeId) -> Result<&MemletEdge> {
        self.graph
            .edge(edge)
            .ok_or_else(|| Error::GraphError(format!("Edge {edge} does not exist")))
    }

    fn endpoints(&self, edge: EdgeId) -> Result<(NodeId, NodeId)> {
        self.graph
            .edge_endpoints(edge)
            .ok_or_else(|| Error::GraphError(format!("Edge {edge} does not exist")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ScheduleKind;
    use crate::dataflow::CodeBlock;

    /// Builds `A -[0:9]-> entry -[i]-> compute -[i]-> exit -[0:9]-> B`.
    fn mapped_computation() -> (DataflowState, NodeId, NodeId, NodeId, NodeId, NodeId) {
        let mut state = DataflowState::new("compute");
        let a = state.add_access("A");
        let b = state.add_access("B");
        let (entry, exit) = state.add_scope(
            "map",
            &["i"],
            Subset::parse("0:9").unwrap(),
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

        (state, a, b, entry, exit, code)
    }

    #[test]
    fn test_scope_dict_assigns_parents() {
        let (state, a, b, entry, exit, code) = mapped_computation();
        let sdict = state.scope_dict().unwrap();

        assert_eq!(sdict[&a], None);
        assert_eq!(sdict[&b], None);
        assert_eq!(sdict[&entry], None);
        assert_eq!(sdict[&code], Some(entry));
        assert_eq!(sdict[&exit], Some(entry));
    }

    #[test]
    fn test_scope_children_is_inverse_of_scope_dict() {
        let (state, ..) = mapped_computation();
        let sdict = state.scope_dict().unwrap().clone();
        let children = state.scope_children().unwrap();

        for (node, parent) in &sdict {
            assert!(children[parent].contains(node));
        }
        let total: usize = children.values().map(Vec::len).sum();
        assert_eq!(total, state.node_count());
    }

    #[test]
    fn test_scope_exit_lookup() {
        let (state, _, _, entry, exit, _) = mapped_computation();
        assert_eq!(state.exit_node(entry).unwrap(), exit);
    }

    #[test]
    fn test_missing_scope_exit() {
        let mut state = DataflowState::new("broken");
        let a = state.add_access("A");
        let (entry, exit) = state.add_scope(
            "map",
            &["i"],
            Subset::parse("0:9").unwrap(),
            ScheduleKind::Parallel,
        );
        state
            .add_edge(a, None, entry, None, Memlet::new("A", Subset::parse("0:9").unwrap()))
            .unwrap();
        state.remove_node(exit).unwrap();

        assert!(matches!(
            state.exit_node(entry),
            Err(Error::MissingScopeExit { .. })
        ));
    }

    #[test]
    fn test_cyclic_state_reports_cycle() {
        let mut state = DataflowState::new("cyclic");
        let a = state.add_access("A");
        let b = state.add_access("B");
        state
            .add_edge(a, None, b, None, Memlet::new("A", Subset::parse("0").unwrap()))
            .unwrap();
        state
            .add_edge(b, None, a, None, Memlet::new("A", Subset::parse("0").unwrap()))
            .unwrap();

        match state.scope_dict() {
            Err(Error::CyclicGraph { state, nodes }) => {
                assert_eq!(state, "cyclic");
                assert_eq!(nodes.len(), 2);
            }
            other => unreachable!("expected CyclicGraph, got {other:?}"),
        }
    }

    #[test]
    fn test_cache_invalidation_on_mutation() {
        let (mut state, a, ..) = mapped_computation();
        let before = state.scope_dict().unwrap().len();

        let c = state.add_access("C");
        state
            .add_edge(a, None, c, None, Memlet::new("A", Subset::parse("0").unwrap()))
            .unwrap();

        let after = state.scope_dict().unwrap().len();
        assert_eq!(after, before + 1);
    }

    #[test]
    fn test_memlet_path_spans_scope() {
        let (state, a, _, entry, _, code) = mapped_computation();

        // The inner edge (entry -> code) must expand to the full path
        let inner = state.out_edges_by_connector(entry, "OUT_A").next().unwrap();
        let path = state.memlet_path(inner).unwrap();
        assert_eq!(path.len(), 2);

        let (first_src, _) = state.edge_endpoints(path[0]).unwrap();
        let (_, last_dst) = state.edge_endpoints(*path.last().unwrap()).unwrap();
        assert_eq!(first_src, a);
        assert_eq!(last_dst, code);

        // Path endpoints are never scope nodes
        assert!(state.node(first_src).unwrap().terminates_paths());
        assert!(state.node(last_dst).unwrap().terminates_paths());
    }

    #[test]
    fn test_memlet_path_of_outer_edge() {
        let (state, _, b, _, exit, code) = mapped_computation();

        let outer = state.out_edges(exit).next().unwrap();
        let path = state.memlet_path(outer).unwrap();
        assert_eq!(path.len(), 2);
        let (src, _) = state.edge_endpoints(path[0]).unwrap();
        let (_, dst) = state.edge_endpoints(path[1]).unwrap();
        assert_eq!(src, code);
        assert_eq!(dst, b);
    }

    #[test]
    fn test_memlet_path_empty_memlet() {
        let mut state = DataflowState::new("s");
        let a = state.add_access("A");
        let b = state.add_access("B");
        let e = state.add_edge(a, None, b, None, Memlet::empty()).unwrap();

        assert_eq!(state.memlet_path(e).unwrap(), vec![e]);
    }

    #[test]
    fn test_memlet_tree_fanout() {
        // One outer edge feeding two consumers inside the scope
        let mut state = DataflowState::new("s");
        let a = state.add_access("A");
        let (entry, exit) = state.add_scope(
            "map",
            &["i"],
            Subset::parse("0:9").unwrap(),
            ScheduleKind::Parallel,
        );
        let c1 = state.add_code(
            "c1",
            CodeBlock::expression("o = x"),
            vec!["x".to_string()],
            vec!["o".to_string()],
        );
        let c2 = state.add_code(
            "c2",
            CodeBlock::expression("o = x"),
            vec!["x".to_string()],
            vec!["o".to_string()],
        );
        let b = state.add_access("B");

        state
            .add_memlet_path(
                &[a, entry, c1],
                Memlet::new("A", Subset::parse("i").unwrap()),
                None,
                Some("x"),
            )
            .unwrap();
        // Second consumer reuses the same scope connector pair
        let inner = state
            .add_edge(
                entry,
                Some("OUT_A"),
                c2,
                Some("x"),
                Memlet::new("A", Subset::parse("i").unwrap()),
            )
            .unwrap();
        state
            .add_memlet_path(
                &[c1, exit, b],
                Memlet::new("B", Subset::parse("i").unwrap()),
                Some("o"),
                None,
            )
            .unwrap();
        state
            .add_edge(
                c2,
                Some("o"),
                exit,
                Some("IN_B"),
                Memlet::new("B", Subset::parse("i").unwrap()),
            )
            .unwrap();

        let tree = state.memlet_tree(inner).unwrap();
        // Rooted at the outer A -> entry edge, with both inner edges as children
        let (root_src, _) = state.edge_endpoints(tree.edge()).unwrap();
        assert_eq!(root_src, a);
        assert_eq!(tree.children.len(), 2);
        assert!(tree.find(inner).is_some());
        assert_eq!(tree.leaves().len(), 2);
    }

    #[test]
    fn test_memlet_tree_degenerate() {
        let mut state = DataflowState::new("s");
        let a = state.add_access("A");
        let b = state.add_access("B");
        let e = state
            .add_edge(a, None, b, None, Memlet::new("A", Subset::parse("0").unwrap()))
            .unwrap();

        let tree = state.memlet_tree(e).unwrap();
        assert!(tree.is_degenerate());
        assert_eq!(tree.edge(), e);
    }

    #[test]
    fn test_read_write_sets_masking() {
        // write A fully, then read it back: A is only a write
        let mut state = DataflowState::new("s");
        let t = state.add_code(
            "produce",
            CodeBlock::expression("out = 1"),
            vec![],
            vec!["out".to_string()],
        );
        let a = state.add_access("A");
        let b = state.add_access("B");
        state
            .add_edge(t, Some("out"), a, None, Memlet::new("A", Subset::parse("0:9").unwrap()))
            .unwrap();
        state
            .add_edge(a, None, b, None, Memlet::new("A", Subset::parse("0:9").unwrap()))
            .unwrap();

        let (reads, writes) = state.read_and_write_sets().unwrap();
        assert!(!reads.contains("A"));
        assert!(writes.contains("A"));
        assert!(writes.contains("B"));
    }

    #[test]
    fn test_read_write_sets_partial_write_does_not_mask() {
        let mut state = DataflowState::new("s");
        let t = state.add_code(
            "produce",
            CodeBlock::expression("out = 1"),
            vec![],
            vec!["out".to_string()],
        );
        let a = state.add_access("A");
        let b = state.add_access("B");
        // Partial write, full read: the read survives
        state
            .add_edge(t, Some("out"), a, None, Memlet::new("A", Subset::parse("0:4").unwrap()))
            .unwrap();
        state
            .add_edge(a, None, b, None, Memlet::new("A", Subset::parse("0:9").unwrap()))
            .unwrap();

        let (reads, writes) = state.read_and_write_sets().unwrap();
        assert!(reads.contains("A"));
        assert!(writes.contains("A"));
    }

    #[test]
    fn test_read_write_sets_independent_subgraphs() {
        let mut state = DataflowState::new("s");

        // Subgraph 1: write A fully, then read into B
        let t = state.add_code(
            "produce",
            CodeBlock::expression("out = 1"),
            vec![],
            vec!["out".to_string()],
        );
        let a1 = state.add_access("A");
        let b = state.add_access("B");
        state
            .add_edge(t, Some("out"), a1, None, Memlet::new("A", Subset::parse("0:9").unwrap()))
            .unwrap();
        state
            .add_edge(a1, None, b, None, Memlet::new("A", Subset::parse("0:9").unwrap()))
            .unwrap();

        // Subgraph 2 (data-independent): read A into C without writing it
        let a2 = state.add_access("A");
        let c = state.add_access("C");
        state
            .add_edge(a2, None, c, None, Memlet::new("A", Subset::parse("0:9").unwrap()))
            .unwrap();

        let (reads, writes) = state.read_and_write_sets().unwrap();
        // The write in subgraph 1 does not mask the read in subgraph 2
        assert!(reads.contains("A"));
        assert!(writes.contains("A"));
        assert!(writes.contains("B"));
        assert!(writes.contains("C"));
    }

    #[test]
    fn test_replace_renames_everywhere() {
        let (mut state, a, ..) = mapped_computation();
        state.replace("A", "A_renamed");

        assert_eq!(state.node(a).unwrap().label(), "A_renamed");
        let renamed_edges = state
            .edge_ids()
            .filter(|e| state.edge(*e).unwrap().memlet.data.as_deref() == Some("A_renamed"))
            .count();
        assert_eq!(renamed_edges, 2);

        // Non-occurrence is silent
        state.replace("missing", "x");
    }

    #[test]
    fn test_add_edge_validates_connectors() {
        let mut state = DataflowState::new("s");
        let a = state.add_access("A");
        let c = state.add_code(
            "t",
            CodeBlock::expression("o = x"),
            vec!["x".to_string()],
            vec!["o".to_string()],
        );

        let err = state.add_edge(
            a,
            None,
            c,
            Some("nope"),
            Memlet::new("A", Subset::parse("0").unwrap()),
        );
        assert!(matches!(err, Err(Error::MissingConnector { .. })));
    }

    #[test]
    fn test_to_dot_contains_nodes() {
        let (state, ..) = mapped_computation();
        let dot = state.to_dot();
        assert!(dot.contains("digraph state"));
        assert!(dot.contains("trapezium"));
        assert!(dot.contains("A[i]"));
    }

    #[test]
    fn test_scope_tree_and_leaves() {
        let (state, _, _, entry, exit, _) = mapped_computation();
        let tree = state.scope_tree().unwrap();

        assert_eq!(tree.len(), 2);
        let top = &tree[&None];
        assert_eq!(top.children, vec![entry]);
        let inner = &tree[&Some(entry)];
        assert_eq!(inner.exit, Some(exit));
        assert_eq!(inner.parent, None);

        assert_eq!(state.scope_leaves().unwrap(), vec![Some(entry)]);
    }
}
