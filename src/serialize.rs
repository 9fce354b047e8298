//! Persisted document representation.
//!
//! A whole IR instance serializes to a tree of typed records: regions hold
//! block records and transition triples `(src, dst, payload)` over dense
//! block indices; states hold node records, data-movement triples, and a
//! `scope_dict` side-table mapping scope-entry indices to contained node
//! indices. The document round-trips one complete graph including nested
//! sub-graphs; arena tombstones are compacted away on save, so a reloaded
//! graph is isomorphic rather than identifier-identical.
//!
//! # Examples
//!
//! ```rust
//! use stategraph::control::FlowGraph;
//!
//! let mut graph = FlowGraph::new("program");
//! graph.add_state(FlowGraph::ROOT, "compute", true).unwrap();
//!
//! let json = graph.to_json().unwrap();
//! let reloaded = FlowGraph::from_json(&json).unwrap();
//! assert_eq!(reloaded.name(), "program");
//! assert_eq!(reloaded.all_states().len(), 1);
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::control::{ControlBlock, FlowGraph, InterstateEdge, RegionId, RegionKind};
use crate::data::{ConstantValue, DataDescriptor, ElementType};
use crate::dataflow::{
    AccessNode, CodeNode, DataflowNode, DataflowState, MemletEdge, NestedGraphNode,
    ScopeEntryNode, ScopeExitNode,
};
use crate::graph::NodeId;
use crate::symbolic::SymbolicExpr;
use crate::{Error, Result};

/// Version tag of the persisted format.
pub const FORMAT_VERSION: u32 = 1;

/// Serialized form of a whole [`FlowGraph`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowGraphDoc {
    /// Persisted format version; see [`FORMAT_VERSION`]
    pub version: u32,
    /// Graph name
    pub name: String,
    /// Container registry
    pub containers: IndexMap<String, DataDescriptor>,
    /// Symbol table
    pub symbols: IndexMap<String, ElementType>,
    /// Constant table
    pub constants: IndexMap<String, ConstantValue>,
    /// The root control-flow region
    pub root: RegionDoc,
}

/// Serialized form of one control-flow region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionDoc {
    /// Region label
    pub label: String,
    /// Region kind, including loop parameters for loops
    pub kind: RegionKind,
    /// Block records; transition endpoints index into this list
    pub blocks: Vec<BlockDoc>,
    /// Transitions as `(src, dst, payload)` triples over block indices
    pub edges: Vec<InterstateEdgeDoc>,
    /// Manual start-block override, as a block index
    pub start_block: Option<usize>,
}

/// One serialized transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterstateEdgeDoc {
    /// Source block index
    pub src: usize,
    /// Destination block index
    pub dst: usize,
    /// Transition payload
    pub data: InterstateEdge,
}

/// Serialized form of one control block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BlockDoc {
    /// A dataflow state
    State(StateDoc),
    /// A nested control-flow region
    Region(RegionDoc),
    /// A break terminator
    Break {
        /// Block label
        label: String,
    },
    /// A continue terminator
    Continue {
        /// Block label
        label: String,
    },
    /// A return terminator
    Return {
        /// Block label
        label: String,
    },
}

/// Serialized form of one dataflow state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateDoc {
    /// State label
    pub label: String,
    /// Node records; edge endpoints index into this list
    pub nodes: Vec<NodeDoc>,
    /// Data movements as `(src, dst, payload)` triples over node indices
    pub edges: Vec<MemletEdgeDoc>,
    /// Scope side-table: scope-entry node index to directly contained node
    /// indices. Emitted for consumers; recomputed (not trusted) on load.
    #[serde(default, skip_deserializing)]
    pub scope_dict: BTreeMap<usize, Vec<usize>>,
}

/// One serialized data-movement edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemletEdgeDoc {
    /// Source node index
    pub src: usize,
    /// Destination node index
    pub dst: usize,
    /// Edge payload: memlet plus connectors
    pub data: MemletEdge,
}

/// Serialized form of one dataflow node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NodeDoc {
    /// A data container access
    Access(AccessNode),
    /// A unit of executable code
    Code(CodeNode),
    /// A scope-opening marker
    ScopeEntry(ScopeEntryNode),
    /// A scope-closing marker
    ScopeExit(ScopeExitNode),
    /// An embedded nested IR instance
    Nested(NestedGraphDoc),
}

/// Serialized form of a nested-graph node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NestedGraphDoc {
    /// Node label
    pub label: String,
    /// The embedded graph
    pub graph: FlowGraphDoc,
    /// Inner symbol name to outer expression
    pub symbol_mapping: IndexMap<String, SymbolicExpr>,
    /// Named input connectors
    pub in_connectors: BTreeSet<String>,
    /// Named output connectors
    pub out_connectors: BTreeSet<String>,
}

impl FlowGraph {
    /// Builds the persisted document for this graph.
    #[must_use]
    pub fn to_doc(&self) -> FlowGraphDoc {
        trace!(graph = %self.name(), "serializing flow graph");
        FlowGraphDoc {
            version: FORMAT_VERSION,
            name: self.name().to_string(),
            containers: self.containers().clone(),
            symbols: self.symbols().clone(),
            constants: self.constants().clone(),
            root: region_to_doc(self, FlowGraph::ROOT),
        }
    }

    /// Reconstructs a graph from its persisted document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`]-adjacent graph errors when block or
    /// node indices are out of range.
    pub fn from_doc(doc: FlowGraphDoc) -> Result<FlowGraph> {
        let mut graph = FlowGraph::new(doc.name);
        for (name, desc) in doc.containers {
            graph.add_container(name, desc)?;
        }
        for (name, dtype) in doc.symbols {
            graph.add_symbol(name, dtype);
        }
        for (name, value) in doc.constants {
            graph.add_constant(name, value);
        }
        let RegionDoc {
            label,
            kind,
            blocks,
            edges,
            start_block,
        } = doc.root;
        if let Some(root) = graph.region_mut(FlowGraph::ROOT) {
            root.set_label(label);
            if let RegionKind::Loop(_) = kind {
                return Err(Error::GraphError(
                    "The root region cannot be a loop".to_string(),
                ));
            }
        }
        fill_region(&mut graph, FlowGraph::ROOT, blocks, edges, start_block)?;
        Ok(graph)
    }

    /// Serializes this graph to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] on encoding failure.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_doc())?)
    }

    /// Reconstructs a graph from its JSON form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] on malformed JSON and graph errors
    /// on inconsistent indices.
    pub fn from_json(json: &str) -> Result<FlowGraph> {
        let doc: FlowGraphDoc = serde_json::from_str(json)?;
        FlowGraph::from_doc(doc)
    }
}

impl DataflowState {
    /// Builds the persisted document for this state.
    ///
    /// The `scope_dict` side-table is filled from the computed scope
    /// children when the state is well-formed and left empty otherwise.
    #[must_use]
    pub fn to_doc(&self) -> StateDoc {
        let order: Vec<NodeId> = self.node_ids().collect();
        let dense: HashMap<NodeId, usize> =
            order.iter().enumerate().map(|(i, n)| (*n, i)).collect();

        let nodes = order
            .iter()
            .map(|id| node_to_doc(self.node(*id).unwrap()))
            .collect();

        let edges = self
            .edge_ids()
            .map(|e| {
                let (src, dst) = self.edge_endpoints(e).unwrap();
                MemletEdgeDoc {
                    src: dense[&src],
                    dst: dense[&dst],
                    data: self.edge(e).unwrap().clone(),
                }
            })
            .collect();

        let mut scope_dict = BTreeMap::new();
        if let Ok(children) = self.scope_children() {
            for (scope, contained) in children {
                if let Some(entry) = scope {
                    scope_dict.insert(
                        dense[entry],
                        contained.iter().map(|n| dense[n]).collect(),
                    );
                }
            }
        }

        StateDoc {
            label: self.label().to_string(),
            nodes,
            edges,
            scope_dict,
        }
    }

    /// Reconstructs a state from its persisted document.
    ///
    /// The scope side-table is ignored; scope nesting is recomputed lazily
    /// on the next query.
    ///
    /// # Errors
    ///
    /// Returns graph errors on out-of-range node indices or connector
    /// mismatches.
    pub fn from_doc(doc: StateDoc) -> Result<DataflowState> {
        let mut state = DataflowState::new(doc.label);
        let mut ids = Vec::with_capacity(doc.nodes.len());
        for node in doc.nodes {
            ids.push(state.add_node(node_from_doc(node)?));
        }
        for edge in doc.edges {
            let src = *ids.get(edge.src).ok_or_else(|| {
                Error::GraphError(format!("Edge source index {} out of range", edge.src))
            })?;
            let dst = *ids.get(edge.dst).ok_or_else(|| {
                Error::GraphError(format!("Edge destination index {} out of range", edge.dst))
            })?;
            state.add_edge(
                src,
                edge.data.src_conn.as_deref(),
                dst,
                edge.data.dst_conn.as_deref(),
                edge.data.memlet,
            )?;
        }
        Ok(state)
    }
}

fn node_to_doc(node: &DataflowNode) -> NodeDoc {
    match node {
        DataflowNode::Access(n) => NodeDoc::Access(n.clone()),
        DataflowNode::Code(n) => NodeDoc::Code(n.clone()),
        DataflowNode::ScopeEntry(n) => NodeDoc::ScopeEntry(n.clone()),
        DataflowNode::ScopeExit(n) => NodeDoc::ScopeExit(n.clone()),
        DataflowNode::Nested(n) => NodeDoc::Nested(NestedGraphDoc {
            label: n.label.clone(),
            graph: n.graph.to_doc(),
            symbol_mapping: n.symbol_mapping.clone(),
            in_connectors: n.in_connectors.clone(),
            out_connectors: n.out_connectors.clone(),
        }),
    }
}

fn node_from_doc(doc: NodeDoc) -> Result<DataflowNode> {
    Ok(match doc {
        NodeDoc::Access(n) => DataflowNode::Access(n),
        NodeDoc::Code(n) => DataflowNode::Code(n),
        NodeDoc::ScopeEntry(n) => DataflowNode::ScopeEntry(n),
        NodeDoc::ScopeExit(n) => DataflowNode::ScopeExit(n),
        NodeDoc::Nested(n) => DataflowNode::Nested(NestedGraphNode {
            label: n.label,
            graph: Box::new(FlowGraph::from_doc(n.graph)?),
            symbol_mapping: n.symbol_mapping,
            in_connectors: n.in_connectors,
            out_connectors: n.out_connectors,
        }),
    })
}

fn region_to_doc(graph: &FlowGraph, id: RegionId) -> RegionDoc {
    let region = graph.region(id).expect("live region id");
    let order: Vec<NodeId> = region.block_ids().collect();
    let dense: HashMap<NodeId, usize> = order.iter().enumerate().map(|(i, n)| (*n, i)).collect();

    let blocks = order
        .iter()
        .map(|b| match region.block(*b).unwrap() {
            ControlBlock::State(state) => BlockDoc::State(state.to_doc()),
            ControlBlock::Region(rid) => BlockDoc::Region(region_to_doc(graph, *rid)),
            ControlBlock::Break { label } => BlockDoc::Break {
                label: label.clone(),
            },
            ControlBlock::Continue { label } => BlockDoc::Continue {
                label: label.clone(),
            },
            ControlBlock::Return { label } => BlockDoc::Return {
                label: label.clone(),
            },
        })
        .collect();

    let edges = region
        .edges()
        .map(|(_, src, dst, data)| InterstateEdgeDoc {
            src: dense[&src],
            dst: dense[&dst],
            data: data.clone(),
        })
        .collect();

    RegionDoc {
        label: region.label().to_string(),
        kind: region.kind().clone(),
        blocks,
        edges,
        start_block: region.start_override().map(|b| dense[&b]),
    }
}

fn fill_region(
    graph: &mut FlowGraph,
    id: RegionId,
    blocks: Vec<BlockDoc>,
    edges: Vec<InterstateEdgeDoc>,
    start_block: Option<usize>,
) -> Result<()> {
    let mut ids: Vec<NodeId> = Vec::with_capacity(blocks.len());
    for block in blocks {
        let node_id = match block {
            BlockDoc::State(sdoc) => {
                let state = DataflowState::from_doc(sdoc)?;
                graph
                    .region_mut(id)
                    .ok_or_else(|| Error::GraphError(format!("Region {id} does not exist")))?
                    .add_block(ControlBlock::State(state), false)
            }
            BlockDoc::Region(rdoc) => {
                let RegionDoc {
                    label,
                    kind,
                    blocks,
                    edges,
                    start_block,
                } = rdoc;
                let rid = match kind {
                    RegionKind::Sequence => graph.add_region(id, label, false)?,
                    RegionKind::Loop(params) => graph.add_loop_region(id, label, params, false)?,
                };
                fill_region(graph, rid, blocks, edges, start_block)?;
                block_node_of(graph, id, rid)?
            }
            BlockDoc::Break { label } => region_checked(graph, id)?.add_break(label),
            BlockDoc::Continue { label } => region_checked(graph, id)?.add_continue(label),
            BlockDoc::Return { label } => region_checked(graph, id)?.add_return(label),
        };
        ids.push(node_id);
    }

    for edge in edges {
        let src = *ids.get(edge.src).ok_or_else(|| {
            Error::GraphError(format!("Transition source index {} out of range", edge.src))
        })?;
        let dst = *ids.get(edge.dst).ok_or_else(|| {
            Error::GraphError(format!(
                "Transition destination index {} out of range",
                edge.dst
            ))
        })?;
        region_checked(graph, id)?.add_edge(src, dst, edge.data)?;
    }

    if let Some(start) = start_block {
        let block = *ids.get(start).ok_or_else(|| {
            Error::GraphError(format!("Start block index {start} out of range"))
        })?;
        region_checked(graph, id)?.set_start_block(block)?;
    }
    Ok(())
}

fn region_checked(graph: &mut FlowGraph, id: RegionId) -> Result<&mut crate::control::ControlRegion> {
    graph
        .region_mut(id)
        .ok_or_else(|| Error::GraphError(format!("Region {id} does not exist")))
}

fn block_node_of(graph: &FlowGraph, parent: RegionId, id: RegionId) -> Result<NodeId> {
    let region = graph
        .region(parent)
        .ok_or_else(|| Error::GraphError(format!("Region {parent} does not exist")))?;
    region
        .block_ids()
        .find(|b| region.block(*b).and_then(ControlBlock::region_id) == Some(id))
        .ok_or_else(|| consistency_error!("Region {} not referenced by its parent graph", id))
}
