//! Symbol liveness across nested control-flow regions.
//!
//! For a control-flow region, three symbol sets are computed over a
//! breadth-first walk of its blocks: symbols *used* (referenced anywhere),
//! symbols *defined* (assigned by a reachable transition or pre-defined by
//! a loop), and symbols *used before assignment* — referenced on some path
//! before any transition defines them. The latter must not count as locally
//! defined: their value arrives from outside the region.
//!
//! Nested regions contribute their own recursively-computed triple before
//! merging into the parent's sets. Loop regions pre-define their loop
//! variable and correct the body's used-before-assignment set accordingly:
//! a loop condition reading the loop variable is not a use-before-
//! assignment, since initialization happens on the init transition.

use std::collections::BTreeSet;

use crate::control::{ControlBlock, FlowGraph, RegionId, RegionKind};
use crate::dataflow::GraphView;
use crate::graph::algorithms;

/// The liveness triple of one control-flow region.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolLiveness {
    /// Symbols referenced but not defined within the region
    pub free: BTreeSet<String>,
    /// Symbols assigned by some reachable transition or scope
    pub defined: BTreeSet<String>,
    /// Symbols referenced on a path before any transition defines them
    pub used_before_assignment: BTreeSet<String>,
}

/// Computes the symbol liveness of a control-flow region.
///
/// With `all_symbols == false` the used-symbol collection inside states is
/// restricted to symbols requiring materialization as call arguments (see
/// [`GraphView::used_symbols`]).
///
/// Malformed regions (ambiguous start block) fall back to insertion-order
/// traversal rather than failing, matching the tolerant behavior expected
/// by signature queries on graphs still under construction.
///
/// # Arguments
///
/// * `graph` - The owning flow graph
/// * `region` - The region to analyze
/// * `all_symbols` - `false` restricts to argument-relevant symbols
///
/// # Returns
///
/// The region's [`SymbolLiveness`] triple. Unknown region identifiers
/// yield an empty triple.
#[must_use]
pub fn region_symbols(graph: &FlowGraph, region: RegionId, all_symbols: bool) -> SymbolLiveness {
    let mut liveness = SymbolLiveness::default();
    region_symbols_into(graph, region, all_symbols, &mut liveness);

    // Symbols read before any assignment are not locally defined
    liveness.defined = &liveness.defined - &liveness.used_before_assignment;
    liveness.free = &liveness.free - &liveness.defined;
    liveness
}

/// Returns the free symbols of a region.
///
/// See [`region_symbols`].
#[must_use]
pub fn free_symbols(graph: &FlowGraph, region: RegionId) -> BTreeSet<String> {
    region_symbols(graph, region, true).free
}

/// Returns the symbols a region defines.
///
/// See [`region_symbols`].
#[must_use]
pub fn defined_symbols(graph: &FlowGraph, region: RegionId) -> BTreeSet<String> {
    region_symbols(graph, region, true).defined
}

/// Accumulating recursion over the region tree.
///
/// The caller's sets are extended in place; the final
/// defined/used-before-assignment reconciliation happens once at the top in
/// [`region_symbols`].
fn region_symbols_into(
    graph: &FlowGraph,
    region: RegionId,
    all_symbols: bool,
    acc: &mut SymbolLiveness,
) {
    let Some(region_ref) = graph.region(region) else {
        return;
    };

    // Loop regions define their loop variable from the start and read
    // their control expressions
    if let RegionKind::Loop(params) = region_ref.kind() {
        let loop_var = params.loop_variable.clone();
        if let Some(var) = &loop_var {
            acc.defined.insert(var.clone());
        }
        for stmt in [&params.init_statement, &params.update_statement]
            .into_iter()
            .flatten()
        {
            // Only right-hand sides are read; fall back to a full-text scan
            // for statements that are not plain assignments
            match crate::symbolic::Assignment::parse_all(stmt) {
                Some(assignments) => {
                    for assignment in assignments {
                        acc.free.extend(assignment.value.free_symbols());
                    }
                }
                None => acc
                    .free
                    .extend(crate::symbolic::SymbolicExpr::new(stmt.as_str()).free_symbols()),
            }
        }
        acc.free.extend(params.condition.free_symbols());

        // The body is analyzed as its own region; the loop variable is
        // subtracted from its used-before-assignment set unless something
        // outside genuinely read it first
        let mut body = SymbolLiveness::default();
        body_symbols_into(graph, region, all_symbols, &mut body);

        let outside_defined = &acc.defined - &acc.used_before_assignment;
        let mut body_ubas = body.used_before_assignment;
        if let Some(var) = &loop_var {
            body_ubas.remove(var);
        }
        acc.used_before_assignment
            .extend(&body_ubas - &outside_defined);
        acc.free.extend(body.free);
        acc.defined.extend(body.defined);
        return;
    }

    body_symbols_into(graph, region, all_symbols, acc);
}

/// Walks a region's blocks in breadth-first order, merging per-block and
/// per-transition symbol contributions.
fn body_symbols_into(
    graph: &FlowGraph,
    region: RegionId,
    all_symbols: bool,
    acc: &mut SymbolLiveness,
) {
    let Some(region_ref) = graph.region(region) else {
        return;
    };

    let ordered: Vec<crate::graph::NodeId> = match region_ref.start_block() {
        Ok(start) => algorithms::bfs(region_ref.graph(), start).collect(),
        // Failsafe for regions under construction
        Err(_) => region_ref.block_ids().collect(),
    };

    for block_id in ordered {
        let Some(block) = region_ref.block(block_id) else {
            continue;
        };

        // Symbols this block itself uses
        let block_symbols: BTreeSet<String> = match block {
            ControlBlock::State(state) => {
                let symbols = state.used_symbols(graph, all_symbols, false);
                acc.free.extend(symbols.iter().cloned());
                symbols
            }
            ControlBlock::Region(nested) => {
                let mut nested_acc = SymbolLiveness {
                    free: BTreeSet::new(),
                    defined: acc.defined.clone(),
                    used_before_assignment: acc.used_before_assignment.clone(),
                };
                region_symbols_into(graph, *nested, all_symbols, &mut nested_acc);
                acc.free.extend(nested_acc.free.iter().cloned());
                acc.defined.extend(nested_acc.defined);
                acc.used_before_assignment
                    .extend(nested_acc.used_before_assignment);
                nested_acc.free
            }
            ControlBlock::Break { .. }
            | ControlBlock::Continue { .. }
            | ControlBlock::Return { .. } => BTreeSet::new(),
        };

        // Symbols read and defined by the block's outgoing transitions.
        // The truly-read symbols are computed first; assignment targets
        // that are not read anywhere become defined, the rest are flagged
        // as used before assignment.
        for edge_id in region_ref.out_edges(block_id) {
            let Some(edge) = region_ref.edge(edge_id) else {
                continue;
            };
            let mut edge_symbols = edge.used_symbols();

            // A symbol naming a data container pulls in the container's
            // shape symbols
            let container_refs: Vec<String> = edge_symbols
                .iter()
                .filter(|s| graph.container(s).is_some())
                .cloned()
                .collect();
            for name in container_refs {
                if let Some(desc) = graph.container(&name) {
                    edge_symbols.extend(desc.used_symbols(all_symbols));
                }
            }

            let newly_defined: BTreeSet<String> = edge
                .new_symbols()
                .into_iter()
                .filter(|s| !edge_symbols.contains(s) && !block_symbols.contains(s))
                .collect();
            acc.defined.extend(newly_defined);
            acc.used_before_assignment
                .extend(edge_symbols.iter().filter(|s| !acc.defined.contains(*s)).cloned());
            acc.free.extend(edge_symbols);
        }
    }
}
