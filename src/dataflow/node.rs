//! Dataflow node taxonomy.
//!
//! Nodes inside a dataflow state come in five kinds, realized as one closed
//! sum type so that every graph algorithm matches exhaustively: access nodes
//! naming data containers, code nodes with named connectors, paired scope
//! entry/exit markers delimiting parallel iteration scopes, and nested-graph
//! nodes embedding an entire IR instance.
//!
//! # Connector Naming Invariant
//!
//! Edges entering or leaving scope entry/exit nodes use structured connector
//! names: incoming connectors are prefixed `IN_`, outgoing `OUT_`, and a
//! matching `<id>` denotes data passing through the scope unchanged. All
//! data-movement path and tree tracing relies on this convention; the
//! [`is_in_connector`], [`is_out_connector`], [`connector_id`],
//! [`matching_in`], and [`matching_out`] helpers implement it in one place.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::control::FlowGraph;
use crate::data::ScheduleKind;
use crate::symbolic::{Subset, SymbolicExpr};

/// Prefix of connectors receiving data into a scope node.
pub const IN_PREFIX: &str = "IN_";

/// Prefix of connectors passing data out of a scope node.
pub const OUT_PREFIX: &str = "OUT_";

/// Returns `true` if the connector name follows the `IN_<id>` convention.
#[must_use]
pub fn is_in_connector(name: &str) -> bool {
    name.starts_with(IN_PREFIX)
}

/// Returns `true` if the connector name follows the `OUT_<id>` convention.
#[must_use]
pub fn is_out_connector(name: &str) -> bool {
    name.starts_with(OUT_PREFIX)
}

/// Extracts the scope-passthrough id from an `IN_<id>` or `OUT_<id>`
/// connector name.
#[must_use]
pub fn connector_id(name: &str) -> Option<&str> {
    name.strip_prefix(IN_PREFIX)
        .or_else(|| name.strip_prefix(OUT_PREFIX))
}

/// Returns the `OUT_<id>` connector pairing with an `IN_<id>` connector.
#[must_use]
pub fn matching_out(in_connector: &str) -> Option<String> {
    in_connector
        .strip_prefix(IN_PREFIX)
        .map(|id| format!("{OUT_PREFIX}{id}"))
}

/// Returns the `IN_<id>` connector pairing with an `OUT_<id>` connector.
#[must_use]
pub fn matching_in(out_connector: &str) -> Option<String> {
    out_connector
        .strip_prefix(OUT_PREFIX)
        .map(|id| format!("{IN_PREFIX}{id}"))
}

/// A node naming a data container being read or written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessNode {
    /// Name of the referenced data container
    pub data: String,
}

/// Language of a code node's implementation.
///
/// The distinction drives argument inference: `Native` code references
/// symbols by name at runtime, so every symbol it uses must be materialized
/// as an explicit call argument. `Expression` code is resolved structurally
/// by the graph and needs no materialization of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CodeLanguage {
    /// Declarative expression lowered by the graph itself
    #[default]
    Expression,
    /// Opaque native code emitted verbatim by a code generator
    Native,
}

/// A unit of executable code with its language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBlock {
    /// The code text
    pub text: String,
    /// Language of the code text
    pub language: CodeLanguage,
}

impl CodeBlock {
    /// Creates a declarative expression code block.
    pub fn expression(text: impl Into<String>) -> Self {
        CodeBlock {
            text: text.into(),
            language: CodeLanguage::Expression,
        }
    }

    /// Creates a native code block.
    pub fn native(text: impl Into<String>) -> Self {
        CodeBlock {
            text: text.into(),
            language: CodeLanguage::Native,
        }
    }

    /// Extracts the free symbols of the code text.
    #[must_use]
    pub fn free_symbols(&self) -> BTreeSet<String> {
        SymbolicExpr::new(self.text.as_str()).free_symbols()
    }
}

/// A node representing a unit of executable logic with named connectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeNode {
    /// Display label of the node
    pub label: String,
    /// The executed code
    pub code: CodeBlock,
    /// Named input connectors
    pub in_connectors: BTreeSet<String>,
    /// Named output connectors
    pub out_connectors: BTreeSet<String>,
    /// `true` if the code has effects beyond its output connectors
    pub side_effects: bool,
}

impl CodeNode {
    /// Creates a code node with the given connectors.
    pub fn new(
        label: impl Into<String>,
        code: CodeBlock,
        in_connectors: impl IntoIterator<Item = String>,
        out_connectors: impl IntoIterator<Item = String>,
    ) -> Self {
        CodeNode {
            label: label.into(),
            code,
            in_connectors: in_connectors.into_iter().collect(),
            out_connectors: out_connectors.into_iter().collect(),
            side_effects: false,
        }
    }

    /// Extracts the code's free symbols, excluding connector names.
    #[must_use]
    pub fn free_symbols(&self) -> BTreeSet<String> {
        let mut result = self.code.free_symbols();
        for conn in self.in_connectors.iter().chain(self.out_connectors.iter()) {
            result.remove(conn);
        }
        result
    }
}

/// A node opening a parallel iteration scope.
///
/// The entry node defines its iteration parameters as new symbols visible to
/// every node inside the scope; the matching [`ScopeExitNode`] closes the
/// scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeEntryNode {
    /// Display label of the scope
    pub label: String,
    /// Iteration parameters defined by the scope
    pub params: Vec<String>,
    /// Iteration range, one dimension per parameter
    pub range: Subset,
    /// Execution schedule of the scope
    pub schedule: ScheduleKind,
    /// Named input connectors (`IN_<id>` for passthrough data)
    pub in_connectors: BTreeSet<String>,
    /// Named output connectors (`OUT_<id>` for passthrough data)
    pub out_connectors: BTreeSet<String>,
}

impl ScopeEntryNode {
    /// Returns the symbols newly defined inside the scope (its parameters).
    #[must_use]
    pub fn new_symbols(&self) -> BTreeSet<String> {
        self.params.iter().cloned().collect()
    }

    /// Extracts the free symbols of the iteration range.
    #[must_use]
    pub fn free_symbols(&self) -> BTreeSet<String> {
        self.range.free_symbols()
    }
}

/// A node closing a parallel iteration scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeExitNode {
    /// Display label, conventionally derived from the entry label
    pub label: String,
    /// Named input connectors
    pub in_connectors: BTreeSet<String>,
    /// Named output connectors
    pub out_connectors: BTreeSet<String>,
}

/// A node embedding an entire nested IR instance.
///
/// The symbol mapping assigns to each symbol of the nested graph (key) an
/// expression over the outer graph's symbols (value).
#[derive(Debug, Clone)]
pub struct NestedGraphNode {
    /// Display label of the node
    pub label: String,
    /// The embedded IR instance
    pub graph: Box<FlowGraph>,
    /// Inner symbol name to outer expression
    pub symbol_mapping: IndexMap<String, SymbolicExpr>,
    /// Named input connectors (one per consumed container)
    pub in_connectors: BTreeSet<String>,
    /// Named output connectors (one per produced container)
    pub out_connectors: BTreeSet<String>,
}

impl NestedGraphNode {
    /// Extracts the free symbols of this node.
    ///
    /// These are the outer-graph symbols appearing in the symbol-mapping
    /// expressions, plus any free symbols of the nested graph that the
    /// mapping does not cover. With `keep_defined_in_mapping`, mapped
    /// symbols are reported as free as well (used when the caller intends
    /// to re-bind the mapping).
    #[must_use]
    pub fn used_symbols(&self, all_symbols: bool, keep_defined_in_mapping: bool) -> BTreeSet<String> {
        let mut result = BTreeSet::new();
        for outer in self.symbol_mapping.values() {
            result.extend(outer.free_symbols());
        }
        let inner_free = self.graph.used_symbols(all_symbols);
        for sym in inner_free {
            if keep_defined_in_mapping || !self.symbol_mapping.contains_key(&sym) {
                result.insert(sym);
            }
        }
        result
    }
}

/// A node of a dataflow state.
///
/// The closed set of node kinds; every algorithm over states matches this
/// enum exhaustively, so an added kind surfaces as a compile error at each
/// site that needs a decision.
#[derive(Debug, Clone)]
pub enum DataflowNode {
    /// A data container access
    Access(AccessNode),
    /// A unit of executable code
    Code(CodeNode),
    /// A scope-opening marker
    ScopeEntry(ScopeEntryNode),
    /// A scope-closing marker
    ScopeExit(ScopeExitNode),
    /// An embedded nested IR instance
    Nested(NestedGraphNode),
}

impl DataflowNode {
    /// Creates an access node for the given container.
    pub fn access(data: impl Into<String>) -> Self {
        DataflowNode::Access(AccessNode { data: data.into() })
    }

    /// Returns the display label of the node.
    ///
    /// Access nodes are labeled by their container name.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            DataflowNode::Access(n) => &n.data,
            DataflowNode::Code(n) => &n.label,
            DataflowNode::ScopeEntry(n) => &n.label,
            DataflowNode::ScopeExit(n) => &n.label,
            DataflowNode::Nested(n) => &n.label,
        }
    }

    /// Returns `true` for access nodes.
    #[must_use]
    pub const fn is_access(&self) -> bool {
        matches!(self, DataflowNode::Access(_))
    }

    /// Returns `true` for code nodes.
    #[must_use]
    pub const fn is_code(&self) -> bool {
        matches!(self, DataflowNode::Code(_))
    }

    /// Returns `true` for scope entry nodes.
    #[must_use]
    pub const fn is_entry(&self) -> bool {
        matches!(self, DataflowNode::ScopeEntry(_))
    }

    /// Returns `true` for scope exit nodes.
    #[must_use]
    pub const fn is_exit(&self) -> bool {
        matches!(self, DataflowNode::ScopeExit(_))
    }

    /// Returns `true` for scope entry and exit nodes.
    #[must_use]
    pub const fn is_scope_node(&self) -> bool {
        matches!(self, DataflowNode::ScopeEntry(_) | DataflowNode::ScopeExit(_))
    }

    /// Returns `true` for nested-graph nodes.
    #[must_use]
    pub const fn is_nested(&self) -> bool {
        matches!(self, DataflowNode::Nested(_))
    }

    /// Returns `true` for nodes that terminate data-movement paths
    /// (access, code, and nested-graph nodes; scope markers are traversed
    /// through).
    #[must_use]
    pub const fn terminates_paths(&self) -> bool {
        matches!(
            self,
            DataflowNode::Access(_) | DataflowNode::Code(_) | DataflowNode::Nested(_)
        )
    }

    /// Returns the node's input connectors, if the kind carries any.
    #[must_use]
    pub fn in_connectors(&self) -> Option<&BTreeSet<String>> {
        match self {
            DataflowNode::Access(_) => None,
            DataflowNode::Code(n) => Some(&n.in_connectors),
            DataflowNode::ScopeEntry(n) => Some(&n.in_connectors),
            DataflowNode::ScopeExit(n) => Some(&n.in_connectors),
            DataflowNode::Nested(n) => Some(&n.in_connectors),
        }
    }

    /// Returns the node's output connectors, if the kind carries any.
    #[must_use]
    pub fn out_connectors(&self) -> Option<&BTreeSet<String>> {
        match self {
            DataflowNode::Access(_) => None,
            DataflowNode::Code(n) => Some(&n.out_connectors),
            DataflowNode::ScopeEntry(n) => Some(&n.out_connectors),
            DataflowNode::ScopeExit(n) => Some(&n.out_connectors),
            DataflowNode::Nested(n) => Some(&n.out_connectors),
        }
    }

    /// Returns `true` if the node has the named input connector.
    ///
    /// Access nodes accept only connector-less attachments.
    #[must_use]
    pub fn has_in_connector(&self, name: &str) -> bool {
        self.in_connectors().is_some_and(|c| c.contains(name))
    }

    /// Returns `true` if the node has the named output connector.
    #[must_use]
    pub fn has_out_connector(&self, name: &str) -> bool {
        self.out_connectors().is_some_and(|c| c.contains(name))
    }

    /// Registers a passthrough connector pair `IN_<id>`/`OUT_<id>` on a
    /// scope node. No-op for other kinds.
    pub fn add_scope_connectors(&mut self, id: &str) {
        let (ins, outs) = match self {
            DataflowNode::ScopeEntry(n) => (&mut n.in_connectors, &mut n.out_connectors),
            DataflowNode::ScopeExit(n) => (&mut n.in_connectors, &mut n.out_connectors),
            _ => return,
        };
        ins.insert(format!("{IN_PREFIX}{id}"));
        outs.insert(format!("{OUT_PREFIX}{id}"));
    }

    /// Renames every occurrence of a symbol or container name in this node.
    ///
    /// Fails silently on non-occurrence.
    pub fn replace(&mut self, old: &str, new: &str) {
        match self {
            DataflowNode::Access(n) => {
                if n.data == old {
                    n.data = new.to_string();
                }
            }
            DataflowNode::Code(n) => {
                let mut expr = SymbolicExpr::new(n.code.text.as_str());
                expr.replace(old, new);
                n.code.text = expr.as_str().to_string();
            }
            DataflowNode::ScopeEntry(n) => {
                for param in &mut n.params {
                    if param == old {
                        *param = new.to_string();
                    }
                }
                n.range.replace(old, new);
            }
            DataflowNode::ScopeExit(_) => {}
            DataflowNode::Nested(n) => {
                for outer in n.symbol_mapping.values_mut() {
                    outer.replace(old, new);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connector_convention() {
        assert!(is_in_connector("IN_A"));
        assert!(is_out_connector("OUT_A"));
        assert!(!is_in_connector("OUT_A"));
        assert!(!is_out_connector("data"));

        assert_eq!(connector_id("IN_A"), Some("A"));
        assert_eq!(connector_id("OUT_A"), Some("A"));
        assert_eq!(connector_id("data"), None);

        assert_eq!(matching_out("IN_A").as_deref(), Some("OUT_A"));
        assert_eq!(matching_in("OUT_A").as_deref(), Some("IN_A"));
        assert_eq!(matching_out("x"), None);
    }

    #[test]
    fn test_code_node_free_symbols_exclude_connectors() {
        let node = CodeNode::new(
            "mul",
            CodeBlock::expression("out = a * alpha"),
            vec!["a".to_string()],
            vec!["out".to_string()],
        );
        let syms = node.free_symbols();
        assert!(syms.contains("alpha"));
        assert!(!syms.contains("a"));
        assert!(!syms.contains("out"));
    }

    #[test]
    fn test_scope_entry_symbols() {
        let entry = ScopeEntryNode {
            label: "map".to_string(),
            params: vec!["i".to_string()],
            range: Subset::parse("0:N - 1").unwrap(),
            schedule: ScheduleKind::Parallel,
            in_connectors: BTreeSet::new(),
            out_connectors: BTreeSet::new(),
        };
        assert!(entry.new_symbols().contains("i"));
        assert!(entry.free_symbols().contains("N"));
    }

    #[test]
    fn test_add_scope_connectors() {
        let mut node = DataflowNode::ScopeEntry(ScopeEntryNode {
            label: "map".to_string(),
            params: vec![],
            range: Subset::parse("0:9").unwrap(),
            schedule: ScheduleKind::Parallel,
            in_connectors: BTreeSet::new(),
            out_connectors: BTreeSet::new(),
        });
        node.add_scope_connectors("A");
        assert!(node.has_in_connector("IN_A"));
        assert!(node.has_out_connector("OUT_A"));

        // No-op on access nodes
        let mut access = DataflowNode::access("A");
        access.add_scope_connectors("A");
        assert!(access.in_connectors().is_none());
    }

    #[test]
    fn test_node_replace() {
        let mut node = DataflowNode::access("A");
        node.replace("A", "B");
        assert_eq!(node.label(), "B");

        let mut code = DataflowNode::Code(CodeNode::new(
            "t",
            CodeBlock::expression("out = x + N"),
            vec!["x".to_string()],
            vec!["out".to_string()],
        ));
        code.replace("N", "M");
        if let DataflowNode::Code(n) = &code {
            assert_eq!(n.code.text, "out = x + M");
        } else {
            unreachable!();
        }
    }

    #[test]
    fn test_kind_predicates() {
        let access = DataflowNode::access("A");
        assert!(access.is_access());
        assert!(access.terminates_paths());
        assert!(!access.is_scope_node());
    }
}
