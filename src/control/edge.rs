//! Inter-state transition edges.
//!
//! Control blocks are connected by conditioned, symbol-assigning
//! transitions. From the current block, out-edges are evaluated in graph
//! order; the first edge whose condition holds fires, applying its
//! assignments before control transfers.

use std::collections::BTreeSet;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::symbolic::SymbolicExpr;

/// A conditioned, symbol-assigning transition between control blocks.
///
/// # Examples
///
/// ```rust
/// use stategraph::control::InterstateEdge;
///
/// let edge = InterstateEdge::new()
///     .with_condition("i < N")
///     .with_assignment("i", "i + 1");
///
/// assert!(!edge.is_unconditional());
/// assert!(edge.used_symbols().contains("N"));
/// assert!(edge.new_symbols().contains("i"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterstateEdge {
    /// Boolean condition guarding the transition; defaults to constant true
    #[serde(default = "SymbolicExpr::always_true")]
    pub condition: SymbolicExpr,
    /// Symbol assignments applied on transition, in declaration order
    #[serde(default)]
    pub assignments: IndexMap<String, SymbolicExpr>,
}

impl Default for InterstateEdge {
    /// An unconditional transition with no assignments.
    fn default() -> Self {
        InterstateEdge::new()
    }
}

impl InterstateEdge {
    /// Creates an unconditional transition with no assignments.
    #[must_use]
    pub fn new() -> Self {
        InterstateEdge {
            condition: SymbolicExpr::always_true(),
            assignments: IndexMap::new(),
        }
    }

    /// Sets the transition condition and returns the edge.
    #[must_use]
    pub fn with_condition(mut self, condition: impl Into<SymbolicExpr>) -> Self {
        self.condition = condition.into();
        self
    }

    /// Adds a symbol assignment and returns the edge.
    #[must_use]
    pub fn with_assignment(
        mut self,
        symbol: impl Into<String>,
        value: impl Into<SymbolicExpr>,
    ) -> Self {
        self.assignments.insert(symbol.into(), value.into());
        self
    }

    /// Returns `true` if the condition is constant true.
    #[must_use]
    pub fn is_unconditional(&self) -> bool {
        self.condition.is_true()
    }

    /// Returns the symbols read by this transition: condition symbols plus
    /// the free symbols of every assignment right-hand side.
    ///
    /// Assignment targets are *not* read; they are reported by
    /// [`new_symbols`](Self::new_symbols).
    #[must_use]
    pub fn used_symbols(&self) -> BTreeSet<String> {
        let mut result = self.condition.free_symbols();
        for value in self.assignments.values() {
            result.extend(value.free_symbols());
        }
        result
    }

    /// Returns the symbols this transition defines (its assignment
    /// targets).
    #[must_use]
    pub fn new_symbols(&self) -> BTreeSet<String> {
        self.assignments.keys().cloned().collect()
    }

    /// Returns the negated condition expression.
    #[must_use]
    pub fn condition_negated(&self) -> SymbolicExpr {
        self.condition.negated()
    }

    /// Renames every whole-identifier occurrence of `old` in the condition,
    /// the assignment values, and the assignment targets.
    pub fn replace(&mut self, old: &str, new: &str) {
        self.condition.replace(old, new);
        let mut renamed = IndexMap::with_capacity(self.assignments.len());
        for (target, mut value) in std::mem::take(&mut self.assignments) {
            value.replace(old, new);
            let target = if target == old { new.to_string() } else { target };
            renamed.insert(target, value);
        }
        self.assignments = renamed;
    }
}

impl fmt::Display for InterstateEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_unconditional() {
            write!(f, "if {}", self.condition)?;
            if !self.assignments.is_empty() {
                f.write_str("; ")?;
            }
        }
        let mut first = true;
        for (target, value) in &self.assignments {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{target} = {value}")?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_unconditional() {
        let edge = InterstateEdge::new();
        assert!(edge.is_unconditional());
        assert!(edge.used_symbols().is_empty());
        assert!(edge.new_symbols().is_empty());
    }

    #[test]
    fn test_used_and_new_symbols() {
        let edge = InterstateEdge::new()
            .with_condition("i < N")
            .with_assignment("j", "i * 2");

        let used = edge.used_symbols();
        assert!(used.contains("i"));
        assert!(used.contains("N"));
        // The target is defined, not read
        assert!(!used.contains("j"));
        assert_eq!(edge.new_symbols().into_iter().collect::<Vec<_>>(), vec!["j"]);
    }

    #[test]
    fn test_condition_negated() {
        let edge = InterstateEdge::new().with_condition("i < 10");
        assert_eq!(edge.condition_negated().as_str(), "not (i < 10)");
    }

    #[test]
    fn test_replace() {
        let mut edge = InterstateEdge::new()
            .with_condition("i < N")
            .with_assignment("i", "i + 1");
        edge.replace("i", "k");

        assert_eq!(edge.condition.as_str(), "k < N");
        assert_eq!(edge.assignments.get("k").unwrap().as_str(), "k + 1");
        assert!(!edge.assignments.contains_key("i"));
    }

    #[test]
    fn test_display() {
        let edge = InterstateEdge::new()
            .with_condition("i < N")
            .with_assignment("i", "i + 1");
        assert_eq!(edge.to_string(), "if i < N; i = i + 1");

        assert_eq!(InterstateEdge::new().to_string(), "");
    }
}
