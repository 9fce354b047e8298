//! Symbolic expressions, assignments, and index subsets.
//!
//! Conditions on inter-state transitions, assignment right-hand sides, scope
//! iteration ranges, and memlet subsets are all *symbolic*: textual
//! expressions over named symbols that the IR never evaluates numerically.
//! What the IR does need is structural insight — which symbols an expression
//! references, whether a statement is a simple assignment, whether one index
//! range provably contains another — and that is what this module provides.
//!
//! # Key Types
//!
//! - [`SymbolicExpr`] - A canonicalized expression string with free-symbol
//!   extraction and whole-identifier renaming
//! - [`Assignment`] - A parsed `name = expr` statement (the structural
//!   precondition for loop inlining)
//! - [`Subset`] / [`Range`](subset::Range) - N-dimensional symbolic index
//!   sets with a conservative containment test
//!
//! # Examples
//!
//! ```rust
//! use stategraph::symbolic::{Assignment, SymbolicExpr};
//!
//! let cond = SymbolicExpr::new("i < N");
//! let free = cond.free_symbols();
//! let syms: Vec<&str> = free.iter().map(String::as_str).collect();
//! assert_eq!(syms, vec!["N", "i"]);
//!
//! let update = Assignment::parse("i = i + 1").unwrap();
//! assert_eq!(update.target, "i");
//! ```

pub mod subset;

pub use subset::{Range, Subset};

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Words that the free-symbol scanner never reports as symbols.
///
/// Boolean literals, word operators, and the arithmetic builtins recognized
/// by expression lowering.
const RESERVED_WORDS: &[&str] = &[
    "and", "or", "not", "true", "false", "True", "False", "min", "max", "abs", "int", "float",
    "floor", "ceil",
];

/// A symbolic expression over named symbols.
///
/// The expression is stored as a canonicalized (whitespace-trimmed) string.
/// Equality is textual; two algebraically equal but differently written
/// expressions compare unequal, which is exactly the conservative behavior
/// the containment and masking rules rely on.
///
/// # Examples
///
/// ```rust
/// use stategraph::symbolic::SymbolicExpr;
///
/// let mut expr = SymbolicExpr::new("i * N + 1");
/// assert!(expr.free_symbols().contains("N"));
///
/// expr.replace("N", "size");
/// assert_eq!(expr.as_str(), "i * size + 1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolicExpr {
    text: String,
}

impl SymbolicExpr {
    /// Creates a new symbolic expression from a string.
    ///
    /// Leading and trailing whitespace is trimmed; the interior is kept
    /// verbatim.
    pub fn new(text: impl Into<String>) -> Self {
        let text: String = text.into();
        SymbolicExpr {
            text: text.trim().to_string(),
        }
    }

    /// Returns the canonical constant-true expression (`1`).
    ///
    /// Inter-state transitions default to this condition.
    #[must_use]
    pub fn always_true() -> Self {
        SymbolicExpr::new("1")
    }

    /// Returns the expression text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Returns `true` if this expression is one of the constant-true forms
    /// (`1`, `true`, `True`).
    #[must_use]
    pub fn is_true(&self) -> bool {
        matches!(self.text.as_str(), "1" | "true" | "True")
    }

    /// Returns `true` if the expression text is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Attempts to interpret the expression as a literal integer.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        self.text.parse::<i64>().ok()
    }

    /// Returns the logical negation of this expression.
    ///
    /// Constant-true forms negate to `0`; everything else is wrapped as
    /// `not (expr)`.
    #[must_use]
    pub fn negated(&self) -> Self {
        if self.is_true() {
            SymbolicExpr::new("0")
        } else {
            SymbolicExpr::new(format!("not ({})", self.text))
        }
    }

    /// Extracts the free symbols referenced by this expression.
    ///
    /// Symbols are maximal identifier tokens (`[A-Za-z_][A-Za-z0-9_]*`);
    /// numeric literals, string literals, and the reserved word-operators
    /// and builtins are skipped.
    ///
    /// # Returns
    ///
    /// The set of referenced symbol names, ordered lexicographically.
    #[must_use]
    pub fn free_symbols(&self) -> BTreeSet<String> {
        let mut result = BTreeSet::new();
        for token in tokenize_identifiers(&self.text) {
            if !RESERVED_WORDS.contains(&token) {
                result.insert(token.to_string());
            }
        }
        result
    }

    /// Renames every whole-identifier occurrence of `old` to `new`.
    ///
    /// Partial matches inside longer identifiers are left untouched. Does
    /// nothing if `old` does not occur.
    pub fn replace(&mut self, old: &str, new: &str) {
        if !tokenize_identifiers(&self.text).any(|t| t == old) {
            return;
        }

        let mut result = String::with_capacity(self.text.len());
        let mut rest = self.text.as_str();
        while !rest.is_empty() {
            match next_identifier(rest) {
                Some((start, len)) => {
                    result.push_str(&rest[..start]);
                    let ident = &rest[start..start + len];
                    result.push_str(if ident == old { new } else { ident });
                    rest = &rest[start + len..];
                }
                None => {
                    result.push_str(rest);
                    break;
                }
            }
        }
        self.text = result;
    }
}

impl fmt::Display for SymbolicExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl From<&str> for SymbolicExpr {
    fn from(text: &str) -> Self {
        SymbolicExpr::new(text)
    }
}

impl From<String> for SymbolicExpr {
    fn from(text: String) -> Self {
        SymbolicExpr::new(text)
    }
}

impl From<i64> for SymbolicExpr {
    fn from(value: i64) -> Self {
        SymbolicExpr::new(value.to_string())
    }
}

/// Locates the next identifier in `text`, skipping numeric and string
/// literals. Returns `(byte offset, byte length)`.
fn next_identifier(text: &str) -> Option<(usize, usize)> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_digit() {
            // Numeric literal: consume digits and any alphanumeric suffix
            // (exponents, hex digits) so "1e5" contributes no symbol
            i += 1;
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'.' || bytes[i] == b'_') {
                i += 1;
            }
        } else if c == b'"' || c == b'\'' {
            // String literal: skip to the matching quote
            let quote = c;
            i += 1;
            while i < bytes.len() && bytes[i] != quote {
                i += 1;
            }
            i += 1;
        } else if c.is_ascii_alphabetic() || c == b'_' {
            let start = i;
            i += 1;
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            return Some((start, i - start));
        } else {
            i += 1;
        }
    }
    None
}

/// Iterates over the identifier tokens of `text`, literal-aware.
fn tokenize_identifiers(text: &str) -> impl Iterator<Item = &str> {
    let mut rest = text;
    std::iter::from_fn(move || {
        let (start, len) = next_identifier(rest)?;
        let ident = &rest[start..start + len];
        rest = &rest[start + len..];
        Some(ident)
    })
}

/// A parsed simple assignment statement, `target = value`.
///
/// Structural inlining of loop regions requires init and update statements
/// to consist solely of simple assignments; [`Assignment::parse`] is that
/// check. Comparison operators (`==`, `<=`, ...) do not parse as
/// assignments.
///
/// # Examples
///
/// ```rust
/// use stategraph::symbolic::Assignment;
///
/// let a = Assignment::parse("i = i + 1").unwrap();
/// assert_eq!(a.target, "i");
/// assert_eq!(a.value.as_str(), "i + 1");
///
/// assert!(Assignment::parse("i == 5").is_none());
/// assert!(Assignment::parse("foo(x)").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    /// The assigned symbol name
    pub target: String,
    /// The assigned expression
    pub value: SymbolicExpr,
}

impl Assignment {
    /// Parses a single simple assignment of the form `name = expr`.
    ///
    /// # Arguments
    ///
    /// * `statement` - The statement text
    ///
    /// # Returns
    ///
    /// The parsed assignment, or `None` if the statement is not a simple
    /// assignment (no `=`, comparison instead of assignment, or a
    /// non-identifier left-hand side).
    #[must_use]
    pub fn parse(statement: &str) -> Option<Assignment> {
        let statement = statement.trim();
        let bytes = statement.as_bytes();

        let mut eq_pos = None;
        for (i, &b) in bytes.iter().enumerate() {
            if b != b'=' {
                continue;
            }
            // Reject ==, <=, >=, != and two-sided ==
            if i + 1 < bytes.len() && bytes[i + 1] == b'=' {
                return None;
            }
            if i > 0 && matches!(bytes[i - 1], b'=' | b'<' | b'>' | b'!') {
                return None;
            }
            eq_pos = Some(i);
            break;
        }
        let eq_pos = eq_pos?;

        let target = statement[..eq_pos].trim();
        let value = statement[eq_pos + 1..].trim();
        if target.is_empty() || value.is_empty() {
            return None;
        }

        // Left-hand side must be a single identifier
        let (start, len) = next_identifier(target)?;
        if start != 0 || len != target.len() {
            return None;
        }

        Some(Assignment {
            target: target.to_string(),
            value: SymbolicExpr::new(value),
        })
    }

    /// Parses a statement list of `;`- or newline-separated simple
    /// assignments.
    ///
    /// # Arguments
    ///
    /// * `statements` - The statement text
    ///
    /// # Returns
    ///
    /// All parsed assignments in order, or `None` if any non-empty statement
    /// is not a simple assignment.
    #[must_use]
    pub fn parse_all(statements: &str) -> Option<Vec<Assignment>> {
        let mut result = Vec::new();
        for stmt in statements.split(|c| c == ';' || c == '\n') {
            if stmt.trim().is_empty() {
                continue;
            }
            result.push(Assignment::parse(stmt)?);
        }
        Some(result)
    }
}
