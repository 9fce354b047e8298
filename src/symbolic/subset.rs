//! N-dimensional symbolic index subsets.
//!
//! Every data-movement edge carries a [`Subset`] describing which elements of
//! its data container move. Bounds are symbolic expressions; the containment
//! test used by write masking is deliberately conservative: it answers `true`
//! only when containment is provable from literal-integer bounds or from
//! syntactic equality, and `false` in every uncertain case.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::symbolic::SymbolicExpr;

/// One dimension of an index subset: `start:end:stride` with inclusive
/// bounds.
///
/// A single index `i` is represented as the degenerate range `i:i:1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    /// First index covered by the range
    pub start: SymbolicExpr,
    /// Last index covered by the range (inclusive)
    pub end: SymbolicExpr,
    /// Step between consecutive indices
    pub stride: SymbolicExpr,
}

impl Range {
    /// Creates a range from start/end expressions with unit stride.
    pub fn new(start: impl Into<SymbolicExpr>, end: impl Into<SymbolicExpr>) -> Self {
        Range {
            start: start.into(),
            end: end.into(),
            stride: SymbolicExpr::new("1"),
        }
    }

    /// Creates a strided range.
    pub fn strided(
        start: impl Into<SymbolicExpr>,
        end: impl Into<SymbolicExpr>,
        stride: impl Into<SymbolicExpr>,
    ) -> Self {
        Range {
            start: start.into(),
            end: end.into(),
            stride: stride.into(),
        }
    }

    /// Creates the degenerate range covering a single index.
    pub fn index(expr: impl Into<SymbolicExpr>) -> Self {
        let expr = expr.into();
        Range {
            start: expr.clone(),
            end: expr,
            stride: SymbolicExpr::new("1"),
        }
    }

    /// Returns `true` if this range covers a single index.
    #[must_use]
    pub fn is_index(&self) -> bool {
        self.start == self.end
    }

    /// Conservative containment test: does this range provably contain
    /// `other`?
    ///
    /// Bounds are compared numerically when both are literal integers and
    /// syntactically otherwise. Strides must match, or this range must have
    /// unit stride. Any uncertain comparison yields `false`.
    #[must_use]
    pub fn covers(&self, other: &Range) -> bool {
        let start_ok = match (self.start.as_int(), other.start.as_int()) {
            (Some(a), Some(b)) => a <= b,
            _ => self.start == other.start,
        };
        let end_ok = match (self.end.as_int(), other.end.as_int()) {
            (Some(a), Some(b)) => a >= b,
            _ => self.end == other.end,
        };
        let stride_ok = self.stride.as_int() == Some(1) || self.stride == other.stride;
        start_ok && end_ok && stride_ok
    }

    /// Extracts the free symbols referenced by the range bounds.
    #[must_use]
    pub fn free_symbols(&self) -> BTreeSet<String> {
        let mut result = self.start.free_symbols();
        result.extend(self.end.free_symbols());
        result.extend(self.stride.free_symbols());
        result
    }

    /// Renames every whole-identifier occurrence of `old` in the bounds.
    pub fn replace(&mut self, old: &str, new: &str) {
        self.start.replace(old, new);
        self.end.replace(old, new);
        self.stride.replace(old, new);
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_index() {
            write!(f, "{}", self.start)
        } else if self.stride.as_int() == Some(1) {
            write!(f, "{}:{}", self.start, self.end)
        } else {
            write!(f, "{}:{}:{}", self.start, self.end, self.stride)
        }
    }
}

/// An N-dimensional symbolic index subset.
///
/// # Examples
///
/// ```rust
/// use stategraph::symbolic::{Range, Subset, SymbolicExpr};
///
/// // The full extent of a 2-dimensional M x N container
/// let full = Subset::from_extents(&["M".into(), "N".into()]);
/// assert_eq!(full.to_string(), "0:M - 1, 0:N - 1");
///
/// // A single element
/// let elem = Subset::elements(&["i", "j"]);
/// assert!(full.dims() == elem.dims());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Subset {
    ranges: Vec<Range>,
}

impl Subset {
    /// Creates a subset from explicit per-dimension ranges.
    #[must_use]
    pub fn new(ranges: Vec<Range>) -> Self {
        Subset { ranges }
    }

    /// Creates the subset covering the full extent of a container shape.
    ///
    /// Each extent expression `E` yields the range `0:E - 1`; literal
    /// extents are folded to literal bounds.
    #[must_use]
    pub fn from_extents(shape: &[SymbolicExpr]) -> Self {
        let ranges = shape
            .iter()
            .map(|extent| {
                let end = match extent.as_int() {
                    Some(n) => SymbolicExpr::from(n - 1),
                    None => SymbolicExpr::new(format!("{extent} - 1")),
                };
                Range::new(SymbolicExpr::new("0"), end)
            })
            .collect();
        Subset { ranges }
    }

    /// Creates the subset addressing one element per dimension.
    #[must_use]
    pub fn elements(indices: &[&str]) -> Self {
        Subset {
            ranges: indices.iter().map(|i| Range::index(*i)).collect(),
        }
    }

    /// Parses the textual form `start:end:stride, ...` (e.g. `0:N, i, 2:8:2`).
    ///
    /// # Returns
    ///
    /// The parsed subset, or `None` on an empty or malformed description.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let mut ranges = Vec::new();
        for dim in text.split(',') {
            let dim = dim.trim();
            if dim.is_empty() {
                return None;
            }
            let parts: Vec<&str> = dim.split(':').map(str::trim).collect();
            let range = match parts.as_slice() {
                [index] => Range::index(*index),
                [start, end] => Range::new(*start, *end),
                [start, end, stride] => Range::strided(*start, *end, *stride),
                _ => return None,
            };
            ranges.push(range);
        }
        if ranges.is_empty() {
            return None;
        }
        Some(Subset { ranges })
    }

    /// Returns the number of dimensions.
    #[must_use]
    pub fn dims(&self) -> usize {
        self.ranges.len()
    }

    /// Returns the per-dimension ranges.
    #[must_use]
    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    /// Conservative containment test: does this subset provably contain
    /// `other` in every dimension?
    ///
    /// Dimensionality must match; partial overlaps and uncertain symbolic
    /// comparisons yield `false`, so callers treat them as real accesses.
    #[must_use]
    pub fn covers(&self, other: &Subset) -> bool {
        self.ranges.len() == other.ranges.len()
            && self
                .ranges
                .iter()
                .zip(other.ranges.iter())
                .all(|(a, b)| a.covers(b))
    }

    /// Extracts the free symbols referenced by any dimension.
    #[must_use]
    pub fn free_symbols(&self) -> BTreeSet<String> {
        let mut result = BTreeSet::new();
        for range in &self.ranges {
            result.extend(range.free_symbols());
        }
        result
    }

    /// Renames every whole-identifier occurrence of `old` in all dimensions.
    pub fn replace(&mut self, old: &str, new: &str) {
        for range in &mut self.ranges {
            range.replace(old, new);
        }
    }
}

impl fmt::Display for Subset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for range in &self.ranges {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{range}")?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_covers_literals() {
        let outer = Range::new(0i64, 9i64);
        let inner = Range::new(2i64, 5i64);
        assert!(outer.covers(&inner));
        assert!(!inner.covers(&outer));
    }

    #[test]
    fn test_range_covers_symbolic_equality() {
        let a = Range::new("0", "N - 1");
        let b = Range::new("0", "N - 1");
        assert!(a.covers(&b));
    }

    #[test]
    fn test_range_covers_uncertain_is_false() {
        // N - 1 vs M - 1: not comparable, conservatively not covered
        let a = Range::new("0", "N - 1");
        let b = Range::new("0", "M - 1");
        assert!(!a.covers(&b));
    }

    #[test]
    fn test_range_covers_stride() {
        let unit = Range::new(0i64, 9i64);
        let strided = Range::strided(0i64, 9i64, 2i64);
        // Unit stride covers any stride over the same bounds
        assert!(unit.covers(&strided));
        // A strided range does not cover a denser one
        assert!(!strided.covers(&unit));
    }

    #[test]
    fn test_subset_covers_dimension_mismatch() {
        let a = Subset::parse("0:9").unwrap();
        let b = Subset::parse("0:9, 0:9").unwrap();
        assert!(!a.covers(&b));
    }

    #[test]
    fn test_subset_from_extents() {
        let shape = vec![SymbolicExpr::new("4"), SymbolicExpr::new("N")];
        let full = Subset::from_extents(&shape);
        assert_eq!(full.to_string(), "0:3, 0:N - 1");
    }

    #[test]
    fn test_subset_parse_forms() {
        let s = Subset::parse("0:N, i, 2:8:2").unwrap();
        assert_eq!(s.dims(), 3);
        assert!(s.ranges()[1].is_index());
        assert_eq!(s.to_string(), "0:N, i, 2:8:2");

        assert!(Subset::parse("").is_none());
        assert!(Subset::parse("0:1:2:3").is_none());
    }

    #[test]
    fn test_subset_free_symbols_and_replace() {
        let mut s = Subset::parse("0:N, i").unwrap();
        let syms = s.free_symbols();
        assert!(syms.contains("N"));
        assert!(syms.contains("i"));

        s.replace("N", "size");
        assert_eq!(s.to_string(), "0:size, i");
    }

    #[test]
    fn test_full_extent_write_covers_element_read() {
        let full = Subset::from_extents(&[SymbolicExpr::new("10")]);
        let element = Subset::parse("4").unwrap();
        assert!(full.covers(&element));
    }
}
