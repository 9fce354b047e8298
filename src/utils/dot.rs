//! DOT format utilities for graph visualization.
//!
//! Both the dataflow and the control layer can render themselves as DOT
//! for inspection with Graphviz; label text (memlet descriptions, symbolic
//! conditions) flows through [`escape_dot`] first.

/// Escapes a string for safe use in DOT format labels.
///
/// Handles the characters with special meaning in DOT label syntax:
/// quotes, backslashes, newlines, and the angle brackets used by record
/// labels.
///
/// # Arguments
///
/// * `s` - The string to escape
///
/// # Returns
///
/// A new string with all special characters properly escaped.
///
/// # Examples
///
/// ```rust,ignore
/// use stategraph::utils::escape_dot;
///
/// let escaped = escape_dot("A[0:N - 1] (sum)");
/// assert_eq!(escaped, "A[0:N - 1] (sum)");
/// assert_eq!(escape_dot("if i < \"limit\""), "if i \\< \\\"limit\\\"");
/// ```
#[must_use]
pub fn escape_dot(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "")
        .replace('<', "\\<")
        .replace('>', "\\>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_dot_plain_memlet() {
        assert_eq!(escape_dot("A[0:9, i]"), "A[0:9, i]");
    }

    #[test]
    fn test_escape_dot_condition() {
        assert_eq!(escape_dot("i < N"), "i \\< N");
        assert_eq!(escape_dot("i > 0 and i < N"), "i \\> 0 and i \\< N");
    }

    #[test]
    fn test_escape_dot_quotes_and_backslash() {
        assert_eq!(escape_dot("say \"hi\""), "say \\\"hi\\\"");
        assert_eq!(escape_dot("a\\b"), "a\\\\b");
    }

    #[test]
    fn test_escape_dot_newlines() {
        assert_eq!(escape_dot("x = 1\ny = 2"), "x = 1\\ny = 2");
        assert_eq!(escape_dot("x = 1\r\ny = 2"), "x = 1\\ny = 2");
    }
}
