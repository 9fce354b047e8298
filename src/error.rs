use thiserror::Error;

macro_rules! consistency_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Inconsistent {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Inconsistent {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// This enum covers all possible error conditions that can occur while constructing, querying,
/// and transforming the intermediate representation. Each variant provides specific context
/// about the failure mode to enable appropriate error handling.
///
/// # Error Categories
///
/// ## Structural Errors
/// - [`Error::CyclicGraph`] - A dataflow graph contains a cycle where acyclicity is assumed
/// - [`Error::CyclicPath`] - A cycle was encountered while tracing a data-movement path
/// - [`Error::AmbiguousStartBlock`] - A control-flow region has no unambiguous start block
/// - [`Error::MissingScopeExit`] - A scope entry node has no matching exit node
///
/// ## Construction Errors
/// - [`Error::InvalidStartBlock`] - A manual start-block override names a nonexistent block
/// - [`Error::MissingConnector`] - An edge references a connector that does not exist
/// - [`Error::DuplicateContainer`] - A data container was registered twice
/// - [`Error::UnknownContainer`] - A referenced data container was never registered
/// - [`Error::GraphError`] - General graph manipulation error (invalid node/edge identifiers)
///
/// ## Consistency Errors
/// - [`Error::Inconsistent`] - Internal invariant violation, indicating a bug rather than
///   malformed user input
///
/// ## Persistence Errors
/// - [`Error::Serialization`] - JSON (de)serialization failure
///
/// # Examples
///
/// ```rust
/// use stategraph::{Error, FlowGraph};
///
/// let mut graph = FlowGraph::new("program");
/// let state = graph.add_state(FlowGraph::ROOT, "compute", true).unwrap();
///
/// match graph.region(FlowGraph::ROOT).unwrap().start_block() {
///     Ok(start) => assert_eq!(start, state),
///     Err(Error::AmbiguousStartBlock { region }) => {
///         eprintln!("no unique start block in region {}", region);
///     }
///     Err(e) => eprintln!("other error: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// A dataflow graph contains a cycle where acyclicity is assumed.
    ///
    /// Dataflow states are acyclic at steady state; scope computation and
    /// topological decomposition fail on cyclic graphs. The error names the
    /// offending state and the nodes participating in the detected cycle so
    /// the producing frontend or transformation can be diagnosed.
    #[error("Found cycle in state '{state}' involving nodes: {nodes:?}")]
    CyclicGraph {
        /// Label of the state containing the cycle
        state: String,
        /// Labels of the nodes participating in the cycle
        nodes: Vec<String>,
    },

    /// A cycle was encountered while tracing a data-movement path or tree.
    ///
    /// Path tracing walks the `IN_`/`OUT_` connector convention across scope
    /// boundaries; revisiting an edge means the connector structure is
    /// self-referential and the graph is malformed.
    #[error("Cycle encountered while tracing data-movement path in state '{state}'")]
    CyclicPath {
        /// Label of the state in which the trace was attempted
        state: String,
    },

    /// A control-flow region has no unambiguous start block.
    ///
    /// The start block is the unique source node of the region, or a manual
    /// override. If the region has several source nodes and no override was
    /// set, queries that need a starting point cannot proceed.
    #[error("Ambiguous or undefined start block for control-flow region '{region}'")]
    AmbiguousStartBlock {
        /// Label of the affected region
        region: String,
    },

    /// A manual start-block override referenced a block that does not exist.
    #[error("Invalid start block id {id} for control-flow region '{region}'")]
    InvalidStartBlock {
        /// Label of the affected region
        region: String,
        /// The out-of-range block id
        id: usize,
    },

    /// A scope entry node has no matching exit node.
    ///
    /// Every scope entry must be closed by exactly one exit reachable through
    /// the scope-children map. Absence indicates a malformed or cyclic graph.
    #[error("Scope entry '{entry}' in state '{state}' has no matching exit node")]
    MissingScopeExit {
        /// Label of the state containing the unmatched entry
        state: String,
        /// Label of the entry node
        entry: String,
    },

    /// An edge references a connector that does not exist on the node.
    ///
    /// Data-movement edges attach to named connectors on code and scope
    /// nodes; tracing through a scope boundary requires the paired
    /// `IN_`/`OUT_` connector to be present.
    #[error("Node '{node}' has no connector named '{connector}'")]
    MissingConnector {
        /// Label of the affected node
        node: String,
        /// The missing connector name
        connector: String,
    },

    /// A data container was registered under an already-used name.
    #[error("Data container '{0}' already exists")]
    DuplicateContainer(String),

    /// A referenced data container was never registered.
    #[error("Unknown data container '{0}'")]
    UnknownContainer(String),

    /// Generic graph manipulation error.
    ///
    /// Covers invalid node or edge identifiers, endpoint mismatches, and
    /// other malformed graph operations that do not fit a more specific
    /// category.
    #[error("{0}")]
    GraphError(String),

    /// Internal invariant violation.
    ///
    /// This error indicates a bug in the library or a graph corrupted
    /// through means other than the public API, not malformed user input.
    /// The source location where the inconsistency was detected is included
    /// for debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of the violated invariant
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Inconsistent - {file}:{line}: {message}")]
    Inconsistent {
        /// The message to be printed for the consistency error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// JSON (de)serialization failure while persisting or loading a graph.
    #[error("{0}")]
    Serialization(#[from] serde_json::Error),
}
