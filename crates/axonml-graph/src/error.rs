//! Graph Error Types
//!
//! Error handling for graph construction and rewriting.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use thiserror::Error;

use crate::ir::NodeId;

/// Result type for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors raised by the graph representation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    /// Quantized type parameters are inconsistent.
    #[error("Invalid quantized type: {0}")]
    InvalidQuantizedType(String),

    /// Node id does not exist in this graph.
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Node has been erased by a rewrite.
    #[error("Node {0} has been erased")]
    ErasedNode(NodeId),

    /// Operand slot does not exist on the user.
    #[error("Operand {slot} out of range for node {node}")]
    OperandOutOfRange {
        /// User node.
        node: NodeId,
        /// Requested slot.
        slot: usize,
    },

    /// Structural invariant violated.
    #[error("Invalid graph: {0}")]
    InvalidGraph(String),
}
