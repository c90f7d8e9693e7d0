//! Quantization Error Types
//!
//! Error types for LSTM quantization preparation. Every variant carries the
//! slot index or attribute name needed to locate the offending tensor.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use axonml_graph::{GraphError, NodeId};
use thiserror::Error;

/// Result type for quantization operations.
pub type QuantResult<T> = Result<T, QuantError>;

/// Errors that can occur while preparing an operator for quantization.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QuantError {
    /// The matched node is not a recognized recurrent operator shape.
    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    /// Bit width not supported on this path.
    #[error("Unsupported quantization bits: {bits} ({reason})")]
    UnsupportedBits {
        /// Requested bit width.
        bits: u32,
        /// Which path rejected it.
        reason: &'static str,
    },

    /// An already quantized intermediate has the wrong storage width.
    #[error("{name} is expected to be quantized with {expected} bits, but got {actual} bits instead")]
    BitWidthMismatch {
        /// Intermediate attribute name.
        name: &'static str,
        /// Width from the property table.
        expected: u32,
        /// Width found on the attribute.
        actual: u32,
    },

    /// A required intermediate carries no quantized type.
    #[error("{0} is not quantized")]
    MissingIntermediate(&'static str),

    /// A state tensor's statistics feed more than one consumer.
    #[error("Input tensor [{index}] is a state tensor, but has {uses} uses")]
    MultiUseState {
        /// Operand slot.
        index: usize,
        /// Number of consumers found.
        uses: usize,
    },

    /// Statistics payload is not exactly `[min, max]`.
    #[error("Stats for input {index} should have 2 values, got {count}")]
    BadStats {
        /// Operand slot.
        index: usize,
        /// Number of values found.
        count: usize,
    },

    /// A derived-scale dependency has not been quantized yet.
    #[error("While processing derived scale for input {index}: input {dependency} is not quantized yet")]
    NotYetQuantized {
        /// Slot whose scale is being derived.
        index: usize,
        /// Dependency slot.
        dependency: usize,
    },

    /// A derived-scale dependency carries the wrong kind of type.
    #[error("While processing derived scale for input {index}: {name} {reason}")]
    BadType {
        /// Slot whose scale is being derived.
        index: usize,
        /// Dependency name.
        name: String,
        /// What was wrong with it.
        reason: String,
    },

    /// No valid quantized type could be built for a constant.
    #[error("Failed to get quantized type for input {index}: {reason}")]
    DerivedScaleUnavailable {
        /// Operand slot.
        index: usize,
        /// Underlying cause.
        reason: String,
    },

    /// Derived scale requested at a width other than 32 bits.
    #[error("Derived scale is only supported for 32-bit quantization. Got {bits} bits in input index {index}")]
    BadBits {
        /// Operand slot.
        index: usize,
        /// Requested width.
        bits: u32,
    },

    /// Operand comes from something other than a constant, statistics, or dequantize.
    #[error("Input {index} should be from DequantizeCast or Statistics op, found {producer}")]
    UnexpectedProducer {
        /// Operand slot.
        index: usize,
        /// Producer mnemonic.
        producer: &'static str,
    },

    /// Calibrated range cannot be mapped to a valid quantized type.
    #[error("Invalid quantization range [{min}, {max}]: {reason}")]
    InvalidRange {
        /// Range minimum.
        min: f64,
        /// Range maximum.
        max: f64,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Failure inside one operator instance of a pass run.
    #[error("Failed to prepare {node} for quantization: {source}")]
    AtNode {
        /// Offending operator node.
        node: NodeId,
        /// Underlying failure.
        #[source]
        source: Box<QuantError>,
    },

    /// Graph rewrite error.
    #[error(transparent)]
    Graph(#[from] GraphError),
}
