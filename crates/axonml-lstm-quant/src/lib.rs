//! Axonml LSTM Quant - Prepare LSTMs for Fixed-Point Quantization
//!
//! Converts the calibrated ranges and float constants feeding LSTM cells
//! into explicit quantize/dequantize pairs with concrete fixed-point types:
//!
//! - **Weights**: symmetric narrow-range, 8 or 16 bits
//! - **Biases**: 32 bits, scale derived from the tensors they accumulate with
//! - **Activations**: calibrated 8-bit asymmetric ranges
//! - **Cell state**: 16 bits with a power-of-two range
//! - **Intermediates**: gate pre-activations stored as type attributes
//!
//! # Example
//! ```ignore
//! use axonml_lstm_quant::{PrepareQuantizeLstm, QuantizationSpecs, InferenceType};
//!
//! let specs = QuantizationSpecs::new().inference_type(InferenceType::QInt8);
//! let report = PrepareQuantizeLstm::new(specs).run(&mut graph)?;
//! ```
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

pub mod calibration;
pub mod config;
pub mod derived;
pub mod error;
pub mod inputs;
pub mod instance;
pub mod intermediate;
pub mod prepare;
pub mod property;
pub mod quantize;

#[cfg(test)]
mod testing;

pub use calibration::{replace_calibration, QdqPair};
pub use config::{InferenceType, QuantizationSpecs};
pub use derived::derived_scale;
pub use error::{QuantError, QuantResult};
pub use inputs::{process_inputs, quantize_constant, InputSummary};
pub use instance::LstmInstance;
pub use intermediate::process_intermediates;
pub use prepare::{prepare_lstm, PrepareQuantizeLstm, PrepareReport};
pub use property::{
    operator_property, DerivedScale, OpCode, OpVariant, OperatorProperty, TensorProperty,
    INTERMEDIATE_ATTRIBUTES, LSTM_NUM_OPERANDS,
};
pub use quantize::{fake_quant_type, quantize_range, weight_type};
