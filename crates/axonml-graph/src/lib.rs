//! Axonml Graph - Program Representation for Quantization Passes
//!
//! A small SSA-style graph IR that quantization passes inspect and rewrite:
//!
//! - Node arena with stable ids and an explicit program order
//! - Constants, statistics annotations, and quantize/dequantize casts
//! - Recurrent cell operations with positional optional operands
//! - Uniform, per-axis, and calibrated quantized element types
//!
//! # Example
//! ```ignore
//! use axonml_graph::{Graph, Op, TensorType, FloatType};
//!
//! let mut graph = Graph::new();
//! let x = graph.add_node(Op::Input { name: "x".into() }, TensorType::float(FloatType::F32, &[1, 8]));
//! let q = graph.insert_after(x, Op::Quantize { input: x }, quantized_ty)?;
//! graph.replace_all_uses(x, q)?;
//! ```
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

pub mod error;
pub mod ir;
pub mod quant;
pub mod types;

pub use error::{GraphError, GraphResult};
pub use ir::{Attribute, Graph, Node, NodeId, Op, RecurrentKind};
pub use quant::{
    max_int_n, max_uint_n, min_int_n, CalibratedQuantizedType, QuantizedType,
    UniformPerAxisQuantizedType, UniformQuantizedType,
};
pub use types::{ConstantData, ElementType, FloatType, Shape, TensorType};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_dequantize_chain() {
        let f32_ty = TensorType::float(FloatType::F32, &[4]);
        let qtype = UniformQuantizedType::new_checked(true, 8, FloatType::F32, 0.1, 0, -127, 127)
            .unwrap();
        let q_ty = f32_ty.cast_from_expressed(qtype.into()).unwrap();

        let mut graph = Graph::new();
        let x = graph.add_node(Op::Input { name: "x".to_string() }, f32_ty.clone());
        graph.register_input("x", x);
        let y = graph.add_node(Op::Tanh { input: x }, f32_ty.clone());

        let q = graph.insert_after(x, Op::Quantize { input: x }, q_ty).unwrap();
        let dq = graph.insert_after(q, Op::Dequantize { input: q }, f32_ty).unwrap();
        graph.set_operand(y, 0, dq).unwrap();

        assert!(graph.validate().is_ok());
        assert_eq!(graph.uses(x), vec![q]);
        assert!(graph.node(q).ty.quantized_element().is_some());
    }
}
