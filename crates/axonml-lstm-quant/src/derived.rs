//! Derived Scales
//!
//! A bias added to a matrix product must share the accumulator's implied
//! scale, so its scale is the product of the scales of the tensors it
//! pairs with (and any fixed-point factors), never calibrated on its own.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use axonml_graph::{Op, QuantizedType};
use tracing::trace;

use crate::error::{QuantError, QuantResult};
use crate::instance::LstmInstance;
use crate::property::{TensorProperty, INTERMEDIATE_ATTRIBUTES};

/// Computes the derived scale of operand `input_index`.
///
/// Operand dependencies must already be fed by a dequantize of a uniform
/// type; an operand that is not yet is reported as
/// [`QuantError::NotYetQuantized`]. Intermediate dependencies must already
/// carry a uniform type.
pub fn derived_scale(
    instance: &LstmInstance<'_>,
    input_index: usize,
    property: &TensorProperty,
) -> QuantResult<f64> {
    let mut scale = 1.0;

    for &tensor_index in &property.derived_scale.input_tensors {
        let source = match instance.defining_node(tensor_index).map(|node| &node.op) {
            Some(Op::Dequantize { input }) => *input,
            _ => {
                return Err(QuantError::NotYetQuantized {
                    index: input_index,
                    dependency: tensor_index,
                })
            }
        };
        let qtype = instance.graph().get(source)?.ty.quantized_element();
        scale *= uniform_scale(qtype).map_err(|reason| QuantError::BadType {
            index: input_index,
            name: format!("input {tensor_index}"),
            reason,
        })?;
    }

    for &tensor_index in &property.derived_scale.intermediate_tensors {
        let name = INTERMEDIATE_ATTRIBUTES
            .get(tensor_index)
            .copied()
            .unwrap_or("unknown intermediate");
        scale *= uniform_scale(instance.intermediate_type(tensor_index)).map_err(|reason| {
            QuantError::BadType {
                index: input_index,
                name: name.to_string(),
                reason,
            }
        })?;
    }

    for &factor in &property.derived_scale.factors {
        scale *= f64::from(factor);
    }

    trace!(node = %instance.node(), slot = input_index, scale, "derived scale");
    Ok(scale)
}

fn uniform_scale(qtype: Option<&QuantizedType>) -> Result<f64, String> {
    match qtype {
        Some(QuantizedType::Uniform(u)) => Ok(u.scale()),
        Some(other) => Err(format!(
            "is {} quantized, expected UniformQuantizedType",
            other.kind_name()
        )),
        None => Err("is not quantized".to_string()),
    }
}

// =============================================================================
// Tests
// =============================================================================
