//! Input Processor
//!
//! Walks the operand slots listed in the property table. Constant weights
//! and biases get a quantize/dequantize pair inserted right after them;
//! statistics annotations are replaced via [`replace_calibration`].
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use axonml_graph::{ElementType, GraphError, NodeId, Op, UniformQuantizedType};
use tracing::debug;

use crate::calibration::replace_calibration;
use crate::derived::derived_scale;
use crate::error::{QuantError, QuantResult};
use crate::instance::LstmInstance;
use crate::property::{OperatorProperty, TensorProperty};
use crate::quantize::{storage_range, weight_type};

/// Counts of operands rewritten by [`process_inputs`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputSummary {
    /// Constants bracketed with quantize/dequantize.
    pub constants: usize,
    /// Statistics annotations replaced.
    pub calibrations: usize,
}

enum Producer {
    Constant,
    Statistics,
    Dequantize,
    Other(&'static str),
}

/// Prepares every operand of `instance` that has a property entry.
pub fn process_inputs(
    instance: &mut LstmInstance<'_>,
    property: &OperatorProperty,
) -> QuantResult<InputSummary> {
    let mut summary = InputSummary::default();

    for (index, tensor_property) in &property.inputs {
        let index = *index;
        let Some(node) = instance.defining_node(index) else {
            continue;
        };
        let id = node.id;
        let producer = match &node.op {
            Op::Constant { .. } => Producer::Constant,
            Op::Statistics { .. } => Producer::Statistics,
            Op::Dequantize { .. } => Producer::Dequantize,
            other => Producer::Other(other.name()),
        };

        match producer {
            Producer::Constant => {
                if process_constant(instance, id, index, tensor_property)? {
                    summary.constants += 1;
                }
            }
            Producer::Statistics => {
                replace_calibration(instance.graph_mut(), id, index, tensor_property)?;
                summary.calibrations += 1;
            }
            // Already converted.
            Producer::Dequantize => {}
            Producer::Other(producer) => {
                return Err(QuantError::UnexpectedProducer { index, producer });
            }
        }
    }

    Ok(summary)
}

/// Computes the quantized type for the constant `const_node` feeding operand `index`.
///
/// Returns `Ok(None)` for constants that are not float tensors or carry no
/// values; those are not quantization targets.
pub fn quantize_constant(
    instance: &LstmInstance<'_>,
    const_node: NodeId,
    index: usize,
    property: &TensorProperty,
) -> QuantResult<Option<UniformQuantizedType>> {
    let node = instance.graph().get(const_node)?;
    let Op::Constant { value } = &node.op else {
        return Err(GraphError::InvalidGraph(format!("{const_node} is not a constant op")).into());
    };
    let ElementType::Float(expressed) = node.ty.element else {
        return Ok(None);
    };
    if value.float_type().is_none() || value.is_empty() {
        return Ok(None);
    }

    let bits = property.number_of_bits;
    if property.use_derived_scale {
        // Biases take the product of the scales they are accumulated with.
        if bits != 32 {
            return Err(QuantError::BadBits { index, bits });
        }
        let scale = derived_scale(instance, index, property)?;
        let (qmin, qmax) = storage_range(bits, true, false);
        let qtype = UniformQuantizedType::new_checked(true, bits, expressed, scale, 0, qmin, qmax)
            .map_err(|err| QuantError::DerivedScaleUnavailable {
                index,
                reason: err.to_string(),
            })?;
        return Ok(Some(qtype));
    }

    let values = value.values_f64().unwrap_or_default();
    weight_type(&values, bits, expressed).map(Some)
}

/// Brackets a constant operand with a quantize/dequantize pair and points
/// the operand at the dequantize. Returns `false` if the constant was skipped.
fn process_constant(
    instance: &mut LstmInstance<'_>,
    const_node: NodeId,
    index: usize,
    property: &TensorProperty,
) -> QuantResult<bool> {
    let Some(qtype) = quantize_constant(instance, const_node, index, property)? else {
        return Ok(false);
    };
    debug!(
        node = %instance.node(),
        slot = index,
        bits = qtype.storage_bits(),
        scale = qtype.scale(),
        derived = property.use_derived_scale,
        "quantized constant operand"
    );

    let graph = instance.graph_mut();
    let float_ty = graph.get(const_node)?.ty.clone();
    let quantized_ty = float_ty.with_element(ElementType::Quantized(qtype.into()));
    // TODO: duplicate the constant first when it also feeds other users
    // that expect a different scale (e.g. a bias shared between cells).
    let quantize = graph.insert_after(const_node, Op::Quantize { input: const_node }, quantized_ty)?;
    let dequantize = graph.insert_after(quantize, Op::Dequantize { input: quantize }, float_ty)?;
    instance.set_operand(index, dequantize)?;
    Ok(true)
}

// =============================================================================
// Tests
// =============================================================================
