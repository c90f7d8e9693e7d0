//! Calibration Replacement
//!
//! Turns a statistics annotation into a quantize/dequantize pair at the same
//! program position. Consumers keep reading a float value while the graph
//! records the fixed-point parameters for lowering.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use axonml_graph::{ElementType, Graph, GraphError, NodeId, Op};
use tracing::debug;

use crate::error::{QuantError, QuantResult};
use crate::property::TensorProperty;
use crate::quantize::quantize_range;

/// Quantize and dequantize nodes that replaced a statistics annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QdqPair {
    /// Quantize node.
    pub quantize: NodeId,
    /// Dequantize node now feeding every former consumer.
    pub dequantize: NodeId,
}

/// Replaces the statistics node `stats` feeding operand `index`.
///
/// Calibrated values are always quantized as signed.
pub fn replace_calibration(
    graph: &mut Graph,
    stats: NodeId,
    index: usize,
    property: &TensorProperty,
) -> QuantResult<QdqPair> {
    let node = graph.get(stats)?;
    let Op::Statistics { input, layer_stats } = &node.op else {
        return Err(GraphError::InvalidGraph(format!(
            "{stats} is a {}, not a statistics annotation",
            node.op.name()
        ))
        .into());
    };
    let input = *input;

    if property.state_tensor {
        let uses = graph.num_uses(stats);
        if uses != 1 {
            return Err(QuantError::MultiUseState { index, uses });
        }
    }

    let &[min, max] = layer_stats.as_slice() else {
        return Err(QuantError::BadStats {
            index,
            count: layer_stats.len(),
        });
    };

    let float_ty = node.ty.clone();
    let ElementType::Float(expressed) = float_ty.element else {
        return Err(GraphError::InvalidGraph(format!(
            "statistics at {stats} annotate a non-float value of type {float_ty}"
        ))
        .into());
    };

    let qtype = quantize_range(
        min,
        max,
        property.number_of_bits,
        property.extend_to_power_of_two,
        true,
        expressed,
    )?;
    debug!(
        slot = index,
        bits = property.number_of_bits,
        power_of_two = property.extend_to_power_of_two,
        scale = qtype.scale(),
        zero_point = qtype.zero_point(),
        "replacing statistics with quantize/dequantize"
    );

    let quantized_ty = float_ty.with_element(ElementType::Quantized(qtype.into()));
    let quantize = graph.insert_after(stats, Op::Quantize { input }, quantized_ty)?;
    let dequantize = graph.insert_after(quantize, Op::Dequantize { input: quantize }, float_ty)?;
    graph.replace_all_uses(stats, dequantize)?;
    graph.erase(stats)?;

    Ok(QdqPair {
        quantize,
        dequantize,
    })
}

// =============================================================================
// Tests
// =============================================================================
