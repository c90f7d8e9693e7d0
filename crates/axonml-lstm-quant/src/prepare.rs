//! Prepare-Quantize Pass
//!
//! Prepares every LSTM instance of a graph for quantization. Per instance,
//! intermediates are resolved first so that derived bias scales can read
//! them, then the operand slots are processed in property-table order.
//!
//! # Example
//! ```ignore
//! use axonml_lstm_quant::{PrepareQuantizeLstm, QuantizationSpecs};
//!
//! let report = PrepareQuantizeLstm::new(QuantizationSpecs::default()).run(&mut graph)?;
//! println!("prepared {} LSTM(s)", report.instances);
//! ```
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use axonml_graph::{Graph, NodeId, Op};
use tracing::{debug, info, warn};

use crate::config::QuantizationSpecs;
use crate::error::{QuantError, QuantResult};
use crate::inputs::process_inputs;
use crate::instance::LstmInstance;
use crate::intermediate::process_intermediates;
use crate::property::operator_property;

// =============================================================================
// Report
// =============================================================================

/// What a prepare run rewrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrepareReport {
    /// LSTM instances prepared.
    pub instances: usize,
    /// Constant operands bracketed with quantize/dequantize.
    pub constants: usize,
    /// Statistics annotations replaced.
    pub statistics: usize,
    /// Intermediates converted from calibrated ranges.
    pub intermediates: usize,
}

impl PrepareReport {
    fn absorb(&mut self, other: PrepareReport) {
        self.instances += other.instances;
        self.constants += other.constants;
        self.statistics += other.statistics;
        self.intermediates += other.intermediates;
    }
}

// =============================================================================
// Single Instance
// =============================================================================

/// Prepares the LSTM at `node`.
///
/// There is no rollback: on failure, tensors processed before the failing
/// slot stay converted.
pub fn prepare_lstm(
    graph: &mut Graph,
    node: NodeId,
    specs: &QuantizationSpecs,
) -> QuantResult<PrepareReport> {
    let mut instance = LstmInstance::new(graph, node)?;
    let variant = instance.variant();
    let property = operator_property(&variant);
    debug!(
        node = %node,
        op_code = ?variant.op_code,
        projection = variant.use_projection,
        peephole = variant.use_peephole,
        layer_norm = variant.use_layer_norm,
        "preparing LSTM"
    );

    let intermediates = process_intermediates(&mut instance, &variant, property, specs)?;
    let inputs = process_inputs(&mut instance, property)?;

    Ok(PrepareReport {
        instances: 1,
        constants: inputs.constants,
        statistics: inputs.calibrations,
        intermediates,
    })
}

// =============================================================================
// Pass Driver
// =============================================================================

/// Runs [`prepare_lstm`] over every LSTM of a graph.
#[derive(Debug, Clone, Default)]
pub struct PrepareQuantizeLstm {
    specs: QuantizationSpecs,
}

impl PrepareQuantizeLstm {
    /// Creates the pass.
    pub fn new(specs: QuantizationSpecs) -> Self {
        Self { specs }
    }

    /// Prepares every LSTM in program order, stopping at the first failure.
    pub fn run(&self, graph: &mut Graph) -> QuantResult<PrepareReport> {
        let lstms: Vec<NodeId> = graph
            .nodes()
            .filter(|node| matches!(node.op, Op::Lstm { .. }))
            .map(|node| node.id)
            .collect();

        let mut report = PrepareReport::default();
        for node in lstms {
            match prepare_lstm(graph, node, &self.specs) {
                Ok(prepared) => report.absorb(prepared),
                Err(err) => {
                    warn!(node = %node, error = %err, "LSTM could not be prepared for quantization");
                    return Err(QuantError::AtNode {
                        node,
                        source: Box::new(err),
                    });
                }
            }
        }

        info!(
            instances = report.instances,
            constants = report.constants,
            statistics = report.statistics,
            intermediates = report.intermediates,
            "prepared LSTMs for quantization"
        );
        Ok(report)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::INTERMEDIATE_ATTRIBUTES;
    use crate::testing::{build_lstm, calibrated_attr, f32_ty, input, Features};
    use axonml_graph::Attribute;

    #[test]
    fn test_plain_lstm() {
        let mut graph = Graph::new();
        let node = build_lstm(&mut graph, Features::default());

        let report = prepare_lstm(&mut graph, node, &QuantizationSpecs::default()).unwrap();
        assert_eq!(
            report,
            PrepareReport {
                instances: 1,
                constants: 12,
                statistics: 3,
                intermediates: 0,
            }
        );
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn test_projection_with_hidden_scale() {
        let mut graph = Graph::new();
        let node = build_lstm(
            &mut graph,
            Features {
                projection: true,
                peephole: true,
                layer_norm: false,
            },
        );
        graph
            .set_attr(node, INTERMEDIATE_ATTRIBUTES[4], Attribute::Type(calibrated_attr(-2.0, 2.0)))
            .unwrap();

        let report = prepare_lstm(&mut graph, node, &QuantizationSpecs::default()).unwrap();
        assert_eq!(report.intermediates, 1);
        // 8 gate weights, 3 peephole, 4 biases, projection weights and bias.
        assert_eq!(report.constants, 17);
    }

    #[test]
    fn test_not_an_lstm() {
        let mut graph = Graph::new();
        let x = input(&mut graph, "x");
        let t = graph.add_node(Op::Tanh { input: x }, f32_ty());
        let err = prepare_lstm(&mut graph, t, &QuantizationSpecs::default()).unwrap_err();
        assert!(matches!(err, QuantError::UnsupportedOperator(_)));
    }

    #[test]
    fn test_driver_wraps_failures() {
        let mut graph = Graph::new();
        let node = build_lstm(
            &mut graph,
            Features {
                projection: true,
                ..Features::default()
            },
        );

        let err = PrepareQuantizeLstm::default().run(&mut graph).unwrap_err();
        match err {
            QuantError::AtNode { node: at, source } => {
                assert_eq!(at, node);
                assert_eq!(
                    *source,
                    QuantError::MissingIntermediate("effective_hidden_scale_intermediate")
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_driver_on_empty_graph() {
        let report = PrepareQuantizeLstm::default().run(&mut Graph::new()).unwrap();
        assert_eq!(report, PrepareReport::default());
    }
}
