//! Operator Instance
//!
//! One matched LSTM node together with mutable access to the graph it lives
//! in. All reads and writes the processors perform go through here.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use axonml_graph::{Attribute, Graph, Node, NodeId, Op, QuantizedType, TensorType};

use crate::error::{QuantError, QuantResult};
use crate::property::{
    OpCode, OpVariant, CELL_TO_OUTPUT_WEIGHTS, FORGET_LAYER_NORM_COEFFICIENTS,
    INTERMEDIATE_ATTRIBUTES, LSTM_NUM_OPERANDS, PROJECTION_WEIGHTS,
};

/// A matched recurrent operator.
pub struct LstmInstance<'g> {
    graph: &'g mut Graph,
    node: NodeId,
    op_code: OpCode,
}

impl<'g> LstmInstance<'g> {
    /// Wraps `node`, rejecting anything that is not a 24-operand LSTM.
    pub fn new(graph: &'g mut Graph, node: NodeId) -> QuantResult<Self> {
        let op_code = match &graph.get(node)?.op {
            Op::Lstm { kind, operands } if operands.len() == LSTM_NUM_OPERANDS => OpCode::from(*kind),
            Op::Lstm { operands, .. } => {
                return Err(QuantError::UnsupportedOperator(format!(
                    "LSTM at {node} has {} operands, expected {LSTM_NUM_OPERANDS}",
                    operands.len()
                )))
            }
            other => {
                return Err(QuantError::UnsupportedOperator(format!(
                    "{} at {node}: only LSTMs are supported",
                    other.name()
                )))
            }
        };
        Ok(Self { graph, node, op_code })
    }

    /// The operator node.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Shared access to the graph.
    pub fn graph(&self) -> &Graph {
        &*self.graph
    }

    /// Mutable access to the graph.
    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut *self.graph
    }

    /// Variant implied by which optional operands are present.
    pub fn variant(&self) -> OpVariant {
        OpVariant::new(
            self.op_code,
            self.operand(PROJECTION_WEIGHTS).is_some(),
            self.operand(CELL_TO_OUTPUT_WEIGHTS).is_some(),
            self.operand(FORGET_LAYER_NORM_COEFFICIENTS).is_some(),
        )
    }

    /// Value feeding operand `index`, if present.
    pub fn operand(&self, index: usize) -> Option<NodeId> {
        match &self.graph.node(self.node).op {
            Op::Lstm { operands, .. } => operands.get(index).copied().flatten(),
            _ => None,
        }
    }

    /// Node defining operand `index`. Absent operands and graph arguments
    /// have no defining node.
    pub fn defining_node(&self, index: usize) -> Option<&Node> {
        let id = self.operand(index)?;
        let node = self.graph.get(id).ok()?;
        match node.op {
            Op::Input { .. } => None,
            _ => Some(node),
        }
    }

    /// Rewires operand `index` to `value`.
    pub fn set_operand(&mut self, index: usize, value: NodeId) -> QuantResult<()> {
        Ok(self.graph.set_operand(self.node, index, value)?)
    }

    /// Raw type attribute of intermediate `index`.
    pub fn intermediate_attr(&self, index: usize) -> Option<&TensorType> {
        let name = INTERMEDIATE_ATTRIBUTES.get(index)?;
        self.graph.attr(self.node, name).and_then(Attribute::as_type)
    }

    /// Quantized element type of intermediate `index`, if it has one.
    pub fn intermediate_type(&self, index: usize) -> Option<&QuantizedType> {
        self.intermediate_attr(index)?.quantized_element()
    }

    /// Stores a new type for intermediate `index`.
    pub fn set_intermediate(&mut self, index: usize, ty: TensorType) -> QuantResult<()> {
        let name = INTERMEDIATE_ATTRIBUTES[index];
        Ok(self.graph.set_attr(self.node, name, Attribute::Type(ty))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axonml_graph::{FloatType, RecurrentKind};

    fn ty() -> TensorType {
        TensorType::float(FloatType::F32, &[1, 4])
    }

    #[test]
    fn test_rejects_non_lstm() {
        let mut graph = Graph::new();
        let x = graph.add_node(Op::Input { name: "x".to_string() }, ty());
        let t = graph.add_node(Op::Tanh { input: x }, ty());
        let err = LstmInstance::new(&mut graph, t).err().unwrap();
        assert!(matches!(err, QuantError::UnsupportedOperator(_)));
    }

    #[test]
    fn test_rejects_wrong_arity() {
        let mut graph = Graph::new();
        let lstm = graph.add_node(
            Op::Lstm {
                kind: RecurrentKind::Lstm,
                operands: vec![None; 20],
            },
            ty(),
        );
        assert!(matches!(
            LstmInstance::new(&mut graph, lstm),
            Err(QuantError::UnsupportedOperator(_))
        ));
    }

    #[test]
    fn test_variant_detection() {
        let mut graph = Graph::new();
        let w = graph.add_node(
            Op::Constant {
                value: axonml_graph::ConstantData::F32(vec![0.1]),
            },
            ty(),
        );
        let mut operands = vec![None; LSTM_NUM_OPERANDS];
        operands[PROJECTION_WEIGHTS] = Some(w);
        operands[FORGET_LAYER_NORM_COEFFICIENTS] = Some(w);
        let lstm = graph.add_node(
            Op::Lstm {
                kind: RecurrentKind::UnidirectionalSequenceLstm,
                operands,
            },
            ty(),
        );

        let instance = LstmInstance::new(&mut graph, lstm).unwrap();
        let variant = instance.variant();
        assert_eq!(variant.op_code, OpCode::UnidirectionalSequenceLstm);
        assert!(variant.use_projection);
        assert!(!variant.use_peephole);
        assert!(variant.use_layer_norm);
    }

    #[test]
    fn test_graph_input_has_no_defining_node() {
        let mut graph = Graph::new();
        let x = graph.add_node(Op::Input { name: "x".to_string() }, ty());
        let mut operands = vec![None; LSTM_NUM_OPERANDS];
        operands[0] = Some(x);
        let lstm = graph.add_node(
            Op::Lstm {
                kind: RecurrentKind::Lstm,
                operands,
            },
            ty(),
        );
        let instance = LstmInstance::new(&mut graph, lstm).unwrap();
        assert_eq!(instance.operand(0), Some(x));
        assert!(instance.defining_node(0).is_none());
        assert!(instance.intermediate_type(4).is_none());
    }
}
