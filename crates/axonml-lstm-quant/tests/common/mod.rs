//! Common graph builders for integration tests

#![allow(dead_code)]

use axonml_graph::{
    Attribute, CalibratedQuantizedType, ConstantData, ElementType, FloatType, Graph, NodeId, Op,
    QuantizedType, RecurrentKind, TensorType, UniformQuantizedType,
};
use axonml_lstm_quant::{INTERMEDIATE_ATTRIBUTES, LSTM_NUM_OPERANDS};

pub const HIDDEN: usize = 4;

pub fn float_ty() -> TensorType {
    TensorType::float(FloatType::F32, &[1, HIDDEN])
}

pub fn calibrated(min: f64, max: f64) -> TensorType {
    float_ty().with_element(ElementType::Quantized(QuantizedType::Calibrated(
        CalibratedQuantizedType::new(FloatType::F32, min, max),
    )))
}

/// Builder for a single LSTM node fed by calibrated activations and
/// constant parameters.
pub struct LstmBuilder {
    kind: RecurrentKind,
    projection: bool,
    peephole: bool,
    layer_norm: bool,
    intermediates: Vec<(usize, TensorType)>,
}

/// A built LSTM and the values around it.
pub struct BuiltLstm {
    pub graph: Graph,
    pub lstm: NodeId,
    pub output: NodeId,
}

impl LstmBuilder {
    pub fn new() -> Self {
        Self {
            kind: RecurrentKind::Lstm,
            projection: false,
            peephole: false,
            layer_norm: false,
            intermediates: Vec::new(),
        }
    }

    pub fn sequence(mut self) -> Self {
        self.kind = RecurrentKind::UnidirectionalSequenceLstm;
        self
    }

    pub fn projection(mut self) -> Self {
        self.projection = true;
        self
    }

    pub fn peephole(mut self) -> Self {
        self.peephole = true;
        self
    }

    pub fn layer_norm(mut self) -> Self {
        self.layer_norm = true;
        self
    }

    pub fn intermediate(mut self, index: usize, ty: TensorType) -> Self {
        self.intermediates.push((index, ty));
        self
    }

    /// Calibrated ranges for every intermediate the enabled features need.
    pub fn calibrated_intermediates(mut self) -> Self {
        if self.layer_norm {
            for index in 0..4 {
                self.intermediates.push((index, calibrated(-4.0, 4.0)));
            }
        }
        if self.projection {
            self.intermediates.push((4, calibrated(-0.9, 1.1)));
        }
        self
    }

    pub fn build(self) -> BuiltLstm {
        let mut graph = Graph::new();
        let mut operands = vec![None; LSTM_NUM_OPERANDS];

        operands[0] = Some(annotated_input(&mut graph, "input", -3.5, 7.0));
        for slot in 1..=8 {
            let scale = slot as f32 * 0.1;
            operands[slot] = Some(constant(&mut graph, vec![scale, -scale, 0.5, -0.25]));
        }
        if self.peephole {
            for slot in 9..=11 {
                operands[slot] = Some(constant(&mut graph, vec![0.05, -0.1, 0.02, 0.0]));
            }
        }
        for slot in 12..=15 {
            operands[slot] = Some(constant(&mut graph, vec![0.0, 1.0, -0.5, 0.25]));
        }
        if self.projection {
            operands[16] = Some(constant(&mut graph, vec![0.7, -0.3, 0.2, -0.9]));
            operands[17] = Some(constant(&mut graph, vec![0.01, -0.01, 0.0, 0.02]));
        }
        operands[18] = Some(annotated_input(&mut graph, "output_state", -1.0, 1.0));
        operands[19] = Some(annotated_input(&mut graph, "cell_state", -3.0, 2.5));
        if self.layer_norm {
            for slot in 20..=23 {
                operands[slot] = Some(constant(&mut graph, vec![1.0, 0.9, 1.1, 1.2]));
            }
        }

        let lstm = graph.add_node(
            Op::Lstm {
                kind: self.kind,
                operands,
            },
            float_ty(),
        );
        for (index, ty) in self.intermediates {
            graph
                .set_attr(lstm, INTERMEDIATE_ATTRIBUTES[index], Attribute::Type(ty))
                .expect("Failed to set intermediate");
        }
        let output = graph.add_node(
            Op::Output {
                name: "out".to_string(),
                input: lstm,
            },
            float_ty(),
        );
        graph.register_output("out", output);

        BuiltLstm { graph, lstm, output }
    }
}

pub fn constant(graph: &mut Graph, values: Vec<f32>) -> NodeId {
    let dims = [values.len()];
    graph.add_node(
        Op::Constant {
            value: ConstantData::F32(values),
        },
        TensorType::float(FloatType::F32, &dims),
    )
}

/// Graph input followed by a statistics annotation.
pub fn annotated_input(graph: &mut Graph, name: &str, min: f64, max: f64) -> NodeId {
    let input = graph.add_node(Op::Input { name: name.to_string() }, float_ty());
    graph.register_input(name, input);
    graph.add_node(
        Op::Statistics {
            input,
            layer_stats: vec![min, max],
        },
        float_ty(),
    )
}

/// Operand of `lstm` at `slot`.
pub fn operand(graph: &Graph, lstm: NodeId, slot: usize) -> Option<NodeId> {
    match &graph.node(lstm).op {
        Op::Lstm { operands, .. } => operands[slot],
        _ => None,
    }
}

/// Uniform type recorded by the quantize feeding operand `slot`.
pub fn operand_type(graph: &Graph, lstm: NodeId, slot: usize) -> UniformQuantizedType {
    let dq = operand(graph, lstm, slot).expect("operand is absent");
    let Op::Dequantize { input } = graph.node(dq).op else {
        panic!("operand {slot} is not fed by a dequantize");
    };
    assert!(matches!(graph.node(input).op, Op::Quantize { .. }));
    graph
        .node(input)
        .ty
        .quantized_element()
        .and_then(QuantizedType::as_uniform)
        .cloned()
        .expect("quantize does not carry a uniform type")
}

/// Uniform type stored in intermediate attribute `index`.
pub fn intermediate_type(graph: &Graph, lstm: NodeId, index: usize) -> UniformQuantizedType {
    graph
        .attr(lstm, INTERMEDIATE_ATTRIBUTES[index])
        .and_then(Attribute::as_type)
        .and_then(TensorType::quantized_element)
        .and_then(QuantizedType::as_uniform)
        .cloned()
        .expect("intermediate is not uniform quantized")
}

pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-12_f64.max(b.abs() * 1e-9)
}
