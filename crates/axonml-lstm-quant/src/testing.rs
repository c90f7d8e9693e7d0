//! Graph builders shared by the unit tests.

use axonml_graph::{
    CalibratedQuantizedType, ConstantData, FloatType, Graph, NodeId, Op, QuantizedType,
    RecurrentKind, TensorType, UniformQuantizedType,
};

use crate::property::{
    CELL_STATE, INPUT, INPUT_GATE_BIAS, LSTM_NUM_OPERANDS,
    OUTPUT_STATE, PROJECTION_BIAS, PROJECTION_WEIGHTS,
};

pub(crate) fn f32_ty() -> TensorType {
    TensorType::float(FloatType::F32, &[4])
}

pub(crate) fn constant(graph: &mut Graph, values: Vec<f32>) -> NodeId {
    let dims = [values.len()];
    graph.add_node(
        Op::Constant {
            value: ConstantData::F32(values),
        },
        TensorType::float(FloatType::F32, &dims),
    )
}

pub(crate) fn input(graph: &mut Graph, name: &str) -> NodeId {
    let id = graph.add_node(Op::Input { name: name.to_string() }, f32_ty());
    graph.register_input(name, id);
    id
}

pub(crate) fn stats(graph: &mut Graph, input: NodeId, min: f64, max: f64) -> NodeId {
    graph.add_node(
        Op::Statistics {
            input,
            layer_stats: vec![min, max],
        },
        f32_ty(),
    )
}

pub(crate) fn uniform(bits: u32, scale: f64) -> UniformQuantizedType {
    let max = (1i64 << (bits - 1)) - 1;
    UniformQuantizedType::new_checked(true, bits, FloatType::F32, scale, 0, -max, max).unwrap()
}

/// Constant -> quantize -> dequantize chain carrying `scale`. Returns the dequantize.
pub(crate) fn dequantized(graph: &mut Graph, bits: u32, scale: f64) -> NodeId {
    let c = constant(graph, vec![0.0; 4]);
    let q_ty = f32_ty().cast_from_expressed(uniform(bits, scale).into()).unwrap();
    let q = graph.add_node(Op::Quantize { input: c }, q_ty);
    graph.add_node(Op::Dequantize { input: q }, f32_ty())
}

pub(crate) fn calibrated_attr(min: f64, max: f64) -> TensorType {
    f32_ty().with_element(axonml_graph::ElementType::Quantized(QuantizedType::Calibrated(
        CalibratedQuantizedType::new(FloatType::F32, min, max),
    )))
}

pub(crate) fn quantized_attr(bits: u32, scale: f64) -> TensorType {
    f32_ty().cast_from_expressed(uniform(bits, scale).into()).unwrap()
}

pub(crate) fn lstm(graph: &mut Graph, operands: Vec<Option<NodeId>>) -> NodeId {
    graph.add_node(
        Op::Lstm {
            kind: RecurrentKind::Lstm,
            operands,
        },
        f32_ty(),
    )
}

/// Options for [`build_lstm`].
#[derive(Default, Clone, Copy)]
pub(crate) struct Features {
    pub projection: bool,
    pub peephole: bool,
    pub layer_norm: bool,
}

/// Fully populated LSTM: calibrated input and states, constant weights and biases.
pub(crate) fn build_lstm(graph: &mut Graph, features: Features) -> NodeId {
    let mut operands = vec![None; LSTM_NUM_OPERANDS];

    let x = input(graph, "x");
    operands[INPUT] = Some(stats(graph, x, -3.5, 7.0));

    for slot in 1..=8 {
        operands[slot] = Some(constant(graph, vec![0.5, -1.0, 0.25, 0.75]));
    }
    if features.peephole {
        for slot in 9..=11 {
            operands[slot] = Some(constant(graph, vec![0.1, -0.2, 0.3, -0.4]));
        }
    }
    for gate in 0..4 {
        operands[INPUT_GATE_BIAS + gate] = Some(constant(graph, vec![0.01, 0.02, -0.03, 0.0]));
    }
    if features.projection {
        operands[PROJECTION_WEIGHTS] = Some(constant(graph, vec![0.3, -0.6, 0.9, 0.0]));
        operands[PROJECTION_BIAS] = Some(constant(graph, vec![0.0, 0.1, 0.0, -0.1]));
    }

    let h = input(graph, "h");
    operands[OUTPUT_STATE] = Some(stats(graph, h, -1.0, 1.0));
    let c = input(graph, "c");
    operands[CELL_STATE] = Some(stats(graph, c, -3.0, 2.5));

    if features.layer_norm {
        for slot in 20..24 {
            operands[slot] = Some(constant(graph, vec![1.0, 0.9, 1.1, 1.2]));
        }
    }

    lstm(graph, operands)
}
