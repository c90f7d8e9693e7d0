//! Operator Property Table
//!
//! Static description of how each tensor of an LSTM variant is quantized:
//! bit width, whether its scale is derived from other tensors, whether it
//! is a power-of-two state tensor. Built once for every variant and shared
//! read-only afterwards.
//!
//! Operand layout shared by both LSTM flavours:
//!
//! | slot  | tensor                                   |
//! |-------|------------------------------------------|
//! | 0     | input activation                         |
//! | 1–4   | input-to-{input,forget,cell,output} weights |
//! | 5–8   | recurrent-to-gate weights                |
//! | 9–11  | cell-to-{input,forget,output} (peephole) |
//! | 12–15 | gate biases                              |
//! | 16–17 | projection weights and bias              |
//! | 18    | output (activation) state                |
//! | 19    | cell state                               |
//! | 20–23 | layer-norm coefficients                  |
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use std::sync::OnceLock;

use axonml_graph::RecurrentKind;
use rustc_hash::FxHashMap;

// =============================================================================
// Operand Slots
// =============================================================================

/// Number of operands of an LSTM node.
pub const LSTM_NUM_OPERANDS: usize = 24;

/// Input activation.
pub const INPUT: usize = 0;
/// First input-to-gate weight.
pub const INPUT_TO_INPUT_WEIGHTS: usize = 1;
/// First recurrent-to-gate weight.
pub const RECURRENT_TO_INPUT_WEIGHTS: usize = 5;
/// Peephole weight for the output gate.
pub const CELL_TO_OUTPUT_WEIGHTS: usize = 11;
/// First gate bias.
pub const INPUT_GATE_BIAS: usize = 12;
/// Projection weights.
pub const PROJECTION_WEIGHTS: usize = 16;
/// Projection bias.
pub const PROJECTION_BIAS: usize = 17;
/// Output (activation) state.
pub const OUTPUT_STATE: usize = 18;
/// Cell state.
pub const CELL_STATE: usize = 19;
/// Layer-norm coefficient for the input gate.
pub const INPUT_LAYER_NORM_COEFFICIENTS: usize = 20;
/// Layer-norm coefficient for the forget gate.
pub const FORGET_LAYER_NORM_COEFFICIENTS: usize = 21;

/// Intermediate carrying the effective hidden scale.
pub const EFFECTIVE_HIDDEN_SCALE_INTERMEDIATE: usize = 4;

/// Attribute names of the five intermediates, by index.
pub const INTERMEDIATE_ATTRIBUTES: [&str; 5] = [
    "input_to_input_intermediate",
    "input_to_forget_intermediate",
    "input_to_cell_intermediate",
    "input_to_output_intermediate",
    "effective_hidden_scale_intermediate",
];

// =============================================================================
// Variants
// =============================================================================

/// Operator code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    /// Single-step LSTM.
    Lstm,
    /// Sequence LSTM.
    UnidirectionalSequenceLstm,
}

impl From<RecurrentKind> for OpCode {
    fn from(kind: RecurrentKind) -> Self {
        match kind {
            RecurrentKind::Lstm => Self::Lstm,
            RecurrentKind::UnidirectionalSequenceLstm => Self::UnidirectionalSequenceLstm,
        }
    }
}

/// Operator code plus the optional features a matched instance enables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpVariant {
    /// Operator code.
    pub op_code: OpCode,
    /// Projection weights present.
    pub use_projection: bool,
    /// Peephole weights present.
    pub use_peephole: bool,
    /// Layer-norm coefficients present.
    pub use_layer_norm: bool,
}

impl OpVariant {
    /// Creates a variant.
    pub fn new(op_code: OpCode, use_projection: bool, use_peephole: bool, use_layer_norm: bool) -> Self {
        Self {
            op_code,
            use_projection,
            use_peephole,
            use_layer_norm,
        }
    }

    /// Every variant the table knows about.
    pub fn all() -> impl Iterator<Item = Self> {
        [OpCode::Lstm, OpCode::UnidirectionalSequenceLstm]
            .into_iter()
            .flat_map(|op_code| {
                (0..8u8).map(move |bits| {
                    Self::new(op_code, bits & 1 != 0, bits & 2 != 0, bits & 4 != 0)
                })
            })
    }
}

// =============================================================================
// Tensor Properties
// =============================================================================

/// Scale computed as a product of other tensors' scales and constant factors.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DerivedScale {
    /// Operand slots whose scales are multiplied in.
    pub input_tensors: Vec<usize>,
    /// Intermediate indices whose scales are multiplied in.
    pub intermediate_tensors: Vec<usize>,
    /// Constant factors.
    pub factors: Vec<f32>,
}

/// Quantization role of one tensor slot.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorProperty {
    /// Storage width.
    pub number_of_bits: u32,
    /// Scale comes from [`TensorProperty::derived_scale`].
    pub use_derived_scale: bool,
    /// Dependencies of a derived scale.
    pub derived_scale: DerivedScale,
    /// Widen the range bound to the next power of two.
    pub extend_to_power_of_two: bool,
    /// Recurrent state carried across invocations.
    pub state_tensor: bool,
}

impl Default for TensorProperty {
    fn default() -> Self {
        Self {
            number_of_bits: 8,
            use_derived_scale: false,
            derived_scale: DerivedScale::default(),
            extend_to_power_of_two: false,
            state_tensor: false,
        }
    }
}

impl TensorProperty {
    /// Weight at the given width. Weights are always quantized symmetrically.
    pub fn weight(bits: u32) -> Self {
        Self {
            number_of_bits: bits,
            ..Self::default()
        }
    }

    /// 32-bit bias whose scale is derived from other tensors.
    pub fn derived(input_tensors: Vec<usize>, intermediate_tensors: Vec<usize>, factors: Vec<f32>) -> Self {
        Self {
            number_of_bits: 32,
            use_derived_scale: true,
            derived_scale: DerivedScale {
                input_tensors,
                intermediate_tensors,
                factors,
            },
            ..Self::default()
        }
    }

    /// Builder: width.
    pub fn bits(mut self, bits: u32) -> Self {
        self.number_of_bits = bits;
        self
    }

    /// Builder: mark as state tensor.
    pub fn state(mut self) -> Self {
        self.state_tensor = true;
        self
    }

    /// Builder: extend to power-of-two range.
    pub fn power_of_two(mut self) -> Self {
        self.extend_to_power_of_two = true;
        self
    }
}

/// Properties of every quantized tensor of one operator variant.
///
/// `inputs` is listed in processing order: a derived-scale entry always
/// follows the entries it depends on.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OperatorProperty {
    /// Operand slot properties.
    pub inputs: Vec<(usize, TensorProperty)>,
    /// Intermediate properties.
    pub intermediates: Vec<(usize, TensorProperty)>,
}

impl OperatorProperty {
    /// Property of operand `index`.
    pub fn input(&self, index: usize) -> Option<&TensorProperty> {
        self.inputs.iter().find(|(i, _)| *i == index).map(|(_, p)| p)
    }

    /// Property of intermediate `index`.
    pub fn intermediate(&self, index: usize) -> Option<&TensorProperty> {
        self.intermediates.iter().find(|(i, _)| *i == index).map(|(_, p)| p)
    }
}

// =============================================================================
// Table
// =============================================================================

/// Fixed-point scale of layer-norm coefficients folded into gate biases.
fn layer_norm_bias_factor() -> f32 {
    2f32.powi(-10)
}

fn lstm_property(variant: &OpVariant) -> OperatorProperty {
    let mut inputs = vec![(INPUT, TensorProperty::default())];

    for slot in INPUT_TO_INPUT_WEIGHTS..INPUT_TO_INPUT_WEIGHTS + 8 {
        inputs.push((slot, TensorProperty::weight(8)));
    }
    if variant.use_peephole {
        for slot in 9..=CELL_TO_OUTPUT_WEIGHTS {
            inputs.push((slot, TensorProperty::weight(16)));
        }
    }
    if variant.use_projection {
        inputs.push((PROJECTION_WEIGHTS, TensorProperty::weight(8)));
    }
    inputs.push((OUTPUT_STATE, TensorProperty::default().state()));
    inputs.push((CELL_STATE, TensorProperty::default().bits(16).power_of_two().state()));
    if variant.use_layer_norm {
        for slot in INPUT_LAYER_NORM_COEFFICIENTS..INPUT_LAYER_NORM_COEFFICIENTS + 4 {
            inputs.push((slot, TensorProperty::weight(16)));
        }
    }

    for gate in 0..4 {
        let bias = if variant.use_layer_norm {
            TensorProperty::derived(
                vec![INPUT_LAYER_NORM_COEFFICIENTS + gate],
                vec![],
                vec![layer_norm_bias_factor()],
            )
        } else {
            TensorProperty::derived(vec![INPUT, INPUT_TO_INPUT_WEIGHTS + gate], vec![], vec![])
        };
        inputs.push((INPUT_GATE_BIAS + gate, bias));
    }
    if variant.use_projection {
        inputs.push((
            PROJECTION_BIAS,
            TensorProperty::derived(
                vec![PROJECTION_WEIGHTS],
                vec![EFFECTIVE_HIDDEN_SCALE_INTERMEDIATE],
                vec![],
            ),
        ));
    }

    let mut intermediates: Vec<(usize, TensorProperty)> =
        (0..4).map(|i| (i, TensorProperty::weight(16))).collect();
    intermediates.push((EFFECTIVE_HIDDEN_SCALE_INTERMEDIATE, TensorProperty::default()));

    OperatorProperty {
        inputs,
        intermediates,
    }
}

static PROPERTY_TABLE: OnceLock<FxHashMap<OpVariant, OperatorProperty>> = OnceLock::new();

/// Returns the property table entry for `variant`.
pub fn operator_property(variant: &OpVariant) -> &'static OperatorProperty {
    static EMPTY: OperatorProperty = OperatorProperty {
        inputs: Vec::new(),
        intermediates: Vec::new(),
    };
    PROPERTY_TABLE
        .get_or_init(|| OpVariant::all().map(|v| (v, lstm_property(&v))).collect())
        .get(variant)
        .unwrap_or(&EMPTY)
}

// =============================================================================
// Tests
// =============================================================================
