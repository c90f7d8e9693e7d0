//! Intermediate Representation
//!
//! Defines the graph-based IR that quantization passes rewrite. Nodes live
//! in an arena indexed by [`NodeId`]; a separate list records program order
//! so rewrites can insert new nodes at a precise position without
//! invalidating existing ids.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use std::fmt;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{GraphError, GraphResult};
use crate::types::{ConstantData, TensorType};

/// Unique identifier for a node in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Returns the raw index.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

// =============================================================================
// Operations
// =============================================================================

/// Flavour of a recurrent cell operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecurrentKind {
    /// Single-step LSTM.
    Lstm,
    /// LSTM unrolled over a time dimension.
    UnidirectionalSequenceLstm,
}

/// Operations in the graph.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum Op {
    /// Graph argument. Has no defining operation.
    Input { name: String },
    /// Output marker.
    Output { name: String, input: NodeId },
    /// Dense constant.
    Constant { value: ConstantData },
    /// Float value annotated with collected statistics (`[min, max]`).
    Statistics { input: NodeId, layer_stats: Vec<f64> },
    /// Float to quantized cast.
    Quantize { input: NodeId },
    /// Quantized to float cast.
    Dequantize { input: NodeId },
    /// Recurrent cell with positional, possibly absent, operands.
    Lstm {
        kind: RecurrentKind,
        operands: Vec<Option<NodeId>>,
    },

    /// Element-wise addition.
    Add { lhs: NodeId, rhs: NodeId },
    /// Element-wise multiplication.
    Mul { lhs: NodeId, rhs: NodeId },
    /// Matrix multiplication.
    MatMul { lhs: NodeId, rhs: NodeId },
    /// Hyperbolic tangent.
    Tanh { input: NodeId },
    /// Sigmoid activation.
    Sigmoid { input: NodeId },
}

impl Op {
    /// Returns the positional operands. Absent optional operands are `None`.
    pub fn operands(&self) -> Vec<Option<NodeId>> {
        match self {
            Self::Input { .. } | Self::Constant { .. } => vec![],
            Self::Output { input, .. }
            | Self::Statistics { input, .. }
            | Self::Quantize { input }
            | Self::Dequantize { input }
            | Self::Tanh { input }
            | Self::Sigmoid { input } => vec![Some(*input)],
            Self::Add { lhs, rhs } | Self::Mul { lhs, rhs } | Self::MatMul { lhs, rhs } => {
                vec![Some(*lhs), Some(*rhs)]
            }
            Self::Lstm { operands, .. } => operands.clone(),
        }
    }

    /// Returns the node IDs this operation reads.
    pub fn inputs(&self) -> Vec<NodeId> {
        self.operands().into_iter().flatten().collect()
    }

    /// Points operand `slot` at `value`. Returns `false` if the slot does not exist.
    pub fn set_operand(&mut self, slot: usize, value: NodeId) -> bool {
        let target = match (self, slot) {
            (
                Self::Output { input, .. }
                | Self::Statistics { input, .. }
                | Self::Quantize { input }
                | Self::Dequantize { input }
                | Self::Tanh { input }
                | Self::Sigmoid { input },
                0,
            ) => input,
            (Self::Add { lhs, .. } | Self::Mul { lhs, .. } | Self::MatMul { lhs, .. }, 0) => lhs,
            (Self::Add { rhs, .. } | Self::Mul { rhs, .. } | Self::MatMul { rhs, .. }, 1) => rhs,
            (Self::Lstm { operands, .. }, slot) if slot < operands.len() => {
                operands[slot] = Some(value);
                return true;
            }
            _ => return false,
        };
        *target = value;
        true
    }

    /// Rewrites every operand equal to `old` into `new`. Returns the count.
    fn replace_uses(&mut self, old: NodeId, new: NodeId) -> usize {
        let slots: Vec<usize> = self
            .operands()
            .iter()
            .enumerate()
            .filter(|(_, operand)| **operand == Some(old))
            .map(|(slot, _)| slot)
            .collect();
        for &slot in &slots {
            self.set_operand(slot, new);
        }
        slots.len()
    }

    /// Mnemonic used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Input { .. } => "input",
            Self::Output { .. } => "output",
            Self::Constant { .. } => "const",
            Self::Statistics { .. } => "quant.stats",
            Self::Quantize { .. } => "quant.qcast",
            Self::Dequantize { .. } => "quant.dcast",
            Self::Lstm {
                kind: RecurrentKind::Lstm,
                ..
            } => "lstm",
            Self::Lstm {
                kind: RecurrentKind::UnidirectionalSequenceLstm,
                ..
            } => "unidirectional_sequence_lstm",
            Self::Add { .. } => "add",
            Self::Mul { .. } => "mul",
            Self::MatMul { .. } => "matmul",
            Self::Tanh { .. } => "tanh",
            Self::Sigmoid { .. } => "sigmoid",
        }
    }
}

/// Attribute value attached to a node.
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    /// A type.
    Type(TensorType),
}

impl Attribute {
    /// Returns the type, if this is a type attribute.
    pub fn as_type(&self) -> Option<&TensorType> {
        match self {
            Self::Type(ty) => Some(ty),
        }
    }
}

/// A node in the computation graph.
#[derive(Debug, Clone)]
pub struct Node {
    /// Unique identifier.
    pub id: NodeId,
    /// Operation performed by this node.
    pub op: Op,
    /// Result type.
    pub ty: TensorType,
    /// Named attributes.
    pub attrs: FxHashMap<String, Attribute>,
}

// =============================================================================
// Graph
// =============================================================================

/// Computation graph.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    /// Node arena. Erased nodes stay here so ids remain stable.
    nodes: Vec<Node>,
    /// Live nodes in program order.
    order: Vec<NodeId>,
    erased: FxHashSet<NodeId>,
    inputs: FxHashMap<String, NodeId>,
    outputs: FxHashMap<String, NodeId>,
}

impl Graph {
    /// Creates a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, op: Op, ty: TensorType) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            id,
            op,
            ty,
            attrs: FxHashMap::default(),
        });
        id
    }

    /// Appends a node at the end of the program.
    pub fn add_node(&mut self, op: Op, ty: TensorType) -> NodeId {
        let id = self.push(op, ty);
        self.order.push(id);
        id
    }

    /// Inserts a node immediately after `anchor` in program order.
    pub fn insert_after(&mut self, anchor: NodeId, op: Op, ty: TensorType) -> GraphResult<NodeId> {
        let pos = self.position(anchor).ok_or_else(|| self.missing(anchor))?;
        let id = self.push(op, ty);
        self.order.insert(pos + 1, id);
        Ok(id)
    }

    /// Registers an input node.
    pub fn register_input(&mut self, name: &str, id: NodeId) {
        self.inputs.insert(name.to_string(), id);
    }

    /// Registers an output node.
    pub fn register_output(&mut self, name: &str, id: NodeId) {
        self.outputs.insert(name.to_string(), id);
    }

    /// Returns the node for an ID.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Returns a live node, or an error if it is unknown or erased.
    pub fn get(&self, id: NodeId) -> GraphResult<&Node> {
        match self.nodes.get(id.0) {
            Some(_) if self.erased.contains(&id) => Err(GraphError::ErasedNode(id)),
            Some(node) => Ok(node),
            None => Err(GraphError::NodeNotFound(id)),
        }
    }

    /// Mutable variant of [`Graph::get`].
    pub fn get_mut(&mut self, id: NodeId) -> GraphResult<&mut Node> {
        if self.erased.contains(&id) {
            return Err(GraphError::ErasedNode(id));
        }
        self.nodes.get_mut(id.0).ok_or(GraphError::NodeNotFound(id))
    }

    fn missing(&self, id: NodeId) -> GraphError {
        if self.erased.contains(&id) {
            GraphError::ErasedNode(id)
        } else {
            GraphError::NodeNotFound(id)
        }
    }

    /// Returns whether `id` is live.
    pub fn is_live(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len() && !self.erased.contains(&id)
    }

    /// Returns live nodes in program order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.order.iter().map(move |id| &self.nodes[id.0])
    }

    /// Returns live node ids in program order.
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    /// Position of a live node in program order.
    pub fn position(&self, id: NodeId) -> Option<usize> {
        self.order.iter().position(|&n| n == id)
    }

    /// Returns the number of live nodes.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns whether the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Returns input names and node IDs.
    pub fn inputs(&self) -> &FxHashMap<String, NodeId> {
        &self.inputs
    }

    /// Returns output names and node IDs.
    pub fn outputs(&self) -> &FxHashMap<String, NodeId> {
        &self.outputs
    }

    // -------------------------------------------------------------------------
    // Use lists
    // -------------------------------------------------------------------------

    /// Returns every live user of `id`, once per operand that reads it.
    pub fn uses(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes()
            .flat_map(|node| {
                node.op
                    .inputs()
                    .into_iter()
                    .filter(move |&input| input == id)
                    .map(move |_| node.id)
            })
            .collect()
    }

    /// Number of operand uses of `id`.
    pub fn num_uses(&self, id: NodeId) -> usize {
        self.uses(id).len()
    }

    /// Whether `id` is read by exactly one operand.
    pub fn has_one_use(&self, id: NodeId) -> bool {
        self.num_uses(id) == 1
    }

    // -------------------------------------------------------------------------
    // Rewriting
    // -------------------------------------------------------------------------

    /// Points operand `slot` of `user` at `value`.
    pub fn set_operand(&mut self, user: NodeId, slot: usize, value: NodeId) -> GraphResult<()> {
        if !self.is_live(value) {
            return Err(self.missing(value));
        }
        let node = self.get_mut(user)?;
        if node.op.set_operand(slot, value) {
            Ok(())
        } else {
            Err(GraphError::OperandOutOfRange { node: user, slot })
        }
    }

    /// Redirects every use of `old` to `new`. Returns the number of rewired operands.
    pub fn replace_all_uses(&mut self, old: NodeId, new: NodeId) -> GraphResult<usize> {
        if !self.is_live(new) {
            return Err(self.missing(new));
        }
        let mut count = 0;
        for &id in &self.order {
            if id != new {
                count += self.nodes[id.0].op.replace_uses(old, new);
            }
        }
        Ok(count)
    }

    /// Removes a node that has no remaining uses.
    pub fn erase(&mut self, id: NodeId) -> GraphResult<()> {
        let pos = self.position(id).ok_or_else(|| self.missing(id))?;
        let uses = self.num_uses(id);
        if uses > 0 {
            return Err(GraphError::InvalidGraph(format!(
                "cannot erase {id}: it still has {uses} use(s)"
            )));
        }
        self.order.remove(pos);
        self.erased.insert(id);
        self.inputs.retain(|_, n| *n != id);
        self.outputs.retain(|_, n| *n != id);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Attributes
    // -------------------------------------------------------------------------

    /// Returns a named attribute.
    pub fn attr(&self, id: NodeId, name: &str) -> Option<&Attribute> {
        self.get(id).ok().and_then(|node| node.attrs.get(name))
    }

    /// Sets a named attribute.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: Attribute) -> GraphResult<()> {
        self.get_mut(id)?.attrs.insert(name.to_string(), value);
        Ok(())
    }

    /// Validates the graph structure.
    pub fn validate(&self) -> GraphResult<()> {
        let positions: FxHashMap<NodeId, usize> =
            self.order.iter().enumerate().map(|(pos, &id)| (id, pos)).collect();

        for (pos, node) in self.nodes().enumerate() {
            for input_id in node.op.inputs() {
                match positions.get(&input_id) {
                    None => {
                        return Err(GraphError::InvalidGraph(format!(
                            "node {} references dead or unknown value {}",
                            node.id, input_id
                        )))
                    }
                    Some(&input_pos) if input_pos >= pos => {
                        return Err(GraphError::InvalidGraph(format!(
                            "node {} uses {} before it is defined",
                            node.id, input_id
                        )))
                    }
                    Some(_) => {}
                }
            }
        }

        for (name, id) in &self.inputs {
            if !matches!(self.get(*id)?.op, Op::Input { .. }) {
                return Err(GraphError::InvalidGraph(format!(
                    "input '{name}' points to non-input node"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FloatType;

    fn f32_ty() -> TensorType {
        TensorType::float(FloatType::F32, &[2, 3])
    }

    #[test]
    fn test_graph_creation() {
        let mut graph = Graph::new();

        let input = graph.add_node(Op::Input { name: "x".to_string() }, f32_ty());
        graph.register_input("x", input);

        let tanh = graph.add_node(Op::Tanh { input }, f32_ty());
        let output = graph.add_node(
            Op::Output {
                name: "y".to_string(),
                input: tanh,
            },
            f32_ty(),
        );
        graph.register_output("y", output);

        assert_eq!(graph.len(), 3);
        assert!(graph.validate().is_ok());
        assert!(graph.has_one_use(input));
    }

    #[test]
    fn test_insert_after_keeps_order() {
        let mut graph = Graph::new();
        let a = graph.add_node(Op::Input { name: "a".to_string() }, f32_ty());
        let b = graph.add_node(Op::Tanh { input: a }, f32_ty());

        let q = graph.insert_after(a, Op::Quantize { input: a }, f32_ty()).unwrap();
        let dq = graph.insert_after(q, Op::Dequantize { input: q }, f32_ty()).unwrap();
        graph.set_operand(b, 0, dq).unwrap();

        assert_eq!(graph.order(), &[a, q, dq, b]);
        assert!(graph.validate().is_ok());
        assert_eq!(graph.uses(dq), vec![b]);
    }

    #[test]
    fn test_replace_and_erase() {
        let mut graph = Graph::new();
        let a = graph.add_node(Op::Input { name: "a".to_string() }, f32_ty());
        let s = graph.add_node(
            Op::Statistics {
                input: a,
                layer_stats: vec![-1.0, 1.0],
            },
            f32_ty(),
        );
        let m = graph.add_node(Op::Mul { lhs: s, rhs: s }, f32_ty());
        assert_eq!(graph.num_uses(s), 2);

        assert!(graph.erase(s).is_err());

        let t = graph.insert_after(s, Op::Tanh { input: a }, f32_ty()).unwrap();
        assert_eq!(graph.replace_all_uses(s, t).unwrap(), 2);
        graph.erase(s).unwrap();

        assert!(!graph.is_live(s));
        assert_eq!(graph.get(s).unwrap_err(), GraphError::ErasedNode(s));
        assert_eq!(graph.node(m).op, Op::Mul { lhs: t, rhs: t });
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn test_lstm_operands() {
        let mut graph = Graph::new();
        let x = graph.add_node(Op::Input { name: "x".to_string() }, f32_ty());
        let mut operands = vec![None; 24];
        operands[0] = Some(x);
        let lstm = graph.add_node(
            Op::Lstm {
                kind: RecurrentKind::Lstm,
                operands,
            },
            f32_ty(),
        );

        assert_eq!(graph.node(lstm).op.inputs(), vec![x]);
        assert!(graph.set_operand(lstm, 23, x).is_ok());
        assert_eq!(
            graph.set_operand(lstm, 24, x),
            Err(GraphError::OperandOutOfRange { node: lstm, slot: 24 })
        );
    }

    #[test]
    fn test_validate_use_before_def() {
        let mut graph = Graph::new();
        let a = graph.add_node(Op::Input { name: "a".to_string() }, f32_ty());
        let b = graph.add_node(Op::Tanh { input: a }, f32_ty());
        graph.get_mut(a).unwrap().op = Op::Sigmoid { input: b };
        assert!(graph.validate().is_err());
    }
}
