//! Value Types
//!
//! Element types, shapes, and constant payloads carried by graph values.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use std::fmt;

use half::f16;

use crate::quant::QuantizedType;

// =============================================================================
// Element Types
// =============================================================================

/// Floating-point element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FloatType {
    /// 16-bit IEEE half precision.
    F16,
    /// 32-bit floating point.
    #[default]
    F32,
    /// 64-bit floating point.
    F64,
}

impl FloatType {
    /// Width in bits.
    pub fn bits(self) -> u32 {
        match self {
            Self::F16 => 16,
            Self::F32 => 32,
            Self::F64 => 64,
        }
    }
}

impl fmt::Display for FloatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f{}", self.bits())
    }
}

/// Element type of a tensor value.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementType {
    /// Floating point.
    Float(FloatType),
    /// Signless integer of the given width.
    Int(u32),
    /// Boolean.
    Bool,
    /// Quantized storage with a float expressed type.
    Quantized(QuantizedType),
}

impl ElementType {
    /// Returns whether this is a floating-point element.
    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float(_))
    }

    /// Returns the quantized element, if any.
    pub fn as_quantized(&self) -> Option<&QuantizedType> {
        match self {
            Self::Quantized(q) => Some(q),
            _ => None,
        }
    }
}

impl Default for ElementType {
    fn default() -> Self {
        Self::Float(FloatType::F32)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float(ft) => write!(f, "{ft}"),
            Self::Int(bits) => write!(f, "i{bits}"),
            Self::Bool => write!(f, "i1"),
            Self::Quantized(q) => write!(f, "{q}"),
        }
    }
}

// =============================================================================
// Shapes
// =============================================================================

/// Shape of a tensor (dimensions).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Shape(pub Vec<usize>);

impl Shape {
    /// Creates a new shape.
    pub fn new(dims: &[usize]) -> Self {
        Self(dims.to_vec())
    }

    /// Returns the dimensions.
    pub fn dims(&self) -> &[usize] {
        &self.0
    }

}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Self::new(dims)
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Self(dims)
    }
}

// =============================================================================
// Tensor Types
// =============================================================================

/// Type of a tensor value: element type plus shape.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TensorType {
    /// Element type.
    pub element: ElementType,
    /// Shape.
    pub shape: Shape,
}

impl TensorType {
    /// Creates a tensor type.
    pub fn new(element: ElementType, dims: &[usize]) -> Self {
        Self {
            element,
            shape: Shape::new(dims),
        }
    }

    /// Creates a floating-point tensor type.
    pub fn float(ft: FloatType, dims: &[usize]) -> Self {
        Self::new(ElementType::Float(ft), dims)
    }

    /// Returns the same shape with a different element type.
    pub fn with_element(&self, element: ElementType) -> Self {
        Self {
            element,
            shape: self.shape.clone(),
        }
    }

    /// Returns the quantized element type, if any.
    pub fn quantized_element(&self) -> Option<&QuantizedType> {
        self.element.as_quantized()
    }

    /// Replaces a float element matching the quantized type's expressed
    /// type with the quantized type. Returns `None` on a mismatch.
    pub fn cast_from_expressed(&self, qtype: QuantizedType) -> Option<Self> {
        match &self.element {
            ElementType::Float(ft) if *ft == qtype.expressed_type() => {
                Some(self.with_element(ElementType::Quantized(qtype)))
            }
            _ => None,
        }
    }

    /// Replaces a quantized element with its expressed float type.
    /// Float types are returned unchanged.
    pub fn cast_to_expressed(&self) -> Option<Self> {
        match &self.element {
            ElementType::Quantized(q) => {
                Some(self.with_element(ElementType::Float(q.expressed_type())))
            }
            ElementType::Float(_) => Some(self.clone()),
            _ => None,
        }
    }
}

impl fmt::Display for TensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tensor<")?;
        for d in self.shape.dims() {
            write!(f, "{d}x")?;
        }
        write!(f, "{}>", self.element)
    }
}

// =============================================================================
// Constant Payloads
// =============================================================================

/// Dense payload of a constant node.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantData {
    /// Half-precision values.
    F16(Vec<f16>),
    /// Single-precision values.
    F32(Vec<f32>),
    /// Double-precision values.
    F64(Vec<f64>),
    /// 32-bit integers.
    I32(Vec<i32>),
    /// 64-bit integers.
    I64(Vec<i64>),
}

impl ConstantData {
    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            Self::F16(v) => v.len(),
            Self::F32(v) => v.len(),
            Self::F64(v) => v.len(),
            Self::I32(v) => v.len(),
            Self::I64(v) => v.len(),
        }
    }

    /// Returns whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Float type of the payload, if it holds floats.
    pub fn float_type(&self) -> Option<FloatType> {
        match self {
            Self::F16(_) => Some(FloatType::F16),
            Self::F32(_) => Some(FloatType::F32),
            Self::F64(_) => Some(FloatType::F64),
            Self::I32(_) | Self::I64(_) => None,
        }
    }

    /// Widens float payloads to `f64`. Integer payloads yield `None`.
    pub fn values_f64(&self) -> Option<Vec<f64>> {
        match self {
            Self::F16(v) => Some(v.iter().map(|x| f64::from(x.to_f32())).collect()),
            Self::F32(v) => Some(v.iter().map(|&x| f64::from(x)).collect()),
            Self::F64(v) => Some(v.clone()),
            Self::I32(_) | Self::I64(_) => None,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
