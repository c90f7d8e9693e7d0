//! Quantized Element Types
//!
//! Uniform, per-axis, and calibrated quantized element types. A uniform
//! type maps a stored integer `q` to the real value `scale * (q - zero_point)`.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use std::fmt;

use crate::error::{GraphError, GraphResult};
use crate::types::FloatType;

// =============================================================================
// Storage Limits
// =============================================================================

/// Smallest signed value representable in `bits` bits.
pub fn min_int_n(bits: u32) -> i64 {
    -(1i64 << (bits - 1))
}

/// Largest signed value representable in `bits` bits.
pub fn max_int_n(bits: u32) -> i64 {
    (1i64 << (bits - 1)) - 1
}

/// Largest unsigned value representable in `bits` bits.
pub fn max_uint_n(bits: u32) -> i64 {
    (1i64 << bits) - 1
}

fn check_storage(signed: bool, bits: u32, storage_min: i64, storage_max: i64) -> GraphResult<()> {
    if bits == 0 || bits > 32 {
        return Err(GraphError::InvalidQuantizedType(format!(
            "illegal storage type size: {bits}"
        )));
    }
    let (lo, hi) = if signed {
        (min_int_n(bits), max_int_n(bits))
    } else {
        (0, max_uint_n(bits))
    };
    if storage_min < lo || storage_max > hi || storage_min > storage_max {
        return Err(GraphError::InvalidQuantizedType(format!(
            "storage range [{storage_min}, {storage_max}] exceeds {bits}-bit limits [{lo}, {hi}]"
        )));
    }
    Ok(())
}

fn check_scale(scale: f64, zero_point: i64, storage_min: i64, storage_max: i64) -> GraphResult<()> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(GraphError::InvalidQuantizedType(format!(
            "scale must be finite and positive, got {scale}"
        )));
    }
    if zero_point < storage_min || zero_point > storage_max {
        return Err(GraphError::InvalidQuantizedType(format!(
            "zero point {zero_point} outside storage range [{storage_min}, {storage_max}]"
        )));
    }
    Ok(())
}

// =============================================================================
// Uniform Quantized Type
// =============================================================================

/// Per-tensor affine quantization.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformQuantizedType {
    signed: bool,
    storage_bits: u32,
    expressed: FloatType,
    scale: f64,
    zero_point: i64,
    storage_min: i64,
    storage_max: i64,
}

impl UniformQuantizedType {
    /// Creates a uniform type, validating scale, zero point, and storage range.
    pub fn new_checked(
        signed: bool,
        storage_bits: u32,
        expressed: FloatType,
        scale: f64,
        zero_point: i64,
        storage_min: i64,
        storage_max: i64,
    ) -> GraphResult<Self> {
        check_storage(signed, storage_bits, storage_min, storage_max)?;
        check_scale(scale, zero_point, storage_min, storage_max)?;
        Ok(Self {
            signed,
            storage_bits,
            expressed,
            scale,
            zero_point,
            storage_min,
            storage_max,
        })
    }

    /// Whether storage is signed.
    pub fn is_signed(&self) -> bool {
        self.signed
    }

    /// Storage width in bits.
    pub fn storage_bits(&self) -> u32 {
        self.storage_bits
    }

    /// Expressed float type.
    pub fn expressed_type(&self) -> FloatType {
        self.expressed
    }

    /// Scale.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Zero point.
    pub fn zero_point(&self) -> i64 {
        self.zero_point
    }

    /// Smallest storage value.
    pub fn storage_min(&self) -> i64 {
        self.storage_min
    }

    /// Largest storage value.
    pub fn storage_max(&self) -> i64 {
        self.storage_max
    }

    /// Whether the zero point is 0.
    pub fn is_symmetric(&self) -> bool {
        self.zero_point == 0
    }

    /// Real value of a stored integer.
    pub fn dequantize(&self, q: i64) -> f64 {
        self.scale * (q - self.zero_point) as f64
    }

    /// Stored integer for a real value, rounded and clamped to storage.
    pub fn quantize(&self, x: f64) -> i64 {
        let q = (x / self.scale).round() as i64 + self.zero_point;
        q.clamp(self.storage_min, self.storage_max)
    }
}

// =============================================================================
// Per-Axis Quantized Type
// =============================================================================

/// Per-channel affine quantization along one axis.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformPerAxisQuantizedType {
    signed: bool,
    storage_bits: u32,
    expressed: FloatType,
    scales: Vec<f64>,
    zero_points: Vec<i64>,
    axis: usize,
    storage_min: i64,
    storage_max: i64,
}

impl UniformPerAxisQuantizedType {
    /// Creates a per-axis type, validating every channel.
    #[allow(clippy::too_many_arguments)]
    pub fn new_checked(
        signed: bool,
        storage_bits: u32,
        expressed: FloatType,
        scales: Vec<f64>,
        zero_points: Vec<i64>,
        axis: usize,
        storage_min: i64,
        storage_max: i64,
    ) -> GraphResult<Self> {
        check_storage(signed, storage_bits, storage_min, storage_max)?;
        if scales.is_empty() || scales.len() != zero_points.len() {
            return Err(GraphError::InvalidQuantizedType(format!(
                "expected matching non-empty scales and zero points, got {} and {}",
                scales.len(),
                zero_points.len()
            )));
        }
        for (&scale, &zp) in scales.iter().zip(&zero_points) {
            check_scale(scale, zp, storage_min, storage_max)?;
        }
        Ok(Self {
            signed,
            storage_bits,
            expressed,
            scales,
            zero_points,
            axis,
            storage_min,
            storage_max,
        })
    }

    /// Storage width in bits.
    pub fn storage_bits(&self) -> u32 {
        self.storage_bits
    }

    /// Whether storage is signed.
    pub fn is_signed(&self) -> bool {
        self.signed
    }
}

// =============================================================================
// Calibrated Type
// =============================================================================

/// Float value annotated with an observed range, not yet quantized.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibratedQuantizedType {
    expressed: FloatType,
    min: f64,
    max: f64,
}

impl CalibratedQuantizedType {
    /// Creates a calibrated type.
    pub fn new(expressed: FloatType, min: f64, max: f64) -> Self {
        Self { expressed, min, max }
    }

    /// Observed minimum.
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Observed maximum.
    pub fn max(&self) -> f64 {
        self.max
    }
}

// =============================================================================
// Quantized Type
// =============================================================================

/// Any quantized element type.
#[derive(Debug, Clone, PartialEq)]
pub enum QuantizedType {
    /// Per-tensor affine.
    Uniform(UniformQuantizedType),
    /// Per-channel affine.
    UniformPerAxis(UniformPerAxisQuantizedType),
    /// Calibrated range awaiting quantization.
    Calibrated(CalibratedQuantizedType),
}

impl QuantizedType {
    /// Expressed float type.
    pub fn expressed_type(&self) -> FloatType {
        match self {
            Self::Uniform(u) => u.expressed,
            Self::UniformPerAxis(p) => p.expressed,
            Self::Calibrated(c) => c.expressed,
        }
    }

    /// Storage width in bits. Calibrated types have no storage yet.
    pub fn storage_bits(&self) -> Option<u32> {
        match self {
            Self::Uniform(u) => Some(u.storage_bits),
            Self::UniformPerAxis(p) => Some(p.storage_bits),
            Self::Calibrated(_) => None,
        }
    }

    /// Returns the uniform type, if this is one.
    pub fn as_uniform(&self) -> Option<&UniformQuantizedType> {
        match self {
            Self::Uniform(u) => Some(u),
            _ => None,
        }
    }

    /// Short kind name used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Uniform(_) => "uniform",
            Self::UniformPerAxis(_) => "uniform per-axis",
            Self::Calibrated(_) => "calibrated",
        }
    }
}

impl From<UniformQuantizedType> for QuantizedType {
    fn from(u: UniformQuantizedType) -> Self {
        Self::Uniform(u)
    }
}

impl From<CalibratedQuantizedType> for QuantizedType {
    fn from(c: CalibratedQuantizedType) -> Self {
        Self::Calibrated(c)
    }
}

fn storage_name(signed: bool, bits: u32) -> String {
    if signed {
        format!("i{bits}")
    } else {
        format!("u{bits}")
    }
}

impl fmt::Display for QuantizedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uniform(u) => write!(
                f,
                "!quant.uniform<{}<{}:{}>:{}, {:e}:{}>",
                storage_name(u.signed, u.storage_bits),
                u.storage_min,
                u.storage_max,
                u.expressed,
                u.scale,
                u.zero_point
            ),
            Self::UniformPerAxis(p) => {
                write!(
                    f,
                    "!quant.uniform<{}<{}:{}>:{}:{}, {{",
                    storage_name(p.signed, p.storage_bits),
                    p.storage_min,
                    p.storage_max,
                    p.expressed,
                    p.axis
                )?;
                for (i, (scale, zp)) in p.scales.iter().zip(&p.zero_points).enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{scale:e}:{zp}")?;
                }
                write!(f, "}}>")
            }
            Self::Calibrated(c) => {
                write!(f, "!quant.calibrated<{}<{}:{}>>", c.expressed, c.min, c.max)
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
