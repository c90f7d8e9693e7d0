//! Tensor Quantizer
//!
//! Maps calibrated ranges and constant weights to uniform quantized types.
//!
//! - 8 bits: asymmetric fake quantization over the full storage range
//! - 16 bits: symmetric narrow-range fake quantization
//! - 16 bits, power of two: scale `2^ceil(log2(max|x|)) / 32768`
//! - weights: symmetric narrow-range, scale taken from the largest magnitude
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use axonml_graph::{max_int_n, max_uint_n, min_int_n, FloatType, UniformQuantizedType};
use rayon::prelude::*;
use tracing::trace;

use crate::error::{QuantError, QuantResult};

// =============================================================================
// Fake Quantization
// =============================================================================

/// Smallest power of two that is not less than `value`.
pub fn power_of_two_bound(value: f64) -> f64 {
    let mut bound = 2f64.powi(value.log2().ceil() as i32);
    // log2 can land on the wrong side of an exact power for values within
    // one ulp of it.
    if bound < value {
        bound *= 2.0;
    } else if bound >= 2.0 * value {
        bound /= 2.0;
    }
    bound
}

/// Storage bounds `(qmin, qmax)` for a width and signedness.
pub fn storage_range(bits: u32, is_signed: bool, narrow_range: bool) -> (i64, i64) {
    let (qmin, qmax) = if is_signed {
        (min_int_n(bits), max_int_n(bits))
    } else {
        (0, max_uint_n(bits))
    };
    if narrow_range {
        (qmin + 1, qmax)
    } else {
        (qmin, qmax)
    }
}

/// Picks the zero point anchored at whichever range end loses less precision,
/// then rounds it into storage.
fn nudged_zero_point(qmin: i64, qmax: i64, rmin: f64, rmax: f64, scale: f64) -> i64 {
    let (qmin_f, qmax_f) = (qmin as f64, qmax as f64);

    let from_min = qmin_f - rmin / scale;
    let from_min_error = qmin_f.abs() + (rmin / scale).abs();
    let from_max = qmax_f - rmax / scale;
    let from_max_error = qmax_f.abs() + (rmax / scale).abs();

    let zero_point = if from_min_error < from_max_error {
        from_min
    } else {
        from_max
    };

    if zero_point < qmin_f {
        qmin
    } else if zero_point > qmax_f {
        qmax
    } else {
        zero_point.round() as i64
    }
}

/// Builds the uniform type a fake-quant node with range `[rmin, rmax]` implies.
pub fn fake_quant_type(
    bits: u32,
    rmin: f64,
    rmax: f64,
    narrow_range: bool,
    expressed: FloatType,
    is_signed: bool,
) -> QuantResult<UniformQuantizedType> {
    if !(2..=16).contains(&bits) {
        return Err(QuantError::UnsupportedBits {
            bits,
            reason: "fake quantization supports 2 to 16 bits",
        });
    }
    if !rmin.is_finite() || !rmax.is_finite() || rmin > rmax {
        return Err(QuantError::InvalidRange {
            min: rmin,
            max: rmax,
            reason: "range must be finite and ordered",
        });
    }
    if rmin > 0.0 || rmax < 0.0 {
        return Err(QuantError::InvalidRange {
            min: rmin,
            max: rmax,
            reason: "range must straddle zero",
        });
    }

    let (qmin, qmax) = storage_range(bits, is_signed, narrow_range);

    // All-zero tensor: any scale works, every code dequantizes to 0.0.
    if (rmax - rmin).abs() < f64::EPSILON {
        let zero_point = 0i64.clamp(qmin, qmax);
        return Ok(UniformQuantizedType::new_checked(
            is_signed, bits, expressed, 1.0, zero_point, qmin, qmax,
        )?);
    }

    let scale = (rmax - rmin) / (qmax - qmin) as f64;
    let zero_point = nudged_zero_point(qmin, qmax, rmin, rmax, scale);
    Ok(UniformQuantizedType::new_checked(
        is_signed, bits, expressed, scale, zero_point, qmin, qmax,
    )?)
}

// =============================================================================
// Range Quantization
// =============================================================================

/// Quantizes a calibrated `[min, max]` range at `bits` bits.
pub fn quantize_range(
    min: f64,
    max: f64,
    bits: u32,
    extend_to_power_of_two: bool,
    is_signed: bool,
    expressed: FloatType,
) -> QuantResult<UniformQuantizedType> {
    let qtype = if extend_to_power_of_two {
        power_of_two_type(min, max, bits, expressed)?
    } else {
        match bits {
            8 => fake_quant_type(8, min, max, false, expressed, is_signed)?,
            16 => {
                let bound = min.abs().max(max.abs());
                fake_quant_type(16, -bound, bound, true, expressed, true)?
            }
            _ => {
                return Err(QuantError::UnsupportedBits {
                    bits,
                    reason: "calibrated ranges are quantized with 8 or 16 bits",
                })
            }
        }
    };
    trace!(
        min,
        max,
        bits,
        scale = qtype.scale(),
        zero_point = qtype.zero_point(),
        "quantized range"
    );
    Ok(qtype)
}

fn power_of_two_type(min: f64, max: f64, bits: u32, expressed: FloatType) -> QuantResult<UniformQuantizedType> {
    if bits != 16 {
        return Err(QuantError::UnsupportedBits {
            bits,
            reason: "extended power of 2 scale is only supported for 16-bit quantization",
        });
    }
    let magnitude = min.abs().max(max.abs());
    if !magnitude.is_finite() || magnitude == 0.0 {
        return Err(QuantError::InvalidRange {
            min,
            max,
            reason: "power-of-two scale needs a finite non-zero bound",
        });
    }
    let bound = power_of_two_bound(magnitude);
    // Subnormal magnitudes underflow to a zero bound.
    if !bound.is_finite() || bound <= 0.0 {
        return Err(QuantError::InvalidRange {
            min,
            max,
            reason: "power-of-two bound is not representable",
        });
    }
    let (qmin, qmax) = storage_range(bits, true, false);
    Ok(UniformQuantizedType::new_checked(
        true,
        bits,
        expressed,
        bound / -(qmin as f64),
        0,
        qmin,
        qmax,
    )?)
}

// =============================================================================
// Weight Quantization
// =============================================================================

/// Symmetric per-tensor type for constant weights.
pub fn weight_type(values: &[f64], bits: u32, expressed: FloatType) -> QuantResult<UniformQuantizedType> {
    let magnitude = values.par_iter().map(|v| v.abs()).reduce(|| 0.0, f64::max);
    if values.iter().any(|v| !v.is_finite()) {
        return Err(QuantError::InvalidRange {
            min: -magnitude,
            max: magnitude,
            reason: "weights must be finite",
        });
    }
    fake_quant_type(bits, -magnitude, magnitude, true, expressed, true)
}

// =============================================================================
// Tests
// =============================================================================
