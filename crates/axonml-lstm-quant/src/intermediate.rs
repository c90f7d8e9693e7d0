//! Intermediate Processor
//!
//! Resolves the five intermediate activations recorded as type attributes on
//! an LSTM node. Calibrated intermediates are converted to fixed-point
//! types; already quantized ones are only checked for width.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use axonml_graph::{GraphError, QuantizedType};
use tracing::debug;

use crate::config::QuantizationSpecs;
use crate::error::{QuantError, QuantResult};
use crate::instance::LstmInstance;
use crate::property::{
    OpVariant, OperatorProperty, EFFECTIVE_HIDDEN_SCALE_INTERMEDIATE, INTERMEDIATE_ATTRIBUTES,
};
use crate::quantize::quantize_range;

/// Quantizes the calibrated intermediates of `instance`.
///
/// Returns the number of intermediates converted from calibrated ranges.
pub fn process_intermediates(
    instance: &mut LstmInstance<'_>,
    variant: &OpVariant,
    property: &OperatorProperty,
    specs: &QuantizationSpecs,
) -> QuantResult<usize> {
    let mut converted = 0;

    for (index, tensor_property) in &property.intermediates {
        let index = *index;
        // Intermediates 0-3 exist only with layer normalization.
        if !variant.use_layer_norm && index != EFFECTIVE_HIDDEN_SCALE_INTERMEDIATE {
            continue;
        }
        let name = INTERMEDIATE_ATTRIBUTES[index];
        let expected = tensor_property.number_of_bits;

        let Some(qtype) = instance.intermediate_type(index).cloned() else {
            // The effective hidden scale is optional unless projection is used.
            if index == EFFECTIVE_HIDDEN_SCALE_INTERMEDIATE && !variant.use_projection {
                continue;
            }
            return Err(QuantError::MissingIntermediate(name));
        };

        let calibrated = match &qtype {
            QuantizedType::Calibrated(calibrated) => calibrated,
            quantized => {
                let actual = quantized.storage_bits().unwrap_or_default();
                if actual != expected {
                    return Err(QuantError::BitWidthMismatch {
                        name,
                        expected,
                        actual,
                    });
                }
                continue;
            }
        };

        let is_signed = expected != 8 || specs.is_signed_inference_type();
        let uniform = quantize_range(
            calibrated.min(),
            calibrated.max(),
            expected,
            false,
            is_signed,
            qtype.expressed_type(),
        )?;
        debug!(
            node = %instance.node(),
            intermediate = name,
            bits = expected,
            scale = uniform.scale(),
            zero_point = uniform.zero_point(),
            "quantized intermediate"
        );

        let ty = instance
            .intermediate_attr(index)
            .and_then(|attr| attr.cast_to_expressed())
            .and_then(|attr| attr.cast_from_expressed(uniform.into()))
            .ok_or_else(|| {
                GraphError::InvalidQuantizedType(format!("{name} cannot be cast to a fixed-point type"))
            })?;
        instance.set_intermediate(index, ty)?;
        converted += 1;
    }

    Ok(converted)
}

// =============================================================================
// Tests
// =============================================================================
