//! Quantization Specs
//!
//! Pass-level configuration, set by the host pipeline.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use serde::{Deserialize, Serialize};

// =============================================================================
// Inference Type
// =============================================================================

/// Storage type the quantized model is expected to run with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InferenceType {
    /// Unsigned 8-bit activations.
    #[default]
    #[serde(rename = "quint8", alias = "QUINT8")]
    QUInt8,
    /// Signed 8-bit activations.
    #[serde(rename = "qint8", alias = "QINT8")]
    QInt8,
    /// Signed 16-bit activations.
    #[serde(rename = "qint16", alias = "QINT16")]
    QInt16,
}

impl InferenceType {
    /// Whether storage is signed.
    pub fn is_signed(self) -> bool {
        matches!(self, Self::QInt8 | Self::QInt16)
    }
}

// =============================================================================
// Quantization Specs
// =============================================================================

/// Configuration for the LSTM prepare-quantize pass.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuantizationSpecs {
    /// Inference storage type.
    pub inference_type: InferenceType,
}

impl QuantizationSpecs {
    /// Creates specs with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set inference type.
    pub fn inference_type(mut self, inference_type: InferenceType) -> Self {
        self.inference_type = inference_type;
        self
    }

    /// Whether 8-bit activations should be quantized as signed.
    pub fn is_signed_inference_type(&self) -> bool {
        self.inference_type.is_signed()
    }

    /// Parses specs from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
