//! Adapter metadata and the configuration gate
//!
//! `adapter_config.json` is read once and checked before any output is
//! opened. Unsupported training options are hard stops.

use crate::error::{ConvertError, Result};
use log::debug;
use serde::Deserialize;
use std::path::Path;

/// Adapter type this converter understands
pub const LORA_ADAPTER_TYPE: &str = "LORA";

/// `bias` value meaning no bias terms were trained
pub const BIAS_NONE: &str = "none";

/// Contents of `adapter_config.json` that matter for conversion
#[derive(Debug, Clone, Deserialize)]
pub struct AdapterMetadata {
    #[serde(rename = "peft_type")]
    pub adapter_type: String,
    /// Low-rank dimension `r`
    #[serde(rename = "r")]
    pub rank: i64,
    #[serde(rename = "lora_alpha")]
    pub alpha: f64,
    #[serde(default)]
    pub fan_in_fan_out: bool,
    #[serde(default)]
    pub bias: Option<String>,
    #[serde(default)]
    pub modules_to_save: Option<Vec<String>>,

    // Informational only.
    #[serde(default)]
    pub base_model_name_or_path: Option<String>,
    #[serde(default)]
    pub target_modules: Option<serde_json::Value>,
    #[serde(default)]
    pub task_type: Option<String>,
}

/// Header values that survive validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedParams {
    pub rank: i32,
    pub alpha: i32,
}

impl AdapterMetadata {
    /// Read and parse a metadata file.
    pub fn load(path: &Path) -> Result<Self> {
        let unreadable = |reason: String| ConvertError::UnreadableMetadata {
            path: path.to_path_buf(),
            reason,
        };
        let json = std::fs::read_to_string(path).map_err(|e| unreadable(e.to_string()))?;
        let meta: AdapterMetadata =
            serde_json::from_str(&json).map_err(|e| unreadable(e.to_string()))?;
        debug!(
            "Loaded adapter metadata: type={} r={} alpha={} base={:?} targets={:?}",
            meta.adapter_type,
            meta.rank,
            meta.alpha,
            meta.base_model_name_or_path,
            meta.target_modules,
        );
        Ok(meta)
    }

    /// Reject anything the output format cannot express, first failure wins.
    pub fn validate(&self) -> Result<ValidatedParams> {
        if self.adapter_type != LORA_ADAPTER_TYPE {
            return Err(ConvertError::UnsupportedAdapterType(self.adapter_type.clone()));
        }
        if self.fan_in_fan_out {
            return Err(ConvertError::UnsupportedFeature("fan_in_fan_out"));
        }
        if self.bias.as_deref().is_some_and(|b| b != BIAS_NONE) {
            return Err(ConvertError::UnsupportedFeature("bias"));
        }
        // TODO: modules_to_save are fully trained layers; supporting them needs a
        // dense tensor record type in the output format.
        if self.modules_to_save.as_ref().is_some_and(|m| !m.is_empty()) {
            return Err(ConvertError::UnsupportedFeature("modules_to_save"));
        }
        let alpha = self.alpha as i32;
        if f64::from(alpha) != self.alpha {
            return Err(ConvertError::LossyConversion(self.alpha));
        }
        let rank = i32::try_from(self.rank)
            .ok()
            .filter(|r| *r > 0)
            .ok_or(ConvertError::InvalidRank(self.rank))?;
        Ok(ValidatedParams { rank, alpha })
    }
}
