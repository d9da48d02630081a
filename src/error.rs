//! Conversion errors
//!
//! Every failure aborts the whole conversion. Variants carry the offending
//! field, tensor or architecture so an operator can fix the input.

use std::path::PathBuf;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, ConvertError>;

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("no weight container found in {dir}: expected adapter_model.bin or adapter_model.safetensors")]
    MissingInput { dir: PathBuf },

    #[error("cannot read adapter metadata {path}: {reason}")]
    UnreadableMetadata { path: PathBuf, reason: String },

    #[error("unsupported adapter type {0}, expected LORA")]
    UnsupportedAdapterType(String),

    #[error("param {0} is not supported")]
    UnsupportedFeature(&'static str),

    #[error("cannot convert lora_alpha {0} to int losslessly")]
    LossyConversion(f64),

    #[error("rank {0} is out of range, expected 1..=2147483647")]
    InvalidRank(i64),

    #[error("unrecognized tensor name {0}")]
    UnrecognizedTensorName(String),

    #[error("could not map tensor name {name} for architecture {arch}")]
    UnmappableTensorName { name: String, arch: String },

    #[error("tensor names {first} and {second} both map to {canonical}")]
    DuplicateTensorName {
        first: String,
        second: String,
        canonical: String,
    },

    #[error("unsupported architecture {0}")]
    UnsupportedArchitecture(String),

    #[error("{0}")]
    Usage(String),

    #[error("tensor {tensor} has unsupported element type {dtype}")]
    UnsupportedDtype { tensor: String, dtype: String },

    #[error("tensor {tensor} has shape {shape:?}, expected a 2-D matrix")]
    InvalidShape { tensor: String, shape: Vec<usize> },

    #[error("element type {0} has no output code")]
    UnsupportedOutputDtype(String),

    #[error("malformed ggla data: {0}")]
    Malformed(String),

    #[error("safetensors error: {0}")]
    SafeTensors(#[from] safetensors::SafeTensorError),

    #[error("pytorch archive error: {0}")]
    Pickle(#[from] candle_core::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConvertError {
    /// Operator-facing hint printed after the error line, if any.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ConvertError::UnmappableTensorName { .. } => {
                Some("the arch parameter must be specified if the model is not llama")
            }
            ConvertError::MissingInput { .. } | ConvertError::UnreadableMetadata { .. } => Some(
                "the input directory must contain PEFT LoRA files 'adapter_config.json' and 'adapter_model.bin' or 'adapter_model.safetensors'",
            ),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_offender() {
        let err = ConvertError::UnsupportedFeature("bias");
        assert_eq!(err.to_string(), "param bias is not supported");

        let err = ConvertError::UnmappableTensorName {
            name: "base_model.model.foo.lora_A.weight".into(),
            arch: "llama".into(),
        };
        assert!(err.to_string().contains("base_model.model.foo.lora_A.weight"));
        assert!(err.hint().is_some());
    }

    #[test]
    fn test_io_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err: ConvertError = io.into();
        assert!(matches!(err, ConvertError::Io(_)));
        assert!(err.hint().is_none());
    }
}
