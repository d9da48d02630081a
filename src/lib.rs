//! lora-ggla: PEFT LoRA adapters to GGLA
//!
//! Reads a trained adapter directory, checks that the runtime can express
//! it, renames every factor to the runtime's canonical tensor names and
//! writes a single flat binary file.

pub mod adapter;
pub mod convert;
pub mod error;
pub mod ggla;
pub mod naming;
pub mod tensor;

pub use adapter::{AdapterFiles, AdapterMetadata, ValidatedParams, WeightSource};
pub use convert::{convert, ConversionSummary, ConvertOptions};
pub use error::{ConvertError, Result};
pub use naming::{Architecture, NameMapper, TensorNameTable};
pub use tensor::{Dtype, LoraFactor, RawTensor};
