//! PEFT adapter inputs
//!
//! An adapter directory holds `adapter_config.json` plus the trained factors
//! in either a PyTorch archive or a safetensors archive.

pub mod config;
pub mod loader;

pub use config::{AdapterMetadata, ValidatedParams};
pub use loader::{AdapterFiles, PickleArchive, SafeTensorsArchive, WeightMap, WeightSource};
