//! Name Mapper: PEFT parameter names to canonical runtime names

use super::TensorNameTable;
use crate::error::{ConvertError, Result};
use crate::tensor::LoraFactor;

/// Prefix PEFT puts in front of the wrapped model's parameters
pub const PEFT_PREFIX: &str = "base_model.model.";

/// Per-adapter suffix written by multi-adapter PEFT checkpoints
const ADAPTER_DEFAULT_SUFFIX: &str = ".default.weight";

/// Result of mapping one source tensor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedName {
    /// Name as found in the weight container
    pub source: String,
    /// Source name with the PEFT prefix and factor suffix removed
    pub stem: String,
    /// Canonical name with the factor suffix, as written to the output
    pub canonical: String,
    pub factor: LoraFactor,
}

/// Translates source names using a prebuilt [`TensorNameTable`]
#[derive(Debug, Clone, Copy)]
pub struct NameMapper<'a> {
    table: &'a TensorNameTable,
}

impl<'a> NameMapper<'a> {
    pub fn new(table: &'a TensorNameTable) -> Self {
        Self { table }
    }

    /// Map a source name. `Ok(None)` means the tensor is intentionally skipped.
    pub fn map(&self, source: &str) -> Result<Option<MappedName>> {
        let mut name = match source.strip_suffix(ADAPTER_DEFAULT_SUFFIX) {
            Some(head) => format!("{head}.weight"),
            None => source.to_string(),
        };

        if self.table.arch().skipped_tensors().contains(&name.as_str()) {
            return Ok(None);
        }

        if let Some(rest) = name.strip_prefix(PEFT_PREFIX) {
            name = rest.to_string();
        }

        let (stem, factor) = split_factor(&name)
            .ok_or_else(|| ConvertError::UnrecognizedTensorName(source.to_string()))?;

        let canonical = self
            .table
            .get(stem)
            .ok_or_else(|| ConvertError::UnmappableTensorName {
                name: source.to_string(),
                arch: self.table.arch().to_string(),
            })?;

        Ok(Some(MappedName {
            source: source.to_string(),
            stem: stem.to_string(),
            canonical: canonical + factor.output_suffix(),
            factor,
        }))
    }
}

fn split_factor(name: &str) -> Option<(&str, LoraFactor)> {
    [LoraFactor::A, LoraFactor::B]
        .into_iter()
        .find_map(|factor| name.strip_suffix(factor.source_suffix()).map(|stem| (stem, factor)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::{Architecture, DEFAULT_MAX_BLOCKS};

    fn table(arch: Architecture) -> TensorNameTable {
        TensorNameTable::build(arch, DEFAULT_MAX_BLOCKS)
    }

    #[test]
    fn test_maps_both_factors() {
        let t = table(Architecture::Llama);
        let mapper = NameMapper::new(&t);

        let a = mapper
            .map("base_model.model.model.layers.0.self_attn.q_proj.lora_A.weight")
            .unwrap()
            .unwrap();
        assert_eq!(a.canonical, "blk.0.attn_q.weight.loraA");
        assert_eq!(a.stem, "model.layers.0.self_attn.q_proj");
        assert_eq!(a.factor, LoraFactor::A);

        let b = mapper
            .map("base_model.model.layers.0.self_attn.q_proj.lora_B.weight")
            .unwrap()
            .unwrap();
        assert_eq!(b.canonical, "blk.0.attn_q.weight.loraB");
        assert_eq!(b.factor, LoraFactor::B);
    }

    #[test]
    fn test_default_adapter_suffix() {
        let t = table(Architecture::Llama);
        let mapped = NameMapper::new(&t)
            .map("base_model.model.model.layers.1.mlp.up_proj.lora_B.default.weight")
            .unwrap()
            .unwrap();
        assert_eq!(mapped.canonical, "blk.1.ffn_up.weight.loraB");
    }

    #[test]
    fn test_skips_projection() {
        let t = table(Architecture::Llama);
        let mapper = NameMapper::new(&t);
        assert_eq!(mapper.map("llama_proj.weight").unwrap(), None);
        assert_eq!(mapper.map("llama_proj.bias").unwrap(), None);
    }

    #[test]
    fn test_unrecognized_suffix() {
        let t = table(Architecture::Llama);
        let err = NameMapper::new(&t).map("foo.bar.weight").unwrap_err();
        assert!(matches!(err, ConvertError::UnrecognizedTensorName(ref n) if n == "foo.bar.weight"));
    }

    #[test]
    fn test_unmappable_stem() {
        let t = table(Architecture::Llama);
        let err = NameMapper::new(&t)
            .map("base_model.model.foo.lora_A.weight")
            .unwrap_err();
        match err {
            ConvertError::UnmappableTensorName { name, arch } => {
                assert_eq!(name, "base_model.model.foo.lora_A.weight");
                assert_eq!(arch, "llama");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_wrong_architecture_is_unmappable() {
        let t = table(Architecture::GptNeoX);
        let err = NameMapper::new(&t)
            .map("base_model.model.model.layers.0.self_attn.q_proj.lora_A.weight")
            .unwrap_err();
        assert!(matches!(err, ConvertError::UnmappableTensorName { .. }));
    }
}
