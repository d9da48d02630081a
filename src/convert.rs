//! Conversion pipeline
//!
//! locate inputs -> load metadata and weights -> validate -> map every name
//! -> create output -> transform and write each tensor in container order.

use crate::adapter::{AdapterFiles, AdapterMetadata, ValidatedParams, WeightMap};
use crate::error::{ConvertError, Result};
use crate::ggla::{EncodeSummary, GglaWriter};
use crate::naming::{Architecture, MappedName, NameMapper, TensorNameTable, DEFAULT_MAX_BLOCKS};
use crate::tensor::{transform, RawTensor};
use log::{debug, info};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// Inputs of one conversion run
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub input_dir: PathBuf,
    pub output_path: PathBuf,
    pub arch: Architecture,
    /// Highest block count the name table accepts
    pub max_blocks: usize,
}

impl ConvertOptions {
    pub fn new(input_dir: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_path: output_path.into(),
            arch: Architecture::default(),
            max_blocks: DEFAULT_MAX_BLOCKS,
        }
    }

    pub fn with_arch(mut self, arch: Architecture) -> Self {
        self.arch = arch;
        self
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone)]
pub struct ConversionSummary {
    pub params: ValidatedParams,
    pub skipped: usize,
    pub encode: EncodeSummary,
}

/// A tensor whose output name is already settled
#[derive(Debug)]
pub struct PlannedTensor {
    pub name: MappedName,
    pub tensor: RawTensor,
}

/// Convert the adapter in `opts.input_dir` into a ggla file at `opts.output_path`.
pub fn convert(opts: &ConvertOptions) -> Result<ConversionSummary> {
    let files = AdapterFiles::locate(&opts.input_dir)?;
    let metadata = AdapterMetadata::load(&files.config)?;
    let weights = files.weights.read_tensors()?;
    let params = metadata.validate()?;

    let table = TensorNameTable::build(opts.arch, opts.max_blocks);
    let total = weights.len();
    let plan = plan_tensors(&NameMapper::new(&table), weights)?;
    let skipped = total - plan.len();
    if skipped > 0 {
        debug!("Skipping {} tensors with no runtime counterpart", skipped);
    }

    let file = File::create(&opts.output_path)?;
    let (mut out, encode) = write_ggla(BufWriter::new(file), params, plan)?;
    out.flush()?;

    info!(
        "Converted {} and {} to {} ({} tensors, {} bytes, sha256 {})",
        files.config.display(),
        files.weights.path().display(),
        opts.output_path.display(),
        encode.records,
        encode.bytes_written,
        encode.sha256,
    );
    Ok(ConversionSummary {
        params,
        skipped,
        encode,
    })
}

/// Map every source name up front, dropping skipped tensors and rejecting
/// collisions on the canonical name.
pub fn plan_tensors(mapper: &NameMapper<'_>, weights: WeightMap) -> Result<Vec<PlannedTensor>> {
    let mut seen: HashMap<String, String> = HashMap::new();
    let mut plan = Vec::with_capacity(weights.len());
    for (source, tensor) in weights {
        let Some(name) = mapper.map(&source)? else {
            continue;
        };
        if let Some(first) = seen.insert(name.canonical.clone(), source.clone()) {
            return Err(ConvertError::DuplicateTensorName {
                first,
                second: source,
                canonical: name.canonical,
            });
        }
        plan.push(PlannedTensor { name, tensor });
    }
    Ok(plan)
}

/// Encode a planned adapter into `writer`.
pub fn write_ggla<W: Write>(
    writer: W,
    params: ValidatedParams,
    plan: Vec<PlannedTensor>,
) -> Result<(W, EncodeSummary)> {
    let mut encoder = GglaWriter::new(writer, params)?;
    for PlannedTensor { name, tensor } in plan {
        let out = transform(&name.source, &tensor, name.factor)?;
        info!(
            "{} => {} {:?} {} {:.2}MB",
            name.stem,
            name.canonical,
            out.shape(),
            out.dtype(),
            out.nbytes() as f64 / 1024.0 / 1024.0
        );
        encoder.write_tensor(&name.canonical, &out)?;
    }
    encoder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::loader::tests::{f32_bytes, write_safetensors, write_torch_archive};
    use crate::adapter::loader::{LEGACY_WEIGHTS_FILE, SAFETENSORS_WEIGHTS_FILE};
    use crate::ggla::read_file;
    use crate::tensor::Dtype;
    use serde_json::json;
    use std::path::Path;

    const Q_A: &str = "base_model.model.layers.0.self_attn.q_proj.lora_A.weight";
    const Q_B: &str = "base_model.model.layers.0.self_attn.q_proj.lora_B.weight";

    fn write_config(dir: &Path, config: serde_json::Value) {
        std::fs::write(dir.join("adapter_config.json"), config.to_string()).unwrap();
    }

    fn lora_config() -> serde_json::Value {
        json!({
            "peft_type": "LORA",
            "r": 8,
            "lora_alpha": 16.0,
            "fan_in_fan_out": false,
            "bias": "none",
            "modules_to_save": null
        })
    }

    fn ramp(n: usize) -> Vec<f32> {
        (0..n).map(|i| i as f32).collect()
    }

    fn q_proj_adapter(dir: &Path) {
        write_config(dir, lora_config());
        write_safetensors(
            &dir.join(SAFETENSORS_WEIGHTS_FILE),
            &[
                (Q_A, vec![8, 128], ramp(8 * 128)),
                (Q_B, vec![128, 8], ramp(128 * 8)),
            ],
        );
    }

    #[test]
    fn test_end_to_end_llama() {
        let dir = tempfile::tempdir().unwrap();
        q_proj_adapter(dir.path());
        let out = dir.path().join("ggml-adapter-model.bin");

        let summary = convert(&ConvertOptions::new(dir.path(), &out)).unwrap();
        assert_eq!(summary.params, ValidatedParams { rank: 8, alpha: 16 });
        assert_eq!(summary.encode.records, 2);
        assert_eq!(summary.skipped, 0);

        let bytes = std::fs::read(&out).unwrap();
        assert_eq!(&bytes[..4], b"algg");
        assert_eq!(summary.encode.bytes_written, bytes.len() as u64);

        let file = read_file(&out).unwrap();
        assert_eq!((file.rank, file.alpha), (8, 16));
        let names: Vec<&str> = file.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["blk.0.attn_q.weight.loraA", "blk.0.attn_q.weight.loraB"]);

        // A was transposed to (128, 8); its stored dims are that reversed.
        let a = &file.records[0];
        assert_eq!(a.dims, vec![8, 128]);
        assert_eq!(a.dtype, Dtype::F32);
        let mut source_shape = a.shape();
        source_shape.reverse();
        assert_eq!(source_shape, vec![8, 128]);
        let values: Vec<f32> = bytemuck::pod_collect_to_vec(a.data.as_slice());
        // row 1 of the transposed matrix starts with column 1 of the source
        assert_eq!(values[8], 1.0);
        assert_eq!(values[1], 128.0);

        let b = &file.records[1];
        assert_eq!(b.dims, vec![8, 128]);
        assert_eq!(b.shape(), vec![128, 8]);
        assert_eq!(bytemuck::pod_collect_to_vec::<u8, f32>(b.data.as_slice()), ramp(1024));

        for record in &file.records {
            assert_eq!(record.offset % 32, 0);
        }
    }

    #[test]
    fn test_end_to_end_legacy_archive() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), lora_config());
        let v_b = "base_model.model.model.layers.3.self_attn.v_proj.lora_B.weight";
        let v_a = "base_model.model.model.layers.3.self_attn.v_proj.lora_A.weight";
        let a_halves: Vec<half::f16> = (0..6).map(|i| half::f16::from_f32(i as f32)).collect();
        write_torch_archive(
            &dir.path().join(LEGACY_WEIGHTS_FILE),
            &[
                (v_b, "FloatStorage", vec![4, 2], f32_bytes(&ramp(8))),
                (
                    v_a,
                    "HalfStorage",
                    vec![2, 3],
                    bytemuck::cast_slice(a_halves.as_slice()).to_vec(),
                ),
            ],
        );
        let out = dir.path().join("ggml-adapter-model.bin");

        let summary = convert(&ConvertOptions::new(dir.path(), &out)).unwrap();
        assert_eq!(summary.encode.records, 2);

        let file = read_file(&out).unwrap();
        let names: Vec<&str> = file.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["blk.3.attn_v.weight.loraB", "blk.3.attn_v.weight.loraA"]);

        let b = &file.records[0];
        assert_eq!(b.dtype, Dtype::F32);
        assert_eq!(b.shape(), vec![4, 2]);
        assert_eq!(bytemuck::pod_collect_to_vec::<u8, f32>(b.data.as_slice()), ramp(8));

        // f16 A stays f16 and is stored transposed to (3, 2)
        let a = &file.records[1];
        assert_eq!(a.dtype, Dtype::F16);
        assert_eq!(a.shape(), vec![3, 2]);
        let values: Vec<f32> = bytemuck::pod_collect_to_vec::<u8, half::f16>(a.data.as_slice())
            .iter()
            .map(|v| v.to_f32())
            .collect();
        assert_eq!(values, vec![0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);
    }

    #[test]
    fn test_lossy_alpha_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        q_proj_adapter(dir.path());
        let mut config = lora_config();
        config["lora_alpha"] = json!(8.5);
        write_config(dir.path(), config);
        let out = dir.path().join("out.bin");

        let err = convert(&ConvertOptions::new(dir.path(), &out)).unwrap_err();
        assert!(matches!(err, ConvertError::LossyConversion(_)));
        assert!(!out.exists());
    }

    #[test]
    fn test_unrecognized_name_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), lora_config());
        write_safetensors(
            &dir.path().join(SAFETENSORS_WEIGHTS_FILE),
            &[
                (Q_A, vec![8, 4], ramp(32)),
                ("foo.bar.weight", vec![2], ramp(2)),
            ],
        );
        let out = dir.path().join("out.bin");
        let err = convert(&ConvertOptions::new(dir.path(), &out)).unwrap_err();
        assert!(matches!(err, ConvertError::UnrecognizedTensorName(ref n) if n == "foo.bar.weight"));
        assert!(!out.exists());
    }

    #[test]
    fn test_wrong_arch_is_unmappable() {
        let dir = tempfile::tempdir().unwrap();
        q_proj_adapter(dir.path());
        let opts = ConvertOptions::new(dir.path(), dir.path().join("out.bin"))
            .with_arch(Architecture::GptNeoX);
        let err = convert(&opts).unwrap_err();
        assert!(matches!(err, ConvertError::UnmappableTensorName { ref arch, .. } if arch == "gptneox"));
    }

    #[test]
    fn test_missing_weights() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), lora_config());
        let err = convert(&ConvertOptions::new(dir.path(), dir.path().join("o"))).unwrap_err();
        assert!(matches!(err, ConvertError::MissingInput { .. }));
    }

    #[test]
    fn test_projection_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), lora_config());
        write_safetensors(
            &dir.path().join(SAFETENSORS_WEIGHTS_FILE),
            &[
                ("llama_proj.weight", vec![2, 2], ramp(4)),
                (Q_B, vec![4, 8], ramp(32)),
            ],
        );
        let out = dir.path().join("out.bin");
        let summary = convert(&ConvertOptions::new(dir.path(), &out)).unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(read_file(&out).unwrap().records.len(), 1);
    }

    #[test]
    fn test_duplicate_canonical_names() {
        let t = TensorNameTable::build(Architecture::Llama, DEFAULT_MAX_BLOCKS);
        let tensor = RawTensor::from_f32(vec![1, 1], &[0.0]).unwrap();
        let weights = vec![
            (Q_A.to_string(), tensor.clone()),
            (
                "base_model.model.model.layers.0.self_attn.q_proj.lora_A.weight".to_string(),
                tensor,
            ),
        ];
        let err = plan_tensors(&NameMapper::new(&t), weights).unwrap_err();
        match err {
            ConvertError::DuplicateTensorName { canonical, .. } => {
                assert_eq!(canonical, "blk.0.attn_q.weight.loraA")
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_bias_lora_only_rejected_before_output() {
        let dir = tempfile::tempdir().unwrap();
        q_proj_adapter(dir.path());
        let mut config = lora_config();
        config["bias"] = json!("lora_only");
        write_config(dir.path(), config);
        let out = dir.path().join("out.bin");
        std::fs::write(&out, b"previous contents").unwrap();

        let err = convert(&ConvertOptions::new(dir.path(), &out)).unwrap_err();
        assert!(matches!(err, ConvertError::UnsupportedFeature("bias")));
        assert_eq!(std::fs::read(&out).unwrap(), b"previous contents");
    }
}
