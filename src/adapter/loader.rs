//! Adapter Loader
//!
//! Locates `adapter_config.json` and one weight container in an adapter
//! directory. Both container formats implement [`WeightSource`]; the
//! pipeline never branches on format after [`AdapterFiles::locate`].

use crate::error::{ConvertError, Result};
use crate::tensor::{Dtype, RawTensor};
use half::{bf16, f16};
use log::debug;
use safetensors::SafeTensors;
use std::fs::File;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "adapter_config.json";
pub const LEGACY_WEIGHTS_FILE: &str = "adapter_model.bin";
pub const SAFETENSORS_WEIGHTS_FILE: &str = "adapter_model.safetensors";

/// Parameters in container order
pub type WeightMap = Vec<(String, RawTensor)>;

/// Anything that can produce an ordered name to tensor mapping
pub trait WeightSource {
    /// Path of the container on disk
    fn path(&self) -> &Path;

    /// Short format label for logs
    fn format(&self) -> &'static str;

    /// Read every tensor, rejecting element types other than f16/bf16/f32/f64.
    fn read_tensors(&self) -> Result<WeightMap>;
}

/// PyTorch `torch.save` archive (zip + pickle)
#[derive(Debug, Clone)]
pub struct PickleArchive {
    path: PathBuf,
}

impl PickleArchive {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl WeightSource for PickleArchive {
    fn path(&self) -> &Path {
        &self.path
    }

    fn format(&self) -> &'static str {
        "pytorch"
    }

    fn read_tensors(&self) -> Result<WeightMap> {
        let mut infos = candle_core::pickle::read_pth_tensor_info(&self.path, false, None)?;
        // The pickle reader yields each SETITEMS batch back to front, while
        // torch.save numbers storages in the order it reached them.
        infos.sort_by_key(|info| storage_index(&info.path));

        let archive = candle_core::pickle::PthTensors::new(&self.path, None)?;
        let mut weights = Vec::with_capacity(infos.len());
        for info in infos {
            let dtype = Dtype::try_from(info.dtype).map_err(|dtype| {
                ConvertError::UnsupportedDtype {
                    tensor: info.name.clone(),
                    dtype,
                }
            })?;
            let tensor = archive.get(&info.name)?.ok_or_else(|| {
                ConvertError::Malformed(format!(
                    "tensor {} listed but not found in {}",
                    info.name,
                    self.path.display()
                ))
            })?;
            let shape = tensor.dims().to_vec();
            let flat = tensor.flatten_all()?;
            let data = match dtype {
                Dtype::F16 => bytemuck::cast_slice(&flat.to_vec1::<f16>()?).to_vec(),
                Dtype::BF16 => bytemuck::cast_slice(&flat.to_vec1::<bf16>()?).to_vec(),
                Dtype::F32 => bytemuck::cast_slice(&flat.to_vec1::<f32>()?).to_vec(),
                Dtype::F64 => bytemuck::cast_slice(&flat.to_vec1::<f64>()?).to_vec(),
            };
            weights.push((info.name, RawTensor::new(dtype, shape, data)?));
        }
        debug!("Read {} tensors from {}", weights.len(), self.path.display());
        Ok(weights)
    }
}

/// Numeric storage key of an archive entry such as `archive/data/3`.
fn storage_index(entry: &str) -> usize {
    entry
        .rsplit('/')
        .next()
        .and_then(|key| key.parse().ok())
        .unwrap_or(usize::MAX)
}

/// Safetensors archive, memory-mapped
#[derive(Debug, Clone)]
pub struct SafeTensorsArchive {
    path: PathBuf,
}

impl SafeTensorsArchive {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl WeightSource for SafeTensorsArchive {
    fn path(&self) -> &Path {
        &self.path
    }

    fn format(&self) -> &'static str {
        "safetensors"
    }

    fn read_tensors(&self) -> Result<WeightMap> {
        let file = File::open(&self.path)?;
        // SAFETY: the map is read-only and dropped before this function returns;
        // the converter is the only process expected to touch the adapter.
        let mmap = unsafe { memmap2::Mmap::map(&file) }?;
        let st = SafeTensors::deserialize(&mmap)?;

        // Name order, matching what the reference loader yields.
        let mut views = st.tensors();
        views.sort_by(|a, b| a.0.cmp(&b.0));

        let mut weights = Vec::with_capacity(views.len());
        for (name, view) in views {
            let dtype = Dtype::try_from(view.dtype()).map_err(|dtype| {
                ConvertError::UnsupportedDtype {
                    tensor: name.clone(),
                    dtype,
                }
            })?;
            let tensor = RawTensor::new(dtype, view.shape().to_vec(), view.data().to_vec())?;
            weights.push((name, tensor));
        }
        Ok(weights)
    }
}

/// The two inputs of a conversion, found on disk
pub struct AdapterFiles {
    pub config: PathBuf,
    pub weights: Box<dyn WeightSource>,
}

impl AdapterFiles {
    /// Find the metadata file and a weight container; the legacy archive wins
    /// when both are present.
    pub fn locate(dir: &Path) -> Result<Self> {
        let config = dir.join(CONFIG_FILE);
        let legacy = dir.join(LEGACY_WEIGHTS_FILE);
        let safe = dir.join(SAFETENSORS_WEIGHTS_FILE);

        let weights: Box<dyn WeightSource> = if legacy.is_file() {
            Box::new(PickleArchive::new(legacy))
        } else if safe.is_file() {
            Box::new(SafeTensorsArchive::new(safe))
        } else {
            return Err(ConvertError::MissingInput {
                dir: dir.to_path_buf(),
            });
        };
        debug!(
            "Found {} weights at {}",
            weights.format(),
            weights.path().display()
        );
        Ok(Self { config, weights })
    }
}
