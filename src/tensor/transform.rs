//! Per-tensor numeric and layout normalization before encoding
//!
//! The runtime wants "A" factors pre-transposed and "B" factors in f32.

use super::{Dtype, RawTensor};
use crate::error::{ConvertError, Result};
use half::f16;
use nalgebra::DMatrix;
use std::fmt;

/// Which half of the low-rank decomposition a tensor holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoraFactor {
    /// Down projection, shape (r, in_features)
    A,
    /// Up projection, shape (out_features, r)
    B,
}

impl LoraFactor {
    /// Suffix identifying this factor in a PEFT parameter name
    pub fn source_suffix(self) -> &'static str {
        match self {
            LoraFactor::A => ".lora_A.weight",
            LoraFactor::B => ".lora_B.weight",
        }
    }

    /// Suffix appended to the canonical name in the output file
    pub fn output_suffix(self) -> &'static str {
        match self {
            LoraFactor::A => ".weight.loraA",
            LoraFactor::B => ".weight.loraB",
        }
    }
}

impl fmt::Display for LoraFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoraFactor::A => f.write_str("A"),
            LoraFactor::B => f.write_str("B"),
        }
    }
}

/// Normalize a tensor for the given factor.
///
/// "A": keep f16/f32, upcast anything else to f32, then swap the two axes.
/// "B": always f32, layout untouched.
pub fn transform(name: &str, tensor: &RawTensor, factor: LoraFactor) -> Result<RawTensor> {
    let out = match factor {
        LoraFactor::A => {
            let coerced = match tensor.dtype() {
                Dtype::F16 | Dtype::F32 => tensor.clone(),
                _ => tensor.to_f32(),
            };
            transpose(name, &coerced)?
        }
        LoraFactor::B => tensor.to_f32(),
    };
    // Guard the output code before anything is written.
    out.dtype().output_code()?;
    Ok(out)
}

/// Swap the axes of a 2-D tensor, materializing the result row-major.
pub fn transpose(name: &str, tensor: &RawTensor) -> Result<RawTensor> {
    let (rows, cols) = match *tensor.shape() {
        [rows, cols] => (rows, cols),
        _ => {
            return Err(ConvertError::InvalidShape {
                tensor: name.to_string(),
                shape: tensor.shape().to_vec(),
            })
        }
    };
    let data = match tensor.dtype() {
        Dtype::F32 => transpose_elems::<f32>(tensor.data(), rows, cols),
        Dtype::F16 => transpose_elems::<f16>(tensor.data(), rows, cols),
        Dtype::BF16 => transpose_elems::<half::bf16>(tensor.data(), rows, cols),
        Dtype::F64 => transpose_elems::<f64>(tensor.data(), rows, cols),
    };
    RawTensor::new(tensor.dtype(), vec![cols, rows], data)
}

// nalgebra stores column-major, so the column-major buffer of M is the
// row-major buffer of M^T.
fn transpose_elems<T>(data: &[u8], rows: usize, cols: usize) -> Vec<u8>
where
    T: bytemuck::Pod + nalgebra::Scalar,
{
    let elems: Vec<T> = bytemuck::pod_collect_to_vec(data);
    let m = DMatrix::from_row_slice(rows, cols, &elems);
    bytemuck::cast_slice(m.as_slice()).to_vec()
}
