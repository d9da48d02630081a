//! Raw tensors as loaded from an adapter's weight container
//!
//! A `RawTensor` is a typed, shaped, row-major byte buffer. Transforms never
//! mutate one in place; they produce a new tensor.

pub mod transform;

pub use transform::{transform, LoraFactor};

use crate::error::{ConvertError, Result};
use half::{bf16, f16};
use std::fmt;

/// Element types accepted from a weight container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dtype {
    F16,
    BF16,
    F32,
    F64,
}

impl Dtype {
    /// Size of one element in bytes
    pub fn size(self) -> usize {
        match self {
            Dtype::F16 | Dtype::BF16 => 2,
            Dtype::F32 => 4,
            Dtype::F64 => 8,
        }
    }

    /// Numeric code stored in a ggla record: 0 for f32, 1 for f16.
    pub fn output_code(self) -> Result<u32> {
        match self {
            Dtype::F32 => Ok(0),
            Dtype::F16 => Ok(1),
            other => Err(ConvertError::UnsupportedOutputDtype(other.to_string())),
        }
    }

    /// Inverse of [`Dtype::output_code`]
    pub fn from_output_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Dtype::F32),
            1 => Some(Dtype::F16),
            _ => None,
        }
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dtype::F16 => "float16",
            Dtype::BF16 => "bfloat16",
            Dtype::F32 => "float32",
            Dtype::F64 => "float64",
        };
        f.write_str(name)
    }
}

impl TryFrom<safetensors::Dtype> for Dtype {
    type Error = String;

    fn try_from(dtype: safetensors::Dtype) -> std::result::Result<Self, String> {
        match dtype {
            safetensors::Dtype::F16 => Ok(Dtype::F16),
            safetensors::Dtype::BF16 => Ok(Dtype::BF16),
            safetensors::Dtype::F32 => Ok(Dtype::F32),
            safetensors::Dtype::F64 => Ok(Dtype::F64),
            other => Err(format!("{other:?}")),
        }
    }
}

impl TryFrom<candle_core::DType> for Dtype {
    type Error = String;

    fn try_from(dtype: candle_core::DType) -> std::result::Result<Self, String> {
        match dtype {
            candle_core::DType::F16 => Ok(Dtype::F16),
            candle_core::DType::BF16 => Ok(Dtype::BF16),
            candle_core::DType::F32 => Ok(Dtype::F32),
            candle_core::DType::F64 => Ok(Dtype::F64),
            other => Err(format!("{other:?}")),
        }
    }
}

/// A named parameter's payload: element type, shape and row-major bytes
#[derive(Debug, Clone, PartialEq)]
pub struct RawTensor {
    dtype: Dtype,
    shape: Vec<usize>,
    data: Vec<u8>,
}

impl RawTensor {
    /// Build a tensor, checking that the buffer length matches the shape.
    pub fn new(dtype: Dtype, shape: Vec<usize>, data: Vec<u8>) -> Result<Self> {
        let expected = shape.iter().product::<usize>() * dtype.size();
        if data.len() != expected {
            return Err(ConvertError::Malformed(format!(
                "{dtype} tensor of shape {shape:?} needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self { dtype, shape, data })
    }

    pub fn from_f32(shape: Vec<usize>, values: &[f32]) -> Result<Self> {
        Self::new(Dtype::F32, shape, bytemuck::cast_slice(values).to_vec())
    }

    pub fn from_f16(shape: Vec<usize>, values: &[f16]) -> Result<Self> {
        Self::new(Dtype::F16, shape, bytemuck::cast_slice(values).to_vec())
    }

    pub fn from_bf16(shape: Vec<usize>, values: &[bf16]) -> Result<Self> {
        Self::new(Dtype::BF16, shape, bytemuck::cast_slice(values).to_vec())
    }

    pub fn from_f64(shape: Vec<usize>, values: &[f64]) -> Result<Self> {
        Self::new(Dtype::F64, shape, bytemuck::cast_slice(values).to_vec())
    }

    pub fn dtype(&self) -> Dtype {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn nbytes(&self) -> usize {
        self.data.len()
    }

    /// Decode the payload as f32 values, widening or narrowing as needed.
    pub fn to_f32_vec(&self) -> Vec<f32> {
        match self.dtype {
            Dtype::F32 => bytemuck::pod_collect_to_vec(self.data.as_slice()),
            Dtype::F16 => bytemuck::pod_collect_to_vec::<u8, f16>(self.data.as_slice())
                .into_iter()
                .map(f16::to_f32)
                .collect(),
            Dtype::BF16 => bytemuck::pod_collect_to_vec::<u8, bf16>(self.data.as_slice())
                .into_iter()
                .map(bf16::to_f32)
                .collect(),
            Dtype::F64 => bytemuck::pod_collect_to_vec::<u8, f64>(self.data.as_slice())
                .into_iter()
                .map(|v| v as f32)
                .collect(),
        }
    }

    /// Copy of this tensor with f32 elements
    pub fn to_f32(&self) -> RawTensor {
        if self.dtype == Dtype::F32 {
            return self.clone();
        }
        let values = self.to_f32_vec();
        RawTensor {
            dtype: Dtype::F32,
            shape: self.shape.clone(),
            data: bytemuck::cast_slice(values.as_slice()).to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_checks_length() {
        assert!(RawTensor::new(Dtype::F32, vec![2, 3], vec![0u8; 24]).is_ok());
        let err = RawTensor::new(Dtype::F16, vec![2, 3], vec![0u8; 24]).unwrap_err();
        assert!(matches!(err, ConvertError::Malformed(_)));
    }

    #[test]
    fn test_upcast_to_f32() {
        let halves: Vec<f16> = [1.0f32, -2.5, 0.125].iter().map(|&v| f16::from_f32(v)).collect();
        let t = RawTensor::from_f16(vec![3], &halves).unwrap();
        let up = t.to_f32();
        assert_eq!(up.dtype(), Dtype::F32);
        assert_eq!(up.nbytes(), 12);
        assert_eq!(up.to_f32_vec(), vec![1.0, -2.5, 0.125]);

        let b: Vec<bf16> = [3.0f32, 0.5].iter().map(|&v| bf16::from_f32(v)).collect();
        assert_eq!(RawTensor::from_bf16(vec![2], &b).unwrap().to_f32_vec(), vec![3.0, 0.5]);

        let d = RawTensor::from_f64(vec![1, 2], &[4.0, -1.0]).unwrap();
        assert_eq!(d.to_f32().to_f32_vec(), vec![4.0, -1.0]);
    }

    #[test]
    fn test_output_codes() {
        assert_eq!(Dtype::F32.output_code().unwrap(), 0);
        assert_eq!(Dtype::F16.output_code().unwrap(), 1);
        assert!(Dtype::BF16.output_code().is_err());
        assert!(Dtype::F64.output_code().is_err());
        assert_eq!(Dtype::from_output_code(1), Some(Dtype::F16));
        assert_eq!(Dtype::from_output_code(7), None);
    }

    #[test]
    fn test_rejects_integer_dtypes() {
        assert!(Dtype::try_from(safetensors::Dtype::I64).is_err());
        assert_eq!(Dtype::try_from(safetensors::Dtype::BF16), Ok(Dtype::BF16));
        assert!(Dtype::try_from(candle_core::DType::U8).is_err());
    }
}
