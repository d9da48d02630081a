//! Binary Encoder
//!
//! Writes sequentially to any `Write`. The writer counts its own position so
//! padding is emitted as explicit zero bytes, and hashes everything it writes.

use super::{align_offset, MAGIC, VERSION};
use crate::adapter::ValidatedParams;
use crate::error::{ConvertError, Result};
use crate::tensor::RawTensor;
use sha2::{Digest, Sha256};
use std::io::Write;

/// What a finished encode produced
#[derive(Debug, Clone)]
pub struct EncodeSummary {
    pub records: usize,
    pub bytes_written: u64,
    /// Hex SHA-256 of the whole file
    pub sha256: String,
}

pub struct GglaWriter<W: Write> {
    inner: W,
    pos: u64,
    records: usize,
    hasher: Sha256,
}

impl<W: Write> GglaWriter<W> {
    /// Start a file by writing its header.
    pub fn new(inner: W, params: ValidatedParams) -> Result<Self> {
        let mut writer = Self {
            inner,
            pos: 0,
            records: 0,
            hasher: Sha256::new(),
        };
        writer.put(&MAGIC)?;
        writer.put_i32(VERSION)?;
        writer.put_i32(params.rank)?;
        writer.put_i32(params.alpha)?;
        Ok(writer)
    }

    /// Current stream offset
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Append one tensor record; returns the payload offset.
    pub fn write_tensor(&mut self, name: &str, tensor: &RawTensor) -> Result<u64> {
        let code = tensor.dtype().output_code()?;
        let name_bytes = name.as_bytes();

        self.put_i32(to_i32(tensor.shape().len(), "dimension count")?)?;
        self.put_i32(to_i32(name_bytes.len(), "name length")?)?;
        self.put_i32(code as i32)?;
        for &dim in tensor.shape().iter().rev() {
            self.put_i32(to_i32(dim, "dimension")?)?;
        }
        self.put(name_bytes)?;

        let padding = align_offset(self.pos) - self.pos;
        self.put(&vec![0u8; padding as usize])?;

        let offset = self.pos;
        self.put(tensor.data())?;
        self.records += 1;
        Ok(offset)
    }

    /// Flush and hand back the underlying writer.
    pub fn finish(mut self) -> Result<(W, EncodeSummary)> {
        self.inner.flush()?;
        let summary = EncodeSummary {
            records: self.records,
            bytes_written: self.pos,
            sha256: hex::encode(self.hasher.finalize()),
        };
        Ok((self.inner, summary))
    }

    fn put(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        self.hasher.update(bytes);
        self.pos += bytes.len() as u64;
        Ok(())
    }

    fn put_i32(&mut self, value: i32) -> Result<()> {
        self.put(&value.to_le_bytes())
    }
}

fn to_i32(value: usize, what: &str) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| ConvertError::Malformed(format!("{what} {value} does not fit in i32")))
}
