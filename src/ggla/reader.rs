//! Sequential decoder for GGLA files

use super::{align_offset, HEADER_LEN, MAGIC, VERSION};
use crate::error::{ConvertError, Result};
use crate::tensor::Dtype;
use std::path::Path;

/// One decoded tensor record
#[derive(Debug, Clone, PartialEq)]
pub struct GglaRecord {
    pub name: String,
    /// Dimensions as stored, i.e. reversed relative to row-major order
    pub dims: Vec<usize>,
    pub dtype: Dtype,
    /// Absolute offset of the payload in the file
    pub offset: u64,
    pub data: Vec<u8>,
}

impl GglaRecord {
    /// Row-major shape of the payload
    pub fn shape(&self) -> Vec<usize> {
        self.dims.iter().rev().copied().collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GglaFile {
    pub rank: i32,
    pub alpha: i32,
    pub records: Vec<GglaRecord>,
}

/// Read and decode a file from disk.
pub fn read_file(path: &Path) -> Result<GglaFile> {
    let bytes = std::fs::read(path)?;
    GglaFile::parse(&bytes)
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| {
                ConvertError::Malformed(format!("truncated {what} at offset {}", self.pos))
            })?;
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn i32(&mut self, what: &str) -> Result<i32> {
        let bytes = self.take(4, what)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn count(&mut self, what: &str) -> Result<usize> {
        let v = self.i32(what)?;
        usize::try_from(v).map_err(|_| ConvertError::Malformed(format!("negative {what} {v}")))
    }

    fn at_end(&self) -> bool {
        self.pos == self.buf.len()
    }
}

impl GglaFile {
    /// Decode a complete file image.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        let mut cur = Cursor { buf, pos: 0 };
        if cur.take(4, "magic")? != MAGIC {
            return Err(ConvertError::Malformed("bad magic".into()));
        }
        let version = cur.i32("version")?;
        if version != VERSION {
            return Err(ConvertError::Malformed(format!("unsupported version {version}")));
        }
        let rank = cur.i32("rank")?;
        let alpha = cur.i32("alpha")?;
        debug_assert_eq!(cur.pos, HEADER_LEN);

        let mut records = Vec::new();
        while !cur.at_end() {
            let n_dims = cur.count("dimension count")?;
            let name_len = cur.count("name length")?;
            let code = cur.i32("dtype code")?;
            let dtype = u32::try_from(code)
                .ok()
                .and_then(Dtype::from_output_code)
                .ok_or_else(|| ConvertError::Malformed(format!("unknown dtype code {code}")))?;
            let dims = (0..n_dims)
                .map(|_| cur.count("dimension"))
                .collect::<Result<Vec<_>>>()?;
            let name = String::from_utf8(cur.take(name_len, "name")?.to_vec())
                .map_err(|e| ConvertError::Malformed(format!("tensor name: {e}")))?;

            let aligned = align_offset(cur.pos as u64) as usize;
            cur.take(aligned.saturating_sub(cur.pos), "padding")?;

            let offset = cur.pos as u64;
            let len = dims.iter().product::<usize>() * dtype.size();
            let data = cur.take(len, "payload")?.to_vec();
            records.push(GglaRecord {
                name,
                dims,
                dtype,
                offset,
                data,
            });
        }
        Ok(Self {
            rank,
            alpha,
            records,
        })
    }

    pub fn record(&self, name: &str) -> Option<&GglaRecord> {
        self.records.iter().find(|r| r.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::ValidatedParams;
    use crate::ggla::GglaWriter;
    use crate::tensor::RawTensor;
    use half::f16;

    fn sample() -> Vec<u8> {
        let params = ValidatedParams { rank: 4, alpha: 8 };
        let mut w = GglaWriter::new(Vec::new(), params).unwrap();
        let a = RawTensor::from_f32(vec![2, 4], &[0.5; 8]).unwrap();
        let b = RawTensor::from_f16(vec![3, 2], &[f16::ONE; 6]).unwrap();
        w.write_tensor("blk.1.attn_k.weight.loraA", &a).unwrap();
        w.write_tensor("blk.1.attn_k.weight.loraB", &b).unwrap();
        w.finish().unwrap().0
    }

    #[test]
    fn test_parse_written_file() {
        let file = GglaFile::parse(&sample()).unwrap();
        assert_eq!((file.rank, file.alpha), (4, 8));
        assert_eq!(file.records.len(), 2);

        let a = file.record("blk.1.attn_k.weight.loraA").unwrap();
        assert_eq!(a.dims, vec![4, 2]);
        assert_eq!(a.shape(), vec![2, 4]);
        assert_eq!(a.dtype, Dtype::F32);
        assert_eq!(a.offset % 32, 0);

        let b = file.record("blk.1.attn_k.weight.loraB").unwrap();
        assert_eq!(b.dtype, Dtype::F16);
        assert_eq!(b.data.len(), 12);
        assert_eq!(b.offset % 32, 0);
    }

    #[test]
    fn test_truncated() {
        let buf = sample();
        let err = GglaFile::parse(&buf[..buf.len() - 1]).unwrap_err();
        assert!(matches!(err, ConvertError::Malformed(_)));
    }

    #[test]
    fn test_bad_magic() {
        let mut buf = sample();
        buf[0] = b'g';
        assert!(GglaFile::parse(&buf).is_err());
    }
}
