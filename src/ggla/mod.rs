//! GGLA: the flat adapter file consumed by the inference runtime
//!
//! Layout, all integers little-endian `i32`:
//!
//! ```text
//! header  "algg" | version | rank | alpha
//! record  n_dims | name_len | dtype_code | dims (reversed) | name
//!         zero padding to a 32-byte boundary | payload
//! ```
//!
//! There is no record count or footer; readers parse until end of input.

pub mod reader;
pub mod writer;

pub use reader::{read_file, GglaFile, GglaRecord};
pub use writer::{EncodeSummary, GglaWriter};

/// "ggla" reversed
pub const MAGIC: [u8; 4] = *b"algg";

pub const VERSION: i32 = 1;

/// Size of the fixed file header
pub const HEADER_LEN: usize = 16;

/// Payload alignment in bytes
pub const ALIGNMENT: u64 = 32;

/// Next multiple of [`ALIGNMENT`] at or after `pos`
pub fn align_offset(pos: u64) -> u64 {
    (pos + ALIGNMENT - 1) & !(ALIGNMENT - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_offset() {
        assert_eq!(align_offset(0), 0);
        assert_eq!(align_offset(1), 32);
        assert_eq!(align_offset(32), 32);
        assert_eq!(align_offset(33), 64);
        assert_eq!(align_offset(63), 64);
    }

    #[test]
    fn test_magic() {
        let mut m = *b"ggla";
        m.reverse();
        assert_eq!(m, MAGIC);
    }
}
