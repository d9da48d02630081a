//! Tensor naming for the target runtime
//!
//! Source checkpoints name their parameters after the Python module tree of
//! whichever model family produced them. The runtime uses one canonical
//! scheme (`token_embd`, `blk.{bid}.attn_q`, ...). An [`Architecture`] selects
//! which canonical tensors exist; a [`TensorNameTable`] holds every source
//! spelling that maps onto them.

mod arch;
mod kind;
pub mod mapper;
pub mod table;

pub use arch::Architecture;
pub use kind::TensorKind;
pub use mapper::{MappedName, NameMapper};
pub use table::TensorNameTable;

/// Block-count bound used when no other is given
pub const DEFAULT_MAX_BLOCKS: usize = 500;

/// Upper bound on per-expert tensor indices
pub const MAX_EXPERTS: usize = 60;
